//! Shim generator: replaces an annotated function with a submit-job stub.
//!
//! The stub reads the job definition and queue from its environment and
//! submits a job carrying the triggering event. Function-level permission
//! statements are dropped from the replacement: they already live in the
//! job execution role, and the stub runs as the schedule execution role.

use batchgrid_core::{ArtifactRequest, EnvironmentInput, FunctionSpec, JobAnnotation, JobKind};
use serde_json::json;

use crate::naming::LogicalId;

/// Handler reference of the submit-job stub.
pub const SHIM_HANDLER: &str = "schedule.schedule";

/// File name of the stub's source inside its bundle.
pub const SHIM_HANDLER_FILE: &str = "schedule.js";

/// Directory of a function's bundle, relative to the output root.
pub fn artifact_dir(function: &str) -> String {
    format!("artifacts/{function}")
}

/// Identifiers the stub is wired to.
#[derive(Debug, Clone, Copy)]
pub struct ShimWiring<'a> {
    pub job_definition: &'a LogicalId,
    pub job_queue: &'a LogicalId,
    pub schedule_role: &'a LogicalId,
}

/// The replacement spec plus the bundle it needs.
#[derive(Debug, Clone, PartialEq)]
pub struct Shim {
    pub replacement: FunctionSpec,
    pub artifact: ArtifactRequest,
}

pub fn generate(original: &FunctionSpec, annotation: &JobAnnotation, wiring: ShimWiring<'_>) -> Shim {
    let mut environment = EnvironmentInput::new();
    environment.insert(
        "EVENT_LOGGING_ENABLED".into(),
        json!(annotation.event_logging.to_string()),
    );
    environment.insert("FUNCTION_NAME".into(), json!(original.name));
    environment.insert(
        "JOB_DEFINITION_ARN".into(),
        wiring.job_definition.reference(),
    );
    environment.insert("JOB_QUEUE_ARN".into(), wiring.job_queue.reference());

    let artifact_dir = artifact_dir(&original.name);
    let replacement = FunctionSpec {
        name: original.name.clone(),
        handler: Some(SHIM_HANDLER.to_string()),
        memory: None,
        timeout: None,
        environment,
        iam_role_statements: Vec::new(),
        role: Some(wiring.schedule_role.to_string()),
        artifact: Some(artifact_dir.clone()),
        job: JobKind::Plain,
        extra: original.extra.clone(),
    };

    Shim {
        replacement,
        artifact: ArtifactRequest {
            function: original.name.clone(),
            artifact_dir,
            handler_file: SHIM_HANDLER_FILE.to_string(),
            handler: SHIM_HANDLER.to_string(),
        },
    }
}
