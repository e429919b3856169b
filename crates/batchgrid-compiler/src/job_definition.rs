//! Job definition synthesizer.
//!
//! Every container field follows "explicit value if present, else default".
//! Memory and timeout resolve through the same chains used for the derived
//! environment entries: annotation, then function hint, then a fixed
//! fallback.

use batchgrid_core::{CompileResult, ConfigError, EnvironmentInput, FunctionSpec, JobAnnotation};
use serde_json::{Value, json};

use crate::env::EnvironmentMap;
use crate::graph::ResourceDefinition;
use crate::naming::{LogicalId, ServiceNames};

pub const DEFAULT_MEMORY_MB: u32 = 2048;
pub const DEFAULT_TIMEOUT_SECONDS: u32 = 3600;
pub const DEFAULT_VCPUS: u32 = 1;
pub const DEFAULT_ATTEMPTS: u32 = 1;

/// Job parameter carrying the triggering event, substituted into the
/// default command as `Ref::event`.
pub const EVENT_PARAMETER: &str = "event";

/// Zero counts as unset, matching how hints are treated upstream.
fn positive(value: Option<u32>) -> Option<u32> {
    value.filter(|v| *v > 0)
}

pub fn effective_memory(function: &FunctionSpec, annotation: &JobAnnotation) -> u32 {
    positive(annotation.container_properties.memory)
        .or(positive(function.memory))
        .unwrap_or(DEFAULT_MEMORY_MB)
}

pub fn effective_timeout(function: &FunctionSpec, annotation: &JobAnnotation) -> u32 {
    positive(
        annotation
            .timeout
            .as_ref()
            .and_then(|t| t.attempt_duration_seconds),
    )
    .or(positive(function.timeout))
    .unwrap_or(DEFAULT_TIMEOUT_SECONDS)
}

/// Lowest-precedence environment tier: values derived from the spec.
pub fn default_environment(
    function: &FunctionSpec,
    annotation: &JobAnnotation,
    region: &str,
) -> EnvironmentInput {
    let mut defaults = EnvironmentInput::new();
    defaults.insert("AWS_LAMBDA_FUNCTION_NAME".into(), json!(function.name));
    defaults.insert(
        "AWS_LAMBDA_FUNCTION_TIMEOUT".into(),
        json!(effective_timeout(function, annotation).to_string()),
    );
    defaults.insert(
        "AWS_LAMBDA_FUNCTION_MEMORY_SIZE".into(),
        json!(effective_memory(function, annotation).to_string()),
    );
    defaults.insert("AWS_REGION".into(), json!(region));
    defaults
}

/// Explicit command, or the handler invoked with the event parameter.
pub fn resolve_command(function: &FunctionSpec, annotation: &JobAnnotation) -> CompileResult<Vec<String>> {
    if let Some(command) = &annotation.container_properties.command {
        return Ok(command.clone());
    }
    match function.handler.as_deref().map(str::trim) {
        Some(handler) if !handler.is_empty() => Ok(vec![
            handler.to_string(),
            format!("Ref::{EVENT_PARAMETER}"),
        ]),
        _ => Err(ConfigError::MissingHandler {
            function: function.name.clone(),
        }),
    }
}

/// Everything a job definition is assembled from.
#[derive(Debug, Clone, Copy)]
pub struct JobDefinitionInputs<'a> {
    pub names: &'a ServiceNames<'a>,
    pub function: &'a FunctionSpec,
    pub annotation: &'a JobAnnotation,
    pub environment: &'a EnvironmentMap,
    pub execution_role: &'a LogicalId,
}

pub fn job_definition(inputs: JobDefinitionInputs<'_>) -> CompileResult<ResourceDefinition> {
    let JobDefinitionInputs {
        names,
        function,
        annotation,
        environment,
        execution_role,
    } = inputs;
    let container = &annotation.container_properties;

    let image = match &container.image {
        Some(image) => Value::String(image.clone()),
        None => names.image_reference(),
    };
    let role_arn = container
        .job_role_arn
        .clone()
        .unwrap_or_else(|| execution_role.arn());

    let mut container_properties = json!({
        "Image": image,
        "Command": resolve_command(function, annotation)?,
        "Memory": effective_memory(function, annotation),
        "Vcpus": positive(container.vcpus).unwrap_or(DEFAULT_VCPUS),
        "JobRoleArn": role_arn,
        "Environment": environment.to_container_entries(),
    });
    if let Some(instance_type) = &container.instance_type {
        container_properties["InstanceType"] = json!(instance_type);
    }

    let attempts = annotation
        .retry_strategy
        .as_ref()
        .and_then(|r| positive(r.attempts))
        .unwrap_or(DEFAULT_ATTEMPTS);

    Ok(ResourceDefinition::new(
        "AWS::Batch::JobDefinition",
        json!({
            "JobDefinitionName": names.job_definition_name(&function.name),
            "Type": "container",
            "Parameters": { EVENT_PARAMETER: "{}" },
            "ContainerProperties": container_properties,
            "RetryStrategy": { "Attempts": attempts },
            "Timeout": { "AttemptDurationSeconds": effective_timeout(function, annotation) }
        }),
    ))
}
