//! Function specifications and their optional `batch` job annotation.
//!
//! On disk a function is a flat table with an optional `batch` sub-table.
//! In memory the presence of that table is lifted into [`JobKind`], so the
//! compiler matches on a sum type instead of probing for a property.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Raw environment map as written in configuration. Values are validated
/// later, when the four tiers are merged.
pub type EnvironmentInput = Map<String, Value>;

/// A single function of the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "FunctionDocument", into = "FunctionDocument")]
pub struct FunctionSpec {
    pub name: String,
    /// Handler reference, e.g. `handler.resize`.
    pub handler: Option<String>,
    /// Memory hint in MB.
    pub memory: Option<u32>,
    /// Timeout hint in seconds.
    pub timeout: Option<u32>,
    pub environment: EnvironmentInput,
    /// Function-level permission statements, appended to the provider's.
    pub iam_role_statements: Vec<Value>,
    /// Role reference for the function itself (set on shim replacements).
    pub role: Option<String>,
    /// Pre-built artifact location (set on shim replacements).
    pub artifact: Option<String>,
    pub job: JobKind,
    /// Keys the compiler does not interpret (`events`, `description`, ...),
    /// carried through unchanged.
    pub extra: Map<String, Value>,
}

/// Whether a function runs directly or as a batch container job.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum JobKind {
    #[default]
    Plain,
    Annotated(JobAnnotation),
}

impl FunctionSpec {
    /// A plain function with only a name and handler.
    pub fn new(name: &str, handler: &str) -> Self {
        Self {
            name: name.to_string(),
            handler: Some(handler.to_string()),
            memory: None,
            timeout: None,
            environment: Map::new(),
            iam_role_statements: Vec::new(),
            role: None,
            artifact: None,
            job: JobKind::Plain,
            extra: Map::new(),
        }
    }

    /// Builder method: attach a job annotation.
    pub fn with_job(self, annotation: JobAnnotation) -> Self {
        Self {
            job: JobKind::Annotated(annotation),
            ..self
        }
    }

    pub fn annotation(&self) -> Option<&JobAnnotation> {
        match &self.job {
            JobKind::Plain => None,
            JobKind::Annotated(annotation) => Some(annotation),
        }
    }
}

/// The `batch` sub-table of a function.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct JobAnnotation {
    #[serde(default)]
    pub container_properties: ContainerOverrides,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_strategy: Option<RetryStrategy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<TimeoutPolicy>,
    /// Log every triggering event from the submit-job shim.
    #[serde(default)]
    pub event_logging: bool,
}

/// Explicit container settings; anything left `None` is defaulted.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vcpus: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<Vec<String>>,
    /// Either an ARN string or a template reference object.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_role_arn: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_type: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub environment: EnvironmentInput,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RetryStrategy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempts: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TimeoutPolicy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempt_duration_seconds: Option<u32>,
}

/// On-disk shape of a function table.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct FunctionDocument {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    handler: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    memory: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    timeout: Option<u32>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    environment: EnvironmentInput,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    iam_role_statements: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    artifact: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    batch: Option<JobAnnotation>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl From<FunctionDocument> for FunctionSpec {
    fn from(doc: FunctionDocument) -> Self {
        Self {
            name: doc.name,
            handler: doc.handler,
            memory: doc.memory,
            timeout: doc.timeout,
            environment: doc.environment,
            iam_role_statements: doc.iam_role_statements,
            role: doc.role,
            artifact: doc.artifact,
            job: match doc.batch {
                Some(annotation) => JobKind::Annotated(annotation),
                None => JobKind::Plain,
            },
            extra: doc.extra,
        }
    }
}

impl From<FunctionSpec> for FunctionDocument {
    fn from(spec: FunctionSpec) -> Self {
        Self {
            name: spec.name,
            handler: spec.handler,
            memory: spec.memory,
            timeout: spec.timeout,
            environment: spec.environment,
            iam_role_statements: spec.iam_role_statements,
            role: spec.role,
            artifact: spec.artifact,
            batch: match spec.job {
                JobKind::Plain => None,
                JobKind::Annotated(annotation) => Some(annotation),
            },
            extra: spec.extra,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_function_has_no_annotation() {
        let spec: FunctionSpec = toml::from_str(
            r#"
name = "hello"
handler = "handler.hello"
"#,
        )
        .unwrap();
        assert_eq!(spec.job, JobKind::Plain);
        assert!(spec.annotation().is_none());
    }

    #[test]
    fn test_batch_table_becomes_annotation() {
        let spec: FunctionSpec = toml::from_str(
            r#"
name = "resize"
handler = "handler.resize"
memory = 1024

[batch]
EventLogging = true

[batch.ContainerProperties]
Vcpus = 4
Command = ["node", "index.js"]

[batch.ContainerProperties.Environment]
MODE = "batch"

[batch.RetryStrategy]
Attempts = 3
"#,
        )
        .unwrap();

        let annotation = spec.annotation().unwrap();
        assert!(annotation.event_logging);
        assert_eq!(annotation.container_properties.vcpus, Some(4));
        assert_eq!(
            annotation.container_properties.command.as_deref(),
            Some(&["node".to_string(), "index.js".to_string()][..])
        );
        assert_eq!(
            annotation.container_properties.environment["MODE"],
            Value::String("batch".into())
        );
        assert_eq!(annotation.retry_strategy.as_ref().unwrap().attempts, Some(3));
        assert!(annotation.timeout.is_none());
        assert_eq!(spec.memory, Some(1024));
    }

    #[test]
    fn test_unknown_keys_survive_round_trip() {
        let spec: FunctionSpec = serde_json::from_value(serde_json::json!({
            "name": "hello",
            "handler": "handler.hello",
            "events": [{ "schedule": "rate(1 hour)" }]
        }))
        .unwrap();
        assert!(spec.extra.contains_key("events"));

        let value = serde_json::to_value(&spec).unwrap();
        assert_eq!(value["events"][0]["schedule"], "rate(1 hour)");
        assert!(value.get("batch").is_none());
        assert!(value.get("environment").is_none());
    }
}
