//! Identifier namer: logical identifiers and physical names.
//!
//! Logical identifiers key resources inside the template and are how
//! generated resources reference each other. Global kinds have a fixed
//! identifier; per-function kinds append the normalized function name.
//! Identifiers are capped at 64 characters by truncation, so two long,
//! similarly-prefixed function names can map to the same identifier. The
//! [`Namer`] registry turns that into a [`ConfigError::IdentifierCollision`]
//! instead of letting one resource overwrite another.

use std::collections::HashMap;
use std::fmt;

use batchgrid_core::{CompileResult, ConfigError};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::warn;

/// Upper bound on logical identifier length.
pub const MAX_LOGICAL_ID_LEN: usize = 64;

/// Upper bound on role and compute-environment physical names.
pub const MAX_PHYSICAL_NAME_LEN: usize = 64;

/// Upper bound on job definition physical names.
pub const MAX_JOB_DEFINITION_NAME_LEN: usize = 128;

/// A derived, ASCII-alphanumeric template key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct LogicalId(String);

impl LogicalId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `{ "Ref": id }`.
    pub fn reference(&self) -> Value {
        json!({ "Ref": self.0 })
    }

    /// `{ "Fn::GetAtt": [id, "Arn"] }`.
    pub fn arn(&self) -> Value {
        json!({ "Fn::GetAtt": [self.0, "Arn"] })
    }
}

impl fmt::Display for LogicalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for LogicalId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Every kind of resource the compiler generates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    ServiceRole,
    InstanceRole,
    InstanceProfile,
    SpotFleetRole,
    ComputeEnvironment,
    JobQueue,
    ScheduleExecutionRole,
    ContainerRepository,
    JobDefinition,
    JobExecutionRole,
}

impl ResourceKind {
    /// Fixed identifier for global kinds, prefix for per-function kinds.
    pub fn prefix(self) -> &'static str {
        match self {
            ResourceKind::ServiceRole => "IamRoleBatchService",
            ResourceKind::InstanceRole => "IamRoleBatchInstanceManagement",
            ResourceKind::InstanceProfile => "IamProfileBatchInstanceManagement",
            ResourceKind::SpotFleetRole => "IamRoleBatchSpotFleetManagement",
            ResourceKind::ComputeEnvironment => "BatchComputeEnvironment",
            ResourceKind::JobQueue => "BatchJobQueue",
            ResourceKind::ScheduleExecutionRole => "IamRoleLambdaScheduleExecution",
            ResourceKind::ContainerRepository => "ECRRepository",
            ResourceKind::JobDefinition => "JobDefinition",
            ResourceKind::JobExecutionRole => "IamRoleBatchJobExecution",
        }
    }

    pub fn is_per_function(self) -> bool {
        matches!(
            self,
            ResourceKind::JobDefinition | ResourceKind::JobExecutionRole
        )
    }

    fn label(self) -> &'static str {
        match self {
            ResourceKind::ServiceRole => "the compute service role",
            ResourceKind::InstanceRole => "the instance management role",
            ResourceKind::InstanceProfile => "the instance profile",
            ResourceKind::SpotFleetRole => "the spot fleet role",
            ResourceKind::ComputeEnvironment => "the compute environment",
            ResourceKind::JobQueue => "the job queue",
            ResourceKind::ScheduleExecutionRole => "the schedule execution role",
            ResourceKind::ContainerRepository => "the container repository",
            ResourceKind::JobDefinition => "the job definition",
            ResourceKind::JobExecutionRole => "the job execution role",
        }
    }
}

/// Derive the logical identifier for `kind`.
///
/// `function` is ignored for global kinds. Pure: the same input always
/// yields the same identifier.
pub fn derive(kind: ResourceKind, function: Option<&str>) -> LogicalId {
    let mut id = kind.prefix().to_string();
    if kind.is_per_function()
        && let Some(name) = function
    {
        id.push_str(&normalize_function_name(name));
    }
    if id.len() > MAX_LOGICAL_ID_LEN {
        warn!(id = %id, "logical identifier truncated to {MAX_LOGICAL_ID_LEN} characters");
        id.truncate(MAX_LOGICAL_ID_LEN);
    }
    LogicalId(id)
}

/// Capitalize the first character and spell out separators so the result
/// stays alphanumeric (`resize-images` → `ResizeDashimages`).
fn normalize_function_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        match c {
            '-' => out.push_str("Dash"),
            '_' => out.push_str("Underscore"),
            c if c.is_ascii_alphanumeric() => out.push(c),
            _ => {}
        }
    }
    if !out.is_empty() {
        out[..1].make_ascii_uppercase();
    }
    out
}

/// Who claimed an identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Owner {
    kind: ResourceKind,
    function: Option<String>,
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.function {
            Some(function) => write!(f, "{} of function '{function}'", self.kind.label()),
            None => f.write_str(self.kind.label()),
        }
    }
}

/// Naming registry for one compilation run.
///
/// Re-deriving an identifier for the same owner is allowed; deriving it for
/// a different owner fails.
#[derive(Debug, Default)]
pub struct Namer {
    claimed: HashMap<LogicalId, Owner>,
    physical: HashMap<(ResourceKind, String), Owner>,
}

impl Namer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn claim(&mut self, kind: ResourceKind, function: Option<&str>) -> CompileResult<LogicalId> {
        let id = derive(kind, function);
        let owner = Owner {
            kind,
            function: function
                .filter(|_| kind.is_per_function())
                .map(str::to_string),
        };
        match self.claimed.get(&id) {
            Some(existing) if *existing != owner => Err(ConfigError::IdentifierCollision {
                id: id.to_string(),
                first: existing.to_string(),
                second: owner.to_string(),
            }),
            Some(_) => Ok(id),
            None => {
                self.claimed.insert(id.clone(), owner);
                Ok(id)
            }
        }
    }

    /// Record the deployed name of a per-function resource. Truncation can
    /// map two functions onto one name, which would only fail at deploy
    /// time.
    pub fn claim_physical(
        &mut self,
        kind: ResourceKind,
        function: &str,
        name: String,
    ) -> CompileResult<()> {
        let owner = Owner {
            kind,
            function: Some(function.to_string()),
        };
        match self.physical.get(&(kind, name.clone())) {
            Some(existing) if *existing != owner => Err(ConfigError::PhysicalNameCollision {
                name,
                first: existing.to_string(),
                second: owner.to_string(),
            }),
            Some(_) => Ok(()),
            None => {
                self.physical.insert((kind, name), owner);
                Ok(())
            }
        }
    }

    pub fn len(&self) -> usize {
        self.claimed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claimed.is_empty()
    }
}

/// Role name prefix of the per-function job execution roles.
pub const JOB_ROLE_PREFIX: &str = "BatchJobRole";

/// Physical (deployed) names, all derived from the service identity.
#[derive(Debug, Clone, Copy)]
pub struct ServiceNames<'a> {
    pub service: &'a str,
    pub stage: &'a str,
    pub region: &'a str,
}

impl ServiceNames<'_> {
    /// `<prefix>-<region>-<stage>-<service>[-<function>]`, capped at 64.
    pub fn role_name(&self, prefix: &str, function: Option<&str>) -> String {
        let mut name = format!("{prefix}-{}-{}-{}", self.region, self.stage, self.service);
        if let Some(function) = function {
            name.push('-');
            name.push_str(function);
        }
        truncate(name, MAX_PHYSICAL_NAME_LEN)
    }

    pub fn job_queue_name(&self) -> String {
        format!("{}-{}-JobQueue", self.service, self.stage)
    }

    /// The suffix makes every compilation produce a new pool name.
    pub fn compute_environment_name(&self, suffix: u32) -> String {
        truncate(
            format!("{}-{}-ComputeEnvironment-{suffix}", self.service, self.stage),
            MAX_PHYSICAL_NAME_LEN,
        )
    }

    pub fn job_definition_name(&self, function: &str) -> String {
        truncate(
            format!("{}-{}-{function}", self.service, self.stage),
            MAX_JOB_DEFINITION_NAME_LEN,
        )
    }

    pub fn repository_name(&self) -> String {
        format!("{}-{}", self.service, self.stage)
    }

    /// Deferred reference to `<account>.dkr.ecr.<region>.amazonaws.com/<repo>:latest`.
    pub fn image_reference(&self) -> Value {
        json!({
            "Fn::Sub": format!(
                "${{AWS::AccountId}}.dkr.ecr.${{AWS::Region}}.amazonaws.com/{}:latest",
                self.repository_name()
            )
        })
    }

    pub fn instance_tag(&self) -> String {
        format!("AWS Batch Instance - {}-{}", self.service, self.stage)
    }
}

/// Truncate on a character boundary.
fn truncate(mut s: String, max: usize) -> String {
    if s.len() > max {
        let mut end = max;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        s.truncate(end);
    }
    s
}
