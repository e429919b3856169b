//! batchgrid.toml configuration parser.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

use crate::function::{EnvironmentInput, FunctionSpec};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub service: String,
    pub provider: ProviderConfig,
    /// Processed in order.
    #[serde(default)]
    pub functions: Vec<FunctionSpec>,
    #[serde(default)]
    pub custom: CustomConfig,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub stage: String,
    /// Function runtime, e.g. `nodejs10.x`. Selects the container base image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub environment: EnvironmentInput,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub iam_role_statements: Vec<Value>,
    /// Compute-pool overrides, including the mandatory network placement.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch: Option<ComputePoolOverrides>,
}

/// Provider-supplied fields deep-merged over the compute-pool baseline.
///
/// Field names follow the template casing so they can be merged verbatim.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ComputePoolOverrides {
    /// `EC2` or `SPOT`.
    #[serde(rename = "Type", default, skip_serializing_if = "Option::is_none")]
    pub pool_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bid_percentage: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_types: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minv_cpus: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maxv_cpus: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desiredv_cpus: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnets: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_group_ids: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Map<String, Value>>,
    /// Any other compute-resource field, passed through untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ComputePoolOverrides {
    /// The overrides as a template object, omitting absent fields.
    pub fn to_fields(&self) -> Map<String, Value> {
        let mut fields = self.extra.clone();
        if let Some(pool_type) = &self.pool_type {
            fields.insert("Type".into(), Value::from(pool_type.as_str()));
        }
        if let Some(bid) = self.bid_percentage {
            fields.insert("BidPercentage".into(), Value::from(bid));
        }
        if let Some(types) = &self.instance_types {
            fields.insert("InstanceTypes".into(), Value::from(types.clone()));
        }
        if let Some(min) = self.minv_cpus {
            fields.insert("MinvCpus".into(), Value::from(min));
        }
        if let Some(max) = self.maxv_cpus {
            fields.insert("MaxvCpus".into(), Value::from(max));
        }
        if let Some(desired) = self.desiredv_cpus {
            fields.insert("DesiredvCpus".into(), Value::from(desired));
        }
        if let Some(subnets) = &self.subnets {
            fields.insert("Subnets".into(), Value::Array(subnets.clone()));
        }
        if let Some(groups) = &self.security_group_ids {
            fields.insert("SecurityGroupIds".into(), Value::Array(groups.clone()));
        }
        if let Some(tags) = &self.tags {
            fields.insert("Tags".into(), Value::Object(tags.clone()));
        }
        fields
    }
}

/// Settings that only affect the container build file.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CustomConfig {
    /// Extra `RUN` lines added to the image build stage.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub docker_run_commands: Vec<String>,
}

impl ServiceConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: ServiceConfig = toml::from_str(content)?;
        Ok(config)
    }
}
