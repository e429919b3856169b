//! Graph merger, the single owner of the output resource graph.
//!
//! Synthesizers hand their definitions to a [`GraphBuilder`], which refuses
//! to let two of them claim the same identifier with different content.
//! The finished [`ResourceGraph`] only exists after [`GraphBuilder::finalize`],
//! so a failed run never exposes a partial graph.

use std::collections::HashMap;

use batchgrid_core::{CompileResult, ConfigError};
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Map, Value, json};
use tracing::debug;

use crate::naming::LogicalId;

/// A typed template resource.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ResourceDefinition {
    #[serde(rename = "Type")]
    pub kind: String,
    #[serde(rename = "Properties")]
    pub properties: Value,
}

impl ResourceDefinition {
    pub fn new(kind: &str, properties: Value) -> Self {
        Self {
            kind: kind.to_string(),
            properties,
        }
    }

    pub fn to_json(&self) -> Value {
        json!({ "Type": self.kind, "Properties": self.properties })
    }
}

/// Accumulates resources for one run.
#[derive(Debug, Default)]
pub struct GraphBuilder {
    resources: Vec<(LogicalId, ResourceDefinition)>,
    index: HashMap<LogicalId, usize>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a definition. Re-inserting an identical definition is a no-op;
    /// a different one under the same identifier is an error.
    pub fn insert(&mut self, id: LogicalId, definition: ResourceDefinition) -> CompileResult<()> {
        if let Some(&slot) = self.index.get(&id) {
            if self.resources[slot].1 != definition {
                return Err(ConfigError::ConflictingResource(id.to_string()));
            }
            debug!(id = %id, "resource already present");
            return Ok(());
        }
        debug!(id = %id, kind = %definition.kind, "resource inserted");
        self.index.insert(id.clone(), self.resources.len());
        self.resources.push((id, definition));
        Ok(())
    }

    pub fn contains(&self, id: &LogicalId) -> bool {
        self.index.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn finalize(self) -> ResourceGraph {
        ResourceGraph {
            resources: self.resources,
        }
    }
}

/// The compiled resources, in insertion order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResourceGraph {
    resources: Vec<(LogicalId, ResourceDefinition)>,
}

impl ResourceGraph {
    pub fn get(&self, id: &str) -> Option<&ResourceDefinition> {
        self.resources
            .iter()
            .find(|(k, _)| k.as_str() == id)
            .map(|(_, v)| v)
    }

    pub fn ids(&self) -> impl Iterator<Item = &LogicalId> {
        self.resources.iter().map(|(k, _)| k)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&LogicalId, &ResourceDefinition)> {
        self.resources.iter().map(|(k, v)| (k, v))
    }

    /// Number of resources of the given template type.
    pub fn count_kind(&self, kind: &str) -> usize {
        self.resources.iter().filter(|(_, d)| d.kind == kind).count()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// The graph as a `Resources` object.
    pub fn to_json(&self) -> Value {
        let map: Map<String, Value> = self
            .resources
            .iter()
            .map(|(id, def)| (id.to_string(), def.to_json()))
            .collect();
        Value::Object(map)
    }

    /// Merge into a caller template's `Resources` object, creating it if
    /// absent. An existing entry must be identical to ours.
    pub fn merge_into(&self, template: &mut Value) -> CompileResult<()> {
        let Value::Object(root) = template else {
            return Err(ConfigError::InvalidTemplate(
                "template root is not an object".into(),
            ));
        };
        let resources = root
            .entry("Resources")
            .or_insert_with(|| Value::Object(Map::new()));
        let Value::Object(resources) = resources else {
            return Err(ConfigError::InvalidTemplate(
                "'Resources' is not an object".into(),
            ));
        };

        // Check everything first so a conflict leaves the template untouched.
        let mut additions = Vec::new();
        for (id, definition) in &self.resources {
            let value = definition.to_json();
            match resources.get(id.as_str()) {
                Some(existing) if *existing != value => {
                    return Err(ConfigError::ConflictingTemplateResource(id.to_string()));
                }
                Some(_) => {}
                None => additions.push((id.to_string(), value)),
            }
        }
        resources.extend(additions);
        Ok(())
    }
}

impl Serialize for ResourceGraph {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.resources.len()))?;
        for (id, definition) in &self.resources {
            map.serialize_entry(id, definition)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::naming::{ResourceKind, derive};

    fn queue() -> ResourceDefinition {
        ResourceDefinition::new("AWS::Batch::JobQueue", json!({ "Priority": 1 }))
    }

    #[test]
    fn identical_reinsert_is_noop() {
        let mut graph = GraphBuilder::new();
        let id = derive(ResourceKind::JobQueue, None);
        graph.insert(id.clone(), queue()).unwrap();
        graph.insert(id.clone(), queue()).unwrap();
        assert_eq!(graph.len(), 1);
        assert!(graph.contains(&id));
    }

    #[test]
    fn conflicting_insert_fails() {
        let mut graph = GraphBuilder::new();
        let id = derive(ResourceKind::JobQueue, None);
        graph.insert(id.clone(), queue()).unwrap();
        let other = ResourceDefinition::new("AWS::Batch::JobQueue", json!({ "Priority": 2 }));
        assert_eq!(
            graph.insert(id, other),
            Err(ConfigError::ConflictingResource("BatchJobQueue".into()))
        );
    }

    #[test]
    fn finalize_preserves_order_and_serializes() {
        let mut graph = GraphBuilder::new();
        graph
            .insert(derive(ResourceKind::JobQueue, None), queue())
            .unwrap();
        graph
            .insert(
                derive(ResourceKind::ServiceRole, None),
                ResourceDefinition::new("AWS::IAM::Role", json!({})),
            )
            .unwrap();
        let graph = graph.finalize();

        let ids: Vec<_> = graph.ids().map(LogicalId::as_str).collect();
        assert_eq!(ids, ["BatchJobQueue", "IamRoleBatchService"]);
        assert_eq!(serde_json::to_value(&graph).unwrap(), graph.to_json());
        assert_eq!(graph.count_kind("AWS::IAM::Role"), 1);
        assert_eq!(graph.get("BatchJobQueue").unwrap().properties["Priority"], 1);
    }

    #[test]
    fn conflicting_merge_leaves_template_untouched() {
        let mut graph = GraphBuilder::new();
        graph
            .insert(derive(ResourceKind::JobQueue, None), queue())
            .unwrap();
        graph
            .insert(
                derive(ResourceKind::ServiceRole, None),
                ResourceDefinition::new("AWS::IAM::Role", json!({})),
            )
            .unwrap();
        let graph = graph.finalize();

        let mut template = json!({
            "Resources": { "IamRoleBatchService": { "Type": "AWS::IAM::User" } }
        });
        let before = template.clone();
        assert_eq!(
            graph.merge_into(&mut template),
            Err(ConfigError::ConflictingTemplateResource(
                "IamRoleBatchService".into()
            ))
        );
        assert_eq!(template, before);
    }

    #[test]
    fn merge_into_template() {
        let mut graph = GraphBuilder::new();
        graph
            .insert(derive(ResourceKind::JobQueue, None), queue())
            .unwrap();
        let graph = graph.finalize();

        let mut template = json!({ "AWSTemplateFormatVersion": "2010-09-09" });
        graph.merge_into(&mut template).unwrap();
        assert_eq!(template["Resources"]["BatchJobQueue"]["Type"], "AWS::Batch::JobQueue");

        // Merging twice is idempotent.
        graph.merge_into(&mut template).unwrap();

        let mut clashing = json!({ "Resources": { "BatchJobQueue": { "Type": "Other" } } });
        assert_eq!(
            graph.merge_into(&mut clashing),
            Err(ConfigError::ConflictingTemplateResource("BatchJobQueue".into()))
        );

        let mut broken = json!({ "Resources": [] });
        assert!(matches!(
            graph.merge_into(&mut broken),
            Err(ConfigError::InvalidTemplate(_))
        ));
    }
}
