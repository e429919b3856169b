//! Environment merger: four-tier layering and validation.
//!
//! Tiers, lowest precedence first: derived defaults, provider environment,
//! function environment, job annotation environment. Maps are layered per
//! key (the rightmost present value wins) and keep first-insertion order,
//! so the flattened container environment is reproducible.

use std::sync::LazyLock;

use batchgrid_core::{CompileResult, ConfigError, EnvironmentInput};
use regex::Regex;
use serde_json::{Map, Value, json};

/// Shell variable name shape.
static ENV_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("environment key pattern is valid")
});

/// A validated environment value.
#[derive(Debug, Clone, PartialEq)]
pub enum EnvValue {
    Literal(String),
    /// A deferred template expression (`Ref` or `Fn::*`).
    Reference(Map<String, Value>),
}

impl EnvValue {
    pub fn to_json(&self) -> Value {
        match self {
            EnvValue::Literal(s) => Value::String(s.clone()),
            EnvValue::Reference(r) => Value::Object(r.clone()),
        }
    }
}

/// Insertion-ordered, validated environment.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EnvironmentMap {
    entries: Vec<(String, EnvValue)>,
}

impl EnvironmentMap {
    pub fn get(&self, key: &str) -> Option<&EnvValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Container-spec form: `[{ "Name": .., "Value": .. }, ...]`.
    pub fn to_container_entries(&self) -> Vec<Value> {
        self.entries
            .iter()
            .map(|(name, value)| json!({ "Name": name, "Value": value.to_json() }))
            .collect()
    }
}

/// The four environment tiers of one function.
#[derive(Debug, Clone, Copy)]
pub struct EnvironmentTiers<'a> {
    pub defaults: &'a EnvironmentInput,
    pub provider: &'a EnvironmentInput,
    pub function: &'a EnvironmentInput,
    pub job: &'a EnvironmentInput,
}

/// Layer the tiers and validate every resulting entry.
///
/// Fails on the first invalid key or value; `function` only labels the
/// error.
pub fn merge(function: &str, tiers: EnvironmentTiers<'_>) -> CompileResult<EnvironmentMap> {
    let mut layered: Vec<(String, Value)> = Vec::new();
    for tier in [tiers.defaults, tiers.provider, tiers.function, tiers.job] {
        for (key, value) in tier {
            if value.is_null() {
                continue;
            }
            match layered.iter_mut().find(|(k, _)| k == key) {
                Some((_, existing)) => *existing = value.clone(),
                None => layered.push((key.clone(), value.clone())),
            }
        }
    }

    let mut entries = Vec::with_capacity(layered.len());
    for (key, value) in layered {
        if !ENV_KEY.is_match(&key) {
            return Err(ConfigError::InvalidEnvironmentKey {
                function: function.to_string(),
                key,
            });
        }
        let Some(value) = classify(&value) else {
            return Err(ConfigError::InvalidEnvironmentValue {
                function: function.to_string(),
                key,
            });
        };
        entries.push((key, value));
    }
    Ok(EnvironmentMap { entries })
}

/// Strings and scalars are literals; objects must be pure template
/// expressions. Anything else is rejected.
fn classify(value: &Value) -> Option<EnvValue> {
    match value {
        Value::String(s) => Some(EnvValue::Literal(s.clone())),
        Value::Number(n) => Some(EnvValue::Literal(n.to_string())),
        Value::Bool(b) => Some(EnvValue::Literal(b.to_string())),
        Value::Object(map) if is_reference(map) => Some(EnvValue::Reference(map.clone())),
        _ => None,
    }
}

fn is_reference(map: &Map<String, Value>) -> bool {
    !map.is_empty() && map.keys().all(|k| k == "Ref" || k.starts_with("Fn::"))
}
