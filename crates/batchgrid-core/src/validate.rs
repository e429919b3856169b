//! Provider-level validation, run before anything is synthesized.

use std::collections::HashSet;

use crate::config::{ComputePoolOverrides, ServiceConfig};
use crate::error::{CompileResult, ConfigError};

impl ServiceConfig {
    /// Check everything that must hold before a single resource is built:
    /// identity fields, network placement, and function names.
    pub fn validate(&self) -> CompileResult<()> {
        if self.service.trim().is_empty() {
            return Err(ConfigError::MissingProviderField("service"));
        }
        if self.provider.region.trim().is_empty() {
            return Err(ConfigError::MissingProviderField("region"));
        }
        if self.provider.stage.trim().is_empty() {
            return Err(ConfigError::MissingProviderField("stage"));
        }

        validate_network(self.provider.batch.as_ref())?;

        let mut seen = HashSet::new();
        for (position, function) in self.functions.iter().enumerate() {
            if function.name.trim().is_empty() {
                return Err(ConfigError::EmptyFunctionName(position));
            }
            if !seen.insert(function.name.as_str()) {
                return Err(ConfigError::DuplicateFunction(function.name.clone()));
            }
        }

        Ok(())
    }
}

/// Both subnets and security groups must be present and non-empty.
fn validate_network(batch: Option<&ComputePoolOverrides>) -> CompileResult<()> {
    let groups = batch.and_then(|b| b.security_group_ids.as_ref());
    if groups.is_none_or(|g| g.is_empty()) {
        return Err(ConfigError::MissingNetworkField("SecurityGroupIds"));
    }
    let subnets = batch.and_then(|b| b.subnets.as_ref());
    if subnets.is_none_or(|s| s.is_empty()) {
        return Err(ConfigError::MissingNetworkField("Subnets"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderConfig;
    use crate::function::FunctionSpec;
    use serde_json::json;

    fn valid_config() -> ServiceConfig {
        ServiceConfig {
            service: "svc".into(),
            provider: ProviderConfig {
                region: "us-east-1".into(),
                stage: "dev".into(),
                batch: Some(ComputePoolOverrides {
                    subnets: Some(vec![json!("subnet-1")]),
                    security_group_ids: Some(vec![json!("sg-1")]),
                    ..Default::default()
                }),
                ..Default::default()
            },
            functions: vec![FunctionSpec::new("a", "handler.a")],
            custom: Default::default(),
        }
    }

    #[test]
    fn valid_config_passes() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn missing_identity_fields_are_named() {
        let mut config = valid_config();
        config.service.clear();
        assert_eq!(config.validate(), Err(ConfigError::MissingProviderField("service")));

        let mut config = valid_config();
        config.provider.stage = "  ".into();
        assert_eq!(config.validate(), Err(ConfigError::MissingProviderField("stage")));
    }

    #[test]
    fn missing_both_network_fields_fails() {
        let mut config = valid_config();
        config.provider.batch = Some(ComputePoolOverrides::default());
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingNetworkField(_))
        ));

        config.provider.batch = None;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingNetworkField(_))
        ));
    }

    #[test]
    fn missing_one_network_field_fails() {
        let mut config = valid_config();
        if let Some(batch) = config.provider.batch.as_mut() {
            batch.subnets = None;
        }
        assert_eq!(config.validate(), Err(ConfigError::MissingNetworkField("Subnets")));

        let mut config = valid_config();
        if let Some(batch) = config.provider.batch.as_mut() {
            batch.security_group_ids = Some(vec![]);
        }
        assert_eq!(
            config.validate(),
            Err(ConfigError::MissingNetworkField("SecurityGroupIds"))
        );
    }

    #[test]
    fn duplicate_and_empty_function_names_fail() {
        let mut config = valid_config();
        config.functions.push(FunctionSpec::new("a", "handler.other"));
        assert_eq!(config.validate(), Err(ConfigError::DuplicateFunction("a".into())));

        let mut config = valid_config();
        config.functions.push(FunctionSpec::new("", "handler.other"));
        assert_eq!(config.validate(), Err(ConfigError::EmptyFunctionName(1)));
    }
}
