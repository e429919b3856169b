pub mod compile;
pub mod dockerfile;
pub mod validate;

use anyhow::Context;
use batchgrid_core::ServiceConfig;
use std::path::Path;

pub(crate) fn load(config: &str) -> anyhow::Result<ServiceConfig> {
    ServiceConfig::from_file(Path::new(config))
        .with_context(|| format!("Failed to load {config}"))
}
