use anyhow::Context;
use batchgrid_core::JobKind;

pub fn validate(config: &str) -> anyhow::Result<()> {
    let service = super::load(config)?;
    service
        .validate()
        .with_context(|| format!("{config} is invalid"))?;

    let annotated = service
        .functions
        .iter()
        .filter(|f| matches!(f.job, JobKind::Annotated(_)))
        .count();
    tracing::info!(service = %service.service, annotated, "configuration is valid");
    println!(
        "✓ {config}: {} functions, {annotated} batch-annotated",
        service.functions.len()
    );
    Ok(())
}
