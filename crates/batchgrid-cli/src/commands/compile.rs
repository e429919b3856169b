use anyhow::Context;
use batchgrid_compiler::{CompileOptions, CompileOutput, compile as compile_service};
use clap::ValueEnum;
use serde_json::{Value, json};
use std::fs;
use std::path::Path;

pub const RESOURCES_FILE: &str = "resources.json";
pub const FUNCTIONS_FILE: &str = "functions.json";
pub const TEMPLATE_FILE: &str = "template.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

pub struct CompileArgs {
    pub config: String,
    pub out: String,
    pub template: Option<String>,
    pub format: OutputFormat,
    pub pool_suffix: Option<u32>,
}

pub fn compile(args: &CompileArgs) -> anyhow::Result<()> {
    let config = super::load(&args.config)?;
    let options = CompileOptions {
        pool_suffix: args.pool_suffix,
    };
    let output = compile_service(&config, &options)
        .with_context(|| format!("Failed to compile {}", args.config))?;

    // Everything that can fail on input is done before the first write.
    let template = args
        .template
        .as_deref()
        .map(|path| merged_template(path, &output))
        .transpose()?;
    let resources = serde_json::to_value(&output.resources)?;
    let functions = functions_document(&output)?;
    batchgrid_pack::check_requests(&output.artifacts)?;

    let out_dir = Path::new(&args.out);
    fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create {}", out_dir.display()))?;
    write_json(&out_dir.join(RESOURCES_FILE), &resources)?;
    write_json(&out_dir.join(FUNCTIONS_FILE), &functions)?;
    if let Some(template) = &template {
        write_json(&out_dir.join(TEMPLATE_FILE), template)?;
    }
    let bundles = batchgrid_pack::fulfil(&output.artifacts, out_dir)?;

    match args.format {
        OutputFormat::Json => {
            let summary = json!({
                "service": config.service,
                "stage": config.provider.stage,
                "resources": output.resources.len(),
                "pool_suffix": output.pool_suffix,
                "functions": output.functions,
                "bundles": bundles.iter().map(|b| json!({
                    "function": b.function,
                    "path": b.output_path.display().to_string(),
                    "size_bytes": b.size_bytes,
                    "sha256": b.sha256,
                })).collect::<Vec<_>>(),
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        OutputFormat::Text => {
            println!(
                "{}",
                batchgrid_compiler::report::format_report(
                    &config.service,
                    &config.provider.stage,
                    &output
                )
            );
            println!("✓ Wrote {}", out_dir.display());
        }
    }

    Ok(())
}

fn merged_template(path: &str, output: &CompileOutput) -> anyhow::Result<Value> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read {path}"))?;
    let mut template: Value =
        serde_json::from_str(&content).with_context(|| format!("{path} is not valid JSON"))?;
    output
        .resources
        .merge_into(&mut template)
        .with_context(|| format!("Failed to merge into {path}"))?;
    Ok(template)
}

/// Replacement specs keyed by function name, plus the phase of every input
/// function.
fn functions_document(output: &CompileOutput) -> anyhow::Result<Value> {
    let mut replacements = serde_json::Map::new();
    for substitution in &output.substitutions {
        replacements.insert(
            substitution.original.clone(),
            serde_json::to_value(&substitution.replacement)?,
        );
    }
    Ok(json!({
        "replacements": replacements,
        "phases": output.functions,
    }))
}

fn write_json(path: &Path, value: &Value) -> anyhow::Result<()> {
    let text = serde_json::to_string_pretty(value)?;
    fs::write(path, text).with_context(|| format!("Failed to write {}", path.display()))
}
