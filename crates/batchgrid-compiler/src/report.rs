//! Human-readable compilation summary.

use std::collections::BTreeMap;

use crate::compile::CompileOutput;
use crate::phase::FunctionPhase;

pub fn format_report(service: &str, stage: &str, output: &CompileOutput) -> String {
    let mut out = String::new();

    out.push_str("\n╔══════════════════════════════════════════╗\n");
    out.push_str("║  batchgrid Compilation Summary           ║\n");
    out.push_str("╠══════════════════════════════════════════╣\n");
    out.push_str(&format!("║  Service:   {:<29}║\n", service));
    out.push_str(&format!("║  Stage:     {:<29}║\n", stage));
    out.push_str(&format!("║  Resources: {:<29}║\n", output.resources.len()));
    out.push_str("╚══════════════════════════════════════════╝\n\n");

    let mut kinds: BTreeMap<&str, usize> = BTreeMap::new();
    for (_, definition) in output.resources.iter() {
        *kinds.entry(definition.kind.as_str()).or_default() += 1;
    }
    out.push_str("Resources by type:\n");
    for (kind, count) in &kinds {
        out.push_str(&format!("  {count:>3}  {kind}\n"));
    }
    out.push('\n');

    let substituted = output
        .functions
        .iter()
        .filter(|f| f.phase == FunctionPhase::ShimSubstituted)
        .count();
    out.push_str(&format!(
        "Functions ({} total, {substituted} moved to batch):\n",
        output.functions.len()
    ));
    for function in &output.functions {
        let marker = match function.phase {
            FunctionPhase::ShimSubstituted => "✅",
            FunctionPhase::Failed => "❌",
            _ => "·",
        };
        out.push_str(&format!(
            "  {marker} {:<30} {}\n",
            function.name,
            function.phase.label()
        ));
    }

    if !output.artifacts.is_empty() {
        out.push_str("\nSubmit-job bundles:\n");
        for artifact in &output.artifacts {
            out.push_str(&format!(
                "  • {} → {}/{}\n",
                artifact.function, artifact.artifact_dir, artifact.handler_file
            ));
        }
    }

    out
}
