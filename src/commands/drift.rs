use super::{resolve_manifest, CommandOutput, Context};
use crate::cli::DriftArgs;
use anyhow::Result;
use serde_json::json;

pub fn run(ctx: &mut Context, args: &DriftArgs) -> Result<CommandOutput> {
    ctx.events.phase("resolve");
    let (resolved, hash) = resolve_manifest(&args.manifest)?;

    ctx.events.phase("drift");
    let last_hash = ctx
        .store
        .load()?
        .last_applied
        .map(|applied| applied.manifest_hash);
    let report = engine::drift(&resolved.manifest, &hash, last_hash.as_deref(), &ctx.registry)?;

    if !ctx.quiet {
        if report.is_clean() {
            println!("drift: clean");
        } else {
            if report.manifest_changed {
                println!("drift: manifest changed since last apply");
            }
            for id in &report.missing {
                println!("  missing {id}");
            }
            for id in &report.extra {
                println!("  extra {id}");
            }
            for mismatch in &report.version_mismatches {
                println!(
                    "  version {}: installed {}, wanted {}",
                    mismatch.id, mismatch.installed, mismatch.constraint
                );
            }
        }
    }

    ctx.events.summary(json!({
        "clean": report.is_clean(),
        "missing": report.missing.len(),
        "extra": report.extra.len(),
        "versionMismatches": report.version_mismatches.len(),
    }));

    // Drift is a query: finding drift is a successful answer, not a
    // failed run.
    Ok(CommandOutput {
        data: serde_json::to_value(&report)?,
        success: true,
    })
}
