use super::{resolve_manifest, CommandOutput, Context};
use crate::cli::VerifyArgs;
use anyhow::Result;
use serde_json::json;

pub fn run(ctx: &mut Context, args: &VerifyArgs) -> Result<CommandOutput> {
    ctx.events.phase("resolve");
    let (resolved, hash) = resolve_manifest(&args.manifest)?;

    ctx.events.phase("verify");
    let report = engine::verify::run(&resolved.manifest.verify, &hash, &ctx.registry, &ctx.store)?;

    for result in &report.results {
        ctx.events.item(json!({
            "check": result.check,
            "pass": result.pass,
            "reason": result.reason,
        }));
    }

    if !ctx.quiet {
        println!("verify: {}/{} checks passed", report.pass, report.total);
        for result in report.results.iter().filter(|r| !r.pass) {
            println!(
                "  fail {}: {}",
                result.check,
                result.reason.as_deref().unwrap_or("no reason recorded")
            );
        }
    }

    let success = report.is_success();
    ctx.events.summary(json!({
        "total": report.total,
        "pass": report.pass,
        "fail": report.fail,
    }));

    Ok(CommandOutput {
        data: serde_json::to_value(&report)?,
        success,
    })
}
