use super::{resolve_manifest, CommandOutput, Context};
use crate::cli::{ApplyArgs, ManifestArgs};
use anyhow::{bail, Result};
use engine::{planner, ApplyOptions, Plan};
use manifest::Manifest;
use serde_json::json;
use std::path::PathBuf;

pub fn run(ctx: &mut Context, args: &ApplyArgs) -> Result<CommandOutput> {
    ctx.events.phase("resolve");

    // Either a fresh plan from a manifest, or a frozen plan file. A
    // frozen plan carries no restore entries, so the restore phase needs
    // the manifest route.
    let (plan, manifest, manifest_path, manifest_dir) = match (&args.manifest, &args.plan) {
        (Some(manifest_file), None) => {
            let manifest_args = ManifestArgs {
                manifest: manifest_file.clone(),
                manifests_root: args.manifests_root.clone(),
                catalog: args.catalog.clone(),
            };
            let (resolved, hash) = resolve_manifest(&manifest_args)?;
            let plan = planner::generate(&resolved.manifest, &hash, &ctx.registry)?;
            (plan, resolved.manifest, resolved.root_path, resolved.base_dir)
        }
        (None, Some(plan_file)) => {
            if args.enable_restore {
                bail!("--enable-restore needs --manifest; a plan file carries no restore entries");
            }
            let plan = Plan::load(plan_file)?;
            let dir = plan_file
                .parent()
                .map_or_else(|| PathBuf::from("."), std::path::Path::to_path_buf);
            (plan, Manifest::default(), plan_file.clone(), dir)
        }
        // clap enforces exactly one of the two
        _ => bail!("exactly one of --manifest or --plan is required"),
    };

    ctx.events.phase("apply");
    let options = ApplyOptions {
        dry_run: args.dry_run,
        enable_restore: args.enable_restore,
        jobs: args.jobs,
        export_root: args.export_root.clone(),
    };
    let report = engine::apply(
        &plan,
        &manifest,
        &manifest_path,
        &manifest_dir,
        &ctx.registry,
        &ctx.store,
        &ctx.run_id,
        &options,
    )?;

    for item in &report.items {
        ctx.events.item(json!({
            "appId": item.app_id,
            "driver": item.driver,
            "status": item.status,
            "error": item.error,
        }));
    }

    if !ctx.quiet {
        let mode = if report.dry_run { " (dry run)" } else { "" };
        println!(
            "apply{mode}: {} total, {} installed, {} upgraded, {} already installed, {} skipped, {} failed",
            report.counts.total,
            report.counts.installed,
            report.counts.upgraded,
            report.counts.already_installed,
            report.counts.skipped,
            report.counts.failed,
        );
        for item in report.items.iter().filter(|i| i.error.is_some()) {
            println!(
                "  failed {}: {}",
                item.app_id,
                item.error.as_deref().unwrap_or_default()
            );
        }
        if let Some(restore) = &report.restore {
            println!(
                "restore: {} entries, {} restored, {} skipped, {} failed",
                restore.total, restore.restored, restore.skipped, restore.failed
            );
        }
    }

    let success = report.is_success();
    ctx.events.summary(json!({
        "counts": report.counts,
        "restore": report.restore,
        "success": success,
    }));

    Ok(CommandOutput {
        data: serde_json::to_value(&report)?,
        success,
    })
}
