use super::{resolve_manifest, CommandOutput, Context};
use crate::cli::RestoreArgs;
use anyhow::Result;
use restore::RestoreOptions;
use serde_json::json;

pub fn run(ctx: &mut Context, args: &RestoreArgs) -> Result<CommandOutput> {
    ctx.events.phase("resolve");
    let (resolved, _hash) = resolve_manifest(&args.manifest)?;

    ctx.events.phase("restore");
    let options = RestoreOptions {
        dry_run: args.dry_run,
        export_root: args.export_root.clone(),
    };
    let journal = restore::run(
        &resolved.manifest.restore,
        &resolved.root_path,
        &resolved.base_dir,
        &ctx.run_id,
        &ctx.store,
        &options,
    )?;

    for entry in &journal.entries {
        ctx.events.item(json!({
            "target": entry.target,
            "action": entry.action,
            "error": entry.error,
            "warning": entry.warning,
        }));
    }
    if !args.dry_run {
        ctx.events
            .artifact("journal", &ctx.store.journal_file(&ctx.run_id));
    }

    let restored = journal.restored();
    let failed = journal.failed();
    if !ctx.quiet {
        let mode = if args.dry_run { " (dry run)" } else { "" };
        println!(
            "restore{mode}: {} entries, {restored} restored, {failed} failed",
            journal.entries.len()
        );
        for entry in &journal.entries {
            if let Some(warning) = &entry.warning {
                println!("  warning {}: {warning}", entry.target);
            }
            if let Some(error) = &entry.error {
                println!("  failed {}: {error}", entry.target);
            }
        }
    }

    ctx.events.summary(json!({
        "total": journal.entries.len(),
        "restored": restored,
        "failed": failed,
    }));

    Ok(CommandOutput {
        data: serde_json::to_value(&journal)?,
        success: failed == 0,
    })
}
