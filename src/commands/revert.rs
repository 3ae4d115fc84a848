use super::{CommandOutput, Context};
use crate::cli::RevertArgs;
use anyhow::{bail, Result};
use restore::{latest_journal, RestoreJournal};
use serde_json::json;

pub fn run(ctx: &mut Context, args: &RevertArgs) -> Result<CommandOutput> {
    ctx.events.phase("revert");

    let journal_path = match &args.run_id {
        Some(run_id) => ctx.store.journal_file(run_id),
        None => match latest_journal(&ctx.store.journals_dir())? {
            Some(path) => path,
            None => bail!("no restore journals found under {}", ctx.store.journals_dir().display()),
        },
    };

    let journal = RestoreJournal::load(&journal_path)?;
    log::info!(
        "reverting journal {} ({} entries)",
        journal_path.display(),
        journal.entries.len()
    );

    let summary = restore::revert(&journal, args.dry_run)?;

    if !ctx.quiet {
        let mode = if args.dry_run { " (dry run)" } else { "" };
        println!(
            "revert{mode}: {} backups restored, {} removed, {} skipped, {} failed",
            summary.restored_backups, summary.removed, summary.skipped, summary.failed
        );
    }

    ctx.events.summary(json!({
        "runId": journal.run_id,
        "restoredBackups": summary.restored_backups,
        "removed": summary.removed,
        "skipped": summary.skipped,
        "failed": summary.failed,
    }));

    Ok(CommandOutput {
        data: json!({
            "runId": journal.run_id,
            "summary": summary,
        }),
        success: summary.failed == 0,
    })
}
