use super::{resolve_manifest, CommandOutput, Context};
use crate::cli::PlanArgs;
use anyhow::Result;
use engine::planner;
use serde_json::json;

pub fn run(ctx: &mut Context, args: &PlanArgs) -> Result<CommandOutput> {
    ctx.events.phase("resolve");
    let (resolved, hash) = resolve_manifest(&args.manifest)?;

    ctx.events.phase("plan");
    let plan = planner::generate(&resolved.manifest, &hash, &ctx.registry)?;

    plan.save(&args.out)?;
    ctx.events.artifact("plan", &args.out);

    let pending = plan.pending().count();
    if !ctx.quiet {
        println!(
            "plan: {} actions ({} pending) -> {}",
            plan.actions.len(),
            pending,
            args.out.display()
        );
        for action in &plan.actions {
            println!(
                "  {:?} {} ({})",
                action.decision, action.app_id, action.reason
            );
        }
    }

    ctx.events.summary(json!({
        "total": plan.actions.len(),
        "pending": pending,
    }));

    Ok(CommandOutput {
        data: json!({
            "out": args.out.display().to_string(),
            "plan": plan,
        }),
        success: true,
    })
}
