use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "forja")]
#[command(version)]
#[command(about = "Declarative machine provisioning", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Emit a machine-readable JSON envelope on stdout
    #[arg(long, global = true)]
    pub json: bool,

    /// Stream NDJSON progress events to a file, or '-' for stderr
    #[arg(long, global = true, value_name = "PATH")]
    pub events: Option<String>,

    /// State directory (defaults to the platform data dir)
    #[arg(long, global = true, value_name = "DIR")]
    pub state_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Resolve a manifest and write the action plan
    Plan(PlanArgs),

    /// Converge the machine to a manifest or a saved plan
    Apply(ApplyArgs),

    /// Run the manifest's verify checks against this host
    Verify(VerifyArgs),

    /// Compare desired state against installed inventory and the last run
    Drift(DriftArgs),

    /// Run only the configuration-restore phase of a manifest
    Restore(RestoreArgs),

    /// Undo a restore run from its journal
    Revert(RevertArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

// ============================================================================
// Shared manifest-resolution flags
// ============================================================================

#[derive(Parser)]
pub struct ManifestArgs {
    /// Manifest file (.jsonc, .json, .yaml, .yml or .zip bundle)
    #[arg(short, long, value_name = "FILE")]
    pub manifest: PathBuf,

    /// Directory searched for bare include names
    #[arg(long, value_name = "DIR")]
    pub manifests_root: Option<PathBuf>,

    /// Config-module catalog file
    #[arg(long, value_name = "FILE")]
    pub catalog: Option<PathBuf>,
}

// ============================================================================
// Per-command arguments
// ============================================================================

#[derive(Parser)]
pub struct PlanArgs {
    #[command(flatten)]
    pub manifest: ManifestArgs,

    /// Where to write the plan file
    #[arg(short, long, value_name = "FILE", default_value = "forja-plan.json")]
    pub out: PathBuf,
}

#[derive(Parser)]
pub struct ApplyArgs {
    /// Manifest file; mutually exclusive with --plan
    #[arg(
        short,
        long,
        value_name = "FILE",
        conflicts_with = "plan",
        required_unless_present = "plan"
    )]
    pub manifest: Option<PathBuf>,

    /// Pre-generated plan file; mutually exclusive with --manifest
    #[arg(short, long, value_name = "FILE")]
    pub plan: Option<PathBuf>,

    /// Directory searched for bare include names
    #[arg(long, value_name = "DIR")]
    pub manifests_root: Option<PathBuf>,

    /// Config-module catalog file
    #[arg(long, value_name = "FILE")]
    pub catalog: Option<PathBuf>,

    /// Show what would be done without touching the machine
    #[arg(short, long)]
    pub dry_run: bool,

    /// Run the configuration-restore phase after installation
    #[arg(long)]
    pub enable_restore: bool,

    /// Root directory restore sources are resolved against
    #[arg(long, value_name = "DIR")]
    pub export_root: Option<PathBuf>,

    /// Number of parallel install jobs
    #[arg(short, long, default_value = "4")]
    pub jobs: usize,
}

#[derive(Parser)]
pub struct VerifyArgs {
    #[command(flatten)]
    pub manifest: ManifestArgs,
}

#[derive(Parser)]
pub struct DriftArgs {
    #[command(flatten)]
    pub manifest: ManifestArgs,
}

#[derive(Parser)]
pub struct RestoreArgs {
    #[command(flatten)]
    pub manifest: ManifestArgs,

    /// Show what would be restored without touching the machine
    #[arg(short, long)]
    pub dry_run: bool,

    /// Root directory restore sources are resolved against
    #[arg(long, value_name = "DIR")]
    pub export_root: Option<PathBuf>,
}

#[derive(Parser)]
pub struct RevertArgs {
    /// Run id whose journal to revert; defaults to the latest journal
    #[arg(long, value_name = "RUN_ID")]
    pub run_id: Option<String>,

    /// Show what would be reverted without touching the machine
    #[arg(short, long)]
    pub dry_run: bool,
}
