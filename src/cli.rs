use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Resumable journal for file rename and rewrite operations.
#[derive(Parser)]
#[command(name = "opjournal", version, about, long_about = None)]
pub struct Cli {
    /// Log debug output to stderr (RUST_LOG overrides).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Print JSON Schema for manifests.
    Schema,
    /// Start or resume the run described by a manifest.
    Apply(ApplyArgs),
    /// Show how far a run has progressed.
    Status(StatusArgs),
}

#[derive(Args)]
pub struct ApplyArgs {
    /// Path to manifest JSON file.
    #[arg(long, required = true)]
    pub manifest: PathBuf,

    /// Check the next step and print the plan without running anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Stop after this many steps.
    #[arg(long)]
    pub max_steps: Option<usize>,

    /// Output structured JSON to stdout.
    #[arg(long)]
    pub json: bool,

    /// Remove a lock file left behind by a killed process before starting.
    #[arg(long)]
    pub break_lock: bool,
}

#[derive(Args)]
pub struct StatusArgs {
    /// Directory holding the journal files.
    #[arg(long, required = true)]
    pub state_dir: PathBuf,

    /// Run identifier.
    #[arg(long, required = true)]
    pub id: String,

    /// Output structured JSON to stdout.
    #[arg(long)]
    pub json: bool,
}
