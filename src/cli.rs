use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "tend")]
#[command(version)]
#[command(about = "Converge a machine toward a declared recipe", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Converge the system toward the recipe
    Apply(ApplyArgs),

    /// Dry run: report what apply would change
    Check(CheckArgs),

    /// List the resources a recipe declares
    List(ListArgs),
}

#[derive(Parser)]
pub struct ApplyArgs {
    /// Recipe file (defaults to the configured recipe)
    #[arg(short, long)]
    pub recipe: Option<PathBuf>,

    /// Keep converging remaining resources after a failure
    #[arg(short, long)]
    pub keep_going: bool,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Dry run - show what would be done
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Parser)]
pub struct CheckArgs {
    /// Recipe file (defaults to the configured recipe)
    #[arg(short, long)]
    pub recipe: Option<PathBuf>,

    /// Keep checking remaining resources after a failure
    #[arg(short, long)]
    pub keep_going: bool,
}

#[derive(Parser)]
pub struct ListArgs {
    /// Recipe file (defaults to the configured recipe)
    #[arg(short, long)]
    pub recipe: Option<PathBuf>,
}
