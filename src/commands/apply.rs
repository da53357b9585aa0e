//! `tend apply`: converge the system toward the recipe.

use anyhow::{bail, Result};
use chrono::Local;
use colored::Colorize;
use dialoguer::Confirm;
use std::io::IsTerminal;
use std::path::Path;
use std::sync::Arc;

use convergence::{FailurePolicy, NodeFacts, RunContext, Runner};

use crate::cli::ApplyArgs;
use crate::config::Config;
use crate::formatter::ConsoleFormatter;
use crate::providers;
use crate::recipe;
use crate::shell::SystemShell;
use crate::Context;

pub fn run(ctx: &Context, args: ApplyArgs) -> Result<()> {
    converge(
        ctx,
        args.recipe.as_deref(),
        args.keep_going,
        args.dry_run,
        args.yes,
    )
}

/// Shared convergence driver for `apply` and `check`.
pub(crate) fn converge(
    ctx: &Context,
    recipe_override: Option<&Path>,
    keep_going: bool,
    why_run: bool,
    yes: bool,
) -> Result<()> {
    let config = Config::load()?;
    let path = config.recipe_path(recipe_override);
    let mut collection = recipe::load(&path)?;

    if collection.is_empty() {
        println!("{} declares no resources", path.display());
        return Ok(());
    }

    if !ctx.quiet {
        let mode = if why_run { "checking" } else { "applying" };
        println!(
            "{} {} ({} resources) at {}",
            mode.bold(),
            path.display(),
            collection.len(),
            Local::now().format("%Y-%m-%d %H:%M:%S")
        );
    }

    if !why_run && !yes && std::io::stdin().is_terminal() {
        let proceed = Confirm::new()
            .with_prompt(format!("Converge {} resources?", collection.len()))
            .default(true)
            .interact()?;
        if !proceed {
            println!("aborted");
            return Ok(());
        }
    }

    let registry = providers::default_registry(Arc::new(SystemShell));
    let mut run = RunContext::new(NodeFacts::local()).with_why_run(why_run);
    run.events.register(Box::new(ConsoleFormatter::new(why_run)));

    let policy = if keep_going || config.keep_going {
        FailurePolicy::Continue
    } else {
        FailurePolicy::Abort
    };

    let summary = Runner::new(&registry, &mut run)
        .with_policy(policy)
        .converge(&mut collection)?;

    if !ctx.quiet {
        let verb = if why_run { "would update" } else { "updated" };
        println!();
        println!(
            "{} {} {verb}, {} up to date, {} bypassed, {} failed",
            "done:".bold(),
            summary.updated,
            summary.up_to_date,
            summary.bypassed,
            summary.failed
        );
    }

    if !summary.is_success() {
        bail!("{} of {} resources failed", summary.failed, summary.total());
    }
    Ok(())
}
