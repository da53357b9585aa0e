//! `tend check`: why-run pass that reports without touching anything.

use anyhow::Result;

use crate::cli::CheckArgs;
use crate::commands::apply;
use crate::Context;

pub fn run(ctx: &Context, args: CheckArgs) -> Result<()> {
    apply::converge(ctx, args.recipe.as_deref(), args.keep_going, true, true)
}
