//! `tend list`: show what a recipe declares, without converging.

use anyhow::Result;
use colored::Colorize;

use crate::cli::ListArgs;
use crate::config::Config;
use crate::recipe;
use crate::Context;

pub fn run(_ctx: &Context, args: ListArgs) -> Result<()> {
    let config = Config::load()?;
    let path = config.recipe_path(args.recipe.as_deref());
    let collection = recipe::load(&path)?;

    println!("{} ({} resources)", path.display(), collection.len());
    for resource in collection.iter() {
        let actions: Vec<String> = resource.actions().iter().map(ToString::to_string).collect();
        println!(
            "  {} {}",
            resource.to_string().bold(),
            actions.join(", ").dimmed()
        );
    }
    Ok(())
}
