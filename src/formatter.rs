//! Console event sink: renders lifecycle events as they happen.

use colored::Colorize;
use log::debug;

use convergence::{Action, EventSink, Resource};

/// Renders resource lifecycle events to the terminal.
pub struct ConsoleFormatter {
    why_run: bool,
}

impl ConsoleFormatter {
    pub fn new(why_run: bool) -> Self {
        Self { why_run }
    }
}

impl EventSink for ConsoleFormatter {
    fn resource_current_state_loaded(
        &mut self,
        resource: &Resource,
        action: Action,
        _current: Option<&Resource>,
    ) {
        debug!("loaded current state for {resource} ({action})");
    }

    fn resource_current_state_load_bypassed(&mut self, resource: &Resource, action: Action) {
        println!(
            "  {} {} ({}) current state not inspected (provider cannot simulate)",
            "!".yellow(),
            resource,
            action
        );
    }

    fn resource_bypassed(&mut self, resource: &Resource, action: Action) {
        println!(
            "  {} {} ({}) skipped: provider cannot simulate this action",
            "!".yellow(),
            resource,
            action
        );
    }

    fn resource_up_to_date(&mut self, resource: &Resource, action: Action) {
        println!("  {} {} ({}) up to date", "-".dimmed(), resource, action);
    }

    fn resource_updated(&mut self, resource: &Resource, action: Action) {
        if self.why_run {
            println!("  {} {} ({}) would be updated", "~".cyan(), resource, action);
        } else {
            println!("  {} {} ({}) updated", "✓".green(), resource, action);
        }
    }
}
