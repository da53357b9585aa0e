//! Message provider: emits a log line as a converged resource.
//!
//! Useful as a checkpoint inside a recipe. The resource counts as
//! updated whenever its level is enabled, so notifications keyed on it
//! fire exactly when the message was actually visible.

use anyhow::{bail, Result};
use log::Level;

use convergence::{Action, ActionTable, ConvergeContext, NodeFacts, Provider, Resource};

pub struct MessageProvider {
    handlers: ActionTable<Self>,
}

impl MessageProvider {
    pub fn new() -> Self {
        Self {
            handlers: ActionTable::new().on(Action::Write, Self::action_write),
        }
    }

    fn action_write(&mut self, cx: &mut ConvergeContext<'_>) -> Result<()> {
        let resource = cx.resource();
        let message = resource
            .property_str("message")
            .unwrap_or_else(|| resource.name())
            .to_string();

        let level = match resource.property_str("level").unwrap_or("info") {
            "trace" => Level::Trace,
            "debug" => Level::Debug,
            "info" => Level::Info,
            "warn" => Level::Warn,
            "error" => Level::Error,
            other => bail!("unknown message level `{other}`"),
        };

        log::log!(level, "{message}");
        if level <= log::max_level() {
            cx.resource_mut().mark_updated();
        }
        Ok(())
    }
}

impl Default for MessageProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl Provider for MessageProvider {
    fn name(&self) -> &'static str {
        "message"
    }

    fn whyrun_supported(&self) -> bool {
        true
    }

    // A log line has no observable prior state.
    fn load_current_resource(&mut self, _resource: &Resource, _node: &NodeFacts) -> Result<()> {
        Ok(())
    }

    fn run_handler(&mut self, action: Action, cx: &mut ConvergeContext<'_>) -> Result<()> {
        let handler = self.handlers.lookup(self.name(), action)?;
        handler(self, cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use convergence::{run_action, Outcome, ProviderRegistry, RunContext};
    use std::sync::Mutex;

    // The max log level is process-global; serialize the tests that
    // set it.
    static LEVEL_LOCK: Mutex<()> = Mutex::new(());

    fn converge(resource: &mut Resource) -> Result<Outcome> {
        let mut provider = MessageProvider::new();
        let mut run = RunContext::new(NodeFacts::local());
        let registry = ProviderRegistry::new();
        run_action(&mut provider, resource, Action::Write, &mut run, &registry)
    }

    #[test]
    fn test_write_marks_updated_when_level_enabled() {
        let _guard = LEVEL_LOCK.lock().unwrap();
        log::set_max_level(log::LevelFilter::Info);
        let mut resource = Resource::new("message", "checkpoint");
        resource.set_property("message", "phase one converged");
        assert_eq!(converge(&mut resource).unwrap(), Outcome::Updated);
    }

    #[test]
    fn test_write_is_up_to_date_when_level_filtered() {
        let _guard = LEVEL_LOCK.lock().unwrap();
        log::set_max_level(log::LevelFilter::Warn);
        let mut resource = Resource::new("message", "quiet");
        resource.set_property("level", "debug");
        assert_eq!(converge(&mut resource).unwrap(), Outcome::UpToDate);
    }

    #[test]
    fn test_unknown_level_is_an_error() {
        let mut resource = Resource::new("message", "bad");
        resource.set_property("level", "shout");
        let err = converge(&mut resource).unwrap_err();
        assert!(err.to_string().contains("shout"));
    }
}
