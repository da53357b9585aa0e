//! Lifecycle event fan-out.
//!
//! The engine emits events at fixed points of the convergence state
//! machine and does not interpret them; formatters, loggers, and audit
//! trails subscribe through the dispatcher.

use crate::resource::Resource;
use crate::types::Action;

/// Receiver for resource lifecycle events.
///
/// Every method defaults to a no-op, so a sink implements only the
/// events it renders.
pub trait EventSink {
    /// Current state was inspected and loaded for `resource`.
    fn resource_current_state_loaded(
        &mut self,
        _resource: &Resource,
        _action: Action,
        _current: Option<&Resource>,
    ) {
    }

    /// Current-state loading was skipped: why-run mode with a provider
    /// whose inspection may have side effects.
    fn resource_current_state_load_bypassed(&mut self, _resource: &Resource, _action: Action) {}

    /// The action was not executed: why-run mode with a provider that
    /// cannot simulate.
    fn resource_bypassed(&mut self, _resource: &Resource, _action: Action) {}

    /// The resource already matched its declared state.
    fn resource_up_to_date(&mut self, _resource: &Resource, _action: Action) {}

    /// The resource was (or, in why-run mode, would be) updated.
    fn resource_updated(&mut self, _resource: &Resource, _action: Action) {}
}

/// Sink that ignores every event.
pub struct NullSink;

impl EventSink for NullSink {}

/// Fan-out dispatcher the run context owns.
#[derive(Default)]
pub struct EventDispatcher {
    sinks: Vec<Box<dyn EventSink>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe a sink. Sinks are notified in registration order.
    pub fn register(&mut self, sink: Box<dyn EventSink>) {
        self.sinks.push(sink);
    }

    pub fn resource_current_state_loaded(
        &mut self,
        resource: &Resource,
        action: Action,
        current: Option<&Resource>,
    ) {
        for sink in &mut self.sinks {
            sink.resource_current_state_loaded(resource, action, current);
        }
    }

    pub fn resource_current_state_load_bypassed(&mut self, resource: &Resource, action: Action) {
        for sink in &mut self.sinks {
            sink.resource_current_state_load_bypassed(resource, action);
        }
    }

    pub fn resource_bypassed(&mut self, resource: &Resource, action: Action) {
        for sink in &mut self.sinks {
            sink.resource_bypassed(resource, action);
        }
    }

    pub fn resource_up_to_date(&mut self, resource: &Resource, action: Action) {
        for sink in &mut self.sinks {
            sink.resource_up_to_date(resource, action);
        }
    }

    pub fn resource_updated(&mut self, resource: &Resource, action: Action) {
        for sink in &mut self.sinks {
            sink.resource_updated(resource, action);
        }
    }
}
