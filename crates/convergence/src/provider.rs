//! Provider contract and the convergence state machine.
//!
//! A provider is the executable strategy for one resource type: it
//! inspects current state, asserts preconditions, and declares the
//! side effects needed to reach the declared state. The state machine
//! itself lives in [`run_action`] and is identical for every provider.

use anyhow::Result;
use log::debug;

use crate::context::{NodeFacts, RunContext};
use crate::converge::ConvergeLog;
use crate::error::ConvergeError;
use crate::registry::ProviderRegistry;
use crate::requirements::{RequirementSet, Scope};
use crate::resource::{Resource, ResourceCollection};
use crate::runner::Runner;
use crate::types::{Action, Outcome};

/// Capability interface a concrete provider implements.
///
/// The core invariant: `load_current_resource` builds observed state
/// from direct system inspection, never from the declared state, and a
/// provider mutates only its own current resource and the system
/// outside the process, never another resource's object.
pub trait Provider {
    /// Short name used in diagnostics.
    fn name(&self) -> &'static str;

    /// Whether this provider's handlers are safe to run in why-run
    /// mode: all side effects go through the converge log, so the
    /// provider self-simulates.
    fn whyrun_supported(&self) -> bool {
        false
    }

    /// Inspect the system and build the current resource.
    ///
    /// The default signals a programming error in the provider. A
    /// trivial `Ok(())` is a valid override for resources with no
    /// observable state.
    fn load_current_resource(&mut self, _resource: &Resource, _node: &NodeFacts) -> Result<()> {
        Err(ConvergeError::UnimplementedHook {
            provider: self.name(),
            hook: "load_current_resource",
        }
        .into())
    }

    /// The observed state built by `load_current_resource`, if any.
    fn current_resource(&self) -> Option<&Resource> {
        None
    }

    /// Hook for registering preconditions; always invoked before the
    /// requirement passes run.
    fn define_resource_requirements(
        &mut self,
        _action: Action,
        _requirements: &mut RequirementSet,
        _resource: &Resource,
    ) {
    }

    /// Dispatch one action handler. A missing handler must surface as
    /// [`ConvergeError::UnsupportedAction`]; concrete providers keep an
    /// [`ActionTable`] for this.
    fn run_handler(&mut self, action: Action, cx: &mut ConvergeContext<'_>) -> Result<()>;

    /// Release anything acquired during convergence (temp files and
    /// the like). Runs after status resolution.
    fn cleanup(&mut self) {}
}

impl std::fmt::Debug for dyn Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Provider").field("name", &self.name()).finish()
    }
}

/// Handler function for one action of a concrete provider type.
pub type Handler<P> = fn(&mut P, &mut ConvergeContext<'_>) -> Result<()>;

/// Table mapping actions to handler functions, built per provider
/// type at construction.
///
/// Registration is explicit, so the set of supported actions is
/// inspectable and a missing handler is a checked error instead of a
/// late dispatch failure.
pub struct ActionTable<P: ?Sized> {
    handlers: Vec<(Action, Handler<P>)>,
}

impl<P: ?Sized> ActionTable<P> {
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    /// Register a handler for `action`.
    pub fn on(mut self, action: Action, handler: Handler<P>) -> Self {
        self.handlers.push((action, handler));
        self
    }

    pub fn supports(&self, action: Action) -> bool {
        self.handlers.iter().any(|(a, _)| *a == action)
    }

    /// Resolve the handler for `action`, or a checked unsupported-
    /// action error naming the resource type.
    pub fn lookup(
        &self,
        resource_type: &str,
        action: Action,
    ) -> Result<Handler<P>, ConvergeError> {
        self.handlers
            .iter()
            .find(|(a, _)| *a == action)
            .map(|(_, handler)| *handler)
            .ok_or_else(|| ConvergeError::UnsupportedAction {
                resource_type: resource_type.to_string(),
                action: action.to_string(),
            })
    }
}

impl<P: ?Sized> Default for ActionTable<P> {
    fn default() -> Self {
        Self::new()
    }
}

/// Context handed to an action handler while it executes.
///
/// `converge_by` is the single path for declaring side effects; the
/// handler never mutates the system outside a converge-log entry.
pub struct ConvergeContext<'a> {
    resource: &'a mut Resource,
    action: Action,
    log: &'a mut ConvergeLog,
    run: &'a mut RunContext,
    registry: &'a ProviderRegistry,
}

impl ConvergeContext<'_> {
    /// The declared (desired-state) resource.
    pub fn resource(&self) -> &Resource {
        self.resource
    }

    /// Mutable access to the declared resource, for handlers that set
    /// the updated flag directly.
    pub fn resource_mut(&mut self) -> &mut Resource {
        self.resource
    }

    /// The action currently being converged.
    pub fn action(&self) -> Action {
        self.action
    }

    pub fn node(&self) -> &NodeFacts {
        &self.run.node
    }

    pub fn why_run(&self) -> bool {
        self.run.why_run
    }

    /// Declare one described, idempotent mutating step. In why-run
    /// mode the step is recorded but never performed.
    pub fn converge_by(
        &mut self,
        description: impl Into<String>,
        work: impl FnOnce() -> Result<()>,
    ) -> Result<()> {
        self.log.add_action(description, work)
    }

    /// Evaluate an embedded block of resources as a nested
    /// convergence.
    ///
    /// The block populates a fresh child collection, which a full
    /// runner pass converges against the same node, events, and
    /// why-run mode. The parent collection is never touched, so the
    /// parent context survives every exit path, errors included. The
    /// outer resource counts as updated iff the nested run updated
    /// anything.
    pub fn recipe_eval(
        &mut self,
        description: impl Into<String>,
        build: impl FnOnce(&mut ResourceCollection) -> Result<()>,
    ) -> Result<()> {
        let mut collection = ResourceCollection::new();
        build(&mut collection)?;
        let summary = Runner::new(self.registry, self.run).converge(&mut collection)?;
        if summary.has_updates() {
            self.log.record(description);
        }
        Ok(())
    }
}

/// Drive the convergence state machine for one resource/action pair.
///
/// Stages, in order: load current state (or record the bypass),
/// evaluate requirements, execute or bypass the handler, resolve
/// updated status, clean up. Any error aborts the remaining stages for
/// this resource and propagates to the caller; nothing here retries
/// or rolls back.
pub fn run_action(
    provider: &mut dyn Provider,
    resource: &mut Resource,
    action: Action,
    run: &mut RunContext,
    registry: &ProviderRegistry,
) -> Result<Outcome> {
    let why_run = run.why_run;
    let supported = provider.whyrun_supported();

    // Providers from outside the tree may have unsafe inspection side
    // effects; their loading is skipped during a dry pass.
    if !why_run || supported {
        provider.load_current_resource(resource, &run.node)?;
        run.events
            .resource_current_state_loaded(resource, action, provider.current_resource());
    } else {
        run.events
            .resource_current_state_load_bypassed(resource, action);
    }

    let mut requirements = RequirementSet::new(resource.to_string(), why_run);
    provider.define_resource_requirements(action, &mut requirements, resource);
    // The explicit no-op skips the all-actions bucket; its own bucket
    // still runs.
    if action != Action::Nothing {
        requirements.run(Scope::AllActions)?;
    }
    requirements.run(Scope::Action(action))?;

    let mut log = ConvergeLog::new(why_run);
    let mut bypassed = false;
    if supported && !requirements.action_blocked(action) {
        // Why-run-aware providers self-simulate, so the handler runs
        // in both modes.
        execute(provider, resource, action, &mut log, run, registry)?;
    } else if why_run {
        run.events.resource_bypassed(resource, action);
        bypassed = true;
    } else {
        execute(provider, resource, action, &mut log, run, registry)?;
    }

    let outcome = if bypassed {
        Outcome::Bypassed
    } else if !log.is_empty() || resource.updated_by_last_action() {
        run.events.resource_updated(resource, action);
        resource.mark_updated();
        Outcome::Updated
    } else {
        run.events.resource_up_to_date(resource, action);
        Outcome::UpToDate
    };

    provider.cleanup();
    Ok(outcome)
}

fn execute(
    provider: &mut dyn Provider,
    resource: &mut Resource,
    action: Action,
    log: &mut ConvergeLog,
    run: &mut RunContext,
    registry: &ProviderRegistry,
) -> Result<()> {
    if action == Action::Nothing {
        debug!("doing nothing for {resource}");
        return Ok(());
    }
    let mut cx = ConvergeContext {
        resource,
        action,
        log,
        run,
        registry,
    };
    provider.run_handler(action, &mut cx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::NodeFacts;
    use crate::events::EventSink;
    use crate::registry::PlatformSupport;
    use std::cell::Cell;
    use std::rc::Rc;

    /// Counters shared between a test provider and the assertions.
    #[derive(Clone, Default)]
    struct Probe {
        handler_calls: Rc<Cell<u32>>,
        work_calls: Rc<Cell<u32>>,
        cleanup_calls: Rc<Cell<u32>>,
    }

    /// Records which terminal events fired.
    #[derive(Clone, Default)]
    struct EventLog {
        loaded: Rc<Cell<u32>>,
        load_bypassed: Rc<Cell<u32>>,
        bypassed: Rc<Cell<u32>>,
        up_to_date: Rc<Cell<u32>>,
        updated: Rc<Cell<u32>>,
    }

    impl EventSink for EventLog {
        fn resource_current_state_loaded(
            &mut self,
            _resource: &Resource,
            _action: Action,
            _current: Option<&Resource>,
        ) {
            self.loaded.set(self.loaded.get() + 1);
        }

        fn resource_current_state_load_bypassed(&mut self, _resource: &Resource, _action: Action) {
            self.load_bypassed.set(self.load_bypassed.get() + 1);
        }

        fn resource_bypassed(&mut self, _resource: &Resource, _action: Action) {
            self.bypassed.set(self.bypassed.get() + 1);
        }

        fn resource_up_to_date(&mut self, _resource: &Resource, _action: Action) {
            self.up_to_date.set(self.up_to_date.get() + 1);
        }

        fn resource_updated(&mut self, _resource: &Resource, _action: Action) {
            self.updated.set(self.updated.get() + 1);
        }
    }

    /// Configurable test provider.
    struct TestProvider {
        probe: Probe,
        whyrun: bool,
        converge_count: usize,
        set_flag_directly: bool,
        current: Option<Resource>,
        handlers: ActionTable<Self>,
    }

    impl TestProvider {
        fn new(probe: Probe, whyrun: bool) -> Self {
            Self {
                probe,
                whyrun,
                converge_count: 0,
                set_flag_directly: false,
                current: None,
                handlers: ActionTable::new().on(Action::Run, Self::action_run),
            }
        }

        fn converging(mut self, count: usize) -> Self {
            self.converge_count = count;
            self
        }

        fn setting_flag(mut self) -> Self {
            self.set_flag_directly = true;
            self
        }

        fn action_run(&mut self, cx: &mut ConvergeContext<'_>) -> Result<()> {
            self.probe.handler_calls.set(self.probe.handler_calls.get() + 1);
            for i in 0..self.converge_count {
                let work = self.probe.work_calls.clone();
                cx.converge_by(format!("step {i}"), move || {
                    work.set(work.get() + 1);
                    Ok(())
                })?;
            }
            if self.set_flag_directly {
                cx.resource_mut().mark_updated();
            }
            Ok(())
        }
    }

    impl Provider for TestProvider {
        fn name(&self) -> &'static str {
            "test"
        }

        fn whyrun_supported(&self) -> bool {
            self.whyrun
        }

        fn load_current_resource(&mut self, resource: &Resource, _node: &NodeFacts) -> Result<()> {
            self.current = Some(Resource::new(resource.type_tag(), resource.name()));
            Ok(())
        }

        fn current_resource(&self) -> Option<&Resource> {
            self.current.as_ref()
        }

        fn run_handler(&mut self, action: Action, cx: &mut ConvergeContext<'_>) -> Result<()> {
            let handler = self.handlers.lookup("test", action)?;
            handler(self, cx)
        }

        fn cleanup(&mut self) {
            self.probe.cleanup_calls.set(self.probe.cleanup_calls.get() + 1);
        }
    }

    fn context(why_run: bool, events: EventLog) -> RunContext {
        let mut run = RunContext::new(NodeFacts::new("linux")).with_why_run(why_run);
        run.events.register(Box::new(events));
        run
    }

    #[test]
    fn test_no_converge_actions_means_up_to_date() {
        let probe = Probe::default();
        let events = EventLog::default();
        let mut run = context(false, events.clone());
        let registry = ProviderRegistry::new();
        let mut provider = TestProvider::new(probe.clone(), true);
        let mut resource = Resource::new("test", "idle");

        let outcome =
            run_action(&mut provider, &mut resource, Action::Run, &mut run, &registry).unwrap();

        assert_eq!(outcome, Outcome::UpToDate);
        assert_eq!(events.up_to_date.get(), 1);
        assert_eq!(events.updated.get(), 0);
        assert!(!resource.updated_by_last_action());
        assert_eq!(probe.cleanup_calls.get(), 1);
    }

    #[test]
    fn test_converge_actions_mean_updated_exactly_once() {
        let probe = Probe::default();
        let events = EventLog::default();
        let mut run = context(false, events.clone());
        let registry = ProviderRegistry::new();
        let mut provider = TestProvider::new(probe.clone(), true).converging(3);
        let mut resource = Resource::new("test", "busy");

        let outcome =
            run_action(&mut provider, &mut resource, Action::Run, &mut run, &registry).unwrap();

        assert_eq!(outcome, Outcome::Updated);
        assert_eq!(events.updated.get(), 1, "updated fires exactly once");
        assert_eq!(events.up_to_date.get(), 0);
        assert_eq!(probe.work_calls.get(), 3);
        assert!(resource.updated_by_last_action());
    }

    #[test]
    fn test_flag_set_by_handler_counts_as_updated() {
        let probe = Probe::default();
        let events = EventLog::default();
        let mut run = context(false, events.clone());
        let registry = ProviderRegistry::new();
        let mut provider = TestProvider::new(probe, true).setting_flag();
        let mut resource = Resource::new("test", "flagged");

        let outcome =
            run_action(&mut provider, &mut resource, Action::Run, &mut run, &registry).unwrap();

        assert_eq!(outcome, Outcome::Updated);
        assert_eq!(events.updated.get(), 1);
    }

    #[test]
    fn test_whyrun_unsupported_provider_is_bypassed() {
        let probe = Probe::default();
        let events = EventLog::default();
        let mut run = context(true, events.clone());
        let registry = ProviderRegistry::new();
        let mut provider = TestProvider::new(probe.clone(), false).converging(1);
        let mut resource = Resource::new("test", "unsafe");

        let outcome =
            run_action(&mut provider, &mut resource, Action::Run, &mut run, &registry).unwrap();

        assert_eq!(outcome, Outcome::Bypassed);
        assert_eq!(probe.handler_calls.get(), 0, "handler must never run");
        assert_eq!(events.load_bypassed.get(), 1);
        assert_eq!(events.bypassed.get(), 1);
        assert_eq!(events.updated.get(), 0);
        assert_eq!(events.up_to_date.get(), 0);
        // Cleanup still runs for a bypassed resource.
        assert_eq!(probe.cleanup_calls.get(), 1);
    }

    #[test]
    fn test_whyrun_supported_provider_self_simulates() {
        let probe = Probe::default();
        let events = EventLog::default();
        let mut run = context(true, events.clone());
        let registry = ProviderRegistry::new();
        let mut provider = TestProvider::new(probe.clone(), true).converging(2);
        let mut resource = Resource::new("test", "simulated");

        let outcome =
            run_action(&mut provider, &mut resource, Action::Run, &mut run, &registry).unwrap();

        assert_eq!(outcome, Outcome::Updated);
        assert_eq!(probe.handler_calls.get(), 1, "handler runs in why-run");
        assert_eq!(probe.work_calls.get(), 0, "work blocks never run");
        assert_eq!(events.loaded.get(), 1);
        assert_eq!(events.updated.get(), 1);
    }

    #[test]
    fn test_blocked_action_is_bypassed_for_whyrun_provider() {
        struct Blocked {
            probe: Probe,
        }

        impl Provider for Blocked {
            fn name(&self) -> &'static str {
                "blocked"
            }

            fn whyrun_supported(&self) -> bool {
                true
            }

            fn load_current_resource(
                &mut self,
                _resource: &Resource,
                _node: &NodeFacts,
            ) -> Result<()> {
                Ok(())
            }

            fn define_resource_requirements(
                &mut self,
                _action: Action,
                requirements: &mut RequirementSet,
                _resource: &Resource,
            ) {
                requirements
                    .assert(&[Action::Run])
                    .assertion(|| false)
                    .whyrun("missing interpreter")
                    .block_action();
            }

            fn run_handler(
                &mut self,
                _action: Action,
                _cx: &mut ConvergeContext<'_>,
            ) -> Result<()> {
                self.probe.handler_calls.set(self.probe.handler_calls.get() + 1);
                Ok(())
            }
        }

        let probe = Probe::default();
        let events = EventLog::default();
        let mut run = context(true, events.clone());
        let registry = ProviderRegistry::new();
        let mut provider = Blocked {
            probe: probe.clone(),
        };
        let mut resource = Resource::new("blocked", "script");

        let outcome =
            run_action(&mut provider, &mut resource, Action::Run, &mut run, &registry).unwrap();

        assert_eq!(outcome, Outcome::Bypassed);
        assert_eq!(probe.handler_calls.get(), 0);
        assert_eq!(events.bypassed.get(), 1);
    }

    #[test]
    fn test_requirement_failure_aborts_in_normal_mode() {
        struct Failing;

        impl Provider for Failing {
            fn name(&self) -> &'static str {
                "failing"
            }

            fn load_current_resource(
                &mut self,
                _resource: &Resource,
                _node: &NodeFacts,
            ) -> Result<()> {
                Ok(())
            }

            fn define_resource_requirements(
                &mut self,
                _action: Action,
                requirements: &mut RequirementSet,
                _resource: &Resource,
            ) {
                requirements
                    .assert(&[Action::Run])
                    .assertion(|| false)
                    .failure_message("required binary missing");
            }

            fn run_handler(
                &mut self,
                _action: Action,
                _cx: &mut ConvergeContext<'_>,
            ) -> Result<()> {
                unreachable!("handler must not run after a failed requirement");
            }
        }

        let mut run = context(false, EventLog::default());
        let registry = ProviderRegistry::new();
        let mut resource = Resource::new("failing", "r");

        let err = run_action(&mut Failing, &mut resource, Action::Run, &mut run, &registry)
            .unwrap_err();
        assert!(err.to_string().contains("required binary missing"));
    }

    #[test]
    fn test_missing_load_override_is_a_programming_error() {
        struct Bare;

        impl Provider for Bare {
            fn name(&self) -> &'static str {
                "bare"
            }

            fn run_handler(
                &mut self,
                _action: Action,
                _cx: &mut ConvergeContext<'_>,
            ) -> Result<()> {
                Ok(())
            }
        }

        let mut run = context(false, EventLog::default());
        let registry = ProviderRegistry::new();
        let mut resource = Resource::new("bare", "r");

        let err =
            run_action(&mut Bare, &mut resource, Action::Run, &mut run, &registry).unwrap_err();
        assert!(err.to_string().contains("load_current_resource"));
    }

    #[test]
    fn test_nothing_action_succeeds_trivially() {
        let probe = Probe::default();
        let events = EventLog::default();
        let mut run = context(false, events.clone());
        let registry = ProviderRegistry::new();
        let mut provider = TestProvider::new(probe.clone(), true);
        let mut resource = Resource::new("test", "noop");

        let outcome = run_action(
            &mut provider,
            &mut resource,
            Action::Nothing,
            &mut run,
            &registry,
        )
        .unwrap();

        assert_eq!(outcome, Outcome::UpToDate);
        assert_eq!(probe.handler_calls.get(), 0);
    }

    #[test]
    fn test_unsupported_action_is_a_checked_error() {
        let probe = Probe::default();
        let mut run = context(false, EventLog::default());
        let registry = ProviderRegistry::new();
        let mut provider = TestProvider::new(probe, true);
        let mut resource = Resource::new("test", "r");

        // TestProvider only registers a handler for `run`.
        let err = run_action(
            &mut provider,
            &mut resource,
            Action::Install,
            &mut run,
            &registry,
        )
        .unwrap_err();
        assert!(err.to_string().contains("no handler for action `install`"));
    }

    /// Provider whose handler evaluates an embedded recipe.
    struct Nesting {
        inner_converges: bool,
    }

    impl Provider for Nesting {
        fn name(&self) -> &'static str {
            "nesting"
        }

        fn whyrun_supported(&self) -> bool {
            true
        }

        fn load_current_resource(&mut self, _resource: &Resource, _node: &NodeFacts) -> Result<()> {
            Ok(())
        }

        fn run_handler(&mut self, _action: Action, cx: &mut ConvergeContext<'_>) -> Result<()> {
            let inner_converges = self.inner_converges;
            cx.recipe_eval("evaluate embedded recipe", |collection| {
                collection.push(Resource::new("inner", "idle").with_action(Action::Run))?;
                let name = if inner_converges { "busy" } else { "idle-2" };
                collection.push(Resource::new("inner", name).with_action(Action::Run))?;
                Ok(())
            })
        }
    }

    fn nested_registry() -> ProviderRegistry {
        let mut registry = ProviderRegistry::new();
        registry.register("inner", PlatformSupport::All, |resource| {
            // The resource named "busy" performs one converge action.
            let converges = resource.name() == "busy";
            Box::new(InnerProvider { converges })
        });
        registry
    }

    struct InnerProvider {
        converges: bool,
    }

    impl Provider for InnerProvider {
        fn name(&self) -> &'static str {
            "inner"
        }

        fn whyrun_supported(&self) -> bool {
            true
        }

        fn load_current_resource(&mut self, _resource: &Resource, _node: &NodeFacts) -> Result<()> {
            Ok(())
        }

        fn run_handler(&mut self, _action: Action, cx: &mut ConvergeContext<'_>) -> Result<()> {
            if self.converges {
                cx.converge_by("inner side effect", || Ok(()))?;
            }
            Ok(())
        }
    }

    #[test]
    fn test_nested_run_with_updates_marks_outer_updated() {
        let events = EventLog::default();
        let mut run = context(false, events.clone());
        let registry = nested_registry();
        let mut provider = Nesting {
            inner_converges: true,
        };
        let mut resource = Resource::new("nesting", "outer");

        let outcome =
            run_action(&mut provider, &mut resource, Action::Run, &mut run, &registry).unwrap();

        assert_eq!(outcome, Outcome::Updated);
        assert!(resource.updated_by_last_action());
    }

    #[test]
    fn test_nested_run_without_updates_leaves_outer_current() {
        let mut run = context(false, EventLog::default());
        let registry = nested_registry();
        let mut provider = Nesting {
            inner_converges: false,
        };
        let mut resource = Resource::new("nesting", "outer");

        let outcome =
            run_action(&mut provider, &mut resource, Action::Run, &mut run, &registry).unwrap();

        assert_eq!(outcome, Outcome::UpToDate);
    }
}
