//! # Convergence
//!
//! A resource/provider convergence engine: declare desired state,
//! inspect current state, and converge the system toward the
//! declaration through idempotent, auditable side effects.
//!
//! ## Core Concepts
//!
//! - **Resource**: a named, typed desired-state object with declared
//!   properties and one or more symbolic actions.
//! - **Provider**: the executable strategy bound to one resource type
//!   (and optionally a platform); it loads current state, asserts
//!   preconditions, and declares converge actions.
//! - **ConvergeLog**: the ordered, described list of mutating steps a
//!   provider intends to perform. In why-run mode the steps are
//!   reported, never performed.
//! - **RequirementSet**: preconditions that abort in normal mode but
//!   block-and-report in why-run mode.
//! - **Runner**: walks an ordered resource collection and drives each
//!   resource's convergence state machine.
//! - **EventDispatcher**: fan-out for lifecycle events; formatters and
//!   audit trails subscribe, the engine never renders.
//!
//! ## Example
//!
//! ```ignore
//! use convergence::{
//!     Action, ActionTable, ConvergeContext, NodeFacts, PlatformSupport,
//!     Provider, ProviderRegistry, Resource, ResourceCollection,
//!     RunContext, Runner,
//! };
//!
//! struct TouchProvider {
//!     handlers: ActionTable<Self>,
//! }
//!
//! impl TouchProvider {
//!     fn new() -> Self {
//!         Self {
//!             handlers: ActionTable::new().on(Action::Create, Self::action_create),
//!         }
//!     }
//!
//!     fn action_create(&mut self, cx: &mut ConvergeContext<'_>) -> anyhow::Result<()> {
//!         let path = cx.resource().name().to_string();
//!         if !std::path::Path::new(&path).exists() {
//!             cx.converge_by(format!("create file {path}"), move || {
//!                 std::fs::write(&path, b"")?;
//!                 Ok(())
//!             })?;
//!         }
//!         Ok(())
//!     }
//! }
//!
//! impl Provider for TouchProvider {
//!     fn name(&self) -> &'static str { "touch" }
//!     fn whyrun_supported(&self) -> bool { true }
//!
//!     fn load_current_resource(&mut self, _r: &Resource, _n: &NodeFacts) -> anyhow::Result<()> {
//!         Ok(())
//!     }
//!
//!     fn run_handler(&mut self, action: Action, cx: &mut ConvergeContext<'_>) -> anyhow::Result<()> {
//!         let handler = self.handlers.lookup("touch", action)?;
//!         handler(self, cx)
//!     }
//! }
//!
//! let mut registry = ProviderRegistry::new();
//! registry.register("touch", PlatformSupport::All, |_| Box::new(TouchProvider::new()));
//!
//! let mut collection = ResourceCollection::new();
//! collection.push(Resource::new("touch", "/tmp/example").with_action(Action::Create))?;
//!
//! let mut run = RunContext::new(NodeFacts::local());
//! let summary = Runner::new(&registry, &mut run).converge(&mut collection)?;
//! ```
//!
//! ## Execution model
//!
//! Single-threaded, synchronous, cooperative: resources converge in
//! strict declaration order, and a provider blocks the sequence until
//! it finishes. The why-run flag lives in the [`RunContext`], never in
//! process-wide state.

pub mod context;
pub mod converge;
pub mod error;
pub mod events;
pub mod provider;
pub mod registry;
pub mod requirements;
pub mod resource;
pub mod runner;
pub mod types;

// Re-export main types at crate root
pub use context::{NodeFacts, RunContext};
pub use converge::ConvergeLog;
pub use error::ConvergeError;
pub use events::{EventDispatcher, EventSink, NullSink};
pub use provider::{ActionTable, ConvergeContext, Handler, Provider, run_action};
pub use registry::{PlatformSupport, ProviderRegistry};
pub use requirements::{RequirementBuilder, RequirementSet, Scope};
pub use resource::{Resource, ResourceCollection};
pub use runner::{FailurePolicy, Runner};
pub use types::{Action, Outcome, RunSummary, Value};
