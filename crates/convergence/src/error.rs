//! Error types for the convergence engine.
//!
//! Engine-level failures are distinct from the errors a concrete
//! provider raises while mutating the system: the latter travel as
//! `anyhow::Error` and propagate unmodified to the runner.

use thiserror::Error;

/// Failures raised by the convergence engine itself.
#[derive(Debug, Error)]
pub enum ConvergeError {
    /// A provider failed to override a required hook. Always a
    /// programming error in the provider, never retried.
    #[error("provider `{provider}` does not override `{hook}`")]
    UnimplementedHook {
        /// Provider name as reported by `Provider::name`
        provider: &'static str,
        /// The hook that was not overridden
        hook: &'static str,
    },

    /// A precondition registered in a [`RequirementSet`] failed in
    /// normal mode.
    ///
    /// [`RequirementSet`]: crate::requirements::RequirementSet
    #[error("requirement failed for {resource}: {message}")]
    RequirementFailed {
        /// Display form of the resource being converged
        resource: String,
        /// The requirement's failure message
        message: String,
    },

    /// An action was dispatched to a provider that registered no
    /// handler for it.
    #[error("resource type `{resource_type}` has no handler for action `{action}`")]
    UnsupportedAction {
        /// Type tag of the resource
        resource_type: String,
        /// The action that could not be dispatched
        action: String,
    },

    /// No registered provider matches the resource type on this
    /// platform.
    #[error("no provider for resource type `{resource_type}` on platform `{platform}`")]
    NoProvider {
        /// Type tag of the resource
        resource_type: String,
        /// Platform the run context reported
        platform: String,
    },

    /// Two resources in one collection share a name. Names address
    /// resources within a run, so they must be unique.
    #[error("duplicate resource `{name}` in collection")]
    DuplicateResource {
        /// Display form of the colliding resource
        name: String,
    },

    /// An action name that is not part of the action vocabulary.
    #[error("unknown action `{0}`")]
    UnknownAction(String),
}
