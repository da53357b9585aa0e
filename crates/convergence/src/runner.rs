//! Runner: drives the per-resource convergence lifecycle in order.

use anyhow::Result;
use log::error;

use crate::context::RunContext;
use crate::provider::run_action;
use crate::registry::ProviderRegistry;
use crate::resource::ResourceCollection;
use crate::types::{Action, RunSummary};

/// What to do when a resource fails to converge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Stop at the first failure
    #[default]
    Abort,
    /// Record the failure and continue with the remaining resources
    Continue,
}

/// Walks an ordered resource collection, resolves a provider for each
/// resource, and drives its convergence state machine.
///
/// Resources converge strictly in declaration order: later resources
/// may depend on the side effects of earlier ones, so there is no
/// reordering and no parallelism. A slow provider blocks the whole
/// sequence.
pub struct Runner<'a> {
    registry: &'a ProviderRegistry,
    run: &'a mut RunContext,
    policy: FailurePolicy,
}

impl<'a> Runner<'a> {
    pub fn new(registry: &'a ProviderRegistry, run: &'a mut RunContext) -> Self {
        Self {
            registry,
            run,
            policy: FailurePolicy::Abort,
        }
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Converge every resource, running each of its declared actions
    /// in order. A resource with no declared actions gets the explicit
    /// no-op.
    pub fn converge(&mut self, collection: &mut ResourceCollection) -> Result<RunSummary> {
        let mut summary = RunSummary::default();

        for index in 0..collection.len() {
            let resource = collection
                .get_mut(index)
                .expect("index within collection bounds");

            let mut provider = match self.registry.resolve(resource, self.run.node.platform()) {
                Ok(provider) => provider,
                Err(err) => {
                    summary.failed += 1;
                    error!("{resource}: {err}");
                    if self.policy == FailurePolicy::Abort {
                        return Err(err.into());
                    }
                    continue;
                }
            };

            let actions: Vec<Action> = if resource.actions().is_empty() {
                vec![Action::Nothing]
            } else {
                resource.actions().to_vec()
            };

            for action in actions {
                match run_action(provider.as_mut(), resource, action, self.run, self.registry) {
                    Ok(outcome) => summary.record(outcome),
                    Err(err) => {
                        summary.failed += 1;
                        error!("{resource} ({action}) failed: {err:#}");
                        if self.policy == FailurePolicy::Abort {
                            return Err(err.context(format!("while converging {resource}")));
                        }
                        // Remaining actions of a failed resource are
                        // skipped; partial side effects stay in place.
                        break;
                    }
                }
            }
        }

        Ok(summary)
    }
}
