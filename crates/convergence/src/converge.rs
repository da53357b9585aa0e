//! The converge action log: described, ordered side effects.

use anyhow::Result;
use log::{debug, info};

/// Ordered log of the mutating steps a provider intends to perform.
///
/// In normal mode each unit of work runs synchronously at
/// registration, in order; there is no batching, reordering, or
/// concurrency. In why-run mode the work is only described, never
/// invoked. A non-empty log is the evidence that the resource was
/// updated.
pub struct ConvergeLog {
    why_run: bool,
    descriptions: Vec<String>,
}

impl ConvergeLog {
    pub fn new(why_run: bool) -> Self {
        Self {
            why_run,
            descriptions: Vec::new(),
        }
    }

    /// Append a described unit of work.
    ///
    /// The description is always recorded. Unless the log is in
    /// why-run mode, the work runs immediately and its error
    /// propagates to the caller unmodified.
    pub fn add_action(
        &mut self,
        description: impl Into<String>,
        work: impl FnOnce() -> Result<()>,
    ) -> Result<()> {
        let description = description.into();
        if self.why_run {
            info!("would {description}");
        } else {
            debug!("{description}");
        }
        self.descriptions.push(description);
        if !self.why_run {
            work()?;
        }
        Ok(())
    }

    /// Append an entry whose work was already performed elsewhere.
    /// Used by nested convergence, where the child runner has run.
    pub(crate) fn record(&mut self, description: impl Into<String>) {
        self.descriptions.push(description.into());
    }

    /// Whether any action was registered. Drives the
    /// updated-vs-up-to-date decision.
    pub fn is_empty(&self) -> bool {
        self.descriptions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.descriptions.len()
    }

    /// Descriptions in registration order, for audit and reporting.
    pub fn descriptions(&self) -> &[String] {
        &self.descriptions
    }
}
