//! Preconditions evaluated before an action executes.
//!
//! Normal mode fails fast: the first false assertion raises and later
//! assertions are never evaluated. Why-run mode is exhaustive: every
//! assertion runs so the report carries the complete set of reasons a
//! resource cannot converge, blocked actions are recorded, and any
//! why-run remediation runs so later assertions can assume the
//! condition holds.

use log::warn;
use std::collections::BTreeSet;

use crate::error::ConvergeError;
use crate::types::Action;

/// The actions a requirement (or an evaluation pass) applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Scope {
    /// Before every action
    AllActions,
    /// Only when this action is selected
    Action(Action),
}

struct Requirement {
    scopes: Vec<Scope>,
    assertion: Box<dyn FnMut() -> bool>,
    failure_message: String,
    whyrun_message: Option<String>,
    remediation: Option<Box<dyn FnMut()>>,
    block_action: bool,
}

/// Per-resource set of preconditions, scoped to one `run_action` call.
pub struct RequirementSet {
    resource: String,
    why_run: bool,
    requirements: Vec<Requirement>,
    blocked: BTreeSet<Scope>,
}

impl RequirementSet {
    /// `resource` is the display form used in failure messages.
    pub fn new(resource: impl Into<String>, why_run: bool) -> Self {
        Self {
            resource: resource.into(),
            why_run,
            requirements: Vec::new(),
            blocked: BTreeSet::new(),
        }
    }

    /// Register a requirement for the given actions. Chain builder
    /// methods in any order; nothing is evaluated until [`run`].
    ///
    /// [`run`]: RequirementSet::run
    pub fn assert(&mut self, actions: &[Action]) -> RequirementBuilder<'_> {
        let scopes = actions.iter().copied().map(Scope::Action).collect();
        self.push(scopes)
    }

    /// Register a requirement that runs before every action.
    pub fn assert_all_actions(&mut self) -> RequirementBuilder<'_> {
        self.push(vec![Scope::AllActions])
    }

    fn push(&mut self, scopes: Vec<Scope>) -> RequirementBuilder<'_> {
        self.requirements.push(Requirement {
            scopes,
            assertion: Box::new(|| true),
            failure_message: "requirement not met".to_string(),
            whyrun_message: None,
            remediation: None,
            block_action: false,
        });
        RequirementBuilder {
            requirement: self.requirements.last_mut().expect("just pushed"),
        }
    }

    /// Evaluate every requirement registered for `scope`, in
    /// registration order.
    ///
    /// Normal mode returns the first failure and stops. Why-run mode
    /// never fails: it warns with the why-run message, records the
    /// scope as blocked if requested, runs the remediation, and keeps
    /// evaluating.
    pub fn run(&mut self, scope: Scope) -> Result<(), ConvergeError> {
        for requirement in self
            .requirements
            .iter_mut()
            .filter(|r| r.scopes.contains(&scope))
        {
            if (requirement.assertion)() {
                continue;
            }

            if self.why_run {
                let message = requirement
                    .whyrun_message
                    .as_deref()
                    .unwrap_or(&requirement.failure_message);
                warn!("{}: {}", self.resource, message);
                if requirement.block_action {
                    self.blocked.insert(scope);
                }
                if let Some(remediation) = requirement.remediation.as_mut() {
                    remediation();
                }
            } else {
                return Err(ConvergeError::RequirementFailed {
                    resource: self.resource.clone(),
                    message: requirement.failure_message.clone(),
                });
            }
        }
        Ok(())
    }

    /// True iff an evaluated requirement for this action (or for the
    /// all-actions scope) declared `block_action` and failed.
    pub fn action_blocked(&self, action: Action) -> bool {
        self.blocked.contains(&Scope::Action(action)) || self.blocked.contains(&Scope::AllActions)
    }
}

/// Builder handle returned by [`RequirementSet::assert`].
pub struct RequirementBuilder<'a> {
    requirement: &'a mut Requirement,
}

impl RequirementBuilder<'_> {
    /// The predicate; a true result means the requirement is
    /// satisfied.
    pub fn assertion(self, predicate: impl FnMut() -> bool + 'static) -> Self {
        self.requirement.assertion = Box::new(predicate);
        self
    }

    /// Message raised when the assertion fails in normal mode.
    pub fn failure_message(self, message: impl Into<String>) -> Self {
        self.requirement.failure_message = message.into();
        self
    }

    /// Message reported instead of failing in why-run mode.
    pub fn whyrun(self, message: impl Into<String>) -> Self {
        self.requirement.whyrun_message = Some(message.into());
        self
    }

    /// Why-run-only remediation, run after a failed assertion so later
    /// requirements can proceed as if the condition held.
    pub fn whyrun_remediation(self, remediation: impl FnMut() + 'static) -> Self {
        self.requirement.remediation = Some(Box::new(remediation));
        self
    }

    /// Mark the action un-performable when the assertion fails in
    /// why-run mode.
    pub fn block_action(self) -> Self {
        self.requirement.block_action = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn test_passing_requirements_are_noops() {
        let mut set = RequirementSet::new("file[/tmp/a]", false);
        set.assert(&[Action::Create]).assertion(|| true);
        assert!(set.run(Scope::Action(Action::Create)).is_ok());
        assert!(!set.action_blocked(Action::Create));
    }

    #[test]
    fn test_normal_mode_fails_fast() {
        let second_evaluated = Rc::new(Cell::new(false));
        let probe = second_evaluated.clone();

        let mut set = RequirementSet::new("file[/tmp/a]", false);
        set.assert(&[Action::Create])
            .assertion(|| false)
            .failure_message("first failure");
        set.assert(&[Action::Create])
            .assertion(move || {
                probe.set(true);
                false
            })
            .failure_message("second failure");

        let err = set.run(Scope::Action(Action::Create)).unwrap_err();
        assert!(err.to_string().contains("first failure"));
        assert!(!second_evaluated.get(), "second assertion must not run");
    }

    #[test]
    fn test_whyrun_is_exhaustive_and_blocks() {
        let remediations = Rc::new(Cell::new(0));
        let r1 = remediations.clone();
        let r2 = remediations.clone();

        let mut set = RequirementSet::new("service[nginx]", true);
        set.assert(&[Action::Start])
            .assertion(|| false)
            .whyrun("would install nginx first")
            .whyrun_remediation(move || r1.set(r1.get() + 1))
            .block_action();
        set.assert(&[Action::Start])
            .assertion(|| false)
            .whyrun("would create the unit file")
            .whyrun_remediation(move || r2.set(r2.get() + 1))
            .block_action();

        assert!(set.run(Scope::Action(Action::Start)).is_ok());
        assert!(set.action_blocked(Action::Start));
        assert_eq!(remediations.get(), 2, "all remediations must run");
    }

    #[test]
    fn test_whyrun_without_block_does_not_block() {
        let mut set = RequirementSet::new("file[/tmp/a]", true);
        set.assert(&[Action::Create]).assertion(|| false);
        set.run(Scope::Action(Action::Create)).unwrap();
        assert!(!set.action_blocked(Action::Create));
    }

    #[test]
    fn test_all_actions_block_covers_every_action() {
        let mut set = RequirementSet::new("package[git]", true);
        set.assert_all_actions()
            .assertion(|| false)
            .block_action();
        set.run(Scope::AllActions).unwrap();
        assert!(set.action_blocked(Action::Install));
        assert!(set.action_blocked(Action::Remove));
    }

    #[test]
    fn test_requirement_scoped_to_other_action_is_skipped() {
        let mut set = RequirementSet::new("file[/tmp/a]", false);
        set.assert(&[Action::Delete]).assertion(|| false);
        assert!(set.run(Scope::Action(Action::Create)).is_ok());
    }
}
