//! Core types for the convergence engine.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ConvergeError;

/// Symbolic action requested on a resource.
///
/// The vocabulary is closed: an action missing from a provider's
/// handler table is a checked error at dispatch, and an unknown name
/// in a manifest is an error at load time. `Nothing` is the explicit
/// no-op and always succeeds trivially.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Explicit no-op
    Nothing,
    Create,
    Delete,
    Touch,
    Install,
    Remove,
    Upgrade,
    Start,
    Stop,
    Restart,
    Enable,
    Disable,
    Write,
    Run,
}

impl Action {
    /// The manifest spelling of this action.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Nothing => "nothing",
            Self::Create => "create",
            Self::Delete => "delete",
            Self::Touch => "touch",
            Self::Install => "install",
            Self::Remove => "remove",
            Self::Upgrade => "upgrade",
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Restart => "restart",
            Self::Enable => "enable",
            Self::Disable => "disable",
            Self::Write => "write",
            Self::Run => "run",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = ConvergeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "nothing" => Ok(Self::Nothing),
            "create" => Ok(Self::Create),
            "delete" => Ok(Self::Delete),
            "touch" => Ok(Self::Touch),
            "install" => Ok(Self::Install),
            "remove" => Ok(Self::Remove),
            "upgrade" => Ok(Self::Upgrade),
            "start" => Ok(Self::Start),
            "stop" => Ok(Self::Stop),
            "restart" => Ok(Self::Restart),
            "enable" => Ok(Self::Enable),
            "disable" => Ok(Self::Disable),
            "write" => Ok(Self::Write),
            "run" => Ok(Self::Run),
            other => Err(ConvergeError::UnknownAction(other.to_string())),
        }
    }
}

/// A declared or observed property value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    String(String),
    Integer(i64),
    Bool(bool),
}

impl Value {
    /// Borrow the string form, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// The integer form, if this is an integer.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// The boolean form, if this is a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => f.write_str(s),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Bool(b) => write!(f, "{b}"),
        }
    }
}

/// Terminal outcome of converging one resource/action pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// At least one converge action was logged, or the resource set
    /// its own updated flag
    Updated,
    /// No side effects were needed
    UpToDate,
    /// Why-run mode with a provider that cannot simulate; the handler
    /// never ran
    Bypassed,
}

/// Aggregated results of one convergence pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    pub updated: usize,
    pub up_to_date: usize,
    pub bypassed: usize,
    pub failed: usize,
}

impl RunSummary {
    /// Record one per-resource outcome.
    pub fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Updated => self.updated += 1,
            Outcome::UpToDate => self.up_to_date += 1,
            Outcome::Bypassed => self.bypassed += 1,
        }
    }

    /// Total number of action runs accounted for.
    pub fn total(&self) -> usize {
        self.updated + self.up_to_date + self.bypassed + self.failed
    }

    /// Whether any resource performed (or would perform) an update.
    pub fn has_updates(&self) -> bool {
        self.updated > 0
    }

    /// Whether the pass completed without failures.
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    /// Merge another summary into this one.
    pub fn merge(&mut self, other: &RunSummary) {
        self.updated += other.updated;
        self.up_to_date += other.up_to_date;
        self.bypassed += other.bypassed;
        self.failed += other.failed;
    }
}
