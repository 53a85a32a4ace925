use std::fmt;
use std::time::Duration;

use super::error::{ActionError, EvalError};

/// An action that ran to completion during a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FiredAction {
    /// Slash-separated path of the leaf rule, e.g. `StatusWorking/Filled50Percent/HedgeRequired`.
    pub rule: String,
    pub action: String,
}

/// What went wrong at a rule during a pass.
#[derive(Debug, Clone)]
pub enum FailureKind {
    /// The evaluator failed; the rule was treated as not satisfied.
    Evaluation(EvalError),
    /// An action failed; the rest of that leaf's actions were skipped.
    Action { action: String, error: ActionError },
}

#[derive(Debug, Clone)]
pub struct Failure {
    pub rule: String,
    pub kind: FailureKind,
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            FailureKind::Evaluation(e) => write!(f, "{}: {e}", self.rule),
            FailureKind::Action { action, error } => {
                write!(f, "{} ({action}): {error}", self.rule)
            }
        }
    }
}

/// Outcome of one [`RuleSet::execute()`](super::ruleset::RuleSet::execute) pass.
#[derive(Debug, Clone)]
#[must_use]
pub struct ExecutionReport {
    pub(crate) rule_set: String,
    pub(crate) data_set: String,
    pub(crate) evaluation_order: Vec<String>,
    pub(crate) satisfied: Vec<String>,
    pub(crate) fired: Vec<FiredAction>,
    pub(crate) failures: Vec<Failure>,
    pub(crate) cancelled: bool,
    pub(crate) duration: Duration,
}

impl ExecutionReport {
    pub(crate) fn new(rule_set: &str, data_set: &str) -> Self {
        Self {
            rule_set: rule_set.to_owned(),
            data_set: data_set.to_owned(),
            evaluation_order: Vec::new(),
            satisfied: Vec::new(),
            fired: Vec::new(),
            failures: Vec::new(),
            cancelled: false,
            duration: Duration::ZERO,
        }
    }

    #[must_use]
    pub fn rule_set(&self) -> &str {
        &self.rule_set
    }

    #[must_use]
    pub fn data_set(&self) -> &str {
        &self.data_set
    }

    /// Rule paths in the order their evaluators were invoked.
    #[must_use]
    pub fn evaluation_order(&self) -> &[String] {
        &self.evaluation_order
    }

    /// Rule paths whose evaluator returned `true`, in evaluation order.
    #[must_use]
    pub fn satisfied(&self) -> &[String] {
        &self.satisfied
    }

    #[must_use]
    pub fn fired(&self) -> &[FiredAction] {
        &self.fired
    }

    /// How many times the named action fired in this pass.
    #[must_use]
    pub fn fired_count(&self, action: &str) -> usize {
        self.fired.iter().filter(|f| f.action == action).count()
    }

    #[must_use]
    pub fn failures(&self) -> &[Failure] {
        &self.failures
    }

    /// `true` if the pass stopped early because of cancellation or shutdown.
    #[must_use]
    pub fn cancelled(&self) -> bool {
        self.cancelled
    }

    #[must_use]
    pub fn duration(&self) -> Duration {
        self.duration
    }
}

impl fmt::Display for ExecutionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} on {}", self.rule_set, self.data_set)?;
        write!(f, ", satisfied: [{}]", self.satisfied.join(", "))?;
        let fired: Vec<String> = self
            .fired
            .iter()
            .map(|a| format!("{}@{}", a.action, a.rule))
            .collect();
        write!(f, ", fired: [{}]", fired.join(", "))?;
        if !self.failures.is_empty() {
            write!(f, ", failures: {}", self.failures.len())?;
        }
        if self.cancelled {
            write!(f, ", cancelled")?;
        }
        write!(f, ", duration: {:?}", self.duration)
    }
}
