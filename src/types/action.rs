use std::fmt;
use std::sync::Arc;

use tracing::info;

use super::data_set::DataSet;
use super::error::ActionError;
use super::source::FlagSource;

/// Side effect run when a leaf rule's whole condition chain is satisfied.
///
/// An executor that changes a value other rules read must do it through a
/// source mutator such as [`FlagSource::set`], which also marks the source
/// stale. The engine never retries a failed action.
///
/// Actions run while the pass holds its data set, so an action must not
/// execute a rule set against the data set it was given.
pub trait ActionExecutor: Send + Sync {
    /// # Errors
    ///
    /// Returns [`ActionError`] if the effect could not be performed.
    fn execute(&self, data_set: &DataSet) -> Result<(), ActionError>;
}

impl<F> ActionExecutor for F
where
    F: Fn(&DataSet) -> Result<(), ActionError> + Send + Sync,
{
    fn execute(&self, data_set: &DataSet) -> Result<(), ActionError> {
        self(data_set)
    }
}

/// Named action attached to rules.
#[derive(Clone)]
pub struct RuleAction {
    name: String,
    executor: Arc<dyn ActionExecutor>,
}

impl RuleAction {
    pub fn new(name: impl Into<String>, executor: impl ActionExecutor + 'static) -> Self {
        Self {
            name: name.into(),
            executor: Arc::new(executor),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// # Errors
    ///
    /// Propagates the executor's [`ActionError`].
    pub fn execute(&self, data_set: &DataSet) -> Result<(), ActionError> {
        self.executor.execute(data_set)
    }
}

impl fmt::Debug for RuleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleAction")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Clears a [`FlagSource`] so the rule reading it stops firing.
#[derive(Debug, Clone)]
pub struct ClearFlag {
    data_point: String,
}

impl ClearFlag {
    pub fn new(data_point: impl Into<String>) -> Self {
        Self {
            data_point: data_point.into(),
        }
    }
}

impl ActionExecutor for ClearFlag {
    fn execute(&self, data_set: &DataSet) -> Result<(), ActionError> {
        let flag = data_set.source::<FlagSource>(&self.data_point)?;
        if flag.set(false) {
            info!(data_set = data_set.name(), flag = %self.data_point, "flag cleared");
        }
        Ok(())
    }
}
