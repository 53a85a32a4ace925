use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use tracing::trace;

use super::error::{BuildError, EvalError};
use super::source::DataPointSource;
use super::upstream::FieldChange;
use super::value::Value;

/// Named handle binding a [`DataPointSource`] into a [`DataSet`].
#[derive(Debug, Clone)]
pub struct DataPoint {
    name: String,
    source: Arc<dyn DataPointSource>,
}

impl DataPoint {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn source(&self) -> &Arc<dyn DataPointSource> {
        &self.source
    }

    #[must_use]
    pub fn value(&self) -> Value {
        self.source.value()
    }

    /// The source as its concrete type, if it is a `T`.
    #[must_use]
    pub fn source_as<T: DataPointSource>(&self) -> Option<&T> {
        self.source.as_any().downcast_ref::<T>()
    }
}

/// The data points of one evaluation subject, e.g. one order.
///
/// Names are unique and insertion order is kept for [`report`](Self::report).
/// The structure is fixed once built; values change through the sources.
///
/// Passes over one data set are serialized, so an action's effect is visible
/// to the next pass before it evaluates. Clones share the sources and the
/// serialization.
#[derive(Debug, Clone)]
pub struct DataSet {
    name: String,
    points: Vec<DataPoint>,
    index: HashMap<String, usize>,
    pass: Arc<Mutex<()>>,
}

impl DataSet {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            points: Vec::new(),
            index: HashMap::new(),
            pass: Arc::new(Mutex::new(())),
        }
    }

    /// Held for the whole of one rule set pass.
    pub(crate) fn lock_pass(&self) -> MutexGuard<'_, ()> {
        self.pass.lock()
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add a named data point.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::DuplicateDataPoint`] if `name` is already taken.
    /// The data set is left unchanged.
    pub fn add_data_point(
        &mut self,
        name: impl Into<String>,
        source: impl DataPointSource,
    ) -> Result<&DataPoint, BuildError> {
        self.add_shared(name, Arc::new(source))
    }

    /// Add a data point over a source that is also held elsewhere.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::DuplicateDataPoint`] if `name` is already taken.
    pub fn add_shared(
        &mut self,
        name: impl Into<String>,
        source: Arc<dyn DataPointSource>,
    ) -> Result<&DataPoint, BuildError> {
        let name = name.into();
        if self.index.contains_key(&name) {
            return Err(BuildError::DuplicateDataPoint {
                data_set: self.name.clone(),
                name,
            });
        }
        let idx = self.points.len();
        self.index.insert(name.clone(), idx);
        self.points.push(DataPoint { name, source });
        Ok(&self.points[idx])
    }

    /// Chaining form of [`add_data_point`](Self::add_data_point).
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::DuplicateDataPoint`] if `name` is already taken.
    pub fn with_data_point(
        mut self,
        name: impl Into<String>,
        source: impl DataPointSource,
    ) -> Result<Self, BuildError> {
        self.add_data_point(name, source)?;
        Ok(self)
    }

    /// Look up a data point by name.
    ///
    /// # Errors
    ///
    /// Returns [`EvalError::NotFound`] if no data point has that name.
    pub fn data_point(&self, name: &str) -> Result<&DataPoint, EvalError> {
        self.index
            .get(name)
            .map(|&idx| &self.points[idx])
            .ok_or_else(|| EvalError::NotFound {
                data_set: self.name.clone(),
                data_point: name.to_owned(),
            })
    }

    /// Current value of a data point, recomputed if stale.
    ///
    /// # Errors
    ///
    /// Returns [`EvalError::NotFound`] if no data point has that name.
    pub fn value(&self, name: &str) -> Result<Value, EvalError> {
        let value = self.data_point(name)?.value();
        trace!(data_set = %self.name, data_point = name, %value, "read data point");
        Ok(value)
    }

    /// The source of a data point as its concrete type.
    ///
    /// # Errors
    ///
    /// Returns [`EvalError::NotFound`] if the name is missing and
    /// [`EvalError::SourceType`] if the source is not a `T`.
    pub fn source<T: DataPointSource>(&self, name: &str) -> Result<&T, EvalError> {
        self.data_point(name)?
            .source_as::<T>()
            .ok_or_else(|| EvalError::SourceType {
                data_point: name.to_owned(),
                expected: std::any::type_name::<T>(),
            })
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Data points in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &DataPoint> {
        self.points.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Forward an upstream change to every source. Returns how many went stale.
    pub fn notify(&self, change: &FieldChange) -> usize {
        self.points
            .iter()
            .filter(|dp| dp.source.on_field_change(change))
            .count()
    }

    /// Dump of every data point's current value, in insertion order.
    #[must_use]
    pub fn report(&self) -> String {
        let mut out = format!("DataSet: {}", self.name);
        for dp in &self.points {
            let _ = write!(out, "\n    {}: {}", dp.name, dp.value());
        }
        out
    }
}
