use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

use super::upstream::{FieldChange, FieldReader};
use super::value::Value;

/// Lazily evaluated, invalidatable value provider behind a [`DataPoint`](super::DataPoint).
///
/// Implementations must recompute only when stale, and must never recompute
/// inside [`set_stale`](Self::set_stale). [`Cached`] provides both guarantees.
pub trait DataPointSource: Send + Sync + fmt::Debug + Any {
    /// Current value, recomputed first if the source is stale.
    fn value(&self) -> Value;

    /// Invalidate the cached value. The next [`value`](Self::value) call recomputes.
    fn set_stale(&self);

    fn is_stale(&self) -> bool;

    /// React to an upstream change. Returns `true` if this source went stale.
    fn on_field_change(&self, _change: &FieldChange) -> bool {
        false
    }

    fn as_any(&self) -> &dyn Any;
}

/// Memoizing cell shared by every built-in source.
///
/// The input `S` and the cached value sit behind one lock, so writers that
/// change the input also invalidate the cache before any reader can observe
/// the new input. Computation runs under the lock: concurrent readers of a
/// stale cell trigger a single recomputation.
pub struct Cached<S> {
    slot: Mutex<Slot<S>>,
    recomputations: AtomicU64,
}

struct Slot<S> {
    input: S,
    value: Option<Value>,
}

impl<S> Cached<S> {
    /// Create a stale cell around `input`.
    pub fn new(input: S) -> Self {
        Self {
            slot: Mutex::new(Slot { input, value: None }),
            recomputations: AtomicU64::new(0),
        }
    }

    /// Return the cached value, computing it from the input if stale.
    pub fn get_or_compute(&self, compute: impl FnOnce(&S) -> Value) -> Value {
        let mut slot = self.slot.lock();
        if let Some(value) = &slot.value {
            return value.clone();
        }
        let value = compute(&slot.input);
        self.recomputations.fetch_add(1, Ordering::Relaxed);
        slot.value = Some(value.clone());
        value
    }

    pub fn invalidate(&self) {
        self.slot.lock().value = None;
    }

    /// Mutate the input and invalidate the cache in the same critical section.
    pub fn update<R>(&self, f: impl FnOnce(&mut S) -> R) -> R {
        let mut slot = self.slot.lock();
        let out = f(&mut slot.input);
        slot.value = None;
        out
    }

    /// Read the input without touching the cache.
    pub fn with_input<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        f(&self.slot.lock().input)
    }

    #[must_use]
    pub fn is_stale(&self) -> bool {
        self.slot.lock().value.is_none()
    }

    /// Number of times a value has been computed since creation.
    #[must_use]
    pub fn recomputations(&self) -> u64 {
        self.recomputations.load(Ordering::Relaxed)
    }
}

impl<S: fmt::Debug> fmt::Debug for Cached<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slot = self.slot.lock();
        f.debug_struct("Cached")
            .field("input", &slot.input)
            .field("value", &slot.value)
            .field("recomputations", &self.recomputations())
            .finish()
    }
}

/// Source mirroring one upstream field. Goes stale when the field changes.
#[derive(Debug)]
pub struct FieldSource {
    reader: Arc<dyn FieldReader>,
    cache: Cached<()>,
}

impl FieldSource {
    pub fn new(reader: Arc<dyn FieldReader>) -> Self {
        Self {
            reader,
            cache: Cached::new(()),
        }
    }

    #[must_use]
    pub fn field_name(&self) -> &str {
        self.reader.field_name()
    }

    #[must_use]
    pub fn recomputations(&self) -> u64 {
        self.cache.recomputations()
    }
}

impl DataPointSource for FieldSource {
    fn value(&self) -> Value {
        self.cache.get_or_compute(|()| {
            let value = self.reader.read();
            trace!(field = self.reader.field_name(), %value, "read upstream field");
            value
        })
    }

    fn set_stale(&self) {
        self.cache.invalidate();
    }

    fn is_stale(&self) -> bool {
        self.cache.is_stale()
    }

    fn on_field_change(&self, change: &FieldChange) -> bool {
        if change.field != self.reader.field_name() {
            return false;
        }
        trace!(
            subject = %change.subject,
            field = %change.field,
            old = %change.old,
            new = %change.new,
            "field changed"
        );
        self.set_stale();
        true
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Directly settable boolean, e.g. a "hedge required" marker flipped by an action.
#[derive(Debug)]
pub struct FlagSource {
    name: String,
    cache: Cached<bool>,
}

impl FlagSource {
    pub fn new(name: impl Into<String>, initial: bool) -> Self {
        Self {
            name: name.into(),
            cache: Cached::new(initial),
        }
    }

    /// Set the flag and mark the source stale. Returns the previous value.
    pub fn set(&self, value: bool) -> bool {
        let previous = self.cache.update(|flag| std::mem::replace(flag, value));
        trace!(flag = %self.name, previous, value, "flag set");
        previous
    }

    #[must_use]
    pub fn get(&self) -> bool {
        self.cache.with_input(|flag| *flag)
    }

    #[must_use]
    pub fn recomputations(&self) -> u64 {
        self.cache.recomputations()
    }
}

impl DataPointSource for FlagSource {
    fn value(&self) -> Value {
        self.cache.get_or_compute(|flag| Value::Bool(*flag))
    }

    fn set_stale(&self) {
        self.cache.invalidate();
    }

    fn is_stale(&self) -> bool {
        self.cache.is_stale()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

type Compute = Box<dyn Fn() -> Value + Send + Sync>;

/// Source computing its value with a closure, recomputed after each invalidation.
pub struct LazySource {
    compute: Compute,
    cache: Cached<()>,
}

impl LazySource {
    pub fn new(compute: impl Fn() -> Value + Send + Sync + 'static) -> Self {
        Self {
            compute: Box::new(compute),
            cache: Cached::new(()),
        }
    }

    #[must_use]
    pub fn recomputations(&self) -> u64 {
        self.cache.recomputations()
    }
}

impl fmt::Debug for LazySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazySource")
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl DataPointSource for LazySource {
    fn value(&self) -> Value {
        self.cache.get_or_compute(|()| (self.compute)())
    }

    fn set_stale(&self) {
        self.cache.invalidate();
    }

    fn is_stale(&self) -> bool {
        self.cache.is_stale()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;
    use crate::Field;

    #[test]
    fn cached_starts_stale() {
        let cell = Cached::new(5_i64);
        assert!(cell.is_stale());
        assert_eq!(cell.recomputations(), 0);
    }

    #[test]
    fn cached_computes_once_until_invalidated() {
        let cell = Cached::new(5_i64);
        for _ in 0..4 {
            assert_eq!(cell.get_or_compute(|v| Value::Int(*v)), Value::Int(5));
        }
        assert_eq!(cell.recomputations(), 1);
        cell.invalidate();
        assert_eq!(cell.get_or_compute(|v| Value::Int(*v)), Value::Int(5));
        assert_eq!(cell.recomputations(), 2);
    }

    #[test]
    fn cached_update_invalidates() {
        let cell = Cached::new(5_i64);
        cell.get_or_compute(|v| Value::Int(*v));
        cell.update(|v| *v = 9);
        assert!(cell.is_stale());
        assert_eq!(cell.get_or_compute(|v| Value::Int(*v)), Value::Int(9));
    }

    #[test]
    fn lazy_source_counts_closure_calls() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let source = LazySource::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Value::Int(1)
        });
        source.value();
        source.value();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        source.set_stale();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        source.value();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(source.recomputations(), 2);
    }

    #[test]
    fn flag_set_marks_stale_and_returns_previous() {
        let flag = FlagSource::new("HedgeRequired", true);
        assert_eq!(flag.value(), Value::Bool(true));
        assert!(!flag.is_stale());
        assert!(flag.set(false));
        assert!(flag.is_stale());
        assert_eq!(flag.value(), Value::Bool(false));
        assert!(!flag.get());
    }

    #[test]
    fn field_source_ignores_other_fields() {
        let field = Arc::new(Field::new("order-1", "EMSX_STATUS", "NEW"));
        let source = FieldSource::new(field.clone());
        assert_eq!(source.value(), Value::from("NEW"));

        let other = Field::new("order-1", "EMSX_FILLED", 0_i64).set(10_i64);
        assert!(!source.on_field_change(&other));
        assert!(!source.is_stale());
    }

    #[test]
    fn field_source_goes_stale_on_its_field() {
        let field = Arc::new(Field::new("order-1", "EMSX_STATUS", "NEW"));
        let source = FieldSource::new(field.clone());
        assert_eq!(source.value(), Value::from("NEW"));

        let change = field.set("WORKING");
        // Cached until notified
        assert_eq!(source.value(), Value::from("NEW"));
        assert!(source.on_field_change(&change));
        assert_eq!(source.value(), Value::from("WORKING"));
        assert_eq!(source.recomputations(), 2);
    }

    #[test]
    fn downcast_through_as_any() {
        let source: Arc<dyn DataPointSource> = Arc::new(FlagSource::new("f", true));
        assert!(source.as_any().downcast_ref::<FlagSource>().is_some());
        assert!(source.as_any().downcast_ref::<LazySource>().is_none());
    }
}
