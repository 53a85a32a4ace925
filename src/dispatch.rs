//! Single-consumer event loop between upstream callbacks and the engine.
//!
//! Upstream callbacks only enqueue; the worker thread applies staleness and
//! re-executes the shared [`RuleSet`] against the affected [`DataSet`].

use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{DataSet, ExecutionReport, FieldChange, RuleSet};

/// How often an idle worker checks whether its rule set was stopped.
const IDLE_POLL: Duration = Duration::from_millis(50);

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("dispatcher is closed")]
    Closed,

    #[error("failed to spawn dispatcher thread")]
    Spawn(#[source] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Bound on queued events; senders block when it is full.
    pub queue_capacity: usize,
    pub thread_name: String,
    /// Re-execute a data set as soon as a change marks one of its sources stale.
    pub reevaluate_on_change: bool,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
            thread_name: "ruletree-dispatch".to_owned(),
            reevaluate_on_change: true,
        }
    }
}

#[derive(Debug)]
enum Event {
    Track(Arc<DataSet>),
    FieldChanged(FieldChange),
    Evaluate(String),
    Untrack(String),
    Shutdown,
}

/// Cloneable handle for feeding events to a [`Dispatcher`].
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: SyncSender<Event>,
}

impl EventSender {
    fn send(&self, event: Event) -> Result<(), DispatchError> {
        self.tx.send(event).map_err(|_| DispatchError::Closed)
    }

    /// Register a data set under its name and execute it once.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Closed`] once the worker has exited.
    pub fn track(&self, data_set: Arc<DataSet>) -> Result<(), DispatchError> {
        self.send(Event::Track(data_set))
    }

    /// Deliver an upstream change to the data set named by `change.subject`.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Closed`] once the worker has exited.
    pub fn field_changed(&self, change: FieldChange) -> Result<(), DispatchError> {
        self.send(Event::FieldChanged(change))
    }

    /// Execute a tracked data set regardless of staleness.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Closed`] once the worker has exited.
    pub fn evaluate(&self, subject: impl Into<String>) -> Result<(), DispatchError> {
        self.send(Event::Evaluate(subject.into()))
    }

    /// # Errors
    ///
    /// Returns [`DispatchError::Closed`] once the worker has exited.
    pub fn untrack(&self, subject: impl Into<String>) -> Result<(), DispatchError> {
        self.send(Event::Untrack(subject.into()))
    }
}

type Observer = Box<dyn FnMut(ExecutionReport) + Send>;

/// Owns the worker thread. Dropping it stops the worker.
#[derive(Debug)]
pub struct Dispatcher {
    sender: EventSender,
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl Dispatcher {
    /// # Errors
    ///
    /// Returns [`DispatchError::Spawn`] if the worker thread cannot be started.
    pub fn spawn(rule_set: Arc<RuleSet>, config: DispatcherConfig) -> Result<Self, DispatchError> {
        Self::start(rule_set, config, None)
    }

    /// Like [`spawn`](Self::spawn), handing every execution report to `observer`
    /// on the worker thread.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Spawn`] if the worker thread cannot be started.
    pub fn spawn_observed(
        rule_set: Arc<RuleSet>,
        config: DispatcherConfig,
        observer: impl FnMut(ExecutionReport) + Send + 'static,
    ) -> Result<Self, DispatchError> {
        Self::start(rule_set, config, Some(Box::new(observer)))
    }

    fn start(
        rule_set: Arc<RuleSet>,
        config: DispatcherConfig,
        observer: Option<Observer>,
    ) -> Result<Self, DispatchError> {
        let (tx, rx) = mpsc::sync_channel(config.queue_capacity.max(1));
        let cancel = CancellationToken::new();

        let worker = Worker {
            rule_set,
            rx,
            cancel: cancel.clone(),
            reevaluate_on_change: config.reevaluate_on_change,
            observer,
            subjects: HashMap::new(),
        };
        let handle = thread::Builder::new()
            .name(config.thread_name.clone())
            .spawn(move || worker.run())
            .map_err(DispatchError::Spawn)?;

        info!(thread = %config.thread_name, capacity = config.queue_capacity, "dispatcher started");
        Ok(Self {
            sender: EventSender { tx },
            cancel,
            handle: Some(handle),
        })
    }

    #[must_use]
    pub fn sender(&self) -> EventSender {
        self.sender.clone()
    }

    /// Whether the worker thread has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Cancel any in-flight execution and join the worker. Idempotent.
    pub fn stop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        self.cancel.cancel();
        // A full queue is fine: the worker sees the token on its next wakeup.
        let _ = self.sender.tx.try_send(Event::Shutdown);
        if handle.join().is_err() {
            warn!("dispatcher worker panicked");
        }
        info!("dispatcher stopped");
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

struct Worker {
    rule_set: Arc<RuleSet>,
    rx: Receiver<Event>,
    cancel: CancellationToken,
    reevaluate_on_change: bool,
    observer: Option<Observer>,
    subjects: HashMap<String, Arc<DataSet>>,
}

impl Worker {
    fn run(mut self) {
        loop {
            if self.cancel.is_cancelled() || self.rule_set.is_stopped() {
                break;
            }
            let event = match self.rx.recv_timeout(IDLE_POLL) {
                Ok(event) => event,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            };
            if !self.handle(event) {
                break;
            }
        }
        debug!(tracked = self.subjects.len(), "dispatcher worker exiting");
    }

    /// Returns false on shutdown.
    fn handle(&mut self, event: Event) -> bool {
        match event {
            Event::Shutdown => return false,
            Event::Track(data_set) => {
                let subject = data_set.name().to_owned();
                debug!(subject = %subject, "tracking data set");
                self.execute(&data_set);
                self.subjects.insert(subject, data_set);
            }
            Event::FieldChanged(change) => {
                let Some(data_set) = self.subjects.get(&change.subject).cloned() else {
                    debug!(subject = %change.subject, field = %change.field, "change for untracked subject");
                    return true;
                };
                let stale = data_set.notify(&change);
                debug!(
                    subject = %change.subject,
                    field = %change.field,
                    old = %change.old,
                    new = %change.new,
                    stale,
                    "field changed"
                );
                if stale > 0 && self.reevaluate_on_change {
                    self.execute(&data_set);
                }
            }
            Event::Evaluate(subject) => match self.subjects.get(&subject).cloned() {
                Some(data_set) => self.execute(&data_set),
                None => warn!(subject = %subject, "evaluate requested for untracked subject"),
            },
            Event::Untrack(subject) => {
                if self.subjects.remove(&subject).is_some() {
                    debug!(subject = %subject, "untracked data set");
                }
            }
        }
        true
    }

    fn execute(&mut self, data_set: &DataSet) {
        debug!("{}", data_set.report());
        let report = self.rule_set.execute_with(data_set, &self.cancel);
        if let Some(observer) = self.observer.as_mut() {
            observer(report);
        }
    }
}
