//! # Observable Tuner State
//!
//! A single-writer, multiple-reader cell holding the latest [`TunerState`].
//!
//! The [`StatePublisher`] is owned by whoever processes samples (normally the
//! [`TuningEvaluator`](crate::evaluator::TuningEvaluator)). Readers either poll
//! through a [`StateReader`] or wait on a [`Subscription`]. Neither side can
//! block the writer: the lock is only held to copy a `Copy` struct, and change
//! notifications go through a one-slot channel with `try_send`, so a slow
//! reader just sees fewer, coalesced notifications and then reads the newest
//! state.

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError, TrySendError};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use crate::evaluator::TunerState;

/// Write side of the cell. There is exactly one per cell.
#[derive(Debug)]
pub struct StatePublisher {
    cell: Arc<RwLock<TunerState>>,
    subscribers: Vec<Sender<()>>,
}

impl StatePublisher {
    pub fn new(initial: TunerState) -> Self {
        Self {
            cell: Arc::new(RwLock::new(initial)),
            subscribers: Vec::new(),
        }
    }

    /// Overwrites the current state and notifies subscribers.
    ///
    /// Never blocks on readers. Subscribers whose receiving end has been
    /// dropped are removed.
    pub fn publish(&mut self, state: TunerState) {
        *self.cell.write().unwrap_or_else(PoisonError::into_inner) = state;

        self.subscribers.retain(|changed| match changed.try_send(()) {
            Ok(()) | Err(TrySendError::Full(())) => true,
            Err(TrySendError::Disconnected(())) => false,
        });
    }

    /// Returns a polling handle onto the cell.
    pub fn reader(&self) -> StateReader {
        StateReader {
            cell: Arc::clone(&self.cell),
        }
    }

    /// Registers a new subscriber that is woken on every publish.
    pub fn subscribe(&mut self) -> Subscription {
        let (changed_tx, changed_rx) = crossbeam_channel::bounded(1);
        self.subscribers.push(changed_tx);
        Subscription {
            reader: self.reader(),
            changed: changed_rx,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

/// Read side of the cell. Cheap to clone and safe to share across threads.
#[derive(Debug, Clone)]
pub struct StateReader {
    cell: Arc<RwLock<TunerState>>,
}

impl StateReader {
    /// The most recently published state.
    pub fn latest(&self) -> TunerState {
        *self.cell.read().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A reader that can wait for the next publish.
///
/// Notifications coalesce: if several states are published between two
/// receives, only the newest one is returned.
#[derive(Debug)]
pub struct Subscription {
    reader: StateReader,
    changed: Receiver<()>,
}

impl Subscription {
    /// Blocks until the state changes. Returns `None` once the publisher is
    /// gone and no notification is pending.
    pub fn recv(&self) -> Option<TunerState> {
        self.changed.recv().ok().map(|()| self.reader.latest())
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Result<TunerState, RecvTimeoutError> {
        self.changed
            .recv_timeout(timeout)
            .map(|()| self.reader.latest())
    }

    pub fn try_recv(&self) -> Result<TunerState, TryRecvError> {
        self.changed.try_recv().map(|()| self.reader.latest())
    }

    pub fn latest(&self) -> TunerState {
        self.reader.latest()
    }

    pub fn reader(&self) -> StateReader {
        self.reader.clone()
    }
}
