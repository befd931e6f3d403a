//! Per-call cancellation and deadline signal.
//!
//! # Design
//! A `Context` is cheap to clone and carries an optional absolute deadline
//! plus an optional cancellation signal. The client combines it with its own
//! configured timeout: whichever limit is nearer wins. A cancellable context
//! runs the network call on a worker thread and waits on the signal, so a
//! cancel that fires mid-call returns `TransportError::Cancelled` at once.
//! The abandoned worker finishes on its own, bounded by the effective
//! deadline.

use std::sync::mpsc::{self, TryRecvError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::error::TransportError;

#[derive(Debug, Clone, Default)]
pub struct Context {
    deadline: Option<Instant>,
    cancel: Option<Arc<CancelSignal>>,
}

#[derive(Debug, Default)]
struct CancelSignal {
    cancelled: Mutex<bool>,
    wake: Condvar,
}

impl CancelSignal {
    fn notify(&self) {
        let _guard = self.cancelled.lock();
        self.wake.notify_all();
    }
}

/// Wakes the waiting caller when the worker is done, including by panic.
struct WakeOnDrop(Arc<CancelSignal>);

impl Drop for WakeOnDrop {
    fn drop(&mut self) {
        self.0.notify();
    }
}

impl Context {
    /// A context that never cancels and has no deadline of its own.
    pub fn background() -> Self {
        Self::default()
    }

    /// Deadline `timeout` from now. A timeout too large to represent as an
    /// instant means no deadline of the caller's own.
    pub fn with_timeout(timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => Self::with_deadline(deadline),
            None => Self::background(),
        }
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
            cancel: None,
        }
    }

    /// Attach a cancellation signal, returning the handle that trips it.
    pub fn with_cancel(self) -> (Self, CancelHandle) {
        let signal = Arc::new(CancelSignal::default());
        let ctx = Self {
            deadline: self.deadline,
            cancel: Some(Arc::clone(&signal)),
        };
        (ctx, CancelHandle(signal))
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|signal| *signal.cancelled.lock())
    }

    /// Time budget for one call: the smaller of `limit` and the time left
    /// until this context's deadline.
    pub(crate) fn effective_timeout(&self, limit: Duration) -> Result<Duration, TransportError> {
        if self.is_cancelled() {
            return Err(TransportError::Cancelled);
        }
        let Some(deadline) = self.deadline else {
            return Ok(limit);
        };
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(TransportError::Timeout(
                "caller deadline passed before dispatch".to_string(),
            ));
        }
        Ok(remaining.min(limit))
    }

    /// Run `work` and return its result, or `Cancelled` as soon as this
    /// context is cancelled. Without a cancellation signal `work` runs on
    /// the calling thread.
    pub(crate) fn run<R, F>(&self, work: F) -> Result<R, TransportError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let Some(signal) = &self.cancel else {
            return Ok(work());
        };

        let (tx, rx) = mpsc::channel();
        let wake = WakeOnDrop(Arc::clone(signal));
        thread::spawn(move || {
            let _wake = wake;
            let tx = tx;
            // The receiver is gone only if the caller already gave up.
            let _ = tx.send(work());
        });

        let mut cancelled = signal.cancelled.lock();
        loop {
            match rx.try_recv() {
                Ok(result) => return Ok(result),
                Err(TryRecvError::Disconnected) => {
                    return Err(TransportError::Connection(
                        "transport worker exited without a result".into(),
                    ))
                }
                Err(TryRecvError::Empty) => {}
            }
            if *cancelled {
                return Err(TransportError::Cancelled);
            }
            signal.wake.wait(&mut cancelled);
        }
    }
}

/// Trips the cancellation signal of the `Context` it was created with.
#[derive(Debug, Clone)]
pub struct CancelHandle(Arc<CancelSignal>);

impl CancelHandle {
    pub fn cancel(&self) {
        *self.0.cancelled.lock() = true;
        self.0.wake.notify_all();
    }
}
