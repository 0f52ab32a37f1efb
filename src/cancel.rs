//! Process-scoped cancellation signal
//!
//! A [`CancelToken`] is a "done" condition that background loops can wait on
//! alongside their own channels. Cancelling drops the only sender of an
//! internal channel, so every `select!` arm on [`CancelToken::done`] fires
//! immediately with a disconnect.

use crossbeam_channel::{bounded, Receiver, Sender};
use std::sync::{Arc, Mutex};

/// Cloneable cancellation handle
#[derive(Debug, Clone)]
pub struct CancelToken {
    sender: Arc<Mutex<Option<Sender<()>>>>,
    done: Receiver<()>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    /// Create a token that is not yet cancelled
    pub fn new() -> Self {
        let (tx, rx) = bounded(0);
        Self {
            sender: Arc::new(Mutex::new(Some(tx))),
            done: rx,
        }
    }

    /// Signal cancellation; returns `true` for the call that actually cancelled
    pub fn cancel(&self) -> bool {
        let mut guard = match self.sender.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.take().is_some()
    }

    /// Whether [`cancel`](Self::cancel) has been called
    pub fn is_cancelled(&self) -> bool {
        match self.sender.lock() {
            Ok(guard) => guard.is_none(),
            Err(poisoned) => poisoned.into_inner().is_none(),
        }
    }

    /// Receiver that becomes ready (disconnected) once cancelled
    ///
    /// Nothing is ever sent on it; use it as a `select!` arm.
    pub fn done(&self) -> &Receiver<()> {
        &self.done
    }
}
