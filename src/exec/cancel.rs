// src/exec/cancel.rs

//! Cooperative cancellation flag shared between an orchestrator and the
//! executor.
//!
//! The orchestrator owns the flag and sets it; the executor only observes it,
//! either by awaiting [`CancelFlag::wait`] from a monitoring task or by polling
//! [`CancelFlag::is_canceled`] once the child has exited.

use std::sync::Arc;

use tokio::sync::watch;

/// State carried by a [`CancelFlag`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelState {
    NotSet,
    /// The work finished; observers should stand down.
    Completed,
    /// The orchestrator asked for the command to be stopped.
    Canceled,
    /// The agent is shutting down.
    ShutDown,
}

/// Cloneable handle to a shared cancellation state.
///
/// Clones observe and update the same underlying state. Once a state other
/// than `NotSet` is set, later calls to `set` are ignored.
#[derive(Debug, Clone)]
pub struct CancelFlag {
    tx: Arc<watch::Sender<CancelState>>,
}

impl CancelFlag {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(CancelState::NotSet);
        Self { tx: Arc::new(tx) }
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.set(CancelState::Canceled);
    }

    /// Move the flag out of `NotSet`. The first transition wins.
    pub fn set(&self, state: CancelState) {
        self.tx.send_if_modified(|current| {
            if *current == CancelState::NotSet && state != CancelState::NotSet {
                *current = state;
                true
            } else {
                false
            }
        });
    }

    pub fn state(&self) -> CancelState {
        *self.tx.borrow()
    }

    pub fn is_canceled(&self) -> bool {
        self.state() == CancelState::Canceled
    }

    pub fn is_shut_down(&self) -> bool {
        self.state() == CancelState::ShutDown
    }

    /// Wait until the flag leaves `NotSet` and return the state it moved to.
    pub async fn wait(&self) -> CancelState {
        let mut rx = self.tx.subscribe();
        match rx.wait_for(|s| *s != CancelState::NotSet).await {
            Ok(state) => *state,
            // The sender lives in `self`, so the channel cannot close while
            // we hold a reference; fall back to the current state anyway.
            Err(_) => self.state(),
        }
    }
}

impl Default for CancelFlag {
    fn default() -> Self {
        Self::new()
    }
}
