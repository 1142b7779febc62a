// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Cancellation signal (§5, §9): a single "stop" broadcast threaded through
//! every cancellable wait — a poll round, a PQ certificate wait, the
//! finalization loop itself. Modeled on the teacher's `core.rs::CoreSignals`
//! `watch::channel` pattern, collapsed to the one signal this engine needs
//! rather than `CoreSignals`' per-event set.

use std::sync::Arc;

use tokio::sync::watch;

/// Owning half of the stop signal. One `StopHandle` lives on `Context`;
/// calling `stop()` is broadcast to every `StopWaiter` cloned from it.
#[derive(Clone)]
pub struct StopHandle {
    sender: Arc<watch::Sender<bool>>,
    receiver: watch::Receiver<bool>,
}

impl StopHandle {
    pub fn new() -> Self {
        let (sender, receiver) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
            receiver,
        }
    }

    /// Signals every waiter derived from this handle. Idempotent.
    pub fn stop(&self) {
        self.sender.send(true).ok();
    }

    pub fn is_stopped(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Hands out a receiving half for a component to observe cancellation.
    pub fn waiter(&self) -> StopWaiter {
        StopWaiter {
            receiver: self.receiver.clone(),
        }
    }
}

impl Default for StopHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving half of the stop signal, cloned into whatever component needs
/// to race a cancellable wait against it.
#[derive(Clone)]
pub struct StopWaiter {
    receiver: watch::Receiver<bool>,
}

impl StopWaiter {
    pub fn is_stopped(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Resolves once `StopHandle::stop` is called (or immediately, if it
    /// already was). Intended for `tokio::select!` against the operation
    /// being made cancellable.
    pub async fn cancelled(&mut self) {
        while !*self.receiver.borrow() {
            if self.receiver.changed().await.is_err() {
                // Sender dropped without ever stopping; treat as stopped so
                // waiters don't block forever on an abandoned handle.
                return;
            }
        }
    }
}
