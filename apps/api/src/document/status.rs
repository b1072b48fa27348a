//! Save-status signal: `Idle -> Saving -> {Saved, Error} -> Idle`, surfaced
//! through a watch channel so the UI side can subscribe. Terminal statuses
//! auto-reset to `Idle` after a fixed display duration; the reset is gated
//! on a generation counter, so any status change that lands before the timer
//! fires supersedes it without explicit cancellation.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveStatus {
    Idle,
    Saving,
    Saved,
    Error,
}

pub struct StatusCell {
    tx: watch::Sender<SaveStatus>,
    generation: AtomicU64,
}

impl StatusCell {
    pub fn new() -> Arc<Self> {
        let (tx, _rx) = watch::channel(SaveStatus::Idle);
        Arc::new(StatusCell {
            tx,
            generation: AtomicU64::new(0),
        })
    }

    pub fn get(&self) -> SaveStatus {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SaveStatus> {
        self.tx.subscribe()
    }

    /// Sets the status and returns the generation of this change.
    pub fn set(&self, status: SaveStatus) -> u64 {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        // send_replace never fails; the cell owns the sender.
        self.tx.send_replace(status);
        generation
    }

    /// Schedules the timed reset back to `Idle`. Fires only if no later
    /// status change has bumped the generation in the meantime.
    pub fn settle_to_idle(self: &Arc<Self>, after: Duration, generation: u64) {
        let cell = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            if cell.generation.load(Ordering::SeqCst) == generation {
                cell.set(SaveStatus::Idle);
            }
        });
    }
}
