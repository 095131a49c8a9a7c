//! One-shot alarm scheduling.
//!
//! The engine never polls: after each recompute the host arms exactly one
//! alarm at the projection's next transition, clamped by [`SAFETY_TICK`].
//! Arming cancels whatever alarm was pending, so at most one is ever live.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{Duration, Utc};
use parking_lot::Mutex;
use tokio::task::JoinHandle;

use crate::models::time::Instant;

/// Upper bound between two recomputes.
pub const SAFETY_TICK: std::time::Duration = std::time::Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AlarmHandle(pub u64);

pub type AlarmCallback = Box<dyn FnOnce() + Send + 'static>;

/// Host-provided timer facility.
pub trait Scheduler: Send + Sync {
    fn schedule_at(&self, at: Instant, callback: AlarmCallback) -> AlarmHandle;

    /// Cancelling an alarm that already fired is a no-op.
    fn cancel(&self, handle: AlarmHandle);
}

/// Earliest of `next` and one safety tick after `now`.
pub fn next_wake(next: Instant, now: Instant) -> Instant {
    let tick = now + Duration::from_std(SAFETY_TICK).unwrap_or_else(|_| Duration::seconds(60));
    next.min(tick)
}

/// Holds the single pending alarm of one owner.
pub struct AlarmSlot<S: Scheduler> {
    scheduler: S,
    pending: Mutex<Option<AlarmHandle>>,
}

impl<S: Scheduler> AlarmSlot<S> {
    pub fn new(scheduler: S) -> Self {
        Self {
            scheduler,
            pending: Mutex::new(None),
        }
    }

    /// Cancel the pending alarm, if any, and schedule a new one.
    pub fn arm(&self, at: Instant, callback: AlarmCallback) -> AlarmHandle {
        let mut pending = self.pending.lock();
        if let Some(previous) = pending.take() {
            self.scheduler.cancel(previous);
        }
        let handle = self.scheduler.schedule_at(at, callback);
        *pending = Some(handle);
        handle
    }

    pub fn disarm(&self) {
        if let Some(previous) = self.pending.lock().take() {
            self.scheduler.cancel(previous);
        }
    }

    pub fn is_armed(&self) -> bool {
        self.pending.lock().is_some()
    }
}

impl<S: Scheduler> Drop for AlarmSlot<S> {
    fn drop(&mut self) {
        self.disarm();
    }
}

/// Tokio timer tasks, one per alarm.
#[derive(Clone, Default)]
pub struct TokioScheduler {
    tasks: Arc<Mutex<HashMap<u64, JoinHandle<()>>>>,
    next_id: Arc<AtomicU64>,
}

impl TokioScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> usize {
        self.tasks.lock().len()
    }
}

impl Scheduler for TokioScheduler {
    /// Must be called from within a Tokio runtime.
    fn schedule_at(&self, at: Instant, callback: AlarmCallback) -> AlarmHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let delay = (at - Utc::now()).to_std().unwrap_or_default();
        let tasks = Arc::clone(&self.tasks);

        // Hold the map while spawning so an immediate alarm cannot remove
        // itself before it is inserted.
        let mut pending = self.tasks.lock();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            tasks.lock().remove(&id);
            callback();
        });
        pending.insert(id, task);
        drop(pending);
        log::trace!("alarm {} armed for {}", id, at);
        AlarmHandle(id)
    }

    fn cancel(&self, handle: AlarmHandle) {
        if let Some(task) = self.tasks.lock().remove(&handle.0) {
            task.abort();
            log::trace!("alarm {} cancelled", handle.0);
        }
    }
}
