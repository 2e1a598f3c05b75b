// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Lifecycle event bus.
//!
//! Subscribers are plain callbacks invoked synchronously, in registration
//! order, on the task that emits the event. A subscriber that panics is
//! logged and skipped; the remaining subscribers still see the event. This
//! needs panics to unwind, so builds must not set `panic = "abort"`.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, Weak};

use serde::Serialize;

/// Counts produced by one drain pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Items delivered and marked synced.
    pub synced: usize,
    /// Items whose delivery failed (including those withdrawn).
    pub failed: usize,
    /// Failed items that were moved to dead letters during this pass.
    pub dead_lettered: usize,
    /// Snapshot items left untouched because connectivity dropped mid-pass.
    pub deferred: usize,
    /// Synced items removed by the retention sweep at the end of the pass.
    pub purged: usize,
}

/// Events published by the sync engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SyncEvent {
    /// Connectivity went from online to offline.
    Offline,
    /// Connectivity went from offline to online.
    Online,
    /// A drain pass started.
    SyncStarted,
    /// A drain pass finished.
    SyncCompleted(SyncReport),
    /// A drain pass failed as a whole (for example the store is unreachable).
    SyncFailed { message: String },
    /// An item was withdrawn from the retry path.
    ItemDeadLettered { id: i64, kind: String, reason: String },
}

type Callback = Arc<dyn Fn(&SyncEvent) + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    subscribers: Vec<(u64, Callback)>,
}

/// Publish/subscribe registry for [`SyncEvent`]s.
///
/// Cloning shares the registry.
#[derive(Clone, Default)]
pub struct EventBus {
    registry: Arc<Mutex<Registry>>,
}

impl EventBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback. It stays registered until the returned
    /// [`Subscription`] is dropped or [`Subscription::unsubscribe`] is called.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&SyncEvent) + Send + Sync + 'static,
    {
        let mut registry = self.registry.lock().unwrap_or_else(|e| e.into_inner());
        let id = registry.next_id;
        registry.next_id += 1;
        registry.subscribers.push((id, Arc::new(callback)));
        Subscription { registry: Arc::downgrade(&self.registry), id: Some(id) }
    }

    /// Number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.registry.lock().unwrap_or_else(|e| e.into_inner()).subscribers.len()
    }

    /// Deliver an event to every subscriber.
    ///
    /// The registry lock is released before callbacks run, so a callback
    /// may subscribe or unsubscribe without deadlocking.
    pub fn emit(&self, event: &SyncEvent) {
        let subscribers: Vec<(u64, Callback)> = self
            .registry
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .subscribers
            .clone();

        for (id, callback) in subscribers {
            if catch_unwind(AssertUnwindSafe(|| callback(event))).is_err() {
                tracing::warn!(subscriber = id, ?event, "event subscriber panicked");
            }
        }
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus").field("subscribers", &self.subscriber_count()).finish()
    }
}

/// Handle for a registered callback.
#[must_use = "dropping a Subscription unsubscribes its callback"]
pub struct Subscription {
    registry: Weak<Mutex<Registry>>,
    id: Option<u64>,
}

impl Subscription {
    /// Remove the callback from the bus.
    pub fn unsubscribe(mut self) {
        self.remove();
    }

    /// Keep the callback registered for the lifetime of the bus.
    pub fn detach(mut self) {
        self.id = None;
    }

    fn remove(&mut self) {
        let Some(id) = self.id.take() else {
            return;
        };
        if let Some(registry) = self.registry.upgrade() {
            let mut registry = registry.lock().unwrap_or_else(|e| e.into_inner());
            registry.subscribers.retain(|(sub_id, _)| *sub_id != id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.remove();
    }
}

#[cfg(test)]
#[path = "events_tests.rs"]
mod tests;
