// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! The sync coordinator.
//!
//! [`SyncEngine`] owns the local queue and drains it against a
//! [`ProgressRemote`] whenever connectivity allows. At most one drain runs at
//! a time: the `Idle -> Draining` transition is a compare-and-set on an
//! atomic flag, and any trigger that loses the race is a no-op.
//!
//! A drain pass:
//! 1. snapshots the pending items,
//! 2. dispatches them one at a time, each bounded by the dispatch timeout,
//! 3. marks successes synced and records failures on the item,
//! 4. runs the retention sweep,
//! 5. publishes [`SyncEvent::SyncCompleted`].
//!
//! Items enqueued during a pass are not in its snapshot and wait for the
//! next one. If connectivity drops mid-pass the in-flight call finishes and
//! the rest of the snapshot is left untouched.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use ps_core::{
    ClockSource, DeadLetter, OpKind, ProgressOp, QueueItem, QueueStore, RetryOutcome, StoredOp,
    SystemClock,
};
use serde::Serialize;
use tokio::sync::OnceCell;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::connectivity::{Connectivity, ConnectivitySource, SharedConnectivity};
use crate::dispatch::dispatch;
use crate::error::{EngineError, EngineResult};
use crate::events::{EventBus, SyncEvent, SyncReport};
use crate::remote::{ProgressRemote, RemoteError};
use crate::sweeper::{self, RetentionPolicy, SweepReport};

/// Where the queue database lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    Path(PathBuf),
    InMemory,
}

/// Tunables for the coordinator.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineOptions {
    /// Failed attempts before an item is dead-lettered.
    pub max_retries: u32,
    /// Upper bound on a single remote call.
    pub dispatch_timeout: Duration,
    /// Horizons applied by the sweep at the end of each pass.
    pub retention: RetentionPolicy,
    /// Start a background drain after each enqueue while online.
    pub drain_on_enqueue: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        EngineOptions {
            max_retries: ps_core::DEFAULT_MAX_RETRIES,
            dispatch_timeout: Duration::from_secs(10),
            retention: RetentionPolicy::default(),
            drain_on_enqueue: true,
        }
    }
}

/// Snapshot returned by [`SyncEngine::status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SyncStatus {
    pub is_online: bool,
    pub pending_count: usize,
    pub sync_in_progress: bool,
    pub dead_letter_count: usize,
}

/// Why a drain request did not run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Offline,
    AlreadyDraining,
}

/// Result of a drain request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// A full pass ran.
    Completed(SyncReport),
    /// No pass ran.
    Skipped(SkipReason),
}

impl DrainOutcome {
    /// The pass report, or an empty report when skipped.
    pub fn report(&self) -> SyncReport {
        match self {
            DrainOutcome::Completed(report) => *report,
            DrainOutcome::Skipped(_) => SyncReport::default(),
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, DrainOutcome::Skipped(_))
    }
}

struct Inner<R> {
    location: StoreLocation,
    clock: Arc<dyn ClockSource>,
    options: EngineOptions,
    store: OnceCell<Mutex<QueueStore>>,
    remote: R,
    events: EventBus,
    connectivity: Arc<SharedConnectivity>,
    draining: AtomicBool,
}

/// Offline-first sync engine.
///
/// Cloning is cheap and shares all state.
pub struct SyncEngine<R> {
    inner: Arc<Inner<R>>,
}

impl<R> Clone for SyncEngine<R> {
    fn clone(&self) -> Self {
        SyncEngine { inner: Arc::clone(&self.inner) }
    }
}

/// Builder for [`SyncEngine`].
pub struct SyncEngineBuilder<R> {
    location: StoreLocation,
    remote: R,
    options: EngineOptions,
    clock: Option<Arc<dyn ClockSource>>,
    events: Option<EventBus>,
    connectivity: Option<Arc<SharedConnectivity>>,
}

impl<R: ProgressRemote + 'static> SyncEngineBuilder<R> {
    pub fn options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn ClockSource>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Publish on an existing bus instead of a fresh one.
    pub fn events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    /// Share connectivity state with the embedder.
    pub fn connectivity(mut self, connectivity: Arc<SharedConnectivity>) -> Self {
        self.connectivity = Some(connectivity);
        self
    }

    /// Initial reachability when no shared state was given (default: offline).
    pub fn online(mut self, online: bool) -> Self {
        self.connectivity = Some(Arc::new(SharedConnectivity::new(online)));
        self
    }

    /// Build the engine. The store is opened lazily by the first call that
    /// needs it, or by [`SyncEngine::init`].
    pub fn build(self) -> SyncEngine<R> {
        SyncEngine {
            inner: Arc::new(Inner {
                location: self.location,
                clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
                options: self.options,
                store: OnceCell::new(),
                remote: self.remote,
                events: self.events.unwrap_or_default(),
                connectivity: self.connectivity.unwrap_or_default(),
                draining: AtomicBool::new(false),
            }),
        }
    }
}

/// Resets the draining flag when a pass ends, including on early return.
struct DrainGuard<'a>(&'a AtomicBool);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

fn lock(store: &Mutex<QueueStore>) -> MutexGuard<'_, QueueStore> {
    store.lock().unwrap_or_else(|e| e.into_inner())
}

impl<R: ProgressRemote + 'static> SyncEngine<R> {
    /// Start building an engine for the queue at `location`.
    pub fn builder(location: StoreLocation, remote: R) -> SyncEngineBuilder<R> {
        SyncEngineBuilder {
            location,
            remote,
            options: EngineOptions::default(),
            clock: None,
            events: None,
            connectivity: None,
        }
    }

    /// The bus lifecycle events are published on.
    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    /// The shared connectivity state.
    pub fn connectivity(&self) -> Arc<SharedConnectivity> {
        Arc::clone(&self.inner.connectivity)
    }

    pub fn options(&self) -> &EngineOptions {
        &self.inner.options
    }

    pub fn is_online(&self) -> bool {
        self.inner.connectivity.is_online()
    }

    pub fn is_draining(&self) -> bool {
        self.inner.draining.load(Ordering::Acquire)
    }

    /// Open the local store.
    ///
    /// Idempotent, and concurrent callers share one attempt. On failure the
    /// next call tries again.
    pub async fn init(&self) -> EngineResult<()> {
        self.store().await.map(|_| ())
    }

    async fn store(&self) -> EngineResult<&Mutex<QueueStore>> {
        self.inner
            .store
            .get_or_try_init(|| async {
                let clock = Arc::clone(&self.inner.clock);
                let opened = match &self.inner.location {
                    StoreLocation::Path(path) => QueueStore::open_with_clock(path, clock),
                    StoreLocation::InMemory => QueueStore::open_in_memory_with_clock(clock),
                };
                match opened {
                    Ok(store) => {
                        let store = store.with_max_retries(self.inner.options.max_retries);
                        Ok(Mutex::new(store))
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "failed to open queue store");
                        Err(EngineError::StoreUnavailable(e.to_string()))
                    }
                }
            })
            .await
    }

    /// Persist an operation and return its id.
    ///
    /// Never waits on the network. When online (and `drain_on_enqueue` is
    /// set) a drain is started in the background.
    pub async fn enqueue(&self, op: &ProgressOp) -> EngineResult<i64> {
        let store = self.store().await?;
        let id = lock(store).enqueue(op)?;
        if self.inner.options.drain_on_enqueue {
            self.spawn_drain();
        }
        Ok(id)
    }

    /// Run one drain pass if online and no pass is running.
    ///
    /// Returns an error only when the pass itself fails, for example
    /// because the store cannot be opened; per-item failures are recorded
    /// on the items.
    pub async fn drain(&self) -> EngineResult<DrainOutcome> {
        if !self.is_online() {
            tracing::debug!("drain skipped: offline");
            return Ok(DrainOutcome::Skipped(SkipReason::Offline));
        }
        if self
            .inner
            .draining
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("drain skipped: already draining");
            return Ok(DrainOutcome::Skipped(SkipReason::AlreadyDraining));
        }
        let _guard = DrainGuard(&self.inner.draining);

        self.inner.events.emit(&SyncEvent::SyncStarted);
        match self.drain_pass().await {
            Ok(report) => {
                tracing::info!(
                    synced = report.synced,
                    failed = report.failed,
                    dead_lettered = report.dead_lettered,
                    deferred = report.deferred,
                    purged = report.purged,
                    "drain complete"
                );
                self.inner.events.emit(&SyncEvent::SyncCompleted(report));
                Ok(DrainOutcome::Completed(report))
            }
            Err(e) => {
                tracing::error!(error = %e, "drain failed");
                self.inner.events.emit(&SyncEvent::SyncFailed { message: e.to_string() });
                Err(e)
            }
        }
    }

    /// Drain now at the caller's request.
    ///
    /// Fails with [`EngineError::Offline`] when offline. When a pass is
    /// already running this returns [`SkipReason::AlreadyDraining`] instead
    /// of queuing another.
    pub async fn force_sync(&self) -> EngineResult<DrainOutcome> {
        if !self.is_online() {
            return Err(EngineError::Offline);
        }
        self.drain().await
    }

    async fn drain_pass(&self) -> EngineResult<SyncReport> {
        let store = self.store().await?;
        let snapshot = lock(store).list_pending()?;
        tracing::debug!(items = snapshot.len(), "drain snapshot taken");

        let mut report = SyncReport::default();
        for (index, item) in snapshot.iter().enumerate() {
            if !self.is_online() {
                report.deferred = snapshot.len() - index;
                tracing::info!(deferred = report.deferred, "went offline during drain");
                break;
            }
            self.process(store, item, &mut report).await?;
        }

        let swept = sweeper::sweep(&lock(store), &self.inner.options.retention)?;
        report.purged = swept.synced_purged;
        Ok(report)
    }

    async fn process(
        &self,
        store: &Mutex<QueueStore>,
        item: &QueueItem,
        report: &mut SyncReport,
    ) -> EngineResult<()> {
        let op = match &item.op {
            StoredOp::Progress(op) => op,
            StoredOp::Unknown { reason, .. } => {
                let reason = if item.kind.parse::<OpKind>().is_err() {
                    "unknown operation type".to_string()
                } else {
                    format!("undecodable payload: {reason}")
                };
                tracing::warn!(id = item.id, kind = %item.kind, %reason, "withdrawing item");
                report.failed += 1;
                if lock(store).dead_letter(item.id, &reason)? {
                    report.dead_lettered += 1;
                    self.emit_dead_lettered(item, reason);
                }
                return Ok(());
            }
        };

        let timeout = self.inner.options.dispatch_timeout;
        let result = match tokio::time::timeout(timeout, dispatch(&self.inner.remote, op)).await {
            Ok(result) => result,
            Err(_) => Err(RemoteError::Timeout(timeout)),
        };

        match result {
            Ok(()) => {
                lock(store).mark_synced(item.id)?;
                report.synced += 1;
                tracing::debug!(id = item.id, kind = %item.kind, "item synced");
            }
            Err(err) => {
                report.failed += 1;
                let message = err.to_string();
                let outcome = lock(store).increment_retry(item.id, &message)?;
                match outcome {
                    RetryOutcome::Retrying { retry_count } => {
                        tracing::warn!(
                            id = item.id,
                            kind = %item.kind,
                            retry_count,
                            error = %message,
                            "delivery failed"
                        );
                    }
                    RetryOutcome::DeadLettered { retry_count } => {
                        tracing::warn!(
                            id = item.id,
                            kind = %item.kind,
                            retry_count,
                            error = %message,
                            "retry limit reached"
                        );
                        report.dead_lettered += 1;
                        self.emit_dead_lettered(
                            item,
                            format!("retry limit reached after {retry_count} attempts: {message}"),
                        );
                    }
                    RetryOutcome::Missing => {
                        tracing::debug!(id = item.id, "item left the queue during dispatch");
                    }
                }
            }
        }
        Ok(())
    }

    fn emit_dead_lettered(&self, item: &QueueItem, reason: String) {
        self.inner.events.emit(&SyncEvent::ItemDeadLettered {
            id: item.id,
            kind: item.kind.clone(),
            reason,
        });
    }

    /// Start a background drain if one could run now.
    fn spawn_drain(&self) -> Option<JoinHandle<EngineResult<DrainOutcome>>> {
        if !self.is_online() || self.is_draining() {
            return None;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("no async runtime; drain not started");
            return None;
        };
        let engine = self.clone();
        Some(runtime.spawn(async move { engine.drain().await }))
    }

    /// Apply a platform connectivity signal.
    ///
    /// Offline to online publishes [`SyncEvent::Online`] and starts a drain,
    /// whose handle is returned. Online to offline publishes
    /// [`SyncEvent::Offline`] only. Repeated signals are ignored.
    pub fn handle_connectivity(
        &self,
        signal: Connectivity,
    ) -> Option<JoinHandle<EngineResult<DrainOutcome>>> {
        let online = signal.is_online();
        let was_online = self.inner.connectivity.set(online);
        if was_online == online {
            return None;
        }

        if online {
            tracing::info!("connectivity restored");
            self.inner.events.emit(&SyncEvent::Online);
            self.spawn_drain()
        } else {
            tracing::info!("connectivity lost");
            self.inner.events.emit(&SyncEvent::Offline);
            None
        }
    }

    /// Feed signals from `source` into the engine until it closes or
    /// `cancel` fires.
    pub fn watch<S>(&self, mut source: S, cancel: CancellationToken) -> JoinHandle<()>
    where
        S: ConnectivitySource + 'static,
    {
        let engine = self.clone();
        tokio::spawn(async move {
            loop {
                let signal = tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::debug!("connectivity watch cancelled");
                        return;
                    }
                    signal = source.next_change() => signal,
                };
                match signal {
                    Some(signal) => {
                        engine.handle_connectivity(signal);
                    }
                    None => {
                        tracing::debug!("connectivity source closed");
                        return;
                    }
                }
            }
        })
    }

    /// Current connectivity, queue depth and drain state.
    pub async fn status(&self) -> EngineResult<SyncStatus> {
        let store = self.store().await?;
        let (pending_count, dead_letter_count) = {
            let store = lock(store);
            (store.pending_count()?, store.dead_letter_count()?)
        };
        Ok(SyncStatus {
            is_online: self.is_online(),
            pending_count,
            sync_in_progress: self.is_draining(),
            dead_letter_count,
        })
    }

    pub async fn list_pending(&self) -> EngineResult<Vec<QueueItem>> {
        let store = self.store().await?;
        Ok(lock(store).list_pending()?)
    }

    /// Delete synced items delivered more than `age` ago.
    pub async fn purge_synced_older_than(&self, age: chrono::Duration) -> EngineResult<usize> {
        let store = self.store().await?;
        Ok(lock(store).purge_synced_older_than(age)?)
    }

    /// Run the retention sweep with the configured policy.
    pub async fn sweep(&self) -> EngineResult<SweepReport> {
        let store = self.store().await?;
        Ok(sweeper::sweep(&lock(store), &self.inner.options.retention)?)
    }

    pub async fn list_dead_letters(&self) -> EngineResult<Vec<DeadLetter>> {
        let store = self.store().await?;
        Ok(lock(store).list_dead_letters()?)
    }

    /// Move a dead letter back onto the queue with a fresh retry budget.
    pub async fn requeue_dead_letter(&self, id: i64) -> EngineResult<i64> {
        let store = self.store().await?;
        let new_id = lock(store).requeue_dead_letter(id)?;
        tracing::info!(id, new_id, "dead letter requeued");
        if self.inner.options.drain_on_enqueue {
            self.spawn_drain();
        }
        Ok(new_id)
    }

    pub async fn discard_dead_letter(&self, id: i64) -> EngineResult<()> {
        let store = self.store().await?;
        lock(store).discard_dead_letter(id)?;
        tracing::info!(id, "dead letter discarded");
        Ok(())
    }

    /// Run `f` against the store, for inspection and maintenance.
    pub async fn with_store<T>(
        &self,
        f: impl FnOnce(&mut QueueStore) -> ps_core::Result<T>,
    ) -> EngineResult<T> {
        let store = self.store().await?;
        let mut guard = lock(store);
        Ok(f(&mut guard)?)
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
