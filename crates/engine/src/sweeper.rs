// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Retention sweep for the local queue.
//!
//! The sweep is the only thing that deletes rows: synced items past the
//! synced horizon and dead letters past the dead-letter horizon. Unsynced
//! items are never removed here.

use chrono::Duration;
use ps_core::{QueueStore, Result};
use serde::Serialize;

/// How long delivered and withdrawn rows are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    pub synced: Duration,
    pub dead_letters: Duration,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        RetentionPolicy { synced: Duration::hours(24), dead_letters: Duration::days(30) }
    }
}

/// Rows removed by one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub synced_purged: usize,
    pub dead_letters_purged: usize,
}

/// Apply `policy` to the store.
pub fn sweep(store: &QueueStore, policy: &RetentionPolicy) -> Result<SweepReport> {
    let synced_purged = store.purge_synced_older_than(policy.synced)?;
    let dead_letters_purged = store.purge_dead_letters_older_than(policy.dead_letters)?;
    if synced_purged > 0 || dead_letters_purged > 0 {
        tracing::debug!(synced_purged, dead_letters_purged, "retention sweep removed rows");
    }
    Ok(SweepReport { synced_purged, dead_letters_purged })
}

#[cfg(test)]
#[path = "sweeper_tests.rs"]
mod tests;
