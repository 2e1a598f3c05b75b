// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Rows of the local queue and dead-letter tables.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::op::{OpKind, ProgressOp};

/// The operation carried by a queue row.
///
/// Rows written by a newer build may carry a kind (or payload shape) this
/// build cannot decode. Those surface as [`StoredOp::Unknown`] instead of
/// failing the whole listing, so the coordinator can withdraw them.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StoredOp {
    Progress(ProgressOp),
    Unknown {
        kind: String,
        payload: String,
        reason: String,
    },
}

impl StoredOp {
    /// Decodes the `kind` and `payload` columns.
    pub fn decode(kind: &str, payload: &str) -> Self {
        let decoded = kind
            .parse::<OpKind>()
            .and_then(|k| ProgressOp::from_parts(k, payload));
        match decoded {
            Ok(op) => StoredOp::Progress(op),
            Err(e) => StoredOp::Unknown {
                kind: kind.to_string(),
                payload: payload.to_string(),
                reason: e.to_string(),
            },
        }
    }
}

/// A queued progress operation plus its sync metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueueItem {
    /// Store-assigned, monotonically increasing id.
    pub id: i64,
    /// Raw `kind` column.
    pub kind: String,
    pub op: StoredOp,
    pub enqueued_at: DateTime<Utc>,
    pub synced: bool,
    pub synced_at: Option<DateTime<Utc>>,
    pub retry_count: u32,
    pub last_retry_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl QueueItem {
    /// Returns the decoded operation, if this build understands it.
    pub fn progress_op(&self) -> Option<&ProgressOp> {
        match &self.op {
            StoredOp::Progress(op) => Some(op),
            StoredOp::Unknown { .. } => None,
        }
    }
}

/// An item withdrawn from the retry path.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeadLetter {
    /// The queue id the item had before it was withdrawn.
    pub id: i64,
    pub kind: String,
    pub payload: String,
    pub enqueued_at: DateTime<Utc>,
    pub retry_count: u32,
    pub last_error: Option<String>,
    pub dead_at: DateTime<Utc>,
}

/// Result of recording a failed delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryOutcome {
    /// The item stays pending with the new retry count.
    Retrying { retry_count: u32 },
    /// The retry ceiling was reached and the item moved to dead letters.
    DeadLettered { retry_count: u32 },
    /// No pending item with that id exists.
    Missing,
}
