// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Text rendering for command output.

use chrono::{DateTime, SecondsFormat, Utc};
use ps_core::{DeadLetter, QueueItem};
use ps_engine::{SyncEvent, SyncReport, SyncStatus};

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}

pub fn format_status(status: &SyncStatus) -> String {
    format!(
        "online:       {}\npending:      {}\ndead letters: {}\nsyncing:      {}",
        yes_no(status.is_online),
        status.pending_count,
        status.dead_letter_count,
        yes_no(status.sync_in_progress),
    )
}

/// One line per pending item, with the last error indented below it.
pub fn format_pending_item(item: &QueueItem) -> String {
    let mut line = format!("#{} {} queued {}", item.id, item.kind, timestamp(item.enqueued_at));
    if item.retry_count > 0 {
        line.push_str(&format!(" (retries: {})", item.retry_count));
    }
    if let Some(error) = &item.last_error {
        line.push_str(&format!("\n    last error: {}", error));
    }
    line
}

pub fn format_dead_letter(letter: &DeadLetter) -> String {
    let mut line = format!(
        "#{} {} withdrawn {} after {} attempt(s)",
        letter.id,
        letter.kind,
        timestamp(letter.dead_at),
        letter.retry_count
    );
    if let Some(error) = &letter.last_error {
        line.push_str(&format!("\n    reason: {}", error));
    }
    line
}

pub fn format_report(report: &SyncReport) -> String {
    let mut line = format!("Synced {}, failed {}", report.synced, report.failed);
    if report.dead_lettered > 0 {
        line.push_str(&format!(", dead-lettered {}", report.dead_lettered));
    }
    if report.deferred > 0 {
        line.push_str(&format!(", deferred {}", report.deferred));
    }
    if report.purged > 0 {
        line.push_str(&format!(", purged {}", report.purged));
    }
    line
}

pub fn format_event(event: &SyncEvent) -> String {
    match event {
        SyncEvent::Offline => "offline".to_string(),
        SyncEvent::Online => "online".to_string(),
        SyncEvent::SyncStarted => "sync started".to_string(),
        SyncEvent::SyncCompleted(report) => format_report(report),
        SyncEvent::SyncFailed { message } => format!("sync failed: {}", message),
        SyncEvent::ItemDeadLettered { id, kind, reason } => {
            format!("withdrew #{} {}: {}", id, kind, reason)
        }
    }
}

#[cfg(test)]
#[path = "display_tests.rs"]
mod tests;
