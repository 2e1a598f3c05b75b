// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::io::Write;

use ps_engine::{DrainOutcome, ProgressRemote, SkipReason, SyncEngine};

use crate::display::format_report;
use crate::error::Result;

/// Deliver the queue now. Fails with `Offline` when the remote is unreachable.
pub async fn run<R>(engine: &SyncEngine<R>, out: &mut impl Write) -> Result<()>
where
    R: ProgressRemote + 'static,
{
    match engine.force_sync().await? {
        DrainOutcome::Completed(report) => writeln!(out, "{}", format_report(&report))?,
        DrainOutcome::Skipped(SkipReason::AlreadyDraining) => {
            writeln!(out, "A sync is already in progress")?
        }
        DrainOutcome::Skipped(SkipReason::Offline) => writeln!(out, "Went offline; nothing sent")?,
    }
    Ok(())
}

#[cfg(test)]
#[path = "sync_tests.rs"]
mod tests;
