// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::io::Write;

use ps_core::ProgressOp;
use ps_engine::{DrainOutcome, ProgressRemote, SyncEngine};

use crate::display::format_report;
use crate::error::Result;

/// Queue `op`, then deliver the queue if the remote is reachable.
///
/// A failed delivery does not fail the command; the item stays queued.
pub async fn run<R>(engine: &SyncEngine<R>, op: ProgressOp, out: &mut impl Write) -> Result<()>
where
    R: ProgressRemote + 'static,
{
    let kind = op.kind();
    let id = engine.enqueue(&op).await?;

    if !engine.is_online() {
        writeln!(out, "Queued {} #{} (offline)", kind, id)?;
        return Ok(());
    }
    writeln!(out, "Queued {} #{}", kind, id)?;

    match engine.drain().await {
        Ok(DrainOutcome::Completed(report)) => writeln!(out, "{}", format_report(&report))?,
        Ok(DrainOutcome::Skipped(reason)) => tracing::debug!(?reason, "drain skipped"),
        Err(e) => tracing::warn!(error = %e, "queued item was not delivered"),
    }
    Ok(())
}

#[cfg(test)]
#[path = "enqueue_tests.rs"]
mod tests;
