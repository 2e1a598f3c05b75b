// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::io::Write;

use ps_engine::{ProgressRemote, SyncEngine};

use crate::error::Result;

/// Largest hour count `chrono::Duration` accepts.
const MAX_HOURS: i64 = i64::MAX / 3_600_000;

/// Delete synced items older than `hours`, or the configured retention.
pub async fn run<R>(engine: &SyncEngine<R>, hours: Option<u64>, out: &mut impl Write) -> Result<()>
where
    R: ProgressRemote + 'static,
{
    let age = match hours {
        Some(hours) => {
            let hours = i64::try_from(hours).unwrap_or(i64::MAX).min(MAX_HOURS);
            chrono::Duration::hours(hours)
        }
        None => engine.options().retention.synced,
    };
    let removed = engine.purge_synced_older_than(age).await?;
    writeln!(out, "Purged {} synced item(s)", removed)?;
    Ok(())
}

#[cfg(test)]
#[path = "purge_tests.rs"]
mod tests;
