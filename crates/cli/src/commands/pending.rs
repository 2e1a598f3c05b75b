// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::io::Write;

use ps_engine::{ProgressRemote, SyncEngine};

use crate::display::format_pending_item;
use crate::error::Result;

pub async fn run<R>(engine: &SyncEngine<R>, json: bool, out: &mut impl Write) -> Result<()>
where
    R: ProgressRemote + 'static,
{
    let items = engine.list_pending().await?;
    if json {
        writeln!(out, "{}", serde_json::to_string_pretty(&items)?)?;
        return Ok(());
    }
    if items.is_empty() {
        writeln!(out, "No pending items")?;
    }
    for item in &items {
        writeln!(out, "{}", format_pending_item(item))?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "pending_tests.rs"]
mod tests;
