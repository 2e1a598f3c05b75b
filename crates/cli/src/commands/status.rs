// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::io::Write;

use ps_engine::{ProgressRemote, SyncEngine};

use crate::display::format_status;
use crate::error::Result;

pub async fn run<R>(engine: &SyncEngine<R>, json: bool, out: &mut impl Write) -> Result<()>
where
    R: ProgressRemote + 'static,
{
    let status = engine.status().await?;
    if json {
        writeln!(out, "{}", serde_json::to_string_pretty(&status)?)?;
    } else {
        writeln!(out, "{}", format_status(&status))?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
