// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::io::Write;

use ps_engine::{ProgressRemote, SyncEngine};

use crate::display::format_dead_letter;
use crate::error::Result;

pub async fn list<R>(engine: &SyncEngine<R>, json: bool, out: &mut impl Write) -> Result<()>
where
    R: ProgressRemote + 'static,
{
    let letters = engine.list_dead_letters().await?;
    if json {
        writeln!(out, "{}", serde_json::to_string_pretty(&letters)?)?;
        return Ok(());
    }
    if letters.is_empty() {
        writeln!(out, "No dead letters")?;
    }
    for letter in &letters {
        writeln!(out, "{}", format_dead_letter(letter))?;
    }
    Ok(())
}

pub async fn requeue<R>(engine: &SyncEngine<R>, id: i64, out: &mut impl Write) -> Result<()>
where
    R: ProgressRemote + 'static,
{
    let new_id = engine.requeue_dead_letter(id).await?;
    writeln!(out, "Requeued dead letter #{} as #{}", id, new_id)?;
    Ok(())
}

pub async fn discard<R>(engine: &SyncEngine<R>, id: i64, out: &mut impl Write) -> Result<()>
where
    R: ProgressRemote + 'static,
{
    engine.discard_dead_letter(id).await?;
    writeln!(out, "Discarded dead letter #{}", id)?;
    Ok(())
}

#[cfg(test)]
#[path = "dead_letters_tests.rs"]
mod tests;
