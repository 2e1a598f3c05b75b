// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::future::Future;
use std::io::Write;
use std::time::Duration;

use ps_engine::{ConnectivitySource, ProgressRemote, SyncEngine};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::display::format_event;
use crate::error::{Error, Result};

/// Print engine events and drain on reconnect until `shutdown` resolves or
/// the connectivity source ends.
pub async fn run<R, S, F>(
    engine: &SyncEngine<R>,
    source: S,
    label: &str,
    shutdown: F,
    out: &mut impl Write,
) -> Result<()>
where
    R: ProgressRemote + 'static,
    S: ConnectivitySource + 'static,
    F: Future<Output = std::io::Result<()>>,
{
    engine.init().await?;
    // Subscribers run on the emitting task; lines are written here instead.
    let (tx, mut lines) = mpsc::unbounded_channel();
    let subscription = engine.events().subscribe(move |event| {
        let _ = tx.send(format_event(event));
    });

    let cancel = CancellationToken::new();
    let mut watcher = engine.watch(source, cancel.clone());
    writeln!(out, "Watching {} (Ctrl-C to stop)", label)?;
    out.flush()?;

    let mut shutdown = std::pin::pin!(shutdown);
    let interrupted = loop {
        tokio::select! {
            signal = &mut shutdown => {
                signal?;
                break true;
            }
            joined = &mut watcher => {
                joined.map_err(|e| Error::Task(e.to_string()))?;
                break false;
            }
            Some(line) = lines.recv() => {
                writeln!(out, "{}", line)?;
                out.flush()?;
            }
        }
    };
    if interrupted {
        cancel.cancel();
        watcher.await.map_err(|e| Error::Task(e.to_string()))?;
    }

    // Let an in-flight pass record its outcomes before exiting.
    loop {
        while let Ok(line) = lines.try_recv() {
            writeln!(out, "{}", line)?;
        }
        if !engine.is_draining() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    subscription.unsubscribe();
    while let Ok(line) = lines.try_recv() {
        writeln!(out, "{}", line)?;
    }
    writeln!(out, "Stopped")?;
    Ok(())
}

#[cfg(test)]
#[path = "watch_tests.rs"]
mod tests;
