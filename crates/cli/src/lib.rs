// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! pscli - command line front end for the progress sync engine.
//!
//! Each `psync` invocation opens the on-disk queue, probes the remote once
//! to learn connectivity, runs one command and exits. `psync watch` stays
//! resident and drains the queue whenever the remote becomes reachable.
//!
//! # Main Components
//!
//! - [`Cli`] - Argument definitions
//! - [`run`] - Executes a parsed command line
//! - [`Error`] - Error type for all commands

mod cli;
mod commands;
mod display;

pub mod error;

pub use cli::{Cli, Command, DeadLetterCommand, EnqueueCommand, LessonArgs};
pub use error::{Error, Result};

use ps_engine::{Config, EngineError};

/// Execute a parsed command line on a fresh single-threaded runtime.
pub fn run(cli: Cli) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
    runtime.block_on(execute(cli))
}

async fn execute(cli: Cli) -> Result<()> {
    let config = Config::load_or_default(cli.config.as_deref())?;
    let engine = commands::open_engine(&config, cli.queue.as_deref())?;
    let mut out = std::io::stdout();

    match cli.command {
        Command::Enqueue(command) => {
            commands::detect_connectivity(&engine, &config, cli.offline).await?;
            commands::enqueue::run(&engine, command.into_op(), &mut out).await
        }
        Command::Status { json } => {
            commands::detect_connectivity(&engine, &config, cli.offline).await?;
            commands::status::run(&engine, json, &mut out).await
        }
        Command::Pending { json } => commands::pending::run(&engine, json, &mut out).await,
        Command::Sync => {
            commands::detect_connectivity(&engine, &config, cli.offline).await?;
            commands::sync::run(&engine, &mut out).await
        }
        Command::Purge { hours } => commands::purge::run(&engine, hours, &mut out).await,
        Command::DeadLetters { command } => match command {
            None => commands::dead_letters::list(&engine, false, &mut out).await,
            Some(DeadLetterCommand::List { json }) => {
                commands::dead_letters::list(&engine, json, &mut out).await
            }
            Some(DeadLetterCommand::Requeue { id }) => {
                commands::dead_letters::requeue(&engine, id, &mut out).await
            }
            Some(DeadLetterCommand::Discard { id }) => {
                commands::dead_letters::discard(&engine, id, &mut out).await
            }
        },
        Command::Watch => {
            if cli.offline {
                return Err(EngineError::Offline.into());
            }
            let source = commands::probe_source(&config)?;
            let label = source.addr().to_string();
            commands::watch::run(&engine, source, &label, tokio::signal::ctrl_c(), &mut out).await
        }
    }
}
