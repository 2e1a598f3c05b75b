// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![deny(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

use std::fs;
use std::path::Path;

use clap::Parser;
use pscli::Cli;

fn main() {
    let cli = Cli::parse();
    setup_logging(cli.log_file.as_deref(), cli.command.default_log_level());
    if let Err(e) = pscli::run(cli) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

fn setup_logging(log_path: Option<&Path>, default_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // Try to open the log file, fall back to stderr
    let file = log_path.and_then(|path| {
        fs::OpenOptions::new().create(true).append(true).open(path).ok()
    });
    let _ = if let Some(file) = file {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(file)
            .with_ansi(false)
            .try_init()
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).try_init()
    };
}
