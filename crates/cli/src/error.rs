// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use ps_engine::EngineError;
use thiserror::Error;

/// Errors reported by `psync` commands.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("invalid remote url '{url}': {reason}\n  hint: set [remote] url in the config file")]
    InvalidRemoteUrl { url: String, reason: String },

    #[error("background task failed: {0}")]
    Task(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<ps_core::Error> for Error {
    fn from(e: ps_core::Error) -> Self {
        Error::Engine(EngineError::Store(e))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
