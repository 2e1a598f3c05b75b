// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Error types surfaced by the engine.
//!
//! Per-item delivery failures never appear here; the coordinator records
//! them on the item and moves on.

use thiserror::Error;

use crate::remote::RemoteError;

#[derive(Debug, Error)]
pub enum EngineError {
    /// The local store could not be opened. The next call retries.
    #[error("local store unavailable: {0}")]
    StoreUnavailable(String),

    /// A manual sync was requested while offline.
    #[error("cannot sync while offline")]
    Offline,

    #[error(transparent)]
    Store(#[from] ps_core::Error),

    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),

    #[error("config error: {0}")]
    Config(String),
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
