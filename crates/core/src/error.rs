// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for ps-core operations.

use thiserror::Error;

/// All possible errors that can occur in ps-core operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("dead letter not found: {0}")]
    DeadLetterNotFound(i64),

    #[error("unknown operation type: '{0}'\n  hint: valid types are: video_position, lesson_status, time_spent, restore_point, quiz_answer")]
    UnknownOperationType(String),

    #[error("invalid lesson status: '{0}'\n  hint: valid statuses are: not_started, in_progress, completed")]
    InvalidLessonStatus(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("corrupted data: {0}")]
    CorruptedData(String),
}

/// A specialized Result type for ps-core operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
