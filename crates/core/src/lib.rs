// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! ps-core: Shared library for progsync
//!
//! This crate provides the progress operation types, the durable SQLite
//! queue, and the clock abstraction used by the sync engine and the
//! `psync` CLI.

pub mod clock;
pub mod db;
pub mod error;
pub mod item;
pub mod op;

pub use clock::{ClockSource, ManualClock, SystemClock};
pub use db::{QueueStore, DEFAULT_MAX_RETRIES};
pub use error::{Error, Result};
pub use item::{DeadLetter, QueueItem, RetryOutcome, StoredOp};
pub use op::{
    LessonStatus, LessonStatusUpdate, OpKind, ProgressOp, QuizAnswer, RestorePoint, TimeSpent,
    VideoPosition,
};
