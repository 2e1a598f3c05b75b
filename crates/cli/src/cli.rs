// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use ps_core::{LessonStatus, ProgressOp};
use serde_json::Value;

const QUICKSTART_HELP: &str = "\
Get started:
  psync enqueue video-position --student s1 --course c1 --lesson l1 \\
      --position 42 --duration 600       Queue a playback position
  psync status                           Show connectivity and queue depth
  psync sync                             Deliver queued progress now
  psync watch                            Deliver whenever the remote is reachable";

#[derive(Parser)]
#[command(name = "psync", version)]
#[command(about = "Offline-first learning progress sync")]
#[command(
    long_about = "Offline-first learning progress sync.\n\n\
    Progress events are stored in a local queue and delivered to the remote \
    progress API when it is reachable."
)]
#[command(after_help = QUICKSTART_HELP)]
pub struct Cli {
    /// Config file (default: $XDG_CONFIG_HOME/progsync/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Queue database (overrides [queue] path)
    #[arg(long, global = true, value_name = "PATH")]
    pub queue: Option<PathBuf>,

    /// Treat the remote as unreachable; nothing is sent
    #[arg(long, global = true)]
    pub offline: bool,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Queue a progress event
    #[command(subcommand)]
    Enqueue(EnqueueCommand),

    /// Show connectivity, queue depth and dead letters
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List queued items that have not been delivered
    Pending {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Deliver queued items now (fails when offline)
    Sync,

    /// Delete delivered items older than the retention window
    Purge {
        /// Retention window in hours (default: [queue] retention_hours)
        #[arg(long)]
        hours: Option<u64>,
    },

    /// Inspect and replay items that could not be delivered
    #[command(name = "dead-letters")]
    DeadLetters {
        #[command(subcommand)]
        command: Option<DeadLetterCommand>,
    },

    /// Deliver queued items whenever the remote becomes reachable
    Watch,
}

impl Command {
    /// Log level used when `RUST_LOG` is unset.
    pub fn default_log_level(&self) -> &'static str {
        match self {
            Command::Watch => "info",
            _ => "warn",
        }
    }
}

#[derive(Subcommand)]
pub enum DeadLetterCommand {
    /// List dead letters
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Put a dead letter back on the queue
    Requeue {
        /// Dead letter id
        id: i64,
    },
    /// Delete a dead letter permanently
    Discard {
        /// Dead letter id
        id: i64,
    },
}

/// Identifies the student and lesson an event belongs to.
#[derive(Args, Debug, Clone)]
pub struct LessonArgs {
    #[arg(long)]
    pub student: String,
    #[arg(long)]
    pub course: String,
    #[arg(long)]
    pub lesson: String,
}

#[derive(Subcommand, Debug, Clone)]
pub enum EnqueueCommand {
    /// Playback position within a lesson video
    VideoPosition {
        #[command(flatten)]
        target: LessonArgs,
        /// Position in seconds
        #[arg(long, allow_negative_numbers = true)]
        position: f64,
        /// Video duration in seconds
        #[arg(long, allow_negative_numbers = true)]
        duration: f64,
    },
    /// Lesson completion status
    LessonStatus {
        #[command(flatten)]
        target: LessonArgs,
        /// not_started, in_progress or completed
        #[arg(long, value_parser = parse_lesson_status)]
        status: LessonStatus,
    },
    /// Additional time spent on a lesson
    TimeSpent {
        #[command(flatten)]
        target: LessonArgs,
        /// Seconds to add
        #[arg(long, allow_negative_numbers = true)]
        seconds: f64,
    },
    /// Checkpoint to resume a course from
    RestorePoint {
        #[arg(long)]
        student: String,
        #[arg(long)]
        course: String,
        #[arg(long)]
        module_index: u32,
        #[arg(long)]
        lesson_index: u32,
        #[arg(long, default_value = "")]
        lesson: String,
        /// Video position in seconds
        #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
        video_position: f64,
    },
    /// Answer to a quiz question
    QuizAnswer {
        #[arg(long)]
        student: String,
        #[arg(long)]
        quiz: String,
        #[arg(long)]
        attempt: u32,
        #[arg(long)]
        question: String,
        /// JSON value; anything that is not valid JSON is sent as a string
        #[arg(long, value_parser = parse_answer)]
        answer: Value,
    },
}

impl EnqueueCommand {
    /// Builds the operation to queue.
    pub fn into_op(self) -> ProgressOp {
        match self {
            EnqueueCommand::VideoPosition { target, position, duration } => {
                ProgressOp::video_position(
                    target.student,
                    target.course,
                    target.lesson,
                    position,
                    duration,
                )
            }
            EnqueueCommand::LessonStatus { target, status } => {
                ProgressOp::lesson_status(target.student, target.course, target.lesson, status)
            }
            EnqueueCommand::TimeSpent { target, seconds } => {
                ProgressOp::time_spent(target.student, target.course, target.lesson, seconds)
            }
            EnqueueCommand::RestorePoint {
                student,
                course,
                module_index,
                lesson_index,
                lesson,
                video_position,
            } => ProgressOp::restore_point(
                student,
                course,
                module_index,
                lesson_index,
                lesson,
                video_position,
            ),
            EnqueueCommand::QuizAnswer { student, quiz, attempt, question, answer } => {
                ProgressOp::quiz_answer(student, quiz, attempt, question, answer)
            }
        }
    }
}

fn parse_lesson_status(s: &str) -> Result<LessonStatus, String> {
    s.parse().map_err(|e: ps_core::Error| e.to_string())
}

fn parse_answer(s: &str) -> Result<Value, String> {
    Ok(serde_json::from_str(s).unwrap_or_else(|_| Value::String(s.to_string())))
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
