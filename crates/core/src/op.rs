// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Progress operations captured while a learner works through a course.
//!
//! Each [`ProgressOp`] variant corresponds to exactly one remote call. The
//! set is closed: adding a kind means adding a variant, which forces every
//! `match` over operations (dispatch, storage, display) to handle it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Fraction of a video that must be watched before it counts as completed.
pub const VIDEO_COMPLETION_THRESHOLD: f64 = 0.9;

/// Discriminant of a [`ProgressOp`], as stored in the `kind` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpKind {
    VideoPosition,
    LessonStatus,
    TimeSpent,
    RestorePoint,
    QuizAnswer,
}

impl OpKind {
    /// All kinds, in declaration order.
    pub const ALL: [OpKind; 5] = [
        OpKind::VideoPosition,
        OpKind::LessonStatus,
        OpKind::TimeSpent,
        OpKind::RestorePoint,
        OpKind::QuizAnswer,
    ];

    /// Returns the string representation used in storage and display.
    pub fn as_str(&self) -> &'static str {
        match self {
            OpKind::VideoPosition => "video_position",
            OpKind::LessonStatus => "lesson_status",
            OpKind::TimeSpent => "time_spent",
            OpKind::RestorePoint => "restore_point",
            OpKind::QuizAnswer => "quiz_answer",
        }
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OpKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        OpKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| Error::UnknownOperationType(s.to_string()))
    }
}

/// Completion state of a single lesson.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LessonStatus {
    NotStarted,
    InProgress,
    Completed,
}

impl LessonStatus {
    /// Returns the string representation used on the wire and in display.
    pub fn as_str(&self) -> &'static str {
        match self {
            LessonStatus::NotStarted => "not_started",
            LessonStatus::InProgress => "in_progress",
            LessonStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for LessonStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for LessonStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "not_started" => Ok(LessonStatus::NotStarted),
            "in_progress" => Ok(LessonStatus::InProgress),
            "completed" | "done" => Ok(LessonStatus::Completed),
            _ => Err(Error::InvalidLessonStatus(s.to_string())),
        }
    }
}

/// Playback position within a lesson video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoPosition {
    pub student_id: String,
    pub course_id: String,
    pub lesson_id: String,
    pub position_seconds: f64,
    pub duration_seconds: f64,
}

impl VideoPosition {
    /// Returns true once the watched fraction crosses
    /// [`VIDEO_COMPLETION_THRESHOLD`]. Unknown durations never complete.
    pub fn is_completed(&self) -> bool {
        is_video_completed(self.position_seconds, self.duration_seconds)
    }
}

/// Returns true when `position_seconds` covers at least
/// [`VIDEO_COMPLETION_THRESHOLD`] of `duration_seconds`.
pub fn is_video_completed(position_seconds: f64, duration_seconds: f64) -> bool {
    duration_seconds > 0.0 && position_seconds / duration_seconds >= VIDEO_COMPLETION_THRESHOLD
}

/// Lesson completion status change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LessonStatusUpdate {
    pub student_id: String,
    pub course_id: String,
    pub lesson_id: String,
    pub status: LessonStatus,
}

/// Time-on-task increment; the remote side accumulates it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSpent {
    pub student_id: String,
    pub course_id: String,
    pub lesson_id: String,
    pub additional_seconds: f64,
}

/// Last module/lesson/video checkpoint, used to resume a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestorePoint {
    pub student_id: String,
    pub course_id: String,
    pub module_index: u32,
    pub lesson_index: u32,
    pub lesson_id: String,
    #[serde(default)]
    pub video_position: f64,
}

/// A single answer within a quiz attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizAnswer {
    pub student_id: String,
    pub quiz_id: String,
    pub attempt_number: u32,
    pub question_id: String,
    pub answer: serde_json::Value,
}

/// A queued progress operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressOp {
    VideoPosition(VideoPosition),
    LessonStatus(LessonStatusUpdate),
    TimeSpent(TimeSpent),
    RestorePoint(RestorePoint),
    QuizAnswer(QuizAnswer),
}

impl ProgressOp {
    /// Creates a VideoPosition operation.
    pub fn video_position(
        student_id: impl Into<String>,
        course_id: impl Into<String>,
        lesson_id: impl Into<String>,
        position_seconds: f64,
        duration_seconds: f64,
    ) -> Self {
        ProgressOp::VideoPosition(VideoPosition {
            student_id: student_id.into(),
            course_id: course_id.into(),
            lesson_id: lesson_id.into(),
            position_seconds,
            duration_seconds,
        })
    }

    /// Creates a LessonStatus operation.
    pub fn lesson_status(
        student_id: impl Into<String>,
        course_id: impl Into<String>,
        lesson_id: impl Into<String>,
        status: LessonStatus,
    ) -> Self {
        ProgressOp::LessonStatus(LessonStatusUpdate {
            student_id: student_id.into(),
            course_id: course_id.into(),
            lesson_id: lesson_id.into(),
            status,
        })
    }

    /// Creates a TimeSpent operation.
    pub fn time_spent(
        student_id: impl Into<String>,
        course_id: impl Into<String>,
        lesson_id: impl Into<String>,
        additional_seconds: f64,
    ) -> Self {
        ProgressOp::TimeSpent(TimeSpent {
            student_id: student_id.into(),
            course_id: course_id.into(),
            lesson_id: lesson_id.into(),
            additional_seconds,
        })
    }

    /// Creates a RestorePoint operation.
    pub fn restore_point(
        student_id: impl Into<String>,
        course_id: impl Into<String>,
        module_index: u32,
        lesson_index: u32,
        lesson_id: impl Into<String>,
        video_position: f64,
    ) -> Self {
        ProgressOp::RestorePoint(RestorePoint {
            student_id: student_id.into(),
            course_id: course_id.into(),
            module_index,
            lesson_index,
            lesson_id: lesson_id.into(),
            video_position,
        })
    }

    /// Creates a QuizAnswer operation.
    pub fn quiz_answer(
        student_id: impl Into<String>,
        quiz_id: impl Into<String>,
        attempt_number: u32,
        question_id: impl Into<String>,
        answer: serde_json::Value,
    ) -> Self {
        ProgressOp::QuizAnswer(QuizAnswer {
            student_id: student_id.into(),
            quiz_id: quiz_id.into(),
            attempt_number,
            question_id: question_id.into(),
            answer,
        })
    }

    /// Returns the kind of this operation.
    pub fn kind(&self) -> OpKind {
        match self {
            ProgressOp::VideoPosition(_) => OpKind::VideoPosition,
            ProgressOp::LessonStatus(_) => OpKind::LessonStatus,
            ProgressOp::TimeSpent(_) => OpKind::TimeSpent,
            ProgressOp::RestorePoint(_) => OpKind::RestorePoint,
            ProgressOp::QuizAnswer(_) => OpKind::QuizAnswer,
        }
    }

    /// Checks the payload before it is persisted.
    ///
    /// Identifiers must be non-empty and second counts finite and
    /// non-negative. Bad input is rejected here rather than burning retries
    /// against a remote that will never accept it.
    pub fn validate(&self) -> Result<()> {
        match self {
            ProgressOp::VideoPosition(p) => {
                require("student_id", &p.student_id)?;
                require("course_id", &p.course_id)?;
                require("lesson_id", &p.lesson_id)?;
                seconds("position_seconds", p.position_seconds)?;
                seconds("duration_seconds", p.duration_seconds)
            }
            ProgressOp::LessonStatus(p) => {
                require("student_id", &p.student_id)?;
                require("course_id", &p.course_id)?;
                require("lesson_id", &p.lesson_id)
            }
            ProgressOp::TimeSpent(p) => {
                require("student_id", &p.student_id)?;
                require("course_id", &p.course_id)?;
                require("lesson_id", &p.lesson_id)?;
                seconds("additional_seconds", p.additional_seconds)
            }
            ProgressOp::RestorePoint(p) => {
                require("student_id", &p.student_id)?;
                require("course_id", &p.course_id)?;
                seconds("video_position", p.video_position)
            }
            ProgressOp::QuizAnswer(p) => {
                require("student_id", &p.student_id)?;
                require("quiz_id", &p.quiz_id)?;
                require("question_id", &p.question_id)
            }
        }
    }

    /// Serializes the variant body (without the type tag) for the `payload`
    /// column.
    pub fn payload_json(&self) -> Result<String> {
        let json = match self {
            ProgressOp::VideoPosition(p) => serde_json::to_string(p)?,
            ProgressOp::LessonStatus(p) => serde_json::to_string(p)?,
            ProgressOp::TimeSpent(p) => serde_json::to_string(p)?,
            ProgressOp::RestorePoint(p) => serde_json::to_string(p)?,
            ProgressOp::QuizAnswer(p) => serde_json::to_string(p)?,
        };
        Ok(json)
    }

    /// Rebuilds an operation from its stored `kind` and `payload` columns.
    pub fn from_parts(kind: OpKind, payload: &str) -> Result<Self> {
        let op = match kind {
            OpKind::VideoPosition => ProgressOp::VideoPosition(serde_json::from_str(payload)?),
            OpKind::LessonStatus => ProgressOp::LessonStatus(serde_json::from_str(payload)?),
            OpKind::TimeSpent => ProgressOp::TimeSpent(serde_json::from_str(payload)?),
            OpKind::RestorePoint => ProgressOp::RestorePoint(serde_json::from_str(payload)?),
            OpKind::QuizAnswer => ProgressOp::QuizAnswer(serde_json::from_str(payload)?),
        };
        Ok(op)
    }
}

fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::InvalidInput(format!("{field} is required")));
    }
    Ok(())
}

fn seconds(field: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(Error::InvalidInput(format!(
            "{field} must be a non-negative number of seconds, got {value}"
        )));
    }
    Ok(())
}

#[cfg(test)]
#[path = "op_tests.rs"]
mod tests;
