// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Remote progress API abstraction.
//!
//! Provides a trait-based remote layer that enables:
//! - Real HTTP RPC calls for production ([`RestRemote`])
//! - Mock remotes for unit testing
//!
//! There is one method per operation kind, each taking its arguments in a
//! fixed order. The mapping from queued operation to method lives in
//! [`crate::dispatch`].

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use ps_core::op::is_video_completed;
use ps_core::{LessonStatus, OpKind};
use serde_json::{json, Value};

use crate::config::RemoteConfig;

/// Error type for remote operations.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    /// The request could not be sent or the connection dropped.
    #[error("request failed: {0}")]
    RequestFailed(String),

    /// The remote answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The call did not finish within the dispatch timeout.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// Serialization/deserialization failed.
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// The client could not be constructed.
    #[error("invalid remote configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for remote operations.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Boxed future returned by every [`ProgressRemote`] call.
pub type RemoteFuture<'a> = Pin<Box<dyn Future<Output = RemoteResult<()>> + Send + 'a>>;

/// The remote authority for learning progress.
///
/// Delivery is at-least-once: a crash between a successful call and the
/// local `mark_synced` replays the call on the next drain, so
/// implementations should be idempotent where the backend allows.
pub trait ProgressRemote: Send + Sync {
    /// Persist playback position and duration for a lesson.
    fn save_video_position<'a>(
        &'a self,
        student_id: &'a str,
        course_id: &'a str,
        lesson_id: &'a str,
        position_seconds: f64,
        duration_seconds: f64,
    ) -> RemoteFuture<'a>;

    /// Update the completion status of a lesson.
    fn update_lesson_status<'a>(
        &'a self,
        student_id: &'a str,
        course_id: &'a str,
        lesson_id: &'a str,
        status: LessonStatus,
    ) -> RemoteFuture<'a>;

    /// Add seconds to the time-on-task total for a lesson.
    fn save_time_spent<'a>(
        &'a self,
        student_id: &'a str,
        course_id: &'a str,
        lesson_id: &'a str,
        additional_seconds: f64,
    ) -> RemoteFuture<'a>;

    /// Save the last module/lesson/video checkpoint for a course.
    fn save_restore_point<'a>(
        &'a self,
        student_id: &'a str,
        course_id: &'a str,
        module_index: u32,
        lesson_index: u32,
        lesson_id: &'a str,
        video_position: f64,
    ) -> RemoteFuture<'a>;

    /// Persist a single answer for a quiz attempt.
    fn save_quiz_answer<'a>(
        &'a self,
        student_id: &'a str,
        quiz_id: &'a str,
        attempt_number: u32,
        question_id: &'a str,
        answer: &'a Value,
    ) -> RemoteFuture<'a>;
}

/// Returns the RPC function name the REST remote calls for a kind.
pub fn rpc_function(kind: OpKind) -> &'static str {
    match kind {
        OpKind::VideoPosition => "save_video_position",
        OpKind::LessonStatus => "update_lesson_status",
        OpKind::TimeSpent => "save_time_spent",
        OpKind::RestorePoint => "save_restore_point",
        OpKind::QuizAnswer => "save_quiz_answer",
    }
}

/// HTTP remote that calls PostgREST-style RPC endpoints.
///
/// Each call is a `POST {base_url}/rest/v1/rpc/{function}` with a JSON body
/// of named arguments and the `apikey` / bearer headers the hosted backend
/// expects.
pub struct RestRemote {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl RestRemote {
    /// Create a remote for the given base URL.
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        request_timeout: Duration,
    ) -> RemoteResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| RemoteError::InvalidConfig(e.to_string()))?;

        Ok(RestRemote {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// Create a remote from the `[remote]` config section.
    pub fn from_config(config: &RemoteConfig) -> RemoteResult<Self> {
        Self::new(
            &config.url,
            config.api_key(),
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    /// Returns the endpoint for an RPC function.
    pub fn endpoint(&self, function: &str) -> String {
        format!("{}/rest/v1/rpc/{}", self.base_url, function)
    }

    fn call(&self, kind: OpKind, body: Value) -> RemoteFuture<'_> {
        let url = self.endpoint(rpc_function(kind));
        Box::pin(async move {
            let mut request = self.client.post(&url).json(&body);
            if let Some(key) = &self.api_key {
                request = request.header("apikey", key).bearer_auth(key);
            }

            let response = request
                .send()
                .await
                .map_err(|e| RemoteError::RequestFailed(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                let body = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "unknown error".to_string());
                return Err(RemoteError::Status { status: status.as_u16(), body });
            }

            tracing::debug!(%url, "remote call succeeded");
            Ok(())
        })
    }
}

impl ProgressRemote for RestRemote {
    fn save_video_position<'a>(
        &'a self,
        student_id: &'a str,
        course_id: &'a str,
        lesson_id: &'a str,
        position_seconds: f64,
        duration_seconds: f64,
    ) -> RemoteFuture<'a> {
        let completed = is_video_completed(position_seconds, duration_seconds);
        self.call(
            OpKind::VideoPosition,
            json!({
                "student_id": student_id,
                "course_id": course_id,
                "lesson_id": lesson_id,
                "position_seconds": position_seconds.floor() as i64,
                "duration_seconds": duration_seconds.floor() as i64,
                "video_completed": completed,
            }),
        )
    }

    fn update_lesson_status<'a>(
        &'a self,
        student_id: &'a str,
        course_id: &'a str,
        lesson_id: &'a str,
        status: LessonStatus,
    ) -> RemoteFuture<'a> {
        self.call(
            OpKind::LessonStatus,
            json!({
                "student_id": student_id,
                "course_id": course_id,
                "lesson_id": lesson_id,
                "status": status.as_str(),
            }),
        )
    }

    fn save_time_spent<'a>(
        &'a self,
        student_id: &'a str,
        course_id: &'a str,
        lesson_id: &'a str,
        additional_seconds: f64,
    ) -> RemoteFuture<'a> {
        self.call(
            OpKind::TimeSpent,
            json!({
                "student_id": student_id,
                "course_id": course_id,
                "lesson_id": lesson_id,
                "additional_seconds": additional_seconds.round() as i64,
            }),
        )
    }

    fn save_restore_point<'a>(
        &'a self,
        student_id: &'a str,
        course_id: &'a str,
        module_index: u32,
        lesson_index: u32,
        lesson_id: &'a str,
        video_position: f64,
    ) -> RemoteFuture<'a> {
        self.call(
            OpKind::RestorePoint,
            json!({
                "student_id": student_id,
                "course_id": course_id,
                "module_index": module_index,
                "lesson_index": lesson_index,
                "lesson_id": lesson_id,
                "video_position": video_position.floor() as i64,
            }),
        )
    }

    fn save_quiz_answer<'a>(
        &'a self,
        student_id: &'a str,
        quiz_id: &'a str,
        attempt_number: u32,
        question_id: &'a str,
        answer: &'a Value,
    ) -> RemoteFuture<'a> {
        self.call(
            OpKind::QuizAnswer,
            json!({
                "student_id": student_id,
                "quiz_id": quiz_id,
                "attempt_number": attempt_number,
                "question_id": question_id,
                "answer": answer,
            }),
        )
    }
}

#[cfg(test)]
#[path = "remote_tests.rs"]
mod tests;
