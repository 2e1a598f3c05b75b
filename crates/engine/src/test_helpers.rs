// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for engine tests.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use ps_core::{LessonStatus, OpKind, ProgressOp};
use serde_json::Value;
use tokio::sync::Semaphore;

use crate::events::{EventBus, SyncEvent};
use crate::remote::{ProgressRemote, RemoteError, RemoteFuture};

/// A call received by [`MockRemote`], with its arguments.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteCall {
    VideoPosition {
        student_id: String,
        course_id: String,
        lesson_id: String,
        position_seconds: f64,
        duration_seconds: f64,
    },
    LessonStatus {
        student_id: String,
        course_id: String,
        lesson_id: String,
        status: LessonStatus,
    },
    TimeSpent {
        student_id: String,
        course_id: String,
        lesson_id: String,
        additional_seconds: f64,
    },
    RestorePoint {
        student_id: String,
        course_id: String,
        module_index: u32,
        lesson_index: u32,
        lesson_id: String,
        video_position: f64,
    },
    QuizAnswer {
        student_id: String,
        quiz_id: String,
        attempt_number: u32,
        question_id: String,
        answer: Value,
    },
}

impl RemoteCall {
    pub fn kind(&self) -> OpKind {
        match self {
            RemoteCall::VideoPosition { .. } => OpKind::VideoPosition,
            RemoteCall::LessonStatus { .. } => OpKind::LessonStatus,
            RemoteCall::TimeSpent { .. } => OpKind::TimeSpent,
            RemoteCall::RestorePoint { .. } => OpKind::RestorePoint,
            RemoteCall::QuizAnswer { .. } => OpKind::QuizAnswer,
        }
    }
}

/// How [`MockRemote`] answers a call.
#[derive(Debug, Clone, PartialEq)]
pub enum Behavior {
    Succeed,
    Fail(String),
    /// Never resolve.
    Hang,
}

type Hook = Arc<dyn Fn(&RemoteCall) + Send + Sync>;

struct MockState {
    calls: Vec<RemoteCall>,
    script: VecDeque<Behavior>,
    default: Behavior,
    gate: Option<Arc<Semaphore>>,
    on_call: Option<Hook>,
}

/// Mock remote for testing without a network.
///
/// Clones share state, so a test can keep one handle while the engine owns
/// another.
#[derive(Clone)]
pub struct MockRemote {
    state: Arc<Mutex<MockState>>,
}

impl MockRemote {
    /// A remote where every call succeeds.
    pub fn succeeding() -> Self {
        Self::with_default(Behavior::Succeed)
    }

    /// A remote where every call fails.
    pub fn failing() -> Self {
        Self::with_default(Behavior::Fail("mock failure".into()))
    }

    pub fn with_default(default: Behavior) -> Self {
        MockRemote {
            state: Arc::new(Mutex::new(MockState {
                calls: Vec::new(),
                script: VecDeque::new(),
                default,
                gate: None,
                on_call: None,
            })),
        }
    }

    /// Queue behaviors for the next calls; later calls use the default.
    pub fn script(&self, behaviors: impl IntoIterator<Item = Behavior>) {
        self.state.lock().unwrap().script.extend(behaviors);
    }

    /// Make every call wait for a permit on the returned semaphore.
    pub fn gate(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        self.state.lock().unwrap().gate = Some(gate.clone());
        gate
    }

    /// Run `hook` synchronously when a call is received.
    pub fn on_call<F>(&self, hook: F)
    where
        F: Fn(&RemoteCall) + Send + Sync + 'static,
    {
        self.state.lock().unwrap().on_call = Some(Arc::new(hook));
    }

    pub fn calls(&self) -> Vec<RemoteCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.state.lock().unwrap().calls.len()
    }

    /// Yield until at least `n` calls were received.
    pub async fn wait_for_calls(&self, n: usize) {
        for _ in 0..10_000 {
            if self.call_count() >= n {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("expected {n} remote calls, saw {}", self.call_count());
    }

    fn respond(&self, call: RemoteCall) -> RemoteFuture<'_> {
        let (behavior, gate, hook) = {
            let mut state = self.state.lock().unwrap();
            state.calls.push(call.clone());
            let behavior = match state.script.pop_front() {
                Some(behavior) => behavior,
                None => state.default.clone(),
            };
            (behavior, state.gate.clone(), state.on_call.clone())
        };
        if let Some(hook) = hook {
            hook(&call);
        }
        Box::pin(async move {
            if let Some(gate) = gate {
                if let Ok(permit) = gate.acquire().await {
                    permit.forget();
                }
            }
            match behavior {
                Behavior::Succeed => Ok(()),
                Behavior::Fail(message) => Err(RemoteError::RequestFailed(message)),
                Behavior::Hang => std::future::pending().await,
            }
        })
    }
}

impl ProgressRemote for MockRemote {
    fn save_video_position<'a>(
        &'a self,
        student_id: &'a str,
        course_id: &'a str,
        lesson_id: &'a str,
        position_seconds: f64,
        duration_seconds: f64,
    ) -> RemoteFuture<'a> {
        self.respond(RemoteCall::VideoPosition {
            student_id: student_id.into(),
            course_id: course_id.into(),
            lesson_id: lesson_id.into(),
            position_seconds,
            duration_seconds,
        })
    }

    fn update_lesson_status<'a>(
        &'a self,
        student_id: &'a str,
        course_id: &'a str,
        lesson_id: &'a str,
        status: LessonStatus,
    ) -> RemoteFuture<'a> {
        self.respond(RemoteCall::LessonStatus {
            student_id: student_id.into(),
            course_id: course_id.into(),
            lesson_id: lesson_id.into(),
            status,
        })
    }

    fn save_time_spent<'a>(
        &'a self,
        student_id: &'a str,
        course_id: &'a str,
        lesson_id: &'a str,
        additional_seconds: f64,
    ) -> RemoteFuture<'a> {
        self.respond(RemoteCall::TimeSpent {
            student_id: student_id.into(),
            course_id: course_id.into(),
            lesson_id: lesson_id.into(),
            additional_seconds,
        })
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
        self.respond(RemoteCall::RestorePoint {
            student_id: student_id.into(),
            course_id: course_id.into(),
            module_index,
            lesson_index,
            lesson_id: lesson_id.into(),
            video_position,
        })
    }

    fn save_quiz_answer<'a>(
        &'a self,
        student_id: &'a str,
        quiz_id: &'a str,
        attempt_number: u32,
        question_id: &'a str,
        answer: &'a Value,
    ) -> RemoteFuture<'a> {
        self.respond(RemoteCall::QuizAnswer {
            student_id: student_id.into(),
            quiz_id: quiz_id.into(),
            attempt_number,
            question_id: question_id.into(),
            answer: answer.clone(),
        })
    }
}

/// Records every event published on a bus.
#[derive(Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<SyncEvent>>>,
}

impl EventLog {
    /// Subscribe to `bus` for the lifetime of the bus.
    pub fn attach(bus: &EventBus) -> Self {
        let log = EventLog::default();
        let events = log.events.clone();
        bus.subscribe(move |event| events.lock().unwrap().push(event.clone()))
            .detach();
        log
    }

    pub fn events(&self) -> Vec<SyncEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }
}

/// Create a video position operation for lesson `n`.
pub fn video_op(n: u32) -> ProgressOp {
    let position = 30.0 * f64::from(n);
    ProgressOp::video_position("student-1", "course-1", format!("lesson-{n}"), position, 600.0)
}

/// Create a quiz answer operation for question `n`.
pub fn quiz_op(n: u32) -> ProgressOp {
    let answer = serde_json::json!({ "choice": n });
    ProgressOp::quiz_answer("student-1", "quiz-1", 1, format!("q-{n}"), answer)
}
