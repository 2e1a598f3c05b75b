// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Mapping from queued operation to remote call.

use ps_core::ProgressOp;

use crate::remote::{ProgressRemote, RemoteFuture};

/// Deliver one operation through its kind-specific remote call.
///
/// The `match` is exhaustive over [`ProgressOp`], so a new operation kind
/// does not compile until it is routed here.
pub fn dispatch<'a, R>(remote: &'a R, op: &'a ProgressOp) -> RemoteFuture<'a>
where
    R: ProgressRemote + ?Sized,
{
    match op {
        ProgressOp::VideoPosition(p) => remote.save_video_position(
            &p.student_id,
            &p.course_id,
            &p.lesson_id,
            p.position_seconds,
            p.duration_seconds,
        ),
        ProgressOp::LessonStatus(p) => {
            remote.update_lesson_status(&p.student_id, &p.course_id, &p.lesson_id, p.status)
        }
        ProgressOp::TimeSpent(p) => remote.save_time_spent(
            &p.student_id,
            &p.course_id,
            &p.lesson_id,
            p.additional_seconds,
        ),
        ProgressOp::RestorePoint(p) => remote.save_restore_point(
            &p.student_id,
            &p.course_id,
            p.module_index,
            p.lesson_index,
            &p.lesson_id,
            p.video_position,
        ),
        ProgressOp::QuizAnswer(p) => remote.save_quiz_answer(
            &p.student_id,
            &p.quiz_id,
            p.attempt_number,
            &p.question_id,
            &p.answer,
        ),
    }
}

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;
