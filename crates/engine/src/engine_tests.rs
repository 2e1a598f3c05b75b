// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Tests for the sync coordinator.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use super::*;
use crate::connectivity::channel;
use crate::test_helpers::{quiz_op, video_op, Behavior, EventLog, MockRemote};
use chrono::{TimeZone, Utc};
use ps_core::{LessonStatus, ManualClock};
use tempfile::TempDir;

fn manual_options() -> EngineOptions {
    EngineOptions { drain_on_enqueue: false, ..EngineOptions::default() }
}

fn online_engine(remote: MockRemote) -> SyncEngine<MockRemote> {
    SyncEngine::builder(StoreLocation::InMemory, remote)
        .options(manual_options())
        .online(true)
        .build()
}

fn completed(outcome: DrainOutcome) -> SyncReport {
    match outcome {
        DrainOutcome::Completed(report) => report,
        DrainOutcome::Skipped(reason) => panic!("drain skipped: {reason:?}"),
    }
}

async fn item(engine: &SyncEngine<MockRemote>, id: i64) -> Option<QueueItem> {
    engine.with_store(|store| store.get_item(id)).await.unwrap()
}

async fn yield_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..10_000 {
        if condition() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition not reached");
}

#[tokio::test]
async fn drain_delivers_every_pending_item() {
    let remote = MockRemote::succeeding();
    let engine = online_engine(remote.clone());

    engine.enqueue(&video_op(1)).await.unwrap();
    let status =
        ProgressOp::lesson_status("student-1", "course-1", "lesson-1", LessonStatus::Completed);
    engine.enqueue(&status).await.unwrap();
    engine.enqueue(&quiz_op(1)).await.unwrap();

    let report = completed(engine.drain().await.unwrap());

    assert_eq!(report.synced, 3);
    assert_eq!(report.failed, 0);
    assert_eq!(engine.status().await.unwrap().pending_count, 0);
    let kinds: Vec<OpKind> = remote.calls().iter().map(|c| c.kind()).collect();
    assert_eq!(kinds, vec![OpKind::VideoPosition, OpKind::LessonStatus, OpKind::QuizAnswer]);
}

#[tokio::test]
async fn failing_item_is_dead_lettered_after_five_drains() {
    let remote = MockRemote::failing();
    let engine = online_engine(remote.clone());
    let log = EventLog::attach(engine.events());
    let id = engine.enqueue(&video_op(1)).await.unwrap();

    for attempt in 1..=4u32 {
        let report = completed(engine.drain().await.unwrap());
        assert_eq!(report.failed, 1);
        assert_eq!(report.dead_lettered, 0);
        assert_eq!(item(&engine, id).await.unwrap().retry_count, attempt);
    }

    let report = completed(engine.drain().await.unwrap());
    assert_eq!(report.dead_lettered, 1);
    assert!(engine.list_pending().await.unwrap().is_empty());
    assert!(item(&engine, id).await.is_none());

    let dead = engine.list_dead_letters().await.unwrap();
    assert_eq!(dead.len(), 1);
    assert_eq!(dead[0].id, id);
    assert_eq!(dead[0].retry_count, 5);
    assert_eq!(dead[0].last_error.as_deref(), Some("request failed: mock failure"));

    assert!(log
        .events()
        .iter()
        .any(|e| matches!(e, SyncEvent::ItemDeadLettered { id: dead_id, .. } if *dead_id == id)));

    // Gone for good: later drains make no calls.
    completed(engine.drain().await.unwrap());
    assert_eq!(remote.call_count(), 5);
}

#[tokio::test]
async fn concurrent_drains_run_a_single_pass() {
    let remote = MockRemote::succeeding();
    let gate = remote.gate();
    let engine = online_engine(remote.clone());
    engine.enqueue(&video_op(1)).await.unwrap();

    let first = tokio::spawn({
        let engine = engine.clone();
        async move { engine.drain().await }
    });
    remote.wait_for_calls(1).await;

    assert!(engine.status().await.unwrap().sync_in_progress);
    assert_eq!(engine.drain().await.unwrap(), DrainOutcome::Skipped(SkipReason::AlreadyDraining));
    assert_eq!(
        engine.force_sync().await.unwrap(),
        DrainOutcome::Skipped(SkipReason::AlreadyDraining)
    );

    gate.add_permits(10);
    let report = completed(first.await.unwrap().unwrap());

    assert_eq!(report.synced, 1);
    assert_eq!(remote.call_count(), 1);
    assert!(!engine.is_draining());
}

#[tokio::test]
async fn going_offline_mid_drain_defers_the_rest() {
    let remote = MockRemote::succeeding();
    remote.script([Behavior::Fail("flaky".into())]);
    let engine = online_engine(remote.clone());
    let connectivity = engine.connectivity();
    remote.on_call(move |_| {
        connectivity.set(false);
    });

    let first = engine.enqueue(&video_op(1)).await.unwrap();
    let second = engine.enqueue(&video_op(2)).await.unwrap();
    let third = engine.enqueue(&video_op(3)).await.unwrap();

    let report = completed(engine.drain().await.unwrap());

    assert_eq!(report.failed, 1);
    assert_eq!(report.deferred, 2);
    assert_eq!(remote.call_count(), 1);

    // The dispatched item keeps its outcome.
    assert_eq!(item(&engine, first).await.unwrap().retry_count, 1);
    // The rest were never attempted.
    for id in [second, third] {
        let pending = item(&engine, id).await.unwrap();
        assert!(!pending.synced);
        assert_eq!(pending.retry_count, 0);
        assert!(pending.last_retry_at.is_none());
    }
    assert_eq!(engine.status().await.unwrap().pending_count, 3);
}

#[tokio::test]
async fn purge_removes_only_old_synced_items() {
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2026, 9, 1, 12, 0, 0).unwrap());
    let remote = MockRemote::succeeding();
    let engine = SyncEngine::builder(StoreLocation::InMemory, remote)
        .options(manual_options())
        .clock(Arc::new(clock.clone()))
        .online(true)
        .build();

    let old = engine.enqueue(&video_op(1)).await.unwrap();
    completed(engine.drain().await.unwrap());

    clock.advance(chrono::Duration::hours(23));
    let recent = engine.enqueue(&video_op(2)).await.unwrap();
    completed(engine.drain().await.unwrap());
    engine.connectivity().set(false);
    let pending = engine.enqueue(&video_op(3)).await.unwrap();

    clock.advance(chrono::Duration::hours(2));
    let removed = engine.purge_synced_older_than(chrono::Duration::hours(24)).await.unwrap();

    assert_eq!(removed, 1);
    assert!(item(&engine, old).await.is_none());
    assert!(item(&engine, recent).await.unwrap().synced);
    assert!(!item(&engine, pending).await.unwrap().synced);
}

#[tokio::test]
async fn drain_runs_the_retention_sweep() {
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2026, 9, 1, 12, 0, 0).unwrap());
    let engine = SyncEngine::builder(StoreLocation::InMemory, MockRemote::succeeding())
        .options(manual_options())
        .clock(Arc::new(clock.clone()))
        .online(true)
        .build();

    engine.enqueue(&video_op(1)).await.unwrap();
    assert_eq!(completed(engine.drain().await.unwrap()).purged, 0);

    clock.advance(chrono::Duration::hours(25));
    engine.enqueue(&video_op(2)).await.unwrap();
    let report = completed(engine.drain().await.unwrap());

    assert_eq!(report.synced, 1);
    assert_eq!(report.purged, 1);
}

#[tokio::test]
async fn drain_completes_with_retention_past_the_calendar() {
    let retention = RetentionPolicy {
        synced: chrono::Duration::hours(i64::MAX / 3_600_000),
        dead_letters: chrono::Duration::MAX,
    };
    let options = EngineOptions { retention, ..manual_options() };
    let engine = SyncEngine::builder(StoreLocation::InMemory, MockRemote::succeeding())
        .options(options)
        .online(true)
        .build();
    let log = EventLog::attach(engine.events());

    engine.enqueue(&video_op(1)).await.unwrap();
    let report = completed(engine.drain().await.unwrap());

    assert_eq!(report.synced, 1);
    assert_eq!(report.purged, 0);
    assert!(log.events().iter().any(|e| matches!(e, SyncEvent::SyncCompleted(_))));
}

#[tokio::test]
async fn offline_enqueues_drain_once_on_reconnect() {
    let remote = MockRemote::succeeding();
    let engine = SyncEngine::builder(StoreLocation::InMemory, remote.clone()).build();
    let log = EventLog::attach(engine.events());

    for n in 1..=3 {
        engine.enqueue(&video_op(n)).await.unwrap();
    }
    let status = engine.status().await.unwrap();
    assert!(!status.is_online);
    assert_eq!(status.pending_count, 3);
    assert_eq!(remote.call_count(), 0);

    let drain = engine.handle_connectivity(Connectivity::Online).expect("drain started");
    let report = completed(drain.await.unwrap().unwrap());

    let expected = SyncReport { synced: 3, ..SyncReport::default() };
    assert_eq!(report, expected);
    assert_eq!(engine.status().await.unwrap().pending_count, 0);
    assert_eq!(
        log.events(),
        vec![SyncEvent::Online, SyncEvent::SyncStarted, SyncEvent::SyncCompleted(expected)]
    );
}

#[tokio::test]
async fn quiz_answer_failing_twice_then_succeeding() {
    let remote = MockRemote::succeeding();
    remote.script([Behavior::Fail("503".into()), Behavior::Fail("503".into())]);
    let engine = online_engine(remote.clone());
    let id = engine.enqueue(&quiz_op(4)).await.unwrap();

    assert_eq!(completed(engine.drain().await.unwrap()).failed, 1);
    assert_eq!(completed(engine.drain().await.unwrap()).failed, 1);
    assert_eq!(completed(engine.drain().await.unwrap()).synced, 1);

    let synced = item(&engine, id).await.unwrap();
    assert!(synced.synced);
    assert!(synced.synced_at.is_some());
    assert_eq!(synced.retry_count, 2);
    assert_eq!(remote.call_count(), 3);
}

#[tokio::test]
async fn force_sync_rejects_when_offline() {
    let engine = SyncEngine::builder(StoreLocation::InMemory, MockRemote::succeeding()).build();
    engine.enqueue(&video_op(1)).await.unwrap();

    assert!(matches!(engine.force_sync().await, Err(EngineError::Offline)));
    assert_eq!(engine.drain().await.unwrap(), DrainOutcome::Skipped(SkipReason::Offline));
    assert_eq!(engine.status().await.unwrap().pending_count, 1);
}

#[tokio::test(start_paused = true)]
async fn dispatch_timeout_counts_as_failure() {
    let remote = MockRemote::with_default(Behavior::Hang);
    let engine = SyncEngine::builder(StoreLocation::InMemory, remote)
        .options(EngineOptions {
            dispatch_timeout: Duration::from_millis(50),
            ..manual_options()
        })
        .online(true)
        .build();
    let id = engine.enqueue(&video_op(1)).await.unwrap();

    let report = completed(engine.drain().await.unwrap());

    assert_eq!(report.failed, 1);
    let pending = item(&engine, id).await.unwrap();
    assert_eq!(pending.retry_count, 1);
    assert!(pending.last_error.unwrap().contains("timed out"));
}

#[tokio::test]
async fn unknown_kind_is_dead_lettered_without_a_call() {
    let remote = MockRemote::succeeding();
    let engine = online_engine(remote.clone());
    let log = EventLog::attach(engine.events());
    let id = engine
        .with_store(|store| {
            store.conn.execute(
                "INSERT INTO queue (kind, payload, enqueued_at)
                 VALUES ('certificate_issued', '{}', '2026-09-01T00:00:00.000000Z')",
                [],
            )?;
            Ok(store.conn.last_insert_rowid())
        })
        .await
        .unwrap();

    let report = completed(engine.drain().await.unwrap());

    assert_eq!(report.synced, 0);
    assert_eq!(report.failed, 1);
    assert_eq!(report.dead_lettered, 1);
    assert_eq!(remote.call_count(), 0);
    assert!(item(&engine, id).await.is_none());

    let dead = engine.list_dead_letters().await.unwrap();
    assert_eq!(dead[0].kind, "certificate_issued");
    assert_eq!(dead[0].last_error.as_deref(), Some("unknown operation type"));
    assert!(log.events().contains(&SyncEvent::ItemDeadLettered {
        id,
        kind: "certificate_issued".into(),
        reason: "unknown operation type".into(),
    }));
}

#[tokio::test]
async fn items_enqueued_during_a_drain_wait_for_the_next() {
    let remote = MockRemote::succeeding();
    let gate = remote.gate();
    let engine = online_engine(remote.clone());
    engine.enqueue(&video_op(1)).await.unwrap();

    let running = tokio::spawn({
        let engine = engine.clone();
        async move { engine.drain().await }
    });
    remote.wait_for_calls(1).await;
    let late = engine.enqueue(&video_op(2)).await.unwrap();

    gate.add_permits(10);
    assert_eq!(completed(running.await.unwrap().unwrap()).synced, 1);
    assert!(!item(&engine, late).await.unwrap().synced);

    assert_eq!(completed(engine.drain().await.unwrap()).synced, 1);
    assert!(item(&engine, late).await.unwrap().synced);
}

#[tokio::test]
async fn enqueue_while_online_drains_in_background() {
    let remote = MockRemote::succeeding();
    let engine = SyncEngine::builder(StoreLocation::InMemory, remote.clone()).online(true).build();
    let log = EventLog::attach(engine.events());

    let id = engine.enqueue(&video_op(1)).await.unwrap();
    yield_until(|| log.events().iter().any(|e| matches!(e, SyncEvent::SyncCompleted(_)))).await;

    assert!(item(&engine, id).await.unwrap().synced);
    assert_eq!(remote.call_count(), 1);
}

#[tokio::test]
async fn invalid_payload_is_rejected_before_persisting() {
    let engine = online_engine(MockRemote::succeeding());
    let op = ProgressOp::video_position("student-1", "course-1", "lesson-1", -5.0, 600.0);

    let err = engine.enqueue(&op).await.unwrap_err();

    assert!(matches!(err, EngineError::Store(ps_core::Error::InvalidInput(_))));
    assert_eq!(engine.status().await.unwrap().pending_count, 0);
}

#[tokio::test]
async fn unopenable_store_is_unavailable_until_fixed() {
    let temp = TempDir::new().unwrap();
    let blocker = temp.path().join("state");
    std::fs::write(&blocker, "not a directory").unwrap();
    let engine = SyncEngine::builder(
        StoreLocation::Path(blocker.join("queue.db")),
        MockRemote::succeeding(),
    )
    .build();

    assert!(matches!(engine.init().await, Err(EngineError::StoreUnavailable(_))));
    assert!(matches!(engine.enqueue(&video_op(1)).await, Err(EngineError::StoreUnavailable(_))));
    assert!(matches!(engine.status().await, Err(EngineError::StoreUnavailable(_))));

    std::fs::remove_file(&blocker).unwrap();
    engine.init().await.unwrap();
    engine.enqueue(&video_op(1)).await.unwrap();
    assert_eq!(engine.status().await.unwrap().pending_count, 1);
}

#[tokio::test]
async fn pass_failure_publishes_sync_failed() {
    let temp = TempDir::new().unwrap();
    let blocker = temp.path().join("state");
    std::fs::write(&blocker, "not a directory").unwrap();
    let engine = SyncEngine::builder(
        StoreLocation::Path(blocker.join("queue.db")),
        MockRemote::succeeding(),
    )
    .online(true)
    .build();
    let log = EventLog::attach(engine.events());

    assert!(matches!(engine.drain().await, Err(EngineError::StoreUnavailable(_))));
    let events = log.events();
    assert_eq!(events[0], SyncEvent::SyncStarted);
    assert!(matches!(events[1], SyncEvent::SyncFailed { .. }));
    assert!(!engine.is_draining());
}

#[tokio::test]
async fn concurrent_init_shares_one_store() {
    let engine = online_engine(MockRemote::succeeding());
    let other = engine.clone();

    let (a, b) = tokio::join!(engine.init(), other.init());
    a.unwrap();
    b.unwrap();

    engine.enqueue(&video_op(1)).await.unwrap();
    assert_eq!(other.status().await.unwrap().pending_count, 1);
}

#[tokio::test]
async fn queue_survives_restart() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("queue.db");

    {
        let location = StoreLocation::Path(path.clone());
        let engine = SyncEngine::builder(location, MockRemote::succeeding()).build();
        engine.enqueue(&video_op(1)).await.unwrap();
        engine.enqueue(&video_op(2)).await.unwrap();
    }

    let remote = MockRemote::succeeding();
    let engine = SyncEngine::builder(StoreLocation::Path(path), remote.clone())
        .options(manual_options())
        .online(true)
        .build();
    assert_eq!(engine.status().await.unwrap().pending_count, 2);
    assert_eq!(completed(engine.drain().await.unwrap()).synced, 2);
}

#[tokio::test]
async fn repeated_connectivity_signals_are_ignored() {
    let engine = SyncEngine::builder(StoreLocation::InMemory, MockRemote::succeeding()).build();
    let log = EventLog::attach(engine.events());

    assert!(engine.handle_connectivity(Connectivity::Offline).is_none());
    assert!(log.events().is_empty());

    let drain = engine.handle_connectivity(Connectivity::Online);
    assert!(drain.is_some());
    drain.unwrap().await.unwrap().unwrap();
    assert!(engine.handle_connectivity(Connectivity::Online).is_none());

    log.clear();
    assert!(engine.handle_connectivity(Connectivity::Offline).is_none());
    assert_eq!(log.events(), vec![SyncEvent::Offline]);
    assert!(!engine.is_online());
}

#[tokio::test]
async fn watch_drains_when_source_reports_online() {
    let remote = MockRemote::succeeding();
    let engine = SyncEngine::builder(StoreLocation::InMemory, remote.clone()).build();
    let log = EventLog::attach(engine.events());
    engine.enqueue(&video_op(1)).await.unwrap();

    let (handle, source) = channel(4);
    let cancel = CancellationToken::new();
    let watcher = engine.watch(source, cancel.clone());

    assert!(handle.online().await);
    yield_until(|| log.events().iter().any(|e| matches!(e, SyncEvent::SyncCompleted(_)))).await;
    assert_eq!(remote.call_count(), 1);

    assert!(handle.offline().await);
    yield_until(|| !engine.is_online()).await;

    cancel.cancel();
    watcher.await.unwrap();
}

#[tokio::test]
async fn watch_stops_when_source_closes() {
    let engine = SyncEngine::builder(StoreLocation::InMemory, MockRemote::succeeding()).build();
    let (handle, source) = channel(1);
    let watcher = engine.watch(source, CancellationToken::new());

    drop(handle);
    watcher.await.unwrap();
}

#[tokio::test]
async fn requeued_dead_letter_is_delivered() {
    let remote = MockRemote::succeeding();
    remote.script([Behavior::Fail("rejected".into())]);
    let engine = SyncEngine::builder(StoreLocation::InMemory, remote.clone())
        .options(EngineOptions { max_retries: 1, ..manual_options() })
        .online(true)
        .build();
    let id = engine.enqueue(&quiz_op(1)).await.unwrap();

    assert_eq!(completed(engine.drain().await.unwrap()).dead_lettered, 1);
    assert_eq!(engine.status().await.unwrap().dead_letter_count, 1);

    let new_id = engine.requeue_dead_letter(id).await.unwrap();
    assert!(new_id > id);
    assert_eq!(engine.status().await.unwrap().dead_letter_count, 0);

    assert_eq!(completed(engine.drain().await.unwrap()).synced, 1);
    assert!(item(&engine, new_id).await.unwrap().synced);
}

#[tokio::test]
async fn discarded_dead_letter_is_gone() {
    let engine = SyncEngine::builder(StoreLocation::InMemory, MockRemote::failing())
        .options(EngineOptions { max_retries: 1, ..manual_options() })
        .online(true)
        .build();
    let id = engine.enqueue(&video_op(1)).await.unwrap();
    completed(engine.drain().await.unwrap());

    engine.discard_dead_letter(id).await.unwrap();
    assert!(engine.list_dead_letters().await.unwrap().is_empty());
    assert!(matches!(
        engine.discard_dead_letter(id).await,
        Err(EngineError::Store(ps_core::Error::DeadLetterNotFound(_)))
    ));
}

#[tokio::test]
async fn panicking_subscriber_does_not_stop_the_drain() {
    let engine = online_engine(MockRemote::succeeding());
    engine.events().subscribe(|_| panic!("subscriber bug")).detach();
    let log = EventLog::attach(engine.events());
    engine.enqueue(&video_op(1)).await.unwrap();

    let report = completed(engine.drain().await.unwrap());

    assert_eq!(report.synced, 1);
    assert_eq!(log.events().last(), Some(&SyncEvent::SyncCompleted(report)));
}

#[test]
fn skipped_outcome_reports_nothing() {
    let outcome = DrainOutcome::Skipped(SkipReason::AlreadyDraining);
    assert!(outcome.is_skipped());
    assert_eq!(outcome.report(), SyncReport::default());
}
