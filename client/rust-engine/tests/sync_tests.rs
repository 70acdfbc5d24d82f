use std::sync::atomic::Ordering;
use std::time::Duration;

use examhall_engine::{ExamSession, Lifecycle, SubmitMode};

mod common;

use common::{active_attempt, sample_tasks, settle, test_config, MockExamApi};

fn fast_sync_config(sync_interval_secs: u64) -> examhall_engine::Config {
    let mut config = test_config();
    config.sync_interval_secs = sync_interval_secs;
    config
}

#[tokio::test(start_paused = true)]
async fn server_correction_adjusts_the_displayed_time_only() {
    let api = MockExamApi::new(active_attempt(600), sample_tasks(3));
    // The server believes less time is left than the local clock does.
    api.set_remaining(500, false);

    let session = ExamSession::load(api.clone(), "attempt-1", &fast_sync_config(10))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_secs(12)).await;
    settle().await;

    // Display follows the server value (500 at the poll, minus the time
    // since), while the local deadline still governs expiry.
    let remaining = session.snapshot().remaining_seconds;
    assert!(
        (495..=500).contains(&remaining),
        "expected server-corrected display, got {}",
        remaining
    );

    // Local deadline is 600s out, so nothing has expired.
    assert_eq!(session.snapshot().lifecycle, Lifecycle::Active);
    assert_eq!(api.terminal_submission_calls(), 0);

    session.close().await;
}

#[tokio::test(start_paused = true)]
async fn server_side_closure_is_absorbed_without_a_second_submission() {
    // Scenario: the poll reports autoSubmitted while the session is still
    // Active locally.
    let api = MockExamApi::new(active_attempt(1800), sample_tasks(3));
    api.set_remaining(0, true);

    let session = ExamSession::load(api.clone(), "attempt-1", &fast_sync_config(5))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_secs(6)).await;
    settle().await;

    assert_eq!(session.snapshot().lifecycle, Lifecycle::Expired);
    // Absorption, not a second submission.
    assert_eq!(api.terminal_submission_calls(), 0);

    // The outcome is replayed to any later submit call.
    let outcome = session.submit(SubmitMode::Manual).await.unwrap();
    assert!(outcome.absorbed);
    assert_eq!(api.terminal_submission_calls(), 0);

    session.close().await;
}

#[tokio::test(start_paused = true)]
async fn sync_failures_never_interrupt_the_session() {
    let api = MockExamApi::new(active_attempt(600), sample_tasks(3));
    api.fail_sync.store(true, Ordering::SeqCst);

    let session = ExamSession::load(api.clone(), "attempt-1", &fast_sync_config(5))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_secs(21)).await;
    settle().await;

    // Several polls failed; the timer and the buffer are unaffected.
    assert!(api.sync_calls.load(Ordering::SeqCst) >= 3);
    let snapshot = session.snapshot();
    assert_eq!(snapshot.lifecycle, Lifecycle::Active);
    assert!((575..=580).contains(&snapshot.remaining_seconds));

    session.set_answer(1, "still answering");
    settle().await;
    assert_eq!(session.snapshot().answered_count, 1);

    session.close().await;
}

#[tokio::test(start_paused = true)]
async fn polling_runs_on_the_configured_cadence() {
    let api = MockExamApi::new(active_attempt(600), sample_tasks(3));
    api.set_remaining(600, false);

    let session = ExamSession::load(api.clone(), "attempt-1", &fast_sync_config(10))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_secs(35)).await;
    settle().await;

    let polls = api.sync_calls.load(Ordering::SeqCst);
    assert!(
        (3..=4).contains(&polls),
        "expected ~3 polls in 35s at a 10s cadence, got {}",
        polls
    );

    session.close().await;
}
