//! Worker subprocess tests against fake LLM CLI scripts

use rag_core::error::Error;
use rag_core::workers::{LlmWorker, WorkerConfig};
use std::time::Duration;
use test_utils::FakeLlm;
use tokio_util::sync::CancellationToken;

fn worker_for(fake: &FakeLlm, timeout: Duration) -> LlmWorker {
    LlmWorker::create(
        0,
        WorkerConfig {
            executable_path: fake.executable.clone(),
            model_path: fake.model.clone(),
            query_timeout: timeout,
        },
    )
    .unwrap()
}

#[tokio::test]
async fn test_query_returns_cleaned_reply() {
    let fake = FakeLlm::echoing("Roll 2d6 to attack.");
    let worker = worker_for(&fake, Duration::from_secs(10));

    let before = worker.last_used();
    let response = worker
        .query("You are terse.", "How do I attack?", &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(response.text, "Roll 2d6 to attack.");
    assert!(!response.timed_out);
    assert!(worker.is_healthy());
    assert!(worker.last_used() >= before);
}

#[tokio::test]
async fn test_query_strips_control_artifacts() {
    let fake = FakeLlm::noisy("Roll 2d6.");
    let worker = worker_for(&fake, Duration::from_secs(10));

    let response = worker
        .query("You are terse.", "How do I attack?", &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(response.text, "Roll 2d6.");
}

#[tokio::test]
async fn test_prologue_only_exit_yields_empty_reply() {
    let fake = FakeLlm::mute();
    let worker = worker_for(&fake, Duration::from_secs(10));

    let response = worker
        .query("You are terse.", "Anything?", &CancellationToken::new())
        .await
        .unwrap();
    assert!(response.text.is_empty());
    assert!(worker.is_healthy());
}

#[tokio::test]
async fn test_deadline_without_answer_times_out_and_marks_unhealthy() {
    let fake = FakeLlm::silent();
    let worker = worker_for(&fake, Duration::from_millis(400));

    let result = worker
        .query("You are terse.", "Anything?", &CancellationToken::new())
        .await;
    assert!(matches!(result, Err(Error::WorkerTimeout(_))));
    assert!(!worker.is_healthy());

    // Health never transitions back; further queries are refused.
    let again = worker
        .query("You are terse.", "Anything?", &CancellationToken::new())
        .await;
    assert!(matches!(again, Err(Error::WorkerUnhealthy)));
}

#[tokio::test]
async fn test_deadline_mid_answer_returns_partial_tagged_timed_out() {
    // The script stalls after one answer line; the 1s deadline fires before
    // the 3s idle window can complete the answer.
    let fake = FakeLlm::stalling("Roll 2d6");
    let worker = worker_for(&fake, Duration::from_secs(1));

    let response = worker
        .query("You are terse.", "How do I attack?", &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(response.text, "Roll 2d6");
    assert!(response.timed_out);
}

#[tokio::test]
async fn test_idle_window_completes_answer() {
    // Deadline far away; the stall after the answer line must end the query
    // via the idle window, in roughly idle-window time.
    let fake = FakeLlm::stalling("Roll 2d6");
    let worker = worker_for(&fake, Duration::from_secs(60));

    let started = std::time::Instant::now();
    let response = worker
        .query("You are terse.", "How do I attack?", &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(response.text, "Roll 2d6");
    assert!(!response.timed_out);
    assert!(started.elapsed() >= Duration::from_secs(3));
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[tokio::test]
async fn test_cancellation_kills_query() {
    let fake = FakeLlm::silent();
    let worker = worker_for(&fake, Duration::from_secs(60));

    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel_clone.cancel();
    });

    let started = std::time::Instant::now();
    let result = worker.query("You are terse.", "Anything?", &cancel).await;
    assert!(matches!(result, Err(Error::Cancelled)));
    assert!(started.elapsed() < Duration::from_secs(2));
    // Cancellation is not a worker fault.
    assert!(worker.is_healthy());
}

#[tokio::test]
async fn test_queries_serialize_per_worker() {
    let fake = FakeLlm::slow("reply", 150);
    let worker = std::sync::Arc::new(worker_for(&fake, Duration::from_secs(10)));

    let started = std::time::Instant::now();
    let first = {
        let worker = std::sync::Arc::clone(&worker);
        tokio::spawn(async move {
            worker
                .query("sys", "one", &CancellationToken::new())
                .await
                .unwrap()
        })
    };
    let second = {
        let worker = std::sync::Arc::clone(&worker);
        tokio::spawn(async move {
            worker
                .query("sys", "two", &CancellationToken::new())
                .await
                .unwrap()
        })
    };

    let (a, b) = (first.await.unwrap(), second.await.unwrap());
    assert_eq!(a.text, "reply");
    assert_eq!(b.text, "reply");
    // Two 150 ms queries through one worker cannot overlap.
    assert!(started.elapsed() >= Duration::from_millis(300));
}
