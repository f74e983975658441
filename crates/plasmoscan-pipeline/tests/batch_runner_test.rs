//! Integration tests for the sequential batch runner.
//!
//! The mock backend's call log and peak-in-flight counter let these tests
//! assert calling discipline (one submission at a time, in order), not just
//! final results.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use plasmoscan_analysis::mock::MockAnalysisBackend;
use plasmoscan_core::{
    AnalysisOutcome, AppEvent, BatchJob, CapturedImage, Error, EventBus, JobState, SampleType,
};
use plasmoscan_pipeline::{summarize, BatchEvent, BatchRunner, RunnerConfig};

/// Opt-in log output for debugging: `RUST_LOG=debug cargo test`.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn job(uris: &[&str]) -> BatchJob {
    let images = uris
        .iter()
        .map(|uri| CapturedImage::new(*uri, SampleType::ThinSmear))
        .collect();
    BatchJob::new("S-77", SampleType::ThinSmear, images).unwrap()
}

async fn next_event(rx: &mut broadcast::Receiver<BatchEvent>) -> BatchEvent {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for batch event")
        .expect("event channel closed")
}

#[tokio::test]
async fn results_preserve_order_under_variable_latency() {
    init_tracing();
    // The slowest response comes first; order must still match submission.
    let backend = MockAnalysisBackend::new().with_latency_schedule(vec![40, 5, 1]);
    let runner = BatchRunner::new(Arc::new(backend));

    let job = job(&["a.jpg", "b.jpg", "c.jpg"]);
    let expected: Vec<String> = job.images.iter().map(|i| i.uri.clone()).collect();

    let done = runner.run(job).await.unwrap();
    assert_eq!(done.state, JobState::Completed);
    assert_eq!(done.results.len(), 3);
    for (i, outcome) in done.results.iter().enumerate() {
        assert_eq!(outcome.image_uri(), expected[i]);
    }
}

#[tokio::test]
async fn progress_events_count_up_in_order() {
    let backend = MockAnalysisBackend::new().with_latency_schedule(vec![20, 1, 10]);
    let runner = BatchRunner::new(Arc::new(backend));
    let mut rx = runner.events();

    let handle = runner.start(job(&["a.jpg", "b.jpg", "c.jpg"])).unwrap();

    assert!(matches!(
        next_event(&mut rx).await,
        BatchEvent::Started { total: 3, .. }
    ));
    for expected_index in 1..=3usize {
        match next_event(&mut rx).await {
            BatchEvent::Progress { index, total, .. } => {
                assert_eq!(index, expected_index);
                assert_eq!(total, 3);
            }
            other => panic!("expected progress event, got {:?}", other),
        }
    }
    assert!(matches!(
        next_event(&mut rx).await,
        BatchEvent::Completed { total: 3, .. }
    ));

    let done = handle.join().await.unwrap();
    assert_eq!(done.state, JobState::Completed);
}

#[tokio::test]
async fn never_two_submissions_in_flight() {
    let backend = MockAnalysisBackend::new().with_latency_ms(10);
    let runner = BatchRunner::new(Arc::new(backend.clone()));

    let done = runner
        .run(job(&["a.jpg", "b.jpg", "c.jpg", "d.jpg", "e.jpg"]))
        .await
        .unwrap();

    assert_eq!(done.state, JobState::Completed);
    assert_eq!(backend.call_count(), 5);
    assert_eq!(backend.peak_in_flight(), 1);
}

#[tokio::test]
async fn per_image_failure_fills_slot_and_batch_completes() {
    let backend = MockAnalysisBackend::new().with_failure_for("b.jpg");
    let runner = BatchRunner::new(Arc::new(backend));

    let done = runner.run(job(&["a.jpg", "b.jpg", "c.jpg"])).await.unwrap();
    assert_eq!(done.state, JobState::Completed);
    assert_eq!(done.results.len(), 3);

    assert!(done.results[0].is_analyzed());
    match &done.results[1] {
        AnalysisOutcome::Failed { image_uri, reason } => {
            assert_eq!(image_uri, "b.jpg");
            assert!(reason.contains("scripted failure"));
        }
        other => panic!("expected failed slot, got {:?}", other),
    }
    assert!(done.results[2].is_analyzed());

    let summary = summarize(&done).unwrap();
    assert_eq!(summary.total_images, 3);
    assert_eq!(summary.analyzed, 2);
    assert_eq!(summary.failed, 1);
}

#[tokio::test]
async fn backend_timeout_error_is_per_image_failure() {
    let backend = MockAnalysisBackend::new().with_timeout_for("b.jpg");
    let runner = BatchRunner::new(Arc::new(backend));

    let done = runner.run(job(&["a.jpg", "b.jpg"])).await.unwrap();
    assert_eq!(done.state, JobState::Completed);
    match &done.results[1] {
        AnalysisOutcome::Failed { reason, .. } => assert!(reason.contains("Timeout")),
        other => panic!("expected failed slot, got {:?}", other),
    }
}

#[tokio::test]
async fn runner_deadline_converts_slow_call_to_failed_slot() {
    let backend = MockAnalysisBackend::new().with_latency_ms(200);
    let runner = BatchRunner::new(Arc::new(backend)).with_config(
        RunnerConfig::default().with_analysis_timeout(Duration::from_millis(50)),
    );

    let done = runner.run(job(&["slow.jpg"])).await.unwrap();
    assert_eq!(done.state, JobState::Completed);
    match &done.results[0] {
        AnalysisOutcome::Failed { reason, .. } => assert!(reason.contains("timed out")),
        other => panic!("expected failed slot, got {:?}", other),
    }
}

#[tokio::test]
async fn cancellation_discards_partial_results() {
    init_tracing();
    let backend = MockAnalysisBackend::new().with_latency_ms(50);
    let runner = BatchRunner::new(Arc::new(backend));
    let mut rx = runner.events();

    let handle = runner.start(job(&["a.jpg", "b.jpg", "c.jpg"])).unwrap();

    // Let the first image complete, then cancel while the second is in
    // flight.
    loop {
        if let BatchEvent::Progress { index: 1, .. } = next_event(&mut rx).await {
            break;
        }
    }
    handle.cancel();

    let done = handle.join().await.unwrap();
    assert_eq!(done.state, JobState::Cancelled);
    assert!(done.current_index >= 1 && done.current_index < 3);
    assert!(done.results.is_empty());
    assert!(matches!(
        summarize(&done),
        Err(Error::JobNotCompleted(_))
    ));
}

#[tokio::test]
async fn cancellation_emits_terminal_event() {
    let backend = MockAnalysisBackend::new().with_latency_ms(100);
    let runner = BatchRunner::new(Arc::new(backend));
    let mut rx = runner.events();

    let handle = runner.start(job(&["a.jpg", "b.jpg"])).unwrap();
    assert!(matches!(next_event(&mut rx).await, BatchEvent::Started { .. }));
    handle.cancel();

    loop {
        match next_event(&mut rx).await {
            BatchEvent::Cancelled { completed, .. } => {
                assert!(completed < 2);
                break;
            }
            BatchEvent::Progress { .. } => continue,
            other => panic!("unexpected event: {:?}", other),
        }
    }
    let done = handle.join().await.unwrap();
    assert_eq!(done.state, JobState::Cancelled);
}

#[tokio::test]
async fn single_image_batch_uses_same_path() {
    let backend = MockAnalysisBackend::new().with_default_detection(true);
    let runner = BatchRunner::new(Arc::new(backend));
    let mut rx = runner.events();

    let handle = runner.start(job(&["only.jpg"])).unwrap();

    assert!(matches!(
        next_event(&mut rx).await,
        BatchEvent::Started { total: 1, .. }
    ));
    assert!(matches!(
        next_event(&mut rx).await,
        BatchEvent::Progress {
            index: 1,
            total: 1,
            ..
        }
    ));

    let done = handle.join().await.unwrap();
    assert_eq!(done.state, JobState::Completed);
    let summary = summarize(&done).unwrap();
    assert_eq!(summary.total_images, 1);
    assert_eq!(summary.positive, 1);
    assert_eq!(summary.total_parasites, 7);
}

#[tokio::test]
async fn completed_job_cannot_be_rerun() {
    let backend = MockAnalysisBackend::new();
    let runner = BatchRunner::new(Arc::new(backend));

    let done = runner.run(job(&["a.jpg"])).await.unwrap();
    assert_eq!(done.state, JobState::Completed);

    let err = runner.start(done).unwrap_err();
    assert!(matches!(err, Error::JobAlreadyRan(_)));
}

#[tokio::test]
async fn coarse_progress_is_mirrored_onto_app_bus() {
    let bus = EventBus::default();
    let mut bus_rx = bus.subscribe();

    let backend = MockAnalysisBackend::new();
    let runner = BatchRunner::new(Arc::new(backend)).with_event_bus(bus);

    runner.run(job(&["a.jpg", "b.jpg"])).await.unwrap();

    assert!(matches!(
        bus_rx.recv().await.unwrap(),
        AppEvent::BatchStarted { total: 2, .. }
    ));
    assert!(matches!(
        bus_rx.recv().await.unwrap(),
        AppEvent::BatchProgress { index: 1, .. }
    ));
    assert!(matches!(
        bus_rx.recv().await.unwrap(),
        AppEvent::BatchProgress { index: 2, .. }
    ));
    assert!(matches!(
        bus_rx.recv().await.unwrap(),
        AppEvent::BatchCompleted { total: 2, .. }
    ));
}

#[tokio::test]
async fn summarize_rejects_idle_job() {
    let idle = job(&["a.jpg"]);
    assert!(matches!(summarize(&idle), Err(Error::JobNotCompleted(_))));
}
