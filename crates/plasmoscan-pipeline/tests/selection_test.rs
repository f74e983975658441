//! Integration tests for the selection stage: concurrent assessment
//! fan-out, graceful degradation, and the quality gate feeding the runner.

use std::sync::Arc;
use std::time::{Duration, Instant};

use plasmoscan_analysis::mock::{MockAnalysisBackend, MockQualityAssessor};
use plasmoscan_core::{
    issue_tags, CapturedImage, Error, JobState, QualityReport, SampleType,
};
use plasmoscan_pipeline::{
    apply_reports, assess_selection, confirm_selection, BatchRunner, SelectionConfig,
};

fn uris(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn assessment_fans_out_concurrently() {
    let assessor = Arc::new(MockQualityAssessor::new().with_latency_ms(50));
    let config = SelectionConfig::default();

    let start = Instant::now();
    let reports = assess_selection(
        assessor.clone(),
        &uris(&["a.jpg", "b.jpg", "c.jpg", "d.jpg", "e.jpg"]),
        &config,
    )
    .await;

    assert_eq!(reports.len(), 5);
    assert_eq!(assessor.call_count(), 5);
    // Sequential assessment would take ~250ms; concurrent stays near one
    // latency unit.
    assert!(start.elapsed() < Duration::from_millis(200));
}

#[tokio::test]
async fn one_failed_assessment_does_not_block_the_rest() {
    let assessor = Arc::new(
        MockQualityAssessor::new()
            .with_default_score(80)
            .with_failure_for("b.jpg"),
    );

    let reports = assess_selection(
        assessor,
        &uris(&["a.jpg", "b.jpg", "c.jpg"]),
        &SelectionConfig::default(),
    )
    .await;

    assert_eq!(reports["a.jpg"].score, 80);
    assert_eq!(reports["c.jpg"].score, 80);

    let placeholder = &reports["b.jpg"];
    assert_eq!(placeholder.score, 0);
    assert!(placeholder
        .issues
        .iter()
        .any(|i| i == issue_tags::ASSESSMENT_FAILED));
}

#[tokio::test]
async fn stalled_assessment_times_out_to_placeholder() {
    let assessor = Arc::new(MockQualityAssessor::new().with_latency_ms(500));
    let config = SelectionConfig::default().with_assess_timeout(Duration::from_millis(50));

    let reports = assess_selection(assessor, &uris(&["a.jpg"]), &config).await;
    assert_eq!(reports["a.jpg"], QualityReport::assessment_failed());
}

#[tokio::test]
async fn selection_flow_gates_then_runs_after_override() {
    let assessor = Arc::new(
        MockQualityAssessor::new()
            .with_default_score(85)
            .with_report(
                "faint.jpg",
                QualityReport::new(40, vec![issue_tags::LOW_CONTRAST.to_string()]),
            ),
    );
    let config = SelectionConfig::default();

    let mut images = vec![
        CapturedImage::new("clear.jpg", SampleType::ThickSmear),
        CapturedImage::new("faint.jpg", SampleType::ThickSmear),
    ];
    let image_uris: Vec<String> = images.iter().map(|i| i.uri.clone()).collect();

    let reports = assess_selection(assessor, &image_uris, &config).await;
    apply_reports(&mut images, &reports);

    // The weak image blocks confirmation without an explicit override.
    let err = confirm_selection(
        "S-12",
        SampleType::ThickSmear,
        images.clone(),
        config.quality_threshold,
        false,
    )
    .unwrap_err();
    match err {
        Error::QualityBelowThreshold { uris, .. } => {
            assert_eq!(uris, vec!["faint.jpg".to_string()])
        }
        other => panic!("unexpected error: {:?}", other),
    }

    // With the override the job keeps both images and runs to completion.
    let job = confirm_selection(
        "S-12",
        SampleType::ThickSmear,
        images,
        config.quality_threshold,
        true,
    )
    .unwrap();
    assert_eq!(job.total(), 2);

    let runner = BatchRunner::new(Arc::new(MockAnalysisBackend::new()));
    let done = runner.run(job).await.unwrap();
    assert_eq!(done.state, JobState::Completed);
    assert_eq!(done.results.len(), 2);
    assert_eq!(done.results[1].image_uri(), "faint.jpg");
}
