mod helpers;

use helpers::{
    code39_config, drain_events, pipeline_with_events, progress_values, queue_config,
    FakeEncoder, Outcome, ScriptedUploader,
};
use rowcode_core::models::{ConversionEvent, FailureStage, SourceItem};
use rowcode_core::PipelineError;
use rowcode_processing::{ConversionPipeline, CsvSource, MemorySource};
use rowcode_worker::WorkQueue;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

fn records(pairs: &[(&str, &str)]) -> Vec<SourceItem> {
    pairs
        .iter()
        .map(|(id, value)| SourceItem::text(*id, *value))
        .collect()
}

/// Empty values are skipped, not failed
#[tokio::test(start_paused = true)]
async fn test_empty_values_are_skipped() {
    let uploader = Arc::new(ScriptedUploader::new(Duration::from_millis(10)));
    let (pipeline, _rx) = pipeline_with_events(queue_config(5, 0), Arc::new(FakeEncoder::default()));

    let mut input = records(&[("1", "A"), ("2", "B"), ("3", "")]);
    input.push(SourceItem::empty("4"));
    input.push(SourceItem::text("5", "   "));

    let report = pipeline.run(input, &code39_config(), uploader.clone()).await;

    assert_eq!(report.total_items, 2);
    assert_eq!(report.skipped_items, 3);
    assert_eq!(report.stats.success, 2);
    assert_eq!(report.stats.failed, 0);
    assert_eq!(report.stats.processing, 0);
    assert_eq!(report.progress, 100.0);
    assert!(report.failures.is_empty());
    assert_eq!(uploader.calls().len(), 2);
}

/// Encoder rejections fail the item without an upload
#[tokio::test(start_paused = true)]
async fn test_encode_failure_is_isolated() {
    let uploader = Arc::new(ScriptedUploader::new(Duration::from_millis(10)));
    let (pipeline, _rx) = pipeline_with_events(
        queue_config(5, 0),
        Arc::new(FakeEncoder::rejecting(&["BAD"])),
    );

    let report = pipeline
        .run(
            records(&[("1", "OK"), ("2", "BAD"), ("3", "FINE")]),
            &code39_config(),
            uploader.clone(),
        )
        .await;

    assert_eq!(report.stats.success, 2);
    assert_eq!(report.stats.failed, 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].record_id, "2");
    assert_eq!(report.failures[0].stage, FailureStage::Encode);
    assert!(uploader.calls_for("2").is_empty());
    assert_eq!(report.progress, 100.0);
}

/// Transient upload failures are retried with backoff until they succeed
#[tokio::test(start_paused = true)]
async fn test_transient_upload_failure_recovers() {
    let uploader = Arc::new(
        ScriptedUploader::new(Duration::ZERO)
            .script("1", &[Outcome::Status(503), Outcome::Status(503)]),
    );
    let (pipeline, _rx) = pipeline_with_events(queue_config(5, 0), Arc::new(FakeEncoder::default()));

    let report = pipeline
        .run(records(&[("1", "X")]), &code39_config(), uploader.clone())
        .await;

    assert_eq!(report.stats.success, 1);
    assert_eq!(report.stats.failed, 0);

    let attempts = uploader.calls_for("1");
    assert_eq!(attempts.len(), 3);
    assert!(attempts[1].duration_since(attempts[0]) >= Duration::from_millis(1_000));
    assert!(attempts[2].duration_since(attempts[1]) >= Duration::from_millis(2_000));
}

/// A connection reset counts as transient too
#[tokio::test(start_paused = true)]
async fn test_connection_reset_is_retried() {
    let uploader =
        Arc::new(ScriptedUploader::new(Duration::ZERO).script("1", &[Outcome::Reset]));
    let (pipeline, _rx) = pipeline_with_events(queue_config(5, 0), Arc::new(FakeEncoder::default()));

    let report = pipeline
        .run(records(&[("1", "X")]), &code39_config(), uploader.clone())
        .await;

    assert_eq!(report.stats.success, 1);
    assert_eq!(uploader.calls_for("1").len(), 2);
}

/// Client errors fail the item after a single attempt
#[tokio::test(start_paused = true)]
async fn test_fatal_upload_failure_not_retried() {
    let uploader =
        Arc::new(ScriptedUploader::new(Duration::ZERO).script("1", &[Outcome::Status(400)]));
    let (pipeline, _rx) = pipeline_with_events(queue_config(5, 0), Arc::new(FakeEncoder::default()));

    let report = pipeline
        .run(
            records(&[("1", "X"), ("2", "Y")]),
            &code39_config(),
            uploader.clone(),
        )
        .await;

    assert_eq!(report.stats.success, 1);
    assert_eq!(report.stats.failed, 1);
    assert_eq!(report.failures[0].record_id, "1");
    assert_eq!(report.failures[0].stage, FailureStage::Upload);
    assert!(report.failures[0].message.contains("400"));
    assert_eq!(uploader.calls_for("1").len(), 1);
}

/// Exhausted retries fail the item after max_retries + 1 attempts
#[tokio::test(start_paused = true)]
async fn test_exhausted_retries_fail_item() {
    let uploader = Arc::new(ScriptedUploader::new(Duration::ZERO).script(
        "1",
        &[Outcome::Status(502); 10],
    ));
    let (pipeline, _rx) = pipeline_with_events(queue_config(5, 0), Arc::new(FakeEncoder::default()));

    let report = pipeline
        .run(records(&[("1", "X")]), &code39_config(), uploader.clone())
        .await;

    assert_eq!(report.stats.failed, 1);
    assert_eq!(uploader.calls_for("1").len(), 4);
}

/// capacity=2, interval=100ms, 5 items whose uploads take 50ms
#[tokio::test(start_paused = true)]
async fn test_concurrency_and_rate_limit() {
    let uploader = Arc::new(ScriptedUploader::new(Duration::from_millis(50)));
    let (pipeline, _rx) = pipeline_with_events(queue_config(2, 100), Arc::new(FakeEncoder::default()));

    let report = pipeline
        .run(
            records(&[("1", "A"), ("2", "B"), ("3", "C"), ("4", "D"), ("5", "E")]),
            &code39_config(),
            uploader.clone(),
        )
        .await;

    assert_eq!(report.stats.success, 5);
    assert!(uploader.peak_concurrency() <= 2);
    assert!(report.elapsed_ms >= 300);

    let calls = uploader.calls();
    for pair in calls.windows(2) {
        assert!(pair[1].1.duration_since(pair[0].1) >= Duration::from_millis(100));
    }
}

/// Progress never goes backwards and the counters stay consistent
#[tokio::test(start_paused = true)]
async fn test_progress_is_monotone_and_complete() {
    let uploader = Arc::new(
        ScriptedUploader::new(Duration::from_millis(20))
            .script("3", &[Outcome::Status(500)])
            .script("6", &[Outcome::Status(404)]),
    );
    let (pipeline, mut rx) = pipeline_with_events(
        queue_config(3, 10),
        Arc::new(FakeEncoder::rejecting(&["V5"])),
    );

    let input: Vec<SourceItem> = (1..=10)
        .map(|i| SourceItem::text(i.to_string(), format!("V{}", i)))
        .collect();
    let report = pipeline.run(input, &code39_config(), uploader).await;
    let events = drain_events(&mut rx);

    let progress = progress_values(&events);
    assert!(!progress.is_empty());
    for pair in progress.windows(2) {
        assert!(pair[1] >= pair[0], "progress went backwards: {:?}", progress);
    }
    assert_eq!(progress.last().copied(), Some(100.0));
    assert_eq!(progress.iter().filter(|p| **p == 100.0).count(), 1);

    for event in &events {
        if let ConversionEvent::Stats(stats) = event {
            assert!(stats.accounted() <= report.total_items);
        }
    }
    let last_stats = events.iter().rev().find_map(|event| match event {
        ConversionEvent::Stats(stats) => Some(*stats),
        _ => None,
    });
    assert_eq!(last_stats, Some(report.stats));

    assert_eq!(report.stats.success + report.stats.failed, 10);
    assert_eq!(report.stats.processing, 0);
    assert_eq!(report.stats.failed, 2);

    let failed_events = events
        .iter()
        .filter(|event| matches!(event, ConversionEvent::ItemFailed(_)))
        .count();
    assert_eq!(failed_events, 2);
}

/// An empty batch completes immediately at 100%
#[tokio::test(start_paused = true)]
async fn test_empty_run_reports_full_progress() {
    let uploader = Arc::new(ScriptedUploader::new(Duration::ZERO));
    let (pipeline, mut rx) = pipeline_with_events(queue_config(5, 0), Arc::new(FakeEncoder::default()));

    let report = pipeline
        .run(records(&[("1", " ")]), &code39_config(), uploader.clone())
        .await;

    assert_eq!(report.total_items, 0);
    assert_eq!(report.progress, 100.0);
    assert_eq!(progress_values(&drain_events(&mut rx)), vec![100.0]);
    assert!(uploader.calls().is_empty());
}

/// Running the same records again uploads them again
#[tokio::test(start_paused = true)]
async fn test_rerun_uploads_again() {
    let uploader = Arc::new(ScriptedUploader::new(Duration::ZERO));
    let pipeline = ConversionPipeline::new(
        WorkQueue::new(queue_config(5, 0)),
        Arc::new(FakeEncoder::default()),
    );
    let input = records(&[("1", "A"), ("2", "B")]);

    let first = pipeline.run(input.clone(), &code39_config(), uploader.clone()).await;
    let second = pipeline.run(input, &code39_config(), uploader.clone()).await;

    assert_eq!(first.stats.success, 2);
    assert_eq!(second.stats.success, 2);
    assert_eq!(uploader.calls_for("1").len(), 2);
    assert_eq!(uploader.calls_for("2").len(), 2);
}

/// Cancelling before the run starts settles every item as cancelled
#[tokio::test(start_paused = true)]
async fn test_cancel_before_start() {
    let uploader = Arc::new(ScriptedUploader::new(Duration::ZERO));
    let encoder = Arc::new(FakeEncoder::default());
    let pipeline = ConversionPipeline::new(WorkQueue::new(queue_config(5, 0)), encoder.clone());
    pipeline.cancel();

    let report = pipeline
        .run(records(&[("1", "A"), ("2", "B")]), &code39_config(), uploader.clone())
        .await;

    assert_eq!(report.stats.failed, 2);
    assert!(report
        .failures
        .iter()
        .all(|f| f.stage == FailureStage::Cancelled));
    assert_eq!(encoder.calls.load(Ordering::SeqCst), 0);
    assert!(uploader.calls().is_empty());
    assert_eq!(report.progress, 100.0);
}

/// A cancelled pipeline stays cancelled for every later run
#[tokio::test(start_paused = true)]
async fn test_cancelled_pipeline_cancels_later_runs() {
    let uploader = Arc::new(ScriptedUploader::new(Duration::ZERO));
    let pipeline = ConversionPipeline::new(
        WorkQueue::new(queue_config(5, 0)),
        Arc::new(FakeEncoder::default()),
    );

    let first = pipeline
        .run(records(&[("1", "A")]), &code39_config(), uploader.clone())
        .await;
    assert_eq!(first.stats.success, 1);

    pipeline.cancel();
    let second = pipeline
        .run(records(&[("2", "B")]), &code39_config(), uploader.clone())
        .await;
    let third = pipeline
        .run(records(&[("3", "C")]), &code39_config(), uploader.clone())
        .await;

    for report in [&second, &third] {
        assert_eq!(report.stats.failed, 1);
        assert_eq!(report.failures[0].stage, FailureStage::Cancelled);
    }
    assert_eq!(uploader.calls().len(), 1);
}

/// Cancelling mid-run rejects queued uploads and lets running ones finish
#[tokio::test(start_paused = true)]
async fn test_cancel_mid_run() {
    let uploader = Arc::new(ScriptedUploader::new(Duration::from_secs(1)));
    let pipeline = ConversionPipeline::new(
        WorkQueue::new(queue_config(1, 0)),
        Arc::new(FakeEncoder::default()),
    );

    let token = pipeline.cancellation_token();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(1_500)).await;
        token.cancel();
    });

    let report = pipeline
        .run(
            records(&[("1", "A"), ("2", "B"), ("3", "C"), ("4", "D"), ("5", "E")]),
            &code39_config(),
            uploader.clone(),
        )
        .await;

    assert_eq!(report.stats.success, 2);
    assert_eq!(report.stats.failed, 3);
    assert_eq!(report.stats.processing, 0);
    let cancelled: Vec<&str> = report
        .failures
        .iter()
        .filter(|f| f.stage == FailureStage::Cancelled)
        .map(|f| f.record_id.as_str())
        .collect();
    assert_eq!(cancelled.len(), 3);
    assert!(uploader.calls_for("3").is_empty());
    assert_eq!(pipeline.queue().status().queued, 0);
}

/// run_source reads the source once and converts its records
#[tokio::test(start_paused = true)]
async fn test_run_source_from_memory() {
    let uploader = Arc::new(ScriptedUploader::new(Duration::ZERO));
    let pipeline = ConversionPipeline::new(
        WorkQueue::new(queue_config(5, 0)),
        Arc::new(FakeEncoder::default()),
    );
    let source = MemorySource::new(records(&[("1", "A"), ("2", "")]));

    let report = pipeline
        .run_source(&source, &code39_config(), uploader)
        .await
        .unwrap();

    assert_eq!(report.total_items, 1);
    assert_eq!(report.stats.success, 1);
}

/// An unreadable source rejects the run
#[tokio::test]
async fn test_unreadable_source_rejects_run() {
    let uploader = Arc::new(ScriptedUploader::new(Duration::ZERO));
    let pipeline = ConversionPipeline::new(
        WorkQueue::new(queue_config(5, 0)),
        Arc::new(FakeEncoder::default()),
    );
    let source = CsvSource::new("/definitely/not/here.csv", "value");

    let result = pipeline
        .run_source(&source, &code39_config(), uploader.clone())
        .await;

    assert!(matches!(result, Err(PipelineError::Source(_))));
    assert!(uploader.calls().is_empty());
}
