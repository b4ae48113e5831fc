//! Conversion pipeline: filter → encode → upload → report.
//!
//! Records are encoded one at a time in input order. Each successful encoding becomes an
//! upload task on the shared [`WorkQueue`], which applies the concurrency cap, the
//! dispatch rate limit and the retry policy. Settlements are folded into the run's
//! counters by the `run` future alone, as soon as they complete, including while later
//! records are still being encoded.

use futures::stream::FuturesUnordered;
use futures::{FutureExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use rowcode_core::models::{
    progress_percent, ConversionConfig, ConversionEvent, ConversionReport, ConversionStats,
    EncodedArtifact, FailureStage, ItemFailure, SourceItem,
};
use rowcode_core::{PipelineError, TaskError};
use rowcode_storage::{UploadClient, UploadReceipt};
use rowcode_worker::{QueueTask, WorkQueue};

use crate::encoder::Encoder;
use crate::source::DataSource;

type Settlement = (String, Result<UploadReceipt, TaskError>);

/// Counters, failures and progress of one run. Owned by the `run` future.
struct RunTracker {
    total: usize,
    stats: ConversionStats,
    progress: f64,
    failures: Vec<ItemFailure>,
    events: Option<UnboundedSender<ConversionEvent>>,
}

impl RunTracker {
    fn new(total: usize, events: Option<UnboundedSender<ConversionEvent>>) -> Self {
        Self {
            total,
            stats: ConversionStats::default(),
            progress: 0.0,
            failures: Vec::new(),
            events,
        }
    }

    fn emit(&self, event: ConversionEvent) {
        if let Some(events) = &self.events {
            // A dropped receiver only means nobody is watching.
            let _ = events.send(event);
        }
    }

    fn submitted(&mut self) {
        self.stats.processing += 1;
        self.emit(ConversionEvent::Stats(self.stats));
    }

    fn upload_settled(&mut self, (record_id, result): Settlement) {
        self.stats.processing = self.stats.processing.saturating_sub(1);
        match result {
            Ok(receipt) => {
                tracing::debug!(
                    record_id = %record_id,
                    file_name = %receipt.file_name,
                    "Item converted"
                );
                self.stats.success += 1;
                self.settled();
            }
            Err(e) if e.is_cancelled() => {
                self.failed(record_id, FailureStage::Cancelled, e.to_string());
            }
            Err(e) => {
                self.failed(record_id, FailureStage::Upload, e.to_string());
            }
        }
    }

    /// Record a failed item. Upload failures must already have left `processing`.
    fn failed(&mut self, record_id: String, stage: FailureStage, message: String) {
        tracing::warn!(
            record_id = %record_id,
            stage = %stage,
            error = %message,
            "Item failed"
        );
        self.stats.failed += 1;
        let failure = ItemFailure {
            record_id,
            stage,
            message,
        };
        self.emit(ConversionEvent::ItemFailed(failure.clone()));
        self.failures.push(failure);
        self.settled();
    }

    fn settled(&mut self) {
        self.emit(ConversionEvent::Stats(self.stats));
        // Settled counts only grow, so this never moves backwards; max() keeps it so.
        self.progress = progress_percent(self.stats.settled(), self.total).max(self.progress);
        self.emit(ConversionEvent::Progress {
            percent: self.progress,
        });
    }

    fn into_report(self, skipped_items: usize, started: Instant) -> ConversionReport {
        ConversionReport {
            total_items: self.total,
            skipped_items,
            stats: self.stats,
            progress: self.progress,
            failures: self.failures,
            elapsed_ms: started.elapsed().as_millis() as u64,
        }
    }
}

/// Drives a batch of records through encoding and upload.
pub struct ConversionPipeline {
    queue: WorkQueue<UploadReceipt>,
    encoder: Arc<dyn Encoder>,
    events: Option<UnboundedSender<ConversionEvent>>,
    cancel: CancellationToken,
}

impl ConversionPipeline {
    pub fn new(queue: WorkQueue<UploadReceipt>, encoder: Arc<dyn Encoder>) -> Self {
        Self {
            queue,
            encoder,
            events: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Publish stats, progress and item failures on `events` while running.
    pub fn with_events(mut self, events: UnboundedSender<ConversionEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn with_cancellation_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop the run: records not yet encoded and uploads still queued settle as
    /// cancelled; uploads already running finish normally.
    ///
    /// Cancels every queued task of the underlying queue, so a cancellable pipeline
    /// should not share its queue with another run. The token stays cancelled: every
    /// later `run` on this pipeline settles all of its items as cancelled, so build a
    /// new pipeline for the next batch.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn queue(&self) -> &WorkQueue<UploadReceipt> {
        &self.queue
    }

    /// Read records from `source` and convert them.
    ///
    /// Fails only when the source cannot be read or the config is unusable; per-item
    /// failures are reported in the returned report.
    pub async fn run_source(
        &self,
        source: &dyn DataSource,
        config: &ConversionConfig,
        uploader: Arc<dyn UploadClient>,
    ) -> Result<ConversionReport, PipelineError> {
        validate_config(config)?;

        tracing::info!(source = %source.describe(), "Reading records");
        let records = source.fetch().await?;
        Ok(self.run(records, config, uploader).await)
    }

    /// Convert `records` and resolve once every accepted item has settled.
    #[tracing::instrument(skip_all, fields(kind = %config.kind, records = records.len(), uploader = uploader.backend_name()))]
    pub async fn run(
        &self,
        records: Vec<SourceItem>,
        config: &ConversionConfig,
        uploader: Arc<dyn UploadClient>,
    ) -> ConversionReport {
        let started = Instant::now();
        let record_count = records.len();

        let accepted: Vec<(String, String)> = records
            .into_iter()
            .filter_map(|item| {
                let value = item.encodable_value()?;
                Some((item.record_id, value))
            })
            .collect();
        let skipped = record_count - accepted.len();

        let mut tracker = RunTracker::new(accepted.len(), self.events.clone());
        tracing::info!(
            total_items = accepted.len(),
            skipped_items = skipped,
            "Conversion started"
        );

        if accepted.is_empty() {
            tracker.settled();
            return tracker.into_report(skipped, started);
        }

        let mut in_flight = FuturesUnordered::new();
        let mut queue_cancelled = false;

        for (record_id, value) in accepted {
            while let Some(Some(settlement)) = in_flight.next().now_or_never() {
                tracker.upload_settled(settlement);
            }

            if self.cancel.is_cancelled() {
                if !queue_cancelled {
                    self.queue.cancel_all();
                    queue_cancelled = true;
                }
                tracker.failed(
                    record_id,
                    FailureStage::Cancelled,
                    "Conversion cancelled before encoding".to_string(),
                );
                continue;
            }

            let image = match self.encoder.encode(&value, config) {
                Ok(image) => image,
                Err(e) => {
                    tracker.failed(record_id, FailureStage::Encode, e.to_string());
                    continue;
                }
            };

            let artifact = Arc::new(EncodedArtifact::from_image(record_id.clone(), &value, image));
            let task_id = format!("{}:{}", record_id, Uuid::new_v4());
            let uploader = uploader.clone();
            let task = QueueTask::new(task_id, move || {
                let uploader = uploader.clone();
                let artifact = artifact.clone();
                async move { uploader.upload(&artifact).await.map_err(TaskError::from) }
            });

            let handle = self.queue.submit(task);
            tracker.submitted();
            in_flight.push(async move { (record_id, handle.await) });

            // Let dispatched uploads make progress between encodes.
            tokio::task::yield_now().await;
        }

        while !in_flight.is_empty() {
            if queue_cancelled {
                if let Some(settlement) = in_flight.next().await {
                    tracker.upload_settled(settlement);
                }
                continue;
            }

            tokio::select! {
                settlement = in_flight.next() => {
                    if let Some(settlement) = settlement {
                        tracker.upload_settled(settlement);
                    }
                }
                _ = self.cancel.cancelled() => {
                    let rejected = self.queue.cancel_all();
                    tracing::info!(rejected, "Conversion cancelled");
                    queue_cancelled = true;
                }
            }
        }

        let report = tracker.into_report(skipped, started);
        tracing::info!(
            success = report.stats.success,
            failed = report.stats.failed,
            elapsed_ms = report.elapsed_ms,
            "Conversion finished"
        );
        report
    }
}

/// Reject configurations no item could succeed with.
pub fn validate_config(config: &ConversionConfig) -> Result<(), PipelineError> {
    if config.style.module_width == 0 {
        return Err(PipelineError::InvalidConfig(
            "module width must be at least 1 pixel".to_string(),
        ));
    }
    if config.style.height == 0 {
        return Err(PipelineError::InvalidConfig(
            "bar height must be at least 1 pixel".to_string(),
        ));
    }
    Ok(())
}
