use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

use rowcode_core::models::{
    BarcodeFormat, ConversionConfig, ConversionEvent, EncodedArtifact, EncodedImage, EncodingKind,
};
use rowcode_core::{EncodeError, UploadError};
use rowcode_processing::{ConversionPipeline, Encoder};
use rowcode_storage::{UploadClient, UploadReceipt, UploadResult};
use rowcode_worker::{WorkQueue, WorkQueueConfig};

/// Encoder that accepts everything except the listed values.
#[derive(Default)]
pub struct FakeEncoder {
    rejected: HashSet<String>,
    pub calls: AtomicUsize,
}

impl FakeEncoder {
    pub fn rejecting(values: &[&str]) -> Self {
        Self {
            rejected: values.iter().map(|v| v.to_string()).collect(),
            calls: AtomicUsize::new(0),
        }
    }
}

impl Encoder for FakeEncoder {
    fn encode(&self, value: &str, _config: &ConversionConfig) -> Result<EncodedImage, EncodeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.rejected.contains(value) {
            return Err(EncodeError::InvalidValue {
                format: "fake".to_string(),
                value: value.to_string(),
                reason: "rejected by test".to_string(),
            });
        }
        Ok(EncodedImage {
            bytes: Bytes::from(value.as_bytes().to_vec()),
            mime_type: "image/png".to_string(),
            extension: "png".to_string(),
        })
    }
}

/// What one upload attempt should do.
#[derive(Debug, Clone, Copy)]
pub enum Outcome {
    Stored,
    Status(u16),
    Reset,
}

/// Upload client following a per-record script, then succeeding.
pub struct ScriptedUploader {
    scripts: Mutex<HashMap<String, VecDeque<Outcome>>>,
    delay: Duration,
    calls: Mutex<Vec<(String, Instant)>>,
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedUploader {
    pub fn new(delay: Duration) -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            delay,
            calls: Mutex::new(Vec::new()),
            current: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    pub fn script(self, record_id: &str, outcomes: &[Outcome]) -> Self {
        self.scripts
            .lock()
            .insert(record_id.to_string(), outcomes.iter().copied().collect());
        self
    }

    /// Every attempt so far, in call order.
    pub fn calls(&self) -> Vec<(String, Instant)> {
        self.calls.lock().clone()
    }

    pub fn calls_for(&self, record_id: &str) -> Vec<Instant> {
        self.calls
            .lock()
            .iter()
            .filter(|(id, _)| id == record_id)
            .map(|(_, at)| *at)
            .collect()
    }

    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UploadClient for ScriptedUploader {
    async fn upload(&self, artifact: &EncodedArtifact) -> UploadResult<UploadReceipt> {
        self.calls
            .lock()
            .push((artifact.record_id.clone(), Instant::now()));
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(self.delay).await;
        self.current.fetch_sub(1, Ordering::SeqCst);

        let outcome = self
            .scripts
            .lock()
            .get_mut(&artifact.record_id)
            .and_then(|script| script.pop_front())
            .unwrap_or(Outcome::Stored);

        match outcome {
            Outcome::Stored => Ok(UploadReceipt {
                record_id: artifact.record_id.clone(),
                file_name: artifact.file_name.clone(),
                token: Some(format!("att-{}", artifact.record_id)),
                url: None,
                size_bytes: artifact.size_bytes(),
            }),
            Outcome::Status(status) => Err(UploadError::Status {
                status,
                message: format!("scripted {}", status),
            }),
            Outcome::Reset => Err(UploadError::ConnectionReset("scripted reset".to_string())),
        }
    }

    fn backend_name(&self) -> &'static str {
        "scripted"
    }
}

pub fn queue_config(capacity: usize, interval_ms: u64) -> WorkQueueConfig {
    WorkQueueConfig {
        capacity,
        dispatch_interval: Duration::from_millis(interval_ms),
        max_retries: 3,
        task_timeout: Duration::from_secs(30),
    }
}

pub fn code39_config() -> ConversionConfig {
    ConversionConfig::new(EncodingKind::Barcode(BarcodeFormat::Code39))
}

/// Pipeline wired to `encoder`, returning the receiving end of its event channel.
pub fn pipeline_with_events(
    config: WorkQueueConfig,
    encoder: Arc<dyn Encoder>,
) -> (ConversionPipeline, mpsc::UnboundedReceiver<ConversionEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let pipeline = ConversionPipeline::new(WorkQueue::new(config), encoder).with_events(tx);
    (pipeline, rx)
}

/// Everything published so far.
pub fn drain_events(rx: &mut mpsc::UnboundedReceiver<ConversionEvent>) -> Vec<ConversionEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

pub fn progress_values(events: &[ConversionEvent]) -> Vec<f64> {
    events
        .iter()
        .filter_map(|event| match event {
            ConversionEvent::Progress { percent } => Some(*percent),
            _ => None,
        })
        .collect()
}
