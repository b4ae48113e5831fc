use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};

/// Running counters for one conversion run.
///
/// `success` and `failed` only grow; `processing` rises on submission and falls on
/// settlement. `success + failed + processing` always equals the number of accepted
/// items seen so far.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConversionStats {
    pub success: usize,
    pub failed: usize,
    pub processing: usize,
}

impl ConversionStats {
    pub fn settled(&self) -> usize {
        self.success + self.failed
    }

    pub fn accounted(&self) -> usize {
        self.settled() + self.processing
    }
}

/// Where an item's conversion stopped.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    Encode,
    Upload,
    Cancelled,
}

impl Display for FailureStage {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            FailureStage::Encode => write!(f, "encode"),
            FailureStage::Upload => write!(f, "upload"),
            FailureStage::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Per-item failure kept for the final report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ItemFailure {
    pub record_id: String,
    pub stage: FailureStage,
    pub message: String,
}

/// Events published while a run is in flight.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ConversionEvent {
    Stats(ConversionStats),
    Progress { percent: f64 },
    ItemFailed(ItemFailure),
}

/// Final snapshot of a conversion run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversionReport {
    /// Items with a non-empty value.
    pub total_items: usize,
    /// Items dropped because their value was empty. Not failures.
    pub skipped_items: usize,
    pub stats: ConversionStats,
    pub progress: f64,
    pub failures: Vec<ItemFailure>,
    pub elapsed_ms: u64,
}

/// `settled / total * 100`, pinned to exactly 100 once everything has settled.
pub fn progress_percent(settled: usize, total: usize) -> f64 {
    if total == 0 || settled >= total {
        100.0
    } else {
        settled as f64 / total as f64 * 100.0
    }
}
