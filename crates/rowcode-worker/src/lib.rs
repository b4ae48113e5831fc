//! rowcode worker – bounded, rate-limited, retrying execution of asynchronous tasks.
//!
//! The queue knows nothing about barcodes or records: it runs opaque [`QueueTask`]s and
//! classifies their [`TaskError`](rowcode_core::TaskError)s to decide on retries.

mod queue;
mod task;

pub use queue::{QueueStatus, WorkQueue, WorkQueueConfig};
pub use task::{QueueTask, TaskHandle};
