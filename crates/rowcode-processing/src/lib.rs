//! rowcode processing
//!
//! Everything between a data source and the upload queue: reading records, encoding
//! values into barcode images and the pipeline that drives a whole batch.

pub mod encoder;
pub mod pipeline;
pub mod source;

pub use encoder::{BarcodeEncoder, Encoder};
pub use pipeline::{validate_config, ConversionPipeline};
pub use source::{CsvSource, DataSource, JsonSource, MemorySource};
