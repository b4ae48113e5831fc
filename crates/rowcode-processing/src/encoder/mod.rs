//! Symbol encoders
//!
//! The pipeline only sees the [`Encoder`] trait. [`BarcodeEncoder`] is the built-in
//! implementation for linear barcodes; other symbologies plug in behind the same trait.

pub mod code39;
pub mod ean;
pub mod render;

use rowcode_core::models::{BarcodeFormat, ConversionConfig, EncodedImage, EncodingKind};
use rowcode_core::EncodeError;

/// Turns a text value into an image.
///
/// Must be deterministic for a given value and config. A rejection is final: the
/// pipeline records it as a failed item and never retries it.
pub trait Encoder: Send + Sync {
    fn encode(&self, value: &str, config: &ConversionConfig) -> Result<EncodedImage, EncodeError>;
}

/// Code 39, EAN-13 and EAN-8 rendered to PNG or JPEG.
#[derive(Debug, Clone, Copy, Default)]
pub struct BarcodeEncoder;

impl BarcodeEncoder {
    pub fn new() -> Self {
        Self
    }

    /// Module sequence for `value` without rendering it.
    pub fn modules(&self, value: &str, kind: EncodingKind) -> Result<Vec<bool>, EncodeError> {
        match kind {
            EncodingKind::Barcode(BarcodeFormat::Code39) => code39::encode(value),
            EncodingKind::Barcode(BarcodeFormat::Ean13) => ean::encode_ean13(value),
            EncodingKind::Barcode(BarcodeFormat::Ean8) => ean::encode_ean8(value),
            EncodingKind::Qr => Err(EncodeError::Unsupported(
                "QR codes are not supported by the built-in barcode encoder".to_string(),
            )),
        }
    }
}

impl Encoder for BarcodeEncoder {
    fn encode(&self, value: &str, config: &ConversionConfig) -> Result<EncodedImage, EncodeError> {
        let modules = self.modules(value, config.kind)?;
        render::render(&modules, &config.style, config.image_format)
    }
}
