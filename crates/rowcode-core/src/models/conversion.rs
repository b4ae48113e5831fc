use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// Linear barcode symbologies understood by the configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BarcodeFormat {
    Code39,
    Ean13,
    Ean8,
}

impl Display for BarcodeFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            BarcodeFormat::Code39 => write!(f, "code39"),
            BarcodeFormat::Ean13 => write!(f, "ean13"),
            BarcodeFormat::Ean8 => write!(f, "ean8"),
        }
    }
}

/// What kind of symbol to generate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case", tag = "type", content = "format")]
pub enum EncodingKind {
    Barcode(BarcodeFormat),
    Qr,
}

impl Display for EncodingKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            EncodingKind::Barcode(format) => write!(f, "{}", format),
            EncodingKind::Qr => write!(f, "qr"),
        }
    }
}

impl FromStr for EncodingKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(['-', '_'], "").as_str() {
            "code39" => Ok(EncodingKind::Barcode(BarcodeFormat::Code39)),
            "ean13" => Ok(EncodingKind::Barcode(BarcodeFormat::Ean13)),
            "ean8" => Ok(EncodingKind::Barcode(BarcodeFormat::Ean8)),
            "qr" | "qrcode" => Ok(EncodingKind::Qr),
            _ => Err(anyhow::anyhow!("Invalid encoding kind: {}", s)),
        }
    }
}

/// Output image container.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    #[default]
    Png,
    Jpeg,
}

impl ImageFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpg",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
        }
    }
}

impl Display for ImageFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            ImageFormat::Png => write!(f, "png"),
            ImageFormat::Jpeg => write!(f, "jpeg"),
        }
    }
}

impl FromStr for ImageFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "png" => Ok(ImageFormat::Png),
            "jpeg" | "jpg" => Ok(ImageFormat::Jpeg),
            _ => Err(anyhow::anyhow!("Invalid image format: {}", s)),
        }
    }
}

/// RGB color used for bars and background.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Rgb(pub [u8; 3]);

impl Rgb {
    pub const BLACK: Rgb = Rgb([0, 0, 0]);
    pub const WHITE: Rgb = Rgb([255, 255, 255]);
}

impl FromStr for Rgb {
    type Err = anyhow::Error;

    /// Parses `#rrggbb` or `rrggbb`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.is_ascii() {
            return Err(anyhow::anyhow!("Invalid color '{}', expected #rrggbb", s));
        }
        let channel = |i: usize| {
            u8::from_str_radix(&hex[i..i + 2], 16)
                .map_err(|_| anyhow::anyhow!("Invalid color '{}', expected #rrggbb", s))
        };
        Ok(Rgb([channel(0)?, channel(2)?, channel(4)?]))
    }
}

/// Encoder-specific styling. The pipeline never looks inside.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StyleOptions {
    /// Width of the narrowest bar in pixels.
    pub module_width: u32,
    /// Bar height in pixels.
    pub height: u32,
    /// Blank margin on each side, in modules.
    pub quiet_zone: u32,
    pub foreground: Rgb,
    pub background: Rgb,
}

impl Default for StyleOptions {
    fn default() -> Self {
        Self {
            module_width: 2,
            height: 100,
            quiet_zone: 10,
            foreground: Rgb::BLACK,
            background: Rgb::WHITE,
        }
    }
}

/// User-supplied encoding configuration for one conversion run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConversionConfig {
    pub kind: EncodingKind,
    #[serde(default)]
    pub image_format: ImageFormat,
    #[serde(default)]
    pub style: StyleOptions,
}

impl ConversionConfig {
    pub fn new(kind: EncodingKind) -> Self {
        Self {
            kind,
            image_format: ImageFormat::default(),
            style: StyleOptions::default(),
        }
    }

    pub fn with_image_format(mut self, image_format: ImageFormat) -> Self {
        self.image_format = image_format;
        self
    }

    pub fn with_style(mut self, style: StyleOptions) -> Self {
        self.style = style;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoding_kind_parses_common_spellings() {
        assert_eq!(
            "EAN-13".parse::<EncodingKind>().unwrap(),
            EncodingKind::Barcode(BarcodeFormat::Ean13)
        );
        assert_eq!(
            "code_39".parse::<EncodingKind>().unwrap(),
            EncodingKind::Barcode(BarcodeFormat::Code39)
        );
        assert_eq!("QRCode".parse::<EncodingKind>().unwrap(), EncodingKind::Qr);
        assert!("pdf417".parse::<EncodingKind>().is_err());
    }

    #[test]
    fn rgb_parses_hex() {
        assert_eq!("#ff8000".parse::<Rgb>().unwrap(), Rgb([255, 128, 0]));
        assert_eq!("000000".parse::<Rgb>().unwrap(), Rgb::BLACK);
        assert!("#fff".parse::<Rgb>().is_err());
        assert!("#gg0000".parse::<Rgb>().is_err());
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let config: ConversionConfig = serde_json::from_str(
            r#"{"kind": {"type": "barcode", "format": "ean8"}}"#,
        )
        .unwrap();
        assert_eq!(config.kind, EncodingKind::Barcode(BarcodeFormat::Ean8));
        assert_eq!(config.image_format, ImageFormat::Png);
        assert_eq!(config.style, StyleOptions::default());

        let qr: ConversionConfig =
            serde_json::from_str(r#"{"kind": {"type": "qr"}, "image_format": "jpeg"}"#).unwrap();
        assert_eq!(qr.kind, EncodingKind::Qr);
        assert_eq!(qr.image_format.mime_type(), "image/jpeg");
    }
}
