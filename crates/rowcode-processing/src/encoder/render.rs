//! Rasterize a module sequence into an encoded image.

use bytes::Bytes;
use image::{ImageFormat as RasterFormat, Rgb as Pixel, RgbImage};
use std::io::Cursor;

use rowcode_core::models::{EncodedImage, ImageFormat, StyleOptions};
use rowcode_core::EncodeError;

/// Largest image side we are willing to allocate.
const MAX_SIDE: u32 = 16_384;

fn raster_format(format: ImageFormat) -> RasterFormat {
    match format {
        ImageFormat::Png => RasterFormat::Png,
        ImageFormat::Jpeg => RasterFormat::Jpeg,
    }
}

/// Draw `modules` (dark = `true`) as full-height bars with a quiet zone on both sides.
pub fn render(
    modules: &[bool],
    style: &StyleOptions,
    format: ImageFormat,
) -> Result<EncodedImage, EncodeError> {
    if style.module_width == 0 || style.height == 0 {
        return Err(EncodeError::Render(
            "module width and height must be at least 1 pixel".to_string(),
        ));
    }

    let total_modules = (modules.len() as u64) + 2 * style.quiet_zone as u64;
    let width = total_modules * style.module_width as u64;
    if width == 0 || width > MAX_SIDE as u64 || style.height > MAX_SIDE {
        return Err(EncodeError::Render(format!(
            "image of {}x{} pixels is out of bounds",
            width, style.height
        )));
    }

    let quiet = style.quiet_zone as usize;
    let module_width = style.module_width as usize;
    let foreground = Pixel(style.foreground.0);
    let background = Pixel(style.background.0);

    let image = RgbImage::from_fn(width as u32, style.height, |x, _| {
        let module = (x as usize / module_width).checked_sub(quiet);
        match module.and_then(|i| modules.get(i)) {
            Some(true) => foreground,
            _ => background,
        }
    });

    let mut buffer = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut buffer), raster_format(format))
        .map_err(|e| EncodeError::Render(e.to_string()))?;

    Ok(EncodedImage {
        bytes: Bytes::from(buffer),
        mime_type: format.mime_type().to_string(),
        extension: format.extension().to_string(),
    })
}
