//! PNG encoding of rendered bitmaps

use bytes::Bytes;
use image::ImageFormat;
use std::io::Cursor;

use super::Bitmap;

pub const PNG_CONTENT_TYPE: &str = "image/png";

/// Encode a bitmap as PNG bytes
pub fn encode_png(bitmap: &Bitmap) -> Result<Bytes, image::ImageError> {
    let mut png_bytes = Vec::new();
    bitmap.write_to(&mut Cursor::new(&mut png_bytes), ImageFormat::Png)?;
    Ok(Bytes::from(png_bytes))
}
