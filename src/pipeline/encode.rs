//! Image encoding: `DynamicImage` → PNG bytes, and PNG → base64 `ImageData`.
//!
//! Extracted images are stored as PNG whatever their filter was inside the
//! PDF (DCT, Flate, JBIG2 ...): pdfium hands back decoded pixels, and PNG is
//! lossless, so nothing is lost on the way to disk. The same PNG bytes are
//! base64-wrapped when a rendered page is attached to the generation request.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Encode decoded pixels as PNG.
pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    Ok(buf)
}

/// Encode a rendered page as a base64 PNG attachment.
///
/// `detail: "high"` lets GPT-4-class models tile the page instead of
/// downscaling it to a single low-resolution overview.
pub fn encode_page(img: &DynamicImage) -> Result<ImageData, image::ImageError> {
    let buf = encode_png(img)?;
    let b64 = STANDARD.encode(&buf);
    debug!("Encoded page → {} bytes base64", b64.len());

    Ok(ImageData::new(b64, "image/png").with_detail("high"))
}
