//! Page rasterisation for `--attach-pages`: render pages to `DynamicImage` via pdfium.
//!
//! ## Why spawn_blocking?
//!
//! pdfium uses thread-local state internally and is not safe to call from
//! async contexts. `tokio::task::spawn_blocking` moves the work onto the
//! blocking pool so Tokio worker threads do not stall while pages render.
//!
//! ## Size
//!
//! Pages are scaled to `dpi`, then capped so the longest edge never exceeds
//! `max_rendered_pixels`. An A0 poster at 150 DPI would otherwise produce a
//! 7,000 × 10,000 px image.

use crate::config::GenerationConfig;
use crate::error::Pdf2VolumeError;
use crate::pipeline::pdfium::{bind_pdfium, open_document};
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::Path;
use tracing::{debug, info};

/// Rasterise every page of a PDF.
///
/// # Returns
/// `(page_index_0based, DynamicImage)` tuples in page order.
pub async fn render_pages(
    pdf_path: &Path,
    password: Option<&str>,
    config: &GenerationConfig,
) -> Result<Vec<(usize, DynamicImage)>, Pdf2VolumeError> {
    let path = pdf_path.to_path_buf();
    let password = password.map(str::to_string);
    let dpi = config.dpi;
    let max_pixels = config.max_rendered_pixels;

    tokio::task::spawn_blocking(move || {
        let pdfium = bind_pdfium()?;
        render_pages_blocking(&pdfium, &path, password.as_deref(), dpi, max_pixels)
    })
    .await
    .map_err(|e| Pdf2VolumeError::Internal(format!("Render task panicked: {}", e)))?
}

fn render_pages_blocking(
    pdfium: &Pdfium,
    pdf_path: &Path,
    password: Option<&str>,
    dpi: u32,
    max_pixels: u32,
) -> Result<Vec<(usize, DynamicImage)>, Pdf2VolumeError> {
    let document = open_document(pdfium, pdf_path, password)?;
    let pages = document.pages();
    let total_pages = pages.len() as usize;
    info!("Rendering {} pages at {} DPI", total_pages, dpi);

    let render_config = PdfRenderConfig::new()
        .scale_page_by_factor(dpi as f32 / 72.0)
        .set_maximum_width(max_pixels as i32)
        .set_maximum_height(max_pixels as i32);

    let mut results = Vec::with_capacity(total_pages);
    for idx in 0..total_pages {
        let page = pages
            .get(idx as u16)
            .map_err(|e| Pdf2VolumeError::RenderFailed {
                page: idx + 1,
                detail: format!("{:?}", e),
            })?;

        let bitmap = page
            .render_with_config(&render_config)
            .map_err(|e| Pdf2VolumeError::RenderFailed {
                page: idx + 1,
                detail: format!("{:?}", e),
            })?;

        let image = bitmap.as_image();
        debug!(
            "Rendered page {} → {}x{} px",
            idx + 1,
            image.width(),
            image.height()
        );
        results.push((idx, image));
    }

    Ok(results)
}
