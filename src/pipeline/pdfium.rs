//! pdfium backend: binds the library, opens documents and reads page layouts.
//!
//! pdfium-render wraps the pdfium C++ library through a dynamically loaded
//! binding. The library is looked up in this order:
//!
//! 1. `PDFIUM_LIB_PATH` — explicit path to `libpdfium.so` / `.dylib` / `pdfium.dll`
//! 2. the platform library name in the current working directory
//! 3. the system library search path
//!
//! Coordinates coming out of pdfium use PDF user space (origin bottom-left,
//! y up). [`PdfiumSource`] flips them to a top-left origin so image boxes and
//! text blocks read the way a page is read.

use crate::error::Pdf2VolumeError;
use crate::pipeline::document::{
    merge_segments_into_blocks, EncodedImage, PageImage, PageLayout, PageSource, TextBlock,
};
use crate::pipeline::encode;
use crate::record::BoundingBox;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Bind to a pdfium shared library.
pub fn bind_pdfium() -> Result<Pdfium, Pdf2VolumeError> {
    let bindings = match std::env::var("PDFIUM_LIB_PATH") {
        Ok(path) if !path.is_empty() => {
            debug!("Binding pdfium from PDFIUM_LIB_PATH={}", path);
            Pdfium::bind_to_library(PathBuf::from(path))
        }
        _ => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library()),
    }
    .map_err(|e| Pdf2VolumeError::PdfiumBindingFailed(format!("{:?}", e)))?;

    Ok(Pdfium::new(bindings))
}

/// Open a PDF, mapping pdfium's load errors onto [`Pdf2VolumeError::DocumentRead`].
pub fn open_document<'a>(
    pdfium: &'a Pdfium,
    pdf_path: &Path,
    password: Option<&'a str>,
) -> Result<PdfDocument<'a>, Pdf2VolumeError> {
    pdfium.load_pdf_from_file(pdf_path, password).map_err(|e| {
        let err_str = format!("{:?}", e);
        let detail = if err_str.contains("Password") || err_str.contains("password") {
            if password.is_some() {
                format!("wrong password ({err_str})")
            } else {
                format!("document is encrypted and requires a password ({err_str})")
            }
        } else {
            err_str
        };
        Pdf2VolumeError::DocumentRead {
            path: pdf_path.to_path_buf(),
            detail,
        }
    })
}

/// A [`PageSource`] over an open pdfium document.
///
/// The document handle is owned here and released when the source is dropped.
pub struct PdfiumSource<'a> {
    document: PdfDocument<'a>,
    path: PathBuf,
}

impl<'a> PdfiumSource<'a> {
    pub fn open(
        pdfium: &'a Pdfium,
        pdf_path: &Path,
        password: Option<&'a str>,
    ) -> Result<Self, Pdf2VolumeError> {
        let document = open_document(pdfium, pdf_path, password)?;
        info!("PDF loaded: {} pages", document.pages().len());
        Ok(Self {
            document,
            path: pdf_path.to_path_buf(),
        })
    }

    /// Verbatim text of page `index` (0-based), without decoding its images.
    pub fn page_text(&self, index: usize) -> Result<String, Pdf2VolumeError> {
        let page = self.page(index)?;
        Ok(page.text().map(|t| t.all()).unwrap_or_default())
    }

    fn page(&self, index: usize) -> Result<PdfPage<'a>, Pdf2VolumeError> {
        self.document
            .pages()
            .get(index as u16)
            .map_err(|e| Pdf2VolumeError::DocumentRead {
                path: self.path.clone(),
                detail: format!("page {}: {:?}", index + 1, e),
            })
    }
}

impl PageSource for PdfiumSource<'_> {
    fn page_count(&self) -> usize {
        self.document.pages().len() as usize
    }

    fn load_page(&mut self, index: usize) -> Result<PageLayout, Pdf2VolumeError> {
        let page = self.page(index)?;
        Ok(read_layout(&page, index + 1))
    }
}

/// Collect images (content-stream order) and text of one page.
fn read_layout(page: &PdfPage, page_number: usize) -> PageLayout {
    let page_height = page.height().value as f64;

    let mut images = Vec::new();
    for object in page.objects().iter() {
        let Some(image) = object.as_image_object() else {
            continue;
        };

        let bounds = object
            .bounds()
            .map_err(|e| format!("{:?}", e))
            .and_then(|quad| {
                let rect = quad.to_rect();
                flip_rect(
                    rect.left().value,
                    rect.bottom().value,
                    rect.right().value,
                    rect.top().value,
                    page_height,
                )
            });

        let data = image
            .get_raw_image()
            .map_err(|e| format!("{:?}", e))
            .and_then(|img| {
                encode::encode_png(&img)
                    .map(EncodedImage::png)
                    .map_err(|e| e.to_string())
            });

        images.push(PageImage { bounds, data });
    }

    let (text, text_blocks) = match page.text() {
        Ok(page_text) => {
            let segments = page_text
                .segments()
                .iter()
                .filter_map(|segment| {
                    let rect = segment.bounds();
                    flip_rect(
                        rect.left().value,
                        rect.bottom().value,
                        rect.right().value,
                        rect.top().value,
                        page_height,
                    )
                    .ok()
                    .map(|bounds| TextBlock {
                        text: segment.text(),
                        bounds,
                    })
                })
                .collect();
            (page_text.all(), merge_segments_into_blocks(segments))
        }
        Err(e) => {
            warn!("Page {}: text layer unavailable: {:?}", page_number, e);
            (String::new(), Vec::new())
        }
    };

    debug!(
        "Page {}: {} images, {} text blocks",
        page_number,
        images.len(),
        text_blocks.len()
    );

    PageLayout {
        images,
        text_blocks,
        text,
    }
}

/// Convert a bottom-left-origin rectangle to a top-left-origin [`BoundingBox`].
fn flip_rect(
    left: f32,
    bottom: f32,
    right: f32,
    top: f32,
    page_height: f64,
) -> Result<BoundingBox, String> {
    BoundingBox::new(
        left as f64,
        page_height - top as f64,
        right as f64,
        page_height - bottom as f64,
    )
}
