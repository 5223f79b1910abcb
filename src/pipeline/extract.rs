//! Metadata extractor: walks a document page by page and turns every
//! embedded image into an [`ImageRecord`].
//!
//! ## Ordering
//!
//! Records come out ordered by page, then by the order the page's content
//! stream lists the images. Content-stream order is not always visual
//! top-to-bottom order; recovering visual order would need full layout
//! analysis, so this is the extractor's one approximation. Sequence numbers
//! restart at 1 on every page and are consumed by skipped images too, so an
//! id always points at the same content-stream slot.
//!
//! ## Captions
//!
//! A text block counts as a caption when it starts with a caption marker
//! (`Figure 3:`, `fig. 2.1.`, `4.2:` ...) and its vertical gap to the image is
//! within [`ExtractionConfig::caption_distance`]. When no caption qualifies,
//! the nearest block of any kind within
//! [`ExtractionConfig::nearby_distance`] becomes `nearby_text`. Equal gaps
//! resolve in favour of the block above the image. Both thresholds are
//! heuristics tuned for textbook layouts, not a layout model.
//!
//! ## Failure handling
//!
//! A page that cannot be loaded is fatal: the iterator yields the error once
//! and then ends. A single image that cannot be decoded, is empty or has no
//! usable box is skipped with a `warn!` and a [`SkippedImage`] diagnostic.
//! A storage failure is fatal. A record is only yielded after its bytes are
//! on disk.

use crate::config::ExtractionConfig;
use crate::error::{ExtractionError, Pdf2VolumeError};
use crate::output::ExtractionSummary;
use crate::pipeline::document::{PageImage, PageSource, TextBlock};
use crate::pipeline::pdfium::PdfiumSource;
use crate::pipeline::store::ImageStore;
use crate::record::{BoundingBox, ImageId, ImageRecord, SkippedImage};
use once_cell::sync::Lazy;
use pdfium_render::prelude::Pdfium;
use regex::Regex;
use std::collections::VecDeque;
use std::path::Path;
use tracing::{debug, info, warn};

/// `Figure 3:`, `Fig. 2.1.`, `fig 4a:` or a bare dotted numeral such as `3.2:` / `5.`.
///
/// The terminator must be followed by whitespace or the end of the text, so
/// the `.` inside `Figure 3.2 shows` does not count.
static RE_CAPTION_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^\s*(?:(?:figure|fig\.?)\s*\d+(?:[.\-]\d+)*[a-z]?|\d+(?:\.\d+)*)\s*[:.](?:\s|$)",
    )
    .unwrap()
});

/// True when `text` starts with a caption marker.
pub fn is_caption(text: &str) -> bool {
    RE_CAPTION_MARKER.is_match(text)
}

/// Scans documents into image records.
#[derive(Debug, Clone)]
pub struct MetadataExtractor {
    config: ExtractionConfig,
}

impl MetadataExtractor {
    pub fn new(config: ExtractionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Open `pdf_path` with pdfium and return the lazy record sequence.
    ///
    /// The document handle lives inside the returned iterator and is closed
    /// when it is dropped.
    ///
    /// # Errors
    /// [`Pdf2VolumeError::DocumentRead`] when the file cannot be opened as a PDF.
    pub fn extract<'a>(
        &'a self,
        pdfium: &'a Pdfium,
        pdf_path: &Path,
    ) -> Result<ImageRecords<PdfiumSource<'a>>, Pdf2VolumeError> {
        let source = PdfiumSource::open(pdfium, pdf_path, self.config.password.as_deref())?;
        Ok(self.scan(source))
    }

    /// Scan any [`PageSource`].
    pub fn scan<S: PageSource>(&self, source: S) -> ImageRecords<S> {
        let total_pages = source.page_count();
        info!(
            "Scanning {} pages into {}",
            total_pages,
            self.config.output_dir.display()
        );
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_scan_start(total_pages);
        }

        ImageRecords {
            source,
            store: ImageStore::new(&self.config.output_dir),
            config: self.config.clone(),
            state: DocumentScanState::default(),
            total_pages,
            finished: false,
        }
    }
}

/// Transient per-run scan state, owned by [`ImageRecords`].
#[derive(Debug, Default)]
struct DocumentScanState {
    /// Index of the next page to load.
    next_page: usize,
    /// 1-based number of the page whose images are pending.
    current_page: usize,
    /// Last sequence number handed out on the current page.
    sequence_in_page: usize,
    /// Images of the current page not yet processed.
    pending: VecDeque<PageImage>,
    /// Text blocks of the current page, for caption lookups.
    text_blocks: Vec<TextBlock>,
    /// Verbatim text of every page loaded so far.
    page_texts: Vec<String>,
    extracted: usize,
    skipped: Vec<SkippedImage>,
}

/// Lazy, finite, one-shot sequence of image records.
///
/// Yields `Ok(record)` per stored image and at most one `Err` for a fatal
/// failure, after which it is exhausted.
pub struct ImageRecords<S: PageSource> {
    source: S,
    store: ImageStore,
    config: ExtractionConfig,
    state: DocumentScanState,
    total_pages: usize,
    finished: bool,
}

impl<S: PageSource> ImageRecords<S> {
    /// Images skipped so far.
    pub fn skipped(&self) -> &[SkippedImage] {
        &self.state.skipped
    }

    /// Verbatim text of the pages loaded so far, in page order.
    pub fn page_texts(&self) -> &[String] {
        &self.state.page_texts
    }

    pub fn total_pages(&self) -> usize {
        self.total_pages
    }

    /// Drain the sequence and collect everything the prompt needs.
    ///
    /// # Errors
    /// The first fatal error encountered; records gathered before it are dropped.
    pub fn finish(mut self) -> Result<ExtractionSummary, Pdf2VolumeError> {
        let mut records = Vec::new();
        for item in self.by_ref() {
            records.push(item?);
        }
        Ok(ExtractionSummary {
            records,
            skipped: std::mem::take(&mut self.state.skipped),
            page_texts: std::mem::take(&mut self.state.page_texts),
            page_count: self.total_pages,
        })
    }

    /// Load the next page into the scan state. Returns false when no pages remain.
    fn advance_page(&mut self) -> Result<bool, Pdf2VolumeError> {
        if self.state.next_page >= self.total_pages {
            return Ok(false);
        }

        let index = self.state.next_page;
        let layout = self.source.load_page(index)?;
        let page_number = index + 1;

        if layout.images.is_empty() {
            debug!("Page {}: no images", page_number);
        } else {
            debug!("Page {}: {} images", page_number, layout.images.len());
        }
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_page_scanned(page_number, self.total_pages, layout.images.len());
        }

        self.state.next_page += 1;
        self.state.current_page = page_number;
        self.state.sequence_in_page = 0;
        self.state.pending = layout.images.into();
        self.state.text_blocks = layout.text_blocks;
        self.state.page_texts.push(layout.text);
        Ok(true)
    }

    /// Turn one pending image into a record, or explain why it was skipped.
    fn process_image(
        &mut self,
        image: PageImage,
    ) -> Result<Result<ImageRecord, ExtractionError>, Pdf2VolumeError> {
        self.state.sequence_in_page += 1;
        let page = self.state.current_page;
        let sequence = self.state.sequence_in_page;

        let data = match image.data {
            Ok(data) if data.bytes.is_empty() => {
                return Ok(Err(ExtractionError::EmptyImage { page, sequence }))
            }
            Ok(data) => data,
            Err(detail) => {
                return Ok(Err(ExtractionError::DecodeFailed {
                    page,
                    sequence,
                    detail,
                }))
            }
        };
        let bounds = match image.bounds {
            Ok(bounds) => bounds,
            Err(detail) => {
                return Ok(Err(ExtractionError::InvalidBounds {
                    page,
                    sequence,
                    detail,
                }))
            }
        };

        let id = ImageId::new(page, sequence)?;
        let file_path = self.store.save(&id, &data.bytes, data.extension)?;
        let (caption, nearby_text) = match_context(
            &bounds,
            &self.state.text_blocks,
            self.config.caption_distance,
            self.config.nearby_distance,
        );

        Ok(Ok(ImageRecord {
            id,
            page_number: page,
            bounding_box: bounds,
            file_path,
            caption,
            nearby_text,
        }))
    }

    fn fail(&mut self, err: Pdf2VolumeError) -> Option<Result<ImageRecord, Pdf2VolumeError>> {
        self.finished = true;
        Some(Err(err))
    }
}

impl<S: PageSource> Iterator for ImageRecords<S> {
    type Item = Result<ImageRecord, Pdf2VolumeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        loop {
            let Some(image) = self.state.pending.pop_front() else {
                match self.advance_page() {
                    Ok(true) => continue,
                    Ok(false) => {
                        self.finished = true;
                        info!(
                            "Scan complete: {} images extracted, {} skipped",
                            self.state.extracted,
                            self.state.skipped.len()
                        );
                        if let Some(ref cb) = self.config.progress_callback {
                            cb.on_scan_complete(self.state.extracted, self.state.skipped.len());
                        }
                        return None;
                    }
                    Err(e) => return self.fail(e),
                }
            };

            match self.process_image(image) {
                Ok(Ok(record)) => {
                    self.state.extracted += 1;
                    if let Some(ref cb) = self.config.progress_callback {
                        cb.on_image_extracted(&record.id.to_string());
                    }
                    return Some(Ok(record));
                }
                Ok(Err(skip)) => {
                    let (page, sequence) = skip.position();
                    warn!("Skipping page {} image {}: {}", page, sequence, skip);
                    if let Some(ref cb) = self.config.progress_callback {
                        cb.on_image_skipped(page, sequence, &skip.to_string());
                    }
                    self.state.skipped.push(SkippedImage::from(&skip));
                }
                Err(e) => return self.fail(e),
            }
        }
    }
}

impl<S: PageSource> std::iter::FusedIterator for ImageRecords<S> {}

/// Find the caption, or failing that the nearby text, for an image box.
///
/// Returns `(caption, nearby_text)`; at most one is `Some`.
pub fn match_context(
    image: &BoundingBox,
    blocks: &[TextBlock],
    caption_distance: f64,
    nearby_distance: f64,
) -> (Option<String>, Option<String>) {
    if let Some(caption) = nearest_block(image, blocks, caption_distance, |b| is_caption(&b.text)) {
        return (Some(caption.text.trim().to_string()), None);
    }
    let nearby = nearest_block(image, blocks, nearby_distance, |_| true);
    (None, nearby.map(|b| b.text.trim().to_string()))
}

/// Nearest block by vertical gap within `max_gap`; ties go to the block above.
fn nearest_block<'b>(
    image: &BoundingBox,
    blocks: &'b [TextBlock],
    max_gap: f64,
    accept: impl Fn(&TextBlock) -> bool,
) -> Option<&'b TextBlock> {
    let mut best: Option<(&TextBlock, f64, bool)> = None;

    for block in blocks.iter().filter(|b| !b.text.trim().is_empty()) {
        if !accept(block) {
            continue;
        }
        let gap = image.vertical_gap(&block.bounds);
        if gap > max_gap {
            continue;
        }
        let above = image.has_above(&block.bounds);
        let better = match best {
            None => true,
            Some((_, best_gap, best_above)) => gap < best_gap || (gap == best_gap && above && !best_above),
        };
        if better {
            best = Some((block, gap, above));
        }
    }

    best.map(|(block, _, _)| block)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::document::{EncodedImage, PageLayout};

    fn bbox(x0: f64, y0: f64, x1: f64, y1: f64) -> BoundingBox {
        BoundingBox::new(x0, y0, x1, y1).unwrap()
    }

    fn block(text: &str, y0: f64, y1: f64) -> TextBlock {
        TextBlock {
            text: text.into(),
            bounds: bbox(72.0, y0, 400.0, y1),
        }
    }

    fn image_at(y0: f64, y1: f64) -> PageImage {
        PageImage {
            bounds: Ok(bbox(100.0, y0, 300.0, y1)),
            data: Ok(EncodedImage::png(vec![1, 2, 3])),
        }
    }

    #[test]
    fn caption_markers() {
        assert!(is_caption("Figure 3: Cross-section of a chloroplast"));
        assert!(is_caption("FIGURE 12. Overview"));
        assert!(is_caption("Fig. 2.1: Membrane"));
        assert!(is_caption("fig 4a. Detail"));
        assert!(is_caption("3.2: Cell wall"));
        assert!(is_caption("5. Results"));
        assert!(!is_caption("Figures show the results"));
        assert!(!is_caption("The figure 3: above"));
        assert!(!is_caption("Photosynthesis happens in chloroplasts."));
        assert!(!is_caption("Figure 3 shows"));
        assert!(is_caption("Figure 3.2. Thylakoid stacks"));
        assert!(is_caption("Figure 7."));
        assert!(!is_caption("Figure 3.2 shows that the stroma surrounds the thylakoids."));
        assert!(!is_caption("Fig. 2.1 compares both membranes."));
        assert!(!is_caption("3.14 is close to pi."));
    }

    #[test]
    fn dotted_figure_reference_in_body_is_not_a_caption() {
        let image = bbox(100.0, 100.0, 300.0, 200.0);
        let blocks = vec![block(
            "Figure 3.2 shows that the stroma surrounds the thylakoids.",
            210.0,
            222.0,
        )];
        let (caption, nearby) = match_context(&image, &blocks, 36.0, 120.0);
        assert!(caption.is_none());
        assert_eq!(
            nearby.as_deref(),
            Some("Figure 3.2 shows that the stroma surrounds the thylakoids.")
        );
    }

    #[test]
    fn caption_within_threshold_wins_over_nearer_body_text() {
        let image = bbox(100.0, 100.0, 300.0, 200.0);
        let blocks = vec![
            block("Body text directly above.", 90.0, 98.0),
            block("Figure 3: Cross-section of a chloroplast", 210.0, 222.0),
        ];
        let (caption, nearby) = match_context(&image, &blocks, 36.0, 120.0);
        assert_eq!(caption.as_deref(), Some("Figure 3: Cross-section of a chloroplast"));
        assert!(nearby.is_none());
    }

    #[test]
    fn caption_outside_threshold_falls_back_to_nearby() {
        let image = bbox(100.0, 100.0, 300.0, 200.0);
        let blocks = vec![block("Figure 3: Far away caption", 260.0, 272.0)];
        let (caption, nearby) = match_context(&image, &blocks, 36.0, 120.0);
        assert!(caption.is_none());
        assert_eq!(nearby.as_deref(), Some("Figure 3: Far away caption"));
    }

    #[test]
    fn nearby_tie_prefers_above() {
        let image = bbox(100.0, 100.0, 300.0, 200.0);
        let blocks = vec![
            block("Below the image.", 220.0, 232.0),
            block("Above the image.", 68.0, 80.0),
        ];
        let (caption, nearby) = match_context(&image, &blocks, 36.0, 120.0);
        assert!(caption.is_none());
        assert_eq!(nearby.as_deref(), Some("Above the image."));
    }

    #[test]
    fn nothing_within_either_threshold() {
        let image = bbox(100.0, 100.0, 300.0, 200.0);
        let blocks = vec![block("Far below.", 500.0, 512.0)];
        assert_eq!(match_context(&image, &blocks, 36.0, 120.0), (None, None));
    }

    #[test]
    fn skipped_image_consumes_sequence_number() {
        let tmp = tempfile::tempdir().unwrap();
        let config = ExtractionConfig::builder().output_dir(tmp.path()).build().unwrap();
        let pages = vec![PageLayout {
            images: vec![
                image_at(10.0, 50.0),
                PageImage {
                    bounds: Ok(bbox(100.0, 60.0, 300.0, 90.0)),
                    data: Err("unsupported filter".into()),
                },
                image_at(100.0, 150.0),
            ],
            ..Default::default()
        }];

        let mut records = MetadataExtractor::new(config).scan(pages);
        let ids: Vec<String> = records
            .by_ref()
            .map(|r| r.unwrap().id.to_string())
            .collect();
        assert_eq!(ids, vec!["page_1_1", "page_1_3"]);
        assert_eq!(records.skipped().len(), 1);
        assert_eq!((records.skipped()[0].page, records.skipped()[0].sequence), (1, 2));
    }

    #[test]
    fn empty_bytes_and_bad_bounds_are_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        let config = ExtractionConfig::builder().output_dir(tmp.path()).build().unwrap();
        let pages = vec![PageLayout {
            images: vec![
                PageImage {
                    bounds: Ok(bbox(0.0, 0.0, 10.0, 10.0)),
                    data: Ok(EncodedImage::png(Vec::new())),
                },
                PageImage {
                    bounds: Err("empty or inverted box".into()),
                    data: Ok(EncodedImage::png(vec![1])),
                },
            ],
            ..Default::default()
        }];
        let summary = MetadataExtractor::new(config).scan(pages).finish().unwrap();
        assert!(summary.records.is_empty());
        assert_eq!(summary.skipped.len(), 2);
    }

    #[test]
    fn iterator_is_fused_after_fatal_error() {
        struct Broken;
        impl PageSource for Broken {
            fn page_count(&self) -> usize {
                3
            }
            fn load_page(&mut self, index: usize) -> Result<PageLayout, Pdf2VolumeError> {
                Err(Pdf2VolumeError::DocumentRead {
                    path: "broken.pdf".into(),
                    detail: format!("page {}", index + 1),
                })
            }
        }

        let tmp = tempfile::tempdir().unwrap();
        let config = ExtractionConfig::builder().output_dir(tmp.path()).build().unwrap();
        let mut records = MetadataExtractor::new(config).scan(Broken);
        assert!(matches!(records.next(), Some(Err(Pdf2VolumeError::DocumentRead { .. }))));
        assert!(records.next().is_none());
        assert!(records.next().is_none());
    }
}
