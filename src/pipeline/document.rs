//! Page layouts: the backend-neutral view of a PDF page the extractor works on.
//!
//! A [`PageSource`] hands out one [`PageLayout`] per page, in page order.
//! Each layout lists the page's embedded images in content-stream order
//! together with their (possibly failed) decoded bytes, plus the page's text
//! blocks with positions. The extractor never touches the PDF library
//! directly, so it can be driven by the pdfium backend in production and by
//! in-memory sources in tests.

use crate::error::Pdf2VolumeError;
use crate::record::BoundingBox;

/// Raster data of one image, already encoded for storage.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedImage {
    pub bytes: Vec<u8>,
    /// File extension without the dot, e.g. `png`.
    pub extension: &'static str,
}

impl EncodedImage {
    pub fn png(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            extension: "png",
        }
    }
}

/// One embedded image as listed by the content stream.
///
/// Decoding and positioning can fail independently per image; the error
/// strings are carried through so the extractor can report them.
#[derive(Debug, Clone)]
pub struct PageImage {
    pub bounds: Result<BoundingBox, String>,
    pub data: Result<EncodedImage, String>,
}

/// A run of text with its position, in the same coordinate space as images.
#[derive(Debug, Clone, PartialEq)]
pub struct TextBlock {
    pub text: String,
    pub bounds: BoundingBox,
}

/// Everything the extractor needs to know about one page.
#[derive(Debug, Clone, Default)]
pub struct PageLayout {
    /// Embedded images in content-stream order.
    pub images: Vec<PageImage>,
    /// Positioned text blocks used for caption and nearby-text matching.
    pub text_blocks: Vec<TextBlock>,
    /// Verbatim page text, passed through to the prompt.
    pub text: String,
}

/// A document that can be read one page at a time.
pub trait PageSource {
    /// Total number of pages.
    fn page_count(&self) -> usize;

    /// Load page `index` (0-based).
    ///
    /// A failure here is fatal for the scan: it means the document itself
    /// is unreadable, not that a single image is broken.
    fn load_page(&mut self, index: usize) -> Result<PageLayout, Pdf2VolumeError>;
}

impl<S: PageSource + ?Sized> PageSource for Box<S> {
    fn page_count(&self) -> usize {
        (**self).page_count()
    }

    fn load_page(&mut self, index: usize) -> Result<PageLayout, Pdf2VolumeError> {
        (**self).load_page(index)
    }
}

/// In-memory source, handy for callers that already have layouts.
impl PageSource for Vec<PageLayout> {
    fn page_count(&self) -> usize {
        self.len()
    }

    fn load_page(&mut self, index: usize) -> Result<PageLayout, Pdf2VolumeError> {
        self.get(index)
            .cloned()
            .ok_or_else(|| Pdf2VolumeError::Internal(format!("page index {index} out of range")))
    }
}

/// Merge consecutive text segments that sit on the same line into blocks.
///
/// PDF text extraction yields short segments (one per font run or word
/// group). Two consecutive segments belong to the same line when their
/// vertical centres differ by less than half the shorter segment's height.
/// Segments are joined with a single space.
pub fn merge_segments_into_blocks(segments: Vec<TextBlock>) -> Vec<TextBlock> {
    let mut blocks: Vec<TextBlock> = Vec::new();

    for segment in segments {
        let text = segment.text.trim();
        if text.is_empty() {
            continue;
        }

        if let Some(last) = blocks.last_mut() {
            if same_line(&last.bounds, &segment.bounds) {
                last.text.push(' ');
                last.text.push_str(text);
                last.bounds = union(&last.bounds, &segment.bounds);
                continue;
            }
        }

        blocks.push(TextBlock {
            text: text.to_string(),
            bounds: segment.bounds,
        });
    }

    blocks
}

fn same_line(a: &BoundingBox, b: &BoundingBox) -> bool {
    let centre_a = (a.y0 + a.y1) / 2.0;
    let centre_b = (b.y0 + b.y1) / 2.0;
    let tolerance = a.height().min(b.height()) / 2.0;
    (centre_a - centre_b).abs() < tolerance
}

fn union(a: &BoundingBox, b: &BoundingBox) -> BoundingBox {
    BoundingBox {
        x0: a.x0.min(b.x0),
        y0: a.y0.min(b.y0),
        x1: a.x1.max(b.x1),
        y1: a.y1.max(b.y1),
    }
}
