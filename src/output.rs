//! Result types returned by the public entry points.

use crate::record::{ImageRecord, SkippedImage};
use crate::volume::{Volume, VolumeStats};
use serde::{Deserialize, Serialize};

/// Everything a finished scan produced.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionSummary {
    /// Stored images, ordered by page then content-stream position.
    pub records: Vec<ImageRecord>,
    /// Images that were found but could not be extracted.
    pub skipped: Vec<SkippedImage>,
    /// Verbatim text per page, in page order.
    pub page_texts: Vec<String>,
    pub page_count: usize,
}

/// Contents of the `metadata.json` file written next to the images.
#[derive(Debug, Clone, Serialize)]
pub struct ImageMetadataFile<'a> {
    pub source: String,
    pub page_count: usize,
    pub images: &'a [ImageRecord],
    pub skipped: &'a [SkippedImage],
}

/// Timing and token counts for a generation run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationStats {
    pub total_pages: usize,
    pub extracted_images: usize,
    pub skipped_images: usize,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub retries: u32,
    pub extract_duration_ms: u64,
    pub llm_duration_ms: u64,
    pub total_duration_ms: u64,
    /// Counts from the parsed volume; `None` when the answer did not parse.
    pub volume: Option<VolumeStats>,
    /// `image_page_P_S` references to ids that were never extracted.
    pub dangling_image_references: Vec<String>,
}

/// Output of [`crate::generate`].
#[derive(Debug, Clone)]
pub struct GenerationOutput {
    /// The cleaned model answer, written to disk unchanged.
    pub json: String,
    /// Parsed form of `json`, when it matches the volume schema.
    pub volume: Option<Volume>,
    pub extraction: ExtractionSummary,
    pub stats: GenerationStats,
}
