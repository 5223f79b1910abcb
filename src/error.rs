//! Error types for the pdf2volume library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`Pdf2VolumeError`] — **Fatal**: the run cannot proceed at all
//!   (unreadable PDF, unwritable image directory, provider not configured).
//!   Returned as `Err(Pdf2VolumeError)` from every public entry point and
//!   yielded once by [`crate::pipeline::extract::ImageRecords`] before it
//!   stops.
//!
//! * [`ExtractionError`] — **Non-fatal**: a single embedded image could not
//!   be decoded or positioned. The image is skipped, the error is kept as a
//!   [`crate::record::SkippedImage`] diagnostic and the scan moves on to the
//!   next image.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the pdf2volume library.
#[derive(Debug, Error)]
pub enum Pdf2VolumeError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    /// The PDF could not be opened or a page could not be loaded
    /// (corrupt header/xref, unsupported encryption, wrong password).
    #[error("Cannot read PDF '{path}': {detail}")]
    DocumentRead { path: PathBuf, detail: String },

    // ── Storage errors ────────────────────────────────────────────────────
    /// The image directory could not be created or an image could not be written.
    #[error("Failed to store image at '{path}': {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The image store was handed zero bytes for an image.
    #[error("Refusing to store empty image data for '{id}'")]
    EmptyImageData { id: String },

    /// A page could not be rendered for attachment.
    #[error("Failed to render page {page}: {detail}")]
    RenderFailed { page: usize, detail: String },

    /// A string did not have the `page_{page}_{sequence}` shape.
    #[error("Invalid image id '{id}': expected page_<page>_<sequence> with both numbers >= 1")]
    InvalidImageId { id: String },

    // ── Prompt inputs ─────────────────────────────────────────────────────
    /// Guide file does not exist.
    #[error("Guide file not found at '{path}'")]
    GuideNotFound { path: PathBuf },

    /// Guide file has an extension we cannot read.
    #[error("Unsupported guide format '{extension}' for '{path}'. Expected .md or .txt")]
    UnsupportedGuideFormat { path: PathBuf, extension: String },

    /// Guide file exists but contains only whitespace.
    #[error("Guide instructions in '{path}' are empty; cannot craft a prompt")]
    EmptyGuide { path: PathBuf },

    /// Reference JSON could not be read or parsed.
    #[error("Failed to load reference JSON '{path}': {detail}")]
    ReferenceJson { path: PathBuf, detail: String },

    /// `--example-title` did not match any section in the reference JSON.
    #[error("Could not find a reference section titled '{title}'")]
    ReferenceExampleNotFound { title: String },

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The LLM API kept failing after all retries.
    #[error("LLM API error after {retries} retries: {message}")]
    LlmApiError { retries: u32, message: String },

    /// A single LLM call exceeded the configured timeout.
    #[error("LLM call timed out after {secs}s")]
    ApiTimeout { secs: u64 },

    /// The model answered with nothing usable.
    #[error("LLM returned an empty response")]
    EmptyResponse,

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output JSON (or metadata) file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium, place the library in the working\n\
directory, or install it system-wide.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Pdf2VolumeError {
    /// Pipeline stage the error belongs to, for user-facing messages.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::FileNotFound { .. }
            | Self::PermissionDenied { .. }
            | Self::NotAPdf { .. }
            | Self::DocumentRead { .. }
            | Self::GuideNotFound { .. }
            | Self::UnsupportedGuideFormat { .. }
            | Self::EmptyGuide { .. }
            | Self::ReferenceJson { .. }
            | Self::ReferenceExampleNotFound { .. } => "read",
            Self::Storage { .. } | Self::EmptyImageData { .. } => "store",
            Self::InvalidImageId { .. }
            | Self::RenderFailed { .. }
            | Self::PdfiumBindingFailed(_) => "extract",
            Self::ProviderNotConfigured { .. }
            | Self::LlmApiError { .. }
            | Self::ApiTimeout { .. }
            | Self::EmptyResponse => "generate",
            Self::OutputWriteFailed { .. } => "write",
            Self::InvalidConfig(_) => "config",
            Self::Internal(_) => "internal",
        }
    }
}

/// A non-fatal error for a single embedded image.
///
/// The image is skipped and the scan continues with the next one.
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize, serde::Deserialize)]
pub enum ExtractionError {
    /// The image stream could not be decoded into pixels.
    #[error("Page {page}, image {sequence}: decode failed: {detail}")]
    DecodeFailed {
        page: usize,
        sequence: usize,
        detail: String,
    },

    /// Decoding succeeded but produced no bytes.
    #[error("Page {page}, image {sequence}: image data is empty")]
    EmptyImage { page: usize, sequence: usize },

    /// The image has no usable bounding box on the page.
    #[error("Page {page}, image {sequence}: invalid bounds: {detail}")]
    InvalidBounds {
        page: usize,
        sequence: usize,
        detail: String,
    },
}

impl ExtractionError {
    /// `(page, sequence)` of the image that was skipped.
    pub fn position(&self) -> (usize, usize) {
        match self {
            Self::DecodeFailed { page, sequence, .. }
            | Self::EmptyImage { page, sequence }
            | Self::InvalidBounds { page, sequence, .. } => (*page, *sequence),
        }
    }
}
