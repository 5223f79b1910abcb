//! Progress-callback trait for scan events.
//!
//! Inject an [`Arc<dyn ExtractionProgressCallback>`] via
//! [`crate::config::ExtractionConfigBuilder::progress_callback`] to receive
//! events while the extractor walks the document. The CLI uses it to drive
//! a spinner; library callers can forward events anywhere they like.
//!
//! # Example
//!
//! ```rust
//! use pdf2volume::{ExtractionProgressCallback, ExtractionConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct SkipCounter {
//!     skipped: AtomicUsize,
//! }
//!
//! impl ExtractionProgressCallback for SkipCounter {
//!     fn on_image_skipped(&self, page: usize, sequence: usize, reason: &str) {
//!         self.skipped.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("skipped page {page} image {sequence}: {reason}");
//!     }
//! }
//!
//! let counter = Arc::new(SkipCounter { skipped: AtomicUsize::new(0) });
//! let config = ExtractionConfig::builder()
//!     .progress_callback(counter as Arc<dyn ExtractionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the extractor as it scans the document.
///
/// Extraction runs on a blocking thread, so implementations must be
/// `Send + Sync`. All methods default to no-ops.
pub trait ExtractionProgressCallback: Send + Sync {
    /// Called once after the document is opened.
    fn on_scan_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called after a page's layout has been loaded.
    ///
    /// # Arguments
    /// * `page`         — 1-indexed page number
    /// * `total_pages`  — total pages in the document
    /// * `image_count`  — embedded images found on the page
    fn on_page_scanned(&self, page: usize, total_pages: usize, image_count: usize) {
        let _ = (page, total_pages, image_count);
    }

    /// Called after an image was stored and its record built.
    fn on_image_extracted(&self, id: &str) {
        let _ = id;
    }

    /// Called when an image is skipped because it could not be decoded or positioned.
    fn on_image_skipped(&self, page: usize, sequence: usize, reason: &str) {
        let _ = (page, sequence, reason);
    }

    /// Called once when the last page has been scanned.
    fn on_scan_complete(&self, extracted: usize, skipped: usize) {
        let _ = (extracted, skipped);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ExtractionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ExtractionConfig`].
pub type ProgressCallback = Arc<dyn ExtractionProgressCallback>;
