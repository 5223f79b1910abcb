//! # pdf2volume
//!
//! Turn a PDF textbook into a structured volume JSON for an
//! interactive-learning platform, with an LLM doing the content adaptation.
//!
//! ## What the crate does itself
//!
//! The adaptation (chunking, writing questions) is the model's job. The
//! crate's own work is getting the PDF into a prompt faithfully:
//!
//! - every embedded raster image is extracted to disk under a stable id
//!   (`page_2_1`), with its bounding box and its caption or nearest text;
//! - those records become a compact `<image ... />` tag block the model can
//!   cite as `image_page_2_1`;
//! - the prompt is assembled from a mode template, an optional guide, a
//!   reference example, the tag block and the page text.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input    validate the path, load guide + reference JSON
//!  ├─ 2. Extract  images → files + ImageRecords (pdfium, spawn_blocking)
//!  ├─ 3. Payload  records → <image id=".." page=".." x0=".." ... />
//!  ├─ 4. Prompt   mode + guide + example + payload + page text
//!  ├─ 5. LLM      one call with retry/backoff (gpt-4.1 / claude / gemini / …)
//!  └─ 6. Output   fence-stripped JSON + stats
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf2volume::{generate, ExtractionConfig, GenerationConfig, Mode, PromptInputs};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY
//!     let extraction = ExtractionConfig::builder()
//!         .output_dir("results/extracted-images")
//!         .build()?;
//!     let generation = GenerationConfig::builder().mode(Mode::Faithful).build()?;
//!
//!     let output = generate("chapter3.pdf", &extraction, &generation, &PromptInputs::default()).await?;
//!     println!("{}", output.json);
//!     eprintln!("{} images, {} tokens out",
//!         output.stats.extracted_images,
//!         output.stats.output_tokens);
//!     Ok(())
//! }
//! ```
//!
//! Image extraction alone needs no provider:
//!
//! ```rust,no_run
//! use pdf2volume::{extract_images, build_payload, ExtractionConfig};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let summary = extract_images("chapter3.pdf", &ExtractionConfig::default()).await?;
//! println!("{}", build_payload(&summary));
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2volume` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! ## pdfium
//!
//! Extraction binds the pdfium shared library at runtime: `PDFIUM_LIB_PATH`,
//! then the working directory, then the system library path.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod record;
pub mod volume;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    ExtractionConfig, ExtractionConfigBuilder, GenerationConfig, GenerationConfigBuilder, Mode,
    DEFAULT_CAPTION_DISTANCE, DEFAULT_NEARBY_DISTANCE,
};
pub use convert::{
    build_payload, extract_images, extract_images_sync, generate, generate_to_file, write_atomic,
    PromptInputs,
};
pub use error::{ExtractionError, Pdf2VolumeError};
pub use output::{ExtractionSummary, GenerationOutput, GenerationStats};
pub use pipeline::document::{PageLayout, PageSource};
pub use pipeline::extract::{ImageRecords, MetadataExtractor};
pub use pipeline::store::ImageStore;
pub use progress::{ExtractionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use record::{BoundingBox, ImageId, ImageRecord, SkippedImage};
pub use volume::{Chunk, Page, Volume, VolumeStats};
