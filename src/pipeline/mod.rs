//! Pipeline stages for PDF-to-volume conversion.
//!
//! Each submodule implements exactly one step, so each is testable on its
//! own and the PDF backend can be swapped without touching the extractor.
//!
//! ## Data Flow
//!
//! ```text
//!                 ┌─▶ extract ──▶ store      (images + metadata.json)
//! input ──▶ pdfium┤      │
//! (path)          │      └──▶ payload ─┐
//!                 └─▶ page text ───────┼──▶ prompts ──▶ llm ──▶ postprocess
//!   guide / reference JSON ────────────┘                 ▲
//!                        render ──▶ encode ──────────────┘ (--attach-pages)
//! ```
//!
//! 1. [`input`]    — validate the PDF path, load guide and reference JSON
//! 2. [`pdfium`]   — bind the library and read page layouts ([`document`])
//! 3. [`extract`]  — turn embedded images into [`crate::ImageRecord`]s,
//!    matching captions and nearby text
//! 4. [`store`]    — persist image bytes under their id
//! 5. [`payload`]  — serialise records into `<image ... />` tag lines
//! 6. [`render`] / [`encode`] — optional page attachments; `spawn_blocking`
//!    because pdfium is not async-safe
//! 7. [`llm`]      — the generation call with retry/backoff; the only stage
//!    with network I/O
//! 8. [`postprocess`] — strip the packaging models put around the JSON

pub mod document;
pub mod encode;
pub mod extract;
pub mod input;
pub mod llm;
pub mod payload;
pub mod pdfium;
pub mod postprocess;
pub mod render;
pub mod store;
