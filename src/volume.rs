//! Serde model of the generated volume JSON.
//!
//! The generated text is written to disk as the model produced it; these
//! types are only used to read it back for statistics and to check that
//! every `image_page_P_S` reference points at an image that was extracted.
//! Field names follow the platform's schema (`PascalCase`, chunks tagged by
//! `__component`).

use crate::record::ImageId;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;

static RE_IMAGE_REF: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bimage_page_(\d+)_(\d+)\b").unwrap());

/// Top-level document for one adapted textbook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Volume {
    pub title: String,
    pub description: String,
    pub volume_summary: String,
    pub pages: Vec<Page>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Page {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<u32>,
    /// Always present in the document, `null` when the page has none.
    #[serde(deserialize_with = "required_nullable")]
    pub reference_summary: Option<String>,
    pub content: Vec<Chunk>,
}

/// One content segment of a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "__component")]
pub enum Chunk {
    /// Chunk the reader answers a question about.
    #[serde(rename = "page.chunk")]
    Interactive(InteractiveChunk),
    /// Supplementary chunk with no question.
    #[serde(rename = "page.plain-chunk")]
    Plain(PlainChunk),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InteractiveChunk {
    pub header: String,
    pub text: String,
    pub question: String,
    pub constructed_response: String,
    pub key_phrase: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PlainChunk {
    pub header: String,
    pub text: String,
}

/// A key that must be present but may be `null`.
///
/// With a custom deserializer serde no longer treats a missing `Option`
/// field as `None`, so the key itself becomes mandatory.
fn required_nullable<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer)
}

impl Chunk {
    pub fn header(&self) -> &str {
        match self {
            Chunk::Interactive(c) => &c.header,
            Chunk::Plain(c) => &c.header,
        }
    }

    pub fn text(&self) -> &str {
        match self {
            Chunk::Interactive(c) => &c.text,
            Chunk::Plain(c) => &c.text,
        }
    }
}

/// Counts reported after generation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeStats {
    pub pages: usize,
    pub chunks: usize,
    pub interactive_chunks: usize,
    pub plain_chunks: usize,
    /// Distinct image ids referenced anywhere in chunk headers or text.
    pub image_references: usize,
}

impl Volume {
    /// Parse generated JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Distinct image ids referenced as `image_page_P_S`, in id order.
    pub fn image_references(&self) -> BTreeSet<ImageId> {
        let mut refs = BTreeSet::new();
        for chunk in self.pages.iter().flat_map(|p| &p.content) {
            for field in [chunk.header(), chunk.text()] {
                for caps in RE_IMAGE_REF.captures_iter(field) {
                    let parsed = caps[1]
                        .parse()
                        .ok()
                        .zip(caps[2].parse().ok())
                        .and_then(|(page, seq)| ImageId::new(page, seq).ok());
                    if let Some(id) = parsed {
                        refs.insert(id);
                    }
                }
            }
        }
        refs
    }

    /// References to ids that are not in `extracted`.
    pub fn dangling_references<'a>(
        &self,
        extracted: impl IntoIterator<Item = &'a ImageId>,
    ) -> Vec<ImageId> {
        let known: BTreeSet<ImageId> = extracted.into_iter().copied().collect();
        self.image_references()
            .into_iter()
            .filter(|id| !known.contains(id))
            .collect()
    }

    pub fn stats(&self) -> VolumeStats {
        let chunks = self.pages.iter().flat_map(|p| &p.content);
        let interactive = chunks
            .clone()
            .filter(|c| matches!(c, Chunk::Interactive(_)))
            .count();
        let total = chunks.count();
        VolumeStats {
            pages: self.pages.len(),
            chunks: total,
            interactive_chunks: interactive,
            plain_chunks: total - interactive,
            image_references: self.image_references().len(),
        }
    }
}
