//! Image records: the unit of output of the metadata extractor.
//!
//! An [`ImageRecord`] is built exactly once, after its bytes are stored, and
//! is read-only afterwards. Its [`ImageId`] is the stable handle the rest of
//! the system uses: the image store names files after it, the payload
//! builder emits it, and the generated volume refers back to it through
//! [`ImageId::reference`].

use crate::error::{ExtractionError, Pdf2VolumeError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Identifier of one embedded image: `page_{page}_{sequence}`, both 1-based.
///
/// Unique within a document and deterministic across runs on the same input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImageId {
    page: usize,
    sequence: usize,
}

impl ImageId {
    /// Build an id. Both numbers must be at least 1.
    pub fn new(page: usize, sequence: usize) -> Result<Self, Pdf2VolumeError> {
        if page == 0 || sequence == 0 {
            return Err(Pdf2VolumeError::InvalidImageId {
                id: format!("page_{page}_{sequence}"),
            });
        }
        Ok(Self { page, sequence })
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn sequence(&self) -> usize {
        self.sequence
    }

    /// The token used inside generated `Text` bodies: `image_page_{page}_{sequence}`.
    pub fn reference(&self) -> String {
        format!("image_{self}")
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "page_{}_{}", self.page, self.sequence)
    }
}

impl FromStr for ImageId {
    type Err = Pdf2VolumeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Pdf2VolumeError::InvalidImageId { id: s.to_string() };
        let rest = s.strip_prefix("page_").ok_or_else(invalid)?;
        let (page, sequence) = rest.split_once('_').ok_or_else(invalid)?;
        let all_digits = |p: &str| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit());
        if !all_digits(page) || !all_digits(sequence) {
            return Err(invalid());
        }
        let page = page.parse().map_err(|_| invalid())?;
        let sequence = sequence.parse().map_err(|_| invalid())?;
        Self::new(page, sequence).map_err(|_| invalid())
    }
}

impl Serialize for ImageId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ImageId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Axis-aligned box in page space (points, top-left origin, y grows downward).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl BoundingBox {
    /// Build a box, rejecting non-finite coordinates and empty or inverted extents.
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Result<Self, String> {
        if ![x0, y0, x1, y1].iter().all(|v| v.is_finite()) {
            return Err(format!("non-finite coordinates ({x0}, {y0}, {x1}, {y1})"));
        }
        if x1 <= x0 || y1 <= y0 {
            return Err(format!("empty or inverted box ({x0}, {y0}, {x1}, {y1})"));
        }
        Ok(Self { x0, y0, x1, y1 })
    }

    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f64 {
        self.y1 - self.y0
    }

    /// Vertical gap between `self` and `other`; 0 when they overlap vertically.
    pub fn vertical_gap(&self, other: &BoundingBox) -> f64 {
        if other.y1 <= self.y0 {
            self.y0 - other.y1
        } else if other.y0 >= self.y1 {
            other.y0 - self.y1
        } else {
            0.0
        }
    }

    /// True when `other` lies entirely above `self`.
    pub fn has_above(&self, other: &BoundingBox) -> bool {
        other.y1 <= self.y0
    }
}

/// One embedded image found in the source document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub id: ImageId,
    /// 1-based page index.
    pub page_number: usize,
    pub bounding_box: BoundingBox,
    /// Where the image store wrote the raster data.
    pub file_path: PathBuf,
    /// Caption-like text run adjacent to the image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    /// Nearest body text, only when no caption was found.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nearby_text: Option<String>,
}

impl ImageRecord {
    /// The contextual text to show for this image, caption first.
    pub fn context_text(&self) -> Option<&str> {
        self.caption.as_deref().or(self.nearby_text.as_deref())
    }
}

/// Diagnostic for an image that was skipped during a scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedImage {
    pub page: usize,
    pub sequence: usize,
    pub reason: String,
}

impl From<&ExtractionError> for SkippedImage {
    fn from(err: &ExtractionError) -> Self {
        let (page, sequence) = err.position();
        Self {
            page,
            sequence,
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_id_display_and_parse_agree() {
        let id = ImageId::new(2, 1).unwrap();
        assert_eq!(id.to_string(), "page_2_1");
        assert_eq!("page_2_1".parse::<ImageId>().unwrap(), id);
        assert_eq!(id.reference(), "image_page_2_1");
    }

    #[test]
    fn image_id_rejects_malformed() {
        for bad in ["", "page_", "page_1", "page_0_1", "page_1_0", "page_a_1", "img_1_1", "page_1_2_3", "page_+1_2"] {
            assert!(bad.parse::<ImageId>().is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn image_ids_order_by_page_then_sequence() {
        let a = ImageId::new(1, 9).unwrap();
        let b = ImageId::new(2, 1).unwrap();
        assert!(a < b);
    }

    #[test]
    fn bounding_box_validation() {
        assert!(BoundingBox::new(0.0, 0.0, 10.0, 10.0).is_ok());
        assert!(BoundingBox::new(10.0, 0.0, 10.0, 10.0).is_err());
        assert!(BoundingBox::new(0.0, 5.0, 10.0, 1.0).is_err());
        assert!(BoundingBox::new(f64::NAN, 0.0, 10.0, 10.0).is_err());
        assert!(BoundingBox::new(0.0, 0.0, f64::INFINITY, 10.0).is_err());
    }

    #[test]
    fn vertical_gap_above_below_overlap() {
        let image = BoundingBox::new(0.0, 100.0, 100.0, 200.0).unwrap();
        let above = BoundingBox::new(0.0, 80.0, 100.0, 90.0).unwrap();
        let below = BoundingBox::new(0.0, 215.0, 100.0, 225.0).unwrap();
        let beside = BoundingBox::new(120.0, 150.0, 200.0, 160.0).unwrap();
        assert_eq!(image.vertical_gap(&above), 10.0);
        assert_eq!(image.vertical_gap(&below), 15.0);
        assert_eq!(image.vertical_gap(&beside), 0.0);
        assert!(image.has_above(&above));
        assert!(!image.has_above(&below));
        assert!(!image.has_above(&beside));
    }

    #[test]
    fn record_serialises_id_as_string() {
        let record = ImageRecord {
            id: ImageId::new(3, 2).unwrap(),
            page_number: 3,
            bounding_box: BoundingBox::new(1.0, 2.0, 3.0, 4.0).unwrap(),
            file_path: PathBuf::from("out/page_3_2.png"),
            caption: Some("Figure 1: Cell".into()),
            nearby_text: None,
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["id"], "page_3_2");
        assert!(json.get("nearby_text").is_none());
        let back: ImageRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }
}
