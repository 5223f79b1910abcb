//! Input resolution: validate the PDF path and load the prompt inputs.
//!
//! Everything read from disk for the prompt (guide, reference JSON) is read
//! here, once, before any extraction or network work starts. Prompt
//! assembly downstream is a pure function of what this module returns.
//!
//! The PDF magic bytes (`%PDF`) are checked up front so callers get a
//! meaningful error rather than an opaque pdfium failure.

use crate::error::Pdf2VolumeError;
use serde_json::Value;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Validate that `path` exists, is readable and starts with `%PDF`.
pub fn validate_pdf_path(path: &Path) -> Result<PathBuf, Pdf2VolumeError> {
    let path = path.to_path_buf();

    if !path.exists() {
        return Err(Pdf2VolumeError::FileNotFound { path });
    }

    match std::fs::File::open(&path) {
        Ok(mut f) => {
            let mut magic = [0u8; 4];
            match f.read_exact(&mut magic) {
                Ok(()) if &magic == b"%PDF" => {}
                Ok(()) => return Err(Pdf2VolumeError::NotAPdf { path, magic }),
                // Shorter than four bytes: whatever it is, it is not a PDF.
                Err(_) => return Err(Pdf2VolumeError::NotAPdf { path, magic }),
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(Pdf2VolumeError::PermissionDenied { path });
        }
        Err(_) => {
            return Err(Pdf2VolumeError::FileNotFound { path });
        }
    }

    debug!("Resolved local PDF: {}", path.display());
    Ok(path)
}

/// Read a guide file (`.md` or `.txt`), trimmed.
pub fn load_guide(path: &Path) -> Result<String, Pdf2VolumeError> {
    if !path.exists() {
        return Err(Pdf2VolumeError::GuideNotFound {
            path: path.to_path_buf(),
        });
    }

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    if extension != "md" && extension != "txt" {
        return Err(Pdf2VolumeError::UnsupportedGuideFormat {
            path: path.to_path_buf(),
            extension: if extension.is_empty() {
                "(none)".into()
            } else {
                format!(".{extension}")
            },
        });
    }

    let text = std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::PermissionDenied {
            Pdf2VolumeError::PermissionDenied {
                path: path.to_path_buf(),
            }
        } else {
            Pdf2VolumeError::GuideNotFound {
                path: path.to_path_buf(),
            }
        }
    })?;

    let text = text.trim();
    if text.is_empty() {
        return Err(Pdf2VolumeError::EmptyGuide {
            path: path.to_path_buf(),
        });
    }

    debug!("Loaded guide {} ({} chars)", path.display(), text.len());
    Ok(text.to_string())
}

/// Read and parse the reference JSON file.
pub fn load_reference_json(path: &Path) -> Result<Value, Pdf2VolumeError> {
    let raw = std::fs::read_to_string(path).map_err(|e| Pdf2VolumeError::ReferenceJson {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })?;
    serde_json::from_str(&raw).map_err(|e| Pdf2VolumeError::ReferenceJson {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })
}

/// Pick the example to show the model.
///
/// Without a title the whole reference document is the example. With a
/// title, the section of the top-level `data` array whose `Title` (or
/// `title`) matches, ignoring case and surrounding whitespace.
pub fn select_reference_example(
    reference: &Value,
    title: Option<&str>,
) -> Result<Value, Pdf2VolumeError> {
    let Some(title) = title.map(str::trim).filter(|t| !t.is_empty()) else {
        return Ok(reference.clone());
    };

    let wanted = title.to_lowercase();
    reference
        .get("data")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .find(|section| {
            section
                .get("Title")
                .or_else(|| section.get("title"))
                .and_then(Value::as_str)
                .is_some_and(|t| t.trim().to_lowercase() == wanted)
        })
        .cloned()
        .ok_or_else(|| Pdf2VolumeError::ReferenceExampleNotFound {
            title: title.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_pdf_is_file_not_found() {
        let err = validate_pdf_path(Path::new("/definitely/not/here.pdf")).unwrap_err();
        assert!(matches!(err, Pdf2VolumeError::FileNotFound { .. }));
    }

    #[test]
    fn non_pdf_is_rejected_with_magic() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("notes.pdf");
        std::fs::write(&path, "hello world").unwrap();
        match validate_pdf_path(&path).unwrap_err() {
            Pdf2VolumeError::NotAPdf { magic, .. } => assert_eq!(&magic, b"hell"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn tiny_file_is_not_a_pdf() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("tiny.pdf");
        std::fs::write(&path, "%P").unwrap();
        assert!(matches!(
            validate_pdf_path(&path).unwrap_err(),
            Pdf2VolumeError::NotAPdf { .. }
        ));
    }

    #[test]
    fn pdf_magic_accepted() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("ok.pdf");
        std::fs::write(&path, "%PDF-1.7\n").unwrap();
        assert_eq!(validate_pdf_path(&path).unwrap(), path);
    }

    #[test]
    fn guide_is_trimmed() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("guide.md");
        std::fs::write(&path, "\n  # Guide\nChunk by heading.\n\n").unwrap();
        assert_eq!(load_guide(&path).unwrap(), "# Guide\nChunk by heading.");
    }

    #[test]
    fn guide_errors() {
        let tmp = tempfile::tempdir().unwrap();

        let missing = tmp.path().join("missing.md");
        assert!(matches!(load_guide(&missing), Err(Pdf2VolumeError::GuideNotFound { .. })));

        let docx = tmp.path().join("guide.docx");
        std::fs::write(&docx, "PK").unwrap();
        match load_guide(&docx).unwrap_err() {
            Pdf2VolumeError::UnsupportedGuideFormat { extension, .. } => assert_eq!(extension, ".docx"),
            other => panic!("unexpected {other:?}"),
        }

        let blank = tmp.path().join("blank.txt");
        std::fs::write(&blank, "  \n\t").unwrap();
        assert!(matches!(load_guide(&blank), Err(Pdf2VolumeError::EmptyGuide { .. })));
    }

    #[test]
    fn reference_json_parse_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("ref.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = load_reference_json(&path).unwrap_err();
        assert!(matches!(err, Pdf2VolumeError::ReferenceJson { .. }));
        assert_eq!(err.stage(), "read");
    }

    #[test]
    fn select_example_by_title() {
        let reference = json!({
            "data": [
                {"Title": "Introduction", "Content": []},
                {"title": "  Photosynthesis ", "Content": [1]},
                "not an object"
            ]
        });

        assert_eq!(select_reference_example(&reference, None).unwrap(), reference);
        assert_eq!(select_reference_example(&reference, Some("  ")).unwrap(), reference);

        let section = select_reference_example(&reference, Some("PHOTOSYNTHESIS")).unwrap();
        assert_eq!(section["Content"], json!([1]));

        assert!(matches!(
            select_reference_example(&reference, Some("Respiration")),
            Err(Pdf2VolumeError::ReferenceExampleNotFound { .. })
        ));
    }
}
