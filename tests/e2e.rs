//! End-to-end integration tests for pdf2volume.
//!
//! The input-validation tests at the top always run. The rest use real PDF
//! files in `./test_cases/`, need the pdfium library, and (for generation)
//! make live LLM API calls. They are gated behind the `E2E_ENABLED`
//! environment variable so they do not run in CI unless explicitly requested.
//!
//! Run with:
//!   E2E_ENABLED=1 DYLD_LIBRARY_PATH=. cargo test --test e2e -- --nocapture
//!
//! To restrict to a specific test:
//!   E2E_ENABLED=1 DYLD_LIBRARY_PATH=. cargo test --test e2e test_extract -- --nocapture

use pdf2volume::{
    extract_images, generate, generate_to_file, ExtractionConfig, GenerationConfig, Mode,
    Pdf2VolumeError, PromptInputs, Volume,
};
use std::path::PathBuf;

// ── Test helpers ─────────────────────────────────────────────────────────────

fn test_cases_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases")
}

fn output_dir() -> PathBuf {
    let d = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases/output");
    std::fs::create_dir_all(&d).ok();
    d
}

/// Route `tracing` output through the test harness; `RUST_LOG=debug` for detail.
fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Skip this test if E2E_ENABLED is not set *or* no PDF file at `path`.
macro_rules! e2e_skip_unless_ready {
    ($path:expr) => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP — set E2E_ENABLED=1 to run e2e tests");
            return;
        }
        let p: PathBuf = $path;
        if !p.exists() {
            println!("SKIP — test file not found: {}", p.display());
            return;
        }
        init_logging();
        p
    }};
}

fn extraction_config(name: &str) -> ExtractionConfig {
    ExtractionConfig::builder()
        .output_dir(output_dir().join(name))
        .build()
        .unwrap()
}

/// Assert the generated JSON is a clean volume document.
fn assert_volume_quality(json: &str, context: &str) {
    assert!(!json.trim().is_empty(), "[{context}] Output is empty");
    assert!(json.ends_with('\n'), "[{context}] Output must end with a newline");

    let first_line = json.lines().next().unwrap_or("");
    assert!(
        !first_line.starts_with("```"),
        "[{context}] Output must not start with a code fence, got: {first_line:?}"
    );

    let invisible = ['\u{200B}', '\u{FEFF}', '\u{200C}', '\u{200D}', '\u{2060}'];
    for ch in invisible {
        assert!(
            !json.contains(ch),
            "[{context}] Output contains invisible char U+{:04X}",
            ch as u32
        );
    }

    let volume = Volume::from_json(json)
        .unwrap_or_else(|e| panic!("[{context}] Output is not a volume: {e}"));
    assert!(!volume.pages.is_empty(), "[{context}] Volume has no pages");
}

// ── Input validation (always run) ────────────────────────────────────────────

#[tokio::test]
async fn test_extract_missing_pdf() {
    let tmp = tempfile::tempdir().unwrap();
    let config = ExtractionConfig::builder()
        .output_dir(tmp.path().join("images"))
        .build()
        .unwrap();

    let err = extract_images(tmp.path().join("nope.pdf"), &config)
        .await
        .unwrap_err();
    assert!(matches!(err, Pdf2VolumeError::FileNotFound { .. }), "got {err:?}");
    assert_eq!(err.stage(), "read");
    assert!(!tmp.path().join("images").exists());
}

#[tokio::test]
async fn test_extract_rejects_non_pdf() {
    let tmp = tempfile::tempdir().unwrap();
    let fake = tmp.path().join("chapter.pdf");
    std::fs::write(&fake, "<html>not a pdf</html>").unwrap();
    let config = ExtractionConfig::builder()
        .output_dir(tmp.path().join("images"))
        .build()
        .unwrap();

    let err = extract_images(&fake, &config).await.unwrap_err();
    match err {
        Pdf2VolumeError::NotAPdf { magic, .. } => assert_eq!(&magic, b"<htm"),
        other => panic!("expected NotAPdf, got {other:?}"),
    }
}

#[tokio::test]
async fn test_generate_rejects_non_pdf_before_any_call() {
    let tmp = tempfile::tempdir().unwrap();
    let fake = tmp.path().join("notes.pdf");
    std::fs::write(&fake, "plain text").unwrap();
    let output = tmp.path().join("volume.json");

    let err = generate_to_file(
        &fake,
        &output,
        &ExtractionConfig::default(),
        &GenerationConfig::default(),
        &PromptInputs::default(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, Pdf2VolumeError::NotAPdf { .. }), "got {err:?}");
    assert!(!output.exists());
}

#[tokio::test]
async fn test_generate_missing_guide() {
    let tmp = tempfile::tempdir().unwrap();
    let pdf = tmp.path().join("tiny.pdf");
    std::fs::write(&pdf, "%PDF-1.7\n%%EOF\n").unwrap();
    let inputs = PromptInputs {
        guide_path: Some(tmp.path().join("missing-guide.md")),
        ..Default::default()
    };

    let err = generate(
        &pdf,
        &ExtractionConfig::default(),
        &GenerationConfig::default(),
        &inputs,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, Pdf2VolumeError::GuideNotFound { .. }), "got {err:?}");
}

// ── Extraction (pdfium) ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_extract_images_textbook() {
    let pdf = e2e_skip_unless_ready!(test_cases_dir().join("textbook_chapter.pdf"));
    let config = extraction_config("textbook_chapter");

    let summary = extract_images(&pdf, &config).await.unwrap();
    println!(
        "pages={} images={} skipped={}",
        summary.page_count,
        summary.records.len(),
        summary.skipped.len()
    );

    assert!(summary.page_count > 0);
    assert_eq!(summary.page_texts.len(), summary.page_count);
    for record in &summary.records {
        assert!(record.file_path.exists(), "{} missing on disk", record.id);
        assert!(record.page_number >= 1 && record.page_number <= summary.page_count);
        assert!(record.bounding_box.width() > 0.0);
        assert!(!(record.caption.is_some() && record.nearby_text.is_some()));
    }
    assert!(config.output_dir.join("metadata.json").exists());

    let ids: Vec<_> = summary.records.iter().map(|r| r.id).collect();
    let mut sorted = ids.clone();
    sorted.sort();
    assert_eq!(ids, sorted, "records must be ordered by page then sequence");
}

#[tokio::test]
async fn test_extract_images_is_repeatable() {
    let pdf = e2e_skip_unless_ready!(test_cases_dir().join("textbook_chapter.pdf"));

    let first = extract_images(&pdf, &extraction_config("repeat_a")).await.unwrap();
    let second = extract_images(&pdf, &extraction_config("repeat_b")).await.unwrap();

    assert_eq!(first.records.len(), second.records.len());
    for (a, b) in first.records.iter().zip(&second.records) {
        assert_eq!(a.id, b.id);
        assert_eq!(a.bounding_box, b.bounding_box);
        assert_eq!(a.caption, b.caption);
        assert_eq!(a.nearby_text, b.nearby_text);
    }
}

// ── Generation (live LLM) ────────────────────────────────────────────────────

#[tokio::test]
async fn test_generate_faithful_volume() {
    let pdf = e2e_skip_unless_ready!(test_cases_dir().join("textbook_chapter.pdf"));
    let output_path = output_dir().join("textbook_chapter.volume.json");
    let generation = GenerationConfig::builder().mode(Mode::Faithful).build().unwrap();

    let output = generate_to_file(
        &pdf,
        &output_path,
        &extraction_config("generate_faithful"),
        &generation,
        &PromptInputs::default(),
    )
    .await
    .unwrap();

    println!(
        "in={} out={} retries={} dangling={:?}",
        output.stats.input_tokens,
        output.stats.output_tokens,
        output.stats.retries,
        output.stats.dangling_image_references
    );
    assert_volume_quality(&output.json, "faithful");
    assert_eq!(std::fs::read_to_string(&output_path).unwrap(), output.json);
}

#[tokio::test]
async fn test_generate_text_only() {
    let pdf = e2e_skip_unless_ready!(test_cases_dir().join("textbook_chapter.pdf"));
    let generation = GenerationConfig::builder().mode(Mode::Condensed).build().unwrap();
    let inputs = PromptInputs {
        skip_image_extraction: true,
        ..Default::default()
    };

    let output = generate(&pdf, &extraction_config("generate_text_only"), &generation, &inputs)
        .await
        .unwrap();

    assert_eq!(output.stats.extracted_images, 0);
    assert!(output.extraction.records.is_empty());
    assert_volume_quality(&output.json, "text-only");
}
