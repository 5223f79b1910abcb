//! Public entry points: extract images, and generate a volume.
//!
//! Extraction needs no provider or API key, so [`extract_images`] works on
//! its own (the CLI's `--payload-only`). [`generate`] runs the whole
//! pipeline: inputs are validated and the provider resolved first, so a
//! misconfiguration fails before any page is touched.

use crate::config::{ExtractionConfig, GenerationConfig};
use crate::error::Pdf2VolumeError;
use crate::output::{ExtractionSummary, GenerationOutput, GenerationStats, ImageMetadataFile};
use crate::pipeline::document::PageSource;
use crate::pipeline::extract::MetadataExtractor;
use crate::pipeline::pdfium::{bind_pdfium, PdfiumSource};
use crate::pipeline::store::ImageStore;
use crate::pipeline::{encode, input, llm, payload, postprocess, render};
use crate::prompts::{build_prompt, PromptParams};
use crate::volume::Volume;
use edgequake_llm::{LLMProvider, ProviderFactory};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Model used when a provider is named without a model.
pub const DEFAULT_MODEL: &str = "gpt-4.1-mini";

/// Name of the record file written next to the extracted images.
pub const METADATA_FILE_NAME: &str = "metadata.json";

/// Files that feed the prompt besides the PDF itself.
#[derive(Debug, Clone, Default)]
pub struct PromptInputs {
    /// Authoring guide (`.md` or `.txt`).
    pub guide_path: Option<PathBuf>,
    /// Reference volume JSON shown to the model as the target shape.
    pub reference_json: Option<PathBuf>,
    /// Section of the reference JSON to use, matched by `Title`.
    pub example_title: Option<String>,
    /// Send page text only; no images are extracted or referenced.
    pub skip_image_extraction: bool,
}

/// Extract every embedded image of a PDF into `config.output_dir`.
///
/// Also writes `metadata.json` with the records next to the images.
///
/// # Errors
/// Fatal errors only: unreadable input, pdfium binding failure, storage
/// failure. Images that cannot be decoded are reported in
/// [`ExtractionSummary::skipped`].
pub async fn extract_images(
    pdf_path: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<ExtractionSummary, Pdf2VolumeError> {
    let path = input::validate_pdf_path(pdf_path.as_ref())?;
    let config = config.clone();

    tokio::task::spawn_blocking(move || extract_images_blocking(&path, &config))
        .await
        .map_err(|e| Pdf2VolumeError::Internal(format!("Extraction task panicked: {}", e)))?
}

/// Synchronous wrapper around [`extract_images`].
///
/// Creates a temporary tokio runtime internally.
pub fn extract_images_sync(
    pdf_path: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<ExtractionSummary, Pdf2VolumeError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Pdf2VolumeError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(extract_images(pdf_path, config))
}

fn extract_images_blocking(
    pdf_path: &Path,
    config: &ExtractionConfig,
) -> Result<ExtractionSummary, Pdf2VolumeError> {
    let pdfium = bind_pdfium()?;
    let summary = MetadataExtractor::new(config.clone())
        .extract(&pdfium, pdf_path)?
        .finish()?;

    let store = ImageStore::new(&config.output_dir);
    let metadata_path = store.save_json(
        METADATA_FILE_NAME,
        &ImageMetadataFile {
            source: pdf_path.display().to_string(),
            page_count: summary.page_count,
            images: &summary.records,
            skipped: &summary.skipped,
        },
    )?;
    debug!("Wrote {}", metadata_path.display());

    Ok(summary)
}

/// Read page text only, for runs that skip image extraction.
async fn extract_text(
    pdf_path: &Path,
    password: Option<&str>,
) -> Result<ExtractionSummary, Pdf2VolumeError> {
    let path = pdf_path.to_path_buf();
    let password = password.map(str::to_string);

    tokio::task::spawn_blocking(move || {
        let pdfium = bind_pdfium()?;
        let source = PdfiumSource::open(&pdfium, &path, password.as_deref())?;
        let page_count = source.page_count();
        let page_texts = (0..page_count)
            .map(|i| source.page_text(i))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ExtractionSummary {
            page_texts,
            page_count,
            ..Default::default()
        })
    })
    .await
    .map_err(|e| Pdf2VolumeError::Internal(format!("Text task panicked: {}", e)))?
}

/// Render the prompt payload for a set of records.
pub fn build_payload(summary: &ExtractionSummary) -> String {
    payload::build(&summary.records)
}

/// Run the whole pipeline and return the generated volume JSON.
///
/// The answer is returned as produced by the model, minus markdown fences.
/// It is also parsed as a [`Volume`] for statistics; a parse failure is
/// logged, not fatal.
pub async fn generate(
    pdf_path: impl AsRef<Path>,
    extraction: &ExtractionConfig,
    generation: &GenerationConfig,
    inputs: &PromptInputs,
) -> Result<GenerationOutput, Pdf2VolumeError> {
    let total_start = Instant::now();
    let pdf_path = input::validate_pdf_path(pdf_path.as_ref())?;
    info!("Starting generation: {} (mode {})", pdf_path.display(), generation.mode);

    // ── Step 1: Load prompt inputs ───────────────────────────────────────
    let guide = inputs
        .guide_path
        .as_deref()
        .map(input::load_guide)
        .transpose()?;
    let example = load_example(inputs)?;

    // ── Step 2: Get/create provider ──────────────────────────────────────
    let provider = resolve_provider(generation).await?;

    // ── Step 3: Extract images and page text ─────────────────────────────
    let extract_start = Instant::now();
    let extraction_summary = if inputs.skip_image_extraction {
        info!("Skipping image extraction");
        extract_text(&pdf_path, extraction.password.as_deref()).await?
    } else {
        extract_images(&pdf_path, extraction).await?
    };
    let extract_duration_ms = extract_start.elapsed().as_millis() as u64;
    info!(
        "Extracted {} images ({} skipped) from {} pages in {}ms",
        extraction_summary.records.len(),
        extraction_summary.skipped.len(),
        extraction_summary.page_count,
        extract_duration_ms
    );

    // ── Step 4: Assemble prompt ──────────────────────────────────────────
    let image_payload = build_payload(&extraction_summary);
    let prompt = build_prompt(&PromptParams {
        mode: generation.mode,
        guide: guide.as_deref(),
        example: example.as_ref(),
        image_payload: Some(image_payload.as_str()),
        page_texts: &extraction_summary.page_texts,
    });
    debug!("Prompt assembled: {} chars", prompt.len());

    // ── Step 5: Optional page attachments ────────────────────────────────
    let attachments = if generation.attach_pages {
        let rendered =
            render::render_pages(&pdf_path, extraction.password.as_deref(), generation).await?;
        rendered
            .iter()
            .filter_map(|(idx, img)| match encode::encode_page(img) {
                Ok(data) => Some(data),
                Err(e) => {
                    warn!("Failed to encode page {}: {}", idx + 1, e);
                    None
                }
            })
            .collect()
    } else {
        Vec::new()
    };

    // ── Step 6: Call the model ───────────────────────────────────────────
    let response = llm::generate_volume(&provider, &prompt, attachments, generation).await?;

    // ── Step 7: Check the answer ─────────────────────────────────────────
    let CheckedResponse {
        json,
        volume,
        dangling,
    } = check_response(&response.content, &extraction_summary)?;
    let stats = GenerationStats {
        total_pages: extraction_summary.page_count,
        extracted_images: extraction_summary.records.len(),
        skipped_images: extraction_summary.skipped.len(),
        input_tokens: response.input_tokens,
        output_tokens: response.output_tokens,
        retries: response.retries,
        extract_duration_ms,
        llm_duration_ms: response.duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
        volume: volume.as_ref().map(Volume::stats),
        dangling_image_references: dangling,
    };

    info!(
        "Generation complete: {} chars of JSON, {}ms total",
        json.len(),
        stats.total_duration_ms
    );

    Ok(GenerationOutput {
        json,
        volume,
        extraction: extraction_summary,
        stats,
    })
}

/// Cleaned model answer plus what could be read back from it.
struct CheckedResponse {
    json: String,
    volume: Option<Volume>,
    /// `image_page_P_S` references with no matching extracted image.
    dangling: Vec<String>,
}

/// Strip packaging from the raw answer, parse it as a [`Volume`] and list
/// references to images that were never extracted.
///
/// A schema mismatch is logged and yields `volume: None`.
fn check_response(
    raw: &str,
    summary: &ExtractionSummary,
) -> Result<CheckedResponse, Pdf2VolumeError> {
    let json = postprocess::clean_response(raw);
    if json.is_empty() {
        return Err(Pdf2VolumeError::EmptyResponse);
    }

    let volume = match Volume::from_json(&json) {
        Ok(v) => Some(v),
        Err(e) => {
            warn!("Response does not match the volume schema: {}", e);
            None
        }
    };

    let dangling: Vec<String> = volume
        .as_ref()
        .map(|v| {
            v.dangling_references(summary.records.iter().map(|r| &r.id))
                .iter()
                .map(|id| id.reference())
                .collect()
        })
        .unwrap_or_default();
    for reference in &dangling {
        warn!("Volume references {} but no such image was extracted", reference);
    }

    Ok(CheckedResponse {
        json,
        volume,
        dangling,
    })
}

/// Run [`generate`] and write the JSON to `output_path`.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn generate_to_file(
    pdf_path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    extraction: &ExtractionConfig,
    generation: &GenerationConfig,
    inputs: &PromptInputs,
) -> Result<GenerationOutput, Pdf2VolumeError> {
    let output = generate(pdf_path, extraction, generation, inputs).await?;
    write_atomic(output_path.as_ref(), &output.json).await?;
    Ok(output)
}

/// Write `contents` to `path` through a sibling `<name>.tmp` file and a rename.
///
/// An interrupted write leaves the previous file (or nothing) at `path`.
pub async fn write_atomic(path: &Path, contents: &str) -> Result<(), Pdf2VolumeError> {
    let write_err = |source| Pdf2VolumeError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);
    tokio::fs::write(&tmp_path, contents)
        .await
        .map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;

    info!("Wrote {}", path.display());
    Ok(())
}

fn load_example(inputs: &PromptInputs) -> Result<Option<Value>, Pdf2VolumeError> {
    match &inputs.reference_json {
        Some(path) => {
            let reference = input::load_reference_json(path)?;
            input::select_reference_example(&reference, inputs.example_title.as_deref()).map(Some)
        }
        None => {
            if let Some(title) = &inputs.example_title {
                warn!("Ignoring example title '{}' without a reference JSON", title);
            }
            Ok(None)
        }
    }
}

// ── Internal helpers ─────────────────────────────────────────────────────

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, Pdf2VolumeError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        Pdf2VolumeError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`), used as-is.
/// 2. **Named provider + model** (`config.provider_name`); the factory reads
///    the matching API key (`OPENAI_API_KEY`, etc.) from the environment.
/// 3. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`),
///    checked before auto-detection so the model choice is honoured even
///    when several API keys are present.
/// 4. **OpenAI** when `OPENAI_API_KEY` is set.
/// 5. **Full auto-detection** (`ProviderFactory::from_env`).
async fn resolve_provider(
    config: &GenerationConfig,
) -> Result<Arc<dyn LLMProvider>, Pdf2VolumeError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        return create_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            let model = config.model.clone().unwrap_or(model);
            return create_provider(&prov, &model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
            return create_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| Pdf2VolumeError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, GEMINI_API_KEY, or pass --provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}
