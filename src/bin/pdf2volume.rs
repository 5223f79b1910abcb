//! CLI binary for pdf2volume.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ExtractionConfig` / `GenerationConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use pdf2volume::{
    build_payload, extract_images, generate, generate_to_file, write_atomic, ExtractionConfig,
    ExtractionProgressCallback, GenerationConfig, GenerationOutput, Mode, Pdf2VolumeError,
    ProgressCallback, PromptInputs,
};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress for the extraction scan: one bar over pages, one log
/// line per skipped image.
struct CliScanProgress {
    bar: ProgressBar,
    images: AtomicUsize,
}

impl CliScanProgress {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(TICKS),
        );
        bar.set_prefix("Preparing");
        bar.set_message("Opening PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            images: AtomicUsize::new(0),
        })
    }
}

impl ExtractionProgressCallback for CliScanProgress {
    fn on_scan_start(&self, total_pages: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total_pages as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Extracting");
        self.bar.set_message("");
    }

    fn on_page_scanned(&self, _page: usize, _total_pages: usize, _image_count: usize) {
        self.bar.inc(1);
    }

    fn on_image_extracted(&self, _id: &str) {
        let n = self.images.fetch_add(1, Ordering::SeqCst) + 1;
        self.bar.set_message(format!("{n} images"));
    }

    fn on_image_skipped(&self, page: usize, sequence: usize, reason: &str) {
        self.bar.println(format!(
            "  {} page {} image {} skipped  {}",
            yellow("⚠"),
            page,
            sequence,
            dim(reason)
        ));
    }

    fn on_scan_complete(&self, extracted: usize, skipped: usize) {
        self.bar.finish_and_clear();
        if skipped == 0 {
            eprintln!("{} {} images extracted", green("✔"), bold(&extracted.to_string()));
        } else {
            eprintln!(
                "{} {} images extracted  ({} skipped)",
                yellow("⚠"),
                bold(&extracted.to_string()),
                skipped
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Faithful volume to stdout
  pdf2volume chapter3.pdf

  # Condensed volume with a guide and a reference example, to a file
  pdf2volume --mode condensed --guide guides/condensed.md \
             --reference-json reference.json --example-title "Introduction" \
             chapter3.pdf -o volume.json

  # Only extract images and print the <image> tag payload (no API key needed)
  pdf2volume --payload-only --image-dir out/images chapter3.pdf

  # Attach rendered pages for vision models
  pdf2volume --attach-pages --dpi 120 --model gpt-4.1 chapter3.pdf -o volume.json

MODES:
  faithful           Keep the author's wording; chunk and add questions
  simplified         Lower reading level, same coverage
  condensed          Key ideas only
  hybrid             Faithful core text, simplified asides
  interaction-heavy  Small chunks, a question on nearly every chunk
  adaptive           The model chooses per section

WHAT IS SENT TO THE MODEL:
  The PDF file itself is never uploaded. The request carries the extracted
  page text and the <image> tag list (ids, positions, captions); with
  --attach-pages it also carries rendered page images.

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Path to libpdfium (otherwise ./ then the system path)
  PDF2VOLUME_*            Every option, e.g. PDF2VOLUME_MODE=condensed
"#;

/// Convert PDF textbooks into interactive-learning volume JSON.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2volume",
    version,
    about = "Convert PDF textbooks into interactive-learning volume JSON using LLMs",
    long_about = "Extract the images of a PDF textbook with their positions and captions, \
then ask an LLM to adapt the text into a volume JSON that references those images. The PDF \
itself is never uploaded: the model gets page text, the image tag list and, with --attach-pages, \
rendered pages. Supports OpenAI, Anthropic, Google Gemini, Azure OpenAI, and any OpenAI-compatible endpoint.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Input PDF file.
    pdf: PathBuf,

    /// Prompt variant.
    #[arg(long, env = "PDF2VOLUME_MODE", value_enum, default_value = "faithful")]
    mode: ModeArg,

    /// Write the volume JSON (or payload) to this file instead of stdout.
    #[arg(short, long, env = "PDF2VOLUME_OUTPUT")]
    output: Option<PathBuf>,

    /// Directory for extracted images and metadata.json.
    #[arg(long, env = "PDF2VOLUME_IMAGE_DIR", default_value = "results/extracted-images")]
    image_dir: PathBuf,

    /// Do not extract images; send page text only.
    #[arg(long, env = "PDF2VOLUME_SKIP_IMAGE_EXTRACTION")]
    skip_image_extraction: bool,

    /// Authoring guide (.md or .txt).
    #[arg(long, env = "PDF2VOLUME_GUIDE")]
    guide: Option<PathBuf>,

    /// Reference volume JSON shown to the model as the target shape.
    #[arg(long, env = "PDF2VOLUME_REFERENCE_JSON")]
    reference_json: Option<PathBuf>,

    /// Title of the reference section to use as the example.
    #[arg(long, env = "PDF2VOLUME_EXAMPLE_TITLE", requires = "reference_json")]
    example_title: Option<String>,

    /// LLM model ID (e.g. gpt-4.1-mini, gpt-4.1, claude-sonnet-4-20250514).
    #[arg(long, env = "PDF2VOLUME_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(
        long,
        env = "PDF2VOLUME_PROVIDER",
        long_help = "LLM provider. Auto-detected from API key env vars if not set.\n\
          Supported: openai, anthropic, gemini, azure, ollama, or any OpenAI-compatible URL."
    )]
    provider: Option<String>,

    /// Max completion tokens for the volume.
    #[arg(long, env = "PDF2VOLUME_MAX_TOKENS", default_value_t = 16_000)]
    max_tokens: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "PDF2VOLUME_TEMPERATURE", default_value_t = 0.2)]
    temperature: f32,

    /// Retries on LLM failure (0–10).
    #[arg(long, env = "PDF2VOLUME_MAX_RETRIES", default_value_t = 2,
          value_parser = clap::value_parser!(u32).range(0..=10))]
    max_retries: u32,

    /// LLM call timeout in seconds.
    #[arg(long, env = "PDF2VOLUME_API_TIMEOUT", default_value_t = 300)]
    api_timeout: u64,

    /// Attach rendered page images to the request.
    #[arg(long, env = "PDF2VOLUME_ATTACH_PAGES")]
    attach_pages: bool,

    /// Rendering DPI for attached pages (72–400).
    #[arg(long, env = "PDF2VOLUME_DPI", default_value_t = 150,
          value_parser = clap::value_parser!(u32).range(72..=400))]
    dpi: u32,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PDF2VOLUME_PASSWORD")]
    password: Option<String>,

    /// Max vertical gap (points) between an image and its caption.
    #[arg(long, env = "PDF2VOLUME_CAPTION_DISTANCE", default_value_t = pdf2volume::DEFAULT_CAPTION_DISTANCE)]
    caption_distance: f64,

    /// Max vertical gap (points) for the nearby-text fallback.
    #[arg(long, env = "PDF2VOLUME_NEARBY_DISTANCE", default_value_t = pdf2volume::DEFAULT_NEARBY_DISTANCE)]
    nearby_distance: f64,

    /// Extract images and print the <image> payload; no LLM call.
    #[arg(long, env = "PDF2VOLUME_PAYLOAD_ONLY")]
    payload_only: bool,

    /// Print run statistics as JSON to stderr.
    #[arg(long, env = "PDF2VOLUME_STATS")]
    stats: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF2VOLUME_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDF2VOLUME_QUIET", conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum ModeArg {
    Faithful,
    Simplified,
    Condensed,
    Hybrid,
    InteractionHeavy,
    Adaptive,
}

impl From<ModeArg> for Mode {
    fn from(v: ModeArg) -> Self {
        match v {
            ModeArg::Faithful => Mode::Faithful,
            ModeArg::Simplified => Mode::Simplified,
            ModeArg::Condensed => Mode::Condensed,
            ModeArg::Hybrid => Mode::Hybrid,
            ModeArg::InteractionHeavy => Mode::InteractionHeavy,
            ModeArg::Adaptive => Mode::Adaptive,
        }
    }
}

/// Attach the failing pipeline stage to a library error.
fn staged(e: Pdf2VolumeError) -> anyhow::Error {
    let stage = e.stage();
    anyhow::Error::new(e).context(format!("pdf2volume failed at the {stage} stage"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // INFO-level library logs are suppressed while the progress bar is
    // active; -v always wins.
    let show_progress = !cli.quiet && !cli.verbose;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let progress_cb: Option<ProgressCallback> = if show_progress && !cli.skip_image_extraction {
        Some(CliScanProgress::new() as Arc<dyn ExtractionProgressCallback>)
    } else {
        None
    };
    let extraction = build_extraction_config(&cli, progress_cb)?;

    // ── Payload-only mode ────────────────────────────────────────────────
    if cli.payload_only {
        let summary = extract_images(&cli.pdf, &extraction)
            .await
            .map_err(staged)?;
        let payload = build_payload(&summary);
        write_result(cli.output.as_ref(), &payload).await?;

        if cli.stats {
            let stats = serde_json::json!({
                "total_pages": summary.page_count,
                "extracted_images": summary.records.len(),
                "skipped_images": summary.skipped.len(),
                "image_dir": extraction.output_dir,
            });
            eprintln!("{}", serde_json::to_string_pretty(&stats)?);
        }
        return Ok(());
    }

    // ── Generation ───────────────────────────────────────────────────────
    let generation = build_generation_config(&cli)?;
    let inputs = PromptInputs {
        guide_path: cli.guide.clone(),
        reference_json: cli.reference_json.clone(),
        example_title: cli.example_title.clone(),
        skip_image_extraction: cli.skip_image_extraction,
    };

    let result = if let Some(ref output_path) = cli.output {
        generate_to_file(&cli.pdf, output_path, &extraction, &generation, &inputs).await
    } else {
        generate(&cli.pdf, &extraction, &generation, &inputs).await
    };
    let output = result.map_err(staged)?;
    if cli.output.is_none() {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(output.json.as_bytes())
            .context("Failed to write to stdout")?;
    }

    if !cli.quiet {
        print_summary(&output, cli.output.as_ref());
    }
    if cli.stats {
        eprintln!(
            "{}",
            serde_json::to_string_pretty(&output.stats).context("Failed to serialise stats")?
        );
    }

    Ok(())
}

fn print_summary(output: &GenerationOutput, path: Option<&PathBuf>) {
    let stats = &output.stats;
    let marker = if output.volume.is_some() && stats.dangling_image_references.is_empty() {
        green("✔")
    } else {
        yellow("⚠")
    };

    match &stats.volume {
        Some(v) => eprintln!(
            "{}  {} pages  {} chunks ({} interactive)  {} image refs  {}ms",
            marker, v.pages, v.chunks, v.interactive_chunks, v.image_references, stats.total_duration_ms
        ),
        None => eprintln!(
            "{}  response is not a valid volume  {}ms",
            marker, stats.total_duration_ms
        ),
    }
    if !stats.dangling_image_references.is_empty() {
        eprintln!(
            "   {} unknown image refs: {}",
            yellow("⚠"),
            stats.dangling_image_references.join(", ")
        );
    }
    if let Some(path) = path {
        eprintln!("   {} {}", cyan("→"), bold(&path.display().to_string()));
    }
    eprintln!(
        "   {} tokens in  /  {} tokens out",
        dim(&stats.input_tokens.to_string()),
        dim(&stats.output_tokens.to_string()),
    );
}

async fn write_result(path: Option<&PathBuf>, text: &str) -> Result<()> {
    match path {
        Some(path) => write_atomic(path, text).await.map_err(staged)?,
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(text.as_bytes())
                .context("Failed to write to stdout")?;
            if !text.is_empty() && !text.ends_with('\n') {
                handle.write_all(b"\n").ok();
            }
        }
    }
    Ok(())
}

/// Map CLI args to `ExtractionConfig`.
fn build_extraction_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ExtractionConfig> {
    let mut builder = ExtractionConfig::builder()
        .output_dir(cli.image_dir.clone())
        .caption_distance(cli.caption_distance)
        .nearby_distance(cli.nearby_distance);

    if let Some(ref pwd) = cli.password {
        builder = builder.password(pwd);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().map_err(staged)
}

/// Map CLI args to `GenerationConfig`.
fn build_generation_config(cli: &Cli) -> Result<GenerationConfig> {
    let mut builder = GenerationConfig::builder()
        .mode(cli.mode.into())
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .max_retries(cli.max_retries)
        .api_timeout_secs(cli.api_timeout)
        .attach_pages(cli.attach_pages)
        .dpi(cli.dpi);

    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider);
    }

    builder.build().map_err(staged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn help_states_pdf_is_not_uploaded() {
        let cmd = Cli::command();
        let about = cmd.get_long_about().map(|s| s.to_string()).unwrap_or_default();
        let after = cmd.get_after_long_help().map(|s| s.to_string()).unwrap_or_default();
        assert!(about.contains("never uploaded"), "{about}");
        assert!(after.contains("never uploaded"), "{after}");
    }

    #[test]
    fn max_retries_is_bounded() {
        assert!(Cli::try_parse_from(["pdf2volume", "--max-retries", "10", "a.pdf"]).is_ok());
        assert!(Cli::try_parse_from(["pdf2volume", "--max-retries", "70", "a.pdf"]).is_err());
    }

    #[tokio::test]
    async fn payload_file_is_written_whole() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("out/payload.txt");
        write_result(Some(&path), "<image id=\"page_2_1\" />").await.unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "<image id=\"page_2_1\" />"
        );
        assert!(!tmp.path().join("out/payload.txt.tmp").exists());
    }
}
