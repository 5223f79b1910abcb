//! Configuration types for image extraction and volume generation.
//!
//! Extraction and generation are configured separately: the extractor needs
//! no provider or API key, and `--payload-only` runs never build a
//! [`GenerationConfig`] at all. Both structs are built through builders
//! that validate on `build()`.
//!
//! Nothing here is process-global. The image output directory in particular
//! is a plain field of [`ExtractionConfig`] threaded through every call that
//! writes images.

use crate::error::Pdf2VolumeError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Default vertical distance (points) within which a caption-like run is
/// attached to an image.
pub const DEFAULT_CAPTION_DISTANCE: f64 = 36.0;

/// Default vertical distance (points) for the nearby-text fallback.
pub const DEFAULT_NEARBY_DISTANCE: f64 = 120.0;

/// Upper bound for [`GenerationConfig::max_retries`].
pub const MAX_RETRIES_LIMIT: u32 = 10;

/// Longest single wait between two generation attempts.
pub const MAX_RETRY_BACKOFF_MS: u64 = 60_000;

/// Configuration for a single extraction run.
///
/// # Example
/// ```rust
/// use pdf2volume::ExtractionConfig;
///
/// let config = ExtractionConfig::builder()
///     .output_dir("results/extracted-images")
///     .caption_distance(24.0)
///     .build()
///     .unwrap();
/// assert_eq!(config.caption_distance, 24.0);
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Directory the image store writes into. Created on demand.
    /// Default: `results/extracted-images`.
    pub output_dir: PathBuf,

    /// Maximum vertical gap, in points, between an image and a caption run.
    /// Default: 36 (half an inch).
    pub caption_distance: f64,

    /// Maximum vertical gap, in points, for the nearest-text fallback.
    /// Must be at least `caption_distance`. Default: 120.
    pub nearby_distance: f64,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Optional progress callback for scan events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("results/extracted-images"),
            caption_distance: DEFAULT_CAPTION_DISTANCE,
            nearby_distance: DEFAULT_NEARBY_DISTANCE,
            password: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("output_dir", &self.output_dir)
            .field("caption_distance", &self.caption_distance)
            .field("nearby_distance", &self.nearby_distance)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ExtractionProgressCallback>"),
            )
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn caption_distance(mut self, points: f64) -> Self {
        self.config.caption_distance = points;
        self
    }

    pub fn nearby_distance(mut self, points: f64) -> Self {
        self.config.nearby_distance = points;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, Pdf2VolumeError> {
        let c = &self.config;
        if c.output_dir.as_os_str().is_empty() {
            return Err(Pdf2VolumeError::InvalidConfig(
                "Image output directory must not be empty".into(),
            ));
        }
        if !c.caption_distance.is_finite() || c.caption_distance < 0.0 {
            return Err(Pdf2VolumeError::InvalidConfig(format!(
                "Caption distance must be a non-negative number, got {}",
                c.caption_distance
            )));
        }
        if !c.nearby_distance.is_finite() || c.nearby_distance < c.caption_distance {
            return Err(Pdf2VolumeError::InvalidConfig(format!(
                "Nearby-text distance must be >= caption distance ({}), got {}",
                c.caption_distance, c.nearby_distance
            )));
        }
        Ok(self.config)
    }
}

/// Configuration for the generation (LLM) step.
///
/// # Example
/// ```rust
/// use pdf2volume::{GenerationConfig, Mode};
///
/// let config = GenerationConfig::builder()
///     .mode(Mode::Condensed)
///     .model("gpt-4.1-mini")
///     .max_tokens(16_000)
///     .build()
///     .unwrap();
/// assert_eq!(config.mode, Mode::Condensed);
/// ```
#[derive(Clone)]
pub struct GenerationConfig {
    /// Prompt variant. Default: [`Mode::Faithful`].
    pub mode: Mode,

    /// LLM model identifier, e.g. "gpt-4.1", "gemini-2.5-flash".
    /// If None, uses the provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "gemini").
    /// If None along with `provider`, the provider is auto-detected from the environment.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature. Default: 0.2.
    pub temperature: f32,

    /// Maximum completion tokens. A whole volume is long. Default: 16000.
    pub max_tokens: usize,

    /// Maximum retry attempts on a failed call. Default: 2.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled after each attempt. Default: 1000.
    pub retry_backoff_ms: u64,

    /// Per-call timeout in seconds. Default: 300.
    pub api_timeout_secs: u64,

    /// Attach rendered page images to the request. Default: false.
    pub attach_pages: bool,

    /// Render resolution for attached pages. Default: 150.
    pub dpi: u32,

    /// Longest edge, in pixels, of attached page renders. Default: 1600.
    pub max_rendered_pixels: u32,

    /// Custom system prompt. If None, uses the built-in default.
    pub system_prompt: Option<String>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            mode: Mode::default(),
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.2,
            max_tokens: 16_000,
            max_retries: 2,
            retry_backoff_ms: 1000,
            api_timeout_secs: 300,
            attach_pages: false,
            dpi: 150,
            max_rendered_pixels: 1600,
            system_prompt: None,
        }
    }
}

impl fmt::Debug for GenerationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationConfig")
            .field("mode", &self.mode)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("attach_pages", &self.attach_pages)
            .field("dpi", &self.dpi)
            .finish()
    }
}

impl GenerationConfig {
    /// Create a new builder for `GenerationConfig`.
    pub fn builder() -> GenerationConfigBuilder {
        GenerationConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`GenerationConfig`].
#[derive(Debug)]
pub struct GenerationConfigBuilder {
    config: GenerationConfig,
}

impl GenerationConfigBuilder {
    pub fn mode(mut self, mode: Mode) -> Self {
        self.config.mode = mode;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn attach_pages(mut self, v: bool) -> Self {
        self.config.attach_pages = v;
        self
    }

    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 400);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<GenerationConfig, Pdf2VolumeError> {
        let c = &self.config;
        if c.max_tokens == 0 {
            return Err(Pdf2VolumeError::InvalidConfig(
                "max_tokens must be ≥ 1".into(),
            ));
        }
        if c.api_timeout_secs == 0 {
            return Err(Pdf2VolumeError::InvalidConfig(
                "API timeout must be ≥ 1 second".into(),
            ));
        }
        if c.max_retries > MAX_RETRIES_LIMIT {
            return Err(Pdf2VolumeError::InvalidConfig(format!(
                "max_retries must be ≤ {MAX_RETRIES_LIMIT}, got {}",
                c.max_retries
            )));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Prompt variant controlling how the source text is adapted.
///
/// | Mode | Use case |
/// |------|----------|
/// | faithful | Keep the author's wording; chunk and add questions only |
/// | simplified | Lower reading level, same coverage |
/// | condensed | Shorter pages, key ideas only |
/// | hybrid | Faithful core text, simplified asides |
/// | interaction-heavy | Smaller chunks, a question on nearly every chunk |
/// | adaptive | Model chooses per section based on density |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    #[default]
    Faithful,
    Simplified,
    Condensed,
    Hybrid,
    InteractionHeavy,
    Adaptive,
}

impl Mode {
    pub const ALL: [Mode; 6] = [
        Mode::Faithful,
        Mode::Simplified,
        Mode::Condensed,
        Mode::Hybrid,
        Mode::InteractionHeavy,
        Mode::Adaptive,
    ];

    /// The name used on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Faithful => "faithful",
            Mode::Simplified => "simplified",
            Mode::Condensed => "condensed",
            Mode::Hybrid => "hybrid",
            Mode::InteractionHeavy => "interaction-heavy",
            Mode::Adaptive => "adaptive",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Mode {
    type Err = Pdf2VolumeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Mode::ALL
            .into_iter()
            .find(|m| m.as_str() == wanted)
            .ok_or_else(|| Pdf2VolumeError::InvalidConfig(format!("Unknown mode '{s}'")))
    }
}
