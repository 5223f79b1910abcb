//! Generation call: send the assembled prompt to the provider and collect the answer.
//!
//! Prompt wording lives in [`crate::prompts`], response cleanup in
//! [`crate::pipeline::postprocess`].
//!
//! ## Retry Strategy
//!
//! HTTP 429 / 503 errors from LLM APIs are transient. Exponential backoff
//! (`retry_backoff_ms * 2^(attempt-1)`) spaces the retries out: with the
//! default 1 s base and 2 retries the waits are 1 s → 2 s; no single wait
//! exceeds one minute. Each attempt is
//! bounded by `api_timeout_secs`; a whole volume is a long completion, so
//! the default is generous.

use crate::config::{GenerationConfig, MAX_RETRY_BACKOFF_MS};
use crate::error::Pdf2VolumeError;
use crate::prompts::DEFAULT_SYSTEM_PROMPT;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, info, warn};

/// What came back from one successful generation call.
#[derive(Debug, Clone)]
pub struct GenerationResponse {
    /// Raw model output, before post-processing.
    pub content: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub duration_ms: u64,
    /// Attempts that failed before the one that succeeded.
    pub retries: u32,
}

/// One answered attempt, before retry bookkeeping.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Completion {
    pub content: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

enum AttemptFailure {
    Api(String),
    Timeout,
    Empty,
}

/// Send `prompt` (plus optional page images) and return the model's answer.
///
/// # Errors
/// After `max_retries + 1` failed attempts, the error of the last one:
/// [`Pdf2VolumeError::ApiTimeout`], [`Pdf2VolumeError::EmptyResponse`] or
/// [`Pdf2VolumeError::LlmApiError`].
pub async fn generate_volume(
    provider: &Arc<dyn LLMProvider>,
    prompt: &str,
    pages: Vec<ImageData>,
    config: &GenerationConfig,
) -> Result<GenerationResponse, Pdf2VolumeError> {
    let start = Instant::now();
    let image_count = pages.len();
    let messages = build_messages(config, prompt, pages);
    let options = build_options(config);

    info!(
        "Requesting volume (mode {}, {} chars of prompt, {} page images)",
        config.mode,
        prompt.len(),
        image_count
    );

    let (messages, options) = (&messages, &options);
    let (completion, retries) = call_with_retry(config, move || async move {
        provider
            .chat(messages, Some(options))
            .await
            .map(|response| Completion {
                content: response.content,
                input_tokens: response.prompt_tokens as u64,
                output_tokens: response.completion_tokens as u64,
            })
            .map_err(|e| e.to_string())
    })
    .await?;

    let duration = start.elapsed();
    debug!(
        "Generation: {} input tokens, {} output tokens, {:?}",
        completion.input_tokens, completion.output_tokens, duration
    );
    Ok(GenerationResponse {
        content: completion.content,
        input_tokens: completion.input_tokens,
        output_tokens: completion.output_tokens,
        duration_ms: duration.as_millis() as u64,
        retries,
    })
}

/// Run `call` until it yields a non-empty answer or the retries run out.
///
/// Returns the answer and the number of failed attempts before it.
pub(crate) async fn call_with_retry<F, Fut>(
    config: &GenerationConfig,
    mut call: F,
) -> Result<(Completion, u32), Pdf2VolumeError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Completion, String>>,
{
    let call_timeout = Duration::from_secs(config.api_timeout_secs);
    let mut last_failure = AttemptFailure::Empty;

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let backoff = backoff_delay(config.retry_backoff_ms, attempt);
            warn!(
                "Generation: retry {}/{} after {}ms",
                attempt,
                config.max_retries,
                backoff.as_millis()
            );
            sleep(backoff).await;
        }

        match timeout(call_timeout, call()).await {
            Ok(Ok(completion)) if completion.content.trim().is_empty() => {
                warn!("Generation: attempt {} returned an empty response", attempt + 1);
                last_failure = AttemptFailure::Empty;
            }
            Ok(Ok(completion)) => return Ok((completion, attempt)),
            Ok(Err(err_msg)) => {
                warn!("Generation: attempt {} failed: {}", attempt + 1, err_msg);
                last_failure = AttemptFailure::Api(err_msg);
            }
            Err(_) => {
                warn!(
                    "Generation: attempt {} timed out after {}s",
                    attempt + 1,
                    config.api_timeout_secs
                );
                last_failure = AttemptFailure::Timeout;
            }
        }
    }

    Err(match last_failure {
        AttemptFailure::Timeout => Pdf2VolumeError::ApiTimeout {
            secs: config.api_timeout_secs,
        },
        AttemptFailure::Empty => Pdf2VolumeError::EmptyResponse,
        AttemptFailure::Api(message) => Pdf2VolumeError::LlmApiError {
            retries: config.max_retries,
            message,
        },
    })
}

/// Wait before retry `attempt` (1-based): `base * 2^(attempt-1)`, capped at
/// [`MAX_RETRY_BACKOFF_MS`].
fn backoff_delay(base_ms: u64, attempt: u32) -> Duration {
    let factor = 2u64
        .checked_pow(attempt.saturating_sub(1))
        .unwrap_or(u64::MAX);
    Duration::from_millis(base_ms.saturating_mul(factor).min(MAX_RETRY_BACKOFF_MS))
}

/// System prompt, then one user turn carrying the prompt and any page images.
fn build_messages(config: &GenerationConfig, prompt: &str, pages: Vec<ImageData>) -> Vec<ChatMessage> {
    let system_prompt = config
        .system_prompt
        .as_deref()
        .unwrap_or(DEFAULT_SYSTEM_PROMPT);

    let user = if pages.is_empty() {
        ChatMessage::user(prompt)
    } else {
        ChatMessage::user_with_images(prompt, pages)
    };

    vec![ChatMessage::system(system_prompt), user]
}

/// Build `CompletionOptions` from the generation config.
fn build_options(config: &GenerationConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn build_options_defaults() {
        let config = GenerationConfig::default();
        let opts = build_options(&config);
        assert_eq!(opts.temperature, Some(0.2));
        assert_eq!(opts.max_tokens, Some(16_000));
    }

    fn completion(content: &str) -> Completion {
        Completion {
            content: content.into(),
            input_tokens: 10,
            output_tokens: 20,
        }
    }

    fn fast_config(max_retries: u32) -> GenerationConfig {
        GenerationConfig::builder()
            .max_retries(max_retries)
            .retry_backoff_ms(1)
            .build()
            .unwrap()
    }

    #[test]
    fn backoff_doubles_then_saturates() {
        assert_eq!(backoff_delay(1000, 1), Duration::from_millis(1000));
        assert_eq!(backoff_delay(1000, 2), Duration::from_millis(2000));
        assert_eq!(backoff_delay(1000, 3), Duration::from_millis(4000));
        for attempt in 1..=70 {
            assert!(backoff_delay(1000, attempt) <= Duration::from_millis(MAX_RETRY_BACKOFF_MS));
        }
        assert_eq!(backoff_delay(u64::MAX, 70), Duration::from_millis(MAX_RETRY_BACKOFF_MS));
    }

    #[tokio::test]
    async fn transient_failure_is_retried() {
        let config = fast_config(2);
        let calls = AtomicU32::new(0);
        let calls = &calls;

        let (answer, retries) = call_with_retry(&config, move || async move {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err("HTTP 503 Service Unavailable".to_string())
            } else {
                Ok(completion("{\"Title\": \"Cells\"}"))
            }
        })
        .await
        .unwrap();

        assert_eq!(retries, 1);
        assert_eq!(answer.content, "{\"Title\": \"Cells\"}");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn last_api_error_is_reported() {
        let config = fast_config(2);
        let calls = AtomicU32::new(0);
        let calls = &calls;

        let err = call_with_retry(&config, move || async move {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            Err(format!("HTTP 429 attempt {}", n + 1))
        })
        .await
        .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        match err {
            Pdf2VolumeError::LlmApiError { retries, message } => {
                assert_eq!(retries, 2);
                assert_eq!(message, "HTTP 429 attempt 3");
            }
            other => panic!("expected LlmApiError, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn blank_answers_end_in_empty_response() {
        let config = fast_config(1);
        let err = call_with_retry(&config, || async { Ok(completion("  \n")) })
            .await
            .unwrap_err();
        assert!(matches!(err, Pdf2VolumeError::EmptyResponse));
    }

    #[test]
    fn messages_are_system_then_user() {
        let config = GenerationConfig::default();
        let messages = build_messages(&config, "Convert this.", Vec::new());
        assert_eq!(messages.len(), 2);
    }
}
