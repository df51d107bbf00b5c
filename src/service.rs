//! The external text-generation capability used by the pipeline.
//!
//! The pipeline only ever talks to a [`SummaryService`]; it never reaches
//! for a global client. [`LlmSummaryService`] is the production
//! implementation on top of an `edgequake_llm` provider. Tests substitute
//! deterministic stubs.
//!
//! ## Retry Strategy
//!
//! Each call gets at most `max_retries + 1` attempts, each bounded by
//! `api_timeout_secs`. The wait before attempt `n` is
//! `retry_backoff_ms * 2^(n-1)`: with 500 ms base and 2 retries that is
//! 500 ms → 1 s.

use crate::config::SummaryConfig;
use crate::error::ServiceError;
use crate::pipeline::postprocess::clean_summary;
use crate::prompts::{
    refine_prompt, summary_prompt, DEFAULT_REFINE_PROMPT, DEFAULT_SUMMARY_PROMPT,
};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};

/// Summarize and refine text through an external service.
///
/// Implementations must be safe to call concurrently: the fan-out stage
/// issues one `summarize` per page at the same time.
#[async_trait]
pub trait SummaryService: Send + Sync {
    /// Produce a raw summary of one page.
    async fn summarize(&self, page_text: &str) -> Result<String, ServiceError>;

    /// Produce an improved summary of `current` that continues `previous`
    /// without restating it.
    async fn refine(&self, previous: &str, current: &str) -> Result<String, ServiceError>;
}

/// Bounded retry-with-backoff policy for one external call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_ms: u64,
    pub timeout_secs: u64,
}

impl RetryPolicy {
    pub fn from_config(config: &SummaryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            backoff_ms: config.retry_backoff_ms,
            timeout_secs: config.api_timeout_secs,
        }
    }

    /// Delay before the given attempt (0 = first attempt, no delay).
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let factor = 2u64.saturating_pow(attempt - 1);
        Duration::from_millis(self.backoff_ms.saturating_mul(factor))
    }
}

/// Run `op` under `policy`, retrying failures and timeouts.
///
/// `label` only appears in log lines.
pub async fn with_retry<F, Fut>(
    policy: RetryPolicy,
    label: &str,
    mut op: F,
) -> Result<String, ServiceError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<String, String>>,
{
    let per_call = Duration::from_secs(policy.timeout_secs);
    let mut last_err: Option<ServiceError> = None;

    for attempt in 0..=policy.max_retries {
        if attempt > 0 {
            let backoff = policy.backoff_for(attempt);
            warn!(
                "{}: retry {}/{} after {}ms",
                label,
                attempt,
                policy.max_retries,
                backoff.as_millis()
            );
            sleep(backoff).await;
        }

        match timeout(per_call, op()).await {
            Ok(Ok(text)) => return Ok(text),
            Ok(Err(detail)) => {
                warn!("{}: attempt {} failed: {}", label, attempt + 1, detail);
                last_err = Some(ServiceError::Failed {
                    retries: attempt,
                    detail,
                });
            }
            Err(_) => {
                warn!(
                    "{}: attempt {} timed out after {}s",
                    label,
                    attempt + 1,
                    policy.timeout_secs
                );
                last_err = Some(ServiceError::Timeout {
                    secs: policy.timeout_secs,
                });
            }
        }
    }

    Err(last_err.unwrap_or(ServiceError::Failed {
        retries: policy.max_retries,
        detail: "Unknown error".to_string(),
    }))
}

/// [`SummaryService`] backed by an `edgequake_llm` chat provider.
pub struct LlmSummaryService {
    provider: Arc<dyn LLMProvider>,
    options: CompletionOptions,
    policy: RetryPolicy,
    summary_template: String,
    refine_template: String,
}

impl LlmSummaryService {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &SummaryConfig) -> Self {
        Self {
            provider,
            options: build_options(config),
            policy: RetryPolicy::from_config(config),
            summary_template: config
                .summary_prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_SUMMARY_PROMPT.to_string()),
            refine_template: config
                .refine_prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_REFINE_PROMPT.to_string()),
        }
    }

    async fn complete(&self, label: &str, prompt: String) -> Result<String, ServiceError> {
        let start = Instant::now();
        let messages = vec![ChatMessage::user(prompt)];
        let (provider, options, messages) = (&self.provider, &self.options, &messages);
        let text = with_retry(self.policy, label, || async move {
            let response = provider
                .chat(messages, Some(options))
                .await
                .map_err(|e| format!("{}", e))?;
            debug!(
                "{}: {} input tokens, {} output tokens",
                label, response.prompt_tokens, response.completion_tokens
            );
            Ok::<_, String>(response.content)
        })
        .await?;
        debug!("{}: done in {:?}", label, start.elapsed());
        Ok(clean_summary(&text))
    }
}

#[async_trait]
impl SummaryService for LlmSummaryService {
    async fn summarize(&self, page_text: &str) -> Result<String, ServiceError> {
        let prompt = summary_prompt(&self.summary_template, page_text);
        self.complete("summarize", prompt).await
    }

    async fn refine(&self, previous: &str, current: &str) -> Result<String, ServiceError> {
        let prompt = refine_prompt(&self.refine_template, previous, current);
        self.complete("refine", prompt).await
    }
}

/// Build `CompletionOptions` from the summary config.
fn build_options(config: &SummaryConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}
