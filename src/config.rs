//! Configuration types for a summarization run.
//!
//! All pipeline behaviour is controlled through [`SummaryConfig`], built via
//! its [`SummaryConfigBuilder`]. One struct keeps every knob shareable across
//! tasks and easy to log.

use crate::crypto::Passphrase;
use crate::error::DocveilError;
use crate::pipeline::extract::PageExtractor;
use crate::progress::ProgressCallback;
use crate::service::SummaryService;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Configuration for summarizing one document.
///
/// # Example
/// ```rust
/// use docveil::SummaryConfig;
///
/// let config = SummaryConfig::builder()
///     .concurrency(4)
///     .model("llama3.1:8b")
///     .provider_name("ollama")
///     .max_retries(1)
///     .build()
///     .unwrap();
/// assert_eq!(config.concurrency, Some(4));
/// ```
#[derive(Clone)]
pub struct SummaryConfig {
    /// Maximum in-flight page-summary calls. Default: `None` (one call per page).
    ///
    /// Rate-limited providers (hosted APIs on low tiers, a single local Ollama
    /// instance) need a cap. Results keep page order either way.
    pub concurrency: Option<usize>,

    /// LLM model identifier, e.g. "gpt-4.1-nano", "llama3.1:8b".
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Pre-constructed summary service. Takes precedence over every
    /// provider setting; tests inject deterministic stubs here.
    pub service: Option<Arc<dyn SummaryService>>,

    /// Page extractor. Default: `None` (PDF text layer via lopdf).
    pub extractor: Option<Arc<dyn PageExtractor>>,

    /// Sampling temperature. Default: 0.3.
    pub temperature: f32,

    /// Maximum tokens per summary or refinement. Default: 2048.
    pub max_tokens: usize,

    /// Retries per external call after the first attempt. Default: 2.
    ///
    /// `0` gives the single-attempt behaviour. The bound is hard: a call is
    /// attempted at most `max_retries + 1` times.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Per-attempt timeout for an external call in seconds. Default: 120.
    pub api_timeout_secs: u64,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Custom prompt for the per-page summary call. `{page}` is replaced with
    /// the page text.
    pub summary_prompt: Option<String>,

    /// Custom prompt for the refinement call. `{previous}` and `{current}`
    /// are replaced with the prior refined summary and the raw summary.
    pub refine_prompt: Option<String>,

    /// Passphrase for `.enc` inputs. If `None`, read from the environment
    /// when an encrypted input is encountered.
    pub passphrase: Option<Passphrase>,

    /// When set, the full report is written here before the completion event.
    pub output_dir: Option<PathBuf>,

    /// Progress callback for per-page events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            concurrency: None,
            model: None,
            provider_name: None,
            provider: None,
            service: None,
            extractor: None,
            temperature: 0.3,
            max_tokens: 2048,
            max_retries: 2,
            retry_backoff_ms: 500,
            api_timeout_secs: 120,
            download_timeout_secs: 120,
            summary_prompt: None,
            refine_prompt: None,
            passphrase: None,
            output_dir: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for SummaryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SummaryConfig")
            .field("concurrency", &self.concurrency)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("service", &self.service.as_ref().map(|_| "<dyn SummaryService>"))
            .field("extractor", &self.extractor.as_ref().map(|_| "<dyn PageExtractor>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("passphrase", &self.passphrase)
            .field("output_dir", &self.output_dir)
            .finish()
    }
}

impl SummaryConfig {
    /// Create a new builder for `SummaryConfig`.
    pub fn builder() -> SummaryConfigBuilder {
        SummaryConfigBuilder {
            config: Self::default(),
        }
    }

    /// Fan-out width for a document with `total_pages` pages.
    pub fn fan_out_width(&self, total_pages: usize) -> usize {
        self.concurrency.unwrap_or(total_pages).max(1)
    }

    /// The configured passphrase, or the one from `ENCRYPTION_PASSPHRASE`.
    pub fn resolve_passphrase(&self) -> Result<Passphrase, DocveilError> {
        match self.passphrase {
            Some(ref p) => Ok(p.clone()),
            None => Passphrase::from_env(),
        }
    }
}

/// Builder for [`SummaryConfig`].
#[derive(Debug)]
pub struct SummaryConfigBuilder {
    config: SummaryConfig,
}

impl SummaryConfigBuilder {
    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = Some(n.max(1));
        self
    }

    pub fn unbounded_concurrency(mut self) -> Self {
        self.config.concurrency = None;
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

    pub fn service(mut self, service: Arc<dyn SummaryService>) -> Self {
        self.config.service = Some(service);
        self
    }

    pub fn extractor(mut self, extractor: Arc<dyn PageExtractor>) -> Self {
        self.config.extractor = Some(extractor);
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

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn summary_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.summary_prompt = Some(prompt.into());
        self
    }

    pub fn refine_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.refine_prompt = Some(prompt.into());
        self
    }

    pub fn passphrase(mut self, passphrase: Passphrase) -> Self {
        self.config.passphrase = Some(passphrase);
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = Some(dir.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<SummaryConfig, DocveilError> {
        let c = &self.config;
        if c.concurrency == Some(0) {
            return Err(DocveilError::Configuration(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        if c.api_timeout_secs == 0 {
            return Err(DocveilError::Configuration(
                "API timeout must be at least 1 second".into(),
            ));
        }
        if let Some(ref p) = c.refine_prompt {
            if !p.contains("{previous}") || !p.contains("{current}") {
                return Err(DocveilError::Configuration(
                    "Refine prompt must contain {previous} and {current} placeholders".into(),
                ));
            }
        }
        if let Some(ref p) = c.summary_prompt {
            if !p.contains("{page}") {
                return Err(DocveilError::Configuration(
                    "Summary prompt must contain a {page} placeholder".into(),
                ));
            }
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = SummaryConfig::default();
        assert_eq!(c.concurrency, None);
        assert_eq!(c.max_retries, 2);
        assert_eq!(c.retry_backoff_ms, 500);
        assert_eq!(c.fan_out_width(7), 7);
    }

    #[test]
    fn fan_out_width_respects_cap() {
        let c = SummaryConfig::builder().concurrency(3).build().unwrap();
        assert_eq!(c.fan_out_width(10), 3);
        assert_eq!(c.fan_out_width(0), 3);
        assert_eq!(SummaryConfig::default().fan_out_width(0), 1);
    }

    #[test]
    fn concurrency_is_clamped() {
        let c = SummaryConfig::builder().concurrency(0).build().unwrap();
        assert_eq!(c.concurrency, Some(1));
    }

    #[test]
    fn temperature_is_clamped() {
        let c = SummaryConfig::builder().temperature(9.0).build().unwrap();
        assert_eq!(c.temperature, 2.0);
    }

    #[test]
    fn refine_prompt_needs_placeholders() {
        let err = SummaryConfig::builder()
            .refine_prompt("no placeholders here")
            .build()
            .unwrap_err();
        assert!(matches!(err, DocveilError::Configuration(_)));

        assert!(SummaryConfig::builder()
            .refine_prompt("{previous} then {current}")
            .build()
            .is_ok());
    }

    #[test]
    fn zero_timeout_rejected() {
        assert!(SummaryConfig::builder().api_timeout_secs(0).build().is_err());
    }

    #[test]
    fn debug_hides_passphrase() {
        let c = SummaryConfig::builder()
            .passphrase(Passphrase::new("s3cret"))
            .build()
            .unwrap();
        assert!(!format!("{c:?}").contains("s3cret"));
    }
}
