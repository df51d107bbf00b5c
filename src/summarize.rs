//! Eager (full-document) summarization entry points.
//!
//! ## Why eager vs. streaming?
//!
//! This module provides the simpler API: wait for every page, then return a
//! [`SummaryOutput`]. Use [`crate::stream::summarize_stream`] instead when
//! you want pages as they are refined.

use crate::config::SummaryConfig;
use crate::error::DocveilError;
use crate::output::{format_report, save_summaries_to_file, SummaryOutput};
use crate::pipeline::extract::{PageExtractor, PdfTextExtractor};
use crate::pipeline::input::{resolve_input, Document};
use crate::pipeline::orchestrator::Pipeline;
use crate::service::{LlmSummaryService, SummaryService};
use edgequake_llm::{LLMProvider, ProviderFactory};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Summarize a PDF file, `.enc` upload or URL.
///
/// This is the primary entry point for the library.
///
/// # Errors
/// Every failure is fatal: there is no partially summarized output.
pub async fn summarize(
    input_str: impl AsRef<str>,
    config: &SummaryConfig,
) -> Result<SummaryOutput, DocveilError> {
    let input_str = input_str.as_ref();
    info!("Starting summary: {}", input_str);
    let document = resolve_input(input_str, config.download_timeout_secs, || {
        config.resolve_passphrase()
    })
    .await?;
    summarize_document(document, config).await
}

/// Summarize a document already in memory.
///
/// Writes the report when `config.output_dir` is set.
pub async fn summarize_document(
    document: Document,
    config: &SummaryConfig,
) -> Result<SummaryOutput, DocveilError> {
    let service = resolve_service(config)?;
    let mut pipeline = Pipeline::new(document, resolve_extractor(config), service, config.clone());
    pipeline.run().await?;

    let (document, state, stats) = pipeline.into_parts();
    let saved_file = match config.output_dir {
        Some(ref dir) => {
            Some(save_summaries_to_file(dir, &document.stem(), &state.refined_summaries).await?)
        }
        None => None,
    };

    Ok(SummaryOutput {
        name: document.name().to_string(),
        raw: state.raw_summaries,
        summaries: state.refined_summaries,
        stats,
        saved_file,
    })
}

/// Summarize and write the report to `output_path`.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn summarize_to_file(
    input_str: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    config: &SummaryConfig,
) -> Result<SummaryOutput, DocveilError> {
    let output = summarize(input_str, config).await?;
    let path = output_path.as_ref();
    let write_err = |e| DocveilError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let stem = Document::from_raw(output.name.clone(), Vec::new()).stem();
    let generated = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    let body = format_report(&stem, &generated, &output.summaries);

    let tmp_path = path.with_extension("txt.tmp");
    tokio::fs::write(&tmp_path, body).await.map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;

    info!("Report written to {}", path.display());
    Ok(output)
}

/// Synchronous wrapper around [`summarize`].
///
/// Creates a temporary tokio runtime internally.
pub fn summarize_sync(
    input_str: impl AsRef<str>,
    config: &SummaryConfig,
) -> Result<SummaryOutput, DocveilError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| DocveilError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(summarize(input_str, config))
}

/// The configured page extractor, or the PDF text-layer default.
pub fn resolve_extractor(config: &SummaryConfig) -> Arc<dyn PageExtractor> {
    match config.extractor {
        Some(ref e) => Arc::clone(e),
        None => Arc::new(PdfTextExtractor),
    }
}

/// Resolve the summary service, from most-specific to least-specific.
///
/// 1. **Pre-built service** (`config.service`): used as-is. Tests inject
///    deterministic stubs here.
/// 2. **Pre-built provider** (`config.provider`): wrapped in
///    [`LlmSummaryService`].
/// 3. **Named provider + model** (`config.provider_name`): built by
///    [`ProviderFactory::create_llm_provider`], which reads the matching API
///    key from the environment.
/// 4. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`).
/// 5. **Auto-detection** (`ProviderFactory::from_env`).
///
/// If none of these yields a provider the run fails with
/// [`DocveilError::ProviderNotConfigured`].
pub fn resolve_service(config: &SummaryConfig) -> Result<Arc<dyn SummaryService>, DocveilError> {
    if let Some(ref service) = config.service {
        return Ok(Arc::clone(service));
    }
    let provider = resolve_provider(config)?;
    Ok(Arc::new(LlmSummaryService::new(provider, config)))
}

fn resolve_provider(config: &SummaryConfig) -> Result<Arc<dyn LLMProvider>, DocveilError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().ok_or_else(|| {
            DocveilError::ProviderNotConfigured {
                provider: name.clone(),
                hint: "No model given. Pass --model or set DOCVEIL_MODEL.".to_string(),
            }
        })?;
        return create_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_provider(&prov, &model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| DocveilError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or pass --provider and --model.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, DocveilError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        DocveilError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;
    use async_trait::async_trait;

    struct Echo;

    #[async_trait]
    impl SummaryService for Echo {
        async fn summarize(&self, text: &str) -> Result<String, ServiceError> {
            Ok(text.to_string())
        }

        async fn refine(&self, _previous: &str, current: &str) -> Result<String, ServiceError> {
            Ok(format!("{current}+"))
        }
    }

    struct Fixed(Vec<&'static str>);

    impl PageExtractor for Fixed {
        fn extract(&self, _bytes: &[u8]) -> Result<Vec<String>, String> {
            Ok(self.0.iter().map(|s| s.to_string()).collect())
        }
    }

    fn config(dir: Option<&Path>) -> SummaryConfig {
        let mut builder = SummaryConfig::builder()
            .service(Arc::new(Echo))
            .extractor(Arc::new(Fixed(vec!["A", "B", "C"])));
        if let Some(d) = dir {
            builder = builder.output_dir(d);
        }
        builder.build().unwrap()
    }

    #[test]
    fn explicit_service_wins() {
        let cfg = config(None);
        assert!(resolve_service(&cfg).is_ok());
    }

    #[test]
    fn named_provider_without_model_is_rejected() {
        let cfg = SummaryConfig::builder()
            .provider_name("openai")
            .build()
            .unwrap();
        match resolve_service(&cfg) {
            Err(DocveilError::ProviderNotConfigured { provider, .. }) => {
                assert_eq!(provider, "openai")
            }
            Err(other) => panic!("unexpected {other:?}"),
            Ok(_) => panic!("expected an error"),
        }
    }

    #[tokio::test]
    async fn document_summary_is_refined_in_order() {
        let doc = Document::from_raw("three.pdf", vec![]);
        let out = summarize_document(doc, &config(None)).await.unwrap();
        assert_eq!(out.texts(), vec!["A", "B+", "C+"]);
        assert_eq!(out.raw.len(), 3);
        assert_eq!(out.stats.total_pages, 3);
        assert!(out.saved_file.is_none());
    }

    #[tokio::test]
    async fn output_dir_saves_report() {
        let dir = tempfile::tempdir().unwrap();
        let doc = Document::from_raw("three.pdf", vec![]);
        let out = summarize_document(doc, &config(Some(dir.path())))
            .await
            .unwrap();
        let saved = out.saved_file.unwrap();
        assert!(saved.starts_with(dir.path()));
        let body = std::fs::read_to_string(saved).unwrap();
        assert!(body.starts_with("PDF Summary: three\n"));
        assert!(body.contains("========== PAGE 3 ==========\n\nC+\n"));
    }

    #[test]
    fn sync_wrapper_reports_missing_file() {
        let err = summarize_sync("/no/such/file.pdf", &config(None)).unwrap_err();
        assert!(matches!(err, DocveilError::NotFound(_)));
    }
}
