//! # docveil
//!
//! Summarize long documents page by page with an LLM, refining every page's
//! summary against the one before it so the result reads as one narrative.
//! Uploaded documents are kept encrypted at rest.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF / .enc / URL
//!  │
//!  ├─ 1. Input    resolve path or URL; decrypt .enc uploads in memory
//!  ├─ 2. Extract  page texts via lopdf (CPU-bound, spawn_blocking)
//!  ├─ 3. Fan-out  one summary call per page, concurrently, order kept
//!  ├─ 4. Refine   page i rewritten with page i-1 as context, strictly in order
//!  └─ 5. Stream   one `processing` event per refined page, then `complete`
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use docveil::{summarize, SummaryConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / ...
//!     let config = SummaryConfig::default();
//!     let output = summarize("report.pdf", &config).await?;
//!     for (i, page) in output.summaries.iter().enumerate() {
//!         println!("--- page {} ---\n{}", i + 1, page.text);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Streaming
//!
//! ```rust,no_run
//! use docveil::{summarize_input_stream, ProgressEvent, SummaryConfig};
//! use futures::StreamExt;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let config = SummaryConfig::default();
//! let mut events = summarize_input_stream("report.pdf", &config).await;
//! while let Some(event) = events.next().await {
//!     if let ProgressEvent::Processing { page, total_pages, summary } = event {
//!         println!("[{page}/{total_pages}] {summary}");
//!     }
//! }
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature  | Default | Description |
//! |----------|---------|-------------|
//! | `cli`    | on      | Enables the `docveil` binary (clap + anyhow + tracing-subscriber) |
//! | `server` | on      | HTTP upload / SSE server (axum + tower-http) |
//!
//! ```toml
//! docveil = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod crypto;
pub mod error;
pub mod jobs;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
#[cfg(feature = "server")]
pub mod server;
pub mod service;
pub mod stream;
pub mod summarize;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{SummaryConfig, SummaryConfigBuilder};
pub use crypto::{decrypt, encrypt, Passphrase};
pub use error::{DocveilError, ServiceError};
pub use jobs::{JobRegistry, JobStatus};
pub use output::{RawSummary, RefinedSummary, SummaryOutput, SummaryStats};
pub use pipeline::extract::{Page, PageExtractor, PdfTextExtractor};
pub use pipeline::input::Document;
pub use pipeline::orchestrator::{Pipeline, PipelineState, Stage, StateDelta};
pub use progress::{NoopProgressCallback, ProgressCallback, SummaryProgressCallback};
pub use service::{LlmSummaryService, RetryPolicy, SummaryService};
pub use stream::{summarize_input_stream, summarize_stream, EventStatus, ProgressEvent, ProgressStream};
pub use summarize::{summarize, summarize_document, summarize_sync, summarize_to_file};
