//! Progress-callback trait for pipeline events.
//!
//! Inject an [`Arc<dyn SummaryProgressCallback>`] via
//! [`crate::config::SummaryConfigBuilder::progress_callback`] to observe a run
//! without consuming its event stream: the CLI drives a progress bar with it,
//! a host application could forward to metrics or a database.
//!
//! # Example
//!
//! ```rust
//! use docveil::{SummaryProgressCallback, SummaryConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     refined: AtomicUsize,
//! }
//!
//! impl SummaryProgressCallback for CountingCallback {
//!     fn on_page_refined(&self, page_num: usize, total_pages: usize, summary_len: usize) {
//!         self.refined.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("Page {}/{} refined ({} bytes)", page_num, total_pages, summary_len);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { refined: AtomicUsize::new(0) });
//!
//! let config = SummaryConfig::builder()
//!     .progress_callback(counter as Arc<dyn SummaryProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the pipeline as it moves through its stages.
///
/// All methods have default no-op implementations. `on_page_summarized` is
/// called from concurrent fan-out calls, in completion order; every other
/// method is called from the orchestrator in pipeline order.
pub trait SummaryProgressCallback: Send + Sync {
    /// Pages were extracted; `total_pages` pages will be summarized.
    fn on_pipeline_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// A raw page summary arrived (1-indexed, completion order).
    fn on_page_summarized(&self, page_num: usize, total_pages: usize) {
        let _ = (page_num, total_pages);
    }

    /// A page was refined (1-indexed, strictly increasing).
    fn on_page_refined(&self, page_num: usize, total_pages: usize, summary_len: usize) {
        let _ = (page_num, total_pages, summary_len);
    }

    /// The run failed; no further events follow.
    fn on_pipeline_error(&self, error: &str) {
        let _ = error;
    }

    /// Every page was refined.
    fn on_pipeline_complete(&self, total_pages: usize) {
        let _ = total_pages;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl SummaryProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::SummaryConfig`].
pub type ProgressCallback = Arc<dyn SummaryProgressCallback>;
