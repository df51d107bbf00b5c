//! The pipeline state machine.
//!
//! ```text
//! Extracting ──▶ Summarizing ──▶ Refining(0) ──▶ … ──▶ Refining(n-1) ──▶ Done
//!      │               │               │                      │
//!      └───────────────┴───────────────┴──────────────────────┴──▶ Failed
//! ```
//!
//! Each call to [`Pipeline::advance`] runs exactly one state and returns the
//! [`StateDelta`] it produced. Extraction is single-shot, summarization is a
//! parallel barrier, and refinement runs one page per call: the caller cannot
//! start step `i` before step `i - 1` has returned, because both happen
//! inside the same `&mut self` method.
//!
//! [`PipelineState`] only grows. Nothing is rolled back on failure; the
//! machine just moves to `Failed` and stops producing deltas.

use crate::config::SummaryConfig;
use crate::error::DocveilError;
use crate::output::{RawSummary, RefinedSummary, SummaryStats};
use crate::pipeline::extract::{extract_pages, Page, PageExtractor};
use crate::pipeline::fanout::summarize_pages;
use crate::pipeline::input::Document;
use crate::pipeline::refine::refine_step;
use crate::service::SummaryService;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

/// Where the machine is. The variant names the work the next
/// [`Pipeline::advance`] call performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Extracting,
    Summarizing,
    Refining(usize),
    Done,
    Failed,
}

/// Accumulated state of one run. Owned by exactly one [`Pipeline`].
#[derive(Debug, Clone, Default)]
pub struct PipelineState {
    pub total_pages: usize,
    pub pages: Vec<Page>,
    pub raw_summaries: Vec<RawSummary>,
    pub refined_summaries: Vec<RefinedSummary>,
    pub next_index: usize,
}

impl PipelineState {
    /// True while pages remain to be refined.
    pub fn should_continue(&self) -> bool {
        self.next_index < self.total_pages
    }
}

/// What one [`Pipeline::advance`] call added to the state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateDelta {
    Extracted { total_pages: usize },
    Summarized { count: usize },
    Refined(RefinedSummary),
    Finished { total_pages: usize },
}

/// One summarization run over one document.
pub struct Pipeline {
    document: Document,
    extractor: Arc<dyn PageExtractor>,
    service: Arc<dyn SummaryService>,
    config: SummaryConfig,
    stage: Stage,
    state: PipelineState,
    stats: SummaryStats,
    started: Option<Instant>,
    finished_reported: bool,
}

impl Pipeline {
    pub fn new(
        document: Document,
        extractor: Arc<dyn PageExtractor>,
        service: Arc<dyn SummaryService>,
        config: SummaryConfig,
    ) -> Self {
        Self {
            document,
            extractor,
            service,
            config,
            stage: Stage::Extracting,
            state: PipelineState::default(),
            stats: SummaryStats::default(),
            started: None,
            finished_reported: false,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn stats(&self) -> &SummaryStats {
        &self.stats
    }

    pub fn config(&self) -> &SummaryConfig {
        &self.config
    }

    /// True while pages remain to be refined.
    pub fn should_continue(&self) -> bool {
        self.state.should_continue()
    }

    /// Refined summaries so far, in page order. Complete once `Done`.
    pub fn refined_summaries(&self) -> &[RefinedSummary] {
        &self.state.refined_summaries
    }

    pub fn into_parts(self) -> (Document, PipelineState, SummaryStats) {
        (self.document, self.state, self.stats)
    }

    /// Run the current stage and move to the next one.
    ///
    /// Returns `Ok(None)` once the terminal delta has been produced or the
    /// run has failed. The first error moves the machine to
    /// [`Stage::Failed`]; it is returned once and never again.
    pub async fn advance(&mut self) -> Result<Option<StateDelta>, DocveilError> {
        let started = *self.started.get_or_insert_with(Instant::now);

        let result = match self.stage {
            Stage::Extracting => self.extract().await,
            Stage::Summarizing => self.summarize().await,
            Stage::Refining(index) => self.refine(index).await,
            Stage::Done => {
                if self.finished_reported {
                    return Ok(None);
                }
                self.finished_reported = true;
                self.stats.total_duration_ms = started.elapsed().as_millis() as u64;
                info!(
                    "Summarized '{}': {} pages in {}ms",
                    self.document.name(),
                    self.state.total_pages,
                    self.stats.total_duration_ms
                );
                if let Some(ref cb) = self.config.progress_callback {
                    cb.on_pipeline_complete(self.state.total_pages);
                }
                Ok(StateDelta::Finished {
                    total_pages: self.state.total_pages,
                })
            }
            Stage::Failed => return Ok(None),
        };

        match result {
            Ok(delta) => Ok(Some(delta)),
            Err(e) => {
                error!("Pipeline failed in {:?}: {}", self.stage, e);
                self.stage = Stage::Failed;
                if let Some(ref cb) = self.config.progress_callback {
                    cb.on_pipeline_error(&e.to_string());
                }
                Err(e)
            }
        }
    }

    /// Drive the machine to the end, discarding deltas.
    pub async fn run(&mut self) -> Result<(), DocveilError> {
        while self.advance().await?.is_some() {}
        Ok(())
    }

    async fn extract(&mut self) -> Result<StateDelta, DocveilError> {
        let start = Instant::now();
        let pages = extract_pages(Arc::clone(&self.extractor), &self.document).await?;
        self.stats.extract_duration_ms = start.elapsed().as_millis() as u64;

        let total_pages = pages.len();
        info!("Extracted {} pages from '{}'", total_pages, self.document.name());
        self.state.total_pages = total_pages;
        self.state.pages = pages;
        self.stats.total_pages = total_pages;

        if let Some(ref cb) = self.config.progress_callback {
            cb.on_pipeline_start(total_pages);
        }
        self.stage = if total_pages == 0 {
            Stage::Done
        } else {
            Stage::Summarizing
        };
        Ok(StateDelta::Extracted { total_pages })
    }

    async fn summarize(&mut self) -> Result<StateDelta, DocveilError> {
        let start = Instant::now();
        let width = self.config.fan_out_width(self.state.total_pages);
        let raw = summarize_pages(
            &self.service,
            &self.state.pages,
            width,
            self.config.progress_callback.as_ref(),
        )
        .await?;
        self.stats.summarize_duration_ms = start.elapsed().as_millis() as u64;

        let count = raw.len();
        self.state.raw_summaries = raw;
        self.stage = self.next_refining_stage();
        Ok(StateDelta::Summarized { count })
    }

    async fn refine(&mut self, index: usize) -> Result<StateDelta, DocveilError> {
        let start = Instant::now();
        let raw = self.state.raw_summaries.get(index).ok_or_else(|| {
            DocveilError::Internal(format!("No raw summary for page {}", index + 1))
        })?;
        let refined = refine_step(
            self.service.as_ref(),
            raw,
            self.state.refined_summaries.last(),
        )
        .await?;
        self.stats.refine_duration_ms += start.elapsed().as_millis() as u64;

        self.state.refined_summaries.push(refined.clone());
        self.state.next_index += 1;
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_page_refined(
                self.state.next_index,
                self.state.total_pages,
                refined.text.len(),
            );
        }
        self.stage = self.next_refining_stage();
        Ok(StateDelta::Refined(refined))
    }

    fn next_refining_stage(&self) -> Stage {
        if self.should_continue() {
            Stage::Refining(self.state.next_index)
        } else {
            Stage::Done
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct Pages(Vec<&'static str>);

    impl PageExtractor for Pages {
        fn extract(&self, _bytes: &[u8]) -> Result<Vec<String>, String> {
            Ok(self.0.iter().map(|s| s.to_string()).collect())
        }
    }

    struct Corrupt;

    impl PageExtractor for Corrupt {
        fn extract(&self, _bytes: &[u8]) -> Result<Vec<String>, String> {
            Err("trailer not found".into())
        }
    }

    /// Echo summarizer, "+" refiner, recording call boundaries.
    #[derive(Default)]
    struct Recorder {
        log: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl SummaryService for Recorder {
        async fn summarize(&self, text: &str) -> Result<String, ServiceError> {
            Ok(text.to_string())
        }

        async fn refine(&self, _previous: &str, current: &str) -> Result<String, ServiceError> {
            self.log.lock().unwrap().push(format!("start {current}"));
            tokio::task::yield_now().await;
            self.log.lock().unwrap().push(format!("end {current}"));
            Ok(format!("{current}+"))
        }
    }

    fn pipeline(extractor: Arc<dyn PageExtractor>, service: Arc<dyn SummaryService>) -> Pipeline {
        Pipeline::new(
            Document::from_raw("doc.pdf", vec![]),
            extractor,
            service,
            SummaryConfig::default(),
        )
    }

    #[tokio::test]
    async fn walks_every_stage_in_order() {
        let mut p = pipeline(Arc::new(Pages(vec!["A", "B", "C"])), Arc::new(Recorder::default()));
        assert_eq!(p.stage(), Stage::Extracting);

        let mut deltas = Vec::new();
        while let Some(delta) = p.advance().await.unwrap() {
            deltas.push(delta);
        }

        let refined = |i, t: &str| {
            StateDelta::Refined(RefinedSummary {
                page_index: i,
                text: t.into(),
            })
        };
        assert_eq!(
            deltas,
            vec![
                StateDelta::Extracted { total_pages: 3 },
                StateDelta::Summarized { count: 3 },
                refined(0, "A"),
                refined(1, "B+"),
                refined(2, "C+"),
                StateDelta::Finished { total_pages: 3 },
            ]
        );
        assert_eq!(p.stage(), Stage::Done);
        assert!(!p.should_continue());
        assert_eq!(p.state().raw_summaries[0].text, p.refined_summaries()[0].text);
    }

    #[tokio::test]
    async fn refinement_steps_never_overlap() {
        let recorder = Arc::new(Recorder::default());
        let mut p = pipeline(Arc::new(Pages(vec!["A", "B", "C", "D"])), recorder.clone());
        p.run().await.unwrap();

        let log = recorder.log.lock().unwrap().clone();
        assert_eq!(
            log,
            vec!["start B", "end B", "start C", "end C", "start D", "end D"]
        );
    }

    #[tokio::test]
    async fn extraction_failure_is_terminal() {
        let mut p = pipeline(Arc::new(Corrupt), Arc::new(Recorder::default()));
        let err = p.advance().await.unwrap_err();
        assert!(matches!(err, DocveilError::Extraction { .. }));
        assert_eq!(p.stage(), Stage::Failed);
        assert!(p.advance().await.unwrap().is_none());
        assert!(p.state().pages.is_empty());
    }

    #[tokio::test]
    async fn empty_document_finishes_immediately() {
        let mut p = pipeline(Arc::new(Pages(vec![])), Arc::new(Recorder::default()));
        assert_eq!(
            p.advance().await.unwrap(),
            Some(StateDelta::Extracted { total_pages: 0 })
        );
        assert_eq!(
            p.advance().await.unwrap(),
            Some(StateDelta::Finished { total_pages: 0 })
        );
        assert!(p.advance().await.unwrap().is_none());
    }
}
