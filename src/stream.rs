//! Streaming summarization API: one event per refined page.
//!
//! ## Why stream?
//!
//! Refinement is sequential, so a 40-page document spends most of its time
//! in the refine loop. Streaming lets the caller show page 1 while page 2 is
//! still being refined, and lets the HTTP layer forward progress as
//! server-sent events.
//!
//! ## Event protocol
//!
//! ```text
//! processing(1, s1) ─▶ processing(2, s2) ─▶ … ─▶ processing(N, sN) ─▶ complete
//!          └─────────────────── any failure ──────────────────────▶ error
//! ```
//!
//! Exactly one terminal event (`complete` or `error`) ends every stream.
//! Dropping the stream cancels the run at whatever call it is waiting on.

use crate::config::SummaryConfig;
use crate::error::DocveilError;
use crate::output::save_summaries_to_file;
use crate::pipeline::input::{resolve_input, Document};
use crate::pipeline::orchestrator::{Pipeline, StateDelta};
use crate::summarize::{resolve_extractor, resolve_service};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::pin::Pin;
use tokio_stream::Stream;
use tracing::{info, warn};

/// A boxed stream of progress events.
pub type ProgressStream = Pin<Box<dyn Stream<Item = ProgressEvent> + Send>>;

/// Wire status of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Processing,
    Complete,
    Error,
}

/// One client-visible step of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// Page `page` (1-based count of refined pages) is ready.
    Processing {
        page: usize,
        total_pages: usize,
        summary: String,
    },
    /// Every page was refined. `page == total_pages`.
    Complete {
        total_pages: usize,
        saved_file: Option<PathBuf>,
    },
    /// The run failed; nothing follows.
    Error { message: String },
}

/// JSON body of a `summary` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryPayload {
    pub page: usize,
    pub total_pages: usize,
    pub summary: String,
    pub status: EventStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_file: Option<String>,
}

/// JSON body of an `error` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub error: String,
    pub status: EventStatus,
}

impl ProgressEvent {
    pub fn error(err: &DocveilError) -> Self {
        ProgressEvent::Error {
            message: err.to_string(),
        }
    }

    pub fn status(&self) -> EventStatus {
        match self {
            ProgressEvent::Processing { .. } => EventStatus::Processing,
            ProgressEvent::Complete { .. } => EventStatus::Complete,
            ProgressEvent::Error { .. } => EventStatus::Error,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ProgressEvent::Processing { .. })
    }

    /// SSE event name: `summary` for progress and completion, `error` otherwise.
    pub fn event_name(&self) -> &'static str {
        match self {
            ProgressEvent::Error { .. } => "error",
            _ => "summary",
        }
    }

    /// The JSON object carried by this event.
    pub fn payload(&self) -> serde_json::Value {
        let value = match self {
            ProgressEvent::Processing {
                page,
                total_pages,
                summary,
            } => serde_json::to_value(SummaryPayload {
                page: *page,
                total_pages: *total_pages,
                summary: summary.clone(),
                status: EventStatus::Processing,
                saved_file: None,
            }),
            ProgressEvent::Complete {
                total_pages,
                saved_file,
            } => serde_json::to_value(SummaryPayload {
                page: *total_pages,
                total_pages: *total_pages,
                summary: String::new(),
                status: EventStatus::Complete,
                saved_file: saved_file.as_ref().map(|p| p.display().to_string()),
            }),
            ProgressEvent::Error { message } => serde_json::to_value(ErrorPayload {
                error: message.clone(),
                status: EventStatus::Error,
            }),
        };
        // Both payloads are plain structs of strings and integers.
        value.unwrap_or(serde_json::Value::Null)
    }

    /// [`Self::payload`] as a compact JSON string.
    pub fn to_json(&self) -> String {
        self.payload().to_string()
    }
}

enum StreamState {
    Running(Box<Pipeline>),
    Closed,
}

/// Turn a pipeline into its event stream.
///
/// Deltas that do not add a refined page (extraction, fan-out) produce no
/// event. When the config names an `output_dir`, the report is written
/// before the `complete` event and its path is carried in `saved_file`.
pub fn pipeline_stream(pipeline: Pipeline) -> ProgressStream {
    let s = stream::unfold(
        StreamState::Running(Box::new(pipeline)),
        |state| async move {
            let mut pipeline = match state {
                StreamState::Running(p) => p,
                StreamState::Closed => return None,
            };

            loop {
                match pipeline.advance().await {
                    Ok(Some(StateDelta::Refined(refined))) => {
                        let event = ProgressEvent::Processing {
                            page: pipeline.refined_summaries().len(),
                            total_pages: pipeline.state().total_pages,
                            summary: refined.text,
                        };
                        return Some((event, StreamState::Running(pipeline)));
                    }
                    Ok(Some(StateDelta::Finished { total_pages })) => {
                        let event = match save_report(&pipeline).await {
                            Ok(saved_file) => ProgressEvent::Complete {
                                total_pages,
                                saved_file,
                            },
                            Err(e) => {
                                warn!("Could not save summary report: {}", e);
                                ProgressEvent::error(&e)
                            }
                        };
                        return Some((event, StreamState::Closed));
                    }
                    Ok(Some(_)) => continue,
                    Ok(None) => return None,
                    Err(e) => return Some((ProgressEvent::error(&e), StreamState::Closed)),
                }
            }
        },
    );
    Box::pin(s)
}

async fn save_report(pipeline: &Pipeline) -> Result<Option<PathBuf>, DocveilError> {
    match pipeline.config().output_dir {
        Some(ref dir) => {
            let path = save_summaries_to_file(
                dir,
                &pipeline.document().stem(),
                pipeline.refined_summaries(),
            )
            .await?;
            Ok(Some(path))
        }
        None => Ok(None),
    }
}

/// A stream that reports `err` and ends.
pub fn error_stream(err: DocveilError) -> ProgressStream {
    Box::pin(stream::once(async move { ProgressEvent::error(&err) }))
}

/// Summarize an in-memory document, streaming progress.
///
/// Never fails up front: a service that cannot be resolved is reported as
/// the stream's single `error` event, like any other pipeline failure.
pub fn summarize_stream(document: Document, config: &SummaryConfig) -> ProgressStream {
    info!("Starting streaming summary: {}", document.name());
    let service = match resolve_service(config) {
        Ok(s) => s,
        Err(e) => return error_stream(e),
    };
    let pipeline = Pipeline::new(document, resolve_extractor(config), service, config.clone());
    pipeline_stream(pipeline)
}

/// Resolve a path, URL, or `.enc` upload and stream its summary.
pub async fn summarize_input_stream(input: &str, config: &SummaryConfig) -> ProgressStream {
    match resolve_input(input, config.download_timeout_secs, || {
        config.resolve_passphrase()
    })
    .await
    {
        Ok(document) => summarize_stream(document, config),
        Err(e) => error_stream(e),
    }
}

/// Drain a stream into a vector; handy for tests and non-interactive callers.
pub async fn collect_events(stream: ProgressStream) -> Vec<ProgressEvent> {
    stream.collect().await
}
