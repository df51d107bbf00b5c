//! Fan-out: one concurrent summary call per page, results in page order.
//!
//! Each call owns its page and handles, so the stage future stays `Send`
//! and can be driven from a boxed event stream. `buffer_unordered(width)`
//! keeps up to `width` calls in flight and yields them as they finish; each
//! result lands in the slot of its page, so slot `i` always belongs to page
//! `i`. The first error to complete ends the stage: returning early drops
//! the stream, which cancels every call still in flight.

use crate::error::DocveilError;
use crate::output::RawSummary;
use crate::pipeline::extract::Page;
use crate::progress::ProgressCallback;
use crate::service::SummaryService;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{debug, info};

/// Summarize every page with at most `width` calls in flight.
///
/// Fails with [`DocveilError::Summarization`] naming the first page whose
/// call failed; no partial result is returned.
pub async fn summarize_pages(
    service: &Arc<dyn SummaryService>,
    pages: &[Page],
    width: usize,
    callback: Option<&ProgressCallback>,
) -> Result<Vec<RawSummary>, DocveilError> {
    let total = pages.len();
    let width = width.max(1);
    info!("Summarizing {} pages ({} in flight)", total, width.min(total.max(1)));

    let calls: Vec<_> = pages
        .iter()
        .cloned()
        .enumerate()
        .map(|(slot, page)| {
            let service = Arc::clone(service);
            let callback = callback.cloned();
            async move {
                let text = service
                    .summarize(&page.text)
                    .await
                    .map_err(|e| DocveilError::Summarization {
                        page: page.index,
                        detail: e.to_string(),
                    })?;
                debug!("Page {} summarized ({} chars)", page.index + 1, text.len());
                if let Some(cb) = callback {
                    cb.on_page_summarized(page.index + 1, total);
                }
                Ok::<_, DocveilError>((
                    slot,
                    RawSummary {
                        page_index: page.index,
                        text,
                    },
                ))
            }
        })
        .collect();

    let mut slots: Vec<Option<RawSummary>> = (0..total).map(|_| None).collect();
    let mut results = stream::iter(calls).buffer_unordered(width);
    while let Some(result) = results.next().await {
        let (slot, raw) = result?;
        slots[slot] = Some(raw);
    }

    Ok(slots.into_iter().flatten().collect())
}
