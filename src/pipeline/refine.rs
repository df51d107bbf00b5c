//! One step of the refinement chain.

use crate::error::DocveilError;
use crate::output::{RawSummary, RefinedSummary};
use crate::service::SummaryService;
use tracing::debug;

/// Refine `raw` against the previous refined summary.
///
/// The first page has nothing to continue from and is copied verbatim
/// without calling the service. Callers must await each step before starting
/// the next: step `i` consumes the output of step `i - 1`.
pub async fn refine_step(
    service: &dyn SummaryService,
    raw: &RawSummary,
    previous: Option<&RefinedSummary>,
) -> Result<RefinedSummary, DocveilError> {
    let text = match previous {
        None => raw.text.clone(),
        Some(prev) => service
            .refine(&prev.text, &raw.text)
            .await
            .map_err(|e| DocveilError::Refinement {
                page: raw.page_index,
                detail: e.to_string(),
            })?,
    };
    debug!("Page {} refined ({} chars)", raw.page_index + 1, text.len());
    Ok(RefinedSummary {
        page_index: raw.page_index,
        text,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingRefiner {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SummaryService for CountingRefiner {
        async fn summarize(&self, text: &str) -> Result<String, ServiceError> {
            Ok(text.to_string())
        }

        async fn refine(&self, previous: &str, current: &str) -> Result<String, ServiceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("{previous}>{current}"))
        }
    }

    struct Broken;

    #[async_trait]
    impl SummaryService for Broken {
        async fn summarize(&self, text: &str) -> Result<String, ServiceError> {
            Ok(text.to_string())
        }

        async fn refine(&self, _previous: &str, _current: &str) -> Result<String, ServiceError> {
            Err(ServiceError::Timeout { secs: 3 })
        }
    }

    fn raw(page_index: usize, text: &str) -> RawSummary {
        RawSummary {
            page_index,
            text: text.into(),
        }
    }

    #[tokio::test]
    async fn first_page_is_verbatim_without_a_call() {
        let service = CountingRefiner::default();
        let out = refine_step(&service, &raw(0, "A"), None).await.unwrap();
        assert_eq!(out.text, "A");
        assert_eq!(out.page_index, 0);
        assert_eq!(service.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn later_pages_see_previous_refined_text() {
        let service = CountingRefiner::default();
        let first = refine_step(&service, &raw(0, "A"), None).await.unwrap();
        let second = refine_step(&service, &raw(1, "B"), Some(&first))
            .await
            .unwrap();
        assert_eq!(second.text, "A>B");
        assert_eq!(service.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failure_names_the_page() {
        let prev = RefinedSummary {
            page_index: 0,
            text: "A".into(),
        };
        let err = refine_step(&Broken, &raw(1, "B"), Some(&prev))
            .await
            .unwrap_err();
        assert!(matches!(err, DocveilError::Refinement { page: 1, .. }));
    }
}
