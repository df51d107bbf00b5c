//! Page extraction: document bytes → ordered page texts.
//!
//! ## Why spawn_blocking?
//!
//! Parsing a PDF and decoding its content streams is CPU-bound and can take
//! hundreds of milliseconds on large documents. Running it on Tokio's
//! blocking pool keeps the async workers free for the network-bound stages.

use crate::error::DocveilError;
use crate::pipeline::input::Document;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// One page of text. `index` is 0-based and fixed by extraction order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub index: usize,
    pub text: String,
}

/// Turns document bytes into page texts, in reading order.
///
/// Implementations are synchronous; [`extract_pages`] moves the call onto
/// the blocking pool. An `Err` fails the whole run: there is no partial
/// extraction.
pub trait PageExtractor: Send + Sync {
    fn extract(&self, bytes: &[u8]) -> Result<Vec<String>, String>;
}

/// Default extractor: text layer of a PDF via `lopdf`.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfTextExtractor;

impl PageExtractor for PdfTextExtractor {
    fn extract(&self, bytes: &[u8]) -> Result<Vec<String>, String> {
        let doc = lopdf::Document::load_mem(bytes).map_err(|e| format!("Failed to parse PDF: {e}"))?;

        // get_pages() is keyed by 1-based page number in document order.
        let pages = doc.get_pages();
        info!("PDF loaded: {} pages", pages.len());

        let mut texts = Vec::with_capacity(pages.len());
        for page_num in pages.keys() {
            // A page without a decodable text layer (scans, vector art) has
            // no text; that is content, not a broken document.
            let text = doc.extract_text(&[*page_num]).unwrap_or_else(|e| {
                warn!("Page {}: no extractable text ({})", page_num, e);
                String::new()
            });
            debug!("Page {}: {} chars", page_num, text.len());
            texts.push(text);
        }
        Ok(texts)
    }
}

/// Run `extractor` over the document on the blocking pool.
pub async fn extract_pages(
    extractor: Arc<dyn PageExtractor>,
    document: &Document,
) -> Result<Vec<Page>, DocveilError> {
    let name = document.name().to_string();
    let bytes = document.bytes().to_vec();

    let texts = tokio::task::spawn_blocking(move || extractor.extract(&bytes))
        .await
        .map_err(|e| DocveilError::Internal(format!("Extraction task panicked: {}", e)))?
        .map_err(|detail| DocveilError::Extraction {
            name: name.clone(),
            detail,
        })?;

    Ok(texts
        .into_iter()
        .enumerate()
        .map(|(index, text)| Page { index, text })
        .collect())
}
