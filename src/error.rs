//! Error types for the docveil library.
//!
//! Two error types reflect two layers:
//!
//! * [`DocveilError`] — **Fatal** for the operation that returned it: a
//!   pipeline run, an encrypt/decrypt call, or a job-registry lookup. Every
//!   pipeline stage error ends the run; there is no partial summary.
//!
//! * [`ServiceError`] — returned by a [`crate::service::SummaryService`]
//!   for a single external call. Pipeline stages wrap it in
//!   [`DocveilError::Summarization`] or [`DocveilError::Refinement`] together
//!   with the page index that failed.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the docveil library.
#[derive(Debug, Error)]
pub enum DocveilError {
    // ── Configuration errors ──────────────────────────────────────────────
    /// A required setting is missing or invalid (e.g. no passphrase).
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── Envelope errors ───────────────────────────────────────────────────
    /// The envelope failed authentication: wrong passphrase, tampered or
    /// truncated bytes. The data is unrecoverable under this passphrase.
    #[error("Authentication failed for encrypted document: {0}\nCheck ENCRYPTION_PASSPHRASE matches the one used at upload.")]
    Authentication(String),

    // ── Input errors ──────────────────────────────────────────────────────
    /// A file, job, or upload does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The input string or upload is not acceptable.
    #[error("Invalid input '{input}': {reason}")]
    InvalidInput { input: String, reason: String },

    /// The bytes were read, but they are not a PDF.
    #[error("Document '{name}' is not a valid PDF\nFirst bytes: {magic:?}")]
    NotAPdf { name: String, magic: Vec<u8> },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    // ── Pipeline errors ───────────────────────────────────────────────────
    /// The document could not be parsed into pages.
    #[error("Failed to extract pages from '{name}': {detail}")]
    Extraction { name: String, detail: String },

    /// A page summary call failed; the whole fan-out stage is abandoned.
    /// `page` is the 0-based index; the message shows the 1-based number.
    #[error("Summarization failed for page {}: {detail}", .page + 1)]
    Summarization { page: usize, detail: String },

    /// A refinement call failed; no later page is refined.
    #[error("Refinement failed for page {}: {detail}", .page + 1)]
    Refinement { page: usize, detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not read a file.
    #[error("Failed to read '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not create or write an output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DocveilError {
    /// Status keyword used by boundary layers (`"not_found"`, `"invalid"`, ...).
    pub fn kind(&self) -> &'static str {
        match self {
            DocveilError::Configuration(_) | DocveilError::ProviderNotConfigured { .. } => {
                "configuration"
            }
            DocveilError::Authentication(_) => "authentication",
            DocveilError::NotFound(_) => "not_found",
            DocveilError::InvalidInput { .. } | DocveilError::NotAPdf { .. } => "invalid",
            DocveilError::DownloadFailed { .. } | DocveilError::DownloadTimeout { .. } => {
                "download"
            }
            DocveilError::Extraction { .. } => "extraction",
            DocveilError::Summarization { .. } => "summarization",
            DocveilError::Refinement { .. } => "refinement",
            DocveilError::ReadFailed { .. }
            | DocveilError::OutputWriteFailed { .. }
            | DocveilError::Internal(_) => "internal",
        }
    }
}

/// A failed call to the external text-generation service.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum ServiceError {
    /// The provider returned an error after all retries.
    #[error("service call failed after {retries} retries: {detail}")]
    Failed { retries: u32, detail: String },

    /// A single attempt exceeded the per-call timeout.
    #[error("service call timed out after {secs}s")]
    Timeout { secs: u64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summarization_display_names_page() {
        let e = DocveilError::Summarization {
            page: 4,
            detail: "boom".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("page 5"), "got: {msg}");
        assert!(msg.contains("boom"));
        assert_eq!(e.kind(), "summarization");
    }

    #[test]
    fn refinement_display_is_one_based() {
        let e = DocveilError::Refinement {
            page: 0,
            detail: "x".into(),
        };
        assert!(e.to_string().starts_with("Refinement failed for page 1:"));
    }

    #[test]
    fn authentication_display_hints_passphrase() {
        let e = DocveilError::Authentication("tag mismatch".into());
        assert!(e.to_string().contains("ENCRYPTION_PASSPHRASE"));
        assert_eq!(e.kind(), "authentication");
    }

    #[test]
    fn not_found_kind() {
        let e = DocveilError::NotFound("job 42".into());
        assert_eq!(e.kind(), "not_found");
        assert!(e.to_string().contains("job 42"));
    }

    #[test]
    fn service_error_display() {
        let e = ServiceError::Failed {
            retries: 2,
            detail: "503".into(),
        };
        assert!(e.to_string().contains("2 retries"));
        let t = ServiceError::Timeout { secs: 30 };
        assert!(t.to_string().contains("30s"));
    }
}
