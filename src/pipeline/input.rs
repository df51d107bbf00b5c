//! Input resolution: turn a path, URL, or upload into an in-memory [`Document`].
//!
//! Everything downstream works on bytes, never on paths, so an encrypted
//! upload is decrypted straight into memory and the plaintext never touches
//! disk. We validate the PDF magic bytes (`%PDF`) before returning so callers
//! get a meaningful error rather than a parser failure three stages later.

use crate::crypto::{decrypt_file_to_memory, is_encrypted_file, Passphrase, ENCRYPTED_SUFFIX};
use crate::error::DocveilError;
use std::path::Path;
use tracing::{debug, info};

/// PDF magic bytes.
const PDF_MAGIC: &[u8; 4] = b"%PDF";

/// Raw document bytes plus a display name. Immutable once loaded.
#[derive(Clone)]
pub struct Document {
    name: String,
    bytes: Vec<u8>,
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("name", &self.name)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

impl Document {
    /// Wrap PDF bytes, rejecting anything without the `%PDF` header.
    pub fn from_pdf_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Result<Self, DocveilError> {
        let name = name.into();
        if !bytes.starts_with(PDF_MAGIC) {
            return Err(DocveilError::NotAPdf {
                name,
                magic: bytes.iter().take(4).copied().collect(),
            });
        }
        Ok(Self { name, bytes })
    }

    /// Wrap bytes without validation. Used with custom page extractors that
    /// accept formats other than PDF.
    pub fn from_raw(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    /// Display name, e.g. the uploaded filename.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name without directory, `.enc` and extension: `"reports/q3.pdf.enc"` → `"q3"`.
    pub fn stem(&self) -> String {
        let base = self.name.strip_suffix(ENCRYPTED_SUFFIX).unwrap_or(&self.name);
        Path::new(base)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "document".to_string())
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to an in-memory document.
///
/// * URL → downloaded with the given timeout.
/// * `*.enc` path → decrypted with `passphrase` (resolved before any read).
/// * any other path → read as-is.
pub async fn resolve_input(
    input: &str,
    timeout_secs: u64,
    passphrase: impl FnOnce() -> Result<Passphrase, DocveilError>,
) -> Result<Document, DocveilError> {
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else if is_encrypted_file(input) {
        let passphrase = passphrase()?;
        let bytes = decrypt_file_to_memory(input, &passphrase).await?;
        info!("Loaded encrypted document {} (in-memory)", input);
        Document::from_pdf_bytes(input, bytes)
    } else {
        resolve_local(input).await
    }
}

/// Read a local file, validating existence and PDF magic bytes.
async fn resolve_local(path_str: &str) -> Result<Document, DocveilError> {
    let path = Path::new(path_str);
    let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => DocveilError::NotFound(path.display().to_string()),
        _ => DocveilError::ReadFailed {
            path: path.to_path_buf(),
            source: e,
        },
    })?;
    debug!("Resolved local PDF: {} ({} bytes)", path.display(), bytes.len());
    Document::from_pdf_bytes(path_str, bytes)
}

/// Download a URL into memory.
async fn download_url(url: &str, timeout_secs: u64) -> Result<Document, DocveilError> {
    info!("Downloading PDF from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| DocveilError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            DocveilError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            DocveilError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(DocveilError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| DocveilError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    info!("Downloaded {} bytes", bytes.len());
    Document::from_pdf_bytes(filename_from_url(url), bytes.to_vec())
}

/// Last path segment of a URL when it looks like a filename.
fn filename_from_url(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }
    "downloaded.pdf".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::encrypt;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/doc.pdf"));
        assert!(is_url("http://example.com/doc.pdf"));
        assert!(!is_url("/tmp/doc.pdf"));
        assert!(!is_url("doc.pdf"));
        assert!(!is_url(""));
    }

    #[test]
    fn rejects_non_pdf_bytes() {
        let err = Document::from_pdf_bytes("notes.txt", b"hello".to_vec()).unwrap_err();
        match err {
            DocveilError::NotAPdf { magic, .. } => assert_eq!(magic, b"hell"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn stem_strips_enc_and_extension() {
        let doc = Document::from_raw("uploads/report.pdf.enc", vec![]);
        assert_eq!(doc.stem(), "report");
        assert_eq!(Document::from_raw("", vec![]).stem(), "document");
    }

    #[test]
    fn filename_from_url_uses_last_segment() {
        assert_eq!(filename_from_url("https://x.org/a/b/paper.pdf"), "paper.pdf");
        assert_eq!(filename_from_url("https://x.org/a/b/"), "downloaded.pdf");
    }

    #[tokio::test]
    async fn local_missing_is_not_found() {
        let err = resolve_input("/definitely/not/a/real/file.pdf", 5, || {
            Ok(Passphrase::new("unused"))
        })
        .await
        .unwrap_err();
        assert!(matches!(err, DocveilError::NotFound(_)));
    }

    #[tokio::test]
    async fn encrypted_input_is_decrypted_in_memory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.pdf.enc");
        let key = Passphrase::new("k");
        let envelope = encrypt(b"%PDF-1.4 data", &key).unwrap();
        std::fs::write(&path, envelope).unwrap();

        let doc = resolve_input(path.to_str().unwrap(), 5, || Ok(key.clone()))
            .await
            .unwrap();
        assert_eq!(doc.bytes(), b"%PDF-1.4 data");
        assert_eq!(doc.stem(), "doc");
    }

    #[tokio::test]
    async fn missing_passphrase_fails_before_reading() {
        // The path does not exist: a configuration error proves the
        // passphrase was resolved before any file I/O.
        let err = resolve_input("/nope/missing.pdf.enc", 5, || {
            Err(DocveilError::Configuration("no passphrase".into()))
        })
        .await
        .unwrap_err();
        assert!(matches!(err, DocveilError::Configuration(_)));
    }
}
