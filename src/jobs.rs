//! Job registry: uploads, lifecycle status, cleanup.
//!
//! Every upload is encrypted before it touches disk and stored as
//! `{upload_dir}/{job_id}.pdf.enc`. The registry is a `RwLock`-guarded map;
//! pipeline runs never see it, they only receive the decrypted [`Document`].
//!
//! ```text
//! uploaded ──▶ processing ──▶ complete
//!                   └───────▶ error
//! ```

use crate::config::SummaryConfig;
use crate::crypto::{decrypt_file_to_memory, encrypt, write_envelope, Passphrase, ENCRYPTED_SUFFIX};
use crate::error::DocveilError;
use crate::pipeline::input::Document;
use crate::stream::{error_stream, summarize_stream, EventStatus, ProgressStream};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Lifecycle of one upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Uploaded,
    Processing,
    Complete,
    Error,
}

#[derive(Debug, Clone)]
struct JobRecord {
    filename: String,
    status: JobStatus,
    path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResponse {
    pub job_id: String,
    pub filename: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub job_id: String,
    pub status: JobStatus,
    pub filename: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupResponse {
    pub job_id: String,
    pub message: String,
}

/// Keyed store of uploaded documents.
pub struct JobRegistry {
    jobs: RwLock<HashMap<String, JobRecord>>,
    upload_dir: PathBuf,
    passphrase: Passphrase,
}

impl JobRegistry {
    pub fn new(upload_dir: impl Into<PathBuf>, passphrase: Passphrase) -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            upload_dir: upload_dir.into(),
            passphrase,
        }
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    /// Validate, encrypt and store an upload.
    ///
    /// Rejects names without a `.pdf` extension and bytes without the PDF
    /// magic, before anything is written.
    pub async fn upload(&self, filename: &str, bytes: Vec<u8>) -> Result<UploadResponse, DocveilError> {
        if !filename.to_ascii_lowercase().ends_with(".pdf") {
            return Err(DocveilError::InvalidInput {
                input: filename.to_string(),
                reason: "Only PDF files are supported".to_string(),
            });
        }
        let document = Document::from_pdf_bytes(filename, bytes)?;

        let job_id = Uuid::new_v4().to_string();
        let path = self
            .upload_dir
            .join(format!("{}.pdf{}", job_id, ENCRYPTED_SUFFIX));

        // PBKDF2 is CPU-bound.
        let passphrase = self.passphrase.clone();
        let envelope = tokio::task::spawn_blocking(move || encrypt(document.bytes(), &passphrase))
            .await
            .map_err(|e| DocveilError::Internal(format!("Encryption task panicked: {}", e)))??;
        write_envelope(&path, &envelope).await?;

        self.jobs.write().await.insert(
            job_id.clone(),
            JobRecord {
                filename: filename.to_string(),
                status: JobStatus::Uploaded,
                path,
            },
        );
        info!("Stored encrypted upload {} as job {}", filename, job_id);

        Ok(UploadResponse {
            job_id,
            filename: filename.to_string(),
            message: "File uploaded and encrypted successfully".to_string(),
        })
    }

    pub async fn status(&self, job_id: &str) -> Result<StatusResponse, DocveilError> {
        let jobs = self.jobs.read().await;
        let record = jobs.get(job_id).ok_or_else(|| not_found(job_id))?;
        Ok(StatusResponse {
            job_id: job_id.to_string(),
            status: record.status,
            filename: record.filename.clone(),
        })
    }

    pub async fn set_status(&self, job_id: &str, status: JobStatus) -> Result<(), DocveilError> {
        let mut jobs = self.jobs.write().await;
        let record = jobs.get_mut(job_id).ok_or_else(|| not_found(job_id))?;
        debug!("Job {}: {:?} -> {:?}", job_id, record.status, status);
        record.status = status;
        Ok(())
    }

    /// Decrypt a stored upload into memory.
    pub async fn load_document(&self, job_id: &str) -> Result<Document, DocveilError> {
        let (filename, path) = {
            let jobs = self.jobs.read().await;
            let record = jobs.get(job_id).ok_or_else(|| not_found(job_id))?;
            (record.filename.clone(), record.path.clone())
        };
        let bytes = decrypt_file_to_memory(&path, &self.passphrase).await?;
        Document::from_pdf_bytes(filename, bytes)
    }

    /// Start summarizing a stored upload and return its event stream.
    ///
    /// An unknown id fails here, synchronously. Everything after that,
    /// including a failed decrypt, is reported through the stream, and the
    /// job status follows the terminal event.
    pub async fn stream(
        self: &Arc<Self>,
        job_id: &str,
        config: &SummaryConfig,
    ) -> Result<ProgressStream, DocveilError> {
        self.set_status(job_id, JobStatus::Processing).await?;

        let events = match self.load_document(job_id).await {
            Ok(document) => summarize_stream(document, config),
            Err(e) => {
                warn!("Job {}: could not load upload: {}", job_id, e);
                error_stream(e)
            }
        };

        let registry = Arc::clone(self);
        let job_id = job_id.to_string();
        let tracked = events.then(move |event| {
            let registry = Arc::clone(&registry);
            let job_id = job_id.clone();
            async move {
                let status = match event.status() {
                    EventStatus::Processing => None,
                    EventStatus::Complete => Some(JobStatus::Complete),
                    EventStatus::Error => Some(JobStatus::Error),
                };
                if let Some(status) = status {
                    // The job may have been cleaned up mid-run.
                    let _ = registry.set_status(&job_id, status).await;
                }
                event
            }
        });
        Ok(Box::pin(tracked))
    }

    /// Delete the stored upload and forget the job.
    pub async fn cleanup(&self, job_id: &str) -> Result<CleanupResponse, DocveilError> {
        let record = self
            .jobs
            .write()
            .await
            .remove(job_id)
            .ok_or_else(|| not_found(job_id))?;

        match tokio::fs::remove_file(&record.path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(DocveilError::Internal(format!(
                    "Failed to delete {}: {}",
                    record.path.display(),
                    e
                )))
            }
        }
        info!("Cleaned up job {}", job_id);

        Ok(CleanupResponse {
            job_id: job_id.to_string(),
            message: "Cleanup successful".to_string(),
        })
    }
}

fn not_found(job_id: &str) -> DocveilError {
    DocveilError::NotFound(format!("job {}", job_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::decrypt;
    use crate::error::ServiceError;
    use crate::pipeline::extract::PageExtractor;
    use crate::service::SummaryService;
    use crate::stream::{collect_events, ProgressEvent};
    use async_trait::async_trait;

    const PDF: &[u8] = b"%PDF-1.4 fake body";

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

    struct TwoPages;

    impl PageExtractor for TwoPages {
        fn extract(&self, bytes: &[u8]) -> Result<Vec<String>, String> {
            assert!(bytes.starts_with(b"%PDF"));
            Ok(vec!["one".into(), "two".into()])
        }
    }

    fn registry(dir: &Path) -> Arc<JobRegistry> {
        Arc::new(JobRegistry::new(dir, Passphrase::new("test-key")))
    }

    fn config() -> SummaryConfig {
        SummaryConfig::builder()
            .service(Arc::new(Echo))
            .extractor(Arc::new(TwoPages))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn upload_stores_an_envelope() {
        let dir = tempfile::tempdir().unwrap();
        let reg = registry(dir.path());
        let resp = reg.upload("report.pdf", PDF.to_vec()).await.unwrap();
        assert_eq!(resp.filename, "report.pdf");

        let path = dir.path().join(format!("{}.pdf.enc", resp.job_id));
        let stored = std::fs::read(&path).unwrap();
        assert_ne!(stored, PDF);
        assert_eq!(decrypt(&stored, &Passphrase::new("test-key")).unwrap(), PDF);

        let status = reg.status(&resp.job_id).await.unwrap();
        assert_eq!(status.status, JobStatus::Uploaded);
    }

    #[tokio::test]
    async fn upload_rejects_wrong_extension_and_magic() {
        let dir = tempfile::tempdir().unwrap();
        let reg = registry(dir.path());
        let err = reg.upload("notes.txt", PDF.to_vec()).await.unwrap_err();
        assert!(matches!(err, DocveilError::InvalidInput { .. }));
        let err = reg.upload("fake.pdf", b"GIF89a".to_vec()).await.unwrap_err();
        assert!(matches!(err, DocveilError::NotAPdf { .. }));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn unknown_job_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let reg = registry(dir.path());
        assert!(matches!(
            reg.status("nope").await.unwrap_err(),
            DocveilError::NotFound(_)
        ));
        assert!(matches!(
            reg.stream("nope", &config()).await.err(),
            Some(DocveilError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn cleanup_is_not_found_the_second_time() {
        let dir = tempfile::tempdir().unwrap();
        let reg = registry(dir.path());
        let resp = reg.upload("a.pdf", PDF.to_vec()).await.unwrap();
        reg.cleanup(&resp.job_id).await.unwrap();
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
        assert!(matches!(
            reg.cleanup(&resp.job_id).await.unwrap_err(),
            DocveilError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn stream_tracks_status_to_complete() {
        let dir = tempfile::tempdir().unwrap();
        let reg = registry(dir.path());
        let resp = reg.upload("doc.pdf", PDF.to_vec()).await.unwrap();

        let events = collect_events(reg.stream(&resp.job_id, &config()).await.unwrap()).await;
        assert_eq!(events.len(), 3);
        assert_eq!(
            events[1],
            ProgressEvent::Processing {
                page: 2,
                total_pages: 2,
                summary: "two+".into()
            }
        );
        assert_eq!(
            reg.status(&resp.job_id).await.unwrap().status,
            JobStatus::Complete
        );
    }

    #[tokio::test]
    async fn wrong_passphrase_surfaces_as_error_event() {
        let dir = tempfile::tempdir().unwrap();
        let writer = registry(dir.path());
        let resp = writer.upload("doc.pdf", PDF.to_vec()).await.unwrap();

        // Same upload directory, different key.
        let reader = Arc::new(JobRegistry::new(dir.path(), Passphrase::new("other")));
        reader.jobs.write().await.insert(
            resp.job_id.clone(),
            writer.jobs.read().await[&resp.job_id].clone(),
        );

        let events = collect_events(reader.stream(&resp.job_id, &config()).await.unwrap()).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].status(), EventStatus::Error);
        assert_eq!(
            reader.status(&resp.job_id).await.unwrap().status,
            JobStatus::Error
        );
    }
}
