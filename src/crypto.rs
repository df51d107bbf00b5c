//! Encryption at rest for uploaded documents.
//!
//! An encrypted document is stored as a single contiguous byte stream:
//!
//! ```text
//! ┌──────────────┬──────────────┬─────────────────────────────────┐
//! │ salt (16 B)  │ nonce (12 B) │ AES-256-GCM ciphertext ‖ tag    │
//! └──────────────┴──────────────┴─────────────────────────────────┘
//! ```
//!
//! Nothing is length-prefixed: the ciphertext is everything after the fixed
//! 28-byte header. The key is derived from the passphrase and the per-file
//! salt with PBKDF2-HMAC-SHA256. Salt and nonce are drawn fresh for every
//! call to [`encrypt`], so encrypting the same bytes twice under the same
//! passphrase never produces the same envelope.

use crate::error::DocveilError;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use rand::RngCore;
use sha2::Sha256;
use std::fmt;
use std::path::Path;
use tracing::{debug, info};

/// Salt length in bytes.
pub const SALT_SIZE: usize = 16;
/// AES-GCM nonce length in bytes (96 bits).
pub const NONCE_SIZE: usize = 12;
/// Derived key length in bytes (256 bits).
pub const KEY_SIZE: usize = 32;
/// AES-GCM authentication tag length in bytes.
pub const TAG_SIZE: usize = 16;
/// Fixed envelope header length (`salt ‖ nonce`).
pub const HEADER_SIZE: usize = SALT_SIZE + NONCE_SIZE;
/// PBKDF2 iteration count. Changing it makes existing envelopes unreadable.
pub const PBKDF2_ITERATIONS: u32 = 100_000;

/// Environment variable holding the passphrase.
pub const PASSPHRASE_ENV: &str = "ENCRYPTION_PASSPHRASE";

/// File suffix marking an encrypted document.
pub const ENCRYPTED_SUFFIX: &str = ".enc";

/// Secret used to derive per-envelope keys.
///
/// `Debug` never prints the secret.
#[derive(Clone)]
pub struct Passphrase(Vec<u8>);

impl Passphrase {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self(secret.into())
    }

    /// Read the passphrase from `ENCRYPTION_PASSPHRASE`.
    ///
    /// Missing or empty is a [`DocveilError::Configuration`]; callers must
    /// resolve the passphrase before touching any file.
    pub fn from_env() -> Result<Self, DocveilError> {
        match std::env::var(PASSPHRASE_ENV) {
            Ok(value) if !value.is_empty() => Ok(Self(value.into_bytes())),
            _ => Err(DocveilError::Configuration(format!(
                "{PASSPHRASE_ENV} not found in environment variables. \
                 Set it in your shell or in a .env file."
            ))),
        }
    }

    fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Passphrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Passphrase(<redacted>)")
    }
}

fn derive_key(passphrase: &Passphrase, salt: &[u8]) -> [u8; KEY_SIZE] {
    let mut key = [0u8; KEY_SIZE];
    pbkdf2::pbkdf2_hmac::<Sha256>(passphrase.as_bytes(), salt, PBKDF2_ITERATIONS, &mut key);
    key
}

fn cipher_for(passphrase: &Passphrase, salt: &[u8]) -> Result<Aes256Gcm, DocveilError> {
    let key = derive_key(passphrase, salt);
    Aes256Gcm::new_from_slice(&key)
        .map_err(|e| DocveilError::Internal(format!("AES key setup: {e}")))
}

/// Encrypt `plaintext` into a `salt ‖ nonce ‖ ciphertext` envelope.
pub fn encrypt(plaintext: &[u8], passphrase: &Passphrase) -> Result<Vec<u8>, DocveilError> {
    let mut rng = rand::rng();
    let mut salt = [0u8; SALT_SIZE];
    let mut nonce = [0u8; NONCE_SIZE];
    rng.fill_bytes(&mut salt);
    rng.fill_bytes(&mut nonce);

    let cipher = cipher_for(passphrase, &salt)?;
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|e| DocveilError::Internal(format!("AES-GCM encrypt: {e}")))?;

    let mut envelope = Vec::with_capacity(HEADER_SIZE + ciphertext.len());
    envelope.extend_from_slice(&salt);
    envelope.extend_from_slice(&nonce);
    envelope.extend_from_slice(&ciphertext);
    debug!(
        "Encrypted {} bytes → {} byte envelope",
        plaintext.len(),
        envelope.len()
    );
    Ok(envelope)
}

/// Authenticate and decrypt an envelope produced by [`encrypt`].
///
/// Any failure (wrong passphrase, tampering, truncation) is reported as
/// [`DocveilError::Authentication`].
pub fn decrypt(envelope: &[u8], passphrase: &Passphrase) -> Result<Vec<u8>, DocveilError> {
    if envelope.len() < HEADER_SIZE + TAG_SIZE {
        return Err(DocveilError::Authentication(format!(
            "envelope is {} bytes, shorter than header and tag ({} bytes)",
            envelope.len(),
            HEADER_SIZE + TAG_SIZE
        )));
    }

    let (salt, rest) = envelope.split_at(SALT_SIZE);
    let (nonce, ciphertext) = rest.split_at(NONCE_SIZE);

    let cipher = cipher_for(passphrase, salt)?;
    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| DocveilError::Authentication("tag verification failed".into()))
}

/// `true` when the path carries the encrypted-document suffix.
pub fn is_encrypted_file(path: impl AsRef<Path>) -> bool {
    path.as_ref()
        .to_string_lossy()
        .ends_with(ENCRYPTED_SUFFIX)
}

/// Encrypt the file at `input` and write the envelope to `output`.
pub async fn encrypt_file(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    passphrase: &Passphrase,
) -> Result<(), DocveilError> {
    let input = input.as_ref();
    let output = output.as_ref();
    let plaintext = tokio::fs::read(input)
        .await
        .map_err(|e| read_error(input, e))?;
    let passphrase = passphrase.clone();
    let envelope = tokio::task::spawn_blocking(move || encrypt(&plaintext, &passphrase))
        .await
        .map_err(|e| DocveilError::Internal(format!("Encryption task panicked: {e}")))??;
    write_envelope(output, &envelope).await?;
    info!("Encrypted: {} -> {}", input.display(), output.display());
    Ok(())
}

/// Decrypt an envelope file into memory. The plaintext never touches disk.
///
/// Key derivation and decryption run on the blocking pool.
pub async fn decrypt_file_to_memory(
    path: impl AsRef<Path>,
    passphrase: &Passphrase,
) -> Result<Vec<u8>, DocveilError> {
    let path = path.as_ref();
    let envelope = tokio::fs::read(path)
        .await
        .map_err(|e| read_error(path, e))?;
    // Key derivation is CPU-bound; keep it off the async workers.
    let passphrase = passphrase.clone();
    let plaintext = tokio::task::spawn_blocking(move || decrypt(&envelope, &passphrase))
        .await
        .map_err(|e| DocveilError::Internal(format!("Decryption task panicked: {e}")))??;
    debug!("Decrypted to memory: {}", path.display());
    Ok(plaintext)
}

/// Write an envelope as one contiguous file.
pub async fn write_envelope(path: &Path, envelope: &[u8]) -> Result<(), DocveilError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| DocveilError::OutputWriteFailed {
                    path: path.to_path_buf(),
                    source: e,
                })?;
        }
    }
    tokio::fs::write(path, envelope)
        .await
        .map_err(|e| DocveilError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })
}

fn read_error(path: &Path, e: std::io::Error) -> DocveilError {
    if e.kind() == std::io::ErrorKind::NotFound {
        DocveilError::NotFound(path.display().to_string())
    } else {
        DocveilError::ReadFailed {
            path: path.to_path_buf(),
            source: e,
        }
    }
}
