//! File attachment pipeline: client-side size gating and the multipart
//! upload with host fallback. The upload response is not awaited for message
//! insertion; the optimistic attachment stands in until reconciliation.

use std::fmt;

use aula_shared::constants::MAX_UPLOAD_BYTES;
use aula_shared::validation::oversize_message;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::config::Config;

/// A file the user picked, held in memory until sent.
#[derive(Debug, Clone)]
pub struct PendingFile {
    pub name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl PendingFile {
    pub fn new(name: impl Into<String>, mime: impl Into<String>, bytes: Vec<u8>) -> PendingFile {
        PendingFile {
            name: name.into(),
            mime: mime.into(),
            bytes,
        }
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }
}

/// Result of the pre-network size gate. Oversized files never reach the
/// wire; they are dropped from the batch and reported by name.
#[derive(Debug)]
pub struct BatchCheck {
    pub accepted: Vec<PendingFile>,
    pub rejected: Vec<String>,
    pub message: Option<String>,
}

pub fn check_batch(files: Vec<PendingFile>) -> BatchCheck {
    let mut accepted = Vec::new();
    let mut rejected = Vec::new();
    for file in files {
        if file.size() > MAX_UPLOAD_BYTES {
            rejected.push(file.name);
        } else {
            accepted.push(file);
        }
    }
    let message = if rejected.is_empty() {
        None
    } else {
        Some(oversize_message(&rejected))
    };
    BatchCheck {
        accepted,
        rejected,
        message,
    }
}

#[derive(Debug)]
pub enum UploadError {
    Http(reqwest::Error),
    Status(u16),
}

impl fmt::Display for UploadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadError::Http(e) => write!(f, "upload request failed: {}", e),
            UploadError::Status(code) => write!(f, "upload rejected with status {}", code),
        }
    }
}

impl std::error::Error for UploadError {}

impl From<reqwest::Error> for UploadError {
    fn from(e: reqwest::Error) -> UploadError {
        UploadError::Http(e)
    }
}

pub struct Uploader {
    http: reqwest::Client,
    primary: String,
    fallback: Option<String>,
}

impl Uploader {
    pub fn new(config: &Config) -> Uploader {
        Uploader {
            http: reqwest::Client::new(),
            primary: config.upload_url.clone(),
            fallback: config.upload_fallback_url.clone(),
        }
    }

    /// Upload one file, trying the fallback host if the primary refuses.
    pub async fn upload(
        &self,
        chat_id: &str,
        token: &str,
        file: &PendingFile,
    ) -> Result<(), UploadError> {
        match self.upload_to(&self.primary, chat_id, token, file).await {
            Ok(()) => Ok(()),
            Err(primary_err) => {
                let Some(fallback) = self.fallback.as_deref() else {
                    return Err(primary_err);
                };
                tracing::warn!(
                    "primary upload host failed for {}: {}; trying fallback",
                    file.name,
                    primary_err
                );
                self.upload_to(fallback, chat_id, token, file).await
            }
        }
    }

    async fn upload_to(
        &self,
        base: &str,
        chat_id: &str,
        token: &str,
        file: &PendingFile,
    ) -> Result<(), UploadError> {
        let url = format!("{}/{}", base.trim_end_matches('/'), chat_id);
        let part = reqwest::multipart::Part::bytes(file.bytes.clone())
            .file_name(file.name.clone())
            .mime_str(&file.mime)
            .unwrap_or_else(|_| {
                reqwest::multipart::Part::bytes(file.bytes.clone()).file_name(file.name.clone())
            });
        let form = reqwest::multipart::Form::new().part("file", part);

        let resp = self
            .http
            .post(&url)
            .bearer_auth(token)
            .multipart(form)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(UploadError::Status(resp.status().as_u16()));
        }
        Ok(())
    }

    /// Upload a batch with per-file isolation: one failure never aborts the
    /// others. Returns each file's outcome by name.
    pub async fn upload_batch(
        &self,
        chat_id: &str,
        token: &str,
        files: &[PendingFile],
    ) -> Vec<(String, Result<(), UploadError>)> {
        let mut results = Vec::with_capacity(files.len());
        for file in files {
            let outcome = self.upload(chat_id, token, file).await;
            if let Err(ref e) = outcome {
                tracing::error!("upload failed for {}: {}", file.name, e);
            }
            results.push((file.name.clone(), outcome));
        }
        results
    }
}
