//! Remote binaries fetched into scoped temporary files.

use crate::types::ObjectId;
use reqwest::blocking::Client;
use std::io::Write;
use std::path::PathBuf;
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, warn};

/// Why a single fetch attempt failed.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("server answered with status {0}")]
    Status(u16),

    #[error("local I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FetchError {
    /// Only transport-level failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FetchError::Transport(_))
    }
}

/// Something that can stream a URI into a writer.
pub trait BinarySource {
    fn fetch_to(&self, uri: &str, sink: &mut dyn Write) -> Result<u64, FetchError>;
}

impl BinarySource for Client {
    fn fetch_to(&self, uri: &str, sink: &mut dyn Write) -> Result<u64, FetchError> {
        let mut response = self
            .get(uri)
            .send()
            .map_err(|err| FetchError::Transport(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        std::io::copy(&mut response, sink).map_err(|err| FetchError::Transport(err.to_string()))
    }
}

impl<S: BinarySource + ?Sized> BinarySource for Box<S> {
    fn fetch_to(&self, uri: &str, sink: &mut dyn Write) -> Result<u64, FetchError> {
        (**self).fetch_to(uri, sink)
    }
}

/// A download that failed every allowed attempt.
#[derive(Debug, Error)]
#[error("download of {uri} failed after {attempts} attempt(s): {cause}")]
pub struct DownloadFailure {
    pub uri: String,
    pub attempts: u32,
    #[source]
    pub cause: FetchError,
}

/// Fetches attachments with bounded retry.
pub struct FileDownloader {
    source: Box<dyn BinarySource>,
    temp_dir: PathBuf,
    prefix: String,
    max_attempts: u32,
}

impl FileDownloader {
    pub fn new(source: impl BinarySource + 'static, temp_dir: impl Into<PathBuf>) -> Self {
        Self {
            source: Box::new(source),
            temp_dir: temp_dir.into(),
            prefix: "diigo-".to_string(),
            max_attempts: 3,
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Fetch `uri` into `{temp_dir}/{prefix}{id}-XXXX`.
    ///
    /// The file is removed when the returned handle is dropped.
    pub fn download(&self, uri: &str, id: ObjectId) -> Result<NamedTempFile, DownloadFailure> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.attempt(uri, id) {
                Ok(file) => {
                    debug!(uri, attempt, path = %file.path().display(), "downloaded attachment");
                    return Ok(file);
                }
                Err(cause) if cause.is_retryable() && attempt < self.max_attempts => {
                    warn!(uri, attempt, error = %cause, "download attempt failed, retrying");
                }
                Err(cause) => {
                    warn!(uri, attempt, error = %cause, "download failed");
                    return Err(DownloadFailure {
                        uri: uri.to_string(),
                        attempts: attempt,
                        cause,
                    });
                }
            }
        }
    }

    fn attempt(&self, uri: &str, id: ObjectId) -> Result<NamedTempFile, FetchError> {
        let mut file = tempfile::Builder::new()
            .prefix(&format!("{}{}-", self.prefix, id))
            .tempfile_in(&self.temp_dir)?;
        self.source.fetch_to(uri, file.as_file_mut())?;
        file.as_file_mut().flush()?;
        Ok(file)
    }
}

/// Reports the HTTP status of a link.
pub trait LinkProbe {
    /// `None` when the link could not be reached at all.
    fn status(&self, url: &str) -> Option<u16>;
}

impl LinkProbe for Client {
    fn status(&self, url: &str) -> Option<u16> {
        match self.head(url).send() {
            Ok(response) => Some(response.status().as_u16()),
            Err(err) => {
                debug!(url, error = %err, "link probe failed");
                None
            }
        }
    }
}
