use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use log::{debug, info, warn};
use sha2::{Digest, Sha256};
use tokio::fs::{self, File};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::error::DownloadError;
use crate::networking::NetworkClient;
use crate::util::{format_size, progress_percent};

/// Byte accounting for one in-flight download.
#[derive(Debug)]
struct DownloadTask {
    total_bytes_expected: Option<u64>,
    bytes_transferred: u64,
    destination: PathBuf,
}

impl DownloadTask {
    fn new(total_bytes_expected: Option<u64>, destination: &Path) -> Self {
        Self {
            total_bytes_expected: total_bytes_expected.filter(|len| *len > 0),
            bytes_transferred: 0,
            destination: destination.to_owned(),
        }
    }

    /// Account for a written chunk and return the new percentage, if known.
    fn record_chunk(&mut self, len: usize) -> Option<u8> {
        self.bytes_transferred += len as u64;
        progress_percent(self.bytes_transferred, self.total_bytes_expected)
    }

    fn io_error(&self, source: std::io::Error) -> DownloadError {
        DownloadError::Io {
            path: self.destination.clone(),
            source,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ApkDownloader {
    network: NetworkClient,
}

impl ApkDownloader {
    pub fn new(network: NetworkClient) -> Self {
        Self { network }
    }

    /// Stream `url` into `destination`, calling `on_progress` with the whole
    /// percentage after every chunk when the content length is known.
    ///
    /// On failure the destination is left in an undefined state and must not
    /// be reused without downloading again.
    pub async fn download<F>(
        &self,
        url: &str,
        destination: &Path,
        mut on_progress: F,
    ) -> Result<PathBuf, DownloadError>
    where
        F: FnMut(u8),
    {
        let response = self.network.http().get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            warn!("download: {url} returned {status}");
            return Err(DownloadError::Http(status.as_u16()));
        }
        if response.content_length() == Some(0) {
            return Err(DownloadError::NoBody);
        }

        let mut task = DownloadTask::new(response.content_length(), destination);
        if let Some(parent) = destination.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .await
                .map_err(|source| task.io_error(source))?;
        }
        let mut file = File::create(destination)
            .await
            .map_err(|source| task.io_error(source))?;

        debug!(
            "download: {url} -> {} (expected {:?} bytes)",
            destination.display(),
            task.total_bytes_expected
        );

        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk)
                .await
                .map_err(|source| task.io_error(source))?;
            if let Some(percent) = task.record_chunk(chunk.len()) {
                on_progress(percent);
            }
        }

        file.flush().await.map_err(|source| task.io_error(source))?;

        if task.bytes_transferred == 0 {
            return Err(DownloadError::NoBody);
        }
        if let Some(expected) = task.total_bytes_expected
            && task.bytes_transferred < expected
        {
            return Err(DownloadError::Incomplete {
                received: task.bytes_transferred,
                expected,
            });
        }

        info!(
            "download: saved {} to {}",
            format_size(task.bytes_transferred),
            destination.display()
        );
        Ok(task.destination)
    }
}

/// Check that the file at `path` hashes to the hex digest `expected`.
pub async fn verify_sha256(path: &Path, expected: &str) -> Result<(), DownloadError> {
    let io_error = |source| DownloadError::Io {
        path: path.to_owned(),
        source,
    };
    let mut file = File::open(path).await.map_err(io_error)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let read = file.read(&mut buf).await.map_err(io_error)?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }
    let actual = format!("{:x}", hasher.finalize());
    if actual != expected.trim().to_lowercase() {
        return Err(DownloadError::Checksum {
            expected: expected.to_owned(),
            actual,
        });
    }
    debug!("download: checksum verified for {}", path.display());
    Ok(())
}
