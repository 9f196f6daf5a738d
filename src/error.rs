//! Error types for the update pipeline and the device link.
//!
//! Each component has its own enum so callers can match on the failure;
//! [`UpdateError`] unifies them at the engine boundary, where every error is
//! turned into a user-facing status line.

use std::path::PathBuf;

/// Failure while retrieving or validating the release manifest.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Connect/read timeout, DNS or TLS failure.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("manifest request returned HTTP {0}")]
    Http(u16),

    #[error("manifest response has an empty body")]
    EmptyBody,

    #[error("manifest parse error: {0}")]
    Parse(String),

    /// The manifest parsed but its contents are unusable.
    #[error("invalid manifest: {0}")]
    InvalidManifest(String),

    #[error("invalid manifest URL: {0}")]
    InvalidUrl(String),
}

/// Failure while streaming the artifact to disk.
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("download returned HTTP {0}")]
    Http(u16),

    #[error("download response carries no data")]
    NoBody,

    #[error("download incomplete: received {received} of {expected} bytes")]
    Incomplete { received: u64, expected: u64 },

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("checksum mismatch: expected {expected}, got {actual}")]
    Checksum { expected: String, actual: String },
}

/// Failure while handing the artifact to the OS installer.
#[derive(Debug, thiserror::Error)]
pub enum InstallError {
    #[error("artifact not found at {}", .0.display())]
    Missing(PathBuf),

    /// The artifact lives outside the shared directory.
    #[error("{} is outside the shared update directory", .0.display())]
    NotShareable(PathBuf),

    #[error("no installer could be launched: {0}")]
    Launch(String),
}

/// Failure reported by a [`crate::device::DeviceLink`] backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LinkError {
    #[error("app is not registered with the companion service")]
    NotRegistered,

    #[error("device {0} not found")]
    DeviceNotFound(String),

    #[error("device link error: {0}")]
    Backend(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unable to read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config parse error in {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Any failure the update pipeline can surface.
#[derive(Debug, thiserror::Error)]
pub enum UpdateError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Download(#[from] DownloadError),

    #[error(transparent)]
    Install(#[from] InstallError),
}

impl UpdateError {
    /// Status line shown to the user. None of these are fatal; the user can
    /// always start a fresh check.
    pub fn user_message(&self) -> String {
        match self {
            UpdateError::Fetch(FetchError::Network(_)) => {
                "Couldn't check for updates. Check your connection.".into()
            }
            UpdateError::Fetch(FetchError::Http(status)) => {
                format!("Couldn't check for updates (HTTP {status}).")
            }
            UpdateError::Fetch(
                FetchError::EmptyBody | FetchError::Parse(_) | FetchError::InvalidManifest(_),
            ) => "Malformed update data. Try again later.".into(),
            UpdateError::Fetch(FetchError::InvalidUrl(_)) => {
                "Update source is misconfigured.".into()
            }
            UpdateError::Download(DownloadError::Http(status)) => {
                format!("Couldn't download the update (HTTP {status}).")
            }
            UpdateError::Download(DownloadError::Checksum { .. }) => {
                "Downloaded update is corrupted.".into()
            }
            UpdateError::Download(_) => "Couldn't download the update.".into(),
            UpdateError::Install(_) => "Couldn't start install.".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_errors_keep_the_status_code() {
        let err = UpdateError::from(FetchError::Http(404));
        assert_eq!(err.to_string(), "manifest request returned HTTP 404");
        assert!(err.user_message().contains("404"));

        let err = UpdateError::from(DownloadError::Http(503));
        assert!(err.user_message().contains("503"));
    }

    #[test]
    fn malformed_manifest_errors_share_one_message() {
        let messages: Vec<String> = [
            FetchError::EmptyBody,
            FetchError::Parse("expected value".into()),
            FetchError::InvalidManifest("versionCode must be positive".into()),
        ]
        .into_iter()
        .map(|err| UpdateError::from(err).user_message())
        .collect();
        assert!(messages.iter().all(|m| m.starts_with("Malformed update data")));
    }

    #[test]
    fn install_errors_map_to_install_message() {
        let err = UpdateError::from(InstallError::Launch("no handler".into()));
        assert_eq!(err.user_message(), "Couldn't start install.");
    }
}
