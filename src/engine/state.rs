use std::path::PathBuf;

use crate::updater::{InstalledVersion, ReleaseManifest};

// Where one update check currently stands. Transitions only move forward;
// failures fall back to Idle and wait for a new user action.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UpdateState {
    Idle,
    Checking,
    UpToDate,
    UpdateFound {
        manifest: ReleaseManifest,
    },
    Downloading {
        manifest: ReleaseManifest,
        percent: Option<u8>,
    },
    Ready {
        manifest: ReleaseManifest,
        artifact: PathBuf,
    },
    DownloadFailed {
        message: String,
    },
    /// Handed to the OS installer; nothing further happens in this pipeline.
    Installing {
        artifact: PathBuf,
    },
    Failed {
        message: String,
    },
}

impl UpdateState {
    pub fn status_line(&self, installed: &InstalledVersion) -> String {
        match self {
            UpdateState::Idle => "Idle".into(),
            UpdateState::Checking => "Checking for updates...".into(),
            UpdateState::UpToDate => format!(
                "You're up to date (version {}).",
                installed.version_name
            ),
            UpdateState::UpdateFound { manifest } => {
                let tag = if manifest.mandatory { " [required]" } else { "" };
                format!(
                    "Version {} is available (installed: {}){tag}.",
                    manifest.version_name, installed.version_name
                )
            }
            UpdateState::Downloading { manifest, percent } => match percent {
                Some(pct) => format!("Downloading {}... {pct}%", manifest.version_name),
                None => format!("Downloading {}...", manifest.version_name),
            },
            UpdateState::Ready { manifest, .. } => {
                format!("Version {} is ready to install.", manifest.version_name)
            }
            UpdateState::DownloadFailed { message } | UpdateState::Failed { message } => {
                message.clone()
            }
            UpdateState::Installing { .. } => "Opening the installer...".into(),
        }
    }
}

/// Immutable view handed to the presentation layer on every transition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpdateSnapshot {
    pub state: UpdateState,
    pub installed: InstalledVersion,
    pub status: String,
}

impl UpdateSnapshot {
    pub fn new(state: UpdateState, installed: &InstalledVersion) -> Self {
        let status = state.status_line(installed);
        Self {
            state,
            installed: installed.clone(),
            status,
        }
    }
}

// Actions triggered by the user from the presentation layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UserAction {
    CheckForUpdates,
    DownloadUpdate,
    ConfirmInstall,
    Dismiss,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest(mandatory: bool) -> ReleaseManifest {
        ReleaseManifest {
            version_code: 16,
            version_name: "2.2.0".into(),
            download_url: "https://x/app.apk".into(),
            changelog: "fix".into(),
            mandatory,
            sha256: None,
        }
    }

    #[test]
    fn status_lines_name_versions() {
        let installed = InstalledVersion {
            version_name: "2.1.0".into(),
            version_code: 15,
        };
        let found = UpdateState::UpdateFound {
            manifest: manifest(false),
        };
        assert_eq!(
            found.status_line(&installed),
            "Version 2.2.0 is available (installed: 2.1.0)."
        );
        let required = UpdateState::UpdateFound {
            manifest: manifest(true),
        };
        assert!(required.status_line(&installed).ends_with("[required]."));

        let downloading = UpdateState::Downloading {
            manifest: manifest(false),
            percent: Some(42),
        };
        assert_eq!(downloading.status_line(&installed), "Downloading 2.2.0... 42%");
    }

    #[test]
    fn snapshot_carries_status() {
        let installed = InstalledVersion::default();
        let snapshot = UpdateSnapshot::new(UpdateState::UpToDate, &installed);
        assert_eq!(snapshot.status, "You're up to date (version 1.0.0).");
        assert_eq!(snapshot.installed, installed);
    }
}
