//! Self-update pipeline: manifest fetch, version decision, artifact download
//! and installer handoff.

pub mod download;
pub mod install;
pub mod manifest;
pub mod version;

pub use download::ApkDownloader;
pub use install::{FileShare, InstallHandoff, SystemInstaller};
pub use manifest::{ManifestFetcher, ReleaseManifest};
pub use version::InstalledVersion;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateDecision {
    NoUpdateAvailable,
    UpdateAvailable(ReleaseManifest),
}

/// Decide whether `latest` should replace the build identified by `current`.
///
/// Only a strictly greater version code counts; an equal code means the build
/// is already current and never triggers a download.
pub fn decide(current: u32, latest: ReleaseManifest) -> UpdateDecision {
    if latest.version_code > current {
        UpdateDecision::UpdateAvailable(latest)
    } else {
        UpdateDecision::NoUpdateAvailable
    }
}
