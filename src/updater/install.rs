//! Handoff of a downloaded artifact to the OS package installer.
//!
//! The artifact is exposed through a [`FileShare`] as a scoped `content://`
//! URI with a temporary read grant, and the installer UI takes over from
//! there. Nothing reports back whether the installation itself succeeded.

use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use reqwest::Url;

use crate::config::InstallConfig;
use crate::error::InstallError;

pub const APK_MIME_TYPE: &str = "application/vnd.android.package-archive";

/// Maps files under a shared root to content URIs.
#[derive(Clone, Debug)]
pub struct FileShare {
    authority: String,
    share_name: String,
    root: PathBuf,
}

impl FileShare {
    pub fn new(
        authority: impl Into<String>,
        share_name: impl Into<String>,
        root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            authority: authority.into(),
            share_name: share_name.into(),
            root: root.into(),
        }
    }

    pub fn from_config(config: &InstallConfig, root: impl Into<PathBuf>) -> Self {
        Self::new(&config.authority, &config.share_name, root)
    }

    /// Resolve `content://<authority>/<share>/<relative path>` for `artifact`.
    pub fn uri_for(&self, artifact: &Path) -> Result<Url, InstallError> {
        let artifact = artifact
            .canonicalize()
            .map_err(|_| InstallError::Missing(artifact.to_owned()))?;
        let root = self
            .root
            .canonicalize()
            .map_err(|_| InstallError::NotShareable(artifact.clone()))?;
        let relative = artifact
            .strip_prefix(&root)
            .map_err(|_| InstallError::NotShareable(artifact.clone()))?;

        let mut segments = Vec::new();
        for component in relative.components() {
            let segment = component
                .as_os_str()
                .to_str()
                .ok_or_else(|| InstallError::NotShareable(artifact.clone()))?;
            segments.push(segment);
        }
        if segments.is_empty() {
            return Err(InstallError::NotShareable(artifact.clone()));
        }

        let mut uri = Url::parse(&format!("content://{}/", self.authority))
            .map_err(|err| InstallError::Launch(format!("bad share authority: {err}")))?;
        uri.path_segments_mut()
            .map_err(|_| InstallError::Launch("share authority cannot carry a path".into()))?
            .clear()
            .push(&self.share_name)
            .extend(segments);
        Ok(uri)
    }
}

/// What the installer is asked to open.
///
/// A package installer must open `uri`. `local_path` is carried only for
/// [`SystemInstaller`]: desktop handlers cannot resolve `content://` URIs, so
/// on those platforms the raw path reaches the handler and the share's read
/// scoping does not apply.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InstallRequest {
    pub uri: Url,
    /// Fallback for handlers without content URI support.
    pub local_path: PathBuf,
    pub mime_type: &'static str,
    /// Temporary read permission on `uri` for the installer.
    pub grant_read: bool,
    /// Start the installer in its own task, outside our UI.
    pub new_task: bool,
}

/// Something that can launch an installer UI for a request.
pub trait Installer: Send + Sync {
    fn launch(&self, request: &InstallRequest) -> Result<(), InstallError>;
}

/// Opens the artifact with the platform's registered handler, by local path.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemInstaller;

impl Installer for SystemInstaller {
    fn launch(&self, request: &InstallRequest) -> Result<(), InstallError> {
        // Desktop handlers take the local path; the content URI is only
        // meaningful to a package installer that honours the share.
        debug!(
            "install: opening {} ({}, grant_read={}, new_task={})",
            request.uri, request.mime_type, request.grant_read, request.new_task
        );
        open::that_detached(&request.local_path).map_err(|err| {
            warn!("install: no handler for {}: {err}", request.local_path.display());
            InstallError::Launch(err.to_string())
        })
    }
}

pub struct InstallHandoff {
    share: FileShare,
    installer: Box<dyn Installer>,
}

impl InstallHandoff {
    pub fn new(share: FileShare, installer: Box<dyn Installer>) -> Self {
        Self { share, installer }
    }

    /// Hand `artifact` to the installer. Returns once the installer UI has
    /// been launched.
    pub fn install(&self, artifact: &Path) -> Result<(), InstallError> {
        let uri = self.share.uri_for(artifact)?;
        let request = InstallRequest {
            uri,
            local_path: artifact.to_owned(),
            mime_type: APK_MIME_TYPE,
            grant_read: true,
            new_task: true,
        };
        self.installer.launch(&request)?;
        info!("install: handed {} to the installer", request.uri);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    #[derive(Clone, Default)]
    struct RecordingInstaller {
        requests: Arc<Mutex<Vec<InstallRequest>>>,
        fail: bool,
    }

    impl Installer for RecordingInstaller {
        fn launch(&self, request: &InstallRequest) -> Result<(), InstallError> {
            if self.fail {
                return Err(InstallError::Launch("no activity found".into()));
            }
            self.requests.lock().unwrap().push(request.clone());
            Ok(())
        }
    }

    fn share(root: &Path) -> FileShare {
        FileShare::new("com.example.app.fileprovider", "updates", root)
    }

    #[test]
    fn resolves_content_uri_under_root() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join("update 2.2.apk");
        std::fs::write(&artifact, b"apk").unwrap();

        let uri = share(dir.path()).uri_for(&artifact).unwrap();
        assert_eq!(uri.scheme(), "content");
        assert_eq!(uri.host_str(), Some("com.example.app.fileprovider"));
        assert_eq!(uri.path(), "/updates/update%202.2.apk");
    }

    #[test]
    fn refuses_files_outside_root() {
        let shared = tempfile::tempdir().unwrap();
        let elsewhere = tempfile::tempdir().unwrap();
        let artifact = elsewhere.path().join("update.apk");
        std::fs::write(&artifact, b"apk").unwrap();

        let err = share(shared.path()).uri_for(&artifact).unwrap_err();
        assert!(matches!(err, InstallError::NotShareable(_)));
    }

    #[test]
    fn missing_artifact_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = share(dir.path())
            .uri_for(&dir.path().join("gone.apk"))
            .unwrap_err();
        assert!(matches!(err, InstallError::Missing(_)));
    }

    #[test]
    fn handoff_grants_read_on_package_archive() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join("update.apk");
        std::fs::write(&artifact, b"apk").unwrap();

        let installer = RecordingInstaller::default();
        let handoff = InstallHandoff::new(share(dir.path()), Box::new(installer.clone()));
        handoff.install(&artifact).unwrap();

        let requests = installer.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].mime_type, APK_MIME_TYPE);
        assert!(requests[0].grant_read);
        assert!(requests[0].new_task);
        assert_eq!(requests[0].uri.path(), "/updates/update.apk");
        assert_eq!(
            requests[0].uri.as_str(),
            "content://com.example.app.fileprovider/updates/update.apk"
        );
        assert_eq!(requests[0].local_path, artifact);
    }

    #[test]
    fn launch_failure_is_surfaced() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join("update.apk");
        std::fs::write(&artifact, b"apk").unwrap();

        let installer = RecordingInstaller {
            fail: true,
            ..Default::default()
        };
        let handoff = InstallHandoff::new(share(dir.path()), Box::new(installer));
        let err = handoff.install(&artifact).unwrap_err();
        assert!(matches!(err, InstallError::Launch(_)));
    }
}
