use std::path::PathBuf;

use log::{debug, error, info, warn};
use tokio::sync::mpsc;

use crate::config::AppConfig;
use crate::engine::state::{UpdateSnapshot, UpdateState, UserAction};
use crate::error::{DownloadError, UpdateError};
use crate::networking::NetworkClient;
use crate::updater::download::verify_sha256;
use crate::updater::{
    self, ApkDownloader, InstallHandoff, InstalledVersion, ManifestFetcher, ReleaseManifest,
    UpdateDecision,
};

pub mod state;

/// Runs the check, download and install steps for user actions and publishes
/// every transition as an [`UpdateSnapshot`].
pub struct UpdateEngine {
    pub state: UpdateState,
    installed: InstalledVersion,
    manifest_url: String,
    artifact_path: PathBuf,
    verify_checksum: bool,
    fetcher: ManifestFetcher,
    downloader: ApkDownloader,
    handoff: InstallHandoff,
}

impl UpdateEngine {
    pub fn new(config: &AppConfig, installed: InstalledVersion, handoff: InstallHandoff) -> Self {
        let network = NetworkClient::from_config(&config.network);
        Self {
            state: UpdateState::Idle,
            installed,
            manifest_url: config.update.manifest_url.clone(),
            artifact_path: config.artifact_path(),
            verify_checksum: config.update.verify_checksum,
            fetcher: ManifestFetcher::new(network.clone()),
            downloader: ApkDownloader::new(network),
            handoff,
        }
    }

    /// Consume actions until the sender side is dropped.
    pub async fn run(
        mut self,
        mut actions: mpsc::UnboundedReceiver<UserAction>,
        updates: mpsc::UnboundedSender<UpdateSnapshot>,
    ) {
        while let Some(action) = actions.recv().await {
            self.handle_action(action, &updates).await;
        }
        debug!("engine: action channel closed");
    }

    pub async fn handle_action(
        &mut self,
        action: UserAction,
        updates: &mpsc::UnboundedSender<UpdateSnapshot>,
    ) {
        match action {
            UserAction::CheckForUpdates => match &self.state {
                UpdateState::Installing { .. } => {
                    warn!("action: CheckForUpdates ignored, installer already launched");
                }
                _ => {
                    info!("action: CheckForUpdates");
                    self.check(updates).await;
                }
            },
            UserAction::DownloadUpdate => match self.state.clone() {
                UpdateState::UpdateFound { manifest } => {
                    info!("action: DownloadUpdate for {}", manifest.version_name);
                    self.download(manifest, updates).await;
                }
                other => warn!("action: DownloadUpdate ignored in state {other:?}"),
            },
            UserAction::ConfirmInstall => match self.state.clone() {
                UpdateState::Ready { artifact, .. } => {
                    info!("action: ConfirmInstall");
                    self.install(artifact, updates);
                }
                other => warn!("action: ConfirmInstall ignored in state {other:?}"),
            },
            UserAction::Dismiss => match &self.state {
                UpdateState::Idle | UpdateState::Installing { .. } => {}
                _ => {
                    info!("action: Dismiss");
                    self.publish(UpdateState::Idle, updates);
                }
            },
        }
    }

    async fn check(&mut self, updates: &mpsc::UnboundedSender<UpdateSnapshot>) {
        self.publish(UpdateState::Checking, updates);
        let fetched = self.fetcher.fetch(&self.manifest_url).await;
        match fetched {
            Ok(latest) => match updater::decide(self.installed.version_code, latest) {
                UpdateDecision::UpdateAvailable(manifest) => {
                    info!(
                        "check: {} (code {}) is newer than installed code {}",
                        manifest.version_name, manifest.version_code, self.installed.version_code
                    );
                    self.publish(UpdateState::UpdateFound { manifest }, updates);
                }
                UpdateDecision::NoUpdateAvailable => {
                    info!("check: installed code {} is current", self.installed.version_code);
                    self.publish(UpdateState::UpToDate, updates);
                }
            },
            Err(err) => {
                let err = UpdateError::from(err);
                error!("check failed: {err}");
                let message = err.user_message();
                self.fail(UpdateState::Failed { message }, updates);
            }
        }
    }

    async fn download(
        &mut self,
        manifest: ReleaseManifest,
        updates: &mpsc::UnboundedSender<UpdateSnapshot>,
    ) {
        self.publish(
            UpdateState::Downloading {
                manifest: manifest.clone(),
                percent: None,
            },
            updates,
        );

        let installed = self.installed.clone();
        let mut last_percent = None;
        let result = self
            .downloader
            .download(&manifest.download_url, &self.artifact_path, |pct| {
                if last_percent == Some(pct) {
                    return;
                }
                last_percent = Some(pct);
                let state = UpdateState::Downloading {
                    manifest: manifest.clone(),
                    percent: Some(pct),
                };
                updates.send(UpdateSnapshot::new(state, &installed)).ok();
            })
            .await;

        let result = match result {
            Ok(artifact) => self.verify(&manifest, artifact).await,
            Err(err) => Err(err),
        };

        match result {
            Ok(artifact) => {
                info!("download: {} ready at {}", manifest.version_name, artifact.display());
                self.publish(UpdateState::Ready { manifest, artifact }, updates);
            }
            Err(err) => {
                let err = UpdateError::from(err);
                error!("download failed: {err}");
                let message = err.user_message();
                self.fail(UpdateState::DownloadFailed { message }, updates);
            }
        }
    }

    async fn verify(
        &self,
        manifest: &ReleaseManifest,
        artifact: PathBuf,
    ) -> Result<PathBuf, DownloadError> {
        if self.verify_checksum
            && let Some(expected) = manifest.expected_checksum()
        {
            verify_sha256(&artifact, expected).await?;
        }
        Ok(artifact)
    }

    fn install(&mut self, artifact: PathBuf, updates: &mpsc::UnboundedSender<UpdateSnapshot>) {
        self.publish(
            UpdateState::Installing {
                artifact: artifact.clone(),
            },
            updates,
        );
        if let Err(err) = self.handoff.install(&artifact) {
            let err = UpdateError::from(err);
            error!("install failed: {err}");
            let message = err.user_message();
            self.fail(UpdateState::Failed { message }, updates);
        }
    }

    /// Report a failure, then return to Idle for the next user action.
    fn fail(&mut self, state: UpdateState, updates: &mpsc::UnboundedSender<UpdateSnapshot>) {
        self.publish(state, updates);
        self.publish(UpdateState::Idle, updates);
    }

    fn publish(&mut self, state: UpdateState, updates: &mpsc::UnboundedSender<UpdateSnapshot>) {
        self.state = state.clone();
        updates.send(UpdateSnapshot::new(state, &self.installed)).ok();
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::error::InstallError;
    use crate::updater::FileShare;
    use crate::updater::install::{InstallRequest, Installer};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Clone, Default)]
    struct RecordingInstaller {
        requests: Arc<Mutex<Vec<InstallRequest>>>,
    }

    impl Installer for RecordingInstaller {
        fn launch(&self, request: &InstallRequest) -> Result<(), InstallError> {
            self.requests.lock().unwrap().push(request.clone());
            Ok(())
        }
    }

    async fn serve_release(sha256: Option<&str>) -> MockServer {
        let server = MockServer::start().await;
        let mut manifest = serde_json::json!({
            "versionCode": 16,
            "versionName": "2.2.0",
            "downloadUrl": format!("{}/app.apk", server.uri()),
            "changelog": "fix",
        });
        if let Some(sha256) = sha256 {
            manifest["sha256"] = sha256.into();
        }
        Mock::given(method("GET"))
            .and(path("/version.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(manifest))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/app.apk"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"hello".to_vec()))
            .mount(&server)
            .await;
        server
    }

    fn engine(
        server: &MockServer,
        download_dir: &Path,
        installed_code: u32,
    ) -> (UpdateEngine, RecordingInstaller) {
        let mut config = AppConfig::default();
        config.update.manifest_url = format!("{}/version.json", server.uri());
        config.update.download_dir = Some(download_dir.to_owned());
        let installer = RecordingInstaller::default();
        let handoff = InstallHandoff::new(
            FileShare::from_config(&config.install, download_dir),
            Box::new(installer.clone()),
        );
        let installed = InstalledVersion {
            version_name: "2.1.0".into(),
            version_code: installed_code,
        };
        (UpdateEngine::new(&config, installed, handoff), installer)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<UpdateSnapshot>) -> Vec<UpdateState> {
        let mut states = Vec::new();
        while let Ok(snapshot) = rx.try_recv() {
            states.push(snapshot.state);
        }
        states
    }

    #[tokio::test]
    async fn full_update_flow_hands_off_to_installer() {
        let server = serve_release(None).await;
        let dir = tempfile::tempdir().unwrap();
        let (mut engine, installer) = engine(&server, dir.path(), 15);
        let (tx, mut rx) = mpsc::unbounded_channel();

        engine.handle_action(UserAction::CheckForUpdates, &tx).await;
        let states = drain(&mut rx);
        assert_eq!(states[0], UpdateState::Checking);
        assert!(matches!(
            &states[1],
            UpdateState::UpdateFound { manifest } if manifest.version_code == 16
        ));

        engine.handle_action(UserAction::DownloadUpdate, &tx).await;
        let states = drain(&mut rx);
        assert!(matches!(
            states.first(),
            Some(UpdateState::Downloading { percent: None, .. })
        ));
        let percents: Vec<u8> = states
            .iter()
            .filter_map(|state| match state {
                UpdateState::Downloading { percent, .. } => *percent,
                _ => None,
            })
            .collect();
        assert_eq!(percents.last(), Some(&100));
        let artifact = dir.path().join("update.apk");
        assert!(matches!(
            states.last(),
            Some(UpdateState::Ready { artifact: saved, .. }) if *saved == artifact
        ));
        assert_eq!(std::fs::read(&artifact).unwrap(), b"hello");

        engine.handle_action(UserAction::ConfirmInstall, &tx).await;
        assert_eq!(
            drain(&mut rx),
            vec![UpdateState::Installing {
                artifact: artifact.clone()
            }]
        );
        assert_eq!(installer.requests.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn equal_version_is_up_to_date() {
        let server = serve_release(None).await;
        let dir = tempfile::tempdir().unwrap();
        let (mut engine, _) = engine(&server, dir.path(), 16);
        let (tx, mut rx) = mpsc::unbounded_channel();

        engine.handle_action(UserAction::CheckForUpdates, &tx).await;
        assert_eq!(
            drain(&mut rx),
            vec![UpdateState::Checking, UpdateState::UpToDate]
        );

        engine.handle_action(UserAction::DownloadUpdate, &tx).await;
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn missing_manifest_returns_to_idle_with_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        let dir = tempfile::tempdir().unwrap();
        let (mut engine, _) = engine(&server, dir.path(), 15);
        let (tx, mut rx) = mpsc::unbounded_channel();

        engine.handle_action(UserAction::CheckForUpdates, &tx).await;
        let snapshots: Vec<UpdateSnapshot> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
        assert_eq!(snapshots.len(), 3);
        assert!(matches!(snapshots[1].state, UpdateState::Failed { .. }));
        assert!(snapshots[1].status.contains("404"));
        assert_eq!(snapshots[2].state, UpdateState::Idle);
        assert_eq!(engine.state, UpdateState::Idle);
    }

    #[tokio::test]
    async fn checksum_mismatch_fails_download() {
        let server = serve_release(Some("deadbeef")).await;
        let dir = tempfile::tempdir().unwrap();
        let (mut engine, installer) = engine(&server, dir.path(), 15);
        let (tx, mut rx) = mpsc::unbounded_channel();

        engine.handle_action(UserAction::CheckForUpdates, &tx).await;
        engine.handle_action(UserAction::DownloadUpdate, &tx).await;
        let states = drain(&mut rx);
        let failed = states
            .iter()
            .find(|state| matches!(state, UpdateState::DownloadFailed { .. }));
        assert_eq!(
            failed,
            Some(&UpdateState::DownloadFailed {
                message: "Downloaded update is corrupted.".into()
            })
        );
        assert_eq!(states.last(), Some(&UpdateState::Idle));

        engine.handle_action(UserAction::ConfirmInstall, &tx).await;
        assert!(installer.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn matching_checksum_is_accepted() {
        let digest = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";
        let server = serve_release(Some(digest)).await;
        let dir = tempfile::tempdir().unwrap();
        let (mut engine, _) = engine(&server, dir.path(), 15);
        let (tx, mut rx) = mpsc::unbounded_channel();

        engine.handle_action(UserAction::CheckForUpdates, &tx).await;
        engine.handle_action(UserAction::DownloadUpdate, &tx).await;
        assert!(matches!(
            drain(&mut rx).last(),
            Some(UpdateState::Ready { .. })
        ));
    }

    #[tokio::test]
    async fn run_stops_when_actions_close() {
        let server = serve_release(None).await;
        let dir = tempfile::tempdir().unwrap();
        let (engine, _) = engine(&server, dir.path(), 16);
        let (action_tx, action_rx) = mpsc::unbounded_channel();
        let (tx, mut rx) = mpsc::unbounded_channel();

        action_tx.send(UserAction::CheckForUpdates).unwrap();
        drop(action_tx);
        engine.run(action_rx, tx).await;

        let states = drain(&mut rx);
        assert_eq!(states, vec![UpdateState::Checking, UpdateState::UpToDate]);
        assert!(rx.recv().await.is_none());
    }
}
