//! Assistant configuration, read from `config.toml` in the app directory.

use std::path::{Path, PathBuf};
use std::time::Duration;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::env;
use crate::error::ConfigError;

pub const DEFAULT_MANIFEST_URL: &str =
    "https://raw.githubusercontent.com/ichaiwizm/meta-rayban-assistant/master/version.json";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub update: UpdateConfig,
    pub network: NetworkConfig,
    pub install: InstallConfig,
    /// Overrides for the installed version when the build metadata is wrong.
    pub version: VersionOverride,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateConfig {
    pub manifest_url: String,
    /// Where artifacts are written (defaults to the shared updates dir).
    pub download_dir: Option<PathBuf>,
    pub artifact_name: String,
    /// Verify the artifact against the manifest's `sha256` when present.
    pub verify_checksum: bool,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            manifest_url: DEFAULT_MANIFEST_URL.to_owned(),
            download_dir: None,
            artifact_name: "update.apk".to_owned(),
            verify_checksum: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 10,
            read_timeout_secs: 10,
        }
    }
}

impl NetworkConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InstallConfig {
    /// Content-URI authority of the file share.
    pub authority: String,
    /// First path segment of shared URIs.
    pub share_name: String,
    /// Skip the confirmation prompt before handing off to the installer.
    pub auto_confirm: bool,
}

impl Default for InstallConfig {
    fn default() -> Self {
        Self {
            authority: "com.ichaiwizm.metaraybanassistant.fileprovider".to_owned(),
            share_name: "updates".to_owned(),
            auto_confirm: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VersionOverride {
    pub version_name: Option<String>,
    pub version_code: Option<u32>,
}

impl AppConfig {
    /// Load the config at `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!("config: {} not found, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_owned(),
                    source,
                });
            }
        };
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_owned(),
            source,
        })
    }

    /// Directory the installer share is rooted at.
    pub fn download_dir(&self) -> PathBuf {
        self.update
            .download_dir
            .clone()
            .unwrap_or_else(env::updates_dir)
    }

    pub fn artifact_path(&self) -> PathBuf {
        self.download_dir().join(&self.update.artifact_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.update.manifest_url, DEFAULT_MANIFEST_URL);
        assert_eq!(config.network.connect_timeout(), Duration::from_secs(10));
        assert_eq!(config.network.read_timeout(), Duration::from_secs(10));
        assert!(config.update.verify_checksum);
        assert!(!config.install.auto_confirm);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[update]
manifest_url = "https://example.com/version.json"
download_dir = "/tmp/rayban"

[version]
version_code = 15
"#,
        )
        .unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.update.manifest_url, "https://example.com/version.json");
        assert_eq!(config.artifact_path(), PathBuf::from("/tmp/rayban/update.apk"));
        assert_eq!(config.version.version_code, Some(15));
        assert_eq!(config.version.version_name, None);
        assert_eq!(config.network.read_timeout_secs, 10);
    }

    #[test]
    fn invalid_toml_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[update\nmanifest_url = 3").unwrap();
        let err = AppConfig::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
