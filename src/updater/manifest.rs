use log::{debug, info, warn};
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::error::FetchError;
use crate::networking::{NetworkClient, cache_busted, no_cache_headers};

/// Remote descriptor of the latest published release.
///
/// Missing `versionCode` or `downloadUrl` deserialize to their zero values so
/// that [`ReleaseManifest::validate`] reports them as an invalid manifest
/// instead of a parse error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseManifest {
    #[serde(default)]
    pub version_code: u32,
    #[serde(default)]
    pub version_name: String,
    #[serde(default)]
    pub download_url: String,
    #[serde(default)]
    pub changelog: String,
    #[serde(default)]
    pub mandatory: bool,
    /// Hex SHA-256 of the artifact, when the publisher provides one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

impl ReleaseManifest {
    pub fn validate(&self) -> Result<(), FetchError> {
        if self.version_code == 0 {
            return Err(FetchError::InvalidManifest(
                "versionCode must be positive".into(),
            ));
        }
        if self.download_url.trim().is_empty() {
            return Err(FetchError::InvalidManifest("downloadUrl is blank".into()));
        }
        Ok(())
    }

    pub fn expected_checksum(&self) -> Option<&str> {
        self.sha256
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }
}

/// Parse and validate a manifest body.
pub fn parse_manifest(body: &[u8]) -> Result<ReleaseManifest, FetchError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(FetchError::EmptyBody);
    }
    let manifest: ReleaseManifest =
        serde_json::from_slice(body).map_err(|err| FetchError::Parse(err.to_string()))?;
    manifest.validate()?;
    Ok(manifest)
}

#[derive(Clone, Debug)]
pub struct ManifestFetcher {
    network: NetworkClient,
}

impl ManifestFetcher {
    pub fn new(network: NetworkClient) -> Self {
        Self { network }
    }

    /// Fetch the manifest at `manifest_url`, bypassing every cache between
    /// here and the origin.
    pub async fn fetch(&self, manifest_url: &str) -> Result<ReleaseManifest, FetchError> {
        let base = Url::parse(manifest_url)
            .map_err(|err| FetchError::InvalidUrl(format!("{manifest_url}: {err}")))?;
        let url = cache_busted(&base);
        debug!("manifest: GET {url}");

        let response = self
            .network
            .http()
            .get(url)
            .headers(no_cache_headers())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!("manifest: {manifest_url} returned {status}");
            return Err(FetchError::Http(status.as_u16()));
        }

        let body = response.bytes().await?;
        let manifest = parse_manifest(&body)?;
        info!(
            "manifest: latest release {} (code {})",
            manifest.version_name, manifest.version_code
        );
        Ok(manifest)
    }
}
