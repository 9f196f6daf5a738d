use log::warn;

use crate::config::VersionOverride;

pub const DEFAULT_VERSION_NAME: &str = "1.0.0";
pub const DEFAULT_VERSION_CODE: u32 = 1;

/// Identity of the running build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledVersion {
    pub version_name: String,
    pub version_code: u32,
}

impl Default for InstalledVersion {
    fn default() -> Self {
        Self {
            version_name: DEFAULT_VERSION_NAME.to_owned(),
            version_code: DEFAULT_VERSION_CODE,
        }
    }
}

/// Version code shipped with this package version. Release builds may
/// override it through `RAYBAN_VERSION_CODE` at compile time.
pub const BUILD_VERSION_CODE: &str = "16";

impl InstalledVersion {
    /// Read the build metadata baked in at compile time.
    pub fn detect() -> Self {
        Self::from_metadata(
            Some(env!("CARGO_PKG_VERSION")),
            Some(option_env!("RAYBAN_VERSION_CODE").unwrap_or(BUILD_VERSION_CODE)),
        )
    }

    /// Each unreadable field falls back to its default on its own.
    fn from_metadata(name: Option<&str>, code: Option<&str>) -> Self {
        let version_name = match name.map(str::trim).filter(|name| !name.is_empty()) {
            Some(name) => name.to_owned(),
            None => {
                warn!("version: version name unavailable, assuming {DEFAULT_VERSION_NAME}");
                DEFAULT_VERSION_NAME.to_owned()
            }
        };
        let version_code = match code
            .and_then(|code| code.trim().parse::<u32>().ok())
            .filter(|code| *code > 0)
        {
            Some(code) => code,
            None => {
                warn!("version: version code unavailable, assuming {DEFAULT_VERSION_CODE}");
                DEFAULT_VERSION_CODE
            }
        };
        Self {
            version_name,
            version_code,
        }
    }

    pub fn with_overrides(mut self, overrides: &VersionOverride) -> Self {
        if let Some(name) = &overrides.version_name {
            self.version_name = name.clone();
        }
        if let Some(code) = overrides.version_code {
            self.version_code = code;
        }
        self
    }
}
