use std::env;
use std::fs;
use std::path::PathBuf;

/// Returns the root directory used by the assistant for config and downloads.
pub fn default_app_dir() -> PathBuf {
    let base = match env::consts::OS {
        "windows" => env::var_os("LOCALAPPDATA")
            .or_else(|| env::var_os("APPDATA"))
            .map(PathBuf::from),
        "macos" => env::var_os("HOME")
            .map(PathBuf::from)
            .map(|home| home.join("Library").join("Application Support")),
        _ => env::var_os("HOME")
            .map(PathBuf::from)
            .map(|home| home.join(".local").join("share")),
    }
    .unwrap_or_else(|| PathBuf::from("."));

    base.join("rayban-assistant")
}

pub fn config_path() -> PathBuf {
    default_app_dir().join("config.toml")
}

pub fn cache_dir() -> PathBuf {
    default_app_dir().join("cache")
}

/// Directory exposed to the installer through the file share. Downloaded
/// artifacts must live under it.
pub fn updates_dir() -> PathBuf {
    cache_dir().join("updates")
}

/// Present once the app has registered with the companion service.
pub fn registration_marker() -> PathBuf {
    default_app_dir().join("registered")
}

/// Create the on-disk folder layout expected by the assistant.
pub fn ensure_base_dirs() -> std::io::Result<()> {
    for dir in [default_app_dir(), cache_dir(), updates_dir()] {
        fs::create_dir_all(dir)?;
    }
    Ok(())
}
