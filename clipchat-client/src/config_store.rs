use std::{
    fs, io,
    path::{Path, PathBuf},
    time::Duration,
};

use clipchat_core::{Settings, SettingsError, SettingsStore};
use tracing::warn;

/// `config.json` is expected to be tiny; anything larger is treated as corrupt.
pub const MAX_CONFIG_BYTES: u64 = 64 * 1024;

/// Overrides the directory holding `config.json`.
pub const CONFIG_DIR_ENV: &str = "CLIPCHAT_CONFIG_DIR";

const APP_DIR_NAME: &str = "ClipChat";
const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Debug)]
pub enum ConfigLoadError {
    Metadata(io::Error),
    TooLarge { size: u64, max: u64 },
    Read(io::Error),
    Parse(serde_json::Error),
}

impl std::fmt::Display for ConfigLoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigLoadError::Metadata(e) => write!(f, "metadata read failed: {e}"),
            ConfigLoadError::TooLarge { size, max } => {
                write!(f, "file too large: {size} bytes (max {max})")
            }
            ConfigLoadError::Read(e) => write!(f, "read failed: {e}"),
            ConfigLoadError::Parse(e) => write!(f, "parse failed: {e}"),
        }
    }
}

impl std::error::Error for ConfigLoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigLoadError::Metadata(e) => Some(e),
            ConfigLoadError::Read(e) => Some(e),
            ConfigLoadError::Parse(e) => Some(e),
            ConfigLoadError::TooLarge { .. } => None,
        }
    }
}

impl ConfigLoadError {
    fn is_missing_file(&self) -> bool {
        matches!(self, ConfigLoadError::Metadata(e) if e.kind() == io::ErrorKind::NotFound)
    }
}

#[derive(Debug)]
pub enum ConfigSaveError {
    Invalid(SettingsError),
    CreateDir(io::Error),
    Serialize(serde_json::Error),
    WriteTmp(io::Error),
    Rename(io::Error),
}

impl std::fmt::Display for ConfigSaveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSaveError::Invalid(e) => write!(f, "invalid settings: {e}"),
            ConfigSaveError::CreateDir(e) => write!(f, "config directory create failed: {e}"),
            ConfigSaveError::Serialize(e) => write!(f, "serialize failed: {e}"),
            ConfigSaveError::WriteTmp(e) => write!(f, "tmp write failed: {e}"),
            ConfigSaveError::Rename(e) => write!(f, "rename failed: {e}"),
        }
    }
}

impl std::error::Error for ConfigSaveError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigSaveError::Invalid(e) => Some(e),
            ConfigSaveError::CreateDir(e) => Some(e),
            ConfigSaveError::Serialize(e) => Some(e),
            ConfigSaveError::WriteTmp(e) => Some(e),
            ConfigSaveError::Rename(e) => Some(e),
        }
    }
}

/// Per-user application directory: `%LOCALAPPDATA%\ClipChat`, or `./ClipChat` without it.
pub fn app_data_dir() -> PathBuf {
    let base = std::env::var_os("LOCALAPPDATA")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    base.join(APP_DIR_NAME)
}

pub fn config_path() -> PathBuf {
    match std::env::var_os(CONFIG_DIR_ENV) {
        Some(dir) => PathBuf::from(dir).join(CONFIG_FILE_NAME),
        None => app_data_dir().join(CONFIG_FILE_NAME),
    }
}

pub fn parse_settings_json(data: &str) -> Result<Settings, serde_json::Error> {
    serde_json::from_str::<Settings>(data).map(Settings::sanitized)
}

pub fn load_settings_from_path(path: &Path) -> Result<Settings, ConfigLoadError> {
    let meta = fs::metadata(path).map_err(ConfigLoadError::Metadata)?;
    if meta.len() > MAX_CONFIG_BYTES {
        return Err(ConfigLoadError::TooLarge {
            size: meta.len(),
            max: MAX_CONFIG_BYTES,
        });
    }

    let data = fs::read_to_string(path).map_err(ConfigLoadError::Read)?;
    parse_settings_json(&data).map_err(ConfigLoadError::Parse)
}

/// Loads settings, falling back to defaults for a missing or unusable file.
pub fn load_settings_or_default(path: &Path) -> Settings {
    match load_settings_from_path(path) {
        Ok(settings) => settings,
        Err(err) if err.is_missing_file() => Settings::default(),
        Err(err) => {
            warn!(path = %path.display(), "config unusable, using defaults: {err}");
            Settings::default()
        }
    }
}

pub fn save_settings_to_path(path: &Path, settings: &Settings) -> Result<(), ConfigSaveError> {
    settings.validate().map_err(ConfigSaveError::Invalid)?;

    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).map_err(ConfigSaveError::CreateDir)?;
    }

    let tmp = path.with_extension("json.tmp");
    let payload = serde_json::to_string_pretty(settings).map_err(ConfigSaveError::Serialize)?;
    fs::write(&tmp, payload.as_bytes()).map_err(ConfigSaveError::WriteTmp)?;
    replace_with_tmp(&tmp, path)
}

/// Moves `tmp` over `path` in one step. The previous file stays in place if the move fails.
pub fn replace_with_tmp(tmp: &Path, path: &Path) -> Result<(), ConfigSaveError> {
    fs::rename(tmp, path).map_err(ConfigSaveError::Rename)
}

/// Saves with a short exponential backoff; invalid settings are not retried.
pub fn save_settings_with_retry(path: &Path, settings: &Settings) -> Result<(), ConfigSaveError> {
    const MAX_ATTEMPTS: u32 = 3;
    const BACKOFF_BASE_MS: u64 = 50;

    let mut attempt = 1;
    loop {
        match save_settings_to_path(path, settings) {
            Ok(()) => return Ok(()),
            Err(err @ ConfigSaveError::Invalid(_)) => return Err(err),
            Err(err) if attempt >= MAX_ATTEMPTS => return Err(err),
            Err(err) => {
                warn!(attempt, "config save failed, retrying: {err}");
                let backoff_ms = BACKOFF_BASE_MS.saturating_mul(1_u64 << (attempt - 1));
                std::thread::sleep(Duration::from_millis(backoff_ms));
                attempt += 1;
            }
        }
    }
}

/// `config.json` on disk.
#[derive(Debug, Clone)]
pub struct JsonConfigStore {
    path: PathBuf,
}

impl JsonConfigStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// The store at the standard per-user location.
    pub fn at_default_location() -> Self {
        Self::new(config_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsStore for JsonConfigStore {
    fn load(&self) -> Settings {
        load_settings_or_default(&self.path)
    }

    fn save(&self, settings: &Settings) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        save_settings_with_retry(&self.path, settings).map_err(|err| err.to_string().into())
    }
}
