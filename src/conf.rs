//! Persistent settings and the session configuration derived from them

pub mod operations;

use crate::protocol::Version;
use anyhow::Context;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_OVERLAY_RETURN_MS: u64 = 60_000;

#[derive(Error, Debug)]
pub enum ConfError {
    #[error("Unknown setting: {0}")]
    UnknownKey(String),
    #[error("Invalid value for {key}: {value} ({reason})")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
    #[error("Settings are already open in another panel (lock held on {0})")]
    PanelBusy(PathBuf),
    #[error("Could not determine config directory")]
    NoConfigDir,
    #[error("Settings I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// API.Bible identifiers for each supported version
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct BibleIds {
    #[serde(rename = "KJV", default)]
    pub kjv: String,
    #[serde(rename = "NKJV", default)]
    pub nkjv: String,
    #[serde(rename = "NLT", default)]
    pub nlt: String,
    #[serde(rename = "GNT", default)]
    pub gnt: String,
}

impl BibleIds {
    /// The mapped id, or `None` when the slot is blank
    pub fn get(&self, version: Version) -> Option<&str> {
        let id = match version {
            Version::Kjv => &self.kjv,
            Version::Nkjv => &self.nkjv,
            Version::Nlt => &self.nlt,
            Version::Gnt => &self.gnt,
        };
        let id = id.trim();
        (!id.is_empty()).then_some(id)
    }

    pub fn set(&mut self, version: Version, id: impl Into<String>) {
        let slot = match version {
            Version::Kjv => &mut self.kjv,
            Version::Nkjv => &mut self.nkjv,
            Version::Nlt => &mut self.nlt,
            Version::Gnt => &mut self.gnt,
        };
        *slot = id.into();
    }
}

/// Settings as persisted on disk
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default)]
    pub api_bible_key: String,

    #[serde(default)]
    pub default_version: Version,

    /// How long a verse stays up before returning to the last slide (0 = stay)
    #[serde(default = "default_overlay_return_ms")]
    pub overlay_return_ms: u64,

    #[serde(default = "default_show_verse_numbers")]
    pub show_verse_numbers: bool,

    #[serde(default)]
    pub bible_ids_by_version: BibleIds,
}

fn default_overlay_return_ms() -> u64 {
    DEFAULT_OVERLAY_RETURN_MS
}

fn default_show_verse_numbers() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_bible_key: String::new(),
            default_version: Version::Nlt,
            overlay_return_ms: DEFAULT_OVERLAY_RETURN_MS,
            show_verse_numbers: true,
            bible_ids_by_version: BibleIds::default(),
        }
    }
}

/// Keys accepted by `settings set`
pub const SETTING_KEYS: [&str; 8] = [
    "apiBibleKey",
    "defaultVersion",
    "overlayReturnMs",
    "showVerseNumbers",
    "bibleIds.KJV",
    "bibleIds.NKJV",
    "bibleIds.NLT",
    "bibleIds.GNT",
];

impl Settings {
    /// Read a single value by its key
    pub fn get_value(&self, key: &str) -> Result<String, ConfError> {
        match key {
            "apiBibleKey" => Ok(self.api_bible_key.clone()),
            "defaultVersion" => Ok(self.default_version.to_string()),
            "overlayReturnMs" => Ok(self.overlay_return_ms.to_string()),
            "showVerseNumbers" => Ok(self.show_verse_numbers.to_string()),
            other => {
                let version = bible_id_key(other)?;
                Ok(self
                    .bible_ids_by_version
                    .get(version)
                    .unwrap_or_default()
                    .to_string())
            }
        }
    }

    /// Parse and store a single value by its key
    pub fn set_value(&mut self, key: &str, raw: &str) -> Result<(), ConfError> {
        let invalid = |reason: String| ConfError::InvalidValue {
            key: key.to_string(),
            value: raw.to_string(),
            reason,
        };

        match key {
            "apiBibleKey" => self.api_bible_key = raw.trim().to_string(),
            "defaultVersion" => self.default_version = raw.parse().map_err(invalid)?,
            "overlayReturnMs" => {
                self.overlay_return_ms = raw
                    .trim()
                    .parse()
                    .map_err(|e: std::num::ParseIntError| invalid(e.to_string()))?
            }
            "showVerseNumbers" => {
                self.show_verse_numbers = raw
                    .trim()
                    .parse()
                    .map_err(|e: std::str::ParseBoolError| invalid(e.to_string()))?
            }
            other => {
                let version = bible_id_key(other)?;
                self.bible_ids_by_version.set(version, raw.trim());
            }
        }
        Ok(())
    }
}

fn bible_id_key(key: &str) -> Result<Version, ConfError> {
    key.strip_prefix("bibleIds.")
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| ConfError::UnknownKey(key.to_string()))
}

/// The slice of settings the control surface runs with.
/// Loaded once at startup and never hot-reloaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub default_version: Version,
    pub overlay_return_ms: u64,
    pub show_verse_numbers: bool,
    /// Snapshot for round-trip checks only. Searches read ids from the store
    /// so a saved settings panel applies without a restart.
    pub bible_ids_by_version: BibleIds,
}

impl From<&Settings> for SessionConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            default_version: settings.default_version,
            overlay_return_ms: settings.overlay_return_ms,
            show_verse_numbers: settings.show_verse_numbers,
            bible_ids_by_version: settings.bible_ids_by_version.clone(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::from(&Settings::default())
    }
}

/// TOML-backed settings file
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    /// Store at ~/.config/sermon-flow/settings.toml
    pub fn new() -> Result<Self, ConfError> {
        let path = config_path().ok_or(ConfError::NoConfigDir)?;
        Ok(Self { path })
    }

    #[cfg(test)]
    pub fn with_path<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load settings, falling back to defaults if the file is missing or unreadable
    pub fn load(&self) -> Settings {
        match fs::read_to_string(&self.path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(settings) => {
                    tracing::debug!(path = %self.path.display(), "loaded settings");
                    settings
                }
                Err(e) => {
                    tracing::warn!(path = %self.path.display(), "failed to parse settings, using defaults: {}", e);
                    Settings::default()
                }
            },
            Err(_) => {
                tracing::info!(path = %self.path.display(), "no settings file found, using defaults");
                Settings::default()
            }
        }
    }

    pub fn save(&self, settings: &Settings) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml = toml::to_string_pretty(settings).context("Failed to serialize settings to TOML")?;

        fs::write(&self.path, toml)
            .with_context(|| format!("Failed to write settings file: {}", self.path.display()))?;

        tracing::info!(path = %self.path.display(), "saved settings");
        Ok(())
    }
}

/// Get the path to the settings file: ~/.config/sermon-flow/settings.toml
pub fn config_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "sermon-flow").map(|dirs| dirs.config_dir().join("settings.toml"))
}

/// Default folder holding `slides/` and `backgrounds/`
pub fn assets_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "sermon-flow").map(|dirs| dirs.data_dir().join("assets"))
}
