// Keyloom Settings
// Engine tunables loaded from a TOML file

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::key::Keycode;

/// Engine tunables that are configuration rather than layout: the compose
/// leader key, the default gap between multi-taps, and the optional delay
/// between compose-sequence taps.
///
/// Loaded from `~/.config/keyloom/settings.toml` by default; a missing file
/// yields the defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Keycode tapped ahead of every compose sequence
    pub compose_key: Keycode,
    /// Gap allowed between consecutive taps when a multi-tap step does not
    /// specify its own
    pub tap_gap: Duration,
    /// Pause between the taps of a compose sequence
    pub seq_delay: Option<Duration>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            // KEY_COMPOSE on Linux keyboards
            compose_key: Keycode(127),
            tap_gap: Duration::from_millis(200),
            seq_delay: None,
        }
    }
}

/// Errors that can occur when loading settings
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(String),
}

/// TOML representation for deserializing settings
#[derive(Debug, Clone, serde::Deserialize, Default)]
struct SettingsToml {
    #[serde(default)]
    compose_key: Option<u32>,

    #[serde(default)]
    tap_gap_ms: Option<u64>,

    #[serde(default)]
    seq_delay_ms: Option<u64>,
}

impl Settings {
    /// Load settings from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Load settings from a TOML string
    pub fn from_toml(content: &str) -> Result<Self, SettingsError> {
        let parsed: SettingsToml =
            toml::from_str(content).map_err(|e| SettingsError::TomlParse(e.to_string()))?;

        let mut settings = Self::default();
        if let Some(code) = parsed.compose_key {
            settings.compose_key = Keycode(code);
        }
        if let Some(ms) = parsed.tap_gap_ms {
            settings.tap_gap = Duration::from_millis(ms);
        }
        settings.seq_delay = parsed.seq_delay_ms.map(Duration::from_millis);

        Ok(settings)
    }

    /// Get the default settings path
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("keyloom").join("settings.toml"))
    }

    /// Load from the default location, falling back to defaults when the
    /// file does not exist
    pub fn load_default() -> Result<Self, SettingsError> {
        if let Some(path) = Self::default_path() {
            if path.exists() {
                return Self::from_file(path);
            }
        }
        Ok(Self::default())
    }
}
