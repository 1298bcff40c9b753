//! Persisted user configuration.
//!
//! Settings are stored as JSON in the user's config directory
//! (e.g., `~/.config/paste-helper/config.json` on Linux) and read on demand.

use crate::error::{AppError, Result};
use crate::hotkey::{self, Hotkey, Modifier};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Environment variable consulted when no API key is stored.
pub const API_KEY_ENV: &str = "OPENROUTER_API_KEY";

pub const DEFAULT_MODEL: &str = "google/gemini-2.0-flash-001";

/// A named canned instruction offered as a one-click prompt.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresetPrompt {
    pub name: String,
    pub prompt: String,
}

impl PresetPrompt {
    pub fn new(name: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prompt: prompt.into(),
        }
    }
}

/// User-configurable settings persisted between sessions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Configuration {
    pub api_key: String,
    pub hotkey_modifier: String,
    pub hotkey_key: String,
    pub preset_prompts: Vec<PresetPrompt>,
    pub model: String,
    pub provider_order: Vec<String>,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            hotkey_modifier: Modifier::Shift.to_string(),
            hotkey_key: "V".to_string(),
            preset_prompts: default_presets(),
            model: DEFAULT_MODEL.to_string(),
            provider_order: vec!["Google".to_string()],
        }
    }
}

fn default_presets() -> Vec<PresetPrompt> {
    vec![
        PresetPrompt::new("Summarize", "Summarize the following content concisely."),
        PresetPrompt::new("Explain", "Explain the following content in simple terms."),
        PresetPrompt::new("Fix grammar", "Fix grammar and spelling. Reply with the corrected text only."),
        PresetPrompt::new("Translate", "Translate the following content to English."),
    ]
}

impl Configuration {
    pub fn has_api_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    /// Parses the stored hotkey fields.
    pub fn hotkey(&self) -> Result<Hotkey> {
        Hotkey::parse(&self.hotkey_modifier, &self.hotkey_key)
    }

    /// Finds the first preset with the given name (case-insensitive).
    pub fn preset_by_name(&self, name: &str) -> Option<&PresetPrompt> {
        self.preset_prompts
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name.trim()))
    }

    pub fn to_pretty_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Copy with the API key masked, for display.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if copy.has_api_key() {
            let tail: String = copy
                .api_key
                .chars()
                .rev()
                .take(4)
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect();
            copy.api_key = format!("****{}", tail);
        }
        copy
    }
}

/// A partial update. `None` fields are left untouched.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConfigPatch {
    pub api_key: Option<String>,
    pub hotkey_modifier: Option<String>,
    pub hotkey_key: Option<String>,
    pub preset_prompts: Option<Vec<PresetPrompt>>,
    pub model: Option<String>,
    pub provider_order: Option<Vec<String>>,
}

impl ConfigPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Outcome of [`ConfigStore::set`].
#[derive(Clone, Debug)]
pub struct ConfigUpdate {
    pub config: Configuration,
    /// True when the stored modifier or key actually changed value.
    pub hotkey_changed: bool,
}

/// JSON file backed configuration store.
#[derive(Clone, Debug)]
pub struct ConfigStore {
    path: Option<PathBuf>,
    env_fallback: bool,
}

impl ConfigStore {
    /// Opens the store in the platform config directory.
    ///
    /// Enables the [`API_KEY_ENV`] fallback. Load `.env` first (see
    /// [`crate::init`]) for it to be picked up from there.
    pub fn open_default() -> Self {
        Self {
            path: Self::default_path(),
            env_fallback: true,
        }
    }

    /// Opens a store backed by an explicit file, without env fallback.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            env_fallback: false,
        }
    }

    /// Also consult [`API_KEY_ENV`] when no key is stored.
    pub fn with_env_fallback(mut self) -> Self {
        self.env_fallback = true;
        self
    }

    /// A store that never touches disk. Writes are kept nowhere.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            env_fallback: false,
        }
    }

    fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "paste-helper").map(|dirs| dirs.config_dir().join("config.json"))
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Reads the configuration, falling back to defaults if not found.
    ///
    /// A corrupt file is logged and treated as absent.
    pub fn get(&self) -> Configuration {
        let config: Configuration = self
            .path
            .as_deref()
            .and_then(|path| match fs::read_to_string(path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(config) => Some(config),
                    Err(e) => {
                        warn!("Ignoring unreadable config at {}: {}", path.display(), e);
                        None
                    }
                },
                Err(_) => None,
            })
            .unwrap_or_default();

        if self.env_fallback {
            fill_api_key(config, env::var(API_KEY_ENV).ok())
        } else {
            config
        }
    }

    /// Applies a partial update and persists the result.
    ///
    /// # Errors
    /// Returns an error if the resulting hotkey is invalid (nothing is
    /// written in that case) or the file cannot be written.
    pub fn set(&self, patch: ConfigPatch) -> Result<ConfigUpdate> {
        let mut config = self.stored();
        let mut hotkey_changed = false;

        if let Some(api_key) = patch.api_key {
            config.api_key = api_key.trim().to_string();
        }
        if let Some(modifier) = patch.hotkey_modifier {
            let modifier = modifier.parse::<Modifier>()?.to_string();
            if modifier != config.hotkey_modifier {
                config.hotkey_modifier = modifier;
                hotkey_changed = true;
            }
        }
        if let Some(key) = patch.hotkey_key {
            let key = hotkey::normalize_key(&key)?.to_string();
            if key != config.hotkey_key {
                config.hotkey_key = key;
                hotkey_changed = true;
            }
        }
        if let Some(presets) = patch.preset_prompts {
            config.preset_prompts = presets;
        }
        if let Some(model) = patch.model {
            let model = model.trim();
            if model.is_empty() {
                return Err(AppError::config("model id must not be empty"));
            }
            config.model = model.to_string();
        }
        if let Some(order) = patch.provider_order {
            config.provider_order = order
                .into_iter()
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .collect();
        }

        self.save(&config)?;
        Ok(ConfigUpdate {
            config,
            hotkey_changed,
        })
    }

    /// The persisted record without the env fallback applied, so a
    /// save never copies the environment key to disk.
    fn stored(&self) -> Configuration {
        Self {
            path: self.path.clone(),
            env_fallback: false,
        }
        .get()
    }

    fn save(&self, config: &Configuration) -> Result<()> {
        if let Some(path) = &self.path {
            if let Some(dir) = path.parent() {
                fs::create_dir_all(dir)?;
            }
            let json = config.to_pretty_json()?;
            fs::write(path, json)?;
            info!("Saved configuration to {}", path.display());
        }
        Ok(())
    }
}

/// Uses `fallback` as the key when none is stored.
fn fill_api_key(mut config: Configuration, fallback: Option<String>) -> Configuration {
    if !config.has_api_key() {
        if let Some(key) = fallback.filter(|k| !k.trim().is_empty()) {
            debug!("Using API key from {}", API_KEY_ENV);
            config.api_key = key;
        }
    }
    config
}
