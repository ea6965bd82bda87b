// Settings management and persistence
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::library::clip::Clip;

const APP_DIR_NAME: &str = "daitoue";
const CONFIG_FILE_NAME: &str = "config.json";
/// Pre-1.0 builds kept a bare clip array next to the executable
const LEGACY_FILE_NAME: &str = "daitoue.json";

/// The whole persisted document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub audio_list: Vec<Clip>,
    pub close_action: String, // "minimize" or "quit"
    pub dont_ask_again: bool,
    pub volume: f64, // 0-100
    pub main_device: String, // device id, "" or "default"
    pub aux_device: String,  // device id, "" or "none" to disable
    pub window_width: i32,
    pub window_height: i32,
    pub sidebar_collapsed: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            audio_list: Vec::new(),
            close_action: "minimize".to_string(),
            dont_ask_again: false,
            volume: 100.0,
            main_device: String::new(),
            aux_device: String::new(),
            window_width: 900,
            window_height: 600,
            sidebar_collapsed: false,
        }
    }
}

impl Config {
    pub fn clip(&self, id: &str) -> Option<&Clip> {
        self.audio_list.iter().find(|c| c.id == id)
    }

    pub fn clip_mut(&mut self, id: &str) -> Option<&mut Clip> {
        self.audio_list.iter_mut().find(|c| c.id == id)
    }
}

/// Where the document lives, plus the legacy file to migrate from
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
    legacy_path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>, legacy_path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            legacy_path: legacy_path.into(),
        }
    }

    /// `<config dir>/daitoue/config.json`, or `./daitoue.json` when the
    /// platform has no config directory.
    pub fn default_location() -> Self {
        let path = dirs::config_dir()
            .map(|dir| dir.join(APP_DIR_NAME).join(CONFIG_FILE_NAME))
            .unwrap_or_else(|| PathBuf::from(LEGACY_FILE_NAME));
        Self::new(path, LEGACY_FILE_NAME)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the document, falling back to the legacy clip list and then to
    /// defaults. Never fails: problems are logged and defaults used.
    pub fn load(&self) -> Config {
        match fs::read_to_string(&self.path) {
            Ok(content) => match serde_json::from_str::<Config>(&content) {
                Ok(config) => {
                    info!(path = %self.path.display(), clips = config.audio_list.len(), "Loaded config");
                    config
                }
                Err(e) => {
                    warn!(path = %self.path.display(), error = %e, "Config is corrupt, using defaults");
                    Config::default()
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => self.migrate_legacy(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to read config, using defaults");
                Config::default()
            }
        }
    }

    fn migrate_legacy(&self) -> Config {
        let mut config = Config::default();

        if self.legacy_path == self.path {
            debug!("No config file found, using defaults");
            return config;
        }

        let content = match fs::read_to_string(&self.legacy_path) {
            Ok(content) => content,
            Err(_) => {
                debug!("No config file found, using defaults");
                return config;
            }
        };

        match serde_json::from_str::<Vec<Clip>>(&content) {
            Ok(list) => {
                info!(
                    from = %self.legacy_path.display(),
                    clips = list.len(),
                    "Migrating legacy clip list"
                );
                config.audio_list = list;
                if let Err(e) = self.save(&config) {
                    warn!(error = %e, "Failed to save migrated config");
                }
            }
            Err(e) => warn!(error = %e, "Legacy clip list is unreadable, ignoring it"),
        }
        config
    }

    /// Write the document as pretty JSON, creating the directory if needed
    pub fn save(&self, config: &Config) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let content = serde_json::to_string_pretty(config)?;
        fs::write(&self.path, content)?;
        debug!(path = %self.path.display(), "Saved config");
        Ok(())
    }
}
