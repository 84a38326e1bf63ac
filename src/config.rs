//! Configuration loading (~/.flowdesk/config.json + environment overrides).
//!
//! Both API keys are optional: a missing Gemini key disables AI-backed
//! workflows at construction time, and a missing Resend key puts the
//! notification gateway into dry-run mode.

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Default completion model.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Fixed test sender provided by Resend; a real deployment would use a
/// verified domain.
pub const DEFAULT_SENDER_EMAIL: &str = "onboarding@resend.dev";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub gemini_api_key: Option<String>,
    pub resend_api_key: Option<String>,
    pub model: String,
    pub sender_name: String,
    pub sender_email: String,
    /// Overrides the default `~/.flowdesk` data directory.
    pub data_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gemini_api_key: None,
            resend_api_key: None,
            model: DEFAULT_MODEL.to_string(),
            sender_name: "Flowdesk".to_string(),
            sender_email: DEFAULT_SENDER_EMAIL.to_string(),
            data_dir: None,
        }
    }
}

impl Config {
    /// `"Name <addr>"` form used by the delivery service.
    pub fn sender(&self) -> String {
        format!("{} <{}>", self.sender_name, self.sender_email)
    }

    /// Resolved data directory (config override or `~/.flowdesk`).
    pub fn resolved_data_dir(&self) -> Result<PathBuf, String> {
        match &self.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => default_data_dir(),
        }
    }
}

/// The canonical config file path (~/.flowdesk/config.json).
pub fn config_path() -> Result<PathBuf, String> {
    let home = dirs::home_dir().ok_or("Could not find home directory")?;
    Ok(home.join(".flowdesk").join("config.json"))
}

fn default_data_dir() -> Result<PathBuf, String> {
    let home = dirs::home_dir().ok_or("Could not find home directory")?;
    Ok(home.join(".flowdesk"))
}

/// Load configuration from disk, then apply environment overrides
/// (`GEMINI_API_KEY`, `RESEND_API_KEY`, `FLOWDESK_MODEL`).
///
/// A missing config file is not an error — defaults plus environment are a
/// complete configuration.
pub fn load_config() -> Result<Config, String> {
    let path = config_path()?;

    let mut config = if path.exists() {
        let content =
            fs::read_to_string(&path).map_err(|e| format!("Failed to read config: {}", e))?;
        serde_json::from_str(&content).map_err(|e| format!("Failed to parse config: {}", e))?
    } else {
        Config::default()
    };

    apply_env_overrides(&mut config);
    Ok(config)
}

fn apply_env_overrides(config: &mut Config) {
    if let Ok(key) = std::env::var("GEMINI_API_KEY") {
        if !key.is_empty() {
            config.gemini_api_key = Some(key);
        }
    }
    if let Ok(key) = std::env::var("RESEND_API_KEY") {
        if !key.is_empty() {
            config.resend_api_key = Some(key);
        }
    }
    if let Ok(model) = std::env::var("FLOWDESK_MODEL") {
        if !model.is_empty() {
            config.model = model;
        }
    }
}
