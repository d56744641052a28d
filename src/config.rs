use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{ClipError, Result};
use crate::models::Credentials;

/// Saved settings. Credentials are stored in plain text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub notion_api_key: String,
    #[serde(default)]
    pub notion_database_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl Config {
    pub fn default_path() -> PathBuf {
        // Use XDG config directory or fallback
        if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "jobclip") {
            proj_dirs.config_dir().join("config.json")
        } else {
            PathBuf::from("jobclip.json")
        }
    }

    /// Missing file means nothing saved yet.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path)
            .map_err(|e| ClipError::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        serde_json::from_str(&raw)
            .map_err(|e| ClipError::Config(format!("Invalid config file {}: {}", path.display(), e)))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if self.notion_api_key.trim().is_empty() || self.notion_database_id.trim().is_empty() {
            return Err(ClipError::Validation(
                "Please enter both Notion API Key and Database ID.".to_string(),
            ));
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| ClipError::Config(format!("Failed to create {}: {}", parent.display(), e)))?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| ClipError::Config(format!("Failed to serialize config: {}", e)))?;
        fs::write(path, json)
            .map_err(|e| ClipError::Config(format!("Failed to write {}: {}", path.display(), e)))
    }

    /// `NOTION_API_KEY` / `NOTION_DATABASE_ID` win over saved values.
    pub fn with_env_overrides(mut self) -> Self {
        self.apply_overrides(
            std::env::var("NOTION_API_KEY").ok(),
            std::env::var("NOTION_DATABASE_ID").ok(),
        );
        self
    }

    fn apply_overrides(&mut self, api_key: Option<String>, database_id: Option<String>) {
        if let Some(key) = api_key.filter(|k| !k.trim().is_empty()) {
            self.notion_api_key = key;
        }
        if let Some(id) = database_id.filter(|d| !d.trim().is_empty()) {
            self.notion_database_id = id;
        }
    }

    pub fn credentials(&self) -> Result<Credentials> {
        if self.notion_api_key.trim().is_empty() || self.notion_database_id.trim().is_empty() {
            return Err(ClipError::Config(
                "Notion credentials not configured. Run 'jobclip config set' first.".to_string(),
            ));
        }
        Ok(Credentials {
            api_key: self.notion_api_key.clone(),
            database_id: self.notion_database_id.clone(),
        })
    }

    pub fn masked_api_key(&self) -> String {
        let key = self.notion_api_key.as_str();
        let count = key.chars().count();
        if count == 0 {
            "(not set)".to_string()
        } else if count <= 8 {
            "*".repeat(count)
        } else {
            let tail: String = key.chars().skip(count - 4).collect();
            format!("{}{}", "*".repeat(count - 4), tail)
        }
    }
}
