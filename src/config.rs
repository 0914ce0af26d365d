use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::core::pagination::DEFAULT_PAGE_SIBLINGS;
use crate::core::query::DEFAULT_PAGE_SIZE;

pub const API_URL_ENV: &str = "TASKDECK_API_URL";

fn default_api_base_url() -> String {
    "http://localhost:5000/api".to_string()
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

fn default_search_debounce_ms() -> u64 {
    500
}

fn default_page_siblings() -> u32 {
    DEFAULT_PAGE_SIBLINGS
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialBackend {
    Keyring,
    #[default]
    File,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct TaskdeckConfig {
    pub api_base_url: String,
    pub page_size: u32,
    pub search_debounce_ms: u64,
    pub page_siblings: u32,
    pub credential_backend: CredentialBackend,
    pub debug_logging: bool,
}

impl Default for TaskdeckConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            page_size: default_page_size(),
            search_debounce_ms: default_search_debounce_ms(),
            page_siblings: default_page_siblings(),
            credential_backend: CredentialBackend::default(),
            debug_logging: false,
        }
    }
}

impl TaskdeckConfig {
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("taskdeck")
            .join("config.json")
    }

    /// Load from `path`. A missing file means defaults; a malformed one is an error.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No config at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply `TASKDECK_API_URL` if it is set and non-empty.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var(API_URL_ENV) {
            self.apply_api_url_override(&url);
        }
        self
    }

    fn apply_api_url_override(&mut self, url: &str) {
        let url = url.trim();
        if !url.is_empty() {
            self.api_base_url = url.to_string();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = TaskdeckConfig::load(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, TaskdeckConfig::default());
        assert_eq!(config.page_size, 10);
        assert_eq!(config.search_debounce_ms, 500);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{ "api_base_url": "https://tasks.example.com/api", "credential_backend": "keyring" }"#,
        )
        .unwrap();

        let config = TaskdeckConfig::load(&path).unwrap();
        assert_eq!(config.api_base_url, "https://tasks.example.com/api");
        assert_eq!(config.credential_backend, CredentialBackend::Keyring);
        assert_eq!(config.page_siblings, DEFAULT_PAGE_SIBLINGS);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ page_size: ").unwrap();
        assert!(matches!(
            TaskdeckConfig::load(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn blank_override_is_ignored() {
        let mut config = TaskdeckConfig::default();
        config.apply_api_url_override("   ");
        assert_eq!(config.api_base_url, default_api_base_url());
        config.apply_api_url_override(" http://10.0.0.2:5000/api ");
        assert_eq!(config.api_base_url, "http://10.0.0.2:5000/api");
    }
}
