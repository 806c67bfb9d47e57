use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const DEFAULT_API_BASE: &str = "https://api.github.com";
const DEFAULT_STORE_PREFIX: &str = "jot-notes-";

/// Default embedding model (bge-small is a good size/quality tradeoff
/// for note-length texts)
const DEFAULT_SEMANTIC_MODEL: &str = "bge-small-en-v1.5";
const DEFAULT_SEARCH_LIMIT: usize = 10;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GithubConfig {
    /// Personal access token. `JOT_GITHUB_TOKEN` overrides.
    #[serde(default)]
    pub token: String,

    #[serde(default = "default_api_base")]
    pub api_base: String,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SemanticConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Model name for embeddings (e.g., "bge-small-en-v1.5")
    #[serde(default = "default_semantic_model")]
    pub model: String,

    #[serde(default = "default_search_limit")]
    pub search_limit: usize,
}

impl Default for SemanticConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            model: DEFAULT_SEMANTIC_MODEL.to_string(),
            search_limit: DEFAULT_SEARCH_LIMIT,
        }
    }
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_enabled() -> bool {
    true
}

fn default_semantic_model() -> String {
    DEFAULT_SEMANTIC_MODEL.to_string()
}

fn default_search_limit() -> usize {
    DEFAULT_SEARCH_LIMIT
}

fn default_store_prefix() -> String {
    DEFAULT_STORE_PREFIX.to_string()
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub github: GithubConfig,

    /// Prefix for the derived backing-store name.
    #[serde(default = "default_store_prefix")]
    pub store_prefix: String,

    #[serde(default)]
    pub semantic: SemanticConfig,

    #[serde(skip_serializing, skip_deserializing)]
    base_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            github: GithubConfig::default(),
            store_prefix: default_store_prefix(),
            semantic: SemanticConfig::default(),
            base_path: String::new(),
        }
    }
}

impl Config {
    fn validate(&self) {
        if self.store_prefix.is_empty() {
            panic!("store_prefix must not be empty");
        }
        if !self
            .store_prefix
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-')
        {
            panic!(
                "store_prefix may only contain [A-Za-z0-9-], got {:?}",
                self.store_prefix
            );
        }
        if self.semantic.model.is_empty() {
            panic!("semantic.model must not be empty");
        }
        if self.semantic.search_limit == 0 {
            panic!("semantic.search_limit must be greater than 0");
        }
    }

    pub fn load_with(base_path: &str) -> Self {
        let path = Path::new(base_path).join("config.yaml");

        // create new if does not exist
        if !path.exists() {
            if let Some(parent) = path.parent() {
                let _ = std::fs::create_dir_all(parent);
            }
            let _ = std::fs::write(
                &path,
                serde_yml::to_string(&Self::default())
                    .expect("default config serializes")
                    .as_bytes(),
            );
        }

        let config_str =
            std::fs::read_to_string(&path).expect("config file is not readable");
        let mut config: Self = serde_yml::from_str(&config_str).expect("config is malformed");

        config.base_path = base_path.to_string();
        config.validate();

        config
    }

    pub fn save(&self) {
        let path = Path::new(&self.base_path).join("config.yaml");
        let config_str = serde_yml::to_string(&self).expect("config serializes");
        let _ = std::fs::write(path, config_str.as_bytes());
    }

    pub fn base_path(&self) -> PathBuf {
        PathBuf::from(&self.base_path)
    }

    /// Token resolution order: environment, then config file.
    pub fn github_token(&self) -> String {
        std::env::var("JOT_GITHUB_TOKEN")
            .ok()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| self.github.token.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        Config::default().validate();
    }

    #[test]
    fn load_creates_default_config() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().to_str().unwrap();

        let config = Config::load_with(base);
        assert_eq!(config.store_prefix, DEFAULT_STORE_PREFIX);
        assert!(dir.path().join("config.yaml").exists());
    }

    #[test]
    #[should_panic(expected = "store_prefix")]
    fn empty_prefix_is_rejected() {
        let config = Config {
            store_prefix: String::new(),
            ..Default::default()
        };
        config.validate();
    }
}
