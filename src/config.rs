//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.yoanalyst.toml` files.

use crate::artifact::ArtifactEncoder;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default configuration file name.
pub const CONFIG_FILE_NAME: &str = ".yoanalyst.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Time budget settings.
    #[serde(default)]
    pub budget: BudgetConfig,

    /// Plot encoding settings.
    #[serde(default)]
    pub artifact: ArtifactConfig,

    /// Remote data source settings.
    #[serde(default)]
    pub sources: SourcesConfig,

    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,
}

/// Per-request time budget.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetConfig {
    /// Seconds a runner may keep starting new steps.
    #[serde(default = "default_ceiling_seconds")]
    pub ceiling_seconds: u64,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            ceiling_seconds: default_ceiling_seconds(),
        }
    }
}

impl BudgetConfig {
    pub fn ceiling(&self) -> Duration {
        Duration::from_secs(self.ceiling_seconds)
    }
}

fn default_ceiling_seconds() -> u64 {
    160 // leaves 20s of a 3 minute limit for transport
}

/// Highest DPI accepted; render buffers grow with its square.
pub const MAX_PREFERRED_DPI: u32 = 600;

/// Plot encoding settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactConfig {
    /// Ceiling on the PNG payload of each plot.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// First DPI tried.
    #[serde(default = "default_preferred_dpi")]
    pub preferred_dpi: u32,
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            max_bytes: default_max_bytes(),
            preferred_dpi: default_preferred_dpi(),
        }
    }
}

impl From<&ArtifactConfig> for ArtifactEncoder {
    fn from(config: &ArtifactConfig) -> Self {
        ArtifactEncoder::new(config.max_bytes, config.preferred_dpi)
    }
}

fn default_max_bytes() -> usize {
    crate::artifact::DEFAULT_MAX_BYTES
}

fn default_preferred_dpi() -> u32 {
    crate::artifact::encoder::DEFAULT_DPI
}

/// Remote data sources.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    /// Page holding the highest-grossing films table.
    #[serde(default = "default_wiki_url")]
    pub wiki_url: String,

    /// Root of the partitioned judgement metadata.
    #[serde(default = "default_dataset_root")]
    pub dataset_root: String,

    /// Object-store region of the dataset.
    #[serde(default = "default_dataset_region")]
    pub dataset_region: String,

    /// Court partition used for the delay regression.
    #[serde(default = "default_delay_court")]
    pub delay_court: String,

    /// Timeout for a single page fetch.
    #[serde(default = "default_http_timeout")]
    pub http_timeout_seconds: u64,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            wiki_url: default_wiki_url(),
            dataset_root: default_dataset_root(),
            dataset_region: default_dataset_region(),
            delay_court: default_delay_court(),
            http_timeout_seconds: default_http_timeout(),
        }
    }
}

fn default_wiki_url() -> String {
    "https://en.wikipedia.org/wiki/List_of_highest-grossing_films".to_string()
}

fn default_dataset_root() -> String {
    "s3://indian-high-court-judgments/metadata/parquet".to_string()
}

fn default_dataset_region() -> String {
    "ap-south-1".to_string()
}

fn default_delay_court() -> String {
    "33_10".to_string()
}

fn default_http_timeout() -> u64 {
    crate::sources::web::DEFAULT_HTTP_TIMEOUT_SECS
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to listen on.
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Largest request body accepted by `POST /api/`.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}

fn default_max_upload_bytes() -> usize {
    256 * 1024 * 1024
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        Self::load_from_dir(Path::new("."))
    }

    /// Try to load `.yoanalyst.toml` from a directory.
    pub fn load_from_dir(dir: &Path) -> Result<Option<Self>> {
        let config_path = dir.join(CONFIG_FILE_NAME);

        if config_path.exists() {
            Ok(Some(Self::load(&config_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, but only
    /// when they were given explicitly.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(budget) = args.budget {
            self.budget.ceiling_seconds = budget;
        }
        if let Some(max_bytes) = args.max_image_bytes {
            self.artifact.max_bytes = max_bytes;
        }
        if let Some(dpi) = args.dpi {
            self.artifact.preferred_dpi = dpi;
        }
        if let Some(ref bind) = args.bind {
            self.server.bind = bind.clone();
        }
        if let Some(ref url) = args.wiki_url {
            self.sources.wiki_url = url.clone();
        }
    }

    /// Reject settings no request could succeed with.
    pub fn validate(&self) -> Result<(), String> {
        if self.budget.ceiling_seconds == 0 {
            return Err("Budget ceiling must be at least 1 second".to_string());
        }
        if self.artifact.max_bytes == 0 {
            return Err("Image byte ceiling must be at least 1".to_string());
        }
        if !(10..=MAX_PREFERRED_DPI).contains(&self.artifact.preferred_dpi) {
            return Err(format!(
                "Preferred DPI must be between 10 and {}",
                MAX_PREFERRED_DPI
            ));
        }
        if self.server.max_upload_bytes == 0 {
            return Err("Upload limit must be at least 1 byte".to_string());
        }
        if !self.sources.wiki_url.starts_with("http://")
            && !self.sources.wiki_url.starts_with("https://")
        {
            return Err("Wiki URL must start with 'http://' or 'https://'".to_string());
        }
        Ok(())
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.budget.ceiling(), Duration::from_secs(160));
        assert_eq!(config.artifact.max_bytes, 100_000);
        assert_eq!(config.artifact.preferred_dpi, 110);
        assert_eq!(config.sources.delay_court, "33_10");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[budget]
ceiling_seconds = 60

[artifact]
max_bytes = 50000

[server]
bind = "0.0.0.0:9000"
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.budget.ceiling_seconds, 60);
        assert_eq!(config.artifact.max_bytes, 50_000);
        assert_eq!(config.artifact.preferred_dpi, 110);
        assert_eq!(config.server.bind, "0.0.0.0:9000");
        assert_eq!(config.sources.dataset_region, "ap-south-1");
    }

    #[test]
    fn test_load_from_dir() {
        let dir = tempfile::TempDir::new().unwrap();
        assert!(Config::load_from_dir(dir.path()).unwrap().is_none());

        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "[budget]\nceiling_seconds = 5\n",
        )
        .unwrap();
        let config = Config::load_from_dir(dir.path()).unwrap().unwrap();
        assert_eq!(config.budget.ceiling_seconds, 5);

        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "[budget\n").unwrap();
        assert!(Config::load_from_dir(dir.path()).is_err());
    }

    #[test]
    fn test_validate_rejects_zero_budget() {
        let mut config = Config::default();
        config.budget.ceiling_seconds = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_bounds_dpi() {
        let mut config = Config::default();
        config.artifact.preferred_dpi = 50_000;
        assert!(config.validate().is_err());

        config.artifact.preferred_dpi = MAX_PREFERRED_DPI;
        assert!(config.validate().is_ok());

        config.artifact.preferred_dpi = 9;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_upload_limit_exceeds_axum_default() {
        let config = Config::default();
        assert!(config.server.max_upload_bytes > 2 * 1024 * 1024);

        let parsed: Config = toml::from_str("[server]\nmax_upload_bytes = 1024\n").unwrap();
        assert_eq!(parsed.server.max_upload_bytes, 1024);
        assert_eq!(parsed.server.bind, "127.0.0.1:8000");
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(toml_str.contains("[budget]"));
        assert!(toml_str.contains("[artifact]"));
        assert!(toml_str.contains("[sources]"));
        assert!(toml_str.contains("[server]"));
    }
}
