use crate::constants::{BROWSER_USER_AGENT, MAX_DETAIL_CONCURRENCY};
use crate::error::{Result, ScraperError};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

pub const CONFIG_ENV_VAR: &str = "PARK_SCRAPER_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub transport: TransportConfig,
    pub registry: RegistryConfig,
    pub directory: DirectoryConfig,
    pub assessor: AssessorConfig,
    /// Extra or corrected `county name = code` entries layered over the built-in table.
    pub counties: BTreeMap<String, u32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub timeout_secs: u64,
    pub max_attempts: u32,
    pub base_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub user_agent: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_attempts: 3,
            base_backoff_ms: 500,
            max_backoff_ms: 8_000,
            user_agent: BROWSER_USER_AGENT.to_string(),
        }
    }
}

impl TransportConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub page_size: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self { page_size: 2_000 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DirectoryConfig {
    pub page_size: usize,
    pub fetch_details: bool,
    pub max_offset: usize,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            page_size: 50,
            fetch_details: true,
            max_offset: 5_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AssessorConfig {
    pub page_size: usize,
    pub detail_concurrency: usize,
}

impl Default for AssessorConfig {
    fn default() -> Self {
        Self {
            page_size: 200,
            detail_concurrency: MAX_DETAIL_CONCURRENCY,
        }
    }
}

impl AssessorConfig {
    /// Worker count actually used, clamped to 1..=MAX_DETAIL_CONCURRENCY.
    pub fn effective_concurrency(&self) -> usize {
        self.detail_concurrency.clamp(1, MAX_DETAIL_CONCURRENCY)
    }
}

impl Config {
    /// Loads configuration from an explicit path, then `$PARK_SCRAPER_CONFIG`,
    /// then `./config.toml`, falling back to built-in defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let candidate: Option<PathBuf> = match explicit {
            Some(p) => Some(p.to_path_buf()),
            None => match std::env::var(CONFIG_ENV_VAR) {
                Ok(v) if !v.trim().is_empty() => Some(PathBuf::from(v)),
                _ => {
                    let default = PathBuf::from(DEFAULT_CONFIG_PATH);
                    default.exists().then_some(default)
                }
            },
        };

        let Some(path) = candidate else {
            debug!("No config file found, using defaults");
            return Ok(Config::default());
        };

        let content = fs::read_to_string(&path).map_err(|e| {
            ScraperError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;
        let config = Self::from_toml(&content)?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.transport.max_attempts == 0 {
            return Err(ScraperError::Config("transport.max_attempts must be at least 1".into()));
        }
        for (name, size) in [
            ("registry", self.registry.page_size),
            ("directory", self.directory.page_size),
            ("assessor", self.assessor.page_size),
        ] {
            if size == 0 {
                return Err(ScraperError::Config(format!("{name}.page_size must be positive")));
            }
        }
        Ok(())
    }
}
