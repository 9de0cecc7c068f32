use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Result, StatsError};
use crate::matcher::MatchPolicy;
use crate::source::{DataSource, FetchPolicy};

pub const DEFAULT_CONFIG: &str = "maroc-stats.toml";

const DEFAULT_GEOGRAPHY: &str = "https://cdn.jsdelivr.net/npm/morocco-map/data/regions.json";
const DEFAULT_RETIREES: &str = "data/data.json";
const DEFAULT_UNEMPLOYMENT: &str = "data/chomage.csv";

#[derive(Debug, Clone, Deserialize)]
pub struct SourcesConfig {
    #[serde(default = "default_geography")]
    pub geography: DataSource,
    #[serde(default = "default_retirees")]
    pub retirees: Option<DataSource>,
    #[serde(default = "default_unemployment")]
    pub unemployment: Option<DataSource>,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            geography: default_geography(),
            retirees: default_retirees(),
            unemployment: default_unemployment(),
        }
    }
}

fn default_geography() -> DataSource {
    DataSource::Url(DEFAULT_GEOGRAPHY.to_string())
}

fn default_retirees() -> Option<DataSource> {
    Some(DataSource::Path(DEFAULT_RETIREES.into()))
}

fn default_unemployment() -> Option<DataSource> {
    Some(DataSource::Path(DEFAULT_UNEMPLOYMENT.into()))
}

#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_retries")]
    pub retries: usize,
    #[serde(default = "default_retry_base_ms")]
    pub retry_base_ms: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            retries: default_retries(),
            retry_base_ms: default_retry_base_ms(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_retries() -> usize {
    2
}

fn default_retry_base_ms() -> u64 {
    250
}

impl FetchConfig {
    pub fn policy(&self) -> FetchPolicy {
        FetchPolicy {
            timeout: Duration::from_secs(self.timeout_secs.max(1)),
            retries: self.retries,
            base_delay: Duration::from_millis(self.retry_base_ms),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MatchingConfig {
    #[serde(default)]
    pub policy: MatchPolicy,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatsConfig {
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub matching: MatchingConfig,
}

impl StatsConfig {
    /// Reads the TOML file when it exists, then applies environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let contents = fs::read_to_string(path)?;
            Self::from_toml(&contents)?
        } else {
            Self::default()
        };
        config.apply_env()?;
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| StatsError::Config(format!("invalid config: {e}")))
    }

    pub fn apply_env(&mut self) -> Result<()> {
        if let Some(value) = env_value("MAROC_STATS_GEOGRAPHY") {
            self.sources.geography = value.parse()?;
        }
        if let Some(value) = env_value("MAROC_STATS_RETIREES") {
            self.sources.retirees = Some(value.parse()?);
        }
        if let Some(value) = env_value("MAROC_STATS_UNEMPLOYMENT") {
            self.sources.unemployment = Some(value.parse()?);
        }
        if let Some(value) = env_value("MAROC_STATS_TIMEOUT_SECS") {
            self.fetch.timeout_secs = value
                .parse()
                .map_err(|_| StatsError::Config(format!("invalid MAROC_STATS_TIMEOUT_SECS {value}")))?;
        }
        Ok(())
    }
}

fn env_value(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
