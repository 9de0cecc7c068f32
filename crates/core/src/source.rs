use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;
use std::thread::sleep;
use std::time::Duration;

use reqwest::blocking::Client as HttpClient;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Result, StatsError};

/// Where an input comes from: a local file or an `http(s)` URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DataSource {
    Path(PathBuf),
    Url(String),
}

impl FromStr for DataSource {
    type Err = StatsError;

    fn from_str(value: &str) -> Result<Self> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(StatsError::Config("empty data source".to_string()));
        }
        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            Ok(DataSource::Url(trimmed.to_string()))
        } else {
            Ok(DataSource::Path(PathBuf::from(trimmed)))
        }
    }
}

impl TryFrom<String> for DataSource {
    type Error = StatsError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<DataSource> for String {
    fn from(value: DataSource) -> Self {
        value.to_string()
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSource::Path(path) => write!(f, "{}", path.display()),
            DataSource::Url(url) => f.write_str(url),
        }
    }
}

/// Timeout and bounded exponential backoff for one fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchPolicy {
    pub timeout: Duration,
    pub retries: usize,
    pub base_delay: Duration,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            retries: 2,
            base_delay: Duration::from_millis(250),
        }
    }
}

impl FetchPolicy {
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        let base = self.base_delay.as_millis().max(1) as u64;
        let exponent = attempt.saturating_sub(1).min(16) as u32;
        Duration::from_millis(base.saturating_mul(1u64 << exponent))
    }
}

/// The three inputs, fetched but not yet parsed.
#[derive(Debug, Clone, Default)]
pub struct RawInputs {
    pub geography: Vec<u8>,
    pub retirees: Option<Vec<u8>>,
    pub unemployment: Option<Vec<u8>>,
}

pub fn fetch_bytes(source: &DataSource, policy: &FetchPolicy) -> Result<Vec<u8>> {
    match source {
        DataSource::Path(path) => Ok(fs::read(path)?),
        DataSource::Url(url) => fetch_url(url, policy),
    }
}

fn fetch_url(url: &str, policy: &FetchPolicy) -> Result<Vec<u8>> {
    let client = HttpClient::builder().timeout(policy.timeout).build()?;
    let mut attempt = 0usize;
    loop {
        let result = client
            .get(url)
            .send()
            .and_then(|response| response.error_for_status())
            .and_then(|response| response.bytes());
        match result {
            Ok(bytes) => return Ok(bytes.to_vec()),
            Err(err) => {
                attempt += 1;
                if attempt > policy.retries || !is_transient(&err) {
                    return Err(err.into());
                }
                let delay = policy.delay_for_attempt(attempt);
                warn!(url, attempt, ?delay, error = %err, "fetch failed, retrying");
                sleep(delay);
            }
        }
    }
}

/// Connection failures, timeouts and 5xx answers are worth another attempt;
/// anything else fails at once.
fn is_transient(err: &reqwest::Error) -> bool {
    err.is_connect()
        || err.is_timeout()
        || err.status().is_some_and(|status| status.is_server_error())
}

/// Fetches all configured inputs concurrently. Any failure aborts the whole
/// load with [`StatsError::MissingInput`].
pub fn fetch_inputs(
    geography: &DataSource,
    retirees: Option<&DataSource>,
    unemployment: Option<&DataSource>,
    policy: &FetchPolicy,
) -> Result<RawInputs> {
    let fetch = |label: &str, source: &DataSource| {
        fetch_bytes(source, policy).map_err(|err| StatsError::missing_input(label, format!("{source}: {err}")))
    };
    let fetch_optional = |label: &str, source: Option<&DataSource>| {
        source.map(|source| fetch(label, source)).transpose()
    };
    let (geography, (retirees, unemployment)) = rayon::join(
        || fetch("geography", geography),
        || {
            rayon::join(
                || fetch_optional("retirees", retirees),
                || fetch_optional("unemployment", unemployment),
            )
        },
    );
    let inputs = RawInputs {
        geography: geography?,
        retirees: retirees?,
        unemployment: unemployment?,
    };
    info!(
        geography_bytes = inputs.geography.len(),
        retirees = inputs.retirees.is_some(),
        unemployment = inputs.unemployment.is_some(),
        "fetched inputs"
    );
    Ok(inputs)
}
