use std::collections::BTreeSet;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use http::Uri;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config file {path:?} failed, {err}")]
    Read { path: PathBuf, err: std::io::Error },

    #[error("parse config file {path:?} failed, {err}")]
    Parse {
        path: PathBuf,
        err: serde_yaml::Error,
    },

    #[error(
        "the number of api urls ({urls}) differs from the number of output files ({outputs})"
    )]
    LengthMismatch { urls: usize, outputs: usize },

    #[error("at least one api url is required")]
    NoSources,

    #[error("refresh interval must be a positive number of seconds")]
    ZeroInterval,

    #[error("request timeout must be a positive number of seconds")]
    ZeroTimeout,

    #[error("refresh interval {0}s is longer than the maximum of {max}s", max = MAX_INTERVAL.as_secs())]
    IntervalTooLarge(u64),

    #[error("request timeout {0}s is longer than the maximum of {max}s", max = MAX_INTERVAL.as_secs())]
    TimeoutTooLarge(u64),

    #[error("invalid api url {url:?}, {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("output file {0:?} is used by more than one source")]
    DuplicateOutput(PathBuf),

    #[error("metrics path must start with '/', got {0:?}")]
    InvalidMetricsPath(String),
}

/// What happens to the other discovery loops when one of them is cancelled.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CancelPolicy {
    /// Loops only stop when the whole process shuts down, or when they are
    /// cancelled one by one.
    #[default]
    Independent,

    /// Cancellation of any loop cancels all of them.
    Siblings,
}

impl FromStr for CancelPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "independent" => Ok(CancelPolicy::Independent),
            "siblings" => Ok(CancelPolicy::Siblings),
            _ => Err(format!(
                "unknown cancel policy {s:?}, expect \"independent\" or \"siblings\""
            )),
        }
    }
}

/// The longest refresh interval and request timeout accepted, one week.
pub const MAX_INTERVAL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

fn default_api_urls() -> Vec<String> {
    vec!["http://localhost:8080".to_string()]
}

fn default_output_files() -> Vec<PathBuf> {
    vec![PathBuf::from("custom_sd.json")]
}

const fn default_refresh_interval() -> u64 {
    60
}

fn default_metrics_address() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct MetricsConfig {
    /// The address the metrics server binds to.
    #[serde(default = "default_metrics_address")]
    pub address: SocketAddr,

    /// The path metrics are served on.
    #[serde(default = "default_metrics_path")]
    pub path: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        MetricsConfig {
            address: default_metrics_address(),
            path: default_metrics_path(),
        }
    }
}

/// Process level configuration, read from a YAML file and/or command line
/// flags. `api_urls` and `output_files` are paired by position.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// The urls the HTTP service discovery APIs are listening on.
    #[serde(default = "default_api_urls")]
    pub api_urls: Vec<String>,

    /// Output files for the file_sd compatible target files.
    #[serde(default = "default_output_files")]
    pub output_files: Vec<PathBuf>,

    /// Interval to re-read the instance list, in seconds.
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval: u64,

    /// Timeout of one request in seconds, the refresh interval is used
    /// if not set.
    #[serde(default)]
    pub request_timeout: Option<u64>,

    #[serde(default)]
    pub cancel_policy: CancelPolicy,

    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            api_urls: default_api_urls(),
            output_files: default_output_files(),
            refresh_interval: default_refresh_interval(),
            request_timeout: None,
            cancel_policy: CancelPolicy::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

/// Everything one discovery loop needs to know.
#[derive(Clone, Debug, PartialEq)]
pub struct DiscoveryConfig {
    /// The url as configured, used for logs and metric labels.
    pub api_url: String,
    pub uri: Uri,
    pub output_file: PathBuf,
    pub refresh_interval: Duration,
    pub request_timeout: Duration,
}

impl Config {
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|err| ConfigError::Read {
            path: path.to_path_buf(),
            err,
        })?;

        serde_yaml::from_str(&content).map_err(|err| ConfigError::Parse {
            path: path.to_path_buf(),
            err,
        })
    }

    /// Validate the whole config and pair urls with output files.
    pub fn sources(&self) -> Result<Vec<DiscoveryConfig>, ConfigError> {
        if self.api_urls.len() != self.output_files.len() {
            return Err(ConfigError::LengthMismatch {
                urls: self.api_urls.len(),
                outputs: self.output_files.len(),
            });
        }

        if self.api_urls.is_empty() {
            return Err(ConfigError::NoSources);
        }

        if self.refresh_interval == 0 {
            return Err(ConfigError::ZeroInterval);
        }
        if self.refresh_interval > MAX_INTERVAL.as_secs() {
            return Err(ConfigError::IntervalTooLarge(self.refresh_interval));
        }
        let refresh_interval = Duration::from_secs(self.refresh_interval);

        let request_timeout = match self.request_timeout {
            Some(0) => return Err(ConfigError::ZeroTimeout),
            Some(secs) if secs > MAX_INTERVAL.as_secs() => {
                return Err(ConfigError::TimeoutTooLarge(secs));
            }
            Some(secs) => Duration::from_secs(secs),
            None => refresh_interval,
        };

        if !self.metrics.path.starts_with('/') {
            return Err(ConfigError::InvalidMetricsPath(self.metrics.path.clone()));
        }

        let mut outputs = BTreeSet::new();
        self.api_urls
            .iter()
            .zip(&self.output_files)
            .map(|(api_url, output_file)| {
                if !outputs.insert(output_file) {
                    return Err(ConfigError::DuplicateOutput(output_file.clone()));
                }

                Ok(DiscoveryConfig {
                    api_url: api_url.clone(),
                    uri: parse_api_url(api_url)?,
                    output_file: output_file.clone(),
                    refresh_interval,
                    request_timeout,
                })
            })
            .collect()
    }
}

fn parse_api_url(api_url: &str) -> Result<Uri, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidUrl {
        url: api_url.to_string(),
        reason,
    };

    let url = Url::parse(api_url).map_err(|err| invalid(err.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme {:?}", url.scheme())));
    }
    if url.host_str().is_none() {
        return Err(invalid("host is required".to_string()));
    }

    Uri::try_from(url.as_str()).map_err(|err| invalid(err.to_string()))
}
