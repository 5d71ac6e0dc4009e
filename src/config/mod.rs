//! Configuration management for the playlist checker
//!
//! Settings come from built-in defaults, an optional TOML file, and
//! `IPTV_CHECKER_*` environment variables, in increasing precedence. The CLI
//! applies its flags on top before calling [`Config::validate`].

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::probe::ProbeConfig;
use crate::scheduler::SchedulerConfig;
use crate::storage::OutputLayout;
use crate::utils::retry::RetryConfig;

/// Prefix of every environment override
pub const ENV_PREFIX: &str = "IPTV_CHECKER_";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Probe and scheduler settings
    pub checker: CheckerConfig,

    /// Input decoding
    pub input: InputConfig,

    /// Output naming and filtering
    pub output: OutputConfig,

    /// Summary report
    pub report: ReportConfig,

    /// Skipping already checked playlists
    pub resume: ResumeConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Probe and scheduler settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckerConfig {
    /// Per-probe timeout in seconds
    pub timeout_secs: f64,

    /// TCP connect timeout for HTTP probes in seconds
    pub connect_timeout_secs: f64,

    /// Maximum probes in flight per shard worker
    pub concurrent: usize,

    /// Number of shard workers
    pub processes: usize,

    /// Extra attempts for timed-out or errored channels
    pub max_retries: u32,

    /// Base backoff between attempts in milliseconds
    pub retry_base_delay_ms: u64,

    /// Backoff cap in milliseconds
    pub retry_max_delay_ms: u64,

    /// Re-runs allowed for a failed shard worker
    pub shard_attempts: u32,

    /// Idle HTTP connections kept per host
    pub max_connections_per_host: usize,

    /// User agent string
    pub user_agent: String,
}

/// Input decoding
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Encoding labels tried in order
    pub encodings: Vec<String>,
}

/// Output naming and filtering
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// File name prefix of every output playlist
    pub prefix: String,

    /// Directory for working playlists (default: next to the input)
    pub working_dir: Option<PathBuf>,

    /// Directory for broken playlists (default: next to the input)
    pub broken_dir: Option<PathBuf>,

    /// Write only the working playlist
    pub working_only: bool,

    /// Write only the broken playlist
    pub broken_only: bool,
}

/// Summary report
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Print the most frequent failure reasons
    pub show_errors: bool,

    /// How many failure reasons to print
    pub max_errors_to_show: usize,

    /// Log progress every N checked channels
    pub progress_interval: usize,
}

/// Skipping already checked playlists
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResumeConfig {
    /// Skip inputs whose outputs already account for every channel
    pub enabled: bool,

    /// Remove outputs of incomplete runs before re-checking
    pub auto_cleanup_incomplete: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,

    /// Also append logs to this file
    pub file: Option<PathBuf>,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10.0,
            connect_timeout_secs: 5.0,
            concurrent: 5,
            processes: 1,
            max_retries: 1,
            retry_base_delay_ms: 500,
            retry_max_delay_ms: 5_000,
            shard_attempts: 2,
            max_connections_per_host: 20,
            user_agent: format!("iptv-checker/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            encodings: vec![
                String::from("utf-8"),
                String::from("windows-1251"),
                String::from("iso-8859-1"),
            ],
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            prefix: String::from("checked"),
            working_dir: None,
            broken_dir: None,
            working_only: false,
            broken_only: false,
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            show_errors: true,
            max_errors_to_show: 10,
            progress_interval: 50,
        }
    }
}

impl Default for ResumeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            auto_cleanup_incomplete: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: String::from("text"),
            file: None,
        }
    }
}

impl Config {
    /// Load configuration from a file, or defaults when `path` is `None`,
    /// then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env()?;
        Ok(config)
    }

    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;

        Ok(config)
    }

    /// Load configuration from environment variables on top of defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Override settings from `IPTV_CHECKER_*` environment variables
    pub fn apply_env(&mut self) -> Result<()> {
        if let Some(timeout) = env_parse::<f64>("TIMEOUT")? {
            self.checker.timeout_secs = timeout;
        }
        if let Some(concurrent) = env_parse::<usize>("CONCURRENT")? {
            self.checker.concurrent = concurrent;
        }
        if let Some(processes) = env_parse::<usize>("PROCESSES")? {
            self.checker.processes = processes;
        }
        if let Some(prefix) = env_var("OUTPUT_PREFIX") {
            self.output.prefix = prefix;
        }
        if let Some(level) = env_var("LOG_LEVEL") {
            self.logging.level = level;
        }
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if !(self.checker.timeout_secs.is_finite() && self.checker.timeout_secs > 0.0) {
            anyhow::bail!("timeout_secs must be positive");
        }

        if !(self.checker.connect_timeout_secs.is_finite()
            && self.checker.connect_timeout_secs > 0.0)
        {
            anyhow::bail!("connect_timeout_secs must be positive");
        }

        if self.checker.concurrent == 0 {
            anyhow::bail!("concurrent must be greater than 0");
        }

        if self.checker.processes == 0 {
            anyhow::bail!("processes must be greater than 0");
        }

        if self.output.prefix.trim().is_empty() {
            anyhow::bail!("output prefix must not be empty");
        }

        if self.output.working_only && self.output.broken_only {
            anyhow::bail!("working_only and broken_only are mutually exclusive");
        }

        if self.input.encodings.is_empty() {
            anyhow::bail!("at least one input encoding is required");
        }

        for label in &self.input.encodings {
            if encoding_rs::Encoding::for_label(label.as_bytes()).is_none() {
                anyhow::bail!("unknown input encoding: {label}");
            }
        }

        if !matches!(self.logging.format.as_str(), "text" | "json") {
            anyhow::bail!("logging format must be 'text' or 'json'");
        }

        Ok(())
    }

    /// Get probe timeout as Duration
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.checker.timeout_secs)
    }

    /// Settings for the network prober
    #[must_use]
    pub fn probe_config(&self) -> ProbeConfig {
        ProbeConfig {
            timeout: self.timeout(),
            connect_timeout: Duration::from_secs_f64(self.checker.connect_timeout_secs),
            user_agent: self.checker.user_agent.clone(),
            pool_idle_per_host: self.checker.max_connections_per_host,
            ..ProbeConfig::default()
        }
    }

    /// Settings for the concurrency scheduler
    #[must_use]
    pub fn scheduler_config(&self) -> SchedulerConfig {
        let probe_retry = RetryConfig {
            max_retries: self.checker.max_retries,
            base_delay_ms: self.checker.retry_base_delay_ms,
            max_delay_ms: self.checker.retry_max_delay_ms,
            ..RetryConfig::default()
        };
        let shard_retry = RetryConfig {
            max_retries: self.checker.shard_attempts,
            ..probe_retry.clone()
        };

        SchedulerConfig {
            processes: self.checker.processes,
            concurrent: self.checker.concurrent,
            timeout: self.timeout(),
            probe_retry,
            shard_retry,
        }
    }

    /// Output file naming
    #[must_use]
    pub fn output_layout(&self) -> OutputLayout {
        OutputLayout {
            prefix: self.output.prefix.clone(),
            working_dir: self.output.working_dir.clone(),
            broken_dir: self.output.broken_dir.clone(),
        }
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(format!("{ENV_PREFIX}{name}"))
        .ok()
        .filter(|v| !v.trim().is_empty())
}

fn env_parse<T>(name: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    env_var(name)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .with_context(|| format!("Invalid value for {ENV_PREFIX}{name}: {raw}"))
        })
        .transpose()
}
