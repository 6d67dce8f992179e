//! Configuration and logging setup
//!
//! Settings come from a TOML file, by default `harvest.toml` in the current directory. Every
//! setting is optional; `default_config.toml` documents them together with their defaults.

use crate::Result;
use crate::collect::CollectOptions;
use crate::harvester::HarvestMode;
use core::time::Duration;
use ohno::{IntoAppError, app_err};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use strum::{Display, EnumString};

const LOG_TARGET: &str = "    config";

/// The default configuration TOML content, embedded from `default_config.toml`
pub const DEFAULT_CONFIG_TOML: &str = include_str!("../default_config.toml");

/// Name of the configuration file looked for in the current directory.
pub const CONFIG_FILE_NAME: &str = "harvest.toml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Number of projects collected concurrently; derived from the hardware when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_count: Option<usize>,

    /// Upper bound on the wall-clock time of a whole collection batch
    #[serde(default = "default_global_timeout", with = "humantime_serde")]
    pub global_timeout: Duration,

    /// Upper bound on the collection of a single project
    #[serde(default = "default_project_timeout", with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub project_timeout: Option<Duration>,

    /// How long to wait for the result consumer to drain once a batch is over
    #[serde(default = "default_consumer_join_timeout", with = "humantime_serde")]
    pub consumer_join_timeout: Duration,

    /// How long the result consumer blocks on an empty queue before checking again
    #[serde(default = "default_queue_poll_interval", with = "humantime_serde")]
    pub queue_poll_interval: Duration,

    /// How long to stop starting new projects after the source reports rate limiting
    #[serde(default = "default_rate_limit_pause", with = "humantime_serde")]
    pub rate_limit_pause: Duration,

    /// Maximum number of error messages kept per operation block
    #[serde(default = "default_max_sampled_errors")]
    pub max_sampled_errors: usize,

    /// Where the dataset is saved between runs
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: PathBuf,

    /// Whether unchanged projects are carried over from the previous snapshot
    #[serde(default)]
    pub mode: HarvestMode,
}

const fn default_global_timeout() -> Duration {
    Duration::from_secs(30 * 60)
}

#[expect(clippy::unnecessary_wraps, reason = "serde default for an optional field")]
const fn default_project_timeout() -> Option<Duration> {
    Some(Duration::from_secs(5 * 60))
}

const fn default_consumer_join_timeout() -> Duration {
    Duration::from_secs(30)
}

const fn default_queue_poll_interval() -> Duration {
    Duration::from_secs(1)
}

const fn default_rate_limit_pause() -> Duration {
    Duration::from_secs(30)
}

const fn default_max_sampled_errors() -> usize {
    50
}

fn default_snapshot_path() -> PathBuf {
    PathBuf::from("harvest_snapshot.json")
}

impl Config {
    /// Load configuration from a file or use defaults
    ///
    /// An explicit `config_path` must exist. Without one, `harvest.toml` in the current directory
    /// is used if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or validated
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let (final_path, text) = if let Some(path) = config_path {
            let text = fs::read_to_string(path).into_app_err_with(|| format!("reading configuration file '{}'", path.display()))?;
            (path.to_path_buf(), text)
        } else {
            let path = PathBuf::from(CONFIG_FILE_NAME);
            match fs::read_to_string(&path) {
                Ok(text) => (path, text),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    log::debug!(target: LOG_TARGET, "No {CONFIG_FILE_NAME} found, using default configuration");
                    return Ok(Self::default());
                }
                Err(e) => return Err(e).into_app_err_with(|| format!("reading configuration file '{}'", path.display())),
            }
        };

        let config: Self = toml::from_str(&text).into_app_err_with(|| format!("parsing configuration file '{}'", final_path.display()))?;
        config.validate()?;

        Ok(config)
    }

    /// Save the default configuration to a TOML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written
    pub fn save_default(output_path: &Path) -> Result<()> {
        fs::write(output_path, DEFAULT_CONFIG_TOML)
            .into_app_err_with(|| format!("writing default configuration to '{}'", output_path.display()))?;
        Ok(())
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns an error if a count or duration is zero
    pub fn validate(&self) -> Result<()> {
        if self.worker_count == Some(0) {
            return Err(app_err!("worker_count must be at least 1"));
        }

        let durations = [
            ("global_timeout", Some(self.global_timeout)),
            ("project_timeout", self.project_timeout),
            ("consumer_join_timeout", Some(self.consumer_join_timeout)),
            ("queue_poll_interval", Some(self.queue_poll_interval)),
            ("rate_limit_pause", Some(self.rate_limit_pause)),
        ];
        for (name, value) in durations {
            if value.is_some_and(|d| d.is_zero()) {
                return Err(app_err!("{} must be greater than zero", name));
            }
        }

        if self.snapshot_path.as_os_str().is_empty() {
            return Err(app_err!("snapshot_path must not be empty"));
        }

        Ok(())
    }

    /// The collection tuning described by this configuration.
    #[must_use]
    pub fn collect_options(&self) -> CollectOptions {
        CollectOptions {
            worker_count: self.worker_count.unwrap_or_else(CollectOptions::default_worker_count).max(1),
            global_timeout: self.global_timeout,
            project_timeout: self.project_timeout,
            consumer_join_timeout: self.consumer_join_timeout,
            queue_poll_interval: self.queue_poll_interval,
            rate_limit_pause: self.rate_limit_pause,
            max_sampled_errors: self.max_sampled_errors,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            worker_count: None,
            global_timeout: default_global_timeout(),
            project_timeout: default_project_timeout(),
            consumer_join_timeout: default_consumer_join_timeout(),
            queue_poll_interval: default_queue_poll_interval(),
            rate_limit_pause: default_rate_limit_pause(),
            max_sampled_errors: default_max_sampled_errors(),
            snapshot_path: default_snapshot_path(),
            mode: HarvestMode::default(),
        }
    }
}

/// Log level for diagnostic output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum LogLevel {
    /// No logging output
    None,

    /// Only error messages
    Error,

    /// Warning and error messages
    #[default]
    Warn,

    /// Info, warning, and error messages
    Info,

    /// Debug, info, warning, and error messages
    Debug,

    /// Trace, debug, info, warning, and error messages
    Trace,
}

/// Install an `env_logger` backend at `log_level`, unless `RUST_LOG` says otherwise.
///
/// Returns `false` if logging is disabled or a logger was already installed.
pub fn init_logging(log_level: LogLevel) -> bool {
    let level = match log_level {
        LogLevel::None => return false,
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    };

    let env = env_logger::Env::default().filter_or("RUST_LOG", level);

    env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .format_module_path(false)
        .format_target(matches!(log_level, LogLevel::Debug | LogLevel::Trace))
        .try_init()
        .is_ok()
}
