//! Layered configuration.
//!
//! Values are merged, lowest priority first, from the serde defaults, a
//! configuration file and `PANTRY_`-prefixed environment variables (nested
//! keys separated by `__`, e.g. `PANTRY_JOBS__PROGRESS_INTERVAL_MS`).

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use figment::Figment;
use figment::providers::{Env, Format, Json, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::num::NonZeroU64;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_PREFIX: &str = "PANTRY_";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding the raw record segment files.
    pub recordings_dir: PathBuf,
    /// Encoder executable.
    #[serde(default = "default_cook_script")]
    pub cook_script: PathBuf,
    /// Directory the encoder runs from; defaults to the one containing it.
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
    /// Where asynchronous jobs write cooked files.
    #[serde(default = "std::env::temp_dir")]
    pub output_dir: PathBuf,
    #[serde(default)]
    pub jobs: JobsConfig,
    #[serde(default)]
    pub object_store: Option<ObjectStoreConfig>,
    #[serde(default)]
    pub notifier: Option<NotifierConfig>,
}

fn default_cook_script() -> PathBuf {
    PathBuf::from("cook.sh")
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobsConfig {
    pub progress_interval_ms: u64,
    /// Publish the written byte count once every this many chunks.
    pub write_data_sampling_rate: u64,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            progress_interval_ms: 2000,
            write_data_sampling_rate: 100,
        }
    }
}

impl JobsConfig {
    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }

    pub fn sampling_rate(&self) -> Result<NonZeroU64> {
        NonZeroU64::new(self.write_data_sampling_rate).ok_or_else(|| {
            exn::Exn::from(ErrorKind::Invalid("jobs.write_data_sampling_rate must be greater than 0".to_string()))
        })
    }
}

/// Remote tier the records are archived on.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ObjectStoreConfig {
    /// A directory, typically a mounted network share.
    Local { path: PathBuf },
    S3 {
        bucket: String,
        #[serde(default)]
        prefix: Option<String>,
        region: String,
        #[serde(default)]
        endpoint: Option<String>,
        key_id: String,
        key_secret: String,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum NotifierConfig {
    /// Write job events to the log.
    Log,
}

impl Config {
    /// Default configuration file location, e.g. `~/.config/pantry/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "pantry").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Assemble every provider without extracting anything.
    ///
    /// An explicit `path` must exist; the default location is optional.
    pub fn figment(path: Option<&Path>) -> Result<Figment> {
        let file = match path {
            Some(path) if !path.is_file() => exn::bail!(ErrorKind::NotFound(path.display().to_string())),
            Some(path) => Some(path.to_path_buf()),
            None => Self::default_path().filter(|path| path.is_file()),
        };
        let mut figment = Figment::new();
        if let Some(file) = file {
            tracing::debug!(path = %file.display(), "Loading configuration file");
            figment = match file.extension().and_then(|ext| ext.to_str()) {
                Some("yaml" | "yml") => figment.merge(Yaml::file(file)),
                Some("json") => figment.merge(Json::file(file)),
                _ => figment.merge(Toml::file(file)),
            };
        }
        Ok(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    /// Load and validate the configuration.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config: Config =
            Self::figment(path)?.extract().map_err(|e| ErrorKind::Load(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.recordings_dir.as_os_str().is_empty() {
            exn::bail!(ErrorKind::Invalid("recordings_dir must not be empty".to_string()));
        }
        if self.jobs.progress_interval_ms == 0 {
            exn::bail!(ErrorKind::Invalid("jobs.progress_interval_ms must be greater than 0".to_string()));
        }
        self.jobs.sampling_rate()?;
        if let Some(ObjectStoreConfig::S3 { bucket, .. }) = &self.object_store
            && bucket.is_empty()
        {
            exn::bail!(ErrorKind::Invalid("object_store.bucket must not be empty".to_string()));
        }
        Ok(())
    }
}
