//! `liftscan.toml` configuration.

use std::path::PathBuf;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use liftscan_toolchains::ToolchainSettings;
use serde::Deserialize;

use crate::limits::RecordLimit;
use crate::{Error, Result};

/// File looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "liftscan.toml";

/// Top-level configuration. Every section is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// History walking.
    pub scan: ScanConfig,
    /// Record caps.
    pub limits: LimitsConfig,
    /// Output locations.
    pub output: OutputConfig,
    /// External toolchains.
    pub toolchain: ToolchainConfig,
}

/// `[scan]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScanConfig {
    /// Commits fetched per shallow clone.
    pub depth: u32,
    /// Repositories scanned concurrently.
    pub workers: usize,
    /// File extensions considered, without the dot.
    pub extensions: Vec<String>,
    /// Base URL that repository slugs are appended to.
    pub host: String,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            depth: 500,
            workers: 8,
            extensions: vec!["rs".to_owned()],
            host: "https://github.com".to_owned(),
        }
    }
}

/// `[limits]` section. Zero disables a cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LimitsConfig {
    /// Records kept per repository.
    pub per_repository: usize,
    /// Records kept across the whole scan.
    pub total: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            per_repository: 20,
            total: 0,
        }
    }
}

impl LimitsConfig {
    /// Caps as used by the miner.
    #[must_use]
    pub const fn record_limit(&self) -> RecordLimit {
        RecordLimit {
            per_repository: nonzero(self.per_repository),
            total: nonzero(self.total),
        }
    }
}

/// `[output]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    /// JSON Lines record stream.
    pub records: Utf8PathBuf,
    /// Root of annotated snapshots.
    pub artifacts: Utf8PathBuf,
    /// Root of toolchain outputs.
    pub converted: Utf8PathBuf,
    /// Root of full working-tree checkouts.
    pub checkouts: Utf8PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            records: Utf8PathBuf::from("extracts.jsonl"),
            artifacts: Utf8PathBuf::from("annotated"),
            converted: Utf8PathBuf::from("converted"),
            checkouts: Utf8PathBuf::from("checkouts"),
        }
    }
}

/// `[toolchain]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolchainConfig {
    /// charon executable.
    pub charon: PathBuf,
    /// aeneas executable.
    pub aeneas: PathBuf,
    /// Budget per invocation, in seconds.
    pub timeout_secs: u64,
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            charon: PathBuf::from("charon"),
            aeneas: PathBuf::from("aeneas"),
            timeout_secs: 120,
        }
    }
}

impl ToolchainConfig {
    /// Settings for the process-backed toolchains.
    #[must_use]
    pub fn settings(&self) -> ToolchainSettings {
        ToolchainSettings {
            charon: self.charon.clone(),
            aeneas: self.aeneas.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}

impl Config {
    /// Parse and validate configuration text. `origin` is used in errors.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for malformed TOML and
    /// [`Error::InvalidConfig`] for out-of-range values.
    pub fn parse(text: &str, origin: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).map_err(|source| Error::Config {
            path: origin.to_owned(),
            source,
        })?;
        config.validate(origin)?;
        Ok(config)
    }

    /// Load `path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] when the file cannot be read, or any error of
    /// [`Config::parse`].
    pub fn load(path: &Utf8Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_string(),
            source,
        })?;
        Self::parse(&text, path.as_str())
    }

    /// Load `path` if given, else [`DEFAULT_CONFIG_FILE`] when it exists,
    /// else the defaults.
    ///
    /// # Errors
    ///
    /// See [`Config::load`].
    pub fn discover(path: Option<&Utf8Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None if Utf8Path::new(DEFAULT_CONFIG_FILE).is_file() => {
                Self::load(Utf8Path::new(DEFAULT_CONFIG_FILE))
            }
            None => Ok(Self::default()),
        }
    }

    fn validate(&self, origin: &str) -> Result<()> {
        let invalid = |message: &str| Error::InvalidConfig {
            path: origin.to_owned(),
            message: message.to_owned(),
        };
        if self.scan.workers == 0 {
            return Err(invalid("scan.workers must be > 0"));
        }
        if self.scan.extensions.is_empty() {
            return Err(invalid("scan.extensions must not be empty"));
        }
        if self.toolchain.timeout_secs == 0 {
            return Err(invalid("toolchain.timeout_secs must be > 0"));
        }
        Ok(())
    }
}

const fn nonzero(value: usize) -> Option<usize> {
    if value == 0 {
        None
    } else {
        Some(value)
    }
}
