//! Configuration management for session-vault.
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. Environment variables
//! 2. Configuration file (JSON)
//! 3. Default values

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Session persistence driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Driver {
    /// One file per session under a storage directory.
    #[default]
    File,
    /// Rows in a session table collaborator.
    Database,
    /// Entries in a cache collaborator.
    Cache,
    /// The client's cookie carries the payload.
    Cookie,
}

impl FromStr for Driver {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "file" => Ok(Self::File),
            "database" => Ok(Self::Database),
            "cache" => Ok(Self::Cache),
            "cookie" => Ok(Self::Cookie),
            other => Err(ConfigError::UnknownDriver(other.to_string())),
        }
    }
}

/// Session configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Persistence driver.
    pub driver: Driver,
    /// Minutes a session may stay idle before it is reclaimable.
    pub lifetime_minutes: u64,
    /// Expire the cookie when the browser closes.
    pub expire_on_close: bool,
    /// Storage directory for the file driver.
    pub files: PathBuf,
    /// Garbage-collection lottery as (chances, out_of): on average,
    /// `chances` out of every `out_of` requests trigger a sweep.
    pub lottery: (u32, u32),
    /// Session cookie settings.
    pub cookie: CookieSection,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            driver: Driver::File,
            lifetime_minutes: 120,
            expire_on_close: false,
            files: PathBuf::from("storage/sessions"),
            lottery: (2, 100),
            cookie: CookieSection::default(),
        }
    }
}

/// Session cookie configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CookieSection {
    /// Cookie name carrying the session id.
    pub name: String,
    /// Cookie path.
    pub path: String,
    /// Cookie domain, if restricted.
    pub domain: Option<String>,
    /// Only send the cookie over HTTPS.
    pub secure: bool,
    /// Hide the cookie from client-side scripts.
    pub http_only: bool,
}

impl Default for CookieSection {
    fn default() -> Self {
        Self {
            name: "app_session".to_string(),
            path: "/".to_string(),
            domain: None,
            secure: false,
            http_only: true,
        }
    }
}

impl Config {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        let config: Config = serde_json::from_str(&content).map_err(ConfigError::Json)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Ok(driver) = std::env::var("SESSION_DRIVER") {
            self.driver = driver.parse()?;
        }

        if let Ok(lifetime) = std::env::var("SESSION_LIFETIME") {
            if let Ok(lifetime) = lifetime.parse() {
                self.lifetime_minutes = lifetime;
            }
        }

        if let Ok(files) = std::env::var("SESSION_FILES") {
            if !files.is_empty() {
                self.files = PathBuf::from(files);
            }
        }

        if let Ok(name) = std::env::var("SESSION_COOKIE") {
            if !name.is_empty() {
                self.cookie.name = name;
            }
        }

        Ok(())
    }

    /// Load configuration with the full priority chain.
    ///
    /// Priority: env vars > config file > defaults
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        // Start with defaults
        let mut config = Config::default();

        // Load from config file if specified
        if let Some(path) = file {
            config = Config::from_file(path)?;
        }

        // Apply environment variable overrides (highest priority)
        config.apply_env()?;
        config.validate()?;

        Ok(config)
    }

    /// The configured lifetime in seconds, for handler `gc` calls.
    pub fn lifetime_secs(&self) -> u64 {
        self.lifetime_minutes * 60
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let (chances, out_of) = self.lottery;
        if out_of == 0 || chances > out_of {
            return Err(ConfigError::InvalidLottery { chances, out_of });
        }
        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading config file.
    Io(std::io::Error),
    /// JSON parsing error.
    Json(serde_json::Error),
    /// Unrecognized driver name.
    UnknownDriver(String),
    /// Lottery odds that make no sense.
    InvalidLottery { chances: u32, out_of: u32 },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "failed to read config file: {}", e),
            Self::Json(e) => write!(f, "failed to parse config file: {}", e),
            Self::UnknownDriver(name) => write!(f, "unknown session driver: {}", name),
            Self::InvalidLottery { chances, out_of } => {
                write!(f, "invalid gc lottery odds: {}/{}", chances, out_of)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
