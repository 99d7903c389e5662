//! Runtime configuration.
//!
//! Settings come from an optional TOML file, then environment variables
//! override whatever the file set. A missing or empty file yields
//! `Config::default()`. The resulting [`Config`] is built once in `main` and
//! passed by reference to everything that needs it.
use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error("Invalid value for {key}: {value:?} (expected a non-negative integer)")]
    InvalidNumber { key: &'static str, value: String },

    #[error("Invalid feed domain {0:?}")]
    InvalidDomain(String),
}

// ============================================================================
// Environment Keys
// ============================================================================

pub const ENV_FEED_DOMAIN: &str = "FEED_DOMAIN";
pub const ENV_AUTHORS: &str = "GO_COMICS_AUTHORS";
pub const ENV_MAX_AGE_DAYS: &str = "FEED_MAX_AGE_DAYS";
pub const ENV_INITIAL_FETCH_DAYS_BACK: &str = "FEED_INITIAL_FETCH_DAYS_BACK";
pub const ENV_OUTPUT_DIR: &str = "FEED_OUTPUT_DIR";

// ============================================================================
// Configuration Struct
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Host the feed is served from; used for the channel self link.
    pub host_domain: String,

    /// GoComics author slugs, trimmed, in polling order.
    #[serde(deserialize_with = "deserialize_authors")]
    pub authors: Vec<String>,

    /// Records older than this many days are pruned.
    pub max_age_days: u32,

    /// Backfill depth as written by the user. Only parsed on the backfill
    /// path (see [`Config::backfill_days`]) so a bad value can't stop polling.
    #[serde(deserialize_with = "deserialize_raw_number")]
    pub initial_fetch_days_back: Option<String>,

    /// Directory holding `feed.json` and `feed.rss`.
    pub output_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host_domain: "localhost".to_string(),
            authors: parse_authors("clayjones, michaelramirez"),
            max_age_days: 10,
            initial_fetch_days_back: None,
            output_dir: PathBuf::from("output"),
        }
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    /// Build the configuration from an optional file plus the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let base = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        base.with_env(|key| std::env::var(key).ok())
    }

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)`
    /// - Unknown keys → accepted, logged as a warning
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = std::fs::read_to_string(path)?;
        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            let known_keys = [
                "host_domain",
                "authors",
                "max_age_days",
                "initial_fetch_days_back",
                "output_dir",
            ];
            for key in raw.keys() {
                if !known_keys.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        tracing::info!(path = %path.display(), "Loaded configuration file");
        Ok(config)
    }

    /// Apply environment overrides read through `lookup`.
    ///
    /// Unset and blank variables leave the current value alone.
    pub fn with_env<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(domain) = get(ENV_FEED_DOMAIN) {
            self.host_domain = domain.trim().to_string();
        }
        if let Some(authors) = get(ENV_AUTHORS) {
            self.authors = parse_authors(&authors);
        }
        if let Some(max_age) = get(ENV_MAX_AGE_DAYS) {
            self.max_age_days = parse_days(ENV_MAX_AGE_DAYS, &max_age)?;
        }
        if let Some(days_back) = get(ENV_INITIAL_FETCH_DAYS_BACK) {
            self.initial_fetch_days_back = Some(days_back.trim().to_string());
        }
        if let Some(dir) = get(ENV_OUTPUT_DIR) {
            self.output_dir = PathBuf::from(dir.trim());
        }

        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let domain = self.host_domain.trim();
        let valid = !domain.is_empty()
            && Url::parse(&format!("https://{domain}/feed.xml"))
                .ok()
                .and_then(|url| url.host_str().map(|h| !h.is_empty()))
                .unwrap_or(false);
        if !valid {
            return Err(ConfigError::InvalidDomain(self.host_domain.clone()));
        }

        if self.authors.is_empty() {
            tracing::warn!("No authors configured, nothing will be fetched");
        }
        Ok(())
    }

    /// Parsed backfill depth, if one is configured.
    pub fn backfill_days(&self) -> Result<Option<u32>, ConfigError> {
        self.initial_fetch_days_back
            .as_deref()
            .map(|raw| parse_days(ENV_INITIAL_FETCH_DAYS_BACK, raw))
            .transpose()
    }
}

/// Split a comma-separated author list, trimming and dropping blanks.
pub fn parse_authors(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_days(key: &'static str, raw: &str) -> Result<u32, ConfigError> {
    raw.trim()
        .parse::<u32>()
        .map_err(|_| ConfigError::InvalidNumber {
            key,
            value: raw.to_string(),
        })
}

/// Authors may be written as a list or as one comma-separated string.
fn deserialize_authors<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Authors {
        List(Vec<String>),
        Joined(String),
    }

    Ok(match Authors::deserialize(deserializer)? {
        Authors::List(list) => parse_authors(&list.join(",")),
        Authors::Joined(joined) => parse_authors(&joined),
    })
}

/// Keep a number-or-string value in its textual form for deferred parsing.
fn deserialize_raw_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(i64),
        Text(String),
    }

    Ok(Option::<Raw>::deserialize(deserializer)?.map(|raw| match raw {
        Raw::Int(n) => n.to_string(),
        Raw::Text(s) => s,
    }))
}

// ============================================================================
// Tests
// ============================================================================
