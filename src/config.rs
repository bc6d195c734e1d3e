//! Configuration types for api-harvest

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{collections::HashSet, path::Path, path::PathBuf, time::Duration};

/// Remote data source and acquisition loop settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Collection endpoint; pages are requested as `?page=<n>&pageSize=<m>`
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Value of the `User-Agent` header sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Records requested per page (default: 50)
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Record-count ceiling that ends acquisition (default: 1000)
    ///
    /// Checked after a full page has been appended, so the final record count
    /// may exceed the ceiling by up to `page_size - 1`.
    #[serde(default = "default_max_records")]
    pub max_records: usize,

    /// Hard limit on the number of pages requested (None = unlimited)
    #[serde(default)]
    pub max_pages: Option<u32>,

    /// Timeout for a single page request (default: 30 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,

    /// Retry policy for transient request failures
    #[serde(default)]
    pub retry: RetryConfig,

    /// Drop records whose value under this field was already seen
    ///
    /// None keeps every record the source returns, duplicates included.
    #[serde(default)]
    pub dedup_key: Option<String>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            user_agent: default_user_agent(),
            page_size: default_page_size(),
            max_records: default_max_records(),
            max_pages: None,
            request_timeout: default_request_timeout(),
            retry: RetryConfig::default(),
            dedup_key: None,
        }
    }
}

/// Retry behavior configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 30 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// A policy that never retries
    pub fn disabled() -> Self {
        Self {
            max_attempts: 0,
            ..Self::default()
        }
    }
}

/// Column selection for the projected table
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TableConfig {
    /// Declared columns, in output order
    #[serde(default = "default_columns")]
    pub columns: Vec<String>,

    /// Columns holding sequences of strings, flattened before export
    #[serde(default = "default_sequence_columns")]
    pub sequence_columns: Vec<String>,

    /// Display-name column; rows with a blank value are not exported
    #[serde(default = "default_key_column")]
    pub key_column: String,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            columns: default_columns(),
            sequence_columns: default_sequence_columns(),
            key_column: default_key_column(),
        }
    }
}

/// Durable output locations
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory holding the Parquet checkpoint (default: "./output/table")
    ///
    /// Every write replaces the whole directory, including files that are not
    /// part of the checkpoint. It must be a directory owned by this tool.
    #[serde(default = "default_table_dir")]
    pub table_dir: PathBuf,

    /// CSV export file (default: "./output/export.csv")
    #[serde(default = "default_csv_path")]
    pub csv_path: PathBuf,

    /// Maximum rows per Parquet shard (default: 10000)
    #[serde(default = "default_rows_per_shard")]
    pub rows_per_shard: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            table_dir: default_table_dir(),
            csv_path: default_csv_path(),
            rows_per_shard: default_rows_per_shard(),
        }
    }
}

/// Main configuration for a harvest run
///
/// Built once at startup and handed to [`crate::Pipeline`]; nothing in the
/// crate reads configuration from global state.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Remote source and acquisition loop
    #[serde(default)]
    pub source: SourceConfig,

    /// Column projection and export filter
    #[serde(default)]
    pub table: TableConfig,

    /// Checkpoint and export locations
    #[serde(default)]
    pub output: OutputConfig,
}

impl Config {
    /// Load a configuration from a JSON file
    ///
    /// Missing fields take their defaults. The result is not validated, so
    /// callers can apply overrides first and then call [`Config::validate`].
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("cannot read {}: {}", path.display(), e),
            key: None,
        })?;
        let config: Config = serde_json::from_str(&raw).map_err(|e| Error::Config {
            message: format!("cannot parse {}: {}", path.display(), e),
            key: None,
        })?;
        Ok(config)
    }

    /// Check cross-field constraints that serde cannot express
    pub fn validate(&self) -> Result<()> {
        let url = url::Url::parse(&self.source.base_url).map_err(|e| {
            Error::config("source.base_url", format!("invalid URL: {}", e))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::config(
                "source.base_url",
                format!("unsupported scheme '{}'", url.scheme()),
            ));
        }

        if self.source.page_size == 0 {
            return Err(Error::config("source.page_size", "must be positive"));
        }
        if self.source.max_records == 0 {
            return Err(Error::config("source.max_records", "must be positive"));
        }
        if self.source.max_pages == Some(0) {
            return Err(Error::config("source.max_pages", "must be positive"));
        }
        if self.source.retry.backoff_multiplier < 1.0 {
            return Err(Error::config(
                "source.retry.backoff_multiplier",
                "must be at least 1.0",
            ));
        }

        if self.table.columns.is_empty() {
            return Err(Error::config("table.columns", "at least one column is required"));
        }
        let mut seen = HashSet::new();
        for column in &self.table.columns {
            if !seen.insert(column.as_str()) {
                return Err(Error::config(
                    "table.columns",
                    format!("column '{}' is declared twice", column),
                ));
            }
        }
        for column in &self.table.sequence_columns {
            if !seen.contains(column.as_str()) {
                return Err(Error::config(
                    "table.sequence_columns",
                    format!("'{}' is not a declared column", column),
                ));
            }
        }
        if !seen.contains(self.table.key_column.as_str()) {
            return Err(Error::config(
                "table.key_column",
                format!("'{}' is not a declared column", self.table.key_column),
            ));
        }
        if self.table.sequence_columns.contains(&self.table.key_column) {
            return Err(Error::config(
                "table.key_column",
                "the key column cannot be a sequence column",
            ));
        }

        // `.`, `..` and `/` have no final component and cannot be replaced
        if self.output.table_dir.file_name().is_none() {
            return Err(Error::config(
                "output.table_dir",
                format!("'{}' cannot be replaced", self.output.table_dir.display()),
            ));
        }
        if self.output.csv_path.file_name().is_none() {
            return Err(Error::config(
                "output.csv_path",
                format!("'{}' is not a file path", self.output.csv_path.display()),
            ));
        }

        if self.output.rows_per_shard == 0 {
            return Err(Error::config("output.rows_per_shard", "must be positive"));
        }

        Ok(())
    }
}

fn default_base_url() -> String {
    "https://www.anapioficeandfire.com/api/characters".to_string()
}

fn default_user_agent() -> String {
    concat!("api-harvest/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_page_size() -> u32 {
    50
}

fn default_max_records() -> usize {
    1000
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(30)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_true() -> bool {
    true
}

fn default_columns() -> Vec<String> {
    [
        "name", "gender", "culture", "born", "died", "titles", "aliases", "playedBy", "tvSeries",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_sequence_columns() -> Vec<String> {
    ["titles", "aliases", "playedBy", "tvSeries"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_key_column() -> String {
    "name".to_string()
}

fn default_table_dir() -> PathBuf {
    PathBuf::from("./output/table")
}

fn default_csv_path() -> PathBuf {
    PathBuf::from("./output/export.csv")
}

fn default_rows_per_shard() -> usize {
    10_000
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
