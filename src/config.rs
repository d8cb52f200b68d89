//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use crate::integrations::{CsvSourceConfig, SheetsConfig};
use crate::pack::AbnormalLimits;
use crate::refresh::RefreshPolicy;
use crate::telegram::TelegramConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub pack: PackConfig,

    #[serde(default)]
    pub limits: AbnormalLimits,

    #[serde(default)]
    pub refresh: RefreshConfig,

    #[serde(default)]
    pub telegram: TelegramSettings,

    #[serde(default)]
    pub source: SourceConfig,

    #[serde(default)]
    pub interactions: InteractionsConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Pack topology
#[derive(Debug, Clone, Deserialize)]
pub struct PackConfig {
    /// Number of cells in each segment, in wiring order
    #[serde(default = "default_cells_per_segment")]
    pub cells_per_segment: Vec<usize>,
}

fn default_cells_per_segment() -> Vec<usize> {
    vec![18; 6]
}

impl Default for PackConfig {
    fn default() -> Self {
        Self {
            cells_per_segment: default_cells_per_segment(),
        }
    }
}

/// Refresh policy configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RefreshConfig {
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: u64,
}

fn default_interval_minutes() -> u64 {
    30
}

/// Longest accepted refresh interval (one week)
pub const MAX_REFRESH_INTERVAL_MINUTES: u64 = 7 * 24 * 60;

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval_minutes: default_interval_minutes(),
        }
    }
}

impl RefreshConfig {
    /// Refresh policy for the configured interval
    pub fn policy(&self) -> Result<RefreshPolicy, ConfigError> {
        if self.interval_minutes > MAX_REFRESH_INTERVAL_MINUTES {
            return Err(ConfigError::Invalid(format!(
                "refresh.interval_minutes is {}, the maximum is {}",
                self.interval_minutes, MAX_REFRESH_INTERVAL_MINUTES
            )));
        }
        RefreshPolicy::every_minutes(self.interval_minutes).ok_or_else(|| {
            ConfigError::Invalid(format!(
                "refresh.interval_minutes {} is out of range",
                self.interval_minutes
            ))
        })
    }
}

/// Telegram bot configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TelegramSettings {
    /// Bot token; takes precedence over `token_file`
    pub token: Option<String>,

    /// File holding the bot token
    pub token_file: Option<PathBuf>,

    #[serde(default = "default_telegram_api_url")]
    pub api_url: String,

    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_secs: u64,
}

fn default_telegram_api_url() -> String {
    "https://api.telegram.org".to_string()
}

fn default_poll_timeout() -> u64 {
    30
}

impl Default for TelegramSettings {
    fn default() -> Self {
        Self {
            token: None,
            token_file: None,
            api_url: default_telegram_api_url(),
            poll_timeout_secs: default_poll_timeout(),
        }
    }
}

impl TelegramSettings {
    /// Resolve the bot token from `token` or `token_file`
    pub fn resolve_token(&self) -> Result<String, ConfigError> {
        if let Some(token) = self.token.as_ref().filter(|t| !t.trim().is_empty()) {
            return Ok(token.trim().to_string());
        }

        let path = self
            .token_file
            .as_ref()
            .ok_or_else(|| ConfigError::Invalid("no Telegram bot token configured".to_string()))?;

        let token = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.clone(),
            error: e.to_string(),
        })?;

        let token = token.trim().to_string();
        if token.is_empty() {
            return Err(ConfigError::Invalid(format!(
                "token file {:?} is empty",
                path
            )));
        }
        Ok(token)
    }

    /// Client configuration with the token resolved
    pub fn client_config(&self) -> Result<TelegramConfig, ConfigError> {
        Ok(TelegramConfig {
            api_url: self.api_url.clone(),
            token: self.resolve_token()?,
            poll_timeout_secs: self.poll_timeout_secs,
        })
    }
}

/// Which reading source to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    #[default]
    Sheets,
    Csv,
}

/// Reading source configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourceConfig {
    #[serde(default)]
    pub kind: SourceKind,

    #[serde(default)]
    pub sheets: SheetsSettings,

    #[serde(default)]
    pub csv: CsvSettings,
}

/// Google Sheets source configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SheetsSettings {
    #[serde(default = "default_sheets_url")]
    pub base_url: String,

    /// One spreadsheet per segment, in segment order
    #[serde(default)]
    pub segment_spreadsheet_ids: Vec<String>,

    #[serde(default = "default_sheets_range")]
    pub range: String,

    pub api_key: Option<String>,

    pub access_token: Option<String>,

    #[serde(default = "default_sheets_timeout")]
    pub request_timeout_secs: u64,
}

fn default_sheets_url() -> String {
    "https://sheets.googleapis.com".to_string()
}

fn default_sheets_range() -> String {
    "A2:S5001".to_string()
}

fn default_sheets_timeout() -> u64 {
    15
}

impl Default for SheetsSettings {
    fn default() -> Self {
        Self {
            base_url: default_sheets_url(),
            segment_spreadsheet_ids: Vec::new(),
            range: default_sheets_range(),
            api_key: None,
            access_token: None,
            request_timeout_secs: default_sheets_timeout(),
        }
    }
}

impl From<&SheetsSettings> for SheetsConfig {
    fn from(settings: &SheetsSettings) -> Self {
        SheetsConfig {
            base_url: settings.base_url.clone(),
            segment_spreadsheet_ids: settings.segment_spreadsheet_ids.clone(),
            range: settings.range.clone(),
            api_key: settings.api_key.clone(),
            access_token: settings.access_token.clone(),
            request_timeout_secs: settings.request_timeout_secs,
        }
    }
}

/// Local CSV source configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CsvSettings {
    /// Directory holding `segment_{n}.csv` files
    #[serde(default = "default_csv_dir")]
    pub directory: PathBuf,

    /// Explicit per-segment files; overrides `directory` when not empty
    #[serde(default)]
    pub segment_files: Vec<PathBuf>,

    #[serde(default = "default_csv_header")]
    pub has_header: bool,
}

fn default_csv_dir() -> PathBuf {
    PathBuf::from("./readings")
}

fn default_csv_header() -> bool {
    true
}

impl Default for CsvSettings {
    fn default() -> Self {
        Self {
            directory: default_csv_dir(),
            segment_files: Vec::new(),
            has_header: default_csv_header(),
        }
    }
}

impl CsvSettings {
    /// Source configuration for a pack of `segment_count` segments
    pub fn source_config(&self, segment_count: usize) -> CsvSourceConfig {
        let segment_files = if self.segment_files.is_empty() {
            (1..=segment_count)
                .map(|n| self.directory.join(format!("segment_{}.csv", n)))
                .collect()
        } else {
            self.segment_files.clone()
        };

        CsvSourceConfig {
            segment_files,
            has_header: self.has_header,
        }
    }
}

/// Interaction log configuration
#[derive(Debug, Clone, Deserialize)]
pub struct InteractionsConfig {
    #[serde(default = "default_interactions_enabled")]
    pub enabled: bool,

    #[serde(default = "default_interactions_dir")]
    pub log_dir: String,
}

fn default_interactions_enabled() -> bool {
    true
}

fn default_interactions_dir() -> String {
    dirs::data_local_dir()
        .map(|p| p.join("bms-bot").join("interactions").to_string_lossy().to_string())
        .unwrap_or_else(|| "./bms_bot_data/interactions".to_string())
}

impl Default for InteractionsConfig {
    fn default() -> Self {
        Self {
            enabled: default_interactions_enabled(),
            log_dir: default_interactions_dir(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,

    pub file: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            file: None,
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::parse(&content).map_err(|e| match e {
            ConfigError::Parse { error, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                error,
            },
            other => other,
        })
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: PathBuf::new(),
            error: e.to_string(),
        })
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("bms-bot").join("config.toml")),
            Some(PathBuf::from("/etc/bms-bot/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        for path_opt in config_paths.iter().flatten() {
            if path_opt.exists() {
                match Self::load_with_env(path_opt) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path_opt);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path_opt, e);
                    }
                }
            }
        }

        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from any key lookup (the environment in production)
    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        // Telegram overrides
        if let Some(token) = lookup("BMS_TELEGRAM_TOKEN") {
            self.telegram.token = Some(token);
        }
        if let Some(path) = lookup("BMS_TELEGRAM_TOKEN_FILE") {
            self.telegram.token_file = Some(PathBuf::from(path));
        }

        // Refresh overrides
        if let Some(minutes) = lookup("BMS_REFRESH_INTERVAL_MINUTES") {
            match minutes.parse() {
                Ok(m) => self.refresh.interval_minutes = m,
                Err(_) => tracing::warn!("Ignoring invalid BMS_REFRESH_INTERVAL_MINUTES: {}", minutes),
            }
        }

        // Source overrides
        if let Some(kind) = lookup("BMS_SOURCE") {
            match kind.to_lowercase().as_str() {
                "sheets" => self.source.kind = SourceKind::Sheets,
                "csv" => self.source.kind = SourceKind::Csv,
                other => tracing::warn!("Ignoring unknown BMS_SOURCE: {}", other),
            }
        }
        if let Some(key) = lookup("BMS_SHEETS_API_KEY") {
            self.source.sheets.api_key = Some(key);
        }
        if let Some(token) = lookup("BMS_SHEETS_ACCESS_TOKEN") {
            self.source.sheets.access_token = Some(token);
        }
        if let Some(dir) = lookup("BMS_CSV_DIR") {
            self.source.csv.directory = PathBuf::from(dir);
        }

        // Interaction log overrides
        if let Some(dir) = lookup("BMS_INTERACTION_LOG_DIR") {
            self.interactions.log_dir = dir;
        }

        // Logging overrides
        if let Some(level) = lookup("BMS_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("BMS_LOG_FORMAT") {
            self.logging.format = format;
        }
    }

    /// Check values that deserialize fine but cannot run
    pub fn validate(&self) -> Result<(), ConfigError> {
        let topology = &self.pack.cells_per_segment;
        if topology.is_empty() {
            return Err(ConfigError::Invalid(
                "pack.cells_per_segment must list at least one segment".to_string(),
            ));
        }
        if let Some(position) = topology.iter().position(|&n| n == 0) {
            return Err(ConfigError::Invalid(format!(
                "segment {} has no cells",
                position + 1
            )));
        }

        self.refresh.policy()?;

        if self.limits.min_voltage_mv >= self.limits.max_voltage_mv {
            return Err(ConfigError::Invalid(
                "limits.min_voltage_mv must be below limits.max_voltage_mv".to_string(),
            ));
        }

        if self.source.kind == SourceKind::Sheets {
            let ids = self.source.sheets.segment_spreadsheet_ids.len();
            if ids < topology.len() {
                return Err(ConfigError::Invalid(format!(
                    "source.sheets.segment_spreadsheet_ids has {} entries for {} segments",
                    ids,
                    topology.len()
                )));
            }
        }

        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            return Err(ConfigError::Invalid(format!(
                "logging.format must be \"pretty\" or \"json\", got {:?}",
                self.logging.format
            )));
        }

        Ok(())
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# BMS Bot Configuration
#
# Environment variables override these settings:
# - BMS_TELEGRAM_TOKEN / BMS_TELEGRAM_TOKEN_FILE
# - BMS_REFRESH_INTERVAL_MINUTES
# - BMS_SOURCE (sheets or csv)
# - BMS_SHEETS_API_KEY / BMS_SHEETS_ACCESS_TOKEN
# - BMS_CSV_DIR
# - BMS_INTERACTION_LOG_DIR
# - BMS_LOG_LEVEL
# - BMS_LOG_FORMAT

[pack]
# Number of cells in each segment, in wiring order
cells_per_segment = [18, 18, 18, 18, 18, 18]

[limits]
# Cells outside these bounds are reported by /alerts
min_voltage_mv = 3500.0
max_voltage_mv = 4200.0
max_temperature_c = 60.0

[refresh]
# Minimum minutes between two fetches from the source
interval_minutes = 30

[telegram]
# Bot token from BotFather, or a file holding it
# token = ""
# token_file = "/etc/bms-bot/bot_token"
api_url = "https://api.telegram.org"

# Long polling timeout in seconds
poll_timeout_secs = 30

[source]
# Where readings come from: sheets or csv
kind = "sheets"

[source.sheets]
base_url = "https://sheets.googleapis.com"

# One spreadsheet per segment, in segment order
segment_spreadsheet_ids = []

# Column A holds the sample time, the next columns one voltage per cell
range = "A2:S5001"

# API key for link-shared sheets, or a pre-issued OAuth access token
# api_key = ""
# access_token = ""

request_timeout_secs = 15

[source.csv]
# Directory holding segment_1.csv, segment_2.csv, ...
directory = "./readings"
has_header = true

[interactions]
# Record users and commands to CSV files
enabled = true
# log_dir = "~/.local/share/bms-bot/interactions"

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"

# Optional log file path
# file = "/var/log/bms-bot/bms-bot.log"
"#
    .to_string()
}
