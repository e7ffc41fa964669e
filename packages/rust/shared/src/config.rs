//! Application configuration for Sheetwright.
//!
//! User config lives at `~/.sheetwright/sheetwright.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SheetwrightError};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "sheetwright.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".sheetwright";

// ---------------------------------------------------------------------------
// Config structs (matching sheetwright.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Batch scheduling policy.
    #[serde(default)]
    pub batch: BatchConfig,

    /// Generation backend settings.
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Spreadsheet backend settings.
    #[serde(default)]
    pub sheets: SheetsConfig,

    /// Local database settings.
    #[serde(default)]
    pub storage: StorageConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Model used when `--model` is not given.
    #[serde(default = "default_model")]
    pub model: String,

    /// Header name of the column results are written into.
    #[serde(default = "default_result_column")]
    pub result_column: String,

    /// First sheet row (1-based) processed when no window is given.
    /// Row 1 is the header; row 2 conventionally holds column hints.
    #[serde(default = "default_first_row")]
    pub first_row: u32,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            result_column: default_result_column(),
            first_row: default_first_row(),
        }
    }
}

fn default_model() -> String {
    "gpt-4.1".into()
}
fn default_result_column() -> String {
    "Result".into()
}
fn default_first_row() -> u32 {
    3
}

/// `[batch]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Rows generated concurrently per group.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Pause between groups, in seconds.
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,

    /// A result cell holding at least this many characters marks the row done.
    #[serde(default = "default_completeness_threshold")]
    pub completeness_threshold: usize,

    /// Exact number of reviews the `reviews` task must produce.
    #[serde(default = "default_reviews_count")]
    pub reviews_count: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            cooldown_secs: default_cooldown_secs(),
            completeness_threshold: default_completeness_threshold(),
            reviews_count: default_reviews_count(),
        }
    }
}

fn default_batch_size() -> usize {
    3
}
fn default_cooldown_secs() -> u64 {
    15
}
fn default_completeness_threshold() -> usize {
    6
}
fn default_reviews_count() -> usize {
    3
}

/// `[generation]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Base URL of the Responses-compatible API.
    #[serde(default = "default_generation_base_url")]
    pub base_url: String,

    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Optional sampling temperature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Deadline for short calls (sheet reads/writes, catalog, history, images).
    #[serde(default = "default_lookup_timeout")]
    pub lookup_timeout_secs: u64,

    /// Deadline for text generation calls.
    #[serde(default = "default_generation_timeout")]
    pub generation_timeout_secs: u64,

    /// Deadline for generation calls carrying images.
    #[serde(default = "default_multimodal_timeout")]
    pub multimodal_timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            base_url: default_generation_base_url(),
            api_key_env: default_api_key_env(),
            temperature: None,
            lookup_timeout_secs: default_lookup_timeout(),
            generation_timeout_secs: default_generation_timeout(),
            multimodal_timeout_secs: default_multimodal_timeout(),
        }
    }
}

fn default_generation_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_api_key_env() -> String {
    "OPENAI_API_KEY".into()
}
fn default_lookup_timeout() -> u64 {
    15
}
fn default_generation_timeout() -> u64 {
    300
}
fn default_multimodal_timeout() -> u64 {
    600
}

/// `[sheets]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetsConfig {
    /// Base URL of the Google Sheets REST API.
    #[serde(default = "default_sheets_base_url")]
    pub base_url: String,

    /// Name of the env var holding an OAuth access token for the Sheets API.
    #[serde(default = "default_sheets_token_env")]
    pub token_env: String,
}

impl Default for SheetsConfig {
    fn default() -> Self {
        Self {
            base_url: default_sheets_base_url(),
            token_env: default_sheets_token_env(),
        }
    }
}

fn default_sheets_base_url() -> String {
    "https://sheets.googleapis.com".into()
}
fn default_sheets_token_env() -> String {
    "GOOGLE_SHEETS_TOKEN".into()
}

/// `[storage]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Database path; relative paths resolve against the config directory.
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

fn default_db_path() -> String {
    "sheetwright.db".into()
}

// ---------------------------------------------------------------------------
// Run config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime scheduling configuration, merged from config file + CLI flags.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Rows generated concurrently per group.
    pub batch_size: usize,
    /// Pause between groups.
    pub cooldown: Duration,
    /// Minimum result length that marks a row complete.
    pub completeness_threshold: usize,
    /// Header name of the result column.
    pub result_column: String,
    /// Default first row for runs without an explicit window.
    pub first_row: u32,
    /// Deadline for short collaborator calls.
    pub lookup_timeout: Duration,
}

impl From<&AppConfig> for RunConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            batch_size: config.batch.batch_size.max(1),
            cooldown: Duration::from_secs(config.batch.cooldown_secs),
            completeness_threshold: config.batch.completeness_threshold,
            result_column: config.defaults.result_column.clone(),
            first_row: config.defaults.first_row,
            lookup_timeout: Duration::from_secs(config.generation.lookup_timeout_secs),
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.sheetwright/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| SheetwrightError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.sheetwright/sheetwright.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| SheetwrightError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        SheetwrightError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| SheetwrightError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| SheetwrightError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| SheetwrightError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Resolve the database path, anchoring relative paths at the config directory.
pub fn resolve_db_path(config: &AppConfig) -> Result<PathBuf> {
    let path = PathBuf::from(&config.storage.db_path);
    if path.is_absolute() {
        Ok(path)
    } else {
        Ok(config_dir()?.join(path))
    }
}

/// Read a secret from the env var named in config, failing with a helpful message.
pub fn read_secret(var_name: &str, what: &str) -> Result<String> {
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(val),
        _ => Err(SheetwrightError::config(format!(
            "{what} not found. Set the {var_name} environment variable."
        ))),
    }
}
