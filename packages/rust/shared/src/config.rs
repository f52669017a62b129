//! Application configuration for SchemaHarvest.
//!
//! User config lives at `~/.schemaharvest/schemaharvest.toml`.
//! CLI flags override config file values, which override defaults.
//!
//! The navigator and assembler tables are tuned to one documentation site's
//! markup and phrasing. They live here so that a change in the published
//! format is a config edit, not a code change.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{HarvestError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "schemaharvest.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".schemaharvest";

// ---------------------------------------------------------------------------
// Config structs (matching schemaharvest.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Catalog file locations.
    #[serde(default)]
    pub catalog: CatalogConfig,

    /// HTTP fetch settings.
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Document navigation tables.
    #[serde(default)]
    pub navigator: NavigatorConfig,

    /// Dataset assembly tables.
    #[serde(default)]
    pub assembler: AssemblerConfig,
}

/// `[catalog]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Module catalog JSON file.
    #[serde(default = "default_modules_path")]
    pub modules_path: PathBuf,

    /// Dataset catalog JSON file.
    #[serde(default = "default_datasets_path")]
    pub datasets_path: PathBuf,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            modules_path: default_modules_path(),
            datasets_path: default_datasets_path(),
        }
    }
}

fn default_modules_path() -> PathBuf {
    PathBuf::from("catalog").join("modules.json")
}
fn default_datasets_path() -> PathBuf {
    PathBuf::from("catalog").join("datasets.json")
}

/// `[fetch]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Maximum redirects followed per request.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,

    /// User-Agent header sent with every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_redirects: default_max_redirects(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}
fn default_max_redirects() -> usize {
    5
}
fn default_user_agent() -> String {
    concat!("SchemaHarvest/", env!("CARGO_PKG_VERSION")).into()
}

/// `[navigator]` section.
///
/// The content anchor is found by: the element with id `anchor_id`, then
/// each selector in `descendant_chain` (first match below the previous
/// step), then the first child whose class contains `block_class_marker`,
/// then that block's `content_tag` child.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigatorConfig {
    #[serde(default = "default_anchor_id")]
    pub anchor_id: String,

    #[serde(default = "default_descendant_chain")]
    pub descendant_chain: Vec<String>,

    #[serde(default = "default_block_class_marker")]
    pub block_class_marker: String,

    #[serde(default = "default_content_tag")]
    pub content_tag: String,

    /// Headings that never start a dataset section (case-insensitive).
    #[serde(default = "default_ignored_headings")]
    pub ignored_headings: Vec<String>,
}

impl Default for NavigatorConfig {
    fn default() -> Self {
        Self {
            anchor_id: default_anchor_id(),
            descendant_chain: default_descendant_chain(),
            block_class_marker: default_block_class_marker(),
            content_tag: default_content_tag(),
            ignored_headings: default_ignored_headings(),
        }
    }
}

fn default_anchor_id() -> String {
    "bodyDisplay".into()
}
fn default_descendant_chain() -> Vec<String> {
    vec!["div.lia-message-body".into()]
}
fn default_block_class_marker() -> String {
    "lia-message-body-content".into()
}
fn default_content_tag() -> String {
    "article".into()
}
fn default_ignored_headings() -> Vec<String> {
    vec![
        "Entity relationship diagram".into(),
        "Returned fields".into(),
        "Available filters".into(),
        "About".into(),
    ]
}

/// `[assembler]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssemblerConfig {
    /// Paragraphs dropped from dataset descriptions (case-insensitive).
    #[serde(default = "default_boilerplate_paragraphs")]
    pub boilerplate_paragraphs: Vec<String>,

    /// Prefix of every derived SQL table name.
    #[serde(default = "default_sql_table_prefix")]
    pub sql_table_prefix: String,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self {
            boilerplate_paragraphs: default_boilerplate_paragraphs(),
            sql_table_prefix: default_sql_table_prefix(),
        }
    }
}

fn default_boilerplate_paragraphs() -> Vec<String> {
    vec![
        String::new(),
        "about".into(),
        "returned fields".into(),
        "available filters".into(),
    ]
}
fn default_sql_table_prefix() -> String {
    "D2L_".into()
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.schemaharvest/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| HarvestError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.schemaharvest/schemaharvest.toml`).
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
    let content = std::fs::read_to_string(path).map_err(|e| HarvestError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content)
        .map_err(|e| HarvestError::config(format!("failed to parse {}: {e}", path.display())))?;
    validate_config(&config)?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| HarvestError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| HarvestError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| HarvestError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Reject configs the navigator cannot work with.
pub fn validate_config(config: &AppConfig) -> Result<()> {
    let nav = &config.navigator;
    if nav.anchor_id.trim().is_empty() {
        return Err(HarvestError::config("navigator.anchor_id must not be empty"));
    }
    if nav.content_tag.trim().is_empty() {
        return Err(HarvestError::config("navigator.content_tag must not be empty"));
    }
    if config.fetch.timeout_secs == 0 {
        return Err(HarvestError::config("fetch.timeout_secs must be at least 1"));
    }
    Ok(())
}
