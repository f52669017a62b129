//! Shared types, error model, and configuration for SchemaHarvest.
//!
//! This crate is the foundation depended on by all other SchemaHarvest crates.
//! It provides:
//! - [`HarvestError`]: the unified error type
//! - Domain types ([`Module`], [`Dataset`], [`Column`], [`ColumnSet`])
//! - [`ColumnType`] and its raw-token resolver
//! - Configuration ([`AppConfig`], config loading)

pub mod column_type;
pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use column_type::{ALL_COLUMN_TYPES, COLUMN_TYPE_SYNONYMS, ColumnType, resolve};
pub use config::{
    AppConfig, AssemblerConfig, CatalogConfig, FetchConfig, NavigatorConfig, config_dir,
    config_file_path, init_config, load_config, load_config_from, validate_config,
};
pub use error::{ErrorCategory, HarvestError, Result};
pub use types::{
    Column, ColumnFields, ColumnSet, Dataset, Module, NULL_PHRASE, NULL_SUFFIX, mentions_null,
    with_null_suffix,
};
