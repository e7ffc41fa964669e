//! Shared types, error model, and configuration for Sheetwright.
//!
//! This crate is the foundation depended on by all other Sheetwright crates.
//! It provides:
//! - [`SheetwrightError`]: the unified error type
//! - Domain types ([`TaskType`], [`GenerationOutput`], [`Review`], [`HistoryRecord`])
//! - Configuration ([`AppConfig`], [`RunConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, BatchConfig, DefaultsConfig, GenerationConfig, RunConfig, SheetsConfig,
    StorageConfig, config_dir, config_file_path, init_config, load_config, load_config_from,
    read_secret, resolve_db_path,
};
pub use error::{ErrorKind, Result, SheetwrightError};
pub use types::{
    GenerationOutput, HistoryRecord, MAIN_DOMAIN, Origin, ProductScope, RelatedProduct, Review,
    TaskType,
};
