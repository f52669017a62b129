//! Error types for SchemaHarvest.
//!
//! Library crates use [`HarvestError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all SchemaHarvest operations.
#[derive(Debug, thiserror::Error)]
pub enum HarvestError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Fetch failed, returned a non-200 status, or an unusable body.
    #[error("transport error: {0}")]
    Transport(String),

    /// The documentation markup is missing an expected element.
    #[error("structure error: {message}")]
    Structure { message: String },

    /// A column table row does not have the expected number of cells.
    #[error("shape error: {message}")]
    Shape { message: String },

    /// A column type token matched neither a canonical type nor a synonym.
    #[error("unknown column type: {token:?}")]
    UnknownColumnType { token: String },

    /// Catalog (de)serialization or consistency error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (invalid URL, index conflict, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// A failure inside one dataset section of a module document.
    #[error("dataset {heading:?}: {source}")]
    Dataset {
        heading: String,
        #[source]
        source: Box<HarvestError>,
    },

    /// A failure while harvesting one module.
    #[error("module {module:?}: {source}")]
    Module {
        module: String,
        #[source]
        source: Box<HarvestError>,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Coarse classification of a [`HarvestError`], ignoring context wrappers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Config,
    Transport,
    Structure,
    Shape,
    Semantic,
    Storage,
    Io,
    Validation,
}

impl HarvestError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a structure error from any displayable message.
    pub fn structure(msg: impl Into<String>) -> Self {
        Self::Structure {
            message: msg.into(),
        }
    }

    /// Create a shape error from any displayable message.
    pub fn shape(msg: impl Into<String>) -> Self {
        Self::Shape {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Attach the owning dataset heading to an error.
    pub fn in_dataset(heading: impl Into<String>, source: HarvestError) -> Self {
        Self::Dataset {
            heading: heading.into(),
            source: Box::new(source),
        }
    }

    /// Attach the owning module name to an error.
    pub fn in_module(module: impl Into<String>, source: HarvestError) -> Self {
        Self::Module {
            module: module.into(),
            source: Box::new(source),
        }
    }

    /// Classify the underlying failure, looking through context wrappers.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Config { .. } => ErrorCategory::Config,
            Self::Transport(_) => ErrorCategory::Transport,
            Self::Structure { .. } => ErrorCategory::Structure,
            Self::Shape { .. } => ErrorCategory::Shape,
            Self::UnknownColumnType { .. } => ErrorCategory::Semantic,
            Self::Storage(_) => ErrorCategory::Storage,
            Self::Io { .. } => ErrorCategory::Io,
            Self::Validation { .. } => ErrorCategory::Validation,
            Self::Dataset { source, .. } | Self::Module { source, .. } => source.category(),
        }
    }
}
