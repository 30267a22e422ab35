//! Error types for the canonicalization library.
//!
//! Library code returns [`CanonError`]; the binary wraps it with `anyhow`.

use std::path::{Path, PathBuf};

use crate::api_connection::connection::ApiConnectionError;

#[derive(Debug, thiserror::Error)]
pub enum CanonError {
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("CSV error in {path:?}: {source}")]
    Csv { path: PathBuf, source: csv::Error },

    #[error("JSON error in {path:?}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("config error: {0}")]
    Config(String),

    #[error("Column '{column}' not found in {path:?}")]
    MissingColumn { column: String, path: PathBuf },

    #[error("No valid rows loaded from {path:?}")]
    EmptyDataset { path: PathBuf },

    #[error("duplicate {kind}: '{key}'")]
    DuplicateEntry { kind: &'static str, key: String },

    #[error("unknown allergen: '{0}'")]
    UnknownAllergen(String),

    #[error("unknown confidence level: '{0}' (expected confident, suggested or low)")]
    UnknownConfidence(String),

    #[error(transparent)]
    Llm(#[from] ApiConnectionError),
}

pub type Result<T> = std::result::Result<T, CanonError>;

impl CanonError {
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn csv(path: impl AsRef<Path>, source: csv::Error) -> Self {
        Self::Csv {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn json(path: impl AsRef<Path>, source: serde_json::Error) -> Self {
        Self::Json {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn missing_column(column: &str, path: impl AsRef<Path>) -> Self {
        Self::MissingColumn {
            column: column.to_string(),
            path: path.as_ref().to_path_buf(),
        }
    }
}
