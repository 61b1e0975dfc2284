//! Errors raised by the snapshot store.
//!
//! Scraping noise never shows up here; it is carried inside records as
//! failed fields. These are the operator-facing failures that stop a run.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid snapshot kind '{0}': expected 'table' or 'raw'")]
    InvalidKind(String),

    #[error("snapshot already exists: {}", .0.display())]
    AlreadyExists(PathBuf),

    #[error("no {kind} snapshot found in {}", .dir.display())]
    NoSnapshot { kind: &'static str, dir: PathBuf },

    #[error("table {} has no '{column}' column", .path.display())]
    MissingColumn { path: PathBuf, column: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
