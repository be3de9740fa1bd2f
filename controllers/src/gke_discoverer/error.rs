use std::{io, path::PathBuf};

use thiserror::Error;

/// Reasons a reconciliation tick is aborted.
/// None of them touch the committed discovery set; the next tick starts over.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("failed to list clusters: {0:#}")]
    Directory(anyhow::Error),

    #[error("i/o error on {}: {source}", .path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed prometheus config {}: {reason}", .path.display())]
    Document { path: PathBuf, reason: String },

    #[error("tick cancelled")]
    Cancelled,
}

impl ReconcileError {
    pub fn persistence(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Persistence {
            path: path.into(),
            source,
        }
    }

    pub fn document(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Document {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

/// Failure to materialize one cluster's credentials.
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("cluster {cluster}: {field} is not valid base64: {source}")]
    Decode {
        cluster: String,
        field: &'static str,
        #[source]
        source: base64::DecodeError,
    },

    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
