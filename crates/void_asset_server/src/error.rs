//! Asset server errors

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while setting up a filesystem asset source
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Invalid asset server config: {0}")]
    Config(String),

    #[error("Package {name} root does not exist: {root:?}")]
    MissingRoot { name: String, root: PathBuf },

    #[error("Duplicate package: {0}")]
    DuplicatePackage(String),

    #[error("Invalid manifest for package {package}: {message}")]
    Manifest { package: String, message: String },

    #[error("IO error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("File watcher error: {0}")]
    Watch(String),

    #[error("Failed to start IO worker: {0}")]
    Worker(String),
}

/// Result type for asset server setup
pub type ServerResult<T> = Result<T, ServerError>;
