//! CLI error types.

use std::path::PathBuf;

use rofflift_config::ConfigError;

/// Errors that stop the whole run, as opposed to per-file failures.
#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("cannot write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{0}")]
    Validation(String),
}
