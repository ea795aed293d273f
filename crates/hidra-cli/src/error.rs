//! Error handling for the Hidra CLI

use thiserror::Error;

/// Result type used across CLI commands
pub type CliResult<T> = Result<T, CliError>;

/// CLI-level errors
#[derive(Error, Debug)]
pub enum CliError {
    /// Engine error from the world crate
    #[error("Engine error: {0}")]
    Engine(#[from] hidra_world::WorldError),

    /// Genome error from the genome crate
    #[error("Genome error: {0}")]
    Genome(#[from] hidra_genome::GenomeError),

    /// File I/O failure
    #[error("I/O error on {path}: {source}")]
    Io {
        /// Path involved
        path: String,
        /// Underlying error
        source: std::io::Error,
    },

    /// Malformed configuration or schedule file
    #[error("Invalid {kind} file {path}: {reason}")]
    InvalidFile {
        /// File kind (config, schedule, snapshot)
        kind: &'static str,
        /// Path involved
        path: String,
        /// Parse failure description
        reason: String,
    },

    /// Anything else
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CliError {
    /// Wrap an I/O error with its path.
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Wrap a parse failure with its path and kind.
    pub fn invalid_file(
        kind: &'static str,
        path: impl Into<String>,
        reason: impl ToString,
    ) -> Self {
        Self::InvalidFile {
            kind,
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
