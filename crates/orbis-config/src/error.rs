//! Configuration error types.

use std::path::PathBuf;

/// Errors raised while loading, saving or parsing `config.ron`.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file exists but could not be read.
    #[error("failed to read {}: {source}", path.display())]
    ReadError {
        /// File that was read.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The config directory or file could not be written.
    #[error("failed to write {}: {source}", path.display())]
    WriteError {
        /// Directory or file that was written.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid RON for [`crate::Config`].
    #[error("failed to parse {}: {source}", path.display())]
    ParseError {
        /// File that was parsed.
        path: PathBuf,
        /// Parser error with position.
        #[source]
        source: ron::error::SpannedError,
    },

    /// The config could not be rendered as RON.
    #[error("failed to serialize config: {0}")]
    SerializeError(#[source] ron::Error),
}
