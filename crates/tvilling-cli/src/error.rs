//! CLI error types.

use std::{io, path::PathBuf};

use thiserror::Error;
use tvilling_engine::EngineError;
use tvilling_proto::{ProtoError, SettingsError};

/// Errors surfaced by the terminal front end.
#[derive(Debug, Error)]
pub enum CliError {
    /// The engine rejected a command or its configuration.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// A flag named an unknown preset, zone or protocol, or an invalid
    /// network value.
    #[error(transparent)]
    Proto(#[from] ProtoError),

    /// The settings record could not be parsed or written.
    #[error(transparent)]
    Settings(#[from] SettingsError),

    /// The engine configuration file is not valid TOML.
    #[error("invalid configuration file: {0}")]
    Config(#[from] toml::de::Error),

    /// A file could not be read or written.
    #[error("{}: {source}", path.display())]
    Io {
        /// The file involved.
        path: PathBuf,
        /// Underlying error.
        source: io::Error,
    },
}
