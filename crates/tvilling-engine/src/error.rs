//! Engine error types.

use thiserror::Error;
use tvilling_core::SimError;
use tvilling_proto::ProtoError;

/// Errors from engine commands.
///
/// A command that returns an error has not changed any engine state.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// A name or value could not be turned into a protocol type.
    #[error(transparent)]
    Proto(#[from] ProtoError),

    /// A simulator rejected the request.
    #[error(transparent)]
    Sim(#[from] SimError),

    /// The configuration cannot drive an engine.
    #[error("invalid engine configuration: {field}")]
    InvalidConfig {
        /// The offending field.
        field: &'static str,
    },
}

impl EngineError {
    /// Returns true if the error came from user input rather than the
    /// engine's own configuration.
    pub fn is_user_error(&self) -> bool {
        match self {
            Self::Proto(_) | Self::Sim(_) => true,
            Self::InvalidConfig { .. } => false,
        }
    }
}
