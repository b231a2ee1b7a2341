//! Validation and parse errors for value types.

use thiserror::Error;

/// Errors raised while constructing or parsing value types.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProtoError {
    /// A network profile field is out of range or not finite.
    #[error("invalid profile: {field} = {value}")]
    InvalidProfile {
        /// Name of the offending field.
        field: &'static str,
        /// The rejected value.
        value: f64,
    },

    /// Preset name not recognized.
    #[error("unknown preset: {name}")]
    UnknownPreset {
        /// The name that failed to parse.
        name: String,
    },

    /// Zone id not recognized.
    #[error("unknown zone: {name}")]
    UnknownZone {
        /// The zone id that failed to parse.
        name: String,
    },

    /// Demo kind not recognized.
    #[error("unknown demo: {name}")]
    UnknownDemo {
        /// The demo name that failed to parse.
        name: String,
    },

    /// Protocol name not recognized.
    #[error("unknown protocol: {name}")]
    UnknownProtocol {
        /// The protocol name that failed to parse.
        name: String,
    },
}
