//! Reference model for model-based testing.
//!
//! The model is a deliberately naive engine: counters and explicit
//! deadlines instead of simulators and a timer queue. It serves as the
//! oracle the real engine is checked against.
//!
//! # Design Principles
//!
//! - Simplicity: The model should be obviously correct
//! - Observable behaviour only: packet contents and connection ids are not
//!   modelled
//! - Deterministic: Same inputs produce same outputs

pub mod operation;
mod world;

pub use operation::{Operation, OperationError, OperationResult};
pub use world::{ModelWorld, ObservableState};
