//! Tvilling terminal front end.
//!
//! Drives the engine in real time and renders its events as log lines:
//!
//! ```text
//! tvilling-cli
//!   ├─ SystemEnv       (live Environment impl)
//!   ├─ Driver          (sleep, measure, advance)
//!   ├─ render          (events to tracing)
//!   └─ SettingsStore   (persisted settings record)
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod driver;
mod error;
pub mod render;
mod store;
mod system_env;

pub use driver::{DEFAULT_TICK, Driver};
pub use error::CliError;
pub use store::{SettingsStore, load_config, unix_millis};
pub use system_env::SystemEnv;
