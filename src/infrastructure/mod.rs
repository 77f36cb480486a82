//! Infrastructure layer
//!
//! Settings and logging setup.

mod config;
mod logging;

pub use config::{DEFAULT_SETTINGS_FILE, LOG_ENV, Settings};
pub use logging::init_logging;
