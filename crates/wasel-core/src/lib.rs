//! Core configuration, paths, errors and logging setup for the Wasel client.

mod config;
mod error;
mod logging;
mod paths;

pub use config::{
    Config, DEFAULT_LOG_LEVEL, DEFAULT_SITE_URL, DEFAULT_SUPABASE_PROJECT_ID,
    DEFAULT_SUPABASE_PUBLISHABLE_KEY,
};
pub use error::{CoreError, CoreResult};
pub use logging::{init_logging, init_logging_for_service, parse_level};
pub use paths::Paths;
