//! Configuration, paths and logging setup for The 411 site tools.

mod config;
mod error;
mod logging;
mod paths;

pub use config::{
    Config, DEFAULT_HOME_ROUTE, DEFAULT_LOGIN_ROUTE, DEFAULT_LOG_LEVEL, DEFAULT_SUPABASE_ANON_KEY,
    DEFAULT_SUPABASE_URL,
};
pub use error::{CoreError, CoreResult};
pub use logging::init_logging;
pub use paths::Paths;
