//! Errors raised while locating and loading site configuration.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    /// A configured value is unusable
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// `supabase_url` does not parse
    #[error("Invalid Supabase URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The config file is not valid JSON
    #[error("Malformed config file: {0}")]
    Json(#[from] serde_json::Error),

    /// The runtime directory cannot be resolved
    #[error("Path error: {0}")]
    Path(String),
}

pub type CoreResult<T> = Result<T, CoreError>;
