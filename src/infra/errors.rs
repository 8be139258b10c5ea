// src/infra/errors.rs — Error types for research-stream

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ResearchError {
    // Submission errors
    #[error("Research query cannot be empty")]
    EmptyQuery,

    #[error("Invalid stream URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Stream endpoint '{endpoint}' cannot carry query parameters")]
    UnsupportedEndpoint { endpoint: String },

    // Infra
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ResearchError {
    /// Errors the user can fix by changing their input rather than their setup.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            ResearchError::EmptyQuery
                | ResearchError::InvalidUrl(_)
                | ResearchError::UnsupportedEndpoint { .. }
        )
    }
}
