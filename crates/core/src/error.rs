use thiserror::Error;

/// Result type for microbatch operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for microbatch operations
#[derive(Error, Debug)]
pub enum Error {
    /// Queue constructed with a non-positive capacity, batch size or timeout
    #[error("Invalid queue configuration: {0}")]
    InvalidConfig(String),

    /// Write attempted after the queue began closing
    #[error("Queue is closed")]
    Closed,

    /// Configuration loading errors (files, environment)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl Error {
    /// Creates an invalid queue configuration error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Creates a configuration loading error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Returns true if this error signals a closed queue
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }

    /// Adds context to any error
    pub fn with_context<E>(context: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::WithContext {
            context: context.into(),
            source: Box::new(source),
        }
    }
}
