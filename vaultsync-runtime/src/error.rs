use thiserror::Error;

#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("Invalid configuration: {field}: {message}")]
    InvalidConfig { field: String, message: String },

    #[error("Logging already initialized")]
    LoggingAlreadyInitialized,

    #[error("Logging setup failed: {0}")]
    LoggingSetup(String),
}

pub type Result<T> = std::result::Result<T, RuntimeError>;
