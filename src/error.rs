use thiserror::Error;

/// Main error type for the analysis service
#[derive(Error, Debug)]
pub enum LagError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    // Network errors
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    // Data errors
    #[error("Price data unavailable: {0}")]
    PriceDataUnavailable(String),

    #[error("Not found: {0}")]
    NotFound(String),

    // Job control errors
    #[error("Job already running: {0}")]
    JobAlreadyRunning(String),

    // Validation errors
    #[error("Validation failed: {0}")]
    Validation(String),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for LagError
pub type Result<T> = std::result::Result<T, LagError>;
