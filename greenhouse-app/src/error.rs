//! Error type for the demo host.

use greenhouse_core::{ConfigError, GreenhouseError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Telemetry error: {0}")]
    Telemetry(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Greenhouse(#[from] GreenhouseError),
}

pub type AppResult<T> = Result<T, AppError>;
