use core::fmt::Debug;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid runtime config: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum SensorError<E: Debug> {
    #[error("AT30TS75 bus error: {0:?}")]
    Bus(E),
}

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("infrared transmission failed")]
    Transmit(#[source] Box<dyn std::error::Error + Send + Sync>),
}
