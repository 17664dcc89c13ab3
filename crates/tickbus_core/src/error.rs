//! # Bus Error Types
//!
//! Errors that can occur while configuring the bus.
//!
//! Publish rejection, subscribe rejection and no-op unsubscribes are NOT
//! errors: they are reported through `bool` returns and invalid tokens so the
//! hot path never builds an error value.

use thiserror::Error;

/// Errors that can occur while configuring or loading the bus.
#[derive(Error, Debug)]
pub enum BusError {
    /// A ring buffer was configured with zero capacity.
    #[error("invalid buffer capacity: capacity must be greater than zero")]
    InvalidCapacity,

    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The configuration file is not valid TOML for [`crate::BusConfig`].
    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// The configuration file could not be read.
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for bus configuration operations.
pub type BusResult<T> = Result<T, BusError>;
