//! # Bus Configuration
//!
//! Ring-buffer sizing and overflow behavior, loaded once at startup.
//!
//! ```toml
//! cleanup_interval_ticks = 300
//!
//! [default_buffer]
//! capacity = 1024
//! overflow_policy = "drop_oldest"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::buffer::OverflowPolicy;
use crate::error::{BusError, BusResult};

/// Default ring-buffer capacity for a newly created event type.
pub const DEFAULT_BUFFER_CAPACITY: usize = 1024;

/// Default number of ticks between automatic liveness sweeps.
///
/// 300 ticks is five seconds at 60Hz.
pub const DEFAULT_CLEANUP_INTERVAL_TICKS: u32 = 300;

/// Sizing and overflow behavior for one event type's ring buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferConfig {
    /// Initial ring-buffer size (the only size unless the policy is `Resize`).
    pub capacity: usize,
    /// What happens when a publish finds the buffer full.
    pub overflow_policy: OverflowPolicy,
}

impl BufferConfig {
    /// Creates a buffer configuration.
    #[inline]
    #[must_use]
    pub const fn new(capacity: usize, overflow_policy: OverflowPolicy) -> Self {
        Self {
            capacity,
            overflow_policy,
        }
    }

    /// Checks that the configuration can back a ring buffer.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::InvalidCapacity`] if `capacity` is zero.
    pub fn validate(&self) -> BusResult<()> {
        if self.capacity == 0 {
            return Err(BusError::InvalidCapacity);
        }
        Ok(())
    }
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_BUFFER_CAPACITY,
            overflow_policy: OverflowPolicy::DropNewest,
        }
    }
}

/// Complete configuration for an [`crate::EventBus`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Applied to every event type whose buffer does not exist yet.
    pub default_buffer: BufferConfig,
    /// Run a liveness sweep every N ticks. Zero disables the sweep.
    pub cleanup_interval_ticks: u32,
}

impl BusConfig {
    /// Parses a configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::ConfigParse`] for malformed TOML and
    /// [`BusError::InvalidCapacity`] for a zero capacity.
    pub fn from_toml_str(text: &str) -> BusResult<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Io`] if the file cannot be read, otherwise the
    /// same errors as [`BusConfig::from_toml_str`].
    pub fn from_file(path: impl AsRef<Path>) -> BusResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Checks every field.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::InvalidCapacity`] for a zero default capacity.
    pub fn validate(&self) -> BusResult<()> {
        self.default_buffer.validate()
    }
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            default_buffer: BufferConfig::default(),
            cleanup_interval_ticks: DEFAULT_CLEANUP_INTERVAL_TICKS,
        }
    }
}
