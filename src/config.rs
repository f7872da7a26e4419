//! Lattice configuration
//!
//! ```json
//! { "x": 7, "y": 14, "z": 4, "timestep": 0.01, "noise": 0 }
//! ```
//!
//! Missing fields take their defaults.

use std::time::Duration;

use crate::error::{LatticeError, Result};
use crate::lattice::{Dims, NoiseMode};

/// Default scheduler thread stack. Evaluation keeps its walk on the heap, so
/// this does not limit lattice size.
pub const DEFAULT_STACK_SIZE: usize = 2 * 1024 * 1024;

/// Lattice construction parameters
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct LatticeConfig {
    /// Extent of the I/O axis (input face x = 0, output face x = x - 1)
    pub x: usize,
    pub y: usize,
    pub z: usize,
    /// Requested connection noise
    pub noise: NoiseMode,
    /// Seconds between ticks; also the integration step
    pub timestep: f64,
    /// Whether integrators run from the start
    pub integrating: bool,
    /// Scheduler thread stack size in bytes
    pub stack_size: usize,
}

impl Default for LatticeConfig {
    fn default() -> Self {
        Self {
            x: 2,
            y: 1,
            z: 1,
            noise: NoiseMode::quiet(),
            timestep: 0.01,
            integrating: true,
            stack_size: DEFAULT_STACK_SIZE,
        }
    }
}

impl LatticeConfig {
    pub fn with_dims(x: usize, y: usize, z: usize) -> Self {
        Self {
            x,
            y,
            z,
            ..Default::default()
        }
    }

    pub fn with_timestep(mut self, timestep: f64) -> Self {
        self.timestep = timestep;
        self
    }

    pub fn with_noise(mut self, noise: NoiseMode) -> Self {
        self.noise = noise;
        self
    }

    pub fn with_integrating(mut self, integrating: bool) -> Self {
        self.integrating = integrating;
        self
    }

    /// Check every field, returning the validated dimensions
    pub fn validate(&self) -> Result<Dims> {
        if self.x < 2 {
            return Err(LatticeError::bad_config(format!(
                "x extent must be at least 2 so input and output faces differ, got {}",
                self.x
            )));
        }
        let dims = Dims::new(self.x, self.y, self.z)?;
        NoiseMode::from_bits(self.noise.0)?;
        timestep_duration(self.timestep)?;
        if self.stack_size == 0 {
            return Err(LatticeError::bad_config("stack_size must be non-zero"));
        }
        Ok(dims)
    }

    /// Parse from JSON text
    #[cfg(feature = "serde")]
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| LatticeError::bad_config(format!("invalid lattice config: {}", e)))
    }

    /// Load and validate a JSON config file
    #[cfg(feature = "serde")]
    pub fn load(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        use anyhow::Context;

        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config = Self::from_json_str(&text)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("Invalid lattice config in {}", path.display()))?;
        Ok(config)
    }
}

/// Validate a timestep in seconds and convert it to a sleep duration
pub(crate) fn timestep_duration(timestep: f64) -> Result<Duration> {
    if !timestep.is_finite() || timestep < 0.0 {
        return Err(LatticeError::bad_config(format!(
            "timestep must be finite and non-negative, got {}",
            timestep
        )));
    }
    Duration::try_from_secs_f64(timestep)
        .map_err(|e| LatticeError::bad_config(format!("timestep {}: {}", timestep, e)))
}
