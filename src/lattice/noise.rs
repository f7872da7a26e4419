//! Noise - connection noise modes and the policy hook that applies them
//!
//! The lattice only records the requested mode. Whatever noise model a host
//! wants is supplied as a [`NoisePolicy`]; the default [`Quiet`] policy leaves
//! every value untouched.

use std::fmt;

use super::address::CellIndex;
use super::cell::Charge;
use crate::error::{LatticeError, Result};

/// Noise mode flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NoiseMode(pub u32);

impl NoiseMode {
    pub const NONE: u32 = 0;
    /// Random noise on every connection
    pub const RANDOM: u32 = 1;
    /// Induction from nearby cells
    pub const INDUCTIVE: u32 = 2;
    /// Resistive loss across connections
    pub const RESISTIVE: u32 = 4;
    /// Heat build-up from resistive loss
    pub const HEAT_RESISTIVE: u32 = 8;

    const DEFINED: u32 = 15;

    pub const fn quiet() -> Self {
        Self(Self::NONE)
    }

    /// Validate a raw mode word
    pub fn from_bits(bits: u32) -> Result<Self> {
        if bits & !Self::DEFINED != 0 {
            return Err(LatticeError::bad_config(format!("unknown noise mode bits {:#x}", bits)));
        }
        Ok(Self(bits))
    }

    pub const fn is_quiet(self) -> bool {
        self.0 == Self::NONE
    }

    pub const fn random(self) -> bool {
        (self.0 & Self::RANDOM) != 0
    }

    pub const fn inductive(self) -> bool {
        (self.0 & Self::INDUCTIVE) != 0
    }

    pub const fn resistive(self) -> bool {
        (self.0 & Self::RESISTIVE) != 0
    }

    pub const fn heat_resistive(self) -> bool {
        (self.0 & Self::HEAT_RESISTIVE) != 0
    }
}

impl fmt::Display for NoiseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_quiet() {
            return f.write_str("none");
        }
        let names = [
            (self.random(), "random"),
            (self.inductive(), "inductive"),
            (self.resistive(), "resistive"),
            (self.heat_resistive(), "heat"),
        ];
        let mut first = true;
        for (_, name) in names.iter().filter(|(on, _)| *on) {
            if !first {
                f.write_str("|")?;
            }
            f.write_str(name)?;
            first = false;
        }
        Ok(())
    }
}

/// Hook applied to each value crossing a connection during evaluation
pub trait NoisePolicy: Send + Sync {
    /// Perturb `value` travelling from `source` into `target`
    fn perturb(&self, mode: NoiseMode, source: CellIndex, target: CellIndex, value: Charge) -> Charge;
}

/// Identity policy
#[derive(Debug, Clone, Copy, Default)]
pub struct Quiet;

impl NoisePolicy for Quiet {
    #[inline]
    fn perturb(&self, _mode: NoiseMode, _source: CellIndex, _target: CellIndex, value: Charge) -> Charge {
        value
    }
}
