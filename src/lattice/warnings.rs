//! Runtime evaluation warnings
//!
//! Warnings never abort an evaluation. They are OR'd together while a tick
//! resolves its roots and published once per tick as a [`TickReport`].
//! Bit values equal the matching [`Status`](crate::Status) codes.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use super::address::Coord;
use crate::error::Status;

/// Warning bit set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Warnings(pub u32);

impl Warnings {
    /// A cell charge left [-1, 1]
    pub const OVERFLOW: u32 = Status::OverflowCell as u32;
    /// A divisor modifier with value 0 was applied
    pub const DIV_ZERO: u32 = Status::DivisionByZero as u32;

    pub const NONE: Warnings = Warnings(0);

    pub const fn overflow() -> Self {
        Self(Self::OVERFLOW)
    }

    pub const fn div_zero() -> Self {
        Self(Self::DIV_ZERO)
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn has_overflow(self) -> bool {
        (self.0 & Self::OVERFLOW) != 0
    }

    pub const fn has_div_zero(self) -> bool {
        (self.0 & Self::DIV_ZERO) != 0
    }

    /// Status word with every raised warning bit
    pub const fn code(self) -> u32 {
        self.0
    }
}

impl BitOr for Warnings {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for Warnings {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for Warnings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.has_overflow(), self.has_div_zero()) {
            (false, false) => f.write_str("none"),
            (true, false) => f.write_str("OVERFLOW_CELL"),
            (false, true) => f.write_str("DIV_ZERO"),
            (true, true) => f.write_str("OVERFLOW_CELL|DIV_ZERO"),
        }
    }
}

/// Diagnostics of one completed scheduler tick
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TickReport {
    /// Tick number (1 for the first completed tick)
    pub tick: u64,
    /// Every warning raised while resolving the tick's roots
    pub warnings: Warnings,
    /// Cells whose charge was outside [-1, 1] after evaluation
    pub overflowed: Vec<Coord>,
    /// Cells that hit a zero divisor on an inbound connection
    pub div_zero: Vec<Coord>,
    /// Cells resolved during the tick
    pub evaluated: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bits_match_status_codes() {
        assert_eq!(Warnings::overflow().code(), Status::OverflowCell.code());
        assert_eq!(Warnings::div_zero().code(), Status::DivisionByZero.code());
    }

    #[test]
    fn test_aggregate() {
        let mut w = Warnings::NONE;
        assert!(w.is_empty());
        w |= Warnings::div_zero();
        w |= Warnings::div_zero();
        assert!(w.has_div_zero());
        assert!(!w.has_overflow());
        let all = w | Warnings::overflow();
        assert_eq!(all.code(), 17);
        assert_eq!(all.to_string(), "OVERFLOW_CELL|DIV_ZERO");
    }
}
