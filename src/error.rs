//! Error types for the analog lattice
//!
//! Every public operation reports one status from a closed set. The numeric
//! codes are part of the external contract and are bit-distinct so that a
//! caller may OR several of them into one status word.

use std::fmt;
use thiserror::Error;

/// Closed set of operation statuses with their stable numeric codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Status {
    /// No errors
    Ok = 0,
    /// A cell left the nominal [-1, 1] charge range
    OverflowCell = 1,
    /// A bad configuration was attempted
    BadConfig = 2,
    /// The lattice was not initialized
    NotInitialized = 4,
    /// An unknown error occurred
    Unknown = 8,
    /// Division by zero occurred
    DivisionByZero = 16,
    /// A cell position outside the lattice was addressed
    BadCellPosition = 32,
    /// The requested feature is declared but not implemented
    Undefined = 64,
    /// No connection exists in the requested direction
    NoConnection = 128,
}

impl Status {
    /// Numeric status code
    pub const fn code(self) -> u32 {
        self as u32
    }

    /// Status of an operation result
    pub fn from_result<T>(result: &Result<T>) -> Self {
        match result {
            Ok(_) => Status::Ok,
            Err(e) => e.status(),
        }
    }

    /// Human-readable name
    pub const fn name(self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::OverflowCell => "OVERFLOW_CELL",
            Status::BadConfig => "BAD_CONFIG",
            Status::NotInitialized => "NOT_INIT",
            Status::Unknown => "UNKNOWN",
            Status::DivisionByZero => "DIV_ZERO",
            Status::BadCellPosition => "BAD_CELL_POS",
            Status::Undefined => "UNDEFINED",
            Status::NoConnection => "NO_CONNECTION",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Lattice error type
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LatticeError {
    /// A cell charge left the nominal range
    #[error("Cell ({x}, {y}, {z}) overflowed its bounds")]
    OverflowCell { x: usize, y: usize, z: usize },

    /// Rejected configuration (bad dimensions, opcode bits, input-face program)
    #[error("Bad configuration: {0}")]
    BadConfig(String),

    /// Operation on a lattice that is not initialized (or already destroyed)
    #[error("Lattice is not initialized")]
    NotInitialized,

    /// Unexpected failure (scheduler thread panic, poisoned state)
    #[error("Unknown error: {0}")]
    Unknown(String),

    /// Division by zero in a scaling operation
    #[error("Division by zero")]
    DivisionByZero,

    /// Coordinate or derived index outside the lattice
    #[error("Cell position ({x}, {y}, {z}) is out of bounds")]
    BadCellPosition { x: usize, y: usize, z: usize },

    /// Declared feature without an implementation
    #[error("Undefined feature: {0}")]
    Undefined(&'static str),

    /// No connection exists in the requested direction
    #[error("No connection from ({x}, {y}, {z}) toward {direction}")]
    NoConnection {
        x: usize,
        y: usize,
        z: usize,
        direction: &'static str,
    },
}

impl LatticeError {
    /// Status code for this error
    pub fn status(&self) -> Status {
        match self {
            LatticeError::OverflowCell { .. } => Status::OverflowCell,
            LatticeError::BadConfig(_) => Status::BadConfig,
            LatticeError::NotInitialized => Status::NotInitialized,
            LatticeError::Unknown(_) => Status::Unknown,
            LatticeError::DivisionByZero => Status::DivisionByZero,
            LatticeError::BadCellPosition { .. } => Status::BadCellPosition,
            LatticeError::Undefined(_) => Status::Undefined,
            LatticeError::NoConnection { .. } => Status::NoConnection,
        }
    }

    pub(crate) fn bad_config(msg: impl Into<String>) -> Self {
        LatticeError::BadConfig(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, LatticeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes_are_distinct_bits() {
        let all = [
            Status::OverflowCell,
            Status::BadConfig,
            Status::NotInitialized,
            Status::Unknown,
            Status::DivisionByZero,
            Status::BadCellPosition,
            Status::Undefined,
            Status::NoConnection,
        ];
        let mut seen = 0u32;
        for s in all {
            assert_eq!(s.code().count_ones(), 1, "{} is not a single bit", s);
            assert_eq!(seen & s.code(), 0);
            seen |= s.code();
        }
        assert_eq!(Status::Ok.code(), 0);
    }

    #[test]
    fn test_error_status_mapping() {
        let err = LatticeError::BadCellPosition { x: 9, y: 0, z: 0 };
        assert_eq!(err.status(), Status::BadCellPosition);
        assert_eq!(Status::from_result::<()>(&Err(err)), Status::BadCellPosition);
        assert_eq!(Status::from_result(&Ok(1)), Status::Ok);
        assert_eq!(LatticeError::NotInitialized.status().code(), 4);
    }

    #[test]
    fn test_display() {
        let err = LatticeError::NoConnection { x: 0, y: 1, z: 2, direction: "-X" };
        let text = err.to_string();
        assert!(text.contains("(0, 1, 2)"));
        assert!(text.contains("-X"));
    }
}
