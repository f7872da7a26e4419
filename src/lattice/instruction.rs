//! Instruction words for programming cores and connections
//!
//! ## Core word
//!
//! ```text
//! [RESERVED:30][OPCODE:2]
//!   OPCODE: 0 HOLD, 1 SUM, 2 MULT, 3 INTEGRATE
//! ```
//!
//! ## Connection word
//!
//! ```text
//!  bit: 9       8          7    6    5..4  3     2..0
//!      [ACTIVE][DEACTIVATE][ABS][INV][MOD:2][FLOW][DIR:3]
//! ```
//!
//! - DIR: `0=+X 1=+Y 2=+Z 3=-X 4=-Y 5=-Z` (6 and 7 are rejected)
//! - FLOW: 0 flows toward the positive-axis cell, 1 toward the negative one
//! - MOD: 0 none, 1 coefficient, 2 divisor, 3 comparator
//! - DEACTIVATE disables the line; ACTIVE asserts it explicitly. A word with
//!   neither bit programs an active line.
//!
//! Bits above ACTIVE are reserved and must be zero. External tooling emits
//! these words directly, so the values are fixed.

use std::fmt;

use super::address::Direction;
use super::cell::{Charge, Operation};
use super::connection::{Connection, Flow, Modifier};
use crate::error::{LatticeError, Result};

/// Core program word constants
pub struct CoreWord;

impl CoreWord {
    pub const MASK: u32 = 3;
    pub const HOLD: u32 = 0;
    pub const SUM: u32 = 1;
    pub const MULT: u32 = 2;
    pub const INTEGRATE: u32 = 3;

    /// Decode a core word; reserved bits must be clear
    pub fn decode(word: u32) -> Result<Operation> {
        if word & !Self::MASK != 0 {
            return Err(LatticeError::bad_config(format!(
                "core word {:#x} sets reserved bits",
                word
            )));
        }
        Operation::from_u8(word as u8)
            .ok_or_else(|| LatticeError::bad_config(format!("bad opcode {}", word)))
    }

    pub const fn encode(op: Operation) -> u32 {
        op as u32
    }
}

/// Connection program word constants
pub struct ConnectWord;

impl ConnectWord {
    pub const DIR_MASK: u32 = 7;
    pub const PX: u32 = 0;
    pub const PY: u32 = 1;
    pub const PZ: u32 = 2;
    pub const NX: u32 = 3;
    pub const NY: u32 = 4;
    pub const NZ: u32 = 5;

    pub const FLOW_POS: u32 = 0;
    pub const FLOW_NEG: u32 = 8;

    pub const MOD_SHIFT: u32 = 4;
    pub const MOD_MASK: u32 = 48;
    pub const MOD_COEFF: u32 = 16;
    pub const MOD_DIVIS: u32 = 32;
    pub const MOD_COMP: u32 = 48;

    pub const INVERT: u32 = 64;
    pub const ABSOLUTE: u32 = 128;
    pub const DEACTIVATE: u32 = 256;
    pub const ACTIVE: u32 = 512;

    /// Every bit with a defined meaning
    pub const DEFINED: u32 = 1023;
}

/// Modifier kind named by a connection word (the value comes from the underbus)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ModifierKind {
    #[default]
    None,
    Coefficient,
    Divisor,
    Comparator,
}

impl ModifierKind {
    const fn from_bits(bits: u32) -> Self {
        match bits & 0b11 {
            1 => Self::Coefficient,
            2 => Self::Divisor,
            3 => Self::Comparator,
            _ => Self::None,
        }
    }

    const fn bits(self) -> u32 {
        match self {
            Self::None => 0,
            Self::Coefficient => 1,
            Self::Divisor => 2,
            Self::Comparator => 3,
        }
    }

    /// Bind the kind to a captured value
    pub fn with_value(self, value: Charge) -> Modifier {
        match self {
            Self::None => Modifier::None,
            Self::Coefficient => Modifier::Coefficient(value),
            Self::Divisor => Modifier::Divisor(value),
            Self::Comparator => Modifier::Comparator(value),
        }
    }

    pub const fn needs_value(self) -> bool {
        !matches!(self, Self::None)
    }
}

/// Decoded connection instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConnectInstruction {
    pub direction: Direction,
    pub flow: Flow,
    pub modifier: ModifierKind,
    pub invert: bool,
    pub absolute: bool,
    pub active: bool,
}

impl ConnectInstruction {
    /// Active, unmodified line in `direction` flowing `flow`
    pub const fn new(direction: Direction, flow: Flow) -> Self {
        Self {
            direction,
            flow,
            modifier: ModifierKind::None,
            invert: false,
            absolute: false,
            active: true,
        }
    }

    /// Parse a connection word
    pub fn decode(word: u32) -> Result<Self> {
        if word & !ConnectWord::DEFINED != 0 {
            return Err(LatticeError::bad_config(format!(
                "connection word {:#x} sets reserved bits",
                word
            )));
        }
        let code = (word & ConnectWord::DIR_MASK) as u8;
        let direction = Direction::from_code(code).ok_or_else(|| {
            LatticeError::bad_config(format!("connection selector {} is not a direction", code))
        })?;
        let deactivate = word & ConnectWord::DEACTIVATE != 0;
        if deactivate && word & ConnectWord::ACTIVE != 0 {
            return Err(LatticeError::bad_config(
                "connection word sets both ACTIVE and DEACTIVATE",
            ));
        }
        Ok(Self {
            direction,
            flow: if word & ConnectWord::FLOW_NEG != 0 {
                Flow::TowardNegative
            } else {
                Flow::TowardPositive
            },
            modifier: ModifierKind::from_bits(
                (word & ConnectWord::MOD_MASK) >> ConnectWord::MOD_SHIFT,
            ),
            invert: word & ConnectWord::INVERT != 0,
            absolute: word & ConnectWord::ABSOLUTE != 0,
            active: !deactivate,
        })
    }

    /// Serialize to the canonical word (active lines carry no ACTIVE bit)
    pub fn encode(&self) -> u32 {
        let mut word = self.direction.code() as u32;
        if self.flow == Flow::TowardNegative {
            word |= ConnectWord::FLOW_NEG;
        }
        word |= self.modifier.bits() << ConnectWord::MOD_SHIFT;
        if self.invert {
            word |= ConnectWord::INVERT;
        }
        if self.absolute {
            word |= ConnectWord::ABSOLUTE;
        }
        if !self.active {
            word |= ConnectWord::DEACTIVATE;
        }
        word
    }

    pub fn modifier(mut self, kind: ModifierKind) -> Self {
        self.modifier = kind;
        self
    }

    pub fn inverted(mut self) -> Self {
        self.invert = true;
        self
    }

    pub fn absolute(mut self) -> Self {
        self.absolute = true;
        self
    }

    pub fn deactivated(mut self) -> Self {
        self.active = false;
        self
    }

    /// Connection record this instruction stores, given the underbus value
    pub fn to_connection(&self, underbus: Charge) -> Connection {
        Connection {
            active: self.active,
            flow: self.flow,
            modifier: self.modifier.with_value(underbus),
            invert: self.invert,
            absolute: self.absolute,
        }
    }
}

impl fmt::Display for ConnectInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flow = match self.flow {
            Flow::TowardPositive => "flow+",
            Flow::TowardNegative => "flow-",
        };
        write!(f, "{} {}", self.direction, flow)?;
        match self.modifier {
            ModifierKind::None => {}
            ModifierKind::Coefficient => f.write_str(" coeff")?,
            ModifierKind::Divisor => f.write_str(" divis")?,
            ModifierKind::Comparator => f.write_str(" comp")?,
        }
        if self.absolute {
            f.write_str(" abs")?;
        }
        if self.invert {
            f.write_str(" inv")?;
        }
        if !self.active {
            f.write_str(" off")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_values() {
        assert_eq!(ConnectWord::NZ, 5);
        assert_eq!(ConnectWord::FLOW_NEG, 8);
        assert_eq!(ConnectWord::MOD_MASK, ConnectWord::MOD_COMP);
        assert_eq!(ConnectWord::MOD_COEFF | ConnectWord::MOD_DIVIS, ConnectWord::MOD_COMP);
        assert_eq!(ConnectWord::INVERT, 64);
        assert_eq!(ConnectWord::ABSOLUTE, 128);
        assert_eq!(ConnectWord::DEACTIVATE, 256);
    }

    #[test]
    fn test_decode_sample_word() {
        // -X, flowing toward +X, comparator, absolute, inverted
        let word = ConnectWord::NX
            | ConnectWord::FLOW_POS
            | ConnectWord::MOD_COMP
            | ConnectWord::ABSOLUTE
            | ConnectWord::INVERT;
        let ins = ConnectInstruction::decode(word).unwrap();
        assert_eq!(ins.direction, Direction::NEG_X);
        assert_eq!(ins.flow, Flow::TowardPositive);
        assert_eq!(ins.modifier, ModifierKind::Comparator);
        assert!(ins.absolute && ins.invert && ins.active);
        assert_eq!(ins.encode(), word);
    }

    #[test]
    fn test_active_bits() {
        let off = ConnectInstruction::decode(ConnectWord::PY | ConnectWord::DEACTIVATE).unwrap();
        assert!(!off.active);
        assert_eq!(off.encode(), ConnectWord::PY | ConnectWord::DEACTIVATE);

        let on = ConnectInstruction::decode(ConnectWord::PY | ConnectWord::ACTIVE).unwrap();
        assert!(on.active);
        // canonical form drops the redundant bit
        assert_eq!(on.encode(), ConnectWord::PY);

        let both = ConnectWord::PY | ConnectWord::ACTIVE | ConnectWord::DEACTIVATE;
        assert!(matches!(
            ConnectInstruction::decode(both),
            Err(LatticeError::BadConfig(_))
        ));
    }

    #[test]
    fn test_rejects_bad_words() {
        assert!(ConnectInstruction::decode(6).is_err());
        assert!(ConnectInstruction::decode(7).is_err());
        assert!(ConnectInstruction::decode(1 << 10).is_err());
        assert!(CoreWord::decode(4).is_err());
        assert!(CoreWord::decode(CoreWord::SUM | 8).is_err());
    }

    #[test]
    fn test_core_words() {
        assert_eq!(CoreWord::decode(CoreWord::HOLD).unwrap(), Operation::Hold);
        assert_eq!(CoreWord::decode(CoreWord::SUM).unwrap(), Operation::Sum);
        assert_eq!(CoreWord::decode(CoreWord::MULT).unwrap(), Operation::Mult);
        assert_eq!(CoreWord::decode(CoreWord::INTEGRATE).unwrap(), Operation::Integrate);
        assert_eq!(CoreWord::encode(Operation::Mult), CoreWord::MULT);
    }

    #[test]
    fn test_builder_and_connection() {
        let ins = ConnectInstruction::new(Direction::POS_Z, Flow::TowardNegative)
            .modifier(ModifierKind::Divisor)
            .inverted();
        assert_eq!(
            ins.encode(),
            ConnectWord::PZ | ConnectWord::FLOW_NEG | ConnectWord::MOD_DIVIS | ConnectWord::INVERT
        );
        let c = ins.to_connection(0.5);
        assert_eq!(c.modifier, Modifier::Divisor(0.5));
        assert!(c.invert && c.active && !c.absolute);
        assert_eq!(ins.to_string(), "+Z flow- divis inv");
    }
}
