//! Connection - a configurable edge between two axis-adjacent cells
//!
//! A connection is stored once, on the cell at the lower coordinate of the
//! pair (see [`EdgeStore`](super::EdgeStore)). Its `flow` names the absolute
//! axis direction the signal travels, so the same record is inbound for one of
//! the two cells and outbound for the other.
//!
//! ## Propagation order
//!
//! ```text
//! source charge → modifier → absolute → invert → value
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

use super::address::Sign;
use super::cell::Charge;
use super::instruction::ConnectWord;
use super::warnings::Warnings;

/// Value substituted for a division by zero
pub const DIV_ZERO_DEFAULT: Charge = 0.0;

/// Absolute direction a connection carries its signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Flow {
    /// Into the cell at the higher coordinate
    #[default]
    TowardPositive,
    /// Into the cell at the lower coordinate
    TowardNegative,
}

/// Scaling stage of a connection, with the value captured from the underbus
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Modifier {
    #[default]
    None,
    /// Multiply by the value
    Coefficient(Charge),
    /// Divide by the value
    Divisor(Charge),
    /// -1 / 0 / +1 as the source is below / equal to / above the value
    Comparator(Charge),
}

impl Modifier {
    /// Two-bit kind code used in the instruction word (0-3)
    pub const fn kind_code(&self) -> u32 {
        match self {
            Modifier::None => 0,
            Modifier::Coefficient(_) => 1,
            Modifier::Divisor(_) => 2,
            Modifier::Comparator(_) => 3,
        }
    }

    /// Build from a kind code and the captured value
    pub fn from_kind(code: u32, value: Charge) -> Self {
        match code & 0b11 {
            1 => Modifier::Coefficient(value),
            2 => Modifier::Divisor(value),
            3 => Modifier::Comparator(value),
            _ => Modifier::None,
        }
    }

    pub const fn value(&self) -> Option<Charge> {
        match *self {
            Modifier::None => None,
            Modifier::Coefficient(v) | Modifier::Divisor(v) | Modifier::Comparator(v) => Some(v),
        }
    }

    fn apply(&self, source: Charge) -> (Charge, Warnings) {
        match *self {
            Modifier::None => (source, Warnings::NONE),
            Modifier::Coefficient(k) => (source * k, Warnings::NONE),
            Modifier::Divisor(d) if d == 0.0 => (DIV_ZERO_DEFAULT, Warnings::div_zero()),
            Modifier::Divisor(d) => (source / d, Warnings::NONE),
            Modifier::Comparator(r) => {
                let v = if source < r {
                    -1.0
                } else if source > r {
                    1.0
                } else {
                    0.0
                };
                (v, Warnings::NONE)
            }
        }
    }
}

/// One edge record
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Connection {
    pub active: bool,
    pub flow: Flow,
    pub modifier: Modifier,
    /// Negate the propagated value
    pub invert: bool,
    /// Take the magnitude of the propagated value
    pub absolute: bool,
}

impl Connection {
    /// Active connection with no modifier
    pub fn flowing(flow: Flow) -> Self {
        Self {
            active: true,
            flow,
            ..Default::default()
        }
    }

    pub fn with_modifier(mut self, modifier: Modifier) -> Self {
        self.modifier = modifier;
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

    /// Whether this connection carries a value into the cell that reached it
    /// by stepping `sign` along its axis.
    ///
    /// A cell reaching toward `+` sees the neighbour above it, so the edge is
    /// inbound when it flows toward the lower coordinate; the reverse holds
    /// for `-`.
    pub fn flows_inward(&self, sign: Sign) -> bool {
        self.active
            && matches!(
                (sign, self.flow),
                (Sign::Positive, Flow::TowardNegative) | (Sign::Negative, Flow::TowardPositive)
            )
    }

    /// Transform a source charge through this connection
    pub fn propagate(&self, source: Charge) -> (Charge, Warnings) {
        let (mut value, warnings) = self.modifier.apply(source);
        if self.absolute {
            value = value.abs();
        }
        if self.invert {
            value = -value;
        }
        (value, warnings)
    }

    /// Pack into one word: low 32 bits use the instruction-word flag layout,
    /// high 32 bits hold the modifier value.
    pub(crate) fn pack(&self) -> u64 {
        let mut flags = 0u32;
        if self.active {
            flags |= ConnectWord::ACTIVE;
        }
        if self.flow == Flow::TowardNegative {
            flags |= ConnectWord::FLOW_NEG;
        }
        flags |= self.modifier.kind_code() << ConnectWord::MOD_SHIFT;
        if self.invert {
            flags |= ConnectWord::INVERT;
        }
        if self.absolute {
            flags |= ConnectWord::ABSOLUTE;
        }
        let value = self.modifier.value().unwrap_or(0.0).to_bits();
        ((value as u64) << 32) | flags as u64
    }

    pub(crate) fn unpack(word: u64) -> Self {
        let flags = word as u32;
        let value = f32::from_bits((word >> 32) as u32);
        Self {
            active: flags & ConnectWord::ACTIVE != 0,
            flow: if flags & ConnectWord::FLOW_NEG != 0 {
                Flow::TowardNegative
            } else {
                Flow::TowardPositive
            },
            modifier: Modifier::from_kind(
                (flags & ConnectWord::MOD_MASK) >> ConnectWord::MOD_SHIFT,
                value,
            ),
            invert: flags & ConnectWord::INVERT != 0,
            absolute: flags & ConnectWord::ABSOLUTE != 0,
        }
    }
}

/// Storage slot holding one connection, replaced as a whole record
#[derive(Debug, Default)]
pub struct ConnectionSlot(AtomicU64);

impl ConnectionSlot {
    #[inline]
    pub fn load(&self) -> Connection {
        Connection::unpack(self.0.load(Ordering::Acquire))
    }

    #[inline]
    pub fn store(&self, connection: Connection) {
        self.0.store(connection.pack(), Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_slot_is_inactive() {
        let slot = ConnectionSlot::default();
        let c = slot.load();
        assert!(!c.active);
        assert_eq!(c.modifier, Modifier::None);
        assert!(!c.flows_inward(Sign::Positive));
        assert!(!c.flows_inward(Sign::Negative));
    }

    #[test]
    fn test_slot_replaces_whole_record() {
        let slot = ConnectionSlot::default();
        let c = Connection::flowing(Flow::TowardNegative)
            .with_modifier(Modifier::Divisor(-0.25))
            .inverted()
            .absolute();
        slot.store(c);
        assert_eq!(slot.load(), c);

        let d = Connection::flowing(Flow::TowardPositive).with_modifier(Modifier::Comparator(0.5));
        slot.store(d);
        assert_eq!(slot.load(), d);
    }

    #[test]
    fn test_inbound_rule() {
        let up = Connection::flowing(Flow::TowardPositive);
        // the lower cell reaches it with +, the upper cell with -
        assert!(!up.flows_inward(Sign::Positive));
        assert!(up.flows_inward(Sign::Negative));

        let down = Connection::flowing(Flow::TowardNegative);
        assert!(down.flows_inward(Sign::Positive));
        assert!(!down.flows_inward(Sign::Negative));

        let off = Connection { active: false, ..down };
        assert!(!off.flows_inward(Sign::Positive));
    }

    #[test]
    fn test_coefficient_and_divisor() {
        let c = Connection::flowing(Flow::TowardPositive).with_modifier(Modifier::Coefficient(0.5));
        assert_eq!(c.propagate(0.8), (0.4, Warnings::NONE));

        let d = Connection::flowing(Flow::TowardPositive).with_modifier(Modifier::Divisor(4.0));
        assert_eq!(d.propagate(0.8), (0.2, Warnings::NONE));
    }

    #[test]
    fn test_divisor_zero_falls_back() {
        let d = Connection::flowing(Flow::TowardPositive).with_modifier(Modifier::Divisor(0.0));
        let (v, w) = d.propagate(0.7);
        assert_eq!(v, DIV_ZERO_DEFAULT);
        assert_eq!(w, Warnings::div_zero());
    }

    #[test]
    fn test_comparator() {
        let c = Connection::flowing(Flow::TowardPositive).with_modifier(Modifier::Comparator(0.0));
        assert_eq!(c.propagate(0.5).0, 1.0);
        assert_eq!(c.propagate(-0.5).0, -1.0);
        assert_eq!(c.propagate(0.0).0, 0.0);
    }

    #[test]
    fn test_absolute_then_invert() {
        let c = Connection::flowing(Flow::TowardPositive)
            .with_modifier(Modifier::Comparator(0.0))
            .absolute()
            .inverted();
        // |cmp(-0.3, 0)| = 1, then negated
        assert_eq!(c.propagate(-0.3).0, -1.0);
        assert_eq!(c.propagate(0.0).0, 0.0);

        let plain = Connection::flowing(Flow::TowardPositive).inverted();
        assert_eq!(plain.propagate(0.25).0, -0.25);
    }
}
