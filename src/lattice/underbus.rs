//! Underbus - the staged scalar consumed by programming calls
//!
//! Reading the underbus never clears it; the same value feeds every HOLD
//! program and connection modifier until it is set again.

use std::sync::atomic::{AtomicU32, Ordering};

use super::cell::Charge;
use crate::error::{LatticeError, Result};

#[derive(Debug, Default)]
pub struct Underbus(AtomicU32);

impl Underbus {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn get(&self) -> Charge {
        f32::from_bits(self.0.load(Ordering::Acquire))
    }

    #[inline]
    pub fn set(&self, value: Charge) {
        self.0.store(value.to_bits(), Ordering::Release);
    }

    /// Store `value / range`; float and integer operands give the same result
    pub fn set_scaled<T: Into<f64>>(&self, value: T, range: T) -> Result<Charge> {
        let scaled = scale_down(value.into(), range.into())?;
        self.set(scaled);
        Ok(scaled)
    }
}

/// Convert caller units to lattice units (`value / range`)
pub(crate) fn scale_down(value: f64, range: f64) -> Result<Charge> {
    if range == 0.0 {
        return Err(LatticeError::DivisionByZero);
    }
    Ok((value / range) as Charge)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_read_is_not_destructive() {
        let bus = Underbus::new();
        assert_eq!(bus.get(), 0.0);
        bus.set(0.25);
        assert_eq!(bus.get(), 0.25);
        assert_eq!(bus.get(), 0.25);
    }

    #[test]
    fn test_scaled_variants_agree() {
        let bus = Underbus::new();
        let from_int = bus.set_scaled(32i32, 128i32).unwrap();
        let from_float = bus.set_scaled(32.0f32, 128.0f32).unwrap();
        assert_eq!(from_int, from_float);
        assert_eq!(bus.get(), 0.25);
    }

    #[test]
    fn test_zero_range() {
        let bus = Underbus::new();
        bus.set(0.5);
        assert_eq!(bus.set_scaled(1, 0), Err(LatticeError::DivisionByZero));
        assert_eq!(bus.get(), 0.5);
    }
}
