//! Cell Store - the grid of compute cells
//!
//! Each cell holds a scalar charge and an operation. Both fields are single
//! atomics, so a reader on another thread sees either the old or the new value
//! of a field, never a mix of the two. Cells are allocated once at
//! construction and never move.

use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};

use super::address::{CellIndex, Coord, Dims};
use crate::error::Result;

/// Scalar carried by a cell (nominal range [-1, 1])
pub type Charge = f32;

/// Cell operation (core program)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum Operation {
    /// Hold the value loaded from the underbus
    #[default]
    Hold = 0,
    /// Sum the inbound values
    Sum = 1,
    /// Multiply the inbound values
    Mult = 2,
    /// Accumulate inbound values scaled by the timestep
    Integrate = 3,
}

impl Operation {
    pub const fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::Hold),
            1 => Some(Self::Sum),
            2 => Some(Self::Mult),
            3 => Some(Self::Integrate),
            _ => None,
        }
    }

    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Hold => "HOLD",
            Self::Sum => "SUM",
            Self::Mult => "MULT",
            Self::Integrate => "INTEGRATE",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One grid point
#[derive(Debug)]
pub struct Cell {
    charge: AtomicU32,
    operation: AtomicU8,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            charge: AtomicU32::new(0f32.to_bits()),
            operation: AtomicU8::new(Operation::Hold.as_u8()),
        }
    }
}

impl Cell {
    #[inline]
    pub fn charge(&self) -> Charge {
        f32::from_bits(self.charge.load(Ordering::Acquire))
    }

    #[inline]
    pub fn set_charge(&self, value: Charge) {
        self.charge.store(value.to_bits(), Ordering::Release);
    }

    #[inline]
    pub fn operation(&self) -> Operation {
        // Only valid discriminants are ever stored
        Operation::from_u8(self.operation.load(Ordering::Acquire)).unwrap_or_default()
    }

    /// Replace the operation, returning the previous one
    #[inline]
    pub fn swap_operation(&self, op: Operation) -> Operation {
        Operation::from_u8(self.operation.swap(op.as_u8(), Ordering::AcqRel)).unwrap_or_default()
    }
}

/// Owner of every cell in the lattice
#[derive(Debug)]
pub struct CellStore {
    dims: Dims,
    cells: Vec<Cell>,
}

impl CellStore {
    /// Allocate every cell with operation HOLD and charge 0
    pub fn new(dims: Dims) -> Self {
        let mut cells = Vec::with_capacity(dims.len());
        cells.resize_with(dims.len(), Cell::default);
        Self { dims, cells }
    }

    pub fn dims(&self) -> &Dims {
        &self.dims
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Cell at (x, y, z)
    pub fn get(&self, x: usize, y: usize, z: usize) -> Result<&Cell> {
        let i = self.dims.index(x, y, z)?;
        Ok(self.at(i))
    }

    pub fn get_coord(&self, c: Coord) -> Result<&Cell> {
        self.get(c.x, c.y, c.z)
    }

    /// Cell at a flat index issued by this store's dimensions
    #[inline]
    pub fn at(&self, index: CellIndex) -> &Cell {
        &self.cells[index.get()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (CellIndex, &Cell)> {
        self.dims.indices().zip(self.cells.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LatticeError;

    #[test]
    fn test_defaults() {
        let store = CellStore::new(Dims::new(3, 2, 2).unwrap());
        assert_eq!(store.len(), 12);
        for (_, cell) in store.iter() {
            assert_eq!(cell.charge(), 0.0);
            assert_eq!(cell.operation(), Operation::Hold);
        }
    }

    #[test]
    fn test_get_bounds() {
        let store = CellStore::new(Dims::new(2, 2, 2).unwrap());
        assert!(store.get(1, 1, 1).is_ok());
        assert!(matches!(
            store.get(0, 2, 0),
            Err(LatticeError::BadCellPosition { x: 0, y: 2, z: 0 })
        ));
    }

    #[test]
    fn test_charge_and_operation() {
        let store = CellStore::new(Dims::new(2, 1, 1).unwrap());
        let cell = store.get(1, 0, 0).unwrap();
        cell.set_charge(-0.75);
        assert_eq!(cell.charge(), -0.75);
        assert_eq!(cell.swap_operation(Operation::Integrate), Operation::Hold);
        assert_eq!(cell.operation(), Operation::Integrate);
        // neighbour untouched
        assert_eq!(store.get(0, 0, 0).unwrap().charge(), 0.0);
    }

    #[test]
    fn test_operation_codes() {
        for v in 0..4u8 {
            assert_eq!(Operation::from_u8(v).unwrap().as_u8(), v);
        }
        assert_eq!(Operation::from_u8(4), None);
    }
}
