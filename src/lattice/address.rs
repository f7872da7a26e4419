//! Addressing - 3D coordinates to flat storage indices and back
//!
//! ## Layout
//!
//! ```text
//! index = x + y·X + z·X·Y
//!         ↑    ↑      ↑
//!      fastest next  slowest
//! ```
//!
//! Neighbour moves use a precomputed table of six flat-index deltas, one per
//! logical direction, so the evaluator never recomputes `index()` per edge.

use std::fmt;

use crate::error::{LatticeError, Result};

/// One of the three lattice axes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum Axis {
    X = 0,
    Y = 1,
    Z = 2,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    /// Slot number (0-2)
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn name(self) -> &'static str {
        match self {
            Axis::X => "X",
            Axis::Y => "Y",
            Axis::Z => "Z",
        }
    }
}

/// Which way along an axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Sign {
    /// Toward the higher coordinate
    Positive,
    /// Toward the lower coordinate
    Negative,
}

impl Sign {
    pub const fn flip(self) -> Self {
        match self {
            Sign::Positive => Sign::Negative,
            Sign::Negative => Sign::Positive,
        }
    }
}

/// One of the six logical edge directions of a cell
///
/// Codes match the connection selector in the instruction word:
/// `0=+X 1=+Y 2=+Z 3=-X 4=-Y 5=-Z`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Direction {
    pub axis: Axis,
    pub sign: Sign,
}

impl Direction {
    pub const POS_X: Direction = Direction::new(Axis::X, Sign::Positive);
    pub const POS_Y: Direction = Direction::new(Axis::Y, Sign::Positive);
    pub const POS_Z: Direction = Direction::new(Axis::Z, Sign::Positive);
    pub const NEG_X: Direction = Direction::new(Axis::X, Sign::Negative);
    pub const NEG_Y: Direction = Direction::new(Axis::Y, Sign::Negative);
    pub const NEG_Z: Direction = Direction::new(Axis::Z, Sign::Negative);

    /// All six directions in selector-code order
    pub const ALL: [Direction; 6] = [
        Self::POS_X,
        Self::POS_Y,
        Self::POS_Z,
        Self::NEG_X,
        Self::NEG_Y,
        Self::NEG_Z,
    ];

    pub const fn new(axis: Axis, sign: Sign) -> Self {
        Self { axis, sign }
    }

    /// Selector code (0-5)
    pub const fn code(self) -> u8 {
        let base = self.axis as u8;
        match self.sign {
            Sign::Positive => base,
            Sign::Negative => base + 3,
        }
    }

    /// Decode a selector code; 6 and 7 are not directions
    pub const fn from_code(code: u8) -> Option<Self> {
        if code < 6 {
            Some(Self::ALL[code as usize])
        } else {
            None
        }
    }

    pub const fn opposite(self) -> Self {
        Self::new(self.axis, self.sign.flip())
    }

    pub const fn name(self) -> &'static str {
        match (self.axis, self.sign) {
            (Axis::X, Sign::Positive) => "+X",
            (Axis::Y, Sign::Positive) => "+Y",
            (Axis::Z, Sign::Positive) => "+Z",
            (Axis::X, Sign::Negative) => "-X",
            (Axis::Y, Sign::Negative) => "-Y",
            (Axis::Z, Sign::Negative) => "-Z",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Integer cell coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Coord {
    pub x: usize,
    pub y: usize,
    pub z: usize,
}

impl Coord {
    pub const fn new(x: usize, y: usize, z: usize) -> Self {
        Self { x, y, z }
    }

    #[inline]
    pub const fn on(&self, axis: Axis) -> usize {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Z => self.z,
        }
    }

    /// Neighbour one step along `direction`, `None` when it would go below zero
    pub fn step(self, direction: Direction) -> Option<Coord> {
        let mut c = self;
        let v = match direction.axis {
            Axis::X => &mut c.x,
            Axis::Y => &mut c.y,
            Axis::Z => &mut c.z,
        };
        *v = match direction.sign {
            Sign::Positive => v.checked_add(1)?,
            Sign::Negative => v.checked_sub(1)?,
        };
        Some(c)
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Bounds-checked flat cell index
///
/// Only [`Dims`] and [`Neighbors`] hand these out, so a `CellIndex`
/// always addresses a live cell of the lattice it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellIndex(usize);

impl CellIndex {
    #[inline]
    pub const fn get(self) -> usize {
        self.0
    }

    #[inline]
    fn offset(self, delta: isize) -> Self {
        Self(self.0.wrapping_add_signed(delta))
    }
}

impl fmt::Display for CellIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lattice dimensions plus the derived neighbour delta table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dims {
    pub x: usize,
    pub y: usize,
    pub z: usize,
    len: usize,
    deltas: [isize; 6],
}

impl Dims {
    /// Validate and build dimensions. Every axis must be at least 1 and the
    /// cell count must fit in memory-addressable space.
    pub fn new(x: usize, y: usize, z: usize) -> Result<Self> {
        if x == 0 || y == 0 || z == 0 {
            return Err(LatticeError::bad_config(format!(
                "dimensions must be non-zero, got {}x{}x{}",
                x, y, z
            )));
        }
        let plane = x
            .checked_mul(y)
            .ok_or_else(|| LatticeError::bad_config("lattice too large"))?;
        let len = plane
            .checked_mul(z)
            .ok_or_else(|| LatticeError::bad_config("lattice too large"))?;
        if len > isize::MAX as usize {
            return Err(LatticeError::bad_config("lattice too large"));
        }
        let (dx, dy, dz) = (1isize, x as isize, plane as isize);
        Ok(Self {
            x,
            y,
            z,
            len,
            deltas: [dx, dy, dz, -dx, -dy, -dz],
        })
    }

    /// Total number of cells
    #[inline]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub const fn extent(&self, axis: Axis) -> usize {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Z => self.z,
        }
    }

    pub fn contains(&self, c: Coord) -> bool {
        c.x < self.x && c.y < self.y && c.z < self.z
    }

    /// Flat index of (x, y, z); out-of-bounds coordinates are rejected
    pub fn index(&self, x: usize, y: usize, z: usize) -> Result<CellIndex> {
        if x >= self.x || y >= self.y || z >= self.z {
            return Err(LatticeError::BadCellPosition { x, y, z });
        }
        let i = x + y * self.x + z * self.x * self.y;
        if i >= self.len {
            return Err(LatticeError::BadCellPosition { x, y, z });
        }
        Ok(CellIndex(i))
    }

    #[inline]
    pub fn index_of(&self, c: Coord) -> Result<CellIndex> {
        self.index(c.x, c.y, c.z)
    }

    /// Inverse of [`Dims::index`]
    pub fn coord(&self, index: CellIndex) -> Coord {
        let plane = self.x * self.y;
        let i = index.0;
        let z = i / plane;
        let rem = i % plane;
        Coord::new(rem % self.x, rem / self.x, z)
    }

    /// Flat-index delta for one step along `direction`
    #[inline]
    pub const fn delta(&self, direction: Direction) -> isize {
        self.deltas[direction.code() as usize]
    }

    /// The six deltas in selector-code order
    pub const fn deltas(&self) -> &[isize; 6] {
        &self.deltas
    }

    /// Neighbour of `index` along `direction`, `None` past a face
    pub fn step(&self, index: CellIndex, direction: Direction) -> Option<CellIndex> {
        let at = self.coord(index).on(direction.axis);
        let inside = match direction.sign {
            Sign::Positive => at + 1 < self.extent(direction.axis),
            Sign::Negative => at > 0,
        };
        inside.then(|| index.offset(self.delta(direction)))
    }

    /// Iterate every cell index in storage order
    pub fn indices(&self) -> impl Iterator<Item = CellIndex> {
        (0..self.len).map(CellIndex)
    }
}

/// Neighbour lookup for hot paths
///
/// Holds one byte per cell with bit `code` set when the face toward
/// `Direction::from_code(code)` has a neighbour, so a step is a mask test
/// plus an add.
#[derive(Debug, Clone)]
pub struct Neighbors {
    dims: Dims,
    open: Vec<u8>,
}

impl Neighbors {
    pub fn new(dims: Dims) -> Self {
        let open = dims
            .indices()
            .map(|i| {
                let c = dims.coord(i);
                Direction::ALL
                    .iter()
                    .filter(|d| c.step(**d).is_some_and(|n| dims.contains(n)))
                    .fold(0u8, |mask, d| mask | 1 << d.code())
            })
            .collect();
        Self { dims, open }
    }

    /// Same answer as [`Dims::step`] without the coordinate division
    #[inline]
    pub fn step(&self, index: CellIndex, direction: Direction) -> Option<CellIndex> {
        let open = self.open[index.0] & (1 << direction.code()) != 0;
        open.then(|| index.offset(self.dims.delta(direction)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;
    use std::collections::HashSet;

    #[test]
    fn test_index_layout() {
        let d = Dims::new(4, 3, 2).unwrap();
        assert_eq!(d.index(0, 0, 0).unwrap().get(), 0);
        assert_eq!(d.index(1, 0, 0).unwrap().get(), 1);
        assert_eq!(d.index(0, 1, 0).unwrap().get(), 4);
        assert_eq!(d.index(0, 0, 1).unwrap().get(), 12);
        assert_eq!(d.index(3, 2, 1).unwrap().get(), 23);
        assert_eq!(d.len(), 24);
    }

    #[test]
    fn test_index_is_injective_and_invertible() {
        let d = Dims::new(5, 3, 4).unwrap();
        let mut seen = HashSet::new();
        for z in 0..4 {
            for y in 0..3 {
                for x in 0..5 {
                    let i = d.index(x, y, z).unwrap();
                    assert!(seen.insert(i));
                    assert_eq!(d.coord(i), Coord::new(x, y, z));
                }
            }
        }
        assert_eq!(seen.len(), d.len());
    }

    #[test]
    fn test_random_dims_roundtrip() {
        let mut rng = rand::thread_rng();
        for _ in 0..50 {
            let d = Dims::new(
                rng.gen_range(1..20),
                rng.gen_range(1..20),
                rng.gen_range(1..20),
            )
            .unwrap();
            for _ in 0..100 {
                let c = Coord::new(
                    rng.gen_range(0..d.x),
                    rng.gen_range(0..d.y),
                    rng.gen_range(0..d.z),
                );
                let i = d.index_of(c).unwrap();
                assert!(i.get() < d.len());
                assert_eq!(d.coord(i), c);
            }
        }
    }

    #[test]
    fn test_out_of_bounds_rejected() {
        let d = Dims::new(2, 2, 2).unwrap();
        assert_eq!(
            d.index(2, 0, 0),
            Err(LatticeError::BadCellPosition { x: 2, y: 0, z: 0 })
        );
        assert!(d.index(0, 2, 0).is_err());
        assert!(d.index(0, 0, 2).is_err());
        assert!(d.index(usize::MAX, 0, 0).is_err());
    }

    #[test]
    fn test_bad_dims() {
        assert!(Dims::new(0, 1, 1).is_err());
        assert!(Dims::new(1, 0, 1).is_err());
        assert!(Dims::new(usize::MAX, 2, 2).is_err());
    }

    #[test]
    fn test_direction_codes() {
        for (code, dir) in Direction::ALL.iter().enumerate() {
            assert_eq!(dir.code() as usize, code);
            assert_eq!(Direction::from_code(code as u8), Some(*dir));
        }
        assert_eq!(Direction::from_code(6), None);
        assert_eq!(Direction::from_code(7), None);
        assert_eq!(Direction::NEG_Y.opposite(), Direction::POS_Y);
    }

    #[test]
    fn test_step_matches_index() {
        let d = Dims::new(3, 4, 5).unwrap();
        for i in d.indices() {
            let c = d.coord(i);
            for dir in Direction::ALL {
                let expected = c.step(dir).filter(|n| d.contains(*n));
                let stepped = d.step(i, dir).map(|n| d.coord(n));
                assert_eq!(stepped, expected, "{} from {}", dir, c);
            }
        }
    }

    #[test]
    fn test_neighbors_agree_with_step() {
        for (x, y, z) in [(3, 4, 5), (1, 1, 1), (7, 1, 1), (1, 6, 2)] {
            let d = Dims::new(x, y, z).unwrap();
            let n = Neighbors::new(d);
            for i in d.indices() {
                for dir in Direction::ALL {
                    assert_eq!(n.step(i, dir), d.step(i, dir), "{} from {}", dir, d.coord(i));
                }
            }
        }
    }
}
