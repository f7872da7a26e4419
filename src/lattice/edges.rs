//! Edge Store / Connection Resolver
//!
//! Each cell owns three slots, one per axis, for the edge toward its `+`
//! neighbour. The `-` edge of a cell is the `+` edge of the neighbour one step
//! down the same axis, so every edge is stored exactly once:
//!
//! ```text
//!   (x-1,y,z) ──[+X slot of x-1]── (x,y,z) ──[+X slot of x]── (x+1,y,z)
//!                      ↑                              ↑
//!              "-X" edge of (x,y,z)          "+X" edge of (x,y,z)
//! ```

use super::address::{Axis, CellIndex, Coord, Dims, Direction, Neighbors, Sign};
use super::connection::{Connection, ConnectionSlot};
use crate::error::{LatticeError, Result};

/// Canonical backing record of a logical edge
#[derive(Debug, Clone, Copy)]
pub struct EdgeRef<'a> {
    /// Cell on the lower-coordinate side that stores the record
    pub anchor: CellIndex,
    pub axis: Axis,
    slot: &'a ConnectionSlot,
}

impl<'a> EdgeRef<'a> {
    #[inline]
    pub fn load(&self) -> Connection {
        self.slot.load()
    }

    #[inline]
    pub fn store(&self, connection: Connection) {
        self.slot.store(connection)
    }

    /// True when both references name the same stored record
    pub fn same_record(&self, other: &EdgeRef<'_>) -> bool {
        std::ptr::eq(self.slot, other.slot)
    }
}

/// Owner of every connection slot
#[derive(Debug)]
pub struct EdgeStore {
    dims: Dims,
    neighbors: Neighbors,
    slots: Vec<ConnectionSlot>,
}

impl EdgeStore {
    pub fn new(dims: Dims) -> Self {
        let mut slots = Vec::with_capacity(dims.len() * 3);
        slots.resize_with(dims.len() * 3, ConnectionSlot::default);
        Self {
            dims,
            neighbors: Neighbors::new(dims),
            slots,
        }
    }

    #[inline]
    fn slot(&self, anchor: CellIndex, axis: Axis) -> &ConnectionSlot {
        &self.slots[anchor.get() * 3 + axis.index()]
    }

    /// Resolve the edge of (x, y, z) toward `direction` to its stored record
    pub fn resolve(&self, x: usize, y: usize, z: usize, direction: Direction) -> Result<EdgeRef<'_>> {
        let index = self.dims.index(x, y, z)?;
        self.resolve_index(index, direction)
            .ok_or(LatticeError::NoConnection {
                x,
                y,
                z,
                direction: direction.name(),
            })
    }

    pub fn resolve_coord(&self, c: Coord, direction: Direction) -> Result<EdgeRef<'_>> {
        self.resolve(c.x, c.y, c.z, direction)
    }

    /// Index-based resolution; `None` when the edge would leave the lattice
    pub fn resolve_index(&self, index: CellIndex, direction: Direction) -> Option<EdgeRef<'_>> {
        match direction.sign {
            Sign::Positive => {
                self.neighbors.step(index, direction)?;
                Some(EdgeRef {
                    anchor: index,
                    axis: direction.axis,
                    slot: self.slot(index, direction.axis),
                })
            }
            Sign::Negative => {
                let below = self.neighbors.step(index, direction)?;
                self.resolve_index(below, direction.opposite())
            }
        }
    }

    /// Neighbour and connection feeding `index` from `direction`, if that
    /// edge exists, is active and flows into `index`.
    #[inline]
    pub fn inbound(&self, index: CellIndex, direction: Direction) -> Option<(CellIndex, Connection)> {
        let neighbor = self.neighbors.step(index, direction)?;
        let anchor = match direction.sign {
            Sign::Positive => index,
            Sign::Negative => neighbor,
        };
        let connection = self.slot(anchor, direction.axis).load();
        connection
            .flows_inward(direction.sign)
            .then_some((neighbor, connection))
    }

    /// Every active connection as (anchor, axis, record)
    pub fn active(&self) -> impl Iterator<Item = (CellIndex, Axis, Connection)> + '_ {
        self.dims.indices().flat_map(move |i| {
            Axis::ALL.into_iter().filter_map(move |axis| {
                let c = self.slot(i, axis).load();
                c.active.then_some((i, axis, c))
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lattice::connection::Flow;

    fn store(x: usize, y: usize, z: usize) -> (Dims, EdgeStore) {
        let d = Dims::new(x, y, z).unwrap();
        (d, EdgeStore::new(d))
    }

    #[test]
    fn test_negative_aliases_lower_neighbor() {
        let (d, edges) = store(3, 3, 3);
        for i in d.indices() {
            let c = d.coord(i);
            for axis in Axis::ALL {
                let neg = Direction::new(axis, Sign::Negative);
                let pos = Direction::new(axis, Sign::Positive);
                if c.on(axis) == 0 {
                    assert!(matches!(
                        edges.resolve_coord(c, neg),
                        Err(LatticeError::NoConnection { .. })
                    ));
                } else {
                    let below = c.step(neg).unwrap();
                    let a = edges.resolve_coord(c, neg).unwrap();
                    let b = edges.resolve_coord(below, pos).unwrap();
                    assert!(a.same_record(&b));
                    assert_eq!(a.anchor, d.index_of(below).unwrap());
                }
            }
        }
    }

    #[test]
    fn test_positive_at_far_face_has_no_connection() {
        let (_, edges) = store(2, 2, 1);
        assert!(edges.resolve(0, 0, 0, Direction::POS_X).is_ok());
        assert!(matches!(
            edges.resolve(1, 0, 0, Direction::POS_X),
            Err(LatticeError::NoConnection { direction: "+X", .. })
        ));
        assert!(matches!(
            edges.resolve(0, 0, 0, Direction::POS_Z),
            Err(LatticeError::NoConnection { .. })
        ));
    }

    #[test]
    fn test_bad_position() {
        let (_, edges) = store(2, 2, 2);
        assert!(matches!(
            edges.resolve(5, 0, 0, Direction::NEG_X),
            Err(LatticeError::BadCellPosition { .. })
        ));
    }

    #[test]
    fn test_write_through_alias() {
        let (d, edges) = store(3, 1, 1);
        edges
            .resolve(1, 0, 0, Direction::NEG_X)
            .unwrap()
            .store(Connection::flowing(Flow::TowardPositive));

        let stored = edges.resolve(0, 0, 0, Direction::POS_X).unwrap().load();
        assert!(stored.active);

        let mid = d.index(1, 0, 0).unwrap();
        let (src, _) = edges.inbound(mid, Direction::NEG_X).unwrap();
        assert_eq!(src, d.index(0, 0, 0).unwrap());
        // the lower cell sees the same record as outbound
        assert!(edges.inbound(src, Direction::POS_X).is_none());
        assert_eq!(edges.active().count(), 1);
    }
}
