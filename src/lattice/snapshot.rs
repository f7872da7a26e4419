//! Diagnostic snapshot of a lattice
//!
//! Only cells that differ from the power-on state (HOLD at 0.0) and active
//! connections are listed, so a sparse program stays readable as JSON.

use super::address::{Axis, Coord};
use super::cell::{Charge, Operation};
use super::connection::Connection;
use super::noise::NoiseMode;

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CellSnapshot {
    pub at: Coord,
    pub operation: Operation,
    pub charge: Charge,
}

/// An active connection, named by the cell that stores it
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConnectionSnapshot {
    /// Lower-coordinate cell of the pair
    pub anchor: Coord,
    pub axis: Axis,
    pub connection: Connection,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LatticeSnapshot {
    pub dims: [usize; 3],
    /// Ticks completed when the snapshot was taken
    pub tick: u64,
    pub timestep: f64,
    pub underbus: Charge,
    pub integrating: bool,
    pub noise: NoiseMode,
    pub cells: Vec<CellSnapshot>,
    pub connections: Vec<ConnectionSnapshot>,
}

impl LatticeSnapshot {
    pub fn cell(&self, x: usize, y: usize, z: usize) -> Option<&CellSnapshot> {
        let at = Coord::new(x, y, z);
        self.cells.iter().find(|c| c.at == at)
    }

    /// Connections stored on the cell at `anchor`
    pub fn connections_at(&self, anchor: Coord) -> impl Iterator<Item = &ConnectionSnapshot> {
        self.connections.iter().filter(move |c| c.anchor == anchor)
    }

    /// Pretty JSON rendering
    #[cfg(feature = "serde")]
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lattice::connection::{Flow, Modifier};

    fn sample() -> LatticeSnapshot {
        LatticeSnapshot {
            dims: [3, 2, 1],
            tick: 7,
            timestep: 0.01,
            underbus: 0.5,
            integrating: true,
            noise: NoiseMode::quiet(),
            cells: vec![CellSnapshot {
                at: Coord::new(1, 0, 0),
                operation: Operation::Integrate,
                charge: 0.125,
            }],
            connections: vec![ConnectionSnapshot {
                anchor: Coord::new(0, 0, 0),
                axis: Axis::X,
                connection: Connection::flowing(Flow::TowardPositive)
                    .with_modifier(Modifier::Coefficient(0.5)),
            }],
        }
    }

    #[test]
    fn test_lookup() {
        let snap = sample();
        assert_eq!(snap.cell(1, 0, 0).map(|c| c.operation), Some(Operation::Integrate));
        assert!(snap.cell(2, 0, 0).is_none());
        assert_eq!(snap.connections_at(Coord::new(0, 0, 0)).count(), 1);
        assert_eq!(snap.connections_at(Coord::new(1, 0, 0)).count(), 0);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_json_fields() {
        let json = sample().to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["tick"], 7);
        assert_eq!(value["cells"][0]["operation"], "Integrate");
        assert_eq!(value["connections"][0]["axis"], "X");

        let back: LatticeSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, sample());
    }
}
