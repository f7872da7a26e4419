//! Analog Lattice - a 3D grid of programmable cells evaluated as dataflow
//!
//! Each cell holds one charge and runs one operation. Axis-adjacent cells are
//! joined by at most one configurable connection. A scheduler thread ticks
//! the grid every timestep; each tick resolves integrators and output-face
//! endpoints depth-first through the cells that feed them.
//!
//! ## Faces
//!
//! ```text
//!          y
//!          ↑   input face        output face
//!          │   x = 0             x = X-1
//!          │  ┌──┬──┬──┬──┐
//!          │  │IN│  │  │OU│    write_input(y, z, v)  → (0,   y, z)
//!          │  ├──┼──┼──┼──┤    read_output(y, z)     ← (X-1, y, z)
//!          │  │IN│  │  │OU│
//!          │  └──┴──┴──┴──┘
//!          └──────────────────→ x
//! ```
//!
//! ## Core word
//!
//! ```text
//! bits 0-1: HOLD=0 SUM=1 MULT=2 INTEGRATE=3   (other bits must be clear)
//! ```
//!
//! ## Connection word
//!
//! ```text
//! [ACTIVE:1][DEACTIVATE:1][ABS:1][INV:1][MOD:2][FLOW:1][DIR:3]
//!    9          8           7      6     5-4     3      2-0
//! ```
//!
//! - DIR: `0=+X 1=+Y 2=+Z 3=-X 4=-Y 5=-Z`
//! - FLOW: 0 toward `+`, 1 toward `-`
//! - MOD: none / coefficient / divisor / comparator, value taken from the underbus
//!
//! ## Example
//!
//! ```
//! use analog_lattice::{ConnectWord, CoreWord, Lattice, LatticeConfig};
//!
//! let lattice = Lattice::manual(LatticeConfig::with_dims(2, 1, 1).with_timestep(0.1))?;
//! lattice.program_core(1, 0, 0, CoreWord::INTEGRATE)?;
//! lattice.program_connection(1, 0, 0, ConnectWord::NX | ConnectWord::FLOW_POS)?;
//! lattice.write_input(0, 0, 0.5)?;
//! lattice.step_ticks(10)?;
//! assert!((lattice.read_output(0, 0)? - 0.5).abs() < 1e-4);
//! # Ok::<(), analog_lattice::LatticeError>(())
//! ```

mod address;
mod cell;
mod connection;
mod edges;
mod engine;
mod evaluate;
mod instruction;
mod noise;
mod scheduler;
mod snapshot;
mod underbus;
mod warnings;

pub use address::{Axis, CellIndex, Coord, Dims, Direction, Neighbors, Sign};
pub use cell::{Cell, CellStore, Charge, Operation};
pub use connection::{Connection, Flow, Modifier, DIV_ZERO_DEFAULT};
pub use edges::{EdgeRef, EdgeStore};
pub use engine::{Lattice, LatticeBuilder};
pub use instruction::{ConnectInstruction, ConnectWord, CoreWord, ModifierKind};
pub use noise::{NoiseMode, NoisePolicy, Quiet};
pub use scheduler::MIN_TICK_SLEEP;
pub use snapshot::{CellSnapshot, ConnectionSnapshot, LatticeSnapshot};
pub use underbus::Underbus;
pub use warnings::{TickReport, Warnings};
