//! # Analog Lattice
//!
//! Emulator for a programmable three-dimensional analog compute lattice.
//!
//! A lattice is an X × Y × Z grid of cells. Each cell holds a charge and runs
//! one operation (HOLD, SUM, MULT or INTEGRATE); neighbouring cells are wired
//! by configurable connections that scale, compare, invert or rectify the
//! signal they carry. A background scheduler ticks the grid at a fixed
//! timestep, so programmed integrators evolve continuously while the caller
//! writes the input face and reads the output face.
//!
//! ## Core Components
//!
//! - **[`Lattice`]**: Program API, I/O faces, integration gate, diagnostics
//! - **[`LatticeHost`]**: init/destroy lifecycle that reports `NotInitialized`
//! - **[`LatticeConfig`]**: dimensions, timestep and noise, loadable from JSON
//! - **[`Status`] / [`LatticeError`]**: the closed status set with stable codes
//!
//! ## Example
//!
//! ```no_run
//! use analog_lattice::{ConnectWord, CoreWord, Lattice, LatticeConfig};
//! use std::time::Duration;
//!
//! // 2×1×1: one input cell feeding one integrating output cell
//! let lattice = Lattice::init(LatticeConfig::with_dims(2, 1, 1).with_timestep(0.01))?;
//! lattice.program_core(1, 0, 0, CoreWord::INTEGRATE)?;
//! lattice.program_connection(1, 0, 0, ConnectWord::NX | ConnectWord::FLOW_POS)?;
//! lattice.write_input(0, 0, 0.5)?;
//!
//! std::thread::sleep(Duration::from_millis(200));
//! println!("output = {}", lattice.read_output(0, 0)?);
//! lattice.destroy()?;
//! # Ok::<(), analog_lattice::LatticeError>(())
//! ```

// Error types
mod error;
pub use error::{LatticeError, Result, Status};

// Configuration
pub mod config;
pub use config::{LatticeConfig, DEFAULT_STACK_SIZE};

// Lattice engine
pub mod lattice;
pub use lattice::{
    // Addressing
    Axis, CellIndex, Coord, Dims, Direction, Sign,
    // Cells and connections
    Charge, Connection, Flow, Modifier, Operation,
    // Instruction words
    ConnectInstruction, ConnectWord, CoreWord, ModifierKind,
    // Engine
    Lattice, LatticeBuilder, NoiseMode, NoisePolicy, Quiet,
    // Diagnostics
    LatticeSnapshot, TickReport, Warnings,
};

// Lifecycle host
pub mod host;
pub use host::LatticeHost;
