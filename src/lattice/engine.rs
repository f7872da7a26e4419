//! Lattice - shared state plus the synchronous program / data-plane API
//!
//! ## Threading
//!
//! ```text
//! caller thread ──program_core / program_connection──┐
//!                                                     ├─ config lock ─┐
//! scheduler ─────────────── tick ─────────────────────┘               │
//!                                                                      ▼
//! caller thread ──write_input / read_output / examine──── cell atomics (lock-free)
//! ```
//!
//! Configuration changes and ticks are serialized by one lock over the root
//! registry, so a programming call lands between two ticks. Charges are read
//! and written without locking; a read may observe a tick half-way through
//! propagation, but never a torn scalar.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use super::address::{Axis, CellIndex, Coord, Dims, Direction};
use super::cell::{CellStore, Charge, Operation};
use super::connection::Connection;
use super::edges::EdgeStore;
use super::evaluate::Evaluator;
use super::instruction::{ConnectInstruction, CoreWord};
use super::noise::{NoiseMode, NoisePolicy, Quiet};
use super::scheduler::Scheduler;
use super::snapshot::{CellSnapshot, ConnectionSnapshot, LatticeSnapshot};
use super::underbus::{scale_down, Underbus};
use super::warnings::TickReport;
use crate::config::{timestep_duration, LatticeConfig};
use crate::error::{LatticeError, Result};

/// Cells resolved by every tick
#[derive(Debug, Default)]
pub(crate) struct Roots {
    /// Cells currently programmed INTEGRATE
    integrators: BTreeSet<CellIndex>,
    /// Output-face cells that have held a non-HOLD program
    endpoints: BTreeSet<CellIndex>,
}

impl Roots {
    fn iter(&self) -> impl Iterator<Item = CellIndex> + '_ {
        self.integrators.iter().chain(self.endpoints.iter()).copied()
    }
}

/// State shared between the caller-facing [`Lattice`] and the scheduler
pub(crate) struct Shared {
    dims: Dims,
    cells: CellStore,
    edges: EdgeStore,
    underbus: Underbus,
    roots: Mutex<Roots>,
    integrating: AtomicBool,
    /// f64 seconds, stored as bits
    timestep: AtomicU64,
    noise_mode: AtomicU32,
    noise: Box<dyn NoisePolicy>,
    ticks: AtomicU64,
    /// Smoothed tick period in nanoseconds (0 until measured)
    period_nanos: AtomicU64,
    report: Mutex<TickReport>,
    /// Signalled whenever `report` advances
    tick_done: Condvar,
}

impl Shared {
    fn new(dims: Dims, config: &LatticeConfig, noise: Box<dyn NoisePolicy>) -> Self {
        Self {
            dims,
            cells: CellStore::new(dims),
            edges: EdgeStore::new(dims),
            underbus: Underbus::new(),
            roots: Mutex::new(Roots::default()),
            integrating: AtomicBool::new(config.integrating),
            timestep: AtomicU64::new(config.timestep.to_bits()),
            noise_mode: AtomicU32::new(config.noise.0),
            noise,
            ticks: AtomicU64::new(0),
            period_nanos: AtomicU64::new(0),
            report: Mutex::new(TickReport::default()),
            tick_done: Condvar::new(),
        }
    }

    pub(crate) fn dims(&self) -> &Dims {
        &self.dims
    }

    pub(crate) fn cells(&self) -> &CellStore {
        &self.cells
    }

    pub(crate) fn edges(&self) -> &EdgeStore {
        &self.edges
    }

    pub(crate) fn noise_policy(&self) -> &dyn NoisePolicy {
        self.noise.as_ref()
    }

    pub(crate) fn noise_mode(&self) -> NoiseMode {
        NoiseMode(self.noise_mode.load(Ordering::Relaxed))
    }

    pub(crate) fn is_integrating(&self) -> bool {
        self.integrating.load(Ordering::Acquire)
    }

    pub(crate) fn timestep(&self) -> f64 {
        f64::from_bits(self.timestep.load(Ordering::Relaxed))
    }

    pub(crate) fn tick_sleep(&self) -> Duration {
        timestep_duration(self.timestep()).unwrap_or_default()
    }

    fn lock_roots(&self) -> Result<MutexGuard<'_, Roots>> {
        self.roots
            .lock()
            .map_err(|_| LatticeError::Unknown("lattice state poisoned".to_string()))
    }

    /// Run one tick with the config lock held and publish its report
    pub(crate) fn tick(&self, evaluator: &mut Evaluator) -> TickReport {
        let report = {
            let roots = self.roots.lock().unwrap_or_else(PoisonError::into_inner);
            evaluator.run_tick(self, roots.iter())
        };
        self.ticks.store(report.tick, Ordering::Release);

        let mut last = self.report.lock().unwrap_or_else(PoisonError::into_inner);
        if last.warnings != report.warnings {
            log::debug!(
                "Tick {}: warnings {} -> {} ({} overflowed, {} div-zero)",
                report.tick,
                last.warnings,
                report.warnings,
                report.overflowed.len(),
                report.div_zero.len()
            );
        }
        log::trace!("Tick {} resolved {} cells", report.tick, report.evaluated);
        *last = report.clone();
        drop(last);
        self.tick_done.notify_all();
        report
    }

    /// Fold one measured tick period into the running average
    pub(crate) fn record_period(&self, period: Duration) {
        let sample = period.as_nanos().min(u64::MAX as u128) as u64;
        let prev = self.period_nanos.load(Ordering::Relaxed);
        let next = if prev == 0 {
            sample
        } else {
            (prev * 7 + sample) / 8
        };
        self.period_nanos.store(next.max(1), Ordering::Relaxed);
    }
}

enum Driver {
    Threaded(Scheduler),
    Manual(Mutex<Evaluator>),
}

/// Builder for [`Lattice`]
pub struct LatticeBuilder {
    config: LatticeConfig,
    noise: Box<dyn NoisePolicy>,
}

impl LatticeBuilder {
    pub fn new(config: LatticeConfig) -> Self {
        Self {
            config,
            noise: Box::new(Quiet),
        }
    }

    /// Install the policy applied to every propagated value
    pub fn noise_policy(mut self, policy: impl NoisePolicy + 'static) -> Self {
        self.noise = Box::new(policy);
        self
    }

    fn build_shared(self) -> Result<(Arc<Shared>, LatticeConfig)> {
        let dims = self.config.validate()?;
        let shared = Arc::new(Shared::new(dims, &self.config, self.noise));
        Ok((shared, self.config))
    }

    /// Build the grid, then start the scheduler thread
    pub fn start(self) -> Result<Lattice> {
        let (shared, config) = self.build_shared()?;
        let scheduler = Scheduler::spawn(Arc::clone(&shared), config.stack_size)?;
        log::info!(
            "Lattice initialized: {}x{}x{} cells, timestep {}s, noise {}",
            config.x,
            config.y,
            config.z,
            config.timestep,
            config.noise
        );
        Ok(Lattice {
            shared,
            driver: Driver::Threaded(scheduler),
        })
    }

    /// Build the grid without a scheduler; ticks run on [`Lattice::step_tick`]
    pub fn manual(self) -> Result<Lattice> {
        let (shared, _) = self.build_shared()?;
        let evaluator = Evaluator::new(shared.dims().len());
        Ok(Lattice {
            shared,
            driver: Driver::Manual(Mutex::new(evaluator)),
        })
    }
}

/// A running analog lattice
pub struct Lattice {
    shared: Arc<Shared>,
    driver: Driver,
}

impl Lattice {
    /// Build a lattice and start its scheduler
    pub fn init(config: LatticeConfig) -> Result<Self> {
        LatticeBuilder::new(config).start()
    }

    /// Build a lattice ticked only by [`Lattice::step_tick`]
    pub fn manual(config: LatticeConfig) -> Result<Self> {
        LatticeBuilder::new(config).manual()
    }

    pub fn builder(config: LatticeConfig) -> LatticeBuilder {
        LatticeBuilder::new(config)
    }

    /// Stop the scheduler and release the lattice
    pub fn destroy(self) -> Result<()> {
        let result = match self.driver {
            Driver::Threaded(scheduler) => scheduler.shutdown(),
            Driver::Manual(_) => Ok(()),
        };
        log::info!(
            "Lattice destroyed after {} ticks",
            self.shared.ticks.load(Ordering::Acquire)
        );
        result
    }

    pub fn dims(&self) -> Dims {
        self.shared.dims
    }

    /// Whether a scheduler thread drives this lattice
    pub fn is_threaded(&self) -> bool {
        matches!(self.driver, Driver::Threaded(_))
    }

    // =========================================================================
    // Program API
    // =========================================================================

    /// Program the operation of cell (x, y, z) from a core word
    pub fn program_core(&self, x: usize, y: usize, z: usize, word: u32) -> Result<()> {
        let index = self.programmable(x, y, z)?;
        let op = CoreWord::decode(word)?;
        self.apply_operation(index, op)
    }

    /// Program the operation of cell (x, y, z)
    pub fn program_operation(&self, x: usize, y: usize, z: usize, op: Operation) -> Result<()> {
        let index = self.programmable(x, y, z)?;
        self.apply_operation(index, op)
    }

    fn programmable(&self, x: usize, y: usize, z: usize) -> Result<CellIndex> {
        let index = self.shared.dims.index(x, y, z)?;
        if x == 0 {
            return Err(LatticeError::bad_config(format!(
                "cell ({}, {}, {}) is on the write-only input face",
                x, y, z
            )));
        }
        Ok(index)
    }

    fn apply_operation(&self, index: CellIndex, op: Operation) -> Result<()> {
        let shared = &self.shared;
        let mut roots = shared.lock_roots()?;
        let cell = shared.cells.at(index);
        let previous = cell.swap_operation(op);

        if op == Operation::Integrate {
            roots.integrators.insert(index);
        } else if previous == Operation::Integrate {
            roots.integrators.remove(&index);
        }
        if op == Operation::Hold {
            cell.set_charge(shared.underbus.get());
        }
        let coord = shared.dims.coord(index);
        if op != Operation::Hold && coord.x + 1 == shared.dims.x && roots.endpoints.insert(index) {
            log::debug!("Registered output endpoint {}", coord);
        }
        log::debug!("Programmed core {} {} -> {}", coord, previous, op);
        Ok(())
    }

    /// Program a connection of cell (x, y, z) from a connection word
    pub fn program_connection(&self, x: usize, y: usize, z: usize, word: u32) -> Result<()> {
        let instruction = ConnectInstruction::decode(word)?;
        self.program_connection_with(x, y, z, instruction)
    }

    /// Program a connection of cell (x, y, z) from a decoded instruction
    pub fn program_connection_with(
        &self,
        x: usize,
        y: usize,
        z: usize,
        instruction: ConnectInstruction,
    ) -> Result<()> {
        let shared = &self.shared;
        let edge = shared.edges.resolve(x, y, z, instruction.direction)?;
        let _roots = shared.lock_roots()?;
        let connection = instruction.to_connection(shared.underbus.get());
        edge.store(connection);
        log::debug!(
            "Programmed connection ({}, {}, {}) {} [anchor {} {}]",
            x,
            y,
            z,
            instruction,
            shared.dims.coord(edge.anchor),
            edge.axis.name()
        );
        Ok(())
    }

    /// Stored record behind the edge of (x, y, z) toward `direction`
    pub fn connection(&self, x: usize, y: usize, z: usize, direction: Direction) -> Result<Connection> {
        Ok(self.shared.edges.resolve(x, y, z, direction)?.load())
    }

    pub fn operation(&self, x: usize, y: usize, z: usize) -> Result<Operation> {
        Ok(self.shared.cells.get(x, y, z)?.operation())
    }

    pub fn set_underbus(&self, value: Charge) {
        self.shared.underbus.set(value);
    }

    /// Set the underbus to `value / range`
    pub fn set_underbus_scaled<T: Into<f64>>(&self, value: T, range: T) -> Result<Charge> {
        self.shared.underbus.set_scaled(value, range)
    }

    pub fn underbus(&self) -> Charge {
        self.shared.underbus.get()
    }

    // =========================================================================
    // I/O faces
    // =========================================================================

    /// Write `value` into input-face cell (0, y, z)
    pub fn write_input(&self, y: usize, z: usize, value: Charge) -> Result<()> {
        self.shared.cells.get(0, y, z)?.set_charge(value);
        Ok(())
    }

    /// Write `value / range` into input-face cell (0, y, z)
    pub fn write_input_scaled<T: Into<f64>>(&self, y: usize, z: usize, value: T, range: T) -> Result<()> {
        let cell = self.shared.cells.get(0, y, z)?;
        cell.set_charge(scale_down(value.into(), range.into())?);
        Ok(())
    }

    /// Read output-face cell (X-1, y, z)
    pub fn read_output(&self, y: usize, z: usize) -> Result<Charge> {
        let x = self.shared.dims.x - 1;
        Ok(self.shared.cells.get(x, y, z)?.charge())
    }

    /// Read output-face cell (X-1, y, z) scaled back to caller units
    pub fn read_output_scaled<T: Into<f64>>(&self, y: usize, z: usize, range: T) -> Result<f64> {
        Ok(self.read_output(y, z)? as f64 * range.into())
    }

    /// Integer read: the scaled value truncated toward zero
    pub fn read_output_scaled_int(&self, y: usize, z: usize, range: i32) -> Result<i32> {
        Ok(self.read_output_scaled(y, z, range)? as i32)
    }

    // =========================================================================
    // Integration gate
    // =========================================================================

    pub fn start_integration(&self) {
        self.shared.integrating.store(true, Ordering::Release);
        log::debug!("Integration started");
    }

    /// Freeze every integrator at its current value
    pub fn stop_integration(&self) {
        self.shared.integrating.store(false, Ordering::Release);
        log::debug!("Integration stopped");
    }

    pub fn is_integrating(&self) -> bool {
        self.shared.is_integrating()
    }

    // =========================================================================
    // Diagnostics
    // =========================================================================

    /// Charge of any cell, input face included
    pub fn examine(&self, x: usize, y: usize, z: usize) -> Result<Charge> {
        Ok(self.shared.cells.get(x, y, z)?.charge())
    }

    /// Change the tick interval; applies from the next tick
    pub fn set_timestep(&self, timestep: f64) -> Result<()> {
        timestep_duration(timestep)?;
        self.shared.timestep.store(timestep.to_bits(), Ordering::Relaxed);
        log::debug!("Timestep set to {}s", timestep);
        Ok(())
    }

    pub fn timestep(&self) -> f64 {
        self.shared.timestep()
    }

    pub fn set_noise_mode(&self, bits: u32) -> Result<()> {
        let mode = NoiseMode::from_bits(bits)?;
        self.shared.noise_mode.store(mode.0, Ordering::Relaxed);
        log::debug!("Noise mode set to {}", mode);
        Ok(())
    }

    pub fn noise_mode(&self) -> NoiseMode {
        self.shared.noise_mode()
    }

    /// Estimated tick rate in Hz (0 before the first measured tick)
    pub fn poll_rate(&self) -> f64 {
        match self.shared.period_nanos.load(Ordering::Relaxed) {
            0 => 0.0,
            nanos => 1e9 / nanos as f64,
        }
    }

    /// Completed ticks
    pub fn tick_count(&self) -> u64 {
        self.shared.ticks.load(Ordering::Acquire)
    }

    /// Report of the last completed tick
    pub fn last_report(&self) -> TickReport {
        self.shared
            .report
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Block until at least `count` more ticks complete, or `timeout` passes.
    /// Returns whether the ticks completed.
    pub fn wait_ticks(&self, count: u64, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut last = self
            .shared
            .report
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let target = last.tick + count;
        while last.tick < target {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            last = self
                .shared
                .tick_done
                .wait_timeout(last, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        true
    }

    /// Run one tick on a manual lattice
    pub fn step_tick(&self) -> Result<TickReport> {
        match &self.driver {
            Driver::Manual(evaluator) => {
                let started = Instant::now();
                let mut evaluator = evaluator
                    .lock()
                    .map_err(|_| LatticeError::Unknown("evaluator poisoned".to_string()))?;
                let report = self.shared.tick(&mut evaluator);
                self.shared.record_period(started.elapsed());
                Ok(report)
            }
            Driver::Threaded(_) => Err(LatticeError::bad_config(
                "step_tick requires a manual lattice; this one has a scheduler",
            )),
        }
    }

    /// Run `count` manual ticks, returning the last report
    pub fn step_ticks(&self, count: usize) -> Result<TickReport> {
        let mut report = TickReport::default();
        for _ in 0..count {
            report = self.step_tick()?;
        }
        Ok(report)
    }

    /// Coordinates of the registered integrators and endpoints
    pub fn roots(&self) -> Result<(Vec<Coord>, Vec<Coord>)> {
        let roots = self.shared.lock_roots()?;
        let dims = &self.shared.dims;
        Ok((
            roots.integrators.iter().map(|&i| dims.coord(i)).collect(),
            roots.endpoints.iter().map(|&i| dims.coord(i)).collect(),
        ))
    }

    /// Diagnostic view of every programmed cell and active connection
    pub fn snapshot(&self) -> Result<LatticeSnapshot> {
        let shared = &self.shared;
        let _roots = shared.lock_roots()?;
        let dims = &shared.dims;
        let cells = shared
            .cells
            .iter()
            .filter(|(_, c)| c.operation() != Operation::Hold || c.charge() != 0.0)
            .map(|(i, c)| CellSnapshot {
                at: dims.coord(i),
                operation: c.operation(),
                charge: c.charge(),
            })
            .collect();
        let connections = shared
            .edges
            .active()
            .map(|(i, axis, connection): (CellIndex, Axis, Connection)| ConnectionSnapshot {
                anchor: dims.coord(i),
                axis,
                connection,
            })
            .collect();
        Ok(LatticeSnapshot {
            dims: [dims.x, dims.y, dims.z],
            tick: self.tick_count(),
            timestep: shared.timestep(),
            underbus: shared.underbus.get(),
            integrating: shared.is_integrating(),
            noise: shared.noise_mode(),
            cells,
            connections,
        })
    }
}

impl std::fmt::Debug for Lattice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lattice")
            .field("dims", &self.shared.dims)
            .field("threaded", &self.is_threaded())
            .field(
                "running",
                &matches!(&self.driver, Driver::Threaded(s) if s.is_running()),
            )
            .field("ticks", &self.tick_count())
            .finish()
    }
}
