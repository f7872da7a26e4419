//! Cycle-safe depth-first evaluation
//!
//! One tick resolves every root (integrators and output-face endpoints)
//! depth-first: a cell first resolves each neighbour that feeds it, then
//! combines the propagated values according to its operation.
//!
//! The walk keeps its own frame stack on the heap, so dependency chains as
//! long as the lattice itself never touch the thread stack.
//!
//! ```text
//! frames: [root ─ waiting on ─ src1 ─ waiting on ─ src2 ...]
//!           ↑ next direction, accumulator, div-zero flag per frame
//! ```
//!
//! ## Marks
//!
//! Each cell carries the number of the tick that last claimed it. A cell whose
//! mark equals the running tick is never evaluated again in that tick. This
//! memoizes shared ancestors and stops the walk around feedback loops.
//!
//! ## Feedback
//!
//! Claim order and low-links (Tarjan) identify the strongly connected groups
//! of the dataflow graph while the walk runs. A value read across an edge
//! whose source is still on the group stack belongs to a feedback loop, and
//! the reader takes the charge that source held when the tick claimed it, i.e.
//! the previous tick's value. Every loop therefore behaves as a one-tick delay
//! line, independent of which loop member the walk reached first. Acyclic
//! chains propagate through in a single tick.

use super::address::{CellIndex, Direction};
use super::cell::{Charge, Operation};
use super::connection::Connection;
use super::engine::Shared;
use super::noise::NoiseMode;
use super::warnings::{TickReport, Warnings};

#[derive(Debug, Clone, Copy, Default)]
struct Mark {
    /// Tick that last claimed the cell (0 = never)
    tick: u64,
    /// Claim order within the tick
    order: u64,
    low: u64,
    on_stack: bool,
    /// Charge when claimed
    previous: Charge,
}

/// A cell part-way through evaluation
#[derive(Debug, Clone, Copy)]
struct Frame {
    cell: CellIndex,
    op: Operation,
    /// Next entry of [`Direction::ALL`] to inspect
    next: usize,
    acc: Charge,
    hit_div_zero: bool,
    /// Inbound edge whose source is being resolved in the frame above
    waiting: Option<(CellIndex, Connection)>,
}

/// Per-tick evaluation state, owned by whoever drives ticks
#[derive(Debug)]
pub struct Evaluator {
    tick: u64,
    next_order: u64,
    marks: Vec<Mark>,
    /// Tarjan group stack
    stack: Vec<CellIndex>,
    frames: Vec<Frame>,
    roots: Vec<CellIndex>,
    evaluated: usize,
    warnings: Warnings,
    overflowed: Vec<CellIndex>,
    div_zero: Vec<CellIndex>,
}

impl Evaluator {
    pub fn new(cells: usize) -> Self {
        Self {
            tick: 0,
            next_order: 0,
            marks: vec![Mark::default(); cells],
            stack: Vec::new(),
            frames: Vec::new(),
            roots: Vec::new(),
            evaluated: 0,
            warnings: Warnings::NONE,
            overflowed: Vec::new(),
            div_zero: Vec::new(),
        }
    }

    /// Number of the last tick started
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Resolve one tick from `roots`
    pub(crate) fn run_tick<I>(&mut self, shared: &Shared, roots: I) -> TickReport
    where
        I: IntoIterator<Item = CellIndex>,
    {
        self.tick += 1;
        self.next_order = 0;
        self.evaluated = 0;
        self.warnings = Warnings::NONE;
        self.stack.clear();
        self.frames.clear();
        self.overflowed.clear();
        self.div_zero.clear();

        let ctx = TickContext {
            shared,
            integrating: shared.is_integrating(),
            timestep: shared.timestep() as Charge,
            noise_mode: shared.noise_mode(),
        };

        self.roots.clear();
        self.roots.extend(roots);
        let roots = std::mem::take(&mut self.roots);
        for &root in &roots {
            self.evaluate(&ctx, root);
        }
        self.roots = roots;

        let dims = shared.dims();
        TickReport {
            tick: self.tick,
            warnings: self.warnings,
            overflowed: self.overflowed.iter().map(|&i| dims.coord(i)).collect(),
            div_zero: self.div_zero.iter().map(|&i| dims.coord(i)).collect(),
            evaluated: self.evaluated,
        }
    }

    /// Resolve `root` and everything it depends on for the running tick.
    /// A root already resolved in this tick is skipped.
    fn evaluate(&mut self, ctx: &TickContext<'_>, root: CellIndex) {
        if self.marks[root.get()].tick == self.tick {
            return;
        }
        self.claim(ctx, root);

        while let Some(top) = self.frames.len().checked_sub(1) {
            let frame = self.frames[top];
            let v = frame.cell.get();

            // the source this frame waited on has just been resolved
            if let Some((source, connection)) = frame.waiting {
                self.frames[top].waiting = None;
                self.marks[v].low = self.marks[v].low.min(self.marks[source.get()].low);
                self.absorb(ctx, top, source, connection);
                continue;
            }

            if frame.next < Direction::ALL.len() {
                let direction = Direction::ALL[frame.next];
                self.frames[top].next += 1;
                let Some((source, connection)) = ctx.shared.edges().inbound(frame.cell, direction)
                else {
                    continue;
                };
                let s = source.get();
                if self.marks[s].tick != self.tick {
                    self.frames[top].waiting = Some((source, connection));
                    self.claim(ctx, source);
                    continue;
                }
                if self.marks[s].on_stack {
                    self.marks[v].low = self.marks[v].low.min(self.marks[s].order);
                }
                self.absorb(ctx, top, source, connection);
                continue;
            }

            self.frames.pop();
            self.finish(ctx, frame);
        }
    }

    /// Mark `cell` as claimed by this tick and open a frame for it
    fn claim(&mut self, ctx: &TickContext<'_>, cell: CellIndex) {
        let target = ctx.shared.cells().at(cell);
        let order = self.next_order;
        self.next_order += 1;
        self.marks[cell.get()] = Mark {
            tick: self.tick,
            order,
            low: order,
            on_stack: true,
            previous: target.charge(),
        };
        self.stack.push(cell);
        self.evaluated += 1;

        let op = target.operation();
        self.frames.push(Frame {
            cell,
            op,
            next: 0,
            acc: match op {
                Operation::Mult => 1.0,
                _ => 0.0,
            },
            hit_div_zero: false,
            waiting: None,
        });
    }

    /// Fold the value arriving from `source` into the frame at `top`
    fn absorb(&mut self, ctx: &TickContext<'_>, top: usize, source: CellIndex, connection: Connection) {
        let mark = self.marks[source.get()];
        let charge = if mark.on_stack {
            mark.previous
        } else {
            ctx.shared.cells().at(source).charge()
        };
        let (value, raised) = connection.propagate(charge);
        self.warnings |= raised;

        let frame = &mut self.frames[top];
        let value = ctx
            .shared
            .noise_policy()
            .perturb(ctx.noise_mode, source, frame.cell, value);
        frame.hit_div_zero |= raised.has_div_zero();
        match frame.op {
            Operation::Hold => {}
            Operation::Sum | Operation::Integrate => frame.acc += value,
            Operation::Mult => frame.acc *= value,
        }
    }

    /// Store the combined charge of a fully resolved frame
    fn finish(&mut self, ctx: &TickContext<'_>, frame: Frame) {
        let target = ctx.shared.cells().at(frame.cell);
        let charge = match frame.op {
            Operation::Hold => target.charge(),
            Operation::Sum | Operation::Mult => {
                target.set_charge(frame.acc);
                frame.acc
            }
            Operation::Integrate if ctx.integrating => {
                let next = target.charge() + frame.acc * ctx.timestep;
                target.set_charge(next);
                next
            }
            Operation::Integrate => target.charge(),
        };

        if frame.hit_div_zero {
            self.div_zero.push(frame.cell);
        }
        if charge.abs() > 1.0 {
            self.warnings |= Warnings::overflow();
            self.overflowed.push(frame.cell);
        }

        let v = frame.cell.get();
        if self.marks[v].low == self.marks[v].order {
            while let Some(member) = self.stack.pop() {
                self.marks[member.get()].on_stack = false;
                if member == frame.cell {
                    break;
                }
            }
        }
    }
}

struct TickContext<'a> {
    shared: &'a Shared,
    integrating: bool,
    timestep: Charge,
    noise_mode: NoiseMode,
}

#[cfg(test)]
mod tests {
    use crate::config::LatticeConfig;
    use crate::lattice::{ConnectWord as W, CoreWord, Lattice};
    use std::time::Duration;

    const LONG: usize = 100_000;

    fn program_chain(lat: &Lattice, x_extent: usize) {
        for x in 1..x_extent {
            lat.program_core(x, 0, 0, CoreWord::SUM).unwrap();
            lat.program_connection(x, 0, 0, W::NX | W::FLOW_POS).unwrap();
        }
    }

    #[test]
    fn test_long_chain_on_caller_thread() {
        let x = LONG + 1;
        let lat = Lattice::manual(LatticeConfig::with_dims(x, 1, 1)).unwrap();
        program_chain(&lat, x);
        lat.write_input(0, 0, 0.5).unwrap();

        let report = lat.step_tick().unwrap();
        assert_eq!(report.evaluated, x);
        assert!(report.warnings.is_empty());
        assert_eq!(lat.read_output(0, 0).unwrap(), 0.5);
    }

    #[test]
    fn test_long_chain_on_small_scheduler_stack() {
        let x = LONG + 1;
        let config = LatticeConfig {
            stack_size: 256 * 1024,
            ..LatticeConfig::with_dims(x, 1, 1).with_timestep(0.001)
        };
        let lat = Lattice::init(config).unwrap();
        lat.write_input(0, 0, -0.25).unwrap();
        program_chain(&lat, x);

        assert!(lat.wait_ticks(2, Duration::from_secs(60)));
        assert_eq!(lat.read_output(0, 0).unwrap(), -0.25);
        assert_eq!(lat.last_report().evaluated, x);
        lat.destroy().unwrap();
    }

    #[test]
    fn test_long_ring_delays_one_step_per_tick() {
        // ring over x ∈ 1..n, y ∈ {0, 1}: east along y = 0, west along y = 1
        let n = LONG / 2 + 1;
        let lat = Lattice::manual(LatticeConfig::with_dims(n, 2, 1)).unwrap();
        lat.set_underbus(0.5);
        lat.program_core(1, 0, 0, CoreWord::HOLD).unwrap();
        for y in 0..2 {
            for x in 1..n {
                lat.program_core(x, y, 0, CoreWord::SUM).unwrap();
            }
        }
        for x in 1..n - 1 {
            lat.program_connection(x, 0, 0, W::PX | W::FLOW_POS).unwrap();
        }
        lat.program_connection(n - 1, 0, 0, W::PY | W::FLOW_POS).unwrap();
        for x in 2..n {
            lat.program_connection(x, 1, 0, W::NX | W::FLOW_NEG).unwrap();
        }
        lat.program_connection(1, 1, 0, W::NY | W::FLOW_NEG).unwrap();

        let report = lat.step_tick().unwrap();
        assert_eq!(report.evaluated, LONG);
        assert_eq!(lat.examine(1, 0, 0).unwrap(), 0.0);
        assert_eq!(lat.examine(2, 0, 0).unwrap(), 0.5);

        lat.step_tick().unwrap();
        assert_eq!(lat.examine(2, 0, 0).unwrap(), 0.0);
        assert_eq!(lat.examine(3, 0, 0).unwrap(), 0.5);
    }
}
