//! Scheduler - background thread that ticks the lattice
//!
//! ```text
//! loop {
//!     resolve all roots      (config lock held)
//!     sleep one timestep     (woken early by shutdown)
//! }
//! ```
//!
//! The sleep waits on a channel, so dropping the sender stops the thread
//! within one timestep. The thread owns its [`Evaluator`].

use std::sync::mpsc::{channel, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::engine::Shared;
use super::evaluate::Evaluator;
use crate::error::{LatticeError, Result};

/// Shortest pause between ticks, so a zero timestep cannot starve callers
/// waiting on the config lock.
pub const MIN_TICK_SLEEP: Duration = Duration::from_micros(50);

/// Handle to the running scheduler thread
#[derive(Debug)]
pub struct Scheduler {
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Scheduler {
    /// Start ticking `shared` on a new thread
    pub(crate) fn spawn(shared: Arc<Shared>, stack_size: usize) -> Result<Self> {
        let (stop, rx) = channel::<()>();
        let handle = thread::Builder::new()
            .name("lattice-scheduler".to_string())
            .stack_size(stack_size)
            .spawn(move || {
                log::info!("Lattice scheduler started ({} cells)", shared.dims().len());
                let mut evaluator = Evaluator::new(shared.dims().len());
                loop {
                    let started = Instant::now();
                    shared.tick(&mut evaluator);

                    let sleep = shared.tick_sleep().max(MIN_TICK_SLEEP);
                    match rx.recv_timeout(sleep) {
                        Err(RecvTimeoutError::Timeout) => {}
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                    shared.record_period(started.elapsed());
                }
                log::info!("Lattice scheduler stopped after {} ticks", evaluator.tick());
            })
            .map_err(|e| LatticeError::Unknown(format!("failed to spawn scheduler: {}", e)))?;

        Ok(Self {
            stop: Some(stop),
            handle: Some(handle),
        })
    }

    /// Stop the thread and wait for it to exit
    pub fn shutdown(mut self) -> Result<()> {
        self.stop_and_join()
    }

    fn stop_and_join(&mut self) -> Result<()> {
        self.stop.take();
        match self.handle.take() {
            Some(handle) => handle.join().map_err(|e| {
                log::warn!("Lattice scheduler panicked: {:?}", e);
                LatticeError::Unknown("scheduler thread panicked".to_string())
            }),
            None => Ok(()),
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        let _ = self.stop_and_join();
    }
}
