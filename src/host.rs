//! LatticeHost - init/destroy lifecycle around one lattice
//!
//! A host starts empty. `init` builds a lattice, `destroy` tears it down, and
//! every other call fails with [`LatticeError::NotInitialized`] while no
//! lattice exists.
//!
//! Calls hold a read lock for their duration and `destroy` takes the write
//! lock, so a destroy waits for in-flight reads and a read that starts after
//! it sees an empty host. Storage is never released under a running call.

use std::sync::{PoisonError, RwLock, RwLockReadGuard};

use crate::config::LatticeConfig;
use crate::error::{LatticeError, Result};
use crate::lattice::{Charge, Lattice, LatticeSnapshot, NoiseMode, TickReport};

#[derive(Debug, Default)]
pub struct LatticeHost {
    slot: RwLock<Option<Lattice>>,
}

impl LatticeHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build and start a lattice
    pub fn init(&self, config: LatticeConfig) -> Result<()> {
        let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            return Err(LatticeError::bad_config("lattice already initialized"));
        }
        *slot = Some(Lattice::init(config)?);
        Ok(())
    }

    /// Install a lattice built elsewhere (e.g. a manual one for tests)
    pub fn adopt(&self, lattice: Lattice) -> Result<()> {
        let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            return Err(LatticeError::bad_config("lattice already initialized"));
        }
        *slot = Some(lattice);
        Ok(())
    }

    /// Stop the scheduler and release the lattice
    pub fn destroy(&self) -> Result<()> {
        let lattice = self
            .slot
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or(LatticeError::NotInitialized)?;
        lattice.destroy()
    }

    pub fn is_initialized(&self) -> bool {
        self.read().is_some()
    }

    fn read(&self) -> RwLockReadGuard<'_, Option<Lattice>> {
        self.slot.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` against the live lattice
    pub fn with<R>(&self, f: impl FnOnce(&Lattice) -> Result<R>) -> Result<R> {
        match self.read().as_ref() {
            Some(lattice) => f(lattice),
            None => Err(LatticeError::NotInitialized),
        }
    }

    pub fn program_core(&self, x: usize, y: usize, z: usize, word: u32) -> Result<()> {
        self.with(|l| l.program_core(x, y, z, word))
    }

    pub fn program_connection(&self, x: usize, y: usize, z: usize, word: u32) -> Result<()> {
        self.with(|l| l.program_connection(x, y, z, word))
    }

    pub fn set_underbus(&self, value: Charge) -> Result<()> {
        self.with(|l| {
            l.set_underbus(value);
            Ok(())
        })
    }

    pub fn set_underbus_scaled<T: Into<f64>>(&self, value: T, range: T) -> Result<Charge> {
        self.with(|l| l.set_underbus_scaled(value, range))
    }

    pub fn write_input(&self, y: usize, z: usize, value: Charge) -> Result<()> {
        self.with(|l| l.write_input(y, z, value))
    }

    pub fn write_input_scaled<T: Into<f64>>(&self, y: usize, z: usize, value: T, range: T) -> Result<()> {
        self.with(|l| l.write_input_scaled(y, z, value, range))
    }

    pub fn read_output(&self, y: usize, z: usize) -> Result<Charge> {
        self.with(|l| l.read_output(y, z))
    }

    pub fn read_output_scaled<T: Into<f64>>(&self, y: usize, z: usize, range: T) -> Result<f64> {
        self.with(|l| l.read_output_scaled(y, z, range))
    }

    pub fn examine(&self, x: usize, y: usize, z: usize) -> Result<Charge> {
        self.with(|l| l.examine(x, y, z))
    }

    pub fn set_timestep(&self, timestep: f64) -> Result<()> {
        self.with(|l| l.set_timestep(timestep))
    }

    pub fn set_noise_mode(&self, bits: u32) -> Result<NoiseMode> {
        self.with(|l| {
            l.set_noise_mode(bits)?;
            Ok(l.noise_mode())
        })
    }

    pub fn poll_rate(&self) -> Result<f64> {
        self.with(|l| Ok(l.poll_rate()))
    }

    pub fn start_integration(&self) -> Result<()> {
        self.with(|l| {
            l.start_integration();
            Ok(())
        })
    }

    pub fn stop_integration(&self) -> Result<()> {
        self.with(|l| {
            l.stop_integration();
            Ok(())
        })
    }

    pub fn last_report(&self) -> Result<TickReport> {
        self.with(|l| Ok(l.last_report()))
    }

    pub fn snapshot(&self) -> Result<LatticeSnapshot> {
        self.with(|l| l.snapshot())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Status;
    use crate::lattice::{ConnectWord, CoreWord};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn config() -> LatticeConfig {
        LatticeConfig::with_dims(3, 2, 1).with_timestep(0.001)
    }

    #[test]
    fn test_calls_before_init_fail() {
        let host = LatticeHost::new();
        assert!(!host.is_initialized());
        assert_eq!(host.read_output(0, 0), Err(LatticeError::NotInitialized));
        assert_eq!(host.program_core(1, 0, 0, CoreWord::SUM), Err(LatticeError::NotInitialized));
        assert_eq!(
            Status::from_result(&host.examine(0, 0, 0)),
            Status::NotInitialized
        );
        assert_eq!(host.destroy(), Err(LatticeError::NotInitialized));
    }

    #[test]
    fn test_lifecycle() {
        let host = LatticeHost::new();
        host.init(config()).unwrap();
        assert!(matches!(host.init(config()), Err(LatticeError::BadConfig(_))));

        host.program_core(2, 0, 0, CoreWord::SUM).unwrap();
        host.program_connection(2, 0, 0, ConnectWord::NX | ConnectWord::FLOW_POS).unwrap();
        host.program_core(1, 0, 0, CoreWord::SUM).unwrap();
        host.program_connection(1, 0, 0, ConnectWord::NX | ConnectWord::FLOW_POS).unwrap();
        host.write_input(0, 0, 0.25).unwrap();
        assert!(host.with(|l| Ok(l.wait_ticks(3, Duration::from_secs(5)))).unwrap());
        assert_eq!(host.read_output(0, 0).unwrap(), 0.25);

        host.destroy().unwrap();
        assert_eq!(host.destroy(), Err(LatticeError::NotInitialized));
        assert_eq!(host.read_output(0, 0), Err(LatticeError::NotInitialized));

        // a destroyed host can be initialized again from scratch
        host.init(config()).unwrap();
        assert_eq!(host.read_output(0, 0).unwrap(), 0.0);
        host.destroy().unwrap();
    }

    #[test]
    fn test_bad_init_leaves_host_empty() {
        let host = LatticeHost::new();
        let err = host.init(LatticeConfig::with_dims(1, 1, 1)).unwrap_err();
        assert_eq!(err.status(), Status::BadConfig);
        assert!(!host.is_initialized());
    }

    #[test]
    fn test_destroy_during_reads() {
        let host = Arc::new(LatticeHost::new());
        host.init(config()).unwrap();

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let host = Arc::clone(&host);
                thread::spawn(move || {
                    let mut ok = 0usize;
                    loop {
                        match host.read_output(1, 0) {
                            Ok(_) => ok += 1,
                            Err(LatticeError::NotInitialized) => return ok,
                            Err(e) => panic!("unexpected error: {}", e),
                        }
                    }
                })
            })
            .collect();

        thread::sleep(Duration::from_millis(20));
        host.destroy().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
        assert!(!host.is_initialized());
    }
}
