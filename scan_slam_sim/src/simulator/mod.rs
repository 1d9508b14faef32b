pub mod calibration;
pub mod common;
pub mod slam;
pub mod world;

use crate::error::Result;

pub use calibration::{CalibrationConfig, CalibrationReport, Calibrator, NoiseEstimate};
pub use slam::{SessionConfig, SessionSummary, SlamSession, StepLog};
pub use world::{World, WorldConfig};

/// Base trait for anything the [`Simulator`] can drive.
pub trait Simulate {
    /// Short name used in logs
    fn label(&self) -> &str;

    /// Take a single step through simulation based on the given time delta
    fn step(&mut self, dt: f64) -> Result<()>;

    /// Nothing more to simulate
    fn is_finished(&self) -> bool {
        false
    }

    /// Reset the dynamic states of the current simulation object.
    ///
    /// Anything updated by [`Simulate::step`] returns to its initial value;
    /// tunable parameters are kept.
    fn reset_state(&mut self);
}

/// A concrete type for containing simulations and executing them in lockstep
pub struct Simulator<S: Simulate> {
    sims: Vec<S>,
    /// Current simulation time in seconds.
    time: f64,
    /// Tick length in seconds
    dt: f64,
}

impl<S: Simulate> Simulator<S> {
    pub fn new(dt: f64) -> Self {
        Self {
            sims: Vec::new(),
            time: 0.0,
            dt,
        }
    }

    pub fn add_simulation(&mut self, sim: S) {
        self.sims.push(sim);
    }

    pub fn simulations(&self) -> &[S] {
        &self.sims
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    /// Advance every simulation by one tick
    pub fn update(&mut self) -> Result<()> {
        self.time += self.dt;
        for sim in &mut self.sims {
            sim.step(self.dt)?;
        }
        Ok(())
    }

    /// Run `ticks` updates, stopping at the first error
    pub fn run(&mut self, ticks: u64) -> Result<()> {
        for _ in 0..ticks {
            self.update()?;
        }
        Ok(())
    }

    /// Run until every simulation is finished or `max_ticks` have passed.
    ///
    /// Returns the number of ticks run.
    pub fn run_until_finished(&mut self, max_ticks: u64) -> Result<u64> {
        let mut ticks = 0;
        while ticks < max_ticks && !self.sims.iter().all(|sim| sim.is_finished()) {
            self.update()?;
            ticks += 1;
        }
        Ok(ticks)
    }

    /// Reset the states of all simulations
    pub fn reset_state(&mut self) {
        self.time = 0.0;
        self.sims.iter_mut().for_each(|sim| sim.reset_state());
    }
}
