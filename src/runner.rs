//! Drives the simulation loop: clock tick, then providers, then consumers.

use crate::broker::BrokerError;
use crate::clock::{ClockError, SimulationClock};
use crate::data::DataError;
use crate::streamer::StreamError;
use std::cell::RefCell;
use std::rc::Rc;
use thiserror::Error;

/// Any error that can stop a simulation run.
#[derive(Debug, Error)]
pub enum SimError {
    #[error(transparent)]
    Clock(#[from] ClockError),

    #[error(transparent)]
    Stream(#[from] StreamError),

    #[error(transparent)]
    Data(#[from] DataError),

    #[error(transparent)]
    Broker(#[from] BrokerError),
}

/// Anything stepped once per clock tick.
pub trait SimulationPiece {
    fn step(&mut self) -> Result<(), SimError>;
}

/// Owns the loop: on every tick, data providers step first (so fresh data is
/// delivered), then consumers (so strategies act on it), each group in
/// registration order.
pub struct SimulationRunner {
    clock: Rc<RefCell<SimulationClock>>,
    providers: Vec<Rc<RefCell<dyn SimulationPiece>>>,
    consumers: Vec<Rc<RefCell<dyn SimulationPiece>>>,
}

impl SimulationRunner {
    pub fn new(clock: Rc<RefCell<SimulationClock>>) -> Self {
        SimulationRunner { clock, providers: Vec::new(), consumers: Vec::new() }
    }

    pub fn add_provider(&mut self, piece: Rc<RefCell<dyn SimulationPiece>>) {
        self.providers.push(piece);
    }

    pub fn add_consumer(&mut self, piece: Rc<RefCell<dyn SimulationPiece>>) {
        self.consumers.push(piece);
    }

    /// Run until the clock's schedule is exhausted. Returns the number of
    /// ticks executed.
    pub fn run(&mut self) -> Result<u64, SimError> {
        self.run_inner(None)
    }

    /// Run at most `max_steps` ticks. Returns the number actually executed,
    /// which is smaller when the schedule runs out first.
    pub fn run_steps(&mut self, max_steps: u64) -> Result<u64, SimError> {
        self.run_inner(Some(max_steps))
    }

    fn run_inner(&mut self, max_steps: Option<u64>) -> Result<u64, SimError> {
        let mut executed = 0;
        loop {
            if let Some(max) = max_steps {
                if executed >= max {
                    break;
                }
            }
            match self.clock.borrow_mut().tick() {
                Ok(_) => {}
                Err(ClockError::EndOfSimulation) => break,
                Err(e) => return Err(e.into()),
            }
            executed += 1;
            for provider in &self.providers {
                provider.borrow_mut().step()?;
            }
            for consumer in &self.consumers {
                consumer.borrow_mut().step()?;
            }
        }
        log::info!("simulation finished after {executed} ticks");
        Ok(executed)
    }
}
