//! Test and helper mocks for softplc_core.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use softplc_traits::{BoxError, PlantInputs, PlantLink};

/// One write recorded by [`ScriptedPlant`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlantWrite {
    InValve(u16),
    OutValve(u16),
    Running(bool),
    Paused(bool),
}

#[derive(Debug, Default)]
struct Script {
    queued: VecDeque<PlantInputs>,
    steady: PlantInputs,
    failing_reads: usize,
    failing_writes: usize,
    writes: Vec<PlantWrite>,
}

/// A plant that replays scripted input blocks and records every write.
///
/// Clones share state, so a test can keep one handle while the control loop
/// owns another. Once the queued inputs run out, the steady block is
/// returned on every read.
#[derive(Debug, Clone, Default)]
pub struct ScriptedPlant {
    inner: Arc<Mutex<Script>>,
}

impl ScriptedPlant {
    /// Plant that always reports `steady`.
    pub fn steady(steady: PlantInputs) -> Self {
        let plant = Self::default();
        plant.lock().steady = steady;
        plant
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn push_inputs(&self, inputs: PlantInputs) {
        self.lock().queued.push_back(inputs);
    }

    pub fn set_steady(&self, inputs: PlantInputs) {
        self.lock().steady = inputs;
    }

    /// Make the next `n` reads fail with a transport error.
    pub fn fail_reads(&self, n: usize) {
        self.lock().failing_reads = n;
    }

    /// Make the next `n` writes fail with a protocol exception.
    pub fn fail_writes(&self, n: usize) {
        self.lock().failing_writes = n;
    }

    pub fn writes(&self) -> Vec<PlantWrite> {
        self.lock().writes.clone()
    }

    pub fn out_valve_writes(&self) -> Vec<u16> {
        self.lock()
            .writes
            .iter()
            .filter_map(|w| match w {
                PlantWrite::OutValve(v) => Some(*v),
                _ => None,
            })
            .collect()
    }

    pub fn clear_writes(&self) {
        self.lock().writes.clear();
    }

    fn record(&self, w: PlantWrite) -> Result<(), BoxError> {
        let mut s = self.lock();
        if s.failing_writes > 0 {
            s.failing_writes -= 1;
            return Err(Box::new(std::io::Error::other(
                "modbus exception: IllegalDataValue",
            )));
        }
        s.writes.push(w);
        Ok(())
    }
}

impl PlantLink for ScriptedPlant {
    fn read_inputs(&mut self) -> Result<PlantInputs, BoxError> {
        let mut s = self.lock();
        if s.failing_reads > 0 {
            s.failing_reads -= 1;
            return Err(Box::new(std::io::Error::other("connection reset")));
        }
        let steady = s.steady;
        Ok(s.queued.pop_front().unwrap_or(steady))
    }

    fn write_in_valve(&mut self, raw: u16) -> Result<(), BoxError> {
        self.record(PlantWrite::InValve(raw))
    }

    fn write_out_valve(&mut self, raw: u16) -> Result<(), BoxError> {
        self.record(PlantWrite::OutValve(raw))
    }

    fn set_running(&mut self, running: bool) -> Result<(), BoxError> {
        self.record(PlantWrite::Running(running))
    }

    fn set_paused(&mut self, paused: bool) -> Result<(), BoxError> {
        self.record(PlantWrite::Paused(paused))
    }
}
