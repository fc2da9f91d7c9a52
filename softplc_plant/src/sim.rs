//! In-process tank model speaking the same `PlantLink` contract as the
//! network plant.
//!
//! First-order dynamics on a normalized level `h` in `[0, 1]`:
//! `dh/dt = k_in * in_valve - k_out * out_valve * sqrt(h)`.
//! Each `read_inputs` advances the model by `step * timescale` of plant time
//! while running and not paused.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use softplc_traits::{BoxError, PlantInputs, PlantLink};

/// Full-scale raw value on the plant side (decimal factor 1000 x range 10).
pub const DEFAULT_SPAN: u16 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TankModel {
    pub k_in: f64,
    pub k_out: f64,
    /// Plant time advanced per read at timescale 1.
    pub step: Duration,
    pub timescale: u16,
    pub span: u16,
}

impl Default for TankModel {
    fn default() -> Self {
        Self {
            k_in: 0.05,
            k_out: 0.08,
            step: Duration::from_millis(300),
            timescale: 1,
            span: DEFAULT_SPAN,
        }
    }
}

#[derive(Debug, Default)]
struct TankState {
    level: f64,
    outflow: f64,
    in_valve: f64,
    out_valve: f64,
    running: bool,
    paused: bool,
}

/// Simulated tank. Clones share state so a test can inspect the plant the
/// control loop is driving.
#[derive(Debug, Clone)]
pub struct SimulatedPlant {
    model: TankModel,
    state: Arc<Mutex<TankState>>,
}

impl SimulatedPlant {
    pub fn new(model: TankModel) -> Self {
        Self {
            model,
            state: Arc::new(Mutex::new(TankState::default())),
        }
    }

    /// Start from a given normalized level.
    #[must_use]
    pub fn with_level(self, level: f64) -> Self {
        self.lock().level = level.clamp(0.0, 1.0);
        self
    }

    pub fn level(&self) -> f64 {
        self.lock().level
    }

    pub fn valves(&self) -> (f64, f64) {
        let s = self.lock();
        (s.in_valve, s.out_valve)
    }

    pub fn is_running(&self) -> bool {
        let s = self.lock();
        s.running && !s.paused
    }

    fn lock(&self) -> MutexGuard<'_, TankState> {
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn to_raw(&self, v: f64) -> u16 {
        let r = (v.clamp(0.0, 1.0) * f64::from(self.model.span)).round();
        r as u16
    }

    fn from_raw(&self, raw: u16) -> f64 {
        (f64::from(raw) / f64::from(self.model.span.max(1))).clamp(0.0, 1.0)
    }

    fn advance(&self) {
        let dt = self.model.step.as_secs_f64() * f64::from(self.model.timescale.max(1));
        let mut s = self.lock();
        if !s.running || s.paused {
            s.outflow = 0.0;
            return;
        }
        let outflow = self.model.k_out * s.out_valve * s.level.max(0.0).sqrt();
        let inflow = self.model.k_in * s.in_valve;
        s.level = (s.level + (inflow - outflow) * dt).clamp(0.0, 1.0);
        s.outflow = outflow.clamp(0.0, 1.0);
    }
}

impl Default for SimulatedPlant {
    fn default() -> Self {
        Self::new(TankModel::default())
    }
}

impl PlantLink for SimulatedPlant {
    fn read_inputs(&mut self) -> Result<PlantInputs, BoxError> {
        self.advance();
        let s = self.lock();
        Ok(PlantInputs {
            level: self.to_raw(s.level),
            outflow: self.to_raw(s.outflow),
            setpoint: 0,
            timescale: self.model.timescale,
        })
    }

    fn write_in_valve(&mut self, raw: u16) -> Result<(), BoxError> {
        let v = self.from_raw(raw);
        self.lock().in_valve = v;
        Ok(())
    }

    fn write_out_valve(&mut self, raw: u16) -> Result<(), BoxError> {
        let v = self.from_raw(raw);
        self.lock().out_valve = v;
        Ok(())
    }

    fn set_running(&mut self, running: bool) -> Result<(), BoxError> {
        tracing::debug!(running, "simulated plant run coil");
        self.lock().running = running;
        Ok(())
    }

    fn set_paused(&mut self, paused: bool) -> Result<(), BoxError> {
        self.lock().paused = paused;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn running(level: f64) -> SimulatedPlant {
        let mut p = SimulatedPlant::default().with_level(level);
        p.set_running(true).unwrap();
        p
    }

    #[test]
    fn stopped_plant_holds_its_level() {
        let mut p = SimulatedPlant::default().with_level(0.4);
        p.write_in_valve(DEFAULT_SPAN).unwrap();
        for _ in 0..10 {
            p.read_inputs().unwrap();
        }
        assert!((p.level() - 0.4).abs() < 1e-12);
    }

    #[test]
    fn open_inflow_raises_level() {
        let mut p = running(0.2);
        p.write_in_valve(DEFAULT_SPAN).unwrap();
        let first = p.read_inputs().unwrap().level;
        let later = (0..20).map(|_| p.read_inputs().unwrap().level).last().unwrap();
        assert!(later > first);
    }

    #[test]
    fn open_outflow_drains_and_reports_outflow() {
        let mut p = running(0.8);
        p.write_out_valve(DEFAULT_SPAN).unwrap();
        let r = p.read_inputs().unwrap();
        assert!(r.outflow > 0);
        assert!(p.level() < 0.8);
    }

    #[test]
    fn pause_freezes_dynamics() {
        let mut p = running(0.5);
        p.write_out_valve(DEFAULT_SPAN).unwrap();
        p.set_paused(true).unwrap();
        let r = p.read_inputs().unwrap();
        assert_eq!(r.level, 5000);
        assert_eq!(r.outflow, 0);
    }

    #[test]
    fn level_never_leaves_unit_range() {
        let mut p = running(0.99);
        p.write_in_valve(DEFAULT_SPAN).unwrap();
        for _ in 0..500 {
            let r = p.read_inputs().unwrap();
            assert!(r.level <= DEFAULT_SPAN);
        }
    }
}
