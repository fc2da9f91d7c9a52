//! Plant task: fixed-period read, regulate, publish, command cycle.
//!
//! State machine:
//!
//! ```text
//!             Start                 Pause(true)
//!   Stopped ---------> Running <-----------------> Paused
//!      ^                  |        Pause(false)      |
//!      |    Stop/Emergency|        or Start          |
//!      +------------------+--------------------------+
//! ```
//!
//! Manual/Auto is orthogonal and lives in the regulator's enable flag.
//! Emergency is latched outside the command FIFO and checked first on every
//! cycle.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use softplc_traits::clock::Clock;
use softplc_traits::{BoxError, PlantInputs, PlantLink, Regulator};

use crate::command::Command;
use crate::config::{ControlCfg, StabilityCfg};
use crate::context::PlcContext;
use crate::error::{Report, Result};
use crate::logger::SnapshotSink;
use crate::plant_error::map_plant_error;
use crate::scaling::Scaling;
use crate::snapshot::OutputSnapshot;
use crate::util::{rate_hz, scaled_period, scaled_timeout};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Stopped,
    Running,
    Paused,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Manual,
    Auto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Shutdown flag raised (ctrl-c or the owning process).
    Shutdown,
    /// Level trace stayed flat past the stop timeout.
    StableTimeout,
}

/// Outcome of one control cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleStatus {
    Continue,
    StableTimeout,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunSummary {
    /// Actuator position at the end of the run; seed for the next run's bias.
    pub last_output: f64,
    pub ticks: u64,
    pub reason: StopReason,
}

/// Flat-trace detector over the last `window` quantized level samples.
#[derive(Debug, Clone)]
pub(crate) struct StabilityWatch {
    window: usize,
    samples: VecDeque<u16>,
    since: Option<Instant>,
}

impl StabilityWatch {
    pub(crate) fn new(window: usize) -> Self {
        let window = window.max(2);
        Self {
            window,
            samples: VecDeque::with_capacity(window),
            since: None,
        }
    }

    /// Feed one sample; returns how long the trace has been flat, if it is.
    pub(crate) fn observe(&mut self, raw_level: u16, now: Instant) -> Option<Duration> {
        if self.samples.len() == self.window {
            self.samples.pop_front();
        }
        self.samples.push_back(raw_level);
        let flat = self.samples.len() == self.window
            && self.samples.iter().all(|&s| s == raw_level);
        if !flat {
            if self.since.take().is_some() {
                tracing::debug!("level changed, stability timer reset");
            }
            return None;
        }
        let since = *self.since.get_or_insert_with(|| {
            tracing::info!(level = raw_level, window = self.window, "level stable, timeout timer started");
            now
        });
        Some(now.saturating_duration_since(since))
    }
}

pub struct ControlLoop {
    pub(crate) ctx: PlcContext,
    pub(crate) plant: Box<dyn PlantLink + Send>,
    pub(crate) regulator: Box<dyn Regulator + Send>,
    pub(crate) clock: Box<dyn Clock + Send + Sync>,
    pub(crate) sink: Option<Box<dyn SnapshotSink + Send>>,
    pub(crate) control: ControlCfg,
    pub(crate) stability: StabilityCfg,
    pub(crate) scaling: Scaling,
    pub(crate) state: RunState,
    pub(crate) in_valve: f64,
    pub(crate) out_valve: f64,
    // Raw out-valve value last written to the plant; None forces the next write.
    pub(crate) last_written: Option<u16>,
    pub(crate) inputs: PlantInputs,
    pub(crate) epoch: Instant,
    pub(crate) last_tick: Option<Instant>,
    pub(crate) ticks: u64,
    pub(crate) watch: StabilityWatch,
}

impl core::fmt::Debug for ControlLoop {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ControlLoop")
            .field("state", &self.state)
            .field("mode", &self.mode())
            .field("in_valve", &self.in_valve)
            .field("out_valve", &self.out_valve)
            .field("ticks", &self.ticks)
            .finish()
    }
}

impl ControlLoop {
    pub fn builder() -> crate::builder::ControlLoopBuilder<crate::builder::Missing, crate::builder::Missing> {
        crate::builder::ControlLoopBuilder::default()
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn mode(&self) -> Mode {
        if self.regulator.auto_mode() {
            Mode::Auto
        } else {
            Mode::Manual
        }
    }

    pub fn in_valve(&self) -> f64 {
        self.in_valve
    }

    pub fn out_valve(&self) -> f64 {
        self.out_valve
    }

    pub fn regulator(&self) -> &dyn Regulator {
        self.regulator.as_ref()
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Plant timescale from the last successful read, at least 1.
    pub fn timescale(&self) -> u16 {
        self.inputs.timescale.max(1)
    }

    /// Cycle period after optional timescale division.
    pub fn effective_period(&self) -> Duration {
        if self.control.scale_period_by_timescale {
            scaled_period(self.control.period, self.timescale())
        } else {
            self.control.period
        }
    }

    /// Stop timeout after timescale division.
    pub fn effective_stop_timeout(&self) -> Duration {
        scaled_timeout(self.stability.stop_timeout, self.timescale())
    }

    /// Run start sequence: pause the plant, write the initial valve
    /// positions, seed the regulator, then start and unpause when autostart
    /// is configured.
    pub fn begin(&mut self) {
        let c = self.control;
        self.plant_io("pause", |p| p.set_paused(true));

        self.in_valve = c.in_valve.clamp(0.0, 1.0);
        self.out_valve = c.out_valve.clamp(0.0, 1.0);
        let in_raw = self.scaling.to_plant(self.in_valve);
        let out_raw = self.scaling.to_plant(self.out_valve);
        self.plant_io("write in-valve", |p| p.write_in_valve(in_raw));
        if self.plant_io("write out-valve", |p| p.write_out_valve(out_raw)) {
            self.last_written = Some(out_raw);
        }

        self.regulator.set_setpoint(c.setpoint);
        if c.auto_mode {
            self.regulator.set_auto_mode(true, Some(self.out_valve));
            self.last_written = None;
        } else {
            self.regulator.set_auto_mode(false, None);
        }

        if c.autostart {
            let started = self.plant_io("start", |p| p.set_running(true))
                && self.plant_io("unpause", |p| p.set_paused(false));
            self.state = if started { RunState::Running } else { RunState::Stopped };
        } else {
            self.state = RunState::Stopped;
        }

        self.epoch = self.clock.now();
        self.last_tick = None;
        self.ticks = 0;
        self.watch = StabilityWatch::new(self.stability.window);
        let t = self.regulator.tunings();
        tracing::info!(
            state = ?self.state,
            mode = ?self.mode(),
            setpoint = c.setpoint,
            in_valve = self.in_valve,
            out_valve = self.out_valve,
            kp = t.kp,
            ki = t.ki,
            kd = t.kd,
            period_ms = c.period.as_millis() as u64,
            rate_hz = rate_hz(c.period),
            "control loop start"
        );
    }

    /// One control cycle. Only a snapshot-log failure is an error; plant
    /// exchange failures are logged and the cycle carries on.
    pub fn tick(&mut self) -> Result<CycleStatus> {
        let now = self.clock.now();
        let dt = self
            .last_tick
            .map(|t| now.saturating_duration_since(t))
            .unwrap_or_else(|| self.effective_period())
            .as_secs_f64();
        self.last_tick = Some(now);
        self.ticks += 1;

        if self.ctx.commands.take_emergency() {
            self.emergency();
        }

        let sampled = match self.plant.read_inputs() {
            Ok(inputs) => {
                self.inputs = inputs;
                true
            }
            Err(e) => {
                self.log_plant_error("read inputs", e.as_ref());
                false
            }
        };

        if sampled {
            if self.control.read_setpoint {
                self.adopt_setpoint_echo();
            }
            let level = self.scaling.from_plant(self.inputs.level);
            self.regulate(level, dt);

            let snap = OutputSnapshot {
                time: self.clock.secs_since(self.epoch),
                level,
                outflow: self.scaling.from_plant(self.inputs.outflow),
                in_valve: self.in_valve,
                out_valve: self.out_valve,
                setpoint: self.regulator.setpoint(),
                dt,
                auto_mode: self.regulator.auto_mode(),
            };
            self.ctx.snapshots.push(snap);
            if let Some(sink) = self.sink.as_mut() {
                sink.record(&snap).map_err(Report::new)?;
            }
            tracing::trace!(?snap, "cycle");
        }

        if let Some(cmd) = self.ctx.commands.pop() {
            self.apply(cmd);
        }

        if sampled && self.stability.enabled {
            let limit = self.effective_stop_timeout();
            if let Some(flat) = self.watch.observe(self.inputs.level, now)
                && flat > limit
            {
                tracing::info!(
                    flat_ms = flat.as_millis() as u64,
                    timeout_ms = limit.as_millis() as u64,
                    "level stable past timeout, ending run"
                );
                return Ok(CycleStatus::StableTimeout);
            }
        }
        Ok(CycleStatus::Continue)
    }

    /// Cycle at the effective period until shutdown or stability timeout,
    /// then leave the plant paused, or stopped when `stop_on_end` is set.
    pub fn run(&mut self) -> Result<RunSummary> {
        let reason = loop {
            if self.ctx.is_shutdown() {
                break StopReason::Shutdown;
            }
            let started = self.clock.now();
            if self.tick()? == CycleStatus::StableTimeout {
                break StopReason::StableTimeout;
            }
            let period = self.effective_period();
            self.clock.pace(started, period);
        };
        self.end();
        let summary = RunSummary {
            last_output: self.out_valve,
            ticks: self.ticks,
            reason,
        };
        tracing::info!(
            last_output = summary.last_output,
            ticks = summary.ticks,
            reason = ?summary.reason,
            "control loop stopped"
        );
        Ok(summary)
    }

    fn end(&mut self) {
        if self.control.stop_on_end {
            if self.plant_io("stop", |p| p.set_running(false)) {
                self.transition(RunState::Stopped);
            }
        } else if self.plant_io("pause", |p| p.set_paused(true)) && self.state == RunState::Running {
            self.transition(RunState::Paused);
        }
    }

    // A zero echo means the plant has no setpoint of its own.
    fn adopt_setpoint_echo(&mut self) {
        if self.inputs.setpoint == 0 {
            return;
        }
        let echoed = self.scaling.from_plant(self.inputs.setpoint);
        if (echoed - self.regulator.setpoint()).abs() > f64::EPSILON {
            self.regulator.set_setpoint(echoed);
            tracing::info!(setpoint = echoed, "setpoint adopted from plant");
        }
    }

    fn regulate(&mut self, level: f64, dt: f64) {
        if self.state == RunState::Paused {
            return;
        }
        let Some(output) = self.regulator.update(level, dt) else {
            return;
        };
        self.out_valve = output;
        let raw = self.scaling.to_plant(output);
        if self.last_written == Some(raw) {
            return;
        }
        if self.plant_io("write out-valve", |p| p.write_out_valve(raw)) {
            self.last_written = Some(raw);
        }
    }

    fn emergency(&mut self) {
        tracing::error!(state = ?self.state, mode = ?self.mode(), "emergency: closing valves");
        self.regulator.set_auto_mode(false, None);
        self.plant_io("close in-valve", |p| p.write_in_valve(0));
        self.plant_io("close out-valve", |p| p.write_out_valve(0));
        self.plant_io("stop", |p| p.set_running(false));
        self.in_valve = 0.0;
        self.out_valve = 0.0;
        self.last_written = Some(0);
        self.transition(RunState::Stopped);
        let discarded = self.ctx.commands.clear();
        if discarded > 0 {
            tracing::warn!(discarded, "pending commands discarded by emergency");
        }
    }

    /// Apply one command from the queue.
    pub fn apply(&mut self, cmd: Command) {
        tracing::debug!(command = ?cmd, state = ?self.state, "applying command");
        match cmd {
            Command::Start => match self.state {
                RunState::Running => tracing::debug!("start ignored, already running"),
                RunState::Stopped | RunState::Paused => {
                    if self.plant_io("start", |p| p.set_running(true))
                        && self.plant_io("unpause", |p| p.set_paused(false))
                    {
                        self.transition(RunState::Running);
                    }
                }
            },
            Command::Stop => {
                if self.plant_io("stop", |p| p.set_running(false)) {
                    self.transition(RunState::Stopped);
                }
            }
            Command::Emergency => self.emergency(),
            Command::Pause(true) => {
                if self.state == RunState::Running && self.plant_io("pause", |p| p.set_paused(true)) {
                    self.transition(RunState::Paused);
                }
            }
            Command::Pause(false) => {
                if self.state == RunState::Paused && self.plant_io("unpause", |p| p.set_paused(false)) {
                    self.transition(RunState::Running);
                }
            }
            Command::SetAutoMode(on) => {
                if on == self.regulator.auto_mode() {
                    return;
                }
                if on {
                    // Bias continuity: first auto output equals the manual position.
                    self.regulator.set_auto_mode(true, Some(self.out_valve));
                    self.last_written = None;
                } else {
                    self.regulator.set_auto_mode(false, None);
                }
                tracing::info!(mode = ?self.mode(), bias = self.out_valve, "control mode changed");
            }
            Command::SetSetpoint(v) => {
                self.regulator.set_setpoint(v);
                tracing::info!(setpoint = v, "setpoint changed");
            }
            Command::SetInValve(v) => {
                let v = v.clamp(0.0, 1.0);
                let raw = self.scaling.to_plant(v);
                if self.plant_io("write in-valve", |p| p.write_in_valve(raw)) {
                    self.in_valve = v;
                    tracing::info!(in_valve = v, "in-valve set");
                }
            }
            Command::SetOutValve(v) => {
                if self.regulator.auto_mode() {
                    tracing::error!(out_valve = v, "out-valve is driven by the regulator in auto mode; write rejected");
                    return;
                }
                let v = v.clamp(0.0, 1.0);
                let raw = self.scaling.to_plant(v);
                if self.plant_io("write out-valve", |p| p.write_out_valve(raw)) {
                    self.out_valve = v;
                    self.last_written = Some(raw);
                    tracing::info!(out_valve = v, "out-valve set");
                }
            }
            Command::SetKp(kp) => self.retune(|t| t.kp = kp),
            Command::SetKi(ki) => self.retune(|t| t.ki = ki),
            Command::SetKd(kd) => self.retune(|t| t.kd = kd),
        }
    }

    fn retune(&mut self, f: impl FnOnce(&mut softplc_traits::Tunings)) {
        let mut t = self.regulator.tunings();
        f(&mut t);
        self.regulator.set_tunings(t);
        tracing::info!(kp = t.kp, ki = t.ki, kd = t.kd, "tunings changed");
    }

    fn transition(&mut self, to: RunState) {
        if self.state != to {
            tracing::info!(from = ?self.state, to = ?to, "state transition");
            self.state = to;
        }
    }

    /// Run one plant exchange; failures are logged and reported as `false`.
    fn plant_io(
        &mut self,
        op: &'static str,
        f: impl FnOnce(&mut dyn PlantLink) -> std::result::Result<(), BoxError>,
    ) -> bool {
        match f(self.plant.as_mut()) {
            Ok(()) => true,
            Err(e) => {
                self.log_plant_error(op, e.as_ref());
                false
            }
        }
    }

    fn log_plant_error(&self, op: &'static str, e: &(dyn std::error::Error + Send + Sync + 'static)) {
        let mapped = map_plant_error(e);
        tracing::warn!(op, error = %mapped, "plant exchange failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stability_watch_needs_a_full_flat_window() {
        let t0 = Instant::now();
        let mut w = StabilityWatch::new(3);
        assert_eq!(w.observe(5, t0), None);
        assert_eq!(w.observe(5, t0), None);
        assert_eq!(w.observe(5, t0), Some(Duration::ZERO));
        assert_eq!(
            w.observe(5, t0 + Duration::from_secs(2)),
            Some(Duration::from_secs(2))
        );
        assert_eq!(w.observe(6, t0 + Duration::from_secs(3)), None);
        assert_eq!(w.observe(6, t0 + Duration::from_secs(4)), None);
    }
}
