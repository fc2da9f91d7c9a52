//! Type-state builder for `ControlLoop`.
//!
//! The builder enforces at compile time that the plant link and the shared
//! context are provided before `build()` is available. `try_build()` is always
//! available for dynamic checks.

use std::marker::PhantomData;

use softplc_traits::clock::{Clock, MonotonicClock};
use softplc_traits::{PlantInputs, PlantLink, Regulator, Tunings};

use crate::config::{ControlCfg, DEFAULT_TUNINGS, StabilityCfg};
use crate::context::PlcContext;
use crate::control::{ControlLoop, RunState, StabilityWatch};
use crate::error::{BuildError, Result};
use crate::logger::SnapshotSink;
use crate::pid::Pid;

// ── Type-state markers ───────────────────────────────────────────────────────

pub struct Missing;
pub struct Set;

/// Builder for `ControlLoop`. All fields are validated on `build()`.
pub struct ControlLoopBuilder<P, X> {
    plant: Option<Box<dyn PlantLink + Send>>,
    ctx: Option<PlcContext>,
    regulator: Option<Box<dyn Regulator + Send>>,
    tunings: Option<Tunings>,
    control: Option<ControlCfg>,
    stability: Option<StabilityCfg>,
    clock: Option<Box<dyn Clock + Send + Sync>>,
    sink: Option<Box<dyn SnapshotSink + Send>>,
    _p: PhantomData<P>,
    _x: PhantomData<X>,
}

impl Default for ControlLoopBuilder<Missing, Missing> {
    fn default() -> Self {
        Self {
            plant: None,
            ctx: None,
            regulator: None,
            tunings: None,
            control: None,
            stability: None,
            clock: None,
            sink: None,
            _p: PhantomData,
            _x: PhantomData,
        }
    }
}

/// Validate configuration and construct the loop.
#[allow(clippy::too_many_arguments)]
fn validate_and_build(
    plant: Box<dyn PlantLink + Send>,
    ctx: PlcContext,
    regulator: Option<Box<dyn Regulator + Send>>,
    tunings: Tunings,
    control: ControlCfg,
    stability: StabilityCfg,
    clock: Option<Box<dyn Clock + Send + Sync>>,
    sink: Option<Box<dyn SnapshotSink + Send>>,
) -> Result<ControlLoop> {
    // ── Validation ───────────────────────────────────────────────────────────
    if control.period.is_zero() {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "control period must be > 0",
        )));
    }
    let unit = 0.0..=1.0;
    if !unit.contains(&control.setpoint)
        || !unit.contains(&control.in_valve)
        || !unit.contains(&control.out_valve)
    {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "setpoint and valve positions must be in [0, 1]",
        )));
    }
    if !(tunings.kp.is_finite() && tunings.ki.is_finite() && tunings.kd.is_finite()) {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "gains must be finite",
        )));
    }
    if stability.enabled && stability.window < 2 {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "stability window must be >= 2",
        )));
    }

    let regulator =
        regulator.unwrap_or_else(|| Box::new(Pid::new(tunings, control.setpoint)));
    let clock: Box<dyn Clock + Send + Sync> =
        clock.unwrap_or_else(|| Box::new(MonotonicClock::new()));
    let epoch = clock.now();
    let scaling = ctx.store.scaling();

    Ok(ControlLoop {
        ctx,
        plant,
        regulator,
        clock,
        sink,
        control,
        stability,
        scaling,
        state: RunState::Stopped,
        in_valve: control.in_valve,
        out_valve: control.out_valve,
        last_written: None,
        inputs: PlantInputs {
            timescale: 1,
            ..PlantInputs::default()
        },
        epoch,
        last_tick: None,
        ticks: 0,
        watch: StabilityWatch::new(stability.window),
    })
}

impl<P, X> ControlLoopBuilder<P, X> {
    /// Fallible build available in any type-state; returns detailed error for missing pieces.
    pub fn try_build(self) -> Result<ControlLoop> {
        let plant = self
            .plant
            .ok_or_else(|| eyre::Report::new(BuildError::MissingPlant))?;
        let ctx = self
            .ctx
            .ok_or_else(|| eyre::Report::new(BuildError::MissingContext))?;
        validate_and_build(
            plant,
            ctx,
            self.regulator,
            self.tunings.unwrap_or(DEFAULT_TUNINGS),
            self.control.unwrap_or_default(),
            self.stability.unwrap_or_default(),
            self.clock,
            self.sink,
        )
    }

    /// Gains for the default PID; ignored when a regulator is supplied.
    pub fn with_tunings(mut self, tunings: Tunings) -> Self {
        self.tunings = Some(tunings);
        self
    }

    /// Replace the default PID with another regulator.
    pub fn with_regulator(mut self, regulator: impl Regulator + Send + 'static) -> Self {
        self.regulator = Some(Box::new(regulator));
        self
    }

    pub fn with_control(mut self, control: ControlCfg) -> Self {
        self.control = Some(control);
        self
    }

    pub fn with_stability(mut self, stability: StabilityCfg) -> Self {
        self.stability = Some(stability);
        self
    }

    /// Provide a custom clock implementation; defaults to `MonotonicClock` when not provided.
    pub fn with_clock(mut self, clock: Box<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn with_sink(mut self, sink: impl SnapshotSink + Send + 'static) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }
}

// Setters that advance type-state
impl<X> ControlLoopBuilder<Missing, X> {
    pub fn with_plant(self, plant: impl PlantLink + Send + 'static) -> ControlLoopBuilder<Set, X> {
        ControlLoopBuilder {
            plant: Some(Box::new(plant)),
            ctx: self.ctx,
            regulator: self.regulator,
            tunings: self.tunings,
            control: self.control,
            stability: self.stability,
            clock: self.clock,
            sink: self.sink,
            _p: PhantomData,
            _x: PhantomData,
        }
    }
}

impl<P> ControlLoopBuilder<P, Missing> {
    pub fn with_context(self, ctx: PlcContext) -> ControlLoopBuilder<P, Set> {
        ControlLoopBuilder {
            plant: self.plant,
            ctx: Some(ctx),
            regulator: self.regulator,
            tunings: self.tunings,
            control: self.control,
            stability: self.stability,
            clock: self.clock,
            sink: self.sink,
            _p: PhantomData,
            _x: PhantomData,
        }
    }
}

impl ControlLoopBuilder<Set, Set> {
    /// Validate and build the loop. Only available when plant and context are set.
    pub fn build(self) -> Result<ControlLoop> {
        self.try_build()
    }
}
