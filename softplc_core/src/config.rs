//! Runtime configuration for the bridge and the control loop.
//!
//! These are separate from the TOML-deserialized config in `softplc_config`;
//! see `conversions` for the mapping.

use std::time::Duration;

use softplc_traits::Tunings;

/// Control-loop cycle and run-start parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlCfg {
    /// Cycle period before timescale division.
    pub period: Duration,
    pub setpoint: f64,
    /// Initial in-valve position written by the start sequence.
    pub in_valve: f64,
    /// Initial out-valve position; also the bias seeded into the regulator.
    pub out_valve: f64,
    pub auto_mode: bool,
    pub autostart: bool,
    pub scale_period_by_timescale: bool,
    /// Leave the plant stopped rather than paused when the run ends.
    pub stop_on_end: bool,
    /// Follow the plant's nonzero setpoint echo.
    pub read_setpoint: bool,
}

impl Default for ControlCfg {
    fn default() -> Self {
        Self {
            period: Duration::from_millis(300),
            setpoint: 0.5,
            in_valve: 0.5,
            out_valve: 0.0,
            auto_mode: true,
            autostart: true,
            scale_period_by_timescale: true,
            stop_on_end: false,
            read_setpoint: false,
        }
    }
}

/// Stability/timeout detection for unattended runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StabilityCfg {
    pub enabled: bool,
    pub window: usize,
    /// Divided by the plant timescale at runtime.
    pub stop_timeout: Duration,
}

impl Default for StabilityCfg {
    fn default() -> Self {
        Self {
            enabled: false,
            window: 10,
            stop_timeout: Duration::from_secs(1000),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeCfg {
    pub tick: Duration,
}

impl Default for BridgeCfg {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(10),
        }
    }
}

/// Default regulator gains (reverse-acting PI).
pub const DEFAULT_TUNINGS: Tunings = Tunings::new(-12.7426, -1.453, 0.0);
