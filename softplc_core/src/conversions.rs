//! `From` implementations bridging `softplc_config` types to `softplc_core` types.

use std::time::Duration;

use softplc_traits::Tunings;

use crate::config::{BridgeCfg, ControlCfg, StabilityCfg};
use crate::scaling::Scaling;

// ── ControlCfg ───────────────────────────────────────────────────────────────

impl From<&softplc_config::ControlCfg> for ControlCfg {
    fn from(c: &softplc_config::ControlCfg) -> Self {
        Self {
            period: Duration::from_millis(c.period_ms.max(1)),
            setpoint: c.setpoint,
            in_valve: c.in_valve,
            out_valve: c.out_valve,
            auto_mode: c.auto_mode,
            autostart: c.autostart,
            scale_period_by_timescale: c.scale_period_by_timescale,
            stop_on_end: c.stop_on_end,
            read_setpoint: c.read_setpoint,
        }
    }
}

// ── StabilityCfg ─────────────────────────────────────────────────────────────

impl From<&softplc_config::StabilityCfg> for StabilityCfg {
    fn from(c: &softplc_config::StabilityCfg) -> Self {
        Self {
            enabled: c.enabled,
            window: c.window,
            stop_timeout: Duration::from_millis(c.stop_timeout_ms),
        }
    }
}

// ── BridgeCfg ────────────────────────────────────────────────────────────────

impl From<&softplc_config::BridgeCfg> for BridgeCfg {
    fn from(c: &softplc_config::BridgeCfg) -> Self {
        Self {
            tick: Duration::from_millis(c.tick_ms.max(1)),
        }
    }
}

// ── Scaling / Tunings ────────────────────────────────────────────────────────

impl From<&softplc_config::ScalingCfg> for Scaling {
    fn from(c: &softplc_config::ScalingCfg) -> Self {
        Self {
            decimal_factor: c.decimal_factor,
            range_max: c.range_max,
        }
    }
}

/// Gains are carried in the regulator's sign in both places.
pub fn tunings_from(c: &softplc_config::PidCfg) -> Tunings {
    Tunings::new(c.kp, c.ki, c.kd)
}
