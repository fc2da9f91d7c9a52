#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema for the soft PLC.
//!
//! Every section is optional; a missing section takes its defaults, so an
//! empty file is a valid configuration. Call `Config::validate` after loading.
use std::path::Path;

use serde::Deserialize;

/// Connection to the regulated plant.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PlantCfg {
    pub address: String,
    pub port: u16,
    pub unit_id: u8,
    /// Per-exchange network timeout.
    pub timeout_ms: u64,
}

impl Default for PlantCfg {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".into(),
            port: 5020,
            unit_id: 1,
            timeout_ms: 1000,
        }
    }
}

/// Local register server.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerCfg {
    pub bind: String,
    pub port: u16,
    /// Addresses per register bank.
    pub bank_size: usize,
}

impl Default for ServerCfg {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".into(),
            port: 5020,
            bank_size: 1000,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ControlCfg {
    /// Control period before timescale division.
    pub period_ms: u64,
    pub setpoint: f64,
    pub in_valve: f64,
    pub out_valve: f64,
    pub auto_mode: bool,
    /// Start and unpause the plant as part of the run start sequence.
    pub autostart: bool,
    /// Divide the period by the plant's reported timescale.
    pub scale_period_by_timescale: bool,
    /// Stop the plant at the end of a run instead of pausing it.
    pub stop_on_end: bool,
    /// Adopt the plant's nonzero setpoint echo as the regulator setpoint.
    pub read_setpoint: bool,
}

impl Default for ControlCfg {
    fn default() -> Self {
        Self {
            period_ms: 300,
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

/// PID gains in the regulator's sign convention (negative: reverse-acting).
#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct PidCfg {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
}

impl Default for PidCfg {
    fn default() -> Self {
        Self {
            kp: -12.7426,
            ki: -1.453,
            kd: 0.0,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct BridgeCfg {
    pub tick_ms: u64,
}

impl Default for BridgeCfg {
    fn default() -> Self {
        Self { tick_ms: 10 }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct QueueCfg {
    pub capacity: usize,
}

impl Default for QueueCfg {
    fn default() -> Self {
        Self { capacity: 50 }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct ScalingCfg {
    /// Multiplier between engineering units and register units.
    pub decimal_factor: u16,
    /// Plant full-scale range; plant registers carry `value * decimal_factor * range_max`.
    pub range_max: u16,
}

impl Default for ScalingCfg {
    fn default() -> Self {
        Self {
            decimal_factor: 1000,
            range_max: 10,
        }
    }
}

/// Unattended-run termination on a flat level trace.
#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct StabilityCfg {
    pub enabled: bool,
    /// Consecutive identical quantized samples that start the timer.
    pub window: usize,
    /// Real-time timeout; divided by the plant timescale at runtime.
    pub stop_timeout_ms: u64,
}

impl Default for StabilityCfg {
    fn default() -> Self {
        Self {
            enabled: false,
            window: 10,
            stop_timeout_ms: 1_000_000,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Logging {
    pub level: Option<String>, // "info","debug"
    /// Path to a JSON-lines log file in addition to stderr.
    pub file: Option<String>,
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
    /// Directory for snapshot CSV files.
    pub csv_dir: String,
    /// Existing snapshot CSV to append to when `continue_run` is set.
    pub csv_file: Option<String>,
    /// Append to `csv_file` instead of starting a new log in `csv_dir`.
    pub continue_run: bool,
}

impl Default for Logging {
    fn default() -> Self {
        Self {
            level: None,
            file: None,
            rotation: None,
            csv_dir: "log".into(),
            csv_file: None,
            continue_run: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub plant: PlantCfg,
    pub server: ServerCfg,
    pub control: ControlCfg,
    pub pid: PidCfg,
    pub bridge: BridgeCfg,
    pub queues: QueueCfg,
    pub scaling: ScalingCfg,
    pub stability: StabilityCfg,
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

/// Read, parse and validate a config file.
pub fn load_path(path: &Path) -> eyre::Result<Config> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| eyre::eyre!("read config {:?}: {}", path, e))?;
    let cfg = load_toml(&text).map_err(|e| eyre::eyre!("parse config {:?}: {}", path, e))?;
    cfg.validate()?;
    Ok(cfg)
}

fn unit_interval(v: f64) -> bool {
    (0.0..=1.0).contains(&v)
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Plant
        if self.plant.address.trim().is_empty() {
            eyre::bail!("plant.address must not be empty");
        }
        if self.plant.port == 0 {
            eyre::bail!("plant.port must be > 0");
        }
        if self.plant.timeout_ms == 0 {
            eyre::bail!("plant.timeout_ms must be >= 1");
        }

        // Server
        if self.server.port == 0 {
            eyre::bail!("server.port must be > 0");
        }
        if self.server.bank_size == 0 || self.server.bank_size > 65_536 {
            eyre::bail!("server.bank_size must be in [1, 65536]");
        }

        // Control
        if self.control.period_ms == 0 {
            eyre::bail!("control.period_ms must be >= 1");
        }
        if !unit_interval(self.control.setpoint) {
            eyre::bail!("control.setpoint must be in [0.0, 1.0]");
        }
        if !unit_interval(self.control.in_valve) {
            eyre::bail!("control.in_valve must be in [0.0, 1.0]");
        }
        if !unit_interval(self.control.out_valve) {
            eyre::bail!("control.out_valve must be in [0.0, 1.0]");
        }

        // PID
        if !(self.pid.kp.is_finite() && self.pid.ki.is_finite() && self.pid.kd.is_finite()) {
            eyre::bail!("pid gains must be finite");
        }

        // Bridge
        if self.bridge.tick_ms == 0 {
            eyre::bail!("bridge.tick_ms must be >= 1");
        }
        if self.bridge.tick_ms > self.control.period_ms {
            eyre::bail!("bridge.tick_ms must be <= control.period_ms");
        }

        // Queues
        if self.queues.capacity == 0 {
            eyre::bail!("queues.capacity must be >= 1");
        }

        // Scaling
        if self.scaling.decimal_factor == 0 {
            eyre::bail!("scaling.decimal_factor must be >= 1");
        }
        if self.scaling.range_max == 0 {
            eyre::bail!("scaling.range_max must be >= 1");
        }

        // Stability
        if self.stability.window < 2 {
            eyre::bail!("stability.window must be >= 2");
        }
        if self.stability.stop_timeout_ms == 0 {
            eyre::bail!("stability.stop_timeout_ms must be >= 1");
        }

        // Logging
        if let Some(rotation) = self.logging.rotation.as_deref()
            && !matches!(rotation, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never, daily, hourly");
        }
        if self.logging.csv_dir.trim().is_empty() {
            eyre::bail!("logging.csv_dir must not be empty");
        }
        if self.logging.continue_run
            && self.logging.csv_file.as_deref().is_none_or(|f| f.trim().is_empty())
        {
            eyre::bail!("logging.continue_run requires logging.csv_file");
        }

        Ok(())
    }
}
