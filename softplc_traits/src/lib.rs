pub mod clock;

pub use clock::{Clock, MonotonicClock};

/// Boxed error used at every trait boundary in this crate.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Raw input-register block of the plant, in protocol units.
///
/// `level` and `outflow` are scaled by `decimal_factor * range_max`;
/// `setpoint` is the plant's own echo; `timescale` is the plant's
/// simulation speed-up (1 = real time).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlantInputs {
    pub level: u16,
    pub outflow: u16,
    pub setpoint: u16,
    pub timescale: u16,
}

/// Connection to the regulated plant.
///
/// Each call is one protocol exchange and may block up to the
/// implementation's network timeout.
pub trait PlantLink {
    fn read_inputs(&mut self) -> Result<PlantInputs, BoxError>;
    fn write_in_valve(&mut self, raw: u16) -> Result<(), BoxError>;
    fn write_out_valve(&mut self, raw: u16) -> Result<(), BoxError>;
    /// Start (`true`) or stop (`false`) the plant.
    fn set_running(&mut self, running: bool) -> Result<(), BoxError>;
    fn set_paused(&mut self, paused: bool) -> Result<(), BoxError>;
}

impl<T: PlantLink + ?Sized> PlantLink for Box<T> {
    fn read_inputs(&mut self) -> Result<PlantInputs, BoxError> {
        (**self).read_inputs()
    }
    fn write_in_valve(&mut self, raw: u16) -> Result<(), BoxError> {
        (**self).write_in_valve(raw)
    }
    fn write_out_valve(&mut self, raw: u16) -> Result<(), BoxError> {
        (**self).write_out_valve(raw)
    }
    fn set_running(&mut self, running: bool) -> Result<(), BoxError> {
        (**self).set_running(running)
    }
    fn set_paused(&mut self, paused: bool) -> Result<(), BoxError> {
        (**self).set_paused(paused)
    }
}

/// PID gain triple. Sign convention is the regulator's (see `Regulator`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tunings {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
}

impl Tunings {
    pub const fn new(kp: f64, ki: f64, kd: f64) -> Self {
        Self { kp, ki, kd }
    }
}

/// Stateful feedback regulator: `(measurement, dt) -> output`, bounded by
/// the regulator's own output limits.
///
/// Contract:
/// - `update` returns `None` while disabled (manual mode).
/// - Enabling with `bias = Some(u)` guarantees the first output after the
///   switch equals `u` clamped to the limits (bias continuity).
/// - Changing tunings or setpoint never resets accumulated state.
pub trait Regulator {
    fn update(&mut self, measurement: f64, dt: f64) -> Option<f64>;
    fn set_auto_mode(&mut self, enabled: bool, bias: Option<f64>);
    fn auto_mode(&self) -> bool;
    fn setpoint(&self) -> f64;
    fn set_setpoint(&mut self, setpoint: f64);
    fn tunings(&self) -> Tunings;
    fn set_tunings(&mut self, tunings: Tunings);
    /// Last value returned by `update`, if any since the last enable.
    fn last_output(&self) -> Option<f64>;
}
