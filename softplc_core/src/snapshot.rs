use serde::Serialize;

/// Control-loop state published once per cycle, in engineering units.
///
/// `time` is seconds since the loop began; `dt` is the measured length of
/// the previous cycle.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct OutputSnapshot {
    pub time: f64,
    pub level: f64,
    pub outflow: f64,
    pub in_valve: f64,
    pub out_valve: f64,
    pub setpoint: f64,
    pub dt: f64,
    /// Regulator enable flag; mirrored to the register surface, not logged.
    #[serde(skip)]
    pub auto_mode: bool,
}
