//! Positional PID regulator implementing [`Regulator`].
//!
//! Error is `setpoint - measurement`; the derivative term acts on the
//! measurement so setpoint steps do not kick the output. Output and integral
//! are both clamped to the output limits (anti-windup).

use softplc_traits::{Regulator, Tunings};

#[derive(Debug, Clone)]
pub struct Pid {
    tunings: Tunings,
    setpoint: f64,
    limits: (f64, f64),
    integral: f64,
    last_input: Option<f64>,
    last_output: Option<f64>,
    auto: bool,
    // Output the next update must reproduce after a manual -> auto switch.
    pending_bias: Option<f64>,
}

impl Pid {
    /// New regulator in manual mode with output limits `[0, 1]`.
    pub fn new(tunings: Tunings, setpoint: f64) -> Self {
        Self {
            tunings,
            setpoint,
            limits: (0.0, 1.0),
            integral: 0.0,
            last_input: None,
            last_output: None,
            auto: false,
            pending_bias: None,
        }
    }

    pub fn with_limits(mut self, lo: f64, hi: f64) -> Self {
        self.limits = if lo <= hi { (lo, hi) } else { (hi, lo) };
        self
    }

    pub fn limits(&self) -> (f64, f64) {
        self.limits
    }

    /// Accumulated integral term (already multiplied by Ki).
    pub fn integral(&self) -> f64 {
        self.integral
    }

    #[inline]
    fn clamp(&self, v: f64) -> f64 {
        v.clamp(self.limits.0, self.limits.1)
    }
}

impl Regulator for Pid {
    fn update(&mut self, measurement: f64, dt: f64) -> Option<f64> {
        if !self.auto {
            return None;
        }
        if !measurement.is_finite() {
            tracing::warn!(measurement, "non-finite measurement ignored");
            return self.last_output;
        }
        let dt = if dt.is_finite() && dt > 0.0 { dt } else { f64::EPSILON };
        let Tunings { kp, ki, kd } = self.tunings;

        let error = self.setpoint - measurement;
        let d_input = measurement - self.last_input.unwrap_or(measurement);
        let proportional = kp * error;
        let derivative = -kd * d_input / dt;

        let output = if let Some(bias) = self.pending_bias.take() {
            // Solve for the integral that makes this output equal the bias.
            self.integral = bias - proportional - derivative;
            bias
        } else {
            self.integral = self.clamp(self.integral + ki * error * dt);
            self.clamp(proportional + self.integral + derivative)
        };

        self.last_input = Some(measurement);
        self.last_output = Some(output);
        Some(output)
    }

    fn set_auto_mode(&mut self, enabled: bool, bias: Option<f64>) {
        if enabled && !self.auto {
            self.last_input = None;
            self.last_output = None;
            self.pending_bias = bias.filter(|b| b.is_finite()).map(|b| self.clamp(b));
            if self.pending_bias.is_none() {
                self.integral = self.clamp(self.integral);
            }
        } else if !enabled {
            self.pending_bias = None;
        }
        self.auto = enabled;
    }

    fn auto_mode(&self) -> bool {
        self.auto
    }

    fn setpoint(&self) -> f64 {
        self.setpoint
    }

    fn set_setpoint(&mut self, setpoint: f64) {
        self.setpoint = setpoint;
    }

    fn tunings(&self) -> Tunings {
        self.tunings
    }

    fn set_tunings(&mut self, tunings: Tunings) {
        self.tunings = tunings;
    }

    fn last_output(&self) -> Option<f64> {
        self.last_output
    }
}
