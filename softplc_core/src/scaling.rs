//! Fixed decimal-factor scaling between engineering units and 16-bit registers.
//!
//! Two conventions coexist:
//! - External register surface: `raw = round(value * decimal_factor)`
//!   (e.g. 0.525 m at factor 1000 is carried as 525).
//! - Plant connection: `raw = round(value * decimal_factor * range_max)`, i.e.
//!   `value_float = raw / (decimal_factor * range_max)` where the plant maps its
//!   full range onto `[0.0, 1.0]`.

/// Quantize a float to a u16 register, rounding to nearest and clamping to
/// `0..=u16::MAX`. Non-finite values (NaN/±Inf) map to 0.
#[inline]
pub fn quantize_u16(x: f64) -> u16 {
    if !x.is_finite() {
        return 0;
    }
    let r = x.round();
    if r <= 0.0 {
        0
    } else if r >= f64::from(u16::MAX) {
        u16::MAX
    } else {
        r as u16
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scaling {
    pub decimal_factor: u16,
    pub range_max: u16,
}

impl Default for Scaling {
    fn default() -> Self {
        Self {
            decimal_factor: 1000,
            range_max: 10,
        }
    }
}

impl Scaling {
    /// Engineering value -> external register units.
    #[inline]
    pub fn to_register(&self, value: f64) -> u16 {
        quantize_u16(value * f64::from(self.factor()))
    }

    /// External register units -> engineering value.
    #[inline]
    pub fn from_register(&self, raw: u16) -> f64 {
        f64::from(raw) / f64::from(self.factor())
    }

    /// Plant register units -> normalized engineering value.
    #[inline]
    pub fn from_plant(&self, raw: u16) -> f64 {
        f64::from(raw) / self.plant_span()
    }

    /// Normalized engineering value -> plant register units.
    #[inline]
    pub fn to_plant(&self, value: f64) -> u16 {
        quantize_u16(value * self.plant_span())
    }

    #[inline]
    fn factor(&self) -> u16 {
        self.decimal_factor.max(1)
    }

    #[inline]
    fn plant_span(&self) -> f64 {
        f64::from(self.factor()) * f64::from(self.range_max.max(1))
    }
}
