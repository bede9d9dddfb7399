//! Absolute humidity from temperature and relative humidity.

/// Absolute humidity in g/m³ for temperature `t` (°C) and relative humidity
/// `rh` (%), using Bolton's (1980) saturation vapour pressure approximation.
///
/// Meaningful roughly between -20 °C and 50 °C. Undefined at `t == -273.15`.
pub fn absolute_humidity(t: f64, rh: f64) -> f64 {
    6.112 * (17.67 * t / (t + 243.5)).exp() * rh * 2.1674 / (273.15 + t)
}

/// Like [`absolute_humidity`], but `None` when the result is not finite.
pub fn checked_absolute_humidity(t: f64, rh: f64) -> Option<f64> {
    Some(absolute_humidity(t, rh)).filter(|ah| ah.is_finite())
}
