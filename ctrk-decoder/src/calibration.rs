//! Raw to engineering-unit conversions
//!
//! Internal state keeps the raw integers read from the bus; these are applied
//! only when building a [`crate::CalibratedRecord`].

/// Engine speed in rpm, truncated toward zero
pub fn rpm(raw: u16) -> u32 {
    (raw as f64 / 2.56) as u32
}

/// Wheel speed in km/h
pub fn wheel_speed_kmh(raw: u16) -> f64 {
    (raw as f64 / 64.0) * 3.6
}

/// Throttle opening (APS or TPS) in percent
pub fn throttle_pct(raw: u16) -> f64 {
    ((raw as f64 / 8.192) * 100.0) / 84.96
}

/// Brake pressure in bar
pub fn brake_bar(raw: u16) -> f64 {
    raw as f64 / 32.0
}

/// Lean angle in degrees; 9000 is upright
pub fn lean_deg(raw: u16) -> f64 {
    raw as f64 / 100.0 - 90.0
}

/// Pitch rate in degrees per second
pub fn pitch_deg_s(raw: u16) -> f64 {
    raw as f64 / 100.0 - 300.0
}

/// Acceleration in g
pub fn accel_g(raw: u16) -> f64 {
    raw as f64 / 1000.0 - 7.0
}

/// Water or intake temperature in °C
pub fn temp_c(raw: u8) -> f64 {
    raw as f64 / 1.6 - 30.0
}

/// Fuel consumed in cc
pub fn fuel_cc(raw: u32) -> f64 {
    raw as f64 / 100.0
}

/// GPS ground speed in km/h
pub fn gps_speed_kmh(knots: f64) -> f64 {
    knots * 1.852
}
