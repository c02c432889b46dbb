//! Accelerometer-only attitude and planar drift helpers
//! Every angle is in degrees; atan2 keeps quadrants correct and is total,
//! so a zero accel vector yields 0° rather than a domain error.

use crate::types::Vec3;

/// Meters per degree of latitude at the equator
pub const METERS_PER_DEGREE: f64 = 111_139.0;

pub fn magnitude(v: &Vec3) -> f64 {
    v.norm()
}

/// Rotation about the body x axis estimated from the gravity vector
pub fn pitch_deg(accel: &Vec3) -> f64 {
    accel.y.atan2(accel.x.hypot(accel.z)).to_degrees()
}

/// Uncalibrated roll; callers subtract the launch baseline
pub fn roll_deg(accel: &Vec3) -> f64 {
    accel.x.atan2(accel.y.hypot(accel.z)).to_degrees()
}

/// Orientation proxy from the accelerometer alone; not a heading.
pub fn yaw_deg(accel: &Vec3) -> f64 {
    accel.z.atan2(accel.x.hypot(accel.y)).to_degrees()
}

/// Planar distance in meters between two fixes:
/// `sqrt(Δlat² + Δlon²) * 111139`. Only meaningful for small spans.
pub fn planar_drift_m(lat: f64, lon: f64, origin_lat: f64, origin_lon: f64) -> f64 {
    (lat - origin_lat).hypot(lon - origin_lon) * METERS_PER_DEGREE
}
