//! Vector aliases shared by the parser and the derivation engine
//!
//! Accelerometer, gyroscope and magnetometer triples all travel as the same
//! statically sized nalgebra vector so the body-axis math stays checked.

use nalgebra::Vector3;

/// Body-frame triple (m/s² for accel, °/s for gyro, µT for mag)
pub type Vec3 = Vector3<f64>;

/// True when every component is a finite number
pub fn is_finite3(v: &Vec3) -> bool {
    v.iter().all(|c| c.is_finite())
}
