use serde::{Deserialize, Serialize};

use crate::kinematics;
use crate::types::RawSample;

/// Launch baselines captured from the first accepted sample
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalibrationState {
    pub initial_total_accel: f64,
    pub initial_vertical_accel: f64,
    pub initial_roll_deg: f64,
    pub initial_latitude: f64,
    pub initial_longitude: f64,
}

impl CalibrationState {
    pub fn from_sample(sample: &RawSample) -> Self {
        Self {
            initial_total_accel: kinematics::magnitude(&sample.accel),
            initial_vertical_accel: sample.accel.z,
            initial_roll_deg: kinematics::roll_deg(&sample.accel),
            initial_latitude: sample.latitude,
            initial_longitude: sample.longitude,
        }
    }
}

/// Calibration slot of one session.
///
/// `Uninitialized` is its own state so a genuine zero reading is never
/// mistaken for "not captured yet".
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum Calibration {
    #[default]
    Uninitialized,
    Captured(CalibrationState),
}

impl Calibration {
    /// Capture from `sample` if nothing has been captured yet, then return
    /// the baseline. Later calls never overwrite it.
    pub fn observe_first(&mut self, sample: &RawSample) -> CalibrationState {
        match *self {
            Calibration::Captured(state) => state,
            Calibration::Uninitialized => {
                let state = CalibrationState::from_sample(sample);
                log::info!(
                    "Calibration captured at index {}: |a|={:.3} m/s², az={:.3} m/s², roll={:.2}°, origin=({:.6}, {:.6})",
                    sample.sequence_time,
                    state.initial_total_accel,
                    state.initial_vertical_accel,
                    state.initial_roll_deg,
                    state.initial_latitude,
                    state.initial_longitude
                );
                *self = Calibration::Captured(state);
                state
            }
        }
    }

    pub fn is_captured(&self) -> bool {
        matches!(self, Calibration::Captured(_))
    }

    pub fn state(&self) -> Option<CalibrationState> {
        match *self {
            Calibration::Captured(state) => Some(state),
            Calibration::Uninitialized => None,
        }
    }

    /// Discard the baseline; only a new session calls this
    pub fn reset(&mut self) {
        *self = Calibration::Uninitialized;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Vec3;
    use approx::assert_relative_eq;

    fn sample(accel: Vec3, lat: f64, lon: f64) -> RawSample {
        RawSample {
            sequence_time: 0,
            timestamp: "t".to_string(),
            source_time: None,
            temperature_c: 20.0,
            altitude_baro_m: 100.0,
            altitude_gps_m: 100.0,
            accel,
            gyro: Vec3::zeros(),
            mag: Vec3::zeros(),
            latitude: lat,
            longitude: lon,
        }
    }

    #[test]
    fn test_starts_uninitialized() {
        let calib = Calibration::default();
        assert!(!calib.is_captured());
        assert!(calib.state().is_none());
    }

    #[test]
    fn test_capture_values() {
        let mut calib = Calibration::default();
        let state = calib.observe_first(&sample(Vec3::new(3.0, 0.0, 4.0), 37.0, -122.0));

        assert!(calib.is_captured());
        assert_relative_eq!(state.initial_total_accel, 5.0);
        assert_eq!(state.initial_vertical_accel, 4.0);
        assert_relative_eq!(state.initial_roll_deg, 3.0f64.atan2(4.0).to_degrees());
        assert_eq!(state.initial_latitude, 37.0);
        assert_eq!(state.initial_longitude, -122.0);
    }

    #[test]
    fn test_never_overwritten() {
        let mut calib = Calibration::default();
        calib.observe_first(&sample(Vec3::new(0.0, 0.0, 9.8), 37.0, -122.0));
        let second = calib.observe_first(&sample(Vec3::new(1.0, 1.0, 1.0), 38.0, -121.0));

        assert_eq!(second.initial_vertical_accel, 9.8);
        assert_eq!(second.initial_latitude, 37.0);
    }

    #[test]
    fn test_zero_reading_is_a_real_capture() {
        let mut calib = Calibration::default();
        calib.observe_first(&sample(Vec3::zeros(), 0.0, 0.0));
        assert!(calib.is_captured());

        let again = calib.observe_first(&sample(Vec3::new(0.0, 0.0, 9.8), 1.0, 1.0));
        assert_eq!(again.initial_total_accel, 0.0);
        assert_eq!(again.initial_latitude, 0.0);
    }

    #[test]
    fn test_reset_allows_new_capture() {
        let mut calib = Calibration::default();
        calib.observe_first(&sample(Vec3::new(0.0, 0.0, 9.8), 37.0, -122.0));
        calib.reset();
        assert!(!calib.is_captured());

        let state = calib.observe_first(&sample(Vec3::new(0.0, 0.0, 9.0), 38.0, -121.0));
        assert_eq!(state.initial_vertical_accel, 9.0);
    }
}
