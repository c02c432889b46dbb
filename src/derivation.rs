use serde::{Deserialize, Serialize};

use crate::calibration::CalibrationState;
use crate::kinematics;
use crate::types::{Channel, DerivedSample, RawSample};

/// How the time step between two consecutive samples is measured
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum VelocityMode {
    /// Constant cadence: every accepted sample is one time unit apart
    #[default]
    UnitInterval,
    /// Use the wire timestamps; requires strictly increasing source times
    ElapsedTime,
}

impl VelocityMode {
    /// Time step from `previous` to `current`, or `None` when it can't be
    /// trusted (missing, duplicate or reordered timestamps).
    pub fn step(self, current: &RawSample, previous: &RawSample) -> Option<f64> {
        match self {
            VelocityMode::UnitInterval => Some(1.0),
            VelocityMode::ElapsedTime => match (current.source_time, previous.source_time) {
                (Some(now), Some(before)) if now > before => Some(now - before),
                _ => None,
            },
        }
    }
}

/// Which channels an exporter or status line renders.
///
/// Presets never change what is computed; every [`DerivedSample`] carries
/// all channels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ChannelPreset {
    /// Every derived channel (nine-panel live view)
    #[default]
    Full,
    /// Altitude, velocity, acceleration and drift only
    Flight,
}

const FULL_CHANNELS: &[Channel] = &[
    Channel::Temperature,
    Channel::AltitudeBaro,
    Channel::AltitudeGps,
    Channel::VerticalVelocity,
    Channel::TotalAcceleration,
    Channel::VerticalAcceleration,
    Channel::Pitch,
    Channel::Roll,
    Channel::Yaw,
    Channel::PitchRate,
    Channel::RollRate,
    Channel::YawRate,
    Channel::Drift,
    Channel::Latitude,
    Channel::Longitude,
];

const FLIGHT_CHANNELS: &[Channel] = &[
    Channel::AltitudeBaro,
    Channel::AltitudeGps,
    Channel::VerticalVelocity,
    Channel::TotalAcceleration,
    Channel::VerticalAcceleration,
    Channel::Drift,
];

impl ChannelPreset {
    pub fn channels(self) -> &'static [Channel] {
        match self {
            ChannelPreset::Full => FULL_CHANNELS,
            ChannelPreset::Flight => FLIGHT_CHANNELS,
        }
    }
}

/// Computes one [`DerivedSample`] from the current sample, the one before
/// it and the session baseline. Pure; holds configuration only.
#[derive(Clone, Copy, Debug, Default)]
pub struct DerivationEngine {
    velocity_mode: VelocityMode,
}

impl DerivationEngine {
    pub fn new(velocity_mode: VelocityMode) -> Self {
        Self { velocity_mode }
    }

    pub fn velocity_mode(&self) -> VelocityMode {
        self.velocity_mode
    }

    pub fn derive(
        &self,
        current: &RawSample,
        previous: Option<&RawSample>,
        calib: &CalibrationState,
    ) -> DerivedSample {
        let accel = &current.accel;

        let vertical_velocity_mps = previous
            .and_then(|prev| {
                self.velocity_mode
                    .step(current, prev)
                    .map(|dt| (current.altitude_baro_m - prev.altitude_baro_m) / dt)
            })
            .unwrap_or(0.0);

        DerivedSample {
            time_index: current.sequence_time,
            temperature_c: current.temperature_c,
            altitude_baro_m: current.altitude_baro_m,
            altitude_gps_m: current.altitude_gps_m,
            vertical_velocity_mps,
            total_acceleration_mps2: kinematics::magnitude(accel) - calib.initial_total_accel,
            vertical_acceleration_mps2: accel.z - calib.initial_vertical_accel,
            pitch_deg: kinematics::pitch_deg(accel),
            roll_deg: kinematics::roll_deg(accel) - calib.initial_roll_deg,
            yaw_deg: kinematics::yaw_deg(accel),
            pitch_rate_dps: current.gyro.x,
            roll_rate_dps: current.gyro.y,
            yaw_rate_dps: current.gyro.z,
            drift_m: kinematics::planar_drift_m(
                current.latitude,
                current.longitude,
                calib.initial_latitude,
                calib.initial_longitude,
            ),
            latitude: current.latitude,
            longitude: current.longitude,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Vec3;
    use approx::assert_relative_eq;

    fn raw(seq: u64, alt: f64, accel: Vec3, gyro: Vec3, lat: f64, lon: f64) -> RawSample {
        RawSample {
            sequence_time: seq,
            timestamp: format!("t{seq}"),
            source_time: None,
            temperature_c: 20.0,
            altitude_baro_m: alt,
            altitude_gps_m: alt + 1.0,
            accel,
            gyro,
            mag: Vec3::zeros(),
            latitude: lat,
            longitude: lon,
        }
    }

    #[test]
    fn test_first_sample_is_self_referenced() {
        let first = raw(0, 100.0, Vec3::new(0.3, -0.2, 9.8), Vec3::zeros(), 37.0, -122.0);
        let calib = CalibrationState::from_sample(&first);
        let out = DerivationEngine::default().derive(&first, None, &calib);

        assert_eq!(out.time_index, 0);
        assert_eq!(out.vertical_velocity_mps, 0.0);
        assert_eq!(out.total_acceleration_mps2, 0.0);
        assert_eq!(out.vertical_acceleration_mps2, 0.0);
        assert_eq!(out.roll_deg, 0.0);
        assert_eq!(out.drift_m, 0.0);
    }

    #[test]
    fn test_second_sample_channels() {
        let first = raw(0, 100.0, Vec3::new(0.0, 0.0, 9.8), Vec3::zeros(), 37.0, -122.0);
        let second = raw(
            1,
            102.0,
            Vec3::new(0.0, 0.0, 9.8),
            Vec3::new(1.0, 2.0, 3.0),
            37.0001,
            -122.0001,
        );
        let calib = CalibrationState::from_sample(&first);
        let out = DerivationEngine::default().derive(&second, Some(&first), &calib);

        assert_eq!(out.vertical_velocity_mps, 2.0);
        assert_eq!(out.pitch_rate_dps, 1.0);
        assert_eq!(out.roll_rate_dps, 2.0);
        assert_eq!(out.yaw_rate_dps, 3.0);
        assert!((out.drift_m - 15.72).abs() < 0.01);
        assert_eq!(out.altitude_gps_m, 103.0);
    }

    #[test]
    fn test_relative_accelerations() {
        let first = raw(0, 0.0, Vec3::new(0.0, 0.0, 9.8), Vec3::zeros(), 0.0, 0.0);
        let boost = raw(1, 5.0, Vec3::new(0.0, 3.0, 4.0 + 9.8), Vec3::zeros(), 0.0, 0.0);
        let calib = CalibrationState::from_sample(&first);
        let out = DerivationEngine::default().derive(&boost, Some(&first), &calib);

        assert_relative_eq!(out.vertical_acceleration_mps2, 4.0, epsilon = 1e-12);
        assert_relative_eq!(
            out.total_acceleration_mps2,
            (9.0f64 + 13.8 * 13.8).sqrt() - 9.8,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_zero_accel_does_not_fault() {
        let first = raw(0, 0.0, Vec3::zeros(), Vec3::zeros(), 0.0, 0.0);
        let calib = CalibrationState::from_sample(&first);
        let out = DerivationEngine::default().derive(&first, None, &calib);

        assert_eq!(out.pitch_deg, 0.0);
        assert_eq!(out.roll_deg, 0.0);
        assert_eq!(out.yaw_deg, 0.0);
        assert!(out.total_acceleration_mps2.is_finite());
    }

    #[test]
    fn test_elapsed_time_velocity() {
        let mut first = raw(0, 100.0, Vec3::zeros(), Vec3::zeros(), 0.0, 0.0);
        let mut second = raw(1, 104.0, Vec3::zeros(), Vec3::zeros(), 0.0, 0.0);
        first.source_time = Some(10.0);
        second.source_time = Some(12.0);
        let calib = CalibrationState::from_sample(&first);
        let engine = DerivationEngine::new(VelocityMode::ElapsedTime);

        let out = engine.derive(&second, Some(&first), &calib);
        assert_eq!(out.vertical_velocity_mps, 2.0);

        // Duplicate timestamp gives no usable step
        second.source_time = Some(10.0);
        let out = engine.derive(&second, Some(&first), &calib);
        assert_eq!(out.vertical_velocity_mps, 0.0);
        assert_eq!(VelocityMode::ElapsedTime.step(&second, &first), None);
    }

    #[test]
    fn test_presets() {
        assert_eq!(ChannelPreset::Full.channels().len(), 15);
        assert!(ChannelPreset::Flight.channels().contains(&Channel::Drift));
        assert!(!ChannelPreset::Flight.channels().contains(&Channel::Pitch));
    }
}
