pub mod linalg;

pub use linalg::*;

use serde::{Deserialize, Serialize};

/// One telemetry reading as received, before derivation.
///
/// Built only by the parser; every numeric field is finite.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RawSample {
    /// Index assigned by the coordinator, not read from the wire
    pub sequence_time: u64,
    /// Opaque wire timestamp
    pub timestamp: String,
    /// Wire timestamp in seconds, when it could be interpreted as a clock
    pub source_time: Option<f64>,
    pub temperature_c: f64,
    pub altitude_baro_m: f64,
    pub altitude_gps_m: f64,
    pub accel: Vec3,
    pub gyro: Vec3,
    /// Carried for logging only; nothing is derived from it
    pub mag: Vec3,
    pub latitude: f64,
    pub longitude: f64,
}

/// One computed output record, one per accepted raw sample.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DerivedSample {
    pub time_index: u64,
    pub temperature_c: f64,
    pub altitude_baro_m: f64,
    pub altitude_gps_m: f64,
    pub vertical_velocity_mps: f64,
    pub total_acceleration_mps2: f64,
    pub vertical_acceleration_mps2: f64,
    pub pitch_deg: f64,
    pub roll_deg: f64,
    pub yaw_deg: f64,
    pub pitch_rate_dps: f64,
    pub roll_rate_dps: f64,
    pub yaw_rate_dps: f64,
    pub drift_m: f64,
    pub latitude: f64,
    pub longitude: f64,
}

/// Named output channel of a [`DerivedSample`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Temperature,
    AltitudeBaro,
    AltitudeGps,
    VerticalVelocity,
    TotalAcceleration,
    VerticalAcceleration,
    Pitch,
    Roll,
    Yaw,
    PitchRate,
    RollRate,
    YawRate,
    Drift,
    Latitude,
    Longitude,
}

impl Channel {
    /// Column header used by exporters
    pub fn label(self) -> &'static str {
        match self {
            Channel::Temperature => "temperature_c",
            Channel::AltitudeBaro => "altitude_baro_m",
            Channel::AltitudeGps => "altitude_gps_m",
            Channel::VerticalVelocity => "vertical_velocity_mps",
            Channel::TotalAcceleration => "total_acceleration_mps2",
            Channel::VerticalAcceleration => "vertical_acceleration_mps2",
            Channel::Pitch => "pitch_deg",
            Channel::Roll => "roll_deg",
            Channel::Yaw => "yaw_deg",
            Channel::PitchRate => "pitch_rate_dps",
            Channel::RollRate => "roll_rate_dps",
            Channel::YawRate => "yaw_rate_dps",
            Channel::Drift => "drift_m",
            Channel::Latitude => "latitude",
            Channel::Longitude => "longitude",
        }
    }
}

impl DerivedSample {
    pub fn channel(&self, channel: Channel) -> f64 {
        match channel {
            Channel::Temperature => self.temperature_c,
            Channel::AltitudeBaro => self.altitude_baro_m,
            Channel::AltitudeGps => self.altitude_gps_m,
            Channel::VerticalVelocity => self.vertical_velocity_mps,
            Channel::TotalAcceleration => self.total_acceleration_mps2,
            Channel::VerticalAcceleration => self.vertical_acceleration_mps2,
            Channel::Pitch => self.pitch_deg,
            Channel::Roll => self.roll_deg,
            Channel::Yaw => self.yaw_deg,
            Channel::PitchRate => self.pitch_rate_dps,
            Channel::RollRate => self.roll_rate_dps,
            Channel::YawRate => self.yaw_rate_dps,
            Channel::Drift => self.drift_m,
            Channel::Latitude => self.latitude,
            Channel::Longitude => self.longitude,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_lookup_matches_fields() {
        let sample = DerivedSample {
            time_index: 3,
            temperature_c: 20.0,
            altitude_baro_m: 100.0,
            altitude_gps_m: 101.0,
            vertical_velocity_mps: 2.0,
            total_acceleration_mps2: 0.5,
            vertical_acceleration_mps2: 0.25,
            pitch_deg: 1.0,
            roll_deg: 2.0,
            yaw_deg: 3.0,
            pitch_rate_dps: 4.0,
            roll_rate_dps: 5.0,
            yaw_rate_dps: 6.0,
            drift_m: 7.0,
            latitude: 37.0,
            longitude: -122.0,
        };

        assert_eq!(sample.channel(Channel::VerticalVelocity), 2.0);
        assert_eq!(sample.channel(Channel::YawRate), 6.0);
        assert_eq!(sample.channel(Channel::Longitude), -122.0);
        assert_eq!(Channel::Drift.label(), "drift_m");
    }
}
