use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::ParseError;
use crate::types::{is_finite3, RawSample, Vec3};

/// Column positions of one wire/record layout
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireLayout {
    pub name: String,
    pub timestamp: usize,
    pub temperature: usize,
    pub altitude_baro: usize,
    pub altitude_gps: usize,
    /// First of three consecutive accel columns
    pub accel: usize,
    pub gyro: usize,
    pub mag: usize,
    pub latitude: usize,
    pub longitude: usize,
    /// Columns that must be numeric although nothing is derived from them
    pub extra_numeric: Vec<usize>,
}

impl WireLayout {
    /// Live UDP payload:
    /// `timestamp, temp, baro_alt, gps_alt, ax, ay, az, gx, gy, gz, mx, my, mz, lat, lon`
    pub fn udp() -> Self {
        Self {
            name: "udp".to_string(),
            timestamp: 0,
            temperature: 1,
            altitude_baro: 2,
            altitude_gps: 3,
            accel: 4,
            gyro: 7,
            mag: 10,
            latitude: 13,
            longitude: 14,
            extra_numeric: Vec::new(),
        }
    }

    /// On-board recorder row:
    /// `timestamp, pressure, temp, alt, ax, ay, az, gx, gy, gz, mx, my, mz, lat, lon, gps_alt`
    pub fn recorder_csv() -> Self {
        Self {
            name: "recorder_csv".to_string(),
            timestamp: 0,
            temperature: 2,
            altitude_baro: 3,
            altitude_gps: 15,
            accel: 4,
            gyro: 7,
            mag: 10,
            latitude: 13,
            longitude: 14,
            extra_numeric: vec![1],
        }
    }

    /// Look up a preset by name (`udp` or `recorder_csv`)
    pub fn by_name(name: &str) -> Option<Self> {
        match name {
            "udp" => Some(Self::udp()),
            "recorder_csv" | "csv" => Some(Self::recorder_csv()),
            _ => None,
        }
    }

    /// Smallest field count this layout can be read from
    pub fn required_fields(&self) -> usize {
        let triples = [self.accel, self.gyro, self.mag].map(|start| start + 2);
        let singles = [
            self.timestamp,
            self.temperature,
            self.altitude_baro,
            self.altitude_gps,
            self.latitude,
            self.longitude,
        ];
        triples
            .into_iter()
            .chain(singles)
            .chain(self.extra_numeric.iter().copied())
            .max()
            .unwrap_or(0)
            + 1
    }
}

/// Turns one raw record into a [`RawSample`] or rejects it whole
#[derive(Clone, Debug)]
pub struct SampleParser {
    layout: WireLayout,
    min_fields: usize,
}

impl SampleParser {
    pub fn new(layout: WireLayout, min_fields: usize) -> Self {
        // Never accept fewer fields than the layout indexes into
        let min_fields = min_fields.max(layout.required_fields());
        Self { layout, min_fields }
    }

    pub fn layout(&self) -> &WireLayout {
        &self.layout
    }

    pub fn min_fields(&self) -> usize {
        self.min_fields
    }

    /// Parse one record. `sequence_time` is stamped onto the sample unchanged.
    pub fn parse(&self, record: &[u8], sequence_time: u64) -> Result<RawSample, ParseError> {
        let text = std::str::from_utf8(record)
            .map_err(|e| ParseError::malformed(format!("invalid UTF-8: {e}")))?;
        let fields: Vec<&str> = text.trim().split(',').map(str::trim).collect();

        if fields.len() < self.min_fields {
            return Err(ParseError::malformed(format!(
                "expected at least {} fields, got {}",
                self.min_fields,
                fields.len()
            )));
        }

        let layout = &self.layout;
        for &idx in &layout.extra_numeric {
            number(&fields, idx)?;
        }

        let accel = triple(&fields, layout.accel)?;
        let gyro = triple(&fields, layout.gyro)?;
        let mag = triple(&fields, layout.mag)?;
        debug_assert!(is_finite3(&accel) && is_finite3(&gyro) && is_finite3(&mag));

        let timestamp = fields[layout.timestamp].to_string();
        let source_time = parse_source_time(&timestamp);

        Ok(RawSample {
            sequence_time,
            source_time,
            timestamp,
            temperature_c: number(&fields, layout.temperature)?,
            altitude_baro_m: number(&fields, layout.altitude_baro)?,
            altitude_gps_m: number(&fields, layout.altitude_gps)?,
            accel,
            gyro,
            mag,
            latitude: number(&fields, layout.latitude)?,
            longitude: number(&fields, layout.longitude)?,
        })
    }
}

fn number(fields: &[&str], idx: usize) -> Result<f64, ParseError> {
    let raw = fields
        .get(idx)
        .ok_or_else(|| ParseError::malformed(format!("missing field {idx}")))?;
    let value: f64 = raw
        .parse()
        .map_err(|_| ParseError::malformed(format!("field {idx} is not numeric: {raw:?}")))?;
    if !value.is_finite() {
        return Err(ParseError::malformed(format!(
            "field {idx} is not finite: {raw:?}"
        )));
    }
    Ok(value)
}

fn triple(fields: &[&str], start: usize) -> Result<Vec3, ParseError> {
    Ok(Vec3::new(
        number(fields, start)?,
        number(fields, start + 1)?,
        number(fields, start + 2)?,
    ))
}

/// Interpret a wire timestamp as seconds: plain float seconds, or a
/// `%Y-%m-%d %H:%M:%S[.f]` wall-clock stamp as written by the sender.
pub fn parse_source_time(raw: &str) -> Option<f64> {
    if let Ok(secs) = raw.parse::<f64>() {
        return secs.is_finite().then_some(secs);
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f")
        .ok()
        .map(|dt| dt.and_utc().timestamp_micros() as f64 / 1_000_000.0)
}
