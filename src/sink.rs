use std::io::{self, Write};

use crossbeam::channel::{Sender, TrySendError};
use serde::Serialize;

use crate::derivation::ChannelPreset;
use crate::error::ParseError;
use crate::health_monitor::StallNotice;
use crate::types::DerivedSample;

/// Consumer of the coordinator's output: derived samples in order, plus
/// liveness and rejection notifications.
pub trait TelemetrySink {
    fn on_sample(&mut self, sample: &DerivedSample);

    fn on_stalled(&mut self, _notice: &StallNotice) {}

    fn on_rejected(&mut self, _error: &ParseError) {}
}

impl<T: TelemetrySink + ?Sized> TelemetrySink for &mut T {
    fn on_sample(&mut self, sample: &DerivedSample) {
        (**self).on_sample(sample)
    }

    fn on_stalled(&mut self, notice: &StallNotice) {
        (**self).on_stalled(notice)
    }

    fn on_rejected(&mut self, error: &ParseError) {
        (**self).on_rejected(error)
    }
}

/// Fan out to two sinks
impl<A: TelemetrySink, B: TelemetrySink> TelemetrySink for (A, B) {
    fn on_sample(&mut self, sample: &DerivedSample) {
        self.0.on_sample(sample);
        self.1.on_sample(sample);
    }

    fn on_stalled(&mut self, notice: &StallNotice) {
        self.0.on_stalled(notice);
        self.1.on_stalled(notice);
    }

    fn on_rejected(&mut self, error: &ParseError) {
        self.0.on_rejected(error);
        self.1.on_rejected(error);
    }
}

/// Append-only in-memory series for post-session export
#[derive(Debug, Default, Clone, Serialize)]
pub struct SampleBuffer {
    samples: Vec<DerivedSample>,
    stalls: Vec<StallNotice>,
    rejected: u64,
}

impl SampleBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn samples(&self) -> &[DerivedSample] {
        &self.samples
    }

    pub fn latest(&self) -> Option<&DerivedSample> {
        self.samples.last()
    }

    pub fn stalls(&self) -> &[StallNotice] {
        &self.stalls
    }

    pub fn rejected(&self) -> u64 {
        self.rejected
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn into_samples(self) -> Vec<DerivedSample> {
        self.samples
    }
}

impl TelemetrySink for SampleBuffer {
    fn on_sample(&mut self, sample: &DerivedSample) {
        self.samples.push(sample.clone());
    }

    fn on_stalled(&mut self, notice: &StallNotice) {
        self.stalls.push(*notice);
    }

    fn on_rejected(&mut self, _error: &ParseError) {
        self.rejected += 1;
    }
}

/// Event handed to a presentation thread
#[derive(Debug, Clone, PartialEq)]
pub enum SinkEvent {
    Sample(DerivedSample),
    Stalled(StallNotice),
    Rejected(String),
}

/// Pushes copies across a bounded channel; the coordinator never blocks on
/// a slow consumer, so a full channel drops the event.
pub struct ChannelSink {
    tx: Sender<SinkEvent>,
    dropped: u64,
    disconnected: bool,
}

impl ChannelSink {
    pub fn new(tx: Sender<SinkEvent>) -> Self {
        Self {
            tx,
            dropped: 0,
            disconnected: false,
        }
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    fn push(&mut self, event: SinkEvent) {
        if self.disconnected {
            return;
        }
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                self.dropped += 1;
                if self.dropped % 100 == 1 {
                    log::warn!("Presentation channel full, {} events dropped", self.dropped);
                }
            }
            Err(TrySendError::Disconnected(_)) => {
                log::warn!("Presentation channel closed; no further events forwarded");
                self.disconnected = true;
            }
        }
    }
}

impl TelemetrySink for ChannelSink {
    fn on_sample(&mut self, sample: &DerivedSample) {
        self.push(SinkEvent::Sample(sample.clone()));
    }

    fn on_stalled(&mut self, notice: &StallNotice) {
        self.push(SinkEvent::Stalled(*notice));
    }

    fn on_rejected(&mut self, error: &ParseError) {
        self.push(SinkEvent::Rejected(error.to_string()));
    }
}

/// Write a derived series as CSV: `time_index` then the preset's channels
pub fn export_csv<W: Write>(
    samples: &[DerivedSample],
    preset: ChannelPreset,
    mut writer: W,
) -> io::Result<()> {
    let channels = preset.channels();

    let header: Vec<&str> = std::iter::once("time_index")
        .chain(channels.iter().map(|c| c.label()))
        .collect();
    writeln!(writer, "{}", header.join(","))?;

    for sample in samples {
        write!(writer, "{}", sample.time_index)?;
        for &channel in channels {
            write!(writer, ",{}", sample.channel(channel))?;
        }
        writeln!(writer)?;
    }
    writer.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam::channel;
    use tokio::time::Duration;

    fn derived(time_index: u64) -> DerivedSample {
        DerivedSample {
            time_index,
            temperature_c: 20.0,
            altitude_baro_m: 100.0 + time_index as f64,
            altitude_gps_m: 101.0,
            vertical_velocity_mps: 1.0,
            total_acceleration_mps2: 0.0,
            vertical_acceleration_mps2: 0.0,
            pitch_deg: 0.0,
            roll_deg: 0.0,
            yaw_deg: 90.0,
            pitch_rate_dps: 0.0,
            roll_rate_dps: 0.0,
            yaw_rate_dps: 0.0,
            drift_m: 2.5,
            latitude: 37.0,
            longitude: -122.0,
        }
    }

    fn notice() -> StallNotice {
        StallNotice {
            consecutive: 1,
            silent_for: Duration::from_secs(2),
            next_index: 1,
        }
    }

    #[test]
    fn test_buffer_records_everything() {
        let mut buffer = SampleBuffer::new();
        buffer.on_sample(&derived(0));
        buffer.on_stalled(&notice());
        buffer.on_rejected(&ParseError::malformed("bad"));
        buffer.on_sample(&derived(1));

        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.latest().unwrap().time_index, 1);
        assert_eq!(buffer.stalls().len(), 1);
        assert_eq!(buffer.rejected(), 1);
    }

    #[test]
    fn test_channel_sink_handoff_and_overflow() {
        let (tx, rx) = channel::bounded(1);
        let mut sink = ChannelSink::new(tx);

        sink.on_sample(&derived(0));
        sink.on_stalled(&notice());
        assert_eq!(sink.dropped(), 1);
        assert_eq!(rx.try_recv().unwrap(), SinkEvent::Sample(derived(0)));

        drop(rx);
        sink.on_sample(&derived(1));
        sink.on_sample(&derived(2));
        assert_eq!(sink.dropped(), 1);
    }

    #[test]
    fn test_fan_out() {
        let mut a = SampleBuffer::new();
        let mut b = SampleBuffer::new();
        {
            let mut both = (&mut a, &mut b);
            both.on_sample(&derived(0));
        }
        assert_eq!(a.len(), 1);
        assert_eq!(b.len(), 1);
    }

    #[test]
    fn test_export_csv_flight_preset() {
        let mut out = Vec::new();
        export_csv(&[derived(0), derived(1)], ChannelPreset::Flight, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(
            lines[0],
            "time_index,altitude_baro_m,altitude_gps_m,vertical_velocity_mps,total_acceleration_mps2,vertical_acceleration_mps2,drift_m"
        );
        assert_eq!(lines[2], "1,101,101,1,0,0,2.5");
        assert_eq!(lines.len(), 3);
    }
}
