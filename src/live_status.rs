use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::time::{Duration, Instant};

use crate::derivation::ChannelPreset;
use crate::error::ParseError;
use crate::health_monitor::StallNotice;
use crate::sink::TelemetrySink;
use crate::types::DerivedSample;

/// Snapshot of a running session for dashboards and operators
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct LiveStatus {
    pub updated_at: String,
    pub session_id: String,
    pub accepted_samples: u64,
    pub rejected_records: u64,
    pub stalls: u64,
    pub consecutive_stalls: u32,
    pub calibration_complete: bool,
    pub link_healthy: bool,
    pub silence_duration_secs: f64,
    pub uptime_seconds: u64,
    pub last_time_index: Option<u64>,
    pub latest: Option<DerivedSample>,
    // Preset view of `latest`, keyed by channel label
    pub channels: BTreeMap<String, f64>,
}

impl LiveStatus {
    pub fn new(session_id: &str) -> Self {
        Self {
            updated_at: Utc::now().to_rfc3339(),
            session_id: session_id.to_string(),
            accepted_samples: 0,
            rejected_records: 0,
            stalls: 0,
            consecutive_stalls: 0,
            calibration_complete: false,
            link_healthy: true,
            silence_duration_secs: 0.0,
            uptime_seconds: 0,
            last_time_index: None,
            latest: None,
            channels: BTreeMap::new(),
        }
    }

    pub fn record_sample(&mut self, sample: &DerivedSample, preset: ChannelPreset) {
        self.accepted_samples += 1;
        self.calibration_complete = true;
        self.link_healthy = true;
        self.consecutive_stalls = 0;
        self.silence_duration_secs = 0.0;
        self.last_time_index = Some(sample.time_index);
        self.channels = preset
            .channels()
            .iter()
            .map(|&c| (c.label().to_string(), sample.channel(c)))
            .collect();
        self.latest = Some(sample.clone());
    }

    pub fn record_stall(&mut self, notice: &StallNotice) {
        self.stalls += 1;
        self.consecutive_stalls = notice.consecutive;
        self.link_healthy = false;
        self.silence_duration_secs = notice.silent_for.as_secs_f64();
    }

    /// A rejected record still proves the link is up
    pub fn record_rejected(&mut self) {
        self.rejected_records += 1;
        self.link_healthy = true;
        self.consecutive_stalls = 0;
        self.silence_duration_secs = 0.0;
    }

    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

/// Sink that keeps a [`LiveStatus`] current and rewrites it to disk at most
/// once per `interval`.
pub struct LiveStatusWriter {
    status: LiveStatus,
    path: PathBuf,
    preset: ChannelPreset,
    interval: Duration,
    started: Instant,
    last_write: Option<Instant>,
}

impl LiveStatusWriter {
    pub fn new(session_id: &str, path: PathBuf, preset: ChannelPreset, interval: Duration) -> Self {
        Self {
            status: LiveStatus::new(session_id),
            path,
            preset,
            interval,
            started: Instant::now(),
            last_write: None,
        }
    }

    pub fn status(&self) -> &LiveStatus {
        &self.status
    }

    /// Write now regardless of the interval
    pub fn flush_to(&mut self, path: &Path) -> std::io::Result<()> {
        self.status.updated_at = Utc::now().to_rfc3339();
        self.status.uptime_seconds = self.started.elapsed().as_secs();
        self.status.save(path)?;
        self.last_write = Some(Instant::now());
        Ok(())
    }

    fn maybe_write(&mut self) {
        let due = self
            .last_write
            .map(|t| t.elapsed() >= self.interval)
            .unwrap_or(true);
        if !due {
            return;
        }
        let path = self.path.clone();
        if let Err(e) = self.flush_to(&path) {
            log::warn!("Failed to write live status to {}: {}", path.display(), e);
        }
    }
}

impl TelemetrySink for LiveStatusWriter {
    fn on_sample(&mut self, sample: &DerivedSample) {
        self.status.record_sample(sample, self.preset);
        self.maybe_write();
    }

    fn on_stalled(&mut self, notice: &StallNotice) {
        self.status.record_stall(notice);
        self.maybe_write();
    }

    fn on_rejected(&mut self, _error: &ParseError) {
        self.status.record_rejected();
        self.maybe_write();
    }
}
