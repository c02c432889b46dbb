use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::calibration::Calibration;
use crate::derivation::DerivationEngine;
use crate::error::ParseError;
use crate::parser::SampleParser;
use crate::types::{DerivedSample, RawSample};

/// Per-session counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    pub accepted: u64,
    pub rejected: u64,
    pub stalls: u64,
    /// Samples whose timestamp did not advance (elapsed-time velocity only)
    pub non_monotonic: u64,
}

/// Session metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMetadata {
    pub session_id: String,
    pub start_time: String,
    pub calibration: Calibration,
    pub stats: SessionStats,
}

/// One flight session: the calibration baseline, the single previous-sample
/// slot and the index counter. Nothing here is shared; the coordinator owns it.
pub struct FlightSession {
    session_id: String,
    start_time: String,
    parser: SampleParser,
    engine: DerivationEngine,
    calibration: Calibration,
    previous: Option<RawSample>,
    next_index: u64,
    stats: SessionStats,
}

impl FlightSession {
    pub fn new(parser: SampleParser, engine: DerivationEngine) -> Self {
        Self {
            session_id: format!("session_{}", Utc::now().timestamp_millis()),
            start_time: Utc::now().to_rfc3339(),
            parser,
            engine,
            calibration: Calibration::Uninitialized,
            previous: None,
            next_index: 0,
            stats: SessionStats::default(),
        }
    }

    /// Parse, calibrate on first success, derive, and advance.
    ///
    /// A rejected record leaves every piece of state untouched except the
    /// rejection counter.
    pub fn ingest(&mut self, record: &[u8]) -> Result<DerivedSample, ParseError> {
        let sample = match self.parser.parse(record, self.next_index) {
            Ok(sample) => sample,
            Err(e) => {
                self.stats.rejected += 1;
                return Err(e);
            }
        };

        let baseline = self.calibration.observe_first(&sample);

        if let Some(prev) = self.previous.as_ref() {
            if self.engine.velocity_mode().step(&sample, prev).is_none() {
                self.stats.non_monotonic += 1;
                log::warn!(
                    "Sample {} timestamp {:?} does not advance past {:?}; vertical velocity forced to 0",
                    sample.sequence_time,
                    sample.timestamp,
                    prev.timestamp
                );
            }
        }

        let derived = self
            .engine
            .derive(&sample, self.previous.as_ref(), &baseline);
        log::trace!("Derived sample {:?}", derived);

        self.previous = Some(sample);
        self.next_index += 1;
        self.stats.accepted += 1;
        Ok(derived)
    }

    pub fn record_stall(&mut self) {
        self.stats.stalls += 1;
    }

    /// Start a new session: drop the baseline, the previous slot, the index
    /// and the counters.
    pub fn restart(&mut self) {
        log::info!(
            "Restarting session {} after {} samples",
            self.session_id,
            self.stats.accepted
        );
        self.session_id = format!("session_{}", Utc::now().timestamp_millis());
        self.start_time = Utc::now().to_rfc3339();
        self.calibration.reset();
        self.previous = None;
        self.next_index = 0;
        self.stats = SessionStats::default();
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    pub fn next_index(&self) -> u64 {
        self.next_index
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Get metadata snapshot
    pub fn metadata(&self) -> SessionMetadata {
        SessionMetadata {
            session_id: self.session_id.clone(),
            start_time: self.start_time.clone(),
            calibration: self.calibration.clone(),
            stats: self.stats,
        }
    }
}
