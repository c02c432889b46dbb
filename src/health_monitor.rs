use serde::Serialize;
use tokio::time::{Duration, Instant};

/// Delivered once per receive window that closed without a record
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct StallNotice {
    /// Stalls since the last record arrived, starting at 1
    pub consecutive: u32,
    /// Time since the last record arrived, accepted or not (or since the
    /// run started)
    pub silent_for: Duration,
    /// Index the next accepted sample will get
    pub next_index: u64,
}

/// Tracks liveness of the sample source
#[derive(Clone, Debug)]
pub struct LinkHealth {
    pub name: String,
    last_record: Instant,
    consecutive_stalls: u32,
    total_stalls: u64,
    max_consecutive_stalls: Option<u32>,
}

impl LinkHealth {
    pub fn new(name: &str, max_consecutive_stalls: Option<u32>) -> Self {
        LinkHealth {
            name: name.to_string(),
            last_record: Instant::now(),
            consecutive_stalls: 0,
            total_stalls: 0,
            max_consecutive_stalls,
        }
    }

    /// A record arrived, whether or not it parses
    pub fn update(&mut self) {
        self.last_record = Instant::now();
        self.consecutive_stalls = 0;
    }

    /// A receive window elapsed with nothing in it
    pub fn record_stall(&mut self, next_index: u64) -> StallNotice {
        self.consecutive_stalls = self.consecutive_stalls.saturating_add(1);
        self.total_stalls += 1;
        StallNotice {
            consecutive: self.consecutive_stalls,
            silent_for: self.time_since_last_record(),
            next_index,
        }
    }

    pub fn time_since_last_record(&self) -> Duration {
        self.last_record.elapsed()
    }

    pub fn consecutive_stalls(&self) -> u32 {
        self.consecutive_stalls
    }

    pub fn total_stalls(&self) -> u64 {
        self.total_stalls
    }

    /// True once the configured stall budget is used up
    pub fn is_dead(&self) -> bool {
        self.max_consecutive_stalls
            .map(|max| self.consecutive_stalls >= max)
            .unwrap_or(false)
    }

    /// Format health status for logging
    pub fn format_status(&self) -> String {
        if self.consecutive_stalls == 0 {
            format!("Health: {} ✓", self.name)
        } else {
            format!(
                "Health: {} ⚠ (silent {:.1}s, {} stalls)",
                self.name,
                self.time_since_last_record().as_secs_f64(),
                self.consecutive_stalls
            )
        }
    }
}
