use serde::Serialize;
use tokio::sync::watch;
use tokio::time::Duration;

use crate::config::TelemetryConfig;
use crate::error::{SourceError, StreamError, StreamResult};
use crate::health_monitor::LinkHealth;
use crate::session::{FlightSession, SessionMetadata};
use crate::sink::TelemetrySink;
use crate::source::RecordSource;

/// Coordinator lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CoordinatorState {
    /// No run in progress
    Idle,
    /// Consuming and deriving
    Active,
    /// Terminal until the session is restarted
    Stopped,
}

/// What a run that ended on request looked like
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub session: SessionMetadata,
    pub total_stalls: u64,
}

enum Step {
    Stop,
    Received(Result<Vec<u8>, SourceError>),
    TimedOut,
}

/// Drives receive → parse → derive → emit for one session.
///
/// Single task: the session state (baseline, previous slot, index) is only
/// touched here, and consumers only ever see copies through the sink.
pub struct StreamCoordinator {
    receive_timeout: Duration,
    session: FlightSession,
    health: LinkHealth,
    max_consecutive_stalls: Option<u32>,
    state: CoordinatorState,
}

impl StreamCoordinator {
    pub fn new(config: &TelemetryConfig) -> Self {
        Self {
            receive_timeout: config.receive_timeout(),
            session: FlightSession::new(config.parser(), config.engine()),
            health: LinkHealth::new("link", config.max_consecutive_stalls),
            max_consecutive_stalls: config.max_consecutive_stalls,
            state: CoordinatorState::Idle,
        }
    }

    pub fn state(&self) -> CoordinatorState {
        self.state
    }

    pub fn session(&self) -> &FlightSession {
        &self.session
    }

    pub fn health(&self) -> &LinkHealth {
        &self.health
    }

    /// Begin a new session; the only way out of `Stopped`
    pub fn restart_session(&mut self) {
        self.session.restart();
        self.health = LinkHealth::new("link", self.max_consecutive_stalls);
        self.state = CoordinatorState::Idle;
    }

    /// Run until `stop` flips to `true` (returns `Ok`) or the source fails
    /// or closes (returns the error). Stalls and malformed records are
    /// reported to `sink` and never end the run.
    pub async fn run<S, K>(
        &mut self,
        source: &mut S,
        sink: &mut K,
        mut stop: watch::Receiver<bool>,
    ) -> StreamResult<RunSummary>
    where
        S: RecordSource,
        K: TelemetrySink,
    {
        if self.state == CoordinatorState::Stopped {
            return Err(StreamError::AlreadyStopped);
        }
        self.state = CoordinatorState::Active;
        self.health.update();
        log::info!(
            "Session {} reading from {} (timeout {:.1}s)",
            self.session.session_id(),
            source.describe(),
            self.receive_timeout.as_secs_f64()
        );

        loop {
            if *stop.borrow_and_update() {
                return Ok(self.finish());
            }

            let step = tokio::select! {
                biased;
                _ = stop_requested(&mut stop) => Step::Stop,
                received = tokio::time::timeout(self.receive_timeout, source.next_record()) => {
                    match received {
                        Ok(result) => Step::Received(result),
                        Err(_) => Step::TimedOut,
                    }
                }
            };

            match step {
                Step::Stop => return Ok(self.finish()),
                Step::TimedOut => self.handle_stall(sink)?,
                Step::Received(Err(e)) if !e.is_fatal() => self.handle_stall(sink)?,
                Step::Received(Err(e)) => {
                    log::error!("Source {} failed: {}", source.describe(), e);
                    self.state = CoordinatorState::Stopped;
                    return Err(StreamError::Source(e));
                }
                Step::Received(Ok(record)) => self.handle_record(&record, sink),
            }
        }
    }

    fn handle_record<K: TelemetrySink>(&mut self, record: &[u8], sink: &mut K) {
        // The link is alive even when what it delivers gets rejected
        self.health.update();
        match self.session.ingest(record) {
            Ok(derived) => {
                log::debug!(
                    "#{} alt={:.2}m vv={:.2} drift={:.1}m",
                    derived.time_index,
                    derived.altitude_baro_m,
                    derived.vertical_velocity_mps,
                    derived.drift_m
                );
                sink.on_sample(&derived);
            }
            Err(e) => {
                let stats = self.session.stats();
                log::warn!(
                    "Dropped record ({}); {} accepted, {} rejected",
                    e,
                    stats.accepted,
                    stats.rejected
                );
                sink.on_rejected(&e);
            }
        }
    }

    fn handle_stall<K: TelemetrySink>(&mut self, sink: &mut K) -> StreamResult<()> {
        self.session.record_stall();
        let notice = self.health.record_stall(self.session.next_index());
        log::warn!(
            "No data received (timeout); silent {:.1}s, {} consecutive",
            notice.silent_for.as_secs_f64(),
            notice.consecutive
        );
        log::debug!("{}", self.health.format_status());
        sink.on_stalled(&notice);

        if self.health.is_dead() {
            self.state = CoordinatorState::Stopped;
            return Err(StreamError::SourceStalled {
                stalls: notice.consecutive,
            });
        }
        Ok(())
    }

    fn finish(&mut self) -> RunSummary {
        self.state = CoordinatorState::Stopped;
        let summary = RunSummary {
            session: self.session.metadata(),
            total_stalls: self.health.total_stalls(),
        };
        log::info!(
            "Stop requested; session {} ended with {} samples",
            summary.session.session_id,
            summary.session.stats.accepted
        );
        summary
    }
}

/// Resolves once the stop flag is set. A dropped sender can never stop us.
async fn stop_requested(stop: &mut watch::Receiver<bool>) {
    loop {
        if *stop.borrow_and_update() {
            return;
        }
        if stop.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
