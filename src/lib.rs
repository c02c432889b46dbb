//! Rocket telemetry decode-and-derive engine.
//!
//! Raw comma-separated records come off a [`source::RecordSource`], are
//! parsed into [`types::RawSample`]s, zeroed against the first accepted
//! sample and turned into [`types::DerivedSample`]s by the
//! [`coordinator::StreamCoordinator`], which hands them to a
//! [`sink::TelemetrySink`].

pub mod calibration;
pub mod config;
pub mod coordinator;
pub mod derivation;
pub mod error;
pub mod health_monitor;
pub mod kinematics;
pub mod live_status;
pub mod parser;
pub mod session;
pub mod sink;
pub mod source;
pub mod types;

pub use calibration::{Calibration, CalibrationState};
pub use config::TelemetryConfig;
pub use coordinator::{CoordinatorState, RunSummary, StreamCoordinator};
pub use derivation::{ChannelPreset, DerivationEngine, VelocityMode};
pub use error::{ConfigError, ParseError, SourceError, StreamError, StreamResult};
pub use parser::{SampleParser, WireLayout};
pub use session::{FlightSession, SessionStats};
pub use types::{Channel, DerivedSample, RawSample};
