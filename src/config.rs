use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::time::Duration;

use crate::derivation::{ChannelPreset, DerivationEngine, VelocityMode};
use crate::error::ConfigError;
use crate::parser::{SampleParser, WireLayout};

/// Default receive window
pub const DEFAULT_RECEIVE_TIMEOUT: Duration = Duration::from_secs(2);
/// Fields in the live UDP layout
pub const DEFAULT_MIN_FIELDS: usize = 15;

/// Engine configuration; every field has a default so partial JSON files work
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Seconds to wait for one record before reporting a stall
    pub receive_timeout_secs: f64,
    pub min_fields: usize,
    pub layout: WireLayout,
    pub velocity_mode: VelocityMode,
    pub preset: ChannelPreset,
    /// Give up after this many silent windows in a row (`None` = never)
    pub max_consecutive_stalls: Option<u32>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            receive_timeout_secs: DEFAULT_RECEIVE_TIMEOUT.as_secs_f64(),
            min_fields: DEFAULT_MIN_FIELDS,
            layout: WireLayout::udp(),
            velocity_mode: VelocityMode::UnitInterval,
            preset: ChannelPreset::Full,
            max_consecutive_stalls: None,
        }
    }
}

impl TelemetryConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let representable = Duration::try_from_secs_f64(self.receive_timeout_secs).is_ok();
        if !representable || self.receive_timeout_secs <= 0.0 {
            return Err(ConfigError::InvalidParameters(format!(
                "receive_timeout_secs must be a positive number of seconds, got {}",
                self.receive_timeout_secs
            )));
        }
        let required = self.layout.required_fields();
        if self.min_fields < required {
            return Err(ConfigError::InvalidParameters(format!(
                "min_fields {} is below the {} fields layout '{}' reads",
                self.min_fields, required, self.layout.name
            )));
        }
        if self.max_consecutive_stalls == Some(0) {
            return Err(ConfigError::InvalidParameters(
                "max_consecutive_stalls must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Receive window; a config that never went through `validate` falls
    /// back to the default instead of panicking.
    pub fn receive_timeout(&self) -> Duration {
        match Duration::try_from_secs_f64(self.receive_timeout_secs) {
            Ok(timeout) if !timeout.is_zero() => timeout,
            _ => {
                log::warn!(
                    "Unusable receive timeout {}s, using {:?}",
                    self.receive_timeout_secs,
                    DEFAULT_RECEIVE_TIMEOUT
                );
                DEFAULT_RECEIVE_TIMEOUT
            }
        }
    }

    pub fn parser(&self) -> SampleParser {
        SampleParser::new(self.layout.clone(), self.min_fields)
    }

    pub fn engine(&self) -> DerivationEngine {
        DerivationEngine::new(self.velocity_mode)
    }
}

/// Command-line overrides shared by the binaries; anything left unset keeps
/// the value from `--config` (or the default).
#[derive(clap::Args, Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// JSON config file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Seconds to wait for a record before reporting a stall
    #[arg(long)]
    pub timeout_secs: Option<f64>,

    /// Minimum fields per record
    #[arg(long)]
    pub min_fields: Option<usize>,

    /// Record layout (udp, recorder_csv)
    #[arg(long)]
    pub layout: Option<String>,

    /// Vertical velocity mode
    #[arg(long, value_enum)]
    pub velocity: Option<VelocityMode>,

    /// Channels to render
    #[arg(long, value_enum)]
    pub preset: Option<ChannelPreset>,

    /// Stop after this many silent windows in a row
    #[arg(long)]
    pub max_stalls: Option<u32>,
}

impl ConfigOverrides {
    /// Load the base config and apply overrides on top, then validate
    pub fn resolve(&self) -> Result<TelemetryConfig, ConfigError> {
        let mut config = match self.config.as_deref() {
            Some(path) => TelemetryConfig::load(path)?,
            None => TelemetryConfig::default(),
        };

        if let Some(name) = self.layout.as_deref() {
            config.layout = WireLayout::by_name(name).ok_or_else(|| {
                ConfigError::InvalidParameters(format!("unknown layout '{name}'"))
            })?;
            // Follow the layout unless a count was asked for explicitly
            config.min_fields = config.layout.required_fields();
        }
        if let Some(secs) = self.timeout_secs {
            config.receive_timeout_secs = secs;
        }
        if let Some(n) = self.min_fields {
            config.min_fields = n;
        }
        if let Some(mode) = self.velocity {
            config.velocity_mode = mode;
        }
        if let Some(preset) = self.preset {
            config.preset = preset;
        }
        if self.max_stalls.is_some() {
            config.max_consecutive_stalls = self.max_stalls;
        }

        config.validate()?;
        Ok(config)
    }
}
