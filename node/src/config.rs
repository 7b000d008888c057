use crate::errors::ConfigError;
use horizon_kernel::config::RECONNECT_BACKOFF_MILLIS;
use horizon_kernel::{Application, Artifact, BoundedContext};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use uuid::Uuid;

pub const ENV_APPLICATION: &str = "HORIZON_APPLICATION";
pub const ENV_BOUNDED_CONTEXT: &str = "HORIZON_BOUNDED_CONTEXT";
pub const ENV_BIND_ADDR: &str = "HORIZON_BIND_ADDR";
pub const ENV_SEQUENCE_PATH: &str = "HORIZON_SEQUENCE_PATH";
pub const ENV_EVENT_HORIZONS: &str = "HORIZON_EVENT_HORIZONS";
pub const ENV_BACKOFF_MS: &str = "HORIZON_BACKOFF_MS";

/// A remote event horizon this node opens a tunnel to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventHorizonConfiguration {
    pub application: Application,
    pub bounded_context: BoundedContext,
    pub url: String,
    pub events: Vec<Artifact>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventHorizonsConfiguration(pub Vec<EventHorizonConfiguration>);

impl EventHorizonsConfiguration {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub application: Application,
    pub bounded_context: BoundedContext,
    pub bind_addr: SocketAddr,
    /// Directory holding the sequence counters. Required to start a node.
    pub sequence_path: Option<PathBuf>,
    pub event_horizons: EventHorizonsConfiguration,
    pub reconnect_backoff: Duration,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            application: Application::default(),
            bounded_context: BoundedContext::default(),
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 50052)),
            sequence_path: None,
            event_horizons: EventHorizonsConfiguration::default(),
            reconnect_backoff: Duration::from_millis(RECONNECT_BACKOFF_MILLIS),
        }
    }
}

impl NodeConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build a config from any variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let application = Application::from(parse_uuid(&lookup, ENV_APPLICATION)?);
        let bounded_context = BoundedContext::from(parse_uuid(&lookup, ENV_BOUNDED_CONTEXT)?);

        let bind_addr = match lookup(ENV_BIND_ADDR) {
            Some(raw) => raw.parse::<SocketAddr>().map_err(|e| ConfigError::Invalid {
                var: ENV_BIND_ADDR,
                reason: e.to_string(),
            })?,
            None => defaults.bind_addr,
        };

        let sequence_path = lookup(ENV_SEQUENCE_PATH)
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .ok_or(ConfigError::Missing(ENV_SEQUENCE_PATH))?;

        let event_horizons = match lookup(ENV_EVENT_HORIZONS) {
            Some(path) => EventHorizonsConfiguration::load(Path::new(&path))?,
            None => EventHorizonsConfiguration::default(),
        };

        let reconnect_backoff = match lookup(ENV_BACKOFF_MS) {
            Some(raw) => raw
                .parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|e| ConfigError::Invalid {
                    var: ENV_BACKOFF_MS,
                    reason: e.to_string(),
                })?,
            None => defaults.reconnect_backoff,
        };

        Ok(Self {
            application,
            bounded_context,
            bind_addr,
            sequence_path: Some(sequence_path),
            event_horizons,
            reconnect_backoff,
        })
    }
}

fn parse_uuid<F>(lookup: &F, var: &'static str) -> Result<Uuid, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(var).ok_or(ConfigError::Missing(var))?;
    Uuid::parse_str(raw.trim()).map_err(|e| ConfigError::Invalid {
        var,
        reason: e.to_string(),
    })
}
