use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

/// Root configuration for the workspace lifecycle coordinator.
///
/// All fields use sensible defaults if not specified, so an empty JSON
/// object is a valid configuration.
///
/// # Examples
///
/// ```
/// use docsync_lifecycle::config::LifecycleConfig;
///
/// let json = r#"{
///     "readiness": {
///         "evict_failed": true,
///         "ready_timeout_ms": 5000
///     }
/// }"#;
///
/// let config = LifecycleConfig::from_json(json).unwrap();
/// assert!(config.readiness.evict_failed);
/// assert_eq!(config.activation.prune_threshold, 256);
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
pub struct LifecycleConfig {
    #[serde(default)]
    pub readiness: ReadinessConfig,
    #[serde(default)]
    pub activation: ActivationConfig,
}

impl LifecycleConfig {
    /// Parses a configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(ConfigError::Parse)
    }
}

/// Error returned when a configuration document cannot be parsed.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid lifecycle configuration: {0}")]
    Parse(#[source] serde_json::Error),
}

/// Configuration for readiness waits on active providers.
///
/// # Defaults
///
/// - `evict_failed`: `false` (a rejected readiness future stays cached)
/// - `ready_timeout_ms`: `None` (wait indefinitely)
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ReadinessConfig {
    /// Drop a failed readiness future from the cache so the next request
    /// starts a fresh activation cycle.
    #[serde(default)]
    pub evict_failed: bool,

    /// Upper bound on each active provider's readiness wait.
    #[serde(default)]
    pub ready_timeout_ms: Option<u64>,
}

impl ReadinessConfig {
    pub fn ready_timeout(&self) -> Option<Duration> {
        self.ready_timeout_ms.map(Duration::from_millis)
    }
}

/// Configuration for the activation state side table.
///
/// # Defaults
///
/// - `prune_threshold`: `256` entries
#[derive(Debug, Clone, Deserialize)]
pub struct ActivationConfig {
    /// Table size at which entries for dropped workspaces are reclaimed.
    /// Values below 16 are raised to 16.
    #[serde(
        default = "default_prune_threshold",
        deserialize_with = "deserialize_prune_threshold"
    )]
    pub prune_threshold: usize,
}

impl Default for ActivationConfig {
    fn default() -> Self {
        Self {
            prune_threshold: default_prune_threshold(),
        }
    }
}

const fn default_prune_threshold() -> usize {
    256
}

/// Lower bound for prune_threshold; smaller values would prune on nearly every access
const MIN_PRUNE_THRESHOLD: usize = 16;

fn deserialize_prune_threshold<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let threshold = usize::deserialize(deserializer)?;
    if threshold < MIN_PRUNE_THRESHOLD {
        tracing::warn!(
            "prune_threshold {} is below the minimum of {}, using the minimum",
            threshold,
            MIN_PRUNE_THRESHOLD
        );
        return Ok(MIN_PRUNE_THRESHOLD);
    }
    Ok(threshold)
}
