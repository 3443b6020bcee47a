use analytics::allocator::AllocatorConfig;
use detector::bellman_ford::DetectorConfig;
use detector::pruner::PruneConfig;
use serde::{Deserialize, Serialize};
use simulator::impact::ImpactModel;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    ParseError(String),
}

/// Top-level engine configuration, YAML-backed.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    pub pruner: PruneConfig,
    pub detector: DetectorConfig,
    pub simulation: SimulationSettings,
    pub risk: RiskSettings,
    pub allocator: AllocatorConfig,
    pub persistence: PersistenceSettings,
    pub regime: RegimeSettings,
    pub scan: ScanSettings,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SimulationSettings {
    /// Default Monte Carlo sample count per cycle.
    pub samples: usize,
    pub latency_max_ms: f64,
    pub liquidity_delta: f64,
    /// Default latency decay reference when no analysis overrides it.
    pub half_life_ms: f64,
    pub impact: ImpactModel,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            samples: 500,
            latency_max_ms: 200.0,
            liquidity_delta: 0.2,
            half_life_ms: 100.0,
            impact: ImpactModel::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RiskSettings {
    /// Scales the composite risk by 1.3 when set.
    pub conservative: bool,
    /// Above this rejection rate a cycle's confidence collapses to zero.
    pub max_rejection_rate: f64,
}

impl Default for RiskSettings {
    fn default() -> Self {
        Self {
            conservative: false,
            max_rejection_rate: 0.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PersistenceSettings {
    /// Records unseen for this long are evicted.
    pub ttl_secs: i64,
}

impl Default for PersistenceSettings {
    fn default() -> Self {
        Self {
            ttl_secs: 30 * 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RegimeSettings {
    pub window: usize,
}

impl Default for RegimeSettings {
    fn default() -> Self {
        Self { window: 100 }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ScanSettings {
    /// Wall-clock budget per scan; the service trips the cancellation
    /// token when it runs out.
    pub timeout_ms: u64,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self { timeout_ms: 5000 }
    }
}

impl EngineConfig {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Save configuration to a YAML file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content =
            serde_yaml::to_string(self).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        std::fs::write(path.as_ref(), content)?;
        Ok(())
    }
}
