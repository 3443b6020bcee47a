//! Five-factor composite execution risk.

use common::types::HalfLife;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Reference constants of the risk mapping.
const MAX_PATH: f64 = 6.0;
const H_REF_MS: f64 = 500.0;
const WARN_THRESHOLD: f64 = 70.0;
const CONSERVATIVE_MULTIPLIER: f64 = 1.3;

/// Component weights of the composite score.
const W_LIQUIDITY: f64 = 0.3;
const W_COMPLEXITY: f64 = 0.2;
const W_VOLATILITY: f64 = 0.2;
const W_EXECUTION: f64 = 0.2;
const W_SPREAD: f64 = 0.1;

/// Composite risk bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    VeryLow,
    Low,
    Moderate,
    High,
    VeryHigh,
}

impl RiskLevel {
    pub fn from_composite(composite: f64) -> Self {
        if composite < 20.0 {
            RiskLevel::VeryLow
        } else if composite < 40.0 {
            RiskLevel::Low
        } else if composite < 60.0 {
            RiskLevel::Moderate
        } else if composite < 80.0 {
            RiskLevel::High
        } else {
            RiskLevel::VeryHigh
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RiskLevel::VeryLow => "Very Low",
            RiskLevel::Low => "Low",
            RiskLevel::Moderate => "Moderate",
            RiskLevel::High => "High",
            RiskLevel::VeryHigh => "Very High",
        };
        write!(f, "{label}")
    }
}

/// Per-cycle inputs of the risk assessment.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskInputs {
    /// Working capital committed to the cycle.
    pub capital: f64,
    /// Smallest hop liquidity along the path.
    pub min_hop_liquidity: f64,
    pub path_length: usize,
    /// Mean declared volatility over the hops.
    pub mean_hop_sigma: f64,
    pub half_life: HalfLife,
    /// Half-spread over mid price, as a fraction.
    pub spread_pct: f64,
}

/// Component scores in [0, 100] and their weighted composite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskProfile {
    pub liquidity: f64,
    pub complexity: f64,
    pub volatility: f64,
    pub execution: f64,
    pub spread: f64,
    pub composite: f64,
    pub level: RiskLevel,
    pub warnings: Vec<String>,
    /// `100 - composite`.
    pub confidence: f64,
}

/// Maps cycle characteristics onto the composite risk scale.
#[derive(Debug, Clone, Default)]
pub struct RiskEngine {
    /// Scales the final composite by 1.3 (capped at 100).
    pub conservative: bool,
}

impl RiskEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn conservative() -> Self {
        Self { conservative: true }
    }

    pub fn assess(&self, inputs: &RiskInputs) -> RiskProfile {
        let liquidity = if inputs.min_hop_liquidity > 0.0 {
            (100.0 * inputs.capital / inputs.min_hop_liquidity).clamp(0.0, 100.0)
        } else {
            100.0
        };
        let complexity = (100.0 * inputs.path_length as f64 / MAX_PATH).clamp(0.0, 100.0);
        let volatility = (1000.0 * inputs.mean_hop_sigma).clamp(0.0, 100.0);
        let execution = {
            let h = inputs.half_life.as_ms().min(H_REF_MS);
            (100.0 * (1.0 - h / H_REF_MS)).clamp(0.0, 100.0)
        };
        let spread = (100.0 * inputs.spread_pct).clamp(0.0, 100.0);

        let mut composite = W_LIQUIDITY * liquidity
            + W_COMPLEXITY * complexity
            + W_VOLATILITY * volatility
            + W_EXECUTION * execution
            + W_SPREAD * spread;
        if self.conservative {
            composite = (composite * CONSERVATIVE_MULTIPLIER).min(100.0);
        }

        let mut warnings = Vec::new();
        if liquidity > WARN_THRESHOLD {
            warnings.push(format!(
                "position consumes a large share of the thinnest hop ({:.0}% of the liquidity score)",
                liquidity
            ));
        }
        if complexity > WARN_THRESHOLD {
            warnings.push(format!(
                "long path of {} hops multiplies execution legs",
                inputs.path_length
            ));
        }
        if volatility > WARN_THRESHOLD {
            warnings.push(format!(
                "hop volatility averaging {:.4} can erase the edge mid-flight",
                inputs.mean_hop_sigma
            ));
        }
        if execution > WARN_THRESHOLD {
            warnings.push(format!(
                "half-life of {} leaves little room for execution latency",
                inputs.half_life
            ));
        }
        if spread > WARN_THRESHOLD {
            warnings.push(format!(
                "spread of {:.2}% of mid price dominates the return",
                inputs.spread_pct * 100.0
            ));
        }

        if !warnings.is_empty() {
            log::warn!(
                "risk assessment flagged {} component(s), composite {:.1}",
                warnings.len(),
                composite
            );
        }

        RiskProfile {
            liquidity,
            complexity,
            volatility,
            execution,
            spread,
            composite,
            level: RiskLevel::from_composite(composite),
            warnings,
            confidence: 100.0 - composite,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn benign_inputs() -> RiskInputs {
        RiskInputs {
            capital: 1000.0,
            min_hop_liquidity: 1e6,
            path_length: 3,
            mean_hop_sigma: 0.001,
            half_life: HalfLife::Bounded(450.0),
            spread_pct: 0.001,
        }
    }

    #[test]
    fn test_component_formulas() {
        let profile = RiskEngine::new().assess(&benign_inputs());
        assert_relative_eq!(profile.liquidity, 0.1, epsilon = 1e-9);
        assert_relative_eq!(profile.complexity, 50.0, epsilon = 1e-9);
        assert_relative_eq!(profile.volatility, 1.0, epsilon = 1e-9);
        assert_relative_eq!(profile.execution, 10.0, epsilon = 1e-9);
        assert_relative_eq!(profile.spread, 0.1, epsilon = 1e-9);
        assert_relative_eq!(
            profile.composite,
            0.3 * 0.1 + 0.2 * 50.0 + 0.2 * 1.0 + 0.2 * 10.0 + 0.1 * 0.1,
            epsilon = 1e-9
        );
        assert_relative_eq!(profile.confidence, 100.0 - profile.composite, epsilon = 1e-9);
    }

    #[test]
    fn test_composite_stays_in_range() {
        let worst = RiskInputs {
            capital: 1e12,
            min_hop_liquidity: 1.0,
            path_length: 60,
            mean_hop_sigma: 10.0,
            half_life: HalfLife::Bounded(0.0),
            spread_pct: 5.0,
        };
        let profile = RiskEngine::new().assess(&worst);
        assert!(profile.composite <= 100.0);
        assert_eq!(profile.level, RiskLevel::VeryHigh);
        assert_eq!(profile.warnings.len(), 5);
        assert_relative_eq!(profile.confidence, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_unbounded_half_life_zeroes_execution_risk() {
        let inputs = RiskInputs {
            half_life: HalfLife::Unbounded,
            ..benign_inputs()
        };
        let profile = RiskEngine::new().assess(&inputs);
        assert_eq!(profile.execution, 0.0);
    }

    #[test]
    fn test_zero_liquidity_is_maximum_liquidity_risk() {
        let inputs = RiskInputs {
            min_hop_liquidity: 0.0,
            ..benign_inputs()
        };
        let profile = RiskEngine::new().assess(&inputs);
        assert_eq!(profile.liquidity, 100.0);
    }

    #[test]
    fn test_level_buckets_are_monotone() {
        assert_eq!(RiskLevel::from_composite(0.0), RiskLevel::VeryLow);
        assert_eq!(RiskLevel::from_composite(19.9), RiskLevel::VeryLow);
        assert_eq!(RiskLevel::from_composite(20.0), RiskLevel::Low);
        assert_eq!(RiskLevel::from_composite(40.0), RiskLevel::Moderate);
        assert_eq!(RiskLevel::from_composite(60.0), RiskLevel::High);
        assert_eq!(RiskLevel::from_composite(80.0), RiskLevel::VeryHigh);
        assert_eq!(RiskLevel::from_composite(100.0), RiskLevel::VeryHigh);
    }

    #[test]
    fn test_conservative_mode_scales_composite() {
        let normal = RiskEngine::new().assess(&benign_inputs());
        let conservative = RiskEngine::conservative().assess(&benign_inputs());
        assert_relative_eq!(
            conservative.composite,
            (normal.composite * 1.3).min(100.0),
            epsilon = 1e-9
        );
    }
}
