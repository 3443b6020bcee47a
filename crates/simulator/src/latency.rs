//! Latency half-life analysis.
//!
//! The gross edge of a cycle decays linearly in execution latency,
//! `base_return * (1 - l / half_life_ms)`, while per-hop costs (fees,
//! impact drag) do not decay with it. The half-life of a cycle is the
//! smallest latency at which the expected net return reaches zero,
//! located by bisection.

use crate::impact::ImpactModel;
use common::types::HalfLife;
use serde::{Deserialize, Serialize};

/// Bisection search domain and tolerance.
const MAX_LATENCY_MS: f64 = 10_000.0;
const TOLERANCE_MS: f64 = 1.0;

/// Linear latency decay model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatencyAnalyzer {
    pub half_life_ms: f64,
}

impl Default for LatencyAnalyzer {
    fn default() -> Self {
        Self { half_life_ms: 100.0 }
    }
}

impl LatencyAnalyzer {
    pub fn new(half_life_ms: f64) -> Self {
        Self { half_life_ms }
    }

    /// Expected return at latency `latency_ms` for a cycle with the given
    /// cost-free base return. Unclamped: past the half-life the
    /// expectation goes negative.
    pub fn expected_return(&self, base_return: f64, latency_ms: f64) -> f64 {
        base_return * (1.0 - latency_ms / self.half_life_ms)
    }

    /// Smallest latency in (0, 10 000] ms at which `return_at` is no
    /// longer positive, to 1 ms tolerance. A cycle already unprofitable
    /// at zero latency has half-life 0; one still profitable at the
    /// domain edge is unbounded.
    pub fn half_life_of(&self, return_at: impl Fn(f64) -> f64) -> HalfLife {
        if return_at(0.0) <= 0.0 {
            return HalfLife::Bounded(0.0);
        }
        if return_at(MAX_LATENCY_MS) > 0.0 {
            return HalfLife::Unbounded;
        }
        let mut lo = 0.0;
        let mut hi = MAX_LATENCY_MS;
        while hi - lo > TOLERANCE_MS {
            let mid = 0.5 * (lo + hi);
            if return_at(mid) <= 0.0 {
                hi = mid;
            } else {
                lo = mid;
            }
        }
        HalfLife::Bounded(hi)
    }

    /// Half-life of a cycle with no residual per-hop costs.
    pub fn half_life(&self, base_return: f64) -> HalfLife {
        self.half_life_of(|latency| self.expected_return(base_return, latency))
    }

    /// Samples a decay curve from zero latency to `max_ms`.
    pub fn decay_curve(
        &self,
        return_at: impl Fn(f64) -> f64,
        max_ms: f64,
        step_ms: f64,
    ) -> Vec<DecayPoint> {
        let mut points = Vec::new();
        let mut latency = 0.0;
        while latency <= max_ms + 1e-9 {
            let ret = return_at(latency);
            points.push(DecayPoint {
                latency_ms: latency,
                return_pct: ret * 100.0,
                is_profitable: ret > 0.0,
            });
            latency += step_ms;
        }
        points
    }

    /// Full sensitivity report for the `latency_sensitivity` operation.
    ///
    /// Fees and impact drag are charged per hop and do not decay; declared
    /// volatility shortens the effective half-life of the gross edge.
    pub fn sensitivity(
        &self,
        request: &SensitivityRequest,
        impact: &ImpactModel,
    ) -> SensitivityReport {
        let drag = request.path_length as f64
            * (request.fee_per_hop + impact.impact(request.initial_capital, request.liquidity));
        let effective = LatencyAnalyzer::new(self.half_life_ms / (1.0 + 4.0 * request.volatility));
        let return_at =
            |latency: f64| effective.expected_return(request.base_return, latency) - drag;

        let half_life = effective.half_life_of(&return_at);
        let key_metrics = [0.0, 50.0, 100.0, 200.0]
            .iter()
            .map(|&ms| KeyLatencyPoint {
                latency_ms: ms,
                return_pct: return_at(ms) * 100.0,
            })
            .collect();

        SensitivityReport {
            half_life_ms: half_life,
            decay_curve: effective.decay_curve(&return_at, 400.0, 20.0),
            key_metrics,
            reliability: LatencyReliability::from_half_life(half_life),
        }
    }
}

/// One point of the latency decay curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecayPoint {
    pub latency_ms: f64,
    pub return_pct: f64,
    pub is_profitable: bool,
}

/// Expected return at one of the reference latencies.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KeyLatencyPoint {
    pub latency_ms: f64,
    pub return_pct: f64,
}

/// Inputs of the `latency_sensitivity` operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityRequest {
    pub base_return: f64,
    pub path_length: usize,
    pub liquidity: f64,
    #[serde(default)]
    pub volatility: f64,
    #[serde(default)]
    pub fee_per_hop: f64,
    pub initial_capital: f64,
}

/// How tolerant a cycle is to execution latency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LatencyReliability {
    /// Half-life under 50 ms: gone before a round trip completes.
    Critical,
    /// Under 150 ms.
    Fragile,
    /// Under 400 ms.
    Moderate,
    /// 400 ms or more.
    Robust,
    /// Profitable across the whole search domain.
    Immune,
}

impl LatencyReliability {
    pub fn from_half_life(half_life: HalfLife) -> Self {
        match half_life {
            HalfLife::Unbounded => LatencyReliability::Immune,
            HalfLife::Bounded(ms) if ms < 50.0 => LatencyReliability::Critical,
            HalfLife::Bounded(ms) if ms < 150.0 => LatencyReliability::Fragile,
            HalfLife::Bounded(ms) if ms < 400.0 => LatencyReliability::Moderate,
            HalfLife::Bounded(_) => LatencyReliability::Robust,
        }
    }
}

/// Report returned by the `latency_sensitivity` operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityReport {
    pub half_life_ms: HalfLife,
    pub decay_curve: Vec<DecayPoint>,
    pub key_metrics: Vec<KeyLatencyPoint>,
    pub reliability: LatencyReliability,
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_half_life_of_one_percent_cycle_is_default() {
        let analyzer = LatencyAnalyzer::default();
        // r(l) = 0.01 * (1 - l/100) crosses zero at l = 100 exactly.
        match analyzer.half_life(0.01) {
            HalfLife::Bounded(ms) => assert!((ms - 100.0).abs() <= TOLERANCE_MS),
            HalfLife::Unbounded => panic!("expected a bounded half-life"),
        }
    }

    #[test]
    fn test_unprofitable_cycle_has_zero_half_life() {
        let analyzer = LatencyAnalyzer::default();
        assert_eq!(analyzer.half_life(-0.005), HalfLife::Bounded(0.0));
        assert_eq!(analyzer.half_life(0.0), HalfLife::Bounded(0.0));
    }

    #[test]
    fn test_half_life_beyond_domain_is_unbounded() {
        // Half-life parameter far beyond the 10s search ceiling.
        let analyzer = LatencyAnalyzer::new(50_000.0);
        assert!(analyzer.half_life(0.01).is_unbounded());
    }

    #[test]
    fn test_decay_identities() {
        let analyzer = LatencyAnalyzer::default();
        // At half the half-life, half the return is left.
        assert_relative_eq!(analyzer.expected_return(0.01, 50.0), 0.005, epsilon = 1e-12);
        assert_relative_eq!(analyzer.expected_return(0.01, 100.0), 0.0, epsilon = 1e-12);
        assert!(analyzer.expected_return(0.01, 200.0) < 0.0);
    }

    #[test]
    fn test_sensitivity_report_with_clean_inputs() {
        let request = SensitivityRequest {
            base_return: 0.01,
            path_length: 3,
            liquidity: 1e6,
            volatility: 0.0,
            fee_per_hop: 0.0,
            initial_capital: 1.0,
        };
        let report = LatencyAnalyzer::default().sensitivity(&request, &ImpactModel::default());

        match report.half_life_ms {
            HalfLife::Bounded(ms) => assert!((ms - 100.0).abs() <= TOLERANCE_MS),
            HalfLife::Unbounded => panic!("expected a bounded half-life"),
        }
        assert_eq!(report.reliability, LatencyReliability::Fragile);

        // Key metrics at 0/50/100/200 ms.
        assert_eq!(report.key_metrics.len(), 4);
        assert_relative_eq!(report.key_metrics[0].return_pct, 1.0, epsilon = 1e-4);
        assert_relative_eq!(report.key_metrics[1].return_pct, 0.5, epsilon = 1e-4);
        assert_relative_eq!(report.key_metrics[2].return_pct, 0.0, epsilon = 1e-4);
        assert!(report.key_metrics[3].return_pct < 0.0);
    }

    #[test]
    fn test_fees_shorten_the_half_life() {
        let clean = SensitivityRequest {
            base_return: 0.01,
            path_length: 3,
            liquidity: 1e6,
            volatility: 0.0,
            fee_per_hop: 0.0,
            initial_capital: 1.0,
        };
        let costly = SensitivityRequest {
            fee_per_hop: 0.002,
            ..clean.clone()
        };
        let analyzer = LatencyAnalyzer::default();
        let model = ImpactModel::default();
        let h_clean = analyzer.sensitivity(&clean, &model).half_life_ms.as_ms();
        let h_costly = analyzer.sensitivity(&costly, &model).half_life_ms.as_ms();
        // Drag of 3 * 0.002 eats 60% of the edge: zero crossing moves to
        // roughly 40 ms.
        assert!(h_costly < h_clean);
        assert!((h_costly - 40.0).abs() <= 2.0);
    }

    #[test]
    fn test_volatility_shortens_the_half_life() {
        let calm = SensitivityRequest {
            base_return: 0.01,
            path_length: 3,
            liquidity: 1e6,
            volatility: 0.0,
            fee_per_hop: 0.0,
            initial_capital: 1.0,
        };
        let stormy = SensitivityRequest {
            volatility: 0.25,
            ..calm.clone()
        };
        let analyzer = LatencyAnalyzer::default();
        let model = ImpactModel::default();
        let h_calm = analyzer.sensitivity(&calm, &model).half_life_ms.as_ms();
        let h_stormy = analyzer.sensitivity(&stormy, &model).half_life_ms.as_ms();
        assert!(h_stormy < h_calm);
    }

    #[test]
    fn test_reliability_buckets() {
        assert_eq!(
            LatencyReliability::from_half_life(HalfLife::Bounded(10.0)),
            LatencyReliability::Critical
        );
        assert_eq!(
            LatencyReliability::from_half_life(HalfLife::Bounded(100.0)),
            LatencyReliability::Fragile
        );
        assert_eq!(
            LatencyReliability::from_half_life(HalfLife::Bounded(399.0)),
            LatencyReliability::Moderate
        );
        assert_eq!(
            LatencyReliability::from_half_life(HalfLife::Bounded(2000.0)),
            LatencyReliability::Robust
        );
        assert_eq!(
            LatencyReliability::from_half_life(HalfLife::Unbounded),
            LatencyReliability::Immune
        );
    }
}
