//! The transport-agnostic operation surface.
//!
//! Every operation returns a `{success, data | error, elapsed_ms}`
//! envelope. A JSON-over-HTTP adapter (out of scope here) maps these
//! one-to-one onto endpoints; the CLI adapter serializes them to stdout.

use crate::context::EngineContext;
use crate::metrics::MetricsReport;
use crate::pipeline::{self, ScanReport, ScanRequest};
use crate::source::{MarketDataSource, SimulatedMarket};
use analytics::allocator::{AllocationPlan, AllocatorConfig, AllocatorMode, CapitalAllocator};
use analytics::regime::RegimeSnapshot;
use analytics::stress::{StressReport, StressTester};
use common::errors::EngineError;
use serde::{Deserialize, Serialize};
use simulator::impact::{ImpactBreakdown, ImpactModel};
use simulator::latency::{LatencyAnalyzer, SensitivityReport, SensitivityRequest};
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Wire form of an engine failure: stable kind tag plus a short message.
/// No stack traces cross the interface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiError {
    pub kind: String,
    pub message: String,
}

impl From<&EngineError> for ApiError {
    fn from(err: &EngineError) -> Self {
        Self {
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}

/// Response envelope shared by every operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
    pub elapsed_ms: f64,
}

impl<T> ApiResponse<T> {
    fn ok(data: T, started: Instant) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            elapsed_ms: started.elapsed().as_secs_f64() * 1000.0,
        }
    }

    fn err(err: &EngineError, started: Instant) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ApiError::from(err)),
            elapsed_ms: started.elapsed().as_secs_f64() * 1000.0,
        }
    }

    fn from_result(result: Result<T, EngineError>, started: Instant) -> Self {
        match result {
            Ok(data) => Self::ok(data, started),
            Err(err) => Self::err(&err, started),
        }
    }

    /// The error kind, if the operation failed.
    pub fn error_kind(&self) -> Option<&str> {
        self.error.as_ref().map(|e| e.kind.as_str())
    }
}

/// `scan`: run the full pipeline over caller-provided edges.
pub fn scan(
    ctx: &EngineContext,
    request: &ScanRequest,
    cancel: &CancellationToken,
) -> ApiResponse<ScanReport> {
    let started = Instant::now();
    ApiResponse::from_result(pipeline::scan(ctx, request, cancel), started)
}

/// Body of the `quick_scan` operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuickScanRequest {
    pub capital: f64,
    #[serde(default)]
    pub use_real_data: bool,
    #[serde(default)]
    pub mc_samples: Option<usize>,
    #[serde(default)]
    pub run_stress: bool,
    #[serde(default)]
    pub seed: Option<u64>,
}

/// `quick_scan`: like `scan`, but the engine supplies the edges — from the
/// injected live source when `use_real_data` is set, otherwise from the
/// seeded simulated market.
pub fn quick_scan(
    ctx: &EngineContext,
    request: &QuickScanRequest,
    cancel: &CancellationToken,
) -> ApiResponse<ScanReport> {
    let started = Instant::now();
    let result = (|| {
        let seed = request.seed.unwrap_or(0);
        let market_data = if request.use_real_data {
            let source = ctx.live_source().ok_or_else(|| {
                EngineError::InvalidInput(
                    "use_real_data requested but no live market source is configured".to_string(),
                )
            })?;
            log::info!("quick scan using live source {:?}", source.label());
            source.fetch()?
        } else {
            SimulatedMarket::new(seed).fetch()?
        };

        let scan_request = ScanRequest {
            mc_samples: request.mc_samples,
            run_stress: request.run_stress,
            seed: Some(seed),
            ..ScanRequest::new(market_data, request.capital)
        };
        pipeline::scan(ctx, &scan_request, cancel)
    })();
    ApiResponse::from_result(result, started)
}

/// `metrics`: global counters plus the persistence summary.
pub fn metrics(ctx: &EngineContext) -> ApiResponse<MetricsReport> {
    let started = Instant::now();
    let metrics = ctx.metrics().read().clone();
    let persistence = ctx.persistence().read();
    let summary = persistence.summary();

    // Portfolio Sharpe: per-opportunity Sharpe ratios weighted by the
    // capital assigned in the last allocation.
    let portfolio_sharpe = ctx.last_allocation().read().as_ref().and_then(|plan| {
        let mut weighted = 0.0;
        let mut weights = 0.0;
        for entry in &plan.entries {
            let fingerprint = common::types::CycleFingerprint(entry.fingerprint.clone());
            if let Some(sharpe) = persistence.get(&fingerprint).and_then(|r| r.sharpe()) {
                weighted += sharpe * entry.amount;
                weights += entry.amount;
            }
        }
        (weights > 0.0).then(|| weighted / weights)
    });

    ApiResponse::ok(
        MetricsReport {
            total_scans: metrics.total_scans,
            total_cycles_found: metrics.total_cycles_found,
            avg_detection_time_ms: metrics.avg_detection_time_ms(),
            last_scan_at: metrics.last_scan_at,
            persistence: summary,
            portfolio_sharpe,
        },
        started,
    )
}

/// Body of the `allocate` operation. The mode arrives as a string so an
/// unknown mode surfaces as invalid input, not a parse failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocateRequest {
    pub capital: f64,
    pub opportunity_ids: Vec<Uuid>,
    pub mode: String,
    #[serde(default)]
    pub max_position: Option<f64>,
    #[serde(default)]
    pub min_confidence: Option<f64>,
}

/// `allocate`: re-run the allocator over opportunities cached from the
/// latest scan.
pub fn allocate(ctx: &EngineContext, request: &AllocateRequest) -> ApiResponse<AllocationPlan> {
    let started = Instant::now();
    let result = (|| {
        let mode: AllocatorMode = request.mode.parse()?;
        let cache = ctx.opportunities().read();
        let mut candidates = Vec::with_capacity(request.opportunity_ids.len());
        for id in &request.opportunity_ids {
            let cached = cache.get(id).ok_or_else(|| {
                EngineError::InvalidInput(format!("unknown opportunity id {id}"))
            })?;
            candidates.push(cached.candidate.clone());
        }

        let defaults = ctx.config().allocator.clone();
        let allocator = CapitalAllocator::new(AllocatorConfig {
            max_position: request.max_position.unwrap_or(defaults.max_position),
            min_confidence: request.min_confidence.unwrap_or(defaults.min_confidence),
            rank_by: defaults.rank_by,
        });
        allocator.allocate(request.capital, &candidates, mode)
    })();
    ApiResponse::from_result(result, started)
}

/// `stress_test`: the seven-scenario battery for one cached opportunity.
pub fn stress_test(ctx: &EngineContext, opportunity_id: Uuid) -> ApiResponse<StressReport> {
    let started = Instant::now();
    let result = (|| {
        let cache = ctx.opportunities().read();
        let cached = cache.get(&opportunity_id).ok_or_else(|| {
            EngineError::InvalidInput(format!("unknown opportunity id {opportunity_id}"))
        })?;
        StressTester::new().run(&cached.hops, &cached.sim_config, &CancellationToken::new())
    })();
    ApiResponse::from_result(result, started)
}

/// Body of the `market_impact` operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketImpactRequest {
    pub volume: f64,
    pub liquidity: f64,
    pub base_price: f64,
    #[serde(default)]
    pub k: Option<f64>,
    #[serde(default)]
    pub alpha: Option<f64>,
    #[serde(default)]
    pub volatility: Option<f64>,
}

/// `market_impact`: stateless impact breakdown for a hypothetical trade.
pub fn market_impact(request: &MarketImpactRequest) -> ApiResponse<ImpactBreakdown> {
    let started = Instant::now();
    let result = (|| {
        if !request.volume.is_finite() || request.volume <= 0.0 {
            return Err(EngineError::InvalidInput(format!(
                "volume must be a finite positive number, got {}",
                request.volume
            )));
        }
        if !request.liquidity.is_finite() || request.liquidity <= 0.0 {
            return Err(EngineError::InvalidInput(format!(
                "liquidity must be a finite positive number, got {}",
                request.liquidity
            )));
        }
        if !request.base_price.is_finite() || request.base_price <= 0.0 {
            return Err(EngineError::InvalidInput(format!(
                "base_price must be a finite positive number, got {}",
                request.base_price
            )));
        }
        let volatility = request.volatility.unwrap_or(0.0);
        if !volatility.is_finite() || volatility < 0.0 {
            return Err(EngineError::InvalidInput(format!(
                "volatility must be a finite non-negative number, got {volatility}"
            )));
        }
        let defaults = ImpactModel::default();
        let model = ImpactModel::new(
            request.k.unwrap_or(defaults.k),
            request.alpha.unwrap_or(defaults.alpha),
        );
        Ok(model.breakdown(
            request.volume,
            request.liquidity,
            request.base_price,
            volatility,
        ))
    })();
    ApiResponse::from_result(result, started)
}

/// `regime`: current market regime classification for one pair, read
/// from the rolling window the scans feed.
pub fn regime(ctx: &EngineContext, pair: &str) -> ApiResponse<RegimeSnapshot> {
    let started = Instant::now();
    let result = ctx.regime().read().snapshot(pair).ok_or_else(|| {
        EngineError::InvalidInput(format!(
            "no regime window for pair {pair:?} (needs at least two observations)"
        ))
    });
    ApiResponse::from_result(result, started)
}

/// `latency_sensitivity`: stateless decay-curve analysis.
pub fn latency_sensitivity(request: &SensitivityRequest) -> ApiResponse<SensitivityReport> {
    let started = Instant::now();
    let result = (|| {
        if !request.base_return.is_finite() {
            return Err(EngineError::InvalidInput(
                "base_return must be a finite number".to_string(),
            ));
        }
        if !request.liquidity.is_finite() || request.liquidity <= 0.0 {
            return Err(EngineError::InvalidInput(format!(
                "liquidity must be a finite positive number, got {}",
                request.liquidity
            )));
        }
        if !request.initial_capital.is_finite() || request.initial_capital <= 0.0 {
            return Err(EngineError::InvalidInput(format!(
                "initial_capital must be a finite positive number, got {}",
                request.initial_capital
            )));
        }
        Ok(LatencyAnalyzer::default().sensitivity(request, &ImpactModel::default()))
    })();
    ApiResponse::from_result(result, started)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_market_impact_envelope() {
        let response = market_impact(&MarketImpactRequest {
            volume: 1000.0,
            liquidity: 1e6,
            base_price: 100.0,
            k: None,
            alpha: None,
            volatility: None,
        });
        assert!(response.success);
        assert!(response.error.is_none());
        let breakdown = response.data.unwrap();
        assert!(breakdown.impact_bps > 0.0);
        // Without volatility the price band collapses onto the impacted
        // price.
        assert_eq!(breakdown.price_band_low, breakdown.impacted_price);
        assert_eq!(breakdown.price_band_high, breakdown.impacted_price);
    }

    #[test]
    fn test_market_impact_volatility_widens_the_band() {
        let response = market_impact(&MarketImpactRequest {
            volume: 1000.0,
            liquidity: 1e6,
            base_price: 100.0,
            k: None,
            alpha: None,
            volatility: Some(0.05),
        });
        assert!(response.success);
        let breakdown = response.data.unwrap();
        assert!(breakdown.price_band_low < breakdown.impacted_price);
        assert!(breakdown.price_band_high > breakdown.impacted_price);
    }

    #[test]
    fn test_market_impact_rejects_bad_volatility() {
        let response = market_impact(&MarketImpactRequest {
            volume: 1000.0,
            liquidity: 1e6,
            base_price: 100.0,
            k: None,
            alpha: None,
            volatility: Some(-0.1),
        });
        assert!(!response.success);
        assert_eq!(response.error_kind(), Some("invalid_input"));
    }

    #[test]
    fn test_regime_without_observations_is_invalid_input() {
        let ctx = EngineContext::with_defaults();
        let response = regime(&ctx, "BTC/ETH");
        assert!(!response.success);
        assert_eq!(response.error_kind(), Some("invalid_input"));
    }

    #[test]
    fn test_market_impact_rejects_bad_volume() {
        let response = market_impact(&MarketImpactRequest {
            volume: -1.0,
            liquidity: 1e6,
            base_price: 100.0,
            k: None,
            alpha: None,
            volatility: None,
        });
        assert!(!response.success);
        assert_eq!(response.error_kind(), Some("invalid_input"));
    }

    #[test]
    fn test_latency_sensitivity_envelope() {
        let response = latency_sensitivity(&SensitivityRequest {
            base_return: 0.01,
            path_length: 3,
            liquidity: 1e6,
            volatility: 0.0,
            fee_per_hop: 0.0,
            initial_capital: 1.0,
        });
        assert!(response.success);
        let report = response.data.unwrap();
        assert!(!report.decay_curve.is_empty());
    }

    #[test]
    fn test_unknown_allocator_mode_is_invalid_input() {
        let ctx = EngineContext::with_defaults();
        let response = allocate(
            &ctx,
            &AllocateRequest {
                capital: 1000.0,
                opportunity_ids: vec![],
                mode: "martingale".to_string(),
                max_position: None,
                min_confidence: None,
            },
        );
        assert!(!response.success);
        assert_eq!(response.error_kind(), Some("invalid_input"));
    }

    #[test]
    fn test_stress_test_unknown_id() {
        let ctx = EngineContext::with_defaults();
        let response = stress_test(&ctx, Uuid::new_v4());
        assert_eq!(response.error_kind(), Some("invalid_input"));
    }

    #[test]
    fn test_quick_scan_without_live_source() {
        let ctx = EngineContext::with_defaults();
        let response = quick_scan(
            &ctx,
            &QuickScanRequest {
                capital: 10_000.0,
                use_real_data: true,
                mc_samples: None,
                run_stress: false,
                seed: None,
            },
            &CancellationToken::new(),
        );
        assert!(!response.success);
        assert_eq!(response.error_kind(), Some("invalid_input"));
    }
}
