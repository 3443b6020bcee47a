//! The scan pipeline: prune, detect, per-cycle fan-out, aggregate,
//! allocate, commit.

use crate::context::{CachedOpportunity, EngineContext};
use analytics::allocator::{
    AllocationCandidate, AllocationPlan, AllocatorMode, CapitalAllocator,
};
use analytics::persistence::PersistenceScore;
use analytics::risk::{RiskEngine, RiskInputs, RiskProfile};
use analytics::stress::{StressReport, StressTester};
use chrono::Utc;
use common::errors::EngineError;
use common::types::{Cycle, Edge, HalfLife};
use detector::bellman_ford::{CycleDetector, DetectorConfig};
use detector::pruner::EdgePruner;
use detector::RateGraph;
use petgraph::graph::EdgeIndex;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use simulator::latency::LatencyAnalyzer;
use simulator::monte_carlo::{
    derive_sample_seed, MonteCarloSimulator, SimulationConfig, SimulationResult, MAX_SAMPLES,
};
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

fn default_true() -> bool {
    true
}

/// One scan request: normalized edges plus the scan options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanRequest {
    pub market_data: Vec<Edge>,
    pub capital: f64,
    #[serde(default)]
    pub max_cycles: Option<usize>,
    #[serde(default = "default_true")]
    pub run_monte_carlo: bool,
    #[serde(default)]
    pub mc_samples: Option<usize>,
    #[serde(default)]
    pub run_stress: bool,
    #[serde(default)]
    pub allocator_mode: Option<AllocatorMode>,
    #[serde(default)]
    pub seed: Option<u64>,
}

impl ScanRequest {
    pub fn new(market_data: Vec<Edge>, capital: f64) -> Self {
        Self {
            market_data,
            capital,
            max_cycles: None,
            run_monte_carlo: true,
            mc_samples: None,
            run_stress: false,
            allocator_mode: None,
            seed: None,
        }
    }
}

/// A detected cycle with everything the downstream analytics attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Opportunity {
    pub id: Uuid,
    pub cycle: Cycle,
    pub fingerprint: String,
    /// Smallest hop liquidity along the cycle.
    pub min_hop_liquidity: f64,
    pub half_life_ms: HalfLife,
    pub simulation: Option<SimulationResult>,
    pub risk: Option<RiskProfile>,
    pub stress: Option<StressReport>,
    pub persistence: Option<PersistenceScore>,
    pub warnings: Vec<String>,
}

/// Scan-wide telemetry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanMetrics {
    pub edges_in: usize,
    pub edges_pruned: usize,
    pub reindexed: bool,
    pub cycles_found: usize,
    pub detection_time_ms: f64,
    pub simulation_time_ms: f64,
    pub total_time_ms: f64,
}

/// Result of one scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanReport {
    pub opportunities: Vec<Opportunity>,
    pub allocation: Option<AllocationPlan>,
    pub metrics: ScanMetrics,
}

/// Runs one full scan against the context.
///
/// Phases are sequential (prune, detect, per-cycle fan-out, aggregate,
/// allocate); within the fan-out the per-cycle work runs in parallel and
/// is re-assembled in canonical cycle order. Shared state is written only
/// at the commit boundary at the very end, so a failed or cancelled scan
/// leaves metrics and trackers untouched.
pub fn scan(
    ctx: &EngineContext,
    request: &ScanRequest,
    cancel: &CancellationToken,
) -> Result<ScanReport, EngineError> {
    let started = Instant::now();
    validate(request)?;

    let config = ctx.config();
    let seed = request.seed.unwrap_or(0);

    // Prune, then keep the scan-local graph for the whole scan: cycle edge
    // ids index into this graph's edge table.
    let input_graph = RateGraph::from_edges(request.market_data.iter().cloned());
    let edges_in = input_graph.edge_count();
    let pruned = EdgePruner::new(config.pruner.clone()).prune(&input_graph);
    let graph = &pruned.graph;
    if cancel.is_cancelled() {
        return Err(EngineError::Cancelled);
    }

    let detector = CycleDetector::new(DetectorConfig {
        max_cycles: request.max_cycles.unwrap_or(config.detector.max_cycles),
        ..config.detector.clone()
    });
    let cycles = detector.detect(graph);
    let detection_time_ms: f64 = cycles.iter().map(|c| c.detection_time_ms).sum();
    if cancel.is_cancelled() {
        return Err(EngineError::Cancelled);
    }

    // Per-cycle fan-out: Monte Carlo, risk, stress. Work is tagged by the
    // cycle index and the parallel collect preserves input order, so the
    // aggregate is already canonical.
    let simulate_started = Instant::now();
    let mut opportunities: Vec<Opportunity> = cycles
        .into_par_iter()
        .enumerate()
        .map(|(index, cycle)| evaluate_cycle(ctx, request, graph, cycle, index, seed, cancel))
        .collect::<Result<_, _>>()?;
    let simulation_time_ms = simulate_started.elapsed().as_secs_f64() * 1000.0;

    // Allocate across cycles that cleared simulation; the allocator
    // applies the confidence gate itself.
    let candidates: Vec<AllocationCandidate> = opportunities
        .iter()
        .enumerate()
        .filter_map(|(index, opp)| to_candidate(index, opp))
        .collect();
    let allocation = if candidates.is_empty() {
        None
    } else {
        let mode = request.allocator_mode.unwrap_or(AllocatorMode::Greedy);
        let allocator = CapitalAllocator::new(config.allocator.clone());
        Some(allocator.allocate(request.capital, &candidates, mode)?)
    };

    if cancel.is_cancelled() {
        return Err(EngineError::Cancelled);
    }

    // Commit boundary: the only writes to shared state.
    let now = Utc::now();
    {
        let mut persistence = ctx.persistence().write();
        for opp in &opportunities {
            let observed = opp
                .simulation
                .as_ref()
                .map(|s| s.stats.mean)
                .unwrap_or(opp.cycle.raw_profit);
            persistence.record_observation(&opp.cycle.fingerprint(), observed, now);
        }
        persistence.prune(now, chrono::Duration::seconds(config.persistence.ttl_secs));
    }
    {
        let mut regime = ctx.regime().write();
        for edge in &request.market_data {
            let pair = format!("{}/{}", edge.from_token, edge.to_token);
            regime.observe(&pair, edge.rate, edge.liquidity);
        }
    }
    ctx.metrics()
        .write()
        .record_scan(opportunities.len(), detection_time_ms, now);
    {
        let mut cache = ctx.opportunities().write();
        cache.clear();
        for (index, opp) in opportunities.iter().enumerate() {
            if let Some(candidate) = to_candidate(index, opp) {
                cache.insert(
                    opp.id,
                    CachedOpportunity {
                        id: opp.id,
                        hops: hops_of(graph, &opp.cycle),
                        candidate,
                        sim_config: sim_config_for(ctx, request, &opp.cycle, seed, index),
                    },
                );
            }
        }
    }
    *ctx.last_allocation().write() = allocation.clone();

    // Attach persistence scores now that the observations are recorded.
    {
        let persistence = ctx.persistence().read();
        for opp in &mut opportunities {
            opp.persistence = persistence.score(&opp.cycle.fingerprint());
        }
    }

    let cycles_found = opportunities.len();
    log::info!(
        "scan finished: {} cycle(s), {} candidate(s) funded, {:.2}ms",
        cycles_found,
        allocation.as_ref().map_or(0, |p| p.entries.len()),
        started.elapsed().as_secs_f64() * 1000.0
    );

    Ok(ScanReport {
        opportunities,
        allocation,
        metrics: ScanMetrics {
            edges_in,
            edges_pruned: pruned.removed,
            reindexed: pruned.reindexed,
            cycles_found,
            detection_time_ms,
            simulation_time_ms,
            total_time_ms: started.elapsed().as_secs_f64() * 1000.0,
        },
    })
}

fn validate(request: &ScanRequest) -> Result<(), EngineError> {
    if !request.capital.is_finite() || request.capital <= 0.0 {
        return Err(EngineError::InvalidInput(format!(
            "capital must be a finite positive number, got {}",
            request.capital
        )));
    }
    if let Some(samples) = request.mc_samples {
        if samples == 0 || samples > MAX_SAMPLES {
            return Err(EngineError::InvalidInput(format!(
                "mc_samples must lie in [1, {MAX_SAMPLES}], got {samples}"
            )));
        }
    }
    for edge in &request.market_data {
        edge.validate()?;
    }
    Ok(())
}

fn hops_of(graph: &RateGraph, cycle: &Cycle) -> Vec<Edge> {
    cycle
        .edge_ids
        .iter()
        .map(|&id| graph.edge(EdgeIndex::new(id)).clone())
        .collect()
}

fn sim_config_for(
    ctx: &EngineContext,
    request: &ScanRequest,
    cycle: &Cycle,
    seed: u64,
    index: usize,
) -> SimulationConfig {
    let settings = &ctx.config().simulation;
    let half_life = LatencyAnalyzer::new(settings.half_life_ms).half_life(cycle.raw_profit);
    SimulationConfig {
        samples: request.mc_samples.unwrap_or(settings.samples),
        latency_max_ms: settings.latency_max_ms,
        liquidity_delta: settings.liquidity_delta,
        half_life_ms: half_life.as_ms(),
        volume: request.capital,
        seed: derive_sample_seed(seed, index as u64),
        impact: settings.impact,
    }
}

/// Per-cycle work of the fan-out phase.
fn evaluate_cycle(
    ctx: &EngineContext,
    request: &ScanRequest,
    graph: &RateGraph,
    cycle: Cycle,
    index: usize,
    seed: u64,
    cancel: &CancellationToken,
) -> Result<Opportunity, EngineError> {
    let config = ctx.config();
    let hops = hops_of(graph, &cycle);

    let half_life =
        LatencyAnalyzer::new(config.simulation.half_life_ms).half_life(cycle.raw_profit);

    let simulation = if request.run_monte_carlo {
        let sim_config = sim_config_for(ctx, request, &cycle, seed, index);
        Some(MonteCarloSimulator::new(sim_config)?.simulate(&hops, cancel)?)
    } else {
        None
    };

    let min_hop_liquidity = hops
        .iter()
        .map(|h| h.liquidity)
        .fold(f64::INFINITY, f64::min);
    let mean_sigma = hops.iter().map(|h| h.volatility).sum::<f64>() / hops.len().max(1) as f64;
    // Without an order book feed the half-spread of a hop is proxied by
    // its fee.
    let mean_fee = hops.iter().map(|h| h.fee).sum::<f64>() / hops.len().max(1) as f64;

    let risk_engine = RiskEngine {
        conservative: config.risk.conservative,
    };
    let mut risk = risk_engine.assess(&RiskInputs {
        capital: request.capital,
        min_hop_liquidity,
        path_length: cycle.path_length,
        mean_hop_sigma: mean_sigma,
        half_life,
        spread_pct: mean_fee,
    });

    let mut warnings = Vec::new();
    if let Some(sim) = &simulation {
        if sim.rejection_rate() > config.risk.max_rejection_rate {
            risk.confidence = 0.0;
            warnings.push(format!(
                "{} of {} samples were numerically degenerate; confidence collapsed",
                sim.rejected,
                sim.rejected + sim.sample_count
            ));
        }
    }

    let stress = if request.run_stress {
        let sim_config = sim_config_for(ctx, request, &cycle, seed, index);
        Some(StressTester::new().run(&hops, &sim_config, cancel)?)
    } else {
        None
    };

    Ok(Opportunity {
        id: Uuid::new_v4(),
        fingerprint: cycle.fingerprint().to_string(),
        min_hop_liquidity,
        cycle,
        half_life_ms: half_life,
        simulation,
        risk: Some(risk),
        stress,
        persistence: None,
        warnings,
    })
}

/// Builds the allocation view of an opportunity; `None` without a
/// simulation result.
fn to_candidate(index: usize, opp: &Opportunity) -> Option<AllocationCandidate> {
    let sim = opp.simulation.as_ref()?;
    let risk = opp.risk.as_ref()?;
    Some(AllocationCandidate {
        id: index,
        fingerprint: opp.fingerprint.clone(),
        mean_return: sim.stats.mean,
        sharpe: sim.stats.sharpe.unwrap_or(0.0),
        risk: risk.composite,
        confidence: risk.confidence,
        min_hop_liquidity: opp.min_hop_liquidity,
    })
}
