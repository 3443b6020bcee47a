use crate::config::EngineConfig;
use crate::metrics::EngineMetrics;
use crate::source::MarketDataSource;
use analytics::allocator::{AllocationCandidate, AllocationPlan};
use analytics::persistence::PersistenceTracker;
use analytics::regime::RegimeTracker;
use common::types::Edge;
use parking_lot::RwLock;
use simulator::monte_carlo::SimulationConfig;
use std::collections::HashMap;
use uuid::Uuid;

/// Everything the allocate and stress-test operations need to revisit an
/// opportunity from the latest scan.
#[derive(Debug, Clone)]
pub struct CachedOpportunity {
    pub id: Uuid,
    pub hops: Vec<Edge>,
    pub candidate: AllocationCandidate,
    pub sim_config: SimulationConfig,
}

/// Shared engine state threaded explicitly through every operation.
///
/// The trackers and counters follow a single-writer / multi-reader
/// discipline: scans take the write locks only at their commit boundary,
/// reads may happen concurrently at any time. Lifecycle is init-on-start,
/// teardown-on-drop; nothing is ambient.
pub struct EngineContext {
    config: EngineConfig,
    metrics: RwLock<EngineMetrics>,
    persistence: RwLock<PersistenceTracker>,
    regime: RwLock<RegimeTracker>,
    opportunities: RwLock<HashMap<Uuid, CachedOpportunity>>,
    last_allocation: RwLock<Option<AllocationPlan>>,
    /// Optional live market source for `quick_scan(use_real_data)`.
    live_source: Option<Box<dyn MarketDataSource>>,
}

impl EngineContext {
    pub fn new(config: EngineConfig) -> Self {
        let regime_window = config.regime.window;
        Self {
            config,
            metrics: RwLock::new(EngineMetrics::new()),
            persistence: RwLock::new(PersistenceTracker::new()),
            regime: RwLock::new(RegimeTracker::new(regime_window)),
            opportunities: RwLock::new(HashMap::new()),
            last_allocation: RwLock::new(None),
            live_source: None,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(EngineConfig::default())
    }

    /// Installs a live market source for `quick_scan(use_real_data)`.
    pub fn with_live_source(mut self, source: Box<dyn MarketDataSource>) -> Self {
        self.live_source = Some(source);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn live_source(&self) -> Option<&dyn MarketDataSource> {
        self.live_source.as_deref()
    }

    pub fn metrics(&self) -> &RwLock<EngineMetrics> {
        &self.metrics
    }

    pub fn persistence(&self) -> &RwLock<PersistenceTracker> {
        &self.persistence
    }

    pub fn regime(&self) -> &RwLock<RegimeTracker> {
        &self.regime
    }

    pub fn opportunities(&self) -> &RwLock<HashMap<Uuid, CachedOpportunity>> {
        &self.opportunities
    }

    pub fn last_allocation(&self) -> &RwLock<Option<AllocationPlan>> {
        &self.last_allocation
    }
}
