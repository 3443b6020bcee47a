//! # Analytics Crate
//!
//! Everything downstream of the simulator: the five-factor risk engine,
//! the stress battery, the opportunity persistence tracker, the market
//! regime detector, and the capital allocator.

pub mod allocator;
pub mod persistence;
pub mod regime;
pub mod risk;
pub mod stress;

pub use allocator::{
    AllocationCandidate, AllocationPlan, AllocatorConfig, AllocatorMode, CapitalAllocator, RankBy,
};
pub use persistence::{DecayPattern, OpportunityRecord, PersistenceScore, PersistenceTracker};
pub use regime::{LiquidityClass, RegimeSnapshot, RegimeTracker, TrendClass, VolatilityClass};
pub use risk::{RiskEngine, RiskInputs, RiskLevel, RiskProfile};
pub use stress::{StressRating, StressReport, StressScenario, StressTester};
