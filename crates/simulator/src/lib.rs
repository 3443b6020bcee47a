//! # Execution Simulator Crate
//!
//! The microstructure half of the pipeline: the convex price-impact model,
//! the seeded Monte Carlo execution simulator, latency half-life analysis,
//! and the sample statistics they share.

pub mod impact;
pub mod latency;
pub mod monte_carlo;
pub mod stats;

pub use impact::{ImpactBreakdown, ImpactModel};
pub use latency::{LatencyAnalyzer, LatencyReliability, SensitivityReport};
pub use monte_carlo::{MonteCarloSimulator, SimulationConfig, SimulationResult, MAX_SAMPLES};
pub use stats::SampleStats;
