//! Seven-scenario stress battery.
//!
//! Each scenario is a pure mutation of the cycle's edges (and, for the
//! latency spike, of the simulator parameters) followed by a
//! re-simulation. A cycle survives a scenario when its expected return
//! under the shock stays positive.

use common::errors::EngineError;
use common::types::Edge;
use serde::{Deserialize, Serialize};
use simulator::monte_carlo::{derive_sample_seed, MonteCarloSimulator, SimulationConfig};
use tokio_util::sync::CancellationToken;

const SCENARIO_COUNT: usize = 7;

/// Named shock scenarios.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StressScenario {
    /// Every rate slips 1% against the trade.
    PriceShock,
    /// Every hop loses 30% of its liquidity.
    LiquidityDrain,
    /// Per-hop volatility doubles.
    VolatilitySpike,
    /// Every fee doubles.
    FeeHike,
    /// Maximum execution latency grows tenfold.
    LatencySpike,
    /// Spreads widen threefold.
    SpreadWiden,
    /// Price slip, liquidity drain, and fee hike at once.
    Combined,
}

impl StressScenario {
    pub fn all() -> [StressScenario; SCENARIO_COUNT] {
        use StressScenario::*;
        [
            PriceShock,
            LiquidityDrain,
            VolatilitySpike,
            FeeHike,
            LatencySpike,
            SpreadWiden,
            Combined,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::PriceShock => "price_shock",
            Self::LiquidityDrain => "liquidity_drain",
            Self::VolatilitySpike => "volatility_spike",
            Self::FeeHike => "fee_hike",
            Self::LatencySpike => "latency_spike",
            Self::SpreadWiden => "spread_widen",
            Self::Combined => "combined",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::PriceShock => "1% adverse move on every rate",
            Self::LiquidityDrain => "30% of every hop's liquidity withdrawn",
            Self::VolatilitySpike => "per-hop volatility doubled",
            Self::FeeHike => "every fee doubled",
            Self::LatencySpike => "maximum execution latency x10",
            Self::SpreadWiden => "spreads widened x3",
            Self::Combined => "price -1%, liquidity -30% and fees x2 together",
        }
    }

    /// Applies the shock, returning mutated hop edges and simulator
    /// parameters. The inputs are never modified.
    fn apply(&self, hops: &[Edge], config: &SimulationConfig) -> (Vec<Edge>, SimulationConfig) {
        let mut hops = hops.to_vec();
        let mut config = config.clone();
        match self {
            Self::PriceShock => {
                for hop in &mut hops {
                    hop.rate *= 0.99;
                }
            }
            Self::LiquidityDrain => {
                for hop in &mut hops {
                    hop.liquidity *= 0.7;
                }
            }
            Self::VolatilitySpike => {
                for hop in &mut hops {
                    hop.volatility *= 2.0;
                }
            }
            Self::FeeHike => {
                for hop in &mut hops {
                    hop.fee = (hop.fee * 2.0).min(0.99);
                }
            }
            Self::LatencySpike => {
                config.latency_max_ms *= 10.0;
            }
            Self::SpreadWiden => {
                // The half-spread of a hop is proxied by its fee; widening
                // it threefold charges two further half-spreads per hop on
                // top of the one the simulated effective rate already pays.
                for hop in &mut hops {
                    hop.rate *= (1.0 - hop.fee).powi(2);
                }
            }
            Self::Combined => {
                for hop in &mut hops {
                    hop.rate *= 0.99;
                    hop.liquidity *= 0.7;
                    hop.fee = (hop.fee * 2.0).min(0.99);
                }
            }
        }
        (hops, config)
    }
}

/// Outcome of one scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioOutcome {
    pub scenario: StressScenario,
    pub name: String,
    pub expected_return: f64,
    pub survived: bool,
}

/// Overall robustness bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StressRating {
    Excellent,
    Strong,
    Moderate,
    Weak,
    VeryWeak,
}

impl StressRating {
    pub fn from_survived(survived: usize) -> Self {
        match survived {
            6.. => StressRating::Excellent,
            4..=5 => StressRating::Strong,
            2..=3 => StressRating::Moderate,
            1 => StressRating::Weak,
            0 => StressRating::VeryWeak,
        }
    }
}

/// Full battery report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StressReport {
    pub outcomes: Vec<ScenarioOutcome>,
    pub survived: usize,
    /// `survived / 7`.
    pub robustness: f64,
    pub rating: StressRating,
}

/// Runs the battery against one cycle.
#[derive(Debug, Clone, Default)]
pub struct StressTester;

impl StressTester {
    pub fn new() -> Self {
        Self
    }

    /// Applies each scenario and re-simulates. Scenario seeds derive from
    /// the base seed and the scenario index, so the report is
    /// deterministic for fixed inputs.
    pub fn run(
        &self,
        hops: &[Edge],
        base_config: &SimulationConfig,
        cancel: &CancellationToken,
    ) -> Result<StressReport, EngineError> {
        let mut outcomes = Vec::with_capacity(SCENARIO_COUNT);
        for (index, scenario) in StressScenario::all().into_iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }
            let (shocked_hops, mut shocked_config) = scenario.apply(hops, base_config);
            shocked_config.seed = derive_sample_seed(base_config.seed, 0x5745_0000 + index as u64);

            let result =
                MonteCarloSimulator::new(shocked_config)?.simulate(&shocked_hops, cancel)?;
            let expected_return = result.stats.mean;
            outcomes.push(ScenarioOutcome {
                scenario,
                name: scenario.name().to_string(),
                expected_return,
                survived: expected_return > 0.0,
            });
        }

        let survived = outcomes.iter().filter(|o| o.survived).count();
        log::debug!("stress battery: {survived}/{SCENARIO_COUNT} scenarios survived");
        Ok(StressReport {
            outcomes,
            survived,
            robustness: survived as f64 / SCENARIO_COUNT as f64,
            rating: StressRating::from_survived(survived),
        })
    }
}
