//! Market data sources for the quick-scan operation.

use common::errors::EngineError;
use common::types::Edge;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

/// A provider of already-normalized rate edges. The engine ships only the
/// simulated implementation; a live adapter can be injected by the host.
pub trait MarketDataSource: Send + Sync {
    fn label(&self) -> &str;
    fn fetch(&self) -> Result<Vec<Edge>, EngineError>;
}

/// Deterministic synthetic market: pairwise rates around fixed reference
/// prices with seeded jitter, plus one injected triangular dislocation so
/// a quick scan always has something to find.
#[derive(Debug, Clone)]
pub struct SimulatedMarket {
    pub seed: u64,
    /// Relative size of the injected dislocation.
    pub dislocation: f64,
}

impl SimulatedMarket {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            dislocation: 0.012,
        }
    }
}

impl Default for SimulatedMarket {
    fn default() -> Self {
        Self::new(0)
    }
}

const REFERENCE_PRICES: [(&str, f64); 5] = [
    ("BTC", 43_000.0),
    ("ETH", 2_600.0),
    ("SOL", 150.0),
    ("BNB", 580.0),
    ("USDT", 1.0),
];

const VENUES: [&str; 3] = ["alpha-ex", "beta-ex", "gamma-ex"];

impl MarketDataSource for SimulatedMarket {
    fn label(&self) -> &str {
        "simulated"
    }

    fn fetch(&self) -> Result<Vec<Edge>, EngineError> {
        let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(0x51_4D_4B_54));
        let jitter = Normal::new(0.0, 0.0004).map_err(|e| {
            EngineError::Internal(format!("jitter distribution rejected: {e}"))
        })?;

        let mut edges = Vec::new();
        for (i, &(from, from_usd)) in REFERENCE_PRICES.iter().enumerate() {
            for (j, &(to, to_usd)) in REFERENCE_PRICES.iter().enumerate() {
                if i == j {
                    continue;
                }
                for venue in VENUES.iter().take(2) {
                    let noise: f64 = jitter.sample(&mut rng);
                    let rate = from_usd / to_usd * (1.0 + noise);
                    let liquidity = rng.gen_range(5e4..5e6);
                    edges.push(
                        Edge::new(from, to, rate, 0.001, liquidity, *venue)
                            .with_volatility(0.002),
                    );
                }
            }
        }

        // Dislocate the USDT->BTC leg on the first venue: together with
        // the fair BTC->ETH and ETH->USDT legs this closes a profitable
        // triangle.
        if let Some(edge) = edges
            .iter_mut()
            .find(|e| e.from_token.as_str() == "USDT" && e.to_token.as_str() == "BTC")
        {
            edge.rate *= 1.0 + self.dislocation;
        }

        Ok(edges)
    }
}
