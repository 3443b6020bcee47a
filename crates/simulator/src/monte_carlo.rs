//! Seeded Monte Carlo execution simulator.
//!
//! Each sample path draws an execution latency, per-hop rate noise, and a
//! liquidity variance factor, then walks the working capital through the
//! cycle hop by hop. Sample `i` derives its RNG state from
//! `(seed, i)` alone, so any worker count produces bit-identical results.

use crate::impact::ImpactModel;
use crate::stats;
use common::errors::EngineError;
use common::types::Edge;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

/// Hard upper bound on the per-call sample count.
pub const MAX_SAMPLES: usize = 10_000;

/// Workers poll the cancellation token once per block of this many samples.
const CANCEL_POLL_INTERVAL: usize = 64;

/// Parameters of one simulation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Number of i.i.d. sample paths to draw.
    pub samples: usize,
    /// Latency is drawn uniformly from [0, latency_max_ms].
    pub latency_max_ms: f64,
    /// Liquidity variance factor is drawn from [1 - delta, 1 + delta].
    pub liquidity_delta: f64,
    /// Reference for the linear latency decay; `+inf` disables decay.
    pub half_life_ms: f64,
    /// Working capital routed through the cycle.
    pub volume: f64,
    pub seed: u64,
    pub impact: ImpactModel,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            samples: 500,
            latency_max_ms: 200.0,
            liquidity_delta: 0.2,
            half_life_ms: 100.0,
            volume: 1000.0,
            seed: 0,
            impact: ImpactModel::default(),
        }
    }
}

/// Distribution of realized returns for one cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    #[serde(flatten)]
    pub stats: stats::SampleStats,
    /// Number of samples that survived the finiteness check.
    pub sample_count: usize,
    /// Number of rejected (non-finite) samples.
    pub rejected: usize,
    /// The realized return sample itself, in draw order. Not serialized.
    #[serde(skip)]
    pub returns: Vec<f64>,
}

impl SimulationResult {
    /// Fraction of drawn samples that had to be rejected.
    pub fn rejection_rate(&self) -> f64 {
        let drawn = self.sample_count + self.rejected;
        if drawn == 0 {
            0.0
        } else {
            self.rejected as f64 / drawn as f64
        }
    }
}

/// Derives the RNG state for one sample from the call seed and the sample
/// index (splitmix-style mixing).
pub fn derive_sample_seed(seed: u64, index: u64) -> u64 {
    let mut z = seed ^ index.wrapping_mul(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Monte Carlo execution simulator for a single cycle.
pub struct MonteCarloSimulator {
    config: SimulationConfig,
}

impl MonteCarloSimulator {
    /// Creates a simulator, validating the sample count and volume.
    pub fn new(config: SimulationConfig) -> Result<Self, EngineError> {
        if config.samples == 0 || config.samples > MAX_SAMPLES {
            return Err(EngineError::InvalidInput(format!(
                "mc_samples must lie in [1, {MAX_SAMPLES}], got {}",
                config.samples
            )));
        }
        if !config.volume.is_finite() || config.volume <= 0.0 {
            return Err(EngineError::InvalidInput(format!(
                "simulation volume must be a finite positive number, got {}",
                config.volume
            )));
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Draws the configured number of sample paths for `hops` and
    /// summarizes the realized return distribution.
    ///
    /// Samples are drawn in parallel blocks but identified purely by their
    /// index, and the reduction walks blocks in index order, so the result
    /// is bit-identical for a fixed seed under any worker count. Workers
    /// poll the cancellation token between blocks; on cancellation no
    /// partial result is published.
    pub fn simulate(
        &self,
        hops: &[Edge],
        cancel: &CancellationToken,
    ) -> Result<SimulationResult, EngineError> {
        if hops.is_empty() {
            return Err(EngineError::InvalidInput(
                "cannot simulate an empty cycle".to_string(),
            ));
        }

        let n = self.config.samples;
        let blocks = n.div_ceil(CANCEL_POLL_INTERVAL);
        let drawn: Vec<Vec<f64>> = (0..blocks)
            .into_par_iter()
            .map(|block| {
                if cancel.is_cancelled() {
                    return Err(EngineError::Cancelled);
                }
                let lo = block * CANCEL_POLL_INTERVAL;
                let hi = ((block + 1) * CANCEL_POLL_INTERVAL).min(n);
                Ok((lo..hi).map(|i| self.draw_sample(hops, i as u64)).collect())
            })
            .collect::<Result<_, _>>()?;

        let mut returns = Vec::with_capacity(n);
        let mut rejected = 0usize;
        for block in drawn {
            for value in block {
                if value.is_finite() {
                    returns.push(value);
                } else {
                    rejected += 1;
                }
            }
        }

        let stats = stats::summarize(&returns).ok_or_else(|| {
            EngineError::NumericalDegeneracy(format!(
                "all {n} simulated samples were non-finite"
            ))
        })?;
        if rejected > 0 {
            log::warn!("rejected {rejected}/{n} non-finite simulation samples");
        }

        Ok(SimulationResult {
            stats,
            sample_count: returns.len(),
            rejected,
            returns,
        })
    }

    /// One sample path. The draw order (latency, per-hop noise in hop
    /// order, liquidity factor) is part of the determinism contract.
    fn draw_sample(&self, hops: &[Edge], index: u64) -> f64 {
        let cfg = &self.config;
        let mut rng = StdRng::seed_from_u64(derive_sample_seed(cfg.seed, index));

        let latency_ms = if cfg.latency_max_ms > 0.0 {
            rng.gen_range(0.0..cfg.latency_max_ms)
        } else {
            0.0
        };

        let noise: Vec<f64> = hops
            .iter()
            .map(|hop| match Normal::new(0.0, hop.volatility) {
                Ok(dist) if hop.volatility > 0.0 => dist.sample(&mut rng),
                _ => 0.0,
            })
            .collect();

        let lambda = if cfg.liquidity_delta > 0.0 {
            rng.gen_range(1.0 - cfg.liquidity_delta..1.0 + cfg.liquidity_delta)
        } else {
            1.0
        };

        let mut amount = cfg.volume;
        for (hop, eps) in hops.iter().zip(&noise) {
            let impact = cfg.impact.impact(amount, hop.liquidity * lambda);
            amount *= hop.rate * (1.0 - hop.fee) * (1.0 + eps) * (1.0 - impact);
        }

        let decay = (1.0 - latency_ms / cfg.half_life_ms).max(0.0);
        amount / cfg.volume * decay - 1.0
    }
}
