//! Market regime classification over a rolling observation window.
//!
//! The tracker is append-only; the engine wraps it in a reader-writer lock
//! so a single scan writer can coexist with concurrent readers.

use serde::{Deserialize, Serialize};
use simulator::stats;
use std::collections::{HashMap, VecDeque};

/// Default rolling window length per pair.
pub const DEFAULT_WINDOW: usize = 100;

/// Simple moving average window lengths for the trend signal.
const SMA_SHORT: usize = 10;
const SMA_LONG: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VolatilityClass {
    VeryLow,
    Low,
    Moderate,
    High,
    VeryHigh,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LiquidityClass {
    Drought,
    Thin,
    Normal,
    Deep,
    Abundant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrendClass {
    StrongDown,
    Down,
    Flat,
    Up,
    StrongUp,
}

/// Classification of the current market state for one pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegimeSnapshot {
    pub volatility_class: VolatilityClass,
    pub liquidity_class: LiquidityClass,
    pub trend_class: TrendClass,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Observation {
    price: f64,
    volume: f64,
}

/// Rolling per-pair window of (price, volume) observations.
#[derive(Debug)]
pub struct RegimeTracker {
    window: usize,
    observations: HashMap<String, VecDeque<Observation>>,
}

impl Default for RegimeTracker {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

impl RegimeTracker {
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(2),
            observations: HashMap::new(),
        }
    }

    /// Appends an observation for a pair, discarding the oldest entry once
    /// the window is full. Non-finite inputs are ignored.
    pub fn observe(&mut self, pair: &str, price: f64, volume: f64) {
        if !price.is_finite() || price <= 0.0 || !volume.is_finite() || volume < 0.0 {
            return;
        }
        let series = self
            .observations
            .entry(pair.to_string())
            .or_insert_with(|| VecDeque::with_capacity(self.window));
        if series.len() == self.window {
            series.pop_front();
        }
        series.push_back(Observation { price, volume });
    }

    pub fn observation_count(&self, pair: &str) -> usize {
        self.observations.get(pair).map_or(0, |s| s.len())
    }

    /// Classifies the current regime for a pair; `None` until at least two
    /// observations exist.
    pub fn snapshot(&self, pair: &str) -> Option<RegimeSnapshot> {
        let series = self.observations.get(pair)?;
        if series.len() < 2 {
            return None;
        }
        let prices: Vec<f64> = series.iter().map(|o| o.price).collect();
        let volumes: Vec<f64> = series.iter().map(|o| o.volume).collect();

        Some(RegimeSnapshot {
            volatility_class: classify_volatility(&prices),
            liquidity_class: classify_liquidity(&volumes),
            trend_class: classify_trend(&prices),
        })
    }
}

/// Volatility class by the standard deviation of log-returns over the
/// window, bucketed at fixed quintile thresholds.
fn classify_volatility(prices: &[f64]) -> VolatilityClass {
    let log_returns: Vec<f64> = prices.windows(2).map(|w| (w[1] / w[0]).ln()).collect();
    let sigma = stats::std_dev(&log_returns);
    if sigma < 0.001 {
        VolatilityClass::VeryLow
    } else if sigma < 0.005 {
        VolatilityClass::Low
    } else if sigma < 0.015 {
        VolatilityClass::Moderate
    } else if sigma < 0.04 {
        VolatilityClass::High
    } else {
        VolatilityClass::VeryHigh
    }
}

/// Liquidity class by the quintile rank of the latest volume within the
/// window's volume distribution.
fn classify_liquidity(volumes: &[f64]) -> LiquidityClass {
    let Some(&latest) = volumes.last() else {
        return LiquidityClass::Normal;
    };
    let below = volumes.iter().filter(|&&v| v < latest).count();
    let rank = below as f64 / volumes.len() as f64;
    if rank < 0.2 {
        LiquidityClass::Drought
    } else if rank < 0.4 {
        LiquidityClass::Thin
    } else if rank < 0.6 {
        LiquidityClass::Normal
    } else if rank < 0.8 {
        LiquidityClass::Deep
    } else {
        LiquidityClass::Abundant
    }
}

/// Trend class by the gap between the short and long moving averages,
/// scaled by the price dispersion of the window.
fn classify_trend(prices: &[f64]) -> TrendClass {
    let sma = |n: usize| {
        let tail = &prices[prices.len().saturating_sub(n)..];
        stats::mean(tail)
    };
    let sigma = stats::std_dev(prices);
    if sigma <= 0.0 {
        return TrendClass::Flat;
    }
    let t = (sma(SMA_SHORT) - sma(SMA_LONG)) / sigma;
    if t < -2.0 {
        TrendClass::StrongDown
    } else if t < -0.5 {
        TrendClass::Down
    } else if t <= 0.5 {
        TrendClass::Flat
    } else if t <= 2.0 {
        TrendClass::Up
    } else {
        TrendClass::StrongUp
    }
}
