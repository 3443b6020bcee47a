//! Convex power-law price impact.

use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

/// Per-hop slippage model: `impact = k * (volume / liquidity)^alpha`,
/// clamped to [0, 0.5].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImpactModel {
    pub k: f64,
    pub alpha: f64,
}

impl Default for ImpactModel {
    fn default() -> Self {
        Self { k: 0.5, alpha: 1.5 }
    }
}

impl ImpactModel {
    pub fn new(k: f64, alpha: f64) -> Self {
        Self { k, alpha }
    }

    /// Fractional price impact for trading `volume` against `liquidity`.
    pub fn impact(&self, volume: f64, liquidity: f64) -> f64 {
        if volume <= 0.0 {
            return 0.0;
        }
        if liquidity <= 0.0 {
            // No depth at all: worst representable impact.
            return 0.5;
        }
        (self.k * (volume / liquidity).powf(self.alpha)).clamp(0.0, 0.5)
    }

    /// Impact expressed in basis points.
    pub fn impact_bps(&self, volume: f64, liquidity: f64) -> f64 {
        10_000.0 * self.impact(volume, liquidity)
    }

    /// Fraction of the available liquidity consumed by the trade.
    pub fn utilization(&self, volume: f64, liquidity: f64) -> f64 {
        if liquidity <= 0.0 {
            f64::INFINITY
        } else {
            volume / liquidity
        }
    }

    /// Rate after fee and impact degradation.
    pub fn effective_rate(&self, rate: f64, fee: f64, volume: f64, liquidity: f64) -> f64 {
        rate * (1.0 - fee) * (1.0 - self.impact(volume, liquidity))
    }

    /// Directional variant: multiplies the effective rate by a volatility
    /// noise term `(1 + eps)`, `eps ~ N(0, sigma^2)`.
    pub fn effective_rate_noisy<R: Rng>(
        &self,
        rate: f64,
        fee: f64,
        volume: f64,
        liquidity: f64,
        sigma: f64,
        rng: &mut R,
    ) -> f64 {
        let noise = match Normal::new(0.0, sigma) {
            Ok(dist) => dist.sample(rng),
            Err(_) => 0.0,
        };
        self.effective_rate(rate, fee, volume, liquidity) * (1.0 + noise)
    }

    /// Full breakdown for the `market_impact` operation, including the
    /// comparison curve at scaled trade volumes. The declared volatility
    /// widens a two-sigma band around the impacted price; at zero
    /// volatility the band collapses onto it.
    pub fn breakdown(
        &self,
        volume: f64,
        liquidity: f64,
        base_price: f64,
        volatility: f64,
    ) -> ImpactBreakdown {
        const MULTIPLIERS: [f64; 7] = [0.1, 0.25, 0.5, 1.0, 2.0, 5.0, 10.0];

        let impact = self.impact(volume, liquidity);
        let impacted_price = base_price * (1.0 + impact);
        let band = 2.0 * volatility;
        ImpactBreakdown {
            impact_pct: impact * 100.0,
            impact_bps: self.impact_bps(volume, liquidity),
            impacted_price,
            price_increase: impacted_price - base_price,
            price_band_low: (impacted_price * (1.0 - band)).max(0.0),
            price_band_high: impacted_price * (1.0 + band),
            utilization_pct: self.utilization(volume, liquidity) * 100.0,
            comparison_data: MULTIPLIERS
                .iter()
                .map(|&m| ImpactCurvePoint {
                    volume_multiplier: m,
                    impact_pct: self.impact(volume * m, liquidity) * 100.0,
                })
                .collect(),
        }
    }
}

/// One point of the impact comparison curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImpactCurvePoint {
    pub volume_multiplier: f64,
    pub impact_pct: f64,
}

/// Derived quantities for a single trade against a pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactBreakdown {
    pub impact_pct: f64,
    pub impact_bps: f64,
    pub impacted_price: f64,
    pub price_increase: f64,
    /// Two-sigma band around the impacted price under the declared
    /// volatility.
    pub price_band_low: f64,
    pub price_band_high: f64,
    pub utilization_pct: f64,
    pub comparison_data: Vec<ImpactCurvePoint>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_impact_defaults() {
        let model = ImpactModel::default();
        // k * (v/l)^alpha = 0.5 * 0.01^1.5 = 0.0005
        assert_relative_eq!(model.impact(100.0, 10_000.0), 0.0005, epsilon = 1e-12);
        assert_relative_eq!(model.impact_bps(100.0, 10_000.0), 5.0, epsilon = 1e-9);
    }

    #[test]
    fn test_impact_is_clamped() {
        let model = ImpactModel::default();
        assert_eq!(model.impact(1e9, 1.0), 0.5);
        assert_eq!(model.impact(0.0, 1.0), 0.0);
        assert_eq!(model.impact(100.0, 0.0), 0.5);
    }

    #[test]
    fn test_impact_is_convex_in_volume() {
        let model = ImpactModel::default();
        let a = model.impact(100.0, 1e6);
        let b = model.impact(200.0, 1e6);
        // alpha > 1: doubling volume more than doubles impact.
        assert!(b > 2.0 * a);
    }

    #[test]
    fn test_effective_rate_degrades() {
        let model = ImpactModel::default();
        let clean = model.effective_rate(15.0, 0.001, 0.0, 1e6);
        let impacted = model.effective_rate(15.0, 0.001, 1e5, 1e6);
        assert!(impacted < clean);
        assert_relative_eq!(clean, 15.0 * 0.999, epsilon = 1e-12);
    }

    #[test]
    fn test_breakdown_curve_is_monotone() {
        let model = ImpactModel::default();
        let breakdown = model.breakdown(1000.0, 1e6, 100.0, 0.0);
        assert_eq!(breakdown.comparison_data.len(), 7);
        for pair in breakdown.comparison_data.windows(2) {
            assert!(pair[1].impact_pct >= pair[0].impact_pct);
        }
        assert_relative_eq!(breakdown.utilization_pct, 0.1, epsilon = 1e-12);
        assert!(breakdown.impacted_price >= 100.0);
        // No volatility: the band collapses onto the impacted price.
        assert_relative_eq!(breakdown.price_band_low, breakdown.impacted_price);
        assert_relative_eq!(breakdown.price_band_high, breakdown.impacted_price);
    }

    #[test]
    fn test_breakdown_volatility_widens_the_band() {
        let model = ImpactModel::default();
        let breakdown = model.breakdown(1000.0, 1e6, 100.0, 0.05);
        assert!(breakdown.price_band_low < breakdown.impacted_price);
        assert!(breakdown.price_band_high > breakdown.impacted_price);
        assert_relative_eq!(
            breakdown.price_band_high,
            breakdown.impacted_price * 1.1,
            epsilon = 1e-12
        );
        assert_relative_eq!(
            breakdown.price_band_low,
            breakdown.impacted_price * 0.9,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_noisy_rate_with_zero_sigma_is_exact() {
        let model = ImpactModel::default();
        let mut rng = rand::rngs::mock::StepRng::new(0, 1);
        let noisy = model.effective_rate_noisy(15.0, 0.0, 0.0, 1e6, 0.0, &mut rng);
        assert_relative_eq!(noisy, 15.0, epsilon = 1e-12);
    }
}
