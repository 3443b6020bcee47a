//! Sample statistics shared by the simulator and the analytics layers.

use serde::{Deserialize, Serialize};

/// Distributional summary of a return sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleStats {
    pub mean: f64,
    /// Bessel-corrected sample standard deviation.
    pub std_dev: f64,
    pub median: f64,
    pub p5: f64,
    pub p95: f64,
    /// Empirical `P[return < 0]`.
    pub prob_loss: f64,
    /// `mean / std_dev`; undefined when the sample has no spread.
    pub sharpe: Option<f64>,
    pub fraction_profitable: f64,
}

/// Arithmetic mean; 0 for an empty slice.
pub fn mean(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().sum::<f64>() / samples.len() as f64
}

/// Bessel-corrected standard deviation; 0 for fewer than two samples.
pub fn std_dev(samples: &[f64]) -> f64 {
    if samples.len() < 2 {
        return 0.0;
    }
    let m = mean(samples);
    let var = samples.iter().map(|x| (x - m) * (x - m)).sum::<f64>() / (samples.len() - 1) as f64;
    var.sqrt()
}

/// Percentile by linear interpolation over a sorted slice, `q` in [0, 1].
pub fn percentile(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let rank = q.clamp(0.0, 1.0) * (n - 1) as f64;
            let lo = rank.floor() as usize;
            let hi = rank.ceil() as usize;
            let frac = rank - lo as f64;
            sorted[lo] + (sorted[hi] - sorted[lo]) * frac
        }
    }
}

/// Summarizes a sample; `None` when it is empty.
pub fn summarize(samples: &[f64]) -> Option<SampleStats> {
    if samples.is_empty() {
        return None;
    }
    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let mean = mean(samples);
    let std_dev = std_dev(samples);
    let losses = samples.iter().filter(|&&x| x < 0.0).count();
    let gains = samples.iter().filter(|&&x| x > 0.0).count();

    Some(SampleStats {
        mean,
        std_dev,
        median: percentile(&sorted, 0.5),
        p5: percentile(&sorted, 0.05),
        p95: percentile(&sorted, 0.95),
        prob_loss: losses as f64 / samples.len() as f64,
        sharpe: (std_dev > 0.0).then(|| mean / std_dev),
        fraction_profitable: gains as f64 / samples.len() as f64,
    })
}
