use analytics::persistence::PersistenceSummary;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Process-wide scan counters. Updated atomically at the end of each
/// successful scan; failed scans leave them untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineMetrics {
    pub total_scans: u64,
    pub total_cycles_found: u64,
    pub total_detection_time_ms: f64,
    pub last_scan_at: Option<DateTime<Utc>>,
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commits one finished scan.
    pub fn record_scan(&mut self, cycles_found: usize, detection_time_ms: f64, now: DateTime<Utc>) {
        self.total_scans += 1;
        self.total_cycles_found += cycles_found as u64;
        self.total_detection_time_ms += detection_time_ms;
        self.last_scan_at = Some(now);
    }

    pub fn avg_detection_time_ms(&self) -> f64 {
        if self.total_scans == 0 {
            0.0
        } else {
            self.total_detection_time_ms / self.total_scans as f64
        }
    }
}

/// Snapshot returned by the `metrics` operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsReport {
    pub total_scans: u64,
    pub total_cycles_found: u64,
    pub avg_detection_time_ms: f64,
    pub last_scan_at: Option<DateTime<Utc>>,
    pub persistence: PersistenceSummary,
    /// Capital-weighted mean of per-opportunity Sharpe ratios over the
    /// last allocation; absent without one.
    pub portfolio_sharpe: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_scan_accumulates() {
        let mut metrics = EngineMetrics::new();
        let now = Utc::now();
        metrics.record_scan(3, 12.0, now);
        metrics.record_scan(1, 4.0, now);

        assert_eq!(metrics.total_scans, 2);
        assert_eq!(metrics.total_cycles_found, 4);
        assert_eq!(metrics.avg_detection_time_ms(), 8.0);
        assert_eq!(metrics.last_scan_at, Some(now));
    }

    #[test]
    fn test_avg_detection_time_of_no_scans() {
        assert_eq!(EngineMetrics::new().avg_detection_time_ms(), 0.0);
    }
}
