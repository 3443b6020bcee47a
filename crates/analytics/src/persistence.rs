//! Opportunity persistence tracking.
//!
//! A process-wide map from cycle fingerprint to lifetime statistics.
//! Writes happen only at scan boundaries; the engine wraps the tracker in
//! a reader-writer lock for the single-writer / multi-reader discipline.

use chrono::{DateTime, Duration, Utc};
use common::types::CycleFingerprint;
use serde::{Deserialize, Serialize};
use simulator::stats;
use std::collections::{HashMap, VecDeque};

/// Default record eviction horizon: 30 minutes without a sighting.
pub const DEFAULT_TTL_SECS: i64 = 30 * 60;

/// Bounded length of the rolling return ring.
pub const RETURN_RING_CAPACITY: usize = 128;

/// Lifetime statistics of one recurring opportunity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpportunityRecord {
    pub fingerprint: CycleFingerprint,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub detection_count: u64,
    pub peak_return: f64,
    pub peak_at: DateTime<Utc>,
    /// Rolling window of observed returns, oldest first.
    returns: VecDeque<f64>,
}

impl OpportunityRecord {
    fn new(fingerprint: CycleFingerprint, observed_return: f64, now: DateTime<Utc>) -> Self {
        let mut returns = VecDeque::with_capacity(RETURN_RING_CAPACITY);
        returns.push_back(observed_return);
        Self {
            fingerprint,
            first_seen: now,
            last_seen: now,
            detection_count: 1,
            peak_return: observed_return,
            peak_at: now,
            returns,
        }
    }

    fn observe(&mut self, observed_return: f64, now: DateTime<Utc>) {
        self.last_seen = now;
        self.detection_count += 1;
        if observed_return > self.peak_return {
            self.peak_return = observed_return;
            self.peak_at = now;
        }
        if self.returns.len() == RETURN_RING_CAPACITY {
            self.returns.pop_front();
        }
        self.returns.push_back(observed_return);
    }

    /// Seconds between the first and the most recent sighting.
    pub fn lifespan_secs(&self) -> f64 {
        (self.last_seen - self.first_seen).num_milliseconds() as f64 / 1000.0
    }

    pub fn returns(&self) -> impl Iterator<Item = f64> + '_ {
        self.returns.iter().copied()
    }

    /// Per-opportunity Sharpe over the rolling returns.
    pub fn sharpe(&self) -> Option<f64> {
        let window: Vec<f64> = self.returns.iter().copied().collect();
        let sd = stats::std_dev(&window);
        (sd > 0.0).then(|| stats::mean(&window) / sd)
    }
}

/// How the rolling returns of an opportunity evolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DecayPattern {
    /// Returns shrink scan over scan.
    Monotonic,
    /// Returns grow scan over scan.
    Improving,
    /// Frequent sign flips in the increments.
    Oscillating,
    /// No meaningful movement.
    Stable,
}

/// Composite persistence score: frequency (0-40) + duration (0-40) +
/// stability (0-20).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PersistenceScore {
    pub frequency: f64,
    pub duration: f64,
    pub stability: f64,
    pub total: f64,
}

/// Summary across all live records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistenceSummary {
    pub active_records: usize,
    pub avg_lifespan_secs: f64,
    pub avg_detection_count: f64,
}

/// Fingerprint-keyed store of opportunity records.
#[derive(Debug, Default)]
pub struct PersistenceTracker {
    records: HashMap<CycleFingerprint, OpportunityRecord>,
}

impl PersistenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the record on first sight, updates it afterwards.
    pub fn record_observation(
        &mut self,
        fingerprint: &CycleFingerprint,
        observed_return: f64,
        now: DateTime<Utc>,
    ) {
        match self.records.get_mut(fingerprint) {
            Some(record) => record.observe(observed_return, now),
            None => {
                self.records.insert(
                    fingerprint.clone(),
                    OpportunityRecord::new(fingerprint.clone(), observed_return, now),
                );
            }
        }
    }

    /// Evicts records not seen within `ttl`. Returns the eviction count.
    pub fn prune(&mut self, now: DateTime<Utc>, ttl: Duration) -> usize {
        let before = self.records.len();
        self.records.retain(|_, record| record.last_seen + ttl >= now);
        let evicted = before - self.records.len();
        if evicted > 0 {
            log::debug!("persistence tracker evicted {evicted} stale record(s)");
        }
        evicted
    }

    pub fn get(&self, fingerprint: &CycleFingerprint) -> Option<&OpportunityRecord> {
        self.records.get(fingerprint)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Composite persistence score of a tracked opportunity.
    pub fn score(&self, fingerprint: &CycleFingerprint) -> Option<PersistenceScore> {
        let record = self.records.get(fingerprint)?;

        let frequency = (record.detection_count as f64 * 2.0).min(40.0);
        let duration = (record.lifespan_secs() / DEFAULT_TTL_SECS as f64 * 40.0).min(40.0);

        let window: Vec<f64> = record.returns.iter().copied().collect();
        let mean = stats::mean(&window);
        let stability = if mean.abs() > f64::EPSILON {
            let cv = stats::std_dev(&window) / mean.abs();
            ((100.0 - cv * 100.0) / 5.0).clamp(0.0, 20.0)
        } else {
            0.0
        };

        Some(PersistenceScore {
            frequency,
            duration,
            stability,
            total: frequency + duration + stability,
        })
    }

    /// Classifies the shape of the rolling return series.
    pub fn decay_pattern(&self, fingerprint: &CycleFingerprint) -> Option<DecayPattern> {
        let record = self.records.get(fingerprint)?;
        let window: Vec<f64> = record.returns.iter().copied().collect();
        if window.len() < 2 {
            return Some(DecayPattern::Stable);
        }

        let mean = stats::mean(&window);
        let spread = window.iter().cloned().fold(f64::MIN, f64::max)
            - window.iter().cloned().fold(f64::MAX, f64::min);
        if spread <= 0.05 * mean.abs().max(1e-9) {
            return Some(DecayPattern::Stable);
        }

        let diffs: Vec<f64> = window.windows(2).map(|w| w[1] - w[0]).collect();
        let falling = diffs.iter().filter(|&&d| d < 0.0).count();
        let rising = diffs.iter().filter(|&&d| d > 0.0).count();
        if rising == 0 && falling > 0 {
            return Some(DecayPattern::Monotonic);
        }
        if falling == 0 && rising > 0 {
            return Some(DecayPattern::Improving);
        }

        let flips = diffs
            .windows(2)
            .filter(|w| w[0].signum() != w[1].signum() && w[0] != 0.0 && w[1] != 0.0)
            .count();
        if flips * 2 >= diffs.len().saturating_sub(1) {
            Some(DecayPattern::Oscillating)
        } else if falling > rising {
            Some(DecayPattern::Monotonic)
        } else {
            Some(DecayPattern::Improving)
        }
    }

    pub fn summary(&self) -> PersistenceSummary {
        let n = self.records.len();
        if n == 0 {
            return PersistenceSummary {
                active_records: 0,
                avg_lifespan_secs: 0.0,
                avg_detection_count: 0.0,
            };
        }
        PersistenceSummary {
            active_records: n,
            avg_lifespan_secs: self.records.values().map(|r| r.lifespan_secs()).sum::<f64>()
                / n as f64,
            avg_detection_count: self
                .records
                .values()
                .map(|r| r.detection_count as f64)
                .sum::<f64>()
                / n as f64,
        }
    }
}
