//! Capital allocation across surviving cycles.
//!
//! Three assignment strategies share one constraint set: total allocation
//! bounded by the capital, per-cycle fraction bounded by `max_position`,
//! per-cycle amount bounded by the cycle's thinnest hop, and a minimum
//! confidence gate. Every returned plan is re-verified against the
//! constraints; a violation is an internal invariant failure.

use common::errors::EngineError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Tolerances of the constraint verifier.
const FRACTION_EPS: f64 = 1e-9;
const AMOUNT_EPS: f64 = 1e-6;
/// Floor applied to risk in objective denominators.
const RISK_EPS: f64 = 1e-6;

/// Assignment strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocatorMode {
    Greedy,
    Lp,
    RiskParity,
}

impl fmt::Display for AllocatorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AllocatorMode::Greedy => "greedy",
            AllocatorMode::Lp => "lp",
            AllocatorMode::RiskParity => "risk_parity",
        };
        write!(f, "{label}")
    }
}

impl std::str::FromStr for AllocatorMode {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "greedy" => Ok(AllocatorMode::Greedy),
            "lp" => Ok(AllocatorMode::Lp),
            "risk_parity" => Ok(AllocatorMode::RiskParity),
            other => Err(EngineError::InvalidInput(format!(
                "unknown allocator mode {other:?}"
            ))),
        }
    }
}

/// Ranking criterion for the greedy pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankBy {
    #[default]
    Sharpe,
    MeanReturn,
    /// `sharpe * confidence / max(risk, eps)`.
    Composite,
}

/// Per-cycle inputs of the allocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationCandidate {
    /// Canonical cycle index within the scan.
    pub id: usize,
    pub fingerprint: String,
    pub mean_return: f64,
    pub sharpe: f64,
    /// Composite risk score in [0, 100].
    pub risk: f64,
    /// Confidence in [0, 100].
    pub confidence: f64,
    /// Thinnest hop liquidity along the cycle.
    pub min_hop_liquidity: f64,
}

impl AllocationCandidate {
    fn rank_key(&self, rank_by: RankBy) -> f64 {
        match rank_by {
            RankBy::Sharpe => self.sharpe,
            RankBy::MeanReturn => self.mean_return,
            RankBy::Composite => self.sharpe * self.confidence / self.risk.max(RISK_EPS),
        }
    }

    /// Per-unit-capital objective coefficient of the LP.
    fn objective_density(&self) -> f64 {
        self.mean_return * self.confidence / self.risk.max(RISK_EPS)
    }
}

/// Caps and gates applied by every mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocatorConfig {
    /// Maximum fraction of the capital per cycle.
    pub max_position: f64,
    /// Candidates below this confidence are not funded.
    pub min_confidence: f64,
    pub rank_by: RankBy,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            max_position: 0.3,
            min_confidence: 50.0,
            rank_by: RankBy::default(),
        }
    }
}

/// One funded cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationEntry {
    pub id: usize,
    pub fingerprint: String,
    /// Fraction of the capital, in [0, max_position].
    pub fraction: f64,
    pub amount: f64,
}

/// Ordered assignment of capital fractions to cycles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationPlan {
    pub mode: AllocatorMode,
    pub capital: f64,
    pub entries: Vec<AllocationEntry>,
    pub total_allocated: f64,
    /// Value of the LP objective under this plan.
    pub objective_value: f64,
}

impl AllocationPlan {
    pub fn total_fraction(&self) -> f64 {
        self.entries.iter().map(|e| e.fraction).sum()
    }
}

/// Greedy, LP and risk-parity capital assignment.
#[derive(Debug, Clone, Default)]
pub struct CapitalAllocator {
    config: AllocatorConfig,
}

impl CapitalAllocator {
    pub fn new(config: AllocatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AllocatorConfig {
        &self.config
    }

    /// Produces a plan for the requested mode and verifies it against the
    /// constraint set. Verification failure is fatal.
    pub fn allocate(
        &self,
        capital: f64,
        candidates: &[AllocationCandidate],
        mode: AllocatorMode,
    ) -> Result<AllocationPlan, EngineError> {
        if !capital.is_finite() || capital <= 0.0 {
            return Err(EngineError::InvalidInput(format!(
                "capital must be a finite positive number, got {capital}"
            )));
        }

        let mut eligible: Vec<&AllocationCandidate> = candidates
            .iter()
            .filter(|c| c.confidence >= self.config.min_confidence)
            .collect();

        let entries = match mode {
            AllocatorMode::Greedy => {
                sort_descending(&mut eligible, |c| c.rank_key(self.config.rank_by));
                self.fill(capital, &eligible)
            }
            AllocatorMode::Lp => {
                // One budget row plus per-variable box constraints: the
                // simplex optimum is the density-ordered fill, with zero
                // weight on non-positive objective coefficients.
                eligible.retain(|c| c.objective_density() > 0.0);
                sort_descending(&mut eligible, |c| c.objective_density());
                self.fill(capital, &eligible)
            }
            AllocatorMode::RiskParity => {
                sort_descending(&mut eligible, |c| c.confidence);
                self.fill_risk_parity(capital, &eligible)
            }
        };

        let objective_value = entries
            .iter()
            .map(|e| {
                let candidate = candidates
                    .iter()
                    .find(|c| c.id == e.id)
                    .expect("entry derived from candidates");
                e.amount * candidate.objective_density()
            })
            .sum();

        let plan = AllocationPlan {
            mode,
            capital,
            total_allocated: entries.iter().map(|e| e.amount).sum(),
            entries,
            objective_value,
        };
        self.verify(&plan, candidates)?;
        Ok(plan)
    }

    /// Greedy fill in the given order: each cycle takes the minimum of the
    /// remaining capital, the position cap and its liquidity cap.
    fn fill(&self, capital: f64, ordered: &[&AllocationCandidate]) -> Vec<AllocationEntry> {
        let position_cap = self.config.max_position * capital;
        let mut remaining = capital;
        let mut entries = Vec::new();
        for candidate in ordered {
            if remaining <= 0.0 {
                break;
            }
            let amount = remaining
                .min(position_cap)
                .min(candidate.min_hop_liquidity);
            if amount <= 0.0 {
                continue;
            }
            remaining -= amount;
            entries.push(AllocationEntry {
                id: candidate.id,
                fingerprint: candidate.fingerprint.clone(),
                fraction: amount / capital,
                amount,
            });
        }
        entries
    }

    /// Equal risk contribution: `amount_i * risk_i` is constant across the
    /// chosen set, which is grown in descending confidence order until a
    /// new member would force the contribution to zero.
    fn fill_risk_parity(
        &self,
        capital: f64,
        ordered: &[&AllocationCandidate],
    ) -> Vec<AllocationEntry> {
        let position_cap = self.config.max_position * capital;
        let mut chosen: Vec<&AllocationCandidate> = Vec::new();
        let mut best: Vec<AllocationEntry> = Vec::new();

        for candidate in ordered {
            chosen.push(candidate);

            // The common risk contribution t gives amount_i = t / risk_i;
            // t is capped by the budget and by each member's caps.
            let inv_risk_sum: f64 = chosen.iter().map(|c| 1.0 / c.risk.max(RISK_EPS)).sum();
            let mut t = capital / inv_risk_sum;
            for member in &chosen {
                let cap = position_cap.min(member.min_hop_liquidity);
                t = t.min(cap * member.risk.max(RISK_EPS));
            }
            if t <= 0.0 {
                chosen.pop();
                break;
            }

            best = chosen
                .iter()
                .map(|member| {
                    let amount = t / member.risk.max(RISK_EPS);
                    AllocationEntry {
                        id: member.id,
                        fingerprint: member.fingerprint.clone(),
                        fraction: amount / capital,
                        amount,
                    }
                })
                .collect();
        }
        best
    }

    /// Re-checks every constraint; any violation is an engine bug.
    fn verify(
        &self,
        plan: &AllocationPlan,
        candidates: &[AllocationCandidate],
    ) -> Result<(), EngineError> {
        if plan.total_fraction() > 1.0 + FRACTION_EPS {
            return Err(EngineError::Internal(format!(
                "allocation plan assigns {:.6} of the capital",
                plan.total_fraction()
            )));
        }
        for entry in &plan.entries {
            if entry.fraction < 0.0 || entry.fraction > self.config.max_position + FRACTION_EPS {
                return Err(EngineError::Internal(format!(
                    "cycle {} funded at fraction {:.6} outside [0, {}]",
                    entry.id, entry.fraction, self.config.max_position
                )));
            }
            let candidate = candidates.iter().find(|c| c.id == entry.id).ok_or_else(|| {
                EngineError::Internal(format!("plan references unknown cycle {}", entry.id))
            })?;
            if entry.amount > candidate.min_hop_liquidity + AMOUNT_EPS {
                return Err(EngineError::Internal(format!(
                    "cycle {} funded beyond its thinnest hop ({} > {})",
                    entry.id, entry.amount, candidate.min_hop_liquidity
                )));
            }
            if candidate.confidence < self.config.min_confidence {
                return Err(EngineError::Internal(format!(
                    "cycle {} funded below the confidence gate",
                    entry.id
                )));
            }
        }
        Ok(())
    }
}

/// Stable descending sort: ties resolve by ascending id so plans are
/// deterministic.
fn sort_descending<F: Fn(&AllocationCandidate) -> f64>(
    candidates: &mut [&AllocationCandidate],
    key: F,
) {
    candidates.sort_by(|a, b| {
        key(b)
            .partial_cmp(&key(a))
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.id.cmp(&b.id))
    });
}
