//! Property tests for the engine-wide invariants.

use analytics::allocator::{
    AllocationCandidate, AllocatorConfig, AllocatorMode, CapitalAllocator,
};
use analytics::risk::{RiskEngine, RiskInputs, RiskLevel};
use common::types::{Edge, HalfLife};
use detector::{CycleDetector, EdgePruner, PruneConfig, RateGraph};
use proptest::prelude::*;
use std::collections::HashSet;

const TOKENS: [&str; 5] = ["BTC", "ETH", "USDT", "SOL", "AVAX"];

fn arb_edge() -> impl Strategy<Value = Edge> {
    (
        0usize..TOKENS.len(),
        0usize..TOKENS.len(),
        0.05f64..20.0,
        0.0f64..0.05,
        100.0f64..1e6,
        0usize..2,
    )
        .prop_filter("self-loops excluded", |(from, to, ..)| from != to)
        .prop_map(|(from, to, rate, fee, liquidity, venue)| {
            Edge::new(
                TOKENS[from],
                TOKENS[to],
                rate,
                fee,
                liquidity,
                if venue == 0 { "venue-a" } else { "venue-b" },
            )
        })
}

fn arb_market() -> impl Strategy<Value = Vec<Edge>> {
    proptest::collection::vec(arb_edge(), 1..20)
}

fn arb_candidate(id: usize) -> impl Strategy<Value = AllocationCandidate> {
    (
        -0.01f64..0.05,
        -1.0f64..4.0,
        0.0f64..100.0,
        0.0f64..100.0,
        10.0f64..1e5,
    )
        .prop_map(move |(mean, sharpe, risk, confidence, liquidity)| AllocationCandidate {
            id,
            fingerprint: format!("FP{id}"),
            mean_return: mean,
            sharpe,
            risk,
            confidence,
            min_hop_liquidity: liquidity,
        })
}

fn arb_candidates() -> impl Strategy<Value = Vec<AllocationCandidate>> {
    (1usize..10).prop_flat_map(|n| (0..n).map(arb_candidate).collect::<Vec<_>>())
}

proptest! {
    /// Invariants 1-3: every emitted cycle is a closed, strictly
    /// profitable path with a unique fingerprint.
    #[test]
    fn detected_cycles_are_closed_profitable_and_distinct(edges in arb_market()) {
        let graph = RateGraph::from_edges(edges);
        let cycles = CycleDetector::with_defaults().detect(&graph);

        let mut fingerprints = HashSet::new();
        for cycle in &cycles {
            prop_assert!(cycle.is_well_formed());
            prop_assert_eq!(cycle.path_length, cycle.edge_ids.len());
            prop_assert!(cycle.log_profit < 0.0);
            prop_assert!(cycle.raw_profit > 0.0);
            // raw_profit > 0 <=> log_profit < 0 within relative tolerance.
            let implied = (-cycle.log_profit).exp() - 1.0;
            let tolerance = 1e-9 * (1.0 + cycle.raw_profit.abs());
            prop_assert!((implied - cycle.raw_profit).abs() <= tolerance);
            prop_assert!(fingerprints.insert(cycle.fingerprint()));
        }
    }

    /// Invariant 9: pruning an already pruned graph removes nothing.
    #[test]
    fn pruner_is_idempotent(
        edges in arb_market(),
        min_liquidity in proptest::option::of(100.0f64..5e5),
        max_fee in proptest::option::of(0.001f64..0.04),
    ) {
        let config = PruneConfig {
            min_liquidity,
            max_fee,
            min_rate: None,
            max_rate: None,
        };
        let pruner = EdgePruner::new(config);
        let graph = RateGraph::from_edges(edges);

        let once = pruner.prune(&graph);
        let twice = pruner.prune(&once.graph);
        prop_assert_eq!(twice.removed, 0);
        prop_assert_eq!(once.graph.edge_count(), twice.graph.edge_count());
        prop_assert_eq!(once.graph.node_count(), twice.graph.node_count());
    }

    /// Invariant 7: the composite risk and all components stay in
    /// [0, 100], and the level bucket is monotone in the composite.
    #[test]
    fn risk_composite_is_bounded(
        capital in 1.0f64..1e7,
        liquidity in 0.0f64..1e7,
        path_length in 1usize..12,
        sigma in 0.0f64..0.5,
        half_life_ms in 0.0f64..2000.0,
        spread in 0.0f64..2.0,
    ) {
        let profile = RiskEngine::new().assess(&RiskInputs {
            capital,
            min_hop_liquidity: liquidity,
            path_length,
            mean_hop_sigma: sigma,
            half_life: HalfLife::Bounded(half_life_ms),
            spread_pct: spread,
        });
        for component in [
            profile.liquidity,
            profile.complexity,
            profile.volatility,
            profile.execution,
            profile.spread,
            profile.composite,
        ] {
            prop_assert!((0.0..=100.0).contains(&component));
        }
        prop_assert!((profile.confidence - (100.0 - profile.composite)).abs() < 1e-9);
    }

    /// Level buckets never move down as the composite moves up.
    #[test]
    fn risk_levels_are_monotone(a in 0.0f64..100.0, b in 0.0f64..100.0) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        let rank = |level: RiskLevel| match level {
            RiskLevel::VeryLow => 0,
            RiskLevel::Low => 1,
            RiskLevel::Moderate => 2,
            RiskLevel::High => 3,
            RiskLevel::VeryHigh => 4,
        };
        prop_assert!(rank(RiskLevel::from_composite(lo)) <= rank(RiskLevel::from_composite(hi)));
    }

    /// Invariant 5: every plan satisfies the caps, and the LP mode never
    /// trails greedy on the LP objective.
    #[test]
    fn allocation_plans_respect_all_caps(
        candidates in arb_candidates(),
        capital in 100.0f64..1e6,
    ) {
        let config = AllocatorConfig::default();
        let allocator = CapitalAllocator::new(config.clone());

        let mut objectives = std::collections::HashMap::new();
        for mode in [AllocatorMode::Greedy, AllocatorMode::Lp, AllocatorMode::RiskParity] {
            let plan = allocator.allocate(capital, &candidates, mode).unwrap();
            prop_assert!(plan.total_fraction() <= 1.0 + 1e-9);
            for entry in &plan.entries {
                prop_assert!(entry.fraction >= 0.0);
                prop_assert!(entry.fraction <= config.max_position + 1e-9);
                let candidate = candidates.iter().find(|c| c.id == entry.id).unwrap();
                prop_assert!(entry.amount <= candidate.min_hop_liquidity + 1e-6);
                prop_assert!(candidate.confidence >= config.min_confidence);
            }
            objectives.insert(mode, plan.objective_value);
        }
        prop_assert!(objectives[&AllocatorMode::Lp] >= objectives[&AllocatorMode::Greedy] - 1e-9);
    }
}
