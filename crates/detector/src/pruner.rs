use crate::graph::RateGraph;
use serde::{Deserialize, Serialize};

/// Thresholds for removing edges that cannot participate in a viable
/// arbitrage. Each bound is independently enableable; `None` disables it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PruneConfig {
    pub min_liquidity: Option<f64>,
    pub max_fee: Option<f64>,
    pub min_rate: Option<f64>,
    pub max_rate: Option<f64>,
}

impl PruneConfig {
    pub fn with_min_liquidity(mut self, min: f64) -> Self {
        self.min_liquidity = Some(min);
        self
    }

    pub fn with_max_fee(mut self, max: f64) -> Self {
        self.max_fee = Some(max);
        self
    }

    pub fn with_rate_bounds(mut self, min: f64, max: f64) -> Self {
        self.min_rate = Some(min);
        self.max_rate = Some(max);
        self
    }

    fn keeps(&self, edge: &common::types::Edge) -> bool {
        if let Some(min) = self.min_liquidity {
            if edge.liquidity < min {
                return false;
            }
        }
        if let Some(max) = self.max_fee {
            if edge.fee > max {
                return false;
            }
        }
        if let Some(min) = self.min_rate {
            if edge.rate < min {
                return false;
            }
        }
        if let Some(max) = self.max_rate {
            if edge.rate > max {
                return false;
            }
        }
        true
    }
}

/// Result of a prune pass.
#[derive(Debug, Clone)]
pub struct PruneOutcome {
    pub graph: RateGraph,
    /// Number of edges removed.
    pub removed: usize,
    /// True when a token lost all of its edges and node indices had to be
    /// reassigned.
    pub reindexed: bool,
}

/// Filters a graph down to the edges that pass the configured bounds.
///
/// Pruning is a pure function of the configuration: the same graph and the
/// same config always produce the same outcome, and pruning an already
/// pruned graph removes nothing.
#[derive(Debug, Clone, Default)]
pub struct EdgePruner {
    config: PruneConfig,
}

impl EdgePruner {
    pub fn new(config: PruneConfig) -> Self {
        Self { config }
    }

    /// Produces the pruned graph. Node identity (indices) is preserved
    /// unless some token becomes disconnected, in which case the surviving
    /// tokens are re-indexed in their original insertion order.
    pub fn prune(&self, graph: &RateGraph) -> PruneOutcome {
        let kept: Vec<common::types::Edge> = graph
            .edges()
            .filter(|(_, _, _, e)| self.config.keeps(e))
            .map(|(_, _, _, e)| e.clone())
            .collect();
        let removed = graph.edge_count() - kept.len();

        // Rebuild with every original token first so indices are preserved,
        // then check whether any token ended up isolated.
        let mut pruned = RateGraph::new();
        for token in graph.tokens() {
            pruned.add_token(token.clone());
        }
        for edge in &kept {
            pruned.add_edge(edge.clone());
        }

        let has_isolated = (0..pruned.node_count())
            .any(|i| pruned.is_isolated(petgraph::graph::NodeIndex::new(i)));
        if !has_isolated {
            return PruneOutcome {
                graph: pruned,
                removed,
                reindexed: false,
            };
        }

        // Some token became disconnected: drop it and re-index by rebuilding
        // from the surviving edges alone (insertion order of first use).
        log::debug!("pruner re-indexing: at least one token lost all edges");
        PruneOutcome {
            graph: RateGraph::from_edges(kept),
            removed,
            reindexed: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::types::{Edge, Token};

    fn triangle() -> Vec<Edge> {
        vec![
            Edge::new("BTC", "ETH", 15.0, 0.0, 1e6, "binance"),
            Edge::new("ETH", "USDT", 2500.0, 0.0, 1e6, "binance"),
            Edge::new("USDT", "BTC", 1.0 / (15.0 * 2500.0 * 1.01), 0.0, 1e6, "binance"),
        ]
    }

    #[test]
    fn test_disabled_config_removes_nothing() {
        let graph = RateGraph::from_edges(triangle());
        let outcome = EdgePruner::new(PruneConfig::default()).prune(&graph);
        assert_eq!(outcome.removed, 0);
        assert!(!outcome.reindexed);
        assert_eq!(outcome.graph.edge_count(), 3);
    }

    #[test]
    fn test_thin_edge_is_pruned_and_reindexes() {
        let mut edges = triangle();
        edges.push(Edge::new("BTC", "XYZ", 1.0, 0.0, 10.0, "binance"));
        let graph = RateGraph::from_edges(edges);
        assert_eq!(graph.node_count(), 4);

        let pruner = EdgePruner::new(PruneConfig::default().with_min_liquidity(100.0));
        let outcome = pruner.prune(&graph);
        assert_eq!(outcome.removed, 1);
        // XYZ lost its only edge, so the graph re-indexes without it.
        assert!(outcome.reindexed);
        assert_eq!(outcome.graph.node_count(), 3);
        assert!(outcome.graph.node_of(&Token::from("XYZ")).is_none());
    }

    #[test]
    fn test_indices_preserved_when_no_disconnect() {
        let mut edges = triangle();
        // Parallel edge that will be pruned; both endpoints keep other edges.
        edges.push(Edge::new("BTC", "ETH", 14.9, 0.0, 50.0, "thin-venue"));
        let graph = RateGraph::from_edges(edges);

        let pruner = EdgePruner::new(PruneConfig::default().with_min_liquidity(100.0));
        let outcome = pruner.prune(&graph);
        assert_eq!(outcome.removed, 1);
        assert!(!outcome.reindexed);
        for token in graph.tokens() {
            assert_eq!(graph.node_of(token), outcome.graph.node_of(token));
        }
    }

    #[test]
    fn test_fee_and_rate_bounds() {
        let edges = vec![
            Edge::new("A", "B", 2.0, 0.5, 1e6, "x"),
            Edge::new("B", "A", 0.6, 0.001, 1e6, "x"),
            Edge::new("A", "B", 1e9, 0.001, 1e6, "x"),
        ];
        let graph = RateGraph::from_edges(edges);
        let pruner = EdgePruner::new(
            PruneConfig::default()
                .with_max_fee(0.1)
                .with_rate_bounds(1e-6, 1e6),
        );
        let outcome = pruner.prune(&graph);
        assert_eq!(outcome.removed, 2);
        assert_eq!(outcome.graph.edge_count(), 1);
    }

    #[test]
    fn test_prune_is_idempotent() {
        let mut edges = triangle();
        edges.push(Edge::new("BTC", "XYZ", 1.0, 0.0, 10.0, "binance"));
        let graph = RateGraph::from_edges(edges);

        let pruner = EdgePruner::new(PruneConfig::default().with_min_liquidity(100.0));
        let once = pruner.prune(&graph);
        let twice = pruner.prune(&once.graph);
        assert_eq!(twice.removed, 0);
        assert!(!twice.reindexed);
        assert_eq!(once.graph.edge_count(), twice.graph.edge_count());
        assert_eq!(once.graph.node_count(), twice.graph.node_count());
    }
}
