//! Profitable-cycle enumeration via repeated log-space Bellman-Ford.

use crate::deduplicator::CycleDeduplicator;
use crate::graph::RateGraph;
use common::types::Cycle;
use petgraph::graph::{EdgeIndex, NodeIndex};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Configuration for the cycle detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Stop after this many distinct cycles across all sources.
    pub max_cycles: usize,
    /// Minimum raw profit for a cycle to be emitted. Guards against paths
    /// recovered with a log-profit of zero up to rounding drift.
    pub min_profit: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            max_cycles: 10,
            min_profit: 1e-9,
        }
    }
}

/// Negative-cycle search over the rate graph.
///
/// Runs one Bellman-Ford pass per candidate source node (node-index order),
/// recovers any reachable negative cycle, and deduplicates the results by
/// fingerprint. O(|V| * |E|) per source; deterministic for identical inputs.
pub struct CycleDetector {
    config: DetectorConfig,
}

impl CycleDetector {
    /// Creates a new detector with the given configuration.
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    /// Creates a new detector with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(DetectorConfig::default())
    }

    /// Enumerates profitable cycles.
    ///
    /// An empty graph or a graph without a negative cycle yields an empty
    /// list. Detection wall time is attributed proportionally to each
    /// emitted cycle.
    pub fn detect(&self, graph: &RateGraph) -> Vec<Cycle> {
        let started = Instant::now();
        let n = graph.node_count();
        if n == 0 {
            return Vec::new();
        }

        // Weights resolved once per call from the edge attributes.
        let edges: Vec<(EdgeIndex, usize, usize, f64)> = graph
            .edges()
            .map(|(id, from, to, edge)| (id, from.index(), to.index(), edge.log_weight()))
            .collect();

        let mut dedup = CycleDeduplicator::new();
        let mut cycles: Vec<Cycle> = Vec::new();

        'sources: for source in 0..n {
            if cycles.len() >= self.config.max_cycles {
                break;
            }

            let mut dist = vec![f64::INFINITY; n];
            let mut parent: Vec<Option<EdgeIndex>> = vec![None; n];
            dist[source] = 0.0;

            // |V| - 1 relaxation passes over the global edge list.
            for _ in 0..n.saturating_sub(1) {
                let mut relaxed = false;
                for &(id, from, to, w) in &edges {
                    if !dist[from].is_finite() || !w.is_finite() {
                        continue;
                    }
                    let candidate = dist[from] + w;
                    if candidate < dist[to] {
                        dist[to] = candidate;
                        parent[to] = Some(id);
                        relaxed = true;
                    }
                }
                if !relaxed {
                    break;
                }
            }

            // One more pass, updates applied: anything that still relaxes
            // sits on (or hangs off) a reachable negative cycle, and the
            // updated parent links are guaranteed to close over it.
            let mut entries: Vec<usize> = Vec::new();
            for &(id, from, to, w) in &edges {
                if dist[from].is_finite() && w.is_finite() && dist[from] + w < dist[to] {
                    dist[to] = dist[from] + w;
                    parent[to] = Some(id);
                    entries.push(to);
                }
            }

            for entry in entries {
                if cycles.len() >= self.config.max_cycles {
                    break 'sources;
                }
                if let Some(cycle) = self.recover_cycle(graph, &parent, entry, n) {
                    if cycle.raw_profit > self.config.min_profit
                        && cycle.log_profit < 0.0
                        && !dedup.is_duplicate(&cycle)
                    {
                        cycles.push(cycle);
                    }
                }
            }
        }

        let total_ms = started.elapsed().as_secs_f64() * 1000.0;
        if !cycles.is_empty() {
            let share = total_ms / cycles.len() as f64;
            for cycle in &mut cycles {
                cycle.detection_time_ms = share;
            }
        }
        log::debug!(
            "detected {} cycle(s) in {:.3}ms over {} nodes / {} edges",
            cycles.len(),
            total_ms,
            n,
            edges.len()
        );
        cycles
    }

    /// Recovers the cycle reachable backwards from `entry`.
    ///
    /// The relaxing node is only guaranteed to be *reachable from* the
    /// cycle, so the parent pointer is first applied |V| times to land on a
    /// node that is definitely on it; the parent chain is then walked until
    /// that node repeats.
    fn recover_cycle(
        &self,
        graph: &RateGraph,
        parent: &[Option<EdgeIndex>],
        entry: usize,
        n: usize,
    ) -> Option<Cycle> {
        let source_of = |e: EdgeIndex| graph.endpoints(e).0.index();

        let mut on_cycle = entry;
        for _ in 0..n {
            on_cycle = source_of(parent[on_cycle]?);
        }

        // Walk the parent chain backwards from `on_cycle` until it closes.
        let mut back_edges: Vec<EdgeIndex> = Vec::new();
        let mut current = on_cycle;
        loop {
            let edge = parent[current]?;
            back_edges.push(edge);
            current = source_of(edge);
            if current == on_cycle {
                break;
            }
            if back_edges.len() > n {
                // Parent chain failed to close; corrupted by a second cycle.
                return None;
            }
        }
        back_edges.reverse();

        let start = NodeIndex::new(on_cycle);
        let mut path = vec![graph.token(start).clone()];
        let mut raw = 1.0_f64;
        let mut log_profit = 0.0_f64;
        for &edge_id in &back_edges {
            let edge = graph.edge(edge_id);
            raw *= edge.effective_rate();
            log_profit += edge.log_weight();
            path.push(graph.token(graph.endpoints(edge_id).1).clone());
        }
        if !raw.is_finite() || !log_profit.is_finite() {
            return None;
        }

        let path_length = back_edges.len();
        Some(Cycle {
            path,
            edge_ids: back_edges.iter().map(|e| e.index()).collect(),
            raw_profit: raw - 1.0,
            log_profit,
            path_length,
            detection_time_ms: 0.0,
        })
    }
}
