use common::types::{Edge, Token};
use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use std::collections::HashMap;

/// Directed multigraph of exchange-rate edges.
///
/// Tokens are kept in insertion order and are unique by symbol; edges are
/// kept in insertion order and are immutable once added. Parallel edges
/// between the same token pair (different venues) are allowed and explored
/// independently. Edge weights are never cached; they are recomputed from
/// the edge attributes on demand.
#[derive(Clone, Debug, Default)]
pub struct RateGraph {
    graph: DiGraph<Token, Edge>,
    index: HashMap<Token, NodeIndex>,
}

impl RateGraph {
    pub fn new() -> Self {
        RateGraph {
            graph: DiGraph::new(),
            index: HashMap::new(),
        }
    }

    /// Builds a graph from a batch of edges, creating tokens as they
    /// first appear.
    pub fn from_edges(edges: impl IntoIterator<Item = Edge>) -> Self {
        let mut graph = Self::new();
        for edge in edges {
            graph.add_edge(edge);
        }
        graph
    }

    /// Adds a token and returns its stable index. Idempotent: repeating a
    /// symbol returns the existing index.
    pub fn add_token(&mut self, token: impl Into<Token>) -> NodeIndex {
        let token = token.into();
        if let Some(&idx) = self.index.get(&token) {
            return idx;
        }
        let idx = self.graph.add_node(token.clone());
        self.index.insert(token, idx);
        idx
    }

    /// Adds an edge, implicitly creating missing endpoint tokens, and
    /// returns the edge index.
    pub fn add_edge(&mut self, edge: Edge) -> EdgeIndex {
        let from = self.add_token(edge.from_token.clone());
        let to = self.add_token(edge.to_token.clone());
        self.graph.add_edge(from, to, edge)
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn token(&self, node: NodeIndex) -> &Token {
        &self.graph[node]
    }

    pub fn node_of(&self, token: &Token) -> Option<NodeIndex> {
        self.index.get(token).copied()
    }

    pub fn edge(&self, edge: EdgeIndex) -> &Edge {
        &self.graph[edge]
    }

    /// Endpoint node indices of an edge.
    pub fn endpoints(&self, edge: EdgeIndex) -> (NodeIndex, NodeIndex) {
        self.graph
            .edge_endpoints(edge)
            .expect("edge index out of bounds")
    }

    /// Tokens in insertion order.
    pub fn tokens(&self) -> impl Iterator<Item = &Token> {
        self.graph.node_weights()
    }

    /// The global edge list in insertion order: `(edge, from, to, data)`.
    pub fn edges(&self) -> impl Iterator<Item = (EdgeIndex, NodeIndex, NodeIndex, &Edge)> {
        self.graph
            .edge_references()
            .map(|e| (e.id(), e.source(), e.target(), e.weight()))
    }

    /// Outgoing edge indices of a node, ascending by insertion order.
    pub fn outgoing(&self, node: NodeIndex) -> Vec<EdgeIndex> {
        let mut out: Vec<EdgeIndex> = self.graph.edges(node).map(|e| e.id()).collect();
        // petgraph yields most-recently-inserted first
        out.sort_unstable();
        out
    }

    /// All edge indices connecting `from` to `to`, ascending by insertion
    /// order.
    pub fn connecting(&self, from: NodeIndex, to: NodeIndex) -> Vec<EdgeIndex> {
        let mut out: Vec<EdgeIndex> = self.graph.edges_connecting(from, to).map(|e| e.id()).collect();
        out.sort_unstable();
        out
    }

    /// True when the node has neither incoming nor outgoing edges.
    pub fn is_isolated(&self, node: NodeIndex) -> bool {
        use petgraph::Direction;
        self.graph
            .edges_directed(node, Direction::Outgoing)
            .next()
            .is_none()
            && self
                .graph
                .edges_directed(node, Direction::Incoming)
                .next()
                .is_none()
    }
}
