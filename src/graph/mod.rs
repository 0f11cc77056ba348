//! Compiled sentence graph.
//!
//! All sentence templates compile into one directed acyclic graph: a single
//! start node branches into per-intent sub-graphs, and every sentence of an
//! intent terminates at that intent's end-of-sentence node. Edges carry an
//! input label (matched against spoken tokens), an output label (emitted
//! text or a `__`-prefixed marker), and a probability weight.
//!
//! The graph is backed by a node arena and flat per-node edge lists, which
//! keeps the matcher loops free of pointer chasing and ownership cycles. It
//! is immutable after compilation and freely shareable across threads.

pub mod compile;
pub mod fst;

pub use compile::compile;
pub use fst::{graph_to_fst, graph_to_fsts, GraphFst, GraphFsts};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Olabel prefix naming the intent on the edge leaving the start node.
pub const INTENT_PREFIX: &str = "__label__";
/// Olabel prefix opening an entity span.
pub const TAG_BEGIN_PREFIX: &str = "__begin__";
/// Olabel prefix closing an entity span.
pub const TAG_END_PREFIX: &str = "__end__";
/// Olabel prefix opening a converter scope.
pub const CONVERT_BEGIN_PREFIX: &str = "__convert__";
/// Olabel prefix closing a converter scope.
pub const CONVERT_END_PREFIX: &str = "__converted__";

/// Stable integer node identifier.
pub type NodeId = usize;

/// A graph node.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Raw word on the edge entering this node, for word-level views.
    pub word: Option<String>,
    /// Intent whose sub-graph this node belongs to.
    pub intent: Option<String>,
    /// True for the single start node.
    pub start: bool,
    /// True for an intent's end-of-sentence node.
    pub end_of_sentence: bool,
}

/// A directed edge. Empty labels are epsilon.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    /// Target node.
    pub to: NodeId,
    /// Input label matched against spoken tokens; empty for epsilon.
    pub ilabel: String,
    /// Output label; empty for epsilon, `__`-prefixed for markers.
    pub olabel: String,
    /// Probability weight; outgoing weights of a node sum to 1.
    pub weight: f64,
}

/// Position of an edge in the graph, usable as a trace element.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeRef {
    /// Source node.
    pub from: NodeId,
    /// Index into the source node's outgoing edge list.
    pub index: usize,
}

/// The compiled sentence graph.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IntentGraph {
    nodes: Vec<Node>,
    /// Outgoing edges, indexed by source node.
    edges: Vec<Vec<Edge>>,
    start: NodeId,
}

impl IntentGraph {
    pub(crate) fn new() -> Self {
        let mut graph = IntentGraph {
            nodes: Vec::new(),
            edges: Vec::new(),
            start: 0,
        };
        let start = graph.add_node(Node {
            start: true,
            ..Node::default()
        });
        graph.start = start;
        graph
    }

    pub(crate) fn add_node(&mut self, node: Node) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(node);
        self.edges.push(Vec::new());
        id
    }

    pub(crate) fn add_edge(
        &mut self,
        from: NodeId,
        to: NodeId,
        ilabel: impl Into<String>,
        olabel: impl Into<String>,
        weight: f64,
    ) {
        // Node ids are created in topological order
        debug_assert!(from < to, "edge must point forward");
        self.edges[from].push(Edge {
            to,
            ilabel: ilabel.into(),
            olabel: olabel.into(),
            weight,
        });
    }

    pub(crate) fn set_edge_weight(&mut self, from: NodeId, index: usize, weight: f64) {
        self.edges[from][index].weight = weight;
    }

    /// Scale outgoing weights so each node's sum is 1.
    pub(crate) fn finish(&mut self) {
        for edges in &mut self.edges {
            let total: f64 = edges.iter().map(|e| e.weight).sum();
            if total > 0.0 {
                for edge in edges.iter_mut() {
                    edge.weight /= total;
                }
            }
        }
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when the graph has no nodes beyond the start node.
    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    /// The single start node.
    pub fn start_node(&self) -> NodeId {
        self.start
    }

    /// Node data by id.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    /// Outgoing edges of a node.
    pub fn edges_from(&self, id: NodeId) -> &[Edge] {
        &self.edges[id]
    }

    /// Edge data behind a trace element.
    pub fn edge(&self, edge_ref: EdgeRef) -> &Edge {
        &self.edges[edge_ref.from][edge_ref.index]
    }

    /// Probability of a traced path, normalized against the best available
    /// choice at every branch point. Each step contributes its weight
    /// divided by the largest sibling weight, so any exact match through a
    /// uniformly-weighted grammar scores 1 and explicitly down-weighted
    /// branches score proportionally less.
    pub fn path_probability(&self, trace: &[EdgeRef]) -> f64 {
        let mut probability = 1.0;
        for edge_ref in trace {
            let siblings = &self.edges[edge_ref.from];
            let best = siblings.iter().map(|e| e.weight).fold(0.0, f64::max);
            if best > 0.0 {
                probability *= siblings[edge_ref.index].weight / best;
            }
        }
        probability
    }

    /// Names of all intents, in compile order.
    pub fn intent_names(&self) -> Vec<String> {
        self.edges[self.start]
            .iter()
            .filter_map(|edge| edge.olabel.strip_prefix(INTENT_PREFIX))
            .map(str::to_string)
            .collect()
    }
}

/// True for `__`-prefixed olabels, which are never part of the output text.
pub fn is_meta_label(olabel: &str) -> bool {
    olabel.starts_with("__")
}

/// Serialize a compiled graph to a JSON value.
pub fn graph_to_json(graph: &IntentGraph) -> Result<serde_json::Value> {
    Ok(serde_json::to_value(graph)?)
}

/// Deserialize a compiled graph from a JSON value.
pub fn json_to_graph(json: &serde_json::Value) -> Result<IntentGraph> {
    Ok(serde_json::from_value(json.clone())?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_word_graph() -> IntentGraph {
        let mut graph = IntentGraph::new();
        let a = graph.add_node(Node::default());
        let b = graph.add_node(Node {
            end_of_sentence: true,
            ..Node::default()
        });
        graph.add_edge(graph.start_node(), a, "hello", "hello", 1.0);
        graph.add_edge(a, b, "world", "world", 1.0);
        graph.finish();
        graph
    }

    #[test]
    fn test_weight_normalization() {
        let mut graph = IntentGraph::new();
        let a = graph.add_node(Node::default());
        let b = graph.add_node(Node::default());
        graph.add_edge(graph.start_node(), a, "", "", 3.0);
        graph.add_edge(graph.start_node(), b, "", "", 1.0);
        graph.finish();

        let weights: Vec<f64> = graph
            .edges_from(graph.start_node())
            .iter()
            .map(|e| e.weight)
            .collect();
        assert_eq!(weights, vec![0.75, 0.25]);
    }

    #[test]
    fn test_path_probability_exact() {
        let graph = two_word_graph();
        let trace = vec![
            EdgeRef {
                from: graph.start_node(),
                index: 0,
            },
            EdgeRef { from: 1, index: 0 },
        ];
        assert!((graph.path_probability(&trace) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_json_round_trip() {
        let graph = two_word_graph();
        let json = graph_to_json(&graph).unwrap();
        let restored = json_to_graph(&json).unwrap();
        assert_eq!(graph, restored);
    }
}
