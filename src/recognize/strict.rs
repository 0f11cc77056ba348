//! Strict matcher: layered breadth-first search for exact token sequences.

use std::collections::HashSet;
use std::collections::VecDeque;

use crate::graph::{EdgeRef, IntentGraph, NodeId, INTENT_PREFIX};

pub(crate) struct StrictOptions<'a> {
    /// Graph words that may be skipped without consuming input.
    pub exclude_tokens: Option<&'a HashSet<String>>,
    /// Stop after this many accepted paths.
    pub max_paths: Option<usize>,
    pub intent_filter: Option<&'a dyn Fn(&str) -> bool>,
    pub word_transform: Option<&'a dyn Fn(&str) -> String>,
}

/// Find every path that consumes exactly the given tokens, as edge traces.
pub(crate) fn paths_strict(
    graph: &IntentGraph,
    tokens: &[String],
    options: &StrictOptions<'_>,
) -> Vec<Vec<EdgeRef>> {
    if tokens.is_empty() {
        return Vec::new();
    }

    let transform = |word: &str| match options.word_transform {
        Some(f) => f(word),
        None => word.to_string(),
    };
    let tokens: Vec<String> = tokens.iter().map(|t| transform(t)).collect();

    let mut paths = Vec::new();
    let mut queue: VecDeque<(NodeId, usize, Vec<EdgeRef>)> =
        VecDeque::from([(graph.start_node(), 0, Vec::new())]);

    while let Some((node, position, trace)) = queue.pop_front() {
        if graph.node(node).end_of_sentence && position == tokens.len() {
            paths.push(trace.clone());
            if options
                .max_paths
                .is_some_and(|max| paths.len() >= max)
            {
                break;
            }
        }

        for (index, edge) in graph.edges_from(node).iter().enumerate() {
            if let Some(intent_name) = edge.olabel.strip_prefix(INTENT_PREFIX) {
                if let Some(filter) = options.intent_filter {
                    if !filter(intent_name) {
                        continue;
                    }
                }
            }

            let edge_ref = EdgeRef { from: node, index };
            let mut next_trace = trace.clone();
            next_trace.push(edge_ref);

            if edge.ilabel.is_empty() {
                queue.push_back((edge.to, position, next_trace));
                continue;
            }

            let ilabel = transform(&edge.ilabel);
            if position < tokens.len() && ilabel == tokens[position] {
                // Token match
                queue.push_back((edge.to, position + 1, next_trace));
            } else if options
                .exclude_tokens
                .is_some_and(|exclude| exclude.contains(&edge.ilabel))
            {
                // A skippable graph word: traverse without consuming
                queue.push_back((edge.to, position, next_trace));
            }
        }
    }

    paths
}
