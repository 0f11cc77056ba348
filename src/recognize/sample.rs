//! Sentence sampling: enumerate accepted sentences by walking the graph.

use std::collections::HashMap;

use log::warn;

use crate::graph::{EdgeRef, IntentGraph, INTENT_PREFIX};
use crate::recognize::converter::{ConverterResolver, ConverterTable};
use crate::recognize::recognition::{trace_to_recognition, Recognition};

/// Generate up to `max_per_intent` sentences for every intent (`None`
/// enumerates all of them). Sampled sentences are ordinary recognitions,
/// with substitutions and converters applied.
pub fn sample_by_intent(
    graph: &IntentGraph,
    max_per_intent: Option<usize>,
) -> HashMap<String, Vec<Recognition>> {
    let table = ConverterTable::defaults();
    let resolver = ConverterResolver::new(&table, None);
    let mut sampled: HashMap<String, Vec<Recognition>> = HashMap::new();

    let start = graph.start_node();
    for (index, edge) in graph.edges_from(start).iter().enumerate() {
        let Some(intent_name) = edge.olabel.strip_prefix(INTENT_PREFIX) else {
            continue;
        };

        let mut sentences: Vec<Recognition> = Vec::new();
        // Depth-first walk; edges reversed so sentences come out in
        // template order
        let mut stack: Vec<(usize, Vec<EdgeRef>)> =
            vec![(edge.to, vec![EdgeRef { from: start, index }])];

        while let Some((node, trace)) = stack.pop() {
            if max_per_intent.is_some_and(|max| sentences.len() >= max) {
                break;
            }

            if graph.node(node).end_of_sentence {
                match trace_to_recognition(graph, &trace, &resolver) {
                    Ok(recognition) => sentences.push(recognition),
                    Err(err) => warn!("dropping sampled sentence: {err}"),
                }
                continue;
            }

            for (edge_index, next_edge) in graph.edges_from(node).iter().enumerate().rev() {
                let mut next_trace = trace.clone();
                next_trace.push(EdgeRef {
                    from: node,
                    index: edge_index,
                });
                stack.push((next_edge.to, next_trace));
            }
        }

        sampled.insert(intent_name.to_string(), sentences);
    }

    sampled
}
