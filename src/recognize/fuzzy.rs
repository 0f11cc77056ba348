//! Fuzzy matcher: best-first search tolerating stop words and missing
//! tokens.
//!
//! Frontier items are expanded from a binary heap keyed on
//! `(cost, remaining tokens, path probability, insertion order)`, so cost
//! ties break on path probability before insertion order. Skipping an input
//! token
//! costs `stop_cost` and is only allowed for stop words; traversing a word
//! edge without consuming input costs `missing_cost`; the final cost adds
//! `(1 - path probability) * weight_cost` so down-weighted branches rank
//! below preferred ones. The search is deterministic for identical inputs.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::collections::HashSet;
use std::time::Instant;

use ahash::AHashMap;

use crate::graph::{EdgeRef, IntentGraph, NodeId, INTENT_PREFIX};

/// Cost schedule for the fuzzy matcher.
#[derive(Clone, Copy, Debug)]
pub struct CostConfig {
    /// Cost of consuming a stop word without matching an edge.
    pub stop_cost: f64,
    /// Cost of traversing a word edge absent from the input.
    pub missing_cost: f64,
    /// Scale of the `(1 - path probability)` term added on acceptance.
    pub weight_cost: f64,
}

impl Default for CostConfig {
    fn default() -> Self {
        CostConfig {
            stop_cost: 1.0,
            missing_cost: 10.0,
            weight_cost: 0.5,
        }
    }
}

pub(crate) struct FuzzyOptions<'a> {
    pub stop_words: &'a HashSet<String>,
    pub intent_filter: Option<&'a dyn Fn(&str) -> bool>,
    pub word_transform: Option<&'a dyn Fn(&str) -> String>,
    pub costs: CostConfig,
    /// Emit up to this many ranked results; `None` emits best-cost ties only.
    pub max_recognitions: Option<usize>,
    pub deadline: Option<Instant>,
}

/// An accepted fuzzy path with its total cost and path probability.
pub(crate) struct FuzzyPath {
    pub trace: Vec<EdgeRef>,
    pub cost: f64,
    pub probability: f64,
}

struct SearchItem {
    cost: f64,
    remaining: usize,
    /// Running path probability (product of weight-to-best-sibling ratios).
    probability: f64,
    order: u64,
    node: NodeId,
    position: usize,
    trace: Vec<EdgeRef>,
    /// True once the final cost (including the weight term) is known.
    accept: bool,
}

impl PartialEq for SearchItem {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SearchItem {}

impl PartialOrd for SearchItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SearchItem {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap: reverse for lowest-cost-first. Cost
        // ties break on path probability (higher first), then insertion
        // order.
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.remaining.cmp(&self.remaining))
            .then_with(|| self.probability.total_cmp(&other.probability))
            .then_with(|| other.order.cmp(&self.order))
    }
}

/// Bound on equal-cost frontier items per `(node, position)` state, so that
/// ambiguous epsilon diamonds cannot multiply without limit.
const MAX_COST_TIES: usize = 8;

/// Best-first search over the graph, returning accepted paths ordered by
/// `(cost, insertion order)`.
pub(crate) fn paths_fuzzy(
    graph: &IntentGraph,
    tokens: &[String],
    options: &FuzzyOptions<'_>,
) -> Vec<FuzzyPath> {
    if tokens.is_empty() {
        return Vec::new();
    }

    let transform = |word: &str| match options.word_transform {
        Some(f) => f(word),
        None => word.to_string(),
    };
    let tokens: Vec<String> = tokens.iter().map(|t| transform(t)).collect();
    let total = tokens.len();

    let mut heap: BinaryHeap<SearchItem> = BinaryHeap::new();
    let mut order: u64 = 0;
    // (node, position) -> (best cost, pushes at that cost)
    let mut best_costs: AHashMap<(NodeId, usize), (f64, usize)> = AHashMap::new();

    fn push(
        heap: &mut BinaryHeap<SearchItem>,
        best_costs: &mut AHashMap<(NodeId, usize), (f64, usize)>,
        order: &mut u64,
        mut item: SearchItem,
    ) {
        if !item.accept {
            let entry = best_costs
                .entry((item.node, item.position))
                .or_insert((f64::INFINITY, 0));
            if item.cost < entry.0 - 1e-9 {
                *entry = (item.cost, 1);
            } else if item.cost <= entry.0 + 1e-9 {
                if entry.1 >= MAX_COST_TIES {
                    return;
                }
                entry.1 += 1;
            } else {
                // Strictly worse than an existing path to this state
                return;
            }
        }
        item.order = *order;
        *order += 1;
        heap.push(item);
    }

    push(
        &mut heap,
        &mut best_costs,
        &mut order,
        SearchItem {
            cost: 0.0,
            remaining: total,
            probability: 1.0,
            order: 0,
            node: graph.start_node(),
            position: 0,
            trace: Vec::new(),
            accept: false,
        },
    );

    let mut results: Vec<FuzzyPath> = Vec::new();
    let mut best_accept_cost: Option<f64> = None;

    while let Some(item) = heap.pop() {
        if options
            .deadline
            .is_some_and(|deadline| Instant::now() >= deadline)
        {
            // Out of time: report the best found so far
            break;
        }

        if item.accept {
            match options.max_recognitions {
                Some(max) => {
                    results.push(FuzzyPath {
                        trace: item.trace,
                        cost: item.cost,
                        probability: item.probability,
                    });
                    if results.len() >= max {
                        break;
                    }
                }
                None => {
                    // Only paths tied with the best cost
                    if let Some(best) = best_accept_cost {
                        if item.cost > best + 1e-9 {
                            break;
                        }
                    } else {
                        best_accept_cost = Some(item.cost);
                    }
                    results.push(FuzzyPath {
                        trace: item.trace,
                        cost: item.cost,
                        probability: item.probability,
                    });
                }
            }
            continue;
        }

        if graph.node(item.node).end_of_sentence
            && item.position == total
            && !item.trace.is_empty()
        {
            let weight_penalty = (1.0 - item.probability) * options.costs.weight_cost;
            push(
                &mut heap,
                &mut best_costs,
                &mut order,
                SearchItem {
                    cost: item.cost + weight_penalty,
                    remaining: 0,
                    probability: item.probability,
                    order: 0,
                    node: item.node,
                    position: item.position,
                    trace: item.trace.clone(),
                    accept: true,
                },
            );
        }

        // Skip a stop word without matching anything
        if item.position < total && options.stop_words.contains(&tokens[item.position]) {
            push(
                &mut heap,
                &mut best_costs,
                &mut order,
                SearchItem {
                    cost: item.cost + options.costs.stop_cost,
                    remaining: total - item.position - 1,
                    probability: item.probability,
                    order: 0,
                    node: item.node,
                    position: item.position + 1,
                    trace: item.trace.clone(),
                    accept: false,
                },
            );
        }

        let siblings = graph.edges_from(item.node);
        let best_weight = siblings.iter().map(|e| e.weight).fold(0.0, f64::max);

        for (index, edge) in siblings.iter().enumerate() {
            if let Some(intent_name) = edge.olabel.strip_prefix(INTENT_PREFIX) {
                if let Some(filter) = options.intent_filter {
                    if !filter(intent_name) {
                        continue;
                    }
                }
            }

            let edge_ref = EdgeRef {
                from: item.node,
                index,
            };
            let mut next_trace = item.trace.clone();
            next_trace.push(edge_ref);

            // Each step contributes its weight relative to the best sibling
            let next_probability = if best_weight > 0.0 {
                item.probability * (edge.weight / best_weight)
            } else {
                item.probability
            };

            if edge.ilabel.is_empty() {
                push(
                    &mut heap,
                    &mut best_costs,
                    &mut order,
                    SearchItem {
                        cost: item.cost,
                        remaining: total - item.position,
                        probability: next_probability,
                        order: 0,
                        node: edge.to,
                        position: item.position,
                        trace: next_trace,
                        accept: false,
                    },
                );
                continue;
            }

            let matched =
                item.position < total && transform(&edge.ilabel) == tokens[item.position];
            if matched {
                push(
                    &mut heap,
                    &mut best_costs,
                    &mut order,
                    SearchItem {
                        cost: item.cost,
                        remaining: total - item.position - 1,
                        probability: next_probability,
                        order: 0,
                        node: edge.to,
                        position: item.position + 1,
                        trace: next_trace,
                        accept: false,
                    },
                );
            } else {
                // Required graph word missing from the input
                push(
                    &mut heap,
                    &mut best_costs,
                    &mut order,
                    SearchItem {
                        cost: item.cost + options.costs.missing_cost,
                        remaining: total - item.position,
                        probability: next_probability,
                        order: 0,
                        node: edge.to,
                        position: item.position,
                        trace: next_trace,
                        accept: false,
                    },
                );
            }
        }
    }

    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expand::expand;
    use crate::graph::compile;
    use crate::template::parse;

    fn compile_text(text: &str) -> IntentGraph {
        let grammar = parse(text).unwrap();
        let expanded = expand(&grammar, &Default::default()).unwrap();
        compile(&expanded).unwrap()
    }

    fn tokens(text: &str) -> Vec<String> {
        text.split_whitespace().map(str::to_string).collect()
    }

    fn search(graph: &IntentGraph, utterance: &str, stop: &HashSet<String>) -> Vec<FuzzyPath> {
        let options = FuzzyOptions {
            stop_words: stop,
            intent_filter: None,
            word_transform: None,
            costs: CostConfig::default(),
            max_recognitions: None,
            deadline: None,
        };
        paths_fuzzy(graph, &tokens(utterance), &options)
    }

    #[test]
    fn test_exact_match_costs_zero() {
        let graph = compile_text("[TestIntent]\nthis is a test\n");
        let paths = search(&graph, "this is a test", &HashSet::new());
        assert_eq!(paths.len(), 1);
        assert!(paths[0].cost.abs() < 1e-9);
    }

    #[test]
    fn test_stop_word_skip() {
        let graph = compile_text("[SetColor]\nset light to (red | green | blue)\n");
        let stop: HashSet<String> = ["that".to_string()].into_iter().collect();
        let paths = search(&graph, "set that light to red", &stop);
        assert_eq!(paths.len(), 1);
        assert!((paths[0].cost - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_extra_non_stop_token_fails() {
        let graph = compile_text("[SetColor]\nset light to (red | green | blue)\n");
        let paths = search(&graph, "set light to purple", &HashSet::new());
        assert!(paths.is_empty());
    }

    #[test]
    fn test_missing_token_cost() {
        let graph = compile_text("[SetColor]\nset light to red\n");
        let paths = search(&graph, "set light red", &HashSet::new());
        assert_eq!(paths.len(), 1);
        assert!((paths[0].cost - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_weighted_branch_penalty() {
        let graph = compile_text("[SetColor]\n(2 red | 1 blue)\n");

        let best = search(&graph, "red", &HashSet::new());
        assert_eq!(best.len(), 1);
        assert!(best[0].cost.abs() < 1e-9);

        // blue matches at half the best branch probability
        let worse = search(&graph, "blue", &HashSet::new());
        assert_eq!(worse.len(), 1);
        assert!((worse[0].cost - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_tied_intents_both_returned() {
        let graph = compile_text("[A]\nhello there\n[B]\nhello there\n");
        let paths = search(&graph, "hello there", &HashSet::new());
        assert_eq!(paths.len(), 2);
    }

    #[test]
    fn test_cost_ties_break_on_probability() {
        // Two branches match the same word at different weights. With the
        // weight term zeroed out both accepts cost the same, so ordering
        // falls to path probability.
        let graph = compile_text("[SetColor]\n(2 red | 1 red)\n");
        let stop = HashSet::new();
        let options = FuzzyOptions {
            stop_words: &stop,
            intent_filter: None,
            word_transform: None,
            costs: CostConfig {
                weight_cost: 0.0,
                ..CostConfig::default()
            },
            max_recognitions: None,
            deadline: None,
        };

        let paths = paths_fuzzy(&graph, &tokens("red"), &options);
        assert_eq!(paths.len(), 2);
        assert!((paths[0].cost - paths[1].cost).abs() < 1e-9);

        // The heavier branch sorts first
        assert!(paths[0].probability > paths[1].probability);
        assert!((paths[0].probability - 1.0).abs() < 1e-9);
        assert!((paths[1].probability - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_empty_tokens() {
        let graph = compile_text("[A]\nhello\n");
        assert!(search(&graph, "", &HashSet::new()).is_empty());
    }
}
