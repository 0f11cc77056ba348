//! Path-weighted n-gram counts over the compiled graph.
//!
//! Epsilon nodes are clipped out of the graph to leave only words, padded
//! with sentence-boundary symbols. An n-gram's count is the number of
//! accepted sentences it appears in, computed from upward/downward path
//! counts instead of enumerating sentences.

use std::collections::HashMap;

use ahash::AHashMap;

use crate::graph::{IntentGraph, NodeId};

/// N-gram counts per intent, keyed by token tuple.
pub type NgramCounts = HashMap<String, HashMap<Vec<String>, usize>>;

/// Count n-grams of the given order for every intent.
///
/// `pad_start` and `pad_end` are the sentence-boundary symbols (commonly
/// `<s>` and `</s>`).
pub fn ngram_counts(
    graph: &IntentGraph,
    order: usize,
    pad_start: &str,
    pad_end: &str,
) -> NgramCounts {
    assert!(order > 0, "order must be greater than zero");

    let word_graph = WordGraph::build(graph, pad_start, pad_end);
    let mut counts = NgramCounts::new();

    for intent_name in graph.intent_names() {
        let subgraph = word_graph.restrict(graph, &intent_name);
        counts.insert(intent_name, count_ngrams(&subgraph, order));
    }

    counts
}

/// A word-only view of the sentence graph: epsilon nodes clipped, start and
/// end-of-sentence nodes relabeled as padding.
struct WordGraph {
    /// Node id to word; `None` for clipped nodes.
    words: Vec<Option<String>>,
    /// Word-to-word successors, bypassing clipped nodes.
    successors: Vec<Vec<NodeId>>,
    start: NodeId,
}

impl WordGraph {
    fn build(graph: &IntentGraph, pad_start: &str, pad_end: &str) -> Self {
        let len = graph.len();
        let mut words: Vec<Option<String>> = vec![None; len];
        for id in 0..len {
            let node = graph.node(id);
            if node.start {
                words[id] = Some(pad_start.to_string());
            } else if node.end_of_sentence {
                words[id] = Some(pad_end.to_string());
            } else {
                words[id] = node.word.clone();
            }
        }

        // Nearest worded descendants, in reverse topological (id) order
        let mut reachable: Vec<Vec<NodeId>> = vec![Vec::new(); len];
        for id in (0..len).rev() {
            let mut targets: Vec<NodeId> = Vec::new();
            for edge in graph.edges_from(id) {
                if words[edge.to].is_some() {
                    targets.push(edge.to);
                } else {
                    targets.extend(reachable[edge.to].iter().copied());
                }
            }
            targets.sort_unstable();
            targets.dedup();
            reachable[id] = targets;
        }

        let successors = (0..len)
            .map(|id| {
                if words[id].is_some() {
                    reachable[id].clone()
                } else {
                    Vec::new()
                }
            })
            .collect();

        WordGraph {
            words,
            successors,
            start: graph.start_node(),
        }
    }

    /// Restrict to the start node plus one intent's nodes.
    fn restrict<'a>(&'a self, graph: &'a IntentGraph, intent: &str) -> Subgraph<'a> {
        let valid: Vec<bool> = (0..self.words.len())
            .map(|id| {
                id == self.start
                    || (self.words[id].is_some()
                        && graph.node(id).intent.as_deref() == Some(intent))
            })
            .collect();

        let mut predecessors: Vec<Vec<NodeId>> = vec![Vec::new(); self.words.len()];
        for (from, succs) in self.successors.iter().enumerate() {
            if !valid[from] {
                continue;
            }
            for &to in succs {
                if valid[to] {
                    predecessors[to].push(from);
                }
            }
        }

        Subgraph {
            word_graph: self,
            graph,
            intent: intent.to_string(),
            valid,
            predecessors,
        }
    }
}

struct Subgraph<'a> {
    word_graph: &'a WordGraph,
    graph: &'a IntentGraph,
    intent: String,
    valid: Vec<bool>,
    predecessors: Vec<Vec<NodeId>>,
}

impl Subgraph<'_> {
    fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.valid.len()).filter(|&id| self.valid[id])
    }

    fn word(&self, id: NodeId) -> &str {
        self.word_graph.words[id].as_deref().unwrap_or("")
    }

    fn is_end(&self, id: NodeId) -> bool {
        self.graph.node(id).end_of_sentence
            && self.graph.node(id).intent.as_deref() == Some(self.intent.as_str())
    }
}

/// Up/down path counting: the number of sentences containing an n-gram is
/// (paths from start to its first node) x (paths from its last node to an
/// end of sentence).
fn count_ngrams(subgraph: &Subgraph<'_>, order: usize) -> HashMap<Vec<String>, usize> {
    let len = subgraph.valid.len();
    let mut up: Vec<usize> = vec![0; len];
    let mut down: Vec<usize> = vec![0; len];

    up[subgraph.word_graph.start] = 1;
    for id in subgraph.nodes() {
        for &pred in &subgraph.predecessors[id] {
            up[id] += up[pred];
        }
        // The start node keeps its seed count
        if id == subgraph.word_graph.start {
            up[id] = 1;
        }
    }

    for id in subgraph.nodes().collect::<Vec<_>>().into_iter().rev() {
        if subgraph.is_end(id) {
            down[id] = 1;
            continue;
        }
        for &succ in &subgraph.word_graph.successors[id] {
            if subgraph.valid[succ] {
                down[id] += down[succ];
            }
        }
    }

    let mut counts: AHashMap<Vec<String>, usize> = AHashMap::new();

    for id in subgraph.nodes() {
        if up[id] == 0 || down[id] == 0 {
            continue;
        }

        let unigram = vec![subgraph.word(id).to_string()];
        *counts.entry(unigram.clone()).or_insert(0) += up[id] * down[id];

        if order == 1 {
            continue;
        }

        // Extend backwards through predecessors up to the requested order
        let mut queue: Vec<(NodeId, Vec<String>)> = vec![(id, unigram)];
        while let Some((node, ngram)) = queue.pop() {
            for &pred in &subgraph.predecessors[node] {
                if up[pred] == 0 {
                    continue;
                }
                let mut extended = Vec::with_capacity(ngram.len() + 1);
                extended.push(subgraph.word(pred).to_string());
                extended.extend(ngram.iter().cloned());

                *counts.entry(extended.clone()).or_insert(0) += up[pred] * down[id];

                if extended.len() < order {
                    queue.push((pred, extended));
                }
            }
        }
    }

    counts.into_iter().collect()
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

    fn key(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn test_linear_sentence_bigrams() {
        let graph = compile_text("[TestIntent]\nthis is a test\n");
        let counts = ngram_counts(&graph, 2, "<s>", "</s>");
        let intent = &counts["TestIntent"];

        assert_eq!(intent[&key(&["<s>", "this"])], 1);
        assert_eq!(intent[&key(&["this", "is"])], 1);
        assert_eq!(intent[&key(&["is", "a"])], 1);
        assert_eq!(intent[&key(&["a", "test"])], 1);
        assert_eq!(intent[&key(&["test", "</s>"])], 1);
        assert_eq!(intent[&key(&["test"])], 1);
    }

    #[test]
    fn test_alternative_counts() {
        let graph = compile_text("[SetColor]\n(red | blue) light\n");
        let counts = ngram_counts(&graph, 2, "<s>", "</s>");
        let intent = &counts["SetColor"];

        // Two sentences pass through "light", one through each color
        assert_eq!(intent[&key(&["light"])], 2);
        assert_eq!(intent[&key(&["red"])], 1);
        assert_eq!(intent[&key(&["blue"])], 1);
        assert_eq!(intent[&key(&["red", "light"])], 1);
        assert_eq!(intent[&key(&["<s>"])], 2);
    }

    #[test]
    fn test_intents_counted_separately() {
        let graph = compile_text("[A]\nhello\n[B]\nhello hello\n");
        let counts = ngram_counts(&graph, 3, "<s>", "</s>");

        assert_eq!(counts["A"][&key(&["hello"])], 1);
        assert_eq!(counts["B"][&key(&["hello"])], 2);
        assert_eq!(counts["B"][&key(&["hello", "hello"])], 1);
        assert!(!counts["A"].contains_key(&key(&["hello", "hello"])));
    }

    #[test]
    fn test_optional_paths() {
        let graph = compile_text("[LightOn]\nturn on [the] lamp\n");
        let counts = ngram_counts(&graph, 2, "<s>", "</s>");
        let intent = &counts["LightOn"];

        // "lamp" is reached with and without "the"
        assert_eq!(intent[&key(&["lamp"])], 2);
        assert_eq!(intent[&key(&["the", "lamp"])], 1);
        assert_eq!(intent[&key(&["on", "lamp"])], 1);
        assert_eq!(intent[&key(&["on", "the"])], 1);
    }
}
