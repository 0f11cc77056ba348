//! OpenFST text-format export.
//!
//! The compiled graph serializes as whitespace-separated transition lines
//! `src dst ilabel olabel weight` followed by final-state lines `state
//! weight`, with integer symbol tables mapping labels (epsilon = `<eps>` =
//! 0). Weights are negative log probabilities so the output drops straight
//! into tropical-semiring tooling. This is the handoff point to external
//! language-model pipelines.

use std::collections::HashMap;
use std::collections::VecDeque;
use std::fmt::Write as _;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::error::Result;
use crate::graph::{IntentGraph, NodeId, INTENT_PREFIX};

/// Epsilon symbol used in FST text and symbol tables.
pub const EPS: &str = "<eps>";

/// A whole-graph FST with its symbol tables.
#[derive(Clone, Debug)]
pub struct GraphFst {
    /// FST transitions and final states in OpenFST text format.
    pub fst_text: String,
    /// All symbols (inputs and outputs) to integer ids.
    pub symbols: HashMap<String, usize>,
    /// Input symbols to integer ids.
    pub input_symbols: HashMap<String, usize>,
    /// Output symbols to integer ids.
    pub output_symbols: HashMap<String, usize>,
}

impl GraphFst {
    /// Write the FST text and both symbol tables to disk.
    pub fn write_fst(
        &self,
        fst_path: impl AsRef<Path>,
        isymbols_path: impl AsRef<Path>,
        osymbols_path: impl AsRef<Path>,
    ) -> Result<()> {
        let mut fst_file = File::create(fst_path)?;
        fst_file.write_all(self.fst_text.as_bytes())?;

        write_symbols(isymbols_path, &self.input_symbols)?;
        write_symbols(osymbols_path, &self.output_symbols)?;
        Ok(())
    }
}

/// One FST per intent, sharing a single symbol table.
#[derive(Clone, Debug)]
pub struct GraphFsts {
    /// Intent name to FST text.
    pub intent_fsts: HashMap<String, String>,
    /// All symbols to integer ids.
    pub symbols: HashMap<String, usize>,
    /// Input symbols to integer ids.
    pub input_symbols: HashMap<String, usize>,
    /// Output symbols to integer ids.
    pub output_symbols: HashMap<String, usize>,
}

fn write_symbols(path: impl AsRef<Path>, symbols: &HashMap<String, usize>) -> Result<()> {
    let mut entries: Vec<(&String, &usize)> = symbols.iter().collect();
    entries.sort_by_key(|(_, id)| **id);

    let mut file = File::create(path)?;
    for (symbol, id) in entries {
        writeln!(file, "{symbol} {id}")?;
    }
    Ok(())
}

struct SymbolTables {
    symbols: HashMap<String, usize>,
    input_symbols: HashMap<String, usize>,
    output_symbols: HashMap<String, usize>,
}

impl SymbolTables {
    fn new() -> Self {
        let mut symbols = HashMap::new();
        symbols.insert(EPS.to_string(), 0);
        SymbolTables {
            symbols,
            input_symbols: HashMap::new(),
            output_symbols: HashMap::new(),
        }
    }

    fn intern(&mut self, label: &str, input: bool) -> usize {
        let label = if label.is_empty() { EPS } else { label };
        let next_id = self.symbols.len();
        let id = *self
            .symbols
            .entry(label.to_string())
            .or_insert(next_id);
        let side = if input {
            &mut self.input_symbols
        } else {
            &mut self.output_symbols
        };
        side.insert(label.to_string(), id);
        id
    }
}

/// Serialize the transitions reachable from `root` in breadth-first order,
/// renumbering states from zero.
fn serialize_from(
    graph: &IntentGraph,
    root: NodeId,
    tables: &mut SymbolTables,
) -> String {
    let mut text = String::new();
    let mut state_map: HashMap<NodeId, usize> = HashMap::new();
    let mut final_states: Vec<usize> = Vec::new();
    let mut queue = VecDeque::from([root]);
    let mut visited = vec![false; graph.len()];
    visited[root] = true;

    while let Some(node) = queue.pop_front() {
        let next_state = state_map.len();
        let from_state = *state_map.entry(node).or_insert(next_state);
        if graph.node(node).end_of_sentence {
            final_states.push(from_state);
        }

        for edge in graph.edges_from(node) {
            let next_state = state_map.len();
            let to_state = *state_map.entry(edge.to).or_insert(next_state);

            tables.intern(&edge.ilabel, true);
            tables.intern(&edge.olabel, false);
            let ilabel = if edge.ilabel.is_empty() { EPS } else { &edge.ilabel };
            let olabel = if edge.olabel.is_empty() { EPS } else { &edge.olabel };

            // Tropical weight: -ln(probability)
            let weight = -edge.weight.max(f64::MIN_POSITIVE).ln();
            let _ = writeln!(text, "{from_state} {to_state} {ilabel} {olabel} {weight}");

            if !visited[edge.to] {
                visited[edge.to] = true;
                queue.push_back(edge.to);
            }
        }
    }

    final_states.sort_unstable();
    final_states.dedup();
    for state in final_states {
        let _ = writeln!(text, "{state} 0");
    }

    text
}

/// Serialize the whole graph as a single FST.
pub fn graph_to_fst(graph: &IntentGraph) -> GraphFst {
    let mut tables = SymbolTables::new();
    let fst_text = serialize_from(graph, graph.start_node(), &mut tables);

    GraphFst {
        fst_text,
        symbols: tables.symbols,
        input_symbols: tables.input_symbols,
        output_symbols: tables.output_symbols,
    }
}

/// Serialize one FST per intent, rooted at each intent's first node.
pub fn graph_to_fsts(graph: &IntentGraph) -> GraphFsts {
    let mut tables = SymbolTables::new();
    let mut intent_fsts = HashMap::new();

    for edge in graph.edges_from(graph.start_node()) {
        let Some(intent_name) = edge.olabel.strip_prefix(INTENT_PREFIX) else {
            continue;
        };
        let text = serialize_from(graph, edge.to, &mut tables);
        intent_fsts.insert(intent_name.to_string(), text);
    }

    GraphFsts {
        intent_fsts,
        symbols: tables.symbols,
        input_symbols: tables.input_symbols,
        output_symbols: tables.output_symbols,
    }
}
