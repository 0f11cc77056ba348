//! Compilation of expanded grammars into the sentence graph.

use log::debug;

use crate::error::{ParlanceError, Result};
use crate::graph::{
    IntentGraph, Node, NodeId, CONVERT_BEGIN_PREFIX, CONVERT_END_PREFIX, INTENT_PREFIX,
    TAG_BEGIN_PREFIX, TAG_END_PREFIX,
};
use crate::jsgf::{Expression, Sequence, SequenceType, Tag, Word};
use crate::template::Grammar;

/// Compile an expanded grammar into a sentence graph.
///
/// Every intent branches off the start node with a `__label__<intent>`
/// epsilon edge; every sentence ends at its own end-of-sentence node. The
/// grammar must already be expanded: a leftover rule or slot reference is a
/// compile error.
pub fn compile(grammar: &Grammar) -> Result<IntentGraph> {
    let mut graph = IntentGraph::new();
    let start = graph.start_node();

    for intent in &grammar.intents {
        debug!(
            "compiling intent {} ({} sentences)",
            intent.name,
            intent.sentences.len()
        );

        let intent_start = graph.add_node(Node {
            intent: Some(intent.name.clone()),
            ..Node::default()
        });
        graph.add_edge(
            start,
            intent_start,
            "",
            format!("{INTENT_PREFIX}{}", intent.name),
            1.0,
        );

        let mut compiler = Compiler {
            graph: &mut graph,
            intent: &intent.name,
        };
        for sentence in &intent.sentences {
            let sentence_end = compiler.compile_expression(sentence, intent_start, false)?;
            let accept = compiler.graph.add_node(Node {
                intent: Some(intent.name.clone()),
                end_of_sentence: true,
                ..Node::default()
            });
            compiler.graph.add_edge(sentence_end, accept, "", "", 1.0);
        }
    }

    graph.finish();
    Ok(graph)
}

struct Compiler<'a> {
    graph: &'a mut IntentGraph,
    intent: &'a str,
}

impl Compiler<'_> {
    fn plain_node(&mut self) -> NodeId {
        self.graph.add_node(Node {
            intent: Some(self.intent.to_string()),
            ..Node::default()
        })
    }

    /// Insert an expression between `from` and the returned node. When
    /// `silenced` is set, an enclosing substitution owns the output stream
    /// and inner olabels are suppressed.
    fn compile_expression(
        &mut self,
        expression: &Expression,
        from: NodeId,
        silenced: bool,
    ) -> Result<NodeId> {
        match expression {
            Expression::Word(word) => self.compile_word(word, from, silenced),
            Expression::Sequence(seq) => self.compile_sequence(seq, from, silenced),
            Expression::Tag(tag) => self.compile_tag(tag, from, silenced),
            Expression::RuleRef(rule_ref) => Err(ParlanceError::compile(format!(
                "unresolved rule reference <{}> (grammar not expanded)",
                rule_ref.name
            ))),
            Expression::SlotRef(slot_ref) => Err(ParlanceError::compile(format!(
                "unresolved slot reference ${} (grammar not expanded)",
                slot_ref.name
            ))),
        }
    }

    fn compile_word(&mut self, word: &Word, from: NodeId, silenced: bool) -> Result<NodeId> {
        let converters: &[String] = if silenced { &[] } else { &word.converters };
        let mut current = self.open_converters(from, converters);

        let output_words: Vec<&str> = match (&word.substitution, silenced) {
            (_, true) => Vec::new(),
            (Some(sub), false) => sub.split_whitespace().collect(),
            (None, false) => vec![word.text.as_str()],
        };

        let to = self.graph.add_node(Node {
            word: (!word.text.is_empty()).then(|| word.text.clone()),
            intent: Some(self.intent.to_string()),
            ..Node::default()
        });
        let olabel = output_words.first().copied().unwrap_or("");
        self.graph
            .add_edge(current, to, word.text.clone(), olabel, 1.0);
        current = to;

        // Extra substitution words ride epsilon edges
        for output in output_words.iter().skip(1) {
            let next = self.plain_node();
            self.graph.add_edge(current, next, "", *output, 1.0);
            current = next;
        }

        current = self.close_converters(current, converters);
        Ok(current)
    }

    fn compile_sequence(
        &mut self,
        seq: &Sequence,
        from: NodeId,
        silenced: bool,
    ) -> Result<NodeId> {
        let converters: &[String] = if silenced { &[] } else { &seq.converters };
        let silence_items = silenced || seq.substitution.is_some();

        let mut current = self.open_converters(from, converters);

        current = match seq.seq_type {
            SequenceType::Group => {
                let mut node = current;
                for item in &seq.items {
                    node = self.compile_expression(item, node, silence_items)?;
                }
                node
            }
            SequenceType::Alternative | SequenceType::Optional => {
                let entry = current;
                let mut branch_ends = Vec::with_capacity(seq.items.len() + 1);
                let mut branch_weights = Vec::with_capacity(seq.items.len() + 1);

                for item in &seq.items {
                    let branch_start = self.plain_node();
                    branch_weights.push(branch_weight(item));
                    let index = self.graph.edges_from(entry).len();
                    self.graph.add_edge(entry, branch_start, "", "", 1.0);
                    let branch_end =
                        self.compile_expression(item, branch_start, silence_items)?;
                    branch_ends.push((index, branch_end));
                }

                if seq.seq_type == SequenceType::Optional {
                    // Silent branch
                    let branch_start = self.plain_node();
                    branch_weights.push(1.0);
                    let index = self.graph.edges_from(entry).len();
                    self.graph.add_edge(entry, branch_start, "", "", 1.0);
                    branch_ends.push((index, branch_start));
                }

                self.set_branch_weights(entry, &branch_ends, &branch_weights);

                let join = self.plain_node();
                for (_, branch_end) in &branch_ends {
                    self.graph.add_edge(*branch_end, join, "", "", 1.0);
                }
                join
            }
        };

        if !silenced {
            if let Some(substitution) = &seq.substitution {
                current = self.emit_output_words(current, substitution);
            }
        }

        current = self.close_converters(current, converters);
        Ok(current)
    }

    fn compile_tag(&mut self, tag: &Tag, from: NodeId, silenced: bool) -> Result<NodeId> {
        let mut current = self.plain_node();
        self.graph.add_edge(
            from,
            current,
            "",
            format!("{TAG_BEGIN_PREFIX}{}", tag.name),
            1.0,
        );

        let converters: &[String] = if silenced { &[] } else { &tag.converters };
        let silence_inner = silenced || tag.substitution.is_some();

        current = self.open_converters(current, converters);
        current = self.compile_expression(&tag.inner, current, silence_inner)?;

        if !silenced {
            if let Some(substitution) = &tag.substitution {
                current = self.emit_output_words(current, substitution);
            }
        }

        current = self.close_converters(current, converters);

        let end = self.plain_node();
        self.graph.add_edge(
            current,
            end,
            "",
            format!("{TAG_END_PREFIX}{}", tag.name),
            1.0,
        );
        Ok(end)
    }

    /// Converter scopes open outermost-first, so a chain `!a!b` applies
    /// left-to-right: `a` converts first and `b` sees its output.
    fn open_converters(&mut self, from: NodeId, converters: &[String]) -> NodeId {
        let mut current = from;
        for name in converters.iter().rev() {
            let next = self.plain_node();
            self.graph.add_edge(
                current,
                next,
                "",
                format!("{CONVERT_BEGIN_PREFIX}{name}"),
                1.0,
            );
            current = next;
        }
        current
    }

    fn close_converters(&mut self, from: NodeId, converters: &[String]) -> NodeId {
        let mut current = from;
        for name in converters.iter() {
            let next = self.plain_node();
            self.graph.add_edge(
                current,
                next,
                "",
                format!("{CONVERT_END_PREFIX}{name}"),
                1.0,
            );
            current = next;
        }
        current
    }

    fn emit_output_words(&mut self, from: NodeId, words: &[String]) -> NodeId {
        let mut current = from;
        for word in words {
            let next = self.plain_node();
            self.graph.add_edge(current, next, "", word.clone(), 1.0);
            current = next;
        }
        current
    }

    fn set_branch_weights(
        &mut self,
        entry: NodeId,
        branch_ends: &[(usize, NodeId)],
        weights: &[f64],
    ) {
        for ((index, _), weight) in branch_ends.iter().zip(weights) {
            self.graph.set_edge_weight(entry, *index, *weight);
        }
    }
}

/// Weight of an alternative branch; only sequences carry explicit weights.
fn branch_weight(expression: &Expression) -> f64 {
    match expression {
        Expression::Sequence(seq) => seq.weight,
        _ => 1.0,
    }
}
