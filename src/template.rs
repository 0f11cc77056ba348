//! Intent template file parsing.
//!
//! Template files are UTF-8 text organized into `[IntentName]` sections.
//! Inside a section, `name = body` lines declare named rules and every other
//! non-empty, non-comment line is a sentence template. Comments start with
//! `#` or `;` at column 0 or after whitespace; a trailing `\` continues the
//! next line.

use std::sync::OnceLock;

use log::debug;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{ParlanceError, Result};
use crate::jsgf::parser::parse_sentence_at;
use crate::jsgf::{Expression, SequenceType};

fn section_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\[([A-Za-z0-9_]+)\]$").unwrap())
}

fn rule_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*)\s*=\s*(.*)$").unwrap())
}

/// A named rule inside an intent section.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    /// Rule name, unique within its intent.
    pub name: String,
    /// Parsed rule body.
    pub body: Expression,
}

/// Sentences and rules declared under one `[IntentName]` section.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IntentGrammar {
    /// Intent name from the section header.
    pub name: String,
    /// Sentence templates in file order.
    pub sentences: Vec<Expression>,
    /// Named rules in file order.
    pub rules: Vec<Rule>,
}

impl IntentGrammar {
    fn new(name: String) -> Self {
        IntentGrammar {
            name,
            sentences: Vec::new(),
            rules: Vec::new(),
        }
    }

    /// Look up a rule by unqualified name.
    pub fn rule(&self, name: &str) -> Option<&Expression> {
        self.rules.iter().find(|r| r.name == name).map(|r| &r.body)
    }
}

/// A full template grammar: every intent with its sentences and rules.
///
/// Intents keep file order so that compilation and recognition are
/// deterministic for a given template.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Grammar {
    /// Intent sections in file order.
    pub intents: Vec<IntentGrammar>,
}

impl Grammar {
    /// Look up an intent section by name.
    pub fn intent(&self, name: &str) -> Option<&IntentGrammar> {
        self.intents.iter().find(|i| i.name == name)
    }

    /// Look up a rule by owning intent and unqualified name.
    pub fn rule(&self, intent: &str, name: &str) -> Option<&Expression> {
        self.intent(intent).and_then(|i| i.rule(name))
    }

    fn intent_mut(&mut self, name: &str) -> &mut IntentGrammar {
        if let Some(index) = self.intents.iter().position(|i| i.name == name) {
            return &mut self.intents[index];
        }
        self.intents.push(IntentGrammar::new(name.to_string()));
        self.intents.last_mut().unwrap()
    }
}

/// Options for [`parse_with`].
#[derive(Default)]
pub struct ParseOptions<'a> {
    /// Keep only intents for which the filter returns true.
    pub intent_filter: Option<&'a dyn Fn(&str) -> bool>,
    /// Applied to each sentence/rule body before expression parsing.
    pub sentence_transform: Option<&'a dyn Fn(&str) -> String>,
}

/// Parse template text into a [`Grammar`].
pub fn parse(text: &str) -> Result<Grammar> {
    parse_with(text, &ParseOptions::default())
}

/// Parse template text with an intent filter and/or sentence transform.
pub fn parse_with(text: &str, options: &ParseOptions<'_>) -> Result<Grammar> {
    let mut grammar = Grammar::default();
    let mut current_intent: Option<String> = None;
    let mut skipping = false;

    for (line_no, line) in logical_lines(text) {
        let line = strip_comment(&line);
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(captures) = section_pattern().captures(line) {
            let name = captures.get(1).unwrap().as_str();
            skipping = options
                .intent_filter
                .map(|filter| !filter(name))
                .unwrap_or(false);
            if skipping {
                debug!("skipping intent {name}");
                current_intent = None;
            } else {
                debug!("parsing intent {name}");
                grammar.intent_mut(name);
                current_intent = Some(name.to_string());
            }
            continue;
        }

        if skipping {
            continue;
        }

        let Some(intent_name) = current_intent.clone() else {
            return Err(ParlanceError::parse(
                line_no,
                1,
                "sentence outside of an intent section",
                line,
            ));
        };

        if let Some(captures) = rule_pattern().captures(line) {
            let rule_name = captures.get(1).unwrap().as_str().to_string();
            let body_text = captures.get(2).unwrap().as_str();
            if body_text.is_empty() {
                return Err(ParlanceError::parse(line_no, 1, "empty rule body", line));
            }

            let intent = grammar.intent_mut(&intent_name);
            if intent.rule(&rule_name).is_some() {
                return Err(ParlanceError::parse(
                    line_no,
                    1,
                    format!("duplicate rule `{rule_name}`"),
                    line,
                ));
            }

            let body_text = apply_transform(body_text, options);
            let body = parse_sentence_at(&body_text, line_no)?;
            intent.rules.push(Rule {
                name: rule_name,
                body,
            });
        } else {
            let sentence_text = apply_transform(line, options);
            let sentence = parse_sentence_at(&sentence_text, line_no)?;
            grammar.intent_mut(&intent_name).sentences.push(sentence);
        }
    }

    Ok(grammar)
}

fn apply_transform(text: &str, options: &ParseOptions<'_>) -> String {
    match options.sentence_transform {
        Some(transform) => transform(text),
        None => text.to_string(),
    }
}

/// Join `\`-continued lines, yielding each logical line with the number of
/// its first physical line.
fn logical_lines(text: &str) -> Vec<(usize, String)> {
    let mut lines = Vec::new();
    let mut pending: Option<(usize, String)> = None;

    for (index, raw) in text.lines().enumerate() {
        let line_no = index + 1;
        let (start_no, mut buffer) = match pending.take() {
            Some((no, buf)) => (no, buf),
            None => (line_no, String::new()),
        };

        let trimmed = raw.trim_end();
        if let Some(stripped) = trimmed.strip_suffix('\\') {
            buffer.push_str(stripped);
            buffer.push(' ');
            pending = Some((start_no, buffer));
        } else {
            buffer.push_str(raw);
            lines.push((start_no, buffer));
        }
    }

    if let Some(tail) = pending {
        lines.push(tail);
    }

    lines
}

/// Drop a `#` or `;` comment: recognized at column 0 or after whitespace.
fn strip_comment(line: &str) -> String {
    let chars: Vec<char> = line.chars().collect();
    for (i, &c) in chars.iter().enumerate() {
        if (c == '#' || c == ';') && (i == 0 || chars[i - 1].is_whitespace()) {
            return chars[..i].iter().collect();
        }
    }
    line.to_string()
}

/// Number of distinct sentences each intent can generate.
///
/// Groups multiply, alternatives sum, optionals add a silent branch. Rule
/// references resolve through the grammar; slot references count as a single
/// choice since their values are supplied elsewhere.
pub fn intent_counts(grammar: &Grammar) -> Vec<(String, usize)> {
    grammar
        .intents
        .iter()
        .map(|intent| {
            let count = intent
                .sentences
                .iter()
                .map(|s| expression_count(s, grammar, &intent.name))
                .sum::<usize>()
                .max(1);
            (intent.name.clone(), count)
        })
        .collect()
}

/// Number of distinct sentences one expression can generate.
pub fn expression_count(expression: &Expression, grammar: &Grammar, intent: &str) -> usize {
    match expression {
        Expression::Word(_) => 1,
        Expression::Sequence(seq) => match seq.seq_type {
            SequenceType::Group => seq
                .items
                .iter()
                .map(|item| expression_count(item, grammar, intent))
                .product(),
            SequenceType::Alternative => seq
                .items
                .iter()
                .map(|item| expression_count(item, grammar, intent))
                .sum(),
            SequenceType::Optional => {
                seq.items
                    .iter()
                    .map(|item| expression_count(item, grammar, intent))
                    .sum::<usize>()
                    + 1
            }
        },
        Expression::Tag(tag) => expression_count(&tag.inner, grammar, intent),
        Expression::RuleRef(rule_ref) => {
            let owner = rule_ref.grammar.as_deref().unwrap_or(intent);
            match grammar.rule(owner, &rule_ref.name) {
                Some(body) => expression_count(body, grammar, owner),
                None => 0,
            }
        }
        Expression::SlotRef(_) => 1,
    }
}
