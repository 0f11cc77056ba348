//! Rule and slot expansion.
//!
//! [`expand`] rewrites a grammar so that no sentence contains a
//! [`RuleRef`](crate::jsgf::RuleRef) or [`SlotRef`](crate::jsgf::SlotRef):
//! rule bodies are inlined in dependency order (a reference cycle is an
//! error) and slot references become alternatives over the caller-supplied
//! replacement sentences. Expansion is idempotent.

use std::collections::HashMap;

use crate::error::{ParlanceError, Result};
use crate::jsgf::{Expression, Sequence, SequenceType};
use crate::template::{Grammar, IntentGrammar, Rule};

/// Caller-supplied slot values: slot name (without `$`) to its sentences.
pub type SlotReplacements = HashMap<String, Vec<Expression>>;

/// Options for [`expand_with`].
#[derive(Clone, Debug)]
pub struct ExpandOptions {
    /// Error on a missing slot instead of an empty alternative.
    pub strict: bool,
    /// Maximum slot nesting depth before a cycle is assumed.
    pub max_depth: usize,
}

impl Default for ExpandOptions {
    fn default() -> Self {
        ExpandOptions {
            strict: false,
            max_depth: 8,
        }
    }
}

/// Expand every rule and slot reference in the grammar.
pub fn expand(grammar: &Grammar, replacements: &SlotReplacements) -> Result<Grammar> {
    expand_with(grammar, replacements, &ExpandOptions::default())
}

/// Expand with explicit options.
pub fn expand_with(
    grammar: &Grammar,
    replacements: &SlotReplacements,
    options: &ExpandOptions,
) -> Result<Grammar> {
    let mut expander = Expander {
        grammar,
        replacements,
        options,
        rule_cache: HashMap::new(),
        rule_stack: Vec::new(),
    };

    let mut intents = Vec::with_capacity(grammar.intents.len());
    for intent in &grammar.intents {
        let sentences = intent
            .sentences
            .iter()
            .map(|sentence| expander.expand_expression(sentence, &intent.name, 0))
            .collect::<Result<Vec<_>>>()?;

        let rules = intent
            .rules
            .iter()
            .map(|rule| {
                let body = expander.expand_rule(&intent.name, &rule.name)?;
                Ok(Rule {
                    name: rule.name.clone(),
                    body,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        intents.push(IntentGrammar {
            name: intent.name.clone(),
            sentences,
            rules,
        });
    }

    Ok(Grammar { intents })
}

struct Expander<'a> {
    grammar: &'a Grammar,
    replacements: &'a SlotReplacements,
    options: &'a ExpandOptions,
    /// Qualified rule name to fully expanded body.
    rule_cache: HashMap<String, Expression>,
    /// Qualified rule names currently being expanded; re-entry is a cycle.
    rule_stack: Vec<String>,
}

impl Expander<'_> {
    /// Expand a rule body, memoized by qualified name. The depth-first
    /// traversal visits rules in dependency (topological) order; revisiting
    /// a rule already on the stack means the reference graph has a cycle.
    fn expand_rule(&mut self, intent: &str, name: &str) -> Result<Expression> {
        let qualified = format!("{intent}.{name}");

        if let Some(cached) = self.rule_cache.get(&qualified) {
            return Ok(cached.clone());
        }
        if self.rule_stack.contains(&qualified) {
            return Err(ParlanceError::expansion(format!(
                "recursive rule <{qualified}>"
            )));
        }

        let Some(body) = self.grammar.rule(intent, name) else {
            return Err(ParlanceError::expansion(format!(
                "missing rule <{qualified}>"
            )));
        };

        self.rule_stack.push(qualified.clone());
        let body = body.clone();
        let expanded = self.expand_expression(&body, intent, 0)?;
        self.rule_stack.pop();

        self.rule_cache.insert(qualified, expanded.clone());
        Ok(expanded)
    }

    fn expand_expression(
        &mut self,
        expression: &Expression,
        intent: &str,
        depth: usize,
    ) -> Result<Expression> {
        match expression {
            Expression::Word(word) => Ok(Expression::Word(word.clone())),
            Expression::Sequence(seq) => {
                let items = seq
                    .items
                    .iter()
                    .map(|item| self.expand_expression(item, intent, depth))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Expression::Sequence(Sequence {
                    items,
                    ..seq.clone()
                }))
            }
            Expression::Tag(tag) => {
                let inner = self.expand_expression(&tag.inner, intent, depth)?;
                let mut tag = tag.clone();
                tag.inner = Box::new(inner);
                Ok(Expression::Tag(tag))
            }
            Expression::RuleRef(rule_ref) => {
                let owner = rule_ref.grammar.as_deref().unwrap_or(intent);
                self.expand_rule(owner, &rule_ref.name)
            }
            Expression::SlotRef(slot_ref) => {
                if depth >= self.options.max_depth {
                    return Err(ParlanceError::expansion(format!(
                        "slot ${} exceeds expansion depth {}",
                        slot_ref.name, self.options.max_depth
                    )));
                }

                let branches = match self.replacements.get(&slot_ref.name) {
                    Some(values) => values
                        .iter()
                        .map(|value| self.expand_expression(value, intent, depth + 1))
                        .collect::<Result<Vec<_>>>()?,
                    None if self.options.strict => {
                        return Err(ParlanceError::expansion(format!(
                            "missing slot ${}",
                            slot_ref.name
                        )));
                    }
                    // Matches nothing
                    None => Vec::new(),
                };

                Ok(Expression::Sequence(Sequence {
                    items: branches,
                    seq_type: SequenceType::Alternative,
                    weight: 1.0,
                    substitution: slot_ref.substitution.as_ref().map(|sub| {
                        sub.split_whitespace().map(str::to_string).collect()
                    }),
                    converters: slot_ref.converters.clone(),
                }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jsgf::parse_sentence;
    use crate::template::parse;

    fn no_slots() -> SlotReplacements {
        SlotReplacements::new()
    }

    #[test]
    fn test_local_rule_expansion() {
        let grammar = parse("[Intent1]\nrule = a test\nthis is <rule>\n").unwrap();
        let expanded = expand(&grammar, &no_slots()).unwrap();

        let sentence = &expanded.intent("Intent1").unwrap().sentences[0];
        assert!(!sentence.has_references());
    }

    #[test]
    fn test_cross_intent_rule_expansion() {
        let grammar = parse(
            "[Intent1]\n\
             rule = a test\n\
             this is a test\n\
             [Intent2]\n\
             rule = this is\n\
             <rule> <Intent1.rule>\n",
        )
        .unwrap();
        let expanded = expand(&grammar, &no_slots()).unwrap();

        let sentence = &expanded.intent("Intent2").unwrap().sentences[0];
        assert!(!sentence.has_references());
    }

    #[test]
    fn test_recursive_rule() {
        let grammar = parse("[Intent1]\nrule = again <rule>\nsay <rule>\n").unwrap();
        let err = expand(&grammar, &no_slots()).unwrap_err();
        assert!(err.to_string().contains("recursive rule"));
    }

    #[test]
    fn test_mutually_recursive_rules() {
        let grammar = parse(
            "[Intent1]\n\
             one = first <two>\n\
             two = second <one>\n\
             say <one>\n",
        )
        .unwrap();
        let err = expand(&grammar, &no_slots()).unwrap_err();
        assert!(err.to_string().contains("recursive rule"));
    }

    #[test]
    fn test_missing_rule() {
        let grammar = parse("[Intent1]\nthis is <nope>\n").unwrap();
        let err = expand(&grammar, &no_slots()).unwrap_err();
        assert!(err.to_string().contains("missing rule"));
    }

    #[test]
    fn test_slot_expansion() {
        let grammar = parse("[PlayBook]\nread me ($book){book}\n").unwrap();
        let mut replacements = SlotReplacements::new();
        replacements.insert(
            "book".to_string(),
            vec![
                parse_sentence("the hound of the baskervilles").unwrap(),
                parse_sentence("a study in scarlet").unwrap(),
            ],
        );

        let expanded = expand(&grammar, &replacements).unwrap();
        let sentence = &expanded.intent("PlayBook").unwrap().sentences[0];
        assert!(!sentence.has_references());
    }

    #[test]
    fn test_missing_slot_lenient() {
        let grammar = parse("[PlayBook]\nread me $book\n").unwrap();
        let expanded = expand(&grammar, &no_slots()).unwrap();
        let sentence = &expanded.intent("PlayBook").unwrap().sentences[0];
        assert!(!sentence.has_references());
    }

    #[test]
    fn test_missing_slot_strict() {
        let grammar = parse("[PlayBook]\nread me $book\n").unwrap();
        let options = ExpandOptions {
            strict: true,
            ..ExpandOptions::default()
        };
        let err = expand_with(&grammar, &no_slots(), &options).unwrap_err();
        assert!(err.to_string().contains("missing slot"));
    }

    #[test]
    fn test_nested_slot_depth() {
        let grammar = parse("[Intent1]\nsay $loop\n").unwrap();
        let mut replacements = SlotReplacements::new();
        replacements.insert("loop".to_string(), vec![parse_sentence("$loop").unwrap()]);

        let err = expand(&grammar, &replacements).unwrap_err();
        assert!(err.to_string().contains("expansion depth"));
    }

    #[test]
    fn test_expand_idempotent() {
        let grammar = parse(
            "[Intent1]\n\
             rule = a test\n\
             this is <rule> [maybe]\n",
        )
        .unwrap();
        let once = expand(&grammar, &no_slots()).unwrap();
        let twice = expand(&once, &no_slots()).unwrap();
        assert_eq!(once, twice);
    }
}
