//! AST node types for parsed sentence templates.

use serde::{Deserialize, Serialize};

/// A single word/token in a template.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Word {
    /// Spoken text matched against the input stream.
    pub text: String,

    /// Output replacement. `Some("")` drops the word from the output stream.
    pub substitution: Option<String>,

    /// Converter names applied after substitution, left-to-right.
    pub converters: Vec<String>,
}

impl Word {
    /// Create a plain word with no substitution or converters.
    pub fn new<S: Into<String>>(text: S) -> Self {
        Word {
            text: text.into(),
            substitution: None,
            converters: Vec::new(),
        }
    }

    /// Create a word that outputs `output` instead of its spoken text.
    pub fn with_substitution<S: Into<String>, O: Into<String>>(text: S, output: O) -> Self {
        Word {
            text: text.into(),
            substitution: Some(output.into()),
            converters: Vec::new(),
        }
    }

    /// The empty word, used as the silent branch of an optional.
    pub fn empty() -> Self {
        Word::new("")
    }
}

/// How the items of a [`Sequence`] combine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SequenceType {
    /// Items are matched in order.
    Group,
    /// Exactly one item is matched.
    Alternative,
    /// Items form an alternative with an implicit silent branch.
    Optional,
}

/// An ordered group, alternative set, or optional.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Sequence {
    /// Child expressions.
    pub items: Vec<Expression>,

    /// Group, alternative, or optional.
    pub seq_type: SequenceType,

    /// Branch weight when this sequence is an alternative branch.
    /// Normalized against sibling branches at compile time.
    pub weight: f64,

    /// Output replacement words. An empty list silences the whole group.
    pub substitution: Option<Vec<String>>,

    /// Converter names applied to the group output, left-to-right.
    pub converters: Vec<String>,
}

impl Sequence {
    /// Create an empty sequence of the given type.
    pub fn new(seq_type: SequenceType) -> Self {
        Sequence {
            items: Vec::new(),
            seq_type,
            weight: 1.0,
            substitution: None,
            converters: Vec::new(),
        }
    }

    /// Create a group from items.
    pub fn group(items: Vec<Expression>) -> Self {
        Sequence {
            items,
            ..Sequence::new(SequenceType::Group)
        }
    }

    /// Create an alternative from branches.
    pub fn alternative(items: Vec<Expression>) -> Self {
        Sequence {
            items,
            ..Sequence::new(SequenceType::Alternative)
        }
    }
}

/// A named entity boundary wrapping an inner expression.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    /// Entity name reported in recognitions.
    pub name: String,

    /// The tagged expression.
    pub inner: Box<Expression>,

    /// Output replacement for the entity value.
    pub substitution: Option<Vec<String>>,

    /// Converter names applied to the entity value, left-to-right.
    pub converters: Vec<String>,
}

/// Reference to a named rule, `<rule>` or `<Intent.rule>`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleRef {
    /// Rule name without the grammar qualifier.
    pub name: String,

    /// Owning intent for cross-intent references.
    pub grammar: Option<String>,
}

impl RuleRef {
    /// Fully qualified name, using `local_grammar` when unqualified.
    pub fn qualified_name(&self, local_grammar: &str) -> String {
        match &self.grammar {
            Some(grammar) => format!("{grammar}.{}", self.name),
            None => format!("{local_grammar}.{}", self.name),
        }
    }
}

/// Reference to a caller-supplied slot, `$name`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SlotRef {
    /// Slot name without the `$` sigil.
    pub name: String,

    /// Output replacement applied to whichever slot value matches.
    pub substitution: Option<String>,

    /// Converter names applied to the slot output, left-to-right.
    pub converters: Vec<String>,
}

/// A parsed template expression.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Expression {
    /// Terminal word.
    Word(Word),
    /// Group, alternative, or optional.
    Sequence(Sequence),
    /// Entity boundary.
    Tag(Tag),
    /// Rule reference, removed by expansion.
    RuleRef(RuleRef),
    /// Slot reference, removed by expansion.
    SlotRef(SlotRef),
}

impl Expression {
    /// Shorthand for a plain word expression.
    pub fn word<S: Into<String>>(text: S) -> Self {
        Expression::Word(Word::new(text))
    }

    /// True when this expression still contains a rule or slot reference.
    pub fn has_references(&self) -> bool {
        match self {
            Expression::Word(_) => false,
            Expression::Sequence(seq) => seq.items.iter().any(Expression::has_references),
            Expression::Tag(tag) => tag.inner.has_references(),
            Expression::RuleRef(_) | Expression::SlotRef(_) => true,
        }
    }
}
