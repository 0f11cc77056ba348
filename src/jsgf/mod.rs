//! Template grammar language: sentence AST and expression parser.
//!
//! The grammar is a JSGF dialect. A sentence template like
//! `turn on [the] (living room lamp | kitchen light){name}` parses into an
//! [`Expression`] tree of words, groups, optionals, alternatives, tags, rule
//! references, and slot references.

pub mod expression;
pub mod parser;

pub use expression::{Expression, RuleRef, Sequence, SequenceType, SlotRef, Tag, Word};
pub use parser::parse_sentence;
