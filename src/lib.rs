//! # Parlance
//!
//! A natural-language-understanding core for voice-command systems.
//!
//! Parlance parses a JSGF-derived template grammar organized by intent,
//! compiles every template into a single labeled directed graph encoding
//! all accepted sentences, and matches input utterances against that graph
//! to recover intent and entity structure.
//!
//! ## Features
//!
//! - Template grammar with optionals, alternatives, tags, substitutions,
//!   named rules, slots, converters, and weighted alternatives
//! - Arena-backed sentence graph shared freely across threads
//! - Strict (exact) and fuzzy (best-first, cost-ranked) matchers
//! - Entity spans with character offsets and typed converter pipelines
//! - N-gram counts and OpenFST text export for language-model tooling
//!
//! ## Example
//!
//! ```
//! use parlance::expand::{expand, SlotReplacements};
//! use parlance::graph::compile;
//! use parlance::recognize::{recognize, RecognizeOptions};
//! use parlance::template::parse;
//!
//! let grammar = parse("[LightOn]\nturn on [the] lamp\n").unwrap();
//! let expanded = expand(&grammar, &SlotReplacements::new()).unwrap();
//! let graph = compile(&expanded).unwrap();
//!
//! let recognitions = recognize(&graph, "turn on the lamp", &RecognizeOptions::default());
//! assert_eq!(recognitions[0].intent.name, "LightOn");
//! ```

pub mod cli;
pub mod error;
pub mod evaluate;
pub mod expand;
pub mod graph;
pub mod jsgf;
pub mod ngram;
pub mod recognize;
pub mod template;
pub mod tokenize;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
