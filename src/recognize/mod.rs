//! Utterance recognition over the compiled sentence graph.
//!
//! [`recognize`] matches an utterance with either the strict matcher (exact
//! token sequence, breadth-first) or the fuzzy matcher (best-first search
//! tolerating stop words and missing tokens), then materializes ranked
//! [`Recognition`] records with entity spans and converted values.

pub mod converter;
pub mod fuzzy;
pub mod recognition;
pub mod sample;
pub mod strict;

pub use converter::{value_to_string, ConverterFn, ConverterTable};
pub use fuzzy::CostConfig;
pub use recognition::{Entity, Intent, Recognition};
pub use sample::sample_by_intent;

use std::collections::HashSet;
use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::graph::IntentGraph;
use crate::recognize::converter::ConverterResolver;
use crate::recognize::fuzzy::{paths_fuzzy, FuzzyOptions};
use crate::recognize::recognition::trace_to_recognition;
use crate::recognize::strict::{paths_strict, StrictOptions};
use crate::tokenize::token_texts;

/// Options for [`recognize`].
pub struct RecognizeOptions<'a> {
    /// Use the fuzzy matcher; the strict matcher otherwise.
    pub fuzzy: bool,
    /// Tokens that may be skipped at low cost (fuzzy) or dropped on the
    /// strict matcher's retry pass.
    pub stop_words: HashSet<String>,
    /// Keep only intents for which the filter returns true.
    pub intent_filter: Option<&'a dyn Fn(&str) -> bool>,
    /// Applied to graph words and input tokens before comparison.
    pub word_transform: Option<&'a dyn Fn(&str) -> String>,
    /// Converter table; the built-in defaults when unset.
    pub converters: Option<&'a ConverterTable>,
    /// Extra converters overriding the base table.
    pub extra_converters: Option<&'a ConverterTable>,
    /// Maximum candidates to return; `None` returns best-cost ties only.
    pub max_recognitions: Option<usize>,
    /// Wall-clock budget; the matcher returns its best so far when spent.
    pub max_seconds: Option<f64>,
    /// Fuzzy cost schedule.
    pub costs: CostConfig,
}

impl Default for RecognizeOptions<'_> {
    fn default() -> Self {
        RecognizeOptions {
            fuzzy: true,
            stop_words: HashSet::new(),
            intent_filter: None,
            word_transform: None,
            converters: None,
            extra_converters: None,
            max_recognitions: None,
            max_seconds: None,
            costs: CostConfig::default(),
        }
    }
}

/// Recognize an utterance, splitting it on whitespace.
pub fn recognize(
    graph: &IntentGraph,
    utterance: &str,
    options: &RecognizeOptions<'_>,
) -> Vec<Recognition> {
    recognize_tokens(graph, &token_texts(utterance), options)
}

/// Recognize a pre-tokenized utterance.
///
/// Returns ranked recognitions; an empty list means nothing matched and is
/// not an error. A candidate that fails conversion is dropped, the rest are
/// still returned.
pub fn recognize_tokens(
    graph: &IntentGraph,
    tokens: &[String],
    options: &RecognizeOptions<'_>,
) -> Vec<Recognition> {
    let started = Instant::now();
    let deadline = options
        .max_seconds
        .map(|seconds| started + Duration::from_secs_f64(seconds));

    let default_table = ConverterTable::defaults();
    let base_table = options.converters.unwrap_or(&default_table);
    let resolver = ConverterResolver::new(base_table, options.extra_converters);

    let mut recognitions: Vec<Recognition> = Vec::new();

    if options.fuzzy {
        let fuzzy_options = FuzzyOptions {
            stop_words: &options.stop_words,
            intent_filter: options.intent_filter,
            word_transform: options.word_transform,
            costs: options.costs,
            max_recognitions: options.max_recognitions,
            deadline,
        };
        let paths = paths_fuzzy(graph, tokens, &fuzzy_options);
        let best_cost = paths.first().map(|p| p.cost).unwrap_or(0.0);

        for path in paths {
            debug!(
                "fuzzy candidate: cost={:.4} probability={:.4}",
                path.cost, path.probability
            );
            match trace_to_recognition(graph, &path.trace, &resolver) {
                Ok(mut recognition) => {
                    if recognitions.iter().any(|r| r.same_result(&recognition)) {
                        continue;
                    }
                    // exp(-cost) normalized by the best candidate
                    recognition.intent.confidence = (best_cost - path.cost).exp().min(1.0);
                    recognitions.push(recognition);
                }
                Err(err) => warn!("dropping candidate: {err}"),
            }
        }
    } else {
        let strict_options = StrictOptions {
            exclude_tokens: None,
            max_paths: options.max_recognitions,
            intent_filter: options.intent_filter,
            word_transform: options.word_transform,
        };
        let mut paths = paths_strict(graph, tokens, &strict_options);

        if paths.is_empty() && !options.stop_words.is_empty() {
            // Retry with stop words dropped from the input and skippable in
            // the graph
            let filtered: Vec<String> = tokens
                .iter()
                .filter(|t| !options.stop_words.contains(*t))
                .cloned()
                .collect();
            let retry_options = StrictOptions {
                exclude_tokens: Some(&options.stop_words),
                ..strict_options
            };
            paths = paths_strict(graph, &filtered, &retry_options);
        }

        for trace in paths {
            match trace_to_recognition(graph, &trace, &resolver) {
                Ok(recognition) => {
                    if recognitions.iter().any(|r| r.same_result(&recognition)) {
                        continue;
                    }
                    recognitions.push(recognition);
                }
                Err(err) => warn!("dropping candidate: {err}"),
            }
        }
    }

    let elapsed = started.elapsed().as_secs_f64();
    for recognition in &mut recognitions {
        recognition.recognize_seconds = elapsed;
    }

    recognitions
}
