//! Evaluation of recognition results against expected outputs.
//!
//! Compares expected and actual recognitions pairwise: intent accuracy,
//! exact entity matches, and token-level word error computed by edit
//! distance alignment.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ParlanceError, Result};
use crate::recognize::Recognition;

/// Alignment of a hypothesis token sequence against a reference.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WordError {
    /// Reference tokens (lowercased).
    pub reference: Vec<String>,
    /// Hypothesis tokens (lowercased).
    pub hypothesis: Vec<String>,
    /// Aligned differences: `word`, `ref:hyp`, `-deleted`, `+inserted`.
    pub differences: Vec<String>,
    /// Number of reference words.
    pub words: usize,
    /// Total edit errors.
    pub errors: usize,
    /// Matched words.
    pub matches: usize,
    /// Substituted words.
    pub substitutions: usize,
    /// Deleted words (present in reference only).
    pub deletions: usize,
    /// Inserted words (present in hypothesis only).
    pub insertions: usize,
    /// `(S + D + I) / N`.
    pub error_rate: f64,
}

/// Comparison of one actual recognition against its expected result.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EvalItem {
    /// Intent name that should have been recognized.
    pub expected_intent: String,
    /// Intent name actually recognized.
    pub actual_intent: String,
    /// True when the intent names match.
    pub intent_correct: bool,
    /// Entities recognized but not expected, as `(name, value)` pairs.
    pub wrong_entities: Vec<(String, Value)>,
    /// Entities expected but not recognized.
    pub missing_entities: Vec<(String, Value)>,
    /// Transcription alignment, when the expected text is non-empty.
    pub word_error: Option<WordError>,
}

/// Aggregate result of [`evaluate_intents`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EvalReport {
    /// Per-utterance comparisons, in input order.
    pub items: Vec<EvalItem>,
    /// Number of utterance pairs evaluated.
    pub num_utterances: usize,
    /// Reference words across all utterances.
    pub num_words: usize,
    /// Matched words across all utterances.
    pub correct_words: usize,
    /// Expected entity/value pairs across all utterances.
    pub num_entities: usize,
    /// Exactly matched entity/value pairs.
    pub correct_entities: usize,
    /// Utterances whose intent matched.
    pub correct_intents: usize,
    /// Utterances whose intent and all entities matched.
    pub correct_intents_and_entities: usize,
    /// `correct_words / num_words`.
    pub transcription_accuracy: f64,
    /// `correct_intents / num_utterances`.
    pub intent_accuracy: f64,
    /// `correct_entities / num_entities`.
    pub entity_accuracy: f64,
    /// `correct_intents_and_entities / num_utterances`.
    pub intent_entity_accuracy: f64,
}

/// Compare expected/actual recognition pairs and report accuracy.
pub fn evaluate_intents(pairs: &[(Recognition, Recognition)]) -> EvalReport {
    let items: Vec<EvalItem> = pairs
        .par_iter()
        .map(|(expected, actual)| evaluate_pair(expected, actual))
        .collect();

    let mut report = EvalReport {
        num_utterances: items.len(),
        ..EvalReport::default()
    };

    for item in &items {
        if let Some(word_error) = &item.word_error {
            report.num_words += word_error.words;
            report.correct_words += word_error.matches;
        }
        if item.intent_correct {
            report.correct_intents += 1;
            if item.wrong_entities.is_empty() && item.missing_entities.is_empty() {
                report.correct_intents_and_entities += 1;
            }
        }
    }

    for (expected, _) in pairs {
        report.num_entities += expected.entities.len();
    }
    report.correct_entities = items
        .iter()
        .zip(pairs)
        .filter(|(item, _)| item.intent_correct)
        .map(|(item, (expected, _))| expected.entities.len() - item.missing_entities.len())
        .sum();

    report.transcription_accuracy = ratio(report.correct_words, report.num_words);
    report.intent_accuracy = ratio(report.correct_intents, report.num_utterances);
    report.entity_accuracy = ratio(report.correct_entities, report.num_entities);
    report.intent_entity_accuracy =
        ratio(report.correct_intents_and_entities, report.num_utterances);

    report.items = items;
    report
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator > 0 {
        numerator as f64 / denominator as f64
    } else {
        1.0
    }
}

fn evaluate_pair(expected: &Recognition, actual: &Recognition) -> EvalItem {
    let mut item = EvalItem {
        expected_intent: expected.intent.name.clone(),
        actual_intent: actual.intent.name.clone(),
        intent_correct: expected.intent.name == actual.intent.name,
        ..EvalItem::default()
    };

    // Entities only count when the intent was right
    if item.intent_correct {
        let mut outstanding: Vec<(String, Value)> = expected
            .entities
            .iter()
            .map(|e| (e.entity.clone(), e.value.clone()))
            .collect();

        for entity in &actual.entities {
            let pair = (entity.entity.clone(), entity.value.clone());
            if let Some(index) = outstanding.iter().position(|p| *p == pair) {
                outstanding.remove(index);
            } else {
                item.wrong_entities.push(pair);
            }
        }
        item.missing_entities = outstanding;
    }

    let expected_text = pick_text(expected);
    let actual_text = pick_text(actual);
    if !expected_text.is_empty() {
        let reference: Vec<String> = expected_text.split_whitespace().map(String::from).collect();
        let hypothesis: Vec<String> = actual_text.split_whitespace().map(String::from).collect();
        item.word_error = word_error(&reference, &hypothesis).ok();
    }

    item
}

fn pick_text(recognition: &Recognition) -> &str {
    if recognition.raw_text.is_empty() {
        &recognition.text
    } else {
        &recognition.raw_text
    }
}

/// Align a hypothesis against a reference and count edit operations.
pub fn word_error(reference: &[String], hypothesis: &[String]) -> Result<WordError> {
    if reference.is_empty() {
        return Err(ParlanceError::config("reference cannot be empty"));
    }

    let reference: Vec<String> = reference.iter().map(|w| w.to_lowercase()).collect();
    let hypothesis: Vec<String> = hypothesis.iter().map(|w| w.to_lowercase()).collect();

    if hypothesis.is_empty() {
        return Ok(WordError {
            words: reference.len(),
            errors: reference.len(),
            deletions: reference.len(),
            differences: reference.iter().map(|w| format!("-{w}")).collect(),
            reference,
            hypothesis,
            error_rate: 1.0,
            ..WordError::default()
        });
    }

    // Edit distance matrix: rows index the hypothesis, columns the reference
    let rows = hypothesis.len() + 1;
    let cols = reference.len() + 1;
    let mut matrix = vec![vec![0usize; cols]; rows];
    for (col, cell) in matrix[0].iter_mut().enumerate() {
        *cell = col;
    }
    for (row, matrix_row) in matrix.iter_mut().enumerate() {
        matrix_row[0] = row;
    }

    for row in 1..rows {
        for col in 1..cols {
            if reference[col - 1] == hypothesis[row - 1] {
                matrix[row][col] = matrix[row - 1][col - 1];
            } else {
                let substitution = matrix[row - 1][col - 1] + 1;
                let insertion = matrix[row][col - 1] + 1;
                let deletion = matrix[row - 1][col] + 1;
                matrix[row][col] = substitution.min(insertion).min(deletion);
            }
        }
    }

    let errors = matrix[rows - 1][cols - 1];

    // Walk the matrix back to classify each aligned position
    let mut ref_index = reference.len();
    let mut hyp_index = hypothesis.len();
    let mut differences = Vec::new();
    let mut matches = 0;
    let mut substitutions = 0;
    let mut insertions = 0;
    let mut deletions = 0;

    while ref_index > 0 && hyp_index > 0 {
        if reference[ref_index - 1] == hypothesis[hyp_index - 1] {
            matches += 1;
            differences.push(hypothesis[hyp_index - 1].clone());
            ref_index -= 1;
            hyp_index -= 1;
        } else if matrix[hyp_index][ref_index] == matrix[hyp_index - 1][ref_index - 1] + 1 {
            substitutions += 1;
            differences.push(format!(
                "{}:{}",
                reference[ref_index - 1],
                hypothesis[hyp_index - 1]
            ));
            ref_index -= 1;
            hyp_index -= 1;
        } else if matrix[hyp_index][ref_index] == matrix[hyp_index][ref_index - 1] + 1 {
            deletions += 1;
            differences.push(format!("-{}", reference[ref_index - 1]));
            ref_index -= 1;
        } else {
            insertions += 1;
            differences.push(format!("+{}", hypothesis[hyp_index - 1]));
            hyp_index -= 1;
        }
    }
    while ref_index > 0 {
        deletions += 1;
        differences.push(format!("-{}", reference[ref_index - 1]));
        ref_index -= 1;
    }
    while hyp_index > 0 {
        insertions += 1;
        differences.push(format!("+{}", hypothesis[hyp_index - 1]));
        hyp_index -= 1;
    }
    differences.reverse();

    let error_rate = (substitutions + deletions + insertions) as f64 / reference.len() as f64;

    Ok(WordError {
        words: reference.len(),
        errors,
        matches,
        substitutions,
        deletions,
        insertions,
        differences,
        reference,
        hypothesis,
        error_rate,
    })
}
