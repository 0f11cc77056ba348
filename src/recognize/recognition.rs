//! Recognition records and the trace-to-recognition builder.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ParlanceError, Result};
use crate::graph::{
    EdgeRef, IntentGraph, CONVERT_BEGIN_PREFIX, CONVERT_END_PREFIX, INTENT_PREFIX,
    TAG_BEGIN_PREFIX, TAG_END_PREFIX,
};
use crate::recognize::converter::{value_to_string, ConverterResolver};

/// Recognized intent with its confidence in `[0, 1]`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    /// Intent name from the template section.
    pub name: String,
    /// 1 for an unambiguous exact match.
    pub confidence: f64,
}

/// A named entity recovered from a tagged span.
///
/// `start`/`end` are character offsets into the output text; the `raw_`
/// variants index the raw (spoken) text. Offsets count Unicode code points.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Entity (tag) name.
    pub entity: String,
    /// Converted value: the single token, or joined tokens as a string.
    pub value: Value,
    /// Raw text of the span.
    pub raw_value: String,
    /// Start offset in the output text.
    pub start: usize,
    /// Start offset in the raw text.
    pub raw_start: usize,
    /// End offset in the output text.
    pub end: usize,
    /// End offset in the raw text.
    pub raw_end: usize,
    /// Converted tokens inside the span.
    pub tokens: Vec<Value>,
    /// Raw tokens inside the span.
    pub raw_tokens: Vec<String>,
}

/// Output of intent recognition.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Recognition {
    /// Recognized intent and confidence.
    pub intent: Intent,
    /// Entities in template order.
    pub entities: Vec<Entity>,
    /// Output text after substitutions and conversions.
    pub text: String,
    /// Raw input text actually matched.
    pub raw_text: String,
    /// Wall-clock seconds spent in the recognizer call.
    pub recognize_seconds: f64,
    /// Output tokens after substitutions and conversions.
    pub tokens: Vec<Value>,
    /// Raw input tokens actually matched.
    pub raw_tokens: Vec<String>,
}

impl Recognition {
    /// True when both recognitions carry the same content, ignoring timing
    /// and confidence.
    pub fn same_result(&self, other: &Recognition) -> bool {
        self.intent.name == other.intent.name
            && self.text == other.text
            && self.raw_text == other.raw_text
            && self.tokens == other.tokens
            && self.raw_tokens == other.raw_tokens
            && self.entities == other.entities
    }
}

/// One step of the post-converter output stream.
enum Item {
    Begin(String),
    End(String),
    ConvertBegin(String),
    ConvertEnd(String),
    Pair {
        raw: Option<String>,
        value: Option<Value>,
    },
}

/// Build a recognition from an accepted edge trace.
///
/// The trace's olabels drive three passes: converter scopes are applied
/// innermost-first, tag boundaries open and close entity spans, and the
/// remaining tokens become the output/raw text with code-point offsets.
pub(crate) fn trace_to_recognition(
    graph: &IntentGraph,
    trace: &[EdgeRef],
    converters: &ConverterResolver<'_>,
) -> Result<Recognition> {
    let mut recognition = Recognition {
        intent: Intent {
            name: String::new(),
            confidence: 1.0,
        },
        ..Recognition::default()
    };

    // Pass 1: edge labels to stream items
    let mut items: Vec<Item> = Vec::new();
    for edge_ref in trace {
        let edge = graph.edge(*edge_ref);
        let raw = (!edge.ilabel.is_empty()).then(|| edge.ilabel.clone());
        let olabel = edge.olabel.as_str();

        if let Some(intent_name) = olabel.strip_prefix(INTENT_PREFIX) {
            recognition.intent.name = intent_name.to_string();
        } else if let Some(name) = olabel.strip_prefix(TAG_BEGIN_PREFIX) {
            items.push(Item::Begin(name.to_string()));
        } else if let Some(name) = olabel.strip_prefix(TAG_END_PREFIX) {
            items.push(Item::End(name.to_string()));
        } else if let Some(key) = olabel.strip_prefix(CONVERT_END_PREFIX) {
            // Checked before the begin prefix: `__converted__` contains it
            items.push(Item::ConvertEnd(key.to_string()));
        } else if let Some(key) = olabel.strip_prefix(CONVERT_BEGIN_PREFIX) {
            items.push(Item::ConvertBegin(key.to_string()));
        } else if raw.is_some() || !olabel.is_empty() {
            items.push(Item::Pair {
                raw,
                value: (!olabel.is_empty()).then(|| Value::String(edge.olabel.clone())),
            });
        }
    }

    // Pass 2: apply converter scopes, innermost first
    let mut scopes: Vec<(String, Vec<(Option<String>, Option<Value>)>)> = Vec::new();
    let mut stream: Vec<Item> = Vec::new();

    for item in items {
        match item {
            Item::ConvertBegin(key) => scopes.push((key, Vec::new())),
            Item::ConvertEnd(key) => {
                let Some((open_key, pairs)) = scopes.pop() else {
                    return Err(ParlanceError::recognition(format!(
                        "converter `{key}` closed without opening"
                    )));
                };
                if open_key != key {
                    return Err(ParlanceError::recognition(format!(
                        "mismatched converter scopes (`{open_key}` vs `{key}`)"
                    )));
                }

                let raws: Vec<String> = pairs.iter().filter_map(|(r, _)| r.clone()).collect();
                let values: Vec<Value> = pairs.into_iter().filter_map(|(_, v)| v).collect();
                let converted = converters.apply(&key, &values)?;

                let converted_pairs = zip_longest(raws, converted);
                if let Some((_, parent)) = scopes.last_mut() {
                    parent.extend(converted_pairs);
                } else {
                    stream.extend(
                        converted_pairs
                            .into_iter()
                            .map(|(raw, value)| Item::Pair { raw, value }),
                    );
                }
            }
            Item::Pair { raw, value } => {
                if let Some((_, scope)) = scopes.last_mut() {
                    scope.push((raw, value));
                } else {
                    stream.push(Item::Pair { raw, value });
                }
            }
            marker => stream.push(marker),
        }
    }

    if let Some((key, _)) = scopes.last() {
        return Err(ParlanceError::recognition(format!(
            "converter `{key}` never closed"
        )));
    }

    // Pass 3: entity spans, tokens, and offsets
    let mut entity_stack: Vec<Entity> = Vec::new();
    let mut raw_index = 0usize;
    let mut out_index = 0usize;

    for item in stream {
        match item {
            Item::Begin(name) => entity_stack.push(Entity {
                entity: name,
                start: out_index,
                raw_start: raw_index,
                ..Entity::default()
            }),
            Item::End(name) => {
                let Some(mut entity) = entity_stack.pop() else {
                    return Err(ParlanceError::recognition(format!(
                        "entity `{name}` closed without opening"
                    )));
                };
                if entity.entity != name {
                    return Err(ParlanceError::recognition(format!(
                        "mismatched entity spans (`{}` vs `{name}`)",
                        entity.entity
                    )));
                }

                entity.end = out_index.saturating_sub(1);
                entity.raw_end = raw_index.saturating_sub(1);
                entity.value = if entity.tokens.len() == 1 {
                    entity.tokens[0].clone()
                } else {
                    Value::String(
                        entity
                            .tokens
                            .iter()
                            .map(value_to_string)
                            .collect::<Vec<_>>()
                            .join(" "),
                    )
                };
                entity.raw_value = entity.raw_tokens.join(" ");
                recognition.entities.push(entity);
            }
            Item::Pair { raw, value } => {
                if let Some(raw) = raw {
                    raw_index += raw.chars().count() + 1;
                    if let Some(entity) = entity_stack.last_mut() {
                        entity.raw_tokens.push(raw.clone());
                    }
                    recognition.raw_tokens.push(raw);
                }
                if let Some(value) = value {
                    out_index += value_to_string(&value).chars().count() + 1;
                    if let Some(entity) = entity_stack.last_mut() {
                        entity.tokens.push(value.clone());
                    }
                    recognition.tokens.push(value);
                }
            }
            Item::ConvertBegin(_) | Item::ConvertEnd(_) => unreachable!(),
        }
    }

    if let Some(entity) = entity_stack.last() {
        return Err(ParlanceError::recognition(format!(
            "entity `{}` never closed",
            entity.entity
        )));
    }

    recognition.text = recognition
        .tokens
        .iter()
        .map(value_to_string)
        .collect::<Vec<_>>()
        .join(" ");
    recognition.raw_text = recognition.raw_tokens.join(" ");

    Ok(recognition)
}

fn zip_longest(raws: Vec<String>, values: Vec<Value>) -> Vec<(Option<String>, Option<Value>)> {
    let len = raws.len().max(values.len());
    let mut raws = raws.into_iter();
    let mut values = values.into_iter();
    (0..len).map(|_| (raws.next(), values.next())).collect()
}
