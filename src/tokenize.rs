//! Whitespace tokenization of input utterances.

use serde::{Deserialize, Serialize};

/// A single utterance token with its position and character offsets.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// The token text.
    pub text: String,
    /// 0-based token position.
    pub position: usize,
    /// Character offset where the token starts.
    pub start: usize,
    /// Character offset just past the token end.
    pub end: usize,
}

/// Split an utterance on whitespace, tracking character offsets.
pub fn tokenize(text: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut token_start = 0;

    for (offset, c) in text.chars().enumerate() {
        if c.is_whitespace() {
            if !current.is_empty() {
                tokens.push(Token {
                    text: std::mem::take(&mut current),
                    position: tokens.len(),
                    start: token_start,
                    end: offset,
                });
            }
        } else {
            if current.is_empty() {
                token_start = offset;
            }
            current.push(c);
        }
    }

    if !current.is_empty() {
        let end = token_start + current.chars().count();
        tokens.push(Token {
            text: current,
            position: tokens.len(),
            start: token_start,
            end,
        });
    }

    tokens
}

/// Split an utterance into plain token strings.
pub fn token_texts(text: &str) -> Vec<String> {
    text.split_whitespace().map(str::to_string).collect()
}
