//! Recursive-descent parser for template expressions.
//!
//! Parses one logical sentence line into an [`Expression`] tree. Errors carry
//! the line/column of the offending character and a short span of context.

use crate::error::{ParlanceError, Result};
use crate::jsgf::expression::{Expression, RuleRef, Sequence, SequenceType, SlotRef, Tag, Word};

/// Characters that terminate a word literal.
const DELIMITERS: &[char] = &['(', ')', '[', ']', '{', '}', '<', '>', '|'];

/// Parse a single sentence template into an expression tree.
pub fn parse_sentence(text: &str) -> Result<Expression> {
    parse_sentence_at(text, 1)
}

/// Parse a sentence, reporting errors against the given template line.
pub(crate) fn parse_sentence_at(text: &str, line: usize) -> Result<Expression> {
    let mut parser = ExpressionParser::new(text, line);
    let expr = parser.parse_alternatives(None)?;
    parser.skip_whitespace();
    if let Some(c) = parser.peek() {
        return Err(parser.error(format!("unexpected `{c}`")));
    }
    Ok(expr)
}

struct ExpressionParser {
    chars: Vec<char>,
    pos: usize,
    line: usize,
}

impl ExpressionParser {
    fn new(text: &str, line: usize) -> Self {
        ExpressionParser {
            chars: text.chars().collect(),
            pos: 0,
            line,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(|c| c.is_whitespace()) {
            self.pos += 1;
        }
    }

    fn error<M: Into<String>>(&self, message: M) -> ParlanceError {
        // Span of up to 20 characters around the failure point
        let start = self.pos.saturating_sub(10);
        let end = (self.pos + 10).min(self.chars.len());
        let span: String = self.chars[start..end].iter().collect();
        ParlanceError::parse(self.line, self.pos + 1, message, span)
    }

    /// Parse `expr ("|" expr)*`, optionally up to a closing delimiter.
    fn parse_alternatives(&mut self, end: Option<char>) -> Result<Expression> {
        let mut branches: Vec<Expression> = Vec::new();
        let mut saw_bar = false;

        loop {
            let branch = self.parse_sequence(end)?;
            match self.peek() {
                Some('|') => {
                    self.bump();
                    saw_bar = true;
                    branches.push(self.check_branch(branch)?);
                }
                Some(c) if Some(c) == end => {
                    self.bump();
                    branches.push(branch);
                    break;
                }
                None if end.is_none() => {
                    branches.push(branch);
                    break;
                }
                None => {
                    return Err(self.error(format!("missing closing `{}`", end.unwrap())));
                }
                Some(c) => {
                    return Err(self.error(format!("unexpected `{c}`")));
                }
            }
        }

        if !saw_bar {
            let only = branches.pop().unwrap_or(Expression::Word(Word::empty()));
            return Ok(only);
        }

        let branches = branches
            .into_iter()
            .map(|b| self.check_branch(b).and_then(|b| self.apply_branch_weight(b)))
            .collect::<Result<Vec<_>>>()?;

        Ok(Expression::Sequence(Sequence::alternative(branches)))
    }

    /// Alternatives may not have silently empty branches.
    fn check_branch(&self, branch: Expression) -> Result<Expression> {
        let empty = match &branch {
            Expression::Word(w) => w.text.is_empty() && w.substitution.is_none(),
            Expression::Sequence(seq) => seq.items.is_empty(),
            _ => false,
        };
        if empty {
            Err(self.error("empty alternative branch"))
        } else {
            Ok(branch)
        }
    }

    /// Strip a leading numeric literal from an alternative branch and use it
    /// as the branch weight.
    fn apply_branch_weight(&self, branch: Expression) -> Result<Expression> {
        let Expression::Sequence(mut seq) = branch else {
            return Ok(branch);
        };
        if seq.seq_type != SequenceType::Group || seq.items.len() < 2 {
            return Ok(Expression::Sequence(seq));
        }

        let weight = match &seq.items[0] {
            Expression::Word(w)
                if w.substitution.is_none() && w.converters.is_empty() =>
            {
                w.text.parse::<f64>().ok()
            }
            _ => None,
        };

        if let Some(weight) = weight {
            if !weight.is_finite() || weight < 0.0 {
                return Err(self.error(format!("malformed weight `{weight}`")));
            }
            seq.items.remove(0);
            seq.weight = weight;
        }

        Ok(Expression::Sequence(seq))
    }

    /// Parse a whitespace-separated sequence of elements, stopping at `|`,
    /// the closing delimiter, or end of input.
    fn parse_sequence(&mut self, end: Option<char>) -> Result<Expression> {
        let mut items: Vec<Expression> = Vec::new();

        loop {
            self.skip_whitespace();
            let Some(c) = self.peek() else { break };
            if c == '|' || Some(c) == end {
                break;
            }

            match c {
                '(' => {
                    self.bump();
                    let inner = self.parse_alternatives(Some(')'))?;
                    let inner = self.parse_postfix(inner, true)?;
                    items.push(inner);
                }
                '[' => {
                    self.bump();
                    let inner = self.parse_alternatives(Some(']'))?;
                    let optional = self.make_optional(inner);
                    let optional = self.parse_postfix(optional, true)?;
                    items.push(optional);
                }
                '<' => {
                    self.bump();
                    let rule_ref = self.parse_rule_ref()?;
                    let rule_ref = self.parse_postfix(rule_ref, false)?;
                    items.push(rule_ref);
                }
                '{' => {
                    // Tag binds to the preceding element
                    let Some(prev) = items.pop() else {
                        return Err(self.error("tag without a preceding expression"));
                    };
                    let tagged = self.parse_postfix(prev, false)?;
                    items.push(tagged);
                }
                ')' | ']' | '}' | '>' => {
                    return Err(self.error(format!("unbalanced `{c}`")));
                }
                _ => {
                    let word = self.parse_word_element()?;
                    let word = self.parse_postfix(word, false)?;
                    items.push(word);
                }
            }
        }

        match items.len() {
            0 => Ok(Expression::Sequence(Sequence::group(Vec::new()))),
            1 => Ok(items.pop().unwrap()),
            _ => Ok(Expression::Sequence(Sequence::group(items))),
        }
    }

    /// Wrap the inside of `[...]` as an optional.
    fn make_optional(&self, inner: Expression) -> Expression {
        let items = match inner {
            Expression::Sequence(seq) if seq.seq_type == SequenceType::Alternative => seq.items,
            other => vec![other],
        };
        Expression::Sequence(Sequence {
            items,
            ..Sequence::new(SequenceType::Optional)
        })
    }

    /// Parse `<name>` or `<Grammar.name>` after the opening `<`.
    fn parse_rule_ref(&mut self) -> Result<Expression> {
        let mut name = String::new();
        loop {
            match self.bump() {
                Some('>') => break,
                Some(c) if c.is_whitespace() => {
                    return Err(self.error("whitespace inside rule reference"));
                }
                Some(c) => name.push(c),
                None => return Err(self.error("missing closing `>`")),
            }
        }
        if name.is_empty() {
            return Err(self.error("empty rule reference"));
        }

        // Split on the last dot: everything before is the owning intent
        let rule_ref = match name.rfind('.') {
            Some(dot) => RuleRef {
                name: name[dot + 1..].to_string(),
                grammar: Some(name[..dot].to_string()),
            },
            None => RuleRef {
                name,
                grammar: None,
            },
        };
        Ok(Expression::RuleRef(rule_ref))
    }

    /// Parse a literal token, producing a word or slot reference.
    fn parse_word_element(&mut self) -> Result<Expression> {
        let token = self.scan_token()?;
        debug_assert!(!token.is_empty());

        if let Some(slot_token) = token.strip_prefix('$') {
            let (body, converters) = split_converters(slot_token);
            let (name, substitution) = split_substitution(body);
            if name.is_empty() {
                return Err(self.error("empty slot reference"));
            }
            return Ok(Expression::SlotRef(SlotRef {
                name,
                substitution,
                converters,
            }));
        }

        let (body, converters) = split_converters(&token);
        let (text, mut substitution) = split_substitution(body);

        // `one:(first number)` — group-valued substitution after a word
        if substitution.as_deref() == Some("") && self.peek() == Some('(') {
            self.bump();
            substitution = Some(self.scan_substitution_group()?.join(" "));
        }

        Ok(Expression::Word(Word {
            text,
            substitution,
            converters,
        }))
    }

    /// Scan a raw token up to whitespace or a delimiter, honoring escapes.
    fn scan_token(&mut self) -> Result<String> {
        let mut token = String::new();
        while let Some(c) = self.peek() {
            if c.is_whitespace() || DELIMITERS.contains(&c) {
                break;
            }
            if c == '\\' {
                self.bump();
                match self.bump() {
                    Some(esc)
                        if DELIMITERS.contains(&esc)
                            || matches!(esc, '\\' | '$' | '!' | ':' | '#' | ';') =>
                    {
                        token.push(esc);
                    }
                    Some(esc) => return Err(self.error(format!("unknown escape `\\{esc}`"))),
                    None => return Err(self.error("dangling escape")),
                }
                continue;
            }
            token.push(c);
            self.bump();
        }
        Ok(token)
    }

    /// Postfix chain after an atom: `:substitution`, `{tag}`, `!converter`.
    ///
    /// Tags do not stack: wrapping an already-tagged expression in another
    /// tag requires an explicit group, so `word{a}{b}` is an error while
    /// `(word{a}){b}` nests. `explicit_group` is true when the atom came
    /// from `(...)` or `[...]`.
    fn parse_postfix(&mut self, mut expr: Expression, explicit_group: bool) -> Result<Expression> {
        let mut tag_allowed_on_tag = explicit_group;
        loop {
            match self.peek() {
                Some(':') => {
                    self.bump();
                    let words = self.scan_substitution()?;
                    self.attach_substitution(&mut expr, words)?;
                }
                Some('!') => {
                    self.bump();
                    let name = self.scan_converter_name()?;
                    self.attach_converter(&mut expr, name);
                }
                Some('{') => {
                    if matches!(expr, Expression::Tag(_)) && !tag_allowed_on_tag {
                        return Err(self.error("tag nesting requires an explicit group"));
                    }
                    self.bump();
                    expr = self.parse_tag(expr)?;
                    tag_allowed_on_tag = false;
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    /// Scan the value of a `:substitution`, either a bare token or `( ... )`.
    fn scan_substitution(&mut self) -> Result<Vec<String>> {
        if self.peek() == Some('(') {
            self.bump();
            return self.scan_substitution_group();
        }
        let token = self.scan_token()?;
        if token.is_empty() {
            // `:` with no output drops the input from the output stream
            Ok(Vec::new())
        } else {
            Ok(vec![token])
        }
    }

    /// Scan substitution words up to the closing `)`.
    fn scan_substitution_group(&mut self) -> Result<Vec<String>> {
        let mut words = Vec::new();
        loop {
            self.skip_whitespace();
            match self.peek() {
                Some(')') => {
                    self.bump();
                    break;
                }
                Some(_) => {
                    let token = self.scan_token()?;
                    if token.is_empty() {
                        return Err(self.error("unexpected character in substitution"));
                    }
                    words.push(token);
                }
                None => return Err(self.error("missing closing `)` in substitution")),
            }
        }
        Ok(words)
    }

    fn scan_converter_name(&mut self) -> Result<String> {
        let mut name = String::new();
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || matches!(c, '_' | ',' | '.' | '-') {
                name.push(c);
                self.bump();
            } else {
                break;
            }
        }
        if name.is_empty() {
            return Err(self.error("empty converter name"));
        }
        Ok(name)
    }

    fn attach_substitution(&self, expr: &mut Expression, words: Vec<String>) -> Result<()> {
        match expr {
            Expression::Word(word) => {
                word.substitution = Some(words.join(" "));
            }
            Expression::Sequence(seq) => {
                seq.substitution = Some(words);
            }
            Expression::Tag(tag) => {
                tag.substitution = Some(words);
            }
            Expression::SlotRef(slot) => {
                slot.substitution = Some(words.join(" "));
            }
            Expression::RuleRef(_) => {
                return Err(self.error("substitution not allowed on a rule reference"));
            }
        }
        Ok(())
    }

    fn attach_converter(&self, expr: &mut Expression, name: String) {
        match expr {
            Expression::Word(word) => word.converters.push(name),
            Expression::Sequence(seq) => seq.converters.push(name),
            Expression::Tag(tag) => tag.converters.push(name),
            Expression::SlotRef(slot) => slot.converters.push(name),
            Expression::RuleRef(_) => {}
        }
    }

    /// Parse `{name}`, `{name:sub}`, or `{name!conv}` after the opening `{`,
    /// wrapping the preceding expression.
    fn parse_tag(&mut self, inner: Expression) -> Result<Expression> {
        let mut content = String::new();
        loop {
            match self.bump() {
                Some('}') => break,
                Some(c) => content.push(c),
                None => return Err(self.error("missing closing `}`")),
            }
        }

        let (body, converters) = split_converters(&content);
        let (name, substitution) = split_substitution(body);
        if name.is_empty() {
            return Err(self.error("empty tag name"));
        }

        Ok(Expression::Tag(Tag {
            name,
            inner: Box::new(inner),
            substitution: substitution
                .map(|s| s.split_whitespace().map(str::to_string).collect()),
            converters,
        }))
    }
}

/// Split trailing `!converter` chains off a token.
fn split_converters(token: &str) -> (&str, Vec<String>) {
    let mut parts = token.split('!');
    let body = parts.next().unwrap_or("");
    let converters: Vec<String> = parts.map(str::to_string).collect();
    (body, converters)
}

/// Split a `text:substitution` token at the first colon.
fn split_substitution(token: &str) -> (String, Option<String>) {
    match token.split_once(':') {
        Some((text, sub)) => (text.to_string(), Some(sub.to_string())),
        None => (token.to_string(), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(texts: &[&str]) -> Vec<Expression> {
        texts.iter().map(|t| Expression::word(*t)).collect()
    }

    #[test]
    fn test_plain_sentence() {
        let expr = parse_sentence("this is a test").unwrap();
        assert_eq!(
            expr,
            Expression::Sequence(Sequence::group(words(&["this", "is", "a", "test"])))
        );
    }

    #[test]
    fn test_single_word() {
        let expr = parse_sentence("hello").unwrap();
        assert_eq!(expr, Expression::word("hello"));
    }

    #[test]
    fn test_optional() {
        let expr = parse_sentence("turn on [the] lamp").unwrap();
        let Expression::Sequence(seq) = expr else {
            panic!("expected sequence");
        };
        assert_eq!(seq.items.len(), 4);
        let Expression::Sequence(optional) = &seq.items[2] else {
            panic!("expected optional");
        };
        assert_eq!(optional.seq_type, SequenceType::Optional);
        assert_eq!(optional.items, words(&["the"]));
    }

    #[test]
    fn test_alternatives() {
        let expr = parse_sentence("(red | green | blue)").unwrap();
        let Expression::Sequence(alt) = expr else {
            panic!("expected alternative");
        };
        assert_eq!(alt.seq_type, SequenceType::Alternative);
        assert_eq!(alt.items, words(&["red", "green", "blue"]));
    }

    #[test]
    fn test_top_level_alternatives() {
        let expr = parse_sentence("red | green").unwrap();
        let Expression::Sequence(alt) = expr else {
            panic!("expected alternative");
        };
        assert_eq!(alt.seq_type, SequenceType::Alternative);
        assert_eq!(alt.items.len(), 2);
    }

    #[test]
    fn test_multi_word_branches() {
        let expr = parse_sentence("(living room lamp | kitchen light)").unwrap();
        let Expression::Sequence(alt) = expr else {
            panic!("expected alternative");
        };
        assert_eq!(alt.items.len(), 2);
        assert_eq!(
            alt.items[0],
            Expression::Sequence(Sequence::group(words(&["living", "room", "lamp"])))
        );
    }

    #[test]
    fn test_weighted_alternatives() {
        let expr = parse_sentence("(2 red | 1 blue | green)").unwrap();
        let Expression::Sequence(alt) = expr else {
            panic!("expected alternative");
        };
        assert_eq!(alt.items.len(), 3);

        let Expression::Sequence(red) = &alt.items[0] else {
            panic!("expected weighted branch");
        };
        assert_eq!(red.weight, 2.0);
        assert_eq!(red.items, words(&["red"]));

        let Expression::Sequence(blue) = &alt.items[1] else {
            panic!("expected weighted branch");
        };
        assert_eq!(blue.weight, 1.0);

        // No weight: plain word branch
        assert_eq!(alt.items[2], Expression::word("green"));
    }

    #[test]
    fn test_substitution() {
        let expr = parse_sentence("ten:10").unwrap();
        assert_eq!(expr, Expression::Word(Word::with_substitution("ten", "10")));
    }

    #[test]
    fn test_empty_substitution() {
        let expr = parse_sentence("four: two").unwrap();
        let Expression::Sequence(seq) = expr else {
            panic!("expected sequence");
        };
        assert_eq!(
            seq.items[0],
            Expression::Word(Word::with_substitution("four", ""))
        );
    }

    #[test]
    fn test_word_converters() {
        let expr = parse_sentence("ten:10!int!square").unwrap();
        assert_eq!(
            expr,
            Expression::Word(Word {
                text: "ten".to_string(),
                substitution: Some("10".to_string()),
                converters: vec!["int".to_string(), "square".to_string()],
            })
        );
    }

    #[test]
    fn test_group_substitution() {
        let expr = parse_sentence("(a b):c").unwrap();
        let Expression::Sequence(seq) = expr else {
            panic!("expected sequence");
        };
        assert_eq!(seq.substitution, Some(vec!["c".to_string()]));
    }

    #[test]
    fn test_group_converters() {
        let expr = parse_sentence("this (is a test)!upper").unwrap();
        let Expression::Sequence(outer) = expr else {
            panic!("expected sequence");
        };
        let Expression::Sequence(group) = &outer.items[1] else {
            panic!("expected group");
        };
        assert_eq!(group.converters, vec!["upper".to_string()]);
    }

    #[test]
    fn test_tag() {
        let expr = parse_sentence("(kitchen light){name}").unwrap();
        let Expression::Tag(tag) = expr else {
            panic!("expected tag");
        };
        assert_eq!(tag.name, "name");
        assert!(tag.substitution.is_none());
        assert!(tag.converters.is_empty());
    }

    #[test]
    fn test_tag_on_word() {
        let expr = parse_sentence("bedroom{zone}").unwrap();
        let Expression::Tag(tag) = expr else {
            panic!("expected tag");
        };
        assert_eq!(tag.name, "zone");
        assert_eq!(*tag.inner, Expression::word("bedroom"));
    }

    #[test]
    fn test_stacked_tags_rejected() {
        let err = parse_sentence("bedroom{zone}{name}").unwrap_err();
        assert!(err.to_string().contains("explicit group"));
    }

    #[test]
    fn test_nested_tags_with_group() {
        let expr = parse_sentence("(bedroom{zone}){location}").unwrap();
        let Expression::Tag(outer) = expr else {
            panic!("expected tag");
        };
        assert_eq!(outer.name, "location");
        let Expression::Tag(inner) = *outer.inner else {
            panic!("expected inner tag");
        };
        assert_eq!(inner.name, "zone");
    }

    #[test]
    fn test_tag_substitution_and_converters() {
        let expr = parse_sentence("(ten){value:10!int}").unwrap();
        let Expression::Tag(tag) = expr else {
            panic!("expected tag");
        };
        assert_eq!(tag.name, "value");
        assert_eq!(tag.substitution, Some(vec!["10".to_string()]));
        assert_eq!(tag.converters, vec!["int".to_string()]);
    }

    #[test]
    fn test_rule_reference() {
        let expr = parse_sentence("<rule> <Intent1.rule>").unwrap();
        let Expression::Sequence(seq) = expr else {
            panic!("expected sequence");
        };
        assert_eq!(
            seq.items[0],
            Expression::RuleRef(RuleRef {
                name: "rule".to_string(),
                grammar: None,
            })
        );
        assert_eq!(
            seq.items[1],
            Expression::RuleRef(RuleRef {
                name: "rule".to_string(),
                grammar: Some("Intent1".to_string()),
            })
        );
    }

    #[test]
    fn test_slot_reference() {
        let expr = parse_sentence("play $album now").unwrap();
        let Expression::Sequence(seq) = expr else {
            panic!("expected sequence");
        };
        assert_eq!(
            seq.items[1],
            Expression::SlotRef(SlotRef {
                name: "album".to_string(),
                substitution: None,
                converters: Vec::new(),
            })
        );
    }

    #[test]
    fn test_tagged_slot() {
        let expr = parse_sentence("($colors){color}").unwrap();
        let Expression::Tag(tag) = expr else {
            panic!("expected tag");
        };
        assert_eq!(tag.name, "color");
        assert_eq!(
            *tag.inner,
            Expression::SlotRef(SlotRef {
                name: "colors".to_string(),
                substitution: None,
                converters: Vec::new(),
            })
        );
    }

    #[test]
    fn test_unbalanced_group() {
        let err = parse_sentence("(red | green").unwrap_err();
        assert!(err.to_string().contains("missing closing"));
    }

    #[test]
    fn test_unbalanced_close() {
        let err = parse_sentence("red)").unwrap_err();
        assert!(err.to_string().contains("unbalanced"));
    }

    #[test]
    fn test_empty_branch() {
        let err = parse_sentence("(red | | green)").unwrap_err();
        assert!(err.to_string().contains("empty alternative branch"));
    }

    #[test]
    fn test_tag_without_atom() {
        let err = parse_sentence("{name}").unwrap_err();
        assert!(err.to_string().contains("tag without a preceding"));
    }

    #[test]
    fn test_unknown_escape() {
        let err = parse_sentence(r"bad\q").unwrap_err();
        assert!(err.to_string().contains("unknown escape"));
    }

    #[test]
    fn test_escaped_delimiter() {
        let expr = parse_sentence(r"\[literal\]").unwrap();
        assert_eq!(expr, Expression::word("[literal]"));
    }

    #[test]
    fn test_optional_alternatives_unwrap() {
        let expr = parse_sentence("[red | green]").unwrap();
        let Expression::Sequence(optional) = expr else {
            panic!("expected optional");
        };
        assert_eq!(optional.seq_type, SequenceType::Optional);
        assert_eq!(optional.items, words(&["red", "green"]));
    }
}
