//! Incremental parser for streamed tool-call arguments.
//!
//! Models stream the `arguments` object of a tool call as arbitrary text
//! fragments. [`IncrementalJsonParser`] consumes those fragments one at a
//! time and surfaces the literal content of every value as soon as it is
//! known, addressed by its JSON path (`foo.bar[2].baz`).
//!
//! Characters are accumulated in per-path buffers. The buffers are flushed
//! as [`ArgumentUpdate`]s whenever the current path changes, whenever a
//! value terminates, and at the end of every fed chunk. Concatenating all
//! updates for a path therefore yields the same text no matter how the
//! document was split.
//!
//! Numbers are surfaced character by character without numeric
//! validation. `\uXXXX` escapes are recognised but passed through verbatim
//! rather than decoded.
//!
//! One parser instance serves exactly one tool call.

use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

use crate::types::{ParamType, Property};

/// New literal content for one JSON path
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArgumentUpdate {
    pub path: String,
    pub chunk: String,
    /// Type declared for this path by the tool schema, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub declared_type: Option<ParamType>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unexpected character {found:?} at offset {offset}, expected {expected}")]
    UnexpectedChar {
        offset: usize,
        found: char,
        expected: &'static str,
    },

    #[error("invalid literal at offset {offset}: {found:?} does not continue {expected:?}")]
    InvalidLiteral {
        offset: usize,
        expected: &'static str,
        found: char,
    },

    #[error("invalid escape sequence at offset {offset}: {found:?}")]
    InvalidEscape { offset: usize, found: char },

    #[error("trailing character {found:?} at offset {offset} after the complete document")]
    TrailingCharacters { offset: usize, found: char },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Grammar {
    /// Expecting the top-level value
    Root,
    /// Top-level value finished; only whitespace may follow
    Done,
    ObjectStart,
    ObjectKey,
    ObjectColon,
    ObjectValue,
    ObjectComma,
    ArrayStart,
    ArrayValue,
    ArrayComma,
    String { key: bool },
    StringEscape { key: bool },
    UnicodeEscape { key: bool, remaining: u8 },
    Number,
    Literal { word: &'static str, matched: usize },
}

#[derive(Debug, Clone)]
enum Segment {
    Key(String),
    Index(usize),
}

#[derive(Debug)]
struct Frame {
    grammar: Grammar,
    schema: Option<Property>,
    /// Next element index (arrays only)
    index: usize,
    /// Whether opening this value pushed a path segment
    owns_path: bool,
}

impl Frame {
    fn new(grammar: Grammar, schema: Option<Property>, owns_path: bool) -> Self {
        Self {
            grammar,
            schema,
            index: 0,
            owns_path,
        }
    }
}

#[derive(Debug, Default)]
struct PendingChunk {
    text: String,
    declared_type: Option<ParamType>,
}

#[derive(Debug)]
pub struct IncrementalJsonParser {
    stack: Vec<Frame>,
    path: Vec<Segment>,
    key: String,
    buffers: BTreeMap<String, PendingChunk>,
    offset: usize,
    failure: Option<ParseError>,
}

impl Default for IncrementalJsonParser {
    fn default() -> Self {
        Self::new()
    }
}

impl IncrementalJsonParser {
    pub fn new() -> Self {
        Self {
            stack: vec![Frame::new(Grammar::Root, None, false)],
            path: Vec::new(),
            key: String::new(),
            buffers: BTreeMap::new(),
            offset: 0,
            failure: None,
        }
    }

    /// Parser that descends into `schema` to tag updates with declared types
    pub fn with_schema(schema: &Property) -> Self {
        let mut parser = Self::new();
        parser.stack[0].schema = Some(schema.clone());
        parser
    }

    /// Attach `schema` to a parser that may already be mid-value
    ///
    /// Open containers take their sub-schema along the current path, so
    /// text from here on is tagged. Updates already returned stay untyped.
    pub fn set_schema(&mut self, schema: &Property) {
        let mut current = Some(schema.clone());
        let mut segments = self.path.iter();
        for (depth, frame) in self.stack.iter_mut().enumerate() {
            if matches!(
                frame.grammar,
                Grammar::String { key: true }
                    | Grammar::StringEscape { key: true }
                    | Grammar::UnicodeEscape { key: true, .. }
            ) {
                continue;
            }
            if depth > 0 && frame.owns_path {
                current = match (current, segments.next()) {
                    (Some(parent), Some(Segment::Key(key))) => parent.properties.get(key).cloned(),
                    (Some(parent), Some(Segment::Index(_))) => parent.items.as_deref().cloned(),
                    _ => None,
                };
            }
            frame.schema = current.clone();
        }
        let declared_type = self.top_schema().and_then(|s| s.kind);
        let path = self.current_path();
        if let Some(pending) = self.buffers.get_mut(&path) {
            pending.declared_type = declared_type;
        }
    }

    /// Whether the top-level value has been fully consumed
    pub fn is_complete(&self) -> bool {
        self.top() == Grammar::Done
    }

    /// Feed the next fragment of argument text.
    ///
    /// After the first error every further call returns that same error.
    pub fn feed(&mut self, chunk: &str) -> Result<Vec<ArgumentUpdate>, ParseError> {
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }

        let mut updates = Vec::new();
        for c in chunk.chars() {
            if let Err(err) = self.step(c, &mut updates) {
                tracing::debug!(offset = self.offset, error = %err, "tool argument stream rejected");
                self.failure = Some(err.clone());
                return Err(err);
            }
            self.offset += c.len_utf8();
        }
        self.flush(&mut updates);
        Ok(updates)
    }

    fn step(&mut self, c: char, updates: &mut Vec<ArgumentUpdate>) -> Result<(), ParseError> {
        loop {
            let grammar = self.top();
            match grammar {
                Grammar::String { key } => return self.string_char(c, key, updates),
                Grammar::StringEscape { key } => return self.escape_char(c, key),
                Grammar::UnicodeEscape { key, remaining } => {
                    if !c.is_ascii_hexdigit() {
                        return Err(ParseError::InvalidEscape { offset: self.offset, found: c });
                    }
                    self.push_text(key, c);
                    self.set_top(if remaining > 1 {
                        Grammar::UnicodeEscape { key, remaining: remaining - 1 }
                    } else {
                        Grammar::String { key }
                    });
                    return Ok(());
                }
                Grammar::Number => {
                    if is_number_char(c) {
                        self.push_value_char(c);
                        return Ok(());
                    }
                    // The terminator belongs to the enclosing value
                    self.end_value(updates);
                    continue;
                }
                Grammar::Literal { word, matched } => {
                    let expected = word.as_bytes()[matched] as char;
                    if c != expected {
                        return Err(ParseError::InvalidLiteral {
                            offset: self.offset,
                            expected: word,
                            found: c,
                        });
                    }
                    self.push_value_char(c);
                    if matched + 1 == word.len() {
                        self.end_value(updates);
                    } else {
                        self.set_top(Grammar::Literal { word, matched: matched + 1 });
                    }
                    return Ok(());
                }
                _ => {}
            }

            if is_whitespace(c) {
                return Ok(());
            }
            return self.structural(c, grammar, updates);
        }
    }

    fn structural(
        &mut self,
        c: char,
        grammar: Grammar,
        updates: &mut Vec<ArgumentUpdate>,
    ) -> Result<(), ParseError> {
        match grammar {
            Grammar::Root => {
                let schema = self.top_schema().cloned();
                self.set_top(Grammar::Done);
                self.open_value(c, None, schema, updates)
            }
            Grammar::Done => Err(ParseError::TrailingCharacters { offset: self.offset, found: c }),
            Grammar::ObjectStart | Grammar::ObjectKey => match c {
                '"' => {
                    self.set_top(Grammar::ObjectColon);
                    self.key.clear();
                    self.stack.push(Frame::new(Grammar::String { key: true }, None, false));
                    Ok(())
                }
                '}' if grammar == Grammar::ObjectStart => {
                    self.end_value(updates);
                    Ok(())
                }
                _ => Err(self.unexpected(c, "an object key")),
            },
            Grammar::ObjectColon => match c {
                ':' => {
                    self.set_top(Grammar::ObjectValue);
                    Ok(())
                }
                _ => Err(self.unexpected(c, "':'")),
            },
            Grammar::ObjectValue => {
                let key = std::mem::take(&mut self.key);
                let schema = self
                    .top_schema()
                    .and_then(|s| s.properties.get(&key))
                    .cloned();
                self.set_top(Grammar::ObjectComma);
                self.open_value(c, Some(Segment::Key(key)), schema, updates)
            }
            Grammar::ObjectComma => match c {
                ',' => {
                    self.set_top(Grammar::ObjectKey);
                    Ok(())
                }
                '}' => {
                    self.end_value(updates);
                    Ok(())
                }
                _ => Err(self.unexpected(c, "',' or '}'")),
            },
            Grammar::ArrayStart | Grammar::ArrayValue => {
                if c == ']' && grammar == Grammar::ArrayStart {
                    self.end_value(updates);
                    return Ok(());
                }
                let schema = self
                    .top_schema()
                    .and_then(|s| s.items.as_deref())
                    .cloned();
                let index = self.stack.last().map(|f| f.index).unwrap_or_default();
                self.set_top(Grammar::ArrayComma);
                self.open_value(c, Some(Segment::Index(index)), schema, updates)
            }
            Grammar::ArrayComma => match c {
                ',' => {
                    if let Some(frame) = self.stack.last_mut() {
                        frame.index += 1;
                        frame.grammar = Grammar::ArrayValue;
                    }
                    Ok(())
                }
                ']' => {
                    self.end_value(updates);
                    Ok(())
                }
                _ => Err(self.unexpected(c, "',' or ']'")),
            },
            // Scalar states are fully handled in `step`
            Grammar::String { .. }
            | Grammar::StringEscape { .. }
            | Grammar::UnicodeEscape { .. }
            | Grammar::Number
            | Grammar::Literal { .. } => Err(self.unexpected(c, "a value")),
        }
    }

    fn open_value(
        &mut self,
        c: char,
        segment: Option<Segment>,
        schema: Option<Property>,
        updates: &mut Vec<ArgumentUpdate>,
    ) -> Result<(), ParseError> {
        let grammar = match c {
            '{' => Grammar::ObjectStart,
            '[' => Grammar::ArrayStart,
            '"' => Grammar::String { key: false },
            '-' | '+' | '0'..='9' => Grammar::Number,
            't' => Grammar::Literal { word: "true", matched: 1 },
            'f' => Grammar::Literal { word: "false", matched: 1 },
            'n' => Grammar::Literal { word: "null", matched: 1 },
            _ => return Err(self.unexpected(c, "a value")),
        };

        let owns_path = segment.is_some();
        if let Some(segment) = segment {
            self.flush(updates);
            self.path.push(segment);
        }
        self.stack.push(Frame::new(grammar, schema, owns_path));

        if matches!(grammar, Grammar::Number | Grammar::Literal { .. }) {
            self.push_value_char(c);
        }
        Ok(())
    }

    fn string_char(
        &mut self,
        c: char,
        key: bool,
        updates: &mut Vec<ArgumentUpdate>,
    ) -> Result<(), ParseError> {
        match c {
            '"' if key => {
                // Parent already waits for the colon
                self.stack.pop();
            }
            '"' => self.end_value(updates),
            '\\' => self.set_top(Grammar::StringEscape { key }),
            _ => self.push_text(key, c),
        }
        Ok(())
    }

    fn escape_char(&mut self, c: char, key: bool) -> Result<(), ParseError> {
        let decoded = match c {
            'n' => '\n',
            'r' => '\r',
            't' => '\t',
            'b' => '\u{8}',
            'f' => '\u{c}',
            '\\' => '\\',
            '/' => '/',
            '"' => '"',
            'u' => {
                self.push_text(key, '\\');
                self.push_text(key, 'u');
                self.set_top(Grammar::UnicodeEscape { key, remaining: 4 });
                return Ok(());
            }
            _ => return Err(ParseError::InvalidEscape { offset: self.offset, found: c }),
        };
        self.push_text(key, decoded);
        self.set_top(Grammar::String { key });
        Ok(())
    }

    /// Close the value on top of the stack
    fn end_value(&mut self, updates: &mut Vec<ArgumentUpdate>) {
        self.flush(updates);
        if let Some(frame) = self.stack.pop() {
            if frame.owns_path {
                self.path.pop();
            }
        }
    }

    fn flush(&mut self, updates: &mut Vec<ArgumentUpdate>) {
        for (path, pending) in std::mem::take(&mut self.buffers) {
            if !pending.text.is_empty() {
                updates.push(ArgumentUpdate {
                    path,
                    chunk: pending.text,
                    declared_type: pending.declared_type,
                });
            }
        }
    }

    fn push_text(&mut self, key: bool, c: char) {
        if key {
            self.key.push(c);
        } else {
            self.push_value_char(c);
        }
    }

    fn push_value_char(&mut self, c: char) {
        let declared_type = self.top_schema().and_then(|s| s.kind);
        let entry = self.buffers.entry(self.current_path()).or_default();
        entry.declared_type = declared_type;
        entry.text.push(c);
    }

    fn current_path(&self) -> String {
        let mut rendered = String::new();
        for segment in &self.path {
            match segment {
                Segment::Key(key) => {
                    if !rendered.is_empty() {
                        rendered.push('.');
                    }
                    rendered.push_str(key);
                }
                Segment::Index(index) => {
                    rendered.push('[');
                    rendered.push_str(&index.to_string());
                    rendered.push(']');
                }
            }
        }
        rendered
    }

    fn top(&self) -> Grammar {
        self.stack.last().map(|f| f.grammar).unwrap_or(Grammar::Done)
    }

    fn top_schema(&self) -> Option<&Property> {
        self.stack.last().and_then(|f| f.schema.as_ref())
    }

    fn set_top(&mut self, grammar: Grammar) {
        if let Some(frame) = self.stack.last_mut() {
            frame.grammar = grammar;
        }
    }

    fn unexpected(&self, found: char, expected: &'static str) -> ParseError {
        ParseError::UnexpectedChar {
            offset: self.offset,
            found,
            expected,
        }
    }
}

fn is_whitespace(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\r')
}

fn is_number_char(c: char) -> bool {
    c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(updates: &[ArgumentUpdate]) -> BTreeMap<String, String> {
        let mut out = BTreeMap::new();
        for update in updates {
            out.entry(update.path.clone())
                .or_insert_with(String::new)
                .push_str(&update.chunk);
        }
        out
    }

    #[test]
    fn test_nested_paths() {
        let mut parser = IncrementalJsonParser::new();
        let updates = parser
            .feed(r#"{"foo":{"bar":[1,{"baz":"x"}]}}"#)
            .unwrap();
        let values = collect(&updates);

        assert_eq!(values["foo.bar[0]"], "1");
        assert_eq!(values["foo.bar[1].baz"], "x");
        assert!(parser.is_complete());
    }

    #[test]
    fn test_number_terminated_by_next_chunk() {
        let mut parser = IncrementalJsonParser::new();
        let first = parser.feed(r#"{"n":-12"#).unwrap();
        assert_eq!(first, vec![ArgumentUpdate {
            path: "n".to_string(),
            chunk: "-12".to_string(),
            declared_type: None,
        }]);

        let second = parser.feed(".5e3}").unwrap();
        assert_eq!(collect(&second)["n"], ".5e3");
        assert!(parser.is_complete());
    }

    #[test]
    fn test_escapes_are_translated() {
        let mut parser = IncrementalJsonParser::new();
        let updates = parser.feed(r#"{"s":"a\nb\t\"q\"\/\\"}"#).unwrap();
        assert_eq!(collect(&updates)["s"], "a\nb\t\"q\"/\\");
    }

    #[test]
    fn test_unicode_escape_passes_through() {
        let mut parser = IncrementalJsonParser::new();
        let updates = parser.feed(r#"{"s":"x\u00e9y"}"#).unwrap();
        assert_eq!(collect(&updates)["s"], "x\\u00e9y");
    }

    #[test]
    fn test_escaped_key() {
        let mut parser = IncrementalJsonParser::new();
        let updates = parser.feed(r#"{"a\"b":true}"#).unwrap();
        assert_eq!(collect(&updates)["a\"b"], "true");
    }

    #[test]
    fn test_literals_surface_characters() {
        let mut parser = IncrementalJsonParser::new();
        let updates = parser.feed(r#"{"t":true,"f":false,"n":null}"#).unwrap();
        let values = collect(&updates);
        assert_eq!(values["t"], "true");
        assert_eq!(values["f"], "false");
        assert_eq!(values["n"], "null");
    }

    #[test]
    fn test_bad_literal_is_fatal() {
        let mut parser = IncrementalJsonParser::new();
        let err = parser.feed(r#"{"t":tru"#).and_then(|_| parser.feed("x}")).unwrap_err();
        assert!(matches!(err, ParseError::InvalidLiteral { expected: "true", found: 'x', .. }));

        // Poisoned from here on
        assert_eq!(parser.feed("}").unwrap_err(), err);
    }

    #[test]
    fn test_structural_errors() {
        let mut parser = IncrementalJsonParser::new();
        assert!(matches!(
            parser.feed(r#"{"a" 1}"#).unwrap_err(),
            ParseError::UnexpectedChar { found: '1', .. }
        ));

        let mut parser = IncrementalJsonParser::new();
        assert!(matches!(
            parser.feed(r#"{"a":1,}"#).unwrap_err(),
            ParseError::UnexpectedChar { found: '}', .. }
        ));

        let mut parser = IncrementalJsonParser::new();
        assert!(matches!(
            parser.feed(r#"{"a":"\q"}"#).unwrap_err(),
            ParseError::InvalidEscape { found: 'q', .. }
        ));

        let mut parser = IncrementalJsonParser::new();
        assert!(matches!(
            parser.feed("{} x").unwrap_err(),
            ParseError::TrailingCharacters { found: 'x', offset: 3 }
        ));
    }

    #[test]
    fn test_whitespace_outside_strings_is_skipped() {
        let mut parser = IncrementalJsonParser::new();
        let updates = parser.feed("{ \"a\" :\n [ 1 , \"x y\" ] }").unwrap();
        let values = collect(&updates);
        assert_eq!(values["a[0]"], "1");
        assert_eq!(values["a[1]"], "x y");
    }

    #[test]
    fn test_schema_declared_types() {
        let schema = Property::object()
            .with_property("count", Property::integer(), true)
            .with_property("tags", Property::array(Property::string()), false);

        let mut parser = IncrementalJsonParser::with_schema(&schema);
        let updates = parser.feed(r#"{"count":3,"tags":["a"],"extra":1}"#).unwrap();

        let find = |path: &str| updates.iter().find(|u| u.path == path).unwrap().declared_type;
        assert_eq!(find("count"), Some(ParamType::Integer));
        assert_eq!(find("tags[0]"), Some(ParamType::String));
        assert_eq!(find("extra"), None);
    }

    #[test]
    fn test_schema_attached_mid_value() {
        let schema = Property::object()
            .with_property("path", Property::string(), true)
            .with_property("tags", Property::array(Property::string()), false);

        let mut parser = IncrementalJsonParser::new();
        let early = parser.feed(r#"{"tags":["a","#).unwrap();
        assert!(early.iter().all(|u| u.declared_type.is_none()));

        parser.set_schema(&schema);
        let late = parser.feed(r#""b"],"path":"x"}"#).unwrap();
        let find = |path: &str| late.iter().find(|u| u.path == path).unwrap().declared_type;
        assert_eq!(find("tags[1]"), Some(ParamType::String));
        assert_eq!(find("path"), Some(ParamType::String));
    }
}
