// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Expected value expressions and deep matching of actual values against
//! them.
//!
//! Expressions are relaxed JSON: object keys may go unquoted, strings may be
//! single-quoted and type [`Marker`]s like `#number` may appear bare in place
//! of any value.
//!
//! ```rust
//! # use serde_json::json;
//! # use stepdriver::assertion::{deep_match, parse};
//! let expected = parse("{id: #number, name: 'X'}");
//!
//! assert!(deep_match(Some(&json!({"id": 7, "name": "X"})), &expected, false).is_ok());
//! assert!(deep_match(Some(&json!({"id": "7", "name": "X"})), &expected, false).is_err());
//! ```

use std::{iter::Peekable, str::CharIndices};

use serde_json::{Map, Number, Value};

use crate::value::{unquote, ValueExt as _};

/// Type marker standing for any value of some kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Marker {
    /// `#number`
    Number,
    /// `#string`
    String,
    /// `#boolean`
    Boolean,
    /// `#null`
    Null,
    /// `#notnull`
    NotNull,
    /// `#present`
    Present,
    /// `#array`
    Array,
    /// `#object`
    Object,
    /// `#ignore`
    Ignore,
}

impl Marker {
    /// Recognizes a marker in the given string value.
    #[must_use]
    pub fn recognize(s: &str) -> Option<Self> {
        Some(match s {
            "#number" => Self::Number,
            "#string" => Self::String,
            "#boolean" => Self::Boolean,
            "#null" => Self::Null,
            "#notnull" => Self::NotNull,
            "#present" => Self::Present,
            "#array" => Self::Array,
            "#object" => Self::Object,
            "#ignore" => Self::Ignore,
            _ => return None,
        })
    }

    /// Checks the `actual` value, [`None`] meaning the value is absent.
    #[must_use]
    pub fn accepts(self, actual: Option<&Value>) -> bool {
        match self {
            Self::Ignore => true,
            Self::Present => actual.is_some(),
            Self::Null => matches!(actual, Some(Value::Null)),
            Self::NotNull => !matches!(actual, None | Some(Value::Null)),
            Self::Number => matches!(actual, Some(Value::Number(_))),
            Self::String => matches!(actual, Some(Value::String(_))),
            Self::Boolean => matches!(actual, Some(Value::Bool(_))),
            Self::Array => matches!(actual, Some(Value::Array(_))),
            Self::Object => matches!(actual, Some(Value::Object(_))),
        }
    }
}

/// Parses the given relaxed JSON expression.
///
/// Text that isn't a valid expression is taken as a plain string, with a
/// single pair of surrounding quotes stripped.
#[must_use]
pub fn parse(expr: &str) -> Value {
    let mut parser = Parser::new(expr.trim());
    match parser.value() {
        Some(v) if parser.at_end() => v,
        _ => Value::String(unquote(expr).to_owned()),
    }
}

/// Recursive descent parser of relaxed JSON.
struct Parser<'a> {
    src: &'a str,
    chars: Peekable<CharIndices<'a>>,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            chars: src.char_indices().peekable(),
        }
    }

    fn skip_ws(&mut self) {
        while self.chars.next_if(|(_, c)| c.is_whitespace()).is_some() {}
    }

    fn at_end(&mut self) -> bool {
        self.skip_ws();
        self.chars.peek().is_none()
    }

    fn eat(&mut self, expected: char) -> bool {
        self.skip_ws();
        self.chars.next_if(|&(_, c)| c == expected).is_some()
    }

    fn value(&mut self) -> Option<Value> {
        self.skip_ws();
        let &(_, c) = self.chars.peek()?;
        match c {
            '{' => self.object(),
            '[' => self.array(),
            '"' | '\'' => self.string().map(Value::String),
            _ => self.bare(),
        }
    }

    fn object(&mut self) -> Option<Value> {
        _ = self.chars.next();
        let mut map = Map::new();
        if self.eat('}') {
            return Some(Value::Object(map));
        }
        loop {
            self.skip_ws();
            let key = match self.chars.peek()? {
                (_, '"' | '\'') => self.string()?,
                _ => self.word()?.to_owned(),
            };
            if !self.eat(':') {
                return None;
            }
            let v = self.value()?;
            _ = map.insert(key, v);
            if self.eat(',') {
                continue;
            }
            return self.eat('}').then_some(Value::Object(map));
        }
    }

    fn array(&mut self) -> Option<Value> {
        _ = self.chars.next();
        let mut items = Vec::new();
        if self.eat(']') {
            return Some(Value::Array(items));
        }
        loop {
            items.push(self.value()?);
            if self.eat(',') {
                continue;
            }
            return self.eat(']').then_some(Value::Array(items));
        }
    }

    fn string(&mut self) -> Option<String> {
        let (_, quote) = self.chars.next()?;
        let mut out = String::new();
        loop {
            let (_, c) = self.chars.next()?;
            match c {
                c if c == quote => return Some(out),
                '\\' => {
                    let (_, esc) = self.chars.next()?;
                    out.push(match esc {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        other => other,
                    });
                }
                c => out.push(c),
            }
        }
    }

    /// Identifier-like run of characters.
    fn word(&mut self) -> Option<&'a str> {
        let &(start, _) = self.chars.peek()?;
        let mut end = start;
        while let Some((i, c)) = self.chars.next_if(|&(_, c)| {
            c.is_alphanumeric() || matches!(c, '_' | '$' | '#' | '-' | '+' | '.')
        }) {
            end = i + c.len_utf8();
        }
        (end > start).then(|| &self.src[start..end])
    }

    fn bare(&mut self) -> Option<Value> {
        let word = self.word()?;
        Some(match word {
            "null" => Value::Null,
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            w if w.starts_with('#') => Value::String(w.to_owned()),
            w => {
                if let Ok(i) = w.parse::<i64>() {
                    Value::Number(i.into())
                } else {
                    Value::Number(Number::from_f64(w.parse::<f64>().ok()?)?)
                }
            }
        })
    }
}

/// Renders a possibly absent value for a mismatch message.
fn describe(actual: Option<&Value>) -> String {
    actual.map_or_else(|| "nothing".to_owned(), Value::to_string)
}

/// Compares two values for equality, treating `7` and `7.0` as equal.
fn same(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Number(a), Value::Number(e)) => a.as_f64() == e.as_f64(),
        (a, e) => a == e,
    }
}

/// Matches the `actual` value against the `expected` one.
///
/// [`None`] stands for an absent value. With `partial` matching, objects may
/// carry extra keys and arrays must contain every expected element in any
/// order. Strings naming a [`Marker`] match by type.
///
/// # Errors
///
/// With a description of the first mismatch found.
pub fn deep_match(
    actual: Option<&Value>,
    expected: &Value,
    partial: bool,
) -> Result<(), String> {
    match expected {
        Value::String(s) => {
            if let Some(marker) = Marker::recognize(s) {
                return marker.accepts(actual).then_some(()).ok_or_else(|| {
                    let kind = actual.map_or("nothing", |a| a.type_name());
                    format!("Expected type {s} but got {kind} ({})", describe(actual))
                });
            }
        }
        Value::Object(exp) => {
            let Some(Value::Object(act)) = actual else {
                return Err(format!("Expected object but got {}", describe(actual)));
            };
            for (key, e) in exp {
                let a = act.get(key);
                let optional = matches!(
                    Marker::recognize(e.as_str().unwrap_or_default()),
                    Some(Marker::Ignore),
                );
                if a.is_none() && !partial && !optional {
                    return Err(format!("Missing key \"{key}\" in response"));
                }
                deep_match(a, e, partial).map_err(|err| format!("At \"{key}\": {err}"))?;
            }
            if !partial {
                if let Some(extra) = act.keys().find(|k| !exp.contains_key(*k)) {
                    return Err(format!("Unexpected key \"{extra}\" in response"));
                }
            }
            return Ok(());
        }
        Value::Array(exp) => {
            let Some(Value::Array(act)) = actual else {
                return Err(format!("Expected array but got {}", describe(actual)));
            };
            if partial {
                for e in exp {
                    if !act.iter().any(|a| deep_match(Some(a), e, false).is_ok()) {
                        return Err(format!("Array does not contain {e}"));
                    }
                }
                return Ok(());
            }
            if act.len() != exp.len() {
                return Err(format!(
                    "Expected array of length {} but got {}",
                    exp.len(),
                    act.len(),
                ));
            }
            for (i, (a, e)) in act.iter().zip(exp).enumerate() {
                deep_match(Some(a), e, false).map_err(|err| format!("At [{i}]: {err}"))?;
            }
            return Ok(());
        }
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }

    match actual {
        Some(a) if same(a, expected) => Ok(()),
        Some(Value::String(a)) if partial && expected.is_string() => {
            let e = expected.as_str().unwrap_or_default();
            a.contains(e)
                .then_some(())
                .ok_or_else(|| format!("Expected \"{a}\" to contain \"{e}\""))
        }
        _ => Err(format!("Expected {expected} but got {}", describe(actual))),
    }
}
