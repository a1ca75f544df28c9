//! Configuration text parser
//!
//! Turns experiment text into a sequence of [`Declaration`]s. The format is
//! INI-shaped: `[section]` headers, `key=value` field lines, comment lines
//! starting with `;`. Values cover quoted strings, integers, floats,
//! `True`/`False`, `None`, `<name>` references, `[...]` lists, `(...)`
//! tuples, and bare dotted identifiers (class paths).
//!
//! Parsing is a pure transform: references are kept symbolic and only checked
//! against the block registry in the graph pass, so forward references are
//! legal.

use super::value::Value;
use crate::error::{Error, Result};
use serde::Serialize;

/// A named configuration block.
///
/// The `class` field, when present, is lifted out of the field map into
/// `class_path`; a class-less declaration resolves to a plain field table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Declaration {
    pub name: String,
    pub class_path: Option<String>,
    /// Fields in textual order.
    pub fields: Vec<(String, Value)>,
    /// Line of the section header, for diagnostics.
    pub line: usize,
}

impl Declaration {
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }
}

fn is_ident(s: &str) -> bool {
    !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !s.starts_with(|c: char| c.is_ascii_digit())
}

fn is_class_path(s: &str) -> bool {
    !s.is_empty() && s.split('.').all(is_ident)
}

fn syntax(line: usize, message: impl Into<String>) -> Error {
    Error::Syntax {
        line,
        message: message.into(),
    }
}

/// Parse a full configuration text into declarations, in textual order.
///
/// Duplicate section names are rejected as soon as the second header is seen.
pub fn parse(text: &str) -> Result<Vec<Declaration>> {
    let mut declarations: Vec<Declaration> = Vec::new();

    for (index, raw_line) in text.lines().enumerate() {
        let line_no = index + 1;
        let line = raw_line.trim();

        if line.is_empty() || line.starts_with(';') {
            continue;
        }

        if let Some(rest) = line.strip_prefix('[') {
            let name = rest
                .strip_suffix(']')
                .ok_or_else(|| syntax(line_no, "malformed section header"))?;
            if !is_ident(name) {
                return Err(syntax(
                    line_no,
                    format!("malformed section header [{name}]"),
                ));
            }
            if declarations.iter().any(|d| d.name == name) {
                return Err(Error::DuplicateName(name.to_string()));
            }
            declarations.push(Declaration {
                name: name.to_string(),
                class_path: None,
                fields: Vec::new(),
                line: line_no,
            });
            continue;
        }

        let (key, value_text) = line
            .split_once('=')
            .ok_or_else(|| syntax(line_no, format!("expected key=value, got {line:?}")))?;
        let key = key.trim();
        if !is_ident(key) {
            return Err(syntax(line_no, format!("invalid field name {key:?}")));
        }

        let decl = declarations
            .last_mut()
            .ok_or_else(|| syntax(line_no, "field outside of any section"))?;

        let value = parse_value_str(value_text).map_err(|message| syntax(line_no, message))?;

        if key == "class" {
            match value {
                Value::ClassPath(path) => {
                    if decl.class_path.is_some() {
                        return Err(syntax(line_no, "duplicate class field"));
                    }
                    decl.class_path = Some(path);
                }
                other => {
                    return Err(syntax(
                        line_no,
                        format!("class must be a dotted identifier, got {}", other.kind_name()),
                    ));
                }
            }
            continue;
        }

        if decl.field(key).is_some() {
            return Err(syntax(line_no, format!("duplicate field {key:?}")));
        }
        decl.fields.push((key.to_string(), value));
    }

    Ok(declarations)
}

/// Parse a single value expression, e.g. the right-hand side of a `--set`
/// override. Errors are plain messages; callers attach line context.
pub fn parse_value_str(text: &str) -> std::result::Result<Value, String> {
    let chars: Vec<char> = text.chars().collect();
    let mut cursor = Cursor { chars: &chars, pos: 0 };
    cursor.skip_ws();
    let value = cursor.value()?;
    cursor.skip_ws();
    if !cursor.at_end() {
        return Err(format!(
            "unexpected trailing characters: {:?}",
            cursor.rest()
        ));
    }
    Ok(value)
}

struct Cursor<'a> {
    chars: &'a [char],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek();
        if ch.is_some() {
            self.pos += 1;
        }
        ch
    }

    fn rest(&self) -> String {
        self.chars[self.pos..].iter().collect()
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.pos += 1;
        }
    }

    fn value(&mut self) -> std::result::Result<Value, String> {
        match self.peek() {
            Some('"') => self.quoted(),
            Some('<') => self.reference(),
            Some('[') => self.sequence(']').map(Value::List),
            Some('(') => self.sequence(')').map(Value::Tuple),
            Some(_) => self.scalar(),
            Option::None => Err("missing value".to_string()),
        }
    }

    fn quoted(&mut self) -> std::result::Result<Value, String> {
        self.bump();
        let mut out = String::new();
        loop {
            match self.bump() {
                Some('"') => return Ok(Value::Str(out)),
                Some('\\') => match self.bump() {
                    Some('"') => out.push('"'),
                    Some('\\') => out.push('\\'),
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some(other) => return Err(format!("unknown escape \\{other}")),
                    Option::None => return Err("unterminated string".to_string()),
                },
                Some(ch) => out.push(ch),
                Option::None => return Err("unterminated string".to_string()),
            }
        }
    }

    fn reference(&mut self) -> std::result::Result<Value, String> {
        self.bump();
        let mut name = String::new();
        loop {
            match self.bump() {
                Some('>') => break,
                Some(ch) if ch.is_ascii_alphanumeric() || ch == '_' => name.push(ch),
                Some(ch) => return Err(format!("invalid character {ch:?} in reference")),
                Option::None => return Err("unterminated reference".to_string()),
            }
        }
        if name.is_empty() {
            return Err("empty reference".to_string());
        }
        Ok(Value::Reference(name))
    }

    fn sequence(&mut self, close: char) -> std::result::Result<Vec<Value>, String> {
        self.bump();
        let mut items = Vec::new();
        loop {
            self.skip_ws();
            if self.peek() == Some(close) {
                self.bump();
                return Ok(items);
            }
            items.push(self.value()?);
            self.skip_ws();
            match self.bump() {
                Some(',') => continue,
                Some(ch) if ch == close => return Ok(items),
                Some(ch) => return Err(format!("expected ',' or '{close}', got {ch:?}")),
                Option::None => return Err(format!("unterminated sequence, expected '{close}'")),
            }
        }
    }

    fn scalar(&mut self) -> std::result::Result<Value, String> {
        let start = self.pos;
        while let Some(ch) = self.peek() {
            if ch == ',' || ch == ']' || ch == ')' {
                break;
            }
            self.pos += 1;
        }
        let token: String = self.chars[start..self.pos].iter().collect::<String>();
        let token = token.trim();
        if token.is_empty() {
            return Err("missing value".to_string());
        }

        match token {
            "True" => return Ok(Value::Bool(true)),
            "False" => return Ok(Value::Bool(false)),
            "None" => return Ok(Value::None),
            _ => {}
        }

        if token.starts_with(|c: char| c.is_ascii_digit() || c == '-' || c == '+' || c == '.') {
            if let Ok(i) = token.parse::<i64>() {
                return Ok(Value::Int(i));
            }
            return token
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|_| format!("cannot parse number {token:?}"));
        }

        if is_class_path(token) {
            return Ok(Value::ClassPath(token.to_string()));
        }

        Err(format!("cannot parse value {token:?}"))
    }
}
