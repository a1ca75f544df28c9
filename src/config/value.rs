//! Typed configuration values

use serde::Serialize;
use std::fmt;

/// A parsed configuration value.
///
/// References stay symbolic until graph resolution; a `ClassPath` is a bare
/// dotted identifier naming a constructor in the registry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Value {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    None,
    Reference(String),
    List(Vec<Value>),
    Tuple(Vec<Value>),
    ClassPath(String),
}

impl Value {
    /// Short kind name used in diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Str(_) => "string",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::Bool(_) => "boolean",
            Value::None => "None",
            Value::Reference(_) => "reference",
            Value::List(_) => "list",
            Value::Tuple(_) => "tuple",
            Value::ClassPath(_) => "class path",
        }
    }
}

fn escape_into(out: &mut String, s: &str) {
    for ch in s.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            _ => out.push(ch),
        }
    }
}

/// Renders the value in configuration syntax, so that formatting a value and
/// parsing it back yields the same value.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => {
                let mut buf = String::with_capacity(s.len() + 2);
                escape_into(&mut buf, s);
                write!(f, "\"{buf}\"")
            }
            Value::Int(i) => write!(f, "{i}"),
            // Integral floats are printed with a trailing ".0" so they do not
            // re-parse as integers.
            Value::Float(x) if x.fract() == 0.0 && x.is_finite() => write!(f, "{x:.1}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Bool(true) => write!(f, "True"),
            Value::Bool(false) => write!(f, "False"),
            Value::None => write!(f, "None"),
            Value::Reference(name) => write!(f, "<{name}>"),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Tuple(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                if items.len() == 1 {
                    write!(f, ",")?;
                }
                write!(f, ")")
            }
            Value::ClassPath(path) => write!(f, "{path}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_round_trips_through_syntax() {
        assert_eq!(Value::Str("a \"b\"".to_string()).to_string(), "\"a \\\"b\\\"\"");
        assert_eq!(Value::Float(2.0).to_string(), "2.0");
        assert_eq!(Value::Float(0.5).to_string(), "0.5");
        assert_eq!(Value::Reference("enc".to_string()).to_string(), "<enc>");
        assert_eq!(
            Value::Tuple(vec![Value::Int(1)]).to_string(),
            "(1,)"
        );
        assert_eq!(
            Value::List(vec![Value::Int(1), Value::Bool(false)]).to_string(),
            "[1, False]"
        );
    }
}
