//! Structured values carried by rpc bodies.
//!
//! Example body text:
//! {job_id: 42, resources: ["node-1", "node-2"], ratio: 0.5, urgent: false}

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Key -> value mapping. Entry order carries no meaning, so a sorted map is
/// used and equality ignores the order in which keys appeared in the log.
pub type Object = BTreeMap<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Object(Object),
    Sequence(Vec<Value>),
    Text(String),
    Number(Number),
    Boolean(bool),
}

/// Integral lexemes stay integers; anything with a fraction or an exponent
/// becomes a float. Floats are always finite.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(untagged)]
pub enum Number {
    Integer(i128),
    Float(f64),
}

/// 2^127, the first float above the i128 range.
const I128_LIMIT: f64 = 170_141_183_460_469_231_731_687_303_715_884_105_728.0;

/// Exact integer/float comparison: only an integral float inside the i128
/// range can equal an integer, and such a float converts without loss.
fn integer_eq_float(i: i128, x: f64) -> bool {
    x.is_finite() && x.fract() == 0.0 && x >= -I128_LIMIT && x < I128_LIMIT && x as i128 == i
}

impl PartialEq for Number {
    fn eq(&self, other: &Self) -> bool {
        match (*self, *other) {
            (Number::Integer(a), Number::Integer(b)) => a == b,
            (Number::Float(a), Number::Float(b)) => a == b,
            (Number::Integer(a), Number::Float(b)) | (Number::Float(b), Number::Integer(a)) => {
                integer_eq_float(a, b)
            }
        }
    }
}

impl Number {
    /// The value as a non-negative integer, if it is one.
    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            Number::Integer(n) => u64::try_from(n).ok(),
            Number::Float(_) => None,
        }
    }
}

/// A parsed `body:` payload: the main object plus the optional trailing
/// options block (empty when the line has none).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Body {
    pub body: Object,
    pub opts: Object,
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Integer(n) => write!(f, "{}", n),
            // Debug keeps a fractional part or exponent, so the text reads
            // back as a float.
            Number::Float(x) => write!(f, "{:?}", x),
        }
    }
}

/// Writes the value back in the log body syntax. Text is always quoted so
/// that reparsing never confuses it with a keyword.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Object(o) => write_object(f, o),
            Value::Sequence(items) => {
                write!(f, "[")?;
                for (i, v) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "]")
            }
            Value::Text(s) => write_quoted(f, s),
            Value::Number(n) => write!(f, "{}", n),
            Value::Boolean(b) => write!(f, "{}", b),
        }
    }
}

impl fmt::Display for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_object(f, &self.body)?;
        if !self.opts.is_empty() {
            write!(f, " ")?;
            write_object(f, &self.opts)?;
        }
        Ok(())
    }
}

fn write_object(f: &mut fmt::Formatter<'_>, o: &Object) -> fmt::Result {
    write!(f, "{{")?;
    for (i, (k, v)) in o.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}: {}", k, v)?;
    }
    write!(f, "}}")
}

fn write_quoted(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    write!(f, "\"")?;
    for c in s.chars() {
        match c {
            '"' => write!(f, "\\\"")?,
            '\\' => write!(f, "\\\\")?,
            '\n' => write!(f, "\\n")?,
            '\r' => write!(f, "\\r")?,
            '\t' => write!(f, "\\t")?,
            c if (c as u32) < 0x20 => write!(f, "\\u{:04x}", c as u32)?,
            c => write!(f, "{}", c)?,
        }
    }
    write!(f, "\"")
}
