//! Scalar values passed through instrumented operations
//!
//! A value has two textual forms. The *stored* form is the bytes written to
//! the backend (and to the output history). The *repr* form quotes text and
//! bytes so an argument tuple reads unambiguously in the input history.

use std::fmt;

use memostore::{Error, Result};

/// Data accepted by the cache
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// UTF-8 text
    Text(String),
    /// Arbitrary bytes
    Bytes(Vec<u8>),
    /// Signed integer
    Integer(i64),
    /// Floating point number
    Float(f64),
}

impl Value {
    /// Bytes persisted for this value
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Value::Text(s) => s.as_bytes().to_vec(),
            Value::Bytes(b) => b.clone(),
            Value::Integer(i) => i.to_string().into_bytes(),
            Value::Float(x) => format_float(*x).into_bytes(),
        }
    }

    /// Quoted form used inside argument tuples, e.g. `'hello'` or `b'\x00'`
    pub fn repr(&self) -> String {
        match self {
            Value::Text(s) => {
                let mut out = String::with_capacity(s.len() + 2);
                out.push('\'');
                for c in s.chars() {
                    match c {
                        '\\' => out.push_str("\\\\"),
                        '\'' => out.push_str("\\'"),
                        '\n' => out.push_str("\\n"),
                        '\r' => out.push_str("\\r"),
                        '\t' => out.push_str("\\t"),
                        c => out.push(c),
                    }
                }
                out.push('\'');
                out
            }
            Value::Bytes(b) => {
                let mut out = String::with_capacity(b.len() + 3);
                out.push_str("b'");
                for &byte in b {
                    match byte {
                        b'\\' => out.push_str("\\\\"),
                        b'\'' => out.push_str("\\'"),
                        b'\n' => out.push_str("\\n"),
                        b'\r' => out.push_str("\\r"),
                        b'\t' => out.push_str("\\t"),
                        0x20..=0x7e => out.push(byte as char),
                        _ => out.push_str(&format!("\\x{:02x}", byte)),
                    }
                }
                out.push('\'');
                out
            }
            Value::Integer(i) => i.to_string(),
            Value::Float(x) => format_float(*x),
        }
    }
}

/// Shortest round-trip decimal. Integral values keep a fractional part
/// (`3.0`). Exponents are signed with at least two digits (`1e+16`, `1e-07`).
fn format_float(x: f64) -> String {
    if x.is_nan() {
        return "nan".to_string();
    }
    if x.is_infinite() {
        return if x > 0.0 { "inf" } else { "-inf" }.to_string();
    }

    let shortest = format!("{:?}", x);
    match shortest.split_once('e') {
        Some((mantissa, exponent)) => {
            let (sign, digits) = match exponent.strip_prefix('-') {
                Some(digits) => ('-', digits),
                None => ('+', exponent),
            };
            format!("{}e{}{:0>2}", mantissa, sign, digits)
        }
        None => shortest,
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(s) => f.write_str(s),
            Value::Bytes(b) => f.write_str(&String::from_utf8_lossy(b)),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(x) => f.write_str(&format_float(*x)),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<&[u8]> for Value {
    fn from(b: &[u8]) -> Self {
        Value::Bytes(b.to_vec())
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Integer(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

/// Positional arguments of one call
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Args(Vec<Value>);

impl Args {
    /// Build from a list of values
    pub fn new(values: Vec<Value>) -> Self {
        Self(values)
    }

    /// Single-argument call
    pub fn one(value: impl Into<Value>) -> Self {
        Self(vec![value.into()])
    }

    /// Arguments in call order
    pub fn values(&self) -> &[Value] {
        &self.0
    }

    /// Number of arguments
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check for a call without arguments
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<Value>> for Args {
    fn from(values: Vec<Value>) -> Self {
        Self(values)
    }
}

/// Tuple form: `()`, `('a',)`, `('a', 2)`
impl fmt::Display for Args {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, value) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str(&value.repr())?;
        }
        if self.0.len() == 1 {
            f.write_str(",")?;
        }
        f.write_str(")")
    }
}

/// Decode stored bytes as UTF-8 text
pub fn decode_text(raw: Vec<u8>) -> Result<String> {
    Ok(String::from_utf8(raw)?)
}

/// Decode stored bytes as a base-10 integer
pub fn decode_integer(raw: Vec<u8>) -> Result<i64> {
    let text = decode_text(raw)?;
    text.trim()
        .parse::<i64>()
        .map_err(|e| Error::Decode(format!("invalid integer {:?}: {}", text, e)))
}

/// Decode stored bytes as a floating point number
pub fn decode_float(raw: Vec<u8>) -> Result<f64> {
    let text = decode_text(raw)?;
    text.trim()
        .parse::<f64>()
        .map_err(|e| Error::Decode(format!("invalid float {:?}: {}", text, e)))
}
