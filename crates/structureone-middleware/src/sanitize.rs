//! Input sanitizers.
//!
//! Each [`SanitizeKind`] maps a JSON value to a cleaned one. Sanitizing never
//! fails: values that cannot be interpreted become an empty or zero value.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use std::str::FromStr;
use std::sync::OnceLock;

/// How a field is cleaned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SanitizeKind {
    /// Strip tags, trim, HTML-escape.
    String,
    /// Trim, lowercase, drop characters not allowed in addresses.
    Email,
    /// Trim, drop characters not allowed in URLs.
    Url,
    /// Coerce to an integer.
    Int,
    /// Coerce to a float.
    Float,
    /// HTML-escape only.
    Html,
}

impl SanitizeKind {
    /// Wire name of the kind.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Email => "email",
            Self::Url => "url",
            Self::Int => "int",
            Self::Float => "float",
            Self::Html => "html",
        }
    }
}

/// Unrecognized sanitizer name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown sanitize kind '{0}'")]
pub struct UnknownKind(pub String);

impl FromStr for SanitizeKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "string" => Ok(Self::String),
            "email" => Ok(Self::Email),
            "url" => Ok(Self::Url),
            "int" | "integer" => Ok(Self::Int),
            "float" | "number" => Ok(Self::Float),
            "html" => Ok(Self::Html),
            _ => Err(UnknownKind(s.to_string())),
        }
    }
}

/// Cleans a value. Arrays are cleaned element-wise.
pub fn sanitize(kind: SanitizeKind, value: &Value) -> Value {
    if let Value::Array(items) = value {
        return Value::Array(items.iter().map(|item| sanitize(kind, item)).collect());
    }
    match kind {
        SanitizeKind::Int => Value::from(coerce_int(value)),
        SanitizeKind::Float => Number::from_f64(coerce_float(value)).map_or(Value::from(0), Value::Number),
        SanitizeKind::String | SanitizeKind::Email | SanitizeKind::Url | SanitizeKind::Html => {
            match value {
                Value::String(s) => Value::String(sanitize_str(kind, s)),
                other => other.clone(),
            }
        }
    }
}

/// Cleans a string.
pub fn sanitize_str(kind: SanitizeKind, input: &str) -> String {
    match kind {
        SanitizeKind::String => escape_html(strip_tags(input).trim()),
        SanitizeKind::Html => escape_html(input),
        SanitizeKind::Email => input
            .trim()
            .to_lowercase()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || "!#$%&'*+-=?^_`{|}~@.[]".contains(*c))
            .collect(),
        SanitizeKind::Url => input
            .trim()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || "$-_.+!*'(),{}|\\^~[]`<>#%\";/?:@&=".contains(*c))
            .collect(),
        SanitizeKind::Int => coerce_int(&Value::String(input.to_string())).to_string(),
        SanitizeKind::Float => coerce_float(&Value::String(input.to_string())).to_string(),
    }
}

/// Whether `input` is a plausible email address.
pub fn validate_email(input: &str) -> bool {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    let re = EMAIL.get_or_init(|| {
        Regex::new(
            r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)+$",
        )
        .expect("valid email regex")
    });
    input.len() <= 254 && re.is_match(input)
}

fn strip_tags(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut in_tag = false;
    for c in input.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            _ => out.push(c),
        }
    }
    out
}

#[allow(clippy::cast_possible_truncation)]
fn coerce_int(value: &Value) -> i64 {
    match value {
        Value::Number(n) => n.as_i64().unwrap_or_else(|| n.as_f64().unwrap_or(0.0) as i64),
        Value::Bool(b) => i64::from(*b),
        Value::String(s) => {
            let digits: String = s
                .trim()
                .chars()
                .filter(|c| c.is_ascii_digit() || *c == '-' || *c == '+')
                .collect();
            digits.parse().unwrap_or(0)
        }
        _ => 0,
    }
}

fn coerce_float(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::String(s) => {
            let digits: String = s
                .trim()
                .chars()
                .filter(|c| c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | 'e' | 'E'))
                .collect();
            digits.parse::<f64>().ok().filter(|f| f.is_finite()).unwrap_or(0.0)
        }
        _ => 0.0,
    }
}
