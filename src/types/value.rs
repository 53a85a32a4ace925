use std::cmp::Ordering;
use std::fmt;

use super::error::CoercionError;
use super::expr::CompareOp;

/// Value produced by a data point source.
///
/// Upstream collaborators frequently hand out every field as text, so the
/// conversion helpers accept either the native variant or its string form.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// A 64-bit signed integer.
    Int(i64),
    /// A 64-bit floating-point number.
    Float(f64),
    /// A boolean value.
    Bool(bool),
    /// A UTF-8 string.
    String(String),
}

impl Value {
    /// Numeric form of this value. Strings are parsed after trimming.
    ///
    /// # Errors
    ///
    /// Returns [`CoercionError`] for booleans and for strings that are not numbers.
    #[allow(clippy::cast_precision_loss)]
    pub fn to_f64(&self) -> Result<f64, CoercionError> {
        match self {
            Value::Int(v) => Ok(*v as f64),
            Value::Float(v) => Ok(*v),
            Value::String(s) => parse_number(s).ok_or_else(|| self.mismatch("number")),
            Value::Bool(_) => Err(self.mismatch("number")),
        }
    }

    /// Boolean form of this value. Strings match `true`/`false` case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns [`CoercionError`] for numbers and for any other string.
    pub fn to_bool(&self) -> Result<bool, CoercionError> {
        match self {
            Value::Bool(v) => Ok(*v),
            Value::String(s) => parse_bool(s).ok_or_else(|| self.mismatch("bool")),
            Value::Int(_) | Value::Float(_) => Err(self.mismatch("bool")),
        }
    }

    /// Unquoted text form, used for string equality.
    #[must_use]
    pub fn text(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    /// Compare this value to a rule literal using the given operator.
    ///
    /// The literal decides the comparison domain: a numeric literal coerces this
    /// value to a number, a boolean literal coerces it to a bool, and a string
    /// literal compares text.
    ///
    /// # Errors
    ///
    /// Returns [`CoercionError`] when this value cannot be coerced to the
    /// literal's type.
    pub fn compare(&self, op: CompareOp, literal: &Value) -> Result<bool, CoercionError> {
        let ord = match literal {
            Value::Int(_) | Value::Float(_) => {
                let lhs = self.to_f64()?;
                let rhs = literal.to_f64()?;
                match lhs.partial_cmp(&rhs) {
                    Some(ord) => ord,
                    // NaN never satisfies any operator, including !=.
                    None => return Ok(false),
                }
            }
            Value::Bool(b) => {
                let lhs = self.to_bool()?;
                // Only equality is meaningful for bools
                return Ok(match op {
                    CompareOp::Eq => lhs == *b,
                    CompareOp::Neq => lhs != *b,
                    _ => false,
                });
            }
            Value::String(s) => self.text().as_str().cmp(s.as_str()),
        };
        Ok(match op {
            CompareOp::Eq => ord == Ordering::Equal,
            CompareOp::Neq => ord != Ordering::Equal,
            CompareOp::Gt => ord == Ordering::Greater,
            CompareOp::Gte => ord != Ordering::Less,
            CompareOp::Lt => ord == Ordering::Less,
            CompareOp::Lte => ord != Ordering::Greater,
        })
    }

    fn mismatch(&self, expected: &'static str) -> CoercionError {
        CoercionError {
            value: self.to_string(),
            expected,
        }
    }
}

fn parse_number(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok()
}

fn parse_bool(s: &str) -> Option<bool> {
    let s = s.trim();
    if s.eq_ignore_ascii_case("true") {
        Some(true)
    } else if s.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::String(v) => write!(f, "\"{v}\""),
        }
    }
}
