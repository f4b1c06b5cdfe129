//! Runtime values of the condition language.

use std::cmp::Ordering;
use std::fmt;

use super::ExprError;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    Str(String),
    Bool(bool),
    List(Vec<Value>),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::Bool(_) => "bool",
            Value::List(_) => "list",
        }
    }

    /// Truthiness: zero, empty strings and empty lists are false.
    pub fn truthy(&self) -> bool {
        match self {
            Value::Number(n) => *n != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::Bool(b) => *b,
            Value::List(items) => !items.is_empty(),
        }
    }

    /// Numeric view; booleans count as 0 and 1.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Equality never fails; values of unrelated types are simply unequal.
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.loose_eq(y))
            }
            _ => match (self.as_number(), other.as_number()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
        }
    }

    /// Ordering between numbers or between strings.
    pub fn try_cmp(&self, other: &Value) -> Result<Option<Ordering>, ExprError> {
        if let (Value::Str(a), Value::Str(b)) = (self, other) {
            return Ok(Some(a.cmp(b)));
        }
        match (self.as_number(), other.as_number()) {
            (Some(a), Some(b)) => Ok(a.partial_cmp(&b)),
            _ => Err(ExprError::Type(format!(
                "cannot order {} and {}",
                self.type_name(),
                other.type_name()
            ))),
        }
    }

    /// `self in container`: substring test on strings, membership on lists.
    pub fn is_in(&self, container: &Value) -> Result<bool, ExprError> {
        match (self, container) {
            (Value::Str(needle), Value::Str(haystack)) => Ok(haystack.contains(needle.as_str())),
            (_, Value::List(items)) => Ok(items.iter().any(|item| item.loose_eq(self))),
            _ => Err(ExprError::Type(format!(
                "'in' needs a string or list on the right, got {} in {}",
                self.type_name(),
                container.type_name()
            ))),
        }
    }
}

fn write_number(f: &mut fmt::Formatter<'_>, n: f64) -> fmt::Result {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e16 {
        write!(f, "{:.1}", n)
    } else {
        write!(f, "{}", n)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write_number(f, *n),
            Value::Str(s) => f.write_str(s),
            Value::Bool(true) => f.write_str("True"),
            Value::Bool(false) => f.write_str("False"),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    match item {
                        Value::Str(s) => write!(f, "'{}'", s)?,
                        other => write!(f, "{}", other)?,
                    }
                }
                f.write_str("]")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthy() {
        assert!(Value::Number(0.5).truthy());
        assert!(!Value::Number(0.0).truthy());
        assert!(!Value::Str(String::new()).truthy());
        assert!(Value::List(vec![Value::Bool(false)]).truthy());
    }

    #[test]
    fn test_loose_eq_mixed_types() {
        assert!(Value::Bool(true).loose_eq(&Value::Number(1.0)));
        assert!(!Value::Str("1".into()).loose_eq(&Value::Number(1.0)));
    }

    #[test]
    fn test_try_cmp_mismatch() {
        let result = Value::Str("a".into()).try_cmp(&Value::Number(1.0));
        assert!(matches!(result, Err(ExprError::Type(_))));
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Number(5.0).to_string(), "5.0");
        assert_eq!(Value::Number(0.25).to_string(), "0.25");
        assert_eq!(
            Value::List(vec![Value::Str(".jpg".into()), Value::Number(2.0)]).to_string(),
            "['.jpg', 2.0]"
        );
    }
}
