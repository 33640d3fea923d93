//! [`NamelistValue`]: one scalar in a namelist entry.

use std::fmt;

/// A scalar namelist value.
#[derive(Debug, Clone, PartialEq)]
pub enum NamelistValue {
    /// An integer (`3`, `-1`).
    Integer(i64),
    /// A real (`0.5`, `1.0d-3`).
    Real(f64),
    /// A logical (`.true.`, `F`).
    Logical(bool),
    /// A character string, stored without quotes.
    Str(String),
}

impl NamelistValue {
    /// Parse one unquoted token. Anything that is not a logical or a number
    /// is kept as a bare string.
    pub fn from_token(token: &str) -> Self {
        let lowered = token.trim().to_ascii_lowercase();
        match lowered.trim_matches('.') {
            "t" | "true" => return Self::Logical(true),
            "f" | "false" => return Self::Logical(false),
            _ => {}
        }
        if let Ok(integer) = lowered.parse::<i64>() {
            return Self::Integer(integer);
        }
        let has_digit = lowered.chars().any(|c| c.is_ascii_digit());
        match lowered.replace('d', "e").parse::<f64>() {
            Ok(real) if has_digit => Self::Real(real),
            _ => Self::Str(token.trim().to_owned()),
        }
    }

    /// The integer held, if any.
    pub const fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(value) => Some(*value),
            _ => None,
        }
    }

    /// The string held, if any.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(value) => Some(value),
            _ => None,
        }
    }

    /// The logical held, if any.
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Logical(value) => Some(*value),
            _ => None,
        }
    }
}

impl fmt::Display for NamelistValue {
    /// Formats the value as it appears in a namelist file.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(value) => write!(f, "{value}"),
            Self::Real(value) => write!(f, "{value:?}"),
            Self::Logical(true) => f.write_str(".true."),
            Self::Logical(false) => f.write_str(".false."),
            Self::Str(value) => write!(f, "'{}'", value.replace('\'', "''")),
        }
    }
}

impl From<i64> for NamelistValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for NamelistValue {
    fn from(value: f64) -> Self {
        Self::Real(value)
    }
}

impl From<bool> for NamelistValue {
    fn from(value: bool) -> Self {
        Self::Logical(value)
    }
}

impl From<&str> for NamelistValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_owned())
    }
}

impl From<String> for NamelistValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_typed() {
        assert_eq!(NamelistValue::from_token("42"), NamelistValue::Integer(42));
        assert_eq!(NamelistValue::from_token("-3"), NamelistValue::Integer(-3));
        assert_eq!(NamelistValue::from_token(".TRUE."), NamelistValue::Logical(true));
        assert_eq!(NamelistValue::from_token("F"), NamelistValue::Logical(false));
        assert_eq!(NamelistValue::from_token("1.5d2"), NamelistValue::Real(150.0));
        assert_eq!(NamelistValue::from_token("0.25"), NamelistValue::Real(0.25));
        assert_eq!(NamelistValue::from_token("nan"), NamelistValue::Str("nan".to_owned()));
        assert_eq!(NamelistValue::from_token("ARW"), NamelistValue::Str("ARW".to_owned()));
    }

    #[test]
    fn display_uses_namelist_syntax() {
        assert_eq!(NamelistValue::Integer(6).to_string(), "6");
        assert_eq!(NamelistValue::Real(1.0).to_string(), "1.0");
        assert_eq!(NamelistValue::Logical(false).to_string(), ".false.");
        assert_eq!(NamelistValue::from("it's").to_string(), "'it''s'");
    }
}
