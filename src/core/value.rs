use serde::{Deserialize, Serialize};
use std::fmt;

/// Plain value held by a sheet cell.
///
/// Serialized untagged so the wire shape is the bare JSON scalar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum CellValue {
    #[default]
    Null,
    Boolean(bool),
    Number(f64),
    Text(String),
}

impl CellValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "NULL",
            Self::Boolean(_) => "BOOLEAN",
            Self::Number(_) => "NUMBER",
            Self::Text(_) => "TEXT",
        }
    }

    /// Null and the empty string both count as an empty cell.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Text(s) => s.is_empty(),
            _ => false,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Boolean(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            Self::Number(n) => write!(f, "{}", n),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        Self::Number(value as f64)
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_untagged_wire_shape() {
        assert_eq!(serde_json::to_value(CellValue::from("5")).unwrap(), json!("5"));
        assert_eq!(serde_json::to_value(CellValue::from(2.5)).unwrap(), json!(2.5));
        assert_eq!(serde_json::to_value(CellValue::Null).unwrap(), json!(null));

        let parsed: CellValue = serde_json::from_value(json!(true)).unwrap();
        assert_eq!(parsed, CellValue::Boolean(true));
    }

    #[test]
    fn test_empty_detection() {
        assert!(CellValue::Null.is_empty());
        assert!(CellValue::from("").is_empty());
        assert!(!CellValue::from(0i64).is_empty());
    }
}
