use super::{CommandError, Result};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

lazy_static! {
    static ref A1_REFERENCE: Regex = Regex::new(r"^\$?([A-Za-z]{1,3})\$?([1-9][0-9]{0,6})$")
        .expect("static A1 pattern");
}

/// Stable identifier of an addressable document item.
///
/// Commands never hold references into the graph, only ids that are
/// re-resolved on the receiving side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub u64);

impl ItemId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<u64> for ItemId {
    fn from(raw: u64) -> Self {
        ItemId(raw)
    }
}

/// A1-style cell address. Columns and rows are zero based internally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CellRef {
    pub row: u32,
    pub column: u32,
}

impl CellRef {
    pub fn new(column: u32, row: u32) -> Self {
        Self { row, column }
    }

    pub fn parse(text: &str) -> Result<Self> {
        let captures = A1_REFERENCE
            .captures(text.trim())
            .ok_or_else(|| CommandError::InvalidReference(text.to_string()))?;

        let column = captures[1]
            .chars()
            .fold(0u32, |acc, c| acc * 26 + (c.to_ascii_uppercase() as u32 - 'A' as u32 + 1))
            - 1;
        let row = captures[2]
            .parse::<u32>()
            .map_err(|_| CommandError::InvalidReference(text.to_string()))?
            - 1;

        Ok(Self { row, column })
    }

    pub fn column_label(&self) -> String {
        let mut n = self.column + 1;
        let mut label = Vec::new();
        while n > 0 {
            let rem = (n - 1) % 26;
            label.push((b'A' + rem as u8) as char);
            n = (n - 1) / 26;
        }
        label.iter().rev().collect()
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.column_label(), self.row + 1)
    }
}

impl FromStr for CellRef {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self> {
        CellRef::parse(s)
    }
}

impl TryFrom<String> for CellRef {
    type Error = CommandError;

    fn try_from(value: String) -> Result<Self> {
        CellRef::parse(&value)
    }
}

impl From<CellRef> for String {
    fn from(value: CellRef) -> Self {
        value.to_string()
    }
}
