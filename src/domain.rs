use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::HarvestError;

/// Catalog key. Only surrounding whitespace is stripped; checksums are not verified.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Isbn(String);

impl Isbn {
    /// Wraps a key read back from the catalog store verbatim. Stored keys are
    /// never trimmed or rejected so they keep matching their dependent rows.
    pub fn from_stored(value: String) -> Self {
        Self(value)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Isbn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Isbn {
    type Err = HarvestError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(HarvestError::InvalidIsbn(value.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchKind {
    Marc21,
    Blurb,
}

impl FetchKind {
    pub fn all() -> [FetchKind; 2] {
        [FetchKind::Marc21, FetchKind::Blurb]
    }
}

impl fmt::Display for FetchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchKind::Marc21 => write!(f, "marc21"),
            FetchKind::Blurb => write!(f, "blurb"),
        }
    }
}

/// One MARC21 subfield of a datafield.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MarcField {
    pub isbn: Isbn,
    pub tag: String,
    pub code: String,
    pub value: String,
}

/// Value of the `Downloaded.MARC21` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarcFlag {
    /// The SRU service answered but carried no datafields.
    Empty,
    Found,
}

impl MarcFlag {
    pub fn as_db(self) -> i64 {
        match self {
            MarcFlag::Empty => 0,
            MarcFlag::Found => 1,
        }
    }

    pub fn from_db(value: i64) -> Self {
        if value == 0 {
            MarcFlag::Empty
        } else {
            MarcFlag::Found
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InsertOutcome {
    Inserted,
    AlreadyExists,
}

impl InsertOutcome {
    pub fn from_affected(rows: usize) -> Self {
        if rows == 0 {
            InsertOutcome::AlreadyExists
        } else {
            InsertOutcome::Inserted
        }
    }
}
