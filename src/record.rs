// src/record.rs
//! Normalized record model shared by both sources.
//!
//! The model is schema-per-source: each `SourceId` owns a fixed list of typed
//! columns (`SourceId::schema`). Adapters produce `Record`s that follow it, the
//! store uses it to lay out and parse the tabular file, and the diff engine
//! only ever compares field maps of the same source.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which external site produced a record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SourceId {
    /// books.toscrape.com: server-rendered, paginated listing.
    #[serde(rename = "books", alias = "static")]
    Static,
    /// quotes.toscrape.com/js: listing populated by client-side script.
    #[serde(rename = "quotes", alias = "dynamic")]
    Dynamic,
}

impl SourceId {
    pub const ALL: [SourceId; 2] = [SourceId::Static, SourceId::Dynamic];

    /// Directory / file-name slug used by the snapshot store.
    pub fn slug(self) -> &'static str {
        match self {
            SourceId::Static => "books",
            SourceId::Dynamic => "quotes",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SourceId::Static => "Books (static)",
            SourceId::Dynamic => "Quotes (dynamic)",
        }
    }

    pub fn schema(self) -> &'static [FieldSpec] {
        match self {
            SourceId::Static => BOOK_SCHEMA,
            SourceId::Dynamic => QUOTE_SCHEMA,
        }
    }

    /// Recover the source from a snapshot path: `<root>/<slug>/<label>.csv`,
    /// or failing that a file stem starting with the slug (`books_20251017.csv`).
    pub fn from_path(path: &Path) -> Option<SourceId> {
        let parent = path
            .parent()
            .and_then(|p| p.file_name())
            .and_then(|s| s.to_str());
        if let Some(found) = parent.and_then(|p| p.parse().ok()) {
            return Some(found);
        }
        let stem = path.file_stem()?.to_str()?.to_ascii_lowercase();
        SourceId::ALL
            .into_iter()
            .find(|s| stem.starts_with(s.slug()))
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for SourceId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "books" | "static" => Ok(SourceId::Static),
            "quotes" | "dynamic" => Ok(SourceId::Dynamic),
            other => Err(format!("unknown source: {other}")),
        }
    }
}

/// Column type in a source schema.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Integer,
    Number,
}

#[derive(Clone, Copy, Debug)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
}

const fn col(name: &'static str, kind: FieldKind) -> FieldSpec {
    FieldSpec { name, kind }
}

pub const BOOK_SCHEMA: &[FieldSpec] = &[
    col("title", FieldKind::Text),
    col("price", FieldKind::Number),
    col("rating", FieldKind::Integer),
    col("availability", FieldKind::Text),
    col("url", FieldKind::Text),
    // detail-page enrichment, absent when `books.details` is off
    col("category", FieldKind::Text),
    col("upc", FieldKind::Text),
];

pub const QUOTE_SCHEMA: &[FieldSpec] = &[
    col("text", FieldKind::Text),
    col("author", FieldKind::Text),
    col("tags", FieldKind::Text),
    col("length", FieldKind::Integer),
];

/// One normalized field value. Comparison is value-exact.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Integer(i64),
    Number(f64),
    Text(String),
}

impl FieldValue {
    /// Parse a stored cell according to its column kind.
    /// Non-finite numbers are rejected so equality stays reflexive.
    pub fn parse(kind: FieldKind, raw: &str) -> Result<FieldValue, String> {
        match kind {
            FieldKind::Text => Ok(FieldValue::Text(raw.to_string())),
            FieldKind::Integer => raw
                .trim()
                .parse::<i64>()
                .map(FieldValue::Integer)
                .map_err(|e| format!("bad integer {raw:?}: {e}")),
            FieldKind::Number => match raw.trim().parse::<f64>() {
                Ok(v) if v.is_finite() => Ok(FieldValue::Number(v)),
                Ok(_) => Err(format!("non-finite number {raw:?}")),
                Err(e) => Err(format!("bad number {raw:?}: {e}")),
            },
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Integer(v) => write!(f, "{v}"),
            // `{}` on f64 prints the shortest string that parses back to the same value
            FieldValue::Number(v) => write!(f, "{v}"),
            FieldValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Integer(v)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Number(v)
    }
}

/// Field name → value, ordered by name.
pub type Fields = BTreeMap<String, FieldValue>;

/// One harvested entity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub source: SourceId,
    pub key: String,
    pub fields: Fields,
    pub fetched_at: DateTime<Utc>,
}

impl Record {
    pub fn new(source: SourceId, key: impl Into<String>, fetched_at: DateTime<Utc>) -> Self {
        Self { source, key: key.into(), fields: Fields::new(), fetched_at }
    }

    /// Builder-style field setter. Empty text is the same as no value, so
    /// it clears the field; that keeps records equal to their stored form.
    pub fn with(mut self, name: &str, value: impl Into<FieldValue>) -> Self {
        match value.into() {
            FieldValue::Text(s) if s.is_empty() => {
                self.fields.remove(name);
            }
            v => {
                self.fields.insert(name.to_string(), v);
            }
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Same real-world entity: same source and identity key.
    pub fn same_entity(&self, other: &Record) -> bool {
        self.source == other.source && self.key == other.key
    }

    /// Same entity and every field equal. `fetched_at` is not content.
    pub fn same_content(&self, other: &Record) -> bool {
        self.same_entity(other) && self.fields == other.fields
    }
}
