//! Schema-light documents returned by the extraction service.
//!
//! A JD or CV is a JSON object whose section shapes are conventions, not
//! constraints. Every edit produces a new `DocumentModel`; nothing in this
//! module mutates a document another owner can observe.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

pub mod editor;
pub mod list_editor;
pub mod path_editor;

#[derive(Debug, Error, PartialEq)]
pub enum EditError {
    #[error("field path is empty")]
    EmptyPath,

    #[error("field path '{0}' contains an empty segment")]
    EmptySegment(String),

    #[error("index {index} is out of range for a list of {len}")]
    IndexOutOfRange { index: usize, len: usize },
}

/// A JD or CV document: field name → string, list, nested map, or list of maps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentModel(Map<String, Value>);

impl DocumentModel {
    /// Wraps a JSON value; `None` unless it is an object.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    /// Returns a copy with one top-level field replaced.
    pub fn with_field(&self, field: &str, value: Value) -> Self {
        let mut fields = self.0.clone();
        fields.insert(field.to_string(), value);
        Self(fields)
    }
}

impl From<Map<String, Value>> for DocumentModel {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Ordered field-name segments addressing one location in a document.
///
/// Parsed from dotted strings such as `"Personal Data.location.city"`;
/// segments may contain spaces but never dots.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath(Vec<String>);

impl FieldPath {
    pub fn new<I, S>(segments: I) -> Result<Self, EditError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        if segments.is_empty() {
            return Err(EditError::EmptyPath);
        }
        if segments.iter().any(|s| s.is_empty()) {
            return Err(EditError::EmptySegment(segments.join(".")));
        }
        Ok(Self(segments))
    }

    /// Single-segment path for a known, non-empty top-level key.
    pub(crate) fn from_key(key: &'static str) -> Self {
        Self(vec![key.to_string()])
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }
}

impl FromStr for FieldPath {
    type Err = EditError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(EditError::EmptyPath);
        }
        Self::new(s.split('.'))
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("."))
    }
}

impl Serialize for FieldPath {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for FieldPath {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
