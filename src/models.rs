//! Data models for the analyst.
//!
//! This module contains the request-scoped values passed through the
//! analysis core: the question text, the attached files and the answer
//! returned to the caller.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Longest error message kept in an error answer.
const MAX_ERROR_MESSAGE_CHARS: usize = 200;

/// Free-text question as received. Runners interpret it by pattern matching.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Question(String);

impl Question {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// Decode question bytes, replacing invalid UTF-8.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(String::from_utf8_lossy(bytes).into_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Lower-cased copy used for keyword matching.
    pub fn lowercase(&self) -> String {
        self.0.to_lowercase()
    }
}

impl fmt::Display for Question {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single attached file.
#[derive(Debug, Clone)]
pub struct AttachedFile {
    /// Name as supplied by the caller.
    pub name: String,
    /// Raw contents.
    pub bytes: Vec<u8>,
}

/// Attached files keyed by case-insensitive name.
///
/// Iteration follows the lower-cased name order, so "the first CSV" is the
/// same file on every run regardless of upload order.
#[derive(Debug, Clone, Default)]
pub struct FileSet {
    files: BTreeMap<String, AttachedFile>,
}

impl FileSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file. A later file with the same name (ignoring case) replaces
    /// the earlier one.
    pub fn insert(&mut self, name: impl Into<String>, bytes: Vec<u8>) {
        let name = name.into();
        self.files
            .insert(name.to_lowercase(), AttachedFile { name, bytes });
    }

    /// Builder form of [`FileSet::insert`].
    pub fn with(mut self, name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.insert(name, bytes.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&AttachedFile> {
        self.files.get(&name.to_lowercase())
    }

    pub fn iter(&self) -> impl Iterator<Item = &AttachedFile> {
        self.files.values()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Body of an error answer: `{"error": "<kind>: <message>"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// JSON-safe answer returned by a runner.
///
/// The shape is chosen by the runner; the dispatcher never inspects it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Answer {
    /// Question label to answer value, in insertion order.
    Labeled(Map<String, Value>),
    /// Answer values in the order the questions were asked.
    Positional(Vec<Value>),
    /// The runner failed as a whole.
    Error(ErrorBody),
}

impl Answer {
    /// Error answer with the message truncated to a bounded length.
    pub fn error(kind: &str, message: &str) -> Self {
        let truncated: String = message.chars().take(MAX_ERROR_MESSAGE_CHARS).collect();
        Answer::Error(ErrorBody {
            error: format!("{}: {}", kind, truncated),
        })
    }

    /// Labeled answer whose keys are all present and null.
    pub fn labeled_nulls(labels: &[&str]) -> Self {
        let map = labels
            .iter()
            .map(|label| (label.to_string(), Value::Null))
            .collect();
        Answer::Labeled(map)
    }

    /// Look up a labeled value.
    pub fn get(&self, label: &str) -> Option<&Value> {
        match self {
            Answer::Labeled(map) => map.get(label),
            _ => None,
        }
    }

    /// Replace a labeled value. No-op on other shapes.
    pub fn set(&mut self, label: &str, value: Value) {
        if let Answer::Labeled(map) = self {
            map.insert(label.to_string(), value);
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Answer::Error(_))
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
