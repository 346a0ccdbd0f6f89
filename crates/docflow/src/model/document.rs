use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{DocumentId, UserId};
use crate::rules::FilterPattern;

/// Marker prefixed to a document's name and description when processing was
/// cancelled after an unrecoverable fault.
pub const ERROR_MARKER: &str = "[ERROR] ";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
}

/// A tag attached to a document. `name` is empty when the reference was
/// written by a rule action and has not been reloaded from storage yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagRef {
    pub id: i64,
    pub name: String,
}

/// One key/value pair attached to a document.
///
/// Rule actions only know the ids; `key` and `value` are filled in when the
/// entries are reloaded from storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataEntry {
    pub key_id: i64,
    pub value_id: i64,
    pub key: String,
    pub value: String,
}

impl MetadataEntry {
    pub fn ids(key_id: i64, value_id: i64) -> Self {
        Self {
            key_id,
            value_id,
            key: String::new(),
            value: String::new(),
        }
    }
}

/// A stored metadata value, optionally carrying an automatic match filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataValue {
    pub id: i64,
    pub key_id: i64,
    pub value: String,
    pub filter: Option<FilterPattern>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub user_id: UserId,
    pub name: String,
    pub description: String,
    pub content: String,
    pub filename: String,
    pub hash: String,
    pub mimetype: String,
    pub size: u64,
    pub date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tags: Vec<TagRef>,
    #[serde(default)]
    pub metadata: Vec<MetadataEntry>,
}

impl Document {
    /// Creates an unsaved document for a freshly ingested file. The id is
    /// assigned by storage on insert.
    pub fn new(user_id: UserId, filename: &str, mimetype: &str, size: u64, hash: &str) -> Self {
        let name = Path::new(filename)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(filename)
            .to_string();

        Self {
            id: 0,
            user_id,
            name,
            description: String::new(),
            content: String::new(),
            filename: filename.to_string(),
            hash: hash.to_string(),
            mimetype: mimetype.to_string(),
            size,
            date: None,
            tags: Vec::new(),
            metadata: Vec::new(),
        }
    }

    /// Lower-cased extension of the original filename, without the dot.
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
    }

    pub fn has_metadata(&self, key_id: i64, value_id: i64) -> bool {
        self.metadata
            .iter()
            .any(|m| m.key_id == key_id && m.value_id == value_id)
    }

    /// Appends a key/value pair unless that exact pair is already present.
    /// Returns whether the pair was added.
    pub fn add_metadata(&mut self, key_id: i64, value_id: i64) -> bool {
        if self.has_metadata(key_id, value_id) {
            return false;
        }
        self.metadata.push(MetadataEntry::ids(key_id, value_id));
        true
    }

    /// Prefixes name and description with [`ERROR_MARKER`] unless already marked.
    pub fn mark_failed(&mut self) {
        if !self.name.starts_with(ERROR_MARKER) {
            self.name = format!("{}{}", ERROR_MARKER, self.name);
        }
        if !self.description.starts_with(ERROR_MARKER) {
            self.description = format!("{}{}", ERROR_MARKER, self.description);
        }
    }
}
