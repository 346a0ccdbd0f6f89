//! Search index seam.

use std::collections::HashMap;
use std::sync::RwLock;

use thiserror::Error;

use crate::model::{Document, DocumentId, UserId};

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Search index unavailable: {0}")]
    Unavailable(String),

    #[error("Search index lock poisoned")]
    LockPoisoned,
}

pub trait SearchIndex: Send + Sync {
    /// Adds or replaces the given documents in the user's index.
    fn update_documents(&self, user: UserId, docs: &[Document]) -> Result<(), SearchError>;
}

#[derive(Debug, Clone)]
struct IndexedDocument {
    terms: Vec<String>,
}

/// In-process index: per user, document id to lower-cased terms of name,
/// description, content, tags and metadata values.
#[derive(Debug, Default)]
pub struct MemoryIndex {
    users: RwLock<HashMap<UserId, HashMap<DocumentId, IndexedDocument>>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ids of the user's documents containing every term of `query`.
    pub fn search(&self, user: UserId, query: &str) -> Result<Vec<DocumentId>, SearchError> {
        let wanted = tokenize(query);
        let users = self.users.read().map_err(|_| SearchError::LockPoisoned)?;
        let Some(docs) = users.get(&user) else {
            return Ok(Vec::new());
        };

        let mut hits: Vec<DocumentId> = docs
            .iter()
            .filter(|(_, doc)| wanted.iter().all(|t| doc.terms.contains(t)))
            .map(|(id, _)| *id)
            .collect();
        hits.sort_unstable();
        Ok(hits)
    }

    pub fn len(&self, user: UserId) -> usize {
        self.users
            .read()
            .map(|u| u.get(&user).map(|d| d.len()).unwrap_or(0))
            .unwrap_or(0)
    }
}

impl SearchIndex for MemoryIndex {
    fn update_documents(&self, user: UserId, docs: &[Document]) -> Result<(), SearchError> {
        let mut users = self.users.write().map_err(|_| SearchError::LockPoisoned)?;
        let index = users.entry(user).or_default();

        for doc in docs {
            let mut text = format!("{} {} {}", doc.name, doc.description, doc.content);
            for tag in &doc.tags {
                text.push(' ');
                text.push_str(&tag.name);
            }
            for entry in &doc.metadata {
                text.push(' ');
                text.push_str(&entry.value);
            }
            index.insert(doc.id, IndexedDocument { terms: tokenize(&text) });
        }

        Ok(())
    }
}

fn tokenize(text: &str) -> Vec<String> {
    let mut terms: Vec<String> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect();
    terms.sort();
    terms.dedup();
    terms
}
