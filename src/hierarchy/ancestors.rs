//! Materialized ancestor paths.

use serde::{Deserialize, Serialize};

use crate::{ArborError, Result};

/// Ordered directory ids from the root down to a node's immediate container.
///
/// A directory's path ends with its parent; a file's path ends with its
/// directory. The root directory's path is empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ancestors(Vec<String>);

impl Ancestors {
    /// An empty path.
    pub fn new() -> Self {
        Self::default()
    }

    /// The path of a child of the node whose path is `self` and id is `id`.
    pub fn child_of(&self, id: &str) -> Self {
        let mut ids = self.0.clone();
        ids.push(id.to_string());
        Self(ids)
    }

    /// Whether `id` is on the path.
    pub fn contains(&self, id: &str) -> bool {
        self.0.iter().any(|a| a == id)
    }

    /// Immediate container, if any.
    pub fn last(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Re-root this path after a move.
    ///
    /// Drops every id of `previous` (the moved node's path before the move),
    /// then puts `prefix` (destination path + destination + moved node) in
    /// front and removes duplicates, keeping first occurrences. Ids below the
    /// moved node keep their order; everything above it is replaced.
    pub fn rebase(&self, previous: &Ancestors, prefix: &Ancestors) -> Self {
        let mut ids: Vec<String> = Vec::with_capacity(prefix.len() + self.len());
        let below = self.0.iter().filter(|id| !previous.contains(id));
        for id in prefix.0.iter().chain(below) {
            if !ids.contains(id) {
                ids.push(id.clone());
            }
        }
        Self(ids)
    }

    /// JSON encoding stored in the `ancestors` column.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(&self.0)
            .map_err(|e| ArborError::Database(format!("ancestors encode error: {e}")))
    }
}

impl From<Vec<String>> for Ancestors {
    fn from(ids: Vec<String>) -> Self {
        Self(ids)
    }
}

impl TryFrom<String> for Ancestors {
    type Error = serde_json::Error;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        serde_json::from_str(&value)
    }
}
