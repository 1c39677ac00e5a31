//! The immutable set of action identifiers an executor can perform.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("action catalog is empty")]
    Empty,
    #[error("invalid action identifier: {0:?}")]
    InvalidAction(String),
}

/// Known actions in registration order.
///
/// Order is significant: similarity ties and fallback filling both walk the
/// catalog front to back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct ActionCatalog {
    actions: Vec<String>,
    #[serde(skip)]
    index: HashSet<String>,
}

impl ActionCatalog {
    /// Builds a catalog, dropping duplicates after their first occurrence.
    pub fn new<I, S>(actions: I) -> Result<Self, CatalogError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut ordered = Vec::new();
        let mut index = HashSet::new();
        for action in actions {
            let action: String = action.into();
            let trimmed = action.trim();
            if trimmed.is_empty() || trimmed.contains(char::is_whitespace) {
                return Err(CatalogError::InvalidAction(action));
            }
            if index.insert(trimmed.to_string()) {
                ordered.push(trimmed.to_string());
            }
        }
        if ordered.is_empty() {
            return Err(CatalogError::Empty);
        }
        Ok(Self {
            actions: ordered,
            index,
        })
    }

    #[must_use]
    pub fn contains(&self, action: &str) -> bool {
        self.index.contains(action)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.actions.iter().map(String::as_str)
    }

    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        &self.actions
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Always `false` for a constructed catalog.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

impl TryFrom<Vec<String>> for ActionCatalog {
    type Error = CatalogError;

    fn try_from(value: Vec<String>) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ActionCatalog> for Vec<String> {
    fn from(value: ActionCatalog) -> Self {
        value.actions
    }
}
