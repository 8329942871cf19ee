//! Declared attribute access of a stage.

use crate::context::{AttributeRef, Category};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// The attributes a stage reads and the attributes it owns.
///
/// Reads must be present in the stage's input; writes must be present in its
/// output. Attributes in `may_write` are overwritten only when present. Any
/// attribute the stage does not own passes through unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeAccess {
    /// Attributes read.
    pub reads: BTreeSet<AttributeRef>,
    /// Attributes written.
    pub writes: BTreeSet<AttributeRef>,
    /// Attributes overwritten when present.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub may_write: BTreeSet<AttributeRef>,
}

impl AttributeAccess {
    /// Creates an empty declaration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a read.
    #[must_use]
    pub fn reads(mut self, category: Category, name: impl Into<String>) -> Self {
        self.reads.insert(AttributeRef::new(category, name));
        self
    }

    /// Declares a write.
    #[must_use]
    pub fn writes(mut self, category: Category, name: impl Into<String>) -> Self {
        self.writes.insert(AttributeRef::new(category, name));
        self
    }

    /// Declares the same read for several categories.
    #[must_use]
    pub fn reads_each(mut self, categories: &[Category], name: &str) -> Self {
        for category in categories {
            self.reads.insert(AttributeRef::new(*category, name));
        }
        self
    }

    /// Declares the same write for several categories.
    #[must_use]
    pub fn writes_each(mut self, categories: &[Category], name: &str) -> Self {
        for category in categories {
            self.writes.insert(AttributeRef::new(*category, name));
        }
        self
    }

    /// Declares optional writes for several attributes of one category.
    #[must_use]
    pub fn may_write_all(mut self, category: Category, names: &[&str]) -> Self {
        for name in names {
            self.may_write.insert(AttributeRef::new(category, *name));
        }
        self
    }

    /// Whether `attr` is declared as written, unconditionally or optionally.
    #[must_use]
    pub fn owns(&self, attr: &AttributeRef) -> bool {
        self.writes.contains(attr) || self.may_write.contains(attr)
    }

    /// Every category touched by a read or a write.
    #[must_use]
    pub fn categories(&self) -> BTreeSet<Category> {
        self.reads
            .iter()
            .chain(&self.writes)
            .chain(&self.may_write)
            .map(|attr| attr.category)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_declaration() {
        let access = AttributeAccess::new()
            .reads_each(&[Category::Stars, Category::Gas], "coords")
            .writes(Category::Gas, "temperature");

        assert_eq!(access.reads.len(), 2);
        assert!(access.owns(&AttributeRef::new(Category::Gas, "temperature")));
        assert!(!access.owns(&AttributeRef::new(Category::Gas, "coords")));

        let access = access.may_write_all(Category::Gas, &["mass", "sfr"]);
        assert!(access.owns(&AttributeRef::new(Category::Gas, "sfr")));
        assert!(!access.writes.contains(&AttributeRef::new(Category::Gas, "sfr")));
        assert_eq!(
            access.categories().into_iter().collect::<Vec<_>>(),
            vec![Category::Stars, Category::Gas]
        );
    }
}
