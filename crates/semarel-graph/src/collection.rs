//! Document collection provider: the external source of entities and their
//! category memberships.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentKind {
    /// A plain entity (encyclopedia article).
    Article,
    /// A category page; its `categories` list names its parent categories.
    Category,
}

/// One document from the collection snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Stable integer id, supplied by the collection.
    pub id: u32,
    pub title: String,
    pub kind: DocumentKind,
    /// Names of the categories this document directly belongs to.
    pub categories: Vec<String>,
    #[serde(default)]
    pub text: String,
}

/// Yields a snapshot of the document collection. Implemented by external
/// providers; the graph builder iterates it exactly once.
pub trait DocumentCollection {
    fn documents(&self) -> Box<dyn Iterator<Item = Document> + '_>;
}

/// In-memory collection, used by tests and small CLI runs.
#[derive(Debug, Default, Clone)]
pub struct VecCollection {
    docs: Vec<Document>,
}

impl VecCollection {
    pub fn new(docs: Vec<Document>) -> Self {
        Self { docs }
    }

    pub fn push(&mut self, doc: Document) {
        self.docs.push(doc);
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }
}

impl DocumentCollection for VecCollection {
    fn documents(&self) -> Box<dyn Iterator<Item = Document> + '_> {
        Box::new(self.docs.iter().cloned())
    }
}
