use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Opaque term identifier assigned by the analyzer, outside this crate's control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TermId(pub u32);

/// Dense term identifier assigned by the index's own lexicon on first sighting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InternalTermId(pub u32);

/// Document identifier supplied by the producer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocId(pub u32);

/// One occurrence of a term within a document.
///
/// Equality and ordering are on `position` only: a document holds at most
/// one TermInstance per position for a given term.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TermInstance {
    pub position: u32,
    pub extent: u32,
}

impl TermInstance {
    pub fn new(position: u32, extent: u32) -> Self {
        TermInstance { position, extent }
    }

    pub fn leaf(position: u32) -> Self {
        TermInstance { position, extent: 0 }
    }

    /// Does this instance, read as a scope, cover `position`?
    pub fn covers(&self, position: u32) -> bool {
        self.position <= position && position < self.position + self.extent
    }
}

impl PartialEq for TermInstance {
    fn eq(&self, other: &Self) -> bool {
        self.position == other.position
    }
}
impl Eq for TermInstance {}

impl PartialOrd for TermInstance {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for TermInstance {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.position.cmp(&other.position)
    }
}

impl std::hash::Hash for TermInstance {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.position.hash(state);
    }
}

/// One position of an analyzed document: the set of (term, extent) pairs
/// active at that position. Structural tokens may contribute more than one.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalyzedTerm {
    entries: Vec<(TermId, u32)>,
}

impl AnalyzedTerm {
    pub fn new() -> Self {
        AnalyzedTerm::default()
    }

    pub fn add(&mut self, term: TermId, extent: u32) {
        self.entries.push((term, extent));
    }

    pub fn iter(&self) -> impl Iterator<Item = &(TermId, u32)> {
        self.entries.iter()
    }
}

/// A document already tokenized and analyzed by an external collaborator:
/// an ordered sequence of AnalyzedTerm, whose zero-based index is the
/// position of that term within the document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzedDocument {
    pub doc_id: DocId,
    terms: Vec<AnalyzedTerm>,
}

impl AnalyzedDocument {
    pub fn new(doc_id: DocId) -> Self {
        AnalyzedDocument { doc_id, terms: Vec::new() }
    }

    pub fn push(&mut self, term: AnalyzedTerm) {
        self.terms.push(term);
    }

    pub fn positions(&self) -> impl Iterator<Item = (u32, &AnalyzedTerm)> {
        self.terms.iter().enumerate().map(|(p, t)| (p as u32, t))
    }
}

/// An in-memory posting set for one term: DocId -> unique-by-position
/// TermInstances.
#[derive(Debug, Clone, Default)]
pub struct DocIdTermInstanceTable {
    pub doc_hash: std::collections::BTreeMap<DocId, HashSet<TermInstance>>,
}

impl DocIdTermInstanceTable {
    pub fn new() -> Self {
        DocIdTermInstanceTable::default()
    }

    /// Insert a record, applying the documented same-position tie-break:
    /// the instance with the larger extent wins (see SPEC_FULL.md open
    /// question 3).
    pub fn insert(&mut self, doc_id: DocId, instance: TermInstance) {
        let set = self.doc_hash.entry(doc_id).or_default();
        if let Some(existing) = set.iter().find(|i| i.position == instance.position).copied() {
            if instance.extent > existing.extent {
                set.remove(&existing);
                set.insert(instance);
            }
        } else {
            set.insert(instance);
        }
    }

    pub fn delete_doc(&mut self, doc_id: DocId) {
        self.doc_hash.remove(&doc_id);
    }

    pub fn term_instance_count(&self) -> u64 {
        self.doc_hash.values().map(|s| s.len() as u64).sum()
    }

    pub fn doc_count(&self) -> u64 {
        self.doc_hash.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.doc_hash.is_empty()
    }
}
