use crate::core::types::{InternalTermId, TermId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Maps the analyzer's opaque `TermId` to a dense, index-local
/// `InternalTermId`, assigned in order of first sighting.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Lexicon {
    external_to_internal: HashMap<TermId, InternalTermId>,
}

impl Lexicon {
    pub fn new() -> Self {
        Lexicon::default()
    }

    pub fn len(&self) -> usize {
        self.external_to_internal.len()
    }

    pub fn is_empty(&self) -> bool {
        self.external_to_internal.is_empty()
    }

    pub fn lookup(&self, term_id: TermId) -> Option<InternalTermId> {
        self.external_to_internal.get(&term_id).copied()
    }

    /// Returns the internal id for `term_id`, assigning a new dense id on
    /// first sighting.
    pub fn intern(&mut self, term_id: TermId) -> InternalTermId {
        if let Some(&internal) = self.external_to_internal.get(&term_id) {
            return internal;
        }
        let internal = InternalTermId(self.external_to_internal.len() as u32);
        self.external_to_internal.insert(term_id, internal);
        internal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_is_stable_and_dense() {
        let mut lexicon = Lexicon::new();
        let a = lexicon.intern(TermId(100));
        let b = lexicon.intern(TermId(200));
        let a_again = lexicon.intern(TermId(100));
        assert_eq!(a, a_again);
        assert_ne!(a, b);
        assert_eq!(lexicon.len(), 2);
        assert_eq!(lexicon.lookup(TermId(200)), Some(b));
        assert_eq!(lexicon.lookup(TermId(999)), None);
    }
}
