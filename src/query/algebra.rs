//! Lazy positional algebra over per-document matches (C7).
//!
//! A `MatchVector` is a restartable, cached lazy sequence of `ComputedMatch`
//! values ascending by `DocId` (§9 design notes: "cyclic/lazy match
//! graphs"). Operators consume one or more `MatchVector`s and produce a new
//! one; nothing here eagerly materializes more than the caller asks for.

use crate::core::types::{DocId, TermInstance};
use std::cell::RefCell;
use std::rc::Rc;

/// One operator evaluation's result for a single document: its operands'
/// term-instance vectors, in operand order.
#[derive(Debug, Clone)]
pub struct ComputedMatch {
    pub doc_id: DocId,
    pub vectors: Vec<Vec<TermInstance>>,
}

struct Inner {
    source: RefCell<Option<Box<dyn Iterator<Item = ComputedMatch>>>>,
    cache: RefCell<Vec<ComputedMatch>>,
}

/// A lazy, possibly-infinite, restartable sequence of `ComputedMatch`.
/// Already-pulled elements are cached so the same vector can back several
/// independent cursors (e.g. both operands of a nested operator).
#[derive(Clone)]
pub struct MatchVector(Rc<Inner>);

impl MatchVector {
    pub fn new(source: impl Iterator<Item = ComputedMatch> + 'static) -> Self {
        MatchVector(Rc::new(Inner {
            source: RefCell::new(Some(Box::new(source))),
            cache: RefCell::new(Vec::new()),
        }))
    }

    pub fn empty() -> Self {
        MatchVector::new(std::iter::empty())
    }

    pub fn from_lookup(lookup: Vec<(DocId, Vec<TermInstance>)>) -> Self {
        MatchVector::new(lookup.into_iter().map(|(doc_id, instances)| ComputedMatch {
            doc_id,
            vectors: vec![instances],
        }))
    }

    /// Returns the cached-or-pulled element at `index`, extending the cache
    /// by polling the source iterator as needed.
    fn get(&self, index: usize) -> Option<ComputedMatch> {
        loop {
            if let Some(item) = self.0.cache.borrow().get(index) {
                return Some(item.clone());
            }
            let next = {
                let mut source = self.0.source.borrow_mut();
                source.as_mut().and_then(|it| it.next())
            };
            match next {
                Some(item) => self.0.cache.borrow_mut().push(item),
                None => return None,
            }
        }
    }

    /// A fresh cursor over this vector, starting at index 0. Restarting is
    /// free: it just re-reads the shared cache from the top.
    pub fn cursor(&self) -> Cursor {
        Cursor { vector: self.clone(), index: 0 }
    }

    pub fn collect_all(&self) -> Vec<ComputedMatch> {
        self.cursor().collect()
    }
}

pub struct Cursor {
    vector: MatchVector,
    index: usize,
}

impl Cursor {
    fn peek_doc_id(&mut self) -> Option<DocId> {
        self.vector.get(self.index).map(|m| m.doc_id)
    }
}

impl Iterator for Cursor {
    type Item = ComputedMatch;

    fn next(&mut self) -> Option<ComputedMatch> {
        let item = self.vector.get(self.index);
        self.index += 1;
        item
    }
}

/// For every DocId appearing in any operand, pulls the operand(s) currently
/// at that minimum DocId and leaves the rest untouched, yielding
/// `(doc_id, per_operand_vectors)` with `None` where an operand has no
/// match for that doc. Ascending-DocId union join underlying every
/// operator below.
struct UnionJoin {
    cursors: Vec<Cursor>,
}

impl UnionJoin {
    fn over(operands: &[MatchVector]) -> Self {
        UnionJoin { cursors: operands.iter().map(|v| v.cursor()).collect() }
    }
}

impl Iterator for UnionJoin {
    type Item = (DocId, Vec<Option<Vec<Vec<TermInstance>>>>);

    fn next(&mut self) -> Option<Self::Item> {
        let min = self.cursors.iter_mut().filter_map(|c| c.peek_doc_id()).min()?;

        let slots = self
            .cursors
            .iter_mut()
            .map(|c| match c.peek_doc_id() {
                Some(doc_id) if doc_id == min => c.next().map(|m| m.vectors),
                _ => None,
            })
            .collect();

        Some((min, slots))
    }
}

fn non_empty_vectors(vectors: Vec<Vec<TermInstance>>) -> Vec<Vec<TermInstance>> {
    vectors.into_iter().filter(|v| !v.is_empty()).collect()
}

/// AND: emit only where every operand has a match for the DocId;
/// concatenate their vectors.
pub fn and_op(operands: Vec<MatchVector>) -> MatchVector {
    let iter = UnionJoin::over(&operands).filter_map(|(doc_id, slots)| {
        let mut combined = Vec::new();
        for slot in slots {
            combined.extend(slot?);
        }
        Some(ComputedMatch { doc_id, vectors: non_empty_vectors(combined) })
    });
    MatchVector::new(iter)
}

/// ANDNOT: emit `left`'s own vectors only where every other operand has no
/// match for the DocId.
pub fn andnot_op(left: MatchVector, others: Vec<MatchVector>) -> MatchVector {
    let mut operands = vec![left];
    operands.extend(others);
    let iter = UnionJoin::over(&operands).filter_map(|(doc_id, mut slots)| {
        let left_slot = slots.remove(0)?;
        if slots.into_iter().any(|s| s.is_some()) {
            return None;
        }
        Some(ComputedMatch { doc_id, vectors: non_empty_vectors(left_slot) })
    });
    MatchVector::new(iter)
}

/// MINOC(n): emit where at least `n` operands have a match for the DocId;
/// concatenate only the present operands' vectors.
pub fn minoc_op(n: usize, operands: Vec<MatchVector>) -> MatchVector {
    let iter = UnionJoin::over(&operands).filter_map(move |(doc_id, slots)| {
        let present: Vec<Vec<Vec<TermInstance>>> = slots.into_iter().flatten().collect();
        if present.len() < n {
            return None;
        }
        let combined = present.into_iter().flatten().collect();
        Some(ComputedMatch { doc_id, vectors: non_empty_vectors(combined) })
    });
    MatchVector::new(iter)
}

/// Tests whether the list of per-operand vectors `v1, v2, ...` is in
/// strictly ascending (BEFORE) or descending (AFTER) position order:
/// `max(pos(v_i)) < min(pos(v_{i+1}))`, resp. `>`.
fn is_ordered(vectors: &[Vec<TermInstance>], ascending: bool) -> bool {
    vectors.windows(2).all(|pair| {
        let (a, b) = (&pair[0], &pair[1]);
        let a_max = a.iter().map(|i| i.position).max();
        let a_min = a.iter().map(|i| i.position).min();
        let b_max = b.iter().map(|i| i.position).max();
        let b_min = b.iter().map(|i| i.position).min();
        match (a_max, a_min, b_max, b_min) {
            (Some(a_max), Some(a_min), Some(b_max), Some(b_min)) => {
                if ascending {
                    a_max < b_min
                } else {
                    a_min > b_max
                }
            }
            _ => false,
        }
    })
}

pub fn before_op(operands: Vec<MatchVector>) -> MatchVector {
    let base = and_op(operands);
    MatchVector::new(base.cursor().filter(|m| is_ordered(&m.vectors, true)))
}

pub fn after_op(operands: Vec<MatchVector>) -> MatchVector {
    let base = and_op(operands);
    MatchVector::new(base.cursor().filter(|m| is_ordered(&m.vectors, false)))
}

/// WITHIN(d): AND, then keep matches where some pair of positions drawn
/// from two distinct operand vectors satisfies `|a - b| <= d`.
pub fn within_op(distance: u32, operands: Vec<MatchVector>) -> MatchVector {
    let base = and_op(operands);
    let iter = base.cursor().filter(move |m| {
        for i in 0..m.vectors.len() {
            for j in (i + 1)..m.vectors.len() {
                for a in &m.vectors[i] {
                    for b in &m.vectors[j] {
                        if a.position.abs_diff(b.position) <= distance {
                            return true;
                        }
                    }
                }
            }
        }
        false
    });
    MatchVector::new(iter)
}

/// SCOPE(scope, scoped): pairwise AND on the two Term operands, keeping
/// only the scoped instances covered by a scope instance's extent. The
/// emitted match carries the scoped positions only.
pub fn scope_op(scope: MatchVector, scoped: MatchVector) -> MatchVector {
    let iter = UnionJoin::over(&[scope, scoped]).filter_map(|(doc_id, mut slots)| {
        let scoped_slot = slots.pop().flatten()?;
        let scope_slot = slots.pop().flatten()?;

        let scope_instances: Vec<TermInstance> = scope_slot.into_iter().flatten().collect();
        let scoped_instances: Vec<TermInstance> = scoped_slot.into_iter().flatten().collect();

        let covered: Vec<TermInstance> = scoped_instances
            .into_iter()
            .filter(|scoped_instance| scope_instances.iter().any(|s| s.covers(scoped_instance.position)))
            .collect();

        if covered.is_empty() {
            None
        } else {
            Some(ComputedMatch { doc_id, vectors: vec![covered] })
        }
    });
    MatchVector::new(iter)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vector_of(entries: Vec<(u32, Vec<u32>)>) -> MatchVector {
        MatchVector::from_lookup(
            entries
                .into_iter()
                .map(|(doc, positions)| {
                    (DocId(doc), positions.into_iter().map(TermInstance::leaf).collect())
                })
                .collect(),
        )
    }

    #[test]
    fn and_intersects_on_doc_id() {
        let a = vector_of(vec![(1, vec![0]), (2, vec![0])]);
        let b = vector_of(vec![(2, vec![1]), (3, vec![1])]);
        let result = and_op(vec![a, b]).collect_all();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].doc_id, DocId(2));
    }

    #[test]
    fn andnot_keeps_left_only_matches() {
        let a = vector_of(vec![(1, vec![0]), (2, vec![0])]);
        let b = vector_of(vec![(2, vec![1])]);
        let result = andnot_op(a, vec![b]).collect_all();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].doc_id, DocId(1));
    }

    #[test]
    fn before_requires_ascending_order() {
        let the = vector_of(vec![(7, vec![0]), (9, vec![1])]);
        let cat = vector_of(vec![(7, vec![1]), (9, vec![0])]);
        let sat = vector_of(vec![(7, vec![2]), (9, vec![2])]);
        let result = before_op(vec![the, cat, sat]).collect_all();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].doc_id, DocId(7));
    }

    #[test]
    fn within_excludes_beyond_distance() {
        let a = vector_of(vec![(1, vec![0])]);
        let b = vector_of(vec![(1, vec![3])]);
        let result = within_op(2, vec![a, b]).collect_all();
        assert!(result.is_empty());
    }

    #[test]
    fn andnot_on_itself_is_identity() {
        let a = vector_of(vec![(1, vec![0]), (2, vec![0])]);
        let b = MatchVector::empty();
        let result = andnot_op(a.clone(), vec![b]).collect_all();
        assert_eq!(result.len(), a.collect_all().len());
    }

    #[test]
    fn scope_keeps_covered_positions_only() {
        let scope = MatchVector::new(
            vec![ComputedMatch { doc_id: DocId(5), vectors: vec![vec![TermInstance::new(0, 3)]] }].into_iter(),
        );
        let cat_inside = vector_of(vec![(5, vec![2])]);
        let result = scope_op(scope, cat_inside).collect_all();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].vectors[0][0].position, 2);

        let scope2 = MatchVector::new(
            vec![ComputedMatch { doc_id: DocId(5), vectors: vec![vec![TermInstance::new(0, 3)]] }].into_iter(),
        );
        let cat_outside = vector_of(vec![(5, vec![5])]);
        let result2 = scope_op(scope2, cat_outside).collect_all();
        assert!(result2.is_empty());
    }
}
