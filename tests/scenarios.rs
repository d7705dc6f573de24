//! End-to-end scenarios exercising ingest, cascade, and query evaluation
//! through the public `ReverseIndex` and query-reducer surface.

use pidx::core::config::IndexConfig;
use pidx::core::error::ErrorKind;
use pidx::core::types::{AnalyzedDocument, AnalyzedTerm, DocId, TermId};
use pidx::index::reverse_index::ReverseIndex;
use pidx::query::algebra::MatchVector;
use pidx::query::parser::parse;
use pidx::query::reducer::{reduce, Environment};

fn doc(id: u32, terms: &[TermId]) -> AnalyzedDocument {
    let mut d = AnalyzedDocument::new(DocId(id));
    for &term in terms {
        let mut t = AnalyzedTerm::new();
        t.add(term, 0);
        d.push(t);
    }
    d
}

fn doc_with_structural(id: u32, leading: (TermId, u32), rest: &[TermId]) -> AnalyzedDocument {
    let mut d = AnalyzedDocument::new(DocId(id));
    let mut first = AnalyzedTerm::new();
    first.add(leading.0, leading.1);
    d.push(first);
    for &term in rest {
        let mut t = AnalyzedTerm::new();
        t.add(term, 0);
        d.push(t);
    }
    d
}

fn env_over<'a>(resolver: &'a impl Fn(&str) -> MatchVector) -> Environment<'a> {
    Environment::new(resolver)
}

/// S1 — phrase (BEFORE).
#[test]
fn phrase_before_matches_only_the_ordered_document() {
    let dir = tempfile::tempdir().unwrap();
    let index = ReverseIndex::open(IndexConfig::new(dir.path().join("s1"))).unwrap();

    let the = TermId(0);
    let cat = TermId(1);
    let sat = TermId(2);

    index.post(doc(7, &[the, cat, sat])).unwrap();
    index.post(doc(9, &[cat, the, sat])).unwrap();
    index.checkpoint().unwrap();

    let resolver = |word: &str| {
        let term_id = match word {
            "the" => the,
            "cat" => cat,
            "sat" => sat,
            _ => return MatchVector::empty(),
        };
        MatchVector::from_lookup(index.lookup(term_id))
    };
    let env = env_over(&resolver);
    let expr = parse(r#"(Before (Term "the") (Term "cat") (Term "sat"))"#).unwrap();
    let result = reduce(&expr, &env).unwrap().collect_all();

    assert_eq!(result.len(), 1);
    assert_eq!(result[0].doc_id, DocId(7));
}

/// S2 — WITHIN(2): the only candidate document has its operands 3 apart, so
/// a distance of 2 excludes it; relaxing to 3 admits it.
#[test]
fn within_excludes_then_admits_as_distance_grows() {
    let dir = tempfile::tempdir().unwrap();
    let index = ReverseIndex::open(IndexConfig::new(dir.path().join("s2"))).unwrap();

    let a = TermId(0);
    let b = TermId(1);
    let x = TermId(2);

    index.post(doc(1, &[a, x, x, b])).unwrap();
    index.checkpoint().unwrap();

    let resolver = |word: &str| {
        let term_id = match word {
            "a" => a,
            "b" => b,
            _ => return MatchVector::empty(),
        };
        MatchVector::from_lookup(index.lookup(term_id))
    };
    let env = env_over(&resolver);

    let tight = parse(r#"(Within 2 (Term "a") (Term "b"))"#).unwrap();
    assert!(reduce(&tight, &env).unwrap().collect_all().is_empty());

    let loose = parse(r#"(Within 3 (Term "a") (Term "b"))"#).unwrap();
    assert_eq!(reduce(&loose, &env).unwrap().collect_all().len(), 1);
}

/// S3 — ANDNOT.
#[test]
fn andnot_keeps_only_documents_missing_the_right_operand() {
    let dir = tempfile::tempdir().unwrap();
    let index = ReverseIndex::open(IndexConfig::new(dir.path().join("s3"))).unwrap();

    let a = TermId(0);
    let b = TermId(1);

    index.post(doc(1, &[a, b])).unwrap();
    index.post(doc(2, &[a])).unwrap();
    index.post(doc(3, &[b])).unwrap();
    index.checkpoint().unwrap();

    let resolver = |word: &str| {
        let term_id = match word {
            "a" => a,
            "b" => b,
            _ => return MatchVector::empty(),
        };
        MatchVector::from_lookup(index.lookup(term_id))
    };
    let env = env_over(&resolver);
    let expr = parse(r#"(Andnot (Term "a") (Term "b"))"#).unwrap();
    let result = reduce(&expr, &env).unwrap().collect_all();

    assert_eq!(result.len(), 1);
    assert_eq!(result[0].doc_id, DocId(2));
}

/// S4 — SCOPE: a structural term covers part of the document; a contained
/// word matches, one outside the covered extent does not.
#[test]
fn scope_requires_the_scoped_position_to_fall_within_the_extent() {
    let dir = tempfile::tempdir().unwrap();
    let index = ReverseIndex::open(IndexConfig::new(dir.path().join("s4"))).unwrap();

    let title = TermId(0);
    let cat = TermId(1);
    let filler = TermId(2);

    // position 0: title (extent 3, covers 0..3); position 2: cat.
    index.post(doc_with_structural(5, (title, 3), &[filler, cat])).unwrap();
    // position 0: title (extent 3); positions 1..5 filler, cat at position 5 (outside 0..3).
    index.post(doc_with_structural(6, (title, 3), &[filler, filler, filler, filler, cat])).unwrap();
    index.checkpoint().unwrap();

    let resolver = |word: &str| {
        let term_id = match word {
            "title" => title,
            "cat" => cat,
            _ => return MatchVector::empty(),
        };
        MatchVector::from_lookup(index.lookup(term_id))
    };
    let env = env_over(&resolver);
    let expr = parse(r#"(Scope (Term "title") (Term "cat"))"#).unwrap();
    let result = reduce(&expr, &env).unwrap().collect_all();

    assert_eq!(result.len(), 1);
    assert_eq!(result[0].doc_id, DocId(5));
    assert_eq!(result[0].vectors[0][0].position, 2);
}

/// S5 — flush cascade: a small buffer forces several cascading merges
/// across the ingest; every posting must still be reachable afterwards, and
/// the cascade must actually have run rather than everything sitting
/// unmerged in the head.
#[test]
fn cascading_merges_preserve_every_posting() {
    let dir = tempfile::tempdir().unwrap();
    let index = ReverseIndex::open(
        IndexConfig::new(dir.path().join("s5")).with_buffer_size(2).with_growth_factor(3),
    )
    .unwrap();

    let terms: Vec<TermId> = (0..4).map(TermId).collect();
    for i in 0..8u32 {
        index.post(doc(i, &[terms[(i % 4) as usize]])).unwrap();
    }
    index.checkpoint().unwrap();

    // Exact partition layout this scenario produces: the head-full check
    // fires on arrival of the posting after the one that filled the head, so
    // two cascades land two external partitions holding 0 and 6 instances,
    // with the final two postings left sitting in the head.
    assert_eq!(index.partition_instance_counts(), vec![2, 0, 6]);

    let mut total = 0;
    for term in &terms {
        total += index.lookup(*term).len();
    }
    assert_eq!(total, 8);
}

/// S6 — reopen with key: a mismatched key on reopen is a fatal error; the
/// correct key reproduces the same lookup results.
#[test]
fn reopen_enforces_the_index_key() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("s6");
    let term = TermId(0);

    {
        let index =
            ReverseIndex::open(IndexConfig::new(&path).with_index_key("k1")).unwrap();
        index.post(doc(1, &[term])).unwrap();
        index.checkpoint().unwrap();
    }

    let mismatched = ReverseIndex::open(IndexConfig::new(&path).with_index_key("k2"));
    assert!(matches!(mismatched, Err(e) if matches!(e.kind, ErrorKind::KeyMismatch)));

    let reopened = ReverseIndex::open(IndexConfig::new(&path).with_index_key("k1")).unwrap();
    let result = reopened.lookup(term);
    assert_eq!(result.len(), 1);
    assert_eq!(result[0].0, DocId(1));
}
