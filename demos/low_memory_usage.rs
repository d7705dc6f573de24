//! Demonstrates a small `buffer_size`, which keeps the in-memory head
//! partition tiny and forces frequent geometric cascades onto disk — the
//! knob a memory-constrained deployment would turn.

use pidx::core::config::IndexConfig;
use pidx::core::types::{AnalyzedDocument, AnalyzedTerm, DocId, TermId};
use pidx::index::reverse_index::ReverseIndex;

fn doc(id: u32, terms: &[TermId]) -> AnalyzedDocument {
    let mut doc = AnalyzedDocument::new(DocId(id));
    for &term in terms {
        let mut t = AnalyzedTerm::new();
        t.add(term, 0);
        doc.push(t);
    }
    doc
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let config = IndexConfig::new(dir.path().join("low-memory-demo"))
        .with_buffer_size(8)
        .with_growth_factor(2);
    let index = ReverseIndex::open(config)?;

    for i in 0..200u32 {
        let term = TermId(i % 16);
        index.post(doc(i, &[term]))?;
        if i % 40 == 0 {
            index.checkpoint()?;
            println!("posted {i} documents, checkpointed");
        }
    }
    index.checkpoint()?;

    let hits = index.lookup(TermId(3));
    println!("term 3 occurs in {} document(s)", hits.len());

    Ok(())
}
