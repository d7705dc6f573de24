//! Ingests a handful of analyzed documents and runs a phrase query against
//! them, exercising `ReverseIndex` end to end.

use pidx::core::config::IndexConfig;
use pidx::core::types::{AnalyzedDocument, AnalyzedTerm, DocId, TermId};
use pidx::index::reverse_index::ReverseIndex;
use pidx::query::parser::parse;
use pidx::query::reducer::{reduce, Environment};

const THE: TermId = TermId(0);
const CAT: TermId = TermId(1);
const SAT: TermId = TermId(2);
const MAT: TermId = TermId(3);

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
    let config = IndexConfig::new(dir.path().join("demo"));
    let index = ReverseIndex::open(config)?;

    index.post(doc(7, &[THE, CAT, SAT]))?; // "the cat sat"
    index.post(doc(9, &[CAT, THE, SAT]))?; // "cat the sat"
    index.post(doc(12, &[THE, CAT, SAT, MAT]))?; // "the cat sat mat"
    index.checkpoint()?;

    let expr = parse(r#"(Before (Term "the") (Term "cat") (Term "sat"))"#)?;
    let resolver = |word: &str| {
        let term_id = match word {
            "the" => THE,
            "cat" => CAT,
            "sat" => SAT,
            "mat" => MAT,
            _ => return pidx::query::algebra::MatchVector::empty(),
        };
        pidx::query::algebra::MatchVector::from_lookup(index.lookup(term_id))
    };
    let env = Environment::new(&resolver);
    let matches = reduce(&expr, &env)?.collect_all();

    println!("phrase 'the cat sat' matched {} document(s):", matches.len());
    for m in matches {
        println!("  doc {}", m.doc_id.0);
    }

    Ok(())
}
