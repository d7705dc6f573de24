use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use pidx::core::config::IndexConfig;
use pidx::core::types::{AnalyzedDocument, AnalyzedTerm, DocId, TermId};
use pidx::index::reverse_index::ReverseIndex;

fn make_document(id: u32, term_count: u32) -> AnalyzedDocument {
    let mut doc = AnalyzedDocument::new(DocId(id));
    for p in 0..term_count {
        let mut term = AnalyzedTerm::new();
        term.add(TermId((id + p) % 256), 0);
        doc.push(term);
    }
    doc
}

/// Cost of repeatedly forcing a geometric cascade by running a tiny buffer
/// size against an increasing number of postings.
fn bench_cascade_cost(c: &mut Criterion) {
    let mut group = c.benchmark_group("cascade_cost");
    group.sample_size(10);

    for doc_count in [200, 1000, 5000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(doc_count), doc_count, |b, &doc_count| {
            b.iter(|| {
                let dir = tempfile::tempdir().unwrap();
                let config = IndexConfig::new(dir.path().join("bench")).with_buffer_size(64).with_growth_factor(2);
                let index = ReverseIndex::open(config).unwrap();
                for id in 0..doc_count {
                    index.post(make_document(id, 10)).unwrap();
                }
                index.checkpoint().unwrap();
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_cascade_cost);
criterion_main!(benches);
