use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use pidx::core::config::IndexConfig;
use pidx::core::types::{AnalyzedDocument, AnalyzedTerm, DocId, TermId};
use pidx::index::reverse_index::ReverseIndex;

fn make_document(id: u32, term_count: u32) -> AnalyzedDocument {
    let mut doc = AnalyzedDocument::new(DocId(id));
    for p in 0..term_count {
        let mut term = AnalyzedTerm::new();
        term.add(TermId((id + p) % 64), 0);
        doc.push(term);
    }
    doc
}

fn bench_single_post(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let config = IndexConfig::new(dir.path().join("bench"));
    let index = ReverseIndex::open(config).unwrap();

    c.bench_function("single_document_post", |b| {
        let mut id = 0u32;
        b.iter(|| {
            index.post(black_box(make_document(id, 20))).unwrap();
            id += 1;
        });
    });
}

fn bench_batch_post(c: &mut Criterion) {
    let mut group = c.benchmark_group("batch_post");

    for batch_size in [10, 100, 1000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(batch_size), batch_size, |b, &batch_size| {
            let dir = tempfile::tempdir().unwrap();
            let config = IndexConfig::new(dir.path().join("bench"));
            let index = ReverseIndex::open(config).unwrap();
            let mut id = 0u32;

            b.iter(|| {
                for _ in 0..batch_size {
                    index.post(make_document(id, 20)).unwrap();
                    id += 1;
                }
                index.checkpoint().unwrap();
            });
        });
    }
    group.finish();
}

fn bench_lookup(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let config = IndexConfig::new(dir.path().join("bench")).with_buffer_size(512);
    let index = ReverseIndex::open(config).unwrap();

    for id in 0..5000u32 {
        index.post(make_document(id, 20)).unwrap();
    }
    index.checkpoint().unwrap();

    c.bench_function("cross_partition_lookup", |b| {
        b.iter(|| {
            black_box(index.lookup(TermId(7)));
        });
    });
}

criterion_group!(benches, bench_single_post, bench_batch_post, bench_lookup);
criterion_main!(benches);
