use crate::core::config::IndexConfig;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{AnalyzedDocument, DocId, InternalTermId, TermId, TermInstance};
use crate::index::lexicon::Lexicon;
use crate::storage::external_partition::ExternalPartition;
use crate::storage::growth_strategy::{GeometricGrowthStrategy, GrowthStrategy, PartitionSizes};
use crate::storage::memory_partition::MemoryPartition;
use crate::storage::MergeSource;
use crossbeam::channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BinaryHeap;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::JoinHandle;

/// One slot of the partition hierarchy: index 0 is always `Memory`.
enum Partition {
    Memory(MemoryPartition),
    External(ExternalPartition),
}

impl Partition {
    fn contains(&self, term_id: crate::core::types::InternalTermId) -> bool {
        match self {
            Partition::Memory(p) => p.contains(term_id),
            Partition::External(p) => p.contains(term_id),
        }
    }

    fn lookup(&self, term_id: crate::core::types::InternalTermId) -> Vec<(DocId, Vec<TermInstance>)> {
        match self {
            Partition::Memory(p) => p.lookup(term_id),
            Partition::External(p) => p.lookup(term_id),
        }
    }

    fn instance_count(&self) -> u64 {
        match self {
            Partition::Memory(p) => p.term_instance_count(),
            Partition::External(p) => p.term_instance_count(),
        }
    }

    fn write_to_disk(&self) -> Result<()> {
        match self {
            Partition::Memory(p) => p.write_to_disk(),
            Partition::External(p) => p.write_to_disk(),
        }
    }

    fn zero_all_data(&mut self) -> Result<()> {
        match self {
            Partition::Memory(p) => p.zero_all_data(),
            Partition::External(p) => p.zero_all_data(),
        }
    }

    fn as_merge_source(&mut self) -> &mut dyn MergeSource {
        match self {
            Partition::Memory(p) => p,
            Partition::External(p) => p,
        }
    }
}

#[derive(Default, Serialize, Deserialize)]
struct ReverseIndexMeta {
    external_partition_count: usize,
    lexicon: Lexicon,
    term_count: u64,
}

struct Inner {
    partitions: Vec<Partition>,
    lexicon: Lexicon,
    term_count: u64,
}

struct PostingMsg {
    term_id: crate::core::types::InternalTermId,
    doc_id: DocId,
    position: u32,
    extent: u32,
}

/// Owns every partition, the lexicon, and the two ingest workers (C6).
pub struct ReverseIndex {
    inner: Arc<Mutex<Inner>>,
    config: IndexConfig,
    growth: Arc<dyn GrowthStrategy + Send + Sync>,
    document_sender: Option<Sender<AnalyzedDocument>>,
    posting_receiver_probe: Receiver<PostingMsg>,
    document_receiver_probe: Receiver<AnalyzedDocument>,
    doc_worker: Option<JoinHandle<()>>,
    posting_worker: Option<JoinHandle<()>>,
}

impl ReverseIndex {
    pub fn open(config: IndexConfig) -> Result<Self> {
        let lex_path = partition_path(&config.storage_path, ".LEX");
        let mut meta = ReverseIndexMeta::default();
        if lex_path.exists() {
            let bytes = std::fs::read(&lex_path)?;
            meta = bincode::deserialize(&bytes).map_err(|e| {
                eprintln!("ReverseIndex: corrupt lexicon metadata at {:?}: {e}", lex_path);
                Error::new(ErrorKind::CorruptMetadata, e.to_string())
            })?;
        }

        let head_path = partition_path(&config.storage_path, ".MMP");
        let mut head = MemoryPartition::open(&head_path, config.index_key.clone())?;
        head.set_term_instance_limit(config.buffer_size);

        let mut partitions = vec![Partition::Memory(head)];
        for k in 1..=meta.external_partition_count {
            let path = partition_path(&config.storage_path, &format!(".EXP{k}"));
            let partition = ExternalPartition::open(&path, config.index_key.clone())?;
            partitions.push(Partition::External(partition));
        }

        let inner = Arc::new(Mutex::new(Inner {
            partitions,
            lexicon: meta.lexicon,
            term_count: meta.term_count,
        }));

        let growth: Arc<dyn GrowthStrategy + Send + Sync> =
            Arc::new(GeometricGrowthStrategy::new(config.buffer_size, config.growth_factor));

        let (document_sender, document_receiver) = bounded::<AnalyzedDocument>(config.document_queue_capacity);
        let (posting_sender, posting_receiver) = bounded::<PostingMsg>(config.posting_queue_capacity);

        let document_receiver_probe = document_receiver.clone();
        let posting_receiver_probe = posting_receiver.clone();

        let doc_worker = {
            let inner = Arc::clone(&inner);
            let posting_sender = posting_sender.clone();
            std::thread::spawn(move || document_worker(document_receiver, inner, posting_sender))
        };

        let posting_worker = {
            let inner = Arc::clone(&inner);
            let growth = Arc::clone(&growth);
            let config = config.clone();
            std::thread::spawn(move || posting_worker(posting_receiver, inner, growth, config))
        };

        Ok(ReverseIndex {
            inner,
            config,
            growth,
            document_sender: Some(document_sender),
            posting_receiver_probe,
            document_receiver_probe,
            doc_worker: Some(doc_worker),
            posting_worker: Some(posting_worker),
        })
    }

    /// Enqueues an analyzed document. Blocks the caller once the bounded
    /// document queue is full.
    pub fn post(&self, doc: AnalyzedDocument) -> Result<()> {
        self.document_sender
            .as_ref()
            .expect("post() called after shutdown")
            .send(doc)
            .map_err(|_| Error::new(ErrorKind::Internal, "document worker has shut down".to_string()))
    }

    /// Translates `term_id` via the lexicon and returns the merged,
    /// ascending-by-docId cross-partition postings for it. An unknown term
    /// yields an empty result, never an error.
    pub fn lookup(&self, term_id: TermId) -> Vec<(DocId, Vec<TermInstance>)> {
        let inner = self.inner.lock();
        let internal = match inner.lexicon.lookup(term_id) {
            Some(id) => id,
            None => return Vec::new(),
        };
        let streams: Vec<Vec<(DocId, Vec<TermInstance>)>> =
            inner.partitions.iter().map(|p| p.lookup(internal)).collect();
        k_way_merge(streams)
    }

    /// Per-partition instance counts, head first, in partition order.
    /// Exposed for diagnostics and tests that need to observe the geometric
    /// cascade directly rather than only aggregate lookup totals.
    pub fn partition_instance_counts(&self) -> Vec<u64> {
        let inner = self.inner.lock();
        inner.partitions.iter().map(|p| p.instance_count()).collect()
    }

    /// Blocks until both ingest queues have drained, then persists the
    /// lexicon, term count, partition count, and every partition's state.
    pub fn checkpoint(&self) -> Result<()> {
        loop {
            if self.document_receiver_probe.is_empty() && self.posting_receiver_probe.is_empty() {
                break;
            }
            std::thread::sleep(self.config.checkpoint_poll_interval);
        }

        let inner = self.inner.lock();
        for partition in &inner.partitions {
            partition.write_to_disk()?;
        }

        let meta = ReverseIndexMeta {
            external_partition_count: inner.partitions.len() - 1,
            lexicon: inner.lexicon.clone(),
            term_count: inner.term_count,
        };
        let bytes = bincode::serialize(&meta)?;
        std::fs::write(partition_path(&self.config.storage_path, ".LEX"), bytes)?;
        Ok(())
    }
}

impl Drop for ReverseIndex {
    fn drop(&mut self) {
        self.document_sender.take();
        if let Some(handle) = self.doc_worker.take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.posting_worker.take() {
            let _ = handle.join();
        }
    }
}

fn document_worker(
    receiver: Receiver<AnalyzedDocument>,
    inner: Arc<Mutex<Inner>>,
    posting_sender: Sender<PostingMsg>,
) {
    while let Ok(doc) = receiver.recv() {
        for (position, analyzed_term) in doc.positions() {
            for &(term_id, extent) in analyzed_term.iter() {
                let internal = {
                    let mut guard = inner.lock();
                    let internal = guard.lexicon.intern(term_id);
                    guard.term_count = guard.lexicon.len() as u64;
                    internal
                };
                if posting_sender
                    .send(PostingMsg { term_id: internal, doc_id: doc.doc_id, position, extent })
                    .is_err()
                {
                    return;
                }
            }
        }
    }
}

fn posting_worker(
    receiver: Receiver<PostingMsg>,
    inner: Arc<Mutex<Inner>>,
    growth: Arc<dyn GrowthStrategy + Send + Sync>,
    config: IndexConfig,
) {
    while let Ok(msg) = receiver.recv() {
        let mut guard = inner.lock();
        let head_reached_limit = match &guard.partitions[0] {
            Partition::Memory(p) => p.reached_limit(),
            Partition::External(_) => unreachable!("partition 0 is always Memory"),
        };
        if head_reached_limit {
            if let Err(e) = cascade_merge(&mut guard, &growth, &config) {
                eprintln!("posting worker: merge cascade failed: {e}");
            }
        }
        match &mut guard.partitions[0] {
            Partition::Memory(p) => p.add(msg.term_id, msg.doc_id, msg.position, msg.extent),
            Partition::External(_) => unreachable!("partition 0 is always Memory"),
        }
    }
}

/// Runs the geometric-partitioning cascade (§4.4): pick the smallest level
/// `k` whose capacity covers the cumulative instance count of partitions
/// `0..=k`, creating a new external partition at the end of the list if
/// none of the existing ones fit, then merge `partitions[0..k]` into it and
/// zero the sources.
fn cascade_merge(
    inner: &mut Inner,
    growth: &Arc<dyn GrowthStrategy + Send + Sync>,
    config: &IndexConfig,
) -> Result<()> {
    let sizes = PartitionSizes {
        instances: inner.partitions.iter().map(|p| p.instance_count()).collect(),
    };
    let k = growth.choose_merge_target(&sizes);

    if k >= inner.partitions.len() {
        let path = partition_path(&config.storage_path, &format!(".EXP{k}"));
        let mut partition = ExternalPartition::open(&path, config.index_key.clone())?;
        partition.set_term_instance_limit(growth.capacity(k));
        inner.partitions.push(Partition::External(partition));
    }

    let (sources_slice, rest) = inner.partitions.split_at_mut(k);
    let target = match &mut rest[0] {
        Partition::External(p) => p,
        Partition::Memory(_) => unreachable!("merge target is always external"),
    };
    let mut source_refs: Vec<&mut dyn MergeSource> =
        sources_slice.iter_mut().map(|p| p.as_merge_source()).collect();

    let mut all_term_ids: Vec<InternalTermId> =
        source_refs.iter().flat_map(|s| s.term_ids()).collect();
    all_term_ids.sort();
    all_term_ids.dedup();

    target.merge(&all_term_ids, &mut source_refs)?;

    for source in sources_slice.iter_mut() {
        source.zero_all_data()?;
    }

    Ok(())
}

fn partition_path(storage_path: &std::path::Path, suffix: &str) -> PathBuf {
    let mut s = storage_path.as_os_str().to_owned();
    s.push(suffix);
    PathBuf::from(s)
}

/// Sorted k-way merge of per-partition `(DocId, Vec<TermInstance>)` streams,
/// keyed on DocId with a min-heap; duplicate docIds across streams have
/// their position vectors concatenated in input order.
fn k_way_merge(streams: Vec<Vec<(DocId, Vec<TermInstance>)>>) -> Vec<(DocId, Vec<TermInstance>)> {
    #[derive(Eq, PartialEq)]
    struct HeapEntry {
        doc_id: DocId,
        stream: usize,
        index: usize,
    }
    impl Ord for HeapEntry {
        fn cmp(&self, other: &Self) -> std::cmp::Ordering {
            other.doc_id.0.cmp(&self.doc_id.0)
        }
    }
    impl PartialOrd for HeapEntry {
        fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
            Some(self.cmp(other))
        }
    }

    let mut heap = BinaryHeap::new();
    for (stream_idx, stream) in streams.iter().enumerate() {
        if let Some((doc_id, _)) = stream.first() {
            heap.push(HeapEntry { doc_id: *doc_id, stream: stream_idx, index: 0 });
        }
    }

    let mut result: Vec<(DocId, Vec<TermInstance>)> = Vec::new();
    while let Some(HeapEntry { doc_id, stream, index }) = heap.pop() {
        let (_, instances) = &streams[stream][index];
        match result.last_mut() {
            Some((last_doc, last_instances)) if *last_doc == doc_id => {
                last_instances.extend(instances.iter().copied());
            }
            _ => result.push((doc_id, instances.clone())),
        }

        if let Some((next_doc, _)) = streams[stream].get(index + 1) {
            heap.push(HeapEntry { doc_id: *next_doc, stream, index: index + 1 });
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn k_way_merge_concatenates_duplicate_doc_ids() {
        let a = vec![(DocId(1), vec![TermInstance::leaf(0)])];
        let b = vec![(DocId(1), vec![TermInstance::leaf(5)]), (DocId(2), vec![TermInstance::leaf(1)])];
        let merged = k_way_merge(vec![a, b]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].0, DocId(1));
        assert_eq!(merged[0].1.len(), 2);
        assert_eq!(merged[1].0, DocId(2));
    }
}
