use std::path::PathBuf;
use std::time::Duration;

/// Every tunable named in the design is routed through this struct; there is
/// no ambient/env-var configuration layer.
#[derive(Debug, Clone)]
pub struct IndexConfig {
    pub storage_path: PathBuf,

    /// `b`: capacity of the head partition (partition 0), in term instances.
    pub buffer_size: u64,
    /// `r`: geometric growth factor between successive partitions. Must be > 1.
    pub growth_factor: u64,

    /// Guard string stored in every partition's metadata and the lexicon
    /// file; mismatched on reopen is a fatal KeyMismatch.
    pub index_key: Option<String>,

    /// Capacity of the bounded document-ingest channel. `post()` blocks the
    /// caller once full.
    pub document_queue_capacity: usize,
    /// Capacity of the bounded posting channel between the document worker
    /// and the posting worker.
    pub posting_queue_capacity: usize,

    /// Poll interval for the busy/sleep loop in `checkpoint()`.
    pub checkpoint_poll_interval: Duration,
}

impl IndexConfig {
    pub fn new(storage_path: impl Into<PathBuf>) -> Self {
        IndexConfig {
            storage_path: storage_path.into(),
            ..IndexConfig::default()
        }
    }

    pub fn with_index_key(mut self, key: impl Into<String>) -> Self {
        self.index_key = Some(key.into());
        self
    }

    pub fn with_buffer_size(mut self, b: u64) -> Self {
        self.buffer_size = b;
        self
    }

    pub fn with_growth_factor(mut self, r: u64) -> Self {
        self.growth_factor = r;
        self
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        IndexConfig {
            storage_path: PathBuf::from("./data"),
            buffer_size: 4096,
            growth_factor: 3,
            index_key: None,
            document_queue_capacity: 4096,
            posting_queue_capacity: 65536,
            checkpoint_poll_interval: Duration::from_millis(5),
        }
    }
}
