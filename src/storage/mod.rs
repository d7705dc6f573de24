pub mod external_partition;
pub mod growth_strategy;
pub mod memory_partition;
pub mod mmap_file;

use crate::codec::PostingHeader;
use crate::core::types::{DocIdTermInstanceTable, InternalTermId};

/// Uniform view over a partition as a contributor to an external-partition
/// merge (C4). Implemented by both `MemoryPartition` and `ExternalPartition`
/// so the merge algorithm does not care which kind of partition it is
/// folding in.
pub trait MergeSource {
    fn contains(&self, term_id: InternalTermId) -> bool;
    fn term_ids(&self) -> Vec<InternalTermId>;
    /// The term's packed bytes plus header, copied out verbatim (for
    /// `MemoryPartition` this means encoding on demand).
    fn raw_region(&self, term_id: InternalTermId) -> Option<(PostingHeader, Vec<u8>)>;
    fn decode_term(&self, term_id: InternalTermId) -> Option<DocIdTermInstanceTable>;
    fn drop_term(&mut self, term_id: InternalTermId);
    fn estimate_size_on_disk(&self) -> u64;
}
