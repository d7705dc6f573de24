//! Packed byte layout for a per-term posting table (C1/C2).
//!
//! A table serializes to a concatenation, in ascending DocId order, of
//! per-document blocks:
//!
//! ```text
//! skipOffset : u32 (BE)   -- byte distance from docId to the next block
//! docId      : u32 (BE)
//! pos_0, ext_0, pos_1, ext_1, ... pos_{n-1}, ext_{n-1} : u32 (BE) each
//! ```
//!
//! No compression is applied; this is the "identity" codec. The reader works
//! identically whether `bytes` is sourced from a `Vec<u8>` or a memory map.

use crate::core::types::{DocId, DocIdTermInstanceTable, TermInstance};

const SKIP_OFFSET_LEN: usize = 4;
const DOC_ID_LEN: usize = 4;
const FIELD_LEN: usize = 4;

/// Location and cardinality of a posting table packed into a region of a
/// partition's backing bytes.
#[derive(Debug, Clone, Copy, Default, serde::Serialize, serde::Deserialize)]
pub struct PostingHeader {
    pub offset: u64,
    pub length: u64,
    pub doc_id_count: u64,
    pub term_instance_count: u64,
}

/// Encode `table` into the packed byte layout, returning the bytes plus a
/// header describing them. DocIds are visited ascending; each doc's
/// TermInstances are visited ascending by position.
pub fn encode(table: &DocIdTermInstanceTable) -> (PostingHeader, Vec<u8>) {
    let mut out = Vec::new();
    let mut term_instance_count = 0u64;

    for (doc_id, instances) in &table.doc_hash {
        let mut sorted: Vec<TermInstance> = instances.iter().copied().collect();
        sorted.sort();

        let skip_offset = (DOC_ID_LEN + sorted.len() * 2 * FIELD_LEN) as u32;
        out.extend_from_slice(&skip_offset.to_be_bytes());
        out.extend_from_slice(&doc_id.0.to_be_bytes());
        for instance in &sorted {
            out.extend_from_slice(&instance.position.to_be_bytes());
            out.extend_from_slice(&instance.extent.to_be_bytes());
        }
        term_instance_count += sorted.len() as u64;
    }

    let header = PostingHeader {
        offset: 0,
        length: out.len() as u64,
        doc_id_count: table.doc_count(),
        term_instance_count,
    };
    (header, out)
}

/// A single document's instances, read lazily from a packed region. Cheap to
/// construct; decoding happens as the iterator is consumed.
pub struct InstanceReader<'a> {
    bytes: &'a [u8],
}

impl<'a> Iterator for InstanceReader<'a> {
    type Item = TermInstance;

    fn next(&mut self) -> Option<TermInstance> {
        if self.bytes.len() < 2 * FIELD_LEN {
            return None;
        }
        let position = u32::from_be_bytes(self.bytes[0..4].try_into().unwrap());
        let extent = u32::from_be_bytes(self.bytes[4..8].try_into().unwrap());
        self.bytes = &self.bytes[2 * FIELD_LEN..];
        Some(TermInstance::new(position, extent))
    }
}

/// Iterates the `(docId, TermInstance sequence)` blocks of one packed
/// region, identically whether `bytes` came from a `Vec<u8>` or a mapped
/// slice.
pub struct BlockReader<'a> {
    bytes: &'a [u8],
    cursor: usize,
}

impl<'a> BlockReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        BlockReader { bytes, cursor: 0 }
    }
}

impl<'a> Iterator for BlockReader<'a> {
    type Item = (DocId, InstanceReader<'a>);

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor + SKIP_OFFSET_LEN + DOC_ID_LEN > self.bytes.len() {
            return None;
        }
        let skip_offset = u32::from_be_bytes(
            self.bytes[self.cursor..self.cursor + SKIP_OFFSET_LEN]
                .try_into()
                .unwrap(),
        ) as usize;
        let doc_id_start = self.cursor + SKIP_OFFSET_LEN;
        let doc_id = u32::from_be_bytes(
            self.bytes[doc_id_start..doc_id_start + DOC_ID_LEN]
                .try_into()
                .unwrap(),
        );
        let instances_start = doc_id_start + DOC_ID_LEN;
        let instances_end = doc_id_start + skip_offset;
        let instance_bytes = &self.bytes[instances_start..instances_end];
        self.cursor = instances_end;
        Some((DocId(doc_id), InstanceReader { bytes: instance_bytes }))
    }
}

/// Upper-bound size estimate for a table's packed encoding, per §4.1:
/// `Σ_docs (8 + 8·|postings|)`.
pub fn estimate_size(table: &DocIdTermInstanceTable) -> u64 {
    table
        .doc_hash
        .values()
        .map(|instances| 8 + 8 * instances.len() as u64)
        .sum()
}

/// Decode an entire packed region back into an in-memory table. Used by the
/// merge path when more than one source contributes to a term.
pub fn decode_into(bytes: &[u8], table: &mut DocIdTermInstanceTable) {
    for (doc_id, instances) in BlockReader::new(bytes) {
        for instance in instances {
            table.insert(doc_id, instance);
        }
    }
}
