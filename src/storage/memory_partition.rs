use crate::codec::{self, PostingHeader};
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{DocId, DocIdTermInstanceTable, InternalTermId, TermInstance};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// In-RAM head partition (C3). Absorbs every posting until its instance
/// count reaches `term_instance_limit`, then is cascaded into an external
/// partition by the growth strategy.
pub struct MemoryPartition {
    path: Option<PathBuf>,
    index_key: Option<String>,
    term_instance_limit: Option<u64>,
    term_hash: HashMap<InternalTermId, DocIdTermInstanceTable>,
}

#[derive(Serialize, Deserialize)]
struct Checkpoint {
    term_instance_limit: Option<u64>,
    index_key: Option<String>,
    tables: Vec<(InternalTermId, Vec<(DocId, Vec<(u32, u32)>)>)>,
}

impl MemoryPartition {
    pub fn new(term_instance_limit: Option<u64>) -> Self {
        MemoryPartition {
            path: None,
            index_key: None,
            term_instance_limit,
            term_hash: HashMap::new(),
        }
    }

    /// Opens (or creates) a memory partition mirrored to `path`. If
    /// `index_key` is supplied and a checkpoint already exists with a
    /// different key, this is a fatal `KeyMismatch`.
    pub fn open(path: impl AsRef<Path>, index_key: Option<String>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut partition = MemoryPartition {
            path: Some(path.clone()),
            index_key: index_key.clone(),
            term_instance_limit: None,
            term_hash: HashMap::new(),
        };

        if path.exists() {
            let bytes = std::fs::read(&path)?;
            let checkpoint: Checkpoint = bincode::deserialize(&bytes).map_err(|e| {
                eprintln!("MemoryPartition: corrupt checkpoint at {:?}: {e}", path);
                Error::new(ErrorKind::CorruptMetadata, e.to_string())
            })?;

            if let (Some(expected), Some(found)) = (&index_key, &checkpoint.index_key) {
                if expected != found {
                    return Err(Error::new(
                        ErrorKind::KeyMismatch,
                        format!("MemoryPartition {:?} expected key {:?}, found {:?}", path, expected, found),
                    ));
                }
            }

            partition.term_instance_limit = checkpoint.term_instance_limit;
            partition.index_key = checkpoint.index_key;
            for (term_id, docs) in checkpoint.tables {
                let mut table = DocIdTermInstanceTable::new();
                for (doc_id, instances) in docs {
                    for (position, extent) in instances {
                        table.insert(doc_id, TermInstance::new(position, extent));
                    }
                }
                partition.term_hash.insert(term_id, table);
            }
        }

        Ok(partition)
    }

    pub fn write_to_disk(&self) -> Result<()> {
        let Some(path) = &self.path else { return Ok(()) };
        let tables = self
            .term_hash
            .iter()
            .map(|(term_id, table)| {
                let docs = table
                    .doc_hash
                    .iter()
                    .map(|(doc_id, instances)| {
                        (*doc_id, instances.iter().map(|i| (i.position, i.extent)).collect())
                    })
                    .collect();
                (*term_id, docs)
            })
            .collect();

        let checkpoint = Checkpoint {
            term_instance_limit: self.term_instance_limit,
            index_key: self.index_key.clone(),
            tables,
        };
        let bytes = bincode::serialize(&checkpoint)?;
        std::fs::write(path, bytes)?;
        Ok(())
    }

    pub fn set_term_instance_limit(&mut self, limit: u64) {
        if self.term_instance_limit.is_none() {
            self.term_instance_limit = Some(limit);
        }
    }

    pub fn term_instance_count(&self) -> u64 {
        self.term_hash.values().map(|t| t.term_instance_count()).sum()
    }

    pub fn reached_limit(&self) -> bool {
        match self.term_instance_limit {
            Some(limit) => self.term_instance_count() >= limit,
            None => false,
        }
    }

    pub fn add(&mut self, term_id: InternalTermId, doc_id: DocId, position: u32, extent: u32) {
        self.term_hash
            .entry(term_id)
            .or_insert_with(DocIdTermInstanceTable::new)
            .insert(doc_id, TermInstance::new(position, extent));
    }

    pub fn lookup(&self, term_id: InternalTermId) -> Vec<(DocId, Vec<TermInstance>)> {
        match self.term_hash.get(&term_id) {
            Some(table) => table
                .doc_hash
                .iter()
                .map(|(doc_id, instances)| {
                    let mut sorted: Vec<TermInstance> = instances.iter().copied().collect();
                    sorted.sort();
                    (*doc_id, sorted)
                })
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn delete_term(&mut self, term_id: InternalTermId) {
        self.term_hash.remove(&term_id);
    }

    pub fn delete_doc(&mut self, term_id: InternalTermId, doc_id: DocId) {
        if let Some(table) = self.term_hash.get_mut(&term_id) {
            table.delete_doc(doc_id);
        }
    }

    /// All term keys currently present, e.g. for merge planning.
    pub fn term_ids(&self) -> impl Iterator<Item = &InternalTermId> {
        self.term_hash.keys()
    }

    pub fn contains(&self, term_id: InternalTermId) -> bool {
        self.term_hash.contains_key(&term_id)
    }

    pub fn estimate_size(&self) -> u64 {
        self.term_hash.values().map(codec::estimate_size).sum()
    }

    pub fn compress_term(&self, term_id: InternalTermId) -> Option<(PostingHeader, Vec<u8>)> {
        self.term_hash.get(&term_id).map(codec::encode)
    }

    /// Clears all in-memory postings and removes the backing checkpoint
    /// file, if any. Called by the growth strategy once a merge has
    /// absorbed this partition's data.
    pub fn zero_all_data(&mut self) -> Result<()> {
        self.term_hash.clear();
        if let Some(path) = &self.path {
            if path.exists() {
                std::fs::remove_file(path)?;
            }
        }
        Ok(())
    }
}

impl crate::storage::MergeSource for MemoryPartition {
    fn contains(&self, term_id: InternalTermId) -> bool {
        MemoryPartition::contains(self, term_id)
    }

    fn term_ids(&self) -> Vec<InternalTermId> {
        self.term_hash.keys().copied().collect()
    }

    fn raw_region(&self, term_id: InternalTermId) -> Option<(PostingHeader, Vec<u8>)> {
        self.compress_term(term_id)
    }

    fn decode_term(&self, term_id: InternalTermId) -> Option<DocIdTermInstanceTable> {
        self.term_hash.get(&term_id).cloned()
    }

    fn drop_term(&mut self, term_id: InternalTermId) {
        self.delete_term(term_id);
    }

    fn estimate_size_on_disk(&self) -> u64 {
        self.estimate_size()
    }
}
