use crate::codec::{self, BlockReader, PostingHeader};
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{DocIdTermInstanceTable, InternalTermId, TermInstance};
use crate::storage::mmap_file::MmapFile;
use crate::storage::MergeSource;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

const METADATA_SUFFIX: &str = ".meta";

#[derive(Default, Serialize, Deserialize)]
struct ExternalMeta {
    term_instance_limit: Option<u64>,
    index_key: Option<String>,
    headers: HashMap<InternalTermId, PostingHeader>,
}

/// On-disk, memory-mapped partition (C4). Owns a packed backing file plus a
/// parallel `.meta` file mapping each term to the region holding its
/// postings.
pub struct ExternalPartition {
    mmap_file: MmapFile,
    meta_path: PathBuf,
    term_instance_limit: Option<u64>,
    index_key: Option<String>,
    headers: HashMap<InternalTermId, PostingHeader>,
}

impl ExternalPartition {
    pub fn open(path: impl AsRef<Path>, index_key: Option<String>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let meta_path = append_suffix(&path, METADATA_SUFFIX);

        let mut meta = ExternalMeta::default();
        if meta_path.exists() {
            let bytes = std::fs::read(&meta_path)?;
            meta = bincode::deserialize(&bytes).map_err(|e| {
                eprintln!("ExternalPartition: corrupt metadata at {:?}: {e}", meta_path);
                Error::new(ErrorKind::CorruptMetadata, e.to_string())
            })?;

            if let (Some(expected), Some(found)) = (&index_key, &meta.index_key) {
                if expected != found {
                    return Err(Error::new(
                        ErrorKind::KeyMismatch,
                        format!("ExternalPartition {:?} expected key {:?}, found {:?}", path, expected, found),
                    ));
                }
            }
        }

        let mmap_file = MmapFile::open(&path)?;

        Ok(ExternalPartition {
            mmap_file,
            meta_path,
            term_instance_limit: meta.term_instance_limit,
            index_key: meta.index_key.or(index_key),
            headers: meta.headers,
        })
    }

    pub fn write_to_disk(&self) -> Result<()> {
        let meta = ExternalMeta {
            term_instance_limit: self.term_instance_limit,
            index_key: self.index_key.clone(),
            headers: self.headers.clone(),
        };
        let bytes = bincode::serialize(&meta)?;
        std::fs::write(&self.meta_path, bytes)?;
        Ok(())
    }

    pub fn set_term_instance_limit(&mut self, limit: u64) {
        self.term_instance_limit = Some(limit);
    }

    pub fn term_instance_count(&self) -> u64 {
        self.headers.values().map(|h| h.term_instance_count).sum()
    }

    pub fn reached_limit(&self) -> bool {
        match self.term_instance_limit {
            Some(limit) => self.term_instance_count() >= limit,
            None => false,
        }
    }

    pub fn contains(&self, term_id: InternalTermId) -> bool {
        self.headers.contains_key(&term_id)
    }

    pub fn lookup(&self, term_id: InternalTermId) -> Vec<(crate::core::types::DocId, Vec<TermInstance>)> {
        let Some(header) = self.headers.get(&term_id) else {
            return Vec::new();
        };
        let region = self.region_bytes(header);
        BlockReader::new(region)
            .map(|(doc_id, instances)| (doc_id, instances.collect()))
            .collect()
    }

    fn region_bytes(&self, header: &PostingHeader) -> &[u8] {
        let start = header.offset as usize;
        let end = start + header.length as usize;
        &self.mmap_file.data()[start..end]
    }

    /// Zeroes the in-memory header map and truncates the backing file to
    /// empty; used by the growth strategy once this partition's data has
    /// been folded into a larger one.
    pub fn zero_all_data(&mut self) -> Result<()> {
        self.headers.clear();
        if self.meta_path.exists() {
            std::fs::remove_file(&self.meta_path)?;
        }
        self.mmap_file.truncate(0)
    }

    /// Folds `sources` into `self`, per the merge algorithm (§4.3):
    /// grow, relocate self's existing regions to the tail, then append
    /// merged regions for every term in `term_id_list` starting from the
    /// front of the file, truncating once done.
    pub fn merge(
        &mut self,
        term_id_list: &[InternalTermId],
        sources: &mut [&mut dyn MergeSource],
    ) -> Result<()> {
        let space_needed: u64 = sources.iter().map(|s| s.estimate_size_on_disk()).sum();
        self.grow(space_needed)?;
        self.relocate_to_tail()?;

        let mut write_file = self.mmap_file.open_read_write()?;
        write_file.seek(SeekFrom::Start(0))?;
        let mut write_offset = 0u64;

        for &term_id in term_id_list {
            let mut holding: Vec<usize> = sources
                .iter()
                .enumerate()
                .filter(|(_, s)| s.contains(term_id))
                .map(|(i, _)| i)
                .collect();
            let self_holds = self.headers.contains_key(&term_id);

            if holding.is_empty() && !self_holds {
                continue;
            }

            let (mut header, bytes) = if holding.len() == 1 && !self_holds {
                let idx = holding.remove(0);
                let (header, bytes) = sources[idx]
                    .raw_region(term_id)
                    .expect("source reported contains() but produced no region");
                sources[idx].drop_term(term_id);
                (header, bytes)
            } else if holding.is_empty() && self_holds {
                // Only self holds it; its bytes already sit at the tail from
                // relocation. Re-read them through the write handle at the
                // relocated offset and re-append in termIdList order.
                let existing = self.headers[&term_id];
                let mut buf = vec![0u8; existing.length as usize];
                write_file.seek(SeekFrom::Start(existing.offset))?;
                write_file.read_exact(&mut buf)?;
                (existing, buf)
            } else {
                let mut table = DocIdTermInstanceTable::new();
                for &idx in &holding {
                    if let Some(decoded) = sources[idx].decode_term(term_id) {
                        merge_table_into(&mut table, decoded);
                    }
                    sources[idx].drop_term(term_id);
                }
                if self_holds {
                    let existing = self.headers[&term_id];
                    let mut buf = vec![0u8; existing.length as usize];
                    write_file.seek(SeekFrom::Start(existing.offset))?;
                    write_file.read_exact(&mut buf)?;
                    let mut decoded = DocIdTermInstanceTable::new();
                    codec::decode_into(&buf, &mut decoded);
                    merge_table_into(&mut table, decoded);
                }
                codec::encode(&table)
            };

            write_file.seek(SeekFrom::Start(write_offset))?;
            write_file.write_all(&bytes)?;
            header.offset = write_offset;
            write_offset += bytes.len() as u64;
            self.headers.insert(term_id, header);
        }

        write_file.set_len(write_offset)?;
        self.mmap_file.remap()?;
        Ok(())
    }

    fn grow(&mut self, extra_bytes: u64) -> Result<()> {
        self.mmap_file.grow(extra_bytes)?;
        Ok(())
    }

    /// Walks existing headers in descending termId order, copying each
    /// region to the moving tail of the file and rewriting its offset.
    fn relocate_to_tail(&mut self) -> Result<()> {
        let mut term_ids: Vec<InternalTermId> = self.headers.keys().copied().collect();
        term_ids.sort_by(|a, b| b.cmp(a));

        let mut read_file = self.mmap_file.open_read_write()?;
        let mut write_file = self.mmap_file.open_read_write()?;
        let mut tail = self.mmap_file.len() as u64;

        for term_id in term_ids {
            let header = self.headers[&term_id];
            let new_offset = tail - header.length;
            relocate_region(&mut read_file, &mut write_file, header.offset, header.length, new_offset)?;
            self.headers.get_mut(&term_id).unwrap().offset = new_offset;
            tail = new_offset;
        }
        Ok(())
    }
}

fn append_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut s = path.as_os_str().to_owned();
    s.push(suffix);
    PathBuf::from(s)
}

fn merge_table_into(dest: &mut DocIdTermInstanceTable, src: DocIdTermInstanceTable) {
    for (doc_id, instances) in src.doc_hash {
        for instance in instances {
            dest.insert(doc_id, instance);
        }
    }
}

/// Copies `length` bytes from `offset` to `dest_offset` within the same
/// file. Ranges that overlap are staged through a single full-region buffer
/// (always correct); disjoint ranges stream through a small fixed buffer to
/// avoid holding large regions in memory (§9 open question 2).
fn relocate_region(
    read_file: &mut std::fs::File,
    write_file: &mut std::fs::File,
    offset: u64,
    length: u64,
    dest_offset: u64,
) -> Result<()> {
    const CHUNK: u64 = 64 * 1024;
    let overlaps = ranges_overlap(offset, length, dest_offset, length);

    if overlaps || length <= CHUNK {
        let mut buf = vec![0u8; length as usize];
        read_file.seek(SeekFrom::Start(offset))?;
        read_file.read_exact(&mut buf)?;
        write_file.seek(SeekFrom::Start(dest_offset))?;
        write_file.write_all(&buf)?;
        return Ok(());
    }

    let mut remaining = length;
    let mut src = offset;
    let mut dst = dest_offset;
    let mut buf = vec![0u8; CHUNK as usize];
    while remaining > 0 {
        let take = remaining.min(CHUNK);
        read_file.seek(SeekFrom::Start(src))?;
        read_file.read_exact(&mut buf[..take as usize])?;
        write_file.seek(SeekFrom::Start(dst))?;
        write_file.write_all(&buf[..take as usize])?;
        src += take;
        dst += take;
        remaining -= take;
    }
    Ok(())
}

fn ranges_overlap(a_start: u64, a_len: u64, b_start: u64, b_len: u64) -> bool {
    a_start < b_start + b_len && b_start < a_start + a_len
}

impl MergeSource for ExternalPartition {
    fn contains(&self, term_id: InternalTermId) -> bool {
        ExternalPartition::contains(self, term_id)
    }

    fn term_ids(&self) -> Vec<InternalTermId> {
        self.headers.keys().copied().collect()
    }

    fn raw_region(&self, term_id: InternalTermId) -> Option<(PostingHeader, Vec<u8>)> {
        self.headers.get(&term_id).map(|header| (*header, self.region_bytes(header).to_vec()))
    }

    fn decode_term(&self, term_id: InternalTermId) -> Option<DocIdTermInstanceTable> {
        let header = self.headers.get(&term_id)?;
        let bytes = self.region_bytes(header);
        let mut table = DocIdTermInstanceTable::new();
        codec::decode_into(bytes, &mut table);
        Some(table)
    }

    fn drop_term(&mut self, term_id: InternalTermId) {
        self.headers.remove(&term_id);
    }

    fn estimate_size_on_disk(&self) -> u64 {
        self.headers.values().map(|h| h.length).sum()
    }
}
