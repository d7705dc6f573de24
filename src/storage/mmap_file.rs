use crate::core::error::Result;
use memmap2::{Mmap, MmapOptions};
use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// A read-only memory map over a file, plus an independent read-write handle
/// used for size-changing writes. Must be re-created (`remap`) after every
/// write that changes the file's length; the map itself is never mutated in
/// place.
pub struct MmapFile {
    path: PathBuf,
    mmap: Option<Mmap>,
    len: usize,
}

impl MmapFile {
    /// Opens `path` and maps it read-only, creating an empty file first if
    /// it does not yet exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            File::create(&path)?;
        }
        let mut file = MmapFile { path, mmap: None, len: 0 };
        file.remap()?;
        Ok(file)
    }

    /// Re-maps the file from its current on-disk length. Must be called
    /// after any write that changes the file's size.
    pub fn remap(&mut self) -> Result<()> {
        let file = File::open(&self.path)?;
        let len = file.metadata()?.len() as usize;
        self.mmap = if len == 0 {
            None
        } else {
            Some(unsafe { MmapOptions::new().len(len).map(&file)? })
        };
        self.len = len;
        Ok(())
    }

    pub fn data(&self) -> &[u8] {
        match &self.mmap {
            Some(mmap) => &mmap[..],
            None => &[],
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Extends the file by `extra_bytes` via a sparse seek-and-write at the
    /// new end, then re-maps. Does not preserve any notion of "dirty" data
    /// in the grown region; callers must fill it before relying on its
    /// contents.
    pub fn grow(&mut self, extra_bytes: u64) -> Result<u64> {
        let mut file = OpenOptions::new().read(true).write(true).open(&self.path)?;
        let previous_size = file.seek(SeekFrom::End(0))?;
        let new_size = if extra_bytes > 0 {
            file.seek(SeekFrom::Start(previous_size + extra_bytes - 1))?;
            file.write_all(&[0u8])?;
            previous_size + extra_bytes
        } else {
            previous_size
        };
        self.remap()?;
        Ok(new_size)
    }

    /// A read-write handle positioned at the start of the file, used by the
    /// merge path for relocation/append writes.
    pub fn open_read_write(&self) -> Result<File> {
        Ok(OpenOptions::new().read(true).write(true).open(&self.path)?)
    }

    pub fn truncate(&mut self, len: u64) -> Result<()> {
        let file = OpenOptions::new().write(true).open(&self.path)?;
        file.set_len(len)?;
        self.remap()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
