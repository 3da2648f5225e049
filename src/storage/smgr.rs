//! Segment manager: block-granular file I/O for relations.
//!
//! Each relation is backed by exactly one file, resolved against the data
//! directory by [`rel_path`]. All transfers move whole blocks at
//! block-aligned positions, and a relation file is valid only when its
//! size is a whole multiple of the block size.
//!
//! File handles are opened lazily and cached, at most one per relation.
//! Files are created by the integration layer, never here; a missing file
//! surfaces as an I/O error carrying the operating system's message.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use hashbrown::HashMap;
use tracing::debug;

use crate::config::BLOCK_SIZE;
use crate::storage::Block;
use crate::system::{rel_path, BlockNumber, RelFileNode, StoreError};

struct SegmentFile {
    path: PathBuf,
    file: Option<File>,
}

impl SegmentFile {
    fn open(&mut self) -> eyre::Result<&mut File> {
        if self.file.is_none() {
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .open(&self.path)
                .map_err(|e| {
                    StoreError::io(format!("could not open \"{}\": {}", self.path.display(), e))
                })?;
            self.file = Some(file);
        }
        Ok(self.file.as_mut().unwrap())
    }
}

pub struct SegmentManager {
    base: PathBuf,
    relations: HashMap<RelFileNode, SegmentFile>,
}

impl SegmentManager {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self {
            base: base.into(),
            relations: HashMap::new(),
        }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    fn relation(&mut self, node: RelFileNode) -> eyre::Result<&mut SegmentFile> {
        if !self.relations.contains_key(&node) {
            let path = rel_path(&self.base, node)?;
            self.relations.insert(node, SegmentFile { path, file: None });
        }
        Ok(self.relations.get_mut(&node).unwrap())
    }

    /// Number of blocks in the relation file.
    pub fn nblocks(&mut self, node: RelFileNode) -> eyre::Result<BlockNumber> {
        let segment = self.relation(node)?;
        let meta = std::fs::metadata(&segment.path).map_err(|e| {
            StoreError::io(format!(
                "could not stat \"{}\": {}",
                segment.path.display(),
                e
            ))
        })?;
        let len = meta.len();
        if len % BLOCK_SIZE as u64 != 0 {
            return Err(StoreError::internal(format!(
                "relation file \"{}\" has size {} which is not a multiple of the block size",
                segment.path.display(),
                len
            ))
            .into());
        }
        Ok((len / BLOCK_SIZE as u64) as BlockNumber)
    }

    /// Reads one block. Reading past the end of the file is an error.
    pub fn read(&mut self, node: RelFileNode, block: BlockNumber, buf: &mut Block) -> eyre::Result<()> {
        let segment = self.relation(node)?;
        let path = segment.path.clone();
        let file = segment.open()?;
        let pos = block as u64 * BLOCK_SIZE as u64;
        file.seek(SeekFrom::Start(pos)).map_err(|e| {
            StoreError::io(format!("could not seek in \"{}\": {}", path.display(), e))
        })?;
        file.read_exact(buf).map_err(|e| {
            StoreError::io(format!(
                "could not read block {} of \"{}\": {}",
                block,
                path.display(),
                e
            ))
        })?;
        Ok(())
    }

    /// Writes one block in place. Never changes the file size.
    pub fn write(&mut self, node: RelFileNode, block: BlockNumber, buf: &Block) -> eyre::Result<()> {
        let segment = self.relation(node)?;
        let path = segment.path.clone();
        let file = segment.open()?;
        let pos = block as u64 * BLOCK_SIZE as u64;
        file.seek(SeekFrom::Start(pos)).map_err(|e| {
            StoreError::io(format!("could not seek in \"{}\": {}", path.display(), e))
        })?;
        file.write_all(buf).map_err(|e| {
            StoreError::io(format!(
                "could not write block {} of \"{}\": {}",
                block,
                path.display(),
                e
            ))
        })?;
        Ok(())
    }

    /// Appends one block at the end of the file. `block` must equal the
    /// current block count.
    pub fn extend(&mut self, node: RelFileNode, block: BlockNumber, buf: &Block) -> eyre::Result<()> {
        let segment = self.relation(node)?;
        let path = segment.path.clone();
        let file = segment.open()?;
        let pos = file.seek(SeekFrom::End(0)).map_err(|e| {
            StoreError::io(format!("could not seek in \"{}\": {}", path.display(), e))
        })?;
        if pos != block as u64 * BLOCK_SIZE as u64 {
            return Err(StoreError::io(format!(
                "could not seek to block {} of \"{}\"",
                block,
                path.display()
            ))
            .into());
        }
        file.write_all(buf).map_err(|e| {
            StoreError::io(format!(
                "could not extend \"{}\" to block {}: {}",
                path.display(),
                block,
                e
            ))
        })?;
        debug!(block, path = %path.display(), "extended relation file");
        Ok(())
    }

    /// Drops the cached handle for a relation, if any.
    pub fn close(&mut self, node: RelFileNode) {
        if let Some(segment) = self.relations.get_mut(&node) {
            segment.file = None;
        }
    }
}
