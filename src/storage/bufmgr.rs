//! Buffer manager: a fixed pool of block-sized frames between callers and
//! the segment files.
//!
//! ## Actor Model
//!
//! One owning thread serializes everything that touches shared pool state:
//! the tag lookup table, pin and usage counts, the clock-sweep hand, and
//! all segment I/O. Callers talk to it over a request channel and block on
//! a per-request reply channel. Page content is the one thing callers
//! touch directly, through the per-frame reader/writer lock of a frame
//! they hold pinned.
//!
//! ```text
//!  caller threads                     bufmgr thread
//!  ──────────────                     ─────────────
//!  read_buffer(tag) ──── Request ───▶ lookup / clock sweep
//!       ▲                             write back victim if dirty
//!       │                             segment read or extend
//!       └───────────── reply ──────── pin, install tag
//!
//!  Buffer::page_write() ──────▶ per-frame RwLock (no actor involved)
//!  drop(Buffer) ────── Release ─────▶ unpin
//! ```
//!
//! ## Pin/Eviction Protocol
//!
//! A pinned frame (`ref_count > 0`) is immune from eviction. The clock
//! sweep walks the descriptor array: pinned frames cost one of its N
//! tries, frames with a positive usage count are aged for free, and the
//! first unpinned frame with a zero usage count is the victim. Every pin
//! bumps the usage count up to [`MAX_USAGE_COUNT`], so a frame survives
//! roughly that many sweep passes after its last use.
//!
//! ## Extend Sentinel
//!
//! Passing [`NEW_BLOCK`] asks the manager to append a zero-filled block at
//! the relation's current end and return it pinned; the assigned block
//! number is available on the returned handle.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use std::thread;

use hashbrown::HashMap;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

use crate::config::{BLOCK_SIZE, MAX_USAGE_COUNT};
use crate::storage::page::Page;
use crate::storage::smgr::SegmentManager;
use crate::storage::Block;
use crate::system::{BlockNumber, RelFileNode, StoreError, INVALID_BLOCK_NUMBER};

/// Block-number sentinel: read the relation's next new block instead of an
/// existing one.
pub const NEW_BLOCK: BlockNumber = INVALID_BLOCK_NUMBER;

/// Identity of a block in the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferTag {
    pub node: RelFileNode,
    pub block: BlockNumber,
}

struct Frame {
    data: RwLock<Box<Block>>,
    dirty: AtomicBool,
}

impl Frame {
    fn new() -> Self {
        Self {
            data: RwLock::new(Box::new([0u8; BLOCK_SIZE])),
            dirty: AtomicBool::new(false),
        }
    }
}

/// Administrative state of one frame. Only the manager thread reads or
/// writes descriptors.
#[derive(Default)]
struct FrameDesc {
    tag: Option<BufferTag>,
    ref_count: u32,
    usage_count: u16,
    valid: bool,
}

enum Request {
    Read {
        tag: BufferTag,
        reply: Sender<eyre::Result<(usize, BufferTag)>>,
    },
    Release {
        frame: usize,
    },
    RefCount {
        tag: BufferTag,
        reply: Sender<Option<u32>>,
    },
    NBlocks {
        node: RelFileNode,
        reply: Sender<eyre::Result<BlockNumber>>,
    },
}

pub struct BufferManager {
    frames: Arc<Vec<Frame>>,
    req_tx: Sender<Request>,
}

impl BufferManager {
    /// Creates a pool of `n_buffers` frames over relation files resolved
    /// against `data_dir`, and starts the owning thread.
    pub fn new(data_dir: impl Into<PathBuf>, n_buffers: usize) -> Self {
        assert!(n_buffers > 0, "buffer pool needs at least one frame");
        let frames: Arc<Vec<Frame>> = Arc::new((0..n_buffers).map(|_| Frame::new()).collect());
        let (req_tx, req_rx) = channel();

        let state = ManagerState {
            frames: Arc::clone(&frames),
            descs: (0..n_buffers).map(|_| FrameDesc::default()).collect(),
            lookup: HashMap::new(),
            next_victim: 0,
            smgr: SegmentManager::new(data_dir),
        };
        thread::Builder::new()
            .name("heapstore-bufmgr".into())
            .spawn(move || state.run(req_rx))
            .expect("failed to spawn buffer manager thread");

        Self { frames, req_tx }
    }

    /// Returns the requested block pinned. `NEW_BLOCK` extends the
    /// relation by one zero-filled block instead. The pin lasts until the
    /// handle is released or dropped.
    pub fn read_buffer(&self, node: RelFileNode, block: BlockNumber) -> eyre::Result<Buffer> {
        let (reply_tx, reply_rx) = channel();
        self.req_tx
            .send(Request::Read {
                tag: BufferTag { node, block },
                reply: reply_tx,
            })
            .map_err(|_| StoreError::internal("buffer manager has shut down"))?;
        let (frame, tag) = reply_rx
            .recv()
            .map_err(|_| StoreError::internal("buffer manager dropped a read request"))??;
        Ok(Buffer {
            frames: Arc::clone(&self.frames),
            req_tx: self.req_tx.clone(),
            frame,
            tag,
        })
    }

    /// Unpins a buffer. Dropping the handle has the same effect; this form
    /// exists so call sites can make the hand-back explicit.
    pub fn release_buffer(&self, buf: Buffer) {
        drop(buf);
    }

    /// Current pin count of the block, if it is resident.
    pub fn ref_count(&self, node: RelFileNode, block: BlockNumber) -> Option<u32> {
        let (reply_tx, reply_rx) = channel();
        self.req_tx
            .send(Request::RefCount {
                tag: BufferTag { node, block },
                reply: reply_tx,
            })
            .ok()?;
        reply_rx.recv().ok().flatten()
    }

    /// Current block count of a relation file, routed through the manager
    /// so it is ordered against in-flight extends.
    pub fn nblocks(&self, node: RelFileNode) -> eyre::Result<BlockNumber> {
        let (reply_tx, reply_rx) = channel();
        self.req_tx
            .send(Request::NBlocks {
                node,
                reply: reply_tx,
            })
            .map_err(|_| StoreError::internal("buffer manager has shut down"))?;
        reply_rx
            .recv()
            .map_err(|_| StoreError::internal("buffer manager dropped a block count request"))?
    }

    pub fn n_frames(&self) -> usize {
        self.frames.len()
    }
}

/// A pinned view of one frame. Page content is reached through the frame's
/// reader/writer lock; the pin guarantees the frame cannot be evicted or
/// retagged underneath the holder.
pub struct Buffer {
    frames: Arc<Vec<Frame>>,
    req_tx: Sender<Request>,
    frame: usize,
    tag: BufferTag,
}

impl std::fmt::Debug for Buffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buffer")
            .field("frame", &self.frame)
            .field("tag", &self.tag)
            .finish()
    }
}

impl Buffer {
    pub fn node(&self) -> RelFileNode {
        self.tag.node
    }

    /// The block this buffer holds. For an extend request this is the
    /// block number the manager assigned.
    pub fn block(&self) -> BlockNumber {
        self.tag.block
    }

    /// Takes the frame's shared lock and exposes the block as a page.
    pub fn page_read(&self) -> Page<FrameReadGuard<'_>> {
        Page::new(FrameReadGuard(self.frames[self.frame].data.read()))
    }

    /// Takes the frame's exclusive lock and exposes the block as a page.
    pub fn page_write(&self) -> Page<FrameWriteGuard<'_>> {
        Page::new(FrameWriteGuard(self.frames[self.frame].data.write()))
    }

    /// Flags the frame so eviction writes it back before reuse.
    pub fn mark_dirty(&self) {
        self.frames[self.frame].dirty.store(true, Ordering::Release);
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        let _ = self.req_tx.send(Request::Release { frame: self.frame });
    }
}

pub struct FrameReadGuard<'a>(RwLockReadGuard<'a, Box<Block>>);

impl AsRef<[u8]> for FrameReadGuard<'_> {
    fn as_ref(&self) -> &[u8] {
        &self.0[..]
    }
}

pub struct FrameWriteGuard<'a>(RwLockWriteGuard<'a, Box<Block>>);

impl AsRef<[u8]> for FrameWriteGuard<'_> {
    fn as_ref(&self) -> &[u8] {
        &self.0[..]
    }
}

impl AsMut<[u8]> for FrameWriteGuard<'_> {
    fn as_mut(&mut self) -> &mut [u8] {
        &mut self.0[..]
    }
}

struct ManagerState {
    frames: Arc<Vec<Frame>>,
    descs: Vec<FrameDesc>,
    lookup: HashMap<BufferTag, usize>,
    next_victim: usize,
    smgr: SegmentManager,
}

impl ManagerState {
    fn run(mut self, req_rx: Receiver<Request>) {
        while let Ok(request) = req_rx.recv() {
            match request {
                Request::Read { tag, reply } => {
                    let result = self.read_buffer(tag);
                    if let Err(std::sync::mpsc::SendError(Ok((frame, _)))) = reply.send(result) {
                        // the caller went away; give back its pin
                        self.unpin(frame);
                    }
                }
                Request::Release { frame } => self.unpin(frame),
                Request::RefCount { tag, reply } => {
                    let count = self.lookup.get(&tag).map(|&idx| self.descs[idx].ref_count);
                    let _ = reply.send(count);
                }
                Request::NBlocks { node, reply } => {
                    let _ = reply.send(self.smgr.nblocks(node));
                }
            }
        }
    }

    fn read_buffer(&mut self, mut tag: BufferTag) -> eyre::Result<(usize, BufferTag)> {
        let is_extend = tag.block == NEW_BLOCK;
        if is_extend {
            tag.block = self.smgr.nblocks(tag.node)?;
        }

        let (idx, found) = self.alloc_buffer(tag)?;
        if found {
            if !is_extend && self.descs[idx].valid {
                return Ok((idx, tag));
            }
            // An extend that hit a resident block, or a frame whose last
            // fill never completed: refill it below.
            self.descs[idx].valid = false;
        }

        let fill_result = {
            let mut data = self.frames[idx].data.write();
            if is_extend {
                data.fill(0);
                self.smgr.extend(tag.node, tag.block, &data)
            } else {
                self.smgr.read(tag.node, tag.block, &mut data)
            }
        };
        if let Err(err) = fill_result {
            self.unpin(idx);
            self.descs[idx].valid = false;
            self.lookup.remove(&tag);
            return Err(err);
        }

        self.descs[idx].valid = true;
        Ok((idx, tag))
    }

    /// Finds or claims a frame for the tag. The returned frame is pinned
    /// and registered under the tag; `found` tells the caller whether the
    /// content is already resident.
    fn alloc_buffer(&mut self, tag: BufferTag) -> eyre::Result<(usize, bool)> {
        if let Some(&idx) = self.lookup.get(&tag) {
            self.pin(idx);
            return Ok((idx, true));
        }

        let idx = self.sweep()?;
        self.pin(idx);

        if self.frames[idx].dirty.load(Ordering::Acquire) {
            if let Err(err) = self.write_frame(idx) {
                self.unpin(idx);
                return Err(err);
            }
        }

        if let Some(old_tag) = self.descs[idx].tag.take() {
            self.lookup.remove(&old_tag);
        }
        self.lookup.insert(tag, idx);

        let desc = &mut self.descs[idx];
        desc.tag = Some(tag);
        desc.valid = false;
        // A renamed frame restarts at usage 1: enough to survive exactly
        // one sweep pass before it becomes a candidate again.
        desc.usage_count = 1;
        self.frames[idx].dirty.store(false, Ordering::Release);

        Ok((idx, false))
    }

    /// Clock sweep. Pinned frames consume one of the N tries; aging a
    /// usage count is free. Fails when N tries run out.
    fn sweep(&mut self) -> eyre::Result<usize> {
        let n = self.descs.len();
        let mut tries = n;
        while tries > 0 {
            let idx = self.next_victim;
            self.next_victim = (self.next_victim + 1) % n;

            let desc = &mut self.descs[idx];
            if desc.ref_count == 0 {
                if desc.usage_count > 0 {
                    desc.usage_count -= 1;
                } else {
                    return Ok(idx);
                }
            } else {
                tries -= 1;
            }
        }
        Err(StoreError::resource_exhaustion("no unpinned buffers available").into())
    }

    /// Writes a dirty frame back under its current tag.
    fn write_frame(&mut self, idx: usize) -> eyre::Result<()> {
        let tag = self.descs[idx]
            .tag
            .ok_or_else(|| StoreError::internal("dirty frame has no tag"))?;
        debug!(block = tag.block, "writing back dirty frame before reuse");
        let data = self.frames[idx].data.read();
        self.smgr.write(tag.node, tag.block, &data)?;
        self.frames[idx].dirty.store(false, Ordering::Release);
        Ok(())
    }

    fn pin(&mut self, idx: usize) {
        let desc = &mut self.descs[idx];
        desc.ref_count += 1;
        if desc.usage_count < MAX_USAGE_COUNT {
            desc.usage_count += 1;
        }
    }

    fn unpin(&mut self, idx: usize) {
        let desc = &mut self.descs[idx];
        debug_assert!(desc.ref_count > 0, "unpin of an unpinned frame");
        desc.ref_count = desc.ref_count.saturating_sub(1);
    }
}
