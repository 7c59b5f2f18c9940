//! Buffer Pool Manager: the pinned-frame page cache between the disk
//! manager and everything that reads or writes pages (the record manager
//! and the B+tree index manager).
//!
//! Frames are identified by `(FileTag, PageId)`. `fetch_page`/`new_page`
//! return a [`FrameGuard`] that doubles as the page's pin: the frame stays
//! resident and non-evictable until the guard is dropped. The frame's
//! `Mutex` also serves as its content latch, so only one guard can be
//! outstanding per page at a time (simpler than the separate pin-count +
//! latch pair a production engine would use, but enough for the
//! single-writer-per-page discipline the lock manager enforces above us).
//!
//! WAL-obedience (spec.md §4.5): before a dirty frame's bytes reach disk,
//! the frame's `page_lsn` is force-flushed through the [`wal::LogManager`]
//! so the log record that produced those bytes is durable first.

#[cfg(test)]
mod tests;

use common::{DbError, DbResult, FileTag, Lsn, PageId};
use disk::{DiskManager, FileId};
use hashbrown::HashMap;
use lru::LruCache;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;

struct Frame {
    page_id: Option<(FileTag, PageId)>,
    data: Vec<u8>,
    pin_count: u32,
    dirty: bool,
    page_lsn: Lsn,
}

impl Frame {
    fn empty(page_size: usize) -> Self {
        Self {
            page_id: None,
            data: vec![0u8; page_size],
            pin_count: 0,
            dirty: false,
            page_lsn: Lsn::INVALID,
        }
    }
}

/// Tracks which frames are currently evictable (pin_count == 0), LRU order.
struct Replacer {
    lru: LruCache<usize, ()>,
}

impl Replacer {
    fn new() -> Self {
        Self {
            lru: LruCache::unbounded(),
        }
    }

    fn pin(&mut self, idx: usize) {
        self.lru.pop(&idx);
    }

    fn unpin(&mut self, idx: usize) {
        self.lru.put(idx, ());
    }

    fn victim(&mut self) -> Option<usize> {
        self.lru.pop_lru().map(|(idx, _)| idx)
    }
}

/// The Buffer Pool Manager.
pub struct BufferPoolManager {
    disk: Arc<DiskManager>,
    log: Option<Arc<wal::LogManager>>,
    base_dir: PathBuf,
    page_size: usize,
    frames: Vec<Mutex<Frame>>,
    page_table: Mutex<HashMap<(FileTag, PageId), usize>>,
    free_list: Mutex<Vec<usize>>,
    replacer: Mutex<Replacer>,
    files: Mutex<HashMap<FileTag, FileId>>,
}

/// A pinned, latched page frame. Deref-like accessors expose the raw bytes;
/// the pin is released automatically when the guard drops.
pub struct FrameGuard<'a> {
    pool: &'a BufferPoolManager,
    idx: usize,
    guard: parking_lot::MutexGuard<'a, Frame>,
}

impl<'a> FrameGuard<'a> {
    pub fn data(&self) -> &[u8] {
        &self.guard.data
    }

    /// Mutable access. Marks the frame dirty; pair with `set_page_lsn` so
    /// the WAL-obedience check has something to force-flush against.
    pub fn data_mut(&mut self) -> &mut [u8] {
        self.guard.dirty = true;
        &mut self.guard.data
    }

    pub fn set_page_lsn(&mut self, lsn: Lsn) {
        self.guard.page_lsn = lsn;
    }

    pub fn page_lsn(&self) -> Lsn {
        self.guard.page_lsn
    }

    pub fn page_id(&self) -> PageId {
        self.guard.page_id.expect("frame guard always has a page").1
    }

    pub fn mark_dirty(&mut self) {
        self.guard.dirty = true;
    }
}

impl Drop for FrameGuard<'_> {
    fn drop(&mut self) {
        self.guard.pin_count = self.guard.pin_count.saturating_sub(1);
        if self.guard.pin_count == 0 {
            self.pool.replacer.lock().unpin(self.idx);
        }
    }
}

impl BufferPoolManager {
    pub fn new(
        base_dir: impl Into<PathBuf>,
        page_size: usize,
        pool_size: usize,
        disk: Arc<DiskManager>,
        log: Option<Arc<wal::LogManager>>,
    ) -> DbResult<Self> {
        assert!(pool_size > 0, "pool_size must be > 0");
        let base_dir = base_dir.into();
        DiskManager::create_dir(&base_dir)?;
        let frames = (0..pool_size).map(|_| Mutex::new(Frame::empty(page_size))).collect();
        Ok(Self {
            disk,
            log,
            base_dir,
            page_size,
            frames,
            page_table: Mutex::new(HashMap::new()),
            free_list: Mutex::new((0..pool_size).collect()),
            replacer: Mutex::new(Replacer::new()),
            files: Mutex::new(HashMap::new()),
        })
    }

    fn file_id_for(&self, tag: FileTag) -> DbResult<FileId> {
        let mut files = self.files.lock();
        if let Some(&fid) = files.get(&tag) {
            return Ok(fid);
        }
        let path = self.base_dir.join(tag.file_name());
        if !DiskManager::is_file(&path) {
            self.disk.create_file(&path)?;
        }
        let fid = self.disk.open_file(&path)?;
        let page_count = self.disk.file_size(fid)? / self.page_size as u64;
        self.disk.set_next_page(fid, page_count)?;
        files.insert(tag, fid);
        Ok(fid)
    }

    fn find_victim(&self) -> DbResult<usize> {
        if let Some(idx) = self.free_list.lock().pop() {
            return Ok(idx);
        }
        self.replacer
            .lock()
            .victim()
            .ok_or(DbError::BufferPoolFull)
    }

    fn writeback(&self, frame: &mut Frame) -> DbResult<()> {
        if !frame.dirty {
            return Ok(());
        }
        if let Some((tag, pid)) = frame.page_id {
            if let Some(log) = &self.log {
                log.force_flush(frame.page_lsn)?;
            }
            let fid = self.file_id_for(tag)?;
            self.disk.write_page(fid, pid.0, &frame.data)?;
            frame.dirty = false;
        }
        Ok(())
    }

    /// Fetch an existing page, loading it from disk into a free/evicted
    /// frame if it isn't already resident.
    pub fn fetch_page(&self, tag: FileTag, pid: PageId) -> DbResult<FrameGuard<'_>> {
        loop {
            let existing = self.page_table.lock().get(&(tag, pid)).copied();
            if let Some(idx) = existing {
                let mut guard = self.frames[idx].lock();
                if guard.page_id != Some((tag, pid)) {
                    continue; // raced with an eviction; retry
                }
                guard.pin_count += 1;
                self.replacer.lock().pin(idx);
                return Ok(FrameGuard {
                    pool: self,
                    idx,
                    guard,
                });
            }

            let idx = self.find_victim()?;
            let mut guard = self.frames[idx].lock();
            self.writeback(&mut guard)?;
            if let Some(old_key) = guard.page_id.take() {
                self.page_table.lock().remove(&old_key);
            }

            let fid = self.file_id_for(tag)?;
            let data = self.disk.read_page(fid, pid.0, self.page_size)?;
            guard.data = data;
            guard.page_id = Some((tag, pid));
            guard.dirty = false;
            guard.pin_count = 1;
            guard.page_lsn = Lsn::INVALID;
            self.page_table.lock().insert((tag, pid), idx);
            self.replacer.lock().pin(idx);
            return Ok(FrameGuard {
                pool: self,
                idx,
                guard,
            });
        }
    }

    /// Allocate a brand-new page, zero-initialize it, and return it pinned.
    pub fn new_page(&self, tag: FileTag) -> DbResult<(PageId, FrameGuard<'_>)> {
        let fid = self.file_id_for(tag)?;
        let pid = self.disk.allocate_page(fid)?;

        let idx = self.find_victim()?;
        let mut guard = self.frames[idx].lock();
        self.writeback(&mut guard)?;
        if let Some(old_key) = guard.page_id.take() {
            self.page_table.lock().remove(&old_key);
        }

        guard.data = vec![0u8; self.page_size];
        guard.page_id = Some((tag, pid));
        guard.dirty = false;
        guard.pin_count = 1;
        guard.page_lsn = Lsn::INVALID;
        self.disk.write_page(fid, pid.0, &guard.data)?;
        self.page_table.lock().insert((tag, pid), idx);
        self.replacer.lock().pin(idx);

        Ok((
            pid,
            FrameGuard {
                pool: self,
                idx,
                guard,
            },
        ))
    }

    /// Force a page to disk regardless of pin state. No-op if not resident.
    pub fn flush_page(&self, tag: FileTag, pid: PageId) -> DbResult<()> {
        let idx = match self.page_table.lock().get(&(tag, pid)).copied() {
            Some(idx) => idx,
            None => return Ok(()),
        };
        let mut guard = self.frames[idx].lock();
        if guard.page_id == Some((tag, pid)) {
            self.writeback(&mut guard)?;
        }
        Ok(())
    }

    /// Flush every dirty resident frame belonging to `tag`.
    pub fn flush_all(&self, tag: FileTag) -> DbResult<()> {
        for frame in &self.frames {
            let mut guard = frame.lock();
            if guard.page_id.map(|(t, _)| t) == Some(tag) {
                self.writeback(&mut guard)?;
            }
        }
        Ok(())
    }

    /// Remove a page from the pool. Errors if it is still pinned.
    pub fn delete_page(&self, tag: FileTag, pid: PageId) -> DbResult<()> {
        let idx = match self.page_table.lock().get(&(tag, pid)).copied() {
            Some(idx) => idx,
            None => return Ok(()),
        };
        let mut guard = self.frames[idx].lock();
        if guard.page_id != Some((tag, pid)) {
            return Ok(());
        }
        if guard.pin_count != 0 {
            return Err(DbError::Storage(format!(
                "cannot delete pinned page {pid:?}"
            )));
        }
        self.page_table.lock().remove(&(tag, pid));
        *guard = Frame::empty(self.page_size);
        self.free_list.lock().push(idx);
        Ok(())
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }
}
