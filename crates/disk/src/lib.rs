//! Disk Manager: the only crate that talks to the filesystem directly.
//!
//! Every other storage component (buffer pool, WAL) goes through a
//! [`DiskManager`] handle rather than opening files itself. Files are
//! addressed by path but operated on through an opaque [`FileId`] obtained
//! from [`DiskManager::open_file`], mirroring a raw file descriptor: reads
//! and writes are positional (`page_no * page_size`) and retry on short
//! I/O, since a single `read`/`write` syscall is not guaranteed to move the
//! full buffer.

use common::{DbError, DbResult, PageId};
use log::{debug, warn};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// Opaque handle to a file opened through a [`DiskManager`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FileId(u32);

struct OpenFile {
    path: PathBuf,
    file: Mutex<File>,
    next_page: AtomicU64,
}

/// Owns every open file descriptor in the engine and serializes access to
/// each one individually, so callers never need their own `Mutex<File>`.
pub struct DiskManager {
    files: RwLock<HashMap<FileId, Arc<OpenFile>>>,
    path_to_id: RwLock<HashMap<PathBuf, FileId>>,
    next_id: AtomicU32,
    log_file: Mutex<Option<Arc<OpenFile>>>,
    log_path: PathBuf,
}

impl DiskManager {
    /// `log_path` is the single shared write-ahead log file for the engine;
    /// it is opened lazily on first `read_log`/`write_log` call.
    pub fn new(log_path: impl Into<PathBuf>) -> Self {
        Self {
            files: RwLock::new(HashMap::new()),
            path_to_id: RwLock::new(HashMap::new()),
            next_id: AtomicU32::new(0),
            log_file: Mutex::new(None),
            log_path: log_path.into(),
        }
    }

    pub fn is_dir(path: &Path) -> bool {
        path.is_dir()
    }

    pub fn is_file(path: &Path) -> bool {
        path.is_file()
    }

    pub fn create_dir(path: &Path) -> DbResult<()> {
        fs::create_dir_all(path)?;
        Ok(())
    }

    pub fn destroy_dir(path: &Path) -> DbResult<()> {
        fs::remove_dir_all(path)?;
        Ok(())
    }

    /// Create a new, empty file. Errors if the file already exists.
    pub fn create_file(&self, path: &Path) -> DbResult<()> {
        OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::AlreadyExists => {
                    DbError::FileExists(path.display().to_string())
                }
                _ => DbError::Io(e),
            })?;
        Ok(())
    }

    /// Delete a file. Errors if the file is still open or does not exist.
    pub fn destroy_file(&self, path: &Path) -> DbResult<()> {
        if self.path_to_id.read().contains_key(path) {
            return Err(DbError::FileNotClosed(path.display().to_string()));
        }
        fs::remove_file(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => DbError::FileNotFound(path.display().to_string()),
            _ => DbError::Io(e),
        })?;
        Ok(())
    }

    /// Open a file for positional reads and writes, returning a handle.
    /// Errors if the file is already open (matches the one-fd-per-path
    /// invariant the buffer pool and WAL rely on).
    pub fn open_file(&self, path: &Path) -> DbResult<FileId> {
        if self.path_to_id.read().contains_key(path) {
            return Err(DbError::FileNotClosed(path.display().to_string()));
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => DbError::FileNotFound(path.display().to_string()),
                _ => DbError::Io(e),
            })?;

        let id = FileId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let open = Arc::new(OpenFile {
            path: path.to_path_buf(),
            file: Mutex::new(file),
            next_page: AtomicU64::new(0),
        });

        self.files.write().insert(id, open);
        self.path_to_id.write().insert(path.to_path_buf(), id);
        debug!("opened {} as {:?}", path.display(), id);
        Ok(id)
    }

    /// Close a previously opened file. Errors if `fid` is not open.
    pub fn close_file(&self, fid: FileId) -> DbResult<()> {
        let open = self
            .files
            .write()
            .remove(&fid)
            .ok_or(DbError::FileNotOpen(format!("{fid:?}")))?;
        self.path_to_id.write().remove(&open.path);
        Ok(())
    }

    fn handle(&self, fid: FileId) -> DbResult<Arc<OpenFile>> {
        self.files
            .read()
            .get(&fid)
            .cloned()
            .ok_or(DbError::FileNotOpen(format!("{fid:?}")))
    }

    /// Read `page_size` bytes of `page_no` from `fid` into a fresh buffer.
    pub fn read_page(&self, fid: FileId, page_no: u64, page_size: usize) -> DbResult<Vec<u8>> {
        let open = self.handle(fid)?;
        let mut buf = vec![0u8; page_size];
        let mut file = open.file.lock();
        file.seek(SeekFrom::Start(page_no * page_size as u64))?;
        read_fully(&mut *file, &mut buf)?;
        Ok(buf)
    }

    /// Write `data` (exactly `page_size` bytes) to `page_no` on `fid`.
    pub fn write_page(&self, fid: FileId, page_no: u64, data: &[u8]) -> DbResult<()> {
        let open = self.handle(fid)?;
        let mut file = open.file.lock();
        file.seek(SeekFrom::Start(page_no * data.len() as u64))?;
        write_fully(&mut *file, data)?;
        Ok(())
    }

    /// Allocate the next sequential page number for `fid`. Purely an
    /// in-memory counter; the caller is responsible for actually writing
    /// the page so the file grows to match.
    pub fn allocate_page(&self, fid: FileId) -> DbResult<PageId> {
        let open = self.handle(fid)?;
        Ok(PageId(open.next_page.fetch_add(1, Ordering::Relaxed)))
    }

    /// Restore the allocation counter from an on-disk page count, e.g.
    /// after reopening an existing table file at startup.
    pub fn set_next_page(&self, fid: FileId, next: u64) -> DbResult<()> {
        let open = self.handle(fid)?;
        open.next_page.store(next, Ordering::Relaxed);
        Ok(())
    }

    pub fn file_size(&self, fid: FileId) -> DbResult<u64> {
        let open = self.handle(fid)?;
        Ok(open.file.lock().metadata()?.len())
    }

    fn log_handle(&self) -> DbResult<Arc<OpenFile>> {
        let mut guard = self.log_file.lock();
        if let Some(open) = guard.as_ref() {
            return Ok(open.clone());
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&self.log_path)?;
        let open = Arc::new(OpenFile {
            path: self.log_path.clone(),
            file: Mutex::new(file),
            next_page: AtomicU64::new(0),
        });
        *guard = Some(open.clone());
        Ok(open)
    }

    /// Read up to `size` bytes of the log starting at `offset`. Returns
    /// fewer bytes (possibly zero) once `offset` reaches end of file.
    pub fn read_log(&self, offset: u64, size: usize) -> DbResult<Vec<u8>> {
        let open = self.log_handle()?;
        let mut file = open.file.lock();
        let len = file.metadata()?.len();
        if offset >= len {
            return Ok(Vec::new());
        }
        let to_read = size.min((len - offset) as usize);
        let mut buf = vec![0u8; to_read];
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Append `data` to the end of the log file and fsync it, so a crash
    /// immediately after this call returns cannot lose the record.
    pub fn write_log(&self, data: &[u8]) -> DbResult<()> {
        let open = self.log_handle()?;
        let mut file = open.file.lock();
        file.seek(SeekFrom::End(0))?;
        write_fully(&mut *file, data)?;
        if let Err(e) = file.sync_data() {
            warn!("log fsync failed: {e}");
            return Err(DbError::Io(e));
        }
        Ok(())
    }

    pub fn log_size(&self) -> DbResult<u64> {
        let open = self.log_handle()?;
        Ok(open.file.lock().metadata()?.len())
    }
}

fn read_fully(file: &mut File, buf: &mut [u8]) -> DbResult<()> {
    let mut total = 0;
    while total < buf.len() {
        let n = file.read(&mut buf[total..])?;
        if n == 0 {
            return Err(DbError::Storage(format!(
                "short read: expected {} bytes, got {total}",
                buf.len()
            )));
        }
        total += n;
    }
    Ok(())
}

fn write_fully(file: &mut File, buf: &[u8]) -> DbResult<()> {
    let mut total = 0;
    while total < buf.len() {
        let n = file.write(&buf[total..])?;
        if n == 0 {
            return Err(DbError::Storage("short write: wrote 0 bytes".into()));
        }
        total += n;
    }
    Ok(())
}
