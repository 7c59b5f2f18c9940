//! Record Manager: fixed-width heap files built on top of the buffer pool.
//!
//! Layout per table (`FileTag::Table`):
//!
//! - Page 0 is a file header: `num_pages: u32` (count of data pages, not
//!   including the header) followed by `first_free_page: i64` (`-1` means
//!   "no page with a free slot").
//! - Data pages start at page 1. Each data page is `[PageHeader][bitmap][slots...]`:
//!   a 10-byte header (`next_free_page: i64`, `num_records: u16`), a
//!   bitmap with one bit per slot (1 = occupied), then `num_records_per_page`
//!   fixed-width slots of `record_size` bytes each.
//! - Pages with at least one free slot form a singly linked free list
//!   threaded through `PageHeader::next_free_page`, headed by the file
//!   header's `first_free_page`. A page leaves the list when it fills up
//!   and rejoins when a delete frees a slot.
//!
//! `record_size` and `num_records_per_page` are derived from the table's
//! column types and the page size; they are never stored on disk, so the
//! caller (the catalog) must always open a heap file with the same schema
//! it was created with.


use bit_vec::BitVec;
use buffer::BufferPoolManager;
use common::{DbError, DbResult, FileTag, Lsn, PageId, RecordId, Row, TableId};
use std::sync::Arc;
use types::{SqlType, Value};

const PAGE_HEADER_BYTES: usize = 10; // next_free_page: i64 (8) + num_records: u16 (2)
const HEADER_PAGE: PageId = PageId(0);
const FIRST_DATA_PAGE: u64 = 1;

/// Derived, schema-dependent layout of a heap file's data pages.
#[derive(Clone, Debug)]
struct Layout {
    record_size: usize,
    num_records_per_page: u16,
    bitmap_bytes: usize,
    slots_offset: usize,
}

impl Layout {
    fn new(page_size: usize, schema: &[SqlType]) -> DbResult<Self> {
        let record_size: usize = schema.iter().map(|t| t.byte_len()).sum();
        if record_size == 0 {
            return Err(DbError::Storage("table must have at least one column".into()));
        }
        let mut n = ((page_size.saturating_sub(PAGE_HEADER_BYTES)) / record_size) as i64;
        loop {
            if n <= 0 {
                return Err(DbError::Storage(format!(
                    "page size {page_size} too small to fit a single record of {record_size} bytes"
                )));
            }
            let bitmap_bytes = (n as usize).div_ceil(8);
            let used = PAGE_HEADER_BYTES + bitmap_bytes + (n as usize) * record_size;
            if used <= page_size {
                break;
            }
            n -= 1;
        }
        let num_records_per_page = n as u16;
        let bitmap_bytes = (num_records_per_page as usize).div_ceil(8);
        Ok(Self {
            record_size,
            num_records_per_page,
            bitmap_bytes,
            slots_offset: PAGE_HEADER_BYTES + bitmap_bytes,
        })
    }

    fn slot_range(&self, slot: u16) -> std::ops::Range<usize> {
        let start = self.slots_offset + slot as usize * self.record_size;
        start..start + self.record_size
    }
}

fn read_page_header(data: &[u8]) -> (i64, u16) {
    let next_free_page = i64::from_be_bytes(data[0..8].try_into().unwrap());
    let num_records = u16::from_be_bytes(data[8..10].try_into().unwrap());
    (next_free_page, num_records)
}

fn write_page_header(data: &mut [u8], next_free_page: i64, num_records: u16) {
    data[0..8].copy_from_slice(&next_free_page.to_be_bytes());
    data[8..10].copy_from_slice(&num_records.to_be_bytes());
}

fn read_file_header(data: &[u8]) -> (u32, i64) {
    let num_pages = u32::from_be_bytes(data[0..4].try_into().unwrap());
    let first_free_page = i64::from_be_bytes(data[4..12].try_into().unwrap());
    (num_pages, first_free_page)
}

fn write_file_header(data: &mut [u8], num_pages: u32, first_free_page: i64) {
    data[0..4].copy_from_slice(&num_pages.to_be_bytes());
    data[4..12].copy_from_slice(&first_free_page.to_be_bytes());
}

fn bitmap_of(data: &[u8], layout: &Layout) -> BitVec {
    BitVec::from_bytes(&data[PAGE_HEADER_BYTES..PAGE_HEADER_BYTES + layout.bitmap_bytes])
}

fn write_bitmap(data: &mut [u8], layout: &Layout, bits: &BitVec) {
    let bytes = bits.to_bytes();
    data[PAGE_HEADER_BYTES..PAGE_HEADER_BYTES + bytes.len()].copy_from_slice(&bytes);
}

/// A fixed-width heap file backed by the buffer pool.
pub struct HeapFile {
    pool: Arc<BufferPoolManager>,
    tag: FileTag,
    schema: Vec<SqlType>,
    layout: Layout,
}

impl HeapFile {
    /// Create a brand-new, empty heap file (writes the file header page).
    pub fn create(pool: Arc<BufferPoolManager>, table: TableId, schema: Vec<SqlType>) -> DbResult<Self> {
        let layout = Layout::new(pool.page_size(), &schema)?;
        let tag = FileTag::Table(table);
        let (pid, mut guard) = pool.new_page(tag)?;
        debug_assert_eq!(pid, HEADER_PAGE);
        write_file_header(guard.data_mut(), 0, -1);
        drop(guard);
        Ok(Self { pool, tag, schema, layout })
    }

    /// Open a heap file that was previously created with the same schema.
    pub fn open(pool: Arc<BufferPoolManager>, table: TableId, schema: Vec<SqlType>) -> DbResult<Self> {
        let layout = Layout::new(pool.page_size(), &schema)?;
        Ok(Self {
            pool,
            tag: FileTag::Table(table),
            schema,
            layout,
        })
    }

    pub fn schema(&self) -> &[SqlType] {
        &self.schema
    }

    /// The buffer pool backing this heap file, so a caller holding only a
    /// `HeapFile` can open a companion index against the same pool.
    pub fn pool(&self) -> Arc<BufferPoolManager> {
        self.pool.clone()
    }

    fn encode_row(&self, row: &Row) -> DbResult<Vec<u8>> {
        if row.values.len() != self.schema.len() {
            return Err(DbError::InvalidValueCount {
                expected: self.schema.len(),
                actual: row.values.len(),
            });
        }
        let mut buf = vec![0u8; self.layout.record_size];
        let mut offset = 0;
        for (value, ty) in row.values.iter().zip(&self.schema) {
            let width = ty.byte_len();
            value.encode_fixed(ty, &mut buf[offset..offset + width])?;
            offset += width;
        }
        Ok(buf)
    }

    fn decode_row(&self, bytes: &[u8]) -> DbResult<Row> {
        let mut values = Vec::with_capacity(self.schema.len());
        let mut offset = 0;
        for ty in &self.schema {
            let width = ty.byte_len();
            values.push(Value::decode_fixed(ty, &bytes[offset..offset + width])?);
            offset += width;
        }
        Ok(Row::new(values))
    }

    fn num_pages(&self) -> DbResult<u32> {
        let guard = self.pool.fetch_page(self.tag, HEADER_PAGE)?;
        Ok(read_file_header(guard.data()).0)
    }

    /// Allocate a fresh, empty data page and thread it onto the free list.
    fn allocate_data_page(&self, lsn: Lsn) -> DbResult<u64> {
        let mut header_guard = self.pool.fetch_page(self.tag, HEADER_PAGE)?;
        let (num_pages, first_free_page) = read_file_header(header_guard.data());

        let (pid, mut page_guard) = self.pool.new_page(self.tag)?;
        write_page_header(page_guard.data_mut(), first_free_page, 0);
        let empty_bits = BitVec::from_elem(self.layout.num_records_per_page as usize, false);
        write_bitmap(page_guard.data_mut(), &self.layout, &empty_bits);
        page_guard.set_page_lsn(lsn);
        drop(page_guard);

        write_file_header(header_guard.data_mut(), num_pages + 1, pid.0 as i64);
        header_guard.set_page_lsn(lsn);
        Ok(pid.0)
    }

    /// Insert `row` into the first page with a free slot, allocating one if
    /// none exists. Returns the new record's id.
    pub fn insert(&self, row: &Row, lsn: Lsn) -> DbResult<RecordId> {
        let bytes = self.encode_row(row)?;

        let header_guard = self.pool.fetch_page(self.tag, HEADER_PAGE)?;
        let (_, first_free_page) = read_file_header(header_guard.data());
        drop(header_guard);

        let page_no = if first_free_page >= 0 {
            first_free_page as u64
        } else {
            self.allocate_data_page(lsn)?
        };

        let mut page_guard = self.pool.fetch_page(self.tag, PageId(page_no))?;
        let (next_free_page, num_records) = read_page_header(page_guard.data());
        let mut bits = bitmap_of(page_guard.data(), &self.layout);
        let slot = (0..self.layout.num_records_per_page)
            .find(|&i| !bits.get(i as usize).unwrap_or(false))
            .ok_or_else(|| DbError::Storage(format!("page {page_no} reported free but has none")))?;
        bits.set(slot as usize, true);
        write_bitmap(page_guard.data_mut(), &self.layout, &bits);
        let range = self.layout.slot_range(slot);
        page_guard.data_mut()[range].copy_from_slice(&bytes);
        let new_count = num_records + 1;
        write_page_header(page_guard.data_mut(), next_free_page, new_count);
        page_guard.set_page_lsn(lsn);
        let now_full = new_count == self.layout.num_records_per_page;
        drop(page_guard);

        if now_full {
            let mut header_guard = self.pool.fetch_page(self.tag, HEADER_PAGE)?;
            let (num_pages, _) = read_file_header(header_guard.data());
            write_file_header(header_guard.data_mut(), num_pages, next_free_page);
            header_guard.set_page_lsn(lsn);
        }

        Ok(RecordId {
            page_id: PageId(page_no),
            slot,
        })
    }

    /// Re-insert `row` at a specific, already-allocated slot. Used by WAL
    /// redo (of an `Insert`) and undo (of a `Delete`), where the record id
    /// is dictated by the log rather than chosen fresh. Free-list
    /// bookkeeping is left untouched: it is a performance structure, not a
    /// correctness invariant, and recovery restores physical page contents
    /// rather than the allocator's internal state.
    pub fn insert_at(&self, rid: RecordId, row: &Row, lsn: Lsn) -> DbResult<()> {
        let bytes = self.encode_row(row)?;
        let mut page_guard = self.pool.fetch_page(self.tag, rid.page_id)?;
        let (next_free_page, num_records) = read_page_header(page_guard.data());
        let mut bits = bitmap_of(page_guard.data(), &self.layout);
        let was_set = bits.get(rid.slot as usize).unwrap_or(false);
        bits.set(rid.slot as usize, true);
        write_bitmap(page_guard.data_mut(), &self.layout, &bits);
        let range = self.layout.slot_range(rid.slot);
        page_guard.data_mut()[range].copy_from_slice(&bytes);
        if !was_set {
            write_page_header(page_guard.data_mut(), next_free_page, num_records + 1);
        }
        page_guard.set_page_lsn(lsn);
        Ok(())
    }

    /// Fetch the row at `rid`.
    pub fn get(&self, rid: RecordId) -> DbResult<Row> {
        let guard = self.pool.fetch_page(self.tag, rid.page_id)?;
        let bits = bitmap_of(guard.data(), &self.layout);
        if rid.slot as usize >= bits.len() || !bits.get(rid.slot as usize).unwrap_or(false) {
            return Err(DbError::Storage(format!("record {rid:?} does not exist")));
        }
        let range = self.layout.slot_range(rid.slot);
        self.decode_row(&guard.data()[range])
    }

    /// Overwrite the row at `rid` in place (same slot, same bitmap bit).
    pub fn update(&self, rid: RecordId, row: &Row, lsn: Lsn) -> DbResult<()> {
        let bytes = self.encode_row(row)?;
        let mut guard = self.pool.fetch_page(self.tag, rid.page_id)?;
        let bits = bitmap_of(guard.data(), &self.layout);
        if rid.slot as usize >= bits.len() || !bits.get(rid.slot as usize).unwrap_or(false) {
            return Err(DbError::Storage(format!("record {rid:?} does not exist")));
        }
        let range = self.layout.slot_range(rid.slot);
        guard.data_mut()[range].copy_from_slice(&bytes);
        guard.set_page_lsn(lsn);
        Ok(())
    }

    /// Clear the slot at `rid`, returning the page to the free list if it
    /// was previously full.
    pub fn delete(&self, rid: RecordId, lsn: Lsn) -> DbResult<()> {
        let mut page_guard = self.pool.fetch_page(self.tag, rid.page_id)?;
        let (next_free_page, num_records) = read_page_header(page_guard.data());
        let mut bits = bitmap_of(page_guard.data(), &self.layout);
        if rid.slot as usize >= bits.len() || !bits.get(rid.slot as usize).unwrap_or(false) {
            return Err(DbError::Storage(format!("record {rid:?} does not exist")));
        }
        bits.set(rid.slot as usize, false);
        write_bitmap(page_guard.data_mut(), &self.layout, &bits);
        let was_full = num_records == self.layout.num_records_per_page;
        write_page_header(page_guard.data_mut(), next_free_page, num_records - 1);
        page_guard.set_page_lsn(lsn);
        drop(page_guard);

        if was_full {
            let mut header_guard = self.pool.fetch_page(self.tag, HEADER_PAGE)?;
            let (num_pages, first_free_page) = read_file_header(header_guard.data());
            write_file_header(header_guard.data_mut(), num_pages, rid.page_id.0 as i64);
            header_guard.set_page_lsn(lsn);
            let mut page_guard = self.pool.fetch_page(self.tag, rid.page_id)?;
            write_page_header(page_guard.data_mut(), first_free_page, self.layout.num_records_per_page - 1);
        }
        Ok(())
    }

    /// A forward-only scan over every occupied slot, in physical (page,
    /// slot) order. Each page is fetched fresh per step rather than held
    /// across iterations, trading a little locking overhead for a simpler,
    /// non-self-referential iterator.
    pub fn scan(&self) -> HeapScan<'_> {
        HeapScan {
            file: self,
            page_no: FIRST_DATA_PAGE,
            slot: 0,
        }
    }
}

pub struct HeapScan<'a> {
    file: &'a HeapFile,
    page_no: u64,
    slot: u16,
}

impl Iterator for HeapScan<'_> {
    type Item = DbResult<(RecordId, Row)>;

    fn next(&mut self) -> Option<Self::Item> {
        let num_pages = match self.file.num_pages() {
            Ok(n) => n as u64,
            Err(e) => return Some(Err(e)),
        };
        loop {
            if self.page_no > num_pages {
                return None;
            }
            let guard = match self.file.pool.fetch_page(self.file.tag, PageId(self.page_no)) {
                Ok(g) => g,
                Err(e) => return Some(Err(e)),
            };
            let bits = bitmap_of(guard.data(), &self.file.layout);
            let n = self.file.layout.num_records_per_page;
            match (self.slot..n).find(|&i| bits.get(i as usize).unwrap_or(false)) {
                Some(slot) => {
                    let range = self.file.layout.slot_range(slot);
                    let row = self.file.decode_row(&guard.data()[range]);
                    let rid = RecordId {
                        page_id: PageId(self.page_no),
                        slot,
                    };
                    self.slot = slot + 1;
                    return Some(row.map(|r| (rid, r)));
                }
                None => {
                    drop(guard);
                    self.page_no += 1;
                    self.slot = 0;
                }
            }
        }
    }
}
