//! B+Tree index implementation for persistent on-disk indexes.
//!
//! Nodes are paged through the shared buffer pool under
//! `FileTag::Index(index_id)`, so index pages and table heap pages compete
//! for the same pool and obey the same WAL-obedience rule. Page 0 of every
//! index file is a one-field header holding the current root page id: the
//! root moves whenever the tree grows a new level, so it cannot be a fixed
//! page number the way a B+tree's root conventionally is.

mod node;

pub use node::{BTreeNode, NodeType};

use bincode::config::{self, Config};
use bincode::serde::{decode_from_slice, encode_to_vec};
use buffer::BufferPoolManager;
use common::{DbError, DbResult, FileTag, IndexId, Lsn, PageId, RecordId};
use std::cmp::Ordering;
use std::sync::Arc;
use types::Value;

fn bincode_config() -> impl Config {
    config::legacy()
}

const HEADER_PAGE: PageId = PageId(0);

/// Lexicographic comparison of composite keys. Every key compared within a
/// single index shares the same column types (the index was built over one
/// fixed column list), so `cmp_same_type` never returns `None` here.
fn compare_keys(a: &[Value], b: &[Value]) -> Ordering {
    for (x, y) in a.iter().zip(b.iter()) {
        match x
            .cmp_same_type(y)
            .expect("index keys must share column types")
        {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    a.len().cmp(&b.len())
}

/// A persistent B+Tree index that stores key-value pairs on disk.
///
/// Keys are `Vec<Value>` (supporting composite keys) and values are
/// `RecordId` pointing to rows in the heap table.
pub struct BTreeIndex {
    pool: Arc<BufferPoolManager>,
    tag: FileTag,
    index_id: IndexId,
    /// Held across the whole of every `insert`/`delete` (write) or
    /// `search`/`range_scan`/`lower_bound`/`upper_bound`/`scan_all` (read)
    /// call. A coarser guarantee than per-node optimistic latch coupling --
    /// it serializes all writers against each other and against readers for
    /// the operation's full duration rather than releasing as soon as
    /// descent proves the root safe -- but it closes the same race: two
    /// concurrent top-level inserts that both split the root can no longer
    /// interleave their `read_header`/`write_header` calls.
    root_latch: parking_lot::RwLock<()>,
}

impl BTreeIndex {
    fn encode_node(&self, node: &BTreeNode) -> DbResult<Vec<u8>> {
        let bytes = encode_to_vec(node, bincode_config())
            .map_err(|e| DbError::Storage(format!("failed to encode btree node: {e}")))?;
        let page_size = self.pool.page_size();
        if bytes.len() > page_size {
            return Err(DbError::Storage(format!(
                "btree node too large: {} bytes (max {page_size})",
                bytes.len()
            )));
        }
        let mut buf = vec![0u8; page_size];
        buf[..bytes.len()].copy_from_slice(&bytes);
        Ok(buf)
    }

    /// Create a new, empty B+Tree index routed through `pool`.
    pub fn create(pool: Arc<BufferPoolManager>, index_id: IndexId) -> DbResult<Self> {
        let tag = FileTag::Index(index_id);
        let (header_pid, header_guard) = pool.new_page(tag)?;
        debug_assert_eq!(header_pid, HEADER_PAGE);
        drop(header_guard);

        let index = Self {
            pool,
            tag,
            index_id,
            root_latch: parking_lot::RwLock::new(()),
        };
        let leaf_bytes = index.encode_node(&BTreeNode::new_leaf())?;
        let (root_pid, mut root_guard) = index.pool.new_page(tag)?;
        root_guard.data_mut().copy_from_slice(&leaf_bytes);
        drop(root_guard);

        index.write_header(root_pid, Lsn::INVALID)?;
        Ok(index)
    }

    /// Open an index file created earlier.
    pub fn open(pool: Arc<BufferPoolManager>, index_id: IndexId) -> DbResult<Self> {
        Ok(Self {
            pool,
            tag: FileTag::Index(index_id),
            index_id,
            root_latch: parking_lot::RwLock::new(()),
        })
    }

    pub fn index_id(&self) -> IndexId {
        self.index_id
    }

    fn read_header(&self) -> DbResult<PageId> {
        let guard = self.pool.fetch_page(self.tag, HEADER_PAGE)?;
        Ok(PageId(u64::from_be_bytes(guard.data()[0..8].try_into().unwrap())))
    }

    fn write_header(&self, root: PageId, lsn: Lsn) -> DbResult<()> {
        let mut guard = self.pool.fetch_page(self.tag, HEADER_PAGE)?;
        guard.data_mut()[0..8].copy_from_slice(&root.0.to_be_bytes());
        guard.set_page_lsn(lsn);
        Ok(())
    }

    fn read_node(&self, page_id: PageId) -> DbResult<BTreeNode> {
        let guard = self.pool.fetch_page(self.tag, page_id)?;
        let (node, _): (BTreeNode, usize) = decode_from_slice(guard.data(), bincode_config())
            .map_err(|e| DbError::Storage(format!("failed to decode btree node: {e}")))?;
        Ok(node)
    }

    fn write_node(&self, page_id: PageId, node: &BTreeNode, lsn: Lsn) -> DbResult<()> {
        let bytes = self.encode_node(node)?;
        let mut guard = self.pool.fetch_page(self.tag, page_id)?;
        guard.data_mut().copy_from_slice(&bytes);
        guard.set_page_lsn(lsn);
        Ok(())
    }

    fn allocate_node(&self, node: &BTreeNode, lsn: Lsn) -> DbResult<PageId> {
        let bytes = self.encode_node(node)?;
        let (pid, mut guard) = self.pool.new_page(self.tag)?;
        guard.data_mut().copy_from_slice(&bytes);
        guard.set_page_lsn(lsn);
        Ok(pid)
    }

    /// Search for all RecordIds matching the given key.
    pub fn search(&self, key: &[Value]) -> DbResult<Vec<RecordId>> {
        let _guard = self.root_latch.read();
        let leaf_page_id = self.find_leaf(key)?;
        let leaf = self.read_node(leaf_page_id)?;

        match leaf {
            BTreeNode::Leaf { entries, .. } => Ok(entries
                .into_iter()
                .filter(|(k, _)| compare_keys(k, key) == Ordering::Equal)
                .map(|(_, rid)| rid)
                .collect()),
            BTreeNode::Internal { .. } => {
                Err(DbError::Storage("find_leaf returned non-leaf node".into()))
            }
        }
    }

    /// Search for all RecordIds within the given key range (inclusive).
    pub fn range_scan(
        &self,
        low: Option<&[Value]>,
        high: Option<&[Value]>,
    ) -> DbResult<Vec<RecordId>> {
        let _guard = self.root_latch.read();
        let start_key = low.unwrap_or(&[]);
        let mut leaf_page_id = self.find_leaf(start_key)?;
        let mut results = Vec::new();

        loop {
            let leaf = self.read_node(leaf_page_id)?;
            match leaf {
                BTreeNode::Leaf { entries, next_leaf, .. } => {
                    for (k, rid) in &entries {
                        if let Some(lo) = low {
                            if compare_keys(k, lo) == Ordering::Less {
                                continue;
                            }
                        }
                        if let Some(hi) = high {
                            if compare_keys(k, hi) == Ordering::Greater {
                                return Ok(results);
                            }
                        }
                        results.push(*rid);
                    }
                    match next_leaf {
                        Some(next) => leaf_page_id = next,
                        None => break,
                    }
                }
                BTreeNode::Internal { .. } => {
                    return Err(DbError::Storage("expected leaf node in range scan".into()));
                }
            }
        }

        Ok(results)
    }

    /// The first entry with a key `>= key`, if any (spec.md §4.6 cursor seek).
    pub fn lower_bound(&self, key: &[Value]) -> DbResult<Option<(Vec<Value>, RecordId)>> {
        let _guard = self.root_latch.read();
        let leaf_page_id = self.find_leaf(key)?;
        if let BTreeNode::Leaf { entries, .. } = self.read_node(leaf_page_id)? {
            if let Some(entry) = entries.into_iter().find(|(k, _)| compare_keys(k, key).is_ge()) {
                return Ok(Some(entry));
            }
        }
        Ok(None)
    }

    /// The first entry with a key `> key`, if any.
    pub fn upper_bound(&self, key: &[Value]) -> DbResult<Option<(Vec<Value>, RecordId)>> {
        let _guard = self.root_latch.read();
        let leaf_page_id = self.find_leaf(key)?;
        if let BTreeNode::Leaf { entries, .. } = self.read_node(leaf_page_id)? {
            if let Some(entry) = entries.into_iter().find(|(k, _)| compare_keys(k, key).is_gt()) {
                return Ok(Some(entry));
            }
        }
        Ok(None)
    }

    /// Insert a key-value pair into the index.
    pub fn insert(&self, key: Vec<Value>, rid: RecordId, lsn: Lsn) -> DbResult<()> {
        let _guard = self.root_latch.write();
        let root = self.read_header()?;
        let result = self.insert_recursive(root, key, rid, lsn)?;

        if let Some((new_key, new_child_page)) = result {
            log::debug!("btree {:?}: root split, growing a new level", self.index_id);
            let new_root = BTreeNode::Internal {
                keys: vec![new_key],
                children: vec![root, new_child_page],
            };
            let new_root_page = self.allocate_node(&new_root, lsn)?;
            self.write_header(new_root_page, lsn)?;
        }

        Ok(())
    }

    /// Delete a key-value pair from the index, rebalancing the tree (borrow
    /// from a sibling, or coalesce with one) whenever a node falls below its
    /// minimum occupancy, all the way up to the root.
    pub fn delete(&self, key: &[Value], rid: RecordId, lsn: Lsn) -> DbResult<bool> {
        let _guard = self.root_latch.write();
        let root = self.read_header()?;
        self.delete_recursive(root, key, rid, lsn)
    }

    /// Returns all entries in the index in key order (for scans/debugging).
    pub fn scan_all(&self) -> DbResult<Vec<(Vec<Value>, RecordId)>> {
        let _guard = self.root_latch.read();
        let root = self.read_header()?;
        let mut page_id = root;
        loop {
            match self.read_node(page_id)? {
                BTreeNode::Internal { children, .. } => {
                    page_id = *children
                        .first()
                        .ok_or_else(|| DbError::Storage("internal node has no children".into()))?;
                }
                BTreeNode::Leaf { .. } => break,
            }
        }

        let mut results = Vec::new();
        loop {
            let leaf = self.read_node(page_id)?;
            match leaf {
                BTreeNode::Leaf { entries, next_leaf, .. } => {
                    results.extend(entries);
                    match next_leaf {
                        Some(next) => page_id = next,
                        None => break,
                    }
                }
                BTreeNode::Internal { .. } => {
                    return Err(DbError::Storage("expected leaf in scan".into()));
                }
            }
        }

        Ok(results)
    }

    // ---- Private helpers ----

    fn find_leaf(&self, key: &[Value]) -> DbResult<PageId> {
        let mut current = self.read_header()?;
        loop {
            match self.read_node(current)? {
                BTreeNode::Internal { keys, children } => {
                    let idx = keys.partition_point(|k| compare_keys(k, key).is_le());
                    current = children[idx];
                }
                BTreeNode::Leaf { .. } => return Ok(current),
            }
        }
    }

    /// Recursively insert into the tree, returning a split key and new page if split occurred.
    fn insert_recursive(
        &self,
        page_id: PageId,
        key: Vec<Value>,
        rid: RecordId,
        lsn: Lsn,
    ) -> DbResult<Option<(Vec<Value>, PageId)>> {
        let node = self.read_node(page_id)?;

        match node {
            BTreeNode::Internal { keys, children } => {
                let idx = keys.partition_point(|k| compare_keys(k, &key).is_le());
                let child_page = children[idx];

                let split_result = self.insert_recursive(child_page, key, rid, lsn)?;

                if let Some((new_key, new_child)) = split_result {
                    let mut new_keys = keys;
                    let mut new_children = children;
                    new_keys.insert(idx, new_key);
                    new_children.insert(idx + 1, new_child);

                    if new_keys.len() > Self::max_internal_keys() {
                        let (left, split_key, right) = Self::split_internal(new_keys, new_children);
                        self.write_node(page_id, &left, lsn)?;
                        let right_page = self.allocate_node(&right, lsn)?;
                        return Ok(Some((split_key, right_page)));
                    } else {
                        let updated = BTreeNode::Internal {
                            keys: new_keys,
                            children: new_children,
                        };
                        self.write_node(page_id, &updated, lsn)?;
                    }
                }

                Ok(None)
            }
            BTreeNode::Leaf {
                mut entries,
                next_leaf,
                prev_leaf,
            } => {
                let idx = entries.partition_point(|(k, _)| compare_keys(k, &key).is_le());
                entries.insert(idx, (key, rid));

                if entries.len() > Self::max_leaf_entries() {
                    log::debug!("btree {:?}: leaf page {page_id:?} split", self.index_id);
                    let (left_entries, right_entries, split_key) = Self::split_leaf(entries);
                    let right_page = self.allocate_node(
                        &BTreeNode::Leaf {
                            entries: right_entries,
                            next_leaf,
                            prev_leaf: Some(page_id),
                        },
                        lsn,
                    )?;
                    let left = BTreeNode::Leaf {
                        entries: left_entries,
                        next_leaf: Some(right_page),
                        prev_leaf,
                    };
                    self.write_node(page_id, &left, lsn)?;
                    self.relink_prev(next_leaf, right_page, lsn)?;
                    return Ok(Some((split_key, right_page)));
                }

                let updated = BTreeNode::Leaf {
                    entries,
                    next_leaf,
                    prev_leaf,
                };
                self.write_node(page_id, &updated, lsn)?;
                Ok(None)
            }
        }
    }

    /// Recursively delete from the subtree rooted at `page_id`. If the
    /// recursed-into child underflows, folds it into a sibling (or collapses
    /// the root) before returning, mirroring `insert_recursive`'s shape.
    fn delete_recursive(
        &self,
        page_id: PageId,
        key: &[Value],
        rid: RecordId,
        lsn: Lsn,
    ) -> DbResult<bool> {
        match self.read_node(page_id)? {
            BTreeNode::Internal { keys, children } => {
                let idx = keys.partition_point(|k| compare_keys(k, key).is_le());
                let child_page = children[idx];

                let deleted = self.delete_recursive(child_page, key, rid, lsn)?;
                if deleted {
                    let child = self.read_node(child_page)?;
                    if child.len() < Self::min_size(&child) {
                        self.rebalance_child(page_id, keys, children, idx, lsn)?;
                    }
                }
                Ok(deleted)
            }
            BTreeNode::Leaf {
                mut entries,
                next_leaf,
                prev_leaf,
            } => {
                let original_len = entries.len();
                entries.retain(|(k, r)| !(compare_keys(k, key) == Ordering::Equal && r == &rid));
                let deleted = entries.len() < original_len;
                if deleted {
                    self.write_node(
                        page_id,
                        &BTreeNode::Leaf {
                            entries,
                            next_leaf,
                            prev_leaf,
                        },
                        lsn,
                    )?;
                }
                Ok(deleted)
            }
        }
    }

    /// `children[idx]` fell below its minimum occupancy after a delete.
    /// Borrow an entry from a sibling if one has spare capacity; otherwise
    /// coalesce with a sibling and drop the separator from this node. If
    /// that leaves this node's root with a single child, the child is
    /// promoted to root, shrinking the tree by one level.
    fn rebalance_child(
        &self,
        parent_page: PageId,
        mut keys: Vec<Vec<Value>>,
        mut children: Vec<PageId>,
        idx: usize,
        lsn: Lsn,
    ) -> DbResult<()> {
        match self.read_node(children[idx])? {
            BTreeNode::Leaf { .. } => {
                self.rebalance_leaf_child(&mut keys, &mut children, idx, lsn)?;
            }
            BTreeNode::Internal { .. } => {
                self.rebalance_internal_child(&mut keys, &mut children, idx, lsn)?;
            }
        }

        if children.len() == 1 && parent_page == self.read_header()? {
            log::debug!("btree {:?}: root collapsed by one level", self.index_id);
            self.write_header(children[0], lsn)?;
        } else {
            self.write_node(parent_page, &BTreeNode::Internal { keys, children }, lsn)?;
        }
        Ok(())
    }

    fn rebalance_leaf_child(
        &self,
        keys: &mut Vec<Vec<Value>>,
        children: &mut Vec<PageId>,
        idx: usize,
        lsn: Lsn,
    ) -> DbResult<()> {
        let child_page = children[idx];
        let (mut entries, next_leaf, prev_leaf) = match self.read_node(child_page)? {
            BTreeNode::Leaf {
                entries,
                next_leaf,
                prev_leaf,
            } => (entries, next_leaf, prev_leaf),
            BTreeNode::Internal { .. } => {
                return Err(DbError::Storage("expected leaf child in rebalance".into()));
            }
        };

        // Borrow the right sibling's first entry.
        if idx + 1 < children.len() {
            let right_page = children[idx + 1];
            if let BTreeNode::Leaf {
                mut entries: right_entries,
                next_leaf: right_next,
                prev_leaf: right_prev,
            } = self.read_node(right_page)?
            {
                if right_entries.len() > Self::min_leaf_entries() {
                    let borrowed = right_entries.remove(0);
                    keys[idx] = right_entries[0].0.clone();
                    entries.push(borrowed);
                    self.write_node(
                        child_page,
                        &BTreeNode::Leaf {
                            entries,
                            next_leaf,
                            prev_leaf,
                        },
                        lsn,
                    )?;
                    self.write_node(
                        right_page,
                        &BTreeNode::Leaf {
                            entries: right_entries,
                            next_leaf: right_next,
                            prev_leaf: right_prev,
                        },
                        lsn,
                    )?;
                    return Ok(());
                }
            }
        }

        // Borrow the left sibling's last entry.
        if idx > 0 {
            let left_page = children[idx - 1];
            if let BTreeNode::Leaf {
                entries: mut left_entries,
                next_leaf: left_next,
                prev_leaf: left_prev,
            } = self.read_node(left_page)?
            {
                if left_entries.len() > Self::min_leaf_entries() {
                    let borrowed = left_entries.pop().expect("checked len above min");
                    keys[idx - 1] = borrowed.0.clone();
                    entries.insert(0, borrowed);
                    self.write_node(
                        left_page,
                        &BTreeNode::Leaf {
                            entries: left_entries,
                            next_leaf: left_next,
                            prev_leaf: left_prev,
                        },
                        lsn,
                    )?;
                    self.write_node(
                        child_page,
                        &BTreeNode::Leaf {
                            entries,
                            next_leaf,
                            prev_leaf,
                        },
                        lsn,
                    )?;
                    return Ok(());
                }
            }
        }

        // No sibling has spare entries: coalesce. Prefer the right sibling
        // so the surviving page keeps its own `prev_leaf` pointer.
        if idx + 1 < children.len() {
            let right_page = children[idx + 1];
            if let BTreeNode::Leaf {
                entries: right_entries,
                next_leaf: right_next,
                ..
            } = self.read_node(right_page)?
            {
                entries.extend(right_entries);
                self.write_node(
                    child_page,
                    &BTreeNode::Leaf {
                        entries,
                        next_leaf: right_next,
                        prev_leaf,
                    },
                    lsn,
                )?;
                self.relink_prev(right_next, child_page, lsn)?;
                keys.remove(idx);
                children.remove(idx + 1);
            }
        } else {
            let left_page = children[idx - 1];
            if let BTreeNode::Leaf {
                entries: left_entries,
                prev_leaf: left_prev,
                ..
            } = self.read_node(left_page)?
            {
                let mut merged = left_entries;
                merged.extend(entries);
                self.write_node(
                    left_page,
                    &BTreeNode::Leaf {
                        entries: merged,
                        next_leaf,
                        prev_leaf: left_prev,
                    },
                    lsn,
                )?;
                self.relink_prev(next_leaf, left_page, lsn)?;
                keys.remove(idx - 1);
                children.remove(idx);
            }
        }
        Ok(())
    }

    fn rebalance_internal_child(
        &self,
        keys: &mut Vec<Vec<Value>>,
        children: &mut Vec<PageId>,
        idx: usize,
        lsn: Lsn,
    ) -> DbResult<()> {
        let child_page = children[idx];
        let (mut child_keys, mut child_children) = match self.read_node(child_page)? {
            BTreeNode::Internal { keys, children } => (keys, children),
            BTreeNode::Leaf { .. } => {
                return Err(DbError::Storage("expected internal child in rebalance".into()));
            }
        };

        // Borrow from the right sibling: the parent separator drops down as
        // the child's new last key, and the sibling's first key rises to
        // take its place as the parent separator.
        if idx + 1 < children.len() {
            let right_page = children[idx + 1];
            if let BTreeNode::Internal {
                keys: mut right_keys,
                children: mut right_children,
            } = self.read_node(right_page)?
            {
                if right_keys.len() > Self::min_internal_keys() {
                    child_keys.push(keys[idx].clone());
                    keys[idx] = right_keys.remove(0);
                    child_children.push(right_children.remove(0));
                    self.write_node(
                        child_page,
                        &BTreeNode::Internal {
                            keys: child_keys,
                            children: child_children,
                        },
                        lsn,
                    )?;
                    self.write_node(
                        right_page,
                        &BTreeNode::Internal {
                            keys: right_keys,
                            children: right_children,
                        },
                        lsn,
                    )?;
                    return Ok(());
                }
            }
        }

        // Borrow from the left sibling symmetrically.
        if idx > 0 {
            let left_page = children[idx - 1];
            if let BTreeNode::Internal {
                keys: mut left_keys,
                children: mut left_children,
            } = self.read_node(left_page)?
            {
                if left_keys.len() > Self::min_internal_keys() {
                    child_keys.insert(0, keys[idx - 1].clone());
                    keys[idx - 1] = left_keys.pop().expect("checked len above min");
                    child_children.insert(0, left_children.pop().expect("checked len above min"));
                    self.write_node(
                        left_page,
                        &BTreeNode::Internal {
                            keys: left_keys,
                            children: left_children,
                        },
                        lsn,
                    )?;
                    self.write_node(
                        child_page,
                        &BTreeNode::Internal {
                            keys: child_keys,
                            children: child_children,
                        },
                        lsn,
                    )?;
                    return Ok(());
                }
            }
        }

        // No sibling has spare keys: coalesce, pulling the separator down
        // into the merged node.
        if idx + 1 < children.len() {
            let right_page = children[idx + 1];
            if let BTreeNode::Internal {
                keys: right_keys,
                children: right_children,
            } = self.read_node(right_page)?
            {
                child_keys.push(keys[idx].clone());
                child_keys.extend(right_keys);
                child_children.extend(right_children);
                self.write_node(
                    child_page,
                    &BTreeNode::Internal {
                        keys: child_keys,
                        children: child_children,
                    },
                    lsn,
                )?;
                keys.remove(idx);
                children.remove(idx + 1);
            }
        } else {
            let left_page = children[idx - 1];
            if let BTreeNode::Internal {
                keys: left_keys,
                children: left_children,
            } = self.read_node(left_page)?
            {
                let mut merged_keys = left_keys;
                merged_keys.push(keys[idx - 1].clone());
                merged_keys.extend(child_keys);
                let mut merged_children = left_children;
                merged_children.extend(child_children);
                self.write_node(
                    left_page,
                    &BTreeNode::Internal {
                        keys: merged_keys,
                        children: merged_children,
                    },
                    lsn,
                )?;
                keys.remove(idx - 1);
                children.remove(idx);
            }
        }
        Ok(())
    }

    /// Fix up `next`'s `prev_leaf` pointer after a coalesce changes which
    /// page precedes it in the leaf chain. A no-op if there is no next leaf.
    fn relink_prev(&self, next: Option<PageId>, new_prev: PageId, lsn: Lsn) -> DbResult<()> {
        let Some(next_page) = next else {
            return Ok(());
        };
        if let BTreeNode::Leaf {
            entries, next_leaf, ..
        } = self.read_node(next_page)?
        {
            self.write_node(
                next_page,
                &BTreeNode::Leaf {
                    entries,
                    next_leaf,
                    prev_leaf: Some(new_prev),
                },
                lsn,
            )?;
        }
        Ok(())
    }

    fn min_size(node: &BTreeNode) -> usize {
        match node {
            BTreeNode::Leaf { .. } => Self::min_leaf_entries(),
            BTreeNode::Internal { .. } => Self::min_internal_keys(),
        }
    }

    fn min_leaf_entries() -> usize {
        Self::max_leaf_entries() / 2
    }

    fn min_internal_keys() -> usize {
        Self::max_internal_keys() / 2
    }

    fn split_leaf(
        entries: Vec<(Vec<Value>, RecordId)>,
    ) -> (Vec<(Vec<Value>, RecordId)>, Vec<(Vec<Value>, RecordId)>, Vec<Value>) {
        let mid = entries.len() / 2;
        let (left, right) = entries.split_at(mid);
        let split_key = right[0].0.clone();
        (left.to_vec(), right.to_vec(), split_key)
    }

    fn split_internal(
        keys: Vec<Vec<Value>>,
        children: Vec<PageId>,
    ) -> (BTreeNode, Vec<Value>, BTreeNode) {
        let mid = keys.len() / 2;
        let left = BTreeNode::Internal {
            keys: keys[..mid].to_vec(),
            children: children[..=mid].to_vec(),
        };
        let split_key = keys[mid].clone();
        let right = BTreeNode::Internal {
            keys: keys[mid + 1..].to_vec(),
            children: children[mid + 1..].to_vec(),
        };
        (left, split_key, right)
    }

    fn max_leaf_entries() -> usize {
        100
    }

    fn max_internal_keys() -> usize {
        100
    }
}

#[cfg(test)]
mod tests;
