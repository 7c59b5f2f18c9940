use super::*;
use common::TableId;
use tempfile::tempdir;

fn make_pool(dir: &std::path::Path, pool_size: usize) -> BufferPoolManager {
    let disk = Arc::new(DiskManager::new(dir.join("wal.log")));
    BufferPoolManager::new(dir.join("data"), 4096, pool_size, disk, None).unwrap()
}

#[test]
fn new_page_then_fetch_round_trips_data() {
    let dir = tempdir().unwrap();
    let pool = make_pool(dir.path(), 4);
    let tag = FileTag::Table(TableId(1));

    let pid = {
        let (pid, mut guard) = pool.new_page(tag).unwrap();
        guard.data_mut()[0..4].copy_from_slice(&[1, 2, 3, 4]);
        pid
    };

    let guard = pool.fetch_page(tag, pid).unwrap();
    assert_eq!(&guard.data()[0..4], &[1, 2, 3, 4]);
}

#[test]
fn eviction_flushes_dirty_pages() {
    let dir = tempdir().unwrap();
    let pool = make_pool(dir.path(), 1);
    let tag = FileTag::Table(TableId(1));

    let pid1 = {
        let (pid, mut guard) = pool.new_page(tag).unwrap();
        guard.data_mut()[0] = 99;
        pid
    };

    let _pid2 = pool.new_page(tag).unwrap();

    let guard = pool.fetch_page(tag, pid1).unwrap();
    assert_eq!(guard.data()[0], 99);
}

#[test]
fn buffer_pool_full_when_all_pinned() {
    let dir = tempdir().unwrap();
    let pool = make_pool(dir.path(), 1);
    let tag = FileTag::Table(TableId(1));

    let (_pid1, guard1) = pool.new_page(tag).unwrap();
    let result = pool.new_page(tag);
    assert!(matches!(result, Err(DbError::BufferPoolFull)));
    drop(guard1);
}

#[test]
fn delete_page_requires_unpinned() {
    let dir = tempdir().unwrap();
    let pool = make_pool(dir.path(), 2);
    let tag = FileTag::Table(TableId(1));

    let (pid, guard) = pool.new_page(tag).unwrap();
    assert!(pool.delete_page(tag, pid).is_err());
    drop(guard);
    pool.delete_page(tag, pid).unwrap();
}

#[test]
fn flush_all_persists_across_pool_instances() {
    let dir = tempdir().unwrap();
    let tag = FileTag::Table(TableId(1));
    let pid = {
        let pool = make_pool(dir.path(), 4);
        let (pid, mut guard) = pool.new_page(tag).unwrap();
        guard.data_mut()[5] = 42;
        drop(guard);
        pool.flush_all(tag).unwrap();
        pid
    };

    let pool2 = make_pool(dir.path(), 4);
    let guard = pool2.fetch_page(tag, pid).unwrap();
    assert_eq!(guard.data()[5], 42);
}

#[test]
fn separate_file_tags_do_not_collide() {
    let dir = tempdir().unwrap();
    let pool = make_pool(dir.path(), 4);
    let table_tag = FileTag::Table(TableId(1));
    let index_tag = FileTag::Index(common::IndexId(1));

    let (tpid, mut tguard) = pool.new_page(table_tag).unwrap();
    tguard.data_mut()[0] = 1;
    drop(tguard);

    let (ipid, mut iguard) = pool.new_page(index_tag).unwrap();
    iguard.data_mut()[0] = 2;
    drop(iguard);

    assert_eq!(tpid, ipid);
    let tg = pool.fetch_page(table_tag, tpid).unwrap();
    let ig = pool.fetch_page(index_tag, ipid).unwrap();
    assert_eq!(tg.data()[0], 1);
    assert_eq!(ig.data()[0], 2);
}

#[test]
fn sequential_allocation_is_monotonic() {
    let dir = tempdir().unwrap();
    let pool = make_pool(dir.path(), 10);
    let tag = FileTag::Table(TableId(1));

    let (p0, _g0) = pool.new_page(tag).unwrap();
    let (p1, _g1) = pool.new_page(tag).unwrap();
    let (p2, _g2) = pool.new_page(tag).unwrap();
    assert_eq!((p0.0, p1.0, p2.0), (0, 1, 2));
}
