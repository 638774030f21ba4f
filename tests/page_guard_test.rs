use std::thread;

use anyhow::Result;

use siltdb::BufferPoolError;

mod common;
use common::create_test_buffer_pool;

#[test]
fn test_dropping_a_guard_releases_the_pin() -> Result<()> {
    let (pool, _temp_file) = create_test_buffer_pool(5, 2)?;

    let (guard, page_id) = pool.new_page_guarded()?;
    assert_eq!(pool.pin_count(page_id), Some(1));

    drop(guard);
    assert_eq!(pool.pin_count(page_id), Some(0));
    Ok(())
}

#[test]
fn test_unpinned_guarded_page_becomes_evictable() -> Result<()> {
    let (pool, _temp_file) = create_test_buffer_pool(1, 2)?;

    let (guard, first_id) = pool.new_page_guarded()?;
    drop(guard);

    let read_guard = pool.fetch_page_read(first_id)?;
    assert_eq!(read_guard.page_id(), first_id);
    drop(read_guard);

    // The single frame is reusable now.
    let (second_guard, _) = pool.new_page_guarded()?;
    drop(second_guard);
    Ok(())
}

#[test]
fn test_read_guard_exposes_payload() -> Result<()> {
    let (pool, _temp_file) = create_test_buffer_pool(5, 2)?;

    let (guard, page_id) = pool.new_page_guarded()?;
    drop(guard);

    {
        let mut write_guard = pool.fetch_page_write(page_id)?;
        write_guard.data_mut()[0..4].copy_from_slice(&[1, 2, 3, 4]);
        assert_eq!(write_guard.page_id(), page_id);
    }

    let read_guard = pool.fetch_page_read(page_id)?;
    assert_eq!(&read_guard.data()[0..4], &[1, 2, 3, 4]);
    drop(read_guard);

    assert_eq!(pool.pin_count(page_id), Some(0));
    Ok(())
}

#[test]
fn test_write_guard_marks_the_page_dirty() -> Result<()> {
    let (pool, _temp_file) = create_test_buffer_pool(5, 2)?;
    let disk = pool.disk_manager();

    let (guard, page_id) = pool.new_page_guarded()?;
    drop(guard);

    {
        let mut write_guard = pool.fetch_page_write(page_id)?;
        write_guard.data_mut()[0] = 0x5A;
    }
    assert_eq!(pool.is_page_dirty(page_id), Some(true));

    // Read-only access leaves the dirty bit alone.
    assert!(pool.flush_page(page_id)?);
    assert_eq!(disk.write_count(), 1);
    {
        let read_guard = pool.fetch_page_read(page_id)?;
        assert_eq!(read_guard.data()[0], 0x5A);
    }
    assert_eq!(pool.is_page_dirty(page_id), Some(false));
    Ok(())
}

#[test]
fn test_basic_guard_dirty_flag_is_explicit() -> Result<()> {
    let (pool, _temp_file) = create_test_buffer_pool(5, 2)?;

    let (guard, page_id) = pool.new_page_guarded()?;
    drop(guard);

    {
        let mut basic = pool.fetch_page_basic(page_id)?;
        {
            let mut page = basic.page().write();
            page.data[7] = 0x77;
        }
        basic.mark_dirty();
    }
    assert_eq!(pool.is_page_dirty(page_id), Some(true));
    Ok(())
}

#[test]
fn test_two_read_guards_share_the_latch() -> Result<()> {
    let (pool, _temp_file) = create_test_buffer_pool(5, 2)?;

    let (guard, page_id) = pool.new_page_guarded()?;
    drop(guard);

    let first = pool.fetch_page_read(page_id)?;
    let second = pool.fetch_page_read(page_id)?;
    assert_eq!(pool.pin_count(page_id), Some(2));
    assert_eq!(first.data()[0], second.data()[0]);

    drop(first);
    drop(second);
    assert_eq!(pool.pin_count(page_id), Some(0));
    Ok(())
}

#[test]
fn test_guard_factories_report_a_full_pool() -> Result<()> {
    let (pool, _temp_file) = create_test_buffer_pool(1, 2)?;

    let (_held, _) = pool.new_page_guarded()?;

    assert!(matches!(
        pool.new_page_guarded(),
        Err(BufferPoolError::Full)
    ));
    assert!(matches!(
        pool.fetch_page_read(123),
        Err(BufferPoolError::Full)
    ));
    Ok(())
}

#[test]
fn test_write_latch_excludes_concurrent_writers() -> Result<()> {
    const THREADS: usize = 8;
    const INCREMENTS: usize = 25;

    let (pool, _temp_file) = create_test_buffer_pool(4, 2)?;
    let (guard, page_id) = pool.new_page_guarded()?;
    drop(guard);

    let mut handles = Vec::new();
    for _ in 0..THREADS {
        let pool = pool.clone();
        handles.push(thread::spawn(move || {
            for _ in 0..INCREMENTS {
                let mut write_guard = pool.fetch_page_write(page_id).unwrap();
                let bytes: [u8; 4] = write_guard.data()[0..4].try_into().unwrap();
                let value = u32::from_le_bytes(bytes);
                write_guard.data_mut()[0..4].copy_from_slice(&(value + 1).to_le_bytes());
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    let read_guard = pool.fetch_page_read(page_id)?;
    let bytes: [u8; 4] = read_guard.data()[0..4].try_into()?;
    assert_eq!(u32::from_le_bytes(bytes), (THREADS * INCREMENTS) as u32);
    drop(read_guard);

    assert_eq!(pool.pin_count(page_id), Some(0));
    Ok(())
}
