//! Tests for the download module functionality.
//!
//! This file contains tests for:
//! - Resume offsets of fresh and stale temp files
//! - Opening, writing and closing the temp file
//! - The transfer session table

use modelfetch::download::{
    range_header, resume_offset, SessionState, SessionTable, TempFile, STALE_REWIND,
};
use modelfetch::Error;

use filetime::FileTime;
use std::time::{Duration, SystemTime};

mod common;
use common::helpers::*;

#[test]
fn test_resume_offset_fresh_file() {
    let start = SystemTime::now();
    let later = start + Duration::from_secs(5);
    assert_eq!(resume_offset(4096, Some(later), start, STALE_REWIND), 4096);
}

#[test]
fn test_resume_offset_stale_file() {
    let start = SystemTime::now();
    let earlier = start - Duration::from_secs(3600);
    let size = 3 * MIB as u64;
    assert_eq!(
        resume_offset(size, Some(earlier), start, STALE_REWIND),
        2 * MIB as u64
    );
    assert_eq!(resume_offset(10, Some(earlier), start, STALE_REWIND), 0);
    assert_eq!(resume_offset(size, None, start, STALE_REWIND), 2 * MIB as u64);
}

#[test]
fn test_range_header() {
    assert_eq!(range_header(0), "bytes=0-");
    assert_eq!(range_header(6291456), "bytes=6291456-");
}

#[tokio::test]
async fn test_temp_file_creates_missing_directory() {
    let dir = create_temp_dir();
    let path = dir.path().join("nested").join("incomplete-m.bin");

    let mut temp = TempFile::open(&path, SystemTime::now(), STALE_REWIND).await.unwrap();
    assert_eq!(temp.position(), 0);
    temp.write_chunk(b"hello").await.unwrap();
    temp.write_chunk(b" world").await.unwrap();
    assert_eq!(temp.position(), 11);

    let closed = temp.close().await.unwrap();
    assert_eq!(closed.len(), 11);
    assert_eq!(std::fs::read(closed.path()).unwrap(), b"hello world");
}

#[tokio::test]
async fn test_temp_file_resumes_fresh_bytes() {
    let dir = create_temp_dir();
    let content = create_test_content(5000);
    let path = create_temp_file(dir.path(), "incomplete-m.bin", &content);

    let started = SystemTime::now() - Duration::from_secs(60);
    let mut temp = TempFile::open(&path, started, STALE_REWIND).await.unwrap();
    assert_eq!(temp.position(), 5000);

    temp.write_chunk(b"tail").await.unwrap();
    let closed = temp.close().await.unwrap();
    assert_file_size(closed.path(), 5004);
}

#[tokio::test]
async fn test_temp_file_rewinds_stale_bytes() {
    let dir = create_temp_dir();
    let content = create_test_content(3 * MIB);
    let path = create_temp_file(dir.path(), "incomplete-m.bin", &content);
    let an_hour_ago = SystemTime::now() - Duration::from_secs(3600);
    filetime::set_file_mtime(&path, FileTime::from_system_time(an_hour_ago)).unwrap();

    let temp = TempFile::open(&path, SystemTime::now(), STALE_REWIND).await.unwrap();
    assert_eq!(temp.position(), 2 * MIB as u64);
    // The discarded bytes are gone from disk too.
    assert_file_size(&path, 2 * MIB as u64);
}

#[tokio::test]
async fn test_temp_file_restart() {
    let dir = create_temp_dir();
    let path = create_temp_file(dir.path(), "incomplete-m.bin", &[7u8; 100]);

    let started = SystemTime::now() - Duration::from_secs(60);
    let mut temp = TempFile::open(&path, started, STALE_REWIND).await.unwrap();
    assert_eq!(temp.position(), 100);

    temp.restart().await.unwrap();
    assert_eq!(temp.position(), 0);
    temp.write_chunk(b"abc").await.unwrap();
    let closed = temp.close().await.unwrap();
    assert_eq!(std::fs::read(closed.path()).unwrap(), b"abc");
}

#[test]
fn test_session_table_uniqueness() {
    let table = SessionTable::new();
    let a = table.reserve("a.bin").unwrap();
    let b = table.reserve("b.bin").unwrap();
    assert_ne!(a, b);

    let err = table.reserve("a.bin").unwrap_err();
    assert!(matches!(err, Error::AlreadyActive(ref name) if name == "a.bin"));
    assert_eq!(table.filenames(), vec!["a.bin".to_string(), "b.bin".to_string()]);

    table.remove(a);
    assert!(!table.contains("a.bin"));
    assert!(table.reserve("a.bin").is_ok());
}

#[test]
fn test_session_table_verifying_is_not_cancellable() {
    let table = SessionTable::new();
    let id = table.reserve("m.bin").unwrap();
    assert!(table.set_state(id, SessionState::Verifying));

    assert!(table.remove_cancellable("m.bin").is_none());
    assert!(table.contains("m.bin"));
    assert_eq!(table.find("m.bin"), Some(id));

    assert!(table.remove(id).is_some());
    assert!(table.is_empty());
    assert!(!table.set_state(id, SessionState::Downloading));
}
