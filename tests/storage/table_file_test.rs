use std::{
    fs::{self, OpenOptions},
    io::{Seek, SeekFrom, Write},
};

use davisbase::{
    storage::{header::DatabaseHeader, table_file::TableFile},
    types::{
        PAGE_SIZE,
        error::DatabaseError,
        page::PageType,
    },
    utils::mock::TempDatabase,
};

#[test]
fn test_create_writes_header_and_column_names() {
    let db = TempDatabase::new().unwrap();
    let mut file = db.table_file("people", &["id", "name", "email"]).unwrap();

    assert_eq!(file.page_count(), 1);
    assert!(!file.has_root());
    assert_eq!(file.column_names().unwrap(), vec!["id", "name", "email"]);
    assert_eq!(fs::metadata(db.file_path("people")).unwrap().len(), PAGE_SIZE as u64);

    let bytes = fs::read(db.file_path("people")).unwrap();
    assert_eq!(&bytes[0..2], &[0, 18]);
    assert_eq!(&bytes[2..20], b"DavisBase format 1");
    assert_eq!(&bytes[0x14..0x16], &[0x02, 0x00]);
    assert_eq!(bytes[0x18], 4);
    assert_eq!(&bytes[0x24..0x28], &[0, 0, 0, 2]);
    assert_eq!(bytes[0x44], 0x0D);
}

#[test]
fn test_header_round_trip() {
    let header = DatabaseHeader {
        file_change_counter: 9,
        database_size_pages: 4,
        version_valid_for: 9,
        ..DatabaseHeader::default()
    };
    let bytes = header.to_bytes();
    assert_eq!(bytes.len(), 0x44);
    assert_eq!(DatabaseHeader::from_bytes(&bytes).unwrap(), header);
}

#[test]
fn test_bad_magic_is_rejected() {
    let mut bytes = DatabaseHeader::default().to_bytes();
    bytes[2] = b'X';
    assert!(matches!(
        DatabaseHeader::from_bytes(&bytes),
        Err(DatabaseError::InvalidHeader { .. })
    ));
}

#[test]
fn test_commit_keeps_counters_in_step() {
    let db = TempDatabase::new().unwrap();
    let mut file = db.table_file("t", &["a"]).unwrap();
    let before = file.header().file_change_counter;

    file.allocate_page(PageType::LeafTable).unwrap();
    file.commit().unwrap();

    assert_eq!(file.header().file_change_counter, before + 1);
    assert_eq!(file.header().version_valid_for, before + 1);
    assert_eq!(file.page_count(), 2);
    drop(file);

    let reopened = TableFile::open(db.file_path("t")).unwrap();
    assert_eq!(reopened.page_count(), 2);
    assert!(reopened.has_root());
}

#[test]
fn test_disagreeing_counters_recompute_page_count() {
    let db = TempDatabase::new().unwrap();
    let mut file = db.table_file("t", &["a"]).unwrap();
    file.allocate_page(PageType::LeafTable).unwrap();
    file.allocate_page(PageType::LeafTable).unwrap();
    drop(file);

    // page count still says 1 and the counters no longer match
    let mut raw = OpenOptions::new().write(true).open(db.file_path("t")).unwrap();
    raw.seek(SeekFrom::Start(0x40)).unwrap();
    raw.write_all(&0xFFFF_FFFFu32.to_be_bytes()).unwrap();
    drop(raw);

    let reopened = TableFile::open(db.file_path("t")).unwrap();
    assert_eq!(reopened.page_count(), 3);
}

#[test]
fn test_newer_write_version_opens_read_only() {
    let db = TempDatabase::new().unwrap();
    drop(db.table_file("t", &["a"]).unwrap());

    let mut raw = OpenOptions::new().write(true).open(db.file_path("t")).unwrap();
    raw.seek(SeekFrom::Start(0x16)).unwrap();
    raw.write_all(&[2]).unwrap();
    drop(raw);

    let mut file = TableFile::open(db.file_path("t")).unwrap();
    assert!(file.is_read_only());
    assert!(matches!(file.commit(), Err(DatabaseError::ReadOnly { .. })));
    assert!(matches!(
        file.allocate_page(PageType::LeafTable),
        Err(DatabaseError::ReadOnly { .. })
    ));
}

#[test]
fn test_newer_read_version_is_rejected() {
    let db = TempDatabase::new().unwrap();
    drop(db.table_file("t", &["a"]).unwrap());

    let mut raw = OpenOptions::new().write(true).open(db.file_path("t")).unwrap();
    raw.seek(SeekFrom::Start(0x17)).unwrap();
    raw.write_all(&[2]).unwrap();
    drop(raw);

    assert!(matches!(
        TableFile::open(db.file_path("t")),
        Err(DatabaseError::UnsupportedFileFormat { read: 2, .. })
    ));
}

#[test]
fn test_reading_past_the_end_is_corruption() {
    let db = TempDatabase::new().unwrap();
    let mut file = db.table_file("t", &["a"]).unwrap();
    assert!(matches!(file.read_page(5), Err(DatabaseError::CorruptedPage { page_number: 5, .. })));
}
