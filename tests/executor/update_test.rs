use std::fs;

use davisbase::{
    executor::{
        insert::{Inserter, TableInserter},
        predicate::{BoundPredicate, ComparisonOp},
        scan::{ScanRange, StoredRow, scan_table},
        update::RowUpdater,
    },
    storage::{
        bplus_tree::{BPlusTree, KeyMode},
        table_file::TableFile,
    },
    types::{RowKey, error::DatabaseError, value::Value},
    utils::mock::TempDatabase,
};

const KEY_MODE: KeyMode = KeyMode::PrimaryKey(0);

fn people(db: &TempDatabase, count: i32) -> TableFile {
    let mut file = db.table_file("people", &["id", "name", "age"]).unwrap();
    let mut inserter = TableInserter::new(&mut file, "people", KEY_MODE);
    for id in 1..=count {
        inserter
            .insert(vec![Value::Int(id), Value::Text(format!("person{:02}", id)), Value::SmallInt(20 + id as i16)])
            .unwrap();
    }
    file
}

fn row(file: &mut TableFile, id: RowKey) -> Option<StoredRow> {
    let predicate = BoundPredicate::new(0, ComparisonOp::Equal, Value::Int(id));
    scan_table(file, KEY_MODE, Some(&predicate)).unwrap().into_iter().next()
}

fn update_where_id(file: &mut TableFile, id: RowKey, assignments: &[(usize, Value)]) -> davisbase::types::error::Result<usize> {
    let range = ScanRange::full(&mut BPlusTree::new(file))?;
    RowUpdater::new(file, KEY_MODE).update(range, |row| Ok(row.row_key == id), assignments)
}

#[test]
fn test_same_width_update_stays_in_place() {
    let db = TempDatabase::new().unwrap();
    let mut file = people(&db, 6);
    let before = row(&mut file, 4).unwrap();

    let updated = update_where_id(&mut file, 4, &[(2, Value::SmallInt(99))]).unwrap();
    assert_eq!(updated, 1);

    let after = row(&mut file, 4).unwrap();
    assert_eq!(after.address, before.address);
    assert_eq!(after.values[2], Value::SmallInt(99));
    assert_eq!(after.values[1], before.values[1]);
}

#[test]
fn test_shorter_text_is_padded_in_place() {
    let db = TempDatabase::new().unwrap();
    let mut file = people(&db, 3);
    let before = row(&mut file, 2).unwrap();

    update_where_id(&mut file, 2, &[(1, Value::Text("al".into()))]).unwrap();

    let after = row(&mut file, 2).unwrap();
    assert_eq!(after.address, before.address);
    assert_eq!(after.type_codes, before.type_codes);
    assert_eq!(after.values[1].to_string(), "al");
}

#[test]
fn test_wider_text_is_reinserted() {
    let db = TempDatabase::new().unwrap();
    let mut file = people(&db, 6);
    let before = row(&mut file, 3).unwrap();

    update_where_id(&mut file, 3, &[(1, Value::Text("a considerably longer name".into()))]).unwrap();

    let after = row(&mut file, 3).unwrap();
    assert_ne!(after.address, before.address);
    assert_eq!(after.values[1], Value::Text("a considerably longer name".into()));
    assert_eq!(after.values[2], before.values[2]);

    let keys: Vec<_> = scan_table(&mut file, KEY_MODE, None).unwrap().iter().map(|r| r.row_key).collect();
    assert_eq!(keys, (1..=6).collect::<Vec<_>>());
}

#[test]
fn test_null_into_fixed_slot_of_same_width() {
    let db = TempDatabase::new().unwrap();
    let mut file = people(&db, 2);
    let before = row(&mut file, 1).unwrap();
    update_where_id(&mut file, 1, &[(2, Value::Null(davisbase::types::value::NullSlot::Two))]).unwrap();
    let after = row(&mut file, 1).unwrap();
    assert_eq!(after.address, before.address);
    assert!(after.values[2].is_null());
}

#[test]
fn test_primary_key_change_moves_row() {
    let db = TempDatabase::new().unwrap();
    let mut file = people(&db, 5);

    update_where_id(&mut file, 2, &[(0, Value::Int(50))]).unwrap();

    assert!(row(&mut file, 2).is_none());
    let moved = row(&mut file, 50).unwrap();
    assert_eq!(moved.values[0], Value::Int(50));
    assert_eq!(moved.values[1], Value::Text("person02".into()));
}

#[test]
fn test_primary_key_collision_changes_nothing() {
    let db = TempDatabase::new().unwrap();
    let mut file = people(&db, 5);
    let before = fs::read(db.file_path("people")).unwrap();

    let result = update_where_id(&mut file, 2, &[(0, Value::Int(4))]);
    assert!(matches!(result, Err(DatabaseError::DuplicateKey { key: 4 })));
    assert_eq!(fs::read(db.file_path("people")).unwrap(), before);
}

#[test]
fn test_update_many_rows() {
    let db = TempDatabase::new().unwrap();
    let mut file = people(&db, 10);
    let range = ScanRange::full(&mut BPlusTree::new(&mut file)).unwrap();
    let updated = RowUpdater::new(&mut file, KEY_MODE)
        .update(range, |row| Ok(row.row_key % 2 == 0), &[(1, Value::Text("an even longer replacement".into()))])
        .unwrap();
    assert_eq!(updated, 5);

    let rows = scan_table(&mut file, KEY_MODE, None).unwrap();
    assert_eq!(rows.len(), 10);
    for row in rows {
        let expected = if row.row_key % 2 == 0 {
            "an even longer replacement".to_string()
        } else {
            format!("person{:02}", row.row_key)
        };
        assert_eq!(row.values[1].to_string(), expected);
    }
}

#[test]
fn test_no_match_updates_nothing() {
    let db = TempDatabase::new().unwrap();
    let mut file = people(&db, 3);
    assert_eq!(update_where_id(&mut file, 77, &[(2, Value::SmallInt(1))]).unwrap(), 0);
}

#[test]
fn test_delete_tombstones_matching_rows() {
    let db = TempDatabase::new().unwrap();
    let mut file = people(&db, 10);
    let range = ScanRange::full(&mut BPlusTree::new(&mut file)).unwrap();

    let deleted = RowUpdater::new(&mut file, KEY_MODE)
        .delete(range, |row| Ok(row.row_key > 7 || row.row_key == 2))
        .unwrap();
    assert_eq!(deleted, 4);

    let keys: Vec<_> = scan_table(&mut file, KEY_MODE, None).unwrap().iter().map(|r| r.row_key).collect();
    assert_eq!(keys, vec![1, 3, 4, 5, 6, 7]);
    assert!(!BPlusTree::new(&mut file).contains_key(9).unwrap());
}

#[test]
fn test_deleted_key_can_be_reused() {
    let db = TempDatabase::new().unwrap();
    let mut file = people(&db, 4);
    let range = ScanRange::full(&mut BPlusTree::new(&mut file)).unwrap();
    RowUpdater::new(&mut file, KEY_MODE)
        .delete(range, |row| Ok(row.row_key == 3))
        .unwrap();

    TableInserter::new(&mut file, "people", KEY_MODE)
        .insert(vec![Value::Int(3), Value::Text("again".into()), Value::SmallInt(1)])
        .unwrap();
    assert_eq!(row(&mut file, 3).unwrap().values[1], Value::Text("again".into()));
}

#[test]
fn test_surrogate_reinsert_takes_next_row_key() {
    let db = TempDatabase::new().unwrap();
    let mut file = db.table_file("notes", &["body"]).unwrap();
    let mut inserter = TableInserter::new(&mut file, "notes", KeyMode::Surrogate);
    for i in 1..=8 {
        inserter.insert(vec![Value::Text(format!("note{}", i))]).unwrap();
    }

    let range = ScanRange::full(&mut BPlusTree::new(&mut file)).unwrap();
    let updated = RowUpdater::new(&mut file, KeyMode::Surrogate)
        .update(range, |row| Ok(row.row_key == 1), &[(0, Value::Text("a much longer note body".into()))])
        .unwrap();
    assert_eq!(updated, 1);

    let rows = scan_table(&mut file, KeyMode::Surrogate, None).unwrap();
    let keys: Vec<_> = rows.iter().map(|r| r.row_key).collect();
    assert_eq!(keys, vec![2, 3, 4, 5, 6, 7, 8, 9]);
    assert_eq!(rows[7].values[0], Value::Text("a much longer note body".into()));

    let mut tree = BPlusTree::new(&mut file);
    assert!(tree.contains_key(9).unwrap());
    assert!(!tree.contains_key(1).unwrap());
    assert_eq!(tree.next_row_key().unwrap(), 10);
}
