use std::{collections::HashMap, fs};

use davisbase::{
    executor::{
        predicate::{BoundPredicate, ComparisonOp, Predicate},
        scan::{StoredRow, scan_table},
    },
    storage::{
        bplus_tree::KeyMode,
        schema::{ColumnSchema, ColumnType, TableSchema},
        table_file::TableFile,
    },
    types::{
        ROOT_PAGE,
        error::{DatabaseError, ErrorKind},
        value::{NullSlot, Value},
    },
    utils::mock::TempDatabase,
};

fn users_schema() -> TableSchema {
    TableSchema::new(
        "users",
        vec![
            ColumnSchema::new("id", ColumnType::Int, 0).primary_key(),
            ColumnSchema::new("name", ColumnType::Text(None), 1).not_null(),
            ColumnSchema::new("age", ColumnType::TinyInt, 2),
            ColumnSchema::new("country", ColumnType::Text(Some(2)), 3).with_default(Value::Text("US".into())),
        ],
    )
}

fn user(id: i64, name: &str, age: i64) -> HashMap<String, Value> {
    HashMap::from([
        ("id".to_string(), Value::BigInt(id)),
        ("name".to_string(), Value::Text(name.to_string())),
        ("age".to_string(), Value::BigInt(age)),
    ])
}

#[test]
fn test_storage_manager_creates_layout() {
    let db = TempDatabase::with_prefix("layout_test").unwrap();
    let mut manager = db.storage_manager().unwrap();
    manager.create_table(users_schema()).unwrap();

    let config = db.config();
    assert!(config.tables_catalog_path().exists());
    assert!(config.columns_catalog_path().exists());
    let table_path = config.table_path("users");
    assert!(table_path.exists());
    // schema page plus an empty leaf root
    assert_eq!(fs::metadata(&table_path).unwrap().len(), 1024);
    assert_eq!(manager.table_names().unwrap(), vec!["users"]);
}

#[test]
fn test_users_workflow() {
    let db = TempDatabase::new().unwrap();
    let mut manager = db.storage_manager().unwrap();
    manager.create_table(users_schema()).unwrap();

    for (id, name, age) in [(1, "ann", 30), (2, "ben", 25), (3, "cat", 41), (4, "dan", 19)] {
        assert_eq!(manager.insert("users", &user(id, name, age)).unwrap(), id as i32);
    }

    // four rows split page 1 into leaves {1,2} and {3,4}
    let all = manager.select("users", None).unwrap();
    assert_eq!(all.row_keys(), vec![1, 2, 3, 4]);
    assert_eq!(all.columns, vec!["id", "name", "age", "country"]);
    assert_eq!(all.value(0, "country").unwrap().to_string(), "US");

    let older = manager.select("users", Some(&Predicate::gt("age", Value::Int(26)))).unwrap();
    assert_eq!(older.row_keys(), vec![1, 3]);

    let updated = manager
        .update(
            "users",
            &HashMap::from([("name".to_string(), Value::Text("benjamin".into()))]),
            Some(&Predicate::eq("id", Value::Int(2))),
        )
        .unwrap();
    assert_eq!(updated, 1);
    let ben = manager.select("users", Some(&Predicate::eq("id", Value::Int(2)))).unwrap();
    assert_eq!(ben.value(0, "name").unwrap(), &Value::Text("benjamin".into()));

    let deleted = manager.delete("users", Some(&Predicate::le("id", Value::Int(1)))).unwrap();
    assert_eq!(deleted, 1);
    assert_eq!(manager.select("users", None).unwrap().row_keys(), vec![2, 3, 4]);
    assert_eq!(manager.row_count("users").unwrap(), 3);
}

fn items_schema() -> TableSchema {
    TableSchema::new(
        "items",
        vec![
            ColumnSchema::new("id", ColumnType::Int, 0).primary_key(),
            ColumnSchema::new("name", ColumnType::Text(Some(10)), 1),
        ],
    )
}

fn stored_item(db: &TempDatabase, id: i32) -> StoredRow {
    let mut file = TableFile::open(db.config().table_path("items")).unwrap();
    let predicate = BoundPredicate::new(0, ComparisonOp::Equal, Value::Int(id));
    scan_table(&mut file, KeyMode::PrimaryKey(0), Some(&predicate))
        .unwrap()
        .into_iter()
        .next()
        .unwrap()
}

#[test]
fn test_end_to_end_scenario() {
    let db = TempDatabase::new().unwrap();
    let mut manager = db.storage_manager().unwrap();
    manager.create_table(items_schema()).unwrap();

    for (id, name) in [(1, "a"), (2, "bb"), (3, "ccc"), (4, "dddd")] {
        let values = HashMap::from([
            ("id".to_string(), Value::Int(id)),
            ("name".to_string(), Value::Text(name.to_string())),
        ]);
        manager.insert("items", &values).unwrap();
    }

    let mut file = TableFile::open(db.config().table_path("items")).unwrap();
    let root = file.read_page(ROOT_PAGE).unwrap();
    assert!(!root.is_leaf());
    assert_eq!(root.keys().unwrap(), vec![2]);

    let separator = root.cell_pointers().unwrap()[0] as usize;
    let left = file.read_page(root.left_child(separator).unwrap()).unwrap();
    let right = file.read_page(left.right_pointer).unwrap();
    assert_eq!(left.keys().unwrap(), vec![1, 2]);
    assert_eq!(right.keys().unwrap(), vec![3, 4]);
    assert_eq!(right.page_number, root.right_pointer);
    assert_eq!(right.right_pointer, 0);
    drop(file);

    let all = manager.select("items", None).unwrap();
    assert_eq!(all.row_keys(), vec![1, 2, 3, 4]);
    assert_eq!(all.value(3, "name").unwrap().to_string(), "dddd");
}

#[test]
fn test_full_width_text_update_stays_in_place() {
    let db = TempDatabase::new().unwrap();
    let mut manager = db.storage_manager().unwrap();
    manager.create_table(items_schema()).unwrap();
    for (id, name) in [(1, "a"), (2, "bb"), (3, "ccc"), (4, "dddd")] {
        let values = HashMap::from([
            ("id".to_string(), Value::Int(id)),
            ("name".to_string(), Value::Text(name.to_string())),
        ]);
        manager.insert("items", &values).unwrap();
    }
    let before = stored_item(&db, 2);

    let updated = manager
        .update(
            "items",
            &HashMap::from([("name".to_string(), Value::Text("bbbbbbbbbb".into()))]),
            Some(&Predicate::eq("id", Value::Int(2))),
        )
        .unwrap();
    assert_eq!(updated, 1);

    let after = stored_item(&db, 2);
    assert_eq!(after.address, before.address);
    assert_eq!(after.type_codes, before.type_codes);
    assert_eq!(after.values[1], Value::Text("bbbbbbbbbb".into()));
}

#[test]
fn test_data_survives_reopen() {
    let db = TempDatabase::new().unwrap();
    {
        let mut manager = db.storage_manager().unwrap();
        manager.create_table(users_schema()).unwrap();
        for id in 1..=10 {
            manager.insert("users", &user(id, &format!("u{}", id), 20)).unwrap();
        }
    }

    let mut manager = db.storage_manager().unwrap();
    let schema = manager.table_schema("USERS").unwrap();
    assert_eq!(schema, users_schema());
    assert_eq!(manager.row_count("users").unwrap(), 10);

    let maps = manager.select("users", Some(&Predicate::ge("id", Value::Int(9)))).unwrap().to_maps();
    assert_eq!(maps.len(), 2);
    assert_eq!(maps[0]["name"], Value::Text("u9".into()));
}

#[test]
fn test_row_count_tracks_inserts_and_deletes() {
    let db = TempDatabase::new().unwrap();
    let mut manager = db.storage_manager().unwrap();
    manager.create_table(users_schema()).unwrap();
    assert_eq!(manager.row_count("users").unwrap(), 0);

    for id in 1..=7 {
        manager.insert("users", &user(id, "x", 1)).unwrap();
    }
    assert_eq!(manager.row_count("users").unwrap(), 7);

    manager.delete("users", Some(&Predicate::gt("id", Value::Int(5)))).unwrap();
    assert_eq!(manager.row_count("users").unwrap(), 5);

    let catalog_row = manager
        .select("davisbase_tables", Some(&Predicate::eq("TABLE_NAME", Value::Text("users".into()))))
        .unwrap();
    assert_eq!(catalog_row.value(0, "TABLE_ROWS").unwrap(), &Value::Int(5));
}

#[test]
fn test_failed_insert_leaves_count_alone() {
    let db = TempDatabase::new().unwrap();
    let mut manager = db.storage_manager().unwrap();
    manager.create_table(users_schema()).unwrap();
    manager.insert("users", &user(1, "a", 1)).unwrap();

    let duplicate = manager.insert("users", &user(1, "b", 2));
    assert!(matches!(duplicate, Err(DatabaseError::DuplicateKey { key: 1 })));
    let too_old = manager.insert("users", &user(2, "c", 500));
    assert!(matches!(too_old, Err(DatabaseError::OutOfRange { .. })));

    assert_eq!(manager.row_count("users").unwrap(), 1);
}

#[test]
fn test_schema_violations() {
    let db = TempDatabase::new().unwrap();
    let mut manager = db.storage_manager().unwrap();
    manager.create_table(users_schema()).unwrap();

    let missing_name = HashMap::from([("id".to_string(), Value::Int(1))]);
    let err = manager.insert("users", &missing_name).unwrap_err();
    assert!(matches!(err, DatabaseError::MissingValue { .. }));
    assert_eq!(err.kind(), ErrorKind::Schema);

    let mut long_country = user(2, "x", 1);
    long_country.insert("country".to_string(), Value::Text("USA".into()));
    assert!(matches!(
        manager.insert("users", &long_country),
        Err(DatabaseError::ValueTooLong { max: 2, .. })
    ));

    let mut null_name = user(3, "x", 1);
    null_name.insert("name".to_string(), Value::Null(NullSlot::Eight));
    assert!(matches!(manager.insert("users", &null_name), Err(DatabaseError::NotNull { .. })));
}

#[test]
fn test_table_lifecycle_errors() {
    let db = TempDatabase::new().unwrap();
    let mut manager = db.storage_manager().unwrap();
    manager.create_table(users_schema()).unwrap();

    assert!(matches!(
        manager.create_table(users_schema()),
        Err(DatabaseError::TableAlreadyExists { .. })
    ));
    let catalog_clash = TableSchema::new(
        "davisbase_columns",
        vec![ColumnSchema::new("a", ColumnType::Int, 0)],
    );
    assert!(matches!(
        manager.create_table(catalog_clash),
        Err(DatabaseError::TableAlreadyExists { .. })
    ));
    assert!(matches!(
        manager.select("ghosts", None),
        Err(DatabaseError::TableNotFound { .. })
    ));
    assert!(matches!(
        manager.select("users", Some(&Predicate::eq("salary", Value::Int(1)))),
        Err(DatabaseError::ColumnNotFound { .. })
    ));
    assert!(manager.insert("davisbase_tables", &HashMap::new()).is_err());
}

#[test]
fn test_drop_table() {
    let db = TempDatabase::new().unwrap();
    let mut manager = db.storage_manager().unwrap();
    manager.create_table(users_schema()).unwrap();
    manager.insert("users", &user(1, "a", 1)).unwrap();
    let path = db.config().table_path("users");

    manager.drop_table("users").unwrap();
    assert!(!path.exists());
    assert!(!manager.table_exists("users").unwrap());
    assert!(manager.table_names().unwrap().is_empty());
    let columns = manager
        .select("davisbase_columns", Some(&Predicate::eq("TABLE_NAME", Value::Text("users".into()))))
        .unwrap();
    assert!(columns.is_empty());

    // the name is free again
    manager.create_table(users_schema()).unwrap();
    assert_eq!(manager.row_count("users").unwrap(), 0);
}

#[test]
fn test_databases_share_catalog_but_not_tables() {
    let db = TempDatabase::new().unwrap();
    let mut first = db.storage_manager().unwrap();
    first.create_table(users_schema()).unwrap();

    let mut second = davisbase::storage::storage_manager::StorageManager::open(db.config().with_database("other")).unwrap();
    assert!(second.table_names().unwrap().is_empty());
    assert!(!second.table_exists("users").unwrap());
    second.create_table(users_schema()).unwrap();
    assert_eq!(second.table_names().unwrap(), vec!["users"]);
    assert_eq!(first.table_names().unwrap(), vec!["users"]);
}

#[test]
fn test_surrogate_key_table() {
    let db = TempDatabase::new().unwrap();
    let mut manager = db.storage_manager().unwrap();
    manager
        .create_table(TableSchema::new(
            "notes",
            vec![
                ColumnSchema::new("title", ColumnType::Text(None), 0).primary_key(),
                ColumnSchema::new("created", ColumnType::DateTime, 1),
            ],
        ))
        .unwrap();

    for (i, title) in ["a", "b", "c", "d", "e"].iter().enumerate() {
        let values = HashMap::from([
            ("title".to_string(), Value::Text(title.to_string())),
            ("created".to_string(), Value::Text(format!("2024-05-0{} 08:00:00", i + 1))),
        ]);
        assert_eq!(manager.insert("notes", &values).unwrap(), i as i32 + 1);
    }

    let recent = manager
        .select("notes", Some(&Predicate::ge("created", Value::Text("2024-05-04".into()))))
        .unwrap();
    assert_eq!(recent.len(), 2);
    assert_eq!(recent.value(0, "created").unwrap().to_string(), "2024-05-04 08:00:00");
}

#[test]
fn test_failed_registration_leaves_no_catalog_rows() {
    let db = TempDatabase::new().unwrap();
    let mut manager = db.storage_manager().unwrap();

    // a write version above 1 makes the columns catalog read-only
    let columns_path = db.config().columns_catalog_path();
    let mut bytes = fs::read(&columns_path).unwrap();
    bytes[0x16] = 2;
    fs::write(&columns_path, bytes).unwrap();

    let result = manager.create_table(users_schema());
    assert!(matches!(result, Err(DatabaseError::ReadOnly { .. })));
    assert!(!db.config().table_path("users").exists());
    assert!(manager.table_names().unwrap().is_empty());
    let rows = manager
        .select("davisbase_tables", Some(&Predicate::eq("TABLE_NAME", Value::Text("users".into()))))
        .unwrap();
    assert!(rows.is_empty());
}
