use super::helpers::{create_table, open_engine, DOCS, USERS};
use crate::types::{Row, Type, Value};
use crate::*;
use anyhow::Result;
use std::fs;
use tempfile::tempdir;

fn seed_users(engine: &Engine, n: i64) -> Result<()> {
    for i in 1..=n {
        engine.insert(
            "users",
            row([
                ("user_id", Value::from(i)),
                ("user_name", format!("user{i}").into()),
                ("user_email", format!("user{i}@example.com").into()),
            ]),
        )?;
    }
    Ok(())
}

// --------------------- Select ---------------------

#[test]
fn select_empty_table() -> Result<()> {
    let dir = tempdir()?;
    create_table(dir.path(), "users", USERS);
    let engine = open_engine(dir.path());

    let mut res = engine.select("users", None)?;
    assert_eq!(res.count(), 0);
    assert!(res.next().is_none());
    Ok(())
}

#[test]
fn select_returns_rows_in_storage_order() -> Result<()> {
    let dir = tempdir()?;
    create_table(dir.path(), "users", USERS);
    let engine = open_engine(dir.path());
    seed_users(&engine, 5)?;

    let ids: Vec<i64> = engine
        .select("users", None)?
        .iter()
        .filter_map(|r| r["user_id"].as_int())
        .collect();
    assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    Ok(())
}

#[test]
fn select_round_trips_inserted_values() -> Result<()> {
    let dir = tempdir()?;
    create_table(dir.path(), "users", USERS);
    let engine = open_engine(dir.path());

    let values = row([
        ("user_id", Value::from(-42)),
        ("user_name", "Zoë".into()),
        ("user_email", "zoe@example.com".into()),
    ]);
    engine.insert("users", values.clone())?;

    let res = engine.select("users", None)?;
    assert_eq!(res.rows(), &[values]);
    Ok(())
}

#[test]
fn select_with_predicate() -> Result<()> {
    let dir = tempdir()?;
    create_table(dir.path(), "users", USERS);
    let engine = open_engine(dir.path());
    seed_users(&engine, 4)?;

    let p = Predicate::equal("user_id", 2).or(Predicate::equal("user_name", "user4"));
    let res = engine.select("users", Some(&p))?;

    let ids: Vec<_> = res.iter().map(|r| r["user_id"].clone()).collect();
    assert_eq!(ids, vec![Value::Int(2), Value::Int(4)]);
    Ok(())
}

#[test]
fn select_with_closure_filter() -> Result<()> {
    let dir = tempdir()?;
    create_table(dir.path(), "users", USERS);
    let engine = open_engine(dir.path());
    seed_users(&engine, 6)?;

    let even = |r: &Row| r["user_id"].as_int().map_or(false, |n| n % 2 == 0);
    let res = engine.select("users", Some(&even))?;
    assert_eq!(res.count(), 3);
    Ok(())
}

#[test]
fn cursor_walks_rows_once() -> Result<()> {
    let dir = tempdir()?;
    create_table(dir.path(), "users", USERS);
    let engine = open_engine(dir.path());
    seed_users(&engine, 2)?;

    let mut res = engine.select("users", None)?;
    assert_eq!(res.next().map(|r| r["user_id"].clone()), Some(Value::Int(1)));
    assert_eq!(res.next().map(|r| r["user_id"].clone()), Some(Value::Int(2)));
    assert!(res.next().is_none());
    assert!(res.next().is_none());

    res.rewind();
    assert!(res.next().is_some());
    assert_eq!(res.count(), 2);
    Ok(())
}

#[test]
fn select_resolves_blob_payloads() -> Result<()> {
    let dir = tempdir()?;
    create_table(dir.path(), "docs", DOCS);
    let engine = open_engine(dir.path());

    engine.insert("docs", row([("doc_body", Value::Blob(vec![0, 1, 2, 255]))]))?;

    let res = engine.select("docs", None)?;
    assert_eq!(res.rows()[0]["doc_body"], Value::Blob(vec![0, 1, 2, 255]));
    Ok(())
}

#[test]
fn select_missing_blob_file_fails() -> Result<()> {
    let dir = tempdir()?;
    let table = create_table(dir.path(), "docs", DOCS);
    let engine = open_engine(dir.path());

    engine.insert("docs", row([("doc_body", "text body")]))?;
    for entry in fs::read_dir(table.join("blobs"))? {
        fs::remove_file(entry?.path())?;
    }

    let err = engine.select("docs", None).unwrap_err();
    assert!(matches!(err, Error::FileNotFound(ref p) if p.parent().map_or(false, |d| d.ends_with("blobs"))));
    Ok(())
}

// --------------------- Range ---------------------

#[test]
fn select_range_windows_records() -> Result<()> {
    let dir = tempdir()?;
    create_table(dir.path(), "users", USERS);
    let engine = open_engine(dir.path());
    seed_users(&engine, 10)?;

    let ids = |res: QueryResult| -> Vec<i64> { res.iter().filter_map(|r| r["user_id"].as_int()).collect() };

    assert_eq!(ids(engine.select_range("users", 3, Some(4), None)?), vec![4, 5, 6, 7]);
    assert_eq!(ids(engine.select_range("users", 8, None, None)?), vec![9, 10]);
    assert_eq!(ids(engine.select_range("users", 8, Some(100), None)?), vec![9, 10]);
    assert!(engine.select_range("users", 20, Some(5), None)?.is_empty());
    assert!(engine.select_range("users", 0, Some(0), None)?.is_empty());
    Ok(())
}

#[test]
fn select_range_far_past_end_is_empty() -> Result<()> {
    let dir = tempdir()?;
    create_table(dir.path(), "users", USERS);
    let engine = open_engine(dir.path());
    seed_users(&engine, 3)?;

    assert!(engine.select_range("users", u64::MAX / 8, Some(1), None)?.is_empty());
    assert!(engine.select_range("users", u64::MAX, None, None)?.is_empty());
    assert!(engine.select_range("users", u64::MAX / 200, None, None)?.is_empty());
    Ok(())
}

#[test]
fn select_range_filters_within_window() -> Result<()> {
    let dir = tempdir()?;
    create_table(dir.path(), "users", USERS);
    let engine = open_engine(dir.path());
    seed_users(&engine, 10)?;

    let p = Predicate::equal("user_id", 2).or(Predicate::equal("user_id", 5));
    let res = engine.select_range("users", 3, Some(4), Some(&p))?;
    assert_eq!(res.count(), 1);
    assert_eq!(res.rows()[0]["user_id"], Value::Int(5));
    Ok(())
}

// --------------------- Damaged files ---------------------

#[test]
fn partial_tail_ends_scan() -> Result<()> {
    let dir = tempdir()?;
    let table = create_table(dir.path(), "users", USERS);
    let engine = open_engine(dir.path());
    seed_users(&engine, 3)?;

    let mut data = fs::read(table.join("data"))?;
    data.extend_from_slice(b"half a record");
    fs::write(table.join("data"), &data)?;

    assert_eq!(engine.select("users", None)?.count(), 3);
    Ok(())
}

#[test]
fn undefined_type_fails_every_operation() -> Result<()> {
    let dir = tempdir()?;
    create_table(dir.path(), "topics", "int topic_id primary\nfooType topic_title\n");
    let engine = open_engine(dir.path());

    let is_type_error =
        |e: &Error| matches!(e, Error::Schema(SchemaError::UnknownType { ty, .. }) if ty == "fooType");

    assert!(is_type_error(&engine.select("topics", None).unwrap_err()));
    assert!(is_type_error(&engine.insert("topics", row([("topic_id", 1)])).unwrap_err()));
    assert!(is_type_error(&engine.update("topics", &row([("topic_id", 2)]), None).unwrap_err()));
    assert!(is_type_error(&engine.delete("topics", None).unwrap_err()));
    assert!(is_type_error(&engine.truncate("topics").unwrap_err()));
    assert!(is_type_error(&engine.schema("topics").unwrap_err()));
    Ok(())
}

#[test]
fn schema_is_reloaded_per_operation() -> Result<()> {
    let dir = tempdir()?;
    let table = create_table(dir.path(), "users", USERS);
    let engine = open_engine(dir.path());

    assert_eq!(engine.schema("users")?.columns().len(), 3);
    fs::write(table.join("definition"), "int user_id primary\n")?;

    let schema = engine.schema("users")?;
    assert_eq!(schema.columns().len(), 1);
    assert_eq!(schema.columns()[0].ty, Type::Int);
    Ok(())
}

#[test]
fn missing_table_is_file_not_found() -> Result<()> {
    let dir = tempdir()?;
    let engine = open_engine(dir.path());

    let err = engine.select("ghost", None).unwrap_err();
    assert!(matches!(err, Error::FileNotFound(_)));
    assert!(err.is_file_access());
    Ok(())
}

#[test]
fn missing_data_file_is_file_not_found() -> Result<()> {
    let dir = tempdir()?;
    let table = create_table(dir.path(), "users", USERS);
    fs::remove_file(table.join("data"))?;
    let engine = open_engine(dir.path());

    let err = engine.select("users", None).unwrap_err();
    assert!(matches!(err, Error::FileNotFound(ref p) if p.ends_with("data")));
    Ok(())
}

#[test]
fn invalid_table_name_is_rejected() -> Result<()> {
    let dir = tempdir()?;
    let engine = open_engine(dir.path());

    let err = engine.select("../etc", None).unwrap_err();
    assert!(matches!(err, Error::InvalidTable(_)));
    Ok(())
}

#[test]
fn engine_requires_existing_root() {
    let dir = tempdir().unwrap();
    let err = Engine::new(StorageConfig::new(dir.path().join("nope"))).unwrap_err();
    assert!(matches!(err, Error::FileNotFound(_)));
}
