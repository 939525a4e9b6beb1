//! Integration tests for the relational cache public interface.
//!
//! Every test runs against a SQLite database in a temporary directory.

use relcache::relational::{CursorMode, FetchSize, Operation};
use relcache::{
    Cache, CacheError, CacheValue, Key, RelationalCache, RelationalEngine, StoreOptions,
    TableConfig, Value,
};
use std::path::Path;
use tempfile::TempDir;

fn scope_a() -> TableConfig {
    TableConfig::builder("a")
        .unique_columns(["id"])
        .data_columns(["id", "name", "comment", "count"])
        .column_type("count", "int")
        .build()
        .unwrap()
}

fn scope_b() -> TableConfig {
    TableConfig::new("b", ["eid"], ["eid", "name", "comment", "status"]).unwrap()
}

fn open_ab(path: &Path) -> RelationalCache {
    RelationalCache::builder()
        .scope(scope_a())
        .scope(scope_b())
        .open_sqlite(path)
        .unwrap()
}

fn a_value(name: &str, comment: &str, count: i64) -> CacheValue {
    CacheValue::map([
        ("name", Value::from(name)),
        ("comment", Value::from(comment)),
        ("count", Value::from(count)),
    ])
}

#[test]
fn test_scenario() {
    let temp_dir = TempDir::new().unwrap();
    let mut cache = open_ab(&temp_dir.path().join("t.db"));
    let (a, b, c) = (Key::from("a"), Key::from("b"), Key::from("c"));

    cache
        .set(&Key::from("a1"), &a_value("jii", "this is a1", 1), Some(&a))
        .unwrap();
    cache
        .set(&Key::from("a2"), &a_value("iiwwww", "this is a2", 3), Some(&a))
        .unwrap();
    cache
        .set(
            &Key::from("b1"),
            &CacheValue::map([
                ("name", Value::from("12b")),
                ("comment", Value::from("this is b1")),
                ("status", Value::from(7)),
            ]),
            Some(&b),
        )
        .unwrap();

    let err = cache
        .set(
            &Key::from("c1"),
            &CacheValue::map([("id", "c1"), ("data", "iiejje")]),
            Some(&c),
        )
        .unwrap_err();
    assert!(matches!(err, CacheError::ScopeNotAllowed { .. }));

    cache
        .set(&Key::from("a1"), &a_value("jjii", "this is a1 again", 4), Some(&a))
        .unwrap();
    assert_eq!(
        cache.fetch(&Key::from("a1"), Some(&a)).unwrap(),
        Some(CacheValue::map([
            ("id", Value::from("a1")),
            ("name", Value::from("jjii")),
            ("comment", Value::from("this is a1 again")),
            ("count", Value::from(4)),
        ]))
    );

    cache.pop(&Key::from("a2"), Some(&a)).unwrap();
    assert!(!cache.exists(&Key::from("a2"), Some(&a)).unwrap());
    assert!(cache.exists(&Key::from("a1"), Some(&a)).unwrap());
    assert_eq!(cache.keys(Some(&a)).unwrap(), vec![Key::from("a1")]);
    assert_eq!(cache.scopes().unwrap(), vec![a, b]);
}

#[test]
fn test_value_conflicting_with_key() {
    let temp_dir = TempDir::new().unwrap();
    let mut cache = open_ab(&temp_dir.path().join("t.db"));

    let value = CacheValue::map([("id", "other"), ("name", "x")]);
    let err = cache
        .set(&Key::from("a1"), &value, Some(&Key::from("a")))
        .unwrap_err();
    assert!(matches!(err, CacheError::KeyConflict { .. }));
    assert!(!cache.exists(&Key::from("a1"), Some(&Key::from("a"))).unwrap());
}

#[test]
fn test_upsert_overwrites() {
    let temp_dir = TempDir::new().unwrap();
    let mut cache = RelationalCache::builder()
        .scope(TableConfig::new("kv", ["id"], ["data"]).unwrap())
        .open_sqlite(temp_dir.path().join("kv.db"))
        .unwrap();
    let (k, scope) = (Key::from("k"), Key::from("kv"));

    cache.set(&k, &CacheValue::from("v1"), Some(&scope)).unwrap();
    cache.set(&k, &CacheValue::from("v2"), Some(&scope)).unwrap();
    assert_eq!(
        cache.fetch(&k, Some(&scope)).unwrap(),
        Some(CacheValue::from("v2"))
    );
    assert_eq!(cache.keys(Some(&scope)).unwrap().len(), 1);
}

#[test]
fn test_partial_map_clears_missing_columns() {
    let temp_dir = TempDir::new().unwrap();
    let mut cache = open_ab(&temp_dir.path().join("t.db"));
    let (k, a) = (Key::from("a1"), Key::from("a"));

    cache.set(&k, &a_value("jii", "first", 1), Some(&a)).unwrap();
    cache
        .set(&k, &CacheValue::map([("name", "second")]), Some(&a))
        .unwrap();

    let value = cache.fetch(&k, Some(&a)).unwrap().unwrap();
    let row = value.as_map().unwrap();
    assert_eq!(row["name"], Value::from("second"));
    assert_eq!(row["comment"], Value::Null);
    assert_eq!(row["count"], Value::Null);
}

#[test]
fn test_extra_map_columns_are_dropped() {
    let temp_dir = TempDir::new().unwrap();
    let mut cache = open_ab(&temp_dir.path().join("t.db"));
    let (k, a) = (Key::from("a1"), Key::from("a"));

    let value = CacheValue::map([("name", "x"), ("extra", "y")]);
    assert!(cache.set(&k, &value, Some(&a)).unwrap());

    let stored = cache.fetch(&k, Some(&a)).unwrap().unwrap();
    let row = stored.as_map().unwrap();
    assert_eq!(row["name"], Value::from("x"));
    assert!(!row.contains_key("extra"));
}

#[test]
fn test_discovered_keys_only_table() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("tags.db");

    let mut engine = RelationalEngine::open_sqlite(&path, &StoreOptions::default()).unwrap();
    engine
        .execute(
            &[Operation::new("CREATE TABLE tags (tag text, PRIMARY KEY (tag))")],
            CursorMode::Fresh,
            FetchSize::None,
            true,
        )
        .unwrap();
    engine.close().unwrap();

    let mut cache = RelationalCache::open_sqlite(&path).unwrap();
    let scope = Key::from("tags");
    cache
        .set(&Key::from("k"), &CacheValue::from("v"), Some(&scope))
        .unwrap();
    assert!(cache.exists(&Key::from("k"), Some(&scope)).unwrap());
    assert_eq!(
        cache.fetch(&Key::from("k"), Some(&scope)).unwrap(),
        Some(CacheValue::from("k"))
    );
}

#[test]
fn test_deletion() {
    let temp_dir = TempDir::new().unwrap();
    let mut cache = open_ab(&temp_dir.path().join("t.db"));
    let (k, a) = (Key::from("a9"), Key::from("a"));

    cache.set(&k, &a_value("n", "c", 9), Some(&a)).unwrap();
    cache.pop(&k, Some(&a)).unwrap();
    assert!(!cache.exists(&k, Some(&a)).unwrap());
    assert_eq!(
        cache.fetch_or(&k, Some(&a), CacheValue::from("X")).unwrap(),
        CacheValue::from("X")
    );
    // Popping again is not an error.
    cache.pop(&k, Some(&a)).unwrap();
}

#[test]
fn test_composite_keys() {
    let temp_dir = TempDir::new().unwrap();
    let mut cache = RelationalCache::builder()
        .scope(
            TableConfig::builder("pairs")
                .unique_columns(["id1", "id2"])
                .data_columns(["data"])
                .column_type("data", "int")
                .build()
                .unwrap(),
        )
        .open_sqlite(temp_dir.path().join("pairs.db"))
        .unwrap();
    let scope = Key::from("pairs");
    let key = Key::from(("d1", "d2"));

    cache.set(&key, &CacheValue::from(3), Some(&scope)).unwrap();
    assert_eq!(
        cache.get(&key, Some(&scope), None).unwrap(),
        Some(CacheValue::from(3))
    );
    assert_eq!(cache.keys(Some(&scope)).unwrap(), vec![key]);

    let err = cache.fetch(&Key::from("d1"), Some(&scope)).unwrap_err();
    assert!(matches!(
        err,
        CacheError::KeyArity {
            expected: 2,
            actual: 1,
            ..
        }
    ));
    assert!(cache
        .exists(&Key::from(("d1", "d2", "d3")), Some(&scope))
        .is_err());
}

#[test]
fn test_unknown_scope_with_factory() {
    let temp_dir = TempDir::new().unwrap();
    let mut cache = RelationalCache::builder()
        .scope_factory(|scope| TableConfig::new(scope, ["id"], ["data"]))
        .open_sqlite(temp_dir.path().join("lazy.db"))
        .unwrap();
    let scope = Key::from("never_seen");

    assert_eq!(
        cache
            .fetch_or(&Key::from("k"), Some(&scope), CacheValue::from("default"))
            .unwrap(),
        CacheValue::from("default")
    );
    assert_eq!(cache.scopes().unwrap(), vec![scope.clone()]);

    let mut computed = || -> relcache::Result<CacheValue> { Ok(CacheValue::from("computed")) };
    assert_eq!(
        cache
            .get(&Key::from("k"), Some(&scope), Some(&mut computed))
            .unwrap(),
        Some(CacheValue::from("computed"))
    );
    assert!(cache.exists(&Key::from("k"), Some(&scope)).unwrap());
}

#[test]
fn test_auto_discovery() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("existing.db");

    let mut engine = RelationalEngine::open_sqlite(&path, &StoreOptions::default()).unwrap();
    engine
        .execute(
            &[
                Operation::new("CREATE TABLE t (pk text, data text, PRIMARY KEY (pk))"),
                Operation::new("INSERT INTO t VALUES ('k1', 'v1')"),
            ],
            CursorMode::Fresh,
            FetchSize::None,
            true,
        )
        .unwrap();
    engine.close().unwrap();

    let mut cache = RelationalCache::open_sqlite(&path).unwrap();
    assert_eq!(cache.scopes().unwrap(), vec![Key::from("t")]);

    let scope = Key::from("t");
    assert_eq!(
        cache.fetch(&Key::from("k1"), Some(&scope)).unwrap(),
        Some(CacheValue::map([("pk", "k1"), ("data", "v1")]))
    );
    cache
        .set(&Key::from("k2"), &CacheValue::map([("data", "v2")]), Some(&scope))
        .unwrap();
    assert_eq!(cache.keys(Some(&scope)).unwrap().len(), 2);
}

#[test]
fn test_data_survives_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("t.db");

    let mut cache = open_ab(&path);
    cache
        .set(&Key::from("a1"), &a_value("jii", "persisted", 1), Some(&Key::from("a")))
        .unwrap();
    cache.close().unwrap();

    // Explicit configs for existing tables are fine on reopen.
    let mut cache = open_ab(&path);
    let value = cache
        .fetch(&Key::from("a1"), Some(&Key::from("a")))
        .unwrap()
        .unwrap();
    assert_eq!(value.as_map().unwrap()["comment"], Value::from("persisted"));
}
