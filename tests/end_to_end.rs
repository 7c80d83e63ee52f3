use pagedb::storage::Value;
use pagedb::{Database, DatabaseConfig, ErrorKind, PredicateMode, QueryResult};
use tempfile::TempDir;

fn open(dir: &TempDir) -> Database {
    Database::open(DatabaseConfig::new(dir.path())).unwrap()
}

fn run(db: &mut Database, sql: &str) -> QueryResult {
    let result = db.execute_query(sql);
    assert!(result.success, "{} failed: {}", sql, result.message);
    result
}

fn values(result: &QueryResult) -> Vec<Vec<Value>> {
    result.rows.iter().map(|r| r.values().to_vec()).collect()
}

fn alice() -> Vec<Value> {
    vec![Value::Integer(1), Value::String("Alice".to_string())]
}

fn bob() -> Vec<Value> {
    vec![Value::Integer(2), Value::String("Bob".to_string())]
}

fn files_of(dir: &TempDir, prefix: &str) -> Vec<String> {
    std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .filter(|name| name.starts_with(prefix))
        .collect()
}

#[test]
fn test_select_by_equality() {
    let dir = TempDir::new().unwrap();
    let mut db = open(&dir);

    let result = run(&mut db, "CREATE TABLE t (id INTEGER, name VARCHAR)");
    assert_eq!(result.message, "Table created: t");
    assert!(db.table_exists("t"));

    run(&mut db, "INSERT INTO t VALUES (1, 'Alice')");
    run(&mut db, "INSERT INTO t VALUES (2, 'Bob')");

    let result = run(&mut db, "SELECT * FROM t WHERE id = 2");
    assert_eq!(result.columns, vec!["id".to_string(), "name".to_string()]);
    assert_eq!(values(&result), vec![bob()]);
}

#[test]
fn test_index_scan_after_create_index() {
    let dir = TempDir::new().unwrap();
    let mut db = open(&dir);
    run(&mut db, "CREATE TABLE t (id INTEGER, name VARCHAR)");
    run(&mut db, "INSERT INTO t VALUES (1, 'Alice')");
    run(&mut db, "INSERT INTO t VALUES (2, 'Bob')");

    let result = run(&mut db, "CREATE INDEX idx ON t (id)");
    assert_eq!(result.message, "Index created: idx");

    let sql = "SELECT * FROM t WHERE id = 1";
    let plan = db.explain(sql).unwrap();
    assert!(plan.uses_index_scan(), "expected IndexScan in\n{}", plan);

    let result = run(&mut db, sql);
    assert_eq!(values(&result), vec![alice()]);
}

#[test]
fn test_index_scan_matches_seq_scan() {
    let dir = TempDir::new().unwrap();
    let mut db = open(&dir);
    run(&mut db, "CREATE TABLE t (id INTEGER, name VARCHAR)");
    for i in 0..60 {
        run(&mut db, &format!("INSERT INTO t VALUES ({}, 'n{}')", i % 7, i));
    }

    let sql = "SELECT name FROM t WHERE id = 3";
    assert!(!db.explain(sql).unwrap().uses_index_scan());
    let mut before = values(&run(&mut db, sql));

    run(&mut db, "CREATE INDEX t_id_idx ON t (id)");
    assert!(db.explain(sql).unwrap().uses_index_scan());
    let mut after = values(&run(&mut db, sql));

    before.sort_by_key(|r| r[0].to_string());
    after.sort_by_key(|r| r[0].to_string());
    assert_eq!(before.len(), 9);
    assert_eq!(before, after);
}

#[test]
fn test_range_on_indexed_column_uses_seq_scan() {
    let dir = TempDir::new().unwrap();
    let mut db = open(&dir);
    run(&mut db, "CREATE TABLE t (id INTEGER, name VARCHAR)");
    run(&mut db, "CREATE INDEX idx ON t (id)");
    run(&mut db, "INSERT INTO t VALUES (1, 'Alice')");
    run(&mut db, "INSERT INTO t VALUES (2, 'Bob')");

    let sql = "SELECT * FROM t WHERE id > 1";
    assert!(!db.explain(sql).unwrap().uses_index_scan());
    assert_eq!(values(&run(&mut db, sql)), vec![bob()]);
}

#[test]
fn test_insertion_order_across_pages() {
    let dir = TempDir::new().unwrap();
    let config = DatabaseConfig::new(dir.path()).buffer_pool_size(2);
    let mut db = Database::open(config).unwrap();
    run(&mut db, "CREATE TABLE t (id INTEGER, name VARCHAR)");

    for i in 0..120 {
        run(&mut db, &format!("INSERT INTO t VALUES ({}, 'row{}')", i, i));
    }

    let result = run(&mut db, "SELECT id FROM t");
    let ids: Vec<Value> = result.rows.iter().map(|r| r.values()[0].clone()).collect();
    let expected: Vec<Value> = (0..120).map(Value::Integer).collect();
    assert_eq!(ids, expected);
    assert!(files_of(&dir, "t_page_").len() >= 4);
}

#[test]
fn test_drop_table_removes_every_file() {
    let dir = TempDir::new().unwrap();
    let mut db = open(&dir);
    run(&mut db, "CREATE TABLE t (id INTEGER, name VARCHAR)");
    run(&mut db, "INSERT INTO t VALUES (1, 'Alice')");
    run(&mut db, "CREATE INDEX idx ON t (id)");
    assert!(!files_of(&dir, "t.").is_empty());
    assert!(!files_of(&dir, "idx.").is_empty());

    let result = run(&mut db, "DROP TABLE t");
    assert_eq!(result.message, "Table dropped: t");
    assert!(!db.table_exists("t"));
    assert!(db.list_indexes().is_empty());

    assert!(files_of(&dir, "t.").is_empty());
    assert!(files_of(&dir, "t_page_").is_empty());
    assert!(files_of(&dir, "idx.").is_empty());
}

#[test]
fn test_varchar_over_limit_is_rejected() {
    let dir = TempDir::new().unwrap();
    let mut db = open(&dir);
    run(&mut db, "CREATE TABLE t (id INTEGER, name VARCHAR)");
    run(&mut db, "INSERT INTO t VALUES (1, 'Alice')");

    let long = "x".repeat(101);
    let err = db
        .execute(&format!("INSERT INTO t VALUES (2, '{}')", long))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Storage);

    let exact = "y".repeat(100);
    run(&mut db, &format!("INSERT INTO t VALUES (3, '{}')", exact));

    // The rejected row left nothing behind and its neighbours are intact
    let result = run(&mut db, "SELECT * FROM t");
    assert_eq!(
        values(&result),
        vec![
            alice(),
            vec![Value::Integer(3), Value::String(exact)],
        ]
    );
}

#[test]
fn test_reopen_restores_tables_and_indexes() {
    let dir = TempDir::new().unwrap();
    {
        let mut db = open(&dir);
        run(&mut db, "CREATE TABLE t (id INTEGER, name VARCHAR)");
        run(&mut db, "INSERT INTO t VALUES (1, 'Alice')");
        run(&mut db, "CREATE INDEX idx ON t (id)");
        run(&mut db, "INSERT INTO t VALUES (2, 'Bob')");
        db.close().unwrap();
    }

    let mut db = open(&dir);
    assert!(db.table_exists("t"));
    assert_eq!(db.list_indexes(), vec!["idx".to_string()]);

    let sql = "SELECT * FROM t WHERE id = 2";
    assert!(db.explain(sql).unwrap().uses_index_scan());
    assert_eq!(values(&run(&mut db, sql)), vec![bob()]);
    assert_eq!(run(&mut db, "SELECT * FROM t").rows.len(), 2);
}

#[test]
fn test_pages_survive_without_write_through() {
    let dir = TempDir::new().unwrap();
    {
        let config = DatabaseConfig::new(dir.path()).write_through(false);
        let mut db = Database::open(config).unwrap();
        run(&mut db, "CREATE TABLE t (id INTEGER, name VARCHAR)");
        run(&mut db, "INSERT INTO t VALUES (1, 'Alice')");
        // dropped without close: Drop flushes the pool
    }

    let mut db = open(&dir);
    assert_eq!(values(&run(&mut db, "SELECT * FROM t")), vec![alice()]);
}

#[test]
fn test_left_branch_and_full_predicates() {
    let dir = TempDir::new().unwrap();
    {
        let mut db = open(&dir);
        run(&mut db, "CREATE TABLE t (id INTEGER, name VARCHAR)");
        for (id, name) in [(1, "a"), (2, "b"), (3, "c")] {
            run(&mut db, &format!("INSERT INTO t VALUES ({}, '{}')", id, name));
        }

        // Only the leftmost comparison is applied
        let result = run(&mut db, "SELECT id FROM t WHERE id > 1 AND id < 3");
        assert_eq!(result.rows.len(), 2);
    }

    let config = DatabaseConfig::new(dir.path()).predicate_mode(PredicateMode::Full);
    let mut db = Database::open(config).unwrap();
    let result = run(&mut db, "SELECT id FROM t WHERE id > 1 AND id < 3");
    assert_eq!(values(&result), vec![vec![Value::Integer(2)]]);

    let result = run(&mut db, "SELECT id FROM t WHERE id = 1 OR name = 'c'");
    assert_eq!(
        values(&result),
        vec![vec![Value::Integer(1)], vec![Value::Integer(3)]]
    );
}

#[test]
fn test_insert_with_column_list_and_flipped_comparison() {
    let dir = TempDir::new().unwrap();
    let mut db = open(&dir);
    run(&mut db, "CREATE TABLE t (id INTEGER, name VARCHAR)");
    run(&mut db, "INSERT INTO t (name, id) VALUES ('Alice', 1)");
    run(&mut db, "INSERT INTO t VALUES (2, 'Bob')");

    let result = run(&mut db, "SELECT name, id FROM t WHERE 2 <= id");
    assert_eq!(result.columns, vec!["name".to_string(), "id".to_string()]);
    assert_eq!(
        values(&result),
        vec![vec![Value::String("Bob".to_string()), Value::Integer(2)]]
    );
}

#[test]
fn test_errors_do_not_poison_the_session() {
    let dir = TempDir::new().unwrap();
    let mut db = open(&dir);

    let cases = [
        ("SELEC * FROM t", ErrorKind::Syntax),
        ("SELECT * FROM nowhere", ErrorKind::Semantic),
        ("CREATE TABLE t (id BLOB)", ErrorKind::Semantic),
    ];
    for (sql, kind) in cases {
        let err = db.execute(sql).unwrap_err();
        assert_eq!(err.kind(), kind, "{}", sql);
    }

    run(&mut db, "CREATE TABLE t (id INTEGER, name VARCHAR)");
    let result = db.execute_query("INSERT INTO t VALUES (1)");
    assert!(!result.success);
    let result = db.execute_query("CREATE TABLE t (id INTEGER)");
    assert!(!result.success);
    let result = db.execute_query("SELECT missing FROM t");
    assert!(!result.success);

    run(&mut db, "INSERT INTO t VALUES (1, 'Alice')");
    assert_eq!(values(&run(&mut db, "SELECT * FROM t")), vec![alice()]);
}
