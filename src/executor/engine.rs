//! Query Executor for PageDB
//!
//! Runs resolved statements. DDL and INSERT are carried out directly against storage and
//! the index registry; SELECT goes through the planner, the optimizer and the operator
//! tree.

use serde::Serialize;
use tracing::{debug, info};

use super::operators::build_executor;
use super::{LogicalPlan, Optimizer, PhysicalPlan, Planner};
use crate::catalog::{Column, TableMetadata};
use crate::config::DatabaseConfig;
use crate::error::{Error, Result};
use crate::index::{IndexKey, IndexManager};
use crate::sql::QueryTree;
use crate::storage::{BufferPool, Row, StorageManager, Value};

/// Query result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult {
    /// Whether the statement succeeded
    pub success: bool,
    /// Status or error text
    pub message: String,
    /// Column names
    pub columns: Vec<String>,
    /// Result rows
    pub rows: Vec<Row>,
    /// Number of affected rows (for INSERT)
    pub affected_rows: usize,
}

impl QueryResult {
    /// Create a result with a message
    pub fn with_message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            columns: Vec::new(),
            rows: Vec::new(),
            affected_rows: 0,
        }
    }

    /// Create a result with affected rows count
    pub fn with_affected_rows(count: usize, message: impl Into<String>) -> Self {
        Self {
            affected_rows: count,
            ..Self::with_message(message)
        }
    }

    /// Create a result carrying rows
    pub fn with_rows(columns: Vec<String>, rows: Vec<Row>) -> Self {
        let message = format!("{} row(s) returned", rows.len());
        Self {
            columns,
            rows,
            ..Self::with_message(message)
        }
    }

    /// Create a failed result
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            ..Self::with_message(message)
        }
    }
}

/// Execution Engine
///
/// Borrows the database's components for the duration of one statement.
pub struct ExecutionEngine<'a> {
    storage: &'a mut StorageManager,
    pool: &'a mut BufferPool,
    indexes: &'a mut IndexManager,
    config: &'a DatabaseConfig,
}

impl<'a> ExecutionEngine<'a> {
    /// Create a new execution engine
    pub fn new(
        storage: &'a mut StorageManager,
        pool: &'a mut BufferPool,
        indexes: &'a mut IndexManager,
        config: &'a DatabaseConfig,
    ) -> Self {
        Self {
            storage,
            pool,
            indexes,
            config,
        }
    }

    /// Execute a resolved statement
    pub fn execute(&mut self, query: QueryTree) -> Result<QueryResult> {
        match query {
            QueryTree::CreateTable { table, columns } => self.execute_create_table(table, columns),
            QueryTree::CreateIndex {
                index_name,
                table,
                column,
            } => self.execute_create_index(&index_name, &table, &column),
            QueryTree::DropTable { table } => self.execute_drop_table(&table),
            QueryTree::Insert { table, values } => self.execute_insert(&table, values),
            select @ QueryTree::Select { .. } => self.execute_select(select),
        }
    }

    /// Plan and optimize a SELECT without running it
    pub fn plan_select(&self, query: QueryTree) -> Result<PhysicalPlan> {
        let logical: LogicalPlan = Planner::new(self.config.predicate_mode).plan(query)?;
        let physical = Optimizer::new(self.indexes).optimize(logical);
        debug!(plan = %physical, "physical plan");
        Ok(physical)
    }

    fn execute_create_table(&mut self, table: String, columns: Vec<Column>) -> Result<QueryResult> {
        let mut metadata = TableMetadata::new(&table);
        for column in columns {
            metadata.add_column(column.name, column.data_type);
        }
        self.storage.create_table(metadata)?;
        Ok(QueryResult::with_message(format!("Table created: {}", table)))
    }

    fn execute_create_index(
        &mut self,
        index_name: &str,
        table: &str,
        column: &str,
    ) -> Result<QueryResult> {
        if self.indexes.index_exists(index_name) {
            return Err(Error::IndexAlreadyExists(index_name.to_string()));
        }

        let position = self
            .storage
            .table_metadata(table)?
            .column_index(column)
            .ok_or_else(|| Error::ColumnNotFound(column.to_string(), table.to_string()))?;
        let rows = self.storage.scan_rows(self.pool, table)?;

        let index = self.indexes.create_index(index_name, table, column)?;
        for (location, row) in &rows {
            if let Some(value) = row.get(position) {
                index
                    .tree
                    .insert(IndexKey::new(value.clone()), location.page_id, location.slot_id);
            }
        }
        self.indexes.save_index(index_name)?;

        info!(index = index_name, table, entries = rows.len(), "index built");
        Ok(QueryResult::with_message(format!("Index created: {}", index_name)))
    }

    fn execute_drop_table(&mut self, table: &str) -> Result<QueryResult> {
        if !self.storage.table_exists(table) {
            return Err(Error::TableNotFound(table.to_string()));
        }
        let dropped = self.storage.drop_table(self.pool, table);
        // Indexes follow the table only once it is gone from the catalog
        if !self.storage.table_exists(table) {
            self.indexes.drop_indexes_for_table(table)?;
        }
        dropped?;
        Ok(QueryResult::with_message(format!("Table dropped: {}", table)))
    }

    fn execute_insert(&mut self, table: &str, values: Vec<Value>) -> Result<QueryResult> {
        let row = Row::new(values);
        let location = self.storage.insert_row(self.pool, table, &row)?;

        // In-memory indexes take the row before anything that can fail, so SeqScan and
        // IndexScan agree even when the write below does not reach disk
        let index_names = self.indexes.indexes_for_table(table);
        for index_name in &index_names {
            let index = self.indexes.get_index_mut(index_name)?;
            let position = self
                .storage
                .table_metadata(table)?
                .column_index(&index.metadata.column_name)
                .ok_or_else(|| {
                    Error::ExecutionError(format!(
                        "index {} refers to missing column {}",
                        index_name, index.metadata.column_name
                    ))
                })?;
            if let Some(value) = row.get(position) {
                index
                    .tree
                    .insert(IndexKey::new(value.clone()), location.page_id, location.slot_id);
            }
        }

        if self.config.write_through {
            self.pool.flush_page(table, location.page_id)?;
        }
        for index_name in &index_names {
            self.indexes.save_index(index_name)?;
        }

        Ok(QueryResult::with_affected_rows(1, "1 row inserted"))
    }

    fn execute_select(&mut self, query: QueryTree) -> Result<QueryResult> {
        let plan = self.plan_select(query)?;

        let mut executor = build_executor(&plan, self.storage, self.pool, self.indexes)?;
        executor.open()?;
        let mut rows = Vec::new();
        while let Some(row) = executor.next()? {
            rows.push(row);
        }
        executor.close()?;

        let columns = executor.columns().to_vec();
        Ok(QueryResult::with_rows(columns, rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::DataType;
    use crate::config::PredicateMode;
    use crate::sql::{CompareOp, Predicate};
    use tempfile::TempDir;

    struct Components {
        storage: StorageManager,
        pool: BufferPool,
        indexes: IndexManager,
        config: DatabaseConfig,
    }

    impl Components {
        fn new(dir: &TempDir) -> Self {
            let storage = StorageManager::open(dir.path()).unwrap();
            let pool = BufferPool::new(8, storage.disk_manager());
            Self {
                storage,
                pool,
                indexes: IndexManager::new(dir.path()),
                config: DatabaseConfig::new(dir.path()),
            }
        }

        fn run(&mut self, query: QueryTree) -> Result<QueryResult> {
            ExecutionEngine::new(
                &mut self.storage,
                &mut self.pool,
                &mut self.indexes,
                &self.config,
            )
            .execute(query)
        }
    }

    fn create_users() -> QueryTree {
        QueryTree::CreateTable {
            table: "users".to_string(),
            columns: vec![
                Column::new("id", DataType::Integer),
                Column::new("name", DataType::Varchar),
            ],
        }
    }

    fn insert(id: i32, name: &str) -> QueryTree {
        QueryTree::Insert {
            table: "users".to_string(),
            values: vec![Value::Integer(id), Value::String(name.to_string())],
        }
    }

    fn select_id_eq(id: i32) -> QueryTree {
        QueryTree::Select {
            table: "users".to_string(),
            columns: vec!["name".to_string()],
            predicate: Some(Predicate::Compare {
                column: "id".to_string(),
                op: CompareOp::Eq,
                value: Value::Integer(id),
            }),
        }
    }

    #[test]
    fn test_create_insert_select() {
        let dir = TempDir::new().unwrap();
        let mut c = Components::new(&dir);

        let result = c.run(create_users()).unwrap();
        assert_eq!(result.message, "Table created: users");

        let result = c.run(insert(1, "alice")).unwrap();
        assert_eq!(result.affected_rows, 1);
        assert_eq!(result.message, "1 row inserted");
        c.run(insert(2, "bob")).unwrap();

        let result = c.run(select_id_eq(2)).unwrap();
        assert!(result.success);
        assert_eq!(result.columns, vec!["name".to_string()]);
        assert_eq!(result.rows, vec![Row::new(vec![Value::String("bob".into())])]);
        assert_eq!(result.message, "1 row(s) returned");
    }

    #[test]
    fn test_write_through_leaves_no_dirty_pages() {
        let dir = TempDir::new().unwrap();
        let mut c = Components::new(&dir);
        c.run(create_users()).unwrap();
        c.run(insert(1, "alice")).unwrap();
        assert_eq!(c.pool.dirty_count(), 0);

        c.config = c.config.clone().write_through(false);
        c.run(insert(2, "bob")).unwrap();
        assert_eq!(c.pool.dirty_count(), 1);
    }

    #[test]
    fn test_index_built_from_existing_rows_and_maintained() {
        let dir = TempDir::new().unwrap();
        let mut c = Components::new(&dir);
        c.run(create_users()).unwrap();
        c.run(insert(1, "alice")).unwrap();

        let result = c
            .run(QueryTree::CreateIndex {
                index_name: "users_id_idx".to_string(),
                table: "users".to_string(),
                column: "id".to_string(),
            })
            .unwrap();
        assert_eq!(result.message, "Index created: users_id_idx");
        c.run(insert(2, "bob")).unwrap();

        assert_eq!(c.indexes.get_index("users_id_idx").unwrap().tree.len(), 2);

        let engine = ExecutionEngine::new(
            &mut c.storage,
            &mut c.pool,
            &mut c.indexes,
            &c.config,
        );
        assert!(engine.plan_select(select_id_eq(2)).unwrap().uses_index_scan());

        let result = c.run(select_id_eq(2)).unwrap();
        assert_eq!(result.rows, vec![Row::new(vec![Value::String("bob".into())])]);
    }

    #[test]
    fn test_duplicate_index_name() {
        let dir = TempDir::new().unwrap();
        let mut c = Components::new(&dir);
        c.run(create_users()).unwrap();
        let create = QueryTree::CreateIndex {
            index_name: "idx".to_string(),
            table: "users".to_string(),
            column: "id".to_string(),
        };
        c.run(create.clone()).unwrap();
        assert!(matches!(c.run(create), Err(Error::IndexAlreadyExists(_))));
    }

    #[test]
    fn test_drop_table_drops_indexes() {
        let dir = TempDir::new().unwrap();
        let mut c = Components::new(&dir);
        c.run(create_users()).unwrap();
        c.run(QueryTree::CreateIndex {
            index_name: "idx".to_string(),
            table: "users".to_string(),
            column: "id".to_string(),
        })
        .unwrap();

        let result = c
            .run(QueryTree::DropTable {
                table: "users".to_string(),
            })
            .unwrap();
        assert_eq!(result.message, "Table dropped: users");
        assert!(!c.indexes.index_exists("idx"));
        assert!(!c.storage.table_exists("users"));

        assert!(matches!(
            c.run(QueryTree::DropTable {
                table: "users".to_string()
            }),
            Err(Error::TableNotFound(_))
        ));
    }

    #[test]
    fn test_failed_drop_keeps_indexes() {
        let dir = TempDir::new().unwrap();
        let mut c = Components::new(&dir);
        c.run(create_users()).unwrap();
        c.run(insert(1, "alice")).unwrap();
        c.run(QueryTree::CreateIndex {
            index_name: "users_id_idx".to_string(),
            table: "users".to_string(),
            column: "id".to_string(),
        })
        .unwrap();

        let page = c.storage.disk_manager().page_path("users", 0);
        std::fs::remove_file(&page).unwrap();
        std::fs::create_dir(&page).unwrap();

        let drop = QueryTree::DropTable {
            table: "users".to_string(),
        };
        assert!(c.run(drop.clone()).is_err());
        assert!(c.storage.table_exists("users"));
        assert!(c.indexes.index_exists("users_id_idx"));

        let result = c.run(select_id_eq(1)).unwrap();
        assert_eq!(result.rows, vec![Row::new(vec![Value::String("alice".into())])]);

        std::fs::remove_dir(&page).unwrap();
        c.run(drop).unwrap();
        assert!(!c.storage.table_exists("users"));
        assert!(!c.indexes.index_exists("users_id_idx"));
    }

    #[test]
    fn test_index_updated_when_index_file_cannot_be_saved() {
        let dir = TempDir::new().unwrap();
        let mut c = Components::new(&dir);
        c.run(create_users()).unwrap();
        c.run(QueryTree::CreateIndex {
            index_name: "users_id_idx".to_string(),
            table: "users".to_string(),
            column: "id".to_string(),
        })
        .unwrap();

        // A directory in place of the tree file makes the save fail
        let tree_file = dir.path().join("users_id_idx.idx");
        std::fs::remove_file(&tree_file).unwrap();
        std::fs::create_dir(&tree_file).unwrap();

        assert!(c.run(insert(1, "alice")).is_err());
        assert_eq!(c.indexes.get_index("users_id_idx").unwrap().tree.len(), 1);

        let result = c.run(select_id_eq(1)).unwrap();
        assert_eq!(result.rows, vec![Row::new(vec![Value::String("alice".into())])]);
    }

    #[test]
    fn test_full_predicate_mode() {
        let dir = TempDir::new().unwrap();
        let mut c = Components::new(&dir);
        c.config = c.config.clone().predicate_mode(PredicateMode::Full);
        c.run(create_users()).unwrap();
        for (id, name) in [(1, "a"), (2, "b"), (3, "c")] {
            c.run(insert(id, name)).unwrap();
        }

        let cmp = |op, v| Predicate::Compare {
            column: "id".to_string(),
            op,
            value: Value::Integer(v),
        };
        let result = c
            .run(QueryTree::Select {
                table: "users".to_string(),
                columns: vec!["id".to_string()],
                predicate: Some(Predicate::And(
                    Box::new(cmp(CompareOp::Gt, 1)),
                    Box::new(cmp(CompareOp::Lt, 3)),
                )),
            })
            .unwrap();
        assert_eq!(result.rows, vec![Row::new(vec![Value::Integer(2)])]);
    }
}
