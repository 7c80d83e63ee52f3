//! Volcano-style operators
//!
//! Every operator is pulled one row at a time through `next`. A parent opens and closes
//! its child; opening twice is a no-op, and pulling from an unopened operator is an
//! execution error.

use crate::catalog::TableMetadata;
use crate::error::{Error, Result};
use crate::executor::PhysicalPlan;
use crate::index::{IndexEntry, IndexKey, IndexManager};
use crate::sql::{CompareOp, Predicate};
use crate::storage::row::decode_row;
use crate::storage::{BufferPool, PageId, Row, StorageManager, Value};

/// Pull-based operator
pub trait Executor {
    fn open(&mut self) -> Result<()>;

    /// Next row, or `None` when exhausted
    fn next(&mut self) -> Result<Option<Row>>;

    fn close(&mut self) -> Result<()>;

    /// Names of the columns in the rows this operator produces
    fn columns(&self) -> &[String];
}

fn not_opened(operator: &str) -> Error {
    Error::ExecutionError(format!("{} pulled before open", operator))
}

/// Build the operator tree for a physical plan.
///
/// Only the leaf touches the buffer pool, so the single mutable borrow is handed down
/// to it.
pub fn build_executor<'a>(
    plan: &PhysicalPlan,
    storage: &'a StorageManager,
    pool: &'a mut BufferPool,
    indexes: &'a IndexManager,
) -> Result<Box<dyn Executor + 'a>> {
    match plan {
        PhysicalPlan::SeqScan { table_name } => {
            Ok(Box::new(SeqScanExecutor::new(storage, pool, table_name)?))
        }
        PhysicalPlan::IndexScan {
            table_name,
            index_name,
            value,
            ..
        } => Ok(Box::new(IndexScanExecutor::new(
            storage,
            pool,
            indexes,
            table_name,
            index_name,
            value.clone(),
        )?)),
        PhysicalPlan::Filter { input, predicate } => {
            let child = build_executor(input, storage, pool, indexes)?;
            Ok(Box::new(FilterExecutor::new(child, predicate)?))
        }
        PhysicalPlan::Project { input, columns } => {
            let child = build_executor(input, storage, pool, indexes)?;
            Ok(Box::new(ProjectExecutor::new(child, columns.clone())?))
        }
    }
}

/// Sequential scan over a table's pages in allocation order
pub struct SeqScanExecutor<'a> {
    table: &'a TableMetadata,
    page_ids: Vec<PageId>,
    pool: &'a mut BufferPool,
    columns: Vec<String>,
    page_index: usize,
    slot_id: u32,
    opened: bool,
}

impl<'a> SeqScanExecutor<'a> {
    pub fn new(storage: &'a StorageManager, pool: &'a mut BufferPool, table: &str) -> Result<Self> {
        let metadata = storage.table_metadata(table)?;
        let page_ids = storage.table_file(table)?.page_ids().to_vec();
        Ok(Self {
            table: metadata,
            page_ids,
            pool,
            columns: metadata.column_names(),
            page_index: 0,
            slot_id: 0,
            opened: false,
        })
    }
}

impl Executor for SeqScanExecutor<'_> {
    fn open(&mut self) -> Result<()> {
        if !self.opened {
            self.page_index = 0;
            self.slot_id = 0;
            self.opened = true;
        }
        Ok(())
    }

    fn next(&mut self) -> Result<Option<Row>> {
        if !self.opened {
            return Err(not_opened("SeqScan"));
        }

        let row_size = self.table.row_size();
        while let Some(&page_id) = self.page_ids.get(self.page_index) {
            let page = self.pool.fetch_page(self.table.name(), page_id)?;
            if self.slot_id < page.row_count() {
                let slot_id = self.slot_id;
                self.slot_id += 1;
                if let Some(bytes) = page.row_bytes(slot_id, row_size) {
                    return decode_row(self.table, bytes).map(Some);
                }
                continue;
            }
            self.page_index += 1;
            self.slot_id = 0;
        }
        Ok(None)
    }

    fn close(&mut self) -> Result<()> {
        self.opened = false;
        Ok(())
    }

    fn columns(&self) -> &[String] {
        &self.columns
    }
}

/// Equality lookup through an index, dereferencing each entry to its row
pub struct IndexScanExecutor<'a> {
    storage: &'a StorageManager,
    pool: &'a mut BufferPool,
    indexes: &'a IndexManager,
    table_name: String,
    index_name: String,
    key: IndexKey,
    columns: Vec<String>,
    entries: Vec<IndexEntry>,
    position: usize,
    opened: bool,
}

impl<'a> IndexScanExecutor<'a> {
    pub fn new(
        storage: &'a StorageManager,
        pool: &'a mut BufferPool,
        indexes: &'a IndexManager,
        table: &str,
        index_name: &str,
        value: Value,
    ) -> Result<Self> {
        let columns = storage.table_metadata(table)?.column_names();
        Ok(Self {
            storage,
            pool,
            indexes,
            table_name: table.to_string(),
            index_name: index_name.to_string(),
            key: IndexKey::new(value),
            columns,
            entries: Vec::new(),
            position: 0,
            opened: false,
        })
    }
}

impl Executor for IndexScanExecutor<'_> {
    fn open(&mut self) -> Result<()> {
        if !self.opened {
            let index = self.indexes.get_index(&self.index_name)?;
            self.entries = index.tree.search(&self.key);
            self.position = 0;
            self.opened = true;
        }
        Ok(())
    }

    fn next(&mut self) -> Result<Option<Row>> {
        if !self.opened {
            return Err(not_opened("IndexScan"));
        }

        let Some(entry) = self.entries.get(self.position) else {
            return Ok(None);
        };
        self.position += 1;

        let location = entry.location();
        match self.storage.read_row(self.pool, &self.table_name, location)? {
            Some(row) => Ok(Some(row)),
            None => Err(Error::ExecutionError(format!(
                "index {} points at missing row (page {}, slot {})",
                self.index_name, location.page_id, location.slot_id
            ))),
        }
    }

    fn close(&mut self) -> Result<()> {
        self.entries.clear();
        self.opened = false;
        Ok(())
    }

    fn columns(&self) -> &[String] {
        &self.columns
    }
}

/// A predicate with column names replaced by positions in the child's rows
#[derive(Debug, Clone)]
enum BoundPredicate {
    Compare {
        position: usize,
        op: CompareOp,
        value: Value,
    },
    And(Box<BoundPredicate>, Box<BoundPredicate>),
    Or(Box<BoundPredicate>, Box<BoundPredicate>),
}

impl BoundPredicate {
    fn bind(predicate: &Predicate, columns: &[String]) -> Result<Self> {
        match predicate {
            Predicate::Compare { column, op, value } => {
                let position = columns
                    .iter()
                    .position(|c| c.eq_ignore_ascii_case(column))
                    .ok_or_else(|| {
                        Error::ExecutionError(format!("filter column {} is not in its input", column))
                    })?;
                Ok(BoundPredicate::Compare {
                    position,
                    op: *op,
                    value: value.clone(),
                })
            }
            Predicate::And(left, right) => Ok(BoundPredicate::And(
                Box::new(Self::bind(left, columns)?),
                Box::new(Self::bind(right, columns)?),
            )),
            Predicate::Or(left, right) => Ok(BoundPredicate::Or(
                Box::new(Self::bind(left, columns)?),
                Box::new(Self::bind(right, columns)?),
            )),
        }
    }

    /// Values of different types never match.
    fn evaluate(&self, row: &Row) -> bool {
        match self {
            BoundPredicate::Compare {
                position,
                op,
                value,
            } => row
                .get(*position)
                .and_then(|v| v.compare(value))
                .map(|ordering| op.matches(ordering))
                .unwrap_or(false),
            BoundPredicate::And(left, right) => left.evaluate(row) && right.evaluate(row),
            BoundPredicate::Or(left, right) => left.evaluate(row) || right.evaluate(row),
        }
    }
}

/// Passes through the rows of its child that satisfy a predicate
pub struct FilterExecutor<'a> {
    input: Box<dyn Executor + 'a>,
    predicate: BoundPredicate,
    opened: bool,
}

impl<'a> FilterExecutor<'a> {
    pub fn new(input: Box<dyn Executor + 'a>, predicate: &Predicate) -> Result<Self> {
        let predicate = BoundPredicate::bind(predicate, input.columns())?;
        Ok(Self {
            input,
            predicate,
            opened: false,
        })
    }
}

impl Executor for FilterExecutor<'_> {
    fn open(&mut self) -> Result<()> {
        if !self.opened {
            self.input.open()?;
            self.opened = true;
        }
        Ok(())
    }

    fn next(&mut self) -> Result<Option<Row>> {
        if !self.opened {
            return Err(not_opened("Filter"));
        }
        while let Some(row) = self.input.next()? {
            if self.predicate.evaluate(&row) {
                return Ok(Some(row));
            }
        }
        Ok(None)
    }

    fn close(&mut self) -> Result<()> {
        self.opened = false;
        self.input.close()
    }

    fn columns(&self) -> &[String] {
        self.input.columns()
    }
}

/// Reorders and narrows the child's rows to the requested columns
pub struct ProjectExecutor<'a> {
    input: Box<dyn Executor + 'a>,
    columns: Vec<String>,
    positions: Vec<usize>,
    opened: bool,
}

impl<'a> ProjectExecutor<'a> {
    pub fn new(input: Box<dyn Executor + 'a>, columns: Vec<String>) -> Result<Self> {
        let positions = columns
            .iter()
            .map(|column| {
                input
                    .columns()
                    .iter()
                    .position(|c| c.eq_ignore_ascii_case(column))
                    .ok_or_else(|| {
                        Error::ExecutionError(format!("projected column {} is not in its input", column))
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            input,
            columns,
            positions,
            opened: false,
        })
    }
}

impl Executor for ProjectExecutor<'_> {
    fn open(&mut self) -> Result<()> {
        if !self.opened {
            self.input.open()?;
            self.opened = true;
        }
        Ok(())
    }

    fn next(&mut self) -> Result<Option<Row>> {
        if !self.opened {
            return Err(not_opened("Project"));
        }
        let Some(row) = self.input.next()? else {
            return Ok(None);
        };

        let mut values = Vec::with_capacity(self.positions.len());
        for &position in &self.positions {
            let value = row.get(position).cloned().ok_or_else(|| {
                Error::ExecutionError(format!("row has no value at position {}", position))
            })?;
            values.push(value);
        }
        Ok(Some(Row::new(values)))
    }

    fn close(&mut self) -> Result<()> {
        self.opened = false;
        self.input.close()
    }

    fn columns(&self) -> &[String] {
        &self.columns
    }
}
