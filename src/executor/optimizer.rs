//! Rule-based optimizer
//!
//! Lowers a logical plan to a physical one node for node. The only rewrite replaces
//! `Filter(column = literal)` directly above a `Scan` with an `IndexScan` when an index
//! covers that column. No residual filter is kept, so only equality is rewritten.

use std::fmt;

use crate::executor::LogicalPlan;
use crate::index::IndexManager;
use crate::sql::{CompareOp, Predicate};
use crate::storage::Value;

/// Physical plan node
#[derive(Debug, Clone, PartialEq)]
pub enum PhysicalPlan {
    /// Read every row of a table in page order
    SeqScan { table_name: String },
    /// Equality lookup through a B+ tree
    IndexScan {
        table_name: String,
        index_name: String,
        column: String,
        value: Value,
    },
    Filter {
        input: Box<PhysicalPlan>,
        predicate: Predicate,
    },
    Project {
        input: Box<PhysicalPlan>,
        columns: Vec<String>,
    },
}

impl PhysicalPlan {
    /// Does any node of this plan read through an index?
    pub fn uses_index_scan(&self) -> bool {
        match self {
            PhysicalPlan::IndexScan { .. } => true,
            PhysicalPlan::SeqScan { .. } => false,
            PhysicalPlan::Filter { input, .. } | PhysicalPlan::Project { input, .. } => {
                input.uses_index_scan()
            }
        }
    }

    fn fmt_indent(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        let pad = "  ".repeat(depth);
        match self {
            PhysicalPlan::SeqScan { table_name } => writeln!(f, "{}SeqScan: {}", pad, table_name),
            PhysicalPlan::IndexScan {
                table_name,
                index_name,
                column,
                value,
            } => writeln!(
                f,
                "{}IndexScan: {} using {} ({} = {})",
                pad, table_name, index_name, column, value
            ),
            PhysicalPlan::Filter { input, predicate } => {
                writeln!(f, "{}Filter: {}", pad, predicate)?;
                input.fmt_indent(f, depth + 1)
            }
            PhysicalPlan::Project { input, columns } => {
                writeln!(f, "{}Project: {}", pad, columns.join(", "))?;
                input.fmt_indent(f, depth + 1)
            }
        }
    }
}

impl fmt::Display for PhysicalPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_indent(f, 0)
    }
}

/// Rule-based optimizer
pub struct Optimizer<'a> {
    /// Index registry for index lookup
    indexes: &'a IndexManager,
}

impl<'a> Optimizer<'a> {
    /// Create a new optimizer
    pub fn new(indexes: &'a IndexManager) -> Self {
        Self { indexes }
    }

    /// Optimize a logical plan into a physical plan
    pub fn optimize(&self, plan: LogicalPlan) -> PhysicalPlan {
        match plan {
            LogicalPlan::Scan { table_name } => PhysicalPlan::SeqScan { table_name },
            LogicalPlan::Filter { input, predicate } => {
                // Try to optimize Filter(Scan) into IndexScan
                if let LogicalPlan::Scan { table_name } = input.as_ref() {
                    if let Some(index_scan) = self.try_index_scan(table_name, &predicate) {
                        return index_scan;
                    }
                }

                PhysicalPlan::Filter {
                    input: Box::new(self.optimize(*input)),
                    predicate,
                }
            }
            LogicalPlan::Project { input, columns } => PhysicalPlan::Project {
                input: Box::new(self.optimize(*input)),
                columns,
            },
        }
    }

    fn try_index_scan(&self, table_name: &str, predicate: &Predicate) -> Option<PhysicalPlan> {
        let Predicate::Compare {
            column,
            op: CompareOp::Eq,
            value,
        } = predicate
        else {
            return None;
        };

        let index = self.indexes.find_index_for_column(table_name, column)?;
        Some(PhysicalPlan::IndexScan {
            table_name: table_name.to_string(),
            index_name: index.name.clone(),
            column: column.clone(),
            value: value.clone(),
        })
    }
}
