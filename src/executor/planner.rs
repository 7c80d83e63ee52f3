//! Query Planner for PageDB
//!
//! This module converts a resolved SELECT into a logical operator tree:
//! `Project(Filter?(Scan))`, always with exactly one Project at the root.

use std::fmt;

use crate::config::PredicateMode;
use crate::error::{Error, Result};
use crate::sql::{Predicate, QueryTree};

/// Logical plan node
#[derive(Debug, Clone, PartialEq)]
pub enum LogicalPlan {
    /// Scan a table
    Scan { table_name: String },
    /// Filter rows
    Filter {
        input: Box<LogicalPlan>,
        predicate: Predicate,
    },
    /// Project columns
    Project {
        input: Box<LogicalPlan>,
        columns: Vec<String>,
    },
}

impl LogicalPlan {
    fn fmt_indent(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        let pad = "  ".repeat(depth);
        match self {
            LogicalPlan::Scan { table_name } => writeln!(f, "{}Scan: {}", pad, table_name),
            LogicalPlan::Filter { input, predicate } => {
                writeln!(f, "{}Filter: {}", pad, predicate)?;
                input.fmt_indent(f, depth + 1)
            }
            LogicalPlan::Project { input, columns } => {
                writeln!(f, "{}Project: {}", pad, columns.join(", "))?;
                input.fmt_indent(f, depth + 1)
            }
        }
    }
}

impl fmt::Display for LogicalPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_indent(f, 0)
    }
}

/// Query planner
pub struct Planner {
    mode: PredicateMode,
}

impl Planner {
    /// Create a new planner
    pub fn new(mode: PredicateMode) -> Self {
        Self { mode }
    }

    /// Plan a SELECT. Other statements have no operator tree.
    pub fn plan(&self, query: QueryTree) -> Result<LogicalPlan> {
        let QueryTree::Select {
            table,
            columns,
            predicate,
        } = query
        else {
            return Err(Error::PlanError(
                "only SELECT statements have a query plan".to_string(),
            ));
        };

        let mut plan = LogicalPlan::Scan { table_name: table };

        if let Some(predicate) = predicate {
            plan = LogicalPlan::Filter {
                input: Box::new(plan),
                predicate: self.filter_condition(predicate),
            };
        }

        Ok(LogicalPlan::Project {
            input: Box::new(plan),
            columns,
        })
    }

    /// The condition a Filter evaluates for a WHERE predicate.
    ///
    /// In `LeftBranch` mode an AND/OR tree is reduced to its leftmost comparison; `Full`
    /// keeps the whole tree.
    fn filter_condition(&self, predicate: Predicate) -> Predicate {
        match self.mode {
            PredicateMode::Full => predicate,
            PredicateMode::LeftBranch => predicate.leftmost().clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::CompareOp;
    use crate::storage::Value;

    fn cmp(column: &str, op: CompareOp, value: i32) -> Predicate {
        Predicate::Compare {
            column: column.to_string(),
            op,
            value: Value::Integer(value),
        }
    }

    fn select(predicate: Option<Predicate>) -> QueryTree {
        QueryTree::Select {
            table: "t".to_string(),
            columns: vec!["id".to_string(), "name".to_string()],
            predicate,
        }
    }

    #[test]
    fn test_plan_without_where() {
        let plan = Planner::new(PredicateMode::LeftBranch)
            .plan(select(None))
            .unwrap();

        assert_eq!(
            plan,
            LogicalPlan::Project {
                input: Box::new(LogicalPlan::Scan {
                    table_name: "t".to_string()
                }),
                columns: vec!["id".to_string(), "name".to_string()],
            }
        );
    }

    #[test]
    fn test_left_branch_keeps_leftmost_comparison() {
        let predicate = Predicate::Or(
            Box::new(Predicate::And(
                Box::new(cmp("id", CompareOp::Gt, 1)),
                Box::new(cmp("id", CompareOp::Lt, 5)),
            )),
            Box::new(cmp("id", CompareOp::Eq, 9)),
        );

        let plan = Planner::new(PredicateMode::LeftBranch)
            .plan(select(Some(predicate.clone())))
            .unwrap();
        let LogicalPlan::Project { input, .. } = plan else {
            panic!("Expected Project at the root");
        };
        match *input {
            LogicalPlan::Filter { predicate, .. } => {
                assert_eq!(predicate, cmp("id", CompareOp::Gt, 1))
            }
            other => panic!("Expected Filter, got {:?}", other),
        }

        let plan = Planner::new(PredicateMode::Full)
            .plan(select(Some(predicate.clone())))
            .unwrap();
        assert!(plan.to_string().contains("Filter: ((id > 1 AND id < 5) OR id = 9)"));
    }

    #[test]
    fn test_non_select_is_plan_error() {
        let result = Planner::new(PredicateMode::LeftBranch).plan(QueryTree::DropTable {
            table: "t".to_string(),
        });
        assert!(matches!(result, Err(Error::PlanError(_))));
    }

    #[test]
    fn test_display() {
        let plan = Planner::new(PredicateMode::LeftBranch)
            .plan(select(Some(cmp("id", CompareOp::Eq, 2))))
            .unwrap();
        assert_eq!(
            plan.to_string(),
            "Project: id, name\n  Filter: id = 2\n    Scan: t\n"
        );
    }
}
