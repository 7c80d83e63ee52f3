//! Semantic resolver
//!
//! Turns a syntax tree into a validated `QueryTree` against the catalog. Every table and
//! column a query names is checked here; later stages never look names up again and can
//! rely on the canonical (catalog) spelling of column names.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;

use tracing::debug;

use super::ast::{AstNode, LiteralKind, NodeKind};
use crate::catalog::{Catalog, Column, DataType, TableMetadata};
use crate::error::{Error, Result};
use crate::storage::Value;

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "=" => Some(CompareOp::Eq),
            "<>" => Some(CompareOp::Ne),
            "<" => Some(CompareOp::Lt),
            "<=" => Some(CompareOp::Le),
            ">" => Some(CompareOp::Gt),
            ">=" => Some(CompareOp::Ge),
            _ => None,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "<>",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }

    /// The operator with its operands swapped: `5 < id` is `id > 5`
    pub fn flip(&self) -> Self {
        match self {
            CompareOp::Eq => CompareOp::Eq,
            CompareOp::Ne => CompareOp::Ne,
            CompareOp::Lt => CompareOp::Gt,
            CompareOp::Le => CompareOp::Ge,
            CompareOp::Gt => CompareOp::Lt,
            CompareOp::Ge => CompareOp::Le,
        }
    }

    /// Does `left <op> right` hold, given `left.cmp(right)`?
    pub fn matches(&self, ordering: Ordering) -> bool {
        match self {
            CompareOp::Eq => ordering == Ordering::Equal,
            CompareOp::Ne => ordering != Ordering::Equal,
            CompareOp::Lt => ordering == Ordering::Less,
            CompareOp::Le => ordering != Ordering::Greater,
            CompareOp::Gt => ordering == Ordering::Greater,
            CompareOp::Ge => ordering != Ordering::Less,
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// A resolved WHERE condition
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// `column <op> literal`, the literal already typed for the column
    Compare {
        column: String,
        op: CompareOp,
        value: Value,
    },
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
}

impl Predicate {
    /// Leftmost comparison of a predicate tree
    pub fn leftmost(&self) -> &Predicate {
        match self {
            Predicate::Compare { .. } => self,
            Predicate::And(left, _) | Predicate::Or(left, _) => left.leftmost(),
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Compare { column, op, value } => match value {
                Value::String(s) => write!(f, "{} {} '{}'", column, op, s),
                Value::Integer(i) => write!(f, "{} {} {}", column, op, i),
            },
            Predicate::And(l, r) => write!(f, "({} AND {})", l, r),
            Predicate::Or(l, r) => write!(f, "({} OR {})", l, r),
        }
    }
}

/// Validated query representation
#[derive(Debug, Clone, PartialEq)]
pub enum QueryTree {
    CreateTable {
        table: String,
        columns: Vec<Column>,
    },
    CreateIndex {
        index_name: String,
        table: String,
        column: String,
    },
    DropTable {
        table: String,
    },
    /// Values are in catalog column order
    Insert {
        table: String,
        values: Vec<Value>,
    },
    Select {
        table: String,
        columns: Vec<String>,
        predicate: Option<Predicate>,
    },
}

/// Semantic resolver over a read-only catalog
pub struct Resolver<'a> {
    catalog: &'a Catalog,
}

impl<'a> Resolver<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        Self { catalog }
    }

    /// Resolve one statement
    pub fn resolve(&self, ast: &AstNode) -> Result<QueryTree> {
        let query = match ast.kind {
            NodeKind::CreateTable if ast.is_create_index() => self.resolve_create_index(ast),
            NodeKind::CreateTable => self.resolve_create_table(ast),
            NodeKind::DropTable => self.resolve_drop_table(ast),
            NodeKind::Insert => self.resolve_insert(ast),
            NodeKind::Select => self.resolve_select(ast),
            other => Err(Error::InvalidExpression(format!(
                "{} is not a statement",
                other
            ))),
        }?;
        debug!(?query, "statement resolved");
        Ok(query)
    }

    fn resolve_create_table(&self, ast: &AstNode) -> Result<QueryTree> {
        let table = ast.text().to_string();
        if self.catalog.table_exists(&table) {
            return Err(Error::TableAlreadyExists(table));
        }
        if ast.children.is_empty() {
            return Err(Error::InvalidSchema(format!(
                "table '{}' must have at least one column",
                table
            )));
        }

        let mut seen = HashSet::new();
        let mut columns = Vec::with_capacity(ast.children.len());
        for def in &ast.children {
            let (Some(name), Some(type_name)) = (def.child(0), def.child(1)) else {
                return Err(Error::InvalidSchema(format!(
                    "malformed column definition {}",
                    def
                )));
            };
            let name = name.text();
            let data_type = DataType::from_name(type_name.text())
                .ok_or_else(|| Error::UnknownDataType(type_name.text().to_string()))?;
            if !seen.insert(name.to_ascii_lowercase()) {
                return Err(Error::DuplicateColumn(name.to_string(), table));
            }
            columns.push(Column::new(name, data_type));
        }

        Ok(QueryTree::CreateTable { table, columns })
    }

    fn resolve_create_index(&self, ast: &AstNode) -> Result<QueryTree> {
        let [index, table, column] = ast.children.as_slice() else {
            return Err(Error::InvalidExpression(format!(
                "malformed CREATE INDEX {}",
                ast
            )));
        };

        let metadata = self.table(table.text())?;
        let column = Self::column(metadata, column.text())?;

        Ok(QueryTree::CreateIndex {
            index_name: index.text().to_string(),
            table: metadata.name().to_string(),
            column: column.name.clone(),
        })
    }

    fn resolve_drop_table(&self, ast: &AstNode) -> Result<QueryTree> {
        let metadata = self.table(ast.text())?;
        Ok(QueryTree::DropTable {
            table: metadata.name().to_string(),
        })
    }

    fn resolve_insert(&self, ast: &AstNode) -> Result<QueryTree> {
        let metadata = self.table(ast.text())?;

        let (column_list, values_node) = match ast.children.as_slice() {
            [values] => (None, values),
            [columns, values] => (Some(columns), values),
            _ => {
                return Err(Error::InvalidExpression(
                    "INSERT needs a VALUES list".to_string(),
                ))
            }
        };

        let literals = values_node
            .children
            .iter()
            .map(|node| {
                Self::literal_value(node).ok_or_else(|| {
                    Error::InvalidExpression(format!("INSERT value {} is not a literal", node))
                })
            })
            .collect::<Result<Vec<Value>>>()?;

        // Target position in the catalog for each provided value
        let targets: Vec<usize> = match column_list {
            None => (0..metadata.columns().len()).collect(),
            Some(list) => {
                let mut targets = Vec::with_capacity(list.children.len());
                for node in &list.children {
                    let index = metadata.column_index(node.text()).ok_or_else(|| {
                        Error::ColumnNotFound(node.text().to_string(), metadata.name().to_string())
                    })?;
                    if targets.contains(&index) {
                        return Err(Error::DuplicateColumn(
                            node.text().to_string(),
                            metadata.name().to_string(),
                        ));
                    }
                    targets.push(index);
                }
                targets
            }
        };

        if literals.len() != targets.len() {
            return Err(Error::ColumnCountMismatch {
                expected: targets.len(),
                found: literals.len(),
            });
        }
        // Every column needs a value; there is no NULL
        if targets.len() != metadata.columns().len() {
            return Err(Error::ColumnCountMismatch {
                expected: metadata.columns().len(),
                found: targets.len(),
            });
        }

        let mut slots: Vec<Option<Value>> = vec![None; metadata.columns().len()];
        for (index, literal) in targets.into_iter().zip(literals) {
            let column = &metadata.columns()[index];
            slots[index] = Some(Self::coerce(literal, column)?);
        }
        let values = slots.into_iter().flatten().collect();

        Ok(QueryTree::Insert {
            table: metadata.name().to_string(),
            values,
        })
    }

    fn resolve_select(&self, ast: &AstNode) -> Result<QueryTree> {
        let (Some(column_list), Some(table_node)) = (ast.child(0), ast.child(1)) else {
            return Err(Error::InvalidExpression("malformed SELECT".to_string()));
        };
        let metadata = self.table(table_node.text())?;

        let columns = if column_list.children.iter().any(|c| c.text() == "*") {
            metadata.column_names()
        } else {
            column_list
                .children
                .iter()
                .map(|c| Self::column(metadata, c.text()).map(|col| col.name.clone()))
                .collect::<Result<Vec<String>>>()?
        };

        let predicate = match ast.child(2) {
            Some(where_clause) => {
                let expr = where_clause.child(0).ok_or_else(|| {
                    Error::InvalidExpression("empty WHERE clause".to_string())
                })?;
                Some(self.resolve_predicate(expr, metadata)?)
            }
            None => None,
        };

        Ok(QueryTree::Select {
            table: metadata.name().to_string(),
            columns,
            predicate,
        })
    }

    fn resolve_predicate(&self, node: &AstNode, metadata: &TableMetadata) -> Result<Predicate> {
        if node.kind != NodeKind::BinaryOp {
            return Err(Error::InvalidExpression(format!(
                "WHERE needs a comparison, got {}",
                node
            )));
        }
        let [left, right] = node.children.as_slice() else {
            return Err(Error::InvalidExpression(format!(
                "operator '{}' needs two operands",
                node.text()
            )));
        };

        match node.text() {
            "AND" => Ok(Predicate::And(
                Box::new(self.resolve_predicate(left, metadata)?),
                Box::new(self.resolve_predicate(right, metadata)?),
            )),
            "OR" => Ok(Predicate::Or(
                Box::new(self.resolve_predicate(left, metadata)?),
                Box::new(self.resolve_predicate(right, metadata)?),
            )),
            symbol => {
                let op = CompareOp::from_symbol(symbol).ok_or_else(|| {
                    Error::InvalidExpression(format!("unknown operator '{}'", symbol))
                })?;

                let (column_node, literal_node, op) = match (left.kind, right.kind) {
                    (NodeKind::Identifier, NodeKind::Literal(_)) => (left, right, op),
                    (NodeKind::Literal(_), NodeKind::Identifier) => (right, left, op.flip()),
                    _ => {
                        return Err(Error::InvalidExpression(format!(
                            "comparison must be between a column and a literal: {}",
                            node
                        )))
                    }
                };

                let column = Self::column(metadata, column_node.text())?;
                let literal = Self::literal_value(literal_node).ok_or_else(|| {
                    Error::InvalidExpression(format!("{} is not a literal", literal_node))
                })?;

                Ok(Predicate::Compare {
                    column: column.name.clone(),
                    op,
                    value: Self::coerce(literal, column)?,
                })
            }
        }
    }

    fn table(&self, name: &str) -> Result<&'a TableMetadata> {
        self.catalog.get_table(name)
    }

    fn column<'t>(metadata: &'t TableMetadata, name: &str) -> Result<&'t Column> {
        metadata
            .get_column(name)
            .ok_or_else(|| Error::ColumnNotFound(name.to_string(), metadata.name().to_string()))
    }

    /// A quoted literal is a string; digits become an integer, or a string if they
    /// overflow 32 bits.
    fn literal_value(node: &AstNode) -> Option<Value> {
        match node.kind {
            NodeKind::Literal(LiteralKind::Quoted) => Some(Value::String(node.text().to_string())),
            NodeKind::Literal(LiteralKind::Number) => Some(
                node.text()
                    .parse::<i32>()
                    .map(Value::Integer)
                    .unwrap_or_else(|_| Value::String(node.text().to_string())),
            ),
            _ => None,
        }
    }

    /// Fit a literal to its column's declared type
    fn coerce(value: Value, column: &Column) -> Result<Value> {
        match (column.data_type, value) {
            (DataType::Integer, Value::Integer(i)) => Ok(Value::Integer(i)),
            (DataType::Varchar, Value::String(s)) => Ok(Value::String(s)),
            (DataType::Varchar, Value::Integer(i)) => Ok(Value::String(i.to_string())),
            (DataType::Integer, Value::String(s)) => Err(Error::TypeMismatch {
                column: column.name.clone(),
                expected: DataType::Integer.to_string(),
                found: s,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::Parser;
    use tempfile::TempDir;

    fn catalog(dir: &TempDir) -> Catalog {
        let mut catalog = Catalog::new(dir.path());
        catalog
            .create_table(
                TableMetadata::new("users")
                    .with_column("id", DataType::Integer)
                    .with_column("Name", DataType::Varchar),
            )
            .unwrap();
        catalog
    }

    fn resolve(catalog: &Catalog, sql: &str) -> Result<QueryTree> {
        let ast = Parser::new(sql).parse()?;
        Resolver::new(catalog).resolve(&ast)
    }

    #[test]
    fn test_create_table() {
        let dir = TempDir::new().unwrap();
        let catalog = catalog(&dir);

        match resolve(&catalog, "CREATE TABLE t (a int, b STRING)").unwrap() {
            QueryTree::CreateTable { table, columns } => {
                assert_eq!(table, "t");
                assert_eq!(columns[0], Column::new("a", DataType::Integer));
                assert_eq!(columns[1], Column::new("b", DataType::Varchar));
            }
            other => panic!("Expected CreateTable, got {:?}", other),
        }
    }

    #[test]
    fn test_create_table_errors() {
        let dir = TempDir::new().unwrap();
        let catalog = catalog(&dir);

        assert!(matches!(
            resolve(&catalog, "CREATE TABLE users (id INTEGER)"),
            Err(Error::TableAlreadyExists(_))
        ));
        assert!(matches!(
            resolve(&catalog, "CREATE TABLE t (a INTEGER, A VARCHAR)"),
            Err(Error::DuplicateColumn(..))
        ));
        assert!(matches!(
            resolve(&catalog, "CREATE TABLE t (a BLOB)"),
            Err(Error::UnknownDataType(_))
        ));
    }

    #[test]
    fn test_select_star_expands_in_catalog_order() {
        let dir = TempDir::new().unwrap();
        let catalog = catalog(&dir);

        match resolve(&catalog, "SELECT * FROM users").unwrap() {
            QueryTree::Select {
                columns, predicate, ..
            } => {
                assert_eq!(columns, vec!["id", "Name"]);
                assert!(predicate.is_none());
            }
            other => panic!("Expected Select, got {:?}", other),
        }
    }

    #[test]
    fn test_select_canonicalizes_column_names() {
        let dir = TempDir::new().unwrap();
        let catalog = catalog(&dir);

        match resolve(&catalog, "SELECT NAME FROM users WHERE ID = 3").unwrap() {
            QueryTree::Select {
                columns, predicate, ..
            } => {
                assert_eq!(columns, vec!["Name"]);
                assert_eq!(
                    predicate,
                    Some(Predicate::Compare {
                        column: "id".to_string(),
                        op: CompareOp::Eq,
                        value: Value::Integer(3),
                    })
                );
            }
            other => panic!("Expected Select, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_names() {
        let dir = TempDir::new().unwrap();
        let catalog = catalog(&dir);

        assert!(matches!(
            resolve(&catalog, "SELECT * FROM nope"),
            Err(Error::TableNotFound(_))
        ));
        assert!(matches!(
            resolve(&catalog, "SELECT email FROM users"),
            Err(Error::ColumnNotFound(..))
        ));
        assert!(matches!(
            resolve(&catalog, "SELECT * FROM users WHERE age > 3"),
            Err(Error::ColumnNotFound(..))
        ));
        assert!(matches!(
            resolve(&catalog, "DROP TABLE nope"),
            Err(Error::TableNotFound(_))
        ));
    }

    #[test]
    fn test_literal_on_left_is_flipped() {
        let dir = TempDir::new().unwrap();
        let catalog = catalog(&dir);

        match resolve(&catalog, "SELECT * FROM users WHERE 5 < id").unwrap() {
            QueryTree::Select { predicate, .. } => {
                assert_eq!(predicate.unwrap().to_string(), "id > 5");
            }
            other => panic!("Expected Select, got {:?}", other),
        }
    }

    #[test]
    fn test_malformed_predicates() {
        let dir = TempDir::new().unwrap();
        let catalog = catalog(&dir);

        for sql in [
            "SELECT * FROM users WHERE id = Name",
            "SELECT * FROM users WHERE 1 = 1",
            "SELECT * FROM users WHERE id",
            "SELECT * FROM users WHERE (id = 1) = 2",
        ] {
            assert!(
                matches!(resolve(&catalog, sql), Err(Error::InvalidExpression(_))),
                "{}",
                sql
            );
        }
    }

    #[test]
    fn test_predicate_tree() {
        let dir = TempDir::new().unwrap();
        let catalog = catalog(&dir);

        match resolve(&catalog, "SELECT * FROM users WHERE id > 1 AND name = 'Bob' OR id = 9")
            .unwrap()
        {
            QueryTree::Select {
                predicate: Some(p), ..
            } => {
                assert_eq!(p.to_string(), "((id > 1 AND Name = 'Bob') OR id = 9)");
                assert_eq!(p.leftmost().to_string(), "id > 1");
            }
            other => panic!("Expected Select with predicate, got {:?}", other),
        }
    }

    #[test]
    fn test_insert_coercion() {
        let dir = TempDir::new().unwrap();
        let catalog = catalog(&dir);

        match resolve(&catalog, "INSERT INTO users VALUES (1, 42)").unwrap() {
            QueryTree::Insert { values, .. } => {
                assert_eq!(values, vec![Value::Integer(1), Value::from("42")]);
            }
            other => panic!("Expected Insert, got {:?}", other),
        }

        assert!(matches!(
            resolve(&catalog, "INSERT INTO users VALUES ('one', 'x')"),
            Err(Error::TypeMismatch { .. })
        ));
        // Digits that overflow i32 fall back to a string
        assert!(matches!(
            resolve(&catalog, "INSERT INTO users VALUES (99999999999, 'x')"),
            Err(Error::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_insert_column_list_reorders() {
        let dir = TempDir::new().unwrap();
        let catalog = catalog(&dir);

        match resolve(&catalog, "INSERT INTO users (name, ID) VALUES ('Bob', 2)").unwrap() {
            QueryTree::Insert { values, .. } => {
                assert_eq!(values, vec![Value::Integer(2), Value::from("Bob")]);
            }
            other => panic!("Expected Insert, got {:?}", other),
        }
    }

    #[test]
    fn test_insert_arity_errors() {
        let dir = TempDir::new().unwrap();
        let catalog = catalog(&dir);

        assert!(matches!(
            resolve(&catalog, "INSERT INTO users VALUES (1)"),
            Err(Error::ColumnCountMismatch {
                expected: 2,
                found: 1
            })
        ));
        assert!(matches!(
            resolve(&catalog, "INSERT INTO users (id) VALUES (1)"),
            Err(Error::ColumnCountMismatch { .. })
        ));
        assert!(matches!(
            resolve(&catalog, "INSERT INTO users (id, id) VALUES (1, 2)"),
            Err(Error::DuplicateColumn(..))
        ));
        assert!(matches!(
            resolve(&catalog, "INSERT INTO users (id, email) VALUES (1, 'x')"),
            Err(Error::ColumnNotFound(..))
        ));
        assert!(matches!(
            resolve(&catalog, "INSERT INTO users VALUES (id, 'x')"),
            Err(Error::InvalidExpression(_))
        ));
    }

    #[test]
    fn test_create_index() {
        let dir = TempDir::new().unwrap();
        let catalog = catalog(&dir);

        assert_eq!(
            resolve(&catalog, "CREATE INDEX by_name ON users (name)").unwrap(),
            QueryTree::CreateIndex {
                index_name: "by_name".to_string(),
                table: "users".to_string(),
                column: "Name".to_string(),
            }
        );
        assert!(matches!(
            resolve(&catalog, "CREATE INDEX i ON users (email)"),
            Err(Error::ColumnNotFound(..))
        ));
    }
}
