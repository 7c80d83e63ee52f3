//! SQL Abstract Syntax Tree (AST)
//!
//! The parser builds a uniform tree: every node has a kind, an optional text payload and
//! ordered children. The resolver consumes it once and discards it.
//!
//! | kind          | value             | children                                         |
//! |---------------|-------------------|--------------------------------------------------|
//! | `CreateTable` | table name        | `ColumnDef`*                                     |
//! | `CreateTable` | `INDEX`           | `Identifier` index, table, column                |
//! | `DropTable`   | table name        |                                                  |
//! | `Insert`      | table name        | optional `ColumnList` of names, `ColumnList` of values |
//! | `Select`      |                   | `ColumnList`, `Identifier` table, optional `WhereClause` |
//! | `ColumnDef`   |                   | `Identifier` name, `Identifier` type             |
//! | `BinaryOp`    | operator          | left, right                                      |
//! | `WhereClause` |                   | expression                                       |

use std::fmt;

/// Marker value distinguishing CREATE INDEX from CREATE TABLE. `INDEX` is a keyword, so no
/// table can carry this name.
pub const CREATE_INDEX_MARKER: &str = "INDEX";

/// How a literal was written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiteralKind {
    /// Single-quoted text
    Quoted,
    /// Unquoted digits
    Number,
}

/// AST node kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    CreateTable,
    DropTable,
    Insert,
    Select,
    ColumnDef,
    BinaryOp,
    Literal(LiteralKind),
    Identifier,
    WhereClause,
    ColumnList,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NodeKind::CreateTable => "CREATE_TABLE",
            NodeKind::DropTable => "DROP_TABLE",
            NodeKind::Insert => "INSERT",
            NodeKind::Select => "SELECT",
            NodeKind::ColumnDef => "COLUMN_DEF",
            NodeKind::BinaryOp => "BINARY_OP",
            NodeKind::Literal(_) => "LITERAL",
            NodeKind::Identifier => "IDENTIFIER",
            NodeKind::WhereClause => "WHERE_CLAUSE",
            NodeKind::ColumnList => "COLUMN_LIST",
        };
        write!(f, "{}", s)
    }
}

/// A node of the syntax tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AstNode {
    pub kind: NodeKind,
    pub value: Option<String>,
    pub children: Vec<AstNode>,
}

impl AstNode {
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            value: None,
            children: Vec::new(),
        }
    }

    pub fn with_value(kind: NodeKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: Some(value.into()),
            children: Vec::new(),
        }
    }

    pub fn identifier(name: impl Into<String>) -> Self {
        Self::with_value(NodeKind::Identifier, name)
    }

    pub fn add_child(&mut self, child: AstNode) {
        self.children.push(child);
    }

    pub fn with_child(mut self, child: AstNode) -> Self {
        self.add_child(child);
        self
    }

    /// Payload text, empty when the node carries none
    pub fn text(&self) -> &str {
        self.value.as_deref().unwrap_or("")
    }

    pub fn child(&self, index: usize) -> Option<&AstNode> {
        self.children.get(index)
    }

    /// Is this the CREATE INDEX form of a `CreateTable` node?
    pub fn is_create_index(&self) -> bool {
        self.kind == NodeKind::CreateTable && self.value.as_deref() == Some(CREATE_INDEX_MARKER)
    }
}

impl fmt::Display for AstNode {
    /// S-expression rendering, used in test failure output and debug logs
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}", self.kind)?;
        if let Some(value) = &self.value {
            write!(f, " {:?}", value)?;
        }
        for child in &self.children {
            write!(f, " {}", child)?;
        }
        write!(f, ")")
    }
}
