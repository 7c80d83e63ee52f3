//! SQL front end
//!
//! Text goes through the lexer and parser into an `AstNode`, which the resolver checks
//! against the catalog and turns into a `QueryTree`.

pub mod ast;
pub mod lexer;
pub mod parser;
pub mod resolver;
pub mod token;

pub use ast::{AstNode, LiteralKind, NodeKind};
pub use lexer::Lexer;
pub use parser::Parser;
pub use resolver::{CompareOp, Predicate, QueryTree, Resolver};
pub use token::{Token, TokenKind};
