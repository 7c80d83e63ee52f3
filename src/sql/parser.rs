//! SQL Parser
//!
//! This module parses SQL tokens into an AST, one statement per call.
//!
//! ```text
//! statement   ::= create_table | create_index | drop_table | insert | select
//! expression  ::= term ((AND | OR) term)*        -- left-associative, equal precedence
//! term        ::= factor [comparison factor]     -- at most one comparison
//! factor      ::= IDENTIFIER | STRING | NUMBER | '(' expression ')'
//! ```

use super::ast::{AstNode, LiteralKind, NodeKind, CREATE_INDEX_MARKER};
use super::lexer::Lexer;
use super::token::{Token, TokenKind};
use crate::error::{Error, Result};

/// SQL Parser
pub struct Parser {
    tokens: Vec<Token>,
    position: usize,
}

impl Parser {
    /// Create a new parser from a SQL string
    pub fn new(sql: &str) -> Self {
        Self::from_tokens(Lexer::new(sql).tokenize())
    }

    /// Create a parser over an existing token stream
    pub fn from_tokens(mut tokens: Vec<Token>) -> Self {
        if !tokens.last().map_or(false, |t| t.is(TokenKind::Eof)) {
            let (line, column) = tokens.last().map_or((1, 1), |t| (t.line, t.column));
            tokens.push(Token::new(TokenKind::Eof, "", line, column));
        }
        Self {
            tokens,
            position: 0,
        }
    }

    /// Parse exactly one statement, optionally followed by a semicolon
    pub fn parse(&mut self) -> Result<AstNode> {
        if self.check(TokenKind::Eof) {
            return Err(Error::EmptyQuery);
        }

        let stmt = self.parse_statement()?;

        // Consume optional semicolon
        if self.check(TokenKind::Semicolon) {
            self.advance();
        }
        self.expect(TokenKind::Eof, "end of statement")?;

        Ok(stmt)
    }

    /// Parse a single statement
    fn parse_statement(&mut self) -> Result<AstNode> {
        match self.current().kind {
            TokenKind::Create => self.parse_create(),
            TokenKind::Drop => self.parse_drop(),
            TokenKind::Insert => self.parse_insert(),
            TokenKind::Select => self.parse_select(),
            _ => Err(self.unexpected("CREATE, DROP, INSERT or SELECT")),
        }
    }

    // ========== DDL Statements ==========

    fn parse_create(&mut self) -> Result<AstNode> {
        self.expect(TokenKind::Create, "CREATE")?;

        match self.current().kind {
            TokenKind::Table => self.parse_create_table(),
            TokenKind::Index => self.parse_create_index(),
            _ => Err(self.unexpected("TABLE or INDEX")),
        }
    }

    fn parse_create_table(&mut self) -> Result<AstNode> {
        self.expect(TokenKind::Table, "TABLE")?;
        let table_name = self.expect_identifier()?;
        let mut node = AstNode::with_value(NodeKind::CreateTable, table_name);

        self.expect(TokenKind::LParen, "(")?;
        loop {
            node.add_child(self.parse_column_def()?);
            if self.check(TokenKind::Comma) {
                self.advance();
            } else {
                break;
            }
        }
        self.expect(TokenKind::RParen, ")")?;

        Ok(node)
    }

    fn parse_column_def(&mut self) -> Result<AstNode> {
        let name = self.expect_identifier()?;
        let data_type = self.expect_identifier()?;

        Ok(AstNode::new(NodeKind::ColumnDef)
            .with_child(AstNode::identifier(name))
            .with_child(AstNode::identifier(data_type)))
    }

    /// `CREATE INDEX name ON table (column)`
    fn parse_create_index(&mut self) -> Result<AstNode> {
        self.expect(TokenKind::Index, "INDEX")?;
        let index_name = self.expect_identifier()?;
        self.expect(TokenKind::On, "ON")?;
        let table_name = self.expect_identifier()?;
        self.expect(TokenKind::LParen, "(")?;
        let column_name = self.expect_identifier()?;
        self.expect(TokenKind::RParen, ")")?;

        Ok(
            AstNode::with_value(NodeKind::CreateTable, CREATE_INDEX_MARKER)
                .with_child(AstNode::identifier(index_name))
                .with_child(AstNode::identifier(table_name))
                .with_child(AstNode::identifier(column_name)),
        )
    }

    fn parse_drop(&mut self) -> Result<AstNode> {
        self.expect(TokenKind::Drop, "DROP")?;
        self.expect(TokenKind::Table, "TABLE")?;
        let table_name = self.expect_identifier()?;

        Ok(AstNode::with_value(NodeKind::DropTable, table_name))
    }

    // ========== DML Statements ==========

    fn parse_insert(&mut self) -> Result<AstNode> {
        self.expect(TokenKind::Insert, "INSERT")?;
        self.expect(TokenKind::Into, "INTO")?;
        let table_name = self.expect_identifier()?;
        let mut node = AstNode::with_value(NodeKind::Insert, table_name);

        // Optional column list
        if self.check(TokenKind::LParen) {
            self.advance();
            let mut columns = AstNode::new(NodeKind::ColumnList);
            for name in self.parse_identifier_list()? {
                columns.add_child(AstNode::identifier(name));
            }
            self.expect(TokenKind::RParen, ")")?;
            node.add_child(columns);
        }

        self.expect(TokenKind::Values, "VALUES")?;
        self.expect(TokenKind::LParen, "(")?;
        let mut values = AstNode::new(NodeKind::ColumnList);
        loop {
            values.add_child(self.parse_expression()?);
            if self.check(TokenKind::Comma) {
                self.advance();
            } else {
                break;
            }
        }
        self.expect(TokenKind::RParen, ")")?;
        node.add_child(values);

        Ok(node)
    }

    fn parse_select(&mut self) -> Result<AstNode> {
        self.expect(TokenKind::Select, "SELECT")?;
        let mut node = AstNode::new(NodeKind::Select);

        let mut columns = AstNode::new(NodeKind::ColumnList);
        if self.check(TokenKind::Asterisk) {
            self.advance();
            columns.add_child(AstNode::identifier("*"));
        } else {
            for name in self.parse_identifier_list()? {
                columns.add_child(AstNode::identifier(name));
            }
        }
        node.add_child(columns);

        self.expect(TokenKind::From, "FROM")?;
        node.add_child(AstNode::identifier(self.expect_identifier()?));

        // Optional WHERE clause
        if self.check(TokenKind::Where) {
            self.advance();
            let expr = self.parse_expression()?;
            node.add_child(AstNode::new(NodeKind::WhereClause).with_child(expr));
        }

        Ok(node)
    }

    // ========== Expressions ==========

    fn parse_expression(&mut self) -> Result<AstNode> {
        let mut left = self.parse_term()?;

        while self.check(TokenKind::And) || self.check(TokenKind::Or) {
            let op = self.current().lexeme.clone();
            self.advance();
            let right = self.parse_term()?;
            left = AstNode::with_value(NodeKind::BinaryOp, op)
                .with_child(left)
                .with_child(right);
        }

        Ok(left)
    }

    fn parse_term(&mut self) -> Result<AstNode> {
        let left = self.parse_factor()?;

        if !self.current().kind.is_comparison() {
            return Ok(left);
        }
        let op = self.current().lexeme.clone();
        self.advance();
        let right = self.parse_factor()?;

        Ok(AstNode::with_value(NodeKind::BinaryOp, op)
            .with_child(left)
            .with_child(right))
    }

    fn parse_factor(&mut self) -> Result<AstNode> {
        let token = self.current().clone();
        let node = match token.kind {
            TokenKind::Identifier => AstNode::identifier(token.lexeme),
            TokenKind::StringLiteral => {
                AstNode::with_value(NodeKind::Literal(LiteralKind::Quoted), token.lexeme)
            }
            TokenKind::NumberLiteral => {
                AstNode::with_value(NodeKind::Literal(LiteralKind::Number), token.lexeme)
            }
            TokenKind::LParen => {
                self.advance();
                let expr = self.parse_expression()?;
                self.expect(TokenKind::RParen, ")")?;
                return Ok(expr);
            }
            _ => return Err(self.unexpected("identifier, literal or '('")),
        };
        self.advance();
        Ok(node)
    }

    // ========== Helpers ==========

    fn parse_identifier_list(&mut self) -> Result<Vec<String>> {
        let mut identifiers = vec![self.expect_identifier()?];

        while self.check(TokenKind::Comma) {
            self.advance();
            identifiers.push(self.expect_identifier()?);
        }

        Ok(identifiers)
    }

    fn current(&self) -> &Token {
        // `from_tokens` guarantees a trailing Eof
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[self.position.min(last)]
    }

    fn advance(&mut self) {
        if self.position < self.tokens.len() {
            self.position += 1;
        }
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.current().is(kind)
    }

    fn expect(&mut self, kind: TokenKind, expected: &str) -> Result<()> {
        if self.check(kind) {
            self.advance();
            Ok(())
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn expect_identifier(&mut self) -> Result<String> {
        if self.check(TokenKind::Identifier) {
            let name = self.current().lexeme.clone();
            self.advance();
            Ok(name)
        } else {
            Err(self.unexpected("IDENTIFIER"))
        }
    }

    fn unexpected(&self, expected: &str) -> Error {
        let token = self.current();
        Error::UnexpectedToken {
            expected: expected.to_string(),
            found: token.to_string(),
            line: token.line,
            column: token.column,
        }
    }
}
