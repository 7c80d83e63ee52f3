//! SQL Token definitions
//!
//! This module defines all tokens that can appear in SQL statements.

use std::fmt;

/// SQL Token kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // ========== Keywords ==========
    // DDL Keywords
    Create,
    Drop,
    Table,
    Index,
    On,

    // DML Keywords
    Select,
    Insert,
    Into,
    Values,
    From,
    Where,

    // Clauses
    And,
    Or,
    Not,
    As,

    // ========== Literals ==========
    /// Single-quoted string, lexeme holds the text between the quotes
    StringLiteral,
    /// Unsigned integer, lexeme holds the digits
    NumberLiteral,
    /// Identifier (table name, column name, type name)
    Identifier,

    // ========== Operators ==========
    /// =
    Eq,
    /// <>
    Neq,
    /// <
    Lt,
    /// >
    Gt,
    /// <=
    Lte,
    /// >=
    Gte,

    // ========== Delimiters ==========
    /// (
    LParen,
    /// )
    RParen,
    /// ,
    Comma,
    /// ;
    Semicolon,
    /// .
    Dot,
    /// *
    Asterisk,

    // ========== Special ==========
    /// A character the lexer does not recognize
    Unknown,
    /// End of input
    Eof,
}

impl TokenKind {
    /// Check if this token kind is a keyword
    pub fn is_keyword(&self) -> bool {
        matches!(
            self,
            TokenKind::Create
                | TokenKind::Drop
                | TokenKind::Table
                | TokenKind::Index
                | TokenKind::On
                | TokenKind::Select
                | TokenKind::Insert
                | TokenKind::Into
                | TokenKind::Values
                | TokenKind::From
                | TokenKind::Where
                | TokenKind::And
                | TokenKind::Or
                | TokenKind::Not
                | TokenKind::As
        )
    }

    /// Is this one of the six comparison operators?
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            TokenKind::Eq
                | TokenKind::Neq
                | TokenKind::Lt
                | TokenKind::Gt
                | TokenKind::Lte
                | TokenKind::Gte
        )
    }

    /// Try to parse a keyword from a string
    pub fn from_keyword(s: &str) -> Option<TokenKind> {
        match s.to_uppercase().as_str() {
            "CREATE" => Some(TokenKind::Create),
            "DROP" => Some(TokenKind::Drop),
            "TABLE" => Some(TokenKind::Table),
            "INDEX" => Some(TokenKind::Index),
            "ON" => Some(TokenKind::On),
            "SELECT" => Some(TokenKind::Select),
            "INSERT" => Some(TokenKind::Insert),
            "INTO" => Some(TokenKind::Into),
            "VALUES" => Some(TokenKind::Values),
            "FROM" => Some(TokenKind::From),
            "WHERE" => Some(TokenKind::Where),
            "AND" => Some(TokenKind::And),
            "OR" => Some(TokenKind::Or),
            "NOT" => Some(TokenKind::Not),
            "AS" => Some(TokenKind::As),
            _ => None,
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TokenKind::Create => "CREATE",
            TokenKind::Drop => "DROP",
            TokenKind::Table => "TABLE",
            TokenKind::Index => "INDEX",
            TokenKind::On => "ON",
            TokenKind::Select => "SELECT",
            TokenKind::Insert => "INSERT",
            TokenKind::Into => "INTO",
            TokenKind::Values => "VALUES",
            TokenKind::From => "FROM",
            TokenKind::Where => "WHERE",
            TokenKind::And => "AND",
            TokenKind::Or => "OR",
            TokenKind::Not => "NOT",
            TokenKind::As => "AS",
            TokenKind::StringLiteral => "STRING",
            TokenKind::NumberLiteral => "NUMBER",
            TokenKind::Identifier => "IDENTIFIER",
            TokenKind::Eq => "=",
            TokenKind::Neq => "<>",
            TokenKind::Lt => "<",
            TokenKind::Gt => ">",
            TokenKind::Lte => "<=",
            TokenKind::Gte => ">=",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::Comma => ",",
            TokenKind::Semicolon => ";",
            TokenKind::Dot => ".",
            TokenKind::Asterisk => "*",
            TokenKind::Unknown => "UNKNOWN",
            TokenKind::Eof => "EOF",
        };
        write!(f, "{}", s)
    }
}

/// A token with its source text and position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    /// Source text; upper-cased for keywords, unquoted for strings
    pub lexeme: String,
    /// 1-based line
    pub line: usize,
    /// 1-based column
    pub column: usize,
}

impl Token {
    pub fn new(kind: TokenKind, lexeme: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            kind,
            lexeme: lexeme.into(),
            line,
            column,
        }
    }

    pub fn is(&self, kind: TokenKind) -> bool {
        self.kind == kind
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TokenKind::Eof => write!(f, "EOF"),
            kind if kind.is_keyword() => write!(f, "{}", kind),
            kind => write!(f, "{} ('{}')", kind, self.lexeme),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_parsing() {
        assert_eq!(TokenKind::from_keyword("SELECT"), Some(TokenKind::Select));
        assert_eq!(TokenKind::from_keyword("select"), Some(TokenKind::Select));
        assert_eq!(TokenKind::from_keyword("SeLeCt"), Some(TokenKind::Select));
        assert_eq!(TokenKind::from_keyword("INTEGER"), None);
        assert_eq!(TokenKind::from_keyword("unknown"), None);
    }

    #[test]
    fn test_is_keyword() {
        assert!(TokenKind::Select.is_keyword());
        assert!(TokenKind::Index.is_keyword());
        assert!(!TokenKind::Asterisk.is_keyword());
        assert!(!TokenKind::Identifier.is_keyword());
    }

    #[test]
    fn test_token_display() {
        assert_eq!(Token::new(TokenKind::From, "FROM", 1, 1).to_string(), "FROM");
        assert_eq!(
            Token::new(TokenKind::NumberLiteral, "5", 1, 8).to_string(),
            "NUMBER ('5')"
        );
        assert_eq!(Token::new(TokenKind::Eof, "", 1, 9).to_string(), "EOF");
    }
}
