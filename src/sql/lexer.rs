//! SQL Lexer (Tokenizer)
//!
//! This module converts SQL strings into a stream of tokens. The lexer never fails:
//! a character it does not recognize becomes an `Unknown` token for the parser to reject.

use super::token::{Token, TokenKind};

/// SQL Lexer
pub struct Lexer {
    /// Input characters
    input: Vec<char>,
    /// Current position in input
    position: usize,
    /// Current line (1-based)
    line: usize,
    /// Current column (1-based)
    column: usize,
}

impl Lexer {
    /// Create a new lexer for the given input
    pub fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            position: 0,
            line: 1,
            column: 1,
        }
    }

    /// Tokenize the entire input; the last token is always `Eof`
    pub fn tokenize(&mut self) -> Vec<Token> {
        let mut tokens = Vec::new();

        loop {
            let token = self.next_token();
            let done = token.is(TokenKind::Eof);
            tokens.push(token);
            if done {
                break;
            }
        }

        tokens
    }

    /// Get the next token from the input
    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace_and_comments();

        let (line, column) = (self.line, self.column);
        let Some(ch) = self.current_char() else {
            return Token::new(TokenKind::Eof, "", line, column);
        };

        let single = |kind: TokenKind| Some((kind, ch.to_string()));
        let punct = match ch {
            '(' => single(TokenKind::LParen),
            ')' => single(TokenKind::RParen),
            ',' => single(TokenKind::Comma),
            ';' => single(TokenKind::Semicolon),
            '.' => single(TokenKind::Dot),
            '*' => single(TokenKind::Asterisk),
            '=' => single(TokenKind::Eq),
            _ => None,
        };
        if let Some((kind, lexeme)) = punct {
            self.advance();
            return Token::new(kind, lexeme, line, column);
        }

        match ch {
            '<' => {
                self.advance();
                match self.current_char() {
                    Some('=') => {
                        self.advance();
                        Token::new(TokenKind::Lte, "<=", line, column)
                    }
                    Some('>') => {
                        self.advance();
                        Token::new(TokenKind::Neq, "<>", line, column)
                    }
                    _ => Token::new(TokenKind::Lt, "<", line, column),
                }
            }
            '>' => {
                self.advance();
                if self.current_char() == Some('=') {
                    self.advance();
                    return Token::new(TokenKind::Gte, ">=", line, column);
                }
                Token::new(TokenKind::Gt, ">", line, column)
            }
            '\'' => self.read_string(line, column),
            c if c.is_ascii_digit() => self.read_number(line, column),
            c if c.is_alphabetic() || c == '_' => self.read_identifier(line, column),
            other => {
                self.advance();
                Token::new(TokenKind::Unknown, other.to_string(), line, column)
            }
        }
    }

    /// Get the current character
    fn current_char(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    /// Peek at the next character
    fn peek_char(&self) -> Option<char> {
        self.input.get(self.position + 1).copied()
    }

    /// Advance to the next character, tracking line and column.
    /// `\r\n` counts as a single line break.
    fn advance(&mut self) {
        match self.current_char() {
            Some('\n') => {
                self.line += 1;
                self.column = 1;
            }
            Some('\r') => {
                if self.peek_char() == Some('\n') {
                    self.position += 1;
                }
                self.line += 1;
                self.column = 1;
            }
            Some(_) => self.column += 1,
            None => return,
        }
        self.position += 1;
    }

    /// Skip whitespace and `--` line comments
    fn skip_whitespace_and_comments(&mut self) {
        while let Some(ch) = self.current_char() {
            if ch.is_whitespace() {
                self.advance();
            } else if ch == '-' && self.peek_char() == Some('-') {
                while let Some(c) = self.current_char() {
                    if c == '\n' || c == '\r' {
                        break;
                    }
                    self.advance();
                }
            } else {
                break;
            }
        }
    }

    /// Read a string literal (single-quoted).
    /// There is no escape syntax; an unterminated literal runs to the end of input.
    fn read_string(&mut self, line: usize, column: usize) -> Token {
        self.advance(); // skip opening quote

        let mut value = String::new();
        while let Some(ch) = self.current_char() {
            self.advance();
            if ch == '\'' {
                break;
            }
            value.push(ch);
        }

        Token::new(TokenKind::StringLiteral, value, line, column)
    }

    /// Read an unsigned integer
    fn read_number(&mut self, line: usize, column: usize) -> Token {
        let mut value = String::new();
        while let Some(ch) = self.current_char().filter(|c| c.is_ascii_digit()) {
            value.push(ch);
            self.advance();
        }
        Token::new(TokenKind::NumberLiteral, value, line, column)
    }

    /// Read an identifier or keyword
    fn read_identifier(&mut self, line: usize, column: usize) -> Token {
        let mut value = String::new();
        while let Some(ch) = self
            .current_char()
            .filter(|c| c.is_alphanumeric() || *c == '_')
        {
            value.push(ch);
            self.advance();
        }

        // Check if it's a keyword
        match TokenKind::from_keyword(&value) {
            Some(keyword) => Token::new(keyword, value.to_uppercase(), line, column),
            None => Token::new(TokenKind::Identifier, value, line, column),
        }
    }
}
