//! Lexer for the command text protocol
//!
//! Splits raw command bytes into tokens: unquoted runs terminated by
//! whitespace, and double-quoted runs where `\"` and `\\` are escapes.

use std::fmt;

/// Token types produced by the lexer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Bare run of non-whitespace bytes
    Word(Vec<u8>),
    /// Contents of a double-quoted run, escapes resolved
    Quoted(Vec<u8>),
    /// End of input
    Eof,
}

impl Token {
    /// Payload bytes of a word or quoted token.
    pub fn into_bytes(self) -> Option<Vec<u8>> {
        match self {
            Token::Word(b) | Token::Quoted(b) => Some(b),
            Token::Eof => None,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Word(b) => write!(f, "{}", String::from_utf8_lossy(b)),
            Token::Quoted(b) => write!(f, "\"{}\"", String::from_utf8_lossy(b)),
            Token::Eof => write!(f, "EOF"),
        }
    }
}

/// Lexer errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LexerError {
    /// Input ended inside a quoted token that opened at this offset
    UnterminatedQuote(usize),
    /// A closing quote was immediately followed by another byte
    MissingSeparator(usize),
}

impl fmt::Display for LexerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LexerError::UnterminatedQuote(pos) => {
                write!(f, "unterminated quote starting at offset {}", pos)
            }
            LexerError::MissingSeparator(pos) => {
                write!(f, "expected whitespace after closing quote at offset {}", pos)
            }
        }
    }
}

impl std::error::Error for LexerError {}

impl From<LexerError> for crate::Error {
    fn from(err: LexerError) -> Self {
        crate::Error::Syntax(err.to_string())
    }
}

/// Lexer state
pub struct Lexer<'a> {
    input: &'a [u8],
    position: usize,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer over raw command bytes
    pub fn new(input: &'a [u8]) -> Self {
        Self { input, position: 0 }
    }

    /// Get the next token
    pub fn next_token(&mut self) -> Result<Token, LexerError> {
        self.skip_whitespace();

        if self.position >= self.input.len() {
            return Ok(Token::Eof);
        }

        if self.current_byte() == b'"' {
            return self.read_quoted();
        }

        Ok(self.read_word())
    }

    /// Tokenize entire input into vector of tokens
    pub fn tokenize(&mut self) -> Result<Vec<Token>, LexerError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            if token == Token::Eof {
                tokens.push(token);
                break;
            }
            tokens.push(token);
        }
        Ok(tokens)
    }

    fn current_byte(&self) -> u8 {
        self.input[self.position]
    }

    fn peek_byte(&self) -> Option<u8> {
        self.input.get(self.position + 1).copied()
    }

    fn advance(&mut self) {
        self.position += 1;
    }

    fn skip_whitespace(&mut self) {
        while self.position < self.input.len() && self.current_byte().is_ascii_whitespace() {
            self.advance();
        }
    }

    fn read_word(&mut self) -> Token {
        let start = self.position;
        while self.position < self.input.len() && !self.current_byte().is_ascii_whitespace() {
            self.advance();
        }
        Token::Word(self.input[start..self.position].to_vec())
    }

    fn read_quoted(&mut self) -> Result<Token, LexerError> {
        let start = self.position;
        self.advance(); // opening quote

        let mut buf = Vec::new();
        loop {
            if self.position >= self.input.len() {
                return Err(LexerError::UnterminatedQuote(start));
            }

            match self.current_byte() {
                b'\\' => match self.peek_byte() {
                    Some(escaped @ (b'"' | b'\\')) => {
                        buf.push(escaped);
                        self.advance();
                        self.advance();
                    }
                    _ => {
                        buf.push(b'\\');
                        self.advance();
                    }
                },
                b'"' => {
                    self.advance();
                    break;
                }
                byte => {
                    buf.push(byte);
                    self.advance();
                }
            }
        }

        if self.position < self.input.len() && !self.current_byte().is_ascii_whitespace() {
            return Err(LexerError::MissingSeparator(self.position - 1));
        }

        Ok(Token::Quoted(buf))
    }
}
