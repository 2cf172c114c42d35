use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenType {
    // Single-character tokens.
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    LeftBracket,
    RightBracket,
    Comma,
    Dot,
    Minus,
    Plus,
    Semicolon,
    Colon,
    Slash,
    Star,
    Percent,

    // One or two character tokens.
    Bang,
    BangEqual,
    Equal,
    EqualEqual,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,

    // Literals.
    Identifier,
    String,
    Number,

    // Keywords.
    And,
    Class,
    Else,
    False,
    For,
    Function,
    If,
    Implements,
    Let,
    Nil,
    Not,
    Or,
    Print,
    Return,
    Super,
    This,
    True,
    While,

    // Reserved for future use; lexed so they can't be taken as identifiers.
    Extends,
    Interface,
    New,
    TypeName,

    Newline,
    Eof,
}

/// The value carried by a literal token.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Number(f64),
    Str(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenType,
    pub lexeme: String,
    pub literal: Option<Literal>,
    pub line: u32,
}

impl Token {
    pub fn new(kind: TokenType, lexeme: impl Into<String>, literal: Option<Literal>, line: u32) -> Self {
        Token {
            kind,
            lexeme: lexeme.into(),
            literal,
            line,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TokenType::Eof => write!(f, "end"),
            TokenType::Newline => write!(f, "newline"),
            _ => write!(f, "'{}'", self.lexeme),
        }
    }
}
