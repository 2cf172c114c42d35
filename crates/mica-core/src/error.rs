use std::fmt;

/// Where a parse error occurred within its line: at end of input, at a
/// specific lexeme, or with no positional hint (lexer-level errors).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorLocation {
    General,
    AtEnd,
    AtLexeme(String),
}

impl fmt::Display for ErrorLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorLocation::General => Ok(()),
            ErrorLocation::AtEnd => write!(f, " at end"),
            ErrorLocation::AtLexeme(lexeme) => write!(f, " at '{lexeme}'"),
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum MicaError {
    #[error("[line {line}] Error{location}: {message}")]
    Parse {
        line: u32,
        location: ErrorLocation,
        message: String,
    },

    #[error("Compile error: {0}")]
    Compile(String),

    #[error("Runtime error: {0}")]
    Runtime(String),

    #[error("Bytecode error: {0}")]
    Bytecode(String),

    #[error("IO error: {0}")]
    Io(String),
}

impl MicaError {
    pub fn parse(line: u32, location: ErrorLocation, message: impl Into<String>) -> Self {
        MicaError::Parse {
            line,
            location,
            message: message.into(),
        }
    }

    pub fn compile(msg: impl Into<String>) -> Self {
        MicaError::Compile(msg.into())
    }

    pub fn runtime(msg: impl Into<String>) -> Self {
        MicaError::Runtime(msg.into())
    }

    pub fn bytecode(msg: impl Into<String>) -> Self {
        MicaError::Bytecode(msg.into())
    }

    /// Arity mismatch, phrased the way every callable reports it.
    pub fn arity(expected: usize, got: usize) -> Self {
        MicaError::Runtime(format!("Expected {expected} arguments but got {got}."))
    }
}

impl From<std::io::Error> for MicaError {
    fn from(e: std::io::Error) -> Self {
        MicaError::Io(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_display() {
        let e = MicaError::parse(3, ErrorLocation::AtLexeme("}".into()), "Expect expression.");
        assert_eq!(e.to_string(), "[line 3] Error at '}': Expect expression.");

        let e = MicaError::parse(7, ErrorLocation::AtEnd, "Expect ')' after arguments.");
        assert_eq!(
            e.to_string(),
            "[line 7] Error at end: Expect ')' after arguments."
        );
    }

    #[test]
    fn arity_error_display() {
        let e = MicaError::arity(2, 5);
        assert_eq!(e.to_string(), "Runtime error: Expected 2 arguments but got 5.");
    }
}
