pub mod ast;
pub mod lexer;
pub mod parser;
pub mod token;

pub use ast::{ClassDecl, Expr, FunctionDecl, Stmt};
pub use token::{Token, TokenType};

use mica_core::MicaError;

/// Parse a full program. On failure, returns every error collected across
/// the lex and parse phases so callers can report them in one batch.
pub fn parse(source: &str) -> Result<Vec<Stmt>, Vec<MicaError>> {
    let (tokens, mut errors) = lexer::tokenize(source);
    let (statements, parse_errors) = parser::Parser::new(tokens).parse();
    errors.extend(parse_errors);
    if errors.is_empty() {
        Ok(statements)
    } else {
        Err(errors)
    }
}
