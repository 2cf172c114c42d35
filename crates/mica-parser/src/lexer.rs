use mica_core::error::{ErrorLocation, MicaError};

use crate::token::{Literal, Token, TokenType};

/// Scan a source string into tokens. Errors (unexpected characters,
/// unterminated strings) are collected rather than aborting the scan, so the
/// parser can still report errors for the rest of the input.
pub fn tokenize(source: &str) -> (Vec<Token>, Vec<MicaError>) {
    let mut lexer = Lexer::new(source);
    lexer.scan();
    (lexer.tokens, lexer.errors)
}

fn keyword(text: &str) -> Option<TokenType> {
    let kind = match text {
        "and" => TokenType::And,
        "class" => TokenType::Class,
        "else" => TokenType::Else,
        "false" => TokenType::False,
        "for" => TokenType::For,
        "function" => TokenType::Function,
        "if" => TokenType::If,
        "implements" => TokenType::Implements,
        "let" => TokenType::Let,
        "nil" => TokenType::Nil,
        "not" => TokenType::Not,
        "or" => TokenType::Or,
        "print" => TokenType::Print,
        "return" => TokenType::Return,
        "super" => TokenType::Super,
        "this" => TokenType::This,
        "true" => TokenType::True,
        "while" => TokenType::While,
        "extends" => TokenType::Extends,
        "interface" => TokenType::Interface,
        "new" => TokenType::New,
        "int" | "double" | "string" | "bool" | "void" => TokenType::TypeName,
        _ => return None,
    };
    Some(kind)
}

struct Lexer {
    chars: Vec<char>,
    tokens: Vec<Token>,
    errors: Vec<MicaError>,
    start: usize,
    current: usize,
    line: u32,
}

impl Lexer {
    fn new(source: &str) -> Self {
        Lexer {
            chars: source.chars().collect(),
            tokens: Vec::new(),
            errors: Vec::new(),
            start: 0,
            current: 0,
            line: 1,
        }
    }

    fn scan(&mut self) {
        while !self.is_at_end() {
            self.start = self.current;
            self.scan_token();
        }
        self.tokens
            .push(Token::new(TokenType::Eof, "", None, self.line));
    }

    fn scan_token(&mut self) {
        let c = self.advance();
        match c {
            ' ' | '\r' | '\t' => {}
            '\n' => {
                self.line += 1;
                // The newline token carries the line it terminates.
                self.tokens
                    .push(Token::new(TokenType::Newline, "\\n", None, self.line - 1));
            }
            '(' => self.add_token(TokenType::LeftParen),
            ')' => self.add_token(TokenType::RightParen),
            '{' => self.add_token(TokenType::LeftBrace),
            '}' => self.add_token(TokenType::RightBrace),
            '[' => self.add_token(TokenType::LeftBracket),
            ']' => self.add_token(TokenType::RightBracket),
            ',' => self.add_token(TokenType::Comma),
            '.' => self.add_token(TokenType::Dot),
            '-' => self.add_token(TokenType::Minus),
            '+' => self.add_token(TokenType::Plus),
            ';' => self.add_token(TokenType::Semicolon),
            ':' => self.add_token(TokenType::Colon),
            '*' => self.add_token(TokenType::Star),
            '%' => self.add_token(TokenType::Percent),
            '!' => {
                let kind = if self.match_char('=') {
                    TokenType::BangEqual
                } else {
                    TokenType::Bang
                };
                self.add_token(kind);
            }
            '=' => {
                let kind = if self.match_char('=') {
                    TokenType::EqualEqual
                } else {
                    TokenType::Equal
                };
                self.add_token(kind);
            }
            '<' => {
                let kind = if self.match_char('=') {
                    TokenType::LessEqual
                } else {
                    TokenType::Less
                };
                self.add_token(kind);
            }
            '>' => {
                let kind = if self.match_char('=') {
                    TokenType::GreaterEqual
                } else {
                    TokenType::Greater
                };
                self.add_token(kind);
            }
            '/' => {
                if self.match_char('/') {
                    while self.peek() != '\n' && !self.is_at_end() {
                        self.advance();
                    }
                } else {
                    self.add_token(TokenType::Slash);
                }
            }
            '"' => self.string(),
            c if c.is_ascii_digit() => self.number(),
            c if is_identifier_start(c) => self.identifier(),
            c => {
                self.errors.push(MicaError::parse(
                    self.line,
                    ErrorLocation::General,
                    format!("Unexpected character: {c}"),
                ));
            }
        }
    }

    fn identifier(&mut self) {
        while is_identifier_part(self.peek()) {
            self.advance();
        }
        let text: String = self.chars[self.start..self.current].iter().collect();
        let kind = keyword(&text).unwrap_or(TokenType::Identifier);
        self.tokens.push(Token::new(kind, text, None, self.line));
    }

    fn number(&mut self) {
        while self.peek().is_ascii_digit() {
            self.advance();
        }
        if self.peek() == '.' && self.peek_next().is_ascii_digit() {
            self.advance();
            while self.peek().is_ascii_digit() {
                self.advance();
            }
        }
        let text: String = self.chars[self.start..self.current].iter().collect();
        // Digits and at most one dot always parse as f64.
        let value = text.parse::<f64>().unwrap_or(0.0);
        self.tokens.push(Token::new(
            TokenType::Number,
            text,
            Some(Literal::Number(value)),
            self.line,
        ));
    }

    fn string(&mut self) {
        while self.peek() != '"' && !self.is_at_end() {
            if self.peek() == '\n' {
                self.line += 1;
            }
            self.advance();
        }

        if self.is_at_end() {
            self.errors.push(MicaError::parse(
                self.line,
                ErrorLocation::General,
                "Unterminated string.",
            ));
            return;
        }

        self.advance(); // closing quote

        let value: String = self.chars[self.start + 1..self.current - 1].iter().collect();
        let lexeme: String = self.chars[self.start..self.current].iter().collect();
        self.tokens.push(Token::new(
            TokenType::String,
            lexeme,
            Some(Literal::Str(value)),
            self.line,
        ));
    }

    fn match_char(&mut self, expected: char) -> bool {
        if self.is_at_end() || self.chars[self.current] != expected {
            return false;
        }
        self.current += 1;
        true
    }

    fn peek(&self) -> char {
        if self.is_at_end() {
            '\0'
        } else {
            self.chars[self.current]
        }
    }

    fn peek_next(&self) -> char {
        if self.current + 1 >= self.chars.len() {
            '\0'
        } else {
            self.chars[self.current + 1]
        }
    }

    fn advance(&mut self) -> char {
        let c = self.chars[self.current];
        self.current += 1;
        c
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.chars.len()
    }

    fn add_token(&mut self, kind: TokenType) {
        let lexeme: String = self.chars[self.start..self.current].iter().collect();
        self.tokens.push(Token::new(kind, lexeme, None, self.line));
    }
}

fn is_identifier_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_identifier_part(c: char) -> bool {
    is_identifier_start(c) || c.is_ascii_digit()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenType> {
        let (tokens, errors) = tokenize(source);
        assert!(errors.is_empty(), "unexpected errors: {errors:?}");
        tokens.into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn scans_operators_and_literals() {
        assert_eq!(
            kinds("let x = 1 + 2.5"),
            vec![
                TokenType::Let,
                TokenType::Identifier,
                TokenType::Equal,
                TokenType::Number,
                TokenType::Plus,
                TokenType::Number,
                TokenType::Eof,
            ]
        );
    }

    #[test]
    fn two_char_operators() {
        assert_eq!(
            kinds("== != <= >= < > = !"),
            vec![
                TokenType::EqualEqual,
                TokenType::BangEqual,
                TokenType::LessEqual,
                TokenType::GreaterEqual,
                TokenType::Less,
                TokenType::Greater,
                TokenType::Equal,
                TokenType::Bang,
                TokenType::Eof,
            ]
        );
    }

    #[test]
    fn comments_run_to_end_of_line() {
        assert_eq!(
            kinds("1 // ignored\n2"),
            vec![
                TokenType::Number,
                TokenType::Newline,
                TokenType::Number,
                TokenType::Eof,
            ]
        );
    }

    #[test]
    fn string_literal_value() {
        let (tokens, errors) = tokenize("\"hello\"");
        assert!(errors.is_empty());
        assert_eq!(tokens[0].literal, Some(Literal::Str("hello".to_string())));
        assert_eq!(tokens[0].lexeme, "\"hello\"");
    }

    #[test]
    fn multiline_string_tracks_line() {
        let (tokens, errors) = tokenize("\"a\nb\"\nx");
        assert!(errors.is_empty());
        assert_eq!(tokens[0].line, 2);
        let x = tokens.iter().find(|t| t.lexeme == "x").unwrap();
        assert_eq!(x.line, 3);
    }

    #[test]
    fn unterminated_string_reports_error() {
        let (_, errors) = tokenize("\"oops");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("Unterminated string."));
    }

    #[test]
    fn unexpected_character_reports_error_and_continues() {
        let (tokens, errors) = tokenize("let @ x");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("Unexpected character: @"));
        assert_eq!(tokens.len(), 3); // let, x, eof
    }

    #[test]
    fn keywords_are_not_identifiers() {
        assert_eq!(
            kinds("nil super this implements"),
            vec![
                TokenType::Nil,
                TokenType::Super,
                TokenType::This,
                TokenType::Implements,
                TokenType::Eof,
            ]
        );
    }
}
