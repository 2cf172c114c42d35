use mica_core::body::{BinaryOp, Literal, LogicalOp, UnaryOp};
use mica_core::error::{ErrorLocation, MicaError};

use crate::ast::{ClassDecl, Expr, FunctionDecl, Stmt};
use crate::token::{self, Token, TokenType};

/// Recursive-descent parser. A statement that fails to parse is reported and
/// skipped by resynchronizing to the next statement boundary, so one run
/// collects a batch of errors instead of stopping at the first.
pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
    errors: Vec<MicaError>,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Parser {
            tokens,
            current: 0,
            errors: Vec::new(),
        }
    }

    pub fn parse(mut self) -> (Vec<Stmt>, Vec<MicaError>) {
        let mut statements = Vec::new();
        while !self.is_at_end() {
            if self.match_token(TokenType::Newline) {
                continue;
            }
            match self.declaration() {
                Ok(stmt) => statements.push(stmt),
                Err(e) => {
                    self.errors.push(e);
                    self.synchronize();
                }
            }
        }
        (statements, self.errors)
    }

    fn declaration(&mut self) -> Result<Stmt, MicaError> {
        if self.match_token(TokenType::Class) {
            return self.class_declaration();
        }
        if self.match_token(TokenType::Function) {
            return Ok(Stmt::Function(self.function_body("function")?));
        }
        if self.match_token(TokenType::Let) {
            return self.var_declaration();
        }
        self.statement()
    }

    fn class_declaration(&mut self) -> Result<Stmt, MicaError> {
        let name_token = self.consume(TokenType::Identifier, "Expect class name.")?;
        let name = name_token.lexeme;
        let line = name_token.line;

        let mut superclass = None;
        if self.match_token(TokenType::Less) {
            let sup = self.consume(TokenType::Identifier, "Expect superclass name.")?;
            superclass = Some(sup.lexeme);
        }

        let mut interfaces = Vec::new();
        if self.match_token(TokenType::Implements) {
            loop {
                let iface = self.consume(TokenType::Identifier, "Expect interface name.")?;
                interfaces.push(iface.lexeme);
                if !self.match_token(TokenType::Comma) {
                    break;
                }
            }
        }

        self.consume(TokenType::LeftBrace, "Expect '{' before class body.")?;

        let mut methods = Vec::new();
        let mut defaults = Vec::new();
        while !self.check(TokenType::RightBrace) && !self.is_at_end() {
            if self.match_token(TokenType::Newline) {
                continue;
            }
            if self.match_token(TokenType::Function) {
                methods.push(self.function_body("method")?);
            } else if self.match_token(TokenType::Let) {
                defaults.push(self.default_field()?);
            } else {
                let err = self.error_at_current("Expect method declaration.");
                self.errors.push(err);
                self.advance();
            }
        }

        self.consume(TokenType::RightBrace, "Expect '}' after class body.")?;
        Ok(Stmt::Class(ClassDecl {
            name,
            superclass,
            interfaces,
            defaults,
            methods,
            line,
        }))
    }

    /// A `let name = <expr>` declaration inside a class body.
    fn default_field(&mut self) -> Result<(String, Expr, u32), MicaError> {
        let name = self.consume(TokenType::Identifier, "Expect field name.")?;
        self.consume(TokenType::Equal, "Expect '=' after field name.")?;
        let value = self.expression()?;
        self.consume_end_of_statement("Expect newline or semicolon after field value.")?;
        Ok((name.lexeme, value, name.line))
    }

    fn function_body(&mut self, kind: &str) -> Result<FunctionDecl, MicaError> {
        let name_token =
            self.consume(TokenType::Identifier, format!("Expect {kind} name."))?;
        self.consume(
            TokenType::LeftParen,
            format!("Expect '(' after {kind} name."),
        )?;

        let mut params = Vec::new();
        if !self.check(TokenType::RightParen) {
            loop {
                if params.len() >= 255 {
                    let err = self.error_at_current("Can't have more than 255 parameters.");
                    self.errors.push(err);
                }
                let param = self.consume(TokenType::Identifier, "Expect parameter name.")?;
                params.push(param.lexeme);
                self.type_annotation()?;
                if !self.match_token(TokenType::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenType::RightParen, "Expect ')' after parameters.")?;
        self.type_annotation()?;

        self.consume(
            TokenType::LeftBrace,
            format!("Expect '{{' before {kind} body."),
        )?;
        let body = self.block()?;

        Ok(FunctionDecl {
            name: name_token.lexeme,
            params,
            body,
            line: name_token.line,
        })
    }

    /// Optional `: <type>` annotation, parsed and discarded. The language is
    /// dynamically typed; annotations are documentation only.
    fn type_annotation(&mut self) -> Result<(), MicaError> {
        if self.match_token(TokenType::Colon) {
            if self.check(TokenType::Identifier) || self.check(TokenType::TypeName) {
                self.advance();
                return Ok(());
            }
            return Err(self.error_at_current("Expect type name after ':'."));
        }
        Ok(())
    }

    fn var_declaration(&mut self) -> Result<Stmt, MicaError> {
        let name = self.consume(TokenType::Identifier, "Expect variable name.")?;

        let init = if self.match_token(TokenType::Equal) {
            Some(self.expression()?)
        } else {
            None
        };

        self.consume_end_of_statement("Expect newline or semicolon after variable declaration.")?;
        Ok(Stmt::Var {
            name: name.lexeme,
            init,
            line: name.line,
        })
    }

    fn statement(&mut self) -> Result<Stmt, MicaError> {
        if self.match_token(TokenType::If) {
            return self.if_statement();
        }
        if self.match_token(TokenType::While) {
            return self.while_statement();
        }
        if self.match_token(TokenType::For) {
            return self.for_statement();
        }
        if self.match_token(TokenType::Print) {
            return self.print_statement();
        }
        if self.match_token(TokenType::Return) {
            return self.return_statement();
        }
        if self.match_token(TokenType::LeftBrace) {
            return Ok(Stmt::Block(self.block()?));
        }
        self.expression_statement()
    }

    fn if_statement(&mut self) -> Result<Stmt, MicaError> {
        self.consume(TokenType::LeftParen, "Expect '(' after 'if'.")?;
        let condition = self.expression()?;
        self.consume(TokenType::RightParen, "Expect ')' after if condition.")?;

        let then_branch = Box::new(self.statement()?);
        let else_branch = if self.match_token(TokenType::Else) {
            Some(Box::new(self.statement()?))
        } else {
            None
        };

        Ok(Stmt::If {
            condition,
            then_branch,
            else_branch,
        })
    }

    fn while_statement(&mut self) -> Result<Stmt, MicaError> {
        self.consume(TokenType::LeftParen, "Expect '(' after 'while'.")?;
        let condition = self.expression()?;
        self.consume(TokenType::RightParen, "Expect ')' after condition.")?;
        let body = Box::new(self.statement()?);

        Ok(Stmt::While { condition, body })
    }

    fn for_statement(&mut self) -> Result<Stmt, MicaError> {
        self.consume(TokenType::LeftParen, "Expect '(' after 'for'.")?;
        self.skip_newlines();

        let init = if self.match_token(TokenType::Semicolon) {
            None
        } else if self.match_token(TokenType::Let) {
            let name = self.consume(TokenType::Identifier, "Expect variable name.")?;
            let init = if self.match_token(TokenType::Equal) {
                Some(self.expression()?)
            } else {
                None
            };
            self.consume(TokenType::Semicolon, "Expect ';' after loop initializer.")?;
            Some(Box::new(Stmt::Var {
                name: name.lexeme,
                init,
                line: name.line,
            }))
        } else {
            let expr = self.expression()?;
            self.consume(TokenType::Semicolon, "Expect ';' after loop initializer.")?;
            Some(Box::new(Stmt::Expression(expr)))
        };
        self.skip_newlines();

        let condition = if self.check(TokenType::Semicolon) {
            None
        } else {
            Some(self.expression()?)
        };
        self.consume(TokenType::Semicolon, "Expect ';' after loop condition.")?;
        self.skip_newlines();

        let increment = if self.check(TokenType::RightParen) {
            None
        } else {
            Some(self.expression()?)
        };
        self.consume(TokenType::RightParen, "Expect ')' after for clauses.")?;

        let body = Box::new(self.statement()?);

        Ok(Stmt::For {
            init,
            condition,
            increment,
            body,
        })
    }

    fn print_statement(&mut self) -> Result<Stmt, MicaError> {
        let line = self.previous().line;
        let expr = self.expression()?;
        self.consume_end_of_statement("Expect newline or semicolon after value.")?;
        Ok(Stmt::Print { expr, line })
    }

    fn return_statement(&mut self) -> Result<Stmt, MicaError> {
        let line = self.previous().line;
        let value = if self.check_end_of_statement() {
            None
        } else {
            Some(self.expression()?)
        };
        self.consume_end_of_statement("Expect newline or semicolon after return value.")?;
        Ok(Stmt::Return { value, line })
    }

    fn expression_statement(&mut self) -> Result<Stmt, MicaError> {
        let expr = self.expression()?;
        self.consume_end_of_statement("Expect newline or semicolon after expression.")?;
        Ok(Stmt::Expression(expr))
    }

    fn block(&mut self) -> Result<Vec<Stmt>, MicaError> {
        let mut statements = Vec::new();
        while !self.check(TokenType::RightBrace) && !self.is_at_end() {
            if self.match_token(TokenType::Newline) {
                continue;
            }
            match self.declaration() {
                Ok(stmt) => statements.push(stmt),
                Err(e) => {
                    self.errors.push(e);
                    self.synchronize();
                }
            }
        }
        self.consume(TokenType::RightBrace, "Expect '}' after block.")?;
        Ok(statements)
    }

    fn expression(&mut self) -> Result<Expr, MicaError> {
        self.assignment()
    }

    fn assignment(&mut self) -> Result<Expr, MicaError> {
        let expr = self.or()?;

        if self.match_token(TokenType::Equal) {
            let equals_line = self.previous().line;
            let value = Box::new(self.assignment()?);

            return match expr {
                Expr::Variable { name, line } => Ok(Expr::Assign { name, value, line }),
                Expr::Get { object, name, line } => Ok(Expr::Set {
                    object,
                    name,
                    value,
                    line,
                }),
                Expr::Index {
                    object,
                    index,
                    line,
                } => Ok(Expr::IndexSet {
                    object,
                    index,
                    value,
                    line,
                }),
                other => {
                    // Report but keep parsing with the unassigned expression.
                    self.errors.push(MicaError::parse(
                        equals_line,
                        ErrorLocation::AtLexeme("=".to_string()),
                        "Invalid assignment target.",
                    ));
                    Ok(other)
                }
            };
        }

        Ok(expr)
    }

    fn or(&mut self) -> Result<Expr, MicaError> {
        let mut expr = self.and()?;
        while self.match_token(TokenType::Or) {
            let line = self.previous().line;
            let right = self.and()?;
            expr = Expr::Logical {
                left: Box::new(expr),
                op: LogicalOp::Or,
                right: Box::new(right),
                line,
            };
        }
        Ok(expr)
    }

    fn and(&mut self) -> Result<Expr, MicaError> {
        let mut expr = self.equality()?;
        while self.match_token(TokenType::And) {
            let line = self.previous().line;
            let right = self.equality()?;
            expr = Expr::Logical {
                left: Box::new(expr),
                op: LogicalOp::And,
                right: Box::new(right),
                line,
            };
        }
        Ok(expr)
    }

    fn equality(&mut self) -> Result<Expr, MicaError> {
        let mut expr = self.comparison()?;
        loop {
            let op = if self.match_token(TokenType::EqualEqual) {
                BinaryOp::Equal
            } else if self.match_token(TokenType::BangEqual) {
                BinaryOp::NotEqual
            } else {
                break;
            };
            let line = self.previous().line;
            let right = self.comparison()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                op,
                right: Box::new(right),
                line,
            };
        }
        Ok(expr)
    }

    fn comparison(&mut self) -> Result<Expr, MicaError> {
        let mut expr = self.term()?;
        loop {
            let op = if self.match_token(TokenType::Greater) {
                BinaryOp::Greater
            } else if self.match_token(TokenType::GreaterEqual) {
                BinaryOp::GreaterEqual
            } else if self.match_token(TokenType::Less) {
                BinaryOp::Less
            } else if self.match_token(TokenType::LessEqual) {
                BinaryOp::LessEqual
            } else {
                break;
            };
            let line = self.previous().line;
            let right = self.term()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                op,
                right: Box::new(right),
                line,
            };
        }
        Ok(expr)
    }

    fn term(&mut self) -> Result<Expr, MicaError> {
        let mut expr = self.factor()?;
        loop {
            let op = if self.match_token(TokenType::Plus) {
                BinaryOp::Add
            } else if self.match_token(TokenType::Minus) {
                BinaryOp::Subtract
            } else {
                break;
            };
            let line = self.previous().line;
            let right = self.factor()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                op,
                right: Box::new(right),
                line,
            };
        }
        Ok(expr)
    }

    fn factor(&mut self) -> Result<Expr, MicaError> {
        let mut expr = self.unary()?;
        loop {
            let op = if self.match_token(TokenType::Star) {
                BinaryOp::Multiply
            } else if self.match_token(TokenType::Slash) {
                BinaryOp::Divide
            } else if self.match_token(TokenType::Percent) {
                BinaryOp::Modulo
            } else {
                break;
            };
            let line = self.previous().line;
            let right = self.unary()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                op,
                right: Box::new(right),
                line,
            };
        }
        Ok(expr)
    }

    fn unary(&mut self) -> Result<Expr, MicaError> {
        let op = if self.match_token(TokenType::Minus) {
            Some(UnaryOp::Negate)
        } else if self.match_token(TokenType::Bang) || self.match_token(TokenType::Not) {
            Some(UnaryOp::Not)
        } else {
            None
        };
        if let Some(op) = op {
            let line = self.previous().line;
            let right = self.unary()?;
            return Ok(Expr::Unary {
                op,
                right: Box::new(right),
                line,
            });
        }
        self.call()
    }

    fn call(&mut self) -> Result<Expr, MicaError> {
        let mut expr = self.primary()?;

        loop {
            if self.match_token(TokenType::LeftParen) {
                let line = self.previous().line;
                let args = self.arguments()?;
                expr = Expr::Call {
                    callee: Box::new(expr),
                    args,
                    line,
                };
            } else if self.match_token(TokenType::LeftBracket) {
                let line = self.previous().line;
                let index = self.expression()?;
                self.consume(TokenType::RightBracket, "Expect ']' after array index.")?;
                expr = Expr::Index {
                    object: Box::new(expr),
                    index: Box::new(index),
                    line,
                };
            } else if self.match_token(TokenType::Dot) {
                let name = self.consume(TokenType::Identifier, "Expect property name after '.'.")?;
                expr = Expr::Get {
                    object: Box::new(expr),
                    name: name.lexeme,
                    line: name.line,
                };
            } else {
                break;
            }
        }

        Ok(expr)
    }

    /// Argument list after a consumed '('.
    fn arguments(&mut self) -> Result<Vec<Expr>, MicaError> {
        let mut args = Vec::new();
        if !self.check(TokenType::RightParen) {
            loop {
                if args.len() >= 255 {
                    let err = self.error_at_current("Can't have more than 255 arguments.");
                    self.errors.push(err);
                }
                args.push(self.expression()?);
                if !self.match_token(TokenType::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenType::RightParen, "Expect ')' after arguments.")?;
        Ok(args)
    }

    fn primary(&mut self) -> Result<Expr, MicaError> {
        if self.match_token(TokenType::True) {
            return Ok(Expr::Literal {
                value: Literal::Bool(true),
                line: self.previous().line,
            });
        }
        if self.match_token(TokenType::False) {
            return Ok(Expr::Literal {
                value: Literal::Bool(false),
                line: self.previous().line,
            });
        }
        if self.match_token(TokenType::Nil) {
            return Ok(Expr::Literal {
                value: Literal::Nil,
                line: self.previous().line,
            });
        }

        if self.match_token(TokenType::Number) || self.match_token(TokenType::String) {
            let token = self.previous().clone();
            let value = match token.literal {
                Some(token::Literal::Number(n)) => Literal::Number(n),
                Some(token::Literal::Str(s)) => Literal::Str(s),
                None => Literal::Nil,
            };
            return Ok(Expr::Literal {
                value,
                line: token.line,
            });
        }

        if self.match_token(TokenType::This) {
            return Ok(Expr::This {
                line: self.previous().line,
            });
        }

        if self.match_token(TokenType::Super) {
            let line = self.previous().line;
            self.consume(TokenType::Dot, "Expect '.' after 'super'.")?;
            let method = self.consume(TokenType::Identifier, "Expect superclass method name.")?;
            self.consume(TokenType::LeftParen, "Expect '(' after superclass method.")?;
            let args = self.arguments()?;
            return Ok(Expr::SuperCall {
                method: method.lexeme,
                args,
                line,
            });
        }

        if self.match_token(TokenType::Identifier) {
            let token = self.previous();
            return Ok(Expr::Variable {
                name: token.lexeme.clone(),
                line: token.line,
            });
        }

        if self.match_token(TokenType::LeftParen) {
            let expr = self.expression()?;
            self.consume(TokenType::RightParen, "Expect ')' after expression.")?;
            return Ok(expr);
        }

        if self.match_token(TokenType::LeftBracket) {
            let line = self.previous().line;
            let mut elements = Vec::new();
            if !self.check(TokenType::RightBracket) {
                loop {
                    elements.push(self.expression()?);
                    if !self.match_token(TokenType::Comma) {
                        break;
                    }
                }
            }
            self.consume(TokenType::RightBracket, "Expect ']' after array elements.")?;
            return Ok(Expr::Array { elements, line });
        }

        Err(self.error_at_current("Expect expression."))
    }

    // Token plumbing.

    fn match_token(&mut self, kind: TokenType) -> bool {
        if self.check(kind) {
            self.advance();
            return true;
        }
        false
    }

    fn consume(&mut self, kind: TokenType, message: impl Into<String>) -> Result<Token, MicaError> {
        if self.check(kind) {
            return Ok(self.advance().clone());
        }
        Err(self.error_at_current(message))
    }

    fn consume_end_of_statement(&mut self, message: &str) -> Result<(), MicaError> {
        if self.match_token(TokenType::Semicolon)
            || self.match_token(TokenType::Newline)
            || self.is_at_end()
        {
            return Ok(());
        }
        Err(self.error_at_current(message))
    }

    fn check_end_of_statement(&self) -> bool {
        self.is_at_end() || self.check(TokenType::Semicolon) || self.check(TokenType::Newline)
    }

    fn check(&self, kind: TokenType) -> bool {
        !self.is_at_end() && self.peek().kind == kind
    }

    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous()
    }

    fn is_at_end(&self) -> bool {
        self.peek().kind == TokenType::Eof
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current - 1]
    }

    fn error_at_current(&self, message: impl Into<String>) -> MicaError {
        let token = self.peek();
        let location = if token.kind == TokenType::Eof {
            ErrorLocation::AtEnd
        } else {
            ErrorLocation::AtLexeme(token.lexeme.clone())
        };
        MicaError::parse(token.line, location, message)
    }

    /// Skip to the next statement boundary after a parse error.
    fn synchronize(&mut self) {
        self.advance();

        while !self.is_at_end() {
            match self.previous().kind {
                TokenType::Semicolon | TokenType::Newline => return,
                _ => {}
            }
            match self.peek().kind {
                TokenType::Class
                | TokenType::Function
                | TokenType::Let
                | TokenType::For
                | TokenType::If
                | TokenType::While
                | TokenType::Print
                | TokenType::Return
                | TokenType::RightBrace => return,
                _ => {}
            }
            self.advance();
        }
    }

    fn skip_newlines(&mut self) {
        while self.match_token(TokenType::Newline) {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse;

    fn parse_ok(source: &str) -> Vec<Stmt> {
        parse(source).unwrap_or_else(|errs| panic!("parse failed: {errs:?}"))
    }

    #[test]
    fn let_declaration() {
        let stmts = parse_ok("let x = 1 + 2");
        assert_eq!(stmts.len(), 1);
        match &stmts[0] {
            Stmt::Var { name, init, .. } => {
                assert_eq!(name, "x");
                assert!(matches!(init, Some(Expr::Binary { .. })));
            }
            other => panic!("expected var, got {other:?}"),
        }
    }

    #[test]
    fn semicolon_and_newline_both_terminate() {
        assert_eq!(parse_ok("print 1; print 2").len(), 2);
        assert_eq!(parse_ok("print 1\nprint 2").len(), 2);
    }

    #[test]
    fn precedence_multiplication_binds_tighter() {
        let stmts = parse_ok("print 1 + 2 * 3");
        let Stmt::Print { expr, .. } = &stmts[0] else {
            panic!("expected print");
        };
        let Expr::Binary { op, right, .. } = expr else {
            panic!("expected binary");
        };
        assert_eq!(*op, BinaryOp::Add);
        assert!(matches!(
            **right,
            Expr::Binary {
                op: BinaryOp::Multiply,
                ..
            }
        ));
    }

    #[test]
    fn index_assignment_becomes_index_set() {
        let stmts = parse_ok("a[0] = 5");
        match &stmts[0] {
            Stmt::Expression(Expr::IndexSet { .. }) => {}
            other => panic!("expected index set, got {other:?}"),
        }
    }

    #[test]
    fn property_assignment_becomes_set() {
        let stmts = parse_ok("a.b = 5");
        match &stmts[0] {
            Stmt::Expression(Expr::Set { name, .. }) => assert_eq!(name, "b"),
            other => panic!("expected set, got {other:?}"),
        }
    }

    #[test]
    fn invalid_assignment_target_is_reported() {
        let errs = parse("1 = 2").unwrap_err();
        assert!(errs[0].to_string().contains("Invalid assignment target."));
    }

    #[test]
    fn class_with_superclass_defaults_and_interfaces() {
        let stmts = parse_ok(
            "class Dog < Animal implements Pet, Loud {\n\
             let legs = 4\n\
             function speak() { print \"woof\"; }\n\
             }",
        );
        let Stmt::Class(class) = &stmts[0] else {
            panic!("expected class");
        };
        assert_eq!(class.name, "Dog");
        assert_eq!(class.superclass.as_deref(), Some("Animal"));
        assert_eq!(class.interfaces, vec!["Pet", "Loud"]);
        assert_eq!(class.defaults.len(), 1);
        assert_eq!(class.defaults[0].0, "legs");
        assert_eq!(class.methods.len(), 1);
        assert_eq!(class.methods[0].name, "speak");
    }

    #[test]
    fn for_statement_full_header() {
        let stmts = parse_ok("for (let i = 0; i < 3; i = i + 1) print i");
        let Stmt::For {
            init,
            condition,
            increment,
            ..
        } = &stmts[0]
        else {
            panic!("expected for");
        };
        assert!(init.is_some());
        assert!(condition.is_some());
        assert!(increment.is_some());
    }

    #[test]
    fn for_statement_empty_header() {
        let stmts = parse_ok("for (;;) print 1");
        let Stmt::For {
            init,
            condition,
            increment,
            ..
        } = &stmts[0]
        else {
            panic!("expected for");
        };
        assert!(init.is_none());
        assert!(condition.is_none());
        assert!(increment.is_none());
    }

    #[test]
    fn super_call_parses() {
        let stmts = parse_ok(
            "class B < A { function m() { super.m(1, 2); } }",
        );
        let Stmt::Class(class) = &stmts[0] else {
            panic!("expected class");
        };
        match &class.methods[0].body[0] {
            Stmt::Expression(Expr::SuperCall { method, args, .. }) => {
                assert_eq!(method, "m");
                assert_eq!(args.len(), 2);
            }
            other => panic!("expected super call, got {other:?}"),
        }
    }

    #[test]
    fn type_annotations_are_accepted_and_discarded() {
        let stmts = parse_ok("function add(a: int, b: int): int { return a + b; }");
        let Stmt::Function(func) = &stmts[0] else {
            panic!("expected function");
        };
        assert_eq!(func.params, vec!["a", "b"]);
    }

    #[test]
    fn collects_multiple_errors() {
        let errs = parse("let = 1\nprint )\nlet ok = 2").unwrap_err();
        assert!(errs.len() >= 2);
        assert!(errs[0].to_string().contains("Expect variable name."));
    }

    #[test]
    fn error_message_format() {
        let errs = parse("print )").unwrap_err();
        assert_eq!(
            errs[0].to_string(),
            "[line 1] Error at ')': Expect expression."
        );
    }

    #[test]
    fn error_at_end() {
        let errs = parse("print (1").unwrap_err();
        assert_eq!(
            errs[0].to_string(),
            "[line 1] Error at end: Expect ')' after expression."
        );
    }
}
