use std::rc::Rc;

use hashbrown::HashMap;

use mica_core::body;
use mica_core::{Class, Function, MicaError, Value};
use mica_parser::ast::{ClassDecl, Expr, FunctionDecl, Stmt};

use crate::chunk::Chunk;
use crate::opcodes::Op;

/// Compile a parsed program to a chunk. Top-level statements become
/// bytecode; function and method bodies are lowered once to the Body
/// Representation and stored in the constant pool as Function values.
pub fn compile(statements: &[Stmt]) -> Result<Chunk, MicaError> {
    let mut compiler = Compiler::new();
    for stmt in statements {
        compiler.statement(stmt)?;
    }
    Ok(compiler.chunk)
}

struct Compiler {
    chunk: Chunk,
    /// Identifier constants are deduplicated so repeated references to one
    /// global don't exhaust the 256-entry pool.
    names: HashMap<String, u8>,
}

impl Compiler {
    fn new() -> Self {
        Compiler {
            chunk: Chunk::new(),
            names: HashMap::new(),
        }
    }

    fn statement(&mut self, stmt: &Stmt) -> Result<(), MicaError> {
        match stmt {
            Stmt::Expression(expr) => {
                self.expression(expr)?;
                self.emit(Op::Pop, expr.line());
            }
            Stmt::Print { expr, line } => {
                self.expression(expr)?;
                self.emit(Op::Print, *line);
            }
            Stmt::Var { name, init, line } => {
                match init {
                    Some(expr) => self.expression(expr)?,
                    None => self.emit(Op::Nil, *line),
                }
                let name_index = self.name_constant(name)?;
                self.emit_with_operand(Op::DefineGlobal, name_index, *line);
            }
            Stmt::Block(statements) => {
                for stmt in statements {
                    self.statement(stmt)?;
                }
            }
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.expression(condition)?;
                let line = condition.line();

                let then_jump = self.emit_jump(Op::JumpIfFalse, line);
                self.emit(Op::Pop, line);
                self.statement(then_branch)?;

                let else_jump = self.emit_jump(Op::Jump, line);
                self.patch_jump(then_jump)?;
                self.emit(Op::Pop, line);

                if let Some(else_branch) = else_branch {
                    self.statement(else_branch)?;
                }
                self.patch_jump(else_jump)?;
            }
            Stmt::While { condition, body } => {
                let loop_start = self.chunk.len();
                self.expression(condition)?;
                let line = condition.line();

                let exit_jump = self.emit_jump(Op::JumpIfFalse, line);
                self.emit(Op::Pop, line);
                self.statement(body)?;
                self.emit_loop(loop_start, line)?;

                self.patch_jump(exit_jump)?;
                self.emit(Op::Pop, line);
            }
            Stmt::For {
                init,
                condition,
                increment,
                body,
            } => {
                if let Some(init) = init {
                    self.statement(init)?;
                }

                let loop_start = self.chunk.len();
                let line = condition.as_ref().map(Expr::line).unwrap_or(0);
                match condition {
                    Some(condition) => self.expression(condition)?,
                    None => self.emit(Op::True, line),
                }

                let exit_jump = self.emit_jump(Op::JumpIfFalse, line);
                self.emit(Op::Pop, line);

                self.statement(body)?;

                if let Some(increment) = increment {
                    self.expression(increment)?;
                    self.emit(Op::Pop, increment.line());
                }

                self.emit_loop(loop_start, line)?;

                self.patch_jump(exit_jump)?;
                self.emit(Op::Pop, line);
            }
            Stmt::Return { value, line } => {
                match value {
                    Some(expr) => self.expression(expr)?,
                    None => self.emit(Op::Nil, *line),
                }
                self.emit(Op::Return, *line);
            }
            Stmt::Function(decl) => {
                let function = lower_function(decl, false)?;
                let name_index = self.name_constant(&decl.name)?;
                self.emit_value_constant(Value::Function(Rc::new(function)), decl.line)?;
                self.emit_with_operand(Op::DefineGlobal, name_index, decl.line);
            }
            Stmt::Class(decl) => {
                let class = lower_class(decl)?;
                let name_index = self.name_constant(&decl.name)?;
                self.emit_value_constant(Value::Class(Rc::new(class)), decl.line)?;
                self.emit_with_operand(Op::DefineGlobal, name_index, decl.line);
            }
        }
        Ok(())
    }

    fn expression(&mut self, expr: &Expr) -> Result<(), MicaError> {
        match expr {
            Expr::Literal { value, line } => match value {
                body::Literal::Nil => self.emit(Op::Nil, *line),
                body::Literal::Bool(true) => self.emit(Op::True, *line),
                body::Literal::Bool(false) => self.emit(Op::False, *line),
                other => self.emit_value_constant(Value::from(other), *line)?,
            },
            Expr::Variable { name, line } => {
                let name_index = self.name_constant(name)?;
                self.emit_with_operand(Op::GetGlobal, name_index, *line);
            }
            Expr::Assign { name, value, line } => {
                self.expression(value)?;
                let name_index = self.name_constant(name)?;
                self.emit_with_operand(Op::SetGlobal, name_index, *line);
            }
            Expr::Unary { op, right, line } => {
                self.expression(right)?;
                match op {
                    body::UnaryOp::Negate => self.emit(Op::Negate, *line),
                    body::UnaryOp::Not => self.emit(Op::Not, *line),
                }
            }
            Expr::Binary {
                left,
                op,
                right,
                line,
            } => {
                self.expression(left)?;
                self.expression(right)?;
                // >= and <= have no dedicated opcode; they compile as the
                // inverse comparison followed by NOT.
                match op {
                    body::BinaryOp::Add => self.emit(Op::Add, *line),
                    body::BinaryOp::Subtract => self.emit(Op::Subtract, *line),
                    body::BinaryOp::Multiply => self.emit(Op::Multiply, *line),
                    body::BinaryOp::Divide => self.emit(Op::Divide, *line),
                    body::BinaryOp::Modulo => self.emit(Op::Modulo, *line),
                    body::BinaryOp::Equal => self.emit(Op::Equal, *line),
                    body::BinaryOp::NotEqual => {
                        self.emit(Op::Equal, *line);
                        self.emit(Op::Not, *line);
                    }
                    body::BinaryOp::Greater => self.emit(Op::Greater, *line),
                    body::BinaryOp::GreaterEqual => {
                        self.emit(Op::Less, *line);
                        self.emit(Op::Not, *line);
                    }
                    body::BinaryOp::Less => self.emit(Op::Less, *line),
                    body::BinaryOp::LessEqual => {
                        self.emit(Op::Greater, *line);
                        self.emit(Op::Not, *line);
                    }
                }
            }
            Expr::Logical {
                left,
                op,
                right,
                line,
            } => {
                self.expression(left)?;
                match op {
                    body::LogicalOp::Or => {
                        let else_jump = self.emit_jump(Op::JumpIfFalse, *line);
                        let end_jump = self.emit_jump(Op::Jump, *line);
                        self.patch_jump(else_jump)?;
                        self.emit(Op::Pop, *line);
                        self.expression(right)?;
                        self.patch_jump(end_jump)?;
                    }
                    body::LogicalOp::And => {
                        let end_jump = self.emit_jump(Op::JumpIfFalse, *line);
                        self.emit(Op::Pop, *line);
                        self.expression(right)?;
                        self.patch_jump(end_jump)?;
                    }
                }
            }
            Expr::Call { callee, args, line } => {
                // Arguments first, callee on top; CALL pops the callee and
                // finds the arguments beneath it.
                for arg in args {
                    self.expression(arg)?;
                }
                self.expression(callee)?;
                self.emit_with_operand(Op::Call, args.len() as u8, *line);
            }
            Expr::Array { elements, line } => {
                if elements.len() > u8::MAX as usize {
                    return Err(MicaError::compile(
                        "Can't have more than 255 elements in an array literal.",
                    ));
                }
                for element in elements {
                    self.expression(element)?;
                }
                self.emit_with_operand(Op::Array, elements.len() as u8, *line);
            }
            Expr::Index {
                object,
                index,
                line,
            } => {
                self.expression(object)?;
                self.expression(index)?;
                self.emit(Op::IndexGet, *line);
            }
            Expr::IndexSet {
                object,
                index,
                value,
                line,
            } => {
                self.expression(object)?;
                self.expression(index)?;
                self.expression(value)?;
                self.emit(Op::IndexSet, *line);
            }
            Expr::Get { object, name, line } => {
                self.expression(object)?;
                let name_index = self.name_constant(name)?;
                self.emit_with_operand(Op::GetProperty, name_index, *line);
            }
            Expr::Set {
                object,
                name,
                value,
                line,
            } => {
                self.expression(object)?;
                self.expression(value)?;
                let name_index = self.name_constant(name)?;
                self.emit_with_operand(Op::SetProperty, name_index, *line);
            }
            Expr::This { .. } => {
                return Err(MicaError::compile("Can't use 'this' outside of a class."));
            }
            Expr::SuperCall { .. } => {
                return Err(MicaError::compile("Can't use 'super' outside of a class."));
            }
        }
        Ok(())
    }

    // Emission helpers.

    fn emit(&mut self, op: Op, line: u32) {
        self.chunk.write_op(op, line);
    }

    fn emit_with_operand(&mut self, op: Op, operand: u8, line: u32) {
        self.chunk.write_op(op, line);
        self.chunk.write(operand, line);
    }

    fn emit_value_constant(&mut self, value: Value, line: u32) -> Result<(), MicaError> {
        let index = self.chunk.add_constant(value)?;
        self.emit_with_operand(Op::Constant, index, line);
        Ok(())
    }

    fn name_constant(&mut self, name: &str) -> Result<u8, MicaError> {
        if let Some(&index) = self.names.get(name) {
            return Ok(index);
        }
        let index = self.chunk.add_constant(Value::string(name))?;
        self.names.insert(name.to_string(), index);
        Ok(index)
    }

    /// Emit a jump with a placeholder offset; returns the position to patch.
    fn emit_jump(&mut self, op: Op, line: u32) -> usize {
        self.emit(op, line);
        self.chunk.write(0xff, line);
        self.chunk.write(0xff, line);
        self.chunk.len() - 2
    }

    fn patch_jump(&mut self, offset: usize) -> Result<(), MicaError> {
        // Offset is relative to the byte after the two-byte operand.
        let jump = self.chunk.len() - offset - 2;
        if jump > u16::MAX as usize {
            return Err(MicaError::compile("Too much code to jump over."));
        }
        self.chunk.patch(offset, ((jump >> 8) & 0xff) as u8);
        self.chunk.patch(offset + 1, (jump & 0xff) as u8);
        Ok(())
    }

    fn emit_loop(&mut self, loop_start: usize, line: u32) -> Result<(), MicaError> {
        self.emit(Op::Loop, line);
        let offset = self.chunk.len() - loop_start + 2;
        if offset > u16::MAX as usize {
            return Err(MicaError::compile("Loop body too large."));
        }
        self.chunk.write(((offset >> 8) & 0xff) as u8, line);
        self.chunk.write((offset & 0xff) as u8, line);
        Ok(())
    }
}

/// Lower a function declaration to a Function value carrying the Body
/// Representation of its statements.
fn lower_function(decl: &FunctionDecl, in_method: bool) -> Result<Function, MicaError> {
    let body = decl
        .body
        .iter()
        .map(|stmt| lower_stmt(stmt, in_method))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Function {
        name: decl.name.clone(),
        params: decl.params.clone(),
        body,
    })
}

fn lower_class(decl: &ClassDecl) -> Result<Class, MicaError> {
    let mut methods = HashMap::new();
    for method in &decl.methods {
        let function = lower_function(method, true)?;
        methods.insert(method.name.clone(), Rc::new(function));
    }

    let mut defaults = HashMap::new();
    for (name, init, _line) in &decl.defaults {
        match init {
            Expr::Literal { value, .. } => {
                defaults.insert(name.clone(), Value::from(value));
            }
            _ => {
                return Err(MicaError::compile(format!(
                    "Default value for field '{name}' must be a literal."
                )))
            }
        }
    }

    Ok(Class::new(
        decl.name.clone(),
        decl.superclass.clone(),
        decl.interfaces.clone(),
        methods,
        defaults,
    ))
}

fn lower_stmt(stmt: &Stmt, in_method: bool) -> Result<body::Stmt, MicaError> {
    let lowered = match stmt {
        Stmt::Expression(expr) => body::Stmt::Expression(lower_expr(expr, in_method)?),
        Stmt::Print { expr, .. } => body::Stmt::Print(lower_expr(expr, in_method)?),
        Stmt::Var { name, init, .. } => body::Stmt::Var {
            name: name.clone(),
            init: init
                .as_ref()
                .map(|e| lower_expr(e, in_method))
                .transpose()?,
        },
        Stmt::Return { value, .. } => body::Stmt::Return(
            value
                .as_ref()
                .map(|e| lower_expr(e, in_method))
                .transpose()?,
        ),
        Stmt::Block(statements) => body::Stmt::Block(
            statements
                .iter()
                .map(|s| lower_stmt(s, in_method))
                .collect::<Result<Vec<_>, _>>()?,
        ),
        Stmt::If {
            condition,
            then_branch,
            else_branch,
        } => body::Stmt::If {
            condition: lower_expr(condition, in_method)?,
            then_branch: Box::new(lower_stmt(then_branch, in_method)?),
            else_branch: else_branch
                .as_ref()
                .map(|s| lower_stmt(s, in_method).map(Box::new))
                .transpose()?,
        },
        Stmt::While { condition, body } => body::Stmt::While {
            condition: lower_expr(condition, in_method)?,
            body: Box::new(lower_stmt(body, in_method)?),
        },
        Stmt::For {
            init,
            condition,
            increment,
            body,
        } => body::Stmt::For {
            init: init
                .as_ref()
                .map(|s| lower_stmt(s, in_method).map(Box::new))
                .transpose()?,
            condition: condition
                .as_ref()
                .map(|e| lower_expr(e, in_method))
                .transpose()?,
            increment: increment
                .as_ref()
                .map(|e| lower_expr(e, in_method))
                .transpose()?,
            body: Box::new(lower_stmt(body, in_method)?),
        },
        Stmt::Function(decl) => {
            return Err(MicaError::compile(format!(
                "Can't declare function '{}' inside a function body.",
                decl.name
            )))
        }
        Stmt::Class(decl) => {
            return Err(MicaError::compile(format!(
                "Can't declare class '{}' inside a function body.",
                decl.name
            )))
        }
    };
    Ok(lowered)
}

fn lower_expr(expr: &Expr, in_method: bool) -> Result<body::Expr, MicaError> {
    let lowered = match expr {
        Expr::Literal { value, .. } => body::Expr::Literal(value.clone()),
        Expr::Variable { name, .. } => body::Expr::Variable(name.clone()),
        Expr::Assign { name, value, .. } => body::Expr::Assign {
            name: name.clone(),
            value: Box::new(lower_expr(value, in_method)?),
        },
        Expr::Unary { op, right, .. } => body::Expr::Unary {
            op: *op,
            right: Box::new(lower_expr(right, in_method)?),
        },
        Expr::Binary {
            left, op, right, ..
        } => body::Expr::Binary {
            left: Box::new(lower_expr(left, in_method)?),
            op: *op,
            right: Box::new(lower_expr(right, in_method)?),
        },
        Expr::Logical {
            left, op, right, ..
        } => body::Expr::Logical {
            left: Box::new(lower_expr(left, in_method)?),
            op: *op,
            right: Box::new(lower_expr(right, in_method)?),
        },
        Expr::Call { callee, args, .. } => body::Expr::Call {
            callee: Box::new(lower_expr(callee, in_method)?),
            args: args
                .iter()
                .map(|a| lower_expr(a, in_method))
                .collect::<Result<Vec<_>, _>>()?,
        },
        Expr::Get { object, name, .. } => body::Expr::Get {
            object: Box::new(lower_expr(object, in_method)?),
            name: name.clone(),
        },
        Expr::Set {
            object,
            name,
            value,
            ..
        } => body::Expr::Set {
            object: Box::new(lower_expr(object, in_method)?),
            name: name.clone(),
            value: Box::new(lower_expr(value, in_method)?),
        },
        Expr::Index { object, index, .. } => body::Expr::Index {
            object: Box::new(lower_expr(object, in_method)?),
            index: Box::new(lower_expr(index, in_method)?),
        },
        Expr::IndexSet {
            object,
            index,
            value,
            ..
        } => body::Expr::IndexSet {
            object: Box::new(lower_expr(object, in_method)?),
            index: Box::new(lower_expr(index, in_method)?),
            value: Box::new(lower_expr(value, in_method)?),
        },
        Expr::Array { elements, .. } => body::Expr::Array(
            elements
                .iter()
                .map(|e| lower_expr(e, in_method))
                .collect::<Result<Vec<_>, _>>()?,
        ),
        Expr::This { .. } => {
            if !in_method {
                return Err(MicaError::compile("Can't use 'this' outside of a class."));
            }
            body::Expr::This
        }
        Expr::SuperCall { method, args, .. } => {
            if !in_method {
                return Err(MicaError::compile("Can't use 'super' outside of a class."));
            }
            body::Expr::SuperCall {
                method: method.clone(),
                args: args
                    .iter()
                    .map(|a| lower_expr(a, in_method))
                    .collect::<Result<Vec<_>, _>>()?,
            }
        }
    };
    Ok(lowered)
}
