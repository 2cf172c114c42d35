//! The persisted chunk format.
//!
//! Layout (all integers little-endian):
//!   magic:     "MICB" (4 bytes)
//!   version:   u16
//!   strings:   u32 count, then u32 len + UTF-8 bytes each
//!   code:      u32 len + bytes
//!   lines:     u32 len + u32 each (must equal the code length)
//!   constants: u32 count, then tagged entries
//!
//! Every identifier and string literal goes through a deduplicated string
//! table; index 0 is always the empty string. Function and class constants
//! carry their Body Representation trees, so a deserialized chunk runs
//! without the source being present.

use std::rc::Rc;

use hashbrown::HashMap;

use mica_core::body::{BinaryOp, Expr, Literal, LogicalOp, Stmt, UnaryOp};
use mica_core::{Class, Function, MicaError, Value};

use crate::chunk::Chunk;

pub const MAGIC: &[u8; 4] = b"MICB";
pub const VERSION: u16 = 1;

const CONST_NUMBER: u8 = 0;
const CONST_STRING: u8 = 1;
const CONST_FUNCTION: u8 = 2;
const CONST_CLASS: u8 = 3;

/// Builds a deduplicated string table for serialization.
pub struct StringTableBuilder {
    strings: Vec<String>,
    index: HashMap<String, u32>,
}

impl StringTableBuilder {
    pub fn new() -> Self {
        let mut b = StringTableBuilder {
            strings: Vec::new(),
            index: HashMap::new(),
        };
        b.intern(""); // index 0 = empty string
        b
    }

    pub fn intern(&mut self, s: &str) -> u32 {
        if let Some(&idx) = self.index.get(s) {
            return idx;
        }
        let idx = self.strings.len() as u32;
        self.strings.push(s.to_string());
        self.index.insert(s.to_string(), idx);
        idx
    }

    pub fn finish(self) -> Vec<String> {
        self.strings
    }
}

impl Default for StringTableBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Serialize a chunk to the persisted format.
pub fn serialize(chunk: &Chunk) -> Result<Vec<u8>, MicaError> {
    // The payload is buffered first: writing it interns the strings, and the
    // finished table has to precede it in the output.
    let mut w = Writer::new();
    w.write_u32(chunk.code.len() as u32);
    w.payload.extend_from_slice(&chunk.code);
    w.write_u32(chunk.lines.len() as u32);
    for line in &chunk.lines {
        w.write_u32(*line);
    }
    w.write_u32(chunk.constants.len() as u32);
    for constant in &chunk.constants {
        w.write_constant(constant)?;
    }

    let Writer { strings, payload } = w;
    let table = strings.finish();

    let mut out = Vec::new();
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&VERSION.to_le_bytes());
    out.extend_from_slice(&(table.len() as u32).to_le_bytes());
    for s in &table {
        out.extend_from_slice(&(s.len() as u32).to_le_bytes());
        out.extend_from_slice(s.as_bytes());
    }
    out.extend_from_slice(&payload);
    Ok(out)
}

/// Deserialize a chunk, validating structure as it goes.
pub fn deserialize(bytes: &[u8]) -> Result<Chunk, MicaError> {
    let mut r = Reader::new(bytes);

    if r.take(4)? != MAGIC {
        return Err(MicaError::bytecode("Not a Mica bytecode file."));
    }
    let version = r.read_u16()?;
    if version != VERSION {
        return Err(MicaError::bytecode(format!(
            "Unsupported bytecode version {version} (expected {VERSION})."
        )));
    }

    let table_len = r.read_u32()? as usize;
    let mut table = Vec::with_capacity(table_len);
    for _ in 0..table_len {
        let len = r.read_u32()? as usize;
        let raw = r.take(len)?;
        let s = std::str::from_utf8(raw)
            .map_err(|_| MicaError::bytecode("Invalid UTF-8 in string table."))?;
        table.push(s.to_string());
    }
    r.table = table;

    let code_len = r.read_u32()? as usize;
    let code = r.take(code_len)?.to_vec();
    let lines_len = r.read_u32()? as usize;
    if lines_len != code_len {
        return Err(MicaError::bytecode(
            "Line table length does not match code length.",
        ));
    }
    let mut lines = Vec::with_capacity(lines_len);
    for _ in 0..lines_len {
        lines.push(r.read_u32()?);
    }

    let const_count = r.read_u32()? as usize;
    let mut constants = Vec::with_capacity(const_count);
    for _ in 0..const_count {
        constants.push(r.read_constant()?);
    }

    if r.pos != bytes.len() {
        return Err(MicaError::bytecode("Trailing bytes after chunk."));
    }

    Ok(Chunk {
        code,
        lines,
        constants,
    })
}

struct Writer {
    strings: StringTableBuilder,
    payload: Vec<u8>,
}

impl Writer {
    fn new() -> Self {
        Writer {
            strings: StringTableBuilder::new(),
            payload: Vec::new(),
        }
    }

    fn write_u8(&mut self, v: u8) {
        self.payload.push(v);
    }

    fn write_u32(&mut self, v: u32) {
        self.payload.extend_from_slice(&v.to_le_bytes());
    }

    fn write_f64(&mut self, v: f64) {
        self.payload.extend_from_slice(&v.to_le_bytes());
    }

    fn write_str(&mut self, s: &str) {
        let idx = self.strings.intern(s);
        self.write_u32(idx);
    }

    fn write_constant(&mut self, value: &Value) -> Result<(), MicaError> {
        match value {
            Value::Number(n) => {
                self.write_u8(CONST_NUMBER);
                self.write_f64(*n);
            }
            Value::Str(s) => {
                self.write_u8(CONST_STRING);
                self.write_str(s);
            }
            Value::Function(f) => {
                self.write_u8(CONST_FUNCTION);
                self.write_function(f);
            }
            Value::Class(c) => {
                self.write_u8(CONST_CLASS);
                self.write_class(c)?;
            }
            other => {
                return Err(MicaError::bytecode(format!(
                    "Cannot serialize a {} constant.",
                    other.type_name()
                )))
            }
        }
        Ok(())
    }

    fn write_function(&mut self, f: &Function) {
        self.write_str(&f.name);
        self.write_u32(f.params.len() as u32);
        for param in &f.params {
            self.write_str(param);
        }
        self.write_u32(f.body.len() as u32);
        for stmt in &f.body {
            self.write_stmt(stmt);
        }
    }

    fn write_class(&mut self, c: &Class) -> Result<(), MicaError> {
        self.write_str(&c.name);
        match &c.superclass_name {
            Some(name) => {
                self.write_u8(1);
                self.write_str(name);
            }
            None => self.write_u8(0),
        }
        self.write_u32(c.interfaces.len() as u32);
        for interface in &c.interfaces {
            self.write_str(interface);
        }

        // Deterministic output: hash maps iterate in arbitrary order.
        let mut defaults: Vec<_> = c.defaults.iter().collect();
        defaults.sort_by_key(|(name, _)| name.as_str());
        self.write_u32(defaults.len() as u32);
        for (name, value) in defaults {
            self.write_str(name);
            match value {
                Value::Nil => self.write_u8(0),
                Value::Bool(b) => {
                    self.write_u8(1);
                    self.write_u8(*b as u8);
                }
                Value::Number(n) => {
                    self.write_u8(2);
                    self.write_f64(*n);
                }
                Value::Str(s) => {
                    self.write_u8(3);
                    self.write_str(s);
                }
                other => {
                    return Err(MicaError::bytecode(format!(
                        "Cannot serialize a {} field default.",
                        other.type_name()
                    )))
                }
            }
        }

        let mut methods: Vec<_> = c.methods.iter().collect();
        methods.sort_by_key(|(name, _)| name.as_str());
        self.write_u32(methods.len() as u32);
        for (name, method) in methods {
            self.write_str(name);
            self.write_function(method);
        }
        Ok(())
    }

    fn write_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Print(expr) => {
                self.write_u8(0);
                self.write_expr(expr);
            }
            Stmt::Var { name, init } => {
                self.write_u8(1);
                self.write_str(name);
                self.write_opt_expr(init.as_ref());
            }
            Stmt::Return(value) => {
                self.write_u8(2);
                self.write_opt_expr(value.as_ref());
            }
            Stmt::Expression(expr) => {
                self.write_u8(3);
                self.write_expr(expr);
            }
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.write_u8(4);
                self.write_expr(condition);
                self.write_stmt(then_branch);
                match else_branch {
                    Some(branch) => {
                        self.write_u8(1);
                        self.write_stmt(branch);
                    }
                    None => self.write_u8(0),
                }
            }
            Stmt::While { condition, body } => {
                self.write_u8(5);
                self.write_expr(condition);
                self.write_stmt(body);
            }
            Stmt::For {
                init,
                condition,
                increment,
                body,
            } => {
                self.write_u8(6);
                match init {
                    Some(init) => {
                        self.write_u8(1);
                        self.write_stmt(init);
                    }
                    None => self.write_u8(0),
                }
                self.write_opt_expr(condition.as_ref());
                self.write_opt_expr(increment.as_ref());
                self.write_stmt(body);
            }
            Stmt::Block(statements) => {
                self.write_u8(7);
                self.write_u32(statements.len() as u32);
                for stmt in statements {
                    self.write_stmt(stmt);
                }
            }
        }
    }

    fn write_opt_expr(&mut self, expr: Option<&Expr>) {
        match expr {
            Some(expr) => {
                self.write_u8(1);
                self.write_expr(expr);
            }
            None => self.write_u8(0),
        }
    }

    fn write_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Literal(literal) => {
                self.write_u8(0);
                self.write_literal(literal);
            }
            Expr::Variable(name) => {
                self.write_u8(1);
                self.write_str(name);
            }
            Expr::Unary { op, right } => {
                self.write_u8(2);
                self.write_u8(*op as u8);
                self.write_expr(right);
            }
            Expr::Binary { left, op, right } => {
                self.write_u8(3);
                self.write_expr(left);
                self.write_u8(*op as u8);
                self.write_expr(right);
            }
            Expr::Logical { left, op, right } => {
                self.write_u8(4);
                self.write_expr(left);
                self.write_u8(*op as u8);
                self.write_expr(right);
            }
            Expr::Call { callee, args } => {
                self.write_u8(5);
                self.write_expr(callee);
                self.write_exprs(args);
            }
            Expr::Get { object, name } => {
                self.write_u8(6);
                self.write_expr(object);
                self.write_str(name);
            }
            Expr::Set {
                object,
                name,
                value,
            } => {
                self.write_u8(7);
                self.write_expr(object);
                self.write_str(name);
                self.write_expr(value);
            }
            Expr::This => self.write_u8(8),
            Expr::Assign { name, value } => {
                self.write_u8(9);
                self.write_str(name);
                self.write_expr(value);
            }
            Expr::Array(elements) => {
                self.write_u8(10);
                self.write_exprs(elements);
            }
            Expr::Index { object, index } => {
                self.write_u8(11);
                self.write_expr(object);
                self.write_expr(index);
            }
            Expr::IndexSet {
                object,
                index,
                value,
            } => {
                self.write_u8(12);
                self.write_expr(object);
                self.write_expr(index);
                self.write_expr(value);
            }
            Expr::SuperCall { method, args } => {
                self.write_u8(13);
                self.write_str(method);
                self.write_exprs(args);
            }
        }
    }

    fn write_exprs(&mut self, exprs: &[Expr]) {
        self.write_u32(exprs.len() as u32);
        for expr in exprs {
            self.write_expr(expr);
        }
    }

    fn write_literal(&mut self, literal: &Literal) {
        match literal {
            Literal::Nil => self.write_u8(0),
            Literal::Bool(b) => {
                self.write_u8(1);
                self.write_u8(*b as u8);
            }
            Literal::Number(n) => {
                self.write_u8(2);
                self.write_f64(*n);
            }
            Literal::Str(s) => {
                self.write_u8(3);
                self.write_str(s);
            }
        }
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
    table: Vec<String>,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Reader {
            bytes,
            pos: 0,
            table: Vec::new(),
        }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], MicaError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.bytes.len())
            .ok_or_else(|| MicaError::bytecode("Unexpected end of bytecode."))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn read_u8(&mut self) -> Result<u8, MicaError> {
        Ok(self.take(1)?[0])
    }

    fn read_u16(&mut self) -> Result<u16, MicaError> {
        let raw = self.take(2)?;
        Ok(u16::from_le_bytes([raw[0], raw[1]]))
    }

    fn read_u32(&mut self) -> Result<u32, MicaError> {
        let raw = self.take(4)?;
        Ok(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
    }

    fn read_f64(&mut self) -> Result<f64, MicaError> {
        let raw = self.take(8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(raw);
        Ok(f64::from_le_bytes(buf))
    }

    fn read_str(&mut self) -> Result<String, MicaError> {
        let idx = self.read_u32()? as usize;
        self.table
            .get(idx)
            .cloned()
            .ok_or_else(|| MicaError::bytecode("Invalid string table index."))
    }

    fn read_bool_flag(&mut self, what: &str) -> Result<bool, MicaError> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(MicaError::bytecode(format!(
                "Invalid {what} flag: {other}."
            ))),
        }
    }

    fn read_constant(&mut self) -> Result<Value, MicaError> {
        match self.read_u8()? {
            CONST_NUMBER => Ok(Value::Number(self.read_f64()?)),
            CONST_STRING => Ok(Value::string(self.read_str()?)),
            CONST_FUNCTION => Ok(Value::Function(Rc::new(self.read_function()?))),
            CONST_CLASS => Ok(Value::Class(Rc::new(self.read_class()?))),
            other => Err(MicaError::bytecode(format!(
                "Invalid constant tag: {other}."
            ))),
        }
    }

    fn read_function(&mut self) -> Result<Function, MicaError> {
        let name = self.read_str()?;
        let param_count = self.read_u32()? as usize;
        let mut params = Vec::with_capacity(param_count);
        for _ in 0..param_count {
            params.push(self.read_str()?);
        }
        let stmt_count = self.read_u32()? as usize;
        let mut body = Vec::with_capacity(stmt_count);
        for _ in 0..stmt_count {
            body.push(self.read_stmt()?);
        }
        Ok(Function { name, params, body })
    }

    fn read_class(&mut self) -> Result<Class, MicaError> {
        let name = self.read_str()?;
        let superclass_name = if self.read_bool_flag("superclass")? {
            Some(self.read_str()?)
        } else {
            None
        };

        let interface_count = self.read_u32()? as usize;
        let mut interfaces = Vec::with_capacity(interface_count);
        for _ in 0..interface_count {
            interfaces.push(self.read_str()?);
        }

        let default_count = self.read_u32()? as usize;
        let mut defaults = HashMap::with_capacity(default_count);
        for _ in 0..default_count {
            let field = self.read_str()?;
            let value = match self.read_u8()? {
                0 => Value::Nil,
                1 => Value::Bool(self.read_u8()? != 0),
                2 => Value::Number(self.read_f64()?),
                3 => Value::string(self.read_str()?),
                other => {
                    return Err(MicaError::bytecode(format!(
                        "Invalid field default tag: {other}."
                    )))
                }
            };
            defaults.insert(field, value);
        }

        let method_count = self.read_u32()? as usize;
        let mut methods = HashMap::with_capacity(method_count);
        for _ in 0..method_count {
            let method_name = self.read_str()?;
            methods.insert(method_name, Rc::new(self.read_function()?));
        }

        Ok(Class::new(
            name,
            superclass_name,
            interfaces,
            methods,
            defaults,
        ))
    }

    fn read_stmt(&mut self) -> Result<Stmt, MicaError> {
        match self.read_u8()? {
            0 => Ok(Stmt::Print(self.read_expr()?)),
            1 => Ok(Stmt::Var {
                name: self.read_str()?,
                init: self.read_opt_expr()?,
            }),
            2 => Ok(Stmt::Return(self.read_opt_expr()?)),
            3 => Ok(Stmt::Expression(self.read_expr()?)),
            4 => {
                let condition = self.read_expr()?;
                let then_branch = Box::new(self.read_stmt()?);
                let else_branch = if self.read_bool_flag("else branch")? {
                    Some(Box::new(self.read_stmt()?))
                } else {
                    None
                };
                Ok(Stmt::If {
                    condition,
                    then_branch,
                    else_branch,
                })
            }
            5 => Ok(Stmt::While {
                condition: self.read_expr()?,
                body: Box::new(self.read_stmt()?),
            }),
            6 => {
                let init = if self.read_bool_flag("loop initializer")? {
                    Some(Box::new(self.read_stmt()?))
                } else {
                    None
                };
                let condition = self.read_opt_expr()?;
                let increment = self.read_opt_expr()?;
                let body = Box::new(self.read_stmt()?);
                Ok(Stmt::For {
                    init,
                    condition,
                    increment,
                    body,
                })
            }
            7 => {
                let count = self.read_u32()? as usize;
                let mut statements = Vec::with_capacity(count);
                for _ in 0..count {
                    statements.push(self.read_stmt()?);
                }
                Ok(Stmt::Block(statements))
            }
            other => Err(MicaError::bytecode(format!(
                "Invalid statement tag: {other}."
            ))),
        }
    }

    fn read_opt_expr(&mut self) -> Result<Option<Expr>, MicaError> {
        if self.read_bool_flag("expression")? {
            Ok(Some(self.read_expr()?))
        } else {
            Ok(None)
        }
    }

    fn read_expr(&mut self) -> Result<Expr, MicaError> {
        match self.read_u8()? {
            0 => Ok(Expr::Literal(self.read_literal()?)),
            1 => Ok(Expr::Variable(self.read_str()?)),
            2 => Ok(Expr::Unary {
                op: self.read_unary_op()?,
                right: Box::new(self.read_expr()?),
            }),
            3 => {
                let left = Box::new(self.read_expr()?);
                let op = self.read_binary_op()?;
                let right = Box::new(self.read_expr()?);
                Ok(Expr::Binary { left, op, right })
            }
            4 => {
                let left = Box::new(self.read_expr()?);
                let op = match self.read_u8()? {
                    0 => LogicalOp::And,
                    1 => LogicalOp::Or,
                    other => {
                        return Err(MicaError::bytecode(format!(
                            "Invalid logical operator tag: {other}."
                        )))
                    }
                };
                let right = Box::new(self.read_expr()?);
                Ok(Expr::Logical { left, op, right })
            }
            5 => Ok(Expr::Call {
                callee: Box::new(self.read_expr()?),
                args: self.read_exprs()?,
            }),
            6 => Ok(Expr::Get {
                object: Box::new(self.read_expr()?),
                name: self.read_str()?,
            }),
            7 => Ok(Expr::Set {
                object: Box::new(self.read_expr()?),
                name: self.read_str()?,
                value: Box::new(self.read_expr()?),
            }),
            8 => Ok(Expr::This),
            9 => Ok(Expr::Assign {
                name: self.read_str()?,
                value: Box::new(self.read_expr()?),
            }),
            10 => Ok(Expr::Array(self.read_exprs()?)),
            11 => Ok(Expr::Index {
                object: Box::new(self.read_expr()?),
                index: Box::new(self.read_expr()?),
            }),
            12 => Ok(Expr::IndexSet {
                object: Box::new(self.read_expr()?),
                index: Box::new(self.read_expr()?),
                value: Box::new(self.read_expr()?),
            }),
            13 => Ok(Expr::SuperCall {
                method: self.read_str()?,
                args: self.read_exprs()?,
            }),
            other => Err(MicaError::bytecode(format!(
                "Invalid expression tag: {other}."
            ))),
        }
    }

    fn read_exprs(&mut self) -> Result<Vec<Expr>, MicaError> {
        let count = self.read_u32()? as usize;
        let mut exprs = Vec::with_capacity(count);
        for _ in 0..count {
            exprs.push(self.read_expr()?);
        }
        Ok(exprs)
    }

    fn read_literal(&mut self) -> Result<Literal, MicaError> {
        match self.read_u8()? {
            0 => Ok(Literal::Nil),
            1 => Ok(Literal::Bool(self.read_u8()? != 0)),
            2 => Ok(Literal::Number(self.read_f64()?)),
            3 => Ok(Literal::Str(self.read_str()?)),
            other => Err(MicaError::bytecode(format!("Invalid literal tag: {other}."))),
        }
    }

    fn read_unary_op(&mut self) -> Result<UnaryOp, MicaError> {
        match self.read_u8()? {
            0 => Ok(UnaryOp::Negate),
            1 => Ok(UnaryOp::Not),
            other => Err(MicaError::bytecode(format!(
                "Invalid unary operator tag: {other}."
            ))),
        }
    }

    fn read_binary_op(&mut self) -> Result<BinaryOp, MicaError> {
        match self.read_u8()? {
            0 => Ok(BinaryOp::Add),
            1 => Ok(BinaryOp::Subtract),
            2 => Ok(BinaryOp::Multiply),
            3 => Ok(BinaryOp::Divide),
            4 => Ok(BinaryOp::Modulo),
            5 => Ok(BinaryOp::Equal),
            6 => Ok(BinaryOp::NotEqual),
            7 => Ok(BinaryOp::Less),
            8 => Ok(BinaryOp::LessEqual),
            9 => Ok(BinaryOp::Greater),
            10 => Ok(BinaryOp::GreaterEqual),
            other => Err(MicaError::bytecode(format!(
                "Invalid binary operator tag: {other}."
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opcodes::Op;

    #[test]
    fn string_table_dedupes_and_reserves_empty() {
        let mut builder = StringTableBuilder::new();
        assert_eq!(builder.intern(""), 0);
        let hello = builder.intern("hello");
        let world = builder.intern("world");
        assert_eq!(builder.intern("hello"), hello);
        assert_ne!(hello, world);

        let table = builder.finish();
        assert_eq!(table, vec!["", "hello", "world"]);
    }

    fn sample_chunk() -> Chunk {
        let mut chunk = Chunk::new();
        let idx = chunk.add_constant(Value::Number(1.5)).unwrap();
        chunk.write_op(Op::Constant, 1);
        chunk.write(idx, 1);
        let idx = chunk.add_constant(Value::string("greeting")).unwrap();
        chunk.write_op(Op::DefineGlobal, 1);
        chunk.write(idx, 1);
        chunk.write_op(Op::Return, 2);
        chunk
    }

    #[test]
    fn round_trips_code_lines_and_scalar_constants() {
        let chunk = sample_chunk();
        let bytes = serialize(&chunk).unwrap();
        assert_eq!(&bytes[..4], MAGIC);

        let back = deserialize(&bytes).unwrap();
        assert_eq!(back.code, chunk.code);
        assert_eq!(back.lines, chunk.lines);
        assert_eq!(back.constants, chunk.constants);
    }

    #[test]
    fn round_trips_a_function_body() {
        let function = Function {
            name: "clamp".to_string(),
            params: vec!["x".to_string(), "hi".to_string()],
            body: vec![
                Stmt::If {
                    condition: Expr::Binary {
                        left: Box::new(Expr::Variable("x".to_string())),
                        op: BinaryOp::Greater,
                        right: Box::new(Expr::Variable("hi".to_string())),
                    },
                    then_branch: Box::new(Stmt::Return(Some(Expr::Variable("hi".to_string())))),
                    else_branch: None,
                },
                Stmt::Return(Some(Expr::Variable("x".to_string()))),
            ],
        };
        let mut chunk = Chunk::new();
        chunk
            .add_constant(Value::Function(Rc::new(function.clone())))
            .unwrap();

        let back = deserialize(&serialize(&chunk).unwrap()).unwrap();
        match &back.constants[0] {
            Value::Function(f) => assert_eq!(**f, function),
            other => panic!("expected function constant, got {other:?}"),
        }
    }

    #[test]
    fn round_trips_a_class_with_defaults_and_methods() {
        let mut methods = HashMap::new();
        methods.insert(
            "speak".to_string(),
            Rc::new(Function {
                name: "speak".to_string(),
                params: vec![],
                body: vec![Stmt::Return(Some(Expr::SuperCall {
                    method: "speak".to_string(),
                    args: vec![Expr::This],
                }))],
            }),
        );
        let mut defaults = HashMap::new();
        defaults.insert("legs".to_string(), Value::Number(4.0));
        defaults.insert("sound".to_string(), Value::string("..."));

        let class = Class::new(
            "Dog".to_string(),
            Some("Animal".to_string()),
            vec!["Pet".to_string()],
            methods,
            defaults,
        );
        let mut chunk = Chunk::new();
        chunk.add_constant(Value::Class(Rc::new(class))).unwrap();

        let back = deserialize(&serialize(&chunk).unwrap()).unwrap();
        match &back.constants[0] {
            Value::Class(c) => {
                assert_eq!(c.name, "Dog");
                assert_eq!(c.superclass_name.as_deref(), Some("Animal"));
                assert_eq!(c.interfaces, vec!["Pet".to_string()]);
                assert_eq!(c.defaults.get("legs"), Some(&Value::Number(4.0)));
                assert_eq!(c.defaults.get("sound"), Some(&Value::string("...")));
                assert!(c.methods.contains_key("speak"));
            }
            other => panic!("expected class constant, got {other:?}"),
        }
    }

    #[test]
    fn rejects_bad_magic_and_version() {
        let mut bytes = serialize(&sample_chunk()).unwrap();
        bytes[0] = b'X';
        let err = deserialize(&bytes).unwrap_err();
        assert!(err.to_string().contains("Not a Mica bytecode file."));

        let mut bytes = serialize(&sample_chunk()).unwrap();
        bytes[4] = 99;
        let err = deserialize(&bytes).unwrap_err();
        assert!(err.to_string().contains("Unsupported bytecode version"));
    }

    #[test]
    fn rejects_truncated_input_and_trailing_bytes() {
        let bytes = serialize(&sample_chunk()).unwrap();
        let err = deserialize(&bytes[..bytes.len() - 1]).unwrap_err();
        assert!(err.to_string().contains("Unexpected end of bytecode."));

        let mut bytes = serialize(&sample_chunk()).unwrap();
        bytes.push(0);
        let err = deserialize(&bytes).unwrap_err();
        assert!(err.to_string().contains("Trailing bytes"));
    }

    #[test]
    fn rejects_unserializable_constants() {
        let mut chunk = Chunk::new();
        chunk.add_constant(Value::Nil).unwrap();
        let err = serialize(&chunk).unwrap_err();
        assert!(err.to_string().contains("Cannot serialize"));
    }
}
