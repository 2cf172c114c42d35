use std::io::{self, Write};
use std::rc::Rc;

use mica_core::{BoundMethod, Class, Globals, Instance, MicaError, Value};

use crate::builtins;
use crate::chunk::Chunk;
use crate::eval::{self, MethodBinding};
use crate::opcodes::op;
use crate::ops;

/// The bytecode interpreter. Holds the value stack, the single flat global
/// table both execution paths share, and the output sink `print` writes to.
pub struct Vm {
    stack: Vec<Value>,
    pub globals: Globals,
    out: Box<dyn Write>,
}

impl Vm {
    pub fn new() -> Self {
        Vm::with_output(Box::new(io::stdout()))
    }

    pub fn with_output(out: Box<dyn Write>) -> Self {
        let mut globals = Globals::new();
        builtins::register(&mut globals);
        Vm {
            stack: Vec::new(),
            globals,
            out,
        }
    }

    pub fn print(&mut self, value: &Value) -> Result<(), MicaError> {
        writeln!(self.out, "{value}")?;
        Ok(())
    }

    /// Execute a chunk from its first instruction until the end of the code
    /// stream or a top-level RETURN.
    pub fn run(&mut self, chunk: &Chunk) -> Result<(), MicaError> {
        let mut ip = 0usize;

        while ip < chunk.code.len() {
            let instruction = chunk.code[ip];
            ip += 1;

            match instruction {
                op::CONSTANT => {
                    let index = read_byte(chunk, &mut ip)?;
                    let value = chunk.constant(index)?.clone();
                    self.push(value);
                }
                op::NIL => self.push(Value::Nil),
                op::TRUE => self.push(Value::Bool(true)),
                op::FALSE => self.push(Value::Bool(false)),
                op::POP => {
                    self.pop()?;
                }

                op::GET_GLOBAL => {
                    let name = self.read_name(chunk, &mut ip)?;
                    match self.globals.get(name.as_str()) {
                        Some(value) => {
                            let value = value.clone();
                            self.push(value);
                        }
                        None => {
                            return Err(MicaError::runtime(format!(
                                "Undefined variable '{name}'."
                            )))
                        }
                    }
                }
                op::DEFINE_GLOBAL => {
                    let name = self.read_name(chunk, &mut ip)?;
                    let value = self.pop()?;
                    self.globals.insert(name, value);
                }
                op::SET_GLOBAL => {
                    let name = self.read_name(chunk, &mut ip)?;
                    if !self.globals.contains_key(name.as_str()) {
                        return Err(MicaError::runtime(format!(
                            "Undefined variable '{name}'."
                        )));
                    }
                    // Assignment is an expression; its value stays on the stack.
                    let value = self.peek()?.clone();
                    self.globals.insert(name, value);
                }

                op::GET_PROPERTY => {
                    let name = self.read_name(chunk, &mut ip)?;
                    let object = self.pop()?;
                    let value = get_property(&object, &name, &self.globals)?;
                    self.push(value);
                }
                op::SET_PROPERTY => {
                    let name = self.read_name(chunk, &mut ip)?;
                    let value = self.pop()?;
                    let object = self.pop()?;
                    set_property(&object, &name, value.clone())?;
                    self.push(value);
                }

                op::EQUAL => self.binary(mica_core::BinaryOp::Equal)?,
                op::GREATER => self.binary(mica_core::BinaryOp::Greater)?,
                op::LESS => self.binary(mica_core::BinaryOp::Less)?,
                op::ADD => self.binary(mica_core::BinaryOp::Add)?,
                op::SUBTRACT => self.binary(mica_core::BinaryOp::Subtract)?,
                op::MULTIPLY => self.binary(mica_core::BinaryOp::Multiply)?,
                op::DIVIDE => self.binary(mica_core::BinaryOp::Divide)?,
                op::MODULO => self.binary(mica_core::BinaryOp::Modulo)?,

                op::NOT => {
                    let value = self.pop()?;
                    self.push(Value::Bool(!value.is_truthy()));
                }
                op::NEGATE => {
                    let value = self.pop()?;
                    self.push(ops::unary(mica_core::UnaryOp::Negate, &value)?);
                }

                op::PRINT => {
                    let value = self.pop()?;
                    self.print(&value)?;
                }

                op::JUMP => {
                    let offset = read_u16(chunk, &mut ip)? as usize;
                    ip += offset;
                }
                op::JUMP_IF_FALSE => {
                    let offset = read_u16(chunk, &mut ip)? as usize;
                    // The condition stays on the stack; both branches POP it.
                    if !self.peek()?.is_truthy() {
                        ip += offset;
                    }
                }
                op::LOOP => {
                    let offset = read_u16(chunk, &mut ip)? as usize;
                    ip = ip
                        .checked_sub(offset)
                        .ok_or_else(|| MicaError::runtime("Invalid jump target."))?;
                }

                op::CALL => {
                    let argc = read_byte(chunk, &mut ip)? as usize;
                    let callee = self.pop()?;
                    if self.stack.len() < argc {
                        return Err(MicaError::runtime("Stack underflow."));
                    }
                    let args = self.stack.split_off(self.stack.len() - argc);
                    let result = call_value(self, callee, args)?;
                    self.push(result);
                }
                op::RETURN => return Ok(()),

                op::ARRAY => {
                    let count = read_byte(chunk, &mut ip)? as usize;
                    if self.stack.len() < count {
                        return Err(MicaError::runtime("Stack underflow."));
                    }
                    let items = self.stack.split_off(self.stack.len() - count);
                    self.push(Value::array(items));
                }
                op::INDEX_GET => {
                    let index = self.pop()?;
                    let object = self.pop()?;
                    self.push(ops::index_get(&object, &index)?);
                }
                op::INDEX_SET => {
                    let value = self.pop()?;
                    let index = self.pop()?;
                    let object = self.pop()?;
                    ops::index_set(&object, &index, value.clone())?;
                    self.push(value);
                }

                other => {
                    return Err(MicaError::runtime(format!("Unknown opcode: {other}.")))
                }
            }
        }

        Ok(())
    }

    fn binary(&mut self, op: mica_core::BinaryOp) -> Result<(), MicaError> {
        let b = self.pop()?;
        let a = self.pop()?;
        self.push(ops::binary(op, &a, &b)?);
        Ok(())
    }

    fn read_name(&self, chunk: &Chunk, ip: &mut usize) -> Result<String, MicaError> {
        let index = read_byte(chunk, ip)?;
        match chunk.constant(index)? {
            Value::Str(s) => Ok(s.as_str().to_string()),
            other => Err(MicaError::runtime(format!(
                "Expected a name constant, got {}.",
                other.type_name()
            ))),
        }
    }

    fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    fn pop(&mut self) -> Result<Value, MicaError> {
        self.stack
            .pop()
            .ok_or_else(|| MicaError::runtime("Stack underflow."))
    }

    fn peek(&self) -> Result<&Value, MicaError> {
        self.stack
            .last()
            .ok_or_else(|| MicaError::runtime("Stack underflow."))
    }
}

impl Default for Vm {
    fn default() -> Self {
        Vm::new()
    }
}

fn read_byte(chunk: &Chunk, ip: &mut usize) -> Result<u8, MicaError> {
    let byte = chunk
        .code
        .get(*ip)
        .copied()
        .ok_or_else(|| MicaError::runtime("Truncated instruction."))?;
    *ip += 1;
    Ok(byte)
}

fn read_u16(chunk: &Chunk, ip: &mut usize) -> Result<u16, MicaError> {
    let hi = read_byte(chunk, ip)? as u16;
    let lo = read_byte(chunk, ip)? as u16;
    Ok((hi << 8) | lo)
}

/// Invoke any callable value with already-evaluated arguments. Shared by the
/// bytecode CALL handler and the body evaluator's call expression.
pub fn call_value(vm: &mut Vm, callee: Value, args: Vec<Value>) -> Result<Value, MicaError> {
    match callee {
        Value::Builtin(builtin) => {
            if args.len() != builtin.arity {
                return Err(MicaError::arity(builtin.arity, args.len()));
            }
            (builtin.func)(&args)
        }
        Value::Function(function) => {
            if args.len() != function.arity() {
                return Err(MicaError::arity(function.arity(), args.len()));
            }
            eval::call_function(vm, &function, None, args)
        }
        Value::BoundMethod(bound) => {
            if args.len() != bound.method.arity() {
                return Err(MicaError::arity(bound.method.arity(), args.len()));
            }
            let binding = MethodBinding {
                receiver: bound.receiver.clone(),
                class: bound.defining_class.clone(),
            };
            eval::call_function(vm, &bound.method, Some(binding), args)
        }
        Value::Class(class) => construct(vm, class, args),
        other => Err(MicaError::runtime(format!(
            "Can only call functions and classes, got {}.",
            other.type_name()
        ))),
    }
}

/// Construct an instance: link the superclass chain, seed fields from the
/// merged defaults, then run the nearest `init`.
fn construct(vm: &mut Vm, class: Rc<Class>, args: Vec<Value>) -> Result<Value, MicaError> {
    class.superclass(&vm.globals)?;
    let fields = class.merged_defaults(&vm.globals)?;
    let instance = Rc::new(Instance::new(class.clone(), fields));

    match class.find_method("init", &vm.globals)? {
        Some((init, defining)) => {
            if args.len() != init.arity() {
                return Err(MicaError::arity(init.arity(), args.len()));
            }
            let binding = MethodBinding {
                receiver: instance.clone(),
                class: defining,
            };
            eval::call_function(vm, &init, Some(binding), args)?;
        }
        None => {
            if !args.is_empty() {
                return Err(MicaError::arity(0, args.len()));
            }
        }
    }

    Ok(Value::Instance(instance))
}

/// Property read: fields shadow methods; a method lookup produces a bound
/// method that remembers its defining class for `super` dispatch.
pub fn get_property(object: &Value, name: &str, globals: &Globals) -> Result<Value, MicaError> {
    let Value::Instance(instance) = object else {
        return Err(MicaError::runtime("Only instances have properties."));
    };
    if let Some(value) = instance.get_field(name) {
        return Ok(value);
    }
    if let Some((method, defining)) = instance.class.find_method(name, globals)? {
        return Ok(Value::BoundMethod(Rc::new(BoundMethod {
            receiver: instance.clone(),
            method,
            defining_class: defining,
        })));
    }
    Err(MicaError::runtime(format!("Undefined property '{name}'.")))
}

pub fn set_property(object: &Value, name: &str, value: Value) -> Result<(), MicaError> {
    let Value::Instance(instance) = object else {
        return Err(MicaError::runtime("Only instances have fields."));
    };
    instance.set_field(name, value);
    Ok(())
}
