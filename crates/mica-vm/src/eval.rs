//! The body evaluator: the tree-walking half of the hybrid execution model.
//!
//! Function and method bodies are not bytecode; they are Body Representation
//! trees walked directly on every call. The evaluator shares the Value type
//! and the global table with the bytecode VM and nothing else.

use std::cell::Cell;
use std::rc::Rc;

use mica_core::body::{Expr, LogicalOp, Stmt};
use mica_core::{Class, Env, Function, Instance, MicaError, Value};

use crate::ops;
use crate::vm::{self, Vm};

const MAX_CALL_DEPTH: usize = 100;

thread_local! {
    static CALL_DEPTH: Cell<usize> = Cell::new(0);
}

/// Increments the call depth on entry and decrements on drop, so the
/// counter stays correct when a body errors out mid-call.
struct DepthGuard;

impl DepthGuard {
    fn enter() -> Result<DepthGuard, MicaError> {
        let depth = CALL_DEPTH.with(|d| d.get());
        if depth >= MAX_CALL_DEPTH {
            return Err(MicaError::runtime(format!(
                "Stack overflow: recursion depth exceeded {MAX_CALL_DEPTH}"
            )));
        }
        CALL_DEPTH.with(|d| d.set(depth + 1));
        Ok(DepthGuard)
    }
}

impl Drop for DepthGuard {
    fn drop(&mut self) {
        CALL_DEPTH.with(|d| d.set(d.get() - 1));
    }
}

/// The receiver and defining class of the method being executed. `this`
/// resolves to the receiver; `super` dispatches from above the defining
/// class, not the receiver's class.
#[derive(Clone)]
pub struct MethodBinding {
    pub receiver: Rc<Instance>,
    pub class: Rc<Class>,
}

/// How control left a statement: fell through with a value, or hit an
/// explicit `return` that must unwind to the nearest call.
enum Flow {
    Normal(Value),
    Return(Value),
}

/// Invoke a function or method body. Arguments bind positionally: extra
/// arguments are ignored and missing ones bind nil (arity is the caller's
/// concern). A body without `return` yields its last statement's value.
pub fn call_function(
    vm: &mut Vm,
    function: &Rc<Function>,
    binding: Option<MethodBinding>,
    args: Vec<Value>,
) -> Result<Value, MicaError> {
    let _guard = DepthGuard::enter()?;

    // Outer scope: builtins and classes from the global table, so a body may
    // reference them without any lexical link to the top level.
    let outer = Env::new();
    for (name, value) in &vm.globals {
        if matches!(value, Value::Builtin(_) | Value::Class(_)) {
            outer.define(name.clone(), value.clone());
        }
    }

    let env = Env::with_parent(outer);
    for (i, param) in function.params.iter().enumerate() {
        env.define(param.clone(), args.get(i).cloned().unwrap_or(Value::Nil));
    }
    if let Some(binding) = &binding {
        env.define("this", Value::Instance(binding.receiver.clone()));
    }

    let mut evaluator = BodyEval { vm, binding };
    match evaluator.execute_all(&function.body, &env)? {
        Flow::Normal(value) | Flow::Return(value) => Ok(value),
    }
}

struct BodyEval<'a> {
    vm: &'a mut Vm,
    binding: Option<MethodBinding>,
}

impl BodyEval<'_> {
    fn execute_all(&mut self, statements: &[Stmt], env: &Rc<Env>) -> Result<Flow, MicaError> {
        let mut last = Value::Nil;
        for stmt in statements {
            match self.execute(stmt, env)? {
                Flow::Return(value) => return Ok(Flow::Return(value)),
                Flow::Normal(value) => last = value,
            }
        }
        Ok(Flow::Normal(last))
    }

    fn execute(&mut self, stmt: &Stmt, env: &Rc<Env>) -> Result<Flow, MicaError> {
        match stmt {
            Stmt::Print(expr) => {
                let value = self.eval(expr, env)?;
                self.vm.print(&value)?;
                Ok(Flow::Normal(Value::Nil))
            }
            Stmt::Var { name, init } => {
                let value = match init {
                    Some(expr) => self.eval(expr, env)?,
                    None => Value::Nil,
                };
                env.define(name.clone(), value);
                Ok(Flow::Normal(Value::Nil))
            }
            Stmt::Return(value) => {
                let value = match value {
                    Some(expr) => self.eval(expr, env)?,
                    None => Value::Nil,
                };
                Ok(Flow::Return(value))
            }
            Stmt::Expression(expr) => Ok(Flow::Normal(self.eval(expr, env)?)),
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.eval(condition, env)?.is_truthy() {
                    self.execute(then_branch, env)
                } else if let Some(else_branch) = else_branch {
                    self.execute(else_branch, env)
                } else {
                    Ok(Flow::Normal(Value::Nil))
                }
            }
            Stmt::While { condition, body } => {
                while self.eval(condition, env)?.is_truthy() {
                    if let Flow::Return(value) = self.execute(body, env)? {
                        return Ok(Flow::Return(value));
                    }
                }
                Ok(Flow::Normal(Value::Nil))
            }
            Stmt::For {
                init,
                condition,
                increment,
                body,
            } => {
                if let Some(init) = init {
                    self.execute(init, env)?;
                }
                loop {
                    let keep_going = match condition {
                        Some(condition) => self.eval(condition, env)?.is_truthy(),
                        None => true,
                    };
                    if !keep_going {
                        break;
                    }
                    if let Flow::Return(value) = self.execute(body, env)? {
                        return Ok(Flow::Return(value));
                    }
                    if let Some(increment) = increment {
                        self.eval(increment, env)?;
                    }
                }
                Ok(Flow::Normal(Value::Nil))
            }
            Stmt::Block(statements) => self.execute_all(statements, env),
        }
    }

    fn eval(&mut self, expr: &Expr, env: &Rc<Env>) -> Result<Value, MicaError> {
        match expr {
            Expr::Literal(literal) => Ok(Value::from(literal)),
            Expr::Variable(name) => self.lookup(name, env),
            Expr::Unary { op, right } => {
                let right = self.eval(right, env)?;
                ops::unary(*op, &right)
            }
            Expr::Binary { left, op, right } => {
                let left = self.eval(left, env)?;
                let right = self.eval(right, env)?;
                ops::binary(*op, &left, &right)
            }
            Expr::Logical { left, op, right } => {
                let left = self.eval(left, env)?;
                match op {
                    LogicalOp::And if !left.is_truthy() => Ok(left),
                    LogicalOp::Or if left.is_truthy() => Ok(left),
                    _ => self.eval(right, env),
                }
            }
            Expr::Call { callee, args } => {
                let callee = self.eval(callee, env)?;
                let args = self.eval_args(args, env)?;
                vm::call_value(self.vm, callee, args)
            }
            Expr::Get { object, name } => {
                let object = self.eval(object, env)?;
                vm::get_property(&object, name, &self.vm.globals)
            }
            Expr::Set {
                object,
                name,
                value,
            } => {
                let object = self.eval(object, env)?;
                let value = self.eval(value, env)?;
                vm::set_property(&object, name, value.clone())?;
                Ok(value)
            }
            Expr::This => match &self.binding {
                Some(binding) => Ok(Value::Instance(binding.receiver.clone())),
                None => Err(MicaError::runtime("Can't use 'this' outside of a class.")),
            },
            Expr::Assign { name, value } => {
                let value = self.eval(value, env)?;
                if env.assign(name, value.clone()) {
                    return Ok(value);
                }
                // Fall back to the VM's globals so bodies can mutate
                // top-level state.
                if self.vm.globals.contains_key(name.as_str()) {
                    self.vm.globals.insert(name.clone(), value.clone());
                    return Ok(value);
                }
                Err(MicaError::runtime(format!("Undefined variable '{name}'.")))
            }
            Expr::Array(elements) => {
                let items = self.eval_args(elements, env)?;
                Ok(Value::array(items))
            }
            Expr::Index { object, index } => {
                let object = self.eval(object, env)?;
                let index = self.eval(index, env)?;
                ops::index_get(&object, &index)
            }
            Expr::IndexSet {
                object,
                index,
                value,
            } => {
                let object = self.eval(object, env)?;
                let index = self.eval(index, env)?;
                let value = self.eval(value, env)?;
                ops::index_set(&object, &index, value.clone())?;
                Ok(value)
            }
            Expr::SuperCall { method, args } => self.super_call(method, args, env),
        }
    }

    fn super_call(
        &mut self,
        method: &str,
        args: &[Expr],
        env: &Rc<Env>,
    ) -> Result<Value, MicaError> {
        let Some(binding) = self.binding.clone() else {
            return Err(MicaError::runtime("Can't use 'super' outside of a class."));
        };
        let Some(superclass) = binding.class.superclass(&self.vm.globals)? else {
            return Err(MicaError::runtime(
                "Can't use 'super' in a class with no superclass.",
            ));
        };
        let Some((function, defining)) = superclass.find_method(method, &self.vm.globals)? else {
            return Err(MicaError::runtime(format!(
                "Undefined property '{method}'."
            )));
        };

        let args = self.eval_args(args, env)?;
        if args.len() != function.arity() {
            return Err(MicaError::arity(function.arity(), args.len()));
        }
        let super_binding = MethodBinding {
            receiver: binding.receiver,
            class: defining,
        };
        call_function(self.vm, &function, Some(super_binding), args)
    }

    fn eval_args(&mut self, exprs: &[Expr], env: &Rc<Env>) -> Result<Vec<Value>, MicaError> {
        exprs.iter().map(|e| self.eval(e, env)).collect()
    }

    /// Name resolution: the environment chain first, then the global table.
    fn lookup(&self, name: &str, env: &Rc<Env>) -> Result<Value, MicaError> {
        if let Some(value) = env.get(name) {
            return Ok(value);
        }
        if let Some(value) = self.vm.globals.get(name) {
            return Ok(value.clone());
        }
        Err(MicaError::runtime(format!("Undefined variable '{name}'.")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mica_core::body::{BinaryOp, Literal};

    fn function(name: &str, params: &[&str], body: Vec<Stmt>) -> Rc<Function> {
        Rc::new(Function {
            name: name.to_string(),
            params: params.iter().map(|s| s.to_string()).collect(),
            body,
        })
    }

    fn sink() -> Vm {
        Vm::with_output(Box::new(std::io::sink()))
    }

    #[test]
    fn missing_args_bind_nil_and_extra_args_are_ignored() {
        let mut vm = sink();
        let f = function(
            "f",
            &["a", "b"],
            vec![Stmt::Return(Some(Expr::Variable("b".into())))],
        );
        let got = call_function(&mut vm, &f, None, vec![Value::Number(1.0)]).unwrap();
        assert_eq!(got, Value::Nil);

        let got = call_function(
            &mut vm,
            &f,
            None,
            vec![Value::Number(1.0), Value::Number(2.0), Value::Number(3.0)],
        )
        .unwrap();
        assert_eq!(got, Value::Number(2.0));
    }

    #[test]
    fn body_without_return_yields_last_statement_value() {
        let mut vm = sink();
        let f = function(
            "f",
            &[],
            vec![
                Stmt::Expression(Expr::Literal(Literal::Number(1.0))),
                Stmt::Expression(Expr::Binary {
                    left: Box::new(Expr::Literal(Literal::Number(2.0))),
                    op: BinaryOp::Add,
                    right: Box::new(Expr::Literal(Literal::Number(3.0))),
                }),
            ],
        );
        let got = call_function(&mut vm, &f, None, vec![]).unwrap();
        assert_eq!(got, Value::Number(5.0));
    }

    #[test]
    fn return_unwinds_out_of_nested_control_flow() {
        let mut vm = sink();
        let f = function(
            "f",
            &[],
            vec![
                Stmt::While {
                    condition: Expr::Literal(Literal::Bool(true)),
                    body: Box::new(Stmt::Return(Some(Expr::Literal(Literal::Number(7.0))))),
                },
                Stmt::Expression(Expr::Literal(Literal::Number(0.0))),
            ],
        );
        let got = call_function(&mut vm, &f, None, vec![]).unwrap();
        assert_eq!(got, Value::Number(7.0));
    }

    #[test]
    fn recursion_depth_is_capped_at_100() {
        let mut vm = sink();
        // f() { return f() } — unbounded recursion through the global table.
        let f = function(
            "f",
            &[],
            vec![Stmt::Return(Some(Expr::Call {
                callee: Box::new(Expr::Variable("f".into())),
                args: vec![],
            }))],
        );
        vm.globals
            .insert("f".to_string(), Value::Function(f.clone()));

        let err = call_function(&mut vm, &f, None, vec![]).unwrap_err();
        assert!(err.to_string().contains("Stack overflow"));
        // The guard unwound cleanly: a fresh call is allowed again.
        let ok = function("g", &[], vec![Stmt::Return(None)]);
        assert!(call_function(&mut vm, &ok, None, vec![]).is_ok());
    }

    #[test]
    fn logical_operators_return_operand_values() {
        let mut vm = sink();
        let f = function(
            "f",
            &[],
            vec![Stmt::Return(Some(Expr::Logical {
                left: Box::new(Expr::Literal(Literal::Nil)),
                op: LogicalOp::Or,
                right: Box::new(Expr::Literal(Literal::Str("fallback".into()))),
            }))],
        );
        let got = call_function(&mut vm, &f, None, vec![]).unwrap();
        assert_eq!(got, Value::string("fallback"));
    }

    #[test]
    fn undefined_variable_reports_name() {
        let mut vm = sink();
        let f = function(
            "f",
            &[],
            vec![Stmt::Expression(Expr::Variable("ghost".into()))],
        );
        let err = call_function(&mut vm, &f, None, vec![]).unwrap_err();
        assert_eq!(err.to_string(), "Runtime error: Undefined variable 'ghost'.");
    }
}
