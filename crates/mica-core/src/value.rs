use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use hashbrown::HashMap;

use crate::body::{Literal, Stmt};
use crate::error::MicaError;

/// The VM's global variable table. One per VM; every function and method
/// body sees it, so global mutation is a cross-cutting side effect.
pub type Globals = HashMap<String, Value>;

/// A native (host-implemented) function exposed to Mica code.
pub struct Builtin {
    pub name: &'static str,
    pub arity: usize,
    pub func: Box<dyn Fn(&[Value]) -> Result<Value, MicaError>>,
}

impl Builtin {
    pub fn new(
        name: &'static str,
        arity: usize,
        f: impl Fn(&[Value]) -> Result<Value, MicaError> + 'static,
    ) -> Self {
        Builtin {
            name,
            arity,
            func: Box::new(f),
        }
    }
}

impl fmt::Debug for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<builtin {}>", self.name)
    }
}

/// A user-defined function or method: parameter names plus the Body
/// Representation tree the body evaluator walks on every call.
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: String,
    pub params: Vec<String>,
    pub body: Vec<Stmt>,
}

impl Function {
    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

/// Superclass linkage state. Classes store the superclass *name* at compile
/// time because the superclass's global binding may not exist yet in
/// declaration order; the reference is resolved once, lazily, and memoized.
#[derive(Debug, Clone)]
enum SuperRef {
    Unresolved,
    Resolved(Option<Rc<Class>>),
}

#[derive(Debug)]
pub struct Class {
    pub name: String,
    pub superclass_name: Option<String>,
    pub interfaces: Vec<String>,
    pub methods: HashMap<String, Rc<Function>>,
    pub defaults: HashMap<String, Value>,
    super_ref: RefCell<SuperRef>,
}

impl Class {
    pub fn new(
        name: String,
        superclass_name: Option<String>,
        interfaces: Vec<String>,
        methods: HashMap<String, Rc<Function>>,
        defaults: HashMap<String, Value>,
    ) -> Self {
        Class {
            name,
            superclass_name,
            interfaces,
            methods,
            defaults,
            super_ref: RefCell::new(SuperRef::Unresolved),
        }
    }

    /// Resolve the superclass name against the global table, memoizing the
    /// result and linking the whole chain on first use.
    pub fn superclass(
        self: &Rc<Self>,
        globals: &Globals,
    ) -> Result<Option<Rc<Class>>, MicaError> {
        if let SuperRef::Resolved(ref link) = *self.super_ref.borrow() {
            return Ok(link.clone());
        }

        let link = match &self.superclass_name {
            None => None,
            Some(name) => match globals.get(name) {
                Some(Value::Class(superclass)) => {
                    if Rc::ptr_eq(self, superclass) {
                        return Err(MicaError::runtime(format!(
                            "A class can't inherit from itself: '{}'.",
                            self.name
                        )));
                    }
                    // Link the rest of the chain while we're here.
                    superclass.superclass(globals)?;
                    Some(superclass.clone())
                }
                Some(_) => {
                    return Err(MicaError::runtime("Superclass must be a class."))
                }
                None => {
                    return Err(MicaError::runtime(format!(
                        "Undefined variable '{name}'."
                    )))
                }
            },
        };

        *self.super_ref.borrow_mut() = SuperRef::Resolved(link.clone());
        Ok(link)
    }

    /// Look up a method on this class or its ancestors, self first.
    /// Returns the function together with the class that defines it, which
    /// `super` dispatch needs.
    pub fn find_method(
        self: &Rc<Self>,
        name: &str,
        globals: &Globals,
    ) -> Result<Option<(Rc<Function>, Rc<Class>)>, MicaError> {
        if let Some(method) = self.methods.get(name) {
            return Ok(Some((method.clone(), self.clone())));
        }
        match self.superclass(globals)? {
            Some(superclass) => superclass.find_method(name, globals),
            None => Ok(None),
        }
    }

    /// Default field values merged root-to-leaf: a subclass value wins over
    /// a superclass value of the same name.
    pub fn merged_defaults(
        self: &Rc<Self>,
        globals: &Globals,
    ) -> Result<HashMap<String, Value>, MicaError> {
        let mut fields = match self.superclass(globals)? {
            Some(superclass) => superclass.merged_defaults(globals)?,
            None => HashMap::new(),
        };
        for (name, value) in &self.defaults {
            fields.insert(name.clone(), value.clone());
        }
        Ok(fields)
    }

    /// Construction arity: the arity of the nearest `init`, or zero.
    pub fn arity(self: &Rc<Self>, globals: &Globals) -> Result<usize, MicaError> {
        Ok(self
            .find_method("init", globals)?
            .map(|(init, _)| init.arity())
            .unwrap_or(0))
    }
}

#[derive(Debug)]
pub struct Instance {
    pub class: Rc<Class>,
    pub fields: RefCell<HashMap<String, Value>>,
}

impl Instance {
    pub fn new(class: Rc<Class>, fields: HashMap<String, Value>) -> Self {
        Instance {
            class,
            fields: RefCell::new(fields),
        }
    }

    pub fn get_field(&self, name: &str) -> Option<Value> {
        self.fields.borrow().get(name).cloned()
    }

    pub fn set_field(&self, name: &str, value: Value) {
        self.fields.borrow_mut().insert(name.to_string(), value);
    }
}

/// A method paired with the instance it was retrieved from. The defining
/// class is fixed at bind time so `super` inside the method dispatches from
/// the right point in the chain.
#[derive(Debug)]
pub struct BoundMethod {
    pub receiver: Rc<Instance>,
    pub method: Rc<Function>,
    pub defining_class: Rc<Class>,
}

/// The runtime value type: a closed tagged union, matched exhaustively at
/// every consumption site.
#[derive(Debug, Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Number(f64),
    Str(Rc<String>),
    Array(Rc<RefCell<Vec<Value>>>),
    Builtin(Rc<Builtin>),
    Function(Rc<Function>),
    Class(Rc<Class>),
    Instance(Rc<Instance>),
    BoundMethod(Rc<BoundMethod>),
}

impl Value {
    pub fn string(s: impl Into<String>) -> Value {
        Value::Str(Rc::new(s.into()))
    }

    pub fn array(items: Vec<Value>) -> Value {
        Value::Array(Rc::new(RefCell::new(items)))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::Array(_) => "array",
            Value::Builtin(_) => "builtin",
            Value::Function(_) => "function",
            Value::Class(_) => "class",
            Value::Instance(_) => "instance",
            Value::BoundMethod(_) => "bound method",
        }
    }

    /// Nil and false are falsy; everything else (including 0 and "") is truthy.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Bool(false))
    }
}

impl From<&Literal> for Value {
    fn from(lit: &Literal) -> Value {
        match lit {
            Literal::Nil => Value::Nil,
            Literal::Bool(b) => Value::Bool(*b),
            Literal::Number(n) => Value::Number(*n),
            Literal::Str(s) => Value::string(s.clone()),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => {
                Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow()
            }
            (Value::Builtin(a), Value::Builtin(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Class(a), Value::Class(b)) => Rc::ptr_eq(a, b),
            (Value::Instance(a), Value::Instance(b)) => Rc::ptr_eq(a, b),
            (Value::BoundMethod(a), Value::BoundMethod(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => {
                if n.fract() == 0.0 && n.is_finite() && n.abs() < 1e15 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{n}")
                }
            }
            Value::Str(s) => write!(f, "{s}"),
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Builtin(b) => write!(f, "<builtin {}>", b.name),
            Value::Function(func) => write!(f, "<fn {}>", func.name),
            Value::Class(class) => write!(f, "<class {}>", class.name),
            Value::Instance(instance) => write!(f, "{} instance", instance.class.name),
            Value::BoundMethod(bound) => write!(f, "<bound <fn {}>>", bound.method.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn class(name: &str, superclass: Option<&str>) -> Rc<Class> {
        Rc::new(Class::new(
            name.to_string(),
            superclass.map(str::to_string),
            Vec::new(),
            HashMap::new(),
            HashMap::new(),
        ))
    }

    #[test]
    fn truthiness() {
        assert!(!Value::Nil.is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(Value::Bool(true).is_truthy());
        assert!(Value::Number(0.0).is_truthy());
        assert!(Value::string("").is_truthy());
        assert!(Value::array(vec![]).is_truthy());
    }

    #[test]
    fn display_trims_integral_numbers() {
        assert_eq!(Value::Number(3.0).to_string(), "3");
        assert_eq!(Value::Number(3.5).to_string(), "3.5");
        assert_eq!(Value::Number(-0.25).to_string(), "-0.25");
    }

    #[test]
    fn display_array() {
        let arr = Value::array(vec![
            Value::Number(1.0),
            Value::string("two"),
            Value::Nil,
        ]);
        assert_eq!(arr.to_string(), "[1, two, nil]");
    }

    #[test]
    fn equality_is_structural_per_variant() {
        assert_eq!(Value::Nil, Value::Nil);
        assert_ne!(Value::Nil, Value::Bool(false));
        assert_eq!(Value::string("a"), Value::string("a"));
        assert_ne!(Value::Number(1.0), Value::string("1"));
        assert_eq!(
            Value::array(vec![Value::Number(1.0)]),
            Value::array(vec![Value::Number(1.0)])
        );
        let c = class("A", None);
        assert_eq!(Value::Class(c.clone()), Value::Class(c.clone()));
        assert_ne!(Value::Class(c), Value::Class(class("A", None)));
    }

    #[test]
    fn superclass_resolution_is_lazy_and_memoized() {
        let a = class("A", None);
        let b = class("B", Some("A"));

        let mut globals = Globals::new();
        globals.insert("A".to_string(), Value::Class(a.clone()));

        let resolved = b.superclass(&globals).unwrap().unwrap();
        assert!(Rc::ptr_eq(&resolved, &a));

        // Memoized: removing the global binding no longer matters.
        globals.clear();
        let resolved = b.superclass(&globals).unwrap().unwrap();
        assert!(Rc::ptr_eq(&resolved, &a));
    }

    #[test]
    fn superclass_must_be_a_class() {
        let b = class("B", Some("A"));
        let mut globals = Globals::new();
        globals.insert("A".to_string(), Value::Number(1.0));
        let err = b.superclass(&globals).unwrap_err();
        assert!(err.to_string().contains("Superclass must be a class"));
    }

    #[test]
    fn merged_defaults_leaf_wins() {
        let mut a_defaults = HashMap::new();
        a_defaults.insert("x".to_string(), Value::Number(1.0));
        a_defaults.insert("y".to_string(), Value::Number(2.0));
        let a = Rc::new(Class::new(
            "A".to_string(),
            None,
            Vec::new(),
            HashMap::new(),
            a_defaults,
        ));

        let mut b_defaults = HashMap::new();
        b_defaults.insert("y".to_string(), Value::Number(20.0));
        let b = Rc::new(Class::new(
            "B".to_string(),
            Some("A".to_string()),
            Vec::new(),
            HashMap::new(),
            b_defaults,
        ));

        let mut globals = Globals::new();
        globals.insert("A".to_string(), Value::Class(a));

        let merged = b.merged_defaults(&globals).unwrap();
        assert_eq!(merged.get("x"), Some(&Value::Number(1.0)));
        assert_eq!(merged.get("y"), Some(&Value::Number(20.0)));
    }
}
