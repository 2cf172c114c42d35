use std::cell::RefCell;
use std::rc::Rc;

use hashbrown::HashMap;

use crate::value::Value;

/// A scope for the body evaluator: a mutable binding table with an optional
/// parent. Each call gets a scope chained to an outer one; lookups walk
/// outward.
#[derive(Debug, Default)]
pub struct Env {
    bindings: RefCell<HashMap<String, Value>>,
    parent: Option<Rc<Env>>,
}

impl Env {
    pub fn new() -> Rc<Env> {
        Rc::new(Env::default())
    }

    pub fn with_parent(parent: Rc<Env>) -> Rc<Env> {
        Rc::new(Env {
            bindings: RefCell::new(HashMap::new()),
            parent: Some(parent),
        })
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.bindings.borrow().get(name) {
            return Some(value.clone());
        }
        self.parent.as_ref().and_then(|parent| parent.get(name))
    }

    /// Define (or shadow) a binding in this scope.
    pub fn define(&self, name: impl Into<String>, value: Value) {
        self.bindings.borrow_mut().insert(name.into(), value);
    }

    /// Assign to an existing binding, walking outward. Returns false when no
    /// scope in the chain defines the name.
    pub fn assign(&self, name: &str, value: Value) -> bool {
        if let Some(slot) = self.bindings.borrow_mut().get_mut(name) {
            *slot = value;
            return true;
        }
        match &self.parent {
            Some(parent) => parent.assign(name, value),
            None => false,
        }
    }

    pub fn is_defined_here(&self, name: &str) -> bool {
        self.bindings.borrow().contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn define_and_get() {
        let env = Env::new();
        env.define("x", Value::Number(1.0));
        assert_eq!(env.get("x"), Some(Value::Number(1.0)));
        assert_eq!(env.get("y"), None);
    }

    #[test]
    fn child_sees_parent_bindings() {
        let parent = Env::new();
        parent.define("x", Value::Number(1.0));
        let child = Env::with_parent(parent);
        assert_eq!(child.get("x"), Some(Value::Number(1.0)));
    }

    #[test]
    fn child_shadows_without_clobbering() {
        let parent = Env::new();
        parent.define("x", Value::Number(1.0));
        let child = Env::with_parent(parent.clone());
        child.define("x", Value::Number(2.0));
        assert_eq!(child.get("x"), Some(Value::Number(2.0)));
        assert_eq!(parent.get("x"), Some(Value::Number(1.0)));
    }

    #[test]
    fn assign_walks_outward() {
        let parent = Env::new();
        parent.define("x", Value::Number(1.0));
        let child = Env::with_parent(parent.clone());
        assert!(child.assign("x", Value::Number(5.0)));
        assert_eq!(parent.get("x"), Some(Value::Number(5.0)));
        assert!(!child.assign("missing", Value::Nil));
    }
}
