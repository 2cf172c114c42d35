//! Native functions registered in every VM's global table.

use std::cmp::Ordering;
use std::rc::Rc;

use mica_core::{Builtin, Globals, MicaError, Value};

fn as_array(value: &Value, name: &str) -> Result<Rc<std::cell::RefCell<Vec<Value>>>, MicaError> {
    match value {
        Value::Array(items) => Ok(items.clone()),
        _ => Err(MicaError::runtime(format!(
            "'{name}' can only be applied to arrays"
        ))),
    }
}

/// Install the builtin functions into a global table.
pub fn register(globals: &mut Globals) {
    let mut define = |name: &'static str, arity: usize, f: fn(&[Value]) -> Result<Value, MicaError>| {
        globals.insert(name.to_string(), Value::Builtin(Rc::new(Builtin::new(name, arity, f))));
    };

    define("len", 1, |args| match &args[0] {
        Value::Str(s) => Ok(Value::Number(s.chars().count() as f64)),
        Value::Array(items) => Ok(Value::Number(items.borrow().len() as f64)),
        _ => Err(MicaError::runtime(
            "'len' can only be applied to strings and arrays",
        )),
    });

    define("str", 1, |args| Ok(Value::string(args[0].to_string())));

    define("num", 1, |args| match &args[0] {
        Value::Number(_) => Ok(args[0].clone()),
        Value::Str(s) => s
            .trim()
            .parse::<f64>()
            .map(Value::Number)
            .map_err(|_| MicaError::runtime(format!("Cannot convert '{s}' to number"))),
        other => Err(MicaError::runtime(format!(
            "Cannot convert {} to number",
            other.type_name()
        ))),
    });

    define("push", 2, |args| {
        let items = as_array(&args[0], "push")?;
        items.borrow_mut().push(args[1].clone());
        Ok(args[1].clone())
    });

    define("pop", 1, |args| {
        let items = as_array(&args[0], "pop")?;
        let popped = items.borrow_mut().pop();
        popped.ok_or_else(|| MicaError::runtime("Cannot pop from empty array"))
    });

    define("shift", 1, |args| {
        let items = as_array(&args[0], "shift")?;
        let mut items = items.borrow_mut();
        if items.is_empty() {
            return Err(MicaError::runtime("Cannot shift from empty array"));
        }
        Ok(items.remove(0))
    });

    define("unshift", 2, |args| {
        let items = as_array(&args[0], "unshift")?;
        items.borrow_mut().insert(0, args[1].clone());
        Ok(args[1].clone())
    });

    define("slice", 3, |args| {
        let items = as_array(&args[0], "slice")?;
        let start = match &args[1] {
            Value::Number(n) => *n as i64,
            _ => return Err(MicaError::runtime("'slice' start index must be a number")),
        };
        let end = match &args[2] {
            Value::Number(n) => *n as i64,
            _ => return Err(MicaError::runtime("'slice' end index must be a number")),
        };

        let items = items.borrow();
        let len = items.len() as i64;
        // Negative indices count from the end; everything clamps into range.
        let resolve = |i: i64| -> usize {
            let i = if i < 0 { (len + i).max(0) } else { i };
            i.clamp(0, len) as usize
        };
        let (start, end) = (resolve(start), resolve(end));
        if start > end {
            return Ok(Value::array(Vec::new()));
        }
        Ok(Value::array(items[start..end].to_vec()))
    });

    define("indexOf", 2, |args| {
        let items = as_array(&args[0], "indexOf")?;
        let items = items.borrow();
        let index = items
            .iter()
            .position(|v| v == &args[1])
            .map(|i| i as f64)
            .unwrap_or(-1.0);
        Ok(Value::Number(index))
    });

    define("contains", 2, |args| {
        let items = as_array(&args[0], "contains")?;
        let found = items.borrow().contains(&args[1]);
        Ok(Value::Bool(found))
    });

    define("reverse", 1, |args| {
        let items = as_array(&args[0], "reverse")?;
        items.borrow_mut().reverse();
        Ok(args[0].clone())
    });

    define("sort", 1, |args| {
        let items = as_array(&args[0], "sort")?;
        // Numbers sort before strings; anything else keeps its position.
        items.borrow_mut().sort_by(|a, b| match (a, b) {
            (Value::Number(x), Value::Number(y)) => x.partial_cmp(y).unwrap_or(Ordering::Equal),
            (Value::Str(x), Value::Str(y)) => x.cmp(y),
            (Value::Number(_), Value::Str(_)) => Ordering::Less,
            (Value::Str(_), Value::Number(_)) => Ordering::Greater,
            _ => Ordering::Equal,
        });
        Ok(args[0].clone())
    });

    define("clear", 1, |args| {
        let items = as_array(&args[0], "clear")?;
        items.borrow_mut().clear();
        Ok(Value::Nil)
    });

    define("copy", 1, |args| {
        let items = as_array(&args[0], "copy")?;
        let copied = items.borrow().clone();
        Ok(Value::array(copied))
    });
}
