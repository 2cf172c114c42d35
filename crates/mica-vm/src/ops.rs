//! Operator semantics shared by the bytecode VM and the body evaluator, so
//! the two execution paths cannot drift apart.

use mica_core::body::{BinaryOp, UnaryOp};
use mica_core::{MicaError, Value};

pub fn binary(op: BinaryOp, a: &Value, b: &Value) -> Result<Value, MicaError> {
    match op {
        BinaryOp::Add => add(a, b),
        BinaryOp::Subtract => numeric(a, b).map(|(x, y)| Value::Number(x - y)),
        BinaryOp::Multiply => numeric(a, b).map(|(x, y)| Value::Number(x * y)),
        BinaryOp::Divide => {
            let (x, y) = numeric(a, b)?;
            if y == 0.0 {
                return Err(MicaError::runtime("Division by zero."));
            }
            Ok(Value::Number(x / y))
        }
        BinaryOp::Modulo => numeric(a, b).map(|(x, y)| Value::Number(x % y)),
        BinaryOp::Equal => Ok(Value::Bool(a == b)),
        BinaryOp::NotEqual => Ok(Value::Bool(a != b)),
        BinaryOp::Greater => numeric(a, b).map(|(x, y)| Value::Bool(x > y)),
        BinaryOp::GreaterEqual => numeric(a, b).map(|(x, y)| Value::Bool(x >= y)),
        BinaryOp::Less => numeric(a, b).map(|(x, y)| Value::Bool(x < y)),
        BinaryOp::LessEqual => numeric(a, b).map(|(x, y)| Value::Bool(x <= y)),
    }
}

pub fn unary(op: UnaryOp, v: &Value) -> Result<Value, MicaError> {
    match op {
        UnaryOp::Negate => match v {
            Value::Number(n) => Ok(Value::Number(-n)),
            _ => Err(MicaError::runtime("Operand must be a number.")),
        },
        UnaryOp::Not => Ok(Value::Bool(!v.is_truthy())),
    }
}

/// `+` is overloaded: numeric addition, string concatenation (either side a
/// string stringifies the other), and array concatenation/append/prepend.
fn add(a: &Value, b: &Value) -> Result<Value, MicaError> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => Ok(Value::Number(x + y)),
        (Value::Str(_), _) | (_, Value::Str(_)) => Ok(Value::string(format!("{a}{b}"))),
        (Value::Array(x), Value::Array(y)) => {
            let mut items = x.borrow().clone();
            items.extend(y.borrow().iter().cloned());
            Ok(Value::array(items))
        }
        (Value::Array(x), _) => {
            let mut items = x.borrow().clone();
            items.push(b.clone());
            Ok(Value::array(items))
        }
        (_, Value::Array(y)) => {
            let mut items = vec![a.clone()];
            items.extend(y.borrow().iter().cloned());
            Ok(Value::array(items))
        }
        _ => Err(MicaError::runtime(
            "Operands must be two numbers, two strings, or arrays.",
        )),
    }
}

fn numeric(a: &Value, b: &Value) -> Result<(f64, f64), MicaError> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => Ok((*x, *y)),
        _ => Err(MicaError::runtime("Operands must be numbers.")),
    }
}

/// `object[index]` on arrays and strings. String indexing yields a
/// one-character string.
pub fn index_get(object: &Value, index: &Value) -> Result<Value, MicaError> {
    match (object, index) {
        (Value::Array(items), Value::Number(n)) => {
            let items = items.borrow();
            let i = *n as i64;
            if i < 0 || i as usize >= items.len() {
                return Err(MicaError::runtime("Array index out of bounds."));
            }
            Ok(items[i as usize].clone())
        }
        (Value::Str(s), Value::Number(n)) => {
            let i = *n as i64;
            let ch = (i >= 0).then(|| s.chars().nth(i as usize)).flatten();
            match ch {
                Some(c) => Ok(Value::string(c.to_string())),
                None => Err(MicaError::runtime("String index out of bounds.")),
            }
        }
        _ => Err(MicaError::runtime("Invalid index operation.")),
    }
}

/// `object[index] = value`; arrays only, in place through the shared
/// reference.
pub fn index_set(object: &Value, index: &Value, value: Value) -> Result<(), MicaError> {
    match (object, index) {
        (Value::Array(items), Value::Number(n)) => {
            let mut items = items.borrow_mut();
            let i = *n as i64;
            if i < 0 || i as usize >= items.len() {
                return Err(MicaError::runtime("Array index out of bounds."));
            }
            items[i as usize] = value;
            Ok(())
        }
        _ => Err(MicaError::runtime("Invalid index set operation.")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(n: f64) -> Value {
        Value::Number(n)
    }

    #[test]
    fn arithmetic() {
        assert_eq!(binary(BinaryOp::Add, &num(1.0), &num(2.0)).unwrap(), num(3.0));
        assert_eq!(
            binary(BinaryOp::Subtract, &num(5.0), &num(3.0)).unwrap(),
            num(2.0)
        );
        assert_eq!(
            binary(BinaryOp::Modulo, &num(7.0), &num(3.0)).unwrap(),
            num(1.0)
        );
    }

    #[test]
    fn division_by_zero_is_an_error() {
        let err = binary(BinaryOp::Divide, &num(1.0), &num(0.0)).unwrap_err();
        assert!(err.to_string().contains("Division by zero."));
    }

    #[test]
    fn string_concat_stringifies_either_side() {
        let got = binary(BinaryOp::Add, &Value::string("n="), &num(2.0)).unwrap();
        assert_eq!(got, Value::string("n=2"));
        let got = binary(BinaryOp::Add, &num(2.0), &Value::string("!")).unwrap();
        assert_eq!(got, Value::string("2!"));
    }

    #[test]
    fn array_add_concats_and_appends() {
        let a = Value::array(vec![num(1.0)]);
        let b = Value::array(vec![num(2.0)]);
        assert_eq!(
            binary(BinaryOp::Add, &a, &b).unwrap(),
            Value::array(vec![num(1.0), num(2.0)])
        );
        assert_eq!(
            binary(BinaryOp::Add, &a, &num(9.0)).unwrap(),
            Value::array(vec![num(1.0), num(9.0)])
        );
        assert_eq!(
            binary(BinaryOp::Add, &num(0.0), &a).unwrap(),
            Value::array(vec![num(0.0), num(1.0)])
        );
    }

    #[test]
    fn comparison_requires_numbers() {
        assert_eq!(
            binary(BinaryOp::Less, &num(1.0), &num(2.0)).unwrap(),
            Value::Bool(true)
        );
        let err = binary(BinaryOp::Greater, &Value::string("a"), &num(1.0)).unwrap_err();
        assert!(err.to_string().contains("Operands must be numbers."));
    }

    #[test]
    fn equality_crosses_variants_as_unequal() {
        assert_eq!(
            binary(BinaryOp::Equal, &Value::Nil, &num(0.0)).unwrap(),
            Value::Bool(false)
        );
        assert_eq!(
            binary(BinaryOp::NotEqual, &Value::Nil, &Value::Nil).unwrap(),
            Value::Bool(false)
        );
    }

    #[test]
    fn negate_and_not() {
        assert_eq!(unary(UnaryOp::Negate, &num(3.0)).unwrap(), num(-3.0));
        assert!(unary(UnaryOp::Negate, &Value::Nil).is_err());
        assert_eq!(unary(UnaryOp::Not, &Value::Nil).unwrap(), Value::Bool(true));
        assert_eq!(unary(UnaryOp::Not, &num(0.0)).unwrap(), Value::Bool(false));
    }

    #[test]
    fn index_bounds() {
        let arr = Value::array(vec![num(1.0), num(2.0)]);
        assert_eq!(index_get(&arr, &num(1.0)).unwrap(), num(2.0));
        assert!(index_get(&arr, &num(2.0)).is_err());
        assert!(index_get(&arr, &num(-1.0)).is_err());

        let s = Value::string("hi");
        assert_eq!(index_get(&s, &num(0.0)).unwrap(), Value::string("h"));
        assert!(index_get(&s, &num(5.0)).is_err());
    }

    #[test]
    fn index_set_mutates_through_shared_reference() {
        let arr = Value::array(vec![num(1.0)]);
        let alias = arr.clone();
        index_set(&arr, &num(0.0), num(9.0)).unwrap();
        assert_eq!(index_get(&alias, &num(0.0)).unwrap(), num(9.0));
        assert!(index_set(&arr, &num(3.0), Value::Nil).is_err());
    }
}
