//! Binary and unary operators.
//!
//! Instances may overload operators with `__add__`, `__equals__` and friends;
//! the overload is tried before any built-in behaviour. Integer arithmetic is
//! checked and raises `OverflowError` instead of wrapping.

use std::cmp::Ordering;

use smallvec::smallvec;

use super::Vm;
use crate::{
    bytecode::op::{BinaryOp, UnaryOp},
    exception_private::{ExcType, RunError, RunResult},
    types::ArgValues,
    value::Value,
};

impl Vm {
    pub(super) fn binary_op(&mut self, op: BinaryOp, left: Value, right: Value) -> RunResult<Value> {
        if let Some(name) = op.overload_name()
            && let Some(result) = self.call_instance_method(&left, name, smallvec![right.clone()])?
        {
            return Ok(result);
        }
        match op {
            BinaryOp::Equals => Ok(Value::Bool(left.checked_equals(&right)?)),
            BinaryOp::NotEquals => Ok(Value::Bool(!left.checked_equals(&right)?)),
            BinaryOp::BoolAnd => Ok(if left.is_truthy() { right } else { left }),
            BinaryOp::BoolOr => Ok(if left.is_truthy() { left } else { right }),
            BinaryOp::LessThan | BinaryOp::GreaterThan | BinaryOp::LessThanOrEqu | BinaryOp::GreaterThanOrEqu => {
                let ordering = compare(op, &left, &right)?;
                Ok(Value::Bool(match op {
                    BinaryOp::LessThan => ordering == Ordering::Less,
                    BinaryOp::GreaterThan => ordering == Ordering::Greater,
                    BinaryOp::LessThanOrEqu => ordering != Ordering::Greater,
                    _ => ordering != Ordering::Less,
                }))
            }
            _ => arithmetic(op, &left, &right),
        }
    }

    pub(super) fn unary_op(&mut self, op: UnaryOp, operand: Value) -> RunResult<Value> {
        if let Some(result) = self.call_instance_method(&operand, op.overload_name(), ArgValues::new())? {
            return Ok(result);
        }
        match (op, &operand) {
            (UnaryOp::BoolNot, value) => Ok(Value::Bool(!value.is_truthy())),
            (UnaryOp::Negate, Value::Int(i)) => i.checked_neg().map(Value::Int).ok_or_else(overflow),
            (UnaryOp::Negate, Value::Float(f)) => Ok(Value::Float(-f)),
            (UnaryOp::Not, Value::Int(i)) => Ok(Value::Int(!i)),
            (op, value) => Err(RunError::type_error(format!(
                "bad operand type for unary {}: '{}'",
                op.symbol(),
                value.type_name()
            ))),
        }
    }
}

fn arithmetic(op: BinaryOp, left: &Value, right: &Value) -> RunResult<Value> {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => int_arithmetic(op, *a, *b),
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
            match float_arithmetic(op, as_float(left), as_float(right)) {
                Some(result) => Ok(Value::Float(result)),
                None => Err(unsupported(op, left, right)),
            }
        }
        (Value::Bool(a), Value::Bool(b)) => match op {
            BinaryOp::And => Ok(Value::Bool(a & b)),
            BinaryOp::Or => Ok(Value::Bool(a | b)),
            BinaryOp::Xor => Ok(Value::Bool(a ^ b)),
            _ => Err(unsupported(op, left, right)),
        },
        (Value::Str(a), Value::Str(b)) if op == BinaryOp::Add => Ok(Value::from(format!("{a}{b}"))),
        (Value::Str(s), Value::Int(n)) if op == BinaryOp::Mul => repeat_str(s, *n),
        (Value::List(a), Value::List(b)) if op == BinaryOp::Add => {
            let mut items = a.borrow().clone();
            items.extend(b.borrow().iter().cloned());
            Ok(Value::new_list(items))
        }
        (Value::Tuple(a), Value::Tuple(b)) if op == BinaryOp::Add => {
            Ok(Value::new_tuple(a.iter().chain(b.iter()).cloned().collect()))
        }
        _ => Err(unsupported(op, left, right)),
    }
}

/// Longest string, in bytes, that `Str * Int` may build.
const MAX_REPEAT_LEN: usize = 1 << 28;

/// `s * n`; a negative count gives the empty string.
fn repeat_str(s: &str, count: i64) -> RunResult<Value> {
    let count = usize::try_from(count).unwrap_or(0);
    match s.len().checked_mul(count) {
        Some(len) if len <= MAX_REPEAT_LEN => Ok(Value::from(s.repeat(count))),
        _ => Err(RunError::new(ExcType::OverflowError, "repeated string is too long")),
    }
}

fn int_arithmetic(op: BinaryOp, a: i64, b: i64) -> RunResult<Value> {
    let result = match op {
        BinaryOp::Add => a.checked_add(b),
        BinaryOp::Sub => a.checked_sub(b),
        BinaryOp::Mul => a.checked_mul(b),
        BinaryOp::Div => {
            if b == 0 {
                return Err(zero_division("division"));
            }
            a.checked_div(b)
        }
        BinaryOp::Mod => {
            if b == 0 {
                return Err(zero_division("modulo"));
            }
            a.checked_rem(b)
        }
        BinaryOp::LeftShift | BinaryOp::RightShift => {
            let Ok(shift) = u32::try_from(b) else {
                return Err(RunError::new(ExcType::ValueError, "negative shift count"));
            };
            if op == BinaryOp::LeftShift {
                a.checked_shl(shift)
            } else {
                // shifting right by 64 or more leaves only the sign
                Some(a.checked_shr(shift).unwrap_or(if a < 0 { -1 } else { 0 }))
            }
        }
        BinaryOp::And => Some(a & b),
        BinaryOp::Or => Some(a | b),
        BinaryOp::Xor => Some(a ^ b),
        _ => return Err(unsupported(op, &Value::Int(a), &Value::Int(b))),
    };
    result.map(Value::Int).ok_or_else(overflow)
}

/// IEEE semantics: division by zero gives an infinity or NaN.
fn float_arithmetic(op: BinaryOp, a: f64, b: f64) -> Option<f64> {
    Some(match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => a / b,
        BinaryOp::Mod => a % b,
        _ => return None,
    })
}

fn compare(op: BinaryOp, left: &Value, right: &Value) -> RunResult<Ordering> {
    let ordering = match (left, right) {
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
            as_float(left).partial_cmp(&as_float(right))
        }
        (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
        _ => return Err(unsupported(op, left, right)),
    };
    // NaN compares false both ways; Equal keeps `<=` and `>=` true, so pick an
    // ordering that makes the requested comparison fail
    Ok(ordering.unwrap_or(match op {
        BinaryOp::LessThan | BinaryOp::LessThanOrEqu => Ordering::Greater,
        _ => Ordering::Less,
    }))
}

fn as_float(value: &Value) -> f64 {
    match value {
        Value::Int(i) => *i as f64,
        Value::Float(f) => *f,
        _ => f64::NAN,
    }
}

fn unsupported(op: BinaryOp, left: &Value, right: &Value) -> RunError {
    RunError::type_error(format!(
        "unsupported operand types for {}: '{}' and '{}'",
        op.symbol(),
        left.type_name(),
        right.type_name()
    ))
}

fn overflow() -> RunError {
    RunError::new(ExcType::OverflowError, "integer overflow")
}

fn zero_division(what: &str) -> RunError {
    RunError::new(ExcType::ZeroDivisionError, format!("integer {what} by zero"))
}
