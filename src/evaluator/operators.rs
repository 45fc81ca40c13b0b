use crate::ast::{BinaryOp, UnaryOp};
use crate::value::{strict_equals, to_int64, Comparer, Value};
use std::cmp::Ordering;

/// Applies a non-logical binary operator to two dereferenced operands.
/// `Err` carries the message of the runtime error to raise.
pub fn binary(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, String> {
    let value = match op {
        BinaryOp::Plus => plus(left, right),
        BinaryOp::Minus => Value::number(left.to_number() - right.to_number()),
        BinaryOp::Mult => Value::number(left.to_number() * right.to_number()),
        BinaryOp::Divide => Value::number(left.to_number() / right.to_number()),
        BinaryOp::Modulo => {
            let (l, r) = (left.to_number(), right.to_number());
            if r == 0.0 || l.is_infinite() {
                Value::NAN
            } else {
                Value::number(l % r)
            }
        }
        BinaryOp::BitAnd => Value::number((left.to_int64() & right.to_int64()) as f64),
        BinaryOp::BitOr => Value::number((left.to_int64() | right.to_int64()) as f64),
        BinaryOp::BitXor => Value::number((left.to_int64() ^ right.to_int64()) as f64),
        BinaryOp::LeftShift | BinaryOp::RightShift | BinaryOp::UnsignedRightShift => {
            shift(op, left, right)
        }
        BinaryOp::Equal => Value::Boolean(Comparer::new(left, right).are_equal()),
        BinaryOp::Different => Value::Boolean(!Comparer::new(left, right).are_equal()),
        BinaryOp::StrictEqual => Value::Boolean(strict_equals(left, right)),
        BinaryOp::StrictDifferent => Value::Boolean(!strict_equals(left, right)),
        BinaryOp::Less => compare(left, right, |o| o == Ordering::Less),
        BinaryOp::Greater => compare(left, right, |o| o == Ordering::Greater),
        BinaryOp::LessOrEqual => compare(left, right, |o| o != Ordering::Greater),
        BinaryOp::GreaterOrEqual => compare(left, right, |o| o != Ordering::Less),
        BinaryOp::InstanceOf | BinaryOp::And | BinaryOp::Or => {
            return Err(format!("Unsupported operator: {}", op.symbol()))
        }
    };
    Ok(value)
}

fn plus(left: &Value, right: &Value) -> Value {
    let l = left.to_primitive();
    let r = right.to_primitive();
    if matches!(l, Value::String(_)) || matches!(r, Value::String(_)) {
        let mut s = l.to_js_string();
        s.push_str(&r.to_js_string());
        Value::from(s)
    } else {
        Value::number(l.to_number() + r.to_number())
    }
}

fn compare(left: &Value, right: &Value, test: impl Fn(Ordering) -> bool) -> Value {
    Value::Boolean(Comparer::new(left, right).compare().map_or(false, test))
}

fn shift(op: BinaryOp, left: &Value, right: &Value) -> Value {
    let l = left.to_int64();
    if l == 0 {
        return Value::ZERO;
    }
    let r = right.to_number();
    if r.is_nan() || r > 64.0 {
        return Value::number(l as f64);
    }
    if r < 0.0 {
        return Value::ZERO;
    }
    let count = to_int64(r) as u32;
    let shifted = match op {
        BinaryOp::LeftShift => l.checked_shl(count).unwrap_or(0) as f64,
        BinaryOp::RightShift => l
            .checked_shr(count)
            .unwrap_or(if l < 0 { -1 } else { 0 }) as f64,
        _ => (l as u64).checked_shr(count).unwrap_or(0) as f64,
    };
    Value::number(shifted)
}

/// Applies a unary operator to a dereferenced operand.
pub fn unary(op: UnaryOp, operand: &Value) -> Result<Value, String> {
    let value = match op {
        UnaryOp::Minus => Value::number(-operand.to_primitive().to_number()),
        UnaryOp::Plus => Value::number(operand.to_primitive().to_number()),
        UnaryOp::Not => Value::Boolean(!operand.to_boolean()),
        UnaryOp::BitNot => Value::number(!operand.to_int64() as f64),
        UnaryOp::TypeOf => Value::from(operand.type_name()),
        UnaryOp::Void => Value::Undefined,
        UnaryOp::Delete | UnaryOp::New => {
            return Err(format!("Unsupported operator: {}", op.symbol().trim_end()))
        }
    };
    Ok(value)
}
