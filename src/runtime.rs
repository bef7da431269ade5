//! Operations shared by the interpreter and by loaded units.
//!
//! Member resolution, the function whitelist check, the interceptor hook and
//! operator semantics all live here, so both runners agree on every value and
//! every error.

use std::cmp::Ordering;

use rust_decimal::{
    Decimal,
    prelude::{FromPrimitive, ToPrimitive},
};

use crate::{
    ast::{BinOp, UnaryOp},
    context::Context,
    evaluator::EvalError,
    methods::call_builtin,
    sandbox::HostFn,
    value::Value,
};

/// Resolves a context variable and passes it through the interceptor.
pub fn lookup_variable(ctx: &Context, name: &str) -> Result<Value, EvalError> {
    let value = ctx
        .variable(name)
        .cloned()
        .ok_or_else(|| EvalError::UndefinedVariable(name.to_string()))?;
    ctx.interceptor().intercept(value)
}

/// `object.member`
pub fn get_member(ctx: &Context, object: &Value, member: &str) -> Result<Value, EvalError> {
    let value = match object {
        Value::Null => {
            return Err(EvalError::TypeMismatch(format!(
                "cannot read member '{member}' of null"
            )));
        }
        Value::Object(map) => map.get(member).cloned().unwrap_or(Value::Null),
        Value::Host(host) => host
            .member(member)?
            .ok_or_else(|| undefined_member(object, member))?,
        Value::Array(_) | Value::String(_) => {
            call_builtin(object, member, &[])?.ok_or_else(|| undefined_member(object, member))?
        }
        _ => return Err(undefined_member(object, member)),
    };
    ctx.interceptor().intercept(value)
}

/// `object.method(args)`
pub fn call_method(
    ctx: &Context,
    object: &Value,
    method: &str,
    args: &[Value],
) -> Result<Value, EvalError> {
    let value = match object {
        Value::Null => {
            return Err(EvalError::TypeMismatch(format!(
                "cannot call method '{method}' on null"
            )));
        }
        Value::Host(host) => host
            .call(method, args)?
            .ok_or_else(|| undefined_member(object, method))?,
        _ => call_builtin(object, method, args)?.ok_or_else(|| undefined_member(object, method))?,
    };
    ctx.interceptor().intercept(value)
}

/// `object[index]`
pub fn get_index(ctx: &Context, object: &Value, index: &Value) -> Result<Value, EvalError> {
    let value = match (object, index) {
        (Value::Object(map), Value::String(key)) => map.get(key).cloned().unwrap_or(Value::Null),
        (Value::Object(map), Value::Integer(_) | Value::Float(_)) => {
            map.get(&index.as_string()).cloned().unwrap_or(Value::Null)
        }
        (Value::Array(arr), Value::Integer(n)) => {
            let position = if *n < 0 {
                // -1 is the last element
                arr.len().checked_sub(n.unsigned_abs() as usize)
            } else {
                Some(*n as usize)
            };
            position
                .and_then(|i| arr.get(i))
                .cloned()
                .unwrap_or(Value::Null)
        }
        (Value::Host(host), Value::String(key)) => host
            .member(key)?
            .ok_or_else(|| undefined_member(object, key))?,
        (Value::Array(_), other) => {
            return Err(EvalError::TypeMismatch(format!(
                "array index must be integer, got {}",
                other.type_name()
            )));
        }
        (target, key) => {
            return Err(EvalError::TypeMismatch(format!(
                "cannot index {} with {}",
                target.type_name(),
                key.type_name()
            )));
        }
    };
    ctx.interceptor().intercept(value)
}

/// Whitelist gate for `name(args)`. Runs before any argument is evaluated.
pub fn allowed_function<'c>(ctx: &'c Context, name: &str) -> Result<&'c HostFn, EvalError> {
    ctx.functions()
        .get(name)
        .ok_or_else(|| EvalError::FunctionNotAllowed(name.to_string()))
}

/// Invokes a whitelisted function and intercepts its result.
pub fn call_function(ctx: &Context, function: &HostFn, args: &[Value]) -> Result<Value, EvalError> {
    let value = function(args)?;
    ctx.interceptor().intercept(value)
}

fn undefined_member(object: &Value, member: &str) -> EvalError {
    EvalError::UndefinedMember {
        type_name: object.type_name().to_string(),
        member: member.to_string(),
    }
}

pub fn apply_unary(op: UnaryOp, operand: &Value) -> Result<Value, EvalError> {
    match op {
        UnaryOp::Not => Ok(Value::Boolean(!operand.is_truthy())),
        UnaryOp::Negate => match operand {
            Value::Integer(n) => Ok(n
                .checked_neg()
                .map(Value::Integer)
                .unwrap_or(Value::Float(-(*n as f64)))),
            Value::Float(n) => Ok(Value::Float(-n)),
            other => Err(EvalError::TypeMismatch(format!(
                "cannot negate {}",
                other.type_name()
            ))),
        },
    }
}

pub fn apply_binop(op: BinOp, left: &Value, right: &Value) -> Result<Value, EvalError> {
    match op {
        BinOp::Add => match (left, right) {
            (Value::String(a), Value::String(b)) => Ok(Value::String(format!("{a}{b}"))),
            _ => arithmetic(op, left, right),
        },
        BinOp::Subtract | BinOp::Multiply | BinOp::Divide | BinOp::Modulo => {
            arithmetic(op, left, right)
        }
        BinOp::Equal => Ok(Value::Boolean(loose_equals(left, right))),
        BinOp::NotEqual => Ok(Value::Boolean(!loose_equals(left, right))),
        BinOp::Identical => Ok(Value::Boolean(left == right)),
        BinOp::NotIdentical => Ok(Value::Boolean(left != right)),
        BinOp::LessThan => {
            compare(op, left, right).map(|o| Value::Boolean(o == Some(Ordering::Less)))
        }
        BinOp::GreaterThan => {
            compare(op, left, right).map(|o| Value::Boolean(o == Some(Ordering::Greater)))
        }
        BinOp::LessEqual => compare(op, left, right)
            .map(|o| Value::Boolean(matches!(o, Some(Ordering::Less | Ordering::Equal)))),
        BinOp::GreaterEqual => compare(op, left, right)
            .map(|o| Value::Boolean(matches!(o, Some(Ordering::Greater | Ordering::Equal)))),
    }
}

/// `==`: integers and floats compare by value, everything else structurally.
fn loose_equals(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Integer(a), Value::Float(b)) | (Value::Float(b), Value::Integer(a)) => {
            *a as f64 == *b
        }
        _ => left == right,
    }
}

/// `None` when a NaN is involved, which makes every comparison false.
fn compare(op: BinOp, left: &Value, right: &Value) -> Result<Option<Ordering>, EvalError> {
    match (left, right) {
        (Value::Integer(a), Value::Integer(b)) => Ok(Some(a.cmp(b))),
        (Value::String(a), Value::String(b)) => Ok(Some(a.cmp(b))),
        (a, b) => match (a.as_float(), b.as_float()) {
            (Some(x), Some(y)) => Ok(x.partial_cmp(&y)),
            _ => Err(EvalError::TypeMismatch(format!(
                "cannot compare {} {} {} (comparison requires numbers or strings)",
                a.type_name(),
                op.symbol(),
                b.type_name()
            ))),
        },
    }
}

fn arithmetic(op: BinOp, left: &Value, right: &Value) -> Result<Value, EvalError> {
    match (left, right) {
        (Value::Integer(a), Value::Integer(b)) => integer_arithmetic(op, *a, *b),
        (Value::Float(a), Value::Float(b)) => float_arithmetic(op, *a, *b),
        (Value::Integer(a), Value::Float(b)) => {
            mixed_arithmetic(op, Decimal::from_i64(*a), Decimal::from_f64(*b), *a as f64, *b)
        }
        (Value::Float(a), Value::Integer(b)) => {
            mixed_arithmetic(op, Decimal::from_f64(*a), Decimal::from_i64(*b), *a, *b as f64)
        }
        (a, b) => Err(EvalError::TypeMismatch(format!(
            "cannot apply '{}' to {} and {}",
            op.symbol(),
            a.type_name(),
            b.type_name()
        ))),
    }
}

fn integer_arithmetic(op: BinOp, a: i64, b: i64) -> Result<Value, EvalError> {
    if matches!(op, BinOp::Divide | BinOp::Modulo) && b == 0 {
        return Err(EvalError::DivisionByZero);
    }
    let exact = match op {
        BinOp::Add => a.checked_add(b),
        BinOp::Subtract => a.checked_sub(b),
        BinOp::Multiply => a.checked_mul(b),
        BinOp::Divide => match a.checked_rem(b) {
            Some(0) => a.checked_div(b),
            _ => None,
        },
        BinOp::Modulo => a.checked_rem(b),
        _ => None,
    };
    match exact {
        Some(n) => Ok(Value::Integer(n)),
        // overflow or inexact division continues in floating point
        None => float_arithmetic(op, a as f64, b as f64),
    }
}

fn float_arithmetic(op: BinOp, a: f64, b: f64) -> Result<Value, EvalError> {
    let result = match op {
        BinOp::Add => a + b,
        BinOp::Subtract => a - b,
        BinOp::Multiply => a * b,
        BinOp::Divide | BinOp::Modulo if b == 0.0 => return Err(EvalError::DivisionByZero),
        BinOp::Divide => a / b,
        BinOp::Modulo => a % b,
        _ => return Err(not_arithmetic(op)),
    };
    Ok(Value::Float(result))
}

fn mixed_arithmetic(
    op: BinOp,
    a: Option<Decimal>,
    b: Option<Decimal>,
    af: f64,
    bf: f64,
) -> Result<Value, EvalError> {
    if matches!(op, BinOp::Divide | BinOp::Modulo) && bf == 0.0 {
        return Err(EvalError::DivisionByZero);
    }
    if let Some(ad) = a
        && let Some(bd) = b
    {
        let rd = match op {
            BinOp::Add => ad.checked_add(bd),
            BinOp::Subtract => ad.checked_sub(bd),
            BinOp::Multiply => ad.checked_mul(bd),
            BinOp::Divide => ad.checked_div(bd),
            BinOp::Modulo => ad.checked_rem(bd),
            _ => None,
        };
        if let Some(rd) = rd {
            if rd.is_integer()
                && let Some(r) = rd.to_i64()
            {
                return Ok(Value::Integer(r));
            } else if let Some(r) = rd.to_f64() {
                return Ok(Value::Float(r));
            }
        }
    }
    float_arithmetic(op, af, bf)
}

fn not_arithmetic(op: BinOp) -> EvalError {
    EvalError::TypeMismatch(format!("'{}' is not an arithmetic operator", op.symbol()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_division_stays_integer_when_exact() {
        assert_eq!(
            apply_binop(BinOp::Divide, &Value::Integer(10), &Value::Integer(2)).unwrap(),
            Value::Integer(5)
        );
        assert_eq!(
            apply_binop(BinOp::Divide, &Value::Integer(7), &Value::Integer(2)).unwrap(),
            Value::Float(3.5)
        );
    }

    #[test]
    fn mixed_arithmetic_avoids_float_drift() {
        assert_eq!(
            apply_binop(BinOp::Add, &Value::Integer(1), &Value::Float(0.5)).unwrap(),
            Value::Float(1.5)
        );
        assert_eq!(
            apply_binop(BinOp::Multiply, &Value::Float(0.5), &Value::Integer(4)).unwrap(),
            Value::Integer(2)
        );
    }

    #[test]
    fn overflow_promotes_to_float() {
        let result = apply_binop(BinOp::Add, &Value::Integer(i64::MAX), &Value::Integer(1)).unwrap();
        assert!(matches!(result, Value::Float(_)));
    }

    #[test]
    fn division_by_zero_is_an_error() {
        for (l, r) in [
            (Value::Integer(1), Value::Integer(0)),
            (Value::Float(1.0), Value::Float(0.0)),
            (Value::Integer(1), Value::Float(0.0)),
        ] {
            assert_eq!(
                apply_binop(BinOp::Modulo, &l, &r),
                Err(EvalError::DivisionByZero)
            );
        }
    }

    #[test]
    fn loose_and_strict_equality() {
        let one = Value::Integer(1);
        let one_f = Value::Float(1.0);
        assert_eq!(apply_binop(BinOp::Equal, &one, &one_f).unwrap(), Value::Boolean(true));
        assert_eq!(apply_binop(BinOp::Identical, &one, &one_f).unwrap(), Value::Boolean(false));
    }

    #[test]
    fn negative_index_counts_from_end() {
        let ctx = Context::new();
        let arr = Value::from(vec![1i64, 2, 3]);
        assert_eq!(get_index(&ctx, &arr, &Value::Integer(-1)).unwrap(), Value::Integer(3));
        assert_eq!(get_index(&ctx, &arr, &Value::Integer(-4)).unwrap(), Value::Null);
        assert_eq!(get_index(&ctx, &arr, &Value::Integer(3)).unwrap(), Value::Null);
    }
}
