//! Tree-walking evaluator. The only inputs are the expression and the file's
//! attribute set.

use std::cmp::Ordering;

use crate::attributes::FileAttributes;

use super::ast::{ArithOp, CompareOp, Expr, Method};
use super::{ExprError, Value};

pub fn evaluate(expr: &Expr, attrs: &FileAttributes) -> Result<Value, ExprError> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Attr(attribute) => Ok(attrs.value(*attribute)),
        Expr::List(items) => items
            .iter()
            .map(|item| evaluate(item, attrs))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::List),
        Expr::Neg(inner) => {
            let value = evaluate(inner, attrs)?;
            value
                .as_number()
                .map(|n| Value::Number(-n))
                .ok_or_else(|| ExprError::Type(format!("cannot negate {}", value.type_name())))
        }
        Expr::Not(inner) => Ok(Value::Bool(!evaluate(inner, attrs)?.truthy())),
        Expr::And(left, right) => {
            let left = evaluate(left, attrs)?;
            if left.truthy() {
                evaluate(right, attrs)
            } else {
                Ok(left)
            }
        }
        Expr::Or(left, right) => {
            let left = evaluate(left, attrs)?;
            if left.truthy() {
                Ok(left)
            } else {
                evaluate(right, attrs)
            }
        }
        Expr::Arith(op, left, right) => {
            let left = evaluate(left, attrs)?;
            let right = evaluate(right, attrs)?;
            arithmetic(*op, &left, &right)
        }
        Expr::Compare(first, chain) => {
            let mut left = evaluate(first, attrs)?;
            for (op, next) in chain {
                let right = evaluate(next, attrs)?;
                if !compare(*op, &left, &right)? {
                    return Ok(Value::Bool(false));
                }
                left = right;
            }
            Ok(Value::Bool(true))
        }
        Expr::Method {
            receiver,
            method,
            args,
        } => {
            let receiver = evaluate(receiver, attrs)?;
            let args = args
                .iter()
                .map(|arg| evaluate(arg, attrs))
                .collect::<Result<Vec<_>, _>>()?;
            call_method(*method, &receiver, &args)
        }
    }
}

fn arithmetic(op: ArithOp, left: &Value, right: &Value) -> Result<Value, ExprError> {
    if let (ArithOp::Add, Value::Str(a), Value::Str(b)) = (op, left, right) {
        return Ok(Value::Str(format!("{}{}", a, b)));
    }

    let (a, b) = match (left.as_number(), right.as_number()) {
        (Some(a), Some(b)) => (a, b),
        _ => {
            return Err(ExprError::Type(format!(
                "unsupported operand types for {:?}: {} and {}",
                op,
                left.type_name(),
                right.type_name()
            )))
        }
    };

    let needs_divisor = matches!(op, ArithOp::Div | ArithOp::FloorDiv | ArithOp::Mod);
    if needs_divisor && b == 0.0 {
        return Err(ExprError::DivisionByZero);
    }

    let result = match op {
        ArithOp::Add => a + b,
        ArithOp::Sub => a - b,
        ArithOp::Mul => a * b,
        ArithOp::Div => a / b,
        ArithOp::FloorDiv => (a / b).floor(),
        // Result takes the sign of the divisor.
        ArithOp::Mod => a - b * (a / b).floor(),
    };
    Ok(Value::Number(result))
}

fn compare(op: CompareOp, left: &Value, right: &Value) -> Result<bool, ExprError> {
    let ordered = |accept: fn(Ordering) -> bool| -> Result<bool, ExprError> {
        Ok(left.try_cmp(right)?.is_some_and(accept))
    };

    match op {
        CompareOp::Eq => Ok(left.loose_eq(right)),
        CompareOp::Ne => Ok(!left.loose_eq(right)),
        CompareOp::Lt => ordered(|o| o == Ordering::Less),
        CompareOp::Le => ordered(|o| o != Ordering::Greater),
        CompareOp::Gt => ordered(|o| o == Ordering::Greater),
        CompareOp::Ge => ordered(|o| o != Ordering::Less),
        CompareOp::In => left.is_in(right),
        CompareOp::NotIn => Ok(!left.is_in(right)?),
    }
}

fn call_method(method: Method, receiver: &Value, args: &[Value]) -> Result<Value, ExprError> {
    let text = receiver.as_str().ok_or_else(|| {
        ExprError::Type(format!(
            "{:?} is a string method, called on {}",
            method,
            receiver.type_name()
        ))
    })?;

    match method {
        Method::Lower => Ok(Value::Str(text.to_lowercase())),
        Method::Upper => Ok(Value::Str(text.to_uppercase())),
        Method::StartsWith | Method::EndsWith => {
            let test = |affix: &str| match method {
                Method::StartsWith => text.starts_with(affix),
                _ => text.ends_with(affix),
            };
            // A list argument matches if any of its strings does.
            match args.first() {
                Some(Value::Str(affix)) => Ok(Value::Bool(test(affix))),
                Some(Value::List(items)) => {
                    let mut matched = false;
                    for item in items {
                        let affix = item.as_str().ok_or_else(|| {
                            ExprError::Type(format!("expected string, got {}", item.type_name()))
                        })?;
                        matched |= test(affix);
                    }
                    Ok(Value::Bool(matched))
                }
                Some(other) => Err(ExprError::Type(format!(
                    "expected string, got {}",
                    other.type_name()
                ))),
                None => Err(ExprError::Type(format!("{:?} needs an argument", method))),
            }
        }
    }
}
