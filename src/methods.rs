//! Built-in methods on plain values (arrays, strings, objects).
//!
//! Host objects answer their own methods; everything else dispatches here.
//! Arguments arrive already evaluated.

use std::cmp::Ordering;

use crate::{evaluator::EvalError, value::Value};

/// Dispatch a built-in method. `Ok(None)` means the receiver has no method of
/// that name.
pub fn call_builtin(
    object: &Value,
    method: &str,
    args: &[Value],
) -> Result<Option<Value>, EvalError> {
    let result = match (object, method) {
        // Any value
        (_, "type") => method_type(object),

        // Array methods
        (Value::Array(arr), "count" | "length") => Ok(Value::Integer(arr.len() as i64)),
        (Value::Array(arr), "first") => Ok(arr.first().cloned().unwrap_or(Value::Null)),
        (Value::Array(arr), "last") => Ok(arr.last().cloned().unwrap_or(Value::Null)),
        (Value::Array(arr), "sum") => method_sum(arr),
        (Value::Array(arr), "min") => Ok(extreme(arr, Ordering::Less)),
        (Value::Array(arr), "max") => Ok(extreme(arr, Ordering::Greater)),
        (Value::Array(arr), "avg") => Ok(method_avg(arr)),
        (Value::Array(arr), "unique") => Ok(method_unique(arr)),
        (Value::Array(arr), "sort") => {
            let mut sorted = arr.clone();
            sorted.sort_by(compare_values);
            Ok(Value::Array(sorted))
        }
        (Value::Array(arr), "sort_desc") => {
            let mut sorted = arr.clone();
            sorted.sort_by(|a, b| compare_values(b, a));
            Ok(Value::Array(sorted))
        }
        (Value::Array(arr), "reverse") => Ok(Value::Array(arr.iter().rev().cloned().collect())),
        (Value::Array(arr), "flatten") => Ok(method_flatten(arr)),
        (Value::Array(arr), "join") => method_join(arr, args),
        (Value::Array(arr), "contains") => {
            let needle = single_arg("contains", args)?;
            Ok(Value::Boolean(arr.contains(needle)))
        }

        // String methods
        (Value::String(s), "length") => Ok(Value::Integer(s.chars().count() as i64)),
        (Value::String(s), "upper") => Ok(Value::String(s.to_uppercase())),
        (Value::String(s), "lower") => Ok(Value::String(s.to_lowercase())),
        (Value::String(s), "trim") => Ok(Value::String(s.trim().to_string())),
        (Value::String(s), "split") => method_split(s, args),
        (Value::String(s), "contains") => {
            string_arg("contains", args).map(|sub| Value::Boolean(s.contains(sub)))
        }
        (Value::String(s), "startswith") => {
            string_arg("startswith", args).map(|p| Value::Boolean(s.starts_with(p)))
        }
        (Value::String(s), "endswith") => {
            string_arg("endswith", args).map(|p| Value::Boolean(s.ends_with(p)))
        }
        (Value::String(s), "matches") => method_matches(s, args),

        // Object methods
        (Value::Object(obj), "count") => Ok(Value::Integer(obj.len() as i64)),
        (Value::Object(obj), "keys") => {
            let mut keys: Vec<&String> = obj.keys().collect();
            keys.sort();
            Ok(Value::Array(
                keys.into_iter().map(|k| Value::String(k.clone())).collect(),
            ))
        }
        (Value::Object(obj), "values") => {
            let mut entries: Vec<(&String, &Value)> = obj.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            Ok(Value::Array(entries.into_iter().map(|(_, v)| v.clone()).collect()))
        }
        (Value::Object(obj), "has") => {
            string_arg("has", args).map(|key| Value::Boolean(obj.contains_key(key)))
        }

        _ => return Ok(None),
    };
    result.map(Some)
}

fn single_arg<'a>(method: &str, args: &'a [Value]) -> Result<&'a Value, EvalError> {
    match args {
        [arg] => Ok(arg),
        _ => Err(EvalError::TypeMismatch(format!(
            ".{}() requires exactly one argument, got {}",
            method,
            args.len()
        ))),
    }
}

fn string_arg<'a>(method: &str, args: &'a [Value]) -> Result<&'a str, EvalError> {
    let arg = single_arg(method, args)?;
    arg.as_str().ok_or_else(|| {
        EvalError::TypeMismatch(format!(
            ".{}() argument must be string, got {}",
            method,
            arg.type_name()
        ))
    })
}

/// .type() - returns the type name as a string
fn method_type(object: &Value) -> Result<Value, EvalError> {
    let type_name = match object {
        Value::Integer(_) | Value::Float(_) => "number",
        other => other.type_name(),
    };
    Ok(Value::String(type_name.to_string()))
}

/// .sum() - sums numeric values, staying integer until a float shows up
fn method_sum(arr: &[Value]) -> Result<Value, EvalError> {
    let mut sum_int: i64 = 0;
    let mut sum_float: f64 = 0.0;
    let mut has_float = false;

    for item in arr {
        match item {
            Value::Integer(n) if !has_float => match sum_int.checked_add(*n) {
                Some(total) => sum_int = total,
                None => {
                    sum_float = sum_int as f64 + *n as f64;
                    has_float = true;
                }
            },
            Value::Integer(n) => sum_float += *n as f64,
            Value::Float(n) => {
                if !has_float {
                    sum_float = sum_int as f64;
                    has_float = true;
                }
                sum_float += n;
            }
            other => {
                return Err(EvalError::TypeMismatch(format!(
                    ".sum() requires numeric values, got {}",
                    other.type_name()
                )));
            }
        }
    }

    if has_float {
        Ok(Value::Float(sum_float))
    } else {
        Ok(Value::Integer(sum_int))
    }
}

/// .min() / .max() - null for an empty array
fn extreme(arr: &[Value], wanted: Ordering) -> Value {
    let mut best: Option<&Value> = None;
    for item in arr {
        match best {
            None => best = Some(item),
            Some(current) if compare_values(item, current) == wanted => best = Some(item),
            _ => {}
        }
    }
    best.cloned().unwrap_or(Value::Null)
}

/// .avg() - average of the numeric entries, null when there are none
fn method_avg(arr: &[Value]) -> Value {
    let numbers: Vec<f64> = arr.iter().filter_map(Value::as_float).collect();
    if numbers.is_empty() {
        return Value::Null;
    }
    Value::Float(numbers.iter().sum::<f64>() / numbers.len() as f64)
}

/// .unique() - returns array with duplicates removed
fn method_unique(arr: &[Value]) -> Value {
    let mut result = Vec::new();
    for item in arr {
        if !result.contains(item) {
            result.push(item.clone());
        }
    }
    Value::Array(result)
}

/// .flatten() - flattens nested arrays one level
fn method_flatten(arr: &[Value]) -> Value {
    let mut result = Vec::new();
    for item in arr {
        match item {
            Value::Array(inner) => result.extend(inner.iter().cloned()),
            other => result.push(other.clone()),
        }
    }
    Value::Array(result)
}

/// .join(separator?) - concatenates entries, default separator ", "
fn method_join(arr: &[Value], args: &[Value]) -> Result<Value, EvalError> {
    let separator = if args.is_empty() {
        ", "
    } else {
        string_arg("join", args)?
    };
    let parts: Vec<String> = arr.iter().map(Value::as_string).collect();
    Ok(Value::String(parts.join(separator)))
}

/// .split(delimiter) - splits string into array
fn method_split(s: &str, args: &[Value]) -> Result<Value, EvalError> {
    let delimiter = string_arg("split", args)?;
    let parts: Vec<Value> = if delimiter.is_empty() {
        s.chars().map(|c| Value::String(c.to_string())).collect()
    } else {
        s.split(delimiter).map(|p| Value::String(p.to_string())).collect()
    };
    Ok(Value::Array(parts))
}

/// .matches(pattern) - returns true if string matches regex pattern
fn method_matches(s: &str, args: &[Value]) -> Result<Value, EvalError> {
    let pattern = string_arg("matches", args)?;
    let re = regex::Regex::new(pattern)
        .map_err(|e| EvalError::TypeMismatch(format!("invalid regex: {e}")))?;
    Ok(Value::Boolean(re.is_match(s)))
}

/// Compare two values for sorting
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Integer(a), Value::Integer(b)) => a.cmp(b),
        (Value::String(a), Value::String(b)) => a.cmp(b),
        (Value::Boolean(a), Value::Boolean(b)) => a.cmp(b),
        (a, b) => match (a.as_float(), b.as_float()) {
            (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
            _ => Ordering::Equal,
        },
    }
}
