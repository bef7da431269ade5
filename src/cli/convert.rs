//! JSON context documents

use super::CliError;
use crate::{Context, Value};

/// Build an evaluation context from a JSON object: every top-level key becomes
/// a variable.
pub fn context_from_json(json: &str) -> Result<Context, CliError> {
    let document: serde_json::Value = serde_json::from_str(json)?;
    match Value::from_json(document) {
        Value::Object(variables) => Ok(Context::new().with_variables(variables)),
        other => Err(CliError::ContextNotObject(json_type(&other))),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Boolean(_) => "boolean",
        Value::Integer(_) | Value::Float(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) | Value::Host(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_keys_become_variables() {
        let ctx = context_from_json(r#"{"page": {"title": "Home"}, "n": 2}"#).unwrap();
        assert_eq!(ctx.variable("n"), Some(&Value::Integer(2)));
        assert!(ctx.variable("page").is_some());
    }

    #[test]
    fn rejects_non_objects() {
        assert!(matches!(
            context_from_json("[1, 2]"),
            Err(CliError::ContextNotObject("array"))
        ));
    }
}
