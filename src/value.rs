use std::{collections::HashMap, fmt, sync::Arc};

use crate::evaluator::EvalError;

/// An opaque domain object supplied by the host application.
///
/// Expressions reach host objects only through this trait: `member` for
/// `obj.name` and `call` for `obj.name(args)`. Returning `Ok(None)` means the
/// object has no such member, which the runners report as
/// [`EvalError::UndefinedMember`].
pub trait HostObject: Send + Sync {
    /// Type name used by allow-lists and error messages.
    fn type_name(&self) -> &str;

    /// Resolves `obj.name`. Falls back to a zero-argument method call.
    fn member(&self, name: &str) -> Result<Option<Value>, EvalError> {
        self.call(name, &[])
    }

    /// Resolves `obj.name(args)`.
    fn call(&self, method: &str, args: &[Value]) -> Result<Option<Value>, EvalError>;

    /// Address that `==` compares. Proxies return the identity of the
    /// object they wrap.
    fn identity(&self) -> *const () {
        (self as *const Self).cast::<()>()
    }
}

pub type HostRef = Arc<dyn HostObject>;

/// A value flowing through query evaluation.
///
/// Plain data mirrors JSON, keeping integers and floats apart; host objects
/// are shared by reference.
///
/// # Examples
///
/// ```
/// use sandquery::Value;
/// use std::collections::HashMap;
///
/// let title = Value::String("Home".to_string());
///
/// let mut obj = HashMap::new();
/// obj.insert("title".to_string(), title);
/// let page = Value::Object(obj);
/// assert!(page.is_truthy());
/// ```
#[derive(Clone)]
pub enum Value {
    /// null
    Null,

    /// true/false
    Boolean(bool),

    /// Integer number (preserved separately from floats)
    Integer(i64),

    /// Floating-point number
    Float(f64),

    /// UTF-8 string
    String(String),

    /// Array of values
    Array(Vec<Value>),

    /// Plain key/value data
    Object(HashMap<String, Value>),

    /// Domain object owned by the host
    Host(HostRef),
}

impl Value {
    pub fn host(object: impl HostObject + 'static) -> Self {
        Value::Host(Arc::new(object))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Check if the value is truthy (for conditions)
    pub fn is_truthy(&self) -> bool {
        use Value::*;
        match self {
            Null => false,
            Boolean(b) => *b,
            Integer(n) => *n != 0,
            Float(n) => *n != 0.0,
            String(s) => !s.is_empty(),
            Array(arr) => !arr.is_empty(),
            Object(obj) => !obj.is_empty(),
            Host(_) => true,
        }
    }

    /// Get as float
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Integer(n) => Some(*n as f64),
            Value::Float(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns a human-readable type name
    pub fn type_name(&self) -> &str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Host(host) => host.type_name(),
        }
    }

    /// Get as string (concatenation, joins)
    pub fn as_string(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            Value::Float(n) => n.to_string(),
            Value::Integer(n) => n.to_string(),
            Value::Boolean(b) => b.to_string(),
            Value::Null => String::new(),
            other => other.to_json().to_string(),
        }
    }
}

/// Host objects are equal only when they are the same object, seen through
/// any proxy.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        use Value::*;
        match (self, other) {
            (Null, Null) => true,
            (Boolean(a), Boolean(b)) => a == b,
            (Integer(a), Integer(b)) => a == b,
            (Float(a), Float(b)) => a == b,
            (String(a), String(b)) => a == b,
            (Array(a), Array(b)) => a == b,
            (Object(a), Object(b)) => a == b,
            (Host(a), Host(b)) => a.identity() == b.identity(),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "Null"),
            Value::Boolean(b) => write!(f, "Boolean({b})"),
            Value::Integer(n) => write!(f, "Integer({n})"),
            Value::Float(n) => write!(f, "Float({n:?})"),
            Value::String(s) => write!(f, "String({s:?})"),
            Value::Array(arr) => f.debug_tuple("Array").field(arr).finish(),
            Value::Object(obj) => f.debug_tuple("Object").field(obj).finish(),
            Value::Host(host) => write!(f, "Host({})", host.type_name()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::Array(items.into_iter().map(Into::into).collect())
    }
}
