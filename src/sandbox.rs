//! Security gates consulted by every runner.
//!
//! Two independent checks guard an expression:
//!
//! - **Function whitelist** ([`Functions`]): a global function call only runs
//!   when the host registered it for this evaluation.
//! - **Interceptor** ([`Interceptor`]): every value produced by a variable
//!   lookup, member/method/index resolution or function call passes through
//!   the host's interceptor before anything else can touch it. [`AllowList`]
//!   wraps host objects so only declared members stay reachable.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use crate::{
    evaluator::EvalError,
    value::{HostObject, HostRef, Value},
};

/// A host-provided global function.
pub type HostFn = Arc<dyn Fn(&[Value]) -> Result<Value, EvalError> + Send + Sync>;

/// Whitelist of callable global functions.
#[derive(Clone, Default)]
pub struct Functions {
    allowed: HashMap<String, HostFn>,
}

impl Functions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<F>(&mut self, name: impl Into<String>, function: F)
    where
        F: Fn(&[Value]) -> Result<Value, EvalError> + Send + Sync + 'static,
    {
        self.allowed.insert(name.into(), Arc::new(function));
    }

    pub fn with<F>(mut self, name: impl Into<String>, function: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, EvalError> + Send + Sync + 'static,
    {
        self.insert(name, function);
        self
    }

    pub fn get(&self, name: &str) -> Option<&HostFn> {
        self.allowed.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.allowed.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.allowed.keys().map(String::as_str)
    }
}

/// Hook applied to every resolved value.
pub trait Interceptor: Send + Sync {
    fn intercept(&self, value: Value) -> Result<Value, EvalError>;
}

impl<F> Interceptor for F
where
    F: Fn(Value) -> Result<Value, EvalError> + Send + Sync,
{
    fn intercept(&self, value: Value) -> Result<Value, EvalError> {
        self(value)
    }
}

/// Identity interceptor: no sandboxing.
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl Interceptor for Passthrough {
    fn intercept(&self, value: Value) -> Result<Value, EvalError> {
        Ok(value)
    }
}

/// Restricts host objects to declared members, keyed by type name.
///
/// # Examples
///
/// ```
/// use sandquery::sandbox::AllowList;
///
/// let sandbox = AllowList::new()
///     .allow("Page", ["title", "children", "url"])
///     .allow("User", ["name"]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct AllowList {
    rules: HashMap<String, Arc<HashSet<String>>>,
    deny_unlisted: bool,
}

impl AllowList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allow<I, S>(mut self, type_name: impl Into<String>, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let members = members.into_iter().map(Into::into).collect();
        self.rules.insert(type_name.into(), Arc::new(members));
        self
    }

    /// Reject host objects whose type has no rule at all.
    pub fn deny_unlisted(mut self) -> Self {
        self.deny_unlisted = true;
        self
    }
}

impl Interceptor for AllowList {
    fn intercept(&self, value: Value) -> Result<Value, EvalError> {
        let Value::Host(object) = value else {
            return Ok(value);
        };
        match self.rules.get(object.type_name()) {
            Some(allowed) => Ok(Value::host(Guarded {
                inner: object,
                allowed: Arc::clone(allowed),
            })),
            None if self.deny_unlisted => Err(EvalError::MemberNotAllowed {
                type_name: object.type_name().to_string(),
                member: "*".to_string(),
            }),
            None => Ok(Value::Host(object)),
        }
    }
}

/// Proxy exposing only the allowed members of the wrapped object.
struct Guarded {
    inner: HostRef,
    allowed: Arc<HashSet<String>>,
}

impl Guarded {
    fn check(&self, member: &str) -> Result<(), EvalError> {
        if self.allowed.contains(member) {
            Ok(())
        } else {
            Err(EvalError::MemberNotAllowed {
                type_name: self.inner.type_name().to_string(),
                member: member.to_string(),
            })
        }
    }
}

impl HostObject for Guarded {
    fn type_name(&self) -> &str {
        self.inner.type_name()
    }

    fn member(&self, name: &str) -> Result<Option<Value>, EvalError> {
        self.check(name)?;
        self.inner.member(name)
    }

    fn call(&self, method: &str, args: &[Value]) -> Result<Option<Value>, EvalError> {
        self.check(method)?;
        self.inner.call(method, args)
    }

    fn identity(&self) -> *const () {
        self.inner.identity()
    }
}
