use std::{collections::HashMap, sync::Arc};

use crate::{
    evaluator::EvalError,
    sandbox::{Functions, Interceptor, Passthrough},
    value::Value,
};

/// Everything the host lends to one evaluation: variables, the function
/// whitelist and the interceptor.
///
/// # Examples
///
/// ```
/// use sandquery::{Context, Value};
///
/// let context = Context::new()
///     .with_variable("title", "Home")
///     .with_function("upper", |args: &[Value]| {
///         Ok(Value::String(args[0].as_string().to_uppercase()))
///     });
/// assert!(context.variable("title").is_some());
/// ```
#[derive(Clone)]
pub struct Context {
    variables: HashMap<String, Value>,
    functions: Functions,
    interceptor: Arc<dyn Interceptor>,
}

impl Default for Context {
    fn default() -> Self {
        Context {
            variables: HashMap::new(),
            functions: Functions::new(),
            interceptor: Arc::new(Passthrough),
        }
    }
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    pub fn with_variables(mut self, variables: HashMap<String, Value>) -> Self {
        self.variables.extend(variables);
        self
    }

    pub fn with_function<F>(mut self, name: impl Into<String>, function: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, EvalError> + Send + Sync + 'static,
    {
        self.functions.insert(name, function);
        self
    }

    pub fn with_functions(mut self, functions: Functions) -> Self {
        self.functions = functions;
        self
    }

    pub fn with_interceptor(mut self, interceptor: impl Interceptor + 'static) -> Self {
        self.interceptor = Arc::new(interceptor);
        self
    }

    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    pub fn functions(&self) -> &Functions {
        &self.functions
    }

    pub fn interceptor(&self) -> &dyn Interceptor {
        self.interceptor.as_ref()
    }
}
