//! Runner abstraction and the engine facade.

use std::path::PathBuf;

use thiserror::Error;

use crate::{
    cache::{CacheError, UnitCache},
    context::Context,
    evaluator::{EvalError, Interpreter},
    lexer::LexError,
    parser::{DEFAULT_MAX_DEPTH, ParseError},
    transpiler::TranspiledRunner,
    value::Value,
};

/// Everything that can stop a query from producing a value.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("Tokenize error: {0}")]
    Tokenize(LexError),

    #[error("Parse error: {0}")]
    Parse(ParseError),

    #[error("Evaluation error: {0}")]
    Eval(#[from] EvalError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),
}

impl From<ParseError> for QueryError {
    fn from(e: ParseError) -> Self {
        match e {
            ParseError::Lex(e) => QueryError::Tokenize(e),
            other => QueryError::Parse(other),
        }
    }
}

impl From<LexError> for QueryError {
    fn from(e: LexError) -> Self {
        QueryError::Tokenize(e)
    }
}

/// Executes a query string against a context.
pub trait Runner: Send + Sync {
    fn run(&self, query: &str, ctx: &Context) -> Result<Value, QueryError>;
}

/// Execution strategy of an [`Engine`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum Backend {
    /// Walk the syntax tree on every call
    #[default]
    Interpreted,
    /// Compile once into a cached unit
    Transpiled,
}

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub backend: Backend,
    /// Durable unit storage for the transpiled backend; memory only when unset
    pub cache_dir: Option<PathBuf>,
    pub max_depth: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        EngineOptions {
            backend: Backend::default(),
            cache_dir: None,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// A configured runner.
///
/// # Examples
///
/// ```
/// use sandquery::{Backend, Context, Engine, EngineOptions, Value};
///
/// let engine = Engine::new(EngineOptions {
///     backend: Backend::Transpiled,
///     ..EngineOptions::default()
/// });
/// let context = Context::new().with_variable("price", 20i64);
/// assert_eq!(engine.evaluate("price * 2", &context).unwrap(), Value::Integer(40));
/// ```
pub struct Engine {
    backend: Backend,
    runner: Box<dyn Runner>,
}

impl Engine {
    pub fn new(options: EngineOptions) -> Self {
        let runner: Box<dyn Runner> = match options.backend {
            Backend::Interpreted => Box::new(Interpreter::with_max_depth(options.max_depth)),
            Backend::Transpiled => {
                let cache = match options.cache_dir {
                    Some(dir) => UnitCache::new(dir),
                    None => UnitCache::in_memory(),
                };
                Box::new(TranspiledRunner::new(cache).with_max_depth(options.max_depth))
            }
        };
        Engine {
            backend: options.backend,
            runner,
        }
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    pub fn evaluate(&self, query: &str, ctx: &Context) -> Result<Value, QueryError> {
        self.runner.run(query, ctx)
    }
}

impl Default for Engine {
    fn default() -> Self {
        Engine::new(EngineOptions::default())
    }
}

/// One-shot interpreted evaluation.
///
/// # Examples
///
/// ```
/// use sandquery::{evaluate, Context, Value};
///
/// let context = Context::new().with_variable("x", 0i64);
/// assert_eq!(evaluate("x ?: 'fallback'", &context).unwrap(), Value::from("fallback"));
/// ```
pub fn evaluate(query: &str, ctx: &Context) -> Result<Value, QueryError> {
    Interpreter::new().run(query, ctx)
}
