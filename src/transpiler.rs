use std::sync::Arc;

use crate::{
    cache::{CacheError, CacheStats, UnitCache},
    codegen::CodeGen,
    context::Context,
    lexer::Lexer,
    parser::{DEFAULT_MAX_DEPTH, Parser},
    runner::{QueryError, Runner},
    unit::{UnitRef, form_depth_limit},
    value::Value,
};

/// Runner that compiles each query once into a unit and reuses it.
///
/// # Examples
///
/// ```
/// use sandquery::{Context, Runner, TranspiledRunner, UnitCache, Value};
///
/// let runner = TranspiledRunner::new(UnitCache::in_memory());
/// let context = Context::new().with_variable("name", "Ada");
/// assert_eq!(
///     runner.run("name ?? 'anonymous'", &context).unwrap(),
///     Value::from("Ada")
/// );
/// assert_eq!(runner.stats().generated, 1);
/// ```
pub struct TranspiledRunner {
    cache: Arc<UnitCache>,
    max_depth: usize,
}

impl TranspiledRunner {
    pub fn new(cache: UnitCache) -> Self {
        Self::with_shared_cache(Arc::new(cache))
    }

    /// Runner over a cache that other runners may share.
    pub fn with_shared_cache(cache: Arc<UnitCache>) -> Self {
        TranspiledRunner {
            cache,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Compile and register a query without running it.
    pub fn warm(&self, query: &str) -> Result<UnitRef, QueryError> {
        let max_form_depth = form_depth_limit(self.max_depth);
        self.cache.get_or_generate(query, max_form_depth, || {
            let expr = Parser::with_max_depth(Lexer::new(query), self.max_depth)?.parse()?;
            Ok(CodeGen::generate(&expr))
        })
    }

    /// Drop all units, in memory and on disk.
    pub fn clear(&self) -> Result<usize, CacheError> {
        self.cache.clear()
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn cache(&self) -> &UnitCache {
        &self.cache
    }
}

impl Runner for TranspiledRunner {
    fn run(&self, query: &str, ctx: &Context) -> Result<Value, QueryError> {
        let unit = self.warm(query)?;
        Ok(unit.call(ctx)?)
    }
}
