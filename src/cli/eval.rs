//! Evaluate a query against a JSON context

use std::path::PathBuf;

use super::{CliError, context_from_json};
use crate::{
    Backend, Context, Engine, EngineOptions, QueryError, lexer::Lexer, parser::Parser,
};

/// Options for the eval command
#[derive(Debug, Clone, Default)]
pub struct EvalOptions {
    /// The query to evaluate
    pub query: String,
    /// JSON object whose keys become variables
    pub context: Option<String>,
    pub backend: Backend,
    /// Unit cache directory for the transpiled backend
    pub cache_dir: Option<PathBuf>,
    /// Only validate syntax, don't evaluate
    pub syntax_only: bool,
}

/// Result of an eval operation
#[derive(Debug)]
pub enum EvalOutcome {
    /// Syntax validation passed
    SyntaxValid,
    /// Query evaluated successfully
    Success(serde_json::Value),
}

/// Execute an eval operation
pub fn execute_eval(options: &EvalOptions) -> Result<EvalOutcome, CliError> {
    if options.cache_dir.is_some() && matches!(options.backend, Backend::Interpreted) {
        return Err(CliError::CacheDirWithoutTranspiler);
    }

    if options.syntax_only {
        Parser::new(Lexer::new(&options.query))
            .and_then(|mut parser| parser.parse())
            .map_err(QueryError::from)?;
        return Ok(EvalOutcome::SyntaxValid);
    }

    let context = match &options.context {
        Some(json) => context_from_json(json)?,
        None => Context::new(),
    };

    let engine = Engine::new(EngineOptions {
        backend: options.backend,
        cache_dir: options.cache_dir.clone(),
        ..EngineOptions::default()
    });
    let result = engine.evaluate(&options.query, &context)?;
    Ok(EvalOutcome::Success(result.to_json()))
}
