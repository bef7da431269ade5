//! Inspect generated units and manage the unit cache

use std::path::Path;

use super::CliError;
use crate::{CodeGen, QueryError, UnitCache, lexer::Lexer, parser::Parser};

/// Generate the unit file for a query without running or caching it.
pub fn compile_unit(query: &str) -> Result<String, CliError> {
    let expr = Parser::new(Lexer::new(query))
        .and_then(|mut parser| parser.parse())
        .map_err(QueryError::from)?;
    let generated = CodeGen::generate(&expr);
    Ok(generated.to_unit_source(&UnitCache::key(query), query))
}

/// Delete every unit artifact under `dir`. Returns how many were removed.
pub fn clear_cache(dir: &Path) -> Result<usize, CliError> {
    Ok(UnitCache::new(dir).clear()?)
}
