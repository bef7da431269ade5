//! CLI support for sandquery
//!
//! Provides programmatic access to the `sandquery` commands so other tools
//! can embed them.

mod compile;
mod convert;
mod eval;

pub use compile::{clear_cache, compile_unit};
pub use convert::context_from_json;
pub use eval::{EvalOptions, EvalOutcome, execute_eval};

use std::io;

use thiserror::Error;

use crate::{CacheError, QueryError};

/// Errors that can occur during CLI operations
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Query(#[from] QueryError),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    /// The context document must map variable names to values
    #[error("Context must be a JSON object, got {0}")]
    ContextNotObject(&'static str),

    #[error("--cache-dir only applies to the transpiled backend")]
    CacheDirWithoutTranspiler,
}
