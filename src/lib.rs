pub mod ast;
pub mod cache;
pub mod codegen;
pub mod context;
pub mod convert;
pub mod evaluator;
pub mod lexer;
pub mod methods;
pub mod parser;
pub mod runner;
pub mod runtime;
pub mod sandbox;
pub mod transpiler;
pub mod unit;
pub mod value;

#[cfg(feature = "cli")]
pub mod cli;

pub use ast::{BinOp, Expr, Literal, LogicalOp, Token, TokenKind, UnaryOp, Visitor};
pub use cache::{CacheError, CacheStats, UnitCache};
pub use codegen::{CodeGen, Generated};
pub use context::Context;
pub use evaluator::{EvalError, Interpreter};
pub use lexer::{LexError, Lexer, Tokens, tokenize};
pub use parser::{ParseError, Parser, parse};
pub use runner::{Backend, Engine, EngineOptions, QueryError, Runner, evaluate};
pub use sandbox::{AllowList, Functions, HostFn, Interceptor, Passthrough};
pub use transpiler::TranspiledRunner;
pub use unit::{CompiledUnit, LoadError};
pub use value::{HostObject, HostRef, Value};
