//! # sandquery - Abstract Syntax Tree
//!
//! This module defines the tokens and the Abstract Syntax Tree for the query
//! language: small, side-effect free expressions that read live data from a
//! host-supplied context.
//!
//! ## Architecture Overview
//!
//! - **[tokens]** - Lexical tokens produced by the lexer
//! - **[expressions]** - Expression nodes (literals, access chains, operations)
//! - **[operators]** - Binary, logical and unary operators
//! - **[visitor]** - The visitor trait every execution backend implements
//!
//! ## Quick Start
//!
//! ```text
//! page.children.filterBy('status', 'listed').first?.title ?? 'none'
//! ```
//!
//! Reads the `page` variable, calls `children` and `filterBy` on it, takes
//! the first entry and its title, falling back to `'none'`.
//!
//! ## Core Concepts
//!
//! ### Access Chains
//!
//! Member access (`.name`), method calls (`.name(args)`) and index access
//! (`[expr]`) chain left to right. A nullsafe step (`?.`) whose receiver is
//! `null` turns the whole remaining chain into `null`:
//!
//! ```text
//! page.parent?.parent.title   // null when page has no parent
//! ```
//!
//! ### Defaults
//!
//! ```text
//! page.subtitle ?? page.title   // right side only runs when left is null
//! page.subtitle ?: page.title   // right side runs when left is falsy
//! ```
//!
//! ### Sandboxing
//!
//! Global functions must be whitelisted by the host, and every resolved value
//! passes through the host's interceptor, which can hide members of domain
//! objects. See [`crate::sandbox`].
pub mod expressions;
pub mod operators;
pub mod tokens;
pub mod visitor;

pub use expressions::{Expr, Literal};
pub use operators::{BinOp, LogicalOp, UnaryOp};
pub use tokens::{Token, TokenKind};
pub use visitor::Visitor;
