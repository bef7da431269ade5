use std::sync::Arc;

use dashmap::DashMap;
use thiserror::Error;
use tracing::trace;

use crate::{
    ast::{BinOp, Expr, Literal, LogicalOp, UnaryOp, Visitor},
    context::Context,
    lexer::Lexer,
    parser::{DEFAULT_MAX_DEPTH, ParseError, Parser},
    runner::{QueryError, Runner},
    runtime,
    value::Value,
};

/// Errors that can occur during query evaluation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    /// Variable not present in the context
    #[error("Undefined variable: {0}")]
    UndefinedVariable(String),

    /// Global function missing from the whitelist
    #[error("Function not allowed: {0}()")]
    FunctionNotAllowed(String),

    /// Receiver has no member or method of that name
    #[error("Undefined member: {type_name}.{member}")]
    UndefinedMember { type_name: String, member: String },

    /// Member blocked by the sandbox
    #[error("Member not allowed: {type_name}.{member}")]
    MemberNotAllowed { type_name: String, member: String },

    /// Type mismatch or invalid operation for the given type
    #[error("Type error: {0}")]
    TypeMismatch(String),

    #[error("Division by zero")]
    DivisionByZero,

    /// Failure reported by a host function or host object
    #[error("Host error: {0}")]
    Host(String),
}

/// Tree-walking runner.
///
/// Parsed trees are kept per query string, so repeated evaluations of the
/// same query only walk the tree.
///
/// # Examples
///
/// ```
/// use sandquery::{Context, Interpreter, Runner, Value};
///
/// let interpreter = Interpreter::new();
/// let context = Context::new().with_variable("count", 3i64);
/// let result = interpreter.run("count > 2 ? 'many' : 'few'", &context).unwrap();
/// assert_eq!(result, Value::from("many"));
/// ```
pub struct Interpreter {
    max_depth: usize,
    trees: DashMap<String, Arc<Expr>>,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_max_depth(DEFAULT_MAX_DEPTH)
    }

    pub fn with_max_depth(max_depth: usize) -> Self {
        Interpreter {
            max_depth,
            trees: DashMap::new(),
        }
    }

    /// Parse a query, reusing the tree from an earlier call when present.
    /// Failed parses are never stored.
    pub fn parse(&self, query: &str) -> Result<Arc<Expr>, ParseError> {
        if let Some(tree) = self.trees.get(query) {
            trace!(query, "syntax tree reused");
            return Ok(Arc::clone(tree.value()));
        }
        let tree = Arc::new(Parser::with_max_depth(Lexer::new(query), self.max_depth)?.parse()?);
        self.trees.insert(query.to_string(), Arc::clone(&tree));
        Ok(tree)
    }

    /// Evaluate an already parsed expression.
    pub fn eval_expr(&self, expr: &Expr, ctx: &Context) -> Result<Value, EvalError> {
        Evaluator { ctx }.eval(expr)
    }

    /// Forget all parsed trees.
    pub fn clear(&self) {
        self.trees.clear();
    }

    /// Number of parsed trees currently held.
    pub fn cached(&self) -> usize {
        self.trees.len()
    }
}

impl Runner for Interpreter {
    fn run(&self, query: &str, ctx: &Context) -> Result<Value, QueryError> {
        let tree = self.parse(query)?;
        Ok(self.eval_expr(&tree, ctx)?)
    }
}

/// Result of one node of an access chain.
enum Flow {
    Value(Value),
    /// A nullsafe step met `null`; the rest of the chain does not run.
    Skipped,
}

impl Flow {
    fn into_value(self) -> Value {
        match self {
            Flow::Value(value) => value,
            Flow::Skipped => Value::Null,
        }
    }
}

struct Evaluator<'a> {
    ctx: &'a Context,
}

impl Evaluator<'_> {
    /// Evaluate a node as a complete value; a skipped chain ends as `null`.
    fn eval(&mut self, expr: &Expr) -> Result<Value, EvalError> {
        expr.accept(self).map(Flow::into_value)
    }

    /// Evaluate the receiver of a chain step. Returns `None` when the step
    /// must not run.
    fn receiver(&mut self, object: &Expr, nullsafe: bool) -> Result<Option<Value>, EvalError> {
        match object.accept(self)? {
            Flow::Skipped => Ok(None),
            Flow::Value(Value::Null) if nullsafe => Ok(None),
            Flow::Value(value) => Ok(Some(value)),
        }
    }

    fn eval_all(&mut self, exprs: &[Expr]) -> Result<Vec<Value>, EvalError> {
        exprs.iter().map(|e| self.eval(e)).collect()
    }
}

impl Visitor for Evaluator<'_> {
    type Output = Result<Flow, EvalError>;

    fn visit_literal(&mut self, literal: &Literal) -> Self::Output {
        let value = match literal {
            Literal::Null => Value::Null,
            Literal::Boolean(b) => Value::Boolean(*b),
            Literal::Integer(n) => Value::Integer(*n),
            Literal::Float(n) => Value::Float(*n),
            Literal::String(s) => Value::String(s.clone()),
        };
        Ok(Flow::Value(value))
    }

    fn visit_variable(&mut self, name: &str) -> Self::Output {
        runtime::lookup_variable(self.ctx, name).map(Flow::Value)
    }

    fn visit_member_access(&mut self, object: &Expr, member: &str, nullsafe: bool) -> Self::Output {
        let Some(receiver) = self.receiver(object, nullsafe)? else {
            return Ok(Flow::Skipped);
        };
        runtime::get_member(self.ctx, &receiver, member).map(Flow::Value)
    }

    fn visit_method_call(
        &mut self,
        object: &Expr,
        method: &str,
        args: &[Expr],
        nullsafe: bool,
    ) -> Self::Output {
        let Some(receiver) = self.receiver(object, nullsafe)? else {
            return Ok(Flow::Skipped);
        };
        let args = self.eval_all(args)?;
        runtime::call_method(self.ctx, &receiver, method, &args).map(Flow::Value)
    }

    fn visit_function_call(&mut self, name: &str, args: &[Expr]) -> Self::Output {
        let function = runtime::allowed_function(self.ctx, name)?;
        let args = self.eval_all(args)?;
        runtime::call_function(self.ctx, function, &args).map(Flow::Value)
    }

    fn visit_index_access(&mut self, object: &Expr, index: &Expr) -> Self::Output {
        let Some(receiver) = self.receiver(object, false)? else {
            return Ok(Flow::Skipped);
        };
        let index = self.eval(index)?;
        runtime::get_index(self.ctx, &receiver, &index).map(Flow::Value)
    }

    fn visit_array(&mut self, items: &[Expr]) -> Self::Output {
        self.eval_all(items).map(|items| Flow::Value(Value::Array(items)))
    }

    fn visit_unary(&mut self, op: UnaryOp, operand: &Expr) -> Self::Output {
        let operand = self.eval(operand)?;
        runtime::apply_unary(op, &operand).map(Flow::Value)
    }

    fn visit_binary(&mut self, op: BinOp, left: &Expr, right: &Expr) -> Self::Output {
        let left = self.eval(left)?;
        let right = self.eval(right)?;
        runtime::apply_binop(op, &left, &right).map(Flow::Value)
    }

    fn visit_logical(&mut self, op: LogicalOp, left: &Expr, right: &Expr) -> Self::Output {
        let left = self.eval(left)?.is_truthy();
        let result = match op {
            LogicalOp::And => left && self.eval(right)?.is_truthy(),
            LogicalOp::Or => left || self.eval(right)?.is_truthy(),
        };
        Ok(Flow::Value(Value::Boolean(result)))
    }

    fn visit_coalesce(&mut self, left: &Expr, right: &Expr) -> Self::Output {
        match self.eval(left)? {
            Value::Null => self.eval(right).map(Flow::Value),
            value => Ok(Flow::Value(value)),
        }
    }

    fn visit_ternary(
        &mut self,
        condition: &Expr,
        true_branch: Option<&Expr>,
        false_branch: &Expr,
    ) -> Self::Output {
        let condition = self.eval(condition)?;
        let value = match true_branch {
            _ if !condition.is_truthy() => self.eval(false_branch)?,
            Some(branch) => self.eval(branch)?,
            None => condition,
        };
        Ok(Flow::Value(value))
    }
}
