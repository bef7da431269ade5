use crate::ast::{BinOp, LogicalOp, UnaryOp};

/// Literal constant as written in the query.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

/// Abstract Syntax Tree node representing a parsed expression.
///
/// The tree is built once by the parser and never mutated afterwards; both
/// runners walk it through [`crate::ast::Visitor`].
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Literal value
    ///
    /// # Example
    /// ```text
    /// 'listed'
    /// 42
    /// ```
    Literal(Literal),

    /// Context variable
    ///
    /// # Example
    /// ```text
    /// page
    /// ```
    Variable(String),

    /// Member access, optionally nullsafe
    ///
    /// # Examples
    /// ```text
    /// page.title
    /// page.parent?.title
    /// ```
    MemberAccess {
        object: Box<Expr>,
        member: String,
        nullsafe: bool,
    },

    /// Method call on a value, optionally nullsafe
    ///
    /// # Examples
    /// ```text
    /// page.children.filterBy('status', 'listed')
    /// page.parent?.url()
    /// ```
    MethodCall {
        object: Box<Expr>,
        method: String,
        args: Vec<Expr>,
        nullsafe: bool,
    },

    /// Call of a whitelisted global function
    ///
    /// # Example
    /// ```text
    /// site()
    /// t('welcome', 'en')
    /// ```
    FunctionCall { name: String, args: Vec<Expr> },

    /// Index access
    ///
    /// # Examples
    /// ```text
    /// items[0]
    /// user['first-name']
    /// ```
    IndexAccess { object: Box<Expr>, index: Box<Expr> },

    /// Array literal
    ///
    /// # Example
    /// ```text
    /// [1, 'two', page.title]
    /// ```
    Array(Vec<Expr>),

    /// Unary operation (`!`, `-`)
    Unary { op: UnaryOp, operand: Box<Expr> },

    /// Binary operation (arithmetic, comparison)
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },

    /// Short-circuiting `&&` / `||`
    Logical {
        op: LogicalOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },

    /// Null-coalescing (`??`); the right side only runs when the left is null
    Coalesce { left: Box<Expr>, right: Box<Expr> },

    /// Ternary `cond ? a : b`, or the default form `cond ?: b` when
    /// `true_branch` is `None` (the condition value is reused)
    Ternary {
        condition: Box<Expr>,
        true_branch: Option<Box<Expr>>,
        false_branch: Box<Expr>,
    },
}

impl Expr {
    /// True for `cond ?: else`.
    pub fn is_default_ternary(&self) -> bool {
        matches!(
            self,
            Expr::Ternary {
                true_branch: None,
                ..
            }
        )
    }

    /// Member, method and index nodes form access chains.
    pub fn is_chain_step(&self) -> bool {
        matches!(
            self,
            Expr::MemberAccess { .. } | Expr::MethodCall { .. } | Expr::IndexAccess { .. }
        )
    }

    pub fn variable(name: impl Into<String>) -> Self {
        Expr::Variable(name.into())
    }

    pub fn string(value: impl Into<String>) -> Self {
        Expr::Literal(Literal::String(value.into()))
    }

    pub fn integer(value: i64) -> Self {
        Expr::Literal(Literal::Integer(value))
    }

    pub fn member(object: Expr, member: impl Into<String>, nullsafe: bool) -> Self {
        Expr::MemberAccess {
            object: Box::new(object),
            member: member.into(),
            nullsafe,
        }
    }
}
