use crate::ast::{BinOp, Expr, Literal, LogicalOp, UnaryOp};

/// One method per node kind. Each backend implements the whole trait, so a
/// new node kind cannot be added without every backend handling it.
pub trait Visitor {
    type Output;

    fn visit_literal(&mut self, literal: &Literal) -> Self::Output;

    fn visit_variable(&mut self, name: &str) -> Self::Output;

    fn visit_member_access(&mut self, object: &Expr, member: &str, nullsafe: bool)
    -> Self::Output;

    fn visit_method_call(
        &mut self,
        object: &Expr,
        method: &str,
        args: &[Expr],
        nullsafe: bool,
    ) -> Self::Output;

    fn visit_function_call(&mut self, name: &str, args: &[Expr]) -> Self::Output;

    fn visit_index_access(&mut self, object: &Expr, index: &Expr) -> Self::Output;

    fn visit_array(&mut self, items: &[Expr]) -> Self::Output;

    fn visit_unary(&mut self, op: UnaryOp, operand: &Expr) -> Self::Output;

    fn visit_binary(&mut self, op: BinOp, left: &Expr, right: &Expr) -> Self::Output;

    fn visit_logical(&mut self, op: LogicalOp, left: &Expr, right: &Expr) -> Self::Output;

    fn visit_coalesce(&mut self, left: &Expr, right: &Expr) -> Self::Output;

    fn visit_ternary(
        &mut self,
        condition: &Expr,
        true_branch: Option<&Expr>,
        false_branch: &Expr,
    ) -> Self::Output;
}

impl Expr {
    pub fn accept<V: Visitor>(&self, visitor: &mut V) -> V::Output {
        match self {
            Expr::Literal(literal) => visitor.visit_literal(literal),
            Expr::Variable(name) => visitor.visit_variable(name),
            Expr::MemberAccess {
                object,
                member,
                nullsafe,
            } => visitor.visit_member_access(object, member, *nullsafe),
            Expr::MethodCall {
                object,
                method,
                args,
                nullsafe,
            } => visitor.visit_method_call(object, method, args, *nullsafe),
            Expr::FunctionCall { name, args } => visitor.visit_function_call(name, args),
            Expr::IndexAccess { object, index } => visitor.visit_index_access(object, index),
            Expr::Array(items) => visitor.visit_array(items),
            Expr::Unary { op, operand } => visitor.visit_unary(*op, operand),
            Expr::Binary { op, left, right } => visitor.visit_binary(*op, left, right),
            Expr::Logical { op, left, right } => visitor.visit_logical(*op, left, right),
            Expr::Coalesce { left, right } => visitor.visit_coalesce(left, right),
            Expr::Ternary {
                condition,
                true_branch,
                false_branch,
            } => visitor.visit_ternary(condition, true_branch.as_deref(), false_branch),
        }
    }
}
