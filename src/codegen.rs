//! Turns a syntax tree into unit source.
//!
//! A unit is a small S-expression program. Every form maps onto one runtime
//! operation, so a loaded unit behaves exactly like the interpreter walking
//! the same tree. Values that would otherwise be computed twice (nullsafe
//! receivers, the left side of `??`, the condition of `?:`) are bound to
//! numbered slots with `let`.

use std::{collections::BTreeSet, fmt::Write as _};

use crate::ast::{BinOp, Expr, Literal, LogicalOp, UnaryOp, Visitor};

/// First line of every unit file.
pub const UNIT_MAGIC: &str = ";; sandquery unit v1";

/// Output of code generation for one expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Generated {
    /// Body of the unit, a single form.
    pub source: String,
    /// Number of `let` slots the body uses.
    pub slots: usize,
    /// Global functions the body may call.
    pub used_functions: BTreeSet<String>,
}

impl Generated {
    /// Render the complete unit file: header lines followed by the body.
    pub fn to_unit_source(&self, hash: &str, query: &str) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{UNIT_MAGIC}");
        let _ = writeln!(out, ";; hash {hash}");
        let _ = writeln!(out, ";; query {}", quote(query));
        let _ = writeln!(out, ";; slots {}", self.slots);
        out.push_str(";; uses");
        for name in &self.used_functions {
            out.push(' ');
            out.push_str(name);
        }
        out.push('\n');
        out.push_str(&self.source);
        out.push('\n');
        out
    }
}

/// Code generator visitor.
#[derive(Default)]
pub struct CodeGen {
    slots: usize,
    used_functions: BTreeSet<String>,
}

impl CodeGen {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate the body for `expr`.
    pub fn generate(expr: &Expr) -> Generated {
        let mut codegen = CodeGen::new();
        let source = expr.accept(&mut codegen);
        Generated {
            source,
            slots: codegen.slots,
            used_functions: codegen.used_functions,
        }
    }

    fn next_slot(&mut self) -> String {
        let slot = format!("%{}", self.slots);
        self.slots += 1;
        slot
    }

    fn list(&mut self, head: &str, items: &[Expr]) -> String {
        let mut out = format!("({head}");
        for item in items {
            out.push(' ');
            out.push_str(&item.accept(self));
        }
        out.push(')');
        out
    }

    /// Emit a whole access chain given its outermost step.
    fn chain<'e>(&mut self, last: Step<'e>, object: &'e Expr) -> String {
        let mut steps = vec![last];
        let mut base = object;
        while let Some((step, object)) = Step::split(base) {
            steps.push(step);
            base = object;
        }
        steps.reverse();
        let receiver = base.accept(self);
        self.apply_steps(receiver, &steps)
    }

    fn apply_steps(&mut self, receiver: String, steps: &[Step<'_>]) -> String {
        let Some((step, rest)) = steps.split_first() else {
            return receiver;
        };
        if step.nullsafe() {
            let slot = self.next_slot();
            let applied = self.apply_step(slot.clone(), step);
            let tail = self.apply_steps(applied, rest);
            format!("(let {slot} {receiver} (if-null {slot} null {tail}))")
        } else {
            let applied = self.apply_step(receiver, step);
            self.apply_steps(applied, rest)
        }
    }

    fn apply_step(&mut self, receiver: String, step: &Step<'_>) -> String {
        match step {
            Step::Member { name, .. } => format!("(get {receiver} {})", quote(name)),
            Step::Method { name, args, .. } => {
                let mut out = format!("(invoke {receiver} {}", quote(name));
                for arg in *args {
                    out.push(' ');
                    out.push_str(&arg.accept(self));
                }
                out.push(')');
                out
            }
            Step::Index(index) => format!("(index {receiver} {})", index.accept(self)),
        }
    }
}

/// One link of an access chain.
enum Step<'e> {
    Member {
        name: &'e str,
        nullsafe: bool,
    },
    Method {
        name: &'e str,
        args: &'e [Expr],
        nullsafe: bool,
    },
    Index(&'e Expr),
}

impl<'e> Step<'e> {
    /// Split a chain node into its step and its receiver expression.
    fn split(expr: &'e Expr) -> Option<(Step<'e>, &'e Expr)> {
        match expr {
            Expr::MemberAccess {
                object,
                member,
                nullsafe,
            } => Some((
                Step::Member {
                    name: member,
                    nullsafe: *nullsafe,
                },
                object,
            )),
            Expr::MethodCall {
                object,
                method,
                args,
                nullsafe,
            } => Some((
                Step::Method {
                    name: method,
                    args,
                    nullsafe: *nullsafe,
                },
                object,
            )),
            Expr::IndexAccess { object, index } => Some((Step::Index(index), object)),
            _ => None,
        }
    }

    fn nullsafe(&self) -> bool {
        match self {
            Step::Member { nullsafe, .. } | Step::Method { nullsafe, .. } => *nullsafe,
            Step::Index(_) => false,
        }
    }
}

impl Visitor for CodeGen {
    type Output = String;

    fn visit_literal(&mut self, literal: &Literal) -> String {
        match literal {
            Literal::Null => "null".to_string(),
            Literal::Boolean(b) => b.to_string(),
            Literal::Integer(n) => n.to_string(),
            Literal::Float(n) => format!("{n:?}"),
            Literal::String(s) => quote(s),
        }
    }

    fn visit_variable(&mut self, name: &str) -> String {
        format!("(var {})", quote(name))
    }

    fn visit_member_access(&mut self, object: &Expr, member: &str, nullsafe: bool) -> String {
        self.chain(
            Step::Member {
                name: member,
                nullsafe,
            },
            object,
        )
    }

    fn visit_method_call(
        &mut self,
        object: &Expr,
        method: &str,
        args: &[Expr],
        nullsafe: bool,
    ) -> String {
        self.chain(
            Step::Method {
                name: method,
                args,
                nullsafe,
            },
            object,
        )
    }

    fn visit_function_call(&mut self, name: &str, args: &[Expr]) -> String {
        self.used_functions.insert(name.to_string());
        let head = format!("call {}", quote(name));
        self.list(&head, args)
    }

    fn visit_index_access(&mut self, object: &Expr, index: &Expr) -> String {
        self.chain(Step::Index(index), object)
    }

    fn visit_array(&mut self, items: &[Expr]) -> String {
        self.list("array", items)
    }

    fn visit_unary(&mut self, op: UnaryOp, operand: &Expr) -> String {
        let head = match op {
            UnaryOp::Not => "not",
            UnaryOp::Negate => "neg",
        };
        format!("({head} {})", operand.accept(self))
    }

    fn visit_binary(&mut self, op: BinOp, left: &Expr, right: &Expr) -> String {
        let left = left.accept(self);
        let right = right.accept(self);
        format!("({} {left} {right})", op.mnemonic())
    }

    fn visit_logical(&mut self, op: LogicalOp, left: &Expr, right: &Expr) -> String {
        let head = match op {
            LogicalOp::And => "and",
            LogicalOp::Or => "or",
        };
        let left = left.accept(self);
        let right = right.accept(self);
        format!("({head} {left} {right})")
    }

    fn visit_coalesce(&mut self, left: &Expr, right: &Expr) -> String {
        let slot = self.next_slot();
        let left = left.accept(self);
        let right = right.accept(self);
        format!("(let {slot} {left} (if-null {slot} {right} {slot}))")
    }

    fn visit_ternary(
        &mut self,
        condition: &Expr,
        true_branch: Option<&Expr>,
        false_branch: &Expr,
    ) -> String {
        match true_branch {
            Some(branch) => {
                let condition = condition.accept(self);
                let branch = branch.accept(self);
                let otherwise = false_branch.accept(self);
                format!("(if {condition} {branch} {otherwise})")
            }
            None => {
                let slot = self.next_slot();
                let condition = condition.accept(self);
                let otherwise = false_branch.accept(self);
                format!("(let {slot} {condition} (if {slot} {slot} {otherwise}))")
            }
        }
    }
}

/// Quote a string as a unit string atom.
pub fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                let _ = write!(out, "\\u{{{:04x}}}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::parser::parse;

    fn body(query: &str) -> String {
        CodeGen::generate(&parse(query).unwrap()).source
    }

    #[test]
    fn plain_chain() {
        assert_eq!(
            body("page.children.first.title"),
            r#"(get (get (get (var "page") "children") "first") "title")"#
        );
    }

    #[test]
    fn nullsafe_step_wraps_rest_of_chain() {
        assert_eq!(
            body("a?.b.c"),
            r#"(let %0 (var "a") (if-null %0 null (get (get %0 "b") "c")))"#
        );
    }

    #[test]
    fn coalesce_and_elvis_use_slots() {
        let generated = CodeGen::generate(&parse("x ?: y ?? 1").unwrap());
        assert_eq!(
            generated.source,
            r#"(let %0 (var "x") (if %0 %0 (let %1 (var "y") (if-null %1 1 %1))))"#
        );
        assert_eq!(generated.slots, 2);
    }

    #[test]
    fn records_used_functions() {
        let generated = CodeGen::generate(&parse("b(a(1), 'x')").unwrap());
        assert_eq!(generated.source, r#"(call "b" (call "a" 1) "x")"#);
        assert_eq!(
            generated.used_functions.into_iter().collect::<Vec<_>>(),
            vec!["a", "b"]
        );
    }

    #[test]
    fn quote_escapes_specials() {
        assert_eq!(quote("a\"b\\c\n"), r#""a\"b\\c\n""#);
        assert_eq!(quote("\u{1}"), r#""\u{0001}""#);
    }
}
