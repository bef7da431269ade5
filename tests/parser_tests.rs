// tests/parser_tests.rs

use pretty_assertions::assert_eq;
use sandquery::ast::{BinOp, Expr, Literal, LogicalOp, UnaryOp};
use sandquery::lexer::{LexError, Lexer};
use sandquery::parser::{ParseError, Parser, parse};

fn var(name: &str) -> Expr {
    Expr::variable(name)
}

fn int(n: i64) -> Expr {
    Expr::integer(n)
}

fn binary(op: BinOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

// ============================================================================
// Simple tests
// ============================================================================

#[test]
fn test_comparison() {
    let expr = parse("price > 100").unwrap();
    assert_eq!(expr, binary(BinOp::GreaterThan, var("price"), int(100)));
}

#[test]
fn test_parentheses() {
    let expr = parse("(1 + 2) * 3").unwrap();
    assert_eq!(
        expr,
        binary(BinOp::Multiply, binary(BinOp::Add, int(1), int(2)), int(3))
    );
}

#[test]
fn test_arithmetic_precedence() {
    let expr = parse("1 + 2 * 3").unwrap();
    assert_eq!(
        expr,
        binary(BinOp::Add, int(1), binary(BinOp::Multiply, int(2), int(3)))
    );
}

#[test]
fn test_additive_is_left_associative() {
    let expr = parse("10 - 3 - 2").unwrap();
    assert_eq!(
        expr,
        binary(BinOp::Subtract, binary(BinOp::Subtract, int(10), int(3)), int(2))
    );
}

// ============================================================================
// Literals and Primitives
// ============================================================================

#[test]
fn test_literals() {
    assert_eq!(parse("null").unwrap(), Expr::Literal(Literal::Null));
    assert_eq!(parse("true").unwrap(), Expr::Literal(Literal::Boolean(true)));
    assert_eq!(parse("2.5").unwrap(), Expr::Literal(Literal::Float(2.5)));
    assert_eq!(parse("'hi'").unwrap(), Expr::string("hi"));
}

#[test]
fn test_array_literal() {
    assert_eq!(
        parse("[1, 'a', [ ]]").unwrap(),
        Expr::Array(vec![int(1), Expr::string("a"), Expr::Array(vec![])])
    );
}

#[test]
fn test_trailing_comma_rejected() {
    assert!(matches!(
        parse("[1, 2,]"),
        Err(ParseError::UnexpectedToken { .. })
    ));
    assert!(matches!(
        parse("f(1,)"),
        Err(ParseError::UnexpectedToken { .. })
    ));
}

// ============================================================================
// Access Chains
// ============================================================================

#[test]
fn test_member_chain() {
    let expr = parse("page.children.first").unwrap();
    assert_eq!(
        expr,
        Expr::member(Expr::member(var("page"), "children", false), "first", false)
    );
}

#[test]
fn test_nullsafe_flag_is_recorded() {
    let expr = parse("user?.name").unwrap();
    assert_eq!(expr, Expr::member(var("user"), "name", true));
}

#[test]
fn test_method_call_chain() {
    let expr = parse("page.children.filterBy('status', 'listed').first").unwrap();
    assert_eq!(
        expr,
        Expr::member(
            Expr::MethodCall {
                object: Box::new(Expr::member(var("page"), "children", false)),
                method: "filterBy".into(),
                args: vec![Expr::string("status"), Expr::string("listed")],
                nullsafe: false,
            },
            "first",
            false,
        )
    );
}

#[test]
fn test_nullsafe_method_call() {
    let expr = parse("page?.find('x')").unwrap();
    assert!(matches!(expr, Expr::MethodCall { nullsafe: true, .. }));
}

#[test]
fn test_index_access() {
    let expr = parse("items[0]['name']").unwrap();
    assert_eq!(
        expr,
        Expr::IndexAccess {
            object: Box::new(Expr::IndexAccess {
                object: Box::new(var("items")),
                index: Box::new(int(0)),
            }),
            index: Box::new(Expr::string("name")),
        }
    );
}

#[test]
fn test_keyword_member_names() {
    let expr = parse("flags.null").unwrap();
    assert_eq!(expr, Expr::member(var("flags"), "null", false));
}

#[test]
fn test_function_call() {
    let expr = parse("site(1)").unwrap();
    assert_eq!(
        expr,
        Expr::FunctionCall {
            name: "site".into(),
            args: vec![int(1)],
        }
    );
}

// ============================================================================
// Operators
// ============================================================================

#[test]
fn test_unary_is_right_recursive() {
    let expr = parse("!-x").unwrap();
    assert_eq!(
        expr,
        Expr::Unary {
            op: UnaryOp::Not,
            operand: Box::new(Expr::Unary {
                op: UnaryOp::Negate,
                operand: Box::new(var("x")),
            }),
        }
    );
}

#[test]
fn test_and_binds_tighter_than_or() {
    let expr = parse("a || b && c").unwrap();
    match expr {
        Expr::Logical {
            op: LogicalOp::Or,
            right,
            ..
        } => assert!(matches!(*right, Expr::Logical { op: LogicalOp::And, .. })),
        other => panic!("Expected or, got {:?}", other),
    }
}

#[test]
fn test_coalesce_binds_looser_than_or() {
    let expr = parse("a || b ?? c").unwrap();
    match expr {
        Expr::Coalesce { left, right } => {
            assert!(matches!(*left, Expr::Logical { op: LogicalOp::Or, .. }));
            assert_eq!(*right, var("c"));
        }
        other => panic!("Expected coalesce, got {:?}", other),
    }
}

#[test]
fn test_coalesce_is_right_associative() {
    let expr = parse("a ?? b ?? c").unwrap();
    assert_eq!(
        expr,
        Expr::Coalesce {
            left: Box::new(var("a")),
            right: Box::new(Expr::Coalesce {
                left: Box::new(var("b")),
                right: Box::new(var("c")),
            }),
        }
    );
}

#[test]
fn test_equality_is_not_chainable() {
    assert!(parse("a == b == c").is_err());
    assert!(parse("a < b < c").is_err());
}

#[test]
fn test_strict_equality() {
    let expr = parse("a === 1").unwrap();
    assert_eq!(expr, binary(BinOp::Identical, var("a"), int(1)));
}

// ============================================================================
// Ternary
// ============================================================================

#[test]
fn test_ternary() {
    let expr = parse("a ? b : c").unwrap();
    assert_eq!(
        expr,
        Expr::Ternary {
            condition: Box::new(var("a")),
            true_branch: Some(Box::new(var("b"))),
            false_branch: Box::new(var("c")),
        }
    );
    assert!(!expr.is_default_ternary());
}

#[test]
fn test_elvis_forms() {
    for query in ["a ?: b", "a ? : b"] {
        let expr = parse(query).unwrap();
        assert!(expr.is_default_ternary(), "Failed for: {}", query);
    }
}

#[test]
fn test_ternary_with_leading_dot_float() {
    let expr = parse("a?.5:1").unwrap();
    assert_eq!(
        expr,
        Expr::Ternary {
            condition: Box::new(var("a")),
            true_branch: Some(Box::new(Expr::Literal(Literal::Float(0.5)))),
            false_branch: Box::new(int(1)),
        }
    );
}

#[test]
fn test_ternary_is_right_associative() {
    let expr = parse("a ? 1 : b ? 2 : 3").unwrap();
    match expr {
        Expr::Ternary { false_branch, .. } => {
            assert!(matches!(*false_branch, Expr::Ternary { .. }))
        }
        other => panic!("Expected ternary, got {:?}", other),
    }
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn test_unexpected_end() {
    match parse("1 +") {
        Err(ParseError::UnexpectedEnd { position, .. }) => assert_eq!(position, 3),
        other => panic!("Expected unexpected end, got {:?}", other),
    }
}

#[test]
fn test_unexpected_token_lists_expected() {
    match parse("a.(b)") {
        Err(ParseError::UnexpectedToken {
            position, expected, ..
        }) => {
            assert_eq!(position, 2);
            assert_eq!(expected, vec!["identifier"]);
        }
        other => panic!("Expected unexpected token, got {:?}", other),
    }
}

#[test]
fn test_single_expression_only() {
    match parse("a b") {
        Err(ParseError::UnexpectedToken { expected, .. }) => {
            assert_eq!(expected, vec!["end of input"]);
        }
        other => panic!("Expected unexpected token, got {:?}", other),
    }
}

#[test]
fn test_lex_errors_surface() {
    assert_eq!(
        parse("a @ b"),
        Err(ParseError::Lex(LexError::UnexpectedCharacter {
            ch: '@',
            position: 2
        }))
    );
}

#[test]
fn test_custom_depth_limit() {
    let query = "a.b.c.d.e.f";
    let mut parser = Parser::with_max_depth(Lexer::new(query), 3).unwrap();
    assert!(matches!(parser.parse(), Err(ParseError::TooDeep { max_depth: 3, .. })));
    assert!(parse(query).is_ok());
}

#[test]
fn test_long_chains_within_default_limit() {
    let query = format!("a{}", ".b".repeat(60));
    assert!(parse(&query).is_ok());
}
