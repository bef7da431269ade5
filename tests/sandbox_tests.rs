mod common;

use pretty_assertions::assert_eq;
use sandquery::{
    AllowList, Context, EvalError, Interpreter, QueryError, Runner, TranspiledRunner, UnitCache,
    Value,
};

use common::{Page, User, data_context, site_context};

/// Both runners, so every sandbox rule is checked on each.
fn runners() -> Vec<(&'static str, Box<dyn Runner>)> {
    vec![
        ("interpreted", Box::new(Interpreter::new()) as Box<dyn Runner>),
        (
            "transpiled",
            Box::new(TranspiledRunner::new(UnitCache::in_memory())) as Box<dyn Runner>,
        ),
    ]
}

fn user_context() -> Context {
    Context::new().with_variable(
        "user",
        Value::host(User {
            name: "Ada".to_string(),
            password: "hunter2".to_string(),
        }),
    )
}

fn eval_err(runner: &dyn Runner, query: &str, ctx: &Context) -> EvalError {
    match runner.run(query, ctx) {
        Err(QueryError::Eval(e)) => e,
        other => panic!("Expected evaluation error for {}, got {:?}", query, other),
    }
}

// ============================================================================
// Function Whitelist
// ============================================================================

#[test]
fn test_unregistered_function_is_rejected() {
    let ctx = data_context();
    for (name, runner) in runners() {
        assert_eq!(
            eval_err(runner.as_ref(), "secret()", &ctx),
            EvalError::FunctionNotAllowed("secret".to_string()),
            "Failed for: {}",
            name
        );
    }
}

#[test]
fn test_whitelist_checked_before_arguments() {
    let ctx = data_context();
    for (name, runner) in runners() {
        // fail() would raise a host error and missing is undefined
        for query in ["secret(fail())", "secret(missing)"] {
            assert_eq!(
                eval_err(runner.as_ref(), query, &ctx),
                EvalError::FunctionNotAllowed("secret".to_string()),
                "Failed for: {} ({})",
                query,
                name
            );
        }
    }
}

#[test]
fn test_whitelist_is_per_context() {
    let bare = Context::new().with_variable("name", "Ada");
    for (name, runner) in runners() {
        assert_eq!(
            eval_err(runner.as_ref(), "upper(name)", &bare),
            EvalError::FunctionNotAllowed("upper".to_string()),
            "Failed for: {}",
            name
        );
        assert_eq!(
            runner.run("upper(user.name)", &data_context()).unwrap(),
            Value::from("ADA")
        );
    }
}

#[test]
fn test_methods_are_not_global_functions() {
    let ctx = data_context();
    for (_, runner) in runners() {
        assert_eq!(
            eval_err(runner.as_ref(), "count(items)", &ctx),
            EvalError::FunctionNotAllowed("count".to_string())
        );
    }
}

// ============================================================================
// Allow Lists
// ============================================================================

#[test]
fn test_allow_list_blocks_undeclared_member() {
    let ctx = user_context().with_interceptor(AllowList::new().allow("User", ["name"]));
    for (name, runner) in runners() {
        assert_eq!(
            runner.run("user.name", &ctx).unwrap(),
            Value::from("Ada"),
            "Failed for: {}",
            name
        );
        assert_eq!(
            eval_err(runner.as_ref(), "user.password", &ctx),
            EvalError::MemberNotAllowed {
                type_name: "User".to_string(),
                member: "password".to_string(),
            }
        );
    }
}

#[test]
fn test_allow_list_covers_calls_and_indexes() {
    let ctx = user_context().with_interceptor(AllowList::new().allow("User", ["name"]));
    for (_, runner) in runners() {
        for query in ["user.password()", "user['password']"] {
            assert!(
                matches!(
                    eval_err(runner.as_ref(), query, &ctx),
                    EvalError::MemberNotAllowed { .. }
                ),
                "Failed for: {}",
                query
            );
        }
    }
}

#[test]
fn test_allow_list_follows_returned_objects() {
    let sandbox = AllowList::new()
        .allow("Page", ["children", "title"])
        .allow("Pages", ["first"]);
    let ctx = site_context().with_interceptor(sandbox);
    for (_, runner) in runners() {
        assert_eq!(
            runner.run("page.children.first.title", &ctx).unwrap(),
            Value::from("Drafts")
        );
        assert_eq!(
            eval_err(runner.as_ref(), "page.children.first.status", &ctx),
            EvalError::MemberNotAllowed {
                type_name: "Page".to_string(),
                member: "status".to_string(),
            }
        );
        assert_eq!(
            eval_err(runner.as_ref(), "page.children.count", &ctx),
            EvalError::MemberNotAllowed {
                type_name: "Pages".to_string(),
                member: "count".to_string(),
            }
        );
    }
}

#[test]
fn test_allow_list_keeps_host_identity() {
    let plain = user_context();
    let guarded = user_context().with_interceptor(AllowList::new().allow("User", ["name"]));
    for (name, runner) in runners() {
        for ctx in [&plain, &guarded] {
            assert_eq!(
                runner.run("user == user", ctx).unwrap(),
                Value::Boolean(true),
                "Failed for: {}",
                name
            );
            assert_eq!(runner.run("user === user", ctx).unwrap(), Value::Boolean(true));
            assert_eq!(
                runner.run("[user, user].unique().count", ctx).unwrap(),
                Value::Integer(1)
            );
        }
    }

    // distinct objects stay distinct behind the proxy
    let ada = || {
        Value::host(User {
            name: "Ada".to_string(),
            password: String::new(),
        })
    };
    let two_users = Context::new()
        .with_variable("a", ada())
        .with_variable("b", ada())
        .with_interceptor(AllowList::new().allow("User", ["name"]));
    for (_, runner) in runners() {
        assert_eq!(runner.run("a == b", &two_users).unwrap(), Value::Boolean(false));
    }
}

#[test]
fn test_unlisted_types_pass_by_default() {
    let ctx = site_context().with_interceptor(AllowList::new().allow("User", ["name"]));
    for (_, runner) in runners() {
        assert_eq!(runner.run("page.status", &ctx).unwrap(), Value::from("listed"));
    }
}

#[test]
fn test_deny_unlisted_rejects_unknown_types() {
    let ctx = site_context()
        .with_variable(
            "user",
            Value::host(User {
                name: "Ada".to_string(),
                password: String::new(),
            }),
        )
        .with_interceptor(AllowList::new().allow("User", ["name"]).deny_unlisted());
    for (_, runner) in runners() {
        assert_eq!(runner.run("user.name", &ctx).unwrap(), Value::from("Ada"));
        assert_eq!(
            eval_err(runner.as_ref(), "page", &ctx),
            EvalError::MemberNotAllowed {
                type_name: "Page".to_string(),
                member: "*".to_string(),
            }
        );
    }
}

#[test]
fn test_plain_data_is_not_restricted() {
    let ctx = data_context().with_interceptor(AllowList::new().deny_unlisted());
    for (_, runner) in runners() {
        assert_eq!(runner.run("user.tags[0]", &ctx).unwrap(), Value::from("admin"));
    }
}

// ============================================================================
// Custom Interceptors
// ============================================================================

#[test]
fn test_closure_interceptor_sees_every_value() {
    let ctx = data_context().with_interceptor(|value: Value| -> Result<Value, EvalError> {
        match value {
            Value::String(s) => Ok(Value::String(s.replace('a', "*"))),
            other => Ok(other),
        }
    });
    for (name, runner) in runners() {
        // variable lookup, member access, method result and index
        assert_eq!(
            runner.run("user.name.lower", &ctx).unwrap(),
            Value::from("*d*"),
            "Failed for: {}",
            name
        );
        assert_eq!(runner.run("user.tags[0]", &ctx).unwrap(), Value::from("*dmin"));
        // function results too
        assert_eq!(runner.run("upper('a')", &ctx).unwrap(), Value::from("A"));
        // literals are not intercepted
        assert_eq!(runner.run("'banana'", &ctx).unwrap(), Value::from("banana"));
    }
}

#[test]
fn test_interceptor_can_reject_values() {
    let ctx = site_context().with_interceptor(|value: Value| -> Result<Value, EvalError> {
        match value {
            Value::Host(object) if object.type_name() == "Pages" => {
                Err(EvalError::Host("collections are off limits".to_string()))
            }
            other => Ok(other),
        }
    });
    for (_, runner) in runners() {
        assert_eq!(runner.run("page.title", &ctx).unwrap(), Value::from("Home"));
        assert_eq!(
            eval_err(runner.as_ref(), "page.children", &ctx),
            EvalError::Host("collections are off limits".to_string())
        );
    }
}

#[test]
fn test_interceptor_result_replaces_host_object() {
    let ctx = Context::new()
        .with_variable("page", Value::host(Page::new("Home", "listed")))
        .with_interceptor(|value: Value| -> Result<Value, EvalError> {
            match value {
                Value::Host(object) if object.type_name() == "Page" => {
                    Ok(Value::host(Page::new("Masked", "hidden")))
                }
                other => Ok(other),
            }
        });
    for (_, runner) in runners() {
        assert_eq!(runner.run("page.title", &ctx).unwrap(), Value::from("Masked"));
    }
}
