//! Host objects and contexts shared by the integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use sandquery::{Context, EvalError, HostObject, HostRef, Value};

pub struct Page {
    pub title: String,
    pub status: String,
    pub children: Vec<Arc<Page>>,
}

impl Page {
    pub fn new(title: &str, status: &str) -> Self {
        Page {
            title: title.to_string(),
            status: status.to_string(),
            children: Vec::new(),
        }
    }

    pub fn with_children(mut self, children: Vec<Page>) -> Self {
        self.children = children.into_iter().map(Arc::new).collect();
        self
    }

    fn field(&self, name: &str) -> Option<&str> {
        match name {
            "title" => Some(&self.title),
            "status" => Some(&self.status),
            _ => None,
        }
    }
}

impl HostObject for Page {
    fn type_name(&self) -> &str {
        "Page"
    }

    fn call(&self, method: &str, _args: &[Value]) -> Result<Option<Value>, EvalError> {
        Ok(match method {
            "title" | "status" => self.field(method).map(Value::from),
            "children" => Some(Value::host(Pages(self.children.clone()))),
            _ => None,
        })
    }
}

/// A collection of pages.
pub struct Pages(pub Vec<Arc<Page>>);

impl HostObject for Pages {
    fn type_name(&self) -> &str {
        "Pages"
    }

    fn call(&self, method: &str, args: &[Value]) -> Result<Option<Value>, EvalError> {
        Ok(match (method, args) {
            ("first", []) => Some(
                self.0
                    .first()
                    .map(|p| Value::Host(Arc::clone(p) as HostRef))
                    .unwrap_or(Value::Null),
            ),
            ("count", []) => Some(Value::Integer(self.0.len() as i64)),
            ("filterBy", [Value::String(field), Value::String(wanted)]) => {
                let matching = self
                    .0
                    .iter()
                    .filter(|p| p.field(field) == Some(wanted.as_str()))
                    .cloned()
                    .collect();
                Some(Value::host(Pages(matching)))
            }
            ("filterBy", _) => {
                return Err(EvalError::Host(
                    "filterBy expects a field and a value".to_string(),
                ));
            }
            _ => None,
        })
    }
}

pub struct User {
    pub name: String,
    pub password: String,
}

impl HostObject for User {
    fn type_name(&self) -> &str {
        "User"
    }

    fn call(&self, method: &str, _args: &[Value]) -> Result<Option<Value>, EvalError> {
        Ok(match method {
            "name" => Some(Value::from(self.name.as_str())),
            "password" => Some(Value::from(self.password.as_str())),
            _ => None,
        })
    }
}

/// `page` with three children, two of them listed.
pub fn site_context() -> Context {
    let page = Page::new("Home", "listed").with_children(vec![
        Page::new("Drafts", "draft"),
        Page::new("About", "listed"),
        Page::new("Contact", "listed"),
    ]);
    Context::new().with_variable("page", Value::host(page))
}

/// A context exercising plain data, functions and a failing function.
pub fn data_context() -> Context {
    let data = serde_json::json!({
        "user": {"name": "Ada", "tags": ["admin", "dev"], "age": 36},
        "items": [3, 1, 2],
        "zero": 0,
        "five": 5,
        "empty": "",
        "nothing": null,
        "price": 19.5
    });
    let Value::Object(variables) = Value::from_json(data) else {
        unreachable!("fixture is an object")
    };
    Context::new()
        .with_variables(variables)
        .with_function("upper", |args: &[Value]| {
            Ok(Value::String(
                args.first().map(Value::as_string).unwrap_or_default().to_uppercase(),
            ))
        })
        .with_function("fail", |_: &[Value]| {
            Err(EvalError::Host("fail() must not run".to_string()))
        })
}
