//! Loading unit source into an executable program.
//!
//! A unit file is the header written by [`crate::codegen::Generated`] followed
//! by one body form. Loading reads the forms and compiles them into a tree of
//! boxed closures, so a process that finds an artifact on disk never touches
//! the parser or the code generator.

use std::{collections::BTreeSet, fmt, sync::Arc};

use thiserror::Error;

use crate::{
    ast::{BinOp, UnaryOp},
    codegen::UNIT_MAGIC,
    context::Context,
    evaluator::EvalError,
    runtime,
    value::Value,
};

/// Default nesting limit for unit forms.
pub const MAX_FORM_DEPTH: usize = 1024;

/// Form nesting limit that admits every unit generated from a query the
/// parser accepted at `parser_depth`. One parser level emits at most three
/// nested forms (a nullsafe step is `let`, `if-null` and the access itself).
pub fn form_depth_limit(parser_depth: usize) -> usize {
    MAX_FORM_DEPTH.max(parser_depth.saturating_mul(3))
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LoadError {
    #[error("missing unit header line '{0}'")]
    MissingHeader(&'static str),

    #[error("malformed header line: {0}")]
    BadHeader(String),

    #[error("unexpected character '{ch}' at offset {position}")]
    UnexpectedCharacter { ch: char, position: usize },

    #[error("unexpected end of unit source")]
    UnexpectedEnd,

    #[error("trailing input at offset {0}")]
    TrailingInput(usize),

    #[error("forms nested deeper than {0} levels")]
    TooDeep(usize),

    #[error("unknown form '{0}'")]
    UnknownForm(String),

    #[error("form '{form}' is malformed: {reason}")]
    Malformed { form: String, reason: String },

    #[error("slot %{slot} out of range (unit declares {slots})")]
    SlotOutOfRange { slot: usize, slots: usize },

    #[error("function '{0}' is called but not declared")]
    UndeclaredFunction(String),
}

/// Evaluation state of one unit invocation.
pub struct Frame<'c> {
    ctx: &'c Context,
    slots: Vec<Value>,
}

impl Frame<'_> {
    fn slot(&self, index: usize) -> Value {
        self.slots.get(index).cloned().unwrap_or(Value::Null)
    }

    fn set_slot(&mut self, index: usize, value: Value) {
        if let Some(slot) = self.slots.get_mut(index) {
            *slot = value;
        }
    }
}

type Node = Box<dyn Fn(&mut Frame<'_>) -> Result<Value, EvalError> + Send + Sync>;

fn node<F>(f: F) -> Node
where
    F: Fn(&mut Frame<'_>) -> Result<Value, EvalError> + Send + Sync + 'static,
{
    Box::new(f)
}

/// An executable unit together with the source it was loaded from.
pub struct CompiledUnit {
    source: String,
    hash: String,
    query: String,
    slots: usize,
    used_functions: BTreeSet<String>,
    program: Node,
}

impl fmt::Debug for CompiledUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledUnit")
            .field("hash", &self.hash)
            .field("query", &self.query)
            .field("slots", &self.slots)
            .field("used_functions", &self.used_functions)
            .finish_non_exhaustive()
    }
}

impl CompiledUnit {
    /// Read and compile complete unit source (header and body).
    pub fn load(source: impl Into<String>) -> Result<Self, LoadError> {
        Self::load_with_depth(source, MAX_FORM_DEPTH)
    }

    /// Like [`CompiledUnit::load`], rejecting bodies nested deeper than
    /// `max_form_depth` lists.
    pub fn load_with_depth(
        source: impl Into<String>,
        max_form_depth: usize,
    ) -> Result<Self, LoadError> {
        let source = source.into();
        let (header, body) = read_header(&source)?;
        let form = Reader::new(body, max_form_depth).read_all()?;
        let compiler = Compiler {
            slots: header.slots,
            declared: &header.uses,
        };
        let program = compiler.compile(&form)?;
        Ok(CompiledUnit {
            hash: header.hash,
            query: header.query,
            slots: header.slots,
            used_functions: header.uses,
            program,
            source,
        })
    }

    /// Run the unit against a context.
    pub fn call(&self, ctx: &Context) -> Result<Value, EvalError> {
        let mut frame = Frame {
            ctx,
            slots: vec![Value::Null; self.slots],
        };
        (self.program)(&mut frame)
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// The query this unit was generated from.
    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn used_functions(&self) -> impl Iterator<Item = &str> {
        self.used_functions.iter().map(String::as_str)
    }
}

pub type UnitRef = Arc<CompiledUnit>;

struct Header {
    hash: String,
    query: String,
    slots: usize,
    uses: BTreeSet<String>,
}

/// Splits the header comments from the body and parses them.
fn read_header(source: &str) -> Result<(Header, &str), LoadError> {
    let mut lines = HeaderLines { rest: source };
    if lines.next_line() != UNIT_MAGIC {
        return Err(LoadError::MissingHeader("magic"));
    }
    let hash = lines.field("hash")?.to_string();
    if hash.is_empty() || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(LoadError::BadHeader(format!("hash {hash}")));
    }
    let query_line = lines.field("query")?;
    let Form::Str(query) = Reader::new(query_line, MAX_FORM_DEPTH).read_all()? else {
        return Err(LoadError::BadHeader(format!("query {query_line}")));
    };
    let slots_line = lines.field("slots")?;
    let slots = slots_line
        .parse()
        .map_err(|_| LoadError::BadHeader(format!("slots {slots_line}")))?;
    let uses = lines
        .field("uses")?
        .split_whitespace()
        .map(str::to_string)
        .collect();

    let header = Header {
        hash,
        query,
        slots,
        uses,
    };
    Ok((header, lines.rest))
}

struct HeaderLines<'a> {
    rest: &'a str,
}

impl<'a> HeaderLines<'a> {
    fn next_line(&mut self) -> &'a str {
        let (line, tail) = self.rest.split_once('\n').unwrap_or((self.rest, ""));
        self.rest = tail;
        line.trim_end_matches('\r')
    }

    /// `;; <key> <value>`, returning the value.
    fn field(&mut self, key: &'static str) -> Result<&'a str, LoadError> {
        self.next_line()
            .strip_prefix(";; ")
            .and_then(|l| l.strip_prefix(key))
            .filter(|l| l.is_empty() || l.starts_with(' '))
            .map(str::trim_start)
            .ok_or(LoadError::MissingHeader(key))
    }
}

/// One read form.
#[derive(Debug, Clone, PartialEq)]
enum Form {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Str(String),
    Slot(usize),
    Symbol(String),
    List(Vec<Form>),
}

struct Reader<'a> {
    input: &'a str,
    position: usize,
    depth: usize,
    max_depth: usize,
}

impl<'a> Reader<'a> {
    fn new(input: &'a str, max_depth: usize) -> Self {
        Reader {
            input,
            position: 0,
            depth: 0,
            max_depth,
        }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.position..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.position += c.len_utf8();
        Some(c)
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.bump();
            } else if c == ';' {
                while let Some(c) = self.bump() {
                    if c == '\n' {
                        break;
                    }
                }
            } else {
                break;
            }
        }
    }

    /// Exactly one form followed by nothing but whitespace.
    fn read_all(mut self) -> Result<Form, LoadError> {
        let form = self.read()?;
        self.skip_whitespace();
        if self.position < self.input.len() {
            return Err(LoadError::TrailingInput(self.position));
        }
        Ok(form)
    }

    fn read(&mut self) -> Result<Form, LoadError> {
        self.skip_whitespace();
        match self.peek() {
            None => Err(LoadError::UnexpectedEnd),
            Some('(') => {
                self.bump();
                self.depth += 1;
                if self.depth > self.max_depth {
                    return Err(LoadError::TooDeep(self.max_depth));
                }
                let mut items = Vec::new();
                loop {
                    self.skip_whitespace();
                    match self.peek() {
                        None => return Err(LoadError::UnexpectedEnd),
                        Some(')') => {
                            self.bump();
                            break;
                        }
                        Some(_) => items.push(self.read()?),
                    }
                }
                self.depth -= 1;
                Ok(Form::List(items))
            }
            Some(')') => Err(LoadError::UnexpectedCharacter {
                ch: ')',
                position: self.position,
            }),
            Some('"') => {
                self.bump();
                self.read_string().map(Form::Str)
            }
            Some(_) => self.read_atom(),
        }
    }

    fn read_string(&mut self) -> Result<String, LoadError> {
        let mut out = String::new();
        loop {
            let position = self.position;
            match self.bump().ok_or(LoadError::UnexpectedEnd)? {
                '"' => return Ok(out),
                '\\' => match self.bump().ok_or(LoadError::UnexpectedEnd)? {
                    '\\' => out.push('\\'),
                    '"' => out.push('"'),
                    'n' => out.push('\n'),
                    'r' => out.push('\r'),
                    't' => out.push('\t'),
                    'u' => out.push(self.read_unicode_escape(position)?),
                    ch => {
                        return Err(LoadError::UnexpectedCharacter {
                            ch,
                            position: self.position - ch.len_utf8(),
                        });
                    }
                },
                c => out.push(c),
            }
        }
    }

    /// `\u{XXXX}`, the opening `\u` already consumed.
    fn read_unicode_escape(&mut self, position: usize) -> Result<char, LoadError> {
        let bad = LoadError::UnexpectedCharacter { ch: 'u', position };
        if self.bump() != Some('{') {
            return Err(bad);
        }
        let start = self.position;
        while self.peek().is_some_and(|c| c.is_ascii_hexdigit()) {
            self.bump();
        }
        let digits = &self.input[start..self.position];
        if self.bump() != Some('}') {
            return Err(bad);
        }
        u32::from_str_radix(digits, 16)
            .ok()
            .and_then(char::from_u32)
            .ok_or(bad)
    }

    fn read_atom(&mut self) -> Result<Form, LoadError> {
        let start = self.position;
        while let Some(c) = self.peek() {
            if c.is_whitespace() || c == '(' || c == ')' || c == '"' || c == ';' {
                break;
            }
            self.bump();
        }
        let text = &self.input[start..self.position];
        let form = match text {
            "null" => Form::Null,
            "true" => Form::Boolean(true),
            "false" => Form::Boolean(false),
            _ => {
                if let Some(slot) = text.strip_prefix('%') {
                    let slot = slot.parse().map_err(|_| LoadError::UnexpectedCharacter {
                        ch: '%',
                        position: start,
                    })?;
                    Form::Slot(slot)
                } else if let Ok(n) = text.parse::<i64>() {
                    Form::Integer(n)
                } else if text.starts_with(|c: char| c.is_ascii_digit() || c == '-')
                    && let Ok(n) = text.parse::<f64>()
                {
                    Form::Float(n)
                } else if text.starts_with(|c: char| c.is_ascii_alphabetic()) {
                    Form::Symbol(text.to_string())
                } else {
                    return Err(LoadError::UnexpectedCharacter {
                        ch: text.chars().next().unwrap_or(' '),
                        position: start,
                    });
                }
            }
        };
        Ok(form)
    }
}

struct Compiler<'h> {
    slots: usize,
    declared: &'h BTreeSet<String>,
}

impl Compiler<'_> {
    fn compile(&self, form: &Form) -> Result<Node, LoadError> {
        match form {
            Form::Null => Ok(constant(Value::Null)),
            Form::Boolean(b) => Ok(constant(Value::Boolean(*b))),
            Form::Integer(n) => Ok(constant(Value::Integer(*n))),
            Form::Float(n) => Ok(constant(Value::Float(*n))),
            Form::Str(s) => Ok(constant(Value::String(s.clone()))),
            Form::Slot(slot) => {
                let slot = self.slot(*slot)?;
                Ok(node(move |frame| Ok(frame.slot(slot))))
            }
            Form::Symbol(symbol) => Err(LoadError::Malformed {
                form: symbol.clone(),
                reason: "bare symbol outside a list".to_string(),
            }),
            Form::List(items) => self.compile_list(items),
        }
    }

    fn slot(&self, slot: usize) -> Result<usize, LoadError> {
        if slot < self.slots {
            Ok(slot)
        } else {
            Err(LoadError::SlotOutOfRange {
                slot,
                slots: self.slots,
            })
        }
    }

    fn compile_all(&self, forms: &[Form]) -> Result<Vec<Node>, LoadError> {
        forms.iter().map(|f| self.compile(f)).collect()
    }

    fn compile_list(&self, items: &[Form]) -> Result<Node, LoadError> {
        let Some((Form::Symbol(head), args)) = items.split_first() else {
            return Err(LoadError::Malformed {
                form: "()".to_string(),
                reason: "list must start with a form name".to_string(),
            });
        };
        let head = head.as_str();
        if let Some(op) = BinOp::from_mnemonic(head) {
            let [left, right] = args else {
                return Err(LoadError::Malformed {
                    form: head.to_string(),
                    reason: format!("expects 2 operands, {} given", args.len()),
                });
            };
            let (left, right) = (self.compile(left)?, self.compile(right)?);
            return Ok(node(move |frame| {
                let left = left(frame)?;
                let right = right(frame)?;
                runtime::apply_binop(op, &left, &right)
            }));
        }
        match (head, args) {
            ("var", [Form::Str(name)]) => {
                let name = name.clone();
                Ok(node(move |frame| runtime::lookup_variable(frame.ctx, &name)))
            }
            ("get", [object, Form::Str(member)]) => {
                let object = self.compile(object)?;
                let member = member.clone();
                Ok(node(move |frame| {
                    let receiver = object(frame)?;
                    runtime::get_member(frame.ctx, &receiver, &member)
                }))
            }
            ("invoke", [object, Form::Str(method), call_args @ ..]) => {
                let object = self.compile(object)?;
                let method = method.clone();
                let call_args = self.compile_all(call_args)?;
                Ok(node(move |frame| {
                    let receiver = object(frame)?;
                    let args = eval_all(&call_args, frame)?;
                    runtime::call_method(frame.ctx, &receiver, &method, &args)
                }))
            }
            ("index", [object, index]) => {
                let object = self.compile(object)?;
                let index = self.compile(index)?;
                Ok(node(move |frame| {
                    let receiver = object(frame)?;
                    let index = index(frame)?;
                    runtime::get_index(frame.ctx, &receiver, &index)
                }))
            }
            ("call", [Form::Str(name), call_args @ ..]) => {
                if !self.declared.contains(name) {
                    return Err(LoadError::UndeclaredFunction(name.clone()));
                }
                let name = name.clone();
                let call_args = self.compile_all(call_args)?;
                Ok(node(move |frame| {
                    let ctx = frame.ctx;
                    let function = runtime::allowed_function(ctx, &name)?;
                    let args = eval_all(&call_args, frame)?;
                    runtime::call_function(ctx, function, &args)
                }))
            }
            ("array", items) => {
                let items = self.compile_all(items)?;
                Ok(node(move |frame| eval_all(&items, frame).map(Value::Array)))
            }
            ("neg" | "not", [operand]) => {
                let op = if head == "neg" {
                    UnaryOp::Negate
                } else {
                    UnaryOp::Not
                };
                let operand = self.compile(operand)?;
                Ok(node(move |frame| runtime::apply_unary(op, &operand(frame)?)))
            }
            ("and", [left, right]) => {
                let (left, right) = (self.compile(left)?, self.compile(right)?);
                Ok(node(move |frame| {
                    Ok(Value::Boolean(
                        left(frame)?.is_truthy() && right(frame)?.is_truthy(),
                    ))
                }))
            }
            ("or", [left, right]) => {
                let (left, right) = (self.compile(left)?, self.compile(right)?);
                Ok(node(move |frame| {
                    Ok(Value::Boolean(
                        left(frame)?.is_truthy() || right(frame)?.is_truthy(),
                    ))
                }))
            }
            ("let", [Form::Slot(slot), value, body]) => {
                let slot = self.slot(*slot)?;
                let (value, body) = (self.compile(value)?, self.compile(body)?);
                Ok(node(move |frame| {
                    let bound = value(frame)?;
                    frame.set_slot(slot, bound);
                    body(frame)
                }))
            }
            ("if", [condition, then, otherwise]) => {
                let condition = self.compile(condition)?;
                let (then, otherwise) = (self.compile(then)?, self.compile(otherwise)?);
                Ok(node(move |frame| {
                    if condition(frame)?.is_truthy() {
                        then(frame)
                    } else {
                        otherwise(frame)
                    }
                }))
            }
            ("if-null", [subject, then, otherwise]) => {
                let subject = self.compile(subject)?;
                let (then, otherwise) = (self.compile(then)?, self.compile(otherwise)?);
                Ok(node(move |frame| {
                    if subject(frame)?.is_null() {
                        then(frame)
                    } else {
                        otherwise(frame)
                    }
                }))
            }
            (
                "var" | "get" | "invoke" | "index" | "call" | "neg" | "not" | "and" | "or" | "let"
                | "if" | "if-null",
                _,
            ) => Err(LoadError::Malformed {
                form: head.to_string(),
                reason: format!("unexpected operands ({} given)", args.len()),
            }),
            (name, _) => Err(LoadError::UnknownForm(name.to_string())),
        }
    }
}

fn constant(value: Value) -> Node {
    node(move |_| Ok(value.clone()))
}

fn eval_all(nodes: &[Node], frame: &mut Frame<'_>) -> Result<Vec<Value>, EvalError> {
    nodes.iter().map(|n| n(frame)).collect()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    const HASH: &str = "ab12";

    fn unit(slots: usize, uses: &str, body: &str) -> String {
        format!("{UNIT_MAGIC}\n;; hash {HASH}\n;; query \"q\"\n;; slots {slots}\n;; uses{uses}\n{body}\n")
    }

    #[test]
    fn loads_header() {
        let loaded = CompiledUnit::load(unit(0, " f", r#"(call "f")"#)).unwrap();
        assert_eq!(loaded.hash(), HASH);
        assert_eq!(loaded.query(), "q");
        assert_eq!(loaded.used_functions().collect::<Vec<_>>(), vec!["f"]);
    }

    #[test]
    fn runs_let_and_if_null() {
        let ctx = Context::new().with_variable("x", Value::Null);
        let loaded =
            CompiledUnit::load(unit(1, "", r#"(let %0 (var "x") (if-null %0 "d" %0))"#)).unwrap();
        assert_eq!(loaded.call(&ctx).unwrap(), Value::from("d"));
    }

    #[test]
    fn string_escapes_round_trip() {
        let loaded = CompiledUnit::load(unit(0, "", r#""a\"b\u{0001}""#)).unwrap();
        assert_eq!(
            loaded.call(&Context::new()).unwrap(),
            Value::from("a\"b\u{1}")
        );
    }

    #[test]
    fn rejects_bad_units() {
        assert_eq!(
            CompiledUnit::load("garbage").unwrap_err(),
            LoadError::MissingHeader("magic")
        );
        assert_eq!(
            CompiledUnit::load(unit(0, "", "%0")).unwrap_err(),
            LoadError::SlotOutOfRange { slot: 0, slots: 0 }
        );
        assert_eq!(
            CompiledUnit::load(unit(0, "", r#"(call "g")"#)).unwrap_err(),
            LoadError::UndeclaredFunction("g".to_string())
        );
        assert_eq!(
            CompiledUnit::load(unit(0, "", "(add 1 2")).unwrap_err(),
            LoadError::UnexpectedEnd
        );
        assert_eq!(
            CompiledUnit::load(unit(0, "", "(frobnicate 1)")).unwrap_err(),
            LoadError::UnknownForm("frobnicate".to_string())
        );
    }

    #[test]
    fn deep_nesting_is_rejected() {
        let body = format!("{}1{}", "(neg ".repeat(MAX_FORM_DEPTH + 1), ")".repeat(MAX_FORM_DEPTH + 1));
        assert_eq!(
            CompiledUnit::load(unit(0, "", &body)).unwrap_err(),
            LoadError::TooDeep(MAX_FORM_DEPTH)
        );
    }

    #[test]
    fn depth_limit_can_be_raised() {
        let levels = MAX_FORM_DEPTH + 10;
        let body = format!("{}1{}", "(neg ".repeat(levels), ")".repeat(levels));
        let source = unit(0, "", &body);
        assert_eq!(
            CompiledUnit::load_with_depth(source.clone(), levels - 1).unwrap_err(),
            LoadError::TooDeep(levels - 1)
        );
        assert!(CompiledUnit::load_with_depth(source, levels).is_ok());
    }

    #[test]
    fn form_limit_follows_parser_depth() {
        assert_eq!(form_depth_limit(100), MAX_FORM_DEPTH);
        assert_eq!(form_depth_limit(2000), 6000);
        assert_eq!(form_depth_limit(usize::MAX), usize::MAX);
    }
}
