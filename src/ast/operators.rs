/// Binary operators that always evaluate both operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    // Comparison
    /// Loose equality (`==`), numbers compare across integer/float
    Equal,
    /// Loose inequality (`!=`)
    NotEqual,
    /// Strict equality (`===`), variants must match
    Identical,
    /// Strict inequality (`!==`)
    NotIdentical,
    /// Less than (`<`)
    LessThan,
    /// Greater than (`>`)
    GreaterThan,
    /// Less than or equal (`<=`)
    LessEqual,
    /// Greater than or equal (`>=`)
    GreaterEqual,

    // Arithmetic
    /// Addition or string concatenation (`+`)
    Add,
    /// Subtraction (`-`)
    Subtract,
    /// Multiplication (`*`)
    Multiply,
    /// Division (`/`)
    Divide,
    /// Modulo (`%`)
    Modulo,
}

impl BinOp {
    /// Form name used by generated unit source.
    pub fn mnemonic(self) -> &'static str {
        match self {
            BinOp::Equal => "eq",
            BinOp::NotEqual => "neq",
            BinOp::Identical => "same",
            BinOp::NotIdentical => "nsame",
            BinOp::LessThan => "lt",
            BinOp::GreaterThan => "gt",
            BinOp::LessEqual => "lte",
            BinOp::GreaterEqual => "gte",
            BinOp::Add => "add",
            BinOp::Subtract => "sub",
            BinOp::Multiply => "mul",
            BinOp::Divide => "div",
            BinOp::Modulo => "mod",
        }
    }

    /// Operator as written in a query.
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Equal => "==",
            BinOp::NotEqual => "!=",
            BinOp::Identical => "===",
            BinOp::NotIdentical => "!==",
            BinOp::LessThan => "<",
            BinOp::GreaterThan => ">",
            BinOp::LessEqual => "<=",
            BinOp::GreaterEqual => ">=",
            BinOp::Add => "+",
            BinOp::Subtract => "-",
            BinOp::Multiply => "*",
            BinOp::Divide => "/",
            BinOp::Modulo => "%",
        }
    }

    pub fn from_mnemonic(name: &str) -> Option<Self> {
        Some(match name {
            "eq" => BinOp::Equal,
            "neq" => BinOp::NotEqual,
            "same" => BinOp::Identical,
            "nsame" => BinOp::NotIdentical,
            "lt" => BinOp::LessThan,
            "gt" => BinOp::GreaterThan,
            "lte" => BinOp::LessEqual,
            "gte" => BinOp::GreaterEqual,
            "add" => BinOp::Add,
            "sub" => BinOp::Subtract,
            "mul" => BinOp::Multiply,
            "div" => BinOp::Divide,
            "mod" => BinOp::Modulo,
            _ => return None,
        })
    }
}

/// Short-circuiting operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    /// `&&` / `and`
    And,
    /// `||` / `or`
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// `!`
    Not,
    /// `-`
    Negate,
}
