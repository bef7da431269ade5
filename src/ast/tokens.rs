/// A lexical token: what was matched, the raw lexeme, and where it starts.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Raw lexeme as written in the query (string literals keep their quotes)
    pub text: String,
    /// Byte offset of the first byte of the lexeme
    pub position: usize,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, position: usize) -> Self {
        Token {
            kind,
            text: text.into(),
            position,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Literals
    /// Integer
    ///
    /// # Examples
    /// ```text
    /// 42
    /// 0
    /// ```
    Integer(i64),

    /// Decimal number
    ///
    /// # Examples
    /// ```text
    /// 3.14
    /// 0.5
    /// ```
    Float(f64),

    /// String literal in single or double quotes, escapes already resolved
    ///
    /// # Examples
    /// ```text
    /// 'listed'
    /// "item #1"
    /// ```
    String(String),

    /// `true` / `false`
    Boolean(bool),

    /// `null`
    Null,

    /// Variable, member, method or function name
    ///
    /// Must start with an ASCII letter or underscore, followed by ASCII
    /// letters, digits, or underscores.
    ///
    /// # Examples
    /// ```text
    /// page
    /// filterBy
    /// _internal
    /// ```
    Identifier(String),

    // Member access
    /// Member access (`.`)
    Dot,

    /// Nullsafe member access (`?.`)
    ///
    /// # Examples
    /// ```text
    /// page.parent?.title
    /// ```
    QuestionDot,

    /// Null-coalescing (`??`)
    ///
    /// # Examples
    /// ```text
    /// page.subtitle ?? page.title
    /// ```
    QuestionQuestion,

    /// Elvis / default ternary (`?:`)
    ///
    /// # Examples
    /// ```text
    /// page.subtitle ?: 'untitled'
    /// ```
    QuestionColon,

    /// Ternary condition (`?`)
    Question,

    /// Ternary branch separator (`:`)
    Colon,

    // Arithmetic
    /// Addition or string concatenation
    Plus,

    /// Subtraction or negation
    Minus,

    /// Multiplication
    Star,

    /// Division
    Slash,

    /// Modulo
    Percent,

    // Comparison
    /// Loose equality (`==`)
    EqEq,

    /// Loose inequality (`!=`)
    NotEq,

    /// Strict equality (`===`)
    EqEqEq,

    /// Strict inequality (`!==`)
    NotEqEq,

    /// Less than
    Lt,

    /// Less than or equal
    LtEq,

    /// Greater than
    Gt,

    /// Greater than or equal
    GtEq,

    // Logical
    /// Logical AND (`&&` or the word `and`)
    AndAnd,

    /// Logical OR (`||` or the word `or`)
    OrOr,

    /// Logical NOT (`!`)
    Bang,

    // Delimiters
    /// Left parenthesis for grouping or calls
    LParen,

    /// Right parenthesis
    RParen,

    /// Left bracket for index access or array literals
    LBracket,

    /// Right bracket
    RBracket,

    /// Argument or array item separator
    Comma,

    /// End of input
    Eof,
}

impl TokenKind {
    /// Short human-readable name used in parse errors.
    pub fn describe(&self) -> &'static str {
        match self {
            TokenKind::Integer(_) => "integer",
            TokenKind::Float(_) => "number",
            TokenKind::String(_) => "string",
            TokenKind::Boolean(_) => "boolean",
            TokenKind::Null => "null",
            TokenKind::Identifier(_) => "identifier",
            TokenKind::Dot => "'.'",
            TokenKind::QuestionDot => "'?.'",
            TokenKind::QuestionQuestion => "'??'",
            TokenKind::QuestionColon => "'?:'",
            TokenKind::Question => "'?'",
            TokenKind::Colon => "':'",
            TokenKind::Plus => "'+'",
            TokenKind::Minus => "'-'",
            TokenKind::Star => "'*'",
            TokenKind::Slash => "'/'",
            TokenKind::Percent => "'%'",
            TokenKind::EqEq => "'=='",
            TokenKind::NotEq => "'!='",
            TokenKind::EqEqEq => "'==='",
            TokenKind::NotEqEq => "'!=='",
            TokenKind::Lt => "'<'",
            TokenKind::LtEq => "'<='",
            TokenKind::Gt => "'>'",
            TokenKind::GtEq => "'>='",
            TokenKind::AndAnd => "'&&'",
            TokenKind::OrOr => "'||'",
            TokenKind::Bang => "'!'",
            TokenKind::LParen => "'('",
            TokenKind::RParen => "')'",
            TokenKind::LBracket => "'['",
            TokenKind::RBracket => "']'",
            TokenKind::Comma => "','",
            TokenKind::Eof => "end of input",
        }
    }
}
