/// All lexemes in the input specification language.
#[derive(Clone, Debug, PartialEq)]
pub enum Lexeme {
    // Declarations
    Field,
    Predicate,
    Method,
    Returns,
    Requires,
    Ensures,
    Invariant,

    // Statements
    Var,
    While,
    If,
    Else,
    Inhale,
    Exhale,
    Fold,
    Unfold,
    Assert,
    Assume,
    Label,
    Havoc,

    // Expressions
    Acc,
    Null,
    True,
    False,

    // Type keywords
    RefTy,
    IntTy,
    BoolTy,

    // Symbols
    LParen,   // (
    RParen,   // )
    LBrace,   // {
    RBrace,   // }
    Comma,    // ,
    Colon,    // :
    Dot,      // .
    Question, // ?
    Assign,   // :=
    EqEq,     // ==
    NotEq,    // !=
    Lt,       // <
    Le,       // <=
    Gt,       // >
    Ge,       // >=
    Plus,     // +
    Minus,    // -
    Star,     // *
    AndAnd,   // &&
    OrOr,     // ||
    Implies,  // ==>
    Bang,     // !

    // Literals
    Integer(i64),
    Ident(String),

    // End of file
    Eof,
}

impl Lexeme {
    /// Human-readable name for error messages.
    pub fn describe(&self) -> String {
        match self {
            Lexeme::Integer(n) => format!("integer `{}`", n),
            Lexeme::Ident(s) => format!("identifier `{}`", s),
            Lexeme::Eof => "end of file".to_string(),
            other => format!("`{}`", other.text()),
        }
    }

    fn text(&self) -> &'static str {
        match self {
            Lexeme::Field => "field",
            Lexeme::Predicate => "predicate",
            Lexeme::Method => "method",
            Lexeme::Returns => "returns",
            Lexeme::Requires => "requires",
            Lexeme::Ensures => "ensures",
            Lexeme::Invariant => "invariant",
            Lexeme::Var => "var",
            Lexeme::While => "while",
            Lexeme::If => "if",
            Lexeme::Else => "else",
            Lexeme::Inhale => "inhale",
            Lexeme::Exhale => "exhale",
            Lexeme::Fold => "fold",
            Lexeme::Unfold => "unfold",
            Lexeme::Assert => "assert",
            Lexeme::Assume => "assume",
            Lexeme::Label => "label",
            Lexeme::Havoc => "havoc",
            Lexeme::Acc => "acc",
            Lexeme::Null => "null",
            Lexeme::True => "true",
            Lexeme::False => "false",
            Lexeme::RefTy => "Ref",
            Lexeme::IntTy => "Int",
            Lexeme::BoolTy => "Bool",
            Lexeme::LParen => "(",
            Lexeme::RParen => ")",
            Lexeme::LBrace => "{",
            Lexeme::RBrace => "}",
            Lexeme::Comma => ",",
            Lexeme::Colon => ":",
            Lexeme::Dot => ".",
            Lexeme::Question => "?",
            Lexeme::Assign => ":=",
            Lexeme::EqEq => "==",
            Lexeme::NotEq => "!=",
            Lexeme::Lt => "<",
            Lexeme::Le => "<=",
            Lexeme::Gt => ">",
            Lexeme::Ge => ">=",
            Lexeme::Plus => "+",
            Lexeme::Minus => "-",
            Lexeme::Star => "*",
            Lexeme::AndAnd => "&&",
            Lexeme::OrOr => "||",
            Lexeme::Implies => "==>",
            Lexeme::Bang => "!",
            Lexeme::Integer(_) | Lexeme::Ident(_) | Lexeme::Eof => "",
        }
    }
}
