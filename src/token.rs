use crate::types::DataType;
use std::fmt;

/// Where a token or node came from. `row` is 1-based, `col` 0-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location<'a> {
    pub file: &'a str,
    pub row: usize,
    pub col: usize,
}

impl<'a> Location<'a> {
    pub fn new(file: &'a str, row: usize, col: usize) -> Self {
        Location { file, row, col }
    }
}

impl fmt::Display for Location<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.row, self.col)
    }
}

/// Functions built into the language. They are not reserved keywords in the grammar, but
/// their names can not be used as identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    Alloc,
    Dealloc,
    Store,
    Tovp,
    Get,
    Dll,
    Call,
}

impl Builtin {
    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "alloc" => Builtin::Alloc,
            "dealloc" => Builtin::Dealloc,
            "store" => Builtin::Store,
            "tovp" => Builtin::Tovp,
            "get" => Builtin::Get,
            "dll" => Builtin::Dll,
            "call" => Builtin::Call,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Builtin::Alloc => "alloc",
            Builtin::Dealloc => "dealloc",
            Builtin::Store => "store",
            Builtin::Tovp => "tovp",
            Builtin::Get => "get",
            Builtin::Dll => "dll",
            Builtin::Call => "call",
        }
    }

    pub fn return_type(self) -> DataType {
        match self {
            Builtin::Alloc | Builtin::Tovp | Builtin::Get => DataType::Ptr,
            Builtin::Store | Builtin::Dealloc | Builtin::Dll => DataType::Void,
            Builtin::Call => DataType::Int,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind<'a> {
    Write,
    Exit,
    Builtin(Builtin),
    Ident(&'a str),

    Colon,
    OParen,
    CParen,
    OBracket,
    CBracket,
    OCurly,
    CCurly,
    Comma,
    Dot,

    Eq,
    DoubleEq,
    NotEq,
    GreaterEq,
    LessEq,
    Greater,
    Less,
    Plus,
    Minus,
    Mult,
    Div,
    Mod,
    And,
    Or,
    Ampersand,

    /// Escapes are already resolved, so the value is owned
    String(String),
    Char(u8),
    Integer(i64),
    Float(f64),

    Struct,
    Type(DataType),
    If,
    Else,
    While,
    Then,
    Return,
    End,
    Const,
}

impl<'a> TokenKind<'a> {
    /// Classify a word: keyword, then type name, then builtin, then identifier.
    pub fn new(word: &'a str) -> Self {
        match word {
            "write" => TokenKind::Write,
            "exit" => TokenKind::Exit,
            "if" => TokenKind::If,
            "else" => TokenKind::Else,
            "while" => TokenKind::While,
            "then" => TokenKind::Then,
            "return" => TokenKind::Return,
            "end" => TokenKind::End,
            "const" => TokenKind::Const,
            "struct" => TokenKind::Struct,
            _ => {
                if let Some(ty) = DataType::from_name(word) {
                    TokenKind::Type(ty)
                } else if let Some(builtin) = Builtin::from_name(word) {
                    TokenKind::Builtin(builtin)
                } else {
                    TokenKind::Ident(word)
                }
            }
        }
    }

    /// Short name used in diagnostics
    pub fn name(&self) -> &'static str {
        match self {
            TokenKind::Write => "write",
            TokenKind::Exit => "exit",
            TokenKind::Builtin(_) => "builtin",
            TokenKind::Ident(_) => "ident",
            TokenKind::Colon => ":",
            TokenKind::OParen => "(",
            TokenKind::CParen => ")",
            TokenKind::OBracket => "[",
            TokenKind::CBracket => "]",
            TokenKind::OCurly => "{",
            TokenKind::CCurly => "}",
            TokenKind::Comma => ",",
            TokenKind::Dot => ".",
            TokenKind::Eq => "=",
            TokenKind::DoubleEq => "==",
            TokenKind::NotEq => "!=",
            TokenKind::GreaterEq => ">=",
            TokenKind::LessEq => "<=",
            TokenKind::Greater => ">",
            TokenKind::Less => "<",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Mult => "*",
            TokenKind::Div => "/",
            TokenKind::Mod => "%",
            TokenKind::And => "&&",
            TokenKind::Or => "||",
            TokenKind::Ampersand => "&",
            TokenKind::String(_) => "string",
            TokenKind::Char(_) => "char",
            TokenKind::Integer(_) => "integer",
            TokenKind::Float(_) => "float",
            TokenKind::Struct => "struct",
            TokenKind::Type(_) => "type",
            TokenKind::If => "if",
            TokenKind::Else => "else",
            TokenKind::While => "while",
            TokenKind::Then => "then",
            TokenKind::Return => "return",
            TokenKind::End => "end",
            TokenKind::Const => "const",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token<'a> {
    pub kind: TokenKind<'a>,
    pub loc: Location<'a>,
}

impl<'a> Token<'a> {
    pub fn new(kind: TokenKind<'a>, loc: Location<'a>) -> Self {
        Token { kind, loc }
    }
}

/// One line per token: `row:col: kind value`
pub fn dump(tokens: &[Token<'_>]) -> String {
    let mut out = String::new();
    for token in tokens {
        out.push_str(&format!(
            "{}:{}: {}",
            token.loc.row,
            token.loc.col,
            token.kind.name()
        ));
        let value = match &token.kind {
            TokenKind::Ident(name) => Some(name.to_string()),
            TokenKind::String(s) => Some(format!("{s:?}")),
            TokenKind::Char(c) => Some(format!("{:?}", *c as char)),
            TokenKind::Integer(n) => Some(n.to_string()),
            TokenKind::Float(n) => Some(n.to_string()),
            TokenKind::Type(ty) => Some(ty.to_string()),
            TokenKind::Builtin(builtin) => Some(builtin.name().to_string()),
            _ => None,
        };
        if let Some(value) = value {
            out.push_str(", ");
            out.push_str(&value);
        }
        out.push('\n');
    }
    out
}
