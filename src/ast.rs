//! The typed syntax tree handed from the parser to code generation.

use crate::arena::{Arena, Id};
use crate::token::{Builtin, Location, TokenKind};
use crate::types::DataType;
use std::ops::Index;

pub type ExprId<'a> = Id<Expr<'a>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Plus,
    Minus,
    Mult,
    Div,
    Mod,
    Eq,
    NotEq,
    GreaterEq,
    LessEq,
    Greater,
    Less,
    And,
    Or,
}

impl BinOp {
    pub fn from_token(kind: &TokenKind<'_>) -> Option<Self> {
        Some(match kind {
            TokenKind::Plus => BinOp::Plus,
            TokenKind::Minus => BinOp::Minus,
            TokenKind::Mult => BinOp::Mult,
            TokenKind::Div => BinOp::Div,
            TokenKind::Mod => BinOp::Mod,
            TokenKind::DoubleEq => BinOp::Eq,
            TokenKind::NotEq => BinOp::NotEq,
            TokenKind::GreaterEq => BinOp::GreaterEq,
            TokenKind::LessEq => BinOp::LessEq,
            TokenKind::Greater => BinOp::Greater,
            TokenKind::Less => BinOp::Less,
            TokenKind::And => BinOp::And,
            TokenKind::Or => BinOp::Or,
            _ => return None,
        })
    }

    /// Binding power, higher binds tighter
    pub fn precedence(self) -> u8 {
        match self {
            BinOp::Mult | BinOp::Div | BinOp::Mod | BinOp::And | BinOp::Or => 2,
            _ => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind<'a> {
    Int(i64),
    Float(f64),
    Str(String),
    Char(u8),
    Binary {
        op: BinOp,
        lhs: ExprId<'a>,
        rhs: ExprId<'a>,
    },
    Var(&'a str),
    Index {
        array: &'a str,
        index: ExprId<'a>,
    },
    Field {
        structure: &'a str,
        field: &'a str,
    },
    /// `array[index].field`
    IndexField {
        array: &'a str,
        index: ExprId<'a>,
        field: &'a str,
    },
    Call {
        name: &'a str,
        args: Vec<ExprId<'a>>,
    },
    ExtCall {
        name: &'a str,
        args: Vec<ExprId<'a>>,
    },
    /// Positional struct literal
    Struct {
        values: Vec<ExprId<'a>>,
    },
    Builtin {
        kind: Builtin,
        args: Vec<ExprId<'a>>,
    },
    /// The `dll` builtin, declaring a group of foreign functions
    Dll(ExtFuncs<'a>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr<'a> {
    pub kind: ExprKind<'a>,
    pub data_type: DataType,
    pub loc: Location<'a>,
}

impl Expr<'_> {
    /// Type name used in diagnostics. String literals are typed as `char` but read as `str`.
    pub fn type_name(&self) -> &'static str {
        match self.kind {
            ExprKind::Str(_) => DataType::Str.name(),
            _ => self.data_type.name(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Variable<'a> {
    pub name: &'a str,
    pub data_type: DataType,
    pub is_const: bool,
    pub is_array: bool,
    pub is_struct: bool,
    pub struct_name: Option<&'a str>,
    /// Owning function, `None` for globals
    pub function: Option<&'a str>,
}

impl<'a> Variable<'a> {
    pub fn new(name: &'a str, data_type: DataType) -> Self {
        Variable {
            name,
            data_type,
            is_const: false,
            is_array: false,
            is_struct: false,
            struct_name: None,
            function: None,
        }
    }

    pub fn is_global(&self) -> bool {
        self.function.is_none()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Struct<'a> {
    pub name: &'a str,
    pub fields: Vec<Variable<'a>>,
}

impl<'a> Struct<'a> {
    pub fn field(&self, name: &str) -> Option<&Variable<'a>> {
        self.fields.iter().find(|field| field.name == name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function<'a> {
    pub name: &'a str,
    pub args: Vec<Variable<'a>>,
    pub return_type: DataType,
    pub label: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExtArg<'a> {
    pub data_type: DataType,
    pub is_struct: bool,
    pub struct_name: Option<&'a str>,
    /// Passed by reference (`Struct&`)
    pub is_ptr: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExtFunc<'a> {
    pub name: &'a str,
    pub args: Vec<ExtArg<'a>>,
    pub return_type: DataType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExtFuncs<'a> {
    pub file_name: String,
    pub funcs: Vec<ExtFunc<'a>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeKind {
    Write,
    Exit,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind<'a> {
    VarDecl {
        var: Variable<'a>,
        array_size: Option<ExprId<'a>>,
        values: Vec<ExprId<'a>>,
    },
    VarReassign {
        name: &'a str,
        value: ExprId<'a>,
    },
    IndexAssign {
        array: &'a str,
        index: ExprId<'a>,
        value: ExprId<'a>,
    },
    FieldReassign {
        structure: &'a str,
        field: &'a str,
        value: ExprId<'a>,
    },
    FuncDecl(Function<'a>),
    FuncCall {
        name: &'a str,
        args: Vec<ExprId<'a>>,
    },
    StructDecl(Struct<'a>),
    If {
        cond: ExprId<'a>,
    },
    /// `label1` is the entry of the else branch, `label2` the end of the whole conditional
    Else {
        label1: usize,
        label2: usize,
    },
    While {
        cond: ExprId<'a>,
    },
    Then {
        label: usize,
    },
    End {
        label: usize,
    },
    Return(ExprId<'a>),
    ExprStmt(ExprId<'a>),
    Native {
        kind: NativeKind,
        args: Vec<ExprId<'a>>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node<'a> {
    pub kind: NodeKind<'a>,
    pub loc: Location<'a>,
}

impl<'a> Node<'a> {
    pub fn new(kind: NodeKind<'a>, loc: Location<'a>) -> Self {
        Node { kind, loc }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Symbol<'a> {
    Var(Variable<'a>),
    Func(Function<'a>),
    Struct(Struct<'a>),
    Ext(ExtFunc<'a>),
}

/// Open structural block while parsing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Block<'a> {
    If,
    Else,
    While,
    Func(&'a str),
}

/// Everything the parser produced for one compilation unit.
#[derive(Debug, Default)]
pub struct Program<'a> {
    /// Statements in source order. Function bodies are inline, delimited by `end`.
    pub nodes: Vec<Node<'a>>,
    pub functions: Vec<Function<'a>>,
    pub structs: Vec<Node<'a>>,
    /// Declarations of global variables
    pub globals: Vec<Node<'a>>,
    pub symbols: Vec<Symbol<'a>>,
    /// `dll` statements, kept apart for import table generation
    pub ext_nodes: Vec<Node<'a>>,
    pub exprs: Arena<Expr<'a>>,
}

impl<'a> Program<'a> {
    pub fn variables(&self) -> impl Iterator<Item = &Variable<'a>> {
        self.symbols.iter().filter_map(|symbol| match symbol {
            Symbol::Var(var) => Some(var),
            _ => None,
        })
    }
}

impl<'a> Index<ExprId<'a>> for Program<'a> {
    type Output = Expr<'a>;

    fn index(&self, id: ExprId<'a>) -> &Expr<'a> {
        &self.exprs[id]
    }
}
