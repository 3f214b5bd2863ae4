//! Error types of the compiler front end and the virtual machine.

use crate::token::Location;
use thiserror::Error;

/// A located compile-time diagnostic.
///
/// The location is copied out of the source so that the error can outlive the buffer the
/// tokens borrow from.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{file}:{row}:{col}: {kind}")]
pub struct CompileError {
    pub file: String,
    pub row: usize,
    pub col: usize,
    pub kind: CompileErrorKind,
}

impl CompileError {
    pub fn new(loc: Location<'_>, kind: CompileErrorKind) -> Self {
        CompileError {
            file: loc.file.to_string(),
            row: loc.row,
            col: loc.col,
            kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileErrorKind {
    // Lexer
    #[error("invalid preprocessor directive")]
    InvalidDirective,

    #[error("unexpected escape character: `{0}`")]
    InvalidEscape(char),

    #[error("expected closing `\"`")]
    UnterminatedString,

    #[error("expected closing `'` quote")]
    UnterminatedChar,

    #[error("character cannot be made up of multiple characters")]
    MultiCharLiteral,

    #[error("unexpected token `{0}`")]
    UnexpectedChar(char),

    // Parser
    #[error("out of tokens")]
    OutOfTokens,

    #[error("expected type: `{expected}`, but found type `{found}`")]
    ExpectedToken {
        expected: &'static str,
        found: &'static str,
    },

    #[error("expected int, string, char, or ident but found {0}")]
    ExpectedPrimary(&'static str),

    #[error("expected `type` but found `{0}`")]
    ExpectedType(&'static str),

    #[error("unexpected token: {0}")]
    UnexpectedToken(&'static str),

    #[error("Unknown variable: {0}")]
    UnknownVariable(String),

    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    #[error("very unknown struct {0}")]
    UnknownStruct(String),

    #[error("Unknown type name `{0}`")]
    UnknownType(String),

    #[error("struct `{structure}` has no field `{field}`")]
    UnknownField { structure: String, field: String },

    #[error("expression with types of both {0} and {1}")]
    MixedTypes(&'static str, &'static str),

    #[error("expected type `{expected}` but found type `{found}`")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("argument {name} expected data type {expected} but found {found}")]
    ArgumentType {
        name: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("function `{name}` expects {expected} arguments but found {found}")]
    ArgumentCount {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("expression does not match the type of the var {name} types {expected} and {found}")]
    VarTypeMismatch {
        name: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("expression does not match the type of field `{0}`")]
    FieldTypeMismatch(String),

    #[error("struct `{name}` has {expected} fields but found {found}")]
    FieldCount {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("expected struct definition but found `{0}`")]
    ExpectedStruct(&'static str),

    #[error("Variable `{0}` is constant")]
    ConstVariable(String),

    #[error("field `{0}` is const, cannot reassign")]
    ConstField(String),

    #[error("`else` statement without prior `if`")]
    ElseWithoutIf,

    #[error("`end` without an opening block")]
    EndWithoutBlock,

    #[error("assigning to a field of an array element is not supported")]
    ArrayFieldAssign,
}

/// A fatal error raised while executing bytecode.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("error: stack overflow")]
    StackOverflow,

    #[error("error: stack underflow")]
    StackUnderflow,

    #[error("error: return stack overflow")]
    ReturnStackOverflow,

    #[error("error: return without a call")]
    ReturnStackUnderflow,

    #[error("error: index out of range")]
    IndexOutOfRange,

    #[error("error: cannot divide by 0")]
    DivideByZero,

    #[error("could not free pointer")]
    InvalidFree,

    #[error("error: cannot jump to 0")]
    JumpToZero,

    #[error("error: cannot {op} out of bounds to: {target}")]
    JumpOutOfBounds { op: &'static str, target: i64 },

    #[error("error: {op} expected {expected} but found {found}")]
    UnexpectedType {
        op: &'static str,
        expected: &'static str,
        found: &'static str,
    },

    #[error("error: size cannot be negative")]
    NegativeSize,

    #[error("error: cannot move {0} bytes through a single word")]
    SizeTooLarge(i64),

    #[error("error: null pointer access")]
    NullPointer,

    #[error("error: unknown type tag {0}")]
    UnknownType(i64),

    #[error("error: string {0} is not in the string table")]
    UnknownString(i64),

    #[error("error: native function {0} is not loaded")]
    UnknownNative(i64),

    #[error("error: native table is full")]
    NativeTableFull,

    #[error("error: invalid register r{0}")]
    InvalidRegister(usize),

    #[error("error: unsupported stream {0}")]
    UnsupportedStream(i64),

    #[error("error loading lib: {0}")]
    LibraryLoad(String),

    #[error("error loading function: {0}")]
    SymbolLoad(String),

    #[error("error: `{0}` can not be executed")]
    NotExecutable(&'static str),

    #[error("error: program has already ended")]
    Halted,

    #[error("error: {0}")]
    Io(#[from] std::io::Error),
}
