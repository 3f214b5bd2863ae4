//! Bytecode representation

mod disasm;
mod file;

pub use disasm::{disassemble, escape_str, render, render_data};

/// Operations of the virtual machine, numbered in file order
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
#[repr(u8)]
pub enum Op {
    Nop,
    Push,
    PushStr,
    Mov,
    Ref,
    Deref,
    Alloc,
    Dealloc,
    Write,
    Read,
    Pop,
    Dup,
    Indup,
    Swap,
    Inswap,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    And,
    Or,
    AddF,
    SubF,
    MulF,
    DivF,
    ModF,
    Cmpe,
    Cmpne,
    Cmpg,
    Cmpl,
    Cmpge,
    Cmple,
    Itof,
    Ftoi,
    Itoc,
    Toi,
    Tof,
    Toc,
    Tovp,
    Call,
    Ret,
    Jmp,
    Zjmp,
    Nzjmp,
    Print,
    Native,
    Entrypoint,
    LoadLib,
    Ss,
    Halt,
}

impl Op {
    pub const ALL: [Op; 51] = [
        Op::Nop,
        Op::Push,
        Op::PushStr,
        Op::Mov,
        Op::Ref,
        Op::Deref,
        Op::Alloc,
        Op::Dealloc,
        Op::Write,
        Op::Read,
        Op::Pop,
        Op::Dup,
        Op::Indup,
        Op::Swap,
        Op::Inswap,
        Op::Add,
        Op::Sub,
        Op::Mul,
        Op::Div,
        Op::Mod,
        Op::And,
        Op::Or,
        Op::AddF,
        Op::SubF,
        Op::MulF,
        Op::DivF,
        Op::ModF,
        Op::Cmpe,
        Op::Cmpne,
        Op::Cmpg,
        Op::Cmpl,
        Op::Cmpge,
        Op::Cmple,
        Op::Itof,
        Op::Ftoi,
        Op::Itoc,
        Op::Toi,
        Op::Tof,
        Op::Toc,
        Op::Tovp,
        Op::Call,
        Op::Ret,
        Op::Jmp,
        Op::Zjmp,
        Op::Nzjmp,
        Op::Print,
        Op::Native,
        Op::Entrypoint,
        Op::LoadLib,
        Op::Ss,
        Op::Halt,
    ];

    pub fn from_u8(byte: u8) -> Option<Self> {
        Self::ALL.get(byte as usize).copied()
    }

    pub fn from_mnemonic(word: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|op| op.mnemonic() == word)
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            Op::Nop => "nop",
            Op::Push => "push",
            Op::PushStr => "push_str",
            Op::Mov => "mov",
            Op::Ref => "ref",
            Op::Deref => "deref",
            Op::Alloc => "alloc",
            Op::Dealloc => "dealloc",
            Op::Write => "write",
            Op::Read => "read",
            Op::Pop => "pop",
            Op::Dup => "dup",
            Op::Indup => "indup",
            Op::Swap => "swap",
            Op::Inswap => "inswap",
            Op::Add => "add",
            Op::Sub => "sub",
            Op::Mul => "mul",
            Op::Div => "div",
            Op::Mod => "mod",
            Op::And => "and",
            Op::Or => "or",
            Op::AddF => "add_f",
            Op::SubF => "sub_f",
            Op::MulF => "mul_f",
            Op::DivF => "div_f",
            Op::ModF => "mod_f",
            Op::Cmpe => "cmpe",
            Op::Cmpne => "cmpne",
            Op::Cmpg => "cmpg",
            Op::Cmpl => "cmpl",
            Op::Cmpge => "cmpge",
            Op::Cmple => "cmple",
            Op::Itof => "itof",
            Op::Ftoi => "ftoi",
            Op::Itoc => "itoc",
            Op::Toi => "toi",
            Op::Tof => "tof",
            Op::Toc => "toc",
            Op::Tovp => "tovp",
            Op::Call => "call",
            Op::Ret => "ret",
            Op::Jmp => "jmp",
            Op::Zjmp => "zjmp",
            Op::Nzjmp => "nzjmp",
            Op::Print => "print",
            Op::Native => "native",
            Op::Entrypoint => "entrypoint",
            Op::LoadLib => "load_lib",
            Op::Ss => "ss",
            Op::Halt => "halt",
        }
    }

    /// Whether the instruction reads its value field
    pub fn has_operand(self) -> bool {
        matches!(
            self,
            Op::Push
                | Op::PushStr
                | Op::Mov
                | Op::Call
                | Op::Jmp
                | Op::Zjmp
                | Op::Nzjmp
                | Op::Native
                | Op::Entrypoint
        )
    }

    /// Instructions whose operand is an instruction index
    pub fn is_jump(self) -> bool {
        matches!(self, Op::Call | Op::Jmp | Op::Zjmp | Op::Nzjmp)
    }
}

/// Type tag carried next to every word
#[derive(Debug, Clone, Copy, Default, Hash, Eq, PartialEq)]
#[repr(u8)]
pub enum ValueType {
    #[default]
    Int,
    U8,
    U16,
    U32,
    U64,
    Float,
    Double,
    Char,
    Ptr,
    /// The operand names a register
    Reg,
    /// The operand is the top of the stack
    Top,
}

impl ValueType {
    pub const ALL: [ValueType; 11] = [
        ValueType::Int,
        ValueType::U8,
        ValueType::U16,
        ValueType::U32,
        ValueType::U64,
        ValueType::Float,
        ValueType::Double,
        ValueType::Char,
        ValueType::Ptr,
        ValueType::Reg,
        ValueType::Top,
    ];

    pub fn from_u8(byte: u8) -> Option<Self> {
        Self::ALL.get(byte as usize).copied()
    }

    pub fn from_i64(tag: i64) -> Option<Self> {
        u8::try_from(tag).ok().and_then(Self::from_u8)
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|ty| ty.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            ValueType::Int => "int",
            ValueType::U8 => "u8",
            ValueType::U16 => "u16",
            ValueType::U32 => "u32",
            ValueType::U64 => "u64",
            ValueType::Float => "float",
            ValueType::Double => "double",
            ValueType::Char => "char",
            ValueType::Ptr => "ptr",
            ValueType::Reg => "reg",
            ValueType::Top => "top",
        }
    }
}

/// An untagged 64-bit scalar. Narrow views read the low bits, `f32` lives in the low 32 bits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct Word(u64);

impl Word {
    pub fn from_bits(bits: u64) -> Self {
        Word(bits)
    }

    pub fn from_int(value: i64) -> Self {
        Word(value as u64)
    }

    pub fn from_u64(value: u64) -> Self {
        Word(value)
    }

    pub fn from_float(value: f32) -> Self {
        Word(value.to_bits() as u64)
    }

    pub fn from_double(value: f64) -> Self {
        Word(value.to_bits())
    }

    pub fn from_char(value: u8) -> Self {
        Word(value as u64)
    }

    pub fn from_ptr(ptr: *mut u8) -> Self {
        Word(ptr as usize as u64)
    }

    pub fn bits(self) -> u64 {
        self.0
    }

    pub fn as_int(self) -> i64 {
        self.0 as i64
    }

    pub fn as_u8(self) -> u8 {
        self.0 as u8
    }

    pub fn as_u16(self) -> u16 {
        self.0 as u16
    }

    pub fn as_u32(self) -> u32 {
        self.0 as u32
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }

    pub fn as_float(self) -> f32 {
        f32::from_bits(self.0 as u32)
    }

    pub fn as_double(self) -> f64 {
        f64::from_bits(self.0)
    }

    pub fn as_char(self) -> u8 {
        self.0 as u8
    }

    pub fn as_ptr(self) -> *mut u8 {
        self.0 as usize as *mut u8
    }

    pub fn to_le_bytes(self) -> [u8; 8] {
        self.0.to_le_bytes()
    }

    pub fn from_le_bytes(bytes: [u8; 8]) -> Self {
        Word(u64::from_le_bytes(bytes))
    }
}

/// A word and its type tag. The layout is fixed because `ref`/`deref` read it through raw
/// pointers: the word at offset 0, the tag byte at offset 8.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(C)]
pub struct Data {
    pub word: Word,
    pub data_type: ValueType,
}

impl Data {
    pub fn new(word: Word, data_type: ValueType) -> Self {
        Data { word, data_type }
    }

    pub fn int(value: i64) -> Self {
        Data::new(Word::from_int(value), ValueType::Int)
    }

    pub fn float(value: f32) -> Self {
        Data::new(Word::from_float(value), ValueType::Float)
    }

    pub fn double(value: f64) -> Self {
        Data::new(Word::from_double(value), ValueType::Double)
    }

    pub fn char(value: u8) -> Self {
        Data::new(Word::from_char(value), ValueType::Char)
    }

    pub fn ptr(ptr: *mut u8) -> Self {
        Data::new(Word::from_ptr(ptr), ValueType::Ptr)
    }
}

/// One instruction as stored on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    pub op: Op,
    pub value: Word,
    pub data_type: ValueType,
    pub register_index: usize,
}

impl Instruction {
    pub fn new(op: Op) -> Self {
        Instruction {
            op,
            value: Word::default(),
            data_type: ValueType::Int,
            register_index: 0,
        }
    }

    pub fn with_value(op: Op, value: Word, data_type: ValueType) -> Self {
        Instruction {
            value,
            data_type,
            ..Instruction::new(op)
        }
    }

    pub fn with_register(mut self, register_index: usize) -> Self {
        self.register_index = register_index;
        self
    }
}

/// A complete program: instructions, the string table `push_str` indexes into and the index
/// execution starts at.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bytecode {
    pub instructions: Vec<Instruction>,
    pub strings: Vec<Vec<u8>>,
    pub entrypoint: usize,
}

impl Bytecode {
    pub fn new(instructions: Vec<Instruction>) -> Self {
        Bytecode {
            instructions,
            strings: Vec::new(),
            entrypoint: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}
