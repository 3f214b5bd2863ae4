//! Typed arithmetic and comparisons.
//!
//! The left operand's tag picks the width the operation runs in. Each operand is first
//! converted from its own tag to that width.

use crate::bytecode::{Data, Op, ValueType, Word};
use crate::error::RuntimeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Arith {
    Add,
    Sub,
    Mul,
    Div,
    Compare(Cmp),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Cmp {
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
}

impl Cmp {
    fn test<T: PartialOrd>(self, a: T, b: T) -> bool {
        match self {
            Cmp::Eq => a == b,
            Cmp::Ne => a != b,
            Cmp::Gt => a > b,
            Cmp::Lt => a < b,
            Cmp::Ge => a >= b,
            Cmp::Le => a <= b,
        }
    }
}

fn to_u64(data: Data) -> u64 {
    let word = data.word;
    match data.data_type {
        ValueType::Int => word.as_int() as u64,
        ValueType::U8 | ValueType::Char => word.as_u8() as u64,
        ValueType::U16 => word.as_u16() as u64,
        ValueType::U32 => word.as_u32() as u64,
        ValueType::Float => word.as_float() as u64,
        ValueType::Double => word.as_double() as u64,
        ValueType::U64 | ValueType::Ptr | ValueType::Reg | ValueType::Top => word.as_u64(),
    }
}

fn to_i64(data: Data) -> i64 {
    match data.data_type {
        ValueType::Float => data.word.as_float() as i64,
        ValueType::Double => data.word.as_double() as i64,
        ValueType::Int => data.word.as_int(),
        _ => to_u64(data) as i64,
    }
}

fn to_f64(data: Data) -> f64 {
    match data.data_type {
        ValueType::Float => data.word.as_float() as f64,
        ValueType::Double => data.word.as_double(),
        ValueType::Int => data.word.as_int() as f64,
        _ => to_u64(data) as f64,
    }
}

fn truth(value: bool) -> Data {
    Data::int(value as i64)
}

/// `a <arith> b` where `a` was the deeper of the two popped values
pub(super) fn binary(op: Op, arith: Arith, a: Data, b: Data) -> Result<Data, RuntimeError> {
    if arith == Arith::Div && b.word.as_int() == 0 {
        return Err(RuntimeError::DivideByZero);
    }

    match a.data_type {
        ValueType::Ptr | ValueType::U64 => unsigned(arith, to_u64(a), to_u64(b), ValueType::U64),
        ValueType::Char | ValueType::U8 => unsigned(arith, to_u64(a), to_u64(b), ValueType::U8),
        ValueType::U16 => unsigned(arith, to_u64(a), to_u64(b), ValueType::U16),
        ValueType::U32 => unsigned(arith, to_u64(a), to_u64(b), ValueType::U32),
        ValueType::Int => signed(arith, to_i64(a), to_i64(b)),
        ValueType::Float => {
            let (a, b) = (to_f64(a) as f32, to_f64(b) as f32);
            Ok(match arith {
                Arith::Add => Data::float(a + b),
                Arith::Sub => Data::float(a - b),
                Arith::Mul => Data::float(a * b),
                Arith::Div => Data::float(a / b),
                Arith::Compare(cmp) => truth(cmp.test(a, b)),
            })
        }
        ValueType::Double => {
            let (a, b) = (to_f64(a), to_f64(b));
            Ok(match arith {
                Arith::Add => Data::double(a + b),
                Arith::Sub => Data::double(a - b),
                Arith::Mul => Data::double(a * b),
                Arith::Div => Data::double(a / b),
                Arith::Compare(cmp) => truth(cmp.test(a, b)),
            })
        }
        ValueType::Reg | ValueType::Top => Err(RuntimeError::UnexpectedType {
            op: op.mnemonic(),
            expected: "a value",
            found: a.data_type.name(),
        }),
    }
}

fn unsigned(arith: Arith, a: u64, b: u64, width: ValueType) -> Result<Data, RuntimeError> {
    let value = match arith {
        Arith::Add => a.wrapping_add(b),
        Arith::Sub => a.wrapping_sub(b),
        Arith::Mul => a.wrapping_mul(b),
        Arith::Div => a.checked_div(b).ok_or(RuntimeError::DivideByZero)?,
        Arith::Compare(cmp) => return Ok(truth(cmp.test(a, b))),
    };

    let value = match width {
        ValueType::U8 => value as u8 as u64,
        ValueType::U16 => value as u16 as u64,
        ValueType::U32 => value as u32 as u64,
        _ => value,
    };
    Ok(Data::new(Word::from_u64(value), width))
}

fn signed(arith: Arith, a: i64, b: i64) -> Result<Data, RuntimeError> {
    let value = match arith {
        Arith::Add => a.wrapping_add(b),
        Arith::Sub => a.wrapping_sub(b),
        Arith::Mul => a.wrapping_mul(b),
        Arith::Div if b == 0 => return Err(RuntimeError::DivideByZero),
        Arith::Div => a.wrapping_div(b),
        Arith::Compare(cmp) => return Ok(truth(cmp.test(a, b))),
    };
    Ok(Data::int(value))
}

/// `mod`, `and` and `or` on the raw integer view of both words
pub(super) fn integer(op: Op, a: Data, b: Data) -> Result<Data, RuntimeError> {
    let (a, b) = (a.word.as_int(), b.word.as_int());
    Ok(match op {
        Op::Mod if b == 0 => return Err(RuntimeError::DivideByZero),
        Op::Mod => Data::int(a.wrapping_rem(b)),
        Op::And => truth(a != 0 && b != 0),
        _ => truth(a != 0 || b != 0),
    })
}

/// `*_f` instructions on the raw `f32` view of both words
pub(super) fn float(op: Op, a: Data, b: Data) -> Result<Data, RuntimeError> {
    let (a, b) = (a.word.as_float(), b.word.as_float());
    if matches!(op, Op::DivF | Op::ModF) && b == 0.0 {
        return Err(RuntimeError::DivideByZero);
    }
    Ok(Data::float(match op {
        Op::AddF => a + b,
        Op::SubF => a - b,
        Op::MulF => a * b,
        Op::DivF => a / b,
        // Truncated remainder, like C's fmod
        _ => a % b,
    }))
}
