//! Text rendering of instructions and values.
//!
//! The output reads back through the assembler except for jump targets, which are shown as
//! plain instruction indices.

use super::{Bytecode, Data, Instruction, Op, ValueType, Word};
use std::io::{self, Write};

/// Write `<index>: <instruction>` for every instruction from the entry point on.
pub fn disassemble(bytecode: &Bytecode, mut out: impl Write) -> io::Result<()> {
    for (index, instruction) in bytecode
        .instructions
        .iter()
        .enumerate()
        .skip(bytecode.entrypoint)
    {
        writeln!(out, "{index}: {}", render(instruction, &bytecode.strings))?;
    }
    Ok(())
}

/// Mnemonic followed by the operand, if the instruction has one.
pub fn render(instruction: &Instruction, strings: &[Vec<u8>]) -> String {
    let mut text = instruction.op.mnemonic().to_string();
    if !instruction.op.has_operand() {
        return text;
    }

    text.push(' ');
    match (instruction.op, instruction.data_type) {
        (Op::PushStr, _) => match strings.get(instruction.value.as_int() as usize) {
            Some(string) => text.push_str(&format!("\"{}\"", escape_str(string))),
            None => text.push_str(&format!("<missing string {}>", instruction.value.as_int())),
        },
        (Op::Mov, _) => text.push_str(&format!(
            "r{} {}",
            instruction.register_index,
            render_operand(instruction)
        )),
        _ => text.push_str(&render_operand(instruction)),
    }
    text
}

fn render_operand(instruction: &Instruction) -> String {
    let word = instruction.value;
    match instruction.data_type {
        ValueType::Reg => format!("r{}", instruction.register_index),
        ValueType::Top => "top".to_string(),
        ValueType::Int => word.as_int().to_string(),
        ValueType::Float => format!("{:.6}", word.as_float()),
        ValueType::Char => format!("'{}'", escape_str(&[word.as_char()])),
        ty => format!("{} {}", ty.name(), render_word(word, ty)),
    }
}

fn render_word(word: Word, data_type: ValueType) -> String {
    match data_type {
        ValueType::Int => word.as_int().to_string(),
        ValueType::U8 => word.as_u8().to_string(),
        ValueType::U16 => word.as_u16().to_string(),
        ValueType::U32 => word.as_u32().to_string(),
        ValueType::U64 => word.as_u64().to_string(),
        ValueType::Float => format!("{:.6}", word.as_float()),
        ValueType::Double => format!("{:.6}", word.as_double()),
        ValueType::Char => format!("'{}'", escape_str(&[word.as_char()])),
        ValueType::Ptr => format!("{:#x}", word.as_u64()),
        ValueType::Reg => format!("r{}", word.as_u64()),
        ValueType::Top => "top".to_string(),
    }
}

/// Value of a stack slot as the debugger prints it
pub fn render_data(data: &Data) -> String {
    render_word(data.word, data.data_type)
}

/// Escape the bytes the lexer reads back as escape sequences
pub fn escape_str(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for &byte in bytes {
        match byte {
            b'\n' => out.push_str("\\n"),
            b'\t' => out.push_str("\\t"),
            b'\r' => out.push_str("\\r"),
            0x0B => out.push_str("\\v"),
            0x08 => out.push_str("\\b"),
            0x0C => out.push_str("\\f"),
            0x07 => out.push_str("\\a"),
            b'\\' => out.push_str("\\\\"),
            b'\'' => out.push_str("\\'"),
            b'"' => out.push_str("\\\""),
            0 => out.push_str("\\0"),
            byte => out.push(byte as char),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes() {
        assert_eq!(escape_str(b"a\n\t\"'\\\0"), "a\\n\\t\\\"\\'\\\\\\0");
        assert_eq!(escape_str(b"plain"), "plain");
    }

    #[test]
    fn operands() {
        let strings = vec![b"hi\n".to_vec()];
        let cases = [
            (Instruction::new(Op::Add), "add"),
            (
                Instruction::with_value(Op::Push, Word::from_int(-3), ValueType::Int),
                "push -3",
            ),
            (
                Instruction::with_value(Op::Push, Word::from_float(1.5), ValueType::Float),
                "push 1.500000",
            ),
            (
                Instruction::with_value(Op::Push, Word::from_char(b'\n'), ValueType::Char),
                "push '\\n'",
            ),
            (
                Instruction::with_value(Op::Push, Word::from_int(255), ValueType::U8),
                "push u8 255",
            ),
            (
                Instruction::with_value(Op::Push, Word::from_u64(0x10), ValueType::Ptr),
                "push ptr 0x10",
            ),
            (
                Instruction::with_value(Op::Push, Word::default(), ValueType::Reg)
                    .with_register(2),
                "push r2",
            ),
            (
                Instruction::with_value(Op::Mov, Word::default(), ValueType::Top)
                    .with_register(1),
                "mov r1 top",
            ),
            (
                Instruction::with_value(Op::Mov, Word::from_int(5), ValueType::Int)
                    .with_register(0),
                "mov r0 5",
            ),
            (
                Instruction::with_value(Op::PushStr, Word::from_int(0), ValueType::Int),
                "push_str \"hi\\n\"",
            ),
            (
                Instruction::with_value(Op::Jmp, Word::from_int(4), ValueType::Int),
                "jmp 4",
            ),
        ];

        for (instruction, expected) in cases {
            assert_eq!(render(&instruction, &strings), expected);
        }
    }

    #[test]
    fn starts_at_entrypoint() {
        let bytecode = Bytecode {
            instructions: vec![
                Instruction::new(Op::Nop),
                Instruction::with_value(Op::Push, Word::from_int(2), ValueType::Int),
                Instruction::new(Op::Print),
            ],
            strings: Vec::new(),
            entrypoint: 1,
        };

        let mut out = Vec::new();
        disassemble(&bytecode, &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "1: push 2\n2: print\n");
    }

    #[test]
    fn data_values() {
        assert_eq!(render_data(&Data::int(-7)), "-7");
        assert_eq!(render_data(&Data::double(0.5)), "0.500000");
        assert_eq!(render_data(&Data::char(b'x')), "'x'");
    }
}
