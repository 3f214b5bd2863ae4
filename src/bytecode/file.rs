//! On-disk program format. All integers are little endian:
//!
//! ```text
//! u64 string_count
//! (u64 len, len bytes) * string_count
//! u64 entrypoint
//! (u8 op, u64 value, u8 type, u64 register_index) * until end of file
//! ```

use super::{Bytecode, Instruction, Op, ValueType, Word};
use anyhow::{anyhow, Context};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

const INSTRUCTION_SIZE: usize = 1 + 8 + 1 + 8;

impl Bytecode {
    pub fn write_to(&self, mut out: impl Write) -> anyhow::Result<()> {
        out.write_all(&(self.strings.len() as u64).to_le_bytes())?;
        for string in &self.strings {
            out.write_all(&(string.len() as u64).to_le_bytes())?;
            out.write_all(string)?;
        }
        out.write_all(&(self.entrypoint as u64).to_le_bytes())?;

        for instruction in &self.instructions {
            let mut bytes = [0u8; INSTRUCTION_SIZE];
            bytes[0] = instruction.op as u8;
            bytes[1..9].copy_from_slice(&instruction.value.to_le_bytes());
            bytes[9] = instruction.data_type as u8;
            bytes[10..].copy_from_slice(&(instruction.register_index as u64).to_le_bytes());
            out.write_all(&bytes)?;
        }
        out.flush()?;
        Ok(())
    }

    pub fn read_from(mut input: impl Read) -> anyhow::Result<Self> {
        let string_count = read_u64(&mut input).context("reading the string count")?;
        let mut strings = Vec::new();
        for i in 0..string_count {
            let len = read_u64(&mut input).with_context(|| format!("reading string {i}"))?;
            let mut string = Vec::new();
            (&mut input).take(len).read_to_end(&mut string)?;
            if string.len() as u64 != len {
                return Err(anyhow!("string {i} is truncated"));
            }
            strings.push(string);
        }
        let entrypoint = read_u64(&mut input).context("reading the entry point")? as usize;

        let mut instructions = Vec::new();
        let mut bytes = [0u8; INSTRUCTION_SIZE];
        loop {
            // A clean end of file is only allowed between instructions
            if input.read(&mut bytes[..1])? == 0 {
                break;
            }
            let index = instructions.len();
            input
                .read_exact(&mut bytes[1..])
                .with_context(|| format!("instruction {index} is truncated"))?;

            let op = Op::from_u8(bytes[0])
                .ok_or_else(|| anyhow!("instruction {index}: unknown opcode {}", bytes[0]))?;
            let data_type = ValueType::from_u8(bytes[9])
                .ok_or_else(|| anyhow!("instruction {index}: unknown type tag {}", bytes[9]))?;
            let mut value = [0u8; 8];
            value.copy_from_slice(&bytes[1..9]);
            let mut register = [0u8; 8];
            register.copy_from_slice(&bytes[10..]);

            instructions.push(Instruction {
                op,
                value: Word::from_le_bytes(value),
                data_type,
                register_index: u64::from_le_bytes(register) as usize,
            });
        }

        if entrypoint > instructions.len() {
            return Err(anyhow!(
                "entry point {entrypoint} is past the last instruction ({})",
                instructions.len()
            ));
        }

        Ok(Bytecode {
            instructions,
            strings,
            entrypoint,
        })
    }

    pub fn save(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let path = path.as_ref();
        let file =
            File::create(path).with_context(|| format!("could not create {}", path.display()))?;
        self.write_to(BufWriter::new(file))
            .with_context(|| format!("could not write {}", path.display()))
    }

    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).with_context(|| format!("could not open {}", path.display()))?;
        Self::read_from(BufReader::new(file))
            .with_context(|| format!("could not read {}", path.display()))
    }
}

fn read_u64(input: &mut impl Read) -> io::Result<u64> {
    let mut bytes = [0u8; 8];
    input.read_exact(&mut bytes)?;
    Ok(u64::from_le_bytes(bytes))
}
