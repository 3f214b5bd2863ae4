//! Interactive stepping debugger.
//!
//! | Command | Effect |
//! |---------|--------|
//! | `n`     | run one instruction |
//! | `b <n>` | run until the instruction pointer passes `n` |
//! | `p <n>` | print the top `n` stack slots |
//! | `s`     | print the stack size |
//! | `q`     | quit |
//!
//! An empty line repeats the previous command.

use super::Machine;
use crate::bytecode::{render, render_data};
use crate::error::RuntimeError;
use std::io::{BufRead, Write};

impl Machine {
    pub fn debug(&mut self, mut input: impl BufRead, mut out: impl Write) -> Result<(), RuntimeError> {
        let mut last_command = String::new();
        write!(out, "{}: ", self.ip)?;

        while !self.is_finished() {
            out.flush()?;
            let mut line = String::new();
            if input.read_line(&mut line)? == 0 {
                writeln!(out)?;
                return Ok(());
            }

            let command = match line.trim() {
                "" => last_command.clone(),
                command => command.to_string(),
            };
            last_command.clone_from(&command);

            let mut words = command.split_whitespace();
            match (words.next(), words.next().map(str::parse::<usize>)) {
                (Some("n"), None) => self.next_instruction()?,
                (Some("b"), Some(Ok(stop))) => {
                    while !self.is_finished() && self.ip <= stop {
                        self.next_instruction()?;
                    }
                }
                (Some("p"), Some(Ok(count))) => {
                    self.print_stack(count, &mut out)?;
                    write!(out, "> ")?;
                    continue;
                }
                (Some("s"), None) => {
                    writeln!(out, "ss: {}", self.stack.len())?;
                    write!(out, "> ")?;
                    continue;
                }
                (Some("q"), None) => return Ok(()),
                _ => {
                    writeln!(out, "unknown command: {command}")?;
                    write!(out, "> ")?;
                    continue;
                }
            }

            if let Some(instruction) = self.bytecode.instructions.get(self.ip) {
                if !self.is_finished() {
                    writeln!(out, "---{}", render(instruction, &self.bytecode.strings))?;
                    write!(out, "{}: ", self.ip)?;
                }
            }
        }

        writeln!(out, "program finished")?;
        Ok(())
    }

    fn print_stack(&self, count: usize, out: &mut impl Write) -> Result<(), RuntimeError> {
        let stack = self.stack();
        if count > stack.len() {
            writeln!(
                out,
                "can not print {count} elements, the stack only has {}",
                stack.len()
            )?;
            return Ok(());
        }

        for (index, data) in stack.iter().enumerate().rev().take(count) {
            writeln!(
                out,
                "index {index} ({}): {}",
                data.data_type.name(),
                render_data(data)
            )?;
        }
        Ok(())
    }
}
