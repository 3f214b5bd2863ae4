//! Assembler from text to [`Bytecode`].
//!
//! ```text
//! entrypoint main
//!
//! square:
//!     dup
//!     mul
//!     ret
//!
//! main:
//!     push 7
//!     call square
//!     print
//!     halt
//! ```
//!
//! One statement per line: a `label:`, the `entrypoint label` directive or an instruction with
//! its operand. `;` starts a comment. Index 0 always holds a `nop`, so no label resolves to 0.

mod lexer;
mod token;

use crate::bytecode::{Bytecode, Instruction, Op, ValueType, Word};
use crate::vm::REGISTER_COUNT;
use anyhow::anyhow;
use lexer::Lexer;
use log::debug;
use std::collections::HashMap;
use token::Token;

type ParseRes = anyhow::Result<Instruction>;
type ParseFn<'a> = fn(&mut Parser<'a>) -> ParseRes;

macro_rules! impl_parse_fn {
    // Instructions taking an instruction index or a label
    ($fn_name:ident; $op:ident(target)) => {
        fn $fn_name(&mut self) -> ParseRes {
            self.parse_target(Op::$op)
        }
    };

    ($fn_name:ident; $op:ident) => {
        fn $fn_name(&mut self) -> ParseRes {
            Ok(Instruction::new(Op::$op))
        }
    };
}

/// Assemble `program` into bytecode
pub fn assemble(program: &str) -> anyhow::Result<Bytecode> {
    Parser::new(program).parse()
}

/// Parser to generate bytecode from text
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    parse_fns: HashMap<Op, ParseFn<'a>>,
    strings: Vec<Vec<u8>>,
    labels: HashMap<&'a str, usize>,
    /// Jump operands waiting for their label: (instruction index, label, line)
    fixups: Vec<(usize, &'a str, usize)>,
    /// Index the instruction being parsed will get
    next_index: usize,
}

impl<'a> Parser<'a> {
    /// Initialize the parser and prepare the parser functions
    ///
    /// * `program` program to parse
    pub fn new(program: &'a str) -> Self {
        let mut parse_fns: HashMap<Op, ParseFn> = HashMap::new();
        parse_fns.insert(Op::Push, Self::parse_push);
        parse_fns.insert(Op::PushStr, Self::parse_push_str);
        parse_fns.insert(Op::Mov, Self::parse_mov);
        parse_fns.insert(Op::Call, Self::parse_call);
        parse_fns.insert(Op::Jmp, Self::parse_jmp);
        parse_fns.insert(Op::Zjmp, Self::parse_zjmp);
        parse_fns.insert(Op::Nzjmp, Self::parse_nzjmp);
        parse_fns.insert(Op::Native, Self::parse_native);
        parse_fns.insert(Op::Ret, Self::parse_ret);
        parse_fns.insert(Op::Halt, Self::parse_halt);

        Parser {
            lexer: Lexer::new(program),
            parse_fns,
            strings: Vec::new(),
            labels: HashMap::new(),
            fixups: Vec::new(),
            next_index: 1,
        }
    }

    /// Parse `program` and generate a `Bytecode`
    pub fn parse(mut self) -> anyhow::Result<Bytecode> {
        let mut instructions = vec![Instruction::new(Op::Nop)];
        let mut entrypoint = None;

        while let Some(token) = self.lexer.next_token()? {
            let line = self.lexer.line();
            match token {
                Token::Newline => continue,
                Token::Instruction(Op::Entrypoint) => match self.lexer.next_token()? {
                    Some(Token::Name(name)) => entrypoint = Some((name, line)),
                    token => {
                        return Err(anyhow!(
                            "line {line}: expected a label after `entrypoint`, got {token:?}"
                        ))
                    }
                },
                Token::Instruction(op) => {
                    let instruction = match self.parse_fns.get(&op).copied() {
                        Some(parse_fn) => parse_fn(&mut self)?,
                        None => Instruction::new(op),
                    };
                    instructions.push(instruction);
                    self.next_index += 1;
                }
                Token::Name(name) => {
                    if self.lexer.next_token()? != Some(Token::Colon) {
                        // Eg. "main:"
                        return Err(anyhow!("line {line}: ':' should come after a label"));
                    }

                    if self.labels.insert(name, self.next_index).is_some() {
                        return Err(anyhow!("line {line}: label {name} is already defined"));
                    }
                }
                token => {
                    return Err(anyhow!(
                        "line {line}: expected instruction or label, got {token:?}"
                    ))
                }
            }

            // This statement is finished so we expect a newline
            match self.lexer.next_token()? {
                Some(Token::Newline) | None => {}
                Some(token) => {
                    return Err(anyhow!("line {}: expected '\\n', got {token:?}", self.lexer.line()))
                }
            }
        }

        for (index, label, line) in &self.fixups {
            let target = self.resolve(label, *line)?;
            instructions[*index].value = Word::from_int(target as i64);
        }

        let entrypoint = match entrypoint {
            Some((label, line)) => self.resolve(label, line)?,
            None => 0,
        };
        debug!(
            "assembled {} instructions, {} strings, entry point {entrypoint}",
            instructions.len(),
            self.strings.len()
        );

        Ok(Bytecode {
            instructions,
            strings: self.strings,
            entrypoint,
        })
    }

    fn resolve(&self, label: &str, line: usize) -> anyhow::Result<usize> {
        self.labels
            .get(label)
            .copied()
            .ok_or_else(|| anyhow!("line {line}: unknown label {label}"))
    }

    fn register(&self, index: usize) -> anyhow::Result<usize> {
        if index >= REGISTER_COUNT {
            return Err(anyhow!(
                "line {}: there are only {REGISTER_COUNT} registers, r{index} does not exist",
                self.lexer.line()
            ));
        }
        Ok(index)
    }

    /// A literal, optionally preceded by a type word
    fn parse_literal(&mut self, token: Option<Token<'a>>) -> anyhow::Result<(Word, ValueType)> {
        let line = self.lexer.line();
        let (token, data_type) = match token {
            Some(Token::Type(data_type)) => (self.lexer.next_token()?, Some(data_type)),
            token => (token, None),
        };

        let word = match (token, data_type) {
            (Some(Token::Number(n)), None) => return Ok((Word::from_int(n), ValueType::Int)),
            (Some(Token::Float(n)), None) => {
                return Ok((Word::from_float(n as f32), ValueType::Float))
            }
            (Some(Token::Char(c)), None) => return Ok((Word::from_char(c), ValueType::Char)),

            (Some(Token::Number(n)), Some(ty)) => match ty {
                ValueType::U8 => Word::from_u64(n as u8 as u64),
                ValueType::U16 => Word::from_u64(n as u16 as u64),
                ValueType::U32 => Word::from_u64(n as u32 as u64),
                ValueType::Float => Word::from_float(n as f32),
                ValueType::Double => Word::from_double(n as f64),
                ValueType::Char => Word::from_char(n as u8),
                _ => Word::from_int(n),
            },
            (Some(Token::Float(n)), Some(ValueType::Float)) => Word::from_float(n as f32),
            (Some(Token::Float(n)), Some(ValueType::Double)) => Word::from_double(n),
            (Some(Token::Char(c)), Some(_)) => Word::from_char(c),
            (token, Some(ty)) => {
                return Err(anyhow!(
                    "line {line}: expected a {} literal, got {token:?}",
                    ty.name()
                ))
            }
            (token, None) => return Err(anyhow!("line {line}: expected a literal, got {token:?}")),
        };

        Ok((word, data_type.unwrap_or_default()))
    }

    /// `push <literal>` or `push rN`
    fn parse_push(&mut self) -> ParseRes {
        match self.lexer.next_token()? {
            Some(Token::Register(index)) => {
                let index = self.register(index)?;
                Ok(Instruction::with_value(Op::Push, Word::default(), ValueType::Reg)
                    .with_register(index))
            }
            token => {
                let (value, data_type) = self.parse_literal(token)?;
                Ok(Instruction::with_value(Op::Push, value, data_type))
            }
        }
    }

    /// `push_str "text"`. Equal strings share one table entry.
    fn parse_push_str(&mut self) -> ParseRes {
        match self.lexer.next_token()? {
            Some(Token::Str(bytes)) => {
                let index = match self.strings.iter().position(|s| *s == bytes) {
                    Some(index) => index,
                    None => {
                        self.strings.push(bytes);
                        self.strings.len() - 1
                    }
                };
                Ok(Instruction::with_value(
                    Op::PushStr,
                    Word::from_int(index as i64),
                    ValueType::Int,
                ))
            }
            token => Err(anyhow!(
                "line {}: expected a string, got {token:?}",
                self.lexer.line()
            )),
        }
    }

    /// `mov rN top` or `mov rN <literal>`
    fn parse_mov(&mut self) -> ParseRes {
        let index = match self.lexer.next_token()? {
            Some(Token::Register(index)) => self.register(index)?,
            token => {
                return Err(anyhow!(
                    "line {}: expected a register, got {token:?}",
                    self.lexer.line()
                ))
            }
        };

        match self.lexer.next_token()? {
            Some(Token::Top) => {
                Ok(Instruction::with_value(Op::Mov, Word::default(), ValueType::Top)
                    .with_register(index))
            }
            token => {
                let (value, data_type) = self.parse_literal(token)?;
                Ok(Instruction::with_value(Op::Mov, value, data_type).with_register(index))
            }
        }
    }

    /// Instruction index or label, resolved once every label is known
    fn parse_target(&mut self, op: Op) -> ParseRes {
        match self.lexer.next_token()? {
            Some(Token::Number(target)) => {
                Ok(Instruction::with_value(op, Word::from_int(target), ValueType::Int))
            }
            Some(Token::Name(label)) => {
                self.fixups
                    .push((self.next_index, label, self.lexer.line()));
                Ok(Instruction::new(op))
            }
            token => Err(anyhow!(
                "line {}: expected a label or an index, got {token:?}",
                self.lexer.line()
            )),
        }
    }

    fn parse_native(&mut self) -> ParseRes {
        match self.lexer.next_token()? {
            Some(Token::Number(index)) => {
                Ok(Instruction::with_value(Op::Native, Word::from_int(index), ValueType::Int))
            }
            token => Err(anyhow!(
                "line {}: expected a native function index, got {token:?}",
                self.lexer.line()
            )),
        }
    }

    impl_parse_fn! {parse_call; Call(target)}
    impl_parse_fn! {parse_jmp; Jmp(target)}
    impl_parse_fn! {parse_zjmp; Zjmp(target)}
    impl_parse_fn! {parse_nzjmp; Nzjmp(target)}

    impl_parse_fn! {parse_ret; Ret}
    impl_parse_fn! {parse_halt; Halt}
}
