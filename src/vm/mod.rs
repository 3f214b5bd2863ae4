//! Virtual machine that runs the bytecode

mod arith;
mod debug;
mod memory;
mod native;
mod stack;

pub use memory::Memory;
pub use native::{tim_pop, tim_push, BuiltinFn, ForeignFn, Native, NativeCall};
pub use stack::Stack;

use crate::bytecode::{Bytecode, Data, Instruction, Op, ValueType, Word};
use crate::error::RuntimeError;
use arith::{Arith, Cmp};
use libloading::Library;
use log::{debug, trace};
use std::io::{self, Write};
use std::ptr;

pub const STACK_CAPACITY: usize = 1024;
pub const RETURN_STACK_CAPACITY: usize = 1024;
pub const REGISTER_COUNT: usize = 16;
pub const NATIVE_CAPACITY: usize = 100;

/// Largest amount of bytes `read`/`write` move through one word
const WORD_SIZE: usize = 8;

/// Virtual machine representation
pub struct Machine {
    bytecode: Bytecode,
    ip: usize,                  // instruction pointer
    pub halt: Option<i64>,      // halt flag with exit code

    stack: Stack,
    return_stack: Vec<usize>,
    registers: [Data; REGISTER_COUNT],
    memory: Memory,
    natives: Vec<Native>,
    libraries: Vec<Library>,
    native_error: Option<RuntimeError>, // first error of a running foreign native
    out: Box<dyn Write>,
}

impl Machine {
    pub fn new(bytecode: Bytecode) -> Self {
        let mut machine = Machine {
            ip: bytecode.entrypoint,
            bytecode,
            halt: None,
            stack: Stack::new(STACK_CAPACITY),
            return_stack: Vec::new(),
            registers: [Data::default(); REGISTER_COUNT],
            memory: Memory::new(),
            natives: Vec::new(),
            libraries: Vec::new(),
            native_error: None,
            out: Box::new(io::stdout()),
        };
        machine.natives.push(Native::Builtin(Self::native_write));
        machine.natives.push(Native::Builtin(Self::native_exit));
        machine
    }

    /// Send `print` and stream 1 of the `write` native to `out` instead of stdout
    pub fn with_output(mut self, out: impl Write + 'static) -> Self {
        self.out = Box::new(out);
        self
    }

    /// Run to the end of the program and return its exit code. A program with nothing left
    /// to run exits with 0.
    pub fn run(&mut self) -> Result<i64, RuntimeError> {
        if self.halt.is_some() {
            return Err(RuntimeError::Halted);
        }

        let result = self.run_to_end();
        self.out.flush()?;
        result?;

        let code = self.halt.unwrap_or(0);
        debug!("program finished with exit code {code}");
        Ok(code)
    }

    fn run_to_end(&mut self) -> Result<(), RuntimeError> {
        while !self.is_finished() {
            self.next_instruction()?;
        }
        Ok(())
    }

    pub fn is_finished(&self) -> bool {
        self.halt.is_some() || self.ip >= self.bytecode.len()
    }

    pub fn ip(&self) -> usize {
        self.ip
    }

    pub fn bytecode(&self) -> &Bytecode {
        &self.bytecode
    }

    /// The live part of the operand stack, bottom first
    pub fn stack(&self) -> &[Data] {
        self.stack.as_slice()
    }

    pub fn registers(&self) -> &[Data] {
        &self.registers
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    /// Execute the instruction at `ip` and move on
    pub fn next_instruction(&mut self) -> Result<(), RuntimeError> {
        let Some(&instruction) = self.bytecode.instructions.get(self.ip) else {
            return Err(RuntimeError::Halted);
        };
        if self.halt.is_some() {
            return Err(RuntimeError::Halted);
        }
        trace!("{}: {}", self.ip, instruction.op.mnemonic());

        match instruction.op {
            Op::Nop => {}
            Op::Push => self.ins_push(&instruction)?,
            Op::PushStr => self.ins_push_str(&instruction)?,
            Op::Mov => self.ins_mov(&instruction)?,
            Op::Ref => self.ins_ref()?,
            Op::Deref => self.ins_deref()?,
            Op::Alloc => self.ins_alloc()?,
            Op::Dealloc => self.ins_dealloc()?,
            Op::Write => self.ins_write()?,
            Op::Read => self.ins_read()?,
            Op::Pop => {
                self.pop_stack()?;
            }
            Op::Dup => {
                let top = self.top()?;
                self.push_stack(top)?;
            }
            Op::Indup => {
                let index = self.stack_index()?;
                let data = self.stack.get(index).ok_or(RuntimeError::IndexOutOfRange)?;
                self.push_stack(data)?;
            }
            Op::Swap => {
                let len = self.stack.len();
                if len < 2 {
                    return Err(RuntimeError::StackUnderflow);
                }
                self.stack.swap(len - 1, len - 2)?;
            }
            Op::Inswap => {
                let index = self.stack_index()?;
                self.stack.swap(index, self.stack.len() - 1)?;
            }
            Op::Add => self.ins_binary(Op::Add, Arith::Add)?,
            Op::Sub => self.ins_binary(Op::Sub, Arith::Sub)?,
            Op::Mul => self.ins_binary(Op::Mul, Arith::Mul)?,
            Op::Div => self.ins_binary(Op::Div, Arith::Div)?,
            Op::Cmpe => self.ins_binary(Op::Cmpe, Arith::Compare(Cmp::Eq))?,
            Op::Cmpne => self.ins_binary(Op::Cmpne, Arith::Compare(Cmp::Ne))?,
            Op::Cmpg => self.ins_binary(Op::Cmpg, Arith::Compare(Cmp::Gt))?,
            Op::Cmpl => self.ins_binary(Op::Cmpl, Arith::Compare(Cmp::Lt))?,
            Op::Cmpge => self.ins_binary(Op::Cmpge, Arith::Compare(Cmp::Ge))?,
            Op::Cmple => self.ins_binary(Op::Cmple, Arith::Compare(Cmp::Le))?,
            Op::Mod | Op::And | Op::Or => {
                let b = self.pop_stack()?;
                let a = self.pop_stack()?;
                self.push_stack(arith::integer(instruction.op, a, b)?)?;
            }
            Op::AddF | Op::SubF | Op::MulF | Op::DivF | Op::ModF => {
                let b = self.pop_stack()?;
                let a = self.pop_stack()?;
                self.push_stack(arith::float(instruction.op, a, b)?)?;
            }
            Op::Itof => {
                let a = self.pop_stack()?;
                self.push_stack(Data::float(a.word.as_int() as f32))?;
            }
            Op::Ftoi => {
                let a = self.pop_stack()?;
                self.push_stack(Data::int(a.word.as_float() as i64))?;
            }
            Op::Itoc => {
                let a = self.pop_stack()?;
                self.push_stack(Data::char(a.word.as_int() as u8))?;
            }
            Op::Toi => self.retag(ValueType::Int)?,
            Op::Tof => self.retag(ValueType::Float)?,
            Op::Toc => self.retag(ValueType::Char)?,
            Op::Tovp => self.retag(ValueType::Ptr)?,
            Op::Call => {
                let target = self.jump_target(&instruction)?;
                if self.return_stack.len() >= RETURN_STACK_CAPACITY {
                    return Err(RuntimeError::ReturnStackOverflow);
                }
                self.return_stack.push(self.ip);
                self.ip = target - 1;
            }
            Op::Ret => {
                self.ip = self
                    .return_stack
                    .pop()
                    .ok_or(RuntimeError::ReturnStackUnderflow)?;
            }
            Op::Jmp => self.ip = self.jump_target(&instruction)? - 1,
            Op::Zjmp | Op::Nzjmp => {
                let target = self.jump_target(&instruction)?;
                let is_zero = self.pop_stack()?.word.as_int() == 0;
                if is_zero == (instruction.op == Op::Zjmp) {
                    self.ip = target - 1;
                }
            }
            Op::Print => {
                let a = self.pop_stack()?;
                writeln!(
                    self.out,
                    "as float: {:.6}, as int: {}, as char: {}, as pointer: {:p}, type: {}",
                    a.word.as_float(),
                    a.word.as_int(),
                    a.word.as_char() as char,
                    a.word.as_ptr(),
                    a.data_type.name()
                )?;
            }
            Op::Native => self.call_native(instruction.value.as_int())?,
            Op::Entrypoint => return Err(RuntimeError::NotExecutable("entrypoint")),
            Op::LoadLib => self.ins_load_lib()?,
            Op::Ss => self.push_stack(Data::int(self.stack.len() as i64))?,
            Op::Halt => self.halt = Some(0),
        }

        self.ip += 1;
        Ok(())
    }

    fn push_stack(&mut self, data: Data) -> Result<(), RuntimeError> {
        self.stack.push(data)
    }

    fn pop_stack(&mut self) -> Result<Data, RuntimeError> {
        self.stack.pop()
    }

    fn top(&self) -> Result<Data, RuntimeError> {
        self.stack().last().copied().ok_or(RuntimeError::StackUnderflow)
    }

    fn top_slot(&self) -> Result<*mut Data, RuntimeError> {
        let len = self.stack.len();
        len.checked_sub(1)
            .and_then(|index| self.stack.slot(index))
            .ok_or(RuntimeError::StackUnderflow)
    }

    fn pop_typed(&mut self, op: Op, expected: ValueType) -> Result<Data, RuntimeError> {
        let data = self.pop_stack()?;
        if data.data_type != expected {
            return Err(unexpected_type(op, expected, data));
        }
        Ok(data)
    }

    /// Pops an index counted from the top and turns it into a slot
    fn stack_index(&mut self) -> Result<usize, RuntimeError> {
        let index = self.pop_stack()?.word.as_int();
        let len = self.stack.len();
        if index < 0 || index as usize >= len {
            return Err(RuntimeError::IndexOutOfRange);
        }
        Ok(len - index as usize - 1)
    }

    fn retag(&mut self, data_type: ValueType) -> Result<(), RuntimeError> {
        let top = self.top_slot()?;
        // SAFETY: `top_slot` points at a live slot
        unsafe { (*top).data_type = data_type };
        Ok(())
    }

    fn jump_target(&self, instruction: &Instruction) -> Result<usize, RuntimeError> {
        let target = instruction.value.as_int();
        if target == 0 {
            return Err(RuntimeError::JumpToZero);
        }
        if target < 0 || target as usize >= self.bytecode.len() {
            return Err(RuntimeError::JumpOutOfBounds {
                op: instruction.op.mnemonic(),
                target,
            });
        }
        Ok(target as usize)
    }

    fn register(&self, instruction: &Instruction) -> Result<usize, RuntimeError> {
        match instruction.register_index {
            index if index < REGISTER_COUNT => Ok(index),
            index => Err(RuntimeError::InvalidRegister(index)),
        }
    }

    fn ins_push(&mut self, instruction: &Instruction) -> Result<(), RuntimeError> {
        if instruction.data_type == ValueType::Reg {
            let index = self.register(instruction)?;
            return self.push_stack(self.registers[index]);
        }
        self.push_stack(Data::new(instruction.value, instruction.data_type))
    }

    /// Copies the string into a fresh NUL terminated cell
    fn ins_push_str(&mut self, instruction: &Instruction) -> Result<(), RuntimeError> {
        let index = instruction.value.as_int();
        let string = usize::try_from(index)
            .ok()
            .and_then(|index| self.bytecode.strings.get(index))
            .ok_or(RuntimeError::UnknownString(index))?;
        let ptr = self.memory.alloc_c_str(string);
        self.push_stack(Data::ptr(ptr))
    }

    fn ins_mov(&mut self, instruction: &Instruction) -> Result<(), RuntimeError> {
        let index = self.register(instruction)?;
        self.registers[index] = match instruction.data_type {
            ValueType::Top => self.top()?,
            data_type => Data::new(instruction.value, data_type),
        };
        Ok(())
    }

    /// Pushes a pointer to the top slot
    fn ins_ref(&mut self) -> Result<(), RuntimeError> {
        let ptr = self.top_slot()? as *mut u8;
        self.push_stack(Data::ptr(ptr))
    }

    /// Pushes the tagged value the top pointer points at. The pointer stays on the stack.
    fn ins_deref(&mut self) -> Result<(), RuntimeError> {
        let ptr = self.top()?.word.as_ptr();
        if ptr.is_null() {
            return Err(RuntimeError::NullPointer);
        }

        // SAFETY: the program promises `ptr` points at a `Data`, as produced by `ref`. The
        // fields are read separately so that no invalid `ValueType` is ever materialized.
        let (bits, tag) = unsafe {
            (
                ptr::read_unaligned(ptr as *const u64),
                ptr::read(ptr.add(WORD_SIZE)),
            )
        };
        let data_type = ValueType::from_u8(tag).ok_or(RuntimeError::UnknownType(tag as i64))?;
        self.push_stack(Data::new(Word::from_bits(bits), data_type))
    }

    fn ins_alloc(&mut self) -> Result<(), RuntimeError> {
        let size = self.pop_typed(Op::Alloc, ValueType::Int)?.word.as_int();
        let size = usize::try_from(size).map_err(|_| RuntimeError::NegativeSize)?;
        let ptr = self.memory.alloc(size);
        self.push_stack(Data::ptr(ptr))
    }

    fn ins_dealloc(&mut self) -> Result<(), RuntimeError> {
        let ptr = self.pop_typed(Op::Dealloc, ValueType::Ptr)?.word.as_ptr();
        self.memory.dealloc(ptr)
    }

    /// Pops size, value and pointer and copies the first `size` bytes of the value's word
    fn ins_write(&mut self) -> Result<(), RuntimeError> {
        let size = self.pop_stack()?;
        let data = self.pop_stack()?;
        if size.data_type != ValueType::Int {
            return Err(unexpected_type(Op::Write, ValueType::Int, size));
        }
        let size = byte_count(size)?;
        let ptr = self.pop_typed(Op::Write, ValueType::Ptr)?.word.as_ptr();
        if ptr.is_null() {
            return Err(RuntimeError::NullPointer);
        }

        let bytes = data.word.bits().to_ne_bytes();
        // SAFETY: `size` is at most one word. That `ptr` is valid for `size` bytes is the
        // program's responsibility, same as for any other raw store.
        unsafe { ptr::copy_nonoverlapping(bytes.as_ptr(), ptr, size) };
        Ok(())
    }

    /// Pops type, size and pointer and loads `size` bytes into a zeroed word
    fn ins_read(&mut self) -> Result<(), RuntimeError> {
        let tag = self.pop_typed(Op::Read, ValueType::Int)?.word.as_int();
        let size = self.pop_stack()?;
        if size.data_type != ValueType::Int && size.data_type != ValueType::U8 {
            return Err(unexpected_type(Op::Read, ValueType::Int, size));
        }
        let size = byte_count(size)?;
        let ptr = self.pop_typed(Op::Read, ValueType::Ptr)?.word.as_ptr();
        if ptr.is_null() {
            return Err(RuntimeError::NullPointer);
        }
        let data_type = ValueType::from_i64(tag).ok_or(RuntimeError::UnknownType(tag))?;

        let mut bytes = [0u8; WORD_SIZE];
        // SAFETY: as for `write`, at most one word is copied out of `ptr`
        unsafe { ptr::copy_nonoverlapping(ptr as *const u8, bytes.as_mut_ptr(), size) };
        self.push_stack(Data::new(
            Word::from_bits(u64::from_ne_bytes(bytes)),
            data_type,
        ))
    }

    fn ins_binary(&mut self, op: Op, arith: Arith) -> Result<(), RuntimeError> {
        let b = self.pop_stack()?;
        let a = self.pop_stack()?;
        self.push_stack(arith::binary(op, arith, a, b)?)
    }
}

fn unexpected_type(op: Op, expected: ValueType, found: Data) -> RuntimeError {
    RuntimeError::UnexpectedType {
        op: op.mnemonic(),
        expected: expected.name(),
        found: found.data_type.name(),
    }
}

fn byte_count(size: Data) -> Result<usize, RuntimeError> {
    let size = size.word.as_int();
    if size < 0 {
        return Err(RuntimeError::NegativeSize);
    }
    if size as usize > WORD_SIZE {
        return Err(RuntimeError::SizeTooLarge(size));
    }
    Ok(size as usize)
}
