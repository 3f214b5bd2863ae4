//! tim is a small language toolchain: a lexer and a type checking parser for the source
//! language, and a stack-based bytecode virtual machine with an assembler, a disassembler and
//! a debugger.
//!
//! # Example
//!
//! ```text
//! entrypoint main
//!
//! fact:
//!     dup
//!     push 1
//!     cmple
//!     nzjmp base      ; n <= 1
//!     dup
//!     push 1
//!     sub
//!     call fact
//!     mul
//!     ret
//! base:
//!     pop
//!     push 1
//!     ret
//!
//! main:
//!     push 5
//!     call fact
//!     print
//!     halt
//! ```
//!
//! # Instructions
//!
//! Binary instructions pop `b`, then `a`, and push `a <op> b`. Typed arithmetic works in the
//! width of `a`'s tag.
//!
//! | Instruction | Usage | Brief |
//! |-------------|-------|-------|
//! | nop | `nop` | Do nothing. |
//! | push | `push [type] literal`, `push rN` | Push an immediate or the content of a register. |
//! | push_str | `push_str "text"` | Copy a string into a new NUL terminated memory cell and push its pointer. |
//! | mov | `mov rN literal`, `mov rN top` | Load a register from an immediate or from the stack top. |
//! | ref / deref | `ref`, `deref` | Push a pointer to the top slot / push the tagged value the top pointer points at. |
//! | alloc / dealloc | `alloc`, `dealloc` | Pop an int size and push a zeroed cell / pop a pointer and free its cell. |
//! | write | `write` | Pop size, value and pointer. Copy `size` bytes of the value to the pointer. |
//! | read | `read` | Pop type, size and pointer. Push `size` bytes from the pointer with the given tag. |
//! | pop / dup / swap | | Stack shuffling. |
//! | indup / inswap | | Pop an index counted from the top; duplicate or swap that slot with the top. |
//! | add sub mul div | | Typed arithmetic. |
//! | mod and or | | Integer remainder and logical and/or. |
//! | add_f sub_f mul_f div_f mod_f | | `f32` arithmetic. |
//! | cmpe cmpne cmpg cmpl cmpge cmple | | Typed comparisons pushing int `1` or `0`. |
//! | itof ftoi itoc | | Value conversions. |
//! | toi tof toc tovp | | Change the tag of the top slot. |
//! | call / ret | `call label` | Jump and remember where to come back to. |
//! | jmp / zjmp / nzjmp | `jmp label` | Jump always / if the popped value is zero / if it is not. |
//! | print | `print` | Pop a value and print it in every interpretation. |
//! | native | `native index` | Call an entry of the native table. `0` is `write`, `1` is `exit`. |
//! | load_lib | `load_lib` | Pop a library and a symbol name, load the symbol into the native table. |
//! | ss | `ss` | Push the stack size. |
//! | halt | `halt` | Stop the program. |
//!
//! # Important notes
//!
//! - Index 0 is never a valid jump target; the assembler puts a `nop` there.
//! - Memory instructions work on raw pointers. A program that writes through a stale pointer
//!   corrupts the process, like any native program would.

pub mod arena;
pub mod asm;
pub mod ast;
pub mod bytecode;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod token;
pub mod types;
pub mod view;
pub mod vm;
