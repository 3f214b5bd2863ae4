//! Native functions: the built-in `write` and `exit`, and functions loaded from shared
//! libraries by `load_lib`.

use super::{Machine, NATIVE_CAPACITY};
use crate::bytecode::{Data, Op, ValueType};
use crate::error::RuntimeError;
use libloading::Library;
use log::debug;
use std::ffi::{c_char, CStr};
use std::io::{self, Write};

pub type BuiltinFn = fn(&mut Machine) -> Result<(), RuntimeError>;

/// Signature of functions resolved from a shared library. They pop their arguments and push
/// their result through the accessors in the [`NativeCall`] they receive.
pub type ForeignFn = unsafe extern "C" fn(*const NativeCall);

/// What a foreign native gets to reach the machine with. In C:
///
/// ```c
/// typedef struct { uint64_t word; uint8_t type; } Data;
/// typedef struct {
///     void *machine;
///     Data (*pop)(void *machine);
///     void (*push)(void *machine, Data data);
/// } NativeCall;
/// ```
#[repr(C)]
pub struct NativeCall {
    pub machine: *mut Machine,
    pub pop: unsafe extern "C" fn(*mut Machine) -> Data,
    pub push: unsafe extern "C" fn(*mut Machine, Data),
}

#[derive(Clone, Copy)]
pub enum Native {
    Builtin(BuiltinFn),
    Foreign(ForeignFn),
}

impl Machine {
    /// Append to the native table and return the index `native` reaches it by
    pub fn add_native(&mut self, native: Native) -> Result<usize, RuntimeError> {
        if self.natives.len() >= NATIVE_CAPACITY {
            return Err(RuntimeError::NativeTableFull);
        }
        self.natives.push(native);
        Ok(self.natives.len() - 1)
    }

    pub(super) fn call_native(&mut self, index: i64) -> Result<(), RuntimeError> {
        let native = usize::try_from(index)
            .ok()
            .and_then(|index| self.natives.get(index))
            .copied()
            .ok_or(RuntimeError::UnknownNative(index))?;

        match native {
            Native::Builtin(function) => function(self),
            Native::Foreign(function) => {
                let call = NativeCall {
                    machine: self as *mut Machine,
                    pop: tim_pop,
                    push: tim_push,
                };
                // SAFETY: the library was loaded for exactly this call convention and stays
                // loaded as long as the machine lives.
                unsafe { function(&call) };
                match self.native_error.take() {
                    Some(err) => Err(err),
                    None => Ok(()),
                }
            }
        }
    }

    /// Pops the library name, then the symbol name, and appends the symbol to the table
    pub(super) fn ins_load_lib(&mut self) -> Result<(), RuntimeError> {
        let lib_name = self.pop_c_str(Op::LoadLib)?;
        let func_name = self.pop_c_str(Op::LoadLib)?;
        let lib_name = String::from_utf8_lossy(&lib_name).into_owned();

        // SAFETY: loading a library runs its initializers. Which libraries get loaded is up
        // to the program being run.
        let library = unsafe { Library::new(&lib_name) }
            .map_err(|err| RuntimeError::LibraryLoad(format!("{lib_name}: {err}")))?;
        // SAFETY: the symbol is trusted to have the `ForeignFn` signature
        let function = unsafe { library.get::<ForeignFn>(&func_name) }
            .map(|symbol| *symbol)
            .map_err(|err| {
                RuntimeError::SymbolLoad(format!("{}: {err}", String::from_utf8_lossy(&func_name)))
            })?;

        self.libraries.push(library);
        let index = self.add_native(Native::Foreign(function))?;
        debug!(
            "loaded {} from {lib_name} as native {index}",
            String::from_utf8_lossy(&func_name)
        );
        Ok(())
    }

    /// Pops a pointer and reads the NUL terminated string it points at
    fn pop_c_str(&mut self, op: Op) -> Result<Vec<u8>, RuntimeError> {
        let ptr = self.pop_typed(op, ValueType::Ptr)?.word.as_ptr();
        if ptr.is_null() {
            return Err(RuntimeError::NullPointer);
        }
        // SAFETY: strings reach the machine through `push_str`, which always terminates them
        let string = unsafe { CStr::from_ptr(ptr as *const c_char) };
        Ok(string.to_bytes().to_vec())
    }

    /// `write`: pops a stream (1 stdout, 2 stderr) and a string and prints the string.
    /// Any other stream, stdin included, is an error.
    pub(super) fn native_write(&mut self) -> Result<(), RuntimeError> {
        let stream = self.pop_stack()?.word.as_int();
        let string = self.pop_c_str(Op::Native)?;
        match stream {
            1 => self.out.write_all(&string)?,
            2 => io::stderr().write_all(&string)?,
            stream => return Err(RuntimeError::UnsupportedStream(stream)),
        }
        Ok(())
    }

    /// `exit`: pops an exit code and halts with it
    pub(super) fn native_exit(&mut self) -> Result<(), RuntimeError> {
        let code = self.pop_stack()?.word.as_int();
        self.halt = Some(code);
        Ok(())
    }
}

/// Pop the top slot of the machine running a foreign native.
///
/// On an empty stack the error is kept on the machine, reported once the native returns, and
/// a zero int is handed back.
///
/// # Safety
///
/// `machine` must be the pointer of the [`NativeCall`] the native was called with.
pub unsafe extern "C" fn tim_pop(machine: *mut Machine) -> Data {
    // SAFETY: upheld by the caller
    let machine = unsafe { &mut *machine };
    match machine.pop_stack() {
        Ok(data) => data,
        Err(err) => {
            machine.native_error.get_or_insert(err);
            Data::default()
        }
    }
}

/// Push onto the stack of the machine running a foreign native. An overflow is reported
/// once the native returns.
///
/// # Safety
///
/// As for [`tim_pop`]. `data.data_type` must be a valid tag.
pub unsafe extern "C" fn tim_push(machine: *mut Machine, data: Data) {
    // SAFETY: upheld by the caller
    let machine = unsafe { &mut *machine };
    if let Err(err) = machine.push_stack(data) {
        machine.native_error.get_or_insert(err);
    }
}
