//! Heap cells handed out by `alloc` and `push_str`.
//!
//! A cell is known by the address of its first byte. Cells are kept as raw allocations and
//! never touched through references, so the addresses a program holds stay valid until the
//! cell is freed.

use crate::error::RuntimeError;
use std::ptr::NonNull;

#[derive(Debug, Default)]
pub struct Memory {
    /// Newest cell last
    cells: Vec<NonNull<[u8]>>,
}

impl Memory {
    pub fn new() -> Self {
        Memory::default()
    }

    /// A zeroed cell of `size` bytes
    pub fn alloc(&mut self, size: usize) -> *mut u8 {
        self.insert(vec![0; size].into_boxed_slice())
    }

    /// A cell holding `bytes` followed by a NUL
    pub fn alloc_c_str(&mut self, bytes: &[u8]) -> *mut u8 {
        let mut cell = Vec::with_capacity(bytes.len() + 1);
        cell.extend_from_slice(bytes);
        cell.push(0);
        self.insert(cell.into_boxed_slice())
    }

    fn insert(&mut self, cell: Box<[u8]>) -> *mut u8 {
        let cell = NonNull::from(Box::leak(cell));
        self.cells.push(cell);
        cell.cast::<u8>().as_ptr()
    }

    /// Free the cell starting exactly at `ptr`
    pub fn dealloc(&mut self, ptr: *mut u8) -> Result<(), RuntimeError> {
        let index = self
            .cells
            .iter()
            .rposition(|cell| cell.cast::<u8>().as_ptr() == ptr)
            .ok_or(RuntimeError::InvalidFree)?;
        let cell = self.cells.remove(index);
        // SAFETY: the cell came from `Box::leak` in `insert` and is freed only once
        drop(unsafe { Box::from_raw(cell.as_ptr()) });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl Drop for Memory {
    fn drop(&mut self) {
        for cell in self.cells.drain(..) {
            // SAFETY: as in `dealloc`
            drop(unsafe { Box::from_raw(cell.as_ptr()) });
        }
    }
}
