//! Fixed size value stack.
//!
//! The slots are one raw allocation and every access goes through its base pointer, so the
//! pointers `ref` hands out stay usable while the stack keeps changing around them.

use crate::bytecode::Data;
use crate::error::RuntimeError;
use std::ptr::{self, NonNull};
use std::slice;

pub struct Stack {
    base: NonNull<Data>,
    capacity: usize,
    len: usize, // first free slot
}

impl Stack {
    pub fn new(capacity: usize) -> Self {
        let slots = vec![Data::default(); capacity].into_boxed_slice();
        Stack {
            base: NonNull::from(Box::leak(slots)).cast(),
            capacity,
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn push(&mut self, data: Data) -> Result<(), RuntimeError> {
        if self.len >= self.capacity {
            return Err(RuntimeError::StackOverflow);
        }
        // SAFETY: `len < capacity`
        unsafe { self.base.as_ptr().add(self.len).write(data) };
        self.len += 1;
        Ok(())
    }

    pub fn pop(&mut self) -> Result<Data, RuntimeError> {
        if self.len == 0 {
            return Err(RuntimeError::StackUnderflow);
        }
        self.len -= 1;
        // SAFETY: the slot was written by `push`
        Ok(unsafe { self.base.as_ptr().add(self.len).read() })
    }

    /// Slot counted from the bottom
    pub fn get(&self, index: usize) -> Option<Data> {
        self.slot(index).map(|slot| {
            // SAFETY: `slot` only hands out live slots
            unsafe { slot.read() }
        })
    }

    /// Raw pointer to a live slot, derived from the base of the allocation
    pub fn slot(&self, index: usize) -> Option<*mut Data> {
        if index >= self.len {
            return None;
        }
        // SAFETY: in bounds of the allocation
        Some(unsafe { self.base.as_ptr().add(index) })
    }

    pub fn swap(&mut self, a: usize, b: usize) -> Result<(), RuntimeError> {
        match (self.slot(a), self.slot(b)) {
            (Some(a), Some(b)) => {
                // SAFETY: both slots are live, `ptr::swap` allows them to be the same
                unsafe { ptr::swap(a, b) };
                Ok(())
            }
            _ => Err(RuntimeError::StackUnderflow),
        }
    }

    pub fn as_slice(&self) -> &[Data] {
        // SAFETY: the first `len` slots are initialized
        unsafe { slice::from_raw_parts(self.base.as_ptr(), self.len) }
    }
}

impl Drop for Stack {
    fn drop(&mut self) {
        let slots = ptr::slice_from_raw_parts_mut(self.base.as_ptr(), self.capacity);
        // SAFETY: `base` came from `Box::leak` of a slice of exactly `capacity` slots
        drop(unsafe { Box::from_raw(slots) });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_and_pop() {
        let mut stack = Stack::new(2);
        stack.push(Data::int(1)).unwrap();
        stack.push(Data::char(b'a')).unwrap();
        assert!(matches!(stack.push(Data::int(3)), Err(RuntimeError::StackOverflow)));
        assert_eq!(stack.as_slice(), &[Data::int(1), Data::char(b'a')]);

        assert_eq!(stack.pop().unwrap(), Data::char(b'a'));
        assert_eq!(stack.pop().unwrap(), Data::int(1));
        assert!(matches!(stack.pop(), Err(RuntimeError::StackUnderflow)));
        assert!(stack.is_empty());
    }

    #[test]
    fn slot_pointers_survive_changes() {
        let mut stack = Stack::new(4);
        stack.push(Data::int(7)).unwrap();
        let slot = stack.slot(0).unwrap();

        stack.push(Data::int(8)).unwrap();
        stack.swap(0, 1).unwrap();
        stack.pop().unwrap();
        assert_eq!(unsafe { slot.read() }, Data::int(8));
        assert_eq!(stack.get(1), None);
    }
}
