//! Remapping state shared by every de-bufferization rule.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use tensor_ir::{BlockRef, ValueRef};

use crate::buffer_usage::Buffer;

/// For each `(block, buffer)`, the value currently standing in for the
/// buffer inside that block.
///
/// There is no fallback to enclosing blocks: each nested region is seeded
/// explicitly when it is created.
#[derive(Debug, Default)]
pub struct DeBufferization {
    remapped: HashMap<(BlockRef, Buffer), ValueRef>,
}

/// Handle passed to every rule registered for one pass invocation.
pub type SharedDeBufferization = Rc<RefCell<DeBufferization>>;

impl DeBufferization {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedDeBufferization {
        Rc::new(RefCell::new(Self::new()))
    }

    /// Map `buffer` to `value` in `block`, overwriting any earlier mapping.
    pub fn set(&mut self, block: BlockRef, buffer: Buffer, value: ValueRef) {
        self.remapped.insert((block, buffer), value);
    }

    /// The value standing in for `buffer` in `block`.
    ///
    /// # Panics
    ///
    /// Panics if the key was never seeded.
    pub fn get(&self, block: BlockRef, buffer: Buffer) -> ValueRef {
        match self.remapped.get(&(block, buffer)) {
            Some(&value) => value,
            None => panic!("no value recorded for {buffer} in {block}"),
        }
    }

    pub fn lookup(&self, block: BlockRef, buffer: Buffer) -> Option<ValueRef> {
        self.remapped.get(&(block, buffer)).copied()
    }

    pub fn contains(&self, block: BlockRef, buffer: Buffer) -> bool {
        self.remapped.contains_key(&(block, buffer))
    }

    pub fn len(&self) -> usize {
        self.remapped.len()
    }

    pub fn is_empty(&self) -> bool {
        self.remapped.is_empty()
    }
}
