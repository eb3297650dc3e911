//! Buffer-usage analysis.
//!
//! Classifies the buffers touched by a group of blocks into those only read
//! and those written. Buffers are compared by identity after stripping
//! `memref.view` chains, so two views of one buffer count as the same
//! buffer.

use std::fmt;
use std::ops::ControlFlow;

use indexmap::IndexSet;
use tensor_ir::dialect::{buf, memref};
use tensor_ir::walk::{self, WalkAction};
use tensor_ir::{BlockRef, DialectOp, IrContext, ValueRef};

/// Canonical identity of a buffer: the root value under any views.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Buffer(ValueRef);

impl Buffer {
    pub fn value(self) -> ValueRef {
        self.0
    }
}

impl fmt::Display for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "buffer({})", self.0)
    }
}

/// Resolve a buffer-typed value to its canonical identity.
pub fn resolve_buffer(ctx: &IrContext, mut value: ValueRef) -> Buffer {
    while let Some(view) = ctx
        .defining_op(value)
        .and_then(|op| memref::View::from_op(ctx, op).ok())
    {
        value = view.source(ctx);
    }
    Buffer(value)
}

/// Buffers read and written by a group of blocks.
///
/// Both sets iterate in first-seen program order. A buffer that is written
/// anywhere is never in `read`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UsedBuffers {
    pub read: IndexSet<Buffer>,
    pub write: IndexSet<Buffer>,
}

impl UsedBuffers {
    /// Every buffer in the group: reads first, then writes.
    pub fn all(&self) -> impl Iterator<Item = Buffer> + '_ {
        self.read.iter().chain(&self.write).copied()
    }
}

/// Walk `blocks` (and everything nested in them) and classify buffer
/// accesses.
///
/// `memref.read` and the predicate of a nested `buf.while` count as reads;
/// `memref.write` counts as a write. Other operations are not classified.
pub fn get_used_buffers(ctx: &IrContext, blocks: &[BlockRef]) -> UsedBuffers {
    let mut used = UsedBuffers::default();

    for &block in blocks {
        let _ = walk::walk_block::<()>(ctx, block, &mut |op| {
            if let Ok(read) = memref::Read::from_op(ctx, op) {
                used.read.insert(resolve_buffer(ctx, read.buffer(ctx)));
            } else if let Ok(write) = memref::Write::from_op(ctx, op) {
                used.write.insert(resolve_buffer(ctx, write.buffer(ctx)));
            } else if let Ok(inner) = buf::While::from_op(ctx, op) {
                used.read.insert(resolve_buffer(ctx, inner.pred(ctx)));
            }
            ControlFlow::Continue(WalkAction::Advance)
        });
    }

    used.read.retain(|b| !used.write.contains(b));
    used
}
