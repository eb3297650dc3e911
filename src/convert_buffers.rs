//! Buffer access conversion.
//!
//! `memref.read` and `memref.write` disappear into the remapping state: a
//! read is replaced by the value currently standing in for its buffer, and a
//! write makes its operand the new stand-in for the rest of the block.
//!
//! Both rules only fire once the enclosing block has a value for the buffer,
//! and never inside a `buf.while` that is still waiting for conversion: its
//! regions belong to the loop rule until it succeeds.

use std::rc::Rc;

use tensor_ir::dialect::{buf, memref};
use tensor_ir::rewrite::{PatternApplicator, PatternRewriter, RewritePattern};
use tensor_ir::{DialectOp, IrContext, OpRef};
use tracing::trace;

use crate::buffer_usage::resolve_buffer;
use crate::state::SharedDeBufferization;

/// Register the read and write rules on `applicator`, sharing `state`.
pub fn populate_buffer_access_conversion_patterns(
    applicator: PatternApplicator,
    state: &SharedDeBufferization,
) -> PatternApplicator {
    applicator
        .add_pattern(ConvertReadPattern {
            state: Rc::clone(state),
        })
        .add_pattern(ConvertWritePattern {
            state: Rc::clone(state),
        })
}

pub struct ConvertReadPattern {
    state: SharedDeBufferization,
}

impl RewritePattern for ConvertReadPattern {
    fn match_and_rewrite(
        &self,
        ctx: &mut IrContext,
        op: OpRef,
        rewriter: &mut PatternRewriter<'_>,
    ) -> bool {
        let Ok(read) = memref::Read::from_op(ctx, op) else {
            return false;
        };
        let Some(block) = ctx.op(op).parent_block else {
            return false;
        };
        if inside_buffer_loop(ctx, op) {
            return false;
        }
        let buffer = resolve_buffer(ctx, read.buffer(ctx));
        let Some(value) = self.state.borrow().lookup(block, buffer) else {
            trace!(%op, %buffer, %block, "read of a buffer with no value yet");
            return false;
        };
        rewriter.erase_op(vec![value]);
        true
    }
}

pub struct ConvertWritePattern {
    state: SharedDeBufferization,
}

impl RewritePattern for ConvertWritePattern {
    fn match_and_rewrite(
        &self,
        ctx: &mut IrContext,
        op: OpRef,
        rewriter: &mut PatternRewriter<'_>,
    ) -> bool {
        let Ok(write) = memref::Write::from_op(ctx, op) else {
            return false;
        };
        let Some(block) = ctx.op(op).parent_block else {
            return false;
        };
        if inside_buffer_loop(ctx, op) {
            return false;
        }
        let buffer = resolve_buffer(ctx, write.buffer(ctx));
        let mut state = self.state.borrow_mut();
        if !state.contains(block, buffer) {
            trace!(%op, %buffer, %block, "write to a buffer with no value yet");
            return false;
        }
        state.set(block, buffer, write.value(ctx));
        rewriter.erase_op(vec![]);
        true
    }
}

/// Whether `op` sits anywhere inside an unconverted `buf.while`.
fn inside_buffer_loop(ctx: &IrContext, op: OpRef) -> bool {
    std::iter::successors(ctx.parent_op(op), |&owner| ctx.parent_op(owner))
        .any(|owner| buf::While::matches(ctx, owner))
}
