//! `buf.while` → `scf.while` conversion.
//!
//! ## Transformations
//!
//! 1. `buf.while %pred {cond} {body}` → `scf.while(%init...) {before} {after}`
//!    where `%init` holds the current value of every buffer the loop writes.
//! 2. `buf.terminator` in `before` → `scf.condition(%flag, %carried...)`
//! 3. `buf.terminator` in `after` → `scf.yield(%carried...)`
//!
//! The loop rule splices the old regions into the new loop and seeds the
//! remapping state of both new blocks; the terminator rule runs later, when
//! the applicator descends into those blocks, and reads the loop's record
//! from the table both rules share.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use itertools::Itertools;
use smallvec::{SmallVec, smallvec};
use tensor_ir::dialect::{arith, buf, core, scf, shaped_parts, tensor};
use tensor_ir::rewrite::{PatternApplicator, PatternRewriter, RewritePattern};
use tensor_ir::{
    BlockRef, DialectOp, IrContext, Location, OpExt, OpRef, RegionData, RegionRef, TypeRef,
    ValueRef,
};
use tracing::{debug, trace, warn};

use crate::buffer_usage::{Buffer, UsedBuffers, get_used_buffers, resolve_buffer};
use crate::state::SharedDeBufferization;

/// What a converted loop owns: its predicate buffer and the buffers its
/// regions touch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConvertedLoop {
    pub predicate: Buffer,
    pub buffers: UsedBuffers,
}

/// Converted loops keyed by the `scf.while` that replaced them.
pub type ConvertedLoops = Rc<RefCell<HashMap<OpRef, ConvertedLoop>>>;

/// Register the loop and terminator rules on `applicator`.
///
/// Both rules share `state` and a fresh table of converted loops that lives
/// as long as the applicator.
pub fn populate_while_op_conversion_patterns(
    applicator: PatternApplicator,
    state: &SharedDeBufferization,
) -> PatternApplicator {
    let converted: ConvertedLoops = Rc::default();
    applicator
        .add_pattern(ConvertWhilePattern {
            state: Rc::clone(state),
            converted: Rc::clone(&converted),
        })
        .add_pattern(ConvertTerminatorPattern {
            state: Rc::clone(state),
            converted,
        })
}

// === Pattern: buf.while → scf.while ===

pub struct ConvertWhilePattern {
    state: SharedDeBufferization,
    converted: ConvertedLoops,
}

impl RewritePattern for ConvertWhilePattern {
    fn match_and_rewrite(
        &self,
        ctx: &mut IrContext,
        op: OpRef,
        rewriter: &mut PatternRewriter<'_>,
    ) -> bool {
        let Ok(old_loop) = buf::While::from_op(ctx, op) else {
            return false;
        };
        let (Some(cond), Some(body)) = (old_loop.cond_block(ctx), old_loop.body_block(ctx)) else {
            debug!(%op, "buf.while without condition or body block");
            return false;
        };
        if !ctx.block_args(cond).is_empty() || !ctx.block_args(body).is_empty() {
            debug!(%op, "buf.while regions must not take arguments");
            return false;
        }
        let Some(parent) = ctx.op(op).parent_block else {
            return false;
        };

        let predicate = resolve_buffer(ctx, old_loop.pred(ctx));
        let mut buffers = get_used_buffers(ctx, &[cond, body]);
        if !buffers.write.contains(&predicate) {
            buffers.read.insert(predicate);
        }

        let mut state = self.state.borrow_mut();
        if let Some(missing) = buffers.all().find(|&b| !state.contains(parent, b)) {
            warn!(%op, buffer = %missing, "buffer has no value in the enclosing block");
            return false;
        }

        // Iteration arguments follow the write set's order everywhere below.
        let init: Vec<ValueRef> = buffers.write.iter().map(|&b| state.get(parent, b)).collect();
        let types: Vec<TypeRef> = init.iter().map(|&v| ctx.value_ty(v)).collect();
        let location = ctx.op(op).location;

        let before_block = ctx.create_block_with_args(location, types.iter().copied());
        let after_block = ctx.create_block_with_args(location, types.iter().copied());
        ctx.merge_blocks(cond, before_block, &[]);
        ctx.merge_blocks(body, after_block, &[]);
        let before = single_block_region(ctx, location, before_block);
        let after = single_block_region(ctx, location, after_block);
        let new_loop = scf::r#while(ctx, location, init, types, before, after);

        for block in [before_block, after_block] {
            for &buffer in &buffers.read {
                let value = state.get(parent, buffer);
                state.set(block, buffer, value);
            }
            let args = ctx.block_args(block);
            for (&buffer, &arg) in buffers.write.iter().zip_eq(args) {
                state.set(block, buffer, arg);
            }
        }
        for (&buffer, &result) in buffers.write.iter().zip_eq(new_loop.results(ctx)) {
            state.set(parent, buffer, result);
        }
        drop(state);

        debug!(
            old = %op,
            new = %new_loop.op_ref(),
            read = buffers.read.len(),
            write = buffers.write.len(),
            "converted buf.while"
        );
        self.converted
            .borrow_mut()
            .insert(new_loop.op_ref(), ConvertedLoop { predicate, buffers });

        rewriter.insert_op(new_loop.op_ref());
        rewriter.erase_op(vec![]);
        true
    }
}

fn single_block_region(ctx: &mut IrContext, location: Location, block: BlockRef) -> RegionRef {
    ctx.create_region(RegionData {
        location,
        blocks: smallvec![block],
        parent_op: None,
    })
}

// === Pattern: buf.terminator → scf.condition / scf.yield ===

pub struct ConvertTerminatorPattern {
    state: SharedDeBufferization,
    converted: ConvertedLoops,
}

impl RewritePattern for ConvertTerminatorPattern {
    fn match_and_rewrite(
        &self,
        ctx: &mut IrContext,
        op: OpRef,
        rewriter: &mut PatternRewriter<'_>,
    ) -> bool {
        if !buf::Terminator::matches(ctx, op) {
            return false;
        }
        let Some(block) = ctx.op(op).parent_block else {
            return false;
        };
        let Some(owner) = ctx.block_parent_op(block) else {
            trace!(%op, "terminator outside any region");
            return false;
        };
        let Ok(new_loop) = scf::While::from_op(ctx, owner) else {
            trace!(%op, owner = %ctx.op_full_name(owner), "terminator not inside scf.while");
            return false;
        };
        let converted = self.converted.borrow();
        let Some(record) = converted.get(&owner) else {
            trace!(%op, %owner, "enclosing loop was not converted from buf.while");
            return false;
        };

        let in_before = new_loop.before_block(ctx) == Some(block);
        let in_after = new_loop.after_block(ctx) == Some(block);
        if !in_before && !in_after {
            debug!(%op, %block, loop_op = %owner, "terminator in neither loop block");
            return false;
        }

        let state = self.state.borrow();
        let carried: Vec<ValueRef> = record
            .buffers
            .write
            .iter()
            .map(|&b| state.get(block, b))
            .collect();
        let location = ctx.op(op).location;

        if in_before {
            let pred = state.get(block, record.predicate);
            let mut prefix = Vec::new();
            let flag = load_predicate(ctx, location, pred, &mut prefix);
            let condition = scf::condition(ctx, location, flag, carried);
            trace!(%op, values = record.buffers.write.len(), "terminator → scf.condition");
            rewriter.replace_with_prefix(prefix, condition.op_ref());
        } else {
            let yield_op = scf::r#yield(ctx, location, carried);
            trace!(%op, values = record.buffers.write.len(), "terminator → scf.yield");
            rewriter.replace_op(yield_op.op_ref());
        }
        true
    }
}

/// Turn the predicate's value into the scalar `scf.condition` expects.
///
/// A shaped predicate is read at index zero in every dimension; new ops are
/// appended to `prefix`. Scalars pass through unchanged.
fn load_predicate(
    ctx: &mut IrContext,
    location: Location,
    pred: ValueRef,
    prefix: &mut Vec<OpRef>,
) -> ValueRef {
    let ty = ctx.value_ty(pred);
    let Some((elem, shape)) = shaped_parts(ctx, ty) else {
        return pred;
    };

    let indices: SmallVec<[ValueRef; 4]> = if shape.is_empty() {
        SmallVec::new()
    } else {
        let index_ty = core::index_type(ctx);
        let zero = arith::r#const(ctx, location, index_ty, 0);
        prefix.push(zero.op_ref());
        let zero = zero.result(ctx);
        smallvec![zero; shape.len()]
    };
    let extract = tensor::extract(ctx, location, pred, indices, elem);
    prefix.push(extract.op_ref());
    extract.result(ctx)
}
