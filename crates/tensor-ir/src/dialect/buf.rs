//! `buf` dialect: the buffer-based loop.
//!
//! `buf.while %pred {cond} {body}` runs `cond`, then `body` while the scalar
//! buffer `%pred` holds true. Both regions communicate through buffer
//! mutation and end in `buf.terminator`.

use smallvec::smallvec;

use crate::context::{IrContext, RegionData};
use crate::location::Location;
use crate::refs::{BlockRef, RegionRef, ValueRef};
use crate::{OperationDataBuilder, Symbol};

crate::define_op! {
    While => "buf", "while"
}

crate::define_op! {
    Terminator => "buf", "terminator"
}

pub fn r#while(
    ctx: &mut IrContext,
    location: Location,
    pred: ValueRef,
    cond: RegionRef,
    body: RegionRef,
) -> While {
    let data = OperationDataBuilder::new(location, Symbol::new("buf"), Symbol::new("while"))
        .operand(pred)
        .region(cond)
        .region(body)
        .build(ctx);
    While(ctx.create_op(data))
}

/// Create a `buf.while` with two fresh argument-less blocks.
///
/// Returns the loop together with its condition and body blocks.
pub fn while_with_blocks(
    ctx: &mut IrContext,
    location: Location,
    pred: ValueRef,
) -> (While, BlockRef, BlockRef) {
    let cond_block = ctx.create_block_with_args(location, []);
    let body_block = ctx.create_block_with_args(location, []);
    let cond = ctx.create_region(RegionData {
        location,
        blocks: smallvec![cond_block],
        parent_op: None,
    });
    let body = ctx.create_region(RegionData {
        location,
        blocks: smallvec![body_block],
        parent_op: None,
    });
    (r#while(ctx, location, pred, cond, body), cond_block, body_block)
}

impl While {
    /// Scalar buffer deciding whether another iteration runs.
    pub fn pred(self, ctx: &IrContext) -> ValueRef {
        ctx.op_operands(self.0)[0]
    }

    pub fn cond(self, ctx: &IrContext) -> RegionRef {
        ctx.op(self.0).regions[0]
    }

    pub fn body(self, ctx: &IrContext) -> RegionRef {
        ctx.op(self.0).regions[1]
    }

    pub fn cond_block(self, ctx: &IrContext) -> Option<BlockRef> {
        ctx.region_entry(self.cond(ctx))
    }

    pub fn body_block(self, ctx: &IrContext) -> Option<BlockRef> {
        ctx.region_entry(self.body(ctx))
    }
}

pub fn terminator(ctx: &mut IrContext, location: Location) -> Terminator {
    let data = OperationDataBuilder::new(location, Symbol::new("buf"), Symbol::new("terminator"))
        .build(ctx);
    Terminator(ctx.create_op(data))
}
