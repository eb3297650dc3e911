//! Recursive operation traversal.

use std::ops::ControlFlow;

use crate::context::IrContext;
use crate::ops::DialectOp;
use crate::refs::{BlockRef, OpRef, RegionRef};

/// Controls whether to descend into children during a walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkAction {
    /// Continue walking and descend into nested regions.
    Advance,
    /// Skip the nested regions of the current operation.
    Skip,
}

/// Walk all operations in a region recursively, in pre-order.
pub fn walk_region<B>(
    ctx: &IrContext,
    region: RegionRef,
    f: &mut dyn FnMut(OpRef) -> ControlFlow<B, WalkAction>,
) -> ControlFlow<B, ()> {
    for &block in &ctx.region(region).blocks {
        walk_block(ctx, block, f)?;
    }
    ControlFlow::Continue(())
}

/// Walk all operations in a block recursively, in pre-order.
pub fn walk_block<B>(
    ctx: &IrContext,
    block: BlockRef,
    f: &mut dyn FnMut(OpRef) -> ControlFlow<B, WalkAction>,
) -> ControlFlow<B, ()> {
    for &op in &ctx.block(block).ops {
        walk_op(ctx, op, f)?;
    }
    ControlFlow::Continue(())
}

/// Walk an operation and its nested regions recursively.
pub fn walk_op<B>(
    ctx: &IrContext,
    op: OpRef,
    f: &mut dyn FnMut(OpRef) -> ControlFlow<B, WalkAction>,
) -> ControlFlow<B, ()> {
    match f(op) {
        ControlFlow::Break(b) => return ControlFlow::Break(b),
        ControlFlow::Continue(WalkAction::Skip) => return ControlFlow::Continue(()),
        ControlFlow::Continue(WalkAction::Advance) => {}
    }
    for &region in &ctx.op(op).regions {
        walk_region(ctx, region, f)?;
    }
    ControlFlow::Continue(())
}

/// Walk operations of a specific dialect type in a block.
pub fn walk_typed<T, B>(
    ctx: &IrContext,
    block: BlockRef,
    f: &mut dyn FnMut(T) -> ControlFlow<B, WalkAction>,
) -> ControlFlow<B, ()>
where
    T: DialectOp,
{
    walk_block(ctx, block, &mut |op| {
        if let Ok(typed) = T::from_op(ctx, op) {
            f(typed)
        } else {
            ControlFlow::Continue(WalkAction::Advance)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{arith, core, scf};
    use crate::*;
    use smallvec::smallvec;

    fn test_ctx() -> (IrContext, Location) {
        let mut ctx = IrContext::new();
        let loc = ctx.location("test.mlir");
        (ctx, loc)
    }

    #[test]
    fn walk_block_finds_all_ops() {
        let (mut ctx, loc) = test_ctx();
        let i32_ty = core::i32_type(&mut ctx);
        let block = ctx.create_block_with_args(loc, []);
        let a = arith::r#const(&mut ctx, loc, i32_ty, 1);
        let b = arith::r#const(&mut ctx, loc, i32_ty, 2);
        ctx.push_op(block, a.op_ref());
        ctx.push_op(block, b.op_ref());

        let mut count = 0;
        let _ = walk_block::<()>(&ctx, block, &mut |_op| {
            count += 1;
            ControlFlow::Continue(WalkAction::Advance)
        });
        assert_eq!(count, 2);
    }

    #[test]
    fn walk_with_early_exit() {
        let (mut ctx, loc) = test_ctx();
        let i32_ty = core::i32_type(&mut ctx);
        let block = ctx.create_block_with_args(loc, []);
        let a = arith::r#const(&mut ctx, loc, i32_ty, 1);
        let b = arith::r#const(&mut ctx, loc, i32_ty, 2);
        ctx.push_op(block, a.op_ref());
        ctx.push_op(block, b.op_ref());

        let found = walk_block(&ctx, block, &mut |op| ControlFlow::Break(op));
        assert_eq!(found, ControlFlow::Break(a.op_ref()));
    }

    #[test]
    fn skip_does_not_descend() {
        let (mut ctx, loc) = test_ctx();
        let i32_ty = core::i32_type(&mut ctx);

        let inner_block = ctx.create_block_with_args(loc, []);
        let inner = arith::r#const(&mut ctx, loc, i32_ty, 7);
        ctx.push_op(inner_block, inner.op_ref());
        let before = ctx.create_region(RegionData {
            location: loc,
            blocks: smallvec![inner_block],
            parent_op: None,
        });
        let after_block = ctx.create_block_with_args(loc, []);
        let after = ctx.create_region(RegionData {
            location: loc,
            blocks: smallvec![after_block],
            parent_op: None,
        });
        let outer = scf::r#while(&mut ctx, loc, [], [], before, after);

        let top = ctx.create_block_with_args(loc, []);
        ctx.push_op(top, outer.op_ref());

        let mut seen = Vec::new();
        let _ = walk_block::<()>(&ctx, top, &mut |op| {
            seen.push(op);
            ControlFlow::Continue(WalkAction::Skip)
        });
        assert_eq!(seen, vec![outer.op_ref()]);

        let mut consts = 0;
        let _ = walk_typed::<arith::Const, ()>(&ctx, top, &mut |_c| {
            consts += 1;
            ControlFlow::Continue(WalkAction::Advance)
        });
        assert_eq!(consts, 1);
    }
}
