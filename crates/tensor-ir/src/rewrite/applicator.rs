//! PatternApplicator: drives rewrite patterns over a module to a fixpoint.
//!
//! Blocks are walked with a cursor rather than a snapshot. An op is offered
//! to the patterns before its regions are visited, so a pattern that builds
//! a new construct around existing ops sees them again inside the new
//! regions. After a match the cursor stays put, which visits inserted and
//! replacement ops in turn.

use std::collections::HashSet;

use super::conversion_target::{ConversionTarget, IllegalOp};
use super::pattern::RewritePattern;
use super::rewriter::{self, PatternRewriter};
use super::type_converter::TypeConverter;
use crate::context::IrContext;
use crate::dialect::core::Module;
use crate::refs::{BlockRef, OpRef, RegionRef};

/// Result of applying rewrite patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApplyResult {
    /// Number of fixpoint iterations performed.
    pub iterations: usize,
    /// Total number of pattern matches committed.
    pub total_changes: usize,
    /// Whether the last iteration made no change.
    pub reached_fixpoint: bool,
}

impl ApplyResult {
    /// Verify that no illegal operations remain.
    pub fn verify(
        &self,
        ctx: &IrContext,
        module: Module,
        target: &ConversionTarget,
    ) -> Result<(), Vec<IllegalOp>> {
        let illegal = target.verify(ctx, module.body(ctx));
        if illegal.is_empty() {
            Ok(())
        } else {
            Err(illegal)
        }
    }
}

/// Prioritized list of patterns; the first one that matches an op wins.
pub struct PatternApplicator {
    patterns: Vec<Box<dyn RewritePattern>>,
    max_iterations: usize,
    type_converter: TypeConverter,
}

impl PatternApplicator {
    pub fn new(type_converter: TypeConverter) -> Self {
        Self {
            patterns: Vec::new(),
            max_iterations: 10,
            type_converter,
        }
    }

    pub fn add_pattern(mut self, pattern: impl RewritePattern + 'static) -> Self {
        self.patterns.push(Box::new(pattern));
        self
    }

    pub fn with_max_iterations(mut self, n: usize) -> Self {
        self.max_iterations = n;
        self
    }

    pub fn type_converter(&self) -> &TypeConverter {
        &self.type_converter
    }

    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }

    /// Apply patterns and verify the result against `target`.
    pub fn apply(
        &self,
        ctx: &mut IrContext,
        module: Module,
        target: &ConversionTarget,
    ) -> Result<ApplyResult, Vec<IllegalOp>> {
        let result = self.apply_partial(ctx, module);
        result.verify(ctx, module, target)?;
        Ok(result)
    }

    /// Apply patterns without verification.
    pub fn apply_partial(&self, ctx: &mut IrContext, module: Module) -> ApplyResult {
        let mut total_changes = 0;
        let mut iterations = 0;

        while iterations < self.max_iterations {
            iterations += 1;
            let body = module.body(ctx);
            let changes = self.visit_region(ctx, body);
            tracing::trace!(iteration = iterations, changes, "pattern iteration");
            total_changes += changes;
            if changes == 0 {
                return ApplyResult {
                    iterations,
                    total_changes,
                    reached_fixpoint: true,
                };
            }
        }

        tracing::warn!(
            max_iterations = self.max_iterations,
            "pattern application did not reach a fixpoint"
        );
        ApplyResult {
            iterations,
            total_changes,
            reached_fixpoint: false,
        }
    }

    fn visit_region(&self, ctx: &mut IrContext, region: RegionRef) -> usize {
        let blocks: Vec<BlockRef> = ctx.region(region).blocks.to_vec();
        blocks
            .into_iter()
            .map(|block| self.visit_block(ctx, block))
            .sum()
    }

    fn visit_block(&self, ctx: &mut IrContext, block: BlockRef) -> usize {
        let mut changes = 0;
        // Ops that survived their own rewrite; offering them again would loop.
        let mut rewritten: HashSet<OpRef> = HashSet::new();
        let mut idx = 0;

        while let Some(&op) = ctx.block(block).ops.get(idx) {
            if !rewritten.contains(&op) && self.try_patterns(ctx, op) {
                changes += 1;
                if ctx.op(op).parent_block == Some(block) {
                    rewritten.insert(op);
                }
                continue;
            }

            let regions: Vec<RegionRef> = ctx.op(op).regions.to_vec();
            for region in regions {
                changes += self.visit_region(ctx, region);
            }
            idx += 1;
        }

        changes
    }

    fn try_patterns(&self, ctx: &mut IrContext, op: OpRef) -> bool {
        for pattern in &self.patterns {
            let mut rw = PatternRewriter::new(&self.type_converter);
            if pattern.match_and_rewrite(ctx, op, &mut rw) && rw.has_mutations() {
                tracing::trace!(pattern = pattern.name(), %op, "pattern applied");
                rewriter::apply_mutations(ctx, op, rw.take_mutations());
                return true;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{arith, core};
    use crate::ops::{DialectOp, OpExt};
    use crate::*;

    fn test_ctx() -> (IrContext, Location) {
        let mut ctx = IrContext::new();
        let loc = ctx.location("test.mlir");
        (ctx, loc)
    }

    /// Pattern: rewrite `arith.add(x, x)` into `arith.add(x, const 0)`.
    struct DoubleToZeroPattern;

    impl RewritePattern for DoubleToZeroPattern {
        fn match_and_rewrite(
            &self,
            ctx: &mut IrContext,
            op: OpRef,
            rewriter: &mut PatternRewriter<'_>,
        ) -> bool {
            let Ok(add) = arith::Add::from_op(ctx, op) else {
                return false;
            };
            if add.lhs(ctx) != add.rhs(ctx) {
                return false;
            }
            let loc = ctx.op(op).location;
            let ty = ctx.value_ty(add.result(ctx));
            let zero = arith::r#const(ctx, loc, ty, 0);
            let (lhs, zero_v) = (add.lhs(ctx), zero.result(ctx));
            let new_add = arith::add(ctx, loc, lhs, zero_v, ty);
            rewriter.replace_with_prefix(vec![zero.op_ref()], new_add.op_ref());
            true
        }
    }

    /// Pattern that records an erase but then declines.
    struct DeclinePattern;

    impl RewritePattern for DeclinePattern {
        fn match_and_rewrite(
            &self,
            ctx: &mut IrContext,
            op: OpRef,
            rewriter: &mut PatternRewriter<'_>,
        ) -> bool {
            if arith::Const::matches(ctx, op) {
                rewriter.erase_op(vec![]);
            }
            false
        }
    }

    #[test]
    fn replacement_keeps_position_and_uses() {
        let (mut ctx, loc) = test_ctx();
        let i32_ty = core::i32_type(&mut ctx);
        let one = arith::r#const(&mut ctx, loc, i32_ty, 1);
        let x = one.result(&ctx);
        let dbl = arith::add(&mut ctx, loc, x, x, i32_ty);
        let doubled = dbl.result(&ctx);
        let user = arith::add(&mut ctx, loc, doubled, x, i32_ty);
        let module = core::build_module(
            &mut ctx,
            loc,
            Symbol::new("m"),
            [one.op_ref(), dbl.op_ref(), user.op_ref()],
        );

        let applicator = PatternApplicator::new(TypeConverter::new()).add_pattern(DoubleToZeroPattern);
        let result = applicator.apply_partial(&mut ctx, module);

        assert!(result.reached_fixpoint);
        assert_eq!(result.total_changes, 1);
        assert_eq!(result.iterations, 2);

        let ops = module.ops(&ctx);
        assert_eq!(ops.len(), 4);
        assert!(arith::Const::matches(&ctx, ops[1]));
        let new_add = arith::Add::from_op(&ctx, ops[2]).unwrap();
        assert_eq!(user.lhs(&ctx), new_add.result(&ctx));
    }

    #[test]
    fn declined_pattern_mutations_are_dropped() {
        let (mut ctx, loc) = test_ctx();
        let i32_ty = core::i32_type(&mut ctx);
        let one = arith::r#const(&mut ctx, loc, i32_ty, 1);
        let module = core::build_module(&mut ctx, loc, Symbol::new("m"), [one.op_ref()]);

        let applicator = PatternApplicator::new(TypeConverter::new()).add_pattern(DeclinePattern);
        let result = applicator.apply_partial(&mut ctx, module);

        assert_eq!(result.total_changes, 0);
        assert_eq!(module.ops(&ctx), vec![one.op_ref()]);
    }

    #[test]
    fn apply_reports_remaining_illegal_ops() {
        let (mut ctx, loc) = test_ctx();
        let i32_ty = core::i32_type(&mut ctx);
        let one = arith::r#const(&mut ctx, loc, i32_ty, 1);
        let module = core::build_module(&mut ctx, loc, Symbol::new("m"), [one.op_ref()]);

        let mut target = ConversionTarget::new();
        target.add_illegal_dialect("arith");
        target.add_legal_op("arith", "add");

        let applicator = PatternApplicator::new(TypeConverter::new());
        let illegal = applicator.apply(&mut ctx, module, &target).unwrap_err();
        assert_eq!(illegal.len(), 1);
        assert_eq!(illegal[0].op, one.op_ref());
        assert_eq!(illegal[0].name, "const");
    }
}
