//! `scf` dialect: the value-based loop.
//!
//! `scf.while(%init...) -> results {before} {after}`: `before` receives the
//! carried values and ends in `scf.condition(%pred, %values...)`. When the
//! predicate holds, `after` receives those values and ends in
//! `scf.yield(%values...)`; otherwise they become the loop results.

use crate::context::IrContext;
use crate::location::Location;
use crate::refs::{BlockRef, RegionRef, TypeRef, ValueRef};
use crate::{OperationDataBuilder, Symbol};

crate::define_op! {
    While => "scf", "while"
}

crate::define_op! {
    Condition => "scf", "condition"
}

crate::define_op! {
    Yield => "scf", "yield"
}

pub fn r#while(
    ctx: &mut IrContext,
    location: Location,
    init: impl IntoIterator<Item = ValueRef>,
    result_types: impl IntoIterator<Item = TypeRef>,
    before: RegionRef,
    after: RegionRef,
) -> While {
    let data = OperationDataBuilder::new(location, Symbol::new("scf"), Symbol::new("while"))
        .operands(init)
        .results(result_types)
        .region(before)
        .region(after)
        .build(ctx);
    While(ctx.create_op(data))
}

impl While {
    pub fn init(self, ctx: &IrContext) -> &[ValueRef] {
        ctx.op_operands(self.0)
    }

    pub fn results(self, ctx: &IrContext) -> &[ValueRef] {
        ctx.op_results(self.0)
    }

    pub fn before(self, ctx: &IrContext) -> RegionRef {
        ctx.op(self.0).regions[0]
    }

    pub fn after(self, ctx: &IrContext) -> RegionRef {
        ctx.op(self.0).regions[1]
    }

    pub fn before_block(self, ctx: &IrContext) -> Option<BlockRef> {
        ctx.region_entry(self.before(ctx))
    }

    pub fn after_block(self, ctx: &IrContext) -> Option<BlockRef> {
        ctx.region_entry(self.after(ctx))
    }
}

pub fn condition(
    ctx: &mut IrContext,
    location: Location,
    pred: ValueRef,
    values: impl IntoIterator<Item = ValueRef>,
) -> Condition {
    let data = OperationDataBuilder::new(location, Symbol::new("scf"), Symbol::new("condition"))
        .operand(pred)
        .operands(values)
        .build(ctx);
    Condition(ctx.create_op(data))
}

impl Condition {
    pub fn pred(self, ctx: &IrContext) -> ValueRef {
        ctx.op_operands(self.0)[0]
    }

    /// Values forwarded to `after` or to the loop results.
    pub fn values(self, ctx: &IrContext) -> &[ValueRef] {
        &ctx.op_operands(self.0)[1..]
    }
}

pub fn r#yield(
    ctx: &mut IrContext,
    location: Location,
    values: impl IntoIterator<Item = ValueRef>,
) -> Yield {
    let data = OperationDataBuilder::new(location, Symbol::new("scf"), Symbol::new("yield"))
        .operands(values)
        .build(ctx);
    Yield(ctx.create_op(data))
}

impl Yield {
    pub fn values(self, ctx: &IrContext) -> &[ValueRef] {
        ctx.op_operands(self.0)
    }
}
