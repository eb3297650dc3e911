//! `arith` dialect: constants and elementwise compute.

use crate::context::IrContext;
use crate::location::Location;
use crate::refs::{TypeRef, ValueRef};
use crate::types::Attribute;
use crate::{OperationDataBuilder, Symbol};

use super::core;

crate::symbols! {
    ATTR_VALUE => "value",
}

crate::define_op! {
    Const => "arith", "const"
}

crate::define_op! {
    Add => "arith", "add"
}

crate::define_op! {
    /// Elementwise `lhs < rhs`, producing `core.i1` (or a shaped `i1`).
    CmpLt => "arith", "cmp_lt"
}

pub fn r#const(ctx: &mut IrContext, location: Location, ty: TypeRef, value: i64) -> Const {
    let data = OperationDataBuilder::new(location, Symbol::new("arith"), Symbol::new("const"))
        .attr(ATTR_VALUE(), Attribute::from(value))
        .result(ty)
        .build(ctx);
    Const(ctx.create_op(data))
}

impl Const {
    pub fn value(self, ctx: &IrContext) -> Option<i64> {
        ctx.op(self.0)
            .attributes
            .get(&ATTR_VALUE())
            .and_then(Attribute::as_int)
            .map(|bits| i64::from_ne_bytes(bits.to_ne_bytes()))
    }
}

pub fn add(
    ctx: &mut IrContext,
    location: Location,
    lhs: ValueRef,
    rhs: ValueRef,
    ty: TypeRef,
) -> Add {
    let data = OperationDataBuilder::new(location, Symbol::new("arith"), Symbol::new("add"))
        .operand(lhs)
        .operand(rhs)
        .result(ty)
        .build(ctx);
    Add(ctx.create_op(data))
}

impl Add {
    pub fn lhs(self, ctx: &IrContext) -> ValueRef {
        ctx.op_operands(self.0)[0]
    }

    pub fn rhs(self, ctx: &IrContext) -> ValueRef {
        ctx.op_operands(self.0)[1]
    }
}

/// Compare two scalars. Shaped comparisons pass the result type explicitly
/// through [`cmp_lt_shaped`].
pub fn cmp_lt(ctx: &mut IrContext, location: Location, lhs: ValueRef, rhs: ValueRef) -> CmpLt {
    let i1 = core::i1_type(ctx);
    cmp_lt_shaped(ctx, location, lhs, rhs, i1)
}

pub fn cmp_lt_shaped(
    ctx: &mut IrContext,
    location: Location,
    lhs: ValueRef,
    rhs: ValueRef,
    ty: TypeRef,
) -> CmpLt {
    let data = OperationDataBuilder::new(location, Symbol::new("arith"), Symbol::new("cmp_lt"))
        .operand(lhs)
        .operand(rhs)
        .result(ty)
        .build(ctx);
    CmpLt(ctx.create_op(data))
}
