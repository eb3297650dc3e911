//! `func` dialect.
//!
//! A function's entry block arguments are its parameters. Memref-typed
//! parameters are the buffers a function operates on.

use smallvec::smallvec;

use crate::context::{IrContext, RegionData};
use crate::location::Location;
use crate::refs::{BlockRef, OpRef, RegionRef, TypeRef, ValueRef};
use crate::types::Attribute;
use crate::{OperationDataBuilder, Symbol};

use super::core::ATTR_SYM_NAME;

crate::define_op! {
    Func => "func", "func"
}

crate::define_op! {
    Return => "func", "return"
}

pub fn func(ctx: &mut IrContext, location: Location, name: Symbol, body: RegionRef) -> Func {
    let data = OperationDataBuilder::new(location, Symbol::new("func"), Symbol::new("func"))
        .attr(ATTR_SYM_NAME(), Attribute::Symbol(name))
        .region(body)
        .build(ctx);
    Func(ctx.create_op(data))
}

/// Create a function with a fresh entry block taking `params`.
///
/// Returns the function and its entry block so callers can fill the body.
pub fn func_with_params(
    ctx: &mut IrContext,
    location: Location,
    name: Symbol,
    params: impl IntoIterator<Item = TypeRef>,
) -> (Func, BlockRef) {
    let entry = ctx.create_block_with_args(location, params);
    let body = ctx.create_region(RegionData {
        location,
        blocks: smallvec![entry],
        parent_op: None,
    });
    (func(ctx, location, name, body), entry)
}

impl Func {
    pub fn name(self, ctx: &IrContext) -> Option<Symbol> {
        ctx.op(self.0)
            .attributes
            .get(&ATTR_SYM_NAME())
            .and_then(Attribute::as_symbol)
    }

    pub fn body(self, ctx: &IrContext) -> RegionRef {
        ctx.op(self.0).regions[0]
    }

    pub fn entry_block(self, ctx: &IrContext) -> Option<BlockRef> {
        ctx.region_entry(self.body(ctx))
    }

    /// The `func.return` terminating the entry block, if present.
    pub fn return_op(self, ctx: &IrContext) -> Option<OpRef> {
        use crate::ops::DialectOp;

        let entry = self.entry_block(ctx)?;
        let last = *ctx.block(entry).ops.last()?;
        Return::matches(ctx, last).then_some(last)
    }
}

pub fn r#return(
    ctx: &mut IrContext,
    location: Location,
    values: impl IntoIterator<Item = ValueRef>,
) -> Return {
    let data = OperationDataBuilder::new(location, Symbol::new("func"), Symbol::new("return"))
        .operands(values)
        .build(ctx);
    Return(ctx.create_op(data))
}

impl Return {
    pub fn values(self, ctx: &IrContext) -> &[ValueRef] {
        ctx.op_operands(self.0)
    }
}
