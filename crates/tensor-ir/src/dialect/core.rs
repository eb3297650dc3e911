//! `core` dialect: the module container and scalar types.

use smallvec::smallvec;

use crate::context::{IrContext, RegionData};
use crate::location::Location;
use crate::ops::DialectOp;
use crate::refs::{BlockRef, OpRef, RegionRef, TypeRef};
use crate::types::Attribute;
use crate::{OperationDataBuilder, Symbol};

crate::symbols! {
    ATTR_SYM_NAME => "sym_name",
}

pub fn i1_type(ctx: &mut IrContext) -> TypeRef {
    ctx.types.scalar("core", "i1")
}

pub fn i32_type(ctx: &mut IrContext) -> TypeRef {
    ctx.types.scalar("core", "i32")
}

pub fn f32_type(ctx: &mut IrContext) -> TypeRef {
    ctx.types.scalar("core", "f32")
}

pub fn index_type(ctx: &mut IrContext) -> TypeRef {
    ctx.types.scalar("core", "index")
}

crate::define_op! {
    /// Top-level container with a single-block body.
    Module => "core", "module"
}

pub fn module(ctx: &mut IrContext, location: Location, name: Symbol, body: RegionRef) -> Module {
    let data = OperationDataBuilder::new(location, Symbol::new("core"), Symbol::new("module"))
        .attr(ATTR_SYM_NAME(), Attribute::Symbol(name))
        .region(body)
        .build(ctx);
    Module(ctx.create_op(data))
}

/// Build a module whose body block holds `ops` in order.
pub fn build_module(
    ctx: &mut IrContext,
    location: Location,
    name: Symbol,
    ops: impl IntoIterator<Item = OpRef>,
) -> Module {
    let block = ctx.create_block_with_args(location, []);
    for op in ops {
        ctx.push_op(block, op);
    }
    let body = ctx.create_region(RegionData {
        location,
        blocks: smallvec![block],
        parent_op: None,
    });
    module(ctx, location, name, body)
}

impl Module {
    pub fn name(self, ctx: &IrContext) -> Option<Symbol> {
        ctx.op(self.0)
            .attributes
            .get(&ATTR_SYM_NAME())
            .and_then(Attribute::as_symbol)
    }

    pub fn body(self, ctx: &IrContext) -> RegionRef {
        ctx.op(self.0).regions[0]
    }

    pub fn first_block(self, ctx: &IrContext) -> Option<BlockRef> {
        ctx.region_entry(self.body(ctx))
    }

    /// Top-level operations of the body block.
    pub fn ops(self, ctx: &IrContext) -> Vec<OpRef> {
        match self.first_block(ctx) {
            Some(block) => ctx.block(block).ops.to_vec(),
            None => vec![],
        }
    }

    pub fn op(self) -> OpRef {
        self.op_ref()
    }
}
