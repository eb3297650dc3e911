//! `memref` dialect: mutable, memory-backed buffers.

use crate::context::IrContext;
use crate::location::Location;
use crate::refs::{TypeRef, ValueRef};
use crate::types::TypeDataBuilder;
use crate::{OperationDataBuilder, Symbol};

use super::{ATTR_SHAPE, shape_attr};

/// Intern `memref.memref(elem) {shape = [...]}`.
pub fn memref_type(ctx: &mut IrContext, elem: TypeRef, shape: &[u64]) -> TypeRef {
    ctx.types.intern(
        TypeDataBuilder::new(Symbol::new("memref"), Symbol::new("memref"))
            .param(elem)
            .attr(ATTR_SHAPE(), shape_attr(shape))
            .build(),
    )
}

pub fn is_memref_type(ctx: &IrContext, ty: TypeRef) -> bool {
    ctx.types
        .is_dialect(ty, Symbol::new("memref"), Symbol::new("memref"))
}

crate::define_op! {
    /// Reinterpretation of a buffer. Shares storage with its source.
    View => "memref", "view"
}

crate::define_op! {
    /// Snapshot of a buffer's contents as a tensor value.
    Read => "memref", "read"
}

crate::define_op! {
    /// Store a tensor value into a buffer, overwriting it.
    Write => "memref", "write"
}

pub fn view(ctx: &mut IrContext, location: Location, source: ValueRef, ty: TypeRef) -> View {
    let data = OperationDataBuilder::new(location, Symbol::new("memref"), Symbol::new("view"))
        .operand(source)
        .result(ty)
        .build(ctx);
    View(ctx.create_op(data))
}

impl View {
    pub fn source(self, ctx: &IrContext) -> ValueRef {
        ctx.op_operands(self.0)[0]
    }
}

pub fn read(ctx: &mut IrContext, location: Location, buffer: ValueRef, ty: TypeRef) -> Read {
    let data = OperationDataBuilder::new(location, Symbol::new("memref"), Symbol::new("read"))
        .operand(buffer)
        .result(ty)
        .build(ctx);
    Read(ctx.create_op(data))
}

impl Read {
    pub fn buffer(self, ctx: &IrContext) -> ValueRef {
        ctx.op_operands(self.0)[0]
    }
}

pub fn write(ctx: &mut IrContext, location: Location, value: ValueRef, buffer: ValueRef) -> Write {
    let data = OperationDataBuilder::new(location, Symbol::new("memref"), Symbol::new("write"))
        .operand(value)
        .operand(buffer)
        .build(ctx);
    Write(ctx.create_op(data))
}

impl Write {
    pub fn value(self, ctx: &IrContext) -> ValueRef {
        ctx.op_operands(self.0)[0]
    }

    pub fn buffer(self, ctx: &IrContext) -> ValueRef {
        ctx.op_operands(self.0)[1]
    }
}
