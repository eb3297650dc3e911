//! `tensor` dialect: immutable values standing in for buffers.

use crate::context::IrContext;
use crate::location::Location;
use crate::refs::{TypeRef, ValueRef};
use crate::types::TypeDataBuilder;
use crate::{OperationDataBuilder, Symbol};

use super::{ATTR_SHAPE, shape_attr, shaped_parts};

/// Intern `tensor.tensor(elem) {shape = [...]}`.
pub fn tensor_type(ctx: &mut IrContext, elem: TypeRef, shape: &[u64]) -> TypeRef {
    ctx.types.intern(
        TypeDataBuilder::new(Symbol::new("tensor"), Symbol::new("tensor"))
            .param(elem)
            .attr(ATTR_SHAPE(), shape_attr(shape))
            .build(),
    )
}

pub fn is_tensor_type(ctx: &IrContext, ty: TypeRef) -> bool {
    ctx.types
        .is_dialect(ty, Symbol::new("tensor"), Symbol::new("tensor"))
}

/// The tensor type holding the contents of a `memref` buffer type.
pub fn from_memref_type(ctx: &mut IrContext, ty: TypeRef) -> Option<TypeRef> {
    if !super::memref::is_memref_type(ctx, ty) {
        return None;
    }
    let (elem, shape) = shaped_parts(ctx, ty)?;
    Some(tensor_type(ctx, elem, &shape))
}

crate::define_op! {
    /// Capture a buffer's contents on entry.
    Import => "tensor", "import"
}

crate::define_op! {
    /// Store a final value back into its buffer.
    Export => "tensor", "export"
}

crate::define_op! {
    /// Read one element of a tensor.
    Extract => "tensor", "extract"
}

pub fn import(ctx: &mut IrContext, location: Location, buffer: ValueRef, ty: TypeRef) -> Import {
    let data = OperationDataBuilder::new(location, Symbol::new("tensor"), Symbol::new("import"))
        .operand(buffer)
        .result(ty)
        .build(ctx);
    Import(ctx.create_op(data))
}

impl Import {
    pub fn buffer(self, ctx: &IrContext) -> ValueRef {
        ctx.op_operands(self.0)[0]
    }
}

pub fn export(ctx: &mut IrContext, location: Location, value: ValueRef, buffer: ValueRef) -> Export {
    let data = OperationDataBuilder::new(location, Symbol::new("tensor"), Symbol::new("export"))
        .operand(value)
        .operand(buffer)
        .build(ctx);
    Export(ctx.create_op(data))
}

impl Export {
    pub fn value(self, ctx: &IrContext) -> ValueRef {
        ctx.op_operands(self.0)[0]
    }

    pub fn buffer(self, ctx: &IrContext) -> ValueRef {
        ctx.op_operands(self.0)[1]
    }
}

pub fn extract(
    ctx: &mut IrContext,
    location: Location,
    tensor: ValueRef,
    indices: impl IntoIterator<Item = ValueRef>,
    ty: TypeRef,
) -> Extract {
    let data = OperationDataBuilder::new(location, Symbol::new("tensor"), Symbol::new("extract"))
        .operand(tensor)
        .operands(indices)
        .result(ty)
        .build(ctx);
    Extract(ctx.create_op(data))
}

impl Extract {
    pub fn tensor(self, ctx: &IrContext) -> ValueRef {
        ctx.op_operands(self.0)[0]
    }

    pub fn indices(self, ctx: &IrContext) -> &[ValueRef] {
        &ctx.op_operands(self.0)[1..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{core, memref};

    #[test]
    fn memref_converts_to_same_shaped_tensor() {
        let mut ctx = IrContext::new();
        let f32_ty = core::f32_type(&mut ctx);
        let buf_ty = memref::memref_type(&mut ctx, f32_ty, &[4]);
        let expected = tensor_type(&mut ctx, f32_ty, &[4]);

        assert_eq!(from_memref_type(&mut ctx, buf_ty), Some(expected));
        assert!(is_tensor_type(&ctx, expected));
        assert_eq!(from_memref_type(&mut ctx, expected), None);
    }
}
