//! Dialect operation wrappers and type helpers.
//!
//! Buffers live in `memref`, values in `tensor`. `buf.while` is the
//! buffer-based loop and `scf.while` its value-based counterpart.

pub mod arith;
pub mod buf;
pub mod core;
pub mod func;
pub mod memref;
pub mod scf;
pub mod tensor;

use crate::context::IrContext;
use crate::refs::TypeRef;
use crate::types::Attribute;

crate::symbols! {
    ATTR_SHAPE => "shape",
}

pub(crate) fn shape_attr(shape: &[u64]) -> Attribute {
    Attribute::List(shape.iter().map(|&d| Attribute::IntBits(d)).collect())
}

/// Element type and static shape of a shaped type (`memref` or `tensor`).
pub fn shaped_parts(ctx: &IrContext, ty: TypeRef) -> Option<(TypeRef, Vec<u64>)> {
    let data = ctx.types.get(ty);
    let elem = *data.params.first()?;
    let Attribute::List(dims) = data.attrs.get(&ATTR_SHAPE())? else {
        return None;
    };
    let shape = dims.iter().map(Attribute::as_int).collect::<Option<Vec<_>>>()?;
    Some((elem, shape))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shaped_parts_of_memref_and_tensor_agree() {
        let mut ctx = IrContext::new();
        let f32_ty = core::f32_type(&mut ctx);
        let buf_ty = memref::memref_type(&mut ctx, f32_ty, &[2, 3]);
        let val_ty = tensor::tensor_type(&mut ctx, f32_ty, &[2, 3]);

        assert_ne!(buf_ty, val_ty);
        assert_eq!(shaped_parts(&ctx, buf_ty), Some((f32_ty, vec![2, 3])));
        assert_eq!(shaped_parts(&ctx, val_ty), shaped_parts(&ctx, buf_ty));
        assert_eq!(shaped_parts(&ctx, f32_ty), None);
    }
}
