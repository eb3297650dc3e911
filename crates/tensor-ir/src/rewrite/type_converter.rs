//! Type converter for dialect conversion.

use crate::context::IrContext;
use crate::refs::TypeRef;

type ConversionFn = dyn Fn(&mut IrContext, TypeRef) -> Option<TypeRef>;

/// Ordered list of type conversions. The first conversion returning `Some`
/// wins.
///
/// Conversions receive the context mutably so they can intern the types
/// they produce.
#[derive(Default)]
pub struct TypeConverter {
    conversions: Vec<Box<ConversionFn>>,
}

impl TypeConverter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_conversion(
        mut self,
        f: impl Fn(&mut IrContext, TypeRef) -> Option<TypeRef> + 'static,
    ) -> Self {
        self.conversions.push(Box::new(f));
        self
    }

    /// Returns `None` if no conversion applies (the type is already legal).
    pub fn convert_type(&self, ctx: &mut IrContext, ty: TypeRef) -> Option<TypeRef> {
        self.conversions.iter().find_map(|conv| conv(ctx, ty))
    }

    pub fn convert_type_or_identity(&self, ctx: &mut IrContext, ty: TypeRef) -> TypeRef {
        self.convert_type(ctx, ty).unwrap_or(ty)
    }

    pub fn is_empty(&self) -> bool {
        self.conversions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{core, memref, tensor};

    #[test]
    fn first_matching_conversion_wins() {
        let mut ctx = IrContext::new();
        let f32_ty = core::f32_type(&mut ctx);
        let i32_ty = core::i32_type(&mut ctx);
        let buf_ty = memref::memref_type(&mut ctx, f32_ty, &[3]);

        let tc = TypeConverter::new()
            .add_conversion(tensor::from_memref_type)
            .add_conversion(move |_, _| Some(i32_ty));

        let converted = tc.convert_type(&mut ctx, buf_ty);
        assert_eq!(converted, Some(tensor::tensor_type(&mut ctx, f32_ty, &[3])));
        assert_eq!(tc.convert_type(&mut ctx, f32_ty), Some(i32_ty));
    }

    #[test]
    fn identity_when_nothing_applies() {
        let mut ctx = IrContext::new();
        let f32_ty = core::f32_type(&mut ctx);
        let tc = TypeConverter::new().add_conversion(tensor::from_memref_type);
        assert_eq!(tc.convert_type_or_identity(&mut ctx, f32_ty), f32_ty);
        assert!(TypeConverter::new().is_empty());
    }
}
