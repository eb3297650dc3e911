//! Typed operation wrappers.
//!
//! Provides the `DialectOp` trait and the `define_op!` macro used by every
//! dialect module to declare a `Copy` wrapper around an `OpRef`.

use derive_more::{Display, Error};

use crate::context::IrContext;
use crate::refs::OpRef;

/// Error when viewing an operation as a dialect-specific wrapper.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum ConversionError {
    /// Operation name doesn't match the expected `dialect.operation`.
    #[display("expected `{expected}`, found `{actual}`")]
    WrongOperation {
        expected: &'static str,
        actual: String,
    },
    /// Missing required attribute.
    #[display("missing attribute `{_0}`")]
    MissingAttribute(#[error(not(source))] &'static str),
    /// Wrong number of operands.
    #[display("expected {expected} operand(s), found {actual}")]
    WrongOperandCount { expected: usize, actual: usize },
    /// Missing region.
    #[display("missing region")]
    MissingRegion,
}

/// Trait for typed operation wrappers.
pub trait DialectOp: Sized + Copy {
    const DIALECT_NAME: &'static str;
    const OP_NAME: &'static str;

    fn from_op(ctx: &IrContext, op: OpRef) -> Result<Self, ConversionError>;
    fn op_ref(&self) -> OpRef;

    fn matches(ctx: &IrContext, op: OpRef) -> bool {
        let data = ctx.op(op);
        data.dialect == crate::Symbol::new(Self::DIALECT_NAME)
            && data.name == crate::Symbol::new(Self::OP_NAME)
    }
}

/// Declare a typed wrapper for `dialect.name`.
///
/// Accessors and constructors are written by hand next to the declaration;
/// the macro only provides the struct and its `DialectOp` impl.
#[macro_export]
macro_rules! define_op {
    ($(#[$meta:meta])* $ty:ident => $dialect:literal, $name:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        pub struct $ty($crate::OpRef);

        impl $crate::ops::DialectOp for $ty {
            const DIALECT_NAME: &'static str = $dialect;
            const OP_NAME: &'static str = $name;

            fn from_op(
                ctx: &$crate::IrContext,
                op: $crate::OpRef,
            ) -> Result<Self, $crate::ops::ConversionError> {
                if <Self as $crate::ops::DialectOp>::matches(ctx, op) {
                    Ok(Self(op))
                } else {
                    Err($crate::ops::ConversionError::WrongOperation {
                        expected: concat!($dialect, ".", $name),
                        actual: ctx.op_full_name(op),
                    })
                }
            }

            fn op_ref(&self) -> $crate::OpRef {
                self.0
            }
        }
    };
}

/// Convenience accessors shared by every typed wrapper.
pub trait OpExt: DialectOp {
    /// First result value.
    fn result(&self, ctx: &IrContext) -> crate::ValueRef {
        ctx.op_result(self.op_ref(), 0)
    }

    /// All operand values.
    fn operands<'a>(&self, ctx: &'a IrContext) -> &'a [crate::ValueRef] {
        ctx.op_operands(self.op_ref())
    }
}

impl<T: DialectOp> OpExt for T {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{arith, core};

    #[test]
    fn from_op_rejects_other_ops() {
        let mut ctx = IrContext::new();
        let loc = ctx.location("test.mlir");
        let i32_ty = core::i32_type(&mut ctx);
        let c = arith::r#const(&mut ctx, loc, i32_ty, 3);

        assert!(arith::Const::from_op(&ctx, c.op_ref()).is_ok());
        let err = arith::Add::from_op(&ctx, c.op_ref()).unwrap_err();
        assert_eq!(err.to_string(), "expected `arith.add`, found `arith.const`");
    }
}
