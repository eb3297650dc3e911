//! Arena-based IR for tensor programs.
//!
//! Operations, values, blocks and regions live in an [`IrContext`] and are
//! addressed by `Copy` references. Dialects cover buffers (`memref`, `buf`),
//! values (`tensor`, `scf`) and the usual scaffolding (`core`, `func`,
//! `arith`). The [`rewrite`] module drives pattern-based conversions.

pub mod context;
pub mod dialect;
pub mod location;
pub mod ops;
pub mod printer;
pub mod refs;
pub mod rewrite;
pub mod symbol;
pub mod types;
pub mod validation;
pub mod walk;

pub use smallvec;

pub use context::{BlockData, IrContext, OperationData, OperationDataBuilder, RegionData, Use};
pub use location::{Location, Span};
pub use ops::{ConversionError, DialectOp, OpExt};
pub use refs::{BlockRef, OpRef, PathRef, RegionRef, TypeRef, ValueDef, ValueRef};
pub use symbol::Symbol;
pub use types::{Attribute, TypeData, TypeDataBuilder};
