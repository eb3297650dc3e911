//! Pattern-based rewriting.
//!
//! Patterns mutate the context directly for new ops and record structural
//! edits (prefix inserts, replacement, erasure) on a `PatternRewriter`. The
//! applicator commits those edits only when the pattern reports a match.

pub mod applicator;
pub mod conversion_target;
pub mod pattern;
pub mod rewriter;
pub mod type_converter;

pub use applicator::{ApplyResult, PatternApplicator};
pub use conversion_target::{ConversionTarget, IllegalOp, LegalityCheck};
pub use pattern::RewritePattern;
pub use rewriter::PatternRewriter;
pub use type_converter::TypeConverter;
