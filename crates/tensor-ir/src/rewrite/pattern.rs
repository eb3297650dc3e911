//! Rewrite pattern trait.

use super::rewriter::PatternRewriter;
use crate::context::IrContext;
use crate::refs::OpRef;

/// A pattern that can match and transform an operation.
///
/// Return `true` if the pattern matched and recorded mutations via the
/// rewriter, `false` if it does not apply. A pattern that returns `false`
/// must not have touched any attached IR: its recorded mutations are
/// dropped, but direct edits to the context are not undone.
pub trait RewritePattern {
    fn match_and_rewrite(
        &self,
        ctx: &mut IrContext,
        op: OpRef,
        rewriter: &mut PatternRewriter<'_>,
    ) -> bool;

    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}
