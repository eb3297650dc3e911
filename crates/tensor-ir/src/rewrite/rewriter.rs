//! PatternRewriter: accumulates the structural edits of one pattern match.

use crate::context::IrContext;
use crate::refs::{OpRef, ValueRef};

use super::type_converter::TypeConverter;

pub(crate) struct Mutations {
    pub(crate) prefix_ops: Vec<OpRef>,
    pub(crate) replacement: Option<OpRef>,
    pub(crate) erase_values: Option<Vec<ValueRef>>,
}

/// Records mutations for the applicator to commit after the pattern returns.
///
/// Value replacements go through `IrContext::replace_all_uses` when the
/// mutations are applied, so patterns never remap operands themselves.
pub struct PatternRewriter<'a> {
    type_converter: &'a TypeConverter,
    prefix_ops: Vec<OpRef>,
    replacement: Option<OpRef>,
    erase_values: Option<Vec<ValueRef>>,
}

impl<'a> PatternRewriter<'a> {
    pub(crate) fn new(type_converter: &'a TypeConverter) -> Self {
        Self {
            type_converter,
            prefix_ops: Vec::new(),
            replacement: None,
            erase_values: None,
        }
    }

    pub fn type_converter(&self) -> &TypeConverter {
        self.type_converter
    }

    /// Insert a detached operation before the current one.
    ///
    /// Multiple calls accumulate operations in order.
    pub fn insert_op(&mut self, op: OpRef) {
        self.prefix_ops.push(op);
    }

    /// Replace the current operation with a new one.
    ///
    /// Old results are replaced 1:1 by index with the new op's results.
    pub fn replace_op(&mut self, new_op: OpRef) {
        debug_assert!(
            self.replacement.is_none() && self.erase_values.is_none(),
            "replace_op called after replace_op or erase_op"
        );
        self.replacement = Some(new_op);
    }

    /// Erase the current operation, mapping its results to the given values.
    pub fn erase_op(&mut self, replacement_values: Vec<ValueRef>) {
        debug_assert!(
            self.replacement.is_none() && self.erase_values.is_none(),
            "erase_op called after replace_op or erase_op"
        );
        self.erase_values = Some(replacement_values);
    }

    /// Insert `prefix` and replace the current op in one call.
    pub fn replace_with_prefix(&mut self, prefix: Vec<OpRef>, replacement: OpRef) {
        self.prefix_ops.extend(prefix);
        self.replace_op(replacement);
    }

    pub(crate) fn has_mutations(&self) -> bool {
        !self.prefix_ops.is_empty() || self.replacement.is_some() || self.erase_values.is_some()
    }

    pub(crate) fn take_mutations(self) -> Mutations {
        Mutations {
            prefix_ops: self.prefix_ops,
            replacement: self.replacement,
            erase_values: self.erase_values,
        }
    }
}

/// Commit recorded mutations for `original_op`.
///
/// Prefix ops land immediately before `original_op`; a replacement takes its
/// exact position.
pub(crate) fn apply_mutations(ctx: &mut IrContext, original_op: OpRef, mutations: Mutations) {
    let parent_block = ctx.op(original_op).parent_block;

    if let Some(block) = parent_block {
        for &prefix_op in &mutations.prefix_ops {
            ctx.insert_op_before(block, original_op, prefix_op);
        }
    }

    let replacement_values = if let Some(new_op) = mutations.replacement {
        if let Some(block) = parent_block {
            ctx.insert_op_before(block, original_op, new_op);
        }
        Some(ctx.op_results(new_op).to_vec())
    } else {
        mutations.erase_values
    };

    let Some(new_values) = replacement_values else {
        return;
    };

    let old_results = ctx.op_results(original_op).to_vec();
    assert_eq!(
        old_results.len(),
        new_values.len(),
        "{}: replacement value count mismatch ({} vs {})",
        ctx.op_full_name(original_op),
        old_results.len(),
        new_values.len()
    );
    for (old_v, new_v) in old_results.into_iter().zip(new_values) {
        ctx.replace_all_uses(old_v, new_v);
    }

    if let Some(block) = parent_block {
        ctx.remove_op_from_block(block, original_op);
    }
    ctx.remove_op(original_op);
}
