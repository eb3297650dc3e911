//! The de-bufferization pass driver.
//!
//! ## Pipeline
//!
//! 1. Seed: every memref argument of every `func.func` gets a
//!    `tensor.import` at the top of the entry block, which becomes the
//!    buffer's first stand-in value.
//! 2. Rewrite: loop, terminator, read and write rules run over the module
//!    against one shared remapping state.
//! 3. Legalize: any `buf.*`, `memref.read` or `memref.write` left behind
//!    fails the pass.
//! 4. Export: buffers whose final value differs from their import get a
//!    `tensor.export` before `func.return`.
//! 5. Validate (optional).

use std::convert::Infallible;
use std::ops::ControlFlow;

use tensor_ir::dialect::{buf, core, func, memref, tensor};
use tensor_ir::rewrite::{ConversionTarget, PatternApplicator, TypeConverter};
use tensor_ir::validation::validate_module;
use tensor_ir::walk::{self, WalkAction};
use tensor_ir::{DialectOp, IrContext, OpExt, ValueRef};
use tracing::{debug, warn};

use crate::buffer_usage::{Buffer, resolve_buffer};
use crate::convert_buffers::populate_buffer_access_conversion_patterns;
use crate::convert_while::populate_while_op_conversion_patterns;
use crate::error::{DebufError, DebufResult};
use crate::options::DebufOptions;
use crate::state::{DeBufferization, SharedDeBufferization};

/// Counts reported by a successful run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DebufStats {
    pub loops_converted: usize,
    pub terminators_converted: usize,
    pub iterations: usize,
}

/// A buffer argument and the `tensor.import` that first stands in for it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SeededBuffer {
    pub argument: ValueRef,
    pub buffer: Buffer,
    pub import: ValueRef,
}

/// `memref.memref(e) {shape}` → `tensor.tensor(e) {shape}`.
pub fn buffer_type_converter() -> TypeConverter {
    TypeConverter::new().add_conversion(tensor::from_memref_type)
}

/// Buffer loops and buffer accesses must be gone after the pass.
pub fn conversion_target() -> ConversionTarget {
    let mut target = ConversionTarget::new();
    target.add_illegal_dialect("buf");
    target.add_illegal_op("memref", "read");
    target.add_illegal_op("memref", "write");
    target
}

/// Give every memref argument of `func` a stand-in value in its entry block.
///
/// Imports are inserted at the top of the entry block in argument order.
pub fn seed_function_buffers(
    ctx: &mut IrContext,
    func: func::Func,
    type_converter: &TypeConverter,
    state: &mut DeBufferization,
) -> Vec<SeededBuffer> {
    let Some(entry) = func.entry_block(ctx) else {
        return Vec::new();
    };
    let location = ctx.op(func.op_ref()).location;
    let anchor = ctx.block(entry).ops.first().copied();
    let args = ctx.block_args(entry).to_vec();

    let mut seeded = Vec::new();
    for argument in args {
        let ty = ctx.value_ty(argument);
        if !memref::is_memref_type(ctx, ty) {
            continue;
        }
        let Some(value_ty) = type_converter.convert_type(ctx, ty) else {
            continue;
        };
        let import = tensor::import(ctx, location, argument, value_ty);
        match anchor {
            Some(first) => ctx.insert_op_before(entry, first, import.op_ref()),
            None => ctx.push_op(entry, import.op_ref()),
        }
        let buffer = resolve_buffer(ctx, argument);
        let import = import.result(ctx);
        state.set(entry, buffer, import);
        seeded.push(SeededBuffer {
            argument,
            buffer,
            import,
        });
    }
    seeded
}

/// Convert every `buf.while` in `module` into `scf.while` and remove all
/// buffer reads and writes.
#[tracing::instrument(skip_all)]
pub fn convert_to_tensors(
    ctx: &mut IrContext,
    module: core::Module,
    options: &DebufOptions,
) -> DebufResult<DebufStats> {
    let state: SharedDeBufferization = DeBufferization::shared();
    let applicator = PatternApplicator::new(buffer_type_converter())
        .with_max_iterations(options.max_iterations);
    let applicator = populate_while_op_conversion_patterns(applicator, &state);
    let applicator = populate_buffer_access_conversion_patterns(applicator, &state);

    let funcs: Vec<func::Func> = module
        .ops(ctx)
        .into_iter()
        .filter_map(|op| func::Func::from_op(ctx, op).ok())
        .collect();
    let mut seeded = Vec::with_capacity(funcs.len());
    for &f in &funcs {
        let buffers =
            seed_function_buffers(ctx, f, applicator.type_converter(), &mut state.borrow_mut());
        seeded.push((f, buffers));
    }

    let (loops, terminators) = count_buffer_loops(ctx, module);
    let result = applicator
        .apply(ctx, module, &conversion_target())
        .map_err(|ops| DebufError::Legalization { ops })?;
    debug!(
        loops,
        terminators,
        iterations = result.iterations,
        changes = result.total_changes,
        "buffer loops converted"
    );

    if options.export_results {
        let state = state.borrow();
        for (f, buffers) in &seeded {
            export_final_values(ctx, *f, buffers, &state);
        }
    }

    if options.verify {
        let errors = validate_module(ctx, module);
        if !errors.is_empty() {
            return Err(DebufError::Verification { errors });
        }
    }

    Ok(DebufStats {
        loops_converted: loops,
        terminators_converted: terminators,
        iterations: result.iterations,
    })
}

fn export_final_values(
    ctx: &mut IrContext,
    f: func::Func,
    buffers: &[SeededBuffer],
    state: &DeBufferization,
) {
    let Some(entry) = f.entry_block(ctx) else {
        return;
    };
    let ret = f.return_op(ctx);
    if ret.is_none() {
        warn!(func = ?f.name(ctx), "no func.return; exports go to the end of the entry block");
    }
    let location = ctx.op(f.op_ref()).location;

    for seed in buffers {
        let Some(last) = state.lookup(entry, seed.buffer) else {
            continue;
        };
        if last == seed.import {
            continue;
        }
        let export = tensor::export(ctx, location, last, seed.argument);
        match ret {
            Some(ret) => ctx.insert_op_before(entry, ret, export.op_ref()),
            None => ctx.push_op(entry, export.op_ref()),
        }
    }
}

/// Number of `buf.while` and `buf.terminator` ops anywhere in `module`.
fn count_buffer_loops(ctx: &IrContext, module: core::Module) -> (usize, usize) {
    let (mut loops, mut terminators) = (0, 0);
    let _ = walk::walk_region::<Infallible>(ctx, module.body(ctx), &mut |op| {
        if buf::While::matches(ctx, op) {
            loops += 1;
        } else if buf::Terminator::matches(ctx, op) {
            terminators += 1;
        }
        ControlFlow::Continue(WalkAction::Advance)
    });
    (loops, terminators)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tensor_ir::Symbol;
    use tensor_ir::dialect::arith;
    use tensor_ir::rewrite::LegalityCheck;

    #[test]
    fn imports_are_inserted_in_argument_order_before_existing_ops() {
        let mut ctx = IrContext::new();
        let loc = ctx.location("test.mlir");
        let f32_ty = core::f32_type(&mut ctx);
        let i32_ty = core::i32_type(&mut ctx);
        let buf_ty = memref::memref_type(&mut ctx, f32_ty, &[4]);
        let (f, entry) =
            func::func_with_params(&mut ctx, loc, Symbol::new("f"), [buf_ty, i32_ty, buf_ty]);
        let one = arith::r#const(&mut ctx, loc, i32_ty, 1);
        ctx.push_op(entry, one.op_ref());

        let mut state = DeBufferization::new();
        let seeded = seed_function_buffers(&mut ctx, f, &buffer_type_converter(), &mut state);

        assert_eq!(seeded.len(), 2);
        let ops = ctx.block(entry).ops.to_vec();
        assert_eq!(ops.len(), 3);
        assert_eq!(ops[2], one.op_ref());
        let args = ctx.block_args(entry).to_vec();
        for (i, seed) in seeded.iter().enumerate() {
            let import = tensor::Import::from_op(&ctx, ops[i]).unwrap();
            assert_eq!(import.result(&ctx), seed.import);
            assert_eq!(state.get(entry, seed.buffer), seed.import);
        }
        assert_eq!(seeded[0].argument, args[0]);
        assert_eq!(seeded[1].argument, args[2]);
    }

    #[test]
    fn target_rejects_buffer_loops_and_accesses_only() {
        let mut ctx = IrContext::new();
        let loc = ctx.location("test.mlir");
        let f32_ty = core::f32_type(&mut ctx);
        let buf_ty = memref::memref_type(&mut ctx, f32_ty, &[4]);
        let block = ctx.create_block_with_args(loc, [buf_ty]);
        let buffer = ctx.block_arg(block, 0);
        let view = memref::view(&mut ctx, loc, buffer, buf_ty);
        let term = buf::terminator(&mut ctx, loc);

        let target = conversion_target();
        assert_eq!(target.is_legal(&ctx, view.op_ref()), LegalityCheck::Legal);
        assert_eq!(target.is_legal(&ctx, term.op_ref()), LegalityCheck::Illegal);
    }
}
