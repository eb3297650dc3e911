//! Structural validation.
//!
//! Three checks run over a module:
//!
//! 1. **Scope**: every operand in a function references a value visible at
//!    its use: an argument of its own block or an enclosing block, or a
//!    result of an op placed before it in one of those blocks.
//! 2. **Use-chains**: the use lists stored in `IrContext` match the actual
//!    operands of attached operations exactly.
//! 3. **Value loops**: every `scf.while` carries as many values through
//!    `scf.condition` and `scf.yield` as it has init operands and results,
//!    with matching types.

use std::collections::HashSet;
use std::convert::Infallible;
use std::ops::ControlFlow;

use derive_more::Display;

use crate::context::IrContext;
use crate::dialect::core::Module;
use crate::dialect::{func, scf};
use crate::ops::DialectOp;
use crate::refs::{BlockRef, OpRef, RegionRef, TypeRef, ValueDef, ValueRef};
use crate::walk::{self, WalkAction};

#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum ValidationError {
    #[display("stale value in @{function}: operand #{operand_index} of {consumer} references {value}")]
    StaleValue {
        function: String,
        consumer: String,
        operand_index: usize,
        value: String,
    },
    #[display(
        "value used out of scope in @{function}: operand #{operand_index} of {consumer} references {value}"
    )]
    OutOfScope {
        function: String,
        consumer: String,
        operand_index: usize,
        value: String,
    },
    #[display("use-chain: {_0}")]
    UseChain(String),
    #[display("{op}: {message}")]
    MalformedLoop { op: OpRef, message: String },
}

/// Run every check, in order.
pub fn validate_module(ctx: &IrContext, module: Module) -> Vec<ValidationError> {
    let mut errors = validate_value_integrity(ctx, module);
    errors.extend(validate_use_chains(ctx, module));
    errors.extend(verify_value_loops(ctx, module));
    errors
}

// ============================================================================
// Scope
// ============================================================================

fn collect_defined_in_region(ctx: &IrContext, region: RegionRef, defined: &mut HashSet<ValueRef>) {
    for &block in &ctx.region(region).blocks {
        defined.extend(ctx.block_args(block).iter().copied());
        for &op in &ctx.block(block).ops {
            defined.extend(ctx.op_results(op).iter().copied());
            for &nested in &ctx.op(op).regions {
                collect_defined_in_region(ctx, nested, defined);
            }
        }
    }
}

fn describe_value(ctx: &IrContext, v: ValueRef) -> String {
    match ctx.value_def(v) {
        ValueDef::OpResult(op, idx) => format!("result #{idx} of {}", ctx.op_full_name(op)),
        ValueDef::BlockArg(block, idx) => format!("block arg #{idx} of {block}"),
    }
}

/// Check that every operand is visible where it is used.
///
/// Values from another function are reported as `StaleValue`; values of the
/// same function that are defined later or in a sibling scope are reported as
/// `OutOfScope`.
pub fn validate_value_integrity(ctx: &IrContext, module: Module) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    for op in module.ops(ctx) {
        let Ok(f) = func::Func::from_op(ctx, op) else {
            continue;
        };
        let name = f
            .name(ctx)
            .map(|s| s.to_string())
            .unwrap_or_else(|| "<unnamed>".to_owned());

        let mut defined = HashSet::new();
        collect_defined_in_region(ctx, f.body(ctx), &mut defined);

        let mut checker = ScopeChecker {
            ctx,
            function: &name,
            defined: &defined,
            errors: &mut errors,
        };
        checker.check_region(f.body(ctx), &HashSet::new());
    }
    errors
}

struct ScopeChecker<'a> {
    ctx: &'a IrContext,
    function: &'a str,
    defined: &'a HashSet<ValueRef>,
    errors: &'a mut Vec<ValidationError>,
}

impl ScopeChecker<'_> {
    fn check_region(&mut self, region: RegionRef, outer: &HashSet<ValueRef>) {
        let ctx = self.ctx;
        for &block in &ctx.region(region).blocks {
            let mut visible = outer.clone();
            visible.extend(ctx.block_args(block).iter().copied());
            for &op in &ctx.block(block).ops {
                self.check_operands(op, &visible);
                for &nested in &ctx.op(op).regions {
                    self.check_region(nested, &visible);
                }
                visible.extend(ctx.op_results(op).iter().copied());
            }
        }
    }

    fn check_operands(&mut self, user: OpRef, visible: &HashSet<ValueRef>) {
        let ctx = self.ctx;
        for (i, &operand) in ctx.op_operands(user).iter().enumerate() {
            if visible.contains(&operand) {
                continue;
            }
            let (function, consumer, value) = (
                self.function.to_owned(),
                ctx.op_full_name(user),
                describe_value(ctx, operand),
            );
            self.errors.push(if self.defined.contains(&operand) {
                ValidationError::OutOfScope {
                    function,
                    consumer,
                    operand_index: i,
                    value,
                }
            } else {
                ValidationError::StaleValue {
                    function,
                    consumer,
                    operand_index: i,
                    value,
                }
            });
        }
    }
}

// ============================================================================
// Use-chains
// ============================================================================

/// Check both directions: every operand has a use entry, and every use entry
/// of a value defined in the module points back at a matching operand.
pub fn validate_use_chains(ctx: &IrContext, module: Module) -> Vec<ValidationError> {
    let body = module.body(ctx);
    let mut errors = Vec::new();

    let mut actual_uses: HashSet<(ValueRef, OpRef, u32)> = HashSet::new();
    let mut values: HashSet<ValueRef> = HashSet::new();
    let _ = walk::walk_region::<Infallible>(ctx, body, &mut |op| {
        for (idx, &operand) in ctx.op_operands(op).iter().enumerate() {
            actual_uses.insert((operand, op, idx as u32));
            values.insert(operand);
        }
        values.extend(ctx.op_results(op).iter().copied());
        for &region in &ctx.op(op).regions {
            for &block in &ctx.region(region).blocks {
                values.extend(ctx.block_args(block).iter().copied());
            }
        }
        ControlFlow::Continue(WalkAction::Advance)
    });

    for &(val, op, idx) in &actual_uses {
        let found = ctx
            .uses(val)
            .iter()
            .any(|u| u.user == op && u.operand_index == idx);
        if !found {
            errors.push(ValidationError::UseChain(format!(
                "operand #{idx} of {} ({op}) uses {val} but no use-chain entry exists",
                ctx.op_full_name(op),
            )));
        }
    }

    for &val in &values {
        for u in ctx.uses(val) {
            if !actual_uses.contains(&(val, u.user, u.operand_index)) {
                errors.push(ValidationError::UseChain(format!(
                    "{val} records a use by operand #{} of {} ({}) that does not exist",
                    u.operand_index,
                    ctx.op_full_name(u.user),
                    u.user,
                )));
            }
        }
    }

    errors
}

// ============================================================================
// Value loops
// ============================================================================

/// Check every `scf.while` against its carried-value contract.
pub fn verify_value_loops(ctx: &IrContext, module: Module) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let _ = walk::walk_region::<Infallible>(ctx, module.body(ctx), &mut |op| {
        if let Ok(lp) = scf::While::from_op(ctx, op) {
            if let Err(message) = check_loop(ctx, lp) {
                errors.push(ValidationError::MalformedLoop { op, message });
            }
        }
        ControlFlow::Continue(WalkAction::Advance)
    });
    errors
}

fn value_types(ctx: &IrContext, values: &[ValueRef]) -> Vec<TypeRef> {
    values.iter().map(|&v| ctx.value_ty(v)).collect()
}

fn check_loop(ctx: &IrContext, lp: scf::While) -> Result<(), String> {
    let carried = value_types(ctx, lp.init(ctx));
    let results = ctx.op_result_types(lp.op_ref());
    if carried != results {
        return Err(format!(
            "{} init value(s) but {} result(s) or mismatched types",
            carried.len(),
            results.len()
        ));
    }

    let before = lp
        .before_block(ctx)
        .ok_or_else(|| "missing before block".to_owned())?;
    let after = lp
        .after_block(ctx)
        .ok_or_else(|| "missing after block".to_owned())?;
    check_block_args(ctx, before, &carried, "before")?;
    check_block_args(ctx, after, &carried, "after")?;

    let cond = last_op(ctx, before)
        .and_then(|op| scf::Condition::from_op(ctx, op).ok())
        .ok_or_else(|| "before block does not end in scf.condition".to_owned())?;
    if value_types(ctx, cond.values(ctx)) != carried {
        return Err(format!(
            "scf.condition forwards {} value(s), expected {}",
            cond.values(ctx).len(),
            carried.len()
        ));
    }

    let yield_op = last_op(ctx, after)
        .and_then(|op| scf::Yield::from_op(ctx, op).ok())
        .ok_or_else(|| "after block does not end in scf.yield".to_owned())?;
    if value_types(ctx, yield_op.values(ctx)) != carried {
        return Err(format!(
            "scf.yield carries {} value(s), expected {}",
            yield_op.values(ctx).len(),
            carried.len()
        ));
    }
    Ok(())
}

fn check_block_args(
    ctx: &IrContext,
    block: BlockRef,
    expected: &[TypeRef],
    which: &str,
) -> Result<(), String> {
    let actual = value_types(ctx, ctx.block_args(block));
    if actual != expected {
        return Err(format!(
            "{which} block takes {} argument(s), expected {}",
            actual.len(),
            expected.len()
        ));
    }
    Ok(())
}

fn last_op(ctx: &IrContext, block: BlockRef) -> Option<OpRef> {
    ctx.block(block).ops.last().copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{arith, core};
    use crate::ops::OpExt;
    use crate::{Location, RegionData, Symbol};
    use smallvec::smallvec;

    fn region_of(ctx: &mut IrContext, loc: Location, block: BlockRef) -> RegionRef {
        ctx.create_region(RegionData {
            location: loc,
            blocks: smallvec![block],
            parent_op: None,
        })
    }

    /// `func @f() { %c = const; scf.while(%c) ...; return }` where the
    /// after block yields `yield_count` copies of its argument.
    fn loop_module(ctx: &mut IrContext, yield_count: usize) -> (Module, OpRef) {
        let loc = ctx.location("test.mlir");
        let i32_ty = core::i32_type(ctx);
        let init = arith::r#const(ctx, loc, i32_ty, 0);

        let before_block = ctx.create_block_with_args(loc, [i32_ty]);
        let carried = ctx.block_arg(before_block, 0);
        let lt = arith::cmp_lt(ctx, loc, carried, carried);
        let flag = lt.result(ctx);
        let cond = scf::condition(ctx, loc, flag, [carried]);
        ctx.push_op(before_block, lt.op_ref());
        ctx.push_op(before_block, cond.op_ref());

        let after_block = ctx.create_block_with_args(loc, [i32_ty]);
        let arg = ctx.block_arg(after_block, 0);
        let y = scf::r#yield(ctx, loc, std::iter::repeat_n(arg, yield_count));
        ctx.push_op(after_block, y.op_ref());

        let before = region_of(ctx, loc, before_block);
        let after = region_of(ctx, loc, after_block);
        let init_v = init.result(ctx);
        let lp = scf::r#while(ctx, loc, [init_v], [i32_ty], before, after);
        let ret = func::r#return(ctx, loc, []);

        let (f, entry) = func::func_with_params(ctx, loc, Symbol::new("f"), []);
        for op in [init.op_ref(), lp.op_ref(), ret.op_ref()] {
            ctx.push_op(entry, op);
        }
        let module = core::build_module(ctx, loc, Symbol::new("m"), [f.op_ref()]);
        (module, lp.op_ref())
    }

    #[test]
    fn well_formed_loop_passes_all_checks() {
        let mut ctx = IrContext::new();
        let (module, _) = loop_module(&mut ctx, 1);
        assert_eq!(validate_module(&ctx, module), vec![]);
    }

    #[test]
    fn yield_arity_mismatch_is_reported() {
        let mut ctx = IrContext::new();
        let (module, lp) = loop_module(&mut ctx, 2);
        let errors = verify_value_loops(&ctx, module);
        assert_eq!(
            errors,
            vec![ValidationError::MalformedLoop {
                op: lp,
                message: "scf.yield carries 2 value(s), expected 1".to_owned(),
            }]
        );
    }

    #[test]
    fn value_from_another_function_is_stale() {
        let mut ctx = IrContext::new();
        let loc = ctx.location("test.mlir");
        let i32_ty = core::i32_type(&mut ctx);

        let (a, a_entry) = func::func_with_params(&mut ctx, loc, Symbol::new("a"), [i32_ty]);
        let leaked = ctx.block_arg(a_entry, 0);
        let (b, b_entry) = func::func_with_params(&mut ctx, loc, Symbol::new("b"), []);
        let ret = func::r#return(&mut ctx, loc, [leaked]);
        ctx.push_op(b_entry, ret.op_ref());
        let module = core::build_module(&mut ctx, loc, Symbol::new("m"), [a.op_ref(), b.op_ref()]);

        let errors = validate_value_integrity(&ctx, module);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().starts_with("stale value in @b: operand #0 of func.return"));
    }

    #[test]
    fn dangling_use_entry_is_reported() {
        let mut ctx = IrContext::new();
        let loc = ctx.location("test.mlir");
        let i32_ty = core::i32_type(&mut ctx);
        let c = arith::r#const(&mut ctx, loc, i32_ty, 1);
        let v = c.result(&ctx);
        // Detached user: its use entry has no attached operand behind it.
        let _orphan = arith::add(&mut ctx, loc, v, v, i32_ty);
        let module = core::build_module(&mut ctx, loc, Symbol::new("m"), [c.op_ref()]);

        let errors = validate_use_chains(&ctx, module);
        assert_eq!(errors.len(), 2);
        assert!(matches!(errors[0], ValidationError::UseChain(_)));
    }

    #[test]
    fn use_before_definition_is_out_of_scope() {
        let mut ctx = IrContext::new();
        let loc = ctx.location("test.mlir");
        let i32_ty = core::i32_type(&mut ctx);
        let seven = arith::r#const(&mut ctx, loc, i32_ty, 7);
        let late = seven.result(&ctx);
        let sum = arith::add(&mut ctx, loc, late, late, i32_ty);
        let (f, entry) = func::func_with_params(&mut ctx, loc, Symbol::new("f"), []);
        for op in [sum.op_ref(), seven.op_ref()] {
            ctx.push_op(entry, op);
        }
        let module = core::build_module(&mut ctx, loc, Symbol::new("m"), [f.op_ref()]);

        let errors = validate_value_integrity(&ctx, module);
        assert_eq!(errors.len(), 2);
        for error in &errors {
            let ValidationError::OutOfScope { consumer, .. } = error else {
                panic!("expected an out-of-scope error, got {error}");
            };
            assert_eq!(consumer, "arith.add");
        }
    }

    #[test]
    fn value_from_inner_region_is_out_of_scope_after_it() {
        let mut ctx = IrContext::new();
        let (module, lp) = loop_module(&mut ctx, 1);
        assert_eq!(validate_value_integrity(&ctx, module), vec![]);

        // A value defined in the after block, used after the loop.
        let loc = ctx.location("test.mlir");
        let i32_ty = core::i32_type(&mut ctx);
        let after = scf::While::from_op(&ctx, lp).unwrap().after_block(&ctx).unwrap();
        let inner = arith::r#const(&mut ctx, loc, i32_ty, 1);
        let inner_v = inner.result(&ctx);
        ctx.insert_op_at_start(after, inner.op_ref());
        let f = module.ops(&ctx)[0];
        let entry = func::Func::from_op(&ctx, f).unwrap().entry_block(&ctx).unwrap();
        let ret = *ctx.block(entry).ops.last().unwrap();
        let leak = arith::add(&mut ctx, loc, inner_v, inner_v, i32_ty);
        ctx.insert_op_before(entry, ret, leak.op_ref());

        let errors = validate_value_integrity(&ctx, module);
        assert_eq!(errors.len(), 2);
        assert!(errors[0].to_string().starts_with(
            "value used out of scope in @f: operand #0 of arith.add references result #0 of arith.const"
        ));
    }
}
