//! Text format printer.
//!
//! ```text
//! core.module @kernels {
//!   func.func @step(%0: memref.memref(core.f32) {shape = [4]}) {
//!     %1 = tensor.import %0 : tensor.tensor(core.f32) {shape = [4]}
//!     func.return
//!   }
//! }
//! ```
//!
//! Values are numbered per top-level operation. Block labels are printed
//! only when a region has several blocks or its block takes arguments.

use std::collections::HashMap;
use std::fmt::{self, Write};

use crate::Symbol;
use crate::context::IrContext;
use crate::refs::*;
use crate::types::Attribute;

struct PrintState<'a> {
    ctx: &'a IrContext,
    value_names: HashMap<ValueRef, usize>,
    next_value_num: usize,
    next_block_num: usize,
}

impl<'a> PrintState<'a> {
    fn new(ctx: &'a IrContext) -> Self {
        Self {
            ctx,
            value_names: HashMap::new(),
            next_value_num: 0,
            next_block_num: 0,
        }
    }

    fn assign_value_name(&mut self, v: ValueRef) -> String {
        let n = self.next_value_num;
        self.next_value_num += 1;
        self.value_names.insert(v, n);
        format!("%{n}")
    }

    fn value_name(&self, v: ValueRef) -> String {
        match self.value_names.get(&v) {
            Some(n) => format!("%{n}"),
            None => "%?".to_owned(),
        }
    }

    fn next_block_label(&mut self) -> String {
        let n = self.next_block_num;
        self.next_block_num += 1;
        format!("^bb{n}")
    }

    fn reset_numbering(&mut self) {
        self.value_names.clear();
        self.next_value_num = 0;
        self.next_block_num = 0;
    }
}

// ============================================================================
// Public API
// ============================================================================

/// Print an operation and everything nested in it.
pub fn print_op(ctx: &IrContext, op: OpRef) -> String {
    let mut state = PrintState::new(ctx);
    let mut out = String::new();
    print_operation(&mut state, &mut out, op, 0).expect("fmt::Write to String never fails");
    out
}

pub fn print_type(ctx: &IrContext, ty: TypeRef) -> String {
    let mut out = String::new();
    write_type(ctx, &mut out, ty).expect("fmt::Write to String never fails");
    out
}

/// Print a `core.module` with value numbering reset per top-level op.
pub fn print_module(ctx: &IrContext, module: OpRef) -> String {
    print_op(ctx, module)
}

// ============================================================================
// Types and attributes
// ============================================================================

fn write_type(ctx: &IrContext, f: &mut impl Write, ty: TypeRef) -> fmt::Result {
    let data = ctx.types.get(ty);
    write!(f, "{}.{}", data.dialect, data.name)?;
    if !data.params.is_empty() {
        f.write_char('(')?;
        for (i, &param) in data.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write_type(ctx, f, param)?;
        }
        f.write_char(')')?;
    } else if !data.attrs.is_empty() {
        f.write_str("()")?;
    }
    if !data.attrs.is_empty() {
        f.write_str(" {")?;
        for (i, (key, val)) in data.attrs.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{key} = ")?;
            write_attribute(ctx, f, val)?;
        }
        f.write_char('}')?;
    }
    Ok(())
}

fn write_attribute(ctx: &IrContext, f: &mut impl Write, attr: &Attribute) -> fmt::Result {
    match attr {
        Attribute::Unit => f.write_str("unit"),
        Attribute::Bool(b) => write!(f, "{b}"),
        Attribute::IntBits(v) => write!(f, "{}", i64::from_ne_bytes(v.to_ne_bytes())),
        Attribute::FloatBits(bits) => {
            let v = f64::from_bits(*bits);
            let s = format!("{v}");
            f.write_str(&s)?;
            if v.is_finite() && !s.contains(['.', 'e', 'E']) {
                f.write_str(".0")?;
            }
            Ok(())
        }
        Attribute::String(s) => write!(f, "{s:?}"),
        Attribute::Symbol(sym) => write_symbol(f, *sym),
        Attribute::Type(ty) => write_type(ctx, f, *ty),
        Attribute::List(list) => {
            f.write_char('[')?;
            for (i, item) in list.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write_attribute(ctx, f, item)?;
            }
            f.write_char(']')
        }
    }
}

fn write_symbol(f: &mut impl Write, sym: Symbol) -> fmt::Result {
    sym.with_str(|s| {
        if !s.is_empty() && s.chars().all(|c| c.is_alphanumeric() || c == '_') {
            write!(f, "@{s}")
        } else {
            write!(f, "@{s:?}")
        }
    })
}

fn sym_name(state: &PrintState<'_>, op: OpRef) -> Option<Symbol> {
    state
        .ctx
        .op(op)
        .attributes
        .get(&Symbol::new("sym_name"))
        .and_then(Attribute::as_symbol)
}

// ============================================================================
// Operations
// ============================================================================

fn print_operation(
    state: &mut PrintState<'_>,
    f: &mut impl Write,
    op: OpRef,
    indent: usize,
) -> fmt::Result {
    let data = state.ctx.op(op);
    if data.dialect == "core" && data.name == "module" {
        return print_module_op(state, f, op, indent);
    }
    if data.dialect == "func" && data.name == "func" {
        return print_func_op(state, f, op, indent);
    }
    print_generic_op(state, f, op, indent)
}

fn print_generic_op(
    state: &mut PrintState<'_>,
    f: &mut impl Write,
    op: OpRef,
    indent: usize,
) -> fmt::Result {
    let ctx = state.ctx;
    let indent_str = " ".repeat(indent);
    f.write_str(&indent_str)?;

    let results = ctx.op_results(op);
    if !results.is_empty() {
        for (i, &v) in results.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            let name = state.assign_value_name(v);
            f.write_str(&name)?;
        }
        f.write_str(" = ")?;
    }

    let data = ctx.op(op);
    write!(f, "{}.{}", data.dialect, data.name)?;

    let operands = ctx.op_operands(op);
    for (i, &v) in operands.iter().enumerate() {
        f.write_str(if i == 0 { " " } else { ", " })?;
        f.write_str(&state.value_name(v))?;
    }

    if !data.attributes.is_empty() {
        f.write_str(" {")?;
        for (i, (key, val)) in data.attributes.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{key} = ")?;
            write_attribute(ctx, f, val)?;
        }
        f.write_char('}')?;
    }

    let result_types = ctx.op_result_types(op);
    if !result_types.is_empty() {
        f.write_str(" : ")?;
        for (i, &ty) in result_types.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write_type(ctx, f, ty)?;
        }
    }

    for &region in &data.regions {
        f.write_str(" {\n")?;
        print_region(state, f, region, indent + 2)?;
        f.write_str(&indent_str)?;
        f.write_char('}')?;
    }

    f.write_char('\n')
}

fn print_region(
    state: &mut PrintState<'_>,
    f: &mut impl Write,
    region: RegionRef,
    indent: usize,
) -> fmt::Result {
    let ctx = state.ctx;
    let blocks = &ctx.region(region).blocks;
    let elide_labels = blocks.len() == 1 && ctx.block_args(blocks[0]).is_empty();
    let indent_str = " ".repeat(indent);

    for &block in blocks {
        let op_indent = if elide_labels {
            indent
        } else {
            let label = state.next_block_label();
            write!(f, "{indent_str}{label}")?;
            let args = ctx.block_args(block);
            if !args.is_empty() {
                f.write_char('(')?;
                for (j, &arg) in args.iter().enumerate() {
                    if j > 0 {
                        f.write_str(", ")?;
                    }
                    let name = state.assign_value_name(arg);
                    write!(f, "{name}: ")?;
                    write_type(ctx, f, ctx.value_ty(arg))?;
                }
                f.write_char(')')?;
            }
            f.write_str(":\n")?;
            indent + 2
        };

        for &op in &ctx.block(block).ops {
            print_operation(state, f, op, op_indent)?;
        }
    }
    Ok(())
}

fn print_module_op(
    state: &mut PrintState<'_>,
    f: &mut impl Write,
    op: OpRef,
    indent: usize,
) -> fmt::Result {
    let ctx = state.ctx;
    let indent_str = " ".repeat(indent);
    write!(f, "{indent_str}core.module")?;
    if let Some(name) = sym_name(state, op) {
        f.write_char(' ')?;
        write_symbol(f, name)?;
    }
    f.write_str(" {\n")?;

    for &region in &ctx.op(op).regions {
        for &block in &ctx.region(region).blocks {
            for &child in &ctx.block(block).ops {
                state.reset_numbering();
                print_operation(state, f, child, indent + 2)?;
            }
        }
    }

    writeln!(f, "{indent_str}}}")
}

fn print_func_op(
    state: &mut PrintState<'_>,
    f: &mut impl Write,
    op: OpRef,
    indent: usize,
) -> fmt::Result {
    let ctx = state.ctx;
    let indent_str = " ".repeat(indent);
    write!(f, "{indent_str}func.func")?;
    if let Some(name) = sym_name(state, op) {
        f.write_char(' ')?;
        write_symbol(f, name)?;
    }

    let Some(&region) = ctx.op(op).regions.first() else {
        return f.write_char('\n');
    };
    let blocks = &ctx.region(region).blocks;

    // Entry block arguments form the signature.
    f.write_char('(')?;
    if let Some(&entry) = blocks.first() {
        for (i, &arg) in ctx.block_args(entry).iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            let name = state.assign_value_name(arg);
            write!(f, "{name}: ")?;
            write_type(ctx, f, ctx.value_ty(arg))?;
        }
    }
    f.write_str(") {\n")?;

    for (i, &block) in blocks.iter().enumerate() {
        if i > 0 {
            let label = state.next_block_label();
            writeln!(f, "{indent_str}{label}:")?;
        }
        for &child in &ctx.block(block).ops {
            print_operation(state, f, child, indent + 2)?;
        }
    }

    writeln!(f, "{indent_str}}}")
}
