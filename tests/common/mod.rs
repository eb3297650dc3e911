//! Common test utilities for pass-level tests.

use tensor_ir::dialect::{arith, buf, core, func, memref, scf, tensor};
use tensor_ir::{
    BlockRef, DialectOp, IrContext, Location, OpExt, OpRef, OperationDataBuilder, Symbol, TypeRef,
    ValueRef,
};

/// A function under construction:
/// `func @name(%pred: memref(i1)[1], %data...: memref(f32)[4])`.
pub struct Kernel {
    pub ctx: IrContext,
    pub loc: Location,
    pub func: func::Func,
    pub entry: BlockRef,
    pub args: Vec<ValueRef>,
    /// `tensor.tensor(core.i1) {shape = [1]}`
    pub flag_ty: TypeRef,
    /// `tensor.tensor(core.f32) {shape = [4]}`
    pub data_ty: TypeRef,
}

#[allow(dead_code)]
impl Kernel {
    pub fn new(name: &'static str, data_buffers: usize) -> Self {
        let mut ctx = IrContext::new();
        let loc = ctx.location("kernel.mlir");
        let i1 = core::i1_type(&mut ctx);
        let f32_ty = core::f32_type(&mut ctx);
        let pred_ty = memref::memref_type(&mut ctx, i1, &[1]);
        let buf_ty = memref::memref_type(&mut ctx, f32_ty, &[4]);
        let flag_ty = tensor::tensor_type(&mut ctx, i1, &[1]);
        let data_ty = tensor::tensor_type(&mut ctx, f32_ty, &[4]);

        let params = std::iter::once(pred_ty).chain(std::iter::repeat_n(buf_ty, data_buffers));
        let (func, entry) = func::func_with_params(&mut ctx, loc, Symbol::new(name), params);
        let args = ctx.block_args(entry).to_vec();
        Self {
            ctx,
            loc,
            func,
            entry,
            args,
            flag_ty,
            data_ty,
        }
    }

    pub fn pred(&self) -> ValueRef {
        self.args[0]
    }

    pub fn data(&self, index: usize) -> ValueRef {
        self.args[index + 1]
    }

    /// Append `test.alloc`: a local `memref(f32)[4]` that no argument backs.
    pub fn alloc(&mut self, block: BlockRef) -> ValueRef {
        let f32_ty = core::f32_type(&mut self.ctx);
        let buf_ty = memref::memref_type(&mut self.ctx, f32_ty, &[4]);
        let data = OperationDataBuilder::new(self.loc, Symbol::new("test"), Symbol::new("alloc"))
            .result(buf_ty)
            .build(&mut self.ctx);
        let op = self.ctx.create_op(data);
        self.ctx.push_op(block, op);
        self.ctx.op_result(op, 0)
    }

    pub fn read(&mut self, block: BlockRef, buffer: ValueRef) -> ValueRef {
        let ty = if buffer == self.pred() {
            self.flag_ty
        } else {
            self.data_ty
        };
        let op = memref::read(&mut self.ctx, self.loc, buffer, ty);
        self.ctx.push_op(block, op.op_ref());
        op.result(&self.ctx)
    }

    pub fn write(&mut self, block: BlockRef, value: ValueRef, buffer: ValueRef) -> OpRef {
        let op = memref::write(&mut self.ctx, self.loc, value, buffer);
        self.ctx.push_op(block, op.op_ref());
        op.op_ref()
    }

    pub fn constant(&mut self, block: BlockRef, value: i64) -> ValueRef {
        let op = arith::r#const(&mut self.ctx, self.loc, self.data_ty, value);
        self.ctx.push_op(block, op.op_ref());
        op.result(&self.ctx)
    }

    pub fn add(&mut self, block: BlockRef, lhs: ValueRef, rhs: ValueRef) -> ValueRef {
        let op = arith::add(&mut self.ctx, self.loc, lhs, rhs, self.data_ty);
        self.ctx.push_op(block, op.op_ref());
        op.result(&self.ctx)
    }

    pub fn less_than(&mut self, block: BlockRef, lhs: ValueRef, rhs: ValueRef) -> ValueRef {
        let op = arith::cmp_lt_shaped(&mut self.ctx, self.loc, lhs, rhs, self.flag_ty);
        self.ctx.push_op(block, op.op_ref());
        op.result(&self.ctx)
    }

    /// Append `buf.while %pred` to `block`; returns its condition and body
    /// blocks, both still unterminated.
    pub fn buf_while(&mut self, block: BlockRef, pred: ValueRef) -> (BlockRef, BlockRef) {
        let (op, cond, body) = buf::while_with_blocks(&mut self.ctx, self.loc, pred);
        self.ctx.push_op(block, op.op_ref());
        (cond, body)
    }

    pub fn terminate(&mut self, block: BlockRef) -> OpRef {
        let op = buf::terminator(&mut self.ctx, self.loc);
        self.ctx.push_op(block, op.op_ref());
        op.op_ref()
    }

    /// Close the entry block with `func.return` and wrap the function in a
    /// module.
    pub fn finish(&mut self) -> core::Module {
        let ret = func::r#return(&mut self.ctx, self.loc, []);
        self.ctx.push_op(self.entry, ret.op_ref());
        core::build_module(&mut self.ctx, self.loc, Symbol::new("kernels"), [self.func.op_ref()])
    }

    /// The `tensor.import` result standing in for `buffer` on entry.
    pub fn import_of(&self, buffer: ValueRef) -> ValueRef {
        self.ctx
            .block(self.entry)
            .ops
            .iter()
            .filter_map(|&op| tensor::Import::from_op(&self.ctx, op).ok())
            .find(|import| import.buffer(&self.ctx) == buffer)
            .map(|import| import.result(&self.ctx))
            .expect("buffer was not imported")
    }

    /// Every `scf.while` directly inside `block`.
    pub fn loops_in(&self, block: BlockRef) -> Vec<scf::While> {
        self.ctx
            .block(block)
            .ops
            .iter()
            .filter_map(|&op| scf::While::from_op(&self.ctx, op).ok())
            .collect()
    }

    pub fn ops_of<T: DialectOp>(&self, block: BlockRef) -> Vec<T> {
        self.ctx
            .block(block)
            .ops
            .iter()
            .filter_map(|&op| T::from_op(&self.ctx, op).ok())
            .collect()
    }

    pub fn last_op(&self, block: BlockRef) -> OpRef {
        *self.ctx.block(block).ops.last().expect("block is empty")
    }
}
