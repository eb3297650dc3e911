//! IrContext: arena storage for operations, values, blocks and regions.
//!
//! Operand and result lists use `EntityList + ListPool` for compact storage.
//! Use-chains are kept in sync by every mutating method.

use std::collections::BTreeMap;

use cranelift_entity::{EntityList, ListPool, PrimaryMap, SecondaryMap};
use smallvec::SmallVec;

use crate::Symbol;
use crate::location::{Location, Span};
use crate::refs::*;
use crate::types::*;

// ============================================================================
// Use-chain
// ============================================================================

/// A single use of a value: which operation uses it, at which operand index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Use {
    pub user: OpRef,
    pub operand_index: u32,
}

// ============================================================================
// Entity data
// ============================================================================

pub struct OperationData {
    pub location: Location,
    pub dialect: Symbol,
    pub name: Symbol,
    pub operands: EntityList<ValueRef>,
    pub results: EntityList<TypeRef>,
    pub attributes: BTreeMap<Symbol, Attribute>,
    pub regions: SmallVec<[RegionRef; 2]>,
    pub parent_block: Option<BlockRef>,
}

pub struct ValueData {
    pub def: ValueDef,
    pub ty: TypeRef,
}

pub struct BlockData {
    pub location: Location,
    pub args: Vec<TypeRef>,
    pub ops: SmallVec<[OpRef; 4]>,
    pub parent_region: Option<RegionRef>,
}

pub struct RegionData {
    pub location: Location,
    pub blocks: SmallVec<[BlockRef; 1]>,
    pub parent_op: Option<OpRef>,
}

// ============================================================================
// IrContext
// ============================================================================

/// Owns every IR entity and keeps use-chains consistent.
pub struct IrContext {
    ops: PrimaryMap<OpRef, OperationData>,
    values: PrimaryMap<ValueRef, ValueData>,
    blocks: PrimaryMap<BlockRef, BlockData>,
    regions: PrimaryMap<RegionRef, RegionData>,

    uses: SecondaryMap<ValueRef, SmallVec<[Use; 2]>>,

    pub types: TypeInterner,
    pub paths: PathInterner,

    value_pool: ListPool<ValueRef>,
    type_pool: ListPool<TypeRef>,

    result_values: SecondaryMap<OpRef, EntityList<ValueRef>>,
    block_arg_values: SecondaryMap<BlockRef, EntityList<ValueRef>>,
}

impl IrContext {
    pub fn new() -> Self {
        Self {
            ops: PrimaryMap::new(),
            values: PrimaryMap::new(),
            blocks: PrimaryMap::new(),
            regions: PrimaryMap::new(),
            uses: SecondaryMap::new(),
            types: TypeInterner::new(),
            paths: PathInterner::new(),
            value_pool: ListPool::new(),
            type_pool: ListPool::new(),
            result_values: SecondaryMap::new(),
            block_arg_values: SecondaryMap::new(),
        }
    }

    /// Location pointing at the start of `path`, for synthesized IR.
    pub fn location(&mut self, path: &str) -> Location {
        let path = self.paths.intern(path.to_owned());
        Location::new(path, Span::default())
    }

    // ========================================================================
    // Operation
    // ========================================================================

    /// Create a detached operation and allocate its result values.
    ///
    /// # Panics
    ///
    /// Panics if `data.parent_block` is set, or if a region in `data.regions`
    /// already belongs to another operation.
    pub fn create_op(&mut self, data: OperationData) -> OpRef {
        assert!(
            data.parent_block.is_none(),
            "create_op: operation must not have parent_block set; \
             use push_op to attach it after creation",
        );

        let operands: SmallVec<[ValueRef; 8]> = data.operands.as_slice(&self.value_pool).into();
        let result_types: SmallVec<[TypeRef; 4]> = data.results.as_slice(&self.type_pool).into();
        let regions = data.regions.clone();

        let op = self.ops.push(data);

        for &r in &regions {
            if let Some(existing) = self.regions[r].parent_op {
                panic!("create_op: region {r} already belongs to operation {existing}");
            }
            self.regions[r].parent_op = Some(op);
        }

        for (idx, &val) in operands.iter().enumerate() {
            self.uses[val].push(Use {
                user: op,
                operand_index: idx as u32,
            });
        }

        let mut result_list = EntityList::new();
        for (idx, &ty) in result_types.iter().enumerate() {
            let v = self.values.push(ValueData {
                def: ValueDef::OpResult(op, idx as u32),
                ty,
            });
            result_list.push(v, &mut self.value_pool);
        }
        self.result_values[op] = result_list;

        op
    }

    pub fn op(&self, op: OpRef) -> &OperationData {
        &self.ops[op]
    }

    /// Mutable access to operation data.
    ///
    /// Editing `operands` through this desyncs the use-chain; use
    /// `replace_all_uses` instead.
    pub fn op_mut(&mut self, op: OpRef) -> &mut OperationData {
        &mut self.ops[op]
    }

    pub fn op_operands(&self, op: OpRef) -> &[ValueRef] {
        self.ops[op].operands.as_slice(&self.value_pool)
    }

    pub fn op_result_types(&self, op: OpRef) -> &[TypeRef] {
        self.ops[op].results.as_slice(&self.type_pool)
    }

    pub fn op_result(&self, op: OpRef, index: u32) -> ValueRef {
        self.result_values[op].as_slice(&self.value_pool)[index as usize]
    }

    pub fn op_results(&self, op: OpRef) -> &[ValueRef] {
        self.result_values[op].as_slice(&self.value_pool)
    }

    /// `dialect.name` of an operation, for diagnostics.
    pub fn op_full_name(&self, op: OpRef) -> String {
        let data = &self.ops[op];
        format!("{}.{}", data.dialect, data.name)
    }

    /// Destroy a detached operation, clearing its operand uses.
    ///
    /// # Panics
    ///
    /// Panics if the operation is still attached to a block or if any of its
    /// results still has uses.
    pub fn remove_op(&mut self, op: OpRef) {
        if let Some(block) = self.ops[op].parent_block {
            panic!("remove_op: operation {op} is still attached to {block}");
        }

        for &val in self.result_values[op].as_slice(&self.value_pool) {
            assert!(
                self.uses[val].is_empty(),
                "remove_op: result value {val} still has {} use(s)",
                self.uses[val].len()
            );
        }

        let operands: SmallVec<[ValueRef; 8]> =
            self.ops[op].operands.as_slice(&self.value_pool).into();
        for (idx, &val) in operands.iter().enumerate() {
            self.uses[val].retain(|u| !(u.user == op && u.operand_index == idx as u32));
        }
    }

    /// The operation owning the region that contains `op`, if any.
    pub fn parent_op(&self, op: OpRef) -> Option<OpRef> {
        self.block_parent_op(self.ops[op].parent_block?)
    }

    /// The operation owning the region that contains `block`, if any.
    pub fn block_parent_op(&self, block: BlockRef) -> Option<OpRef> {
        let region = self.blocks[block].parent_region?;
        self.regions[region].parent_op
    }

    // ========================================================================
    // Value
    // ========================================================================

    pub fn value(&self, v: ValueRef) -> &ValueData {
        &self.values[v]
    }

    pub fn value_ty(&self, v: ValueRef) -> TypeRef {
        self.values[v].ty
    }

    pub fn value_def(&self, v: ValueRef) -> ValueDef {
        self.values[v].def
    }

    /// The operation defining `v`, or `None` for block arguments.
    pub fn defining_op(&self, v: ValueRef) -> Option<OpRef> {
        match self.values[v].def {
            ValueDef::OpResult(op, _) => Some(op),
            ValueDef::BlockArg(..) => None,
        }
    }

    // ========================================================================
    // Block
    // ========================================================================

    /// Create a detached block and allocate its argument values.
    pub fn create_block(&mut self, data: BlockData) -> BlockRef {
        let arg_types = data.args.clone();
        let block = self.blocks.push(data);

        let mut arg_list = EntityList::new();
        for (idx, ty) in arg_types.into_iter().enumerate() {
            let v = self.values.push(ValueData {
                def: ValueDef::BlockArg(block, idx as u32),
                ty,
            });
            arg_list.push(v, &mut self.value_pool);
        }
        self.block_arg_values[block] = arg_list;

        block
    }

    /// Create an empty detached block with the given argument types.
    pub fn create_block_with_args(
        &mut self,
        location: Location,
        args: impl IntoIterator<Item = TypeRef>,
    ) -> BlockRef {
        self.create_block(BlockData {
            location,
            args: args.into_iter().collect(),
            ops: SmallVec::new(),
            parent_region: None,
        })
    }

    pub fn block(&self, b: BlockRef) -> &BlockData {
        &self.blocks[b]
    }

    pub fn block_arg(&self, b: BlockRef, index: u32) -> ValueRef {
        self.block_arg_values[b].as_slice(&self.value_pool)[index as usize]
    }

    pub fn block_args(&self, b: BlockRef) -> &[ValueRef] {
        self.block_arg_values[b].as_slice(&self.value_pool)
    }

    /// Append an operation to the end of a block.
    ///
    /// # Panics
    ///
    /// Panics if the operation already belongs to a block.
    pub fn push_op(&mut self, block: BlockRef, op: OpRef) {
        if let Some(existing) = self.ops[op].parent_block {
            panic!("push_op: operation {op} already belongs to {existing}");
        }
        self.ops[op].parent_block = Some(block);
        self.blocks[block].ops.push(op);
    }

    /// Insert an operation before `before` in the given block.
    ///
    /// # Panics
    ///
    /// Panics if the operation already belongs to a block, or if `before` is
    /// not in `block`.
    pub fn insert_op_before(&mut self, block: BlockRef, before: OpRef, op: OpRef) {
        if let Some(existing) = self.ops[op].parent_block {
            panic!("insert_op_before: operation {op} already belongs to {existing}");
        }
        let ops = &mut self.blocks[block].ops;
        let Some(pos) = ops.iter().position(|&o| o == before) else {
            panic!("insert_op_before: {before} not found in {block}");
        };
        ops.insert(pos, op);
        self.ops[op].parent_block = Some(block);
    }

    /// Insert an operation at the start of a block.
    pub fn insert_op_at_start(&mut self, block: BlockRef, op: OpRef) {
        match self.blocks[block].ops.first().copied() {
            Some(first) => self.insert_op_before(block, first, op),
            None => self.push_op(block, op),
        }
    }

    /// Detach an operation from a block without destroying it.
    pub fn remove_op_from_block(&mut self, block: BlockRef, op: OpRef) {
        self.blocks[block].ops.retain(|o| *o != op);
        if self.ops[op].parent_block == Some(block) {
            self.ops[op].parent_block = None;
        }
    }

    /// Move every operation of `src` to the end of `dst`, keeping their order.
    ///
    /// Uses of `src`'s arguments are replaced with `arg_replacements`; `src`
    /// is left empty.
    ///
    /// # Panics
    ///
    /// Panics if `arg_replacements` does not match `src`'s argument count.
    pub fn merge_blocks(&mut self, src: BlockRef, dst: BlockRef, arg_replacements: &[ValueRef]) {
        let src_args: SmallVec<[ValueRef; 4]> = self.block_args(src).into();
        assert_eq!(
            src_args.len(),
            arg_replacements.len(),
            "merge_blocks: {src} has {} argument(s) but {} replacement(s) were given",
            src_args.len(),
            arg_replacements.len()
        );
        for (&old, &new) in src_args.iter().zip(arg_replacements) {
            self.replace_all_uses(old, new);
        }

        let moved = std::mem::take(&mut self.blocks[src].ops);
        for &op in &moved {
            self.ops[op].parent_block = Some(dst);
        }
        self.blocks[dst].ops.extend(moved);
    }

    // ========================================================================
    // Region
    // ========================================================================

    /// Create a region owning the given blocks.
    ///
    /// # Panics
    ///
    /// Panics if a block already belongs to another region.
    pub fn create_region(&mut self, data: RegionData) -> RegionRef {
        let blocks = data.blocks.clone();
        let region = self.regions.push(data);
        for b in blocks {
            if let Some(existing) = self.blocks[b].parent_region {
                panic!("create_region: {b} already belongs to {existing}");
            }
            self.blocks[b].parent_region = Some(region);
        }
        region
    }

    pub fn region(&self, r: RegionRef) -> &RegionData {
        &self.regions[r]
    }

    /// First block of a region, for single-block (structured) regions.
    pub fn region_entry(&self, r: RegionRef) -> Option<BlockRef> {
        self.regions[r].blocks.first().copied()
    }

    // ========================================================================
    // Use-chain
    // ========================================================================

    pub fn uses(&self, v: ValueRef) -> &[Use] {
        &self.uses[v]
    }

    pub fn has_uses(&self, v: ValueRef) -> bool {
        !self.uses[v].is_empty()
    }

    /// Replace all uses of `old` with `new`, updating operands and use-chains.
    pub fn replace_all_uses(&mut self, old: ValueRef, new: ValueRef) {
        if old == new {
            return;
        }
        let old_uses = std::mem::take(&mut self.uses[old]);
        for u in &old_uses {
            let slice = self.ops[u.user].operands.as_mut_slice(&mut self.value_pool);
            debug_assert_eq!(slice[u.operand_index as usize], old);
            slice[u.operand_index as usize] = new;
            self.uses[new].push(*u);
        }
    }
}

impl Default for IrContext {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// OperationDataBuilder
// ============================================================================

/// Builder for `OperationData` that packs operand and result lists into the
/// context's pools on `build()`.
pub struct OperationDataBuilder {
    location: Location,
    dialect: Symbol,
    name: Symbol,
    operands: Vec<ValueRef>,
    results: Vec<TypeRef>,
    attributes: BTreeMap<Symbol, Attribute>,
    regions: SmallVec<[RegionRef; 2]>,
}

impl OperationDataBuilder {
    pub fn new(location: Location, dialect: Symbol, name: Symbol) -> Self {
        Self {
            location,
            dialect,
            name,
            operands: Vec::new(),
            results: Vec::new(),
            attributes: BTreeMap::new(),
            regions: SmallVec::new(),
        }
    }

    pub fn operand(mut self, v: ValueRef) -> Self {
        self.operands.push(v);
        self
    }

    pub fn operands(mut self, vs: impl IntoIterator<Item = ValueRef>) -> Self {
        self.operands.extend(vs);
        self
    }

    pub fn result(mut self, ty: TypeRef) -> Self {
        self.results.push(ty);
        self
    }

    pub fn results(mut self, tys: impl IntoIterator<Item = TypeRef>) -> Self {
        self.results.extend(tys);
        self
    }

    pub fn attr(mut self, key: impl Into<Symbol>, val: Attribute) -> Self {
        self.attributes.insert(key.into(), val);
        self
    }

    pub fn region(mut self, r: RegionRef) -> Self {
        self.regions.push(r);
        self
    }

    pub fn build(self, ctx: &mut IrContext) -> OperationData {
        let mut operands = EntityList::new();
        for v in self.operands {
            operands.push(v, &mut ctx.value_pool);
        }
        let mut results = EntityList::new();
        for ty in self.results {
            results.push(ty, &mut ctx.type_pool);
        }
        OperationData {
            location: self.location,
            dialect: self.dialect,
            name: self.name,
            operands,
            results,
            attributes: self.attributes,
            regions: self.regions,
            parent_block: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    fn setup() -> (IrContext, Location, TypeRef) {
        let mut ctx = IrContext::new();
        let loc = ctx.location("test.mlir");
        let i32_ty = ctx.types.scalar("core", "i32");
        (ctx, loc, i32_ty)
    }

    fn make_op(ctx: &mut IrContext, loc: Location, name: &'static str, operands: &[ValueRef], ty: TypeRef) -> OpRef {
        let data = OperationDataBuilder::new(loc, Symbol::new("test"), Symbol::new(name))
            .operands(operands.iter().copied())
            .result(ty)
            .build(ctx);
        ctx.create_op(data)
    }

    #[test]
    fn use_chain_tracking() {
        let (mut ctx, loc, i32_ty) = setup();
        let a = make_op(&mut ctx, loc, "a", &[], i32_ty);
        let va = ctx.op_result(a, 0);
        assert!(!ctx.has_uses(va));

        let b = make_op(&mut ctx, loc, "b", &[va, va], i32_ty);
        let uses = ctx.uses(va);
        assert_eq!(uses.len(), 2);
        assert_eq!(uses[1], Use { user: b, operand_index: 1 });
    }

    #[test]
    fn rauw_updates_operands() {
        let (mut ctx, loc, i32_ty) = setup();
        let a = make_op(&mut ctx, loc, "a", &[], i32_ty);
        let b = make_op(&mut ctx, loc, "b", &[], i32_ty);
        let (va, vb) = (ctx.op_result(a, 0), ctx.op_result(b, 0));
        let user = make_op(&mut ctx, loc, "use", &[va], i32_ty);

        ctx.replace_all_uses(va, vb);

        assert_eq!(ctx.op_operands(user), &[vb]);
        assert!(!ctx.has_uses(va));
        assert_eq!(ctx.uses(vb).len(), 1);
    }

    #[test]
    fn merge_blocks_moves_ops_in_order() {
        let (mut ctx, loc, i32_ty) = setup();
        let src = ctx.create_block_with_args(loc, [i32_ty]);
        let dst = ctx.create_block_with_args(loc, [i32_ty]);
        let src_arg = ctx.block_arg(src, 0);
        let dst_arg = ctx.block_arg(dst, 0);

        let first = make_op(&mut ctx, loc, "first", &[src_arg], i32_ty);
        let second = make_op(&mut ctx, loc, "second", &[], i32_ty);
        ctx.push_op(src, first);
        ctx.push_op(src, second);

        ctx.merge_blocks(src, dst, &[dst_arg]);

        assert!(ctx.block(src).ops.is_empty());
        assert_eq!(ctx.block(dst).ops.as_slice(), &[first, second]);
        assert_eq!(ctx.op(first).parent_block, Some(dst));
        assert_eq!(ctx.op_operands(first), &[dst_arg]);
    }

    #[test]
    #[should_panic(expected = "replacement(s) were given")]
    fn merge_blocks_rejects_arity_mismatch() {
        let (mut ctx, loc, i32_ty) = setup();
        let src = ctx.create_block_with_args(loc, [i32_ty]);
        let dst = ctx.create_block_with_args(loc, []);
        ctx.merge_blocks(src, dst, &[]);
    }

    #[test]
    fn parent_op_through_region() {
        let (mut ctx, loc, i32_ty) = setup();
        let block = ctx.create_block_with_args(loc, []);
        let inner = make_op(&mut ctx, loc, "inner", &[], i32_ty);
        ctx.push_op(block, inner);
        let region = ctx.create_region(RegionData {
            location: loc,
            blocks: smallvec![block],
            parent_op: None,
        });
        let data = OperationDataBuilder::new(loc, Symbol::new("test"), Symbol::new("outer"))
            .region(region)
            .build(&mut ctx);
        let outer = ctx.create_op(data);

        assert_eq!(ctx.parent_op(inner), Some(outer));
        assert_eq!(ctx.block_parent_op(block), Some(outer));
        assert_eq!(ctx.parent_op(outer), None);
    }

    #[test]
    #[should_panic(expected = "still has")]
    fn remove_op_panics_when_result_has_uses() {
        let (mut ctx, loc, i32_ty) = setup();
        let a = make_op(&mut ctx, loc, "a", &[], i32_ty);
        let va = ctx.op_result(a, 0);
        let _user = make_op(&mut ctx, loc, "b", &[va], i32_ty);
        ctx.remove_op(a);
    }

    #[test]
    fn insert_at_start_of_block() {
        let (mut ctx, loc, i32_ty) = setup();
        let block = ctx.create_block_with_args(loc, []);
        let b = make_op(&mut ctx, loc, "b", &[], i32_ty);
        ctx.insert_op_at_start(block, b);
        let a = make_op(&mut ctx, loc, "a", &[], i32_ty);
        ctx.insert_op_at_start(block, a);
        assert_eq!(ctx.block(block).ops.as_slice(), &[a, b]);
    }
}
