use crate::inst::{BinOp, BlockId, FuncId, Inst, Operand, Predicate, SlotId, Terminator, ValueId};
use crate::module::{Block, Function, IrError, Module, Signature};

/// Cursor-based IR construction.
///
/// Instructions are appended to the block selected with
/// [`Builder::position_at_end`]. Slots are the exception: they are placed in
/// an explicit block, ahead of every non-slot instruction already there.
pub struct Builder {
    module: Module,
    cursor: Option<(FuncId, BlockId)>,
}

impl Builder {
    pub fn new(name: impl Into<String>) -> Self {
        Builder {
            module: Module::new(name),
            cursor: None,
        }
    }

    pub fn module(&self) -> &Module {
        &self.module
    }

    pub fn module_mut(&mut self) -> &mut Module {
        &mut self.module
    }

    pub fn finish(self) -> Module {
        self.module
    }

    pub fn insert_point(&self) -> Option<(FuncId, BlockId)> {
        self.cursor
    }

    /// Declare a function implemented outside the module.
    pub fn declare_function(&mut self, name: &str, signature: Signature) -> FuncId {
        self.module.add_function(Function::new(name, signature, true))
    }

    /// Create a function with a body; blocks are added with `append_block`.
    pub fn define_function(&mut self, name: &str, signature: Signature) -> FuncId {
        self.module.add_function(Function::new(name, signature, false))
    }

    pub fn append_block(&mut self, func: FuncId, label: &str) -> Result<BlockId, IrError> {
        let f = self.function_mut(func)?;
        if f.external {
            return Err(IrError::ExternalBody(f.name.clone()));
        }
        let label = f.unique_label(label);
        let id = BlockId(f.blocks.len() as u32);
        f.blocks.push(Block::new(label));
        Ok(id)
    }

    pub fn entry_block(&self, func: FuncId) -> Result<BlockId, IrError> {
        let f = self
            .module
            .function(func)
            .ok_or(IrError::UnknownFunction(func.0))?;
        if f.blocks.is_empty() {
            return Err(IrError::UnknownBlock(0));
        }
        Ok(BlockId(0))
    }

    pub fn position_at_end(&mut self, func: FuncId, block: BlockId) -> Result<(), IrError> {
        self.block_mut(func, block)?;
        self.cursor = Some((func, block));
        Ok(())
    }

    /// Reserve a named slot in `block`, after any slots already there.
    pub fn build_alloca(&mut self, func: FuncId, block: BlockId, name: &str) -> Result<SlotId, IrError> {
        let f = self.function_mut(func)?;
        let slot = SlotId(f.slots.len() as u32);
        f.slots.push(name.to_string());
        let b = f
            .blocks
            .get_mut(block.0 as usize)
            .ok_or(IrError::UnknownBlock(block.0))?;
        let at = b
            .insts
            .iter()
            .position(|inst| !matches!(inst, Inst::Alloca { .. }))
            .unwrap_or(b.insts.len());
        b.insts.insert(at, Inst::Alloca { slot });
        Ok(slot)
    }

    pub fn build_load(&mut self, slot: SlotId) -> Result<ValueId, IrError> {
        let dest = self.fresh_value()?;
        self.push(Inst::Load { dest, slot })?;
        Ok(dest)
    }

    pub fn build_store(&mut self, slot: SlotId, value: Operand) -> Result<(), IrError> {
        self.push(Inst::Store { slot, value })
    }

    pub fn build_binary(&mut self, op: BinOp, lhs: Operand, rhs: Operand) -> Result<ValueId, IrError> {
        let dest = self.fresh_value()?;
        self.push(Inst::Binary { dest, op, lhs, rhs })?;
        Ok(dest)
    }

    pub fn build_icmp(&mut self, pred: Predicate, lhs: Operand, rhs: Operand) -> Result<ValueId, IrError> {
        let dest = self.fresh_value()?;
        self.push(Inst::ICmp { dest, pred, lhs, rhs })?;
        Ok(dest)
    }

    pub fn build_call(&mut self, callee: FuncId, args: Vec<Operand>) -> Result<Option<ValueId>, IrError> {
        let returns_value = self
            .module
            .function(callee)
            .ok_or(IrError::UnknownFunction(callee.0))?
            .signature
            .returns_value;
        let dest = if returns_value {
            Some(self.fresh_value()?)
        } else {
            None
        };
        self.push(Inst::Call { dest, callee, args })?;
        Ok(dest)
    }

    pub fn build_br(&mut self, target: BlockId) -> Result<(), IrError> {
        self.terminate(Terminator::Br(target))
    }

    pub fn build_cond_br(&mut self, cond: Operand, then_to: BlockId, else_to: BlockId) -> Result<(), IrError> {
        self.terminate(Terminator::CondBr { cond, then_to, else_to })
    }

    pub fn build_ret_void(&mut self) -> Result<(), IrError> {
        self.terminate(Terminator::RetVoid)
    }

    fn function_mut(&mut self, func: FuncId) -> Result<&mut Function, IrError> {
        self.module
            .functions
            .get_mut(func.0 as usize)
            .ok_or(IrError::UnknownFunction(func.0))
    }

    fn block_mut(&mut self, func: FuncId, block: BlockId) -> Result<&mut Block, IrError> {
        self.function_mut(func)?
            .blocks
            .get_mut(block.0 as usize)
            .ok_or(IrError::UnknownBlock(block.0))
    }

    /// The block under the cursor, provided it can still take instructions.
    fn open_block(&mut self) -> Result<&mut Block, IrError> {
        let (func, block) = self.cursor.ok_or(IrError::NoInsertPoint)?;
        let b = self.block_mut(func, block)?;
        if b.terminator.is_some() {
            return Err(IrError::AlreadyTerminated(b.label.clone()));
        }
        Ok(b)
    }

    fn fresh_value(&mut self) -> Result<ValueId, IrError> {
        self.open_block()?;
        let (func, _) = self.cursor.ok_or(IrError::NoInsertPoint)?;
        let f = self.function_mut(func)?;
        let id = ValueId(f.next_value);
        f.next_value += 1;
        Ok(id)
    }

    fn push(&mut self, inst: Inst) -> Result<(), IrError> {
        self.open_block()?.insts.push(inst);
        Ok(())
    }

    fn terminate(&mut self, term: Terminator) -> Result<(), IrError> {
        self.open_block()?.terminator = Some(term);
        Ok(())
    }
}
