use toy_ir::{BinOp, BlockId, Builder, FuncId, IrError, Module, Operand, Predicate, Signature, SlotId};
use tracing::debug;

use crate::backend::{Backend, Comparison};

impl Backend for Builder {
    type Value = Operand;
    type Block = (FuncId, BlockId);
    type Function = FuncId;
    type Slot = SlotId;
    type Output = Module;
    type Error = IrError;

    fn declare_function(&mut self, name: &str, params: u8, returns_value: bool) -> FuncId {
        Builder::declare_function(self, name, Signature::new(params, returns_value))
    }

    fn define_function(&mut self, name: &str, params: u8, returns_value: bool) -> FuncId {
        Builder::define_function(self, name, Signature::new(params, returns_value))
    }

    fn append_block(&mut self, function: FuncId, label: &str) -> Result<(FuncId, BlockId), IrError> {
        Ok((function, Builder::append_block(self, function, label)?))
    }

    fn entry_block(&self, function: FuncId) -> Result<(FuncId, BlockId), IrError> {
        Ok((function, Builder::entry_block(self, function)?))
    }

    fn position_at_end(&mut self, (function, block): (FuncId, BlockId)) -> Result<(), IrError> {
        Builder::position_at_end(self, function, block)
    }

    fn create_slot(&mut self, (function, block): (FuncId, BlockId), name: &str) -> Result<SlotId, IrError> {
        self.build_alloca(function, block, name)
    }

    fn const_int(&self, value: i32) -> Operand {
        Operand::Const(value)
    }

    fn load(&mut self, slot: SlotId) -> Result<Operand, IrError> {
        self.build_load(slot).map(Operand::Value)
    }

    fn store(&mut self, slot: SlotId, value: Operand) -> Result<(), IrError> {
        self.build_store(slot, value)
    }

    fn add(&mut self, lhs: Operand, rhs: Operand) -> Result<Operand, IrError> {
        self.build_binary(BinOp::Add, lhs, rhs).map(Operand::Value)
    }

    fn sub(&mut self, lhs: Operand, rhs: Operand) -> Result<Operand, IrError> {
        self.build_binary(BinOp::Sub, lhs, rhs).map(Operand::Value)
    }

    fn compare_with_zero(&mut self, cmp: Comparison, value: Operand) -> Result<Operand, IrError> {
        let pred = match cmp {
            Comparison::Less => Predicate::Slt,
            Comparison::Equal => Predicate::Eq,
            Comparison::Greater => Predicate::Sgt,
        };
        self.build_icmp(pred, value, Operand::Const(0)).map(Operand::Value)
    }

    fn cond_br(
        &mut self,
        cond: Operand,
        (_, then_to): (FuncId, BlockId),
        (_, else_to): (FuncId, BlockId),
    ) -> Result<(), IrError> {
        self.build_cond_br(cond, then_to, else_to)
    }

    fn br(&mut self, (_, target): (FuncId, BlockId)) -> Result<(), IrError> {
        self.build_br(target)
    }

    fn call(&mut self, function: FuncId, args: &[Operand]) -> Result<Option<Operand>, IrError> {
        Ok(self.build_call(function, args.to_vec())?.map(Operand::Value))
    }

    fn ret_void(&mut self) -> Result<(), IrError> {
        self.build_ret_void()
    }

    fn run_passes(&mut self) {
        let stats = toy_ir::passes::run_standard(self.module_mut());
        debug!(?stats, "backend passes");
    }

    /// Verify, then hand out the module.
    fn finish(self) -> Result<Module, IrError> {
        let module = Builder::finish(self);
        module.verify()?;
        Ok(module)
    }
}
