use std::collections::HashMap;

use toy_ir::{Block, BlockId, FuncId, Inst, Module, Operand, Terminator, ValueId};
use tracing::{debug, trace};

use crate::error::VmError;
use crate::runtime::Runtime;

const MAX_CALL_DEPTH: usize = 256;

/// Activation record of a function with a body.
struct Frame {
    slots: Vec<i32>,
    values: HashMap<ValueId, i32>,
}

impl Frame {
    fn read(&self, operand: Operand) -> Result<i32, VmError> {
        match operand {
            Operand::Const(c) => Ok(c),
            Operand::Value(v) => self
                .values
                .get(&v)
                .copied()
                .ok_or(VmError::UndefinedValue(v.0)),
        }
    }

    fn slot_mut(&mut self, slot: toy_ir::SlotId) -> Result<&mut i32, VmError> {
        self.slots
            .get_mut(slot.0 as usize)
            .ok_or(VmError::InvalidSlot(slot.0))
    }
}

/// Interpreter for toy IR modules.
///
/// Slots start out as `0`. Arithmetic wraps on overflow. Calls to external
/// functions go to the [`Runtime`].
pub struct Vm<R> {
    module: Module,
    runtime: R,
    step_count: u64,
    max_steps: u64,
}

impl<R: Runtime> Vm<R> {
    pub fn new(module: Module, runtime: R) -> Self {
        Vm {
            module,
            runtime,
            step_count: 0,
            max_steps: 10_000_000,
        }
    }

    pub fn set_max_steps(&mut self, max: u64) {
        self.max_steps = max;
    }

    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    pub fn into_runtime(self) -> R {
        self.runtime
    }

    /// Verify the module, then run `main` to completion.
    pub fn run(&mut self) -> Result<(), VmError> {
        toy_ir::verify(&self.module)?;
        let (entry, _) = self
            .module
            .function_by_name("main")
            .ok_or_else(|| VmError::NoEntry("main".into()))?;
        self.call(entry, Vec::new(), 0)?;
        debug!(steps = self.step_count, "program finished");
        Ok(())
    }

    fn call(&mut self, func_id: FuncId, args: Vec<i32>, depth: usize) -> Result<Option<i32>, VmError> {
        if depth >= MAX_CALL_DEPTH {
            return Err(VmError::CallDepthExceeded(MAX_CALL_DEPTH));
        }
        let func = self
            .module
            .function(func_id)
            .ok_or(VmError::InvalidFunction(func_id.0))?;
        if args.len() != func.signature.params as usize {
            return Err(VmError::ArgumentCount {
                callee: func.name.clone(),
                expected: func.signature.params as usize,
                got: args.len(),
            });
        }
        if func.external {
            let name = func.name.clone();
            return self.call_external(&name, &args);
        }

        let name = func.name.clone();
        let mut frame = Frame {
            slots: vec![0; func.slots.len()],
            values: HashMap::new(),
        };
        let mut current = BlockId(0);
        loop {
            let count = self.block(func_id, current)?.insts.len();
            for idx in 0..count {
                let inst = self.block(func_id, current)?.insts[idx].clone();
                self.tick()?;
                trace!(function = %name, ?inst, "exec");
                self.exec(&mut frame, &name, inst, depth)?;
            }

            self.tick()?;
            let block = self.block(func_id, current)?;
            let term = block
                .terminator
                .clone()
                .ok_or_else(|| VmError::Unterminated(block.label.clone()))?;
            current = match term {
                Terminator::Br(target) => target,
                Terminator::CondBr { cond, then_to, else_to } => {
                    if frame.read(cond)? != 0 {
                        then_to
                    } else {
                        else_to
                    }
                }
                Terminator::RetVoid => return Ok(None),
            };
        }
    }

    fn exec(&mut self, frame: &mut Frame, function: &str, inst: Inst, depth: usize) -> Result<(), VmError> {
        match inst {
            Inst::Alloca { slot } => {
                *frame.slot_mut(slot)? = 0;
            }
            Inst::Load { dest, slot } => {
                let value = *frame.slot_mut(slot)?;
                frame.values.insert(dest, value);
            }
            Inst::Store { slot, value } => {
                let value = frame.read(value)?;
                *frame.slot_mut(slot)? = value;
            }
            Inst::Binary { dest, op, lhs, rhs } => {
                let value = op.apply(frame.read(lhs)?, frame.read(rhs)?);
                frame.values.insert(dest, value);
            }
            Inst::ICmp { dest, pred, lhs, rhs } => {
                let value = pred.apply(frame.read(lhs)?, frame.read(rhs)?);
                frame.values.insert(dest, value);
            }
            Inst::Call { dest, callee, args } => {
                let args = args
                    .into_iter()
                    .map(|a| frame.read(a))
                    .collect::<Result<Vec<_>, _>>()?;
                let result = self.call(callee, args, depth + 1)?;
                if let Some(dest) = dest {
                    let value = result.ok_or_else(|| VmError::Runtime {
                        function: function.to_string(),
                        msg: format!("call to function #{} produced no value", callee.0),
                    })?;
                    frame.values.insert(dest, value);
                }
            }
        }
        Ok(())
    }

    fn call_external(&mut self, name: &str, args: &[i32]) -> Result<Option<i32>, VmError> {
        let runtime_err = |msg: String| VmError::Runtime {
            function: name.to_string(),
            msg,
        };
        match (name, args) {
            ("print", [value]) => {
                self.runtime.print(*value).map_err(runtime_err)?;
                Ok(None)
            }
            ("input", []) => self.runtime.input().map(Some).map_err(runtime_err),
            _ => Err(VmError::UnknownExternal(name.to_string())),
        }
    }

    fn block(&self, func_id: FuncId, block: BlockId) -> Result<&Block, VmError> {
        let func = self
            .module
            .function(func_id)
            .ok_or(VmError::InvalidFunction(func_id.0))?;
        func.block(block).ok_or_else(|| VmError::InvalidBlock {
            function: func.name.clone(),
            block: block.0,
        })
    }

    fn tick(&mut self) -> Result<(), VmError> {
        self.step_count += 1;
        if self.step_count > self.max_steps {
            return Err(VmError::ExecutionLimitExceeded(self.max_steps));
        }
        Ok(())
    }
}
