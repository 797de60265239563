use serde::{Deserialize, Serialize};

/// SSA value produced by an instruction, numbered per function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ValueId(pub u32);

/// Index of a basic block inside its function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockId(pub u32);

/// Index of a mutable stack slot inside its function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SlotId(pub u32);

/// Index of a function inside its module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FuncId(pub u32);

/// Instruction input: either an `i32` literal or a previously produced value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operand {
    Const(i32),
    Value(ValueId),
}

impl Operand {
    pub fn as_const(&self) -> Option<i32> {
        match self {
            Operand::Const(v) => Some(*v),
            Operand::Value(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinOp {
    Add,
    Sub,
}

impl BinOp {
    /// Two's-complement `i32` semantics, shared by the folder and the VM.
    pub fn apply(self, lhs: i32, rhs: i32) -> i32 {
        match self {
            BinOp::Add => lhs.wrapping_add(rhs),
            BinOp::Sub => lhs.wrapping_sub(rhs),
        }
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            BinOp::Add => "add",
            BinOp::Sub => "sub",
        }
    }
}

/// Signed integer comparison predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Predicate {
    Slt,
    Eq,
    Sgt,
}

impl Predicate {
    /// Result is `1` when the predicate holds, `0` otherwise.
    pub fn apply(self, lhs: i32, rhs: i32) -> i32 {
        let holds = match self {
            Predicate::Slt => lhs < rhs,
            Predicate::Eq => lhs == rhs,
            Predicate::Sgt => lhs > rhs,
        };
        holds as i32
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            Predicate::Slt => "slt",
            Predicate::Eq => "eq",
            Predicate::Sgt => "sgt",
        }
    }
}

/// Non-terminating instructions of a basic block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Inst {
    /// Reserve a mutable `i32` slot. Only valid in the entry block.
    Alloca { slot: SlotId },

    /// Read the current contents of a slot.
    Load { dest: ValueId, slot: SlotId },

    /// Overwrite a slot.
    Store { slot: SlotId, value: Operand },

    Binary {
        dest: ValueId,
        op: BinOp,
        lhs: Operand,
        rhs: Operand,
    },

    /// Signed comparison producing `0` or `1`.
    ICmp {
        dest: ValueId,
        pred: Predicate,
        lhs: Operand,
        rhs: Operand,
    },

    /// Call a function; `dest` is set iff the callee returns a value.
    Call {
        dest: Option<ValueId>,
        callee: FuncId,
        args: Vec<Operand>,
    },
}

impl Inst {
    /// Value defined by this instruction, if any.
    pub fn dest(&self) -> Option<ValueId> {
        match self {
            Inst::Load { dest, .. } | Inst::Binary { dest, .. } | Inst::ICmp { dest, .. } => {
                Some(*dest)
            }
            Inst::Call { dest, .. } => *dest,
            Inst::Alloca { .. } | Inst::Store { .. } => None,
        }
    }

    pub fn operands(&self) -> Vec<Operand> {
        match self {
            Inst::Alloca { .. } | Inst::Load { .. } => Vec::new(),
            Inst::Store { value, .. } => vec![*value],
            Inst::Binary { lhs, rhs, .. } | Inst::ICmp { lhs, rhs, .. } => vec![*lhs, *rhs],
            Inst::Call { args, .. } => args.clone(),
        }
    }

    pub fn operands_mut(&mut self) -> Vec<&mut Operand> {
        match self {
            Inst::Alloca { .. } | Inst::Load { .. } => Vec::new(),
            Inst::Store { value, .. } => vec![value],
            Inst::Binary { lhs, rhs, .. } | Inst::ICmp { lhs, rhs, .. } => vec![lhs, rhs],
            Inst::Call { args, .. } => args.iter_mut().collect(),
        }
    }

    pub fn slot(&self) -> Option<SlotId> {
        match self {
            Inst::Alloca { slot } | Inst::Load { slot, .. } | Inst::Store { slot, .. } => {
                Some(*slot)
            }
            _ => None,
        }
    }
}

/// The single exit of a basic block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Terminator {
    Br(BlockId),
    CondBr {
        cond: Operand,
        then_to: BlockId,
        else_to: BlockId,
    },
    RetVoid,
}

impl Terminator {
    pub fn successors(&self) -> Vec<BlockId> {
        match self {
            Terminator::Br(target) => vec![*target],
            Terminator::CondBr { then_to, else_to, .. } => vec![*then_to, *else_to],
            Terminator::RetVoid => Vec::new(),
        }
    }

    pub(crate) fn successors_mut(&mut self) -> Vec<&mut BlockId> {
        match self {
            Terminator::Br(target) => vec![target],
            Terminator::CondBr { then_to, else_to, .. } => vec![then_to, else_to],
            Terminator::RetVoid => Vec::new(),
        }
    }
}
