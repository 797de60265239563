pub mod inst;
pub mod module;
pub mod builder;
pub mod verify;
pub mod passes;
mod display;

pub use builder::Builder;
pub use inst::{BinOp, BlockId, FuncId, Inst, Operand, Predicate, SlotId, Terminator, ValueId};
pub use module::{Block, Function, IrError, Module, Signature};
pub use passes::PassStats;
pub use verify::verify;
