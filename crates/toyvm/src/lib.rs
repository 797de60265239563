pub mod error;
pub mod runtime;
pub mod vm;

pub use error::VmError;
pub use runtime::{IoRuntime, Runtime, ScriptedRuntime};
pub use vm::Vm;
