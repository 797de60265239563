//! The interface the code generator emits through.
//!
//! The generator never names a concrete IR. Any type implementing
//! [`Backend`] can receive a program; `toy_ir::Builder` is the one this
//! workspace ships (see `ir_backend`).

/// Signed comparison of a value against zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Less,
    Equal,
    Greater,
}

pub trait Backend {
    type Value: Copy;
    type Block: Copy;
    type Function: Copy;
    type Slot: Copy;
    type Output;
    type Error: std::error::Error;

    /// Declare a function provided by the runtime library.
    fn declare_function(&mut self, name: &str, params: u8, returns_value: bool) -> Self::Function;

    fn define_function(&mut self, name: &str, params: u8, returns_value: bool) -> Self::Function;

    fn append_block(&mut self, function: Self::Function, label: &str) -> Result<Self::Block, Self::Error>;

    fn entry_block(&self, function: Self::Function) -> Result<Self::Block, Self::Error>;

    fn position_at_end(&mut self, block: Self::Block) -> Result<(), Self::Error>;

    /// Create a zero-initialized-by-backend `i32` slot in `block`, ahead of
    /// its non-slot instructions.
    fn create_slot(&mut self, block: Self::Block, name: &str) -> Result<Self::Slot, Self::Error>;

    fn const_int(&self, value: i32) -> Self::Value;

    fn load(&mut self, slot: Self::Slot) -> Result<Self::Value, Self::Error>;

    fn store(&mut self, slot: Self::Slot, value: Self::Value) -> Result<(), Self::Error>;

    fn add(&mut self, lhs: Self::Value, rhs: Self::Value) -> Result<Self::Value, Self::Error>;

    fn sub(&mut self, lhs: Self::Value, rhs: Self::Value) -> Result<Self::Value, Self::Error>;

    /// Boolean result of `value <cmp> 0`.
    fn compare_with_zero(&mut self, cmp: Comparison, value: Self::Value) -> Result<Self::Value, Self::Error>;

    fn cond_br(&mut self, cond: Self::Value, then_to: Self::Block, else_to: Self::Block) -> Result<(), Self::Error>;

    fn br(&mut self, target: Self::Block) -> Result<(), Self::Error>;

    /// `None` when the callee returns nothing.
    fn call(&mut self, function: Self::Function, args: &[Self::Value]) -> Result<Option<Self::Value>, Self::Error>;

    fn ret_void(&mut self) -> Result<(), Self::Error>;

    /// The backend's own optimization pipeline.
    fn run_passes(&mut self);

    fn finish(self) -> Result<Self::Output, Self::Error>;
}
