use thiserror::Error;

#[derive(Debug, Error)]
pub enum VmError {
    #[error("module has no `{0}` function")]
    NoEntry(String),

    #[error("invalid function index: {0}")]
    InvalidFunction(u32),

    #[error("invalid block index {block} in `{function}`")]
    InvalidBlock { function: String, block: u32 },

    #[error("invalid slot index: {0}")]
    InvalidSlot(u32),

    #[error("value %{0} used before it was defined")]
    UndefinedValue(u32),

    #[error("block `{0}` has no terminator")]
    Unterminated(String),

    #[error("no runtime implementation for external function `{0}`")]
    UnknownExternal(String),

    #[error("`{callee}` expects {expected} arguments, got {got}")]
    ArgumentCount {
        callee: String,
        expected: usize,
        got: usize,
    },

    #[error("runtime error in `{function}`: {msg}")]
    Runtime { function: String, msg: String },

    #[error("max call depth exceeded ({0})")]
    CallDepthExceeded(usize),

    #[error("max execution steps exceeded ({0})")]
    ExecutionLimitExceeded(u64),

    #[error("invalid module: {0}")]
    Ir(#[from] toy_ir::IrError),
}
