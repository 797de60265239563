use thiserror::Error;
use toy_ir::IrError;

#[derive(Debug, Error)]
pub enum CompileError {
    /// The program contains error nodes; no module was produced.
    #[error("incorrect program: {}", .errors.join("; "))]
    Syntax {
        errors: Vec<String>,
        /// Formatted syntax tree, error nodes included.
        listing: String,
    },

    #[error("codegen error: {0}")]
    Codegen(#[from] IrError),
}
