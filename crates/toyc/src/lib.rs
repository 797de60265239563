pub mod lexer;
pub mod ast;
pub mod parser;
pub mod backend;
pub mod codegen;
mod ir_backend;
pub mod error;
#[cfg(test)]
mod tests;

pub use backend::{Backend, Comparison};
pub use error::CompileError;
pub use parser::{parse, ParsedProgram};

use toy_ir::{Builder, Module};
use tracing::debug;

/// Knobs for [`compile_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompileOptions {
    /// Run the backend's simplification passes.
    pub optimize: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions { optimize: true }
    }
}

/// Compile source code to an IR module with the default options.
pub fn compile(name: &str, source: &str) -> Result<Module, CompileError> {
    compile_with(name, source, &CompileOptions::default())
}

pub fn compile_with(name: &str, source: &str, options: &CompileOptions) -> Result<Module, CompileError> {
    let ParsedProgram { root, is_valid } = parse(source);
    if !is_valid {
        return Err(CompileError::Syntax {
            errors: root.errors(),
            listing: root.to_string(),
        });
    }
    let module = codegen::generate(Builder::new(name), &root, options)?;
    debug!(module = name, functions = module.functions.len(), "compiled");
    Ok(module)
}
