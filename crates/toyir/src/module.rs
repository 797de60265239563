use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::inst::{BlockId, FuncId, Inst, SlotId, Terminator};

/// Magic bytes for serialized IR files: "TOYI"
pub const MAGIC: [u8; 4] = [0x54, 0x4F, 0x59, 0x49];
pub const VERSION: u16 = 1;

#[derive(Debug, Error)]
pub enum IrError {
    #[error("no insertion point set")]
    NoInsertPoint,
    #[error("block `{0}` already has a terminator")]
    AlreadyTerminated(String),
    #[error("unknown function #{0}")]
    UnknownFunction(u32),
    #[error("unknown block #{0}")]
    UnknownBlock(u32),
    #[error("function `{0}` is external and has no body")]
    ExternalBody(String),
    #[error("invalid IR in `{function}`: {msg}")]
    Verify { function: String, msg: String },
    #[error("invalid magic bytes")]
    InvalidMagic,
    #[error("unsupported version: {0}")]
    UnsupportedVersion(u16),
    #[error("truncated IR file")]
    Truncated,
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Every value in the language is an `i32`, so a signature only records
/// arity and whether an `i32` comes back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub params: u8,
    pub returns_value: bool,
}

impl Signature {
    pub fn new(params: u8, returns_value: bool) -> Self {
        Signature { params, returns_value }
    }
}

/// A basic block: straight-line instructions plus one terminator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub label: String,
    pub insts: Vec<Inst>,
    /// `None` only while the block is under construction.
    pub terminator: Option<Terminator>,
}

impl Block {
    pub fn new(label: impl Into<String>) -> Self {
        Block {
            label: label.into(),
            insts: Vec::new(),
            terminator: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Function {
    pub name: String,
    pub signature: Signature,
    /// Declared here, implemented by the runtime.
    pub external: bool,
    /// Slot names, indexed by `SlotId`.
    pub slots: Vec<String>,
    /// `blocks[0]` is the entry block.
    pub blocks: Vec<Block>,
    /// Next free `ValueId` number.
    pub next_value: u32,
}

impl Function {
    pub fn new(name: impl Into<String>, signature: Signature, external: bool) -> Self {
        Function {
            name: name.into(),
            signature,
            external,
            slots: Vec::new(),
            blocks: Vec::new(),
            next_value: 0,
        }
    }

    pub fn block(&self, id: BlockId) -> Option<&Block> {
        self.blocks.get(id.0 as usize)
    }

    pub fn slot_name(&self, id: SlotId) -> Option<&str> {
        self.slots.get(id.0 as usize).map(String::as_str)
    }

    /// Predecessor count for every block, in block order.
    pub fn predecessor_counts(&self) -> Vec<usize> {
        let mut counts = vec![0; self.blocks.len()];
        for block in &self.blocks {
            if let Some(term) = &block.terminator {
                for succ in term.successors() {
                    if let Some(count) = counts.get_mut(succ.0 as usize) {
                        *count += 1;
                    }
                }
            }
        }
        counts
    }

    /// Find a block label not used yet in this function.
    pub(crate) fn unique_label(&self, base: &str) -> String {
        if !self.blocks.iter().any(|b| b.label == base) {
            return base.to_string();
        }
        let mut n = 1;
        loop {
            let candidate = format!("{base}{n}");
            if !self.blocks.iter().any(|b| b.label == candidate) {
                return candidate;
            }
            n += 1;
        }
    }
}

/// A compiled IR module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    pub name: String,
    pub version: u16,
    pub functions: Vec<Function>,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Module {
            name: name.into(),
            version: VERSION,
            functions: Vec::new(),
        }
    }

    pub fn function(&self, id: FuncId) -> Option<&Function> {
        self.functions.get(id.0 as usize)
    }

    pub fn function_by_name(&self, name: &str) -> Option<(FuncId, &Function)> {
        self.functions
            .iter()
            .enumerate()
            .find(|(_, f)| f.name == name)
            .map(|(i, f)| (FuncId(i as u32), f))
    }

    /// Add a function and return its index.
    pub fn add_function(&mut self, func: Function) -> FuncId {
        let idx = self.functions.len() as u32;
        self.functions.push(func);
        FuncId(idx)
    }

    /// Serialize to JSON (portable text format).
    pub fn to_json(&self) -> Result<String, IrError> {
        serde_json::to_string_pretty(self).map_err(|e| IrError::Serialization(e.to_string()))
    }

    /// Deserialize from JSON.
    pub fn from_json(json: &str) -> Result<Self, IrError> {
        serde_json::from_str(json).map_err(|e| IrError::Serialization(e.to_string()))
    }

    /// Serialize to the binary container: magic, version, length, JSON payload.
    pub fn to_bytes(&self) -> Result<Vec<u8>, IrError> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&MAGIC);
        buf.extend_from_slice(&self.version.to_le_bytes());
        let json = serde_json::to_vec(self).map_err(|e| IrError::Serialization(e.to_string()))?;
        let len = json.len() as u32;
        buf.extend_from_slice(&len.to_le_bytes());
        buf.extend_from_slice(&json);
        Ok(buf)
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, IrError> {
        if data.len() < 10 {
            return Err(IrError::Truncated);
        }
        if data[0..4] != MAGIC {
            return Err(IrError::InvalidMagic);
        }
        let version = u16::from_le_bytes([data[4], data[5]]);
        if version != VERSION {
            return Err(IrError::UnsupportedVersion(version));
        }
        let len = u32::from_le_bytes([data[6], data[7], data[8], data[9]]) as usize;
        if data.len() < 10 + len {
            return Err(IrError::Truncated);
        }
        serde_json::from_slice(&data[10..10 + len]).map_err(|e| IrError::Serialization(e.to_string()))
    }
}
