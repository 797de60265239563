use std::fmt;

use crate::inst::{BlockId, FuncId, Inst, Operand, SlotId, Terminator};
use crate::module::{Function, Module};

struct FnCtx<'a> {
    module: &'a Module,
    func: &'a Function,
}

impl FnCtx<'_> {
    fn operand(&self, op: &Operand) -> String {
        match op {
            Operand::Const(v) => v.to_string(),
            Operand::Value(v) => format!("%{}", v.0),
        }
    }

    fn slot(&self, slot: SlotId) -> String {
        match self.func.slot_name(slot) {
            Some(name) => format!("%{name}.addr"),
            None => format!("%slot{}.addr", slot.0),
        }
    }

    fn label(&self, block: BlockId) -> String {
        match self.func.block(block) {
            Some(b) => format!("%{}", b.label),
            None => format!("%bb{}", block.0),
        }
    }

    fn callee(&self, callee: FuncId) -> (&str, bool) {
        match self.module.function(callee) {
            Some(f) => (f.name.as_str(), f.signature.returns_value),
            None => ("<unknown>", false),
        }
    }
}

fn params(n: u8) -> String {
    vec!["i32"; n as usize].join(", ")
}

fn ret_type(returns_value: bool) -> &'static str {
    if returns_value {
        "i32"
    } else {
        "void"
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "; module {}", self.name)?;
        for func in self.functions.iter().filter(|func| func.external) {
            writeln!(
                f,
                "declare {} @{}({})",
                ret_type(func.signature.returns_value),
                func.name,
                params(func.signature.params)
            )?;
        }
        for func in self.functions.iter().filter(|func| !func.external) {
            writeln!(f)?;
            write_function(f, &FnCtx { module: self, func })?;
        }
        Ok(())
    }
}

fn write_function(f: &mut fmt::Formatter<'_>, cx: &FnCtx<'_>) -> fmt::Result {
    let func = cx.func;
    writeln!(
        f,
        "define {} @{}({}) {{",
        ret_type(func.signature.returns_value),
        func.name,
        params(func.signature.params)
    )?;
    for (i, block) in func.blocks.iter().enumerate() {
        if i > 0 {
            writeln!(f)?;
        }
        writeln!(f, "{}:", block.label)?;
        for inst in &block.insts {
            write!(f, "  ")?;
            match inst {
                Inst::Alloca { slot } => writeln!(f, "{} = alloca i32", cx.slot(*slot))?,
                Inst::Load { dest, slot } => {
                    writeln!(f, "%{} = load i32, ptr {}", dest.0, cx.slot(*slot))?
                }
                Inst::Store { slot, value } => writeln!(
                    f,
                    "store i32 {}, ptr {}",
                    cx.operand(value),
                    cx.slot(*slot)
                )?,
                Inst::Binary { dest, op, lhs, rhs } => writeln!(
                    f,
                    "%{} = {} i32 {}, {}",
                    dest.0,
                    op.mnemonic(),
                    cx.operand(lhs),
                    cx.operand(rhs)
                )?,
                Inst::ICmp { dest, pred, lhs, rhs } => writeln!(
                    f,
                    "%{} = icmp {} i32 {}, {}",
                    dest.0,
                    pred.mnemonic(),
                    cx.operand(lhs),
                    cx.operand(rhs)
                )?,
                Inst::Call { dest, callee, args } => {
                    let (name, returns_value) = cx.callee(*callee);
                    let args: Vec<String> = args.iter().map(|a| format!("i32 {}", cx.operand(a))).collect();
                    if let Some(dest) = dest {
                        write!(f, "%{} = ", dest.0)?;
                    }
                    writeln!(f, "call {} @{}({})", ret_type(returns_value), name, args.join(", "))?
                }
            }
        }
        match &block.terminator {
            Some(Terminator::Br(target)) => writeln!(f, "  br label {}", cx.label(*target))?,
            Some(Terminator::CondBr { cond, then_to, else_to }) => writeln!(
                f,
                "  br i1 {}, label {}, label {}",
                cx.operand(cond),
                cx.label(*then_to),
                cx.label(*else_to)
            )?,
            Some(Terminator::RetVoid) => writeln!(f, "  ret void")?,
            None => writeln!(f, "  ; <unterminated>")?,
        }
    }
    writeln!(f, "}}")
}
