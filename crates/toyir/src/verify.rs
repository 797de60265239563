use std::collections::HashSet;

use crate::inst::{Inst, Operand, Terminator, ValueId};
use crate::module::{Function, IrError, Module};

impl Module {
    pub fn verify(&self) -> Result<(), IrError> {
        verify(self)
    }
}

/// Structural checks a backend relies on before running or lowering a module.
pub fn verify(module: &Module) -> Result<(), IrError> {
    for func in &module.functions {
        verify_function(module, func).map_err(|msg| IrError::Verify {
            function: func.name.clone(),
            msg,
        })?;
    }
    Ok(())
}

fn verify_function(module: &Module, func: &Function) -> Result<(), String> {
    if func.external {
        if !func.blocks.is_empty() {
            return Err("external function has a body".into());
        }
        return Ok(());
    }
    if func.blocks.is_empty() {
        return Err("function has no entry block".into());
    }

    let mut defined = HashSet::new();
    for block in &func.blocks {
        for inst in &block.insts {
            if let Some(dest) = inst.dest() {
                if !defined.insert(dest) {
                    return Err(format!("value %{} defined twice", dest.0));
                }
            }
        }
    }

    for (idx, block) in func.blocks.iter().enumerate() {
        let label = &block.label;
        for inst in &block.insts {
            if let Some(slot) = inst.slot() {
                if func.slot_name(slot).is_none() {
                    return Err(format!("block `{label}` uses unknown slot #{}", slot.0));
                }
            }
            if matches!(inst, Inst::Alloca { .. }) && idx != 0 {
                return Err(format!("alloca outside the entry block in `{label}`"));
            }
            for operand in inst.operands() {
                check_operand(&defined, operand, label)?;
            }
            if let Inst::Call { dest, callee, args } = inst {
                let target = module
                    .function(*callee)
                    .ok_or_else(|| format!("call to unknown function #{}", callee.0))?;
                if args.len() != target.signature.params as usize {
                    return Err(format!(
                        "call to `{}` passes {} arguments, expected {}",
                        target.name,
                        args.len(),
                        target.signature.params
                    ));
                }
                if dest.is_some() != target.signature.returns_value {
                    return Err(format!("call to `{}` does not match its return type", target.name));
                }
            }
        }

        let term = block
            .terminator
            .as_ref()
            .ok_or_else(|| format!("block `{label}` has no terminator"))?;
        for succ in term.successors() {
            if func.block(succ).is_none() {
                return Err(format!("block `{label}` branches to unknown block #{}", succ.0));
            }
        }
        if let Terminator::CondBr { cond, .. } = term {
            check_operand(&defined, *cond, label)?;
        }
    }
    Ok(())
}

fn check_operand(defined: &HashSet<ValueId>, operand: Operand, label: &str) -> Result<(), String> {
    match operand {
        Operand::Value(v) if !defined.contains(&v) => {
            Err(format!("block `{label}` uses undefined value %{}", v.0))
        }
        _ => Ok(()),
    }
}
