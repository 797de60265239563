//! Function-local simplification passes.
//!
//! These run on unoptimized generator output: explicit slots, one block per
//! control-flow region. Slots are left alone (no promotion to registers).

use std::collections::HashMap;

use tracing::debug;

use crate::inst::{BlockId, Inst, Operand, Terminator, ValueId};
use crate::module::{Block, Function, Module};

/// What the standard pipeline changed, summed over all functions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassStats {
    pub folded_values: usize,
    pub folded_branches: usize,
    pub removed_blocks: usize,
    pub merged_blocks: usize,
}

/// Run the standard pipeline on every function with a body.
pub fn run_standard(module: &mut Module) -> PassStats {
    let mut stats = PassStats::default();
    for func in module.functions.iter_mut().filter(|f| !f.external) {
        stats.folded_values += fold_constants(func);
        stats.folded_branches += fold_branches(func);
        stats.removed_blocks += remove_unreachable(func);
        stats.merged_blocks += merge_blocks(func);
        debug!(function = %func.name, blocks = func.blocks.len(), "simplified");
    }
    stats
}

/// Evaluate `add`/`sub`/`icmp` on literal operands and substitute the result
/// into every use. Returns the number of instructions removed.
pub fn fold_constants(func: &mut Function) -> usize {
    let mut folded: HashMap<ValueId, i32> = HashMap::new();
    loop {
        let mut changed = false;
        for block in &mut func.blocks {
            for inst in &mut block.insts {
                for operand in inst.operands_mut() {
                    substitute(operand, &folded);
                }
                let value = match &*inst {
                    Inst::Binary {
                        dest,
                        op,
                        lhs: Operand::Const(l),
                        rhs: Operand::Const(r),
                    } => Some((*dest, op.apply(*l, *r))),
                    Inst::ICmp {
                        dest,
                        pred,
                        lhs: Operand::Const(l),
                        rhs: Operand::Const(r),
                    } => Some((*dest, pred.apply(*l, *r))),
                    _ => None,
                };
                if let Some((dest, v)) = value {
                    if folded.insert(dest, v).is_none() {
                        changed = true;
                    }
                }
            }
        }
        if !changed {
            break;
        }
    }

    for block in &mut func.blocks {
        if let Some(Terminator::CondBr { cond, .. }) = &mut block.terminator {
            substitute(cond, &folded);
        }
        block
            .insts
            .retain(|inst| !inst.dest().is_some_and(|d| folded.contains_key(&d)));
    }
    folded.len()
}

fn substitute(operand: &mut Operand, folded: &HashMap<ValueId, i32>) {
    if let Operand::Value(v) = operand {
        if let Some(c) = folded.get(v) {
            *operand = Operand::Const(*c);
        }
    }
}

/// Turn conditional branches on a literal into unconditional ones.
pub fn fold_branches(func: &mut Function) -> usize {
    let mut count = 0;
    for block in &mut func.blocks {
        if let Some(Terminator::CondBr {
            cond: Operand::Const(c),
            then_to,
            else_to,
        }) = block.terminator
        {
            let target = if c != 0 { then_to } else { else_to };
            block.terminator = Some(Terminator::Br(target));
            count += 1;
        }
    }
    count
}

/// Drop blocks not reachable from the entry block and renumber the rest.
pub fn remove_unreachable(func: &mut Function) -> usize {
    if func.blocks.is_empty() {
        return 0;
    }
    let mut reachable = vec![false; func.blocks.len()];
    let mut stack = vec![0usize];
    while let Some(idx) = stack.pop() {
        if reachable[idx] {
            continue;
        }
        reachable[idx] = true;
        if let Some(term) = &func.blocks[idx].terminator {
            for succ in term.successors() {
                let succ = succ.0 as usize;
                if succ < reachable.len() && !reachable[succ] {
                    stack.push(succ);
                }
            }
        }
    }

    let mut remap = vec![None; func.blocks.len()];
    let mut next = 0u32;
    for (idx, live) in reachable.iter().enumerate() {
        if *live {
            remap[idx] = Some(BlockId(next));
            next += 1;
        }
    }
    let removed = func.blocks.len() - next as usize;
    if removed == 0 {
        return 0;
    }

    let blocks = std::mem::take(&mut func.blocks);
    func.blocks = blocks
        .into_iter()
        .zip(reachable)
        .filter_map(|(block, live)| live.then_some(block))
        .collect();
    for block in &mut func.blocks {
        if let Some(term) = &mut block.terminator {
            for succ in term.successors_mut() {
                if let Some(Some(new_id)) = remap.get(succ.0 as usize) {
                    *succ = *new_id;
                }
            }
        }
    }
    removed
}

/// Fold a block into its predecessor when that predecessor is its only one
/// and ends in an unconditional branch to it.
pub fn merge_blocks(func: &mut Function) -> usize {
    let mut merged = 0;
    loop {
        let preds = func.predecessor_counts();
        let candidate = func.blocks.iter().enumerate().find_map(|(idx, block)| {
            match block.terminator {
                Some(Terminator::Br(target))
                    if target.0 != 0
                        && target.0 as usize != idx
                        && preds.get(target.0 as usize) == Some(&1) =>
                {
                    Some((idx, target.0 as usize))
                }
                _ => None,
            }
        });
        let Some((pred, succ)) = candidate else {
            break;
        };

        let absorbed = std::mem::replace(&mut func.blocks[succ], Block::new(""));
        let block = &mut func.blocks[pred];
        block.insts.extend(absorbed.insts);
        block.terminator = absorbed.terminator;
        remove_unreachable(func);
        merged += 1;
    }
    merged
}
