use std::collections::HashMap;

use tracing::debug;

use crate::ast::{BinaryOp, CompareOp, Expr, Stmt};
use crate::backend::{Backend, Comparison};
use crate::CompileOptions;

/// Lower a program into `backend` and return what the backend produces.
///
/// Every variable gets a slot in `main`'s entry block before any statement is
/// emitted. Error nodes, and any expression depending on one, emit nothing.
pub fn generate<B: Backend>(backend: B, program: &Stmt, options: &CompileOptions) -> Result<B::Output, B::Error> {
    let mut generator = Generator::new(backend)?;
    generator.declare_variables(program)?;
    generator.emit_stmt(program)?;
    generator.finish(options)
}

struct Generator<B: Backend> {
    backend: B,
    main: B::Function,
    print: B::Function,
    input: B::Function,
    slots: HashMap<String, B::Slot>,
}

impl<B: Backend> Generator<B> {
    fn new(mut backend: B) -> Result<Self, B::Error> {
        let print = backend.declare_function("print", 1, false);
        let input = backend.declare_function("input", 0, true);
        let main = backend.define_function("main", 0, false);
        let entry = backend.append_block(main, "entry")?;
        backend.position_at_end(entry)?;
        Ok(Generator {
            backend,
            main,
            print,
            input,
            slots: HashMap::new(),
        })
    }

    fn declare_variables(&mut self, program: &Stmt) -> Result<(), B::Error> {
        let entry = self.backend.entry_block(self.main)?;
        let vars = program.variables();
        debug!(count = vars.len(), "declaring variables");
        for name in vars {
            let slot = self.backend.create_slot(entry, &name)?;
            self.slots.insert(name, slot);
        }
        Ok(())
    }

    fn finish(mut self, options: &CompileOptions) -> Result<B::Output, B::Error> {
        self.backend.ret_void()?;
        if options.optimize {
            self.backend.run_passes();
        }
        self.backend.finish()
    }

    fn emit_expr(&mut self, expr: &Expr) -> Result<Option<B::Value>, B::Error> {
        match expr {
            Expr::Const(value) => Ok(Some(self.backend.const_int(*value))),
            Expr::Var(name) => match self.slots.get(name) {
                Some(&slot) => self.backend.load(slot).map(Some),
                None => Ok(None),
            },
            Expr::Binary { .. } => {
                let (first, steps) = expr.chain();
                let mut acc = self.emit_expr(first)?;
                for (op, right) in steps {
                    let rhs = self.emit_expr(right)?;
                    acc = match (acc, rhs) {
                        (Some(lhs), Some(rhs)) => Some(match op {
                            BinaryOp::Add => self.backend.add(lhs, rhs)?,
                            BinaryOp::Sub => self.backend.sub(lhs, rhs)?,
                        }),
                        _ => None,
                    };
                }
                Ok(acc)
            }
            Expr::Error { .. } => Ok(None),
        }
    }

    fn emit_stmt(&mut self, stmt: &Stmt) -> Result<(), B::Error> {
        match stmt {
            Stmt::Seq(stmts) => {
                for stmt in stmts {
                    self.emit_stmt(stmt)?;
                }
            }
            Stmt::Assign { name, rhs } => {
                if let (Some(value), Some(&slot)) = (self.emit_expr(rhs)?, self.slots.get(name)) {
                    self.backend.store(slot, value)?;
                }
            }
            Stmt::If {
                compare,
                cond,
                then_branch,
                else_branch,
            } => self.emit_if(*compare, cond, then_branch, else_branch.as_deref())?,
            Stmt::Print(rhs) => {
                if let Some(value) = self.emit_expr(rhs)? {
                    self.backend.call(self.print, &[value])?;
                }
            }
            Stmt::Input(name) => {
                let value = self.backend.call(self.input, &[])?;
                if let (Some(value), Some(&slot)) = (value, self.slots.get(name)) {
                    self.backend.store(slot, value)?;
                }
            }
            Stmt::Error { .. } => {}
        }
        Ok(())
    }

    fn emit_if(
        &mut self,
        compare: CompareOp,
        cond: &Expr,
        then_branch: &Stmt,
        else_branch: Option<&Stmt>,
    ) -> Result<(), B::Error> {
        let Some(value) = self.emit_expr(cond)? else {
            return Ok(());
        };
        let cmp = match compare {
            CompareOp::Negative => Comparison::Less,
            CompareOp::Zero => Comparison::Equal,
            CompareOp::Positive => Comparison::Greater,
        };
        let flag = self.backend.compare_with_zero(cmp, value)?;

        let then_bb = self.backend.append_block(self.main, "then")?;
        let else_bb = self.backend.append_block(self.main, "else")?;
        let merge_bb = self.backend.append_block(self.main, "merge")?;
        self.backend.cond_br(flag, then_bb, else_bb)?;

        self.backend.position_at_end(then_bb)?;
        self.emit_stmt(then_branch)?;
        self.backend.br(merge_bb)?;

        self.backend.position_at_end(else_bb)?;
        if let Some(else_branch) = else_branch {
            self.emit_stmt(else_branch)?;
        }
        self.backend.br(merge_bb)?;

        self.backend.position_at_end(merge_bb)?;
        debug!(compare = compare.keyword(), "emitted if");
        Ok(())
    }
}
