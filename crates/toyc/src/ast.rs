use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
}

impl BinaryOp {
    pub fn symbol(self) -> char {
        match self {
            BinaryOp::Add => '+',
            BinaryOp::Sub => '-',
        }
    }
}

/// Sign test in `if <expr> is <compare>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    Negative,
    Zero,
    Positive,
}

impl CompareOp {
    pub fn keyword(self) -> &'static str {
        match self {
            CompareOp::Negative => "negative",
            CompareOp::Zero => "zero",
            CompareOp::Positive => "positive",
        }
    }
}

/// Expressions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Const(i32),
    Var(String),
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// Stands in for a malformed fragment; generates no code.
    Error { message: String, line: usize },
}

/// Statements. A program is a `Seq`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Stmt {
    Seq(Vec<Stmt>),
    Assign {
        name: String,
        rhs: Expr,
    },
    If {
        compare: CompareOp,
        cond: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },
    Print(Expr),
    Input(String),
    /// Marks the program invalid; generates no code.
    Error { message: String, line: usize },
}

impl Expr {
    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Self {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn var(name: &str) -> Self {
        Expr::Var(name.to_string())
    }

    pub fn variables(&self) -> BTreeSet<String> {
        let mut vars = BTreeSet::new();
        self.collect_variables(&mut vars);
        vars
    }

    /// Split a left-nested chain `((a op b) op c) ...` into its leftmost
    /// operand and the `(op, right)` steps applied to it, in source order.
    ///
    /// Chains from the parser can be arbitrarily long, so every walk over an
    /// expression goes through here instead of recursing on `left`.
    pub fn chain(&self) -> (&Expr, Vec<(BinaryOp, &Expr)>) {
        let mut steps = Vec::new();
        let mut current = self;
        while let Expr::Binary { op, left, right } = current {
            steps.push((*op, right.as_ref()));
            current = left.as_ref();
        }
        steps.reverse();
        (current, steps)
    }

    fn collect_variables(&self, vars: &mut BTreeSet<String>) {
        let (first, steps) = self.chain();
        if let Expr::Var(name) = first {
            vars.insert(name.clone());
        }
        for (_, right) in steps {
            right.collect_variables(vars);
        }
    }

    fn collect_errors(&self, errors: &mut Vec<String>) {
        let (first, steps) = self.chain();
        if let Expr::Error { message, line } = first {
            errors.push(format!("line {line}: {message}"));
        }
        for (_, right) in steps {
            right.collect_errors(errors);
        }
    }
}

impl Drop for Expr {
    // Unlink the left spine one node at a time.
    fn drop(&mut self) {
        let mut spine = match self {
            Expr::Binary { left, .. } => std::mem::replace(left.as_mut(), Expr::Const(0)),
            _ => return,
        };
        loop {
            let next = match &mut spine {
                Expr::Binary { left, .. } => std::mem::replace(left.as_mut(), Expr::Const(0)),
                _ => return,
            };
            spine = next;
        }
    }
}

impl Stmt {
    /// Every distinct name the program assigns, reads or inputs.
    pub fn variables(&self) -> BTreeSet<String> {
        let mut vars = BTreeSet::new();
        self.collect_variables(&mut vars);
        vars
    }

    fn collect_variables(&self, vars: &mut BTreeSet<String>) {
        match self {
            Stmt::Seq(stmts) => {
                for stmt in stmts {
                    stmt.collect_variables(vars);
                }
            }
            Stmt::Assign { name, rhs } => {
                rhs.collect_variables(vars);
                vars.insert(name.clone());
            }
            Stmt::If {
                cond,
                then_branch,
                else_branch,
                ..
            } => {
                cond.collect_variables(vars);
                then_branch.collect_variables(vars);
                if let Some(else_branch) = else_branch {
                    else_branch.collect_variables(vars);
                }
            }
            Stmt::Print(rhs) => rhs.collect_variables(vars),
            Stmt::Input(name) => {
                vars.insert(name.clone());
            }
            Stmt::Error { .. } => {}
        }
    }

    /// Error messages of every error node, in source order, prefixed with
    /// their line.
    pub fn errors(&self) -> Vec<String> {
        let mut errors = Vec::new();
        self.collect_errors(&mut errors);
        errors
    }

    fn collect_errors(&self, errors: &mut Vec<String>) {
        match self {
            Stmt::Seq(stmts) => {
                for stmt in stmts {
                    stmt.collect_errors(errors);
                }
            }
            Stmt::Assign { rhs, .. } | Stmt::Print(rhs) => rhs.collect_errors(errors),
            Stmt::If {
                cond,
                then_branch,
                else_branch,
                ..
            } => {
                cond.collect_errors(errors);
                then_branch.collect_errors(errors);
                if let Some(else_branch) = else_branch {
                    else_branch.collect_errors(errors);
                }
            }
            Stmt::Input(_) => {}
            Stmt::Error { message, line } => errors.push(format!("line {line}: {message}")),
        }
    }

    /// True when no error node occurs anywhere in the tree.
    pub fn is_valid(&self) -> bool {
        self.errors().is_empty()
    }

    fn fmt_indented(&self, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
        let pad = "  ".repeat(indent);
        match self {
            Stmt::Seq(stmts) => {
                writeln!(f, "{pad}Seq")?;
                for stmt in stmts {
                    stmt.fmt_indented(f, indent + 1)?;
                }
                Ok(())
            }
            Stmt::Assign { name, rhs } => writeln!(f, "{pad}Assign {name} = {rhs}"),
            Stmt::If {
                compare,
                cond,
                then_branch,
                else_branch,
            } => {
                writeln!(f, "{pad}If {cond} is {}", compare.keyword())?;
                writeln!(f, "{pad}  Then")?;
                then_branch.fmt_indented(f, indent + 2)?;
                if let Some(else_branch) = else_branch {
                    writeln!(f, "{pad}  Else")?;
                    else_branch.fmt_indented(f, indent + 2)?;
                }
                Ok(())
            }
            Stmt::Print(rhs) => writeln!(f, "{pad}Print {rhs}"),
            Stmt::Input(name) => writeln!(f, "{pad}Input {name}"),
            Stmt::Error { message, line } => writeln!(f, "{pad}Error at line {line}: {message}"),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Const(v) => write!(f, "{v}"),
            Expr::Var(name) => write!(f, "{name}"),
            Expr::Binary { .. } => {
                let (first, steps) = self.chain();
                write!(f, "{first}")?;
                for (op, right) in steps {
                    write!(f, " {} {right}", op.symbol())?;
                }
                Ok(())
            }
            Expr::Error { message, line } => write!(f, "<error at line {line}: {message}>"),
        }
    }
}

/// Indented tree listing, one statement per line.
impl fmt::Display for Stmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_indented(f, 0)
    }
}
