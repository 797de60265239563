use tracing::debug;

use crate::ast::{BinaryOp, CompareOp, Expr, Stmt};
use crate::lexer::{Lexer, Token, TokenKind};

/// Deepest `if` nesting the parser descends into. A deeper `if` is skipped up
/// to its matching `end` and reported as an error node.
pub const MAX_IF_DEPTH: usize = 200;

/// Result of a parse: the tree is always produced, even for malformed input.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedProgram {
    pub root: Stmt,
    pub is_valid: bool,
}

pub fn parse(source: &str) -> ParsedProgram {
    Parser::new(source).parse()
}

/// Recursive-descent parser with one token of lookahead.
///
/// Syntax errors never abort the parse. They are recorded as error nodes in
/// the tree and clear the validity flag.
pub struct Parser<'src> {
    lexer: Lexer<'src>,
    current: Token,
    is_valid: bool,
    depth: usize,
}

impl<'src> Parser<'src> {
    pub fn new(source: &'src str) -> Self {
        let mut lexer = Lexer::new(source);
        let current = lexer.next_token();
        Parser {
            lexer,
            current,
            is_valid: true,
            depth: 0,
        }
    }

    pub fn parse(mut self) -> ParsedProgram {
        let seq = self.parse_seq();
        let root = if self.current.kind == TokenKind::Eof {
            seq
        } else {
            let error = self.stmt_error("End of file");
            Stmt::Seq(vec![seq, error])
        };
        debug!(valid = self.is_valid, "parsed program");
        ParsedProgram {
            root,
            is_valid: self.is_valid,
        }
    }

    fn advance(&mut self) {
        self.current = self.lexer.next_token();
    }

    fn skip_newlines(&mut self) {
        while self.current.kind == TokenKind::Newline {
            self.advance();
        }
    }

    fn expected(&self, what: &str, found: &TokenKind) -> String {
        format!("{what} expected, but {} found", found.describe())
    }

    fn stmt_error(&mut self, what: &str) -> Stmt {
        let message = self.expected(what, &self.current.kind);
        self.error_at(message, self.current.line)
    }

    fn error_at(&mut self, message: String, line: usize) -> Stmt {
        self.is_valid = false;
        Stmt::Error { message, line }
    }

    fn expr_error(&mut self) -> Expr {
        self.is_valid = false;
        Expr::Error {
            message: self.expected("Constant or variable", &self.current.kind),
            line: self.current.line,
        }
    }

    fn starts_stmt(&self) -> bool {
        matches!(
            self.current.kind,
            TokenKind::Ident(_) | TokenKind::If | TokenKind::Input | TokenKind::Print
        )
    }

    fn parse_seq(&mut self) -> Stmt {
        let mut stmts = Vec::new();
        loop {
            self.skip_newlines();
            if !self.starts_stmt() {
                return Stmt::Seq(stmts);
            }
            stmts.push(self.parse_stmt());
        }
    }

    pub(crate) fn parse_stmt(&mut self) -> Stmt {
        match self.current.kind.clone() {
            TokenKind::Ident(name) => {
                self.advance();
                if self.current.kind == TokenKind::Char('=') {
                    self.advance();
                    let rhs = self.parse_expr();
                    Stmt::Assign { name, rhs }
                } else {
                    self.skip_line();
                    self.stmt_error("'='")
                }
            }
            TokenKind::If => self.parse_if(),
            TokenKind::Input => {
                self.advance();
                self.skip_newlines();
                match self.current.kind.clone() {
                    TokenKind::Ident(name) => {
                        self.advance();
                        Stmt::Input(name)
                    }
                    _ => self.stmt_error("Identifier"),
                }
            }
            TokenKind::Print => {
                self.advance();
                self.skip_newlines();
                Stmt::Print(self.parse_expr())
            }
            // Unreachable through parse_seq, kept so parse_stmt is total.
            found => {
                let line = self.current.line;
                self.advance();
                let message = self.expected("Assignment, if, input or print", &found);
                self.error_at(message, line)
            }
        }
    }

    fn parse_if(&mut self) -> Stmt {
        if self.depth >= MAX_IF_DEPTH {
            return self.skip_nested_if();
        }
        self.depth += 1;
        let stmt = self.parse_if_body();
        self.depth -= 1;
        stmt
    }

    /// Drop an `if` together with everything up to its matching `end`.
    fn skip_nested_if(&mut self) -> Stmt {
        let line = self.current.line;
        let mut open = 0usize;
        loop {
            match self.current.kind {
                TokenKind::If => open += 1,
                TokenKind::End => {
                    open = open.saturating_sub(1);
                    if open == 0 {
                        self.advance();
                        break;
                    }
                }
                TokenKind::Eof => break,
                _ => {}
            }
            self.advance();
        }
        self.error_at(format!("'if' nested deeper than {MAX_IF_DEPTH} levels"), line)
    }

    fn parse_if_body(&mut self) -> Stmt {
        self.advance();
        self.skip_newlines();
        let cond = self.parse_expr();
        self.skip_newlines();
        if self.current.kind != TokenKind::Is {
            return self.recover_if("'is'");
        }
        self.advance();
        self.skip_newlines();
        let compare = match self.current.kind {
            TokenKind::Negative => CompareOp::Negative,
            TokenKind::Zero => CompareOp::Zero,
            TokenKind::Positive => CompareOp::Positive,
            _ => return self.recover_if("'negative', 'zero' or 'positive'"),
        };
        self.advance();

        let then_branch = Box::new(self.parse_seq());
        let else_branch = if self.current.kind == TokenKind::Else {
            self.advance();
            Some(Box::new(self.parse_seq()))
        } else {
            None
        };
        if self.current.kind != TokenKind::End {
            return self.stmt_error("'end' or 'else'");
        }
        self.advance();
        Stmt::If {
            compare,
            cond,
            then_branch,
            else_branch,
        }
    }

    /// Report the current token, then drop everything up to and including
    /// the next `end`.
    fn recover_if(&mut self, what: &str) -> Stmt {
        let message = self.expected(what, &self.current.kind);
        let line = self.current.line;
        while !matches!(self.current.kind, TokenKind::Eof | TokenKind::End) {
            self.advance();
        }
        if self.current.kind == TokenKind::End {
            self.advance();
        }
        self.error_at(message, line)
    }

    fn skip_line(&mut self) {
        while !matches!(self.current.kind, TokenKind::Eof | TokenKind::Newline) {
            self.advance();
        }
    }

    fn parse_operand(&mut self) -> Option<Expr> {
        let operand = match &self.current.kind {
            TokenKind::Const(value) => Expr::Const(*value),
            TokenKind::Ident(name) => Expr::Var(name.clone()),
            _ => return None,
        };
        self.advance();
        self.skip_newlines();
        Some(operand)
    }

    fn parse_expr(&mut self) -> Expr {
        let Some(mut expr) = self.parse_operand() else {
            return self.expr_error();
        };
        loop {
            let op = match self.current.kind {
                TokenKind::Char('+') => BinaryOp::Add,
                TokenKind::Char('-') => BinaryOp::Sub,
                _ => return expr,
            };
            self.advance();
            self.skip_newlines();
            match self.parse_operand() {
                Some(right) => expr = Expr::binary(op, expr, right),
                None => {
                    let right = self.expr_error();
                    return Expr::binary(op, expr, right);
                }
            }
        }
    }
}
