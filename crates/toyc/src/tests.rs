#[cfg(test)]
mod tests {
    use std::fmt;

    use toy_ir::{FuncId, Inst, Operand, SlotId, Terminator, ValueId};

    use crate::ast::*;
    use crate::backend::{Backend, Comparison};
    use crate::codegen;
    use crate::lexer::{self, TokenKind};
    use crate::parser::{parse, Parser, MAX_IF_DEPTH};
    use crate::{compile, compile_with, CompileError, CompileOptions};

    fn kinds(source: &str) -> Vec<TokenKind> {
        lexer::lex(source).into_iter().map(|t| t.kind).collect()
    }

    fn expr_error(message: &str, line: usize) -> Expr {
        Expr::Error {
            message: message.into(),
            line,
        }
    }

    fn stmt_error(message: &str, line: usize) -> Stmt {
        Stmt::Error {
            message: message.into(),
            line,
        }
    }

    // --- Lexer Tests ---

    #[test]
    fn test_lex_assignment_and_newline_run() {
        let tokens = lexer::lex("x = 1\n\n\nprint x");
        let kinds: Vec<_> = tokens.iter().map(|t| t.kind.clone()).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Ident("x".into()),
                TokenKind::Char('='),
                TokenKind::Const(1),
                TokenKind::Newline,
                TokenKind::Print,
                TokenKind::Ident("x".into()),
                TokenKind::Eof,
            ]
        );
        assert_eq!(tokens[4].line, 4);
    }

    #[test]
    fn test_lex_keywords_need_whole_word() {
        assert_eq!(
            kinds("iffy if end9 zero"),
            vec![
                TokenKind::Ident("iffy".into()),
                TokenKind::If,
                TokenKind::Ident("end9".into()),
                TokenKind::Zero,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_lex_constant_wraps() {
        assert_eq!(kinds("4294967297"), vec![TokenKind::Const(1), TokenKind::Eof]);
        assert_eq!(kinds("2147483648"), vec![TokenKind::Const(i32::MIN), TokenKind::Eof]);
    }

    #[test]
    fn test_lex_raw_characters() {
        assert_eq!(
            kinds("a+b-@"),
            vec![
                TokenKind::Ident("a".into()),
                TokenKind::Char('+'),
                TokenKind::Ident("b".into()),
                TokenKind::Char('-'),
                TokenKind::Char('@'),
                TokenKind::Eof,
            ]
        );
        assert_eq!(kinds("é"), vec![TokenKind::Char('é'), TokenKind::Eof]);
    }

    #[test]
    fn test_lex_crlf_counts_lines() {
        let tokens = lexer::lex("\r\n\r\nx");
        assert_eq!(tokens[0].kind, TokenKind::Newline);
        assert_eq!(tokens[1].line, 3);
    }

    #[test]
    fn test_lexer_keeps_returning_eof() {
        let mut lexer = lexer::Lexer::new("x");
        assert_eq!(lexer.next_token().kind, TokenKind::Ident("x".into()));
        for _ in 0..3 {
            assert_eq!(lexer.next_token().kind, TokenKind::Eof);
        }
    }

    #[test]
    fn test_token_descriptions() {
        assert_eq!(TokenKind::Eof.describe(), "end of file");
        assert_eq!(TokenKind::Const(3).describe(), "integer constant");
        assert_eq!(TokenKind::Positive.describe(), "'positive'");
        assert_eq!(TokenKind::Char(')').describe(), "\")\"");
    }

    // --- Parser Tests ---

    #[test]
    fn test_parse_assign_and_print() {
        let parsed = parse("x = 1\nprint x\n");
        assert!(parsed.is_valid);
        assert_eq!(
            parsed.root,
            Stmt::Seq(vec![
                Stmt::Assign {
                    name: "x".into(),
                    rhs: Expr::Const(1),
                },
                Stmt::Print(Expr::var("x")),
            ])
        );
    }

    #[test]
    fn test_parse_binary_is_left_associative() {
        let parsed = parse("x = 1 + 2 - 3\nprint x\n");
        let Stmt::Seq(stmts) = &parsed.root else {
            panic!("expected sequence");
        };
        assert_eq!(
            stmts[0],
            Stmt::Assign {
                name: "x".into(),
                rhs: Expr::binary(
                    BinaryOp::Sub,
                    Expr::binary(BinaryOp::Add, Expr::Const(1), Expr::Const(2)),
                    Expr::Const(3),
                ),
            }
        );
    }

    #[test]
    fn test_parse_expression_across_lines() {
        let parsed = parse("x = a +\n  b\n  - 1\n");
        assert!(parsed.is_valid);
        assert_eq!(
            parsed.root,
            Stmt::Seq(vec![Stmt::Assign {
                name: "x".into(),
                rhs: Expr::binary(
                    BinaryOp::Sub,
                    Expr::binary(BinaryOp::Add, Expr::var("a"), Expr::var("b")),
                    Expr::Const(1),
                ),
            }])
        );
    }

    #[test]
    fn test_parse_if_without_else() {
        let parsed = parse("x = 0\nif x is zero\nprint x\nend\n");
        assert!(parsed.is_valid);
        let Stmt::Seq(stmts) = &parsed.root else {
            panic!("expected sequence");
        };
        assert_eq!(
            stmts[1],
            Stmt::If {
                compare: CompareOp::Zero,
                cond: Expr::var("x"),
                then_branch: Box::new(Stmt::Seq(vec![Stmt::Print(Expr::var("x"))])),
                else_branch: None,
            }
        );
    }

    #[test]
    fn test_parse_if_else_on_one_line() {
        let parsed = parse("if x is negative print x else print 0 end\n");
        assert!(parsed.is_valid);
        assert_eq!(
            parsed.root,
            Stmt::Seq(vec![Stmt::If {
                compare: CompareOp::Negative,
                cond: Expr::var("x"),
                then_branch: Box::new(Stmt::Seq(vec![Stmt::Print(Expr::var("x"))])),
                else_branch: Some(Box::new(Stmt::Seq(vec![Stmt::Print(Expr::Const(0))]))),
            }])
        );
    }

    #[test]
    fn test_parse_if_header_split_over_lines() {
        let parsed = parse("if\nx\nis\npositive\nprint 1\nend\n");
        assert!(parsed.is_valid);
    }

    #[test]
    fn test_parse_input() {
        let parsed = parse("input x\nprint x\n");
        assert!(parsed.is_valid);
        assert_eq!(
            parsed.root,
            Stmt::Seq(vec![Stmt::Input("x".into()), Stmt::Print(Expr::var("x"))])
        );
    }

    #[test]
    fn test_parse_missing_rhs() {
        let parsed = parse("x = \n");
        assert!(!parsed.is_valid);
        assert_eq!(
            parsed.root,
            Stmt::Seq(vec![Stmt::Assign {
                name: "x".into(),
                rhs: expr_error("Constant or variable expected, but newline found", 1),
            }])
        );
    }

    #[test]
    fn test_parse_missing_equals_skips_line() {
        let parsed = parse("x 5 6\nprint x\n");
        assert!(!parsed.is_valid);
        assert_eq!(
            parsed.root,
            Stmt::Seq(vec![
                stmt_error("'=' expected, but newline found", 1),
                Stmt::Print(Expr::var("x")),
            ])
        );
    }

    #[test]
    fn test_parse_missing_is_skips_past_end() {
        let parsed = parse("if x zero print x end\nprint 1\n");
        assert!(!parsed.is_valid);
        assert_eq!(
            parsed.root,
            Stmt::Seq(vec![
                stmt_error("'is' expected, but 'zero' found", 1),
                Stmt::Print(Expr::Const(1)),
            ])
        );
    }

    #[test]
    fn test_parse_missing_comparison() {
        let parsed = parse("if x is big\nprint x\nend\n");
        assert_eq!(
            parsed.root,
            Stmt::Seq(vec![stmt_error(
                "'negative', 'zero' or 'positive' expected, but identifier found",
                1
            )])
        );
    }

    #[test]
    fn test_parse_missing_end() {
        let parsed = parse("if x is zero\nprint x\n");
        assert!(!parsed.is_valid);
        assert_eq!(
            parsed.root,
            Stmt::Seq(vec![stmt_error("'end' or 'else' expected, but end of file found", 3)])
        );
    }

    #[test]
    fn test_parse_input_without_identifier() {
        let parsed = parse("input 5\n");
        assert!(!parsed.is_valid);
        assert_eq!(
            parsed.root,
            Stmt::Seq(vec![
                Stmt::Seq(vec![stmt_error("Identifier expected, but integer constant found", 1)]),
                stmt_error("End of file expected, but integer constant found", 1),
            ])
        );
    }

    #[test]
    fn test_parse_missing_operand_after_operator() {
        let parsed = parse("print 1 +\n");
        assert!(!parsed.is_valid);
        assert_eq!(
            parsed.root,
            Stmt::Seq(vec![Stmt::Print(Expr::binary(
                BinaryOp::Add,
                Expr::Const(1),
                expr_error("Constant or variable expected, but end of file found", 2),
            ))])
        );
    }

    #[test]
    fn test_parse_trailing_garbage() {
        let parsed = parse("x = 1\n)\n");
        assert!(!parsed.is_valid);
        assert_eq!(
            parsed.root,
            Stmt::Seq(vec![
                Stmt::Seq(vec![Stmt::Assign {
                    name: "x".into(),
                    rhs: Expr::Const(1),
                }]),
                stmt_error("End of file expected, but \")\" found", 2),
            ])
        );
    }

    #[test]
    fn test_parse_stmt_consumes_unexpected_token() {
        let mut parser = Parser::new(")");
        assert_eq!(
            parser.parse_stmt(),
            stmt_error("Assignment, if, input or print expected, but \")\" found", 1)
        );
        // The ")" is gone, so the rest of the parse sees only end of file.
        let rest = parser.parse();
        assert!(!rest.is_valid);
        assert_eq!(rest.root, Stmt::Seq(vec![]));
    }

    fn nested_ifs(depth: usize) -> String {
        let mut source = "if x is zero\n".repeat(depth);
        source.push_str("print x\n");
        source.push_str(&"end\n".repeat(depth));
        source
    }

    #[test]
    fn test_parse_if_nesting_within_limit() {
        let parsed = parse(&nested_ifs(MAX_IF_DEPTH));
        assert!(parsed.is_valid);
        assert!(compile("test", &nested_ifs(150)).is_ok());
    }

    #[test]
    fn test_parse_if_nested_too_deep() {
        let parsed = parse(&nested_ifs(3000));
        assert!(!parsed.is_valid);
        assert_eq!(
            parsed.root.errors(),
            vec![format!("line {}: 'if' nested deeper than {MAX_IF_DEPTH} levels", MAX_IF_DEPTH + 1)]
        );
        assert!(matches!(
            compile("test", &nested_ifs(3000)),
            Err(CompileError::Syntax { .. })
        ));
    }

    #[test]
    fn test_parse_resumes_after_too_deep_if() {
        let mut source = nested_ifs(MAX_IF_DEPTH + 1);
        source.push_str("print 7\n");
        let parsed = parse(&source);
        assert_eq!(parsed.root.errors().len(), 1);
        let Stmt::Seq(stmts) = &parsed.root else {
            panic!("expected a sequence");
        };
        assert_eq!(stmts.len(), 2);
        assert_eq!(stmts[1], Stmt::Print(Expr::Const(7)));
    }

    #[test]
    fn test_parse_empty_program() {
        let parsed = parse("\n\n");
        assert!(parsed.is_valid);
        assert_eq!(parsed.root, Stmt::Seq(vec![]));
    }

    #[test]
    fn test_validity_flag_matches_tree() {
        let sources = [
            "x = 1\n",
            "x =\n",
            "if x is zero print x end",
            "if x is print x end",
            "input\n",
            "print 1 - - 2\n",
            "= = =",
            "if a is zero if b is zero print 1 end end",
            "if a is zero if b is zero print 1 end",
        ];
        for source in sources {
            let parsed = parse(source);
            assert_eq!(parsed.is_valid, parsed.root.is_valid(), "source: {source:?}");
        }
    }

    // --- AST Tests ---

    #[test]
    fn test_variables_union() {
        let parsed = parse("a = b + c\ninput d\nif e is zero print f else print a end\n");
        let vars: Vec<_> = parsed.root.variables().into_iter().collect();
        assert_eq!(vars, vec!["a", "b", "c", "d", "e", "f"]);
    }

    #[test]
    fn test_variables_skip_error_nodes() {
        let parsed = parse("x = y +\ninput 3\n");
        let vars: Vec<_> = parsed.root.variables().into_iter().collect();
        assert_eq!(vars, vec!["x", "y"]);
    }

    #[test]
    fn test_format_tree() {
        let parsed = parse("x = 1 + y\nif x is zero\nprint x\nelse\ninput y\nend\n");
        assert_eq!(
            parsed.root.to_string(),
            "Seq\n\
             \x20 Assign x = 1 + y\n\
             \x20 If x is zero\n\
             \x20   Then\n\
             \x20     Seq\n\
             \x20       Print x\n\
             \x20   Else\n\
             \x20     Seq\n\
             \x20       Input y\n"
        );
    }

    #[test]
    fn test_format_shows_errors_with_lines() {
        let parsed = parse("x = 1\ny = \n");
        let listing = parsed.root.to_string();
        assert!(listing.contains("Assign y = <error at line 2: Constant or variable expected, but newline found>"));
        assert_eq!(
            parsed.root.errors(),
            vec!["line 2: Constant or variable expected, but newline found".to_string()]
        );
    }

    fn long_sum(terms: usize) -> String {
        format!("x = 1{}\nprint x\n", " + 1".repeat(terms - 1))
    }

    #[test]
    fn test_long_chain_walks_without_recursion() {
        let parsed = parse(&long_sum(100_000));
        assert!(parsed.is_valid);
        let vars: Vec<_> = parsed.root.variables().into_iter().collect();
        assert_eq!(vars, vec!["x"]);
        assert!(parsed.root.errors().is_empty());
        let listing = parsed.root.to_string();
        assert!(listing.starts_with("Seq\n  Assign x = 1 + 1 + 1"));
        assert!(listing.ends_with(" + 1\n  Print x\n"));
    }

    #[test]
    fn test_long_chain_with_error_at_the_end() {
        let source = format!("x = y{}\n", " - 1".repeat(100_000)) + "+\n";
        let parsed = parse(&source);
        assert!(!parsed.is_valid);
        assert_eq!(parsed.root.errors().len(), 1);
        let vars: Vec<_> = parsed.root.variables().into_iter().collect();
        assert_eq!(vars, vec!["x", "y"]);
    }

    #[test]
    fn test_compile_long_chain() {
        let source = long_sum(100_000);
        assert!(compile("test", &source).is_ok());
        assert!(compile_with("test", &source, &NO_OPT).is_ok());
    }

    #[test]
    fn test_ast_serializes() {
        let parsed = parse("print 1 + x\n");
        let json = serde_json::to_string(&parsed.root).unwrap();
        let back: Stmt = serde_json::from_str(&json).unwrap();
        assert_eq!(back, parsed.root);
        assert!(json.contains("\"Print\""));
    }

    // --- Codegen Tests ---

    /// Backend that logs every call as a line of text.
    #[derive(Default)]
    struct Recorder {
        log: Vec<String>,
        functions: Vec<(String, bool)>,
        blocks: Vec<String>,
        slots: Vec<String>,
        next_reg: u32,
    }

    #[derive(Debug, Clone, Copy)]
    enum Val {
        Const(i32),
        Reg(u32),
    }

    impl fmt::Display for Val {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                Val::Const(v) => write!(f, "{v}"),
                Val::Reg(r) => write!(f, "%{r}"),
            }
        }
    }

    impl Recorder {
        fn reg(&mut self, text: String) -> Val {
            let reg = self.next_reg;
            self.next_reg += 1;
            self.log.push(format!("%{reg} = {text}"));
            Val::Reg(reg)
        }
    }

    impl Backend for Recorder {
        type Value = Val;
        type Block = usize;
        type Function = usize;
        type Slot = usize;
        type Output = Vec<String>;
        type Error = fmt::Error;

        fn declare_function(&mut self, name: &str, _params: u8, returns_value: bool) -> usize {
            self.log.push(format!("declare {name}"));
            self.functions.push((name.to_string(), returns_value));
            self.functions.len() - 1
        }

        fn define_function(&mut self, name: &str, _params: u8, returns_value: bool) -> usize {
            self.log.push(format!("define {name}"));
            self.functions.push((name.to_string(), returns_value));
            self.functions.len() - 1
        }

        fn append_block(&mut self, _function: usize, label: &str) -> Result<usize, fmt::Error> {
            self.log.push(format!("block {label}"));
            self.blocks.push(label.to_string());
            Ok(self.blocks.len() - 1)
        }

        fn entry_block(&self, _function: usize) -> Result<usize, fmt::Error> {
            Ok(0)
        }

        fn position_at_end(&mut self, block: usize) -> Result<(), fmt::Error> {
            self.log.push(format!("at {}", self.blocks[block]));
            Ok(())
        }

        fn create_slot(&mut self, _block: usize, name: &str) -> Result<usize, fmt::Error> {
            self.log.push(format!("slot {name}"));
            self.slots.push(name.to_string());
            Ok(self.slots.len() - 1)
        }

        fn const_int(&self, value: i32) -> Val {
            Val::Const(value)
        }

        fn load(&mut self, slot: usize) -> Result<Val, fmt::Error> {
            let text = format!("load {}", self.slots[slot]);
            Ok(self.reg(text))
        }

        fn store(&mut self, slot: usize, value: Val) -> Result<(), fmt::Error> {
            self.log.push(format!("store {}, {value}", self.slots[slot]));
            Ok(())
        }

        fn add(&mut self, lhs: Val, rhs: Val) -> Result<Val, fmt::Error> {
            Ok(self.reg(format!("add {lhs}, {rhs}")))
        }

        fn sub(&mut self, lhs: Val, rhs: Val) -> Result<Val, fmt::Error> {
            Ok(self.reg(format!("sub {lhs}, {rhs}")))
        }

        fn compare_with_zero(&mut self, cmp: Comparison, value: Val) -> Result<Val, fmt::Error> {
            Ok(self.reg(format!("cmp {cmp:?} {value}")))
        }

        fn cond_br(&mut self, cond: Val, then_to: usize, else_to: usize) -> Result<(), fmt::Error> {
            self.log
                .push(format!("condbr {cond}, {}, {}", self.blocks[then_to], self.blocks[else_to]));
            Ok(())
        }

        fn br(&mut self, target: usize) -> Result<(), fmt::Error> {
            self.log.push(format!("br {}", self.blocks[target]));
            Ok(())
        }

        fn call(&mut self, function: usize, args: &[Val]) -> Result<Option<Val>, fmt::Error> {
            let (name, returns_value) = self.functions[function].clone();
            let args: Vec<_> = args.iter().map(Val::to_string).collect();
            let text = format!("call {name}({})", args.join(", "));
            if returns_value {
                Ok(Some(self.reg(text)))
            } else {
                self.log.push(text);
                Ok(None)
            }
        }

        fn ret_void(&mut self) -> Result<(), fmt::Error> {
            self.log.push("ret".into());
            Ok(())
        }

        fn run_passes(&mut self) {
            self.log.push("passes".into());
        }

        fn finish(self) -> Result<Vec<String>, fmt::Error> {
            Ok(self.log)
        }
    }

    const NO_OPT: CompileOptions = CompileOptions { optimize: false };

    fn record(source: &str, options: &CompileOptions) -> Vec<String> {
        let parsed = parse(source);
        codegen::generate(Recorder::default(), &parsed.root, options).unwrap()
    }

    #[test]
    fn test_generate_assign_and_print() {
        assert_eq!(
            record("x = 1\nprint x\n", &NO_OPT),
            vec![
                "declare print",
                "declare input",
                "define main",
                "block entry",
                "at entry",
                "slot x",
                "store x, 1",
                "%0 = load x",
                "call print(%0)",
                "ret",
            ]
        );
    }

    #[test]
    fn test_generate_slots_in_sorted_order_before_code() {
        let log = record("zed = 1\nalpha = zed\nmid = alpha\n", &NO_OPT);
        assert_eq!(&log[5..8], &["slot alpha", "slot mid", "slot zed"]);
    }

    #[test]
    fn test_generate_input() {
        let log = record("input x\nprint x\n", &NO_OPT);
        assert_eq!(
            &log[6..],
            &["%0 = call input()", "store x, %0", "%1 = load x", "call print(%1)", "ret"]
        );
    }

    #[test]
    fn test_generate_if_without_else_still_branches_to_merge() {
        let log = record("if x is positive print 1 end\n", &NO_OPT);
        assert_eq!(
            &log[6..],
            &[
                "%0 = load x",
                "%1 = cmp Greater %0",
                "block then",
                "block else",
                "block merge",
                "condbr %1, then, else",
                "at then",
                "call print(1)",
                "br merge",
                "at else",
                "br merge",
                "at merge",
                "ret",
            ]
        );
    }

    #[test]
    fn test_generate_runs_passes_when_enabled() {
        let log = record("print 1\n", &CompileOptions::default());
        assert_eq!(log.last().map(String::as_str), Some("passes"));
        assert!(!record("print 1\n", &NO_OPT).contains(&"passes".to_string()));
    }

    #[test]
    fn test_generate_skips_error_nodes() {
        let parsed = parse("x = \nprint 1 +\n");
        assert!(!parsed.is_valid);
        let log = codegen::generate(Recorder::default(), &parsed.root, &NO_OPT).unwrap();
        assert_eq!(
            log,
            vec!["declare print", "declare input", "define main", "block entry", "at entry", "slot x", "ret"]
        );
    }

    #[test]
    fn test_generate_if_with_error_condition_emits_nothing() {
        let program = Stmt::Seq(vec![Stmt::If {
            compare: CompareOp::Zero,
            cond: expr_error("broken", 1),
            then_branch: Box::new(Stmt::Print(Expr::Const(1))),
            else_branch: None,
        }]);
        let log = codegen::generate(Recorder::default(), &program, &NO_OPT).unwrap();
        assert!(!log.iter().any(|line| line.starts_with("block then")));
        assert!(!log.iter().any(|line| line.starts_with("call")));
    }

    // --- IR Backend Tests ---

    #[test]
    fn test_compile_to_ir() {
        let module = compile_with("test", "x = 1\nprint x\n", &NO_OPT).unwrap();
        let (main_id, main) = module.function_by_name("main").unwrap();
        assert_eq!(main_id, FuncId(2));
        assert!(module.function(FuncId(0)).unwrap().external);
        assert_eq!(main.slots, vec!["x".to_string()]);
        let entry = &main.blocks[0];
        assert_eq!(
            entry.insts,
            vec![
                Inst::Alloca { slot: SlotId(0) },
                Inst::Store {
                    slot: SlotId(0),
                    value: Operand::Const(1),
                },
                Inst::Load {
                    dest: ValueId(0),
                    slot: SlotId(0),
                },
                Inst::Call {
                    dest: None,
                    callee: FuncId(0),
                    args: vec![Operand::Value(ValueId(0))],
                },
            ]
        );
        assert_eq!(entry.terminator, Some(Terminator::RetVoid));
    }

    #[test]
    fn test_nested_if_labels_are_unique() {
        let module = compile_with(
            "test",
            "input a\nif a is zero\nif a is zero print 1 end\nend\n",
            &NO_OPT,
        )
        .unwrap();
        let (_, main) = module.function_by_name("main").unwrap();
        let labels: Vec<_> = main.blocks.iter().map(|b| b.label.as_str()).collect();
        assert_eq!(labels, vec!["entry", "then", "else", "merge", "then1", "else1", "merge1"]);
    }

    #[test]
    fn test_optimizer_collapses_constant_if() {
        let module = compile("test", "if 0 is zero print 1 else print 2 end\n").unwrap();
        let (_, main) = module.function_by_name("main").unwrap();
        assert_eq!(main.blocks.len(), 1);
        let text = module.to_string();
        assert!(text.contains("call void @print(i32 1)"));
        assert!(!text.contains("@print(i32 2)"));
    }

    #[test]
    fn test_compile_invalid_program() {
        let err = compile("test", "x = \nprint x\n").unwrap_err();
        match err {
            CompileError::Syntax { errors, listing } => {
                assert_eq!(errors, vec!["line 1: Constant or variable expected, but newline found"]);
                assert!(listing.contains("Print x"));
            }
            other => panic!("expected syntax error, got {other}"),
        }
    }

    #[test]
    fn test_syntax_error_message() {
        let err = compile("test", "print\n").unwrap_err();
        assert_eq!(
            err.to_string(),
            "incorrect program: line 2: Constant or variable expected, but end of file found"
        );
    }
}
