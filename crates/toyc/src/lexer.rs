use logos::Logos;
use tracing::trace;

/// Raw classification done by `logos`. Anything it cannot match is surfaced
/// as a single-character token by [`Lexer::next_token`].
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t]+")]
enum RawToken {
    #[token("if")]
    If,
    #[token("else")]
    Else,
    #[token("end")]
    End,
    #[token("is")]
    Is,
    #[token("negative")]
    Negative,
    #[token("zero")]
    Zero,
    #[token("positive")]
    Positive,
    #[token("input")]
    Input,
    #[token("print")]
    Print,

    #[regex(r"[0-9]+", parse_const)]
    Const(i32),

    #[regex(r"[a-zA-Z][a-zA-Z0-9]*", |lex| lex.slice().to_string())]
    Ident(String),

    // A run of line breaks is a single token.
    #[regex(r"[\r\n]+")]
    Newline,
}

/// Decimal digits to `i32`, wrapping on overflow.
fn parse_const(lex: &mut logos::Lexer<RawToken>) -> i32 {
    lex.slice()
        .bytes()
        .fold(0i32, |acc, digit| acc.wrapping_mul(10).wrapping_add(i32::from(digit - b'0')))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Eof,
    Newline,
    Const(i32),
    Ident(String),
    If,
    Else,
    End,
    Is,
    Negative,
    Zero,
    Positive,
    Input,
    Print,
    /// Any other character, e.g. `=`, `+`, `-`.
    Char(char),
}

impl TokenKind {
    /// How the token is named in "X expected, but Y found" messages.
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Eof => "end of file".into(),
            TokenKind::Newline => "newline".into(),
            TokenKind::Const(_) => "integer constant".into(),
            TokenKind::Ident(_) => "identifier".into(),
            TokenKind::If => "'if'".into(),
            TokenKind::Else => "'else'".into(),
            TokenKind::End => "'end'".into(),
            TokenKind::Is => "'is'".into(),
            TokenKind::Negative => "'negative'".into(),
            TokenKind::Zero => "'zero'".into(),
            TokenKind::Positive => "'positive'".into(),
            TokenKind::Input => "'input'".into(),
            TokenKind::Print => "'print'".into(),
            TokenKind::Char(c) => format!("\"{c}\""),
        }
    }
}

impl From<RawToken> for TokenKind {
    fn from(raw: RawToken) -> Self {
        match raw {
            RawToken::If => TokenKind::If,
            RawToken::Else => TokenKind::Else,
            RawToken::End => TokenKind::End,
            RawToken::Is => TokenKind::Is,
            RawToken::Negative => TokenKind::Negative,
            RawToken::Zero => TokenKind::Zero,
            RawToken::Positive => TokenKind::Positive,
            RawToken::Input => TokenKind::Input,
            RawToken::Print => TokenKind::Print,
            RawToken::Const(v) => TokenKind::Const(v),
            RawToken::Ident(name) => TokenKind::Ident(name),
            RawToken::Newline => TokenKind::Newline,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    /// 1-based line the token starts on.
    pub line: usize,
}

/// On-demand tokenizer. Never fails; once the input is exhausted every call
/// returns [`TokenKind::Eof`].
pub struct Lexer<'src> {
    source: &'src str,
    inner: logos::Lexer<'src, RawToken>,
    line: usize,
}

impl<'src> Lexer<'src> {
    pub fn new(source: &'src str) -> Self {
        Lexer {
            source,
            inner: RawToken::lexer(source),
            line: 1,
        }
    }

    pub fn next_token(&mut self) -> Token {
        loop {
            let line = self.line;
            let Some(result) = self.inner.next() else {
                return Token {
                    kind: TokenKind::Eof,
                    line,
                };
            };
            let span = self.inner.span();
            let kind = match result {
                Ok(RawToken::Newline) => {
                    self.line += line_breaks(self.inner.slice());
                    TokenKind::Newline
                }
                Ok(raw) => raw.into(),
                // Unmatched input: report the character itself. A start
                // offset inside a multi-byte character belongs to the
                // character already reported.
                Err(()) => match self.source.get(span.start..).and_then(|rest| rest.chars().next()) {
                    Some(c) => TokenKind::Char(c),
                    None => continue,
                },
            };
            trace!(?kind, line, "token");
            return Token { kind, line };
        }
    }
}

/// `\r\n` counts once; lone `\r` or `\n` count once each.
fn line_breaks(run: &str) -> usize {
    let newlines = run.matches('\n').count();
    let lone_returns = run.matches('\r').count() - run.matches("\r\n").count();
    newlines + lone_returns
}

/// Tokenize a whole source, `Eof` included.
pub fn lex(source: &str) -> Vec<Token> {
    let mut lexer = Lexer::new(source);
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token();
        let done = token.kind == TokenKind::Eof;
        tokens.push(token);
        if done {
            return tokens;
        }
    }
}
