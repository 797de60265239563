use std::collections::VecDeque;
use std::io::{self, BufRead, Write};

/// Host-provided implementation of the language's runtime library.
///
/// Generated programs call `print(i32)` and `input() -> i32`; the VM routes
/// those external calls here.
pub trait Runtime {
    fn print(&mut self, value: i32) -> Result<(), String>;
    fn input(&mut self) -> Result<i32, String>;
}

/// Console runtime: whitespace-separated integers in, one value per line out.
///
/// A token that is not an integer, or end of input, reads as `0`.
pub struct IoRuntime<R, W> {
    reader: R,
    writer: W,
    pending: VecDeque<String>,
}

impl<R: BufRead, W: Write> IoRuntime<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        IoRuntime {
            reader,
            writer,
            pending: VecDeque::new(),
        }
    }

    pub fn into_writer(self) -> W {
        self.writer
    }

    fn next_token(&mut self) -> Result<Option<String>, String> {
        while self.pending.is_empty() {
            let mut line = String::new();
            let read = self.reader.read_line(&mut line).map_err(|e| e.to_string())?;
            if read == 0 {
                return Ok(None);
            }
            self.pending
                .extend(line.split_whitespace().map(str::to_string));
        }
        Ok(self.pending.pop_front())
    }
}

impl IoRuntime<io::StdinLock<'static>, io::Stdout> {
    pub fn stdio() -> Self {
        IoRuntime::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> Runtime for IoRuntime<R, W> {
    fn print(&mut self, value: i32) -> Result<(), String> {
        writeln!(self.writer, "{value}").map_err(|e| e.to_string())?;
        self.writer.flush().map_err(|e| e.to_string())
    }

    fn input(&mut self) -> Result<i32, String> {
        Ok(self
            .next_token()?
            .and_then(|token| token.parse().ok())
            .unwrap_or(0))
    }
}

/// In-memory runtime for tests: inputs come from a queue, prints are recorded.
#[derive(Debug, Default)]
pub struct ScriptedRuntime {
    inputs: VecDeque<i32>,
    pub output: Vec<i32>,
}

impl ScriptedRuntime {
    pub fn new(inputs: impl IntoIterator<Item = i32>) -> Self {
        ScriptedRuntime {
            inputs: inputs.into_iter().collect(),
            output: Vec::new(),
        }
    }
}

impl Runtime for ScriptedRuntime {
    fn print(&mut self, value: i32) -> Result<(), String> {
        self.output.push(value);
        Ok(())
    }

    fn input(&mut self) -> Result<i32, String> {
        Ok(self.inputs.pop_front().unwrap_or(0))
    }
}
