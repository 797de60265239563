use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process;

use clap::{ArgAction, Parser, Subcommand};
use tracing::{info, Level};

use toy_compiler::{CompileError, CompileOptions};
use toy_ir::Module;
use toy_vm::{IoRuntime, Vm};

#[derive(Parser)]
#[command(name = "toyc", about = "Compiler for the toy language")]
struct Cli {
    /// Raise log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the syntax tree of a program.
    Ast {
        /// Source file; stdin when omitted.
        file: Option<PathBuf>,
        /// Print JSON instead of the indented listing.
        #[arg(long)]
        json: bool,
    },
    /// Print the IR of a program.
    Ir {
        /// Source file; stdin when omitted.
        file: Option<PathBuf>,
        /// Skip the backend passes.
        #[arg(long)]
        no_opt: bool,
    },
    /// Compile a program to a serialized IR module.
    Compile {
        /// Source file; stdin when omitted.
        file: Option<PathBuf>,
        /// Output path. `.toyi` selects the binary format, anything else JSON.
        /// Stdout when omitted.
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Skip the backend passes.
        #[arg(long)]
        no_opt: bool,
    },
    /// Compile and run a program, or run a compiled module (.json / .toyi).
    Run {
        /// Program file; stdin when omitted.
        file: Option<PathBuf>,
        /// Maximum execution steps.
        #[arg(long, default_value = "10000000")]
        max_steps: u64,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli) {
        report(e.as_ref());
        process::exit(1);
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn report(e: &(dyn std::error::Error + 'static)) {
    match e.downcast_ref::<CompileError>() {
        Some(CompileError::Syntax { listing, .. }) => {
            eprintln!("incorrect program");
            eprintln!();
            eprint!("{listing}");
        }
        _ => eprintln!("error: {e}"),
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Command::Ast { file, json } => {
            let (_, source) = read_source(file.as_deref())?;
            print!("{}", render_ast(&source, json)?);
        }
        Command::Ir { file, no_opt } => {
            let module = compile_source(file.as_deref(), no_opt)?;
            print!("{module}");
        }
        Command::Compile { file, output, no_opt } => {
            let module = compile_source(file.as_deref(), no_opt)?;
            match output {
                Some(path) if has_extension(&path, "toyi") => {
                    fs::write(&path, module.to_bytes()?)?;
                    info!(path = %path.display(), "wrote binary module");
                }
                Some(path) => {
                    fs::write(&path, module.to_json()?)?;
                    info!(path = %path.display(), "wrote JSON module");
                }
                None => println!("{}", module.to_json()?),
            }
        }
        Command::Run { file, max_steps } => {
            let module = load_module(file.as_deref())?;
            let mut vm = Vm::new(module, IoRuntime::stdio());
            vm.set_max_steps(max_steps);
            vm.run()?;
            info!(steps = vm.step_count(), "finished");
        }
    }
    Ok(())
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension().and_then(|s| s.to_str()) == Some(ext)
}

/// Tree of a valid program as a listing or JSON. An invalid program is
/// returned as a syntax error so the listing is only reported once.
fn render_ast(source: &str, json: bool) -> Result<String, Box<dyn std::error::Error>> {
    let parsed = toy_compiler::parse(source);
    if !parsed.is_valid {
        return Err(CompileError::Syntax {
            errors: parsed.root.errors(),
            listing: parsed.root.to_string(),
        }
        .into());
    }
    if json {
        Ok(format!("{}\n", serde_json::to_string_pretty(&parsed.root)?))
    } else {
        Ok(parsed.root.to_string())
    }
}

/// Module name and full text of the program.
fn read_source(file: Option<&Path>) -> Result<(String, String), Box<dyn std::error::Error>> {
    match file {
        Some(path) => {
            let source = fs::read_to_string(path)?;
            let name = path
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| "module".into());
            Ok((name, source))
        }
        None => {
            let mut source = String::new();
            io::stdin().read_to_string(&mut source)?;
            Ok(("stdin".into(), source))
        }
    }
}

fn compile_source(file: Option<&Path>, no_opt: bool) -> Result<Module, Box<dyn std::error::Error>> {
    let (name, source) = read_source(file)?;
    let options = CompileOptions { optimize: !no_opt };
    Ok(toy_compiler::compile_with(&name, &source, &options)?)
}

fn load_module(file: Option<&Path>) -> Result<Module, Box<dyn std::error::Error>> {
    match file {
        Some(path) if has_extension(path, "toyi") => Ok(Module::from_bytes(&fs::read(path)?)?),
        Some(path) if has_extension(path, "json") => Ok(Module::from_json(&fs::read_to_string(path)?)?),
        _ => compile_source(file, false),
    }
}
