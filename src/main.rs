use anyhow::Context;
use clap::{ArgAction, Parser, Subcommand};
use log::LevelFilter;
use simple_logger::SimpleLogger;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;
use tim::ast::{Program, Symbol, Variable};
use tim::bytecode::{self, Bytecode};
use tim::vm::Machine;
use tim::{asm, lexer, parser, token};

#[derive(Debug, Parser)]
#[command(name = "tim", author, version, about)]
struct Cli {
    /// Raise the log level, can be repeated
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the tokens of a source file
    Lex { file: PathBuf },
    /// Check a source file and print its symbols
    Parse { file: PathBuf },
    /// Assemble a text program into a bytecode file
    Asm {
        input: PathBuf,
        /// Output file
        #[arg(short, long, default_value = "out.tim")]
        output: PathBuf,
    },
    /// Run a bytecode file
    Run { program: PathBuf },
    /// Print the instructions of a bytecode file
    Disasm { program: PathBuf },
    /// Step through a bytecode file
    Debug { program: PathBuf },
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    if let Err(err) = SimpleLogger::new().with_level(level).env().init() {
        eprintln!("could not set up logging: {err}");
    }

    match execute(cli.command) {
        Ok(code) => process::exit(code as i32),
        Err(err) => {
            eprintln!("{err:#}");
            process::exit(1);
        }
    }
}

/// Run one command and return the process exit code
fn execute(command: Command) -> anyhow::Result<i64> {
    match command {
        Command::Lex { file } => {
            let (name, source) = read_source(&file)?;
            let tokens = lexer::lex(&name, &source)?;
            print!("{}", token::dump(&tokens));
        }
        Command::Parse { file } => {
            let (name, source) = read_source(&file)?;
            let tokens = lexer::lex(&name, &source)?;
            let program = parser::parse(&tokens)?;
            print_symbols(&program);
        }
        Command::Asm { input, output } => {
            let (_, text) = read_source(&input)?;
            let bytecode = asm::assemble(&text)
                .with_context(|| format!("could not assemble {}", input.display()))?;
            bytecode.save(&output)?;
        }
        Command::Run { program } => {
            let mut machine = Machine::new(Bytecode::load(&program)?);
            return Ok(machine.run()?);
        }
        Command::Disasm { program } => {
            let bytecode = Bytecode::load(&program)?;
            let mut out = io::stdout().lock();
            bytecode::disassemble(&bytecode, &mut out)?;
            out.flush()?;
        }
        Command::Debug { program } => {
            let mut machine = Machine::new(Bytecode::load(&program)?);
            machine.debug(io::stdin().lock(), io::stdout().lock())?;
        }
    }
    Ok(0)
}

fn read_source(path: &Path) -> anyhow::Result<(String, String)> {
    let source = fs::read_to_string(path)
        .with_context(|| format!("could not read {}", path.display()))?;
    Ok((path.display().to_string(), source))
}

fn print_symbols(program: &Program<'_>) {
    fn var(var: &Variable<'_>) -> String {
        let ty = var.struct_name.unwrap_or(var.data_type.name());
        let array = if var.is_array { "[]" } else { "" };
        format!("{}: {ty}{array}", var.name)
    }

    for symbol in &program.symbols {
        match symbol {
            Symbol::Var(v) => match v.function {
                Some(function) => println!("var {} (in {function})", var(v)),
                None => println!("var {}", var(v)),
            },
            Symbol::Func(function) => {
                let args: Vec<_> = function.args.iter().map(var).collect();
                println!(
                    "func {}({}): {}",
                    function.name,
                    args.join(", "),
                    function.return_type
                );
            }
            Symbol::Struct(structure) => {
                let fields: Vec<_> = structure.fields.iter().map(var).collect();
                println!("struct {} {{ {} }}", structure.name, fields.join(", "));
            }
            Symbol::Ext(func) => {
                let args: Vec<_> = func.args.iter().map(|arg| arg.data_type.name()).collect();
                println!(
                    "ext {}({}): {}",
                    func.name,
                    args.join(", "),
                    func.return_type
                );
            }
        }
    }
}
