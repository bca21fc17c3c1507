use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use duck::{CompiledClass, CompilerOptions, ExecutionError, VM, VmOptions, render_error};
use miette::{Diagnostic, IntoDiagnostic, Result};
use thiserror::Error;
use tracing::{debug, info};

/// Duck - compile int-only Java classes to stack VM bytecode
#[derive(Parser, Debug)]
#[command(name = "duck")]
#[command(about = "Compile and run Duck classes", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compile a source file and print the disassembly of every method
    Compile {
        file: PathBuf,

        /// Also write each method as `<Class>.<method>.dbc` into this directory
        #[arg(long)]
        emit: Option<PathBuf>,

        /// Compile methods one after another instead of in parallel
        #[arg(long)]
        sequential: bool,
    },

    /// Compile a source file and invoke one method
    Run {
        file: PathBuf,

        /// Method to invoke, as `Class.method`
        target: String,

        /// Integer arguments
        #[arg(allow_negative_numbers = true)]
        args: Vec<i32>,

        /// Abort after this many executed instructions
        #[arg(long)]
        max_steps: Option<u64>,
    },
}

#[derive(Debug, Error, Diagnostic)]
enum CliError {
    #[error("compilation failed")]
    #[diagnostic(code(duck::compile))]
    Compile,

    #[error("`{0}` is not of the form `Class.method`")]
    #[diagnostic(help("for example: Fib.rec"))]
    InvalidTarget(String),

    #[error("no class named `{0}`")]
    UnknownClass(String),

    #[error(transparent)]
    #[diagnostic(code(duck::runtime))]
    Execution(#[from] ExecutionError),
}

fn compile_file(path: &Path, parallel: bool) -> Result<Vec<CompiledClass>> {
    let source = fs::read_to_string(path).into_diagnostic()?;
    let options = CompilerOptions {
        parallel,
        ..Default::default()
    };
    match duck::compile_source_with(&source, &options) {
        Ok(classes) => {
            debug!(file = %path.display(), classes = classes.len(), "Compiled file");
            Ok(classes)
        }
        Err(err) => {
            render_error(&err, &source);
            Err(CliError::Compile.into())
        }
    }
}

fn emit_class(class: &CompiledClass, dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).into_diagnostic()?;
    for method in class.methods.iter().flatten() {
        let path = dir.join(format!("{}.{}.dbc", class.name, method.name));
        fs::write(&path, method.encode()).into_diagnostic()?;
        info!(path = %path.display(), "Wrote method");
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging subscriber
    use tracing_subscriber::{EnvFilter, fmt};

    // Use RUST_LOG environment variable to control log level
    // Default to WARN if not set
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("warn"))
        .into_diagnostic()?;

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    match args.command {
        Command::Compile {
            file,
            emit,
            sequential,
        } => {
            let classes = compile_file(&file, !sequential)?;
            for class in &classes {
                println!("class {}", class.name);
                for method in class.methods.iter().flatten() {
                    println!("{:?}", method);
                }
                if let Some(dir) = &emit {
                    emit_class(class, dir)?;
                }
            }
        }

        Command::Run {
            file,
            target,
            args,
            max_steps,
        } => {
            let (class_name, method) = target
                .split_once('.')
                .ok_or_else(|| CliError::InvalidTarget(target.clone()))?;
            let classes = compile_file(&file, true)?;
            let class = classes
                .iter()
                .find(|class| class.name == class_name)
                .ok_or_else(|| CliError::UnknownClass(class_name.to_string()))?;

            let options = VmOptions {
                max_steps,
                ..VmOptions::default()
            };
            let result = VM::with_options(class, options)
                .invoke(method, &args)
                .map_err(CliError::from)?;
            println!("{}", result);
        }
    }

    Ok(())
}
