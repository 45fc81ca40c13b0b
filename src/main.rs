use clap::Parser as _;
use stepjs::runner::{self, RunOptions};
use stepjs::{repl, ScopeOptions};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// An embeddable JavaScript-like evaluator with breakpoints
#[derive(clap::Parser, Debug)]
#[command(name = "stepjs", version)]
struct Cli {
    /// The script file to execute
    #[arg(value_name = "FILE")]
    file: Option<PathBuf>,

    /// Start in interactive REPL mode
    #[arg(short, long)]
    interactive: bool,

    /// Evaluate a snippet instead of a file
    #[arg(short, long, value_name = "SOURCE", conflicts_with = "file")]
    eval: Option<String>,

    /// Suspend before every breakable node and print it
    #[arg(long)]
    step: bool,

    /// Refuse declarations that shadow an outer one
    #[arg(long)]
    no_masking: bool,

    /// Accept a second declaration of a name in the same scope
    #[arg(long)]
    allow_redefinition: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let options = RunOptions {
        scope: ScopeOptions {
            allow_masking: !cli.no_masking,
            allow_local_redefinition: cli.allow_redefinition,
            ..ScopeOptions::default()
        },
        step: cli.step,
    };

    if let Some(source) = &cli.eval {
        if !runner::run(source, None, &options) {
            std::process::exit(1);
        }
    } else if let Some(file_path) = cli.file.as_deref().filter(|_| !cli.interactive) {
        run_file(file_path, &options);
    } else {
        repl::start(&options);
    }
}

fn run_file(path: &Path, options: &RunOptions) {
    if !path.exists() {
        eprintln!("Error: File '{}' not found", path.display());
        std::process::exit(1);
    }

    match fs::read_to_string(path) {
        Ok(source) => {
            let name = path.display().to_string();
            if !runner::run(&source, Some(&name), options) {
                std::process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("Error reading file '{}': {}", path.display(), e);
            std::process::exit(1);
        }
    }
}
