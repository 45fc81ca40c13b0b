use crate::engine::ScriptEngine;
use crate::evaluator::StandardGlobals;
use crate::runner::{self, RunOptions};
use crate::scope::ScopeOptions;
use std::io::{self, Write};
use std::rc::Rc;

/// Interactive loop. Top-level variables live in a global scope, so they
/// persist from one line to the next.
pub fn start(options: &RunOptions) {
    println!("stepjs {}", env!("CARGO_PKG_VERSION"));
    println!("Type 'exit' or press Ctrl+D to quit");
    println!();

    let scope = ScopeOptions {
        global_scope: true,
        ..options.scope
    };
    let mut engine = ScriptEngine::with_options(Rc::new(StandardGlobals), scope);

    loop {
        print!("> ");
        if io::stdout().flush().is_err() {
            break;
        }

        let mut line = String::new();
        match io::stdin().read_line(&mut line) {
            Ok(0) => {
                // EOF reached (Ctrl+D or piped input ended)
                println!();
                break;
            }
            Ok(_) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if line == "exit" || line == "quit" {
                    println!("Goodbye!");
                    break;
                }
                runner::run_in(&mut engine, line, None, options.step);
            }
            Err(error) => {
                eprintln!("Error reading input: {}", error);
                break;
            }
        }
    }
}
