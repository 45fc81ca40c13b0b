use crate::engine::{runtime_diagnostic, syntax_diagnostics, ScriptEngine};
use crate::error::Diagnostic;
use crate::evaluator::StandardGlobals;
use crate::scope::ScopeOptions;
use crate::value::Value;
use std::rc::Rc;

/// Front-end settings shared by the runner and the REPL.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    pub scope: ScopeOptions,
    /// Suspend before every breakable node and print it.
    pub step: bool,
}

/// Runs a whole script and prints its value. Returns false when the script
/// has a syntax error or evaluates to an error.
pub fn run(source: &str, filename: Option<&str>, options: &RunOptions) -> bool {
    let mut engine = ScriptEngine::with_options(Rc::new(StandardGlobals), options.scope);
    run_in(&mut engine, source, filename, options.step)
}

/// Parses and evaluates `source` on an existing engine.
pub(crate) fn run_in(
    engine: &mut ScriptEngine,
    source: &str,
    filename: Option<&str>,
    step: bool,
) -> bool {
    let expr = engine.parse(source);
    let diagnostics = syntax_diagnostics(&expr);
    if !diagnostics.is_empty() {
        for diagnostic in &diagnostics {
            report(diagnostic, source, filename);
        }
        return false;
    }

    engine.breakpoints_mut().break_always = step;
    let mut handle = match engine.execute_expr(&expr) {
        Ok(handle) => handle,
        Err(error) => {
            eprintln!("Error: {}", error);
            return false;
        }
    };
    while handle.is_pending() {
        if let Some(node) = handle.current() {
            println!("[{}] {}", node.location, node);
        }
        if let Err(error) = handle.continue_evaluation() {
            eprintln!("Error: {}", error);
            handle.reset();
            return false;
        }
    }

    match handle.result() {
        Some(Value::Error(error)) => {
            report(&runtime_diagnostic(error), source, filename);
            false
        }
        Some(value) => {
            println!("{}", value);
            true
        }
        None => true,
    }
}

fn report(diagnostic: &Diagnostic, source: &str, filename: Option<&str>) {
    if diagnostic.report(source, filename).is_err() {
        eprintln!("Error: {}", diagnostic);
    }
}
