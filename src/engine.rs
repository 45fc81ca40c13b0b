use crate::ast::{Expr, ExprKind, NodeId, SyntaxErrorCollector};
use crate::error::{Diagnostic, EngineError};
use crate::evaluator::{Evaluator, GlobalContext, PExpr, StandardGlobals};
use crate::parser::{self, Parser};
use crate::scope::ScopeOptions;
use crate::value::{RuntimeError, Value};
use std::collections::HashSet;
use std::rc::Rc;
use tracing::debug;

/// Nodes evaluation suspends before.
#[derive(Debug, Clone, Default)]
pub struct Breakpoints {
    nodes: HashSet<NodeId>,
    /// Suspend before every breakable node.
    pub break_always: bool,
}

impl Breakpoints {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a breakpoint on `expr`. Only breakable nodes accept one.
    pub fn add(&mut self, expr: &Expr) -> bool {
        expr.is_breakable() && self.nodes.insert(expr.id)
    }

    pub fn remove(&mut self, expr: &Expr) -> bool {
        self.nodes.remove(&expr.id)
    }

    pub fn contains(&self, expr: &Expr) -> bool {
        self.nodes.contains(&expr.id)
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn should_break(&self, expr: &Expr) -> bool {
        self.break_always || self.nodes.contains(&expr.id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvaluationStatus {
    Finished,
    Pending,
    /// Finished with an error value.
    Error,
}

/// Parser and evaluator bundled for hosts that step through scripts.
///
/// With a global scope, top-level `var`s persist from one `execute` to the
/// next, which is what a REPL wants.
pub struct ScriptEngine {
    parser: Parser,
    evaluator: Evaluator,
}

impl Default for ScriptEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptEngine {
    pub fn new() -> Self {
        Self::with_global(Rc::new(StandardGlobals))
    }

    pub fn with_global(global: Rc<dyn GlobalContext>) -> Self {
        Self::with_options(global, ScopeOptions::default())
    }

    pub fn with_options(global: Rc<dyn GlobalContext>, options: ScopeOptions) -> Self {
        Self {
            parser: Parser::new(options),
            evaluator: Evaluator::new(global),
        }
    }

    pub fn parser(&self) -> &Parser {
        &self.parser
    }

    pub fn evaluator(&self) -> &Evaluator {
        &self.evaluator
    }

    pub fn breakpoints(&self) -> &Breakpoints {
        self.evaluator.breakpoints()
    }

    pub fn breakpoints_mut(&mut self) -> &mut Breakpoints {
        self.evaluator.breakpoints_mut()
    }

    pub fn is_pending(&self) -> bool {
        self.evaluator.is_pending()
    }

    /// Parses `source` and registers the global declarations it adds.
    pub fn parse(&mut self, source: &str) -> Rc<Expr> {
        let expr = self.parser.parse(source);
        self.evaluator.declare_globals(self.parser.scope().globals());
        expr
    }

    /// Parses and starts evaluating `source`.
    pub fn execute(&mut self, source: &str) -> Result<EvaluationHandle<'_>, EngineError> {
        if self.is_pending() {
            return Err(EngineError::AlreadyRunning);
        }
        let expr = self.parse(source);
        self.execute_expr(&expr)
    }

    /// Starts evaluating an already parsed tree, e.g. one breakpoints were set on.
    pub fn execute_expr(&mut self, expr: &Rc<Expr>) -> Result<EvaluationHandle<'_>, EngineError> {
        self.evaluator.start(expr)?;
        Ok(EvaluationHandle {
            evaluator: &mut self.evaluator,
        })
    }

    /// Handle on the current (possibly finished) evaluation.
    pub fn handle(&mut self) -> EvaluationHandle<'_> {
        EvaluationHandle {
            evaluator: &mut self.evaluator,
        }
    }
}

/// Controls one evaluation started by [`ScriptEngine::execute`].
pub struct EvaluationHandle<'e> {
    evaluator: &'e mut Evaluator,
}

impl EvaluationHandle<'_> {
    pub fn status(&self) -> EvaluationStatus {
        if self.evaluator.is_pending() {
            EvaluationStatus::Pending
        } else if self.evaluator.result().map_or(false, Value::is_error) {
            EvaluationStatus::Error
        } else {
            EvaluationStatus::Finished
        }
    }

    pub fn is_pending(&self) -> bool {
        self.evaluator.is_pending()
    }

    /// Final value, once the evaluation is over.
    pub fn result(&self) -> Option<&Value> {
        self.evaluator.result()
    }

    /// Runs to the next breakpoint or to the end.
    pub fn continue_evaluation(&mut self) -> Result<EvaluationStatus, EngineError> {
        self.evaluator.resume()?;
        Ok(self.status())
    }

    /// Runs to the next breakable node.
    pub fn step_in(&mut self) -> Result<EvaluationStatus, EngineError> {
        self.evaluator.step_in()?;
        Ok(self.status())
    }

    /// Runs through every remaining breakpoint.
    pub fn run_to_completion(&mut self) -> Result<Value, EngineError> {
        while self.evaluator.is_pending() {
            if let PExpr::Resolved(v) = self.evaluator.resume()? {
                return Ok(v);
            }
        }
        Ok(self.evaluator.result().cloned().unwrap_or_default())
    }

    /// Node evaluation is suspended before.
    pub fn current(&self) -> Option<Rc<Expr>> {
        self.evaluator.frame_stack().pop()
    }

    pub fn frame_stack(&self) -> Vec<Rc<Expr>> {
        self.evaluator.frame_stack()
    }

    pub fn breakpoints_mut(&mut self) -> &mut Breakpoints {
        self.evaluator.breakpoints_mut()
    }

    /// Abandons the evaluation.
    pub fn reset(&mut self) {
        self.evaluator.reset();
    }
}

/// Parses and evaluates `source` with the standard globals.
pub fn evaluate(source: &str) -> Value {
    evaluate_with(source, Rc::new(StandardGlobals))
}

pub fn evaluate_with(source: &str, global: Rc<dyn GlobalContext>) -> Value {
    let expr = parser::parse(source);
    let mut evaluator = Evaluator::new(global);
    match evaluator.evaluate(&expr) {
        Ok(value) => value,
        Err(error) => {
            debug!(%error, "evaluation did not run");
            Value::Undefined
        }
    }
}

/// One diagnostic per syntax error node of `expr`.
pub fn syntax_diagnostics(expr: &Rc<Expr>) -> Vec<Diagnostic> {
    SyntaxErrorCollector::collect(expr, false)
        .errors
        .iter()
        .map(|e| {
            let message = match &e.kind {
                ExprKind::SyntaxError(m) => m.clone(),
                _ => e.to_string(),
            };
            Diagnostic::syntax(e.location.span, message)
        })
        .collect()
}

/// Diagnostic for a runtime error. A chained error names its origin in a note.
pub fn runtime_diagnostic(error: &Rc<RuntimeError>) -> Diagnostic {
    let origin = error.origin();
    let diagnostic = Diagnostic::runtime(error.culprit.location.span, error.message.clone());
    if Rc::ptr_eq(&origin, error) {
        diagnostic
    } else {
        diagnostic.with_help(format!("caused by: {}", origin))
    }
}
