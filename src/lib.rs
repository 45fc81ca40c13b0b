// stepjs: an embeddable evaluator for a JavaScript-like expression language
//
// Scripts are parsed into an expression tree and evaluated by a frame engine
// that can suspend at breakpoints and resume later. Hosts extend the language
// through a global context resolving unbound names.

// Public modules
pub mod ast;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod lexer;
pub mod parser;
pub mod repl;
pub mod runner;
pub mod scope;
pub mod value;

// Re-export commonly used items
pub use ast::{Expr, ExprKind, Rewriter, SyntaxErrorCollector, VarDecl, Visitor};
pub use engine::{
    evaluate, evaluate_with, Breakpoints, EvaluationHandle, EvaluationStatus, ScriptEngine,
};
pub use error::{Diagnostic, EngineError, ScopeError, SourceLocation, Span};
pub use evaluator::{
    standard_globals, AccessorFrame, AccessorMatcher, CallMatch, Evaluator, GlobalContext, PExpr,
    StandardGlobals,
};
pub use lexer::{Lexer, TokenCode};
pub use parser::{parse, Parser};
pub use scope::{ScopeOptions, StaticScope};
pub use value::Value;

// Re-export main functions
pub use repl::start as start_repl;
pub use runner::run;
