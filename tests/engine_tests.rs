// Stepping, breakpoints and the host-facing engine API.

use std::rc::Rc;
use stepjs::ast::{rewrite_children, walk_binary, walk_call, BinaryOp};
use stepjs::engine::{runtime_diagnostic, syntax_diagnostics};
use stepjs::error::DiagnosticKind;
use stepjs::runner::RunOptions;
use stepjs::value::RuntimeError;
use stepjs::{
    evaluate, parse, EngineError, EvaluationStatus, Evaluator, Expr, ExprKind, ScopeOptions,
    Rewriter, ScriptEngine, StandardGlobals, SyntaxErrorCollector, Value, Visitor,
};

fn statements(expr: &Rc<Expr>) -> Vec<Rc<Expr>> {
    match &expr.kind {
        ExprKind::Block { statements, .. } => statements.clone(),
        _ => vec![Rc::clone(expr)],
    }
}

fn run(engine: &mut ScriptEngine, source: &str) -> Value {
    engine
        .execute(source)
        .unwrap()
        .run_to_completion()
        .unwrap()
}

#[test]
fn break_always_suspends_before_every_breakable_node() {
    let mut engine = ScriptEngine::new();
    engine.breakpoints_mut().break_always = true;
    let mut handle = engine.execute("(5&2) <= (7-(4<<2)*5+69)").unwrap();

    let mut visited = Vec::new();
    while handle.is_pending() {
        visited.push(handle.current().unwrap().to_string());
        assert_ne!(handle.continue_evaluation().unwrap(), EvaluationStatus::Error);
    }

    assert_eq!(visited.len(), 6);
    assert_eq!(visited[1], "(5 & 2)");
    assert_eq!(visited[5], "(4 << 2)");
    assert_eq!(handle.status(), EvaluationStatus::Finished);
    assert!(matches!(handle.result(), Some(Value::Boolean(false))));
}

#[test]
fn node_breakpoint_then_step_in() {
    let mut engine = ScriptEngine::new();
    let expr = engine.parse("var a = 1; a = a + 1; a = a * 10; a");
    let nodes = statements(&expr);
    assert_eq!(nodes.len(), 4);
    assert!(engine.breakpoints_mut().add(&nodes[2]));
    // A variable read is not a breakable node.
    assert!(!engine.breakpoints_mut().add(&nodes[3]));
    assert_eq!(engine.breakpoints().len(), 1);

    let mut handle = engine.execute_expr(&expr).unwrap();
    assert_eq!(handle.status(), EvaluationStatus::Pending);
    assert!(Rc::ptr_eq(&handle.current().unwrap(), &nodes[2]));

    assert_eq!(handle.step_in().unwrap(), EvaluationStatus::Pending);
    assert_eq!(handle.current().unwrap().to_string(), "(a * 10)");

    assert_eq!(handle.continue_evaluation().unwrap(), EvaluationStatus::Finished);
    assert_eq!(handle.result().map(Value::to_number), Some(20.0));
}

#[test]
fn breakpoint_inside_a_loop_hits_every_iteration() {
    let mut engine = ScriptEngine::new();
    let expr = engine.parse("var i = 0; while (i < 3) { i++; } i");
    let nodes = statements(&expr);
    let ExprKind::While { body, .. } = &nodes[1].kind else {
        panic!("expected a while loop");
    };
    assert!(engine.breakpoints_mut().add(body));

    let mut handle = engine.execute_expr(&expr).unwrap();
    let mut hits = 0;
    while handle.is_pending() {
        hits += 1;
        handle.continue_evaluation().unwrap();
    }
    assert_eq!(hits, 3);
    assert_eq!(handle.result().map(Value::to_number), Some(3.0));
}

#[test]
fn frame_stack_shows_the_activation() {
    let mut engine = ScriptEngine::new();
    let expr = engine.parse("function f(x) { return x * 2; } f(4)");
    let nodes = statements(&expr);
    let ExprKind::Function(def) = &nodes[0].kind else {
        panic!("expected a function");
    };
    let ExprKind::FlowBreak {
        value: Some(product),
        ..
    } = &def.body.kind
    else {
        panic!("expected a return statement");
    };
    engine.breakpoints_mut().add(product);

    let mut handle = engine.execute_expr(&expr).unwrap();
    let stack = handle.frame_stack();
    assert_eq!(stack.len(), 5);
    assert!(Rc::ptr_eq(&stack[0], &expr));
    // The activation frame sits on the call expression.
    assert!(Rc::ptr_eq(&stack[1], &stack[2]));
    assert!(Rc::ptr_eq(&stack[4], product));

    assert_eq!(handle.run_to_completion().unwrap().to_number(), 8.0);
    assert!(handle.frame_stack().is_empty());
}

#[test]
fn removed_breakpoints_no_longer_suspend() {
    let mut engine = ScriptEngine::new();
    let expr = engine.parse("var a = 1; a = a + 1; a");
    let nodes = statements(&expr);
    engine.breakpoints_mut().add(&nodes[1]);
    assert!(engine.breakpoints().contains(&nodes[1]));
    assert!(engine.breakpoints_mut().remove(&nodes[1]));
    assert!(engine.breakpoints().is_empty());

    let handle = engine.execute_expr(&expr).unwrap();
    assert_eq!(handle.status(), EvaluationStatus::Finished);
    assert_eq!(handle.result().map(Value::to_number), Some(2.0));
}

#[test]
fn reset_abandons_a_suspended_evaluation() {
    let mut engine = ScriptEngine::new();
    engine.breakpoints_mut().break_always = true;
    engine.execute("var x = 1; x = x + 1").unwrap();
    assert!(engine.is_pending());
    assert!(matches!(engine.execute("1"), Err(EngineError::AlreadyRunning)));

    engine.handle().reset();
    assert!(!engine.is_pending());

    engine.breakpoints_mut().break_always = false;
    assert_eq!(run(&mut engine, "2 + 3").to_number(), 5.0);
}

#[test]
fn stepping_without_an_evaluation_is_an_error() {
    let mut engine = ScriptEngine::new();
    assert_eq!(
        engine.handle().continue_evaluation(),
        Err(EngineError::NotPending)
    );
    assert_eq!(engine.handle().step_in(), Err(EngineError::NotPending));

    let mut evaluator = Evaluator::default();
    assert_eq!(evaluator.resume().unwrap_err(), EngineError::NotPending);
}

#[test]
fn evaluator_runs_through_breakpoints() {
    let mut evaluator = Evaluator::default();
    evaluator.breakpoints_mut().break_always = true;
    let expr = parse("1 + 2 * 3");
    assert_eq!(evaluator.evaluate(&expr).unwrap().to_number(), 7.0);

    assert!(evaluator.start(&expr).unwrap().is_pending());
    assert_eq!(evaluator.start(&expr).unwrap_err(), EngineError::AlreadyRunning);
    evaluator.reset();
    assert!(!evaluator.is_pending());
}

#[test]
fn error_status() {
    let mut engine = ScriptEngine::new();
    let handle = engine.execute("nothing").unwrap();
    assert_eq!(handle.status(), EvaluationStatus::Error);
}

#[test]
fn global_scope_persists_between_executions() {
    let options = ScopeOptions {
        global_scope: true,
        ..ScopeOptions::default()
    };
    let mut engine = ScriptEngine::with_options(Rc::new(StandardGlobals), options);

    assert_eq!(run(&mut engine, "var x = 40").to_number(), 40.0);
    assert_eq!(run(&mut engine, "x + 2").to_number(), 42.0);
    run(&mut engine, "function sq(n) { return n * n; }");
    assert_eq!(run(&mut engine, "sq(x + 2)").to_number(), 1764.0);
    run(&mut engine, "function getx() { return x; }");
    assert_eq!(run(&mut engine, "x = sq(3); getx()").to_number(), 9.0);
}

#[test]
fn printed_trees_parse_back_to_the_same_text() {
    let sources = [
        "1 + 2 * 3",
        "(1 + 2) * 3",
        "var x = 1, y = 2; x += y",
        "a ? b : c ? d : e",
        "function f(a, b) { return a * b; } f(1, 2)",
        "if (x) y; else z",
        "while (i < 3) { i++; }",
        "do i--; while (i)",
        "'it\\'s' + \"q\\\"\"",
        "-5 + typeof x",
        "a.b(c)[d]",
        "var f = function () { return; }",
        "break; continue",
        "!(a && b) || c",
    ];
    for source in sources {
        let printed = parse(source).to_string();
        let reparsed = parse(&printed);
        assert!(
            !SyntaxErrorCollector::collect(&reparsed, false).has_errors(),
            "`{}` printed as `{}`",
            source,
            printed
        );
        assert_eq!(reparsed.to_string(), printed, "`{}`", source);
    }
}

#[test]
fn collector_reports_unbound_names() {
    let expr = parse("var a = 1; a + b * Math.PI");
    let collector = SyntaxErrorCollector::collect(&expr, true);
    assert!(!collector.has_errors());
    let names: Vec<String> = collector.unbound.iter().map(|e| e.to_string()).collect();
    assert_eq!(names, vec!["b", "Math"]);
}

#[test]
fn syntax_diagnostics_carry_messages() {
    let diagnostics = syntax_diagnostics(&parse("1 +"));
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].kind, DiagnosticKind::Syntax);
    assert_eq!(
        diagnostics[0].message,
        "Expected expression but found end of input."
    );
    assert!(syntax_diagnostics(&parse("1 + 2")).is_empty());
}

#[test]
fn runtime_diagnostics_name_the_origin() {
    let Value::Error(error) = evaluate("missing") else {
        panic!("expected an error value");
    };
    let diagnostic = runtime_diagnostic(&error);
    assert_eq!(diagnostic.kind, DiagnosticKind::Runtime);
    assert_eq!(diagnostic.message, "Undefined in scope: missing");
    assert_eq!(diagnostic.span, error.culprit.location.span);
    assert!(diagnostic.help.is_none());

    let wrapped = Rc::new(RuntimeError {
        culprit: parse("outer"),
        message: "Wrapped.".to_string(),
        previous: Some(Rc::clone(&error)),
    });
    assert!(Rc::ptr_eq(&wrapped.origin(), &error));
    assert_eq!(
        runtime_diagnostic(&wrapped).help.as_deref(),
        Some("caused by: Error: Undefined in scope: missing at line 1, column 1.")
    );
}

#[test]
fn runner_reports_success() {
    let options = RunOptions::default();
    assert!(stepjs::run("var x = 2; x * 21", None, &options));
    assert!(!stepjs::run("45DD", None, &options));
    assert!(!stepjs::run("missing", Some("script.js"), &options));

    let stepping = RunOptions {
        step: true,
        ..RunOptions::default()
    };
    assert!(stepjs::run("1 + 2", None, &stepping));
}

#[test]
fn operators_group_by_precedence() {
    let cases = [
        ("a + b * c", "(a + (b * c))"),
        ("a * b + c", "((a * b) + c)"),
        ("a - b - c", "((a - b) - c)"),
        ("a << b + c", "(a << (b + c))"),
        ("a < b << c", "(a < (b << c))"),
        ("a == b < c", "(a == (b < c))"),
        ("a & b == c", "(a & (b == c))"),
        ("a | b ^ c & d", "(a | (b ^ (c & d)))"),
        ("a && b | c", "(a && (b | c))"),
        ("a || b && c", "(a || (b && c))"),
        ("a && b || c", "((a && b) || c)"),
        ("a || b || c", "(a || (b || c))"),
        ("a && b && c", "(a && (b && c))"),
        ("a || b ? c : d", "((a || b) ? c : d)"),
        ("!a && b", "((!a) && b)"),
        ("-a * b", "((-a) * b)"),
    ];
    for (source, shape) in cases {
        assert_eq!(parse(source).to_string(), shape, "`{}`", source);
    }
}

/// Evaluates `source` in one pass and again suspending before every node.
fn one_pass_and_stepped(source: &str) -> (Value, Value) {
    let one_pass = evaluate(source);
    let mut engine = ScriptEngine::new();
    engine.breakpoints_mut().break_always = true;
    let stepped = run(&mut engine, source);
    (one_pass, stepped)
}

#[test]
fn stepping_sees_operands_as_they_were_read() {
    let cases = [
        ("var x = 1; x + (x = 5) * (1 + 1)", 11.0),
        ("var x = 1; function g() { x = 5; return 1 + 1; } x + g()", 3.0),
        (
            "var x = 1; function f(a, b) { return a * 100 + b; } f(x, (x = 5) * (1 + 1))",
            110.0,
        ),
        ("var i = 1; i + i++ + i", 4.0),
        ("var x = 2; -x + (x = 10)", 8.0),
        ("var x = 0; (x = 3) > 2 ? x * (x = 4) : 0", 12.0),
    ];
    for (source, expected) in cases {
        let (one_pass, stepped) = one_pass_and_stepped(source);
        assert_eq!(one_pass.to_string(), stepped.to_string(), "`{}`", source);
        assert_eq!(one_pass.to_number(), expected, "`{}`", source);
    }
    let (one_pass, stepped) = one_pass_and_stepped("var s = 'a'; s + (s = 'b') + s");
    assert_eq!(one_pass.to_string(), "abb");
    assert_eq!(stepped.to_string(), "abb");
}

#[test]
fn deep_recursion_is_a_runtime_error() {
    let source = "function f(n) { return n == 0 ? 0 : 1 + f(n - 1); } f(300)";
    let (one_pass, stepped) = one_pass_and_stepped(source);
    for value in [one_pass, stepped] {
        let Value::Error(error) = value else {
            panic!("expected an error value");
        };
        assert_eq!(error.origin().message, "Maximum call depth exceeded.");
    }

    let shallow = "function f(n) { return n == 0 ? 0 : 1 + f(n - 1); } f(20)";
    assert_eq!(evaluate(shallow).to_number(), 20.0);

    // The limit counts live frames, so loops run as long as they need.
    let looping = "var i = 0; while (i < 5000) { i++; } i";
    assert_eq!(evaluate(looping).to_number(), 5000.0);
}

/// Records binary operators in visiting order and counts calls.
#[derive(Default)]
struct OperatorCounter {
    operators: Vec<&'static str>,
    calls: usize,
}

impl Visitor for OperatorCounter {
    fn visit_binary(&mut self, _expr: &Rc<Expr>, left: &Rc<Expr>, op: BinaryOp, right: &Rc<Expr>) {
        self.operators.push(op.symbol());
        walk_binary(self, left, right);
    }

    fn visit_call(&mut self, _expr: &Rc<Expr>, left: &Rc<Expr>, arguments: &[Rc<Expr>]) {
        self.calls += 1;
        walk_call(self, left, arguments);
    }
}

#[test]
fn visitor_dispatches_per_node_kind() {
    let mut counter = OperatorCounter::default();
    counter.visit(&parse("var a = 1; f(a + 2, g(a * 3)) - 4"));
    assert_eq!(counter.operators, vec!["-", "+", "*"]);
    assert_eq!(counter.calls, 2);

    let mut counter = OperatorCounter::default();
    counter.visit(&parse("function h(x) { return x < 1 ? h(x - 1) : 0; }"));
    assert_eq!(counter.operators, vec!["<", "-"]);
    assert_eq!(counter.calls, 1);
}

/// Replaces an unbound name with a number.
struct InlineConstant {
    name: &'static str,
    value: f64,
}

impl Rewriter for InlineConstant {
    fn rewrite(&mut self, expr: &Rc<Expr>) -> Rc<Expr> {
        if expr.is_unbound_member() && expr.is_member(self.name) {
            return Expr::new(expr.location, ExprKind::Constant(Value::number(self.value)));
        }
        rewrite_children(self, expr)
    }
}

#[test]
fn rewriter_rebuilds_only_changed_nodes() {
    let mut inline = InlineConstant {
        name: "answer",
        value: 42.0,
    };

    let untouched = parse("(a * b) + c");
    assert!(Rc::ptr_eq(&inline.rewrite(&untouched), &untouched));

    let original = parse("(a * b) + answer * r");
    let rewritten = inline.rewrite(&original);
    assert!(!Rc::ptr_eq(&rewritten, &original));
    assert_eq!(original.to_string(), "((a * b) + (answer * r))");
    assert_eq!(rewritten.to_string(), "((a * b) + (42 * r))");
    let (
        ExprKind::Binary { left: before, .. },
        ExprKind::Binary { left: after, .. },
    ) = (&original.kind, &rewritten.kind)
    else {
        panic!("expected binary nodes");
    };
    assert!(Rc::ptr_eq(before, after));

    let mut evaluator = Evaluator::default();
    let program = parse("function f() { return answer; } f() * 2");
    assert!(matches!(evaluator.evaluate(&program).unwrap(), Value::Error(_)));
    let program = inline.rewrite(&program);
    assert_eq!(evaluator.evaluate(&program).unwrap().to_number(), 84.0);
}
