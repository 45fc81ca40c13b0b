// Host contexts resolving names the script does not declare.

use std::cell::Cell;
use std::rc::Rc;
use stepjs::{
    evaluate_with, standard_globals, AccessorFrame, EvaluationStatus, GlobalContext, PExpr,
    ScriptEngine, Value,
};

/// Counts calls to `tick()` and returns the running count.
#[derive(Default)]
struct Ticker {
    ticks: Cell<u32>,
}

impl GlobalContext for Ticker {
    fn visit(&self, frame: &mut AccessorFrame<'_>) -> PExpr {
        let outcome = frame
            .on("tick")
            .on_call(0, |f, _| {
                self.ticks.set(self.ticks.get() + 1);
                f.set_result(Value::number(self.ticks.get() as f64))
            })
            .resolve();
        match outcome {
            PExpr::Unknown => standard_globals(frame),
            outcome => outcome,
        }
    }
}

#[test]
fn logical_operators_short_circuit_host_calls() {
    let ticker = Rc::new(Ticker::default());
    let global: Rc<dyn GlobalContext> = ticker.clone();

    assert!(matches!(
        evaluate_with("false && tick()", Rc::clone(&global)),
        Value::Boolean(false)
    ));
    assert!(matches!(
        evaluate_with("true || tick()", Rc::clone(&global)),
        Value::Boolean(true)
    ));
    assert_eq!(ticker.ticks.get(), 0);

    assert_eq!(evaluate_with("tick() + tick()", Rc::clone(&global)).to_number(), 3.0);
    assert_eq!(ticker.ticks.get(), 2);

    // Unknown names still fall through to the standard globals.
    assert_eq!(evaluate_with("Number('7') + tick()", global).to_number(), 10.0);
    assert_eq!(ticker.ticks.get(), 3);
}

#[test]
fn host_functions_see_undeclared_names_only() {
    let ticker = Rc::new(Ticker::default());
    let value = evaluate_with(
        "function tick() { return 100; } tick()",
        ticker.clone() as Rc<dyn GlobalContext>,
    );
    assert_eq!(value.to_number(), 100.0);
    assert_eq!(ticker.ticks.get(), 0);
}

/// Exposes a fixed array as `arr[i]` and `arr.length`.
struct ArrayHost {
    items: Vec<f64>,
}

impl GlobalContext for ArrayHost {
    fn visit(&self, frame: &mut AccessorFrame<'_>) -> PExpr {
        frame
            .matcher()
            .on("arr")
            .on_index(|f, index| {
                let item = usize::try_from(index.to_int64())
                    .ok()
                    .and_then(|i| self.items.get(i));
                match item {
                    Some(&n) => f.set_result(Value::number(n)),
                    None => f.set_error("Index out of range."),
                }
            })
            .on("arr")
            .on_get("length", |f| f.set_result(Value::number(self.items.len() as f64)))
            .resolve()
    }
}

fn array_host() -> Rc<dyn GlobalContext> {
    Rc::new(ArrayHost {
        items: vec![10.0, 20.0, 30.0],
    })
}

#[test]
fn indexers_and_members_resolve_through_the_host() {
    assert_eq!(evaluate_with("arr[1]", array_host()).to_number(), 20.0);
    assert_eq!(evaluate_with("arr[0] + arr[2]", array_host()).to_number(), 40.0);
    assert_eq!(evaluate_with("arr.length", array_host()).to_number(), 3.0);
    assert_eq!(
        evaluate_with(
            "var i = 0, s = 0; while (i < arr.length) { s += arr[i]; i++; } s",
            array_host()
        )
        .to_number(),
        60.0
    );
}

#[test]
fn host_errors_become_error_values() {
    let Value::Error(error) = evaluate_with("1 + arr[5]", array_host()) else {
        panic!("expected an error value");
    };
    assert_eq!(error.message, "Index out of range.");
    assert_eq!(error.culprit.to_string(), "arr[5]");

    // Nothing matched `arr.size`, so the unbound name itself is reported.
    let Value::Error(error) = evaluate_with("arr.size", array_host()) else {
        panic!("expected an error value");
    };
    assert_eq!(error.message, "Undefined in scope: arr");

    // The array host does not fall back to the standard globals.
    let Value::Error(error) = evaluate_with("Number(1)", array_host()) else {
        panic!("expected an error value");
    };
    assert_eq!(error.message, "Undefined in scope: Number");
}

/// `twice(x)` doubles its argument.
struct Doubler;

impl GlobalContext for Doubler {
    fn visit(&self, frame: &mut AccessorFrame<'_>) -> PExpr {
        frame
            .on("twice")
            .on_call(1, |f, args| {
                let n = args.first().map_or(0.0, Value::to_number);
                f.set_result(Value::number(n * 2.0))
            })
            .resolve()
    }
}

#[test]
fn stepping_suspends_inside_host_call_arguments() {
    let mut engine = ScriptEngine::with_global(Rc::new(Doubler));
    engine.breakpoints_mut().break_always = true;
    let mut handle = engine.execute("twice(3 * 4)").unwrap();

    let mut visited = Vec::new();
    while handle.is_pending() {
        visited.push(handle.current().unwrap().to_string());
        handle.continue_evaluation().unwrap();
    }

    assert_eq!(visited, vec!["twice((3 * 4))", "(3 * 4)"]);
    assert_eq!(handle.status(), EvaluationStatus::Finished);
    assert_eq!(handle.result().map(Value::to_number), Some(24.0));
}
