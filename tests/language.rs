use std::cell::RefCell;
use std::fs;
use std::rc::Rc;

use pretty_assertions::assert_eq;
use wisp::callable::Callable;
use wisp::environment::Environment;
use wisp::evaluator::RuntimeError;
use wisp::value::Value;
use wisp::{create_default_environment, run, RunError};

fn eval(source: &str) -> Value {
    run(source, None).expect("program should succeed")
}

fn eval_err(source: &str) -> RunError {
    run(source, None).expect_err("program should fail")
}

fn number(source: &str) -> f64 {
    match eval(source) {
        Value::Number(n) => n,
        other => panic!("expected a number, got {other:?}"),
    }
}

/// A default environment whose `print` records lines instead of writing to
/// stdout, exercising the host-injection seam.
fn recording_environment() -> (Environment, Rc<RefCell<Vec<String>>>) {
    let lines = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&lines);
    let environment = create_default_environment();
    environment.define(
        "print",
        Value::Callable(Callable::native("print", move |_, args| {
            let line = args
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(" ");
            sink.borrow_mut().push(line);
            Ok(Value::Absent)
        })),
    );
    (environment, lines)
}

#[test]
fn precedence_follows_the_usual_ladder() {
    assert_eq!(number("1 + 2 * 3"), 7.0);
    assert_eq!(number("(1 + 2) * 3"), 9.0);
    assert_eq!(eval("2 < 3 && 3 < 4"), Value::Bool(true));
}

#[test]
fn runs_are_deterministic_against_fresh_environments() {
    let source = "
        fn square(n) { return n * n; }
        let total = 0;
        let i = 1;
        while (i <= 4) { total = total + square(i); i = i + 1; }
        total
    ";
    assert_eq!(eval(source), eval(source));
    assert_eq!(eval(source), Value::Number(30.0));
}

#[test]
fn block_bindings_are_invisible_after_the_block() {
    assert!(matches!(
        eval_err("{ let hidden = 1; } hidden"),
        RunError::Runtime(RuntimeError::UndefinedVariable { .. })
    ));
}

#[test]
fn inner_shadowing_does_not_mutate_the_outer_binding() {
    let source = "
        let x = 1;
        { let x = 2; x = 3; }
        x
    ";
    assert_eq!(number(source), 1.0);
}

#[test]
fn closures_observe_later_updates_to_captured_variables() {
    let source = "
        let x = 1;
        fn get() { return x; }
        x = 2;
        get()
    ";
    assert_eq!(number(source), 2.0);
}

#[test]
fn assignment_to_an_undeclared_name_is_an_error() {
    // locked behavior: no implicit definition on assignment
    assert!(matches!(
        eval_err("y = 5"),
        RunError::Runtime(RuntimeError::UndefinedVariable { .. })
    ));
}

#[test]
fn recursive_factorial() {
    let source = "
        fn fact(n) {
            if (n < 2) { return 1; }
            return n * fact(n - 1);
        }
        fact(6)
    ";
    assert_eq!(number(source), 720.0);
}

#[test]
fn while_loop_prints_the_counting_sequence() {
    let (environment, lines) = recording_environment();
    let source = "
        let i = 0;
        while (i < 5) {
            print(i);
            i = i + 1;
        }
    ";
    run(source, Some(environment)).expect("program should succeed");
    assert_eq!(*lines.borrow(), vec!["0", "1", "2", "3", "4"]);
}

#[test]
fn dotted_access_reaches_host_builtins() {
    assert_eq!(number("math.floor(3.7)"), 3.0);
    assert_eq!(number("math.max(2, math.abs(0 - 9))"), 9.0);
}

#[test]
fn a_builtin_method_is_a_first_class_value() {
    assert_eq!(number("let f = math.floor; f(3.7)"), 3.0);
}

#[test]
fn time_now_is_a_positive_number() {
    match eval("time.now()") {
        Value::Number(n) => assert!(n > 0.0),
        other => panic!("expected a number, got {other:?}"),
    }
}

#[test]
fn json_round_trips_through_scripts() {
    assert_eq!(
        eval("json.encode([1, 'x', true])"),
        Value::text(r#"[1,"x",true]"#)
    );
    let source = r#"
        let o = json.decode('{"a": [1, 2], "b": true}');
        o.a[1]
    "#;
    assert_eq!(number(source), 2.0);
}

#[test]
fn decoding_malformed_json_fails() {
    assert!(matches!(
        eval_err("json.decode('{')"),
        RunError::Runtime(RuntimeError::InvalidJson { .. })
    ));
}

#[test]
fn tasks_spawn_and_join() {
    let source = "
        let t = tasks.spawn(fn () { return 5; });
        tasks.join(t)
    ";
    assert_eq!(number(source), 5.0);
}

#[test]
fn cancelled_tasks_never_run() {
    let source = "
        let ran = false;
        let t = tasks.spawn(fn () { ran = true; });
        let cancelled = tasks.cancel(t);
        [cancelled, ran]
    ";
    assert_eq!(
        eval(source),
        Value::array(vec![Value::Bool(true), Value::Bool(false)])
    );
}

#[test]
fn joining_a_cancelled_task_is_an_error() {
    let source = "
        let t = tasks.spawn(fn () { return 5; });
        tasks.cancel(t);
        tasks.join(t)
    ";
    assert!(matches!(
        eval_err(source),
        RunError::Runtime(RuntimeError::Task { .. })
    ));
}

#[test]
fn yield_drains_pending_tasks() {
    let source = "
        let done = 0;
        let a = tasks.spawn(fn () { done = done + 1; return 1; });
        let b = tasks.spawn(fn () { done = done + 1; return 2; });
        tasks.yield();
        [done, tasks.join(a), tasks.join(b)]
    ";
    assert_eq!(
        eval(source),
        Value::array(vec![
            Value::Number(2.0),
            Value::Number(1.0),
            Value::Number(2.0),
        ])
    );
}

#[test]
fn construct_statement_rebinds_only_on_first_evaluation() {
    let environment = create_default_environment();
    environment.define(
        "Box",
        Value::Callable(Callable::native("Box", |_, args| {
            Ok(Value::array(args.to_vec()))
        })),
    );
    let source = "
        fn make(v) { new Box(v); return Box; }
        let first = make(1);
        let second = make(2);
        [first, second == Box]
    ";
    let value = run(source, Some(environment)).expect("program should succeed");
    // the first call binds the instance; the flag stops the second call from
    // rebinding, so `Box` resolves back to the global factory
    assert_eq!(
        value,
        Value::array(vec![
            Value::array(vec![Value::Number(1.0)]),
            Value::Bool(true),
        ])
    );
}

#[test]
fn require_statement_executes_into_the_calling_scope() {
    let dir = tempfile::tempdir().expect("tempdir should be created");
    let dep = dir.path().join("dep.wisp");
    fs::write(&dep, "let shared = 21;\nfn double(x) { return x * 2; }\n")
        .expect("module should be written");

    let source = format!("require('{}'); double(shared)", dep.display());
    assert_eq!(number(&source), 42.0);
}

#[test]
fn require_expression_yields_the_module_completion_value() {
    let dir = tempfile::tempdir().expect("tempdir should be created");
    let dep = dir.path().join("dep.wisp");
    fs::write(&dep, "let base = 20;\nbase + 1\n").expect("module should be written");

    let source = format!("let v = require('{}'); v + base", dep.display());
    assert_eq!(number(&source), 41.0);
}

#[test]
fn re_requiring_a_module_re_executes_it() {
    let dir = tempfile::tempdir().expect("tempdir should be created");
    let dep = dir.path().join("dep.wisp");
    fs::write(&dep, "count = count + 1;\n").expect("module should be written");

    let source = format!(
        "let count = 0; require('{p}'); require('{p}'); count",
        p = dep.display()
    );
    assert_eq!(number(&source), 2.0);
}

#[test]
fn requiring_a_missing_file_is_an_import_error() {
    assert!(matches!(
        eval_err("require('no_such_module.wisp')"),
        RunError::Runtime(RuntimeError::Import { .. })
    ));
}

#[test]
fn calling_an_undeclared_identifier_is_an_undefined_binding_error() {
    assert!(matches!(
        eval_err("nope(1)"),
        RunError::Runtime(RuntimeError::UndefinedVariable { .. })
    ));
}

#[test]
fn calling_a_non_function_value_is_not_callable() {
    assert!(matches!(
        eval_err("let x = 1; x(2)"),
        RunError::Runtime(RuntimeError::NotCallable { .. })
    ));
}

#[test]
fn an_unterminated_string_is_a_lex_error() {
    assert!(matches!(eval_err("let s = 'oops"), RunError::Lex(..)));
}

#[test]
fn string_escapes_and_concatenation() {
    assert_eq!(eval(r#"'a\tb' + '!' "#), Value::text("a\tb!"));
    assert_eq!(eval("'total: ' + (1 + 2)"), Value::text("total: 3"));
}

#[test]
fn word_operators_behave_like_their_symbolic_forms() {
    assert_eq!(eval("true and false"), Value::Bool(false));
    assert_eq!(eval("false or true"), Value::Bool(true));
    assert_eq!(eval("1 isnt 2"), Value::Bool(true));
}

#[test]
fn break_and_continue_reach_the_loop_through_nested_blocks() {
    let source = "
        let i = 0;
        let odds = 0;
        while (true) {
            i = i + 1;
            { if (i > 6) { break; } }
            { if (i % 2 == 0) { continue; } }
            odds = odds + i;
        }
        odds
    ";
    assert_eq!(number(source), 9.0);
}
