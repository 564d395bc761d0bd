use skein_interpret::{ExecError, Interpreter, InterpreterConfig, Value};

fn capturing() -> Interpreter {
    Interpreter::new(InterpreterConfig {
        capture_output: true,
        ..Default::default()
    })
}

fn run(src: &str) -> (Vec<Value>, String) {
    let mut interp = capturing();
    let values = interp.exec_source(src, "main").expect("script should run");
    (values, interp.take_output())
}

fn run_err(src: &str) -> String {
    match capturing().exec_source(src, "main") {
        Err(ExecError::Runtime(err)) => err.message,
        Err(other) => panic!("expected runtime error, got {other}"),
        Ok(values) => panic!("expected runtime error, got {values:?}"),
    }
}

fn num(n: f64) -> Value {
    Value::Number(n)
}

#[test]
fn print_joins_arguments_with_tabs() {
    let (_, out) = run("print(1 + 2, \"a\" .. 3, 7 % 3, -7 % 3, 1 / 2, nil, true)\n");
    assert_eq!(out, "3\ta3\t1\t2\t0.5\tnil\ttrue\n");
}

#[test]
fn calls_and_varargs_expand_in_last_position() {
    let src = "
fn pass(...) {
    return ...
}
let a, b, c = pass(1, 2)
return a, b, c, len([pass(4, 5, 6)]), (pass(7, 8))
";
    let (values, _) = run(src);
    assert_eq!(values, vec![num(1.0), num(2.0), Value::Nil, num(3.0), num(7.0)]);
}

#[test]
fn chunk_arguments_are_varargs() {
    let mut interp = capturing();
    let main = interp.load("let a, b = ...\nreturn b, a\n", "main").expect("compile");
    let values = interp.call(&main, vec![num(1.0), Value::str("x")]).expect("call");
    assert_eq!(values, vec![Value::str("x"), num(1.0)]);
}

#[test]
fn loops_lists_and_maps() {
    let src = r#"
let xs = []
for i in range(5) {
    if i == 3 {
        break
    }
    push(xs, i * 10)
}
let total = 0
for i, v in xs {
    total = total + i + v
}
let m = {b: 2, a: 1}
let order = ""
for k, v in m {
    order = order .. k .. v
}
while len(xs) < 5 {
    xs[len(xs)] = 0
}
return total, order, len(xs), xs[1], xs[99], m.a, m["b"]
"#;
    let (values, _) = run(src);
    assert_eq!(
        values,
        vec![
            num(33.0),
            Value::str("a1b2"),
            num(5.0),
            num(10.0),
            Value::Nil,
            num(1.0),
            num(2.0)
        ]
    );
}

#[test]
fn else_if_chains_pick_first_match() {
    let src = "
fn classify(n) {
    if n < 0 {
        return \"neg\"
    } else if n == 0 {
        return \"zero\"
    } else {
        return \"pos\"
    }
}
return classify(-1), classify(0), classify(5)
";
    let (values, _) = run(src);
    assert_eq!(values, vec![Value::str("neg"), Value::str("zero"), Value::str("pos")]);
}

#[test]
fn logical_operators_short_circuit() {
    let src = "
calls = 0
fn bump() {
    calls = calls + 1
    return true
}
let a = false and bump()
let b = true or bump()
let c = nil or \"fallback\"
return a, b, c, calls, not nil
";
    let (values, _) = run(src);
    assert_eq!(
        values,
        vec![
            Value::Bool(false),
            Value::Bool(true),
            Value::str("fallback"),
            num(0.0),
            Value::Bool(true)
        ]
    );
}

#[test]
fn functions_resolve_free_names_in_globals() {
    let src = "
let hidden = 1
fn read_hidden() {
    return hidden
}
shown = 2
fn read_shown() {
    return shown
}
return read_hidden(), read_shown()
";
    let (values, _) = run(src);
    assert_eq!(values, vec![Value::Nil, num(2.0)]);
}

#[test]
fn pcall_catches_positioned_errors() {
    let src = "
fn fail() {
    error(\"boom\")
}
let ok, msg = pcall(fail)
let ok2, a, b = pcall(fn(x) { return x, x * 2 }, 4)
return ok, msg, ok2, a, b
";
    let (values, _) = run(src);
    assert_eq!(
        values,
        vec![
            Value::Bool(false),
            Value::str("main:3: boom"),
            Value::Bool(true),
            num(4.0),
            num(8.0)
        ]
    );
}

#[test]
fn runtime_errors_name_the_offending_value() {
    assert_eq!(run_err("let x = nil\nx()\n"), "main:2: attempt to call a nil value (name 'x')");
    assert_eq!(run_err("return 1 + {}\n"), "main:1: attempt to perform arithmetic on a map value");
    assert_eq!(run_err("return 1 < \"a\"\n"), "main:1: attempt to compare number with string");
    assert_eq!(
        run_err("let m = nil\nreturn m.field\n"),
        "main:2: attempt to index a nil value (name 'm')"
    );
    assert_eq!(
        run_err("len(3)\n"),
        "main:1: bad argument #1 to 'len' (list, map or string expected, got number)"
    );
    assert_eq!(run_err("let xs = []\nxs[2] = 1\n"), "main:2: list index 2 out of range (length 0)");
}

#[test]
fn error_with_non_string_is_not_positioned() {
    let (values, _) = run("return pcall(error, 42)\n");
    assert_eq!(values, vec![Value::Bool(false), Value::str("42")]);
}

#[test]
fn assert_returns_its_arguments() {
    let (values, _) = run("return assert(1, \"unused\")\n");
    assert_eq!(values, vec![num(1.0), Value::str("unused")]);
    assert_eq!(run_err("assert(false)\n"), "main:1: assertion failed!");
    assert_eq!(run_err("assert(nil, \"custom\")\n"), "custom");
}

#[test]
fn conversions() {
    let (values, _) = run(
        "return tonumber(\"0x1F\"), tonumber(\"nope\"), tostring(12), type(print), type([])\n",
    );
    assert_eq!(
        values,
        vec![num(31.0), Value::Nil, Value::str("12"), Value::str("function"), Value::str("list")]
    );
}

#[test]
fn deep_recursion_overflows_the_call_limit() {
    let mut interp = Interpreter::new(InterpreterConfig {
        max_call_depth: 16,
        capture_output: true,
        ..Default::default()
    });
    let err = match interp.exec_source("fn f() {\n    return f()\n}\nf()\n", "main") {
        Err(ExecError::Runtime(err)) => err,
        other => panic!("expected stack overflow, got {other:?}"),
    };
    assert_eq!(err.message, "main:2: stack overflow");

    // The interpreter stays usable after the unwinding.
    let values = interp.exec_source("return 1\n", "main").expect("recovered");
    assert_eq!(values, vec![num(1.0)]);
}

#[test]
fn message_handler_formats_pcall_failures() {
    let mut interp = capturing();
    interp.set_message_handler(|err| err.with_traceback());
    let main = interp
        .load("fn inner() {\n    error(\"deep\")\n}\ninner()\n", "job")
        .expect("compile");
    let msg = interp.pcall(&main, Vec::new()).expect_err("should fail");
    assert!(msg.starts_with("job:2: deep\nstack traceback:"), "{msg}");
    assert!(msg.contains("[native]: in function 'error'"), "{msg}");
    assert!(msg.contains("job:2: in function 'inner'"), "{msg}");
    assert!(msg.contains("job:4: in main chunk"), "{msg}");
}

#[test]
fn syntax_errors_surface_from_exec_source() {
    let err = capturing().exec_source("let = 1\n", "main").expect_err("should fail");
    assert!(matches!(err, ExecError::Syntax(_)));
}
