use std::fs;

use skein_interpret::{ExecError, Interpreter, InterpreterConfig, PackageConfig, Value};

fn interp_with_path(path: String) -> Interpreter {
    let mut package = PackageConfig::default();
    package.path = path;
    Interpreter::new(InterpreterConfig {
        package,
        capture_output: true,
        ..Default::default()
    })
}

#[test]
fn require_resolves_templates_and_caches() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::create_dir_all(dir.path().join("util")).expect("mkdir");
    fs::write(
        dir.path().join("util").join("math.sk"),
        "print(\"loading\", ...)\nreturn {double: fn(x) { return x * 2 }}\n",
    )
    .expect("write module");

    let template = format!("{}/missing/?.sk;{}/?.sk", dir.path().display(), dir.path().display());
    let mut interp = interp_with_path(template);
    let values = interp
        .exec_source(
            "let m = require(\"util.math\")\n\
             let again = require(\"util.math\")\n\
             return m.double(21), m == again\n",
            "main",
        )
        .expect("run");

    assert_eq!(values, vec![Value::Number(42.0), Value::Bool(true)]);
    assert_eq!(interp.take_output(), "loading\tutil.math\n");
}

#[test]
fn modules_without_a_return_value_load_as_true() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join("side.sk"), "flag = \"set\"\n").expect("write module");

    let mut interp = interp_with_path(format!("{}/?.sk", dir.path().display()));
    let values = interp
        .exec_source("return require(\"side\"), flag\n", "main")
        .expect("run");
    assert_eq!(values, vec![Value::Bool(true), Value::str("set")]);
}

#[test]
fn missing_module_lists_every_candidate() {
    let mut interp = interp_with_path("/nonexistent/a/?.sk;/nonexistent/b/?.sk".to_string());
    let err = match interp.exec_source("require(\"ghost\")\n", "main") {
        Err(ExecError::Runtime(err)) => err,
        other => panic!("expected runtime error, got {other:?}"),
    };
    assert!(err.message.starts_with("main:1: module 'ghost' not found:"), "{}", err.message);
    assert!(err.message.contains("no file '/nonexistent/a/ghost.sk'"));
    assert!(err.message.contains("no file '/nonexistent/b/ghost.sk'"));
}

#[test]
fn native_modules_take_precedence_over_files() {
    let mut interp = interp_with_path("/nonexistent/?.sk".to_string());
    interp.register_module("answers", |_| {
        let mut map = std::collections::BTreeMap::new();
        map.insert("value".to_string(), Value::Number(42.0));
        Ok(Value::map(map))
    });
    let values = interp
        .exec_source("return require(\"answers\").value\n", "main")
        .expect("run");
    assert_eq!(values, vec![Value::Number(42.0)]);
}

#[test]
fn package_strings_are_script_visible_and_writable() {
    let mut interp = Interpreter::default();
    let before = interp.package_config();
    assert_eq!(before, PackageConfig::default());

    interp
        .exec_source("package.path = \"/opt/lib/?.sk\"\npackage.cpath = \"\"\n", "main")
        .expect("run");
    let after = interp.package_config();
    assert_eq!(after.path, "/opt/lib/?.sk");
    assert_eq!(after.cpath, "");
    assert_eq!(after.config, before.config);
}

#[test]
fn circular_requires_are_reported() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join("a.sk"), "return require(\"b\")\n").expect("write a");
    fs::write(dir.path().join("b.sk"), "return require(\"a\")\n").expect("write b");

    let mut interp = interp_with_path(format!("{}/?.sk", dir.path().display()));
    let err = interp.exec_source("require(\"a\")\n", "main").expect_err("should fail");
    assert!(err.to_string().contains("loop while loading module 'a'"), "{err}");
}
