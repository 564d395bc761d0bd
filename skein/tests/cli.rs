use std::fs;
use std::path::Path;
use std::process::{Command, Output};

fn skein(args: &[&str], cwd: &Path) -> Output {
    Command::new(env!("CARGO_BIN_EXE_skein"))
        .args(args)
        .current_dir(cwd)
        .env_remove("SKEIN_PATH")
        .env_remove("SKEIN_CPATH")
        .output()
        .expect("spawn skein")
}

#[test]
fn eval_prints_returned_values() {
    let dir = tempfile::tempdir().expect("tempdir");
    let out = skein(&["eval", "return 1 + 2, 'x'"], dir.path());
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert_eq!(String::from_utf8_lossy(&out.stdout), "3\tx\n");
}

#[test]
fn run_uses_manifest_search_path_in_workers() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::create_dir(dir.path().join("lib")).expect("lib dir");
    fs::write(dir.path().join("skein.toml"), "[package]\npath = [\"lib/?.sk\"]\n")
        .expect("manifest");
    fs::write(
        dir.path().join("lib/util.sk"),
        "return {double: fn(x) { return x * 2 }}\n",
    )
    .expect("module");
    let main = dir.path().join("main.sk");
    fs::write(
        &main,
        "let n = tonumber(...)
let t = thread.spawn(fn(n) { return require(\"util\").double(n) }, n)
let ok, v = t.join()
print(ok, v)
",
    )
    .expect("script");

    let main = main.to_str().expect("utf-8 path");
    let out = skein(&["run", main, "21"], dir.path());
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert_eq!(String::from_utf8_lossy(&out.stdout), "true\t42\n");
}

#[test]
fn script_errors_fail_with_a_traceback() {
    let dir = tempfile::tempdir().expect("tempdir");
    let main = dir.path().join("main.sk");
    fs::write(&main, "fn f() {\n    error(\"boom\")\n}\nf()\n").expect("script");

    let out = skein(&["run", main.to_str().expect("utf-8 path")], dir.path());
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("boom"), "{stderr}");
    assert!(stderr.contains("stack traceback"), "{stderr}");
}

#[test]
fn syntax_errors_fail() {
    let dir = tempfile::tempdir().expect("tempdir");
    let out = skein(&["eval", "return (1"], dir.path());
    assert!(!out.status.success());
    assert!(!out.stderr.is_empty());
}
