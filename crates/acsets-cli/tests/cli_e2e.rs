use std::fs;
use std::path::PathBuf;
use std::process::{Command, Output};

fn acsets_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_acsets"))
}

fn run(args: &[&str]) -> Output {
    Command::new(acsets_bin())
        .args(args)
        .env("NO_COLOR", "1")
        .env("CLICOLOR", "0")
        .env_remove("RUST_LOG")
        .output()
        .expect("run acsets")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn schema_text_is_checkable() {
    let output = run(&["schema"]);
    assert!(output.status.success(), "{}", stderr(&output));
    let text = stdout(&output);
    assert!(text.starts_with("schema MiraNet:"));
    assert!(text.contains("object S \"Species\""));

    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("mira.schema");
    fs::write(&path, &text).expect("write schema");

    let output = run(&["check", path.to_str().expect("utf-8 path")]);
    assert!(output.status.success(), "{}", stderr(&output));
    let summary = stdout(&output);
    assert!(summary.contains("Objects: 5"));
    assert!(summary.contains("Attributes: 18"));
    assert!(summary.contains("Valid."));
}

#[test]
fn schema_json_lists_declarations() {
    let output = run(&["schema", "--format", "json"]);
    assert!(output.status.success(), "{}", stderr(&output));
    let json: serde_json::Value = serde_json::from_str(&stdout(&output)).expect("json");
    assert_eq!(json["name"], "MiraNet");
    assert_eq!(json["obs"].as_array().map(Vec::len), Some(5));
    assert_eq!(json["attrs"].as_array().map(Vec::len), Some(18));
}

#[test]
fn check_reports_the_failing_line() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("broken.schema");
    fs::write(
        &path,
        "schema Broken:\n  object A\n  hom f : A -> Missing\n",
    )
    .expect("write schema");

    let output = run(&["check", path.to_str().expect("utf-8 path")]);
    assert!(!output.status.success());
    let err = stderr(&output);
    assert!(err.contains("invalid schema"), "{err}");
    assert!(err.contains("Missing"), "{err}");

    fs::write(&path, "schema Broken:\n  object\n").expect("write schema");
    let output = run(&["check", path.to_str().expect("utf-8 path")]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("line 2"), "{}", stderr(&output));
}

#[test]
fn demo_prints_the_sir_net() {
    let output = run(&["demo"]);
    assert!(output.status.success(), "{}", stderr(&output));
    let text = stdout(&output);
    assert!(text.contains("policy: cascade"));
    assert!(text.contains("S + I -> I + I"));
    assert!(text.contains("rate=gamma*I"));
}

#[test]
fn demo_remove_follows_the_policy() {
    let output = run(&["demo", "--remove", "R"]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(stdout(&output).contains("I -> ∅"));

    let output = run(&["demo", "--policy", "reject", "--remove", "R"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("still reference"), "{}", stderr(&output));

    let output = run(&["demo", "--policy", "drop"]);
    assert!(!output.status.success());
}

#[test]
fn demo_json_is_a_snapshot() {
    let output = run(&["demo", "--json"]);
    assert!(output.status.success(), "{}", stderr(&output));
    let json: serde_json::Value = serde_json::from_str(&stdout(&output)).expect("json");
    assert_eq!(json["schema"], "MiraNet");
    assert_eq!(json["parts"]["S"].as_array().map(Vec::len), Some(3));
    assert_eq!(json["parts"]["I"].as_array().map(Vec::len), Some(3));
}
