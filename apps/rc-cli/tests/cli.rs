// Drives the `rulecard` binary end to end.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

const MANIFEST: &str = r#"agents:
  auth:
    name: Authentication Specialist
    rule_selector:
      categories: [AUTH]
    policy:
      targets: ["**/*.java"]
"#;

fn card(id: &str, scope: &str) -> String {
    format!(
        "id: {id}\n\
         title: Rule {id}\n\
         severity: high\n\
         scope: {scope}\n\
         requirement: Requirement text for {id}.\n\
         do: [Do the safe thing]\n\
         dont: [Do the unsafe thing]\n\
         detect:\n  semgrep: [{id}-semgrep]\n\
         verify:\n  tests: [A test proves it]\n"
    )
}

fn project() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("rules")).unwrap();
    fs::write(dir.path().join("agents.yaml"), MANIFEST).unwrap();
    fs::write(dir.path().join("rules/pw-001.yaml"), card("AUTH-PW-001", "auth")).unwrap();
    fs::write(dir.path().join("rules/pw-002.yaml"), card("AUTH-PW-002", "auth")).unwrap();
    dir
}

fn rulecard(root: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_rulecard"))
        .arg("--project-root")
        .arg(root)
        .args(args)
        .env_remove("SOURCE_DATE_EPOCH")
        .env_remove("RUST_LOG")
        .output()
        .unwrap()
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn compile_writes_packages_and_exits_zero() {
    let dir = project();
    let output = rulecard(dir.path(), &["compile", "--build-date", "2026-10-18T12:00:00Z"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let text = stdout(&output);
    assert!(text.contains("OK: 0 error(s), 0 warning(s)"));
    assert!(text.contains("version 1.20261018120000"));

    let package: serde_json::Value =
        serde_json::from_slice(&fs::read(dir.path().join("dist/agents/auth.json")).unwrap()).unwrap();
    assert_eq!(package["build_date"], "2026-10-18T12:00:00Z");
    assert_eq!(package["rules"], serde_json::json!(["AUTH-PW-001", "AUTH-PW-002"]));
}

#[test]
fn source_date_epoch_pins_the_stamp() {
    let dir = project();
    let output = Command::new(env!("CARGO_BIN_EXE_rulecard"))
        .arg("--project-root")
        .arg(dir.path())
        .arg("compile")
        .env("SOURCE_DATE_EPOCH", "1700000000")
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(stdout(&output).contains("version 1.20231114221320"));
}

#[test]
fn package_version_override() {
    let dir = project();
    let output = rulecard(dir.path(), &["compile", "--package-version", "2.1.0"]);
    assert!(output.status.success());
    let package: serde_json::Value =
        serde_json::from_slice(&fs::read(dir.path().join("dist/agents/auth.json")).unwrap()).unwrap();
    assert_eq!(package["version"], "2.1.0");
}

#[test]
fn invalid_card_exits_nonzero_without_output() {
    let dir = project();
    fs::write(dir.path().join("rules/broken.yaml"), "id: AUTH-PW-003\n").unwrap();

    let output = rulecard(dir.path(), &["compile"]);
    assert!(!output.status.success());
    let text = stdout(&output);
    assert!(text.contains("error[schema]"));
    assert!(text.contains("broken.yaml"));
    assert!(text.contains("FAILED"));
    assert!(!dir.path().join("dist").exists());
}

#[test]
fn json_report_is_machine_readable() {
    let dir = project();
    fs::write(dir.path().join("rules/dup.yaml"), card("AUTH-PW-001", "auth")).unwrap();

    let output = rulecard(dir.path(), &["validate", "--format", "json"]);
    assert!(!output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["diagnostics"][0]["kind"], "duplicate_id");
}

#[test]
fn verify_accepts_fresh_output_and_rejects_tampering() {
    let dir = project();
    assert!(rulecard(dir.path(), &["compile"]).status.success());
    let out = dir.path().join("dist/agents");

    let output = rulecard(
        dir.path(),
        &["verify", out.to_str().unwrap(), "--rules-dir", dir.path().join("rules").to_str().unwrap()],
    );
    assert!(output.status.success(), "{}", stdout(&output));
    assert!(stdout(&output).contains("1 package(s) checked, 0 failed"));

    let path = out.join("auth.json");
    let tampered = fs::read_to_string(&path)
        .unwrap()
        .replace("\"severity\": \"high\"", "\"severity\": \"low\"");
    fs::write(&path, tampered).unwrap();

    let output = rulecard(dir.path(), &["verify", path.to_str().unwrap()]);
    assert!(!output.status.success());
    assert!(stdout(&output).contains("invalid: source_digest"));
}

#[test]
fn verify_reports_drift_against_rules() {
    let dir = project();
    assert!(rulecard(dir.path(), &["compile"]).status.success());
    fs::write(
        dir.path().join("rules/pw-002.yaml"),
        card("AUTH-PW-002", "auth").replace("severity: high", "severity: critical"),
    )
    .unwrap();

    let output = rulecard(
        dir.path(),
        &[
            "verify",
            dir.path().join("dist/agents/auth.json").to_str().unwrap(),
            "--rules-dir",
            dir.path().join("rules").to_str().unwrap(),
        ],
    );
    assert!(!output.status.success());
    assert!(stdout(&output).contains("drift: rule 'AUTH-PW-002' has changed"));
}

#[test]
fn verify_with_manifest_reports_newly_selected_cards() {
    let dir = project();
    assert!(rulecard(dir.path(), &["compile"]).status.success());
    fs::write(dir.path().join("rules/pw-003.yaml"), card("AUTH-PW-003", "auth")).unwrap();

    let package = dir.path().join("dist/agents/auth.json");
    let rules = dir.path().join("rules");
    let base = [
        "verify",
        package.to_str().unwrap(),
        "--rules-dir",
        rules.to_str().unwrap(),
    ];
    assert!(rulecard(dir.path(), &base).status.success());

    let manifest = dir.path().join("agents.yaml");
    let mut args = base.to_vec();
    args.extend(["--manifest", manifest.to_str().unwrap()]);
    let output = rulecard(dir.path(), &args);
    assert!(!output.status.success());
    assert!(stdout(&output).contains("drift: selector now matches a different rule set; newly selected: AUTH-PW-003"));
}

#[test]
fn list_shows_agents_and_orphans() {
    let dir = project();
    fs::write(dir.path().join("rules/net.yaml"), card("K8S-NET-001", "k8s:network")).unwrap();

    let output = rulecard(dir.path(), &["list"]);
    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("auth (2 rule(s))"));
    assert!(text.contains("orphaned (1 card(s))"));
    assert!(text.contains("K8S-NET-001"));
    assert!(!dir.path().join("dist").exists());
}
