use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::tempdir;

fn kiwi_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_kiwi"))
}

fn kiwi(root: &Path, args: &[&str]) -> Output {
    Command::new(kiwi_bin())
        .arg("--root")
        .arg(root)
        .args(args)
        .output()
        .expect("run kiwi")
}

fn assert_success(out: &Output, what: &str) -> String {
    assert!(
        out.status.success(),
        "{} failed: {}",
        what,
        String::from_utf8_lossy(&out.stderr)
    );
    String::from_utf8_lossy(&out.stdout).to_string()
}

#[test]
fn commands_fail_without_a_store() {
    let dir = tempdir().unwrap();
    let out = kiwi(&dir.path().join("store"), &["stats"]);
    assert!(!out.status.success(), "expected failure without a store");
}

#[test]
fn init_writes_configuration() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("store");
    let out = kiwi(&root, &["--registry", "database", "init"]);
    assert_success(&out, "init");
    assert!(root.join("kiwi.json").exists());
    assert!(root.join("store.db").exists());
    assert!(root.join("scratch.db").exists());

    let config = std::fs::read_to_string(root.join("kiwi.json")).unwrap();
    let config: serde_json::Value = serde_json::from_str(&config).unwrap();
    assert_eq!(config["registry_strategy"], "database");
}

#[test]
fn add_list_remove_roundtrip() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("store");
    assert_success(&kiwi(&root, &["init"]), "init");

    let s = "<http://example.org/alice>";
    let p = "<http://example.org/age>";
    let o = "\"42\"^^<http://www.w3.org/2001/XMLSchema#integer>";
    let added = assert_success(&kiwi(&root, &["add", s, p, o]), "add");
    assert!(added.contains("Added triple"), "unexpected output: {}", added);

    let again = assert_success(&kiwi(&root, &["add", s, p, o]), "add again");
    assert!(
        again.contains("already present"),
        "unexpected output: {}",
        again
    );

    let listed = assert_success(
        &kiwi(&root, &["list", "--subject", s]),
        "list",
    );
    assert!(listed.contains("http://example.org/alice"), "{}", listed);
    assert!(listed.contains("42"), "{}", listed);
    assert_eq!(listed.lines().count(), 1);

    let stats = assert_success(&kiwi(&root, &["stats"]), "stats");
    assert!(stats.contains("Triples: 1"), "{}", stats);

    let removed = assert_success(&kiwi(&root, &["remove", s, p, o]), "remove");
    assert!(removed.contains("Removed triple"), "{}", removed);
    let listed = assert_success(&kiwi(&root, &["list"]), "list after remove");
    assert!(listed.trim().is_empty(), "{}", listed);
    let stats = assert_success(&kiwi(&root, &["stats"]), "stats");
    assert!(stats.contains("Deleted triples: 1"), "{}", stats);
}

#[test]
fn prefixed_names_use_namespaces() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("store");
    assert_success(&kiwi(&root, &["init"]), "init");
    assert_success(
        &kiwi(&root, &["namespace", "set", "ex", "http://example.org/"]),
        "namespace set",
    );
    assert_success(
        &kiwi(&root, &["add", "ex:bob", "ex:knows", "ex:carol", "--context", "ex:g"]),
        "add prefixed",
    );
    let listed = assert_success(
        &kiwi(&root, &["list", "--context", "<http://example.org/g>"]),
        "list by context",
    );
    assert!(
        listed.contains("<http://example.org/bob> <http://example.org/knows> <http://example.org/carol> <http://example.org/g> ."),
        "{}",
        listed
    );

    let namespaces = assert_success(&kiwi(&root, &["namespace", "list"]), "namespace list");
    assert!(namespaces.contains("ex: <http://example.org/>"), "{}", namespaces);

    // rebinding a prefix replaces the old binding
    assert_success(
        &kiwi(&root, &["namespace", "set", "ex", "http://example.com/"]),
        "namespace rebind",
    );
    let namespaces = assert_success(&kiwi(&root, &["namespace", "list"]), "namespace list");
    assert!(namespaces.contains("ex: <http://example.com/>"), "{}", namespaces);
    assert_eq!(namespaces.lines().count(), 1);

    assert_success(&kiwi(&root, &["namespace", "remove", "ex"]), "namespace remove");
    let namespaces = assert_success(&kiwi(&root, &["namespace", "list"]), "namespace list");
    assert!(namespaces.trim().is_empty(), "{}", namespaces);
}

#[test]
fn reset_clears_the_store() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("store");
    assert_success(&kiwi(&root, &["init"]), "init");
    assert_success(
        &kiwi(
            &root,
            &["add", "_:b0", "<http://example.org/p>", "\"hello\"@en"],
        ),
        "add",
    );
    assert_success(&kiwi(&root, &["reset", "--force"]), "reset");
    let stats = assert_success(&kiwi(&root, &["stats"]), "stats");
    assert!(stats.contains("Triples: 0"), "{}", stats);
    assert!(stats.contains("Nodes: 0"), "{}", stats);
}

#[test]
fn invalid_terms_are_rejected() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("store");
    assert_success(&kiwi(&root, &["init"]), "init");
    let out = kiwi(
        &root,
        &["add", "\"literal\"", "<http://example.org/p>", "<http://example.org/o>"],
    );
    assert!(!out.status.success(), "literal subject must be rejected");
    let out = kiwi(&root, &["add", "<http://example.org/s>", "_:p", "<http://example.org/o>"]);
    assert!(!out.status.success(), "blank node predicate must be rejected");
}

#[test]
fn run_from_args_parses_like_the_binary() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("store");
    let root_arg = root.to_string_lossy().to_string();
    kiwi_cli::run_from_args(["kiwi", "--root", root_arg.as_str(), "init"]).unwrap();
    kiwi_cli::run_from_args([
        "kiwi",
        "--root",
        root_arg.as_str(),
        "add",
        "<http://example.org/s>",
        "<http://example.org/p>",
        "<http://example.org/o>",
    ])
    .unwrap();
    assert!(kiwi_cli::run_from_args(["kiwi", "--root", root_arg.as_str(), "bogus"]).is_err());
}
