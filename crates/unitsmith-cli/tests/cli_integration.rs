//! Integration tests for unitsmith-cli functionality.
//! Tests the underlying library functions that the CLI commands invoke.

use std::fs;
use std::path::Path;

use unitsmith_core::config::{GatePolicy, UnitsmithConfig};
use unitsmith_core::model::ProjectModel;
use unitsmith_core::storage;
use unitsmith_engine::gate::Rejection;
use unitsmith_engine::{ComplexityGate, DependencyContextAssembler, GateDecision, SourceResolver};
use unitsmith_parser::index::index_sources;

const CHECKOUT: &str = r"package com.acme.shop;

import com.acme.ledger.Ledger;

public class Checkout {
    private final Ledger ledger;

    public Checkout(Ledger ledger) {
        this.ledger = ledger;
    }

    public int settle(int amount, boolean member) {
        if (amount <= 0) {
            return 0;
        }
        if (member) {
            amount = amount - 5;
        }
        ledger.post(amount);
        return amount;
    }
}
";

const LEDGER: &str = r"package com.acme.ledger;

public class Ledger {
    private int balance;

    public void post(int amount) {
        balance += amount;
    }

    public int balance() {
        return balance;
    }
}
";

fn write_project(root: &Path) {
    let shop = root.join("src/main/java/com/acme/shop");
    let ledger = root.join("src/main/java/com/acme/ledger");
    fs::create_dir_all(&shop).unwrap();
    fs::create_dir_all(&ledger).unwrap();
    fs::write(shop.join("Checkout.java"), CHECKOUT).unwrap();
    fs::write(ledger.join("Ledger.java"), LEDGER).unwrap();
}

#[test]
fn test_load_index_without_index_fails() {
    let tmpdir = tempfile::tempdir().unwrap();
    assert!(!storage::index_exists(tmpdir.path()));
    assert!(storage::load_index(tmpdir.path()).is_err());
}

#[test]
fn test_index_save_load_roundtrip() {
    let tmpdir = tempfile::tempdir().unwrap();
    write_project(tmpdir.path());

    let config = UnitsmithConfig::default();
    let roots: Vec<_> = config
        .harness
        .source_roots
        .iter()
        .map(|r| tmpdir.path().join(r))
        .collect();
    let index = index_sources(&roots).unwrap();
    assert_eq!(index.len(), 2);

    storage::save_index(tmpdir.path(), &index).unwrap();
    assert!(!storage::ensure_gitignore(tmpdir.path()).unwrap());
    assert!(storage::ensure_gitignore(tmpdir.path()).unwrap());

    let loaded = storage::load_index(tmpdir.path()).unwrap();
    assert_eq!(loaded.len(), 2);
    assert_eq!(loaded.method_count(), index.method_count());
    let checkout = loaded.class_unit("Checkout").unwrap();
    assert!(checkout.method("settle(int, boolean)").is_some());
}

#[test]
fn test_context_of_fully_modelled_method_is_gated_out() {
    let tmpdir = tempfile::tempdir().unwrap();
    write_project(tmpdir.path());
    let index = index_sources(&[tmpdir.path().join("src/main/java")]).unwrap();

    let checkout = index.class_unit("com.acme.shop.Checkout").unwrap();
    let settle = index.method_unit(checkout, "settle(int,boolean)").unwrap();
    let resolver = SourceResolver::without_fallback();
    let ctx = DependencyContextAssembler::new(&index, &resolver, 1).assemble(checkout, settle, 0);

    assert!(ctx.method_deps.contains_key("com.acme.ledger.Ledger"));
    assert!(ctx.method_deps["com.acme.ledger.Ledger"].contains("balance += amount"));
    assert!(ctx.external_method_deps.is_empty());
    assert_eq!(ctx.activations, 0);

    let gate = ComplexityGate::new(GatePolicy::BranchConstructs { threshold: 2 });
    assert_eq!(
        gate.admit(&ctx),
        GateDecision::Reject(Rejection::NoActivations)
    );

    let strict = ComplexityGate::new(GatePolicy::BranchConstructs { threshold: 3 });
    assert!(matches!(
        strict.admit(&ctx),
        GateDecision::Reject(Rejection::BelowThreshold { score: 2, .. })
    ));
}

#[test]
fn test_config_file_drives_cli_defaults() {
    let tmpdir = tempfile::tempdir().unwrap();
    let dir = storage::unitsmith_dir(tmpdir.path());
    fs::create_dir_all(&dir).unwrap();
    fs::write(
        dir.join("config.toml"),
        r#"
[generation]
attempt_count = 4
stop_when_success = false
enable_multithreading = true

[context]
dependency_paths = ["lib/money.jar"]

[gate.policy]
kind = "decision-points"
threshold = 3
"#,
    )
    .unwrap();

    let config = UnitsmithConfig::load(tmpdir.path()).unwrap();
    assert_eq!(config.generation.attempt_count, 4);
    assert!(config.generation.enable_multithreading);
    assert_eq!(config.context.dependency_paths.len(), 1);
    assert_eq!(config.gate.policy, GatePolicy::DecisionPoints { threshold: 3 });
    assert_eq!(config.generation.max_rounds, 3, "unset keys keep defaults");
}
