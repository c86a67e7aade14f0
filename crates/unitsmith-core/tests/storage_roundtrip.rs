use std::collections::BTreeSet;

use unitsmith_core::context::PromptContext;
use unitsmith_core::model::{ClassUnit, MethodUnit, ProjectIndex, ProjectModel};
use unitsmith_core::record::{AttemptRecord, AttemptResult, AttemptStatus, Coverage};
use unitsmith_core::storage;

fn sample_index() -> ProjectIndex {
    let mut class = ClassUnit {
        full_name: "com.acme.Cart".into(),
        name: "Cart".into(),
        package: "package com.acme;".into(),
        signature: "public class Cart".into(),
        ..ClassUnit::default()
    };
    let mut deps = BTreeSet::new();
    deps.insert("price(int)".to_string());
    let mut method = MethodUnit {
        name: "total".into(),
        signature: "total()".into(),
        source: "public int total() { return pricing.price(1); }".into(),
        ..MethodUnit::default()
    };
    method
        .dependent_methods
        .insert("com.acme.Pricing".to_string(), deps);
    class.insert_method(method);

    let mut index = ProjectIndex::new();
    index.insert(class);
    index
}

#[test]
fn test_load_nonexistent_index() {
    let tmpdir = tempfile::tempdir().unwrap();
    assert!(storage::load_index(tmpdir.path()).is_err());
    assert!(!storage::index_exists(tmpdir.path()));
}

#[test]
fn test_index_roundtrip() {
    let tmpdir = tempfile::tempdir().unwrap();
    storage::save_index(tmpdir.path(), &sample_index()).unwrap();
    assert!(storage::index_exists(tmpdir.path()));

    let loaded = storage::load_index(tmpdir.path()).unwrap();
    let class = loaded.class_unit("com.acme.Cart").unwrap();
    let method = loaded.method_unit(class, "total( )").unwrap();
    assert!(method.dependent_methods.contains_key("com.acme.Pricing"));
}

#[test]
fn test_write_report_uses_stem() {
    let tmpdir = tempfile::tempdir().unwrap();
    let mut ctx = PromptContext::default();
    ctx.class_name = "com.acme.Cart".into();
    ctx.method_signature = "total()".into();
    ctx.attempt = 0;
    let result = AttemptResult {
        status: AttemptStatus::Exhausted,
        round: 3,
        elapsed: std::time::Duration::from_secs(2),
        coverage: Some(Coverage::Error("no launcher".into())),
    };
    let record = AttemptRecord::finished(&ctx, &result);
    let path = storage::write_report(tmpdir.path(), &record).unwrap();
    assert!(path.ends_with("reports/Cart_total_0.json"));

    let json = std::fs::read_to_string(path).unwrap();
    let back: AttemptRecord = serde_json::from_str(&json).unwrap();
    assert_eq!(back.status, AttemptStatus::Exhausted);
    assert!(!back.passed);
    assert_eq!(back.round, 3);
}

#[test]
fn test_ensure_gitignore_appends_once() {
    let tmpdir = tempfile::tempdir().unwrap();
    std::fs::write(tmpdir.path().join(".gitignore"), "target/").unwrap();

    assert!(!storage::ensure_gitignore(tmpdir.path()).unwrap());
    assert!(storage::ensure_gitignore(tmpdir.path()).unwrap());

    let content = std::fs::read_to_string(tmpdir.path().join(".gitignore")).unwrap();
    assert_eq!(content.matches(".unitsmith/").count(), 1);
    assert!(content.starts_with("target/\n"));
}
