//! Integration tests for execution sequencing
//!
//! Covers:
//! - Dependencies execute before dependents, in declared order
//! - Each body runs exactly once
//! - Export stores are shared between dependents
//! - Registrations without dependencies or body

mod common;

use common::{url, Harness};
use modseq_engine::{Exports, UnitStatus};
use std::cell::RefCell;
use std::rc::Rc;

#[test]
fn test_single_dependency_runs_before_top_level() {
    let mut h = Harness::new();
    let t = h.top_level("T", &["./a.js"]);

    assert_eq!(h.requested(), vec![url("a.js")]);
    assert_eq!(h.status(&url("a.js")), UnitStatus::Loading);
    assert_eq!(h.status_of(t), UnitStatus::WaitingOnDeps);
    assert!(h.log().is_empty());

    let a = h.module("a", &[]);
    h.deliver(&url("a.js"), a);

    assert_eq!(h.log(), vec!["a", "T"]);
    assert_eq!(h.status(&url("a.js")), UnitStatus::Executed);
    assert_eq!(h.status_of(t), UnitStatus::Executed);
}

#[test]
fn test_dependencies_run_in_declared_order() {
    let mut h = Harness::new();
    h.top_level("T", &["./a.js", "./b.js", "./c.js"]);
    assert_eq!(h.requested(), vec![url("a.js"), url("b.js"), url("c.js")]);

    // Fetches finish in reverse order; execution still follows declaration.
    let c = h.module("c", &[]);
    h.deliver(&url("c.js"), c);
    let b = h.module("b", &[]);
    h.deliver(&url("b.js"), b);
    assert!(h.log().is_empty());

    let a = h.module("a", &[]);
    h.deliver(&url("a.js"), a);
    assert_eq!(h.log(), vec!["a", "b", "c", "T"]);
}

#[test]
fn test_diamond_executes_shared_dependency_once() {
    let mut h = Harness::new();
    h.top_level("T", &["./left.js", "./right.js"]);

    let left = h.module("left", &["./shared.js"]);
    h.deliver(&url("left.js"), left);
    let right = h.module("right", &["./shared.js"]);
    h.deliver(&url("right.js"), right);

    // Requested once despite two dependents.
    let shared_requests = h
        .requested()
        .into_iter()
        .filter(|u| *u == url("shared.js"))
        .count();
    assert_eq!(shared_requests, 1);

    let shared = h.module("shared", &[]);
    h.deliver(&url("shared.js"), shared);
    assert_eq!(h.log(), vec!["shared", "left", "right", "T"]);
}

#[test]
fn test_dependency_not_executed_until_pulled() {
    let mut h = Harness::new();
    // Blocks the first top-level unit indefinitely.
    h.top_level("T1", &["./slow.js"]);
    h.top_level("T2", &["./a.js"]);

    let a = h.module("a", &[]);
    h.deliver(&url("a.js"), a);

    assert_eq!(h.status(&url("a.js")), UnitStatus::WaitingForTurn);
    assert!(h.log().is_empty());

    let slow = h.module("slow", &[]);
    h.deliver(&url("slow.js"), slow);
    assert_eq!(h.log(), vec!["slow", "T1", "a", "T2"]);
}

#[test]
fn test_dependents_share_export_store() {
    let mut h = Harness::new();
    let seen: Rc<RefCell<Vec<Exports>>> = Rc::new(RefCell::new(Vec::new()));

    for name in ["T1", "T2"] {
        let seen = Rc::clone(&seen);
        let definition = h.module_with(name, &["./config.js"], move |args| {
            let config = args[0].as_exports().unwrap();
            assert_eq!(config.get("mode"), Some(serde_json::json!("strict")));
            seen.borrow_mut().push(config.clone());
            Ok(())
        });
        h.loader
            .define_in_document(modseq_engine::DocumentContext::new(common::DOC), definition)
            .unwrap();
    }

    let config = h.module_with("config", &["exports"], |args| {
        args[0].as_exports().unwrap().set("mode", "strict");
        Ok(())
    });
    h.deliver(&url("config.js"), config);

    let seen = seen.borrow();
    assert_eq!(seen.len(), 2);
    assert!(seen[0].ptr_eq(&seen[1]));
    assert!(seen[0].ptr_eq(&h.loader.exports(&url("config.js")).unwrap()));
    assert_eq!(h.log(), vec!["config", "T1", "T2"]);
}

#[test]
fn test_exports_bound_before_body_runs() {
    let mut h = Harness::new();
    let captured: Rc<RefCell<Option<Exports>>> = Rc::new(RefCell::new(None));
    let sink = Rc::clone(&captured);

    let definition = h.module_with("T", &["./lib.js"], move |args| {
        *sink.borrow_mut() = args[0].as_exports().cloned();
        Ok(())
    });
    h.loader
        .define_in_document(modseq_engine::DocumentContext::new(common::DOC), definition)
        .unwrap();

    // The dependent already holds the store the library will fill in.
    let store = h.loader.exports(&url("lib.js")).unwrap();
    assert!(store.is_empty());

    let lib = h.module_with("lib", &["exports"], |args| {
        args[0].as_exports().unwrap().set("answer", 42);
        Ok(())
    });
    h.deliver(&url("lib.js"), lib);

    let captured = captured.borrow();
    let captured = captured.as_ref().unwrap();
    assert!(captured.ptr_eq(&store));
    assert_eq!(store.get("answer"), Some(serde_json::json!(42)));
}

#[test]
fn test_empty_top_level_executes_immediately() {
    let mut h = Harness::new();
    let t = h
        .loader
        .define_in_document(
            modseq_engine::DocumentContext::new(common::DOC),
            modseq_engine::Definition::empty(),
        )
        .unwrap();

    assert_eq!(h.status_of(t), UnitStatus::Executed);
    assert!(h.requested().is_empty());
}

#[test]
fn test_source_that_never_defines_executes_empty() {
    let mut h = Harness::new();
    h.top_level("T", &["./legacy.js"]);

    h.deliver_undefined(&url("legacy.js"));

    assert_eq!(h.status(&url("legacy.js")), UnitStatus::Executed);
    assert!(h.loader.exports(&url("legacy.js")).unwrap().is_empty());
    assert_eq!(h.log(), vec!["T"]);
}

#[test]
fn test_executed_dependency_reused_without_fetch() {
    let mut h = Harness::new();
    h.top_level("T1", &["./a.js"]);
    let a = h.module("a", &[]);
    h.deliver(&url("a.js"), a);

    h.top_level("T2", &["./a.js"]);

    assert_eq!(h.requested(), vec![url("a.js")]);
    assert_eq!(h.log(), vec!["a", "T1", "T2"]);
}

#[test]
fn test_deep_chain_runs_without_recursion() {
    const DEPTH: usize = 5_000;

    let mut h = Harness::new();
    // Holds T2 back while the whole chain arrives.
    h.top_level("T1", &["./gate.js"]);
    h.top_level("T2", &["./m0.js"]);

    for i in 0..DEPTH {
        let deps: Vec<String> = if i + 1 < DEPTH {
            vec![format!("./m{}.js", i + 1)]
        } else {
            Vec::new()
        };
        let deps: Vec<&str> = deps.iter().map(String::as_str).collect();
        let module = h.module(&format!("m{i}"), &deps);
        h.deliver(&url(&format!("m{i}.js")), module);
    }
    assert!(h.log().is_empty());

    let gate = h.module("gate", &[]);
    h.deliver(&url("gate.js"), gate);

    let log = h.log();
    assert_eq!(log.len(), DEPTH + 3);
    assert_eq!(log[0], "gate");
    assert_eq!(log[1], "T1");
    assert_eq!(log[2], format!("m{}", DEPTH - 1));
    assert_eq!(log[DEPTH + 1], "m0");
    assert_eq!(log[DEPTH + 2], "T2");
}
