//! End-to-end behavior of the module runtime: caching, mock policy,
//! isolation, circular requires, and the reflective control surface.

mod common;

use common::project;
use parking_lot::Mutex;
use spacey_sandbox::{JsFunction, JsObject, NativeFn, Value};
use spacey_test::{
    MockFactory, ResolveOptions, TestEnvironment, TestError, DEFAULT_TIMEOUT_FIELD,
    SPEC_HARNESS_GLOBAL, TEST_TIMEOUT_GLOBAL,
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn returns(n: f64) -> NativeFn {
    Arc::new(move |_| Value::Number(n))
}

fn export_fn(name: &str, n: f64) -> Value {
    Value::Function(JsFunction::new(name, Some(returns(n))))
}

fn call(value: &Value) -> Value {
    value.as_function().expect("expected a function").call(&[])
}

// ----- caching and lifecycle -------------------------------------------

#[test]
fn test_repeated_require_returns_same_exports() {
    let evals = Arc::new(AtomicUsize::new(0));
    let evals_in_body = Arc::clone(&evals);
    let p = project()
        .module("a.js", move |scope| {
            evals_in_body.fetch_add(1, Ordering::SeqCst);
            scope.exports_object().set("n", Value::Number(1.0));
            Ok(())
        })
        .build();

    let first = p.require_from("test.js", "./a").unwrap();
    let second = p.require_from("test.js", "./a").unwrap();

    assert_eq!(first, second); // identity, not structural equality
    assert_eq!(evals.load(Ordering::SeqCst), 1);
}

#[test]
fn test_reset_modules_reevaluates() {
    let evals = Arc::new(AtomicUsize::new(0));
    let evals_in_body = Arc::clone(&evals);
    let p = project()
        .module("a.js", move |scope| {
            evals_in_body.fetch_add(1, Ordering::SeqCst);
            scope.exports_object().set("n", Value::Number(1.0));
            Ok(())
        })
        .build();

    let first = p.require_from("test.js", "./a").unwrap();
    p.runtime.reset_modules();
    let second = p.require_from("test.js", "./a").unwrap();

    assert_ne!(first, second);
    assert_eq!(evals.load(Ordering::SeqCst), 2);
}

#[test]
fn test_module_exports_replacement() {
    let p = project()
        .module("answer.js", |scope| {
            scope.module.set_exports(Value::Number(42.0));
            Ok(())
        })
        .build();

    let exports = p.require_from("test.js", "./answer").unwrap();
    assert_eq!(exports, Value::Number(42.0));
}

// ----- isolation --------------------------------------------------------

#[test]
fn test_isolate_modules_discards_fresh_loads() {
    let evals = Arc::new(AtomicUsize::new(0));
    let evals_in_body = Arc::clone(&evals);
    let p = project()
        .module("a.js", move |scope| {
            evals_in_body.fetch_add(1, Ordering::SeqCst);
            scope.exports_object().set("n", Value::Number(1.0));
            Ok(())
        })
        .build();

    let inside = Arc::new(Mutex::new(Value::Undefined));
    let inside_slot = Arc::clone(&inside);
    let runtime = Arc::clone(&p.runtime);
    let from = p.path("test.js");
    p.runtime
        .isolate_modules(move || {
            *inside_slot.lock() = runtime.require_module_or_mock(&from, "./a").unwrap();
        })
        .unwrap();

    let outside = p.require_from("test.js", "./a").unwrap();
    assert_ne!(*inside.lock(), outside);
    assert_eq!(evals.load(Ordering::SeqCst), 2);
}

#[test]
fn test_isolate_modules_restores_registry_keys() {
    let p = project()
        .module("a.js", |_| Ok(()))
        .module("b.js", |_| Ok(()))
        .build();

    p.require_from("test.js", "./a").unwrap();
    let keys_before: Vec<PathBuf> = p
        .require_surface("test.js")
        .cache()
        .into_iter()
        .map(|(key, _)| key)
        .collect();

    let runtime = Arc::clone(&p.runtime);
    let from = p.path("test.js");
    p.runtime
        .isolate_modules(move || {
            runtime.require_module_or_mock(&from, "./b").unwrap();
        })
        .unwrap();

    let keys_after: Vec<PathBuf> = p
        .require_surface("test.js")
        .cache()
        .into_iter()
        .map(|(key, _)| key)
        .collect();
    assert_eq!(keys_before, keys_after);
}

#[test]
fn test_nested_isolation_fails() {
    let p = project().build();
    let runtime = Arc::clone(&p.runtime);

    let result = p.runtime.isolate_modules(move || {
        let nested = runtime.isolate_modules(|| {});
        assert!(matches!(nested, Err(TestError::NestedIsolation)));
    });
    assert!(result.is_ok());

    // the scope tears down even though the nested call failed inside it
    assert!(p.runtime.isolate_modules(|| {}).is_ok());
}

#[test]
fn test_shared_modules_stay_visible_inside_isolation() {
    let evals = Arc::new(AtomicUsize::new(0));
    let evals_in_body = Arc::clone(&evals);
    let p = project()
        .module("a.js", move |scope| {
            evals_in_body.fetch_add(1, Ordering::SeqCst);
            scope.exports_object().set("n", Value::Number(1.0));
            Ok(())
        })
        .build();

    let outside = p.require_from("test.js", "./a").unwrap();
    let inside = Arc::new(Mutex::new(Value::Undefined));
    let inside_slot = Arc::clone(&inside);
    let runtime = Arc::clone(&p.runtime);
    let from = p.path("test.js");
    p.runtime
        .isolate_modules(move || {
            *inside_slot.lock() = runtime.require_module_or_mock(&from, "./a").unwrap();
        })
        .unwrap();

    // loaded before the scope opened, so the shared record is served
    assert_eq!(*inside.lock(), outside);
    assert_eq!(evals.load(Ordering::SeqCst), 1);
}

// ----- circular requires ------------------------------------------------

#[test]
fn test_circular_requires_terminate() {
    let partial_keys = Arc::new(Mutex::new(Vec::new()));
    let partial_keys_in_b = Arc::clone(&partial_keys);

    let p = project()
        .module("a.js", |scope| {
            let b = scope.require.require("./b")?;
            let b_exports = b.as_object().expect("b exports").clone();
            let x: NativeFn = Arc::new(move |_| match b_exports.get("y") {
                Some(Value::Function(y)) => y.call(&[]),
                _ => Value::Null,
            });
            scope
                .exports_object()
                .set("x", Value::Function(JsFunction::new("x", Some(x))));
            Ok(())
        })
        .module("b.js", move |scope| {
            let a = scope.require.require("./a")?;
            partial_keys_in_b
                .lock()
                .extend(a.as_object().expect("partial a").keys());
            scope.exports_object().set("y", export_fn("y", 1.0));
            Ok(())
        })
        .build();

    let a = p.require_from("test.js", "./a").unwrap();
    let x = a.as_object().unwrap().get("x").unwrap();
    assert_eq!(call(&x), Value::Number(1.0));
    // b ran while a was still partially initialized
    assert!(partial_keys.lock().is_empty());
}

// ----- automocking and policy ------------------------------------------

fn lib_project(automock: bool) -> (common::Project, Arc<AtomicUsize>) {
    let evals = Arc::new(AtomicUsize::new(0));
    let evals_in_body = Arc::clone(&evals);
    let builder = project().module("lib.js", move |scope| {
        evals_in_body.fetch_add(1, Ordering::SeqCst);
        let exports = scope.exports_object();
        exports.set("seven", export_fn("seven", 7.0));
        exports.set("version", Value::String("1.0".into()));
        Ok(())
    });
    let builder = if automock { builder.automock() } else { builder };
    (builder.build(), evals)
}

#[test]
fn test_automock_replaces_functions_and_keeps_constants() {
    let (p, _evals) = lib_project(true);

    let mock = p.require_from("test.js", "./lib").unwrap();
    let exports = mock.as_object().unwrap();
    let seven = exports.get("seven").unwrap();
    assert!(p.env.mocker().is_mock_function(&seven));
    assert_eq!(call(&seven), Value::Undefined);
    assert_eq!(exports.get("version"), Some(Value::String("1.0".into())));
}

#[test]
fn test_require_actual_never_returns_automock() {
    let (p, _evals) = lib_project(true);

    let real = p.require_surface("test.js").require_actual("./lib").unwrap();
    let seven = real.as_object().unwrap().get("seven").unwrap();
    assert!(!p.env.mocker().is_mock_function(&seven));
    assert_eq!(call(&seven), Value::Number(7.0));
}

#[test]
fn test_explicit_unmock_dominates_automock() {
    let (p, _evals) = lib_project(true);

    p.hooks("test.js").dont_mock("./lib");
    let real = p.require_from("test.js", "./lib").unwrap();
    assert_eq!(call(&real.as_object().unwrap().get("seven").unwrap()), Value::Number(7.0));
}

#[test]
fn test_automock_caches_mock_exports() {
    let (p, evals) = lib_project(true);

    let first = p.require_from("test.js", "./lib").unwrap();
    let second = p.require_from("test.js", "./lib").unwrap();
    assert_eq!(first, second);
    // the real module ran once, inside the generation frame
    assert_eq!(evals.load(Ordering::SeqCst), 1);
}

#[test]
fn test_gen_mock_from_module_leaves_registries_clean() {
    let (p, evals) = lib_project(false);
    let hooks = p.hooks("test.js");

    let mock = hooks.gen_mock_from_module("./lib").unwrap();
    assert!(p.env.mocker().is_mock_function(&mock.as_object().unwrap().get("seven").unwrap()));
    assert_eq!(evals.load(Ordering::SeqCst), 1);

    // the generation frame was thrown away, so a real require evaluates
    p.require_from("test.js", "./lib").unwrap();
    assert_eq!(evals.load(Ordering::SeqCst), 2);

    // regeneration reuses cached metadata instead of reloading
    hooks.gen_mock_from_module("./lib").unwrap();
    assert_eq!(evals.load(Ordering::SeqCst), 2);
}

#[test]
fn test_deep_unmock_propagates_to_dependencies() {
    let p = project()
        .automock()
        .module("a.js", |scope| {
            let peer = scope.require.require("./peer")?;
            let ping = peer.as_object().expect("peer exports").get("ping").expect("ping");
            scope.exports_object().set("got", call(&ping));
            Ok(())
        })
        .module("peer.js", |scope| {
            scope.exports_object().set("ping", export_fn("ping", 7.0));
            Ok(())
        })
        .build();

    p.hooks("test.js").deep_unmock("./a");
    let a = p.require_from("test.js", "./a").unwrap();
    // the peer was delivered real through the transitive-unmock rule
    assert_eq!(a.as_object().unwrap().get("got"), Some(Value::Number(7.0)));
}

#[test]
fn test_unmock_patterns_propagate_between_dependencies() {
    let p = project()
        .automock()
        .unmock_patterns(&["pkga"])
        .module("node_modules/pkga/index.js", |scope| {
            let peer = scope.require.require("pkgb")?;
            let ping = peer.as_object().expect("pkgb exports").get("ping").expect("ping");
            scope.exports_object().set("got", call(&ping));
            Ok(())
        })
        .module("node_modules/pkgb/index.js", |scope| {
            scope.exports_object().set("ping", export_fn("ping", 5.0));
            Ok(())
        })
        .build();

    let pkga = p.require_from("test.js", "pkga").unwrap();
    assert_eq!(pkga.as_object().unwrap().get("got"), Some(Value::Number(5.0)));
}

#[test]
fn test_core_modules_never_mocked() {
    let p = project().automock().build();
    let fs_exports = Value::Object(JsObject::new());
    p.env.register_core_module("fs", fs_exports.clone());

    let first = p.require_from("test.js", "fs").unwrap();
    assert_eq!(first, fs_exports);

    p.hooks("test.js").mock("fs");
    let second = p.require_from("test.js", "fs").unwrap();
    assert_eq!(second, fs_exports);
}

// ----- manual mocks -----------------------------------------------------

#[test]
fn test_adjacent_manual_mock() {
    let p = project()
        .module("foo.js", |scope| {
            scope.exports_object().set("kind", Value::String("real".into()));
            Ok(())
        })
        .module("__mocks__/foo.js", |scope| {
            scope.exports_object().set("kind", Value::String("mock".into()));
            Ok(())
        })
        .build();

    let surface = p.require_surface("test.js");
    let mock = surface.require_mock("./foo").unwrap();
    assert_eq!(mock.as_object().unwrap().get("kind"), Some(Value::String("mock".into())));

    let real = surface.require_actual("./foo").unwrap();
    assert_eq!(real.as_object().unwrap().get("kind"), Some(Value::String("real".into())));
}

#[test]
fn test_mock_call_routes_to_adjacent_manual_mock() {
    let p = project()
        .module("foo.js", |scope| {
            scope.exports_object().set("kind", Value::String("real".into()));
            Ok(())
        })
        .module("__mocks__/foo.js", |scope| {
            scope.exports_object().set("kind", Value::String("mock".into()));
            Ok(())
        })
        .build();

    p.hooks("test.js").mock("./foo");
    let mocked = p.require_from("test.js", "./foo").unwrap();
    assert_eq!(mocked.as_object().unwrap().get("kind"), Some(Value::String("mock".into())));
}

#[test]
fn test_root_manual_mock_applies_to_packages() {
    let p = project()
        .module("node_modules/pkg/index.js", |scope| {
            scope.exports_object().set("kind", Value::String("real".into()));
            Ok(())
        })
        .module("__mocks__/pkg.js", |scope| {
            scope.exports_object().set("kind", Value::String("mock".into()));
            Ok(())
        })
        .build();

    // a package-level manual mock is delivered without any explicit mock()
    let mocked = p.require_from("test.js", "pkg").unwrap();
    assert_eq!(mocked.as_object().unwrap().get("kind"), Some(Value::String("mock".into())));

    let real = p.require_surface("test.js").require_actual("pkg").unwrap();
    assert_eq!(real.as_object().unwrap().get("kind"), Some(Value::String("real".into())));

    // explicit unmock dominates the manual mock
    p.hooks("test.js").unmock("pkg");
    let unmocked = p.require_from("test.js", "pkg").unwrap();
    assert_eq!(unmocked.as_object().unwrap().get("kind"), Some(Value::String("real".into())));
}

#[test]
fn test_manual_mock_requiring_itself_gets_real_module() {
    let p = project()
        .module("node_modules/pkg/index.js", |scope| {
            scope.exports_object().set("real", Value::Number(3.0));
            Ok(())
        })
        .module("__mocks__/pkg.js", |scope| {
            let real = scope.require.require("pkg")?;
            let inner = real.as_object().expect("real exports").get("real").expect("real field");
            scope.exports_object().set("wrapped", inner);
            Ok(())
        })
        .build();

    let mocked = p.require_from("test.js", "pkg").unwrap();
    assert_eq!(mocked.as_object().unwrap().get("wrapped"), Some(Value::Number(3.0)));
}

// ----- factories and virtual mocks -------------------------------------

#[test]
fn test_set_mock_factory_caches_until_reset() {
    let calls = Arc::new(AtomicUsize::new(0));
    let calls_in_factory = Arc::clone(&calls);
    let p = project().module("a.js", |_| Ok(())).build();

    let factory: MockFactory = Arc::new(move || {
        calls_in_factory.fetch_add(1, Ordering::SeqCst);
        let exports = JsObject::new();
        exports.set("fromFactory", Value::Boolean(true));
        Value::Object(exports)
    });
    p.hooks("test.js").set_mock("./a", factory);

    let first = p.require_from("test.js", "./a").unwrap();
    let second = p.require_from("test.js", "./a").unwrap();
    assert_eq!(first, second);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        first.as_object().unwrap().get("fromFactory"),
        Some(Value::Boolean(true))
    );

    p.runtime.reset_modules();
    let third = p.require_from("test.js", "./a").unwrap();
    assert_ne!(first, third);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_virtual_mock_without_file_on_disk() {
    let p = project().build();
    let factory: MockFactory = Arc::new(|| {
        let exports = JsObject::new();
        exports.set("k", Value::Number(1.0));
        Value::Object(exports)
    });
    p.hooks("test.js").mock_virtual("ghost-pkg", factory);

    let ghost = p.require_from("test.js", "ghost-pkg").unwrap();
    assert_eq!(ghost.as_object().unwrap().get("k"), Some(Value::Number(1.0)));
}

// ----- resolve surface --------------------------------------------------

#[test]
fn test_resolve_paths_boundaries() {
    let p = project().module("a.js", |_| Ok(())).build();
    p.env.register_core_module("fs", Value::Object(JsObject::new()));
    let surface = p.require_surface("test.js");

    assert!(matches!(
        surface.resolve_paths(""),
        Err(TestError::BadResolveArg)
    ));
    let from_dir = p.path("test.js").parent().unwrap().to_path_buf();
    assert_eq!(surface.resolve_paths("./a").unwrap(), Some(vec![from_dir]));
    assert_eq!(surface.resolve_paths("fs").unwrap(), None);
    let chain = surface.resolve_paths("pkg").unwrap().unwrap();
    assert!(!chain.is_empty());
    assert!(chain[0].ends_with("node_modules"));
}

#[test]
fn test_resolve_with_explicit_paths() {
    let p = project()
        .file("alpha/.keep", "")
        .file("beta/target.js", "module.exports = {};\n")
        .build();
    let surface = p.require_surface("test.js");

    let options = ResolveOptions {
        paths: Some(vec![p.path("alpha"), p.path("beta")]),
    };
    let found = surface.resolve("target", Some(&options)).unwrap();
    assert!(found.ends_with("beta/target.js"));

    let missing = surface.resolve("nowhere", Some(&options)).unwrap_err();
    let message = missing.to_string();
    assert!(message.contains("nowhere"));
    assert!(message.contains("alpha"));
}

#[test]
fn test_resolve_falls_back_to_manual_mock() {
    let p = project().module("__mocks__/phantom.js", |_| Ok(())).build();
    let surface = p.require_surface("test.js");

    let resolved = surface.resolve("phantom", None).unwrap();
    assert!(resolved.ends_with("__mocks__/phantom.js"));
    assert!(surface.resolve("truly-missing", None).is_err());
}

#[test]
fn test_not_found_hint_names_sibling_extension() {
    let p = project().file("x.mjs", "export {};\n").build();

    let error = p.require_from("test.js", "./x").unwrap_err();
    let message = error.to_string();
    assert!(message.contains("Cannot find module './x'"));
    assert!(message.contains("x.mjs"));
}

// ----- data modules -----------------------------------------------------

#[test]
fn test_json_module_identity_and_reset() {
    // leading BOM is stripped before parsing
    let p = project()
        .file("data.json", "\u{feff}{\"k\": 1, \"tags\": [\"a\"]}")
        .build();

    let first = p.require_from("test.js", "./data.json").unwrap();
    let second = p.require_from("test.js", "./data.json").unwrap();
    assert_eq!(first, second);
    assert_eq!(first.as_object().unwrap().get("k"), Some(Value::Number(1.0)));

    p.runtime.reset_modules();
    let third = p.require_from("test.js", "./data.json").unwrap();
    assert_ne!(first, third);
}

// ----- module graph accessors ------------------------------------------

#[test]
fn test_require_main_walks_parent_chain() {
    let main_seen = Arc::new(Mutex::new(None));
    let main_slot = Arc::clone(&main_seen);
    let p = project()
        .module("entry.js", |scope| {
            scope.require.require("./mid")?;
            Ok(())
        })
        .module("mid.js", |scope| {
            scope.require.require("./leaf")?;
            Ok(())
        })
        .module("leaf.js", move |scope| {
            *main_slot.lock() = scope.require.main().map(|record| record.id().to_path_buf());
            Ok(())
        })
        .build();

    p.runtime.load_entry_module(&p.path("entry.js")).unwrap();
    assert_eq!(main_seen.lock().clone(), Some(p.path("entry.js")));
}

// ----- executor and environment boundaries ------------------------------

#[test]
fn test_torn_down_environment_never_throws() {
    let p = project().module("a.js", |_| Ok(())).build();
    p.env.teardown();

    let result = p.require_from("test.js", "./a");
    assert!(result.is_ok());
    assert_eq!(p.runtime.exit_code(), Some(1));
}

#[test]
fn test_extra_globals_are_injected_in_order() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_in_body = Arc::clone(&seen);
    let p = project()
        .extra_globals(&["answer", "greeting"])
        .module("a.js", move |scope| {
            seen_in_body.lock().extend(scope.extra_globals.iter().cloned());
            Ok(())
        })
        .build();

    let global = p.env.global().unwrap();
    global.set("answer", Value::Number(42.0));
    global.set("greeting", Value::String("hey".into()));

    p.require_from("test.js", "./a").unwrap();
    assert_eq!(
        *seen.lock(),
        vec![Value::Number(42.0), Value::String("hey".into())]
    );
}

#[test]
fn test_missing_extra_global_is_an_error() {
    let p = project()
        .extra_globals(&["answer"])
        .module("a.js", |_| Ok(()))
        .build();

    let error = p.require_from("test.js", "./a").unwrap_err();
    assert!(matches!(error, TestError::MissingExtraGlobal { .. }));
}

#[test]
fn test_evaluation_error_restores_reentrancy_state() {
    let p = project()
        .module("boom.js", |_| Err(TestError::evaluation("boom")))
        .module("ok.js", |scope| {
            scope.exports_object().set("n", Value::Number(1.0));
            Ok(())
        })
        .build();

    assert!(p.require_from("test.js", "./boom").is_err());
    // the runtime is still usable and idle state was restored
    let ok = p.require_from("test.js", "./ok").unwrap();
    assert_eq!(ok.as_object().unwrap().get("n"), Some(Value::Number(1.0)));
}

// ----- reflective control object ----------------------------------------

#[test]
fn test_hooks_timer_controls() {
    let fired = Arc::new(AtomicUsize::new(0));
    let fired_in_cb = Arc::clone(&fired);
    let p = project().build();
    let hooks = p.hooks("test.js");

    hooks.use_fake_timers();
    let timers = p.env.fake_timers().unwrap();
    let callback: NativeFn = Arc::new(move |_| {
        fired_in_cb.fetch_add(1, Ordering::SeqCst);
        Value::Undefined
    });
    timers.set_timeout(Value::Function(JsFunction::new("cb", Some(callback))), 100);

    assert_eq!(hooks.get_timer_count(), 1);
    hooks.advance_timers_by_time(50);
    assert_eq!(fired.load(Ordering::SeqCst), 0);
    hooks.run_timers_to_time(50);
    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert_eq!(hooks.get_timer_count(), 0);
}

#[test]
fn test_timer_calls_without_fake_timers_set_exit_code() {
    let p = project().build();
    let hooks = p.hooks("test.js");
    p.env.teardown();

    hooks.run_all_timers();
    assert_eq!(p.runtime.exit_code(), Some(1));
}

#[test]
fn test_set_timeout_prefers_legacy_harness() {
    let p = project().build();
    let hooks = p.hooks("test.js");
    let global = p.env.global().unwrap();

    hooks.set_timeout(5000);
    assert_eq!(global.get(TEST_TIMEOUT_GLOBAL), Some(Value::Number(5000.0)));

    let legacy = JsObject::new();
    global.set(SPEC_HARNESS_GLOBAL, Value::Object(legacy.clone()));
    hooks.set_timeout(250);
    assert_eq!(legacy.get(DEFAULT_TIMEOUT_FIELD), Some(Value::Number(250.0)));
}

#[test]
fn test_add_matchers_forwards_to_harness() {
    let p = project().build();
    let hooks = p.hooks("test.js");
    let global = p.env.global().unwrap();

    let received = Arc::new(Mutex::new(Vec::new()));
    let received_in_harness = Arc::clone(&received);
    let add_matchers: NativeFn = Arc::new(move |args| {
        received_in_harness.lock().extend(args.iter().cloned());
        Value::Undefined
    });
    let legacy = JsObject::new();
    legacy.set(
        "addMatchers",
        Value::Function(JsFunction::new("addMatchers", Some(add_matchers))),
    );
    global.set(SPEC_HARNESS_GLOBAL, Value::Object(legacy));

    let matchers = Value::Object(JsObject::new());
    hooks.add_matchers(matchers.clone());
    assert_eq!(*received.lock(), vec![matchers]);
}

#[test]
fn test_hooks_mock_fn_and_spies() {
    let p = project().build();
    let hooks = p.hooks("test.js");

    let mock = hooks.mock_fn(Some(returns(9.0)));
    assert!(hooks.is_mock_function(&mock));
    assert_eq!(call(&mock), Value::Number(9.0));

    let target = JsObject::new();
    target.set("ping", export_fn("ping", 1.0));
    let holder = Value::Object(target.clone());
    let spy = hooks.spy_on(&holder, "ping").unwrap();
    call(&target.get("ping").unwrap());
    assert_eq!(
        spy.as_function().unwrap().mock_state().unwrap().call_count(),
        1
    );

    hooks.restore_all_mocks();
    assert!(!hooks.is_mock_function(&target.get("ping").unwrap()));
}

#[test]
fn test_hooks_chaining() {
    let p = project().module("a.js", |_| Ok(())).build();
    let hooks = p.hooks("test.js");

    hooks
        .enable_automock()
        .dont_mock("./a")
        .retry_times(3)
        .disable_automock();

    let real = p.require_from("test.js", "./a").unwrap();
    assert!(real.as_object().is_some());
}
