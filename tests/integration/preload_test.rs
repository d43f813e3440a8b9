//! End-to-end tests for preload-code aggregation.

use std::sync::Arc;

use serde_json::Value;

use modhub::{ChainEngine, EngineConfig, ErrorKind, PluginHooks, PreloadHook, StaticPluginSource};

use crate::helpers;

fn contributing(code: &str) -> PluginHooks {
    let code = code.to_string();
    PluginHooks::new().with_preload(PreloadHook::new(move || Ok(Value::String(code.clone()))))
}

fn silent() -> PluginHooks {
    PluginHooks::new().with_preload(PreloadHook::new(|| Ok(Value::Null)))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn aggregates_contributions_in_plugin_order() {
    let source = Arc::new(
        StaticPluginSource::new()
            .register("a", contributing("A"))
            .register("b", silent())
            .register_deferred("c", contributing("C")),
    );
    let engine = ChainEngine::new(
        EngineConfig::default(),
        helpers::startup(&[
            "--loader", "a", "--loader", "b", "--loader", "c", "--loader", "modhub",
        ]),
        source,
    )
    .unwrap();

    let bundle = engine.preload_code().unwrap();
    assert!(bundle.contains("[\"A\",\"C\"]"));
    assert!(bundle.contains("getBuiltin"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn non_string_contributions_are_contract_violations() {
    let bad = PluginHooks::new().with_preload(PreloadHook::new(|| Ok(serde_json::json!(7))));
    let source = Arc::new(
        StaticPluginSource::new()
            .register("a", contributing("A"))
            .register("bad", bad),
    );
    let engine = ChainEngine::new(
        EngineConfig::default(),
        helpers::startup(&["--loader", "a", "--loader", "bad", "--loader", "modhub"]),
        source,
    )
    .unwrap();

    let error = engine.preload_code().unwrap_err();
    assert_eq!(error.kind, ErrorKind::Validation);
    assert!(error.message.contains("preload_code"));
    assert!(error.message.contains("a number"));
}

#[tokio::test]
async fn degraded_runtimes_get_the_empty_bundle() {
    // current-thread runtime: blocking suspension is unavailable, so
    // aggregation cannot be ordered relative to program start
    let source = Arc::new(
        StaticPluginSource::new()
            .register("a", contributing("A"))
            .register("b", contributing("B")),
    );
    let engine = ChainEngine::new(
        EngineConfig::default(),
        helpers::startup(&["--loader", "a", "--loader", "b", "--loader", "modhub"]),
        source,
    )
    .unwrap();

    assert_eq!(engine.preload_code().unwrap(), "");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn the_exported_plugin_surface_contributes_the_bundle() {
    let source = Arc::new(StaticPluginSource::new().register("a", contributing("A")));
    let engine = ChainEngine::new(
        EngineConfig::default(),
        helpers::startup(&["--loader", "a", "--loader", "modhub"]),
        source,
    )
    .unwrap();

    let exported = engine.as_plugin();
    let preload = exported.preload.expect("engine exports a preload hook");
    match preload.invoke().unwrap() {
        Value::String(bundle) => assert!(bundle.contains("[\"A\"]")),
        other => panic!("expected a string bundle, got {other:?}"),
    }
}
