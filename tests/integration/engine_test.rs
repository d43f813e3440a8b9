//! End-to-end tests for the five public entry points.

use std::sync::atomic::Ordering;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Semaphore;

use modhub::{
    AppError, AppResult, CategoryHook, ChainEngine, DefaultHook, EngineConfig, ErrorKind,
    FormatContext, FormatResolution, HookOutcome, ModuleFormat, ModuleSource, PluginHooks,
    PluginSource, Resolution, ResolveContext, ResolveHook, SourceContext, SourceResolution,
    StaticPluginSource, SyncLoadError, TransformContext, TransformResolution,
};

use crate::helpers;

fn chained_args() -> Vec<&'static str> {
    vec!["--loader", "a", "--loader", "b", "--loader", "modhub"]
}

#[tokio::test]
async fn earlier_listed_plugin_wins() {
    let source = Arc::new(
        StaticPluginSource::new()
            .register(
                "a",
                PluginHooks::new().with_resolve(helpers::resolves_as("a")),
            )
            .register(
                "b",
                PluginHooks::new().with_resolve(helpers::resolves_as("b")),
            ),
    );
    let engine =
        ChainEngine::new(EngineConfig::default(), helpers::startup(&chained_args()), source)
            .unwrap();

    let result = engine
        .resolve(
            "x".into(),
            ResolveContext::default(),
            helpers::host_default("host"),
        )
        .await
        .unwrap();
    assert_eq!(result.url, "a:x");
}

#[tokio::test]
async fn declining_cascades_to_the_next_plugin() {
    let source = Arc::new(
        StaticPluginSource::new()
            .register("a", PluginHooks::new().with_resolve(helpers::declines()))
            .register(
                "b",
                PluginHooks::new().with_resolve(helpers::resolves_as("b")),
            ),
    );
    let engine =
        ChainEngine::new(EngineConfig::default(), helpers::startup(&chained_args()), source)
            .unwrap();

    let result = engine
        .resolve(
            "x".into(),
            ResolveContext::default(),
            helpers::host_default("host"),
        )
        .await
        .unwrap();
    assert_eq!(result.url, "b:x");
}

#[tokio::test]
async fn all_declining_falls_to_the_host_default() {
    let source = Arc::new(
        StaticPluginSource::new()
            .register("a", PluginHooks::new().with_resolve(helpers::declines()))
            .register("b", PluginHooks::new().with_resolve(helpers::declines())),
    );
    let engine =
        ChainEngine::new(EngineConfig::default(), helpers::startup(&chained_args()), source)
            .unwrap();

    let result = engine
        .resolve(
            "x".into(),
            ResolveContext::default(),
            helpers::host_default("host"),
        )
        .await
        .unwrap();
    assert_eq!(result.url, "host:x");
}

#[tokio::test]
async fn asynchronously_loaded_plugins_participate() {
    let source = Arc::new(
        StaticPluginSource::new()
            .register("a", PluginHooks::new().with_resolve(helpers::declines()))
            .register_deferred(
                "b",
                PluginHooks::new().with_resolve(helpers::resolves_as("b")),
            ),
    );
    let engine =
        ChainEngine::new(EngineConfig::default(), helpers::startup(&chained_args()), source)
            .unwrap();

    let result = engine
        .resolve(
            "x".into(),
            ResolveContext::default(),
            helpers::host_default("host"),
        )
        .await
        .unwrap();
    assert_eq!(result.url, "b:x");
}

struct GatedSource {
    inner: StaticPluginSource,
    gate: Arc<Semaphore>,
}

#[async_trait]
impl PluginSource for GatedSource {
    fn load_sync(&self, specifier: &str) -> Result<PluginHooks, SyncLoadError> {
        self.inner.load_sync(specifier)
    }

    async fn load_async(&self, specifier: &str) -> AppResult<PluginHooks> {
        let _permit = self
            .gate
            .acquire()
            .await
            .map_err(|_| AppError::internal("load gate closed"))?;
        self.inner.load_async(specifier).await
    }
}

#[tokio::test]
async fn entry_points_wait_for_the_completion_barrier() {
    helpers::init_tracing();
    let gate = Arc::new(Semaphore::new(0));
    let source = Arc::new(GatedSource {
        inner: StaticPluginSource::new().register_deferred(
            "slow",
            PluginHooks::new().with_resolve(helpers::resolves_as("slow")),
        ),
        gate: Arc::clone(&gate),
    });
    let engine = ChainEngine::new(
        EngineConfig::default(),
        helpers::startup(&["--loader", "slow", "--loader", "modhub"]),
        source,
    )
    .unwrap();

    let mut pending = tokio::spawn({
        let engine = Arc::clone(&engine);
        async move {
            engine
                .resolve(
                    "x".into(),
                    ResolveContext::default(),
                    helpers::host_default("host"),
                )
                .await
        }
    });

    // the plugin is still loading, so the entry point must stay parked
    assert!(
        tokio::time::timeout(Duration::from_millis(50), &mut pending)
            .await
            .is_err()
    );

    gate.add_permits(1);
    let result = pending.await.unwrap().unwrap();
    assert_eq!(result.url, "slow:x");
}

#[tokio::test]
async fn noop_with_a_single_requested_plugin() {
    let counting = helpers::CountingSource::default();
    let attempts = Arc::clone(&counting.attempts);
    let engine = ChainEngine::new(
        EngineConfig::default(),
        helpers::startup(&["--loader", "modhub"]),
        Arc::new(counting),
    )
    .unwrap();

    assert!(engine.is_noop());
    let result = engine
        .resolve(
            "x".into(),
            ResolveContext::default(),
            helpers::host_default("host"),
        )
        .await
        .unwrap();
    assert_eq!(result.url, "host:x");
    assert_eq!(engine.preload_code().unwrap(), "");
    assert_eq!(attempts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn noop_when_not_the_last_listed_plugin() {
    let counting = helpers::CountingSource::default();
    let attempts = Arc::clone(&counting.attempts);
    let engine = ChainEngine::new(
        EngineConfig::default(),
        helpers::startup(&["--loader", "modhub", "--loader", "other"]),
        Arc::new(counting),
    )
    .unwrap();

    assert!(engine.is_noop());
    assert_eq!(attempts.load(Ordering::SeqCst), 0);
}

struct ExplodingSource;

#[async_trait]
impl PluginSource for ExplodingSource {
    fn load_sync(&self, _specifier: &str) -> Result<PluginHooks, SyncLoadError> {
        Err(SyncLoadError::Fatal(AppError::plugin("bad initialization")))
    }

    async fn load_async(&self, _specifier: &str) -> AppResult<PluginHooks> {
        Err(AppError::plugin("bad initialization"))
    }
}

#[tokio::test]
async fn synchronous_load_failure_is_fatal_at_construction() {
    let error = ChainEngine::new(
        EngineConfig::default(),
        helpers::startup(&chained_args()),
        Arc::new(ExplodingSource),
    )
    .unwrap_err();
    assert!(error.message.contains("bad initialization"));
}

#[tokio::test]
async fn asynchronous_load_failure_surfaces_at_the_first_entry_point() {
    let source = Arc::new(StaticPluginSource::new());
    let engine = ChainEngine::new(
        EngineConfig::default(),
        helpers::startup(&["--loader", "missing", "--loader", "modhub"]),
        source,
    )
    .unwrap();

    let error = engine
        .resolve(
            "x".into(),
            ResolveContext::default(),
            helpers::host_default("host"),
        )
        .await
        .unwrap_err();
    assert!(error.message.contains("missing"));
}

#[tokio::test]
async fn every_category_composes() {
    let plugin = PluginHooks::new()
        .with_format(CategoryHook::new(|_url: String, _context, _next| async move {
            Ok(HookOutcome::Handled(FormatResolution {
                format: ModuleFormat::Module,
            }))
        }))
        .with_source(CategoryHook::new(|url: String, _context, _next| async move {
            Ok(HookOutcome::Handled(SourceResolution {
                source: ModuleSource::Text(format!("export default \"{url}\";")),
            }))
        }))
        .with_transform(CategoryHook::new(
            |source: ModuleSource, _context, _next| async move {
                let text = source.as_text().unwrap_or("").to_string();
                Ok(HookOutcome::Handled(TransformResolution {
                    source: ModuleSource::Text(format!("\"use strict\";\n{text}")),
                }))
            },
        ));
    let source = Arc::new(
        StaticPluginSource::new()
            .register("a", plugin)
            .register("b", PluginHooks::new()),
    );
    let engine =
        ChainEngine::new(EngineConfig::default(), helpers::startup(&chained_args()), source)
            .unwrap();

    let format = engine
        .detect_format(
            "pkg:main".into(),
            FormatContext::default(),
            DefaultHook::new(|_url: String, _context, _next| async move {
                Ok(FormatResolution {
                    format: ModuleFormat::CommonJs,
                })
            }),
        )
        .await
        .unwrap();
    assert_eq!(format.format, ModuleFormat::Module);

    let fetched = engine
        .fetch_source(
            "pkg:main".into(),
            SourceContext {
                format: ModuleFormat::Module,
            },
            DefaultHook::new(|_url: String, _context, _next| async move {
                Ok(SourceResolution {
                    source: ModuleSource::Text(String::new()),
                })
            }),
        )
        .await
        .unwrap();
    assert_eq!(
        fetched.source.as_text(),
        Some("export default \"pkg:main\";")
    );

    let transformed = engine
        .transform_source(
            fetched.source,
            TransformContext {
                format: ModuleFormat::Module,
                url: "pkg:main".into(),
            },
            DefaultHook::new(|source: ModuleSource, _context, _next| async move {
                Ok(TransformResolution { source })
            }),
        )
        .await
        .unwrap();
    assert_eq!(
        transformed.source.as_text(),
        Some("\"use strict\";\nexport default \"pkg:main\";")
    );
}

#[tokio::test]
async fn nested_reentry_with_the_entry_hook_inherits_the_outer_default() {
    let installed: Arc<OnceLock<Arc<ChainEngine>>> = Arc::new(OnceLock::new());
    let hook_installed = Arc::clone(&installed);
    let reentering: ResolveHook = CategoryHook::new(
        move |specifier: String, context: ResolveContext, _next| {
            let installed = Arc::clone(&hook_installed);
            async move {
                if specifier == "outer" {
                    let engine = installed.get().cloned().expect("engine installed");
                    let nested = engine
                        .resolve("nested".into(), context, engine.resolve_entry())
                        .await?;
                    return Ok(HookOutcome::Handled(Resolution {
                        url: format!("outer({})", nested.url),
                    }));
                }
                Ok(HookOutcome::Declined)
            }
        },
    );
    let source = Arc::new(
        StaticPluginSource::new()
            .register("a", PluginHooks::new().with_resolve(reentering))
            .register("b", PluginHooks::new()),
    );
    let engine =
        ChainEngine::new(EngineConfig::default(), helpers::startup(&chained_args()), source)
            .unwrap();
    installed.set(Arc::clone(&engine)).ok();

    let result = engine
        .resolve(
            "outer".into(),
            ResolveContext::default(),
            helpers::host_default("host"),
        )
        .await
        .unwrap();
    assert_eq!(result.url, "outer(host:nested)");
}

#[tokio::test]
async fn the_engine_is_installable_as_a_plugin() {
    let inner_source = Arc::new(StaticPluginSource::new().register(
        "a",
        PluginHooks::new().with_resolve(helpers::resolves_as("inner")),
    ));
    let inner = ChainEngine::new(
        EngineConfig::default(),
        helpers::startup(&["--loader", "a", "--loader", "modhub"]),
        inner_source,
    )
    .unwrap();

    let outer_source =
        Arc::new(StaticPluginSource::new().register("chained", inner.as_plugin()));
    let outer = ChainEngine::new(
        EngineConfig::default(),
        helpers::startup(&["--loader", "chained", "--loader", "modhub"]),
        outer_source,
    )
    .unwrap();

    let result = outer
        .resolve(
            "m".into(),
            ResolveContext::default(),
            helpers::host_default("outer-host"),
        )
        .await
        .unwrap();
    assert_eq!(result.url, "inner:m");
}

#[tokio::test]
async fn an_installed_engine_falls_back_to_the_enclosing_default() {
    let inner_source = Arc::new(
        StaticPluginSource::new()
            .register("d", PluginHooks::new().with_resolve(helpers::declines())),
    );
    let inner = ChainEngine::new(
        EngineConfig::default(),
        helpers::startup(&["--loader", "d", "--loader", "modhub"]),
        inner_source,
    )
    .unwrap();

    let outer_source =
        Arc::new(StaticPluginSource::new().register("chained", inner.as_plugin()));
    let outer = ChainEngine::new(
        EngineConfig::default(),
        helpers::startup(&["--loader", "chained", "--loader", "modhub"]),
        outer_source,
    )
    .unwrap();

    let result = outer
        .resolve(
            "m".into(),
            ResolveContext::default(),
            helpers::host_default("outer-host"),
        )
        .await
        .unwrap();
    assert_eq!(result.url, "outer-host:m");
}

#[tokio::test]
async fn plugins_can_be_requested_through_the_options_variable() {
    let source = Arc::new(StaticPluginSource::new().register(
        "env-plugin",
        PluginHooks::new().with_resolve(helpers::resolves_as("env")),
    ));
    let mut startup = helpers::startup(&["--loader", "modhub"]);
    startup.options_value = Some("--loader env-plugin".to_string());
    let engine = ChainEngine::new(EngineConfig::default(), startup, source).unwrap();

    assert!(!engine.is_noop());
    let result = engine
        .resolve(
            "x".into(),
            ResolveContext::default(),
            helpers::host_default("host"),
        )
        .await
        .unwrap();
    assert_eq!(result.url, "env:x");
}

#[test]
fn construction_outside_a_runtime_is_a_configuration_error() {
    let error = ChainEngine::new(
        EngineConfig::default(),
        helpers::startup(&chained_args()),
        Arc::new(StaticPluginSource::new()),
    )
    .unwrap_err();
    assert_eq!(error.kind, ErrorKind::Configuration);
}
