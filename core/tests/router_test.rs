mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{providers_map, Script, ScriptedProvider};
use murmur_core::llm::{ModelConfig, ProviderFamily};
use murmur_core::router::{
    BreakerConfig, BreakerState, ConnectivityConfig, RateLimitConfig, RetryConfig,
};
use murmur_core::{ModelRouter, MurmurError, RouteOptions, RouterConfig};

fn fast_retry() -> RetryConfig {
    RetryConfig {
        max_attempts: 3,
        base_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(100),
        max_jitter: Duration::from_millis(5),
        attempt_timeout: Duration::from_secs(5),
    }
}

fn router_config(models: Vec<ModelConfig>) -> RouterConfig {
    RouterConfig {
        models,
        retry: fast_retry(),
        ..RouterConfig::new(vec![])
    }
}

#[tokio::test(start_paused = true)]
async fn cascades_to_first_succeeding_model() {
    let provider = Arc::new(ScriptedProvider::new(
        ProviderFamily::OpenAi,
        Script::FailTransient,
    ));
    provider.script("model-b", vec![Script::FailAuth]);
    provider.script(
        "model-c",
        vec![Script::Succeed {
            content: "from c",
            cost: 0.002,
        }],
    );

    let models = vec![
        ModelConfig::new("model-a", ProviderFamily::OpenAi),
        ModelConfig::new("model-b", ProviderFamily::OpenAi),
        ModelConfig::new("model-c", ProviderFamily::OpenAi),
    ];
    let router = ModelRouter::with_providers(
        router_config(models),
        providers_map(vec![(ProviderFamily::OpenAi, Arc::clone(&provider))]),
    );

    let response = router
        .route("hello", &RouteOptions::default())
        .await
        .expect("model-c succeeds");

    assert_eq!(response.content, "from c");
    // a: retried to exhaustion; b: one non-retryable attempt; c: one success
    assert_eq!(provider.call_count("model-a"), 3);
    assert_eq!(provider.call_count("model-b"), 1);
    assert_eq!(provider.call_count("model-c"), 1);

    let metrics = router.get_metrics();
    assert!(metrics["model-a"].failed_requests >= 1);
    assert!(metrics["model-b"].failed_requests >= 1);
    assert_eq!(metrics["model-c"].successful_requests, 1);
    assert_eq!(metrics["model-c"].failed_requests, 0);
}

#[tokio::test]
async fn end_to_end_single_model_accounting() {
    let provider = Arc::new(ScriptedProvider::new(
        ProviderFamily::OpenAi,
        Script::Succeed {
            content: "hi from a",
            cost: 0.01,
        },
    ));
    let models = vec![
        ModelConfig::new("model-a", ProviderFamily::OpenAi),
        ModelConfig::new("model-b", ProviderFamily::OpenAi),
    ];
    let router = ModelRouter::with_providers(
        router_config(models),
        providers_map(vec![(ProviderFamily::OpenAi, Arc::clone(&provider))]),
    );

    let response = router
        .route("hello", &RouteOptions::default())
        .await
        .expect("model-a succeeds");

    assert_eq!(response.content, "hi from a");
    assert!((router.get_total_cost() - 0.01).abs() < 1e-9);
    assert_eq!(
        router.get_circuit_breaker_status()["model-a"].state,
        BreakerState::Closed
    );
    assert_eq!(provider.call_count("model-b"), 0, "model-b stays unused");
}

#[tokio::test]
async fn empty_configuration_fails_fast() {
    let provider = Arc::new(ScriptedProvider::new(
        ProviderFamily::OpenAi,
        Script::FailTransient,
    ));
    let router = ModelRouter::with_providers(
        router_config(vec![]),
        providers_map(vec![(ProviderFamily::OpenAi, provider)]),
    );
    let error = router
        .route("hello", &RouteOptions::default())
        .await
        .expect_err("nothing configured");
    assert!(matches!(error, MurmurError::NoModelsConfigured));
}

#[tokio::test(start_paused = true)]
async fn open_breakers_leave_no_available_models() {
    let provider = Arc::new(ScriptedProvider::new(
        ProviderFamily::OpenAi,
        Script::FailTransient,
    ));
    let config = RouterConfig {
        breaker: BreakerConfig {
            failure_threshold: 2,
            recovery_timeout: Duration::from_secs(30),
            half_open_max_probes: 1,
        },
        ..router_config(vec![ModelConfig::new("model-a", ProviderFamily::OpenAi)])
    };
    let router = ModelRouter::with_providers(
        config,
        providers_map(vec![(ProviderFamily::OpenAi, provider)]),
    );

    let first = router.route("hello", &RouteOptions::default()).await;
    assert!(matches!(first, Err(MurmurError::AllModelsFailed(_))));

    let second = router.route("hello", &RouteOptions::default()).await;
    assert!(
        matches!(second, Err(MurmurError::NoAvailableModels(_))),
        "breaker opened by the first call's failures"
    );
}

#[tokio::test]
async fn rate_limited_model_is_excluded() {
    let provider = Arc::new(ScriptedProvider::new(
        ProviderFamily::OpenAi,
        Script::Succeed {
            content: "ok",
            cost: 0.0,
        },
    ));
    let config = RouterConfig {
        rate_limit: RateLimitConfig {
            window: Duration::from_secs(60),
            max_requests: 2,
        },
        ..router_config(vec![ModelConfig::new("model-a", ProviderFamily::OpenAi)])
    };
    let router = ModelRouter::with_providers(
        config,
        providers_map(vec![(ProviderFamily::OpenAi, provider)]),
    );

    for _ in 0..2 {
        router
            .route("hello", &RouteOptions::default())
            .await
            .expect("under the cap");
    }
    let error = router
        .route("hello", &RouteOptions::default())
        .await
        .expect_err("cap reached");
    assert!(matches!(error, MurmurError::NoAvailableModels(_)));
}

#[tokio::test]
async fn explicit_preference_wins_when_available() {
    let provider = Arc::new(ScriptedProvider::new(
        ProviderFamily::OpenAi,
        Script::Succeed {
            content: "generic",
            cost: 0.0,
        },
    ));
    provider.script(
        "model-b",
        vec![Script::Succeed {
            content: "from b",
            cost: 0.0,
        }],
    );
    let models = vec![
        ModelConfig::new("model-a", ProviderFamily::OpenAi),
        ModelConfig::new("model-b", ProviderFamily::OpenAi),
    ];
    let router = ModelRouter::with_providers(
        router_config(models),
        providers_map(vec![(ProviderFamily::OpenAi, Arc::clone(&provider))]),
    );

    let options = RouteOptions {
        preferred_model: Some("model-b".into()),
        ..Default::default()
    };
    let response = router.route("hello", &options).await.expect("b succeeds");
    assert_eq!(response.content, "from b");
    assert_eq!(provider.call_count("model-a"), 0);
}

#[tokio::test(start_paused = true)]
async fn success_rate_reorders_candidates() {
    let provider = Arc::new(ScriptedProvider::new(
        ProviderFamily::OpenAi,
        Script::Succeed {
            content: "ok",
            cost: 0.0,
        },
    ));
    // First call: model-a fails its way down to model-b
    provider.script(
        "model-a",
        vec![
            Script::FailTransient,
            Script::FailTransient,
            Script::FailTransient,
            Script::Succeed {
                content: "from a",
                cost: 0.0,
            },
        ],
    );
    provider.script(
        "model-b",
        vec![
            Script::Succeed {
                content: "from b",
                cost: 0.0,
            },
            Script::Succeed {
                content: "from b again",
                cost: 0.0,
            },
        ],
    );
    let models = vec![
        ModelConfig::new("model-a", ProviderFamily::OpenAi),
        ModelConfig::new("model-b", ProviderFamily::OpenAi),
    ];
    let router = ModelRouter::with_providers(
        router_config(models),
        providers_map(vec![(ProviderFamily::OpenAi, Arc::clone(&provider))]),
    );

    let first = router
        .route("hello", &RouteOptions::default())
        .await
        .expect("falls back to b");
    assert_eq!(first.content, "from b");

    // Second call: model-a would now succeed, but its 0% success rate
    // ranks it behind model-b
    let second = router
        .route("hello", &RouteOptions::default())
        .await
        .expect("b again");
    assert_eq!(second.content, "from b again");
    assert_eq!(provider.call_count("model-a"), 3, "a was not retried");
}

#[tokio::test]
async fn metrics_snapshots_are_idempotent() {
    let provider = Arc::new(ScriptedProvider::new(
        ProviderFamily::OpenAi,
        Script::Succeed {
            content: "ok",
            cost: 0.003,
        },
    ));
    let router = ModelRouter::with_providers(
        router_config(vec![ModelConfig::new("model-a", ProviderFamily::OpenAi)]),
        providers_map(vec![(ProviderFamily::OpenAi, provider)]),
    );
    router
        .route("hello", &RouteOptions::default())
        .await
        .expect("succeeds");

    let first = serde_json::to_value(router.get_metrics()).expect("serializable");
    let second = serde_json::to_value(router.get_metrics()).expect("serializable");
    assert_eq!(first, second);
}

#[tokio::test]
async fn offline_fallback_restricts_to_healthy_local_models() {
    let cloud = Arc::new(ScriptedProvider::new(
        ProviderFamily::OpenAi,
        Script::Succeed {
            content: "from cloud",
            cost: 0.01,
        },
    ));
    let local = Arc::new(ScriptedProvider::new(
        ProviderFamily::Ollama,
        Script::Succeed {
            content: "from local",
            cost: 0.0,
        },
    ));
    let models = vec![
        ModelConfig::new("cloud-model", ProviderFamily::OpenAi),
        ModelConfig::new("local-model", ProviderFamily::Ollama),
    ];
    let config = RouterConfig {
        // Nothing listens here; the probe fails fast and we are "offline"
        connectivity: ConnectivityConfig {
            probe_url: "http://127.0.0.1:9/generate_204".into(),
            probe_timeout: Duration::from_millis(500),
        },
        ..router_config(models)
    };
    let router = ModelRouter::with_providers(
        config,
        providers_map(vec![
            (ProviderFamily::OpenAi, Arc::clone(&cloud)),
            (ProviderFamily::Ollama, Arc::clone(&local)),
        ]),
    );

    let response = router
        .route_with_offline_fallback("hello", &RouteOptions::default())
        .await
        .expect("local model serves offline traffic");

    assert_eq!(response.content, "from local");
    assert_eq!(cloud.call_count("cloud-model"), 0, "cloud never attempted");

    // The substitution was scoped to that call: normal routing still sees
    // the full model list and picks the cloud model again.
    let online = router
        .route("hello", &RouteOptions::default())
        .await
        .expect("cloud model available to normal routing");
    assert_eq!(online.content, "from cloud");
}

#[tokio::test]
async fn offline_with_unhealthy_local_server_is_an_availability_error() {
    let local = Arc::new(
        ScriptedProvider::new(
            ProviderFamily::Ollama,
            Script::Succeed {
                content: "unused",
                cost: 0.0,
            },
        )
        .unhealthy(),
    );
    let config = RouterConfig {
        connectivity: ConnectivityConfig {
            probe_url: "http://127.0.0.1:9/generate_204".into(),
            probe_timeout: Duration::from_millis(500),
        },
        ..router_config(vec![ModelConfig::new("local-model", ProviderFamily::Ollama)])
    };
    let router = ModelRouter::with_providers(
        config,
        providers_map(vec![(ProviderFamily::Ollama, Arc::clone(&local))]),
    );

    let error = router
        .route_with_offline_fallback("hello", &RouteOptions::default())
        .await
        .expect_err("no healthy local server");
    assert!(matches!(error, MurmurError::NoAvailableModels(_)));
    assert_eq!(local.call_count("local-model"), 0);
}
