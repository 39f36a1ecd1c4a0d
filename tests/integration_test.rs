//! Integration tests for Relay
//!
//! These tests drive the public relay-llm API end to end:
//! - manifest resolution and router construction
//! - tier fallback, retries and prompt cropping against a scripted provider
//! - shared statistics across routers

use relay_llm::{
    factory_fn, CompletionOptions, ErrorPattern, Generated, ManifestModels, MockProvider,
    ModelDecl, ProviderAdapter, ProviderEnv, ProviderManifest, RetryConfig, Router, StatKind,
    StatsCounter,
};
use std::sync::Arc;

fn manifest(mock: &MockProvider) -> ProviderManifest {
    let mock = mock.clone();
    ProviderManifest {
        provider_name: "Scripted".to_string(),
        model_family: "ScriptedGPT".to_string(),
        models: ManifestModels {
            embeddings: ModelDecl::embeddings("EMB", "scripted-embed", 4, 8192),
            primary_completion: ModelDecl::completions("BIG", "scripted-big", 1024, 8192),
            secondary_completion: Some(ModelDecl::completions(
                "SMALL",
                "scripted-small",
                512,
                4096,
            )),
        },
        error_patterns: vec![ErrorPattern::tokens(
            r"Max input tokens: (\d+), request input token count: (\d+)",
            true,
        )
        .unwrap()],
        retry: RetryConfig::default().with_retry_delay(0, 0),
        factory: factory_fn(move |_input| Ok(Arc::new(mock.clone()) as Arc<dyn ProviderAdapter>)),
    }
}

fn router(mock: &MockProvider) -> Router {
    Router::from_manifest(&manifest(mock), &ProviderEnv::new(), None).unwrap()
}

// ============================================================================
// Router Flow
// ============================================================================

#[test]
fn test_router_from_manifest() {
    let mock = MockProvider::new();
    let router = router(&mock);

    assert_eq!(router.provider_name(), "Scripted");
    assert_eq!(
        router.models_used_description(),
        "ScriptedGPT (embeddings: scripted-embed, completions: scripted-big, scripted-small)"
    );
    assert_eq!(router.retry_config().max_attempts, 3);
}

#[test]
fn test_fallback_then_crop() {
    let mock = MockProvider::new();
    // primary exceeds, secondary exceeds, secondary succeeds after one crop
    mock.push_token_limit("Max input tokens: 8192, request input token count: 9279");
    mock.push_token_limit("Max input tokens: 4096, request input token count: 9279");
    let router = router(&mock);
    let prompt = "lorem ipsum ".repeat(2_000);

    let generated = tokio_test::block_on(router.execute_completion(
        "chapter-1.md",
        &prompt,
        CompletionOptions::new(),
    ))
    .unwrap();

    assert_eq!(generated, Some(Generated::Text("mock response".to_string())));

    let calls = mock.calls();
    let models: Vec<&str> = calls.iter().map(|c| c.model_key.as_str()).collect();
    assert_eq!(models, vec!["BIG", "SMALL", "SMALL"]);
    assert!(calls[2].content.chars().count() < prompt.chars().count());

    let stats = router.stats();
    assert_eq!(stats.get(StatKind::Switch), 1);
    assert_eq!(stats.get(StatKind::Crop), 1);
    assert_eq!(stats.get(StatKind::Success), 1);
}

#[test]
fn test_overload_exhaustion_returns_none() {
    let mock = MockProvider::new();
    for _ in 0..6 {
        mock.push_overloaded();
    }
    let router = router(&mock);

    let generated = tokio_test::block_on(router.execute_completion(
        "chapter-2.md",
        "prompt",
        CompletionOptions::new(),
    ))
    .unwrap();

    assert_eq!(generated, None);
    assert_eq!(router.stats().get(StatKind::Failure), 1);
    assert_eq!(router.stats().get(StatKind::Retry), 4);
    assert!(router.status_summary().starts_with("> 0 | ! 1"));
}

#[tokio::test]
async fn test_routers_share_stats() {
    let stats = Arc::new(StatsCounter::new());
    let first_mock = MockProvider::new();
    let second_mock = MockProvider::new();
    let first = router(&first_mock).with_stats(Arc::clone(&stats));
    let second = router(&second_mock).with_stats(Arc::clone(&stats));

    let (a, b) = tokio::join!(
        first.execute_completion("a.md", "prompt", CompletionOptions::new()),
        second.generate_embeddings("b.md", "text", None),
    );

    assert!(a.unwrap().is_some());
    assert_eq!(b.unwrap(), Some(vec![0.0; 4]));
    assert_eq!(stats.get(StatKind::Success), 2);
    assert_eq!(stats.snapshot(true).count_for('='), Some(2));
}
