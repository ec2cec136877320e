mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use common::{Script, ScriptedProvider};
use murmur_core::llm::{LlmError, LlmRequest, LlmResponse, ModelConfig, ProviderFamily};
use murmur_core::router::{AttemptHooks, RetryConfig, RetryExecutor};

#[derive(Default)]
struct RecordingHooks {
    attempts: AtomicUsize,
    successes: AtomicUsize,
    failures: AtomicUsize,
}

impl AttemptHooks for RecordingHooks {
    fn on_attempt(&self, _model: &str) {
        self.attempts.fetch_add(1, Ordering::SeqCst);
    }

    fn on_success(&self, _model: &str, _response: &LlmResponse) {
        self.successes.fetch_add(1, Ordering::SeqCst);
    }

    fn on_failure(&self, _model: &str, _error: &LlmError) {
        self.failures.fetch_add(1, Ordering::SeqCst);
    }
}

fn model() -> ModelConfig {
    ModelConfig::new("stub-model", ProviderFamily::OpenAi)
}

fn request() -> LlmRequest {
    LlmRequest {
        system: None,
        prompt: "hello".into(),
        history: vec![],
        temperature: 0.7,
        max_tokens: 64,
    }
}

#[tokio::test(start_paused = true)]
async fn transient_failures_are_retried_until_success() {
    let provider = ScriptedProvider::new(ProviderFamily::OpenAi, Script::FailTransient);
    provider.script(
        "stub-model",
        vec![
            Script::FailTransient,
            Script::FailTransient,
            Script::Succeed {
                content: "third time lucky",
                cost: 0.001,
            },
        ],
    );
    let executor = RetryExecutor::new(RetryConfig::default());
    let hooks = RecordingHooks::default();

    let response = executor
        .attempt(&provider, &model(), &request(), None, &hooks)
        .await
        .expect("third attempt should succeed");

    assert_eq!(response.content, "third time lucky");
    assert_eq!(hooks.attempts.load(Ordering::SeqCst), 3);
    assert_eq!(hooks.failures.load(Ordering::SeqCst), 2);
    assert_eq!(hooks.successes.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_resolve_with_last_error() {
    let provider = ScriptedProvider::new(ProviderFamily::OpenAi, Script::FailTransient);
    let executor = RetryExecutor::new(RetryConfig::default());
    let hooks = RecordingHooks::default();

    let error = executor
        .attempt(&provider, &model(), &request(), None, &hooks)
        .await
        .expect_err("all attempts fail");

    assert!(matches!(error, LlmError::Network(_)));
    assert_eq!(hooks.attempts.load(Ordering::SeqCst), 3);
    assert_eq!(hooks.failures.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn non_retryable_error_aborts_after_one_attempt() {
    let provider = ScriptedProvider::new(ProviderFamily::OpenAi, Script::FailAuth);
    let executor = RetryExecutor::new(RetryConfig::default());
    let hooks = RecordingHooks::default();

    let started = tokio::time::Instant::now();
    let error = executor
        .attempt(&provider, &model(), &request(), None, &hooks)
        .await
        .expect_err("auth failure is permanent");

    assert!(matches!(error, LlmError::Authentication(_)));
    assert_eq!(hooks.attempts.load(Ordering::SeqCst), 1);
    // No backoff sleep happened on the way out
    assert_eq!(started.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn hung_provider_times_out_and_counts_as_failure() {
    let provider = ScriptedProvider::new(ProviderFamily::OpenAi, Script::Hang);
    let executor = RetryExecutor::new(RetryConfig {
        max_attempts: 1,
        ..RetryConfig::default()
    });
    let hooks = RecordingHooks::default();

    let error = executor
        .attempt(
            &provider,
            &model(),
            &request(),
            Some(Duration::from_secs(5)),
            &hooks,
        )
        .await
        .expect_err("hang must time out");

    assert!(matches!(error, LlmError::Timeout(5000)));
    assert_eq!(hooks.failures.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn per_attempt_hooks_fire_immediately() {
    // Hooks must run per attempt, not after the loop: script two failures
    // then a hang, and observe both failures before the timeout resolves.
    let provider = Arc::new(ScriptedProvider::new(ProviderFamily::OpenAi, Script::Hang));
    provider.script(
        "stub-model",
        vec![Script::FailTransient, Script::FailTransient, Script::Hang],
    );
    let executor = RetryExecutor::new(RetryConfig::default());
    let hooks = Arc::new(RecordingHooks::default());

    let task = {
        let provider = Arc::clone(&provider);
        let hooks = Arc::clone(&hooks);
        tokio::spawn(async move {
            let _ = executor
                .attempt(&*provider, &model(), &request(), None, &hooks)
                .await;
        })
    };

    // Let both failed attempts and their backoffs play out, but not the
    // 30s attempt timeout of the hanging third attempt.
    tokio::time::sleep(Duration::from_secs(20)).await;
    assert_eq!(hooks.failures.load(Ordering::SeqCst), 2);
    assert_eq!(hooks.attempts.load(Ordering::SeqCst), 3);

    task.abort();
}
