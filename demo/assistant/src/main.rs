mod config;

use config::AssistantConfig;
use murmur_core::reasoning::{ReasoningConfig, ReasoningContext, ReasoningEngine};
use murmur_core::router::{ModelRouter, RouterConfig};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logging / tracing
    let filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "info,murmur_core=info,assistant=info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    let cfg = AssistantConfig::load();
    info!(
        target = "assistant",
        models = cfg.models.len(),
        civil = cfg.civil,
        "Starting assistant demo: stdin transcript -> reason -> stdout"
    );

    let router = Arc::new(ModelRouter::new(RouterConfig::new(cfg.models.clone())));
    let mut reasoning_config = ReasoningConfig::default();
    if let Some(mode) = cfg.mode {
        reasoning_config = reasoning_config.with_default_mode(mode);
    }
    if cfg.offline_fallback {
        reasoning_config = reasoning_config.with_offline_fallback();
    }
    let engine = ReasoningEngine::new(reasoning_config, Arc::clone(&router));

    let context = ReasoningContext {
        persona: cfg.persona,
        session_id: Some(format!("demo-{}", std::process::id())),
        ..Default::default()
    };

    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let text = line.trim();
                if text.is_empty() {
                    continue;
                }

                let result = engine
                    .reason(&cfg.system_prompt, text, &context, cfg.civil)
                    .await;

                if let Some(degraded) = &result.metadata.degraded {
                    warn!(
                        target = "assistant",
                        kind = ?degraded.kind,
                        "degraded answer: {}", degraded.message
                    );
                }
                println!("{}  [confidence {:.2}]", result.content, result.confidence);
            }
            _ = tokio::signal::ctrl_c() => {
                break;
            }
        }
    }

    info!(target = "assistant", "shutting down");
    engine.shutdown().await;

    for (model, metrics) in router.get_metrics() {
        info!(
            target = "assistant",
            %model,
            requests = metrics.total_requests,
            ok = metrics.successful_requests,
            cost = metrics.total_cost,
            "session totals"
        );
    }
    info!(target = "assistant", total_cost = router.get_total_cost(), "bye");
    Ok(())
}
