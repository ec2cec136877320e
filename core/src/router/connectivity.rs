//! Outbound reachability probe for offline-aware routing.

use reqwest::Client;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct ConnectivityConfig {
    /// Endpoint expected to answer fast from anywhere online
    pub probe_url: String,
    pub probe_timeout: Duration,
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        Self {
            probe_url: std::env::var("MURMUR_CONNECTIVITY_URL")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "https://www.gstatic.com/generate_204".to_string()),
            probe_timeout: Duration::from_secs(3),
        }
    }
}

/// True when the probe endpoint answers at all; any error, timeout, or
/// refused connection counts as offline.
pub async fn is_online(http: &Client, config: &ConnectivityConfig) -> bool {
    let result = http
        .head(&config.probe_url)
        .timeout(config.probe_timeout)
        .send()
        .await;
    let online = result.is_ok();
    debug!(target = "model_router", online, probe = %config.probe_url, "connectivity probe");
    online
}
