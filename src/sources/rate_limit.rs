use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use http::Extensions;
use reqwest::Url;
use reqwest_middleware::{Middleware, Next};
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep_until};

// openFDA allows 240 requests per minute without an API key.
const OPENFDA_MIN_INTERVAL: Duration = Duration::from_millis(250);
const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Clone, Debug)]
pub(crate) struct SpacingPolicy {
    pub key: &'static str,
    pub prefix: String,
    pub min_interval: Duration,
}

/// Keeps consecutive requests to the same upstream at least `min_interval`
/// apart. Requests are delayed, never reordered or dropped.
#[derive(Debug)]
pub(crate) struct RequestSpacer {
    policies: Vec<SpacingPolicy>,
    default_min_interval: Duration,
    last_seen: Mutex<HashMap<String, Instant>>,
}

impl RequestSpacer {
    pub(crate) fn for_openfda(openfda_base: &str) -> Self {
        Self::new(
            vec![SpacingPolicy {
                key: "openfda",
                prefix: openfda_base.trim_end_matches('/').to_string(),
                min_interval: OPENFDA_MIN_INTERVAL,
            }],
            DEFAULT_MIN_INTERVAL,
        )
    }

    pub(crate) fn new(policies: Vec<SpacingPolicy>, default_min_interval: Duration) -> Self {
        Self {
            policies,
            default_min_interval,
            last_seen: Mutex::new(HashMap::new()),
        }
    }

    fn resolve_key_and_interval(&self, url: &Url) -> (String, Duration) {
        let full = url.as_str();

        if let Some(policy) = self
            .policies
            .iter()
            .filter(|p| full.starts_with(p.prefix.as_str()))
            .max_by_key(|p| p.prefix.len())
        {
            return (format!("policy:{}", policy.key), policy.min_interval);
        }

        let origin = format!(
            "{}://{}",
            url.scheme(),
            url.host_str().unwrap_or("unknown-host")
        );
        (format!("default:{origin}"), self.default_min_interval)
    }

    pub(crate) async fn wait_for_url(&self, url: &Url) {
        let (key, min_interval) = self.resolve_key_and_interval(url);
        loop {
            let now = Instant::now();
            let mut map = self.last_seen.lock().await;
            let wait_until = map.get(&key).map(|last| *last + min_interval);

            match wait_until {
                Some(target) if target > now => {
                    drop(map);
                    sleep_until(target).await;
                }
                _ => {
                    map.insert(key, now);
                    return;
                }
            }
        }
    }
}

#[derive(Clone, Debug)]
pub(crate) struct SpacingMiddleware {
    spacer: Arc<RequestSpacer>,
}

impl SpacingMiddleware {
    pub(crate) fn new(spacer: RequestSpacer) -> Self {
        Self {
            spacer: Arc::new(spacer),
        }
    }
}

#[async_trait::async_trait]
impl Middleware for SpacingMiddleware {
    async fn handle(
        &self,
        req: reqwest::Request,
        extensions: &mut Extensions,
        next: Next<'_>,
    ) -> reqwest_middleware::Result<reqwest::Response> {
        self.spacer.wait_for_url(req.url()).await;
        next.run(req, extensions).await
    }
}
