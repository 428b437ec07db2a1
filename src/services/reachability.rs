use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

/// Answers whether a routing server responds at a base URL.
#[async_trait]
pub trait ReachabilityChecker: Send + Sync {
    async fn check(&self, url: &str) -> bool;
}

#[derive(Clone)]
pub struct HttpReachabilityChecker {
    client: Client,
    timeout: Duration,
}

impl HttpReachabilityChecker {
    pub fn new(timeout_secs: u64) -> Self {
        HttpReachabilityChecker {
            client: Client::new(),
            timeout: Duration::from_secs(timeout_secs),
        }
    }
}

#[async_trait]
impl ReachabilityChecker for HttpReachabilityChecker {
    /// Any 2xx or 3xx answer counts as reachable.
    async fn check(&self, url: &str) -> bool {
        match self.client.get(url).timeout(self.timeout).send().await {
            Ok(response) => {
                let status = response.status();
                let reachable = status.is_success() || status.is_redirection();
                if reachable {
                    tracing::debug!("Server {} answered HTTP {}", url, status);
                } else {
                    tracing::warn!("Server {} answered HTTP {}", url, status);
                }
                reachable
            }
            Err(e) => {
                tracing::warn!("Server {} is unreachable: {}", url, e);
                false
            }
        }
    }
}
