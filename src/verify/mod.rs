//! Post-deploy health verification
//!
//! After the instance starts, wait a fixed grace period, then probe the
//! liveness path on the bound host port. A failed or unreachable probe is a
//! soft signal: the run is downgraded, logged for operator follow-up, and
//! never rolled back, because no rollback mechanism exists in this design.

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// One record of the collaborator's product catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: u64,
    pub name: String,
    pub description: String,
    pub price: f64,
    pub category: String,
}

/// Result of the verify stage; never fatal
#[derive(Debug, Clone, PartialEq)]
pub enum VerifyOutcome {
    /// Liveness probe answered with a success status
    Healthy {
        latency: Duration,
        /// Catalog record count, when the catalog probe ran and decoded
        products: Option<usize>,
    },

    /// Probe failed or could not be interpreted; run continues as
    /// degraded success
    Degraded { reason: String },
}

impl VerifyOutcome {
    pub fn is_healthy(&self) -> bool {
        matches!(self, VerifyOutcome::Healthy { .. })
    }
}

/// Probes the deployed instance's HTTP surface
pub struct HealthVerifier {
    host: String,
    port: u16,
    liveness_path: String,
    catalog_path: Option<String>,
    grace_period: Duration,
    probe_timeout: Duration,
}

impl HealthVerifier {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        liveness_path: impl Into<String>,
        catalog_path: Option<String>,
        grace_period: Duration,
        probe_timeout: Duration,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            liveness_path: liveness_path.into(),
            catalog_path,
            grace_period,
            probe_timeout,
        }
    }

    /// Waits out the grace period, then probes. Returns an outcome, never
    /// an error: every failure mode maps to [`VerifyOutcome::Degraded`].
    pub async fn verify(&self) -> VerifyOutcome {
        if !self.grace_period.is_zero() {
            info!(
                grace_secs = self.grace_period.as_secs(),
                "Waiting for service startup"
            );
            tokio::time::sleep(self.grace_period).await;
        }

        let client = match reqwest::Client::builder()
            .timeout(self.probe_timeout)
            .build()
        {
            Ok(client) => client,
            Err(e) => {
                return VerifyOutcome::Degraded {
                    reason: format!("failed to build probe client: {}", e),
                }
            }
        };

        let url = format!("http://{}:{}{}", self.host, self.port, self.liveness_path);
        debug!(url = %url, "Probing liveness endpoint");
        let started = Instant::now();

        let response = match client.get(&url).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(url = %url, error = %e, "Liveness probe unreachable");
                return VerifyOutcome::Degraded {
                    reason: format!("liveness probe unreachable: {}", e),
                };
            }
        };

        let status = response.status();
        if !status.is_success() {
            warn!(url = %url, status = %status, "Liveness probe returned non-success");
            return VerifyOutcome::Degraded {
                reason: format!("liveness probe returned {}", status),
            };
        }

        let latency = started.elapsed();
        info!(url = %url, latency_ms = latency.as_millis() as u64, "Liveness probe healthy");

        let products = match &self.catalog_path {
            Some(path) => match self.probe_catalog(&client, path).await {
                Ok(count) => Some(count),
                Err(reason) => {
                    warn!(reason = %reason, "Catalog probe degraded");
                    return VerifyOutcome::Degraded { reason };
                }
            },
            None => None,
        };

        VerifyOutcome::Healthy { latency, products }
    }

    async fn probe_catalog(&self, client: &reqwest::Client, path: &str) -> Result<usize, String> {
        let url = format!("http://{}:{}{}", self.host, self.port, path);
        debug!(url = %url, "Probing product catalog");

        let response = client
            .get(&url)
            .send()
            .await
            .map_err(|e| format!("catalog probe unreachable: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("catalog probe returned {}", status));
        }

        let products: Vec<Product> = response
            .json()
            .await
            .map_err(|e| format!("catalog response did not decode: {}", e))?;

        if products.is_empty() {
            return Err("catalog is empty".to_string());
        }

        Ok(products.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    const CATALOG_JSON: &str = r#"[
        {"id":1,"name":"Laptop","description":"High-performance laptop","price":1299.99,"category":"Electronics"},
        {"id":2,"name":"Coffee Mug","description":"Keep your coffee hot","price":15.99,"category":"Office"},
        {"id":3,"name":"Keyboard","description":"Mechanical keyboard","price":89.99,"category":"Electronics"}
    ]"#;

    /// Serves canned responses for `/app/` and `/products` on an ephemeral
    /// port until dropped.
    async fn spawn_stub_service() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                tokio::spawn(async move {
                    let mut buf = [0u8; 1024];
                    let n = socket.read(&mut buf).await.unwrap_or(0);
                    let request = String::from_utf8_lossy(&buf[..n]);

                    let (status, body) = if request.starts_with("GET /products") {
                        ("200 OK", CATALOG_JSON.to_string())
                    } else if request.starts_with("GET /app/") {
                        ("200 OK", "<html>estore</html>".to_string())
                    } else {
                        ("404 Not Found", String::new())
                    };

                    let response = format!(
                        "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                        status,
                        body.len(),
                        body
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                });
            }
        });

        port
    }

    fn verifier(port: u16, catalog: Option<&str>) -> HealthVerifier {
        HealthVerifier::new(
            "127.0.0.1",
            port,
            "/app/",
            catalog.map(str::to_string),
            Duration::ZERO,
            Duration::from_secs(2),
        )
    }

    #[tokio::test]
    async fn test_healthy_probe() {
        let port = spawn_stub_service().await;

        let outcome = verifier(port, None).verify().await;
        assert!(outcome.is_healthy());
    }

    #[tokio::test]
    async fn test_healthy_probe_with_catalog() {
        let port = spawn_stub_service().await;

        match verifier(port, Some("/products")).verify().await {
            VerifyOutcome::Healthy { products, .. } => assert_eq!(products, Some(3)),
            other => panic!("expected Healthy, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unreachable_probe_is_degraded() {
        // Bind then drop to get a port with nothing listening
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let outcome = verifier(port, None).verify().await;
        match outcome {
            VerifyOutcome::Degraded { reason } => assert!(reason.contains("unreachable")),
            other => panic!("expected Degraded, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_non_success_status_is_degraded() {
        let port = spawn_stub_service().await;

        let verifier = HealthVerifier::new(
            "127.0.0.1",
            port,
            "/missing",
            None,
            Duration::ZERO,
            Duration::from_secs(2),
        );
        assert!(!verifier.verify().await.is_healthy());
    }

    #[tokio::test]
    async fn test_catalog_failure_downgrades_healthy_liveness() {
        let port = spawn_stub_service().await;

        let outcome = verifier(port, Some("/missing")).verify().await;
        assert!(!outcome.is_healthy());
    }

    #[test]
    fn test_product_decoding() {
        let products: Vec<Product> = serde_json::from_str(CATALOG_JSON).unwrap();
        assert_eq!(products.len(), 3);
        assert_eq!(products[0].name, "Laptop");
        assert_eq!(products[1].category, "Office");
        assert!((products[2].price - 89.99).abs() < f64::EPSILON);
    }
}
