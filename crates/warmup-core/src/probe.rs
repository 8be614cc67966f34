use std::future::Future;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use reqwest::header::CACHE_CONTROL;
use serde::Serialize;

use crate::config::WarmupConfig;
use crate::Result;

// ─── ProbeOutcome ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ProbeFailure {
    /// The probe's timeout scope elapsed before a response arrived.
    Timeout,
    /// Connection refused, reset, DNS failure and friends.
    Network(String),
    /// The server answered with a non-2xx status.
    Status(u16),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeOutcome {
    Success,
    Failure(ProbeFailure),
}

impl ProbeOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ProbeOutcome::Success)
    }
}

// ─── Prober ───────────────────────────────────────────────────────────────

/// One readiness check. Implementations must always resolve; the poller
/// never retries inside a probe.
pub trait Prober: Send + Sync + 'static {
    fn probe(&self) -> BoxFuture<'static, ProbeOutcome>;
}

impl<F, Fut> Prober for F
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ProbeOutcome> + Send + 'static,
{
    fn probe(&self) -> BoxFuture<'static, ProbeOutcome> {
        (self)().boxed()
    }
}

// ─── HttpProber ───────────────────────────────────────────────────────────

/// `GET {base_url}{health_path}` bounded by the per-probe timeout.
///
/// Dropping the future returned by [`Prober::probe`] drops the in-flight
/// request with it, so aborting the probe task cancels the request.
#[derive(Debug, Clone)]
pub struct HttpProber {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl HttpProber {
    pub fn new(config: &WarmupConfig) -> Result<Self> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self {
            client,
            url: config.health_url(),
            timeout: config.probe_timeout(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Prober for HttpProber {
    fn probe(&self) -> BoxFuture<'static, ProbeOutcome> {
        let request = self
            .client
            .get(&self.url)
            .header(CACHE_CONTROL, "no-cache")
            .send();
        let timeout = self.timeout;

        async move {
            match tokio::time::timeout(timeout, request).await {
                Err(_elapsed) => ProbeOutcome::Failure(ProbeFailure::Timeout),
                Ok(Err(e)) if e.is_timeout() => ProbeOutcome::Failure(ProbeFailure::Timeout),
                Ok(Err(e)) => ProbeOutcome::Failure(ProbeFailure::Network(e.to_string())),
                Ok(Ok(resp)) if resp.status().is_success() => ProbeOutcome::Success,
                Ok(Ok(resp)) => ProbeOutcome::Failure(ProbeFailure::Status(resp.status().as_u16())),
            }
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    fn prober_for(base_url: String, timeout_ms: u64) -> HttpProber {
        let cfg = WarmupConfig {
            base_url,
            probe_timeout_ms: timeout_ms,
            ..Default::default()
        };
        HttpProber::new(&cfg).unwrap()
    }

    #[tokio::test]
    async fn ok_response_is_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/health")
            .match_header("cache-control", "no-cache")
            .with_status(200)
            .with_body(r#"{"status":"ok"}"#)
            .create_async()
            .await;

        let prober = prober_for(server.url(), 2_000);
        assert_eq!(prober.probe().await, ProbeOutcome::Success);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn any_2xx_is_success() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/health")
            .with_status(204)
            .create_async()
            .await;

        let prober = prober_for(server.url(), 2_000);
        assert!(prober.probe().await.is_success());
    }

    #[tokio::test]
    async fn server_error_is_status_failure() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/health")
            .with_status(503)
            .create_async()
            .await;

        let prober = prober_for(server.url(), 2_000);
        assert_eq!(
            prober.probe().await,
            ProbeOutcome::Failure(ProbeFailure::Status(503))
        );
    }

    #[tokio::test]
    async fn refused_connection_is_network_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let prober = prober_for(format!("http://{addr}"), 2_000);
        let outcome = prober.probe().await;
        assert!(
            matches!(outcome, ProbeOutcome::Failure(ProbeFailure::Network(_))),
            "unexpected outcome: {outcome:?}"
        );
    }

    #[tokio::test]
    async fn hanging_server_times_out() {
        // Accepts connections and never writes a byte.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let prober = prober_for(format!("http://{addr}"), 200);
        let started = std::time::Instant::now();
        let outcome = tokio::time::timeout(Duration::from_secs(5), prober.probe())
            .await
            .expect("probe must resolve on its own timeout");
        assert_eq!(outcome, ProbeOutcome::Failure(ProbeFailure::Timeout));
        assert!(started.elapsed() >= Duration::from_millis(200));
        server.abort();
    }

    #[tokio::test]
    async fn closures_are_probers() {
        let prober = || async { ProbeOutcome::Failure(ProbeFailure::Status(502)) };
        assert_eq!(
            Prober::probe(&prober).await,
            ProbeOutcome::Failure(ProbeFailure::Status(502))
        );
    }
}
