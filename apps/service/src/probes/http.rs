use anyhow::{Result, anyhow};
use std::time::Duration;
use tracing::debug;

use super::Probe;

/// HTTP/HTTPS probe
///
/// Alive when the final response (after redirects) carries one of the
/// accepted status codes.
pub struct HttpProbe {
    client: reqwest::Client,
    accepted: Vec<u16>,
}

impl HttpProbe {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .user_agent(concat!("homewatch/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client, accepted: vec![200] })
    }

    /// Plex answers unauthenticated requests with 401, which still means it is up
    pub fn plex(timeout: Duration) -> Result<Self> {
        Ok(Self::new(timeout)?.accepting(&[200, 401]))
    }

    pub fn accepting(mut self, statuses: &[u16]) -> Self {
        self.accepted = statuses.to_vec();
        self
    }
}

#[async_trait::async_trait]
impl Probe for HttpProbe {
    async fn probe(&self, target: &str) -> Result<bool> {
        let response = self
            .client
            .get(target)
            .send()
            .await
            .map_err(|e| anyhow!("HTTP request failed: {}", e))?;

        let status_code = response.status().as_u16();
        if self.accepted.contains(&status_code) {
            Ok(true)
        } else {
            debug!("{} answered with unexpected status code {}", target, status_code);
            Ok(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn server_answering(status: u16) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(status))
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn test_http_probe_accepts_ok() {
        let server = server_answering(200).await;
        let probe = HttpProbe::new(Duration::from_secs(2)).unwrap();

        assert!(probe.probe(&server.uri()).await.unwrap());
    }

    #[tokio::test]
    async fn test_http_probe_rejects_server_error() {
        let server = server_answering(503).await;
        let probe = HttpProbe::new(Duration::from_secs(2)).unwrap();

        assert!(!probe.probe(&server.uri()).await.unwrap());
    }

    #[tokio::test]
    async fn test_plex_probe_accepts_unauthorized() {
        let server = server_answering(401).await;
        let plain = HttpProbe::new(Duration::from_secs(2)).unwrap();
        let plex = HttpProbe::plex(Duration::from_secs(2)).unwrap();

        assert!(!plain.probe(&server.uri()).await.unwrap());
        assert!(plex.probe(&server.uri()).await.unwrap());
    }

    #[tokio::test]
    async fn test_http_probe_errors_when_nothing_listens() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let probe = HttpProbe::new(Duration::from_millis(500)).unwrap();
        let result = probe.probe(&format!("http://{addr}/")).await;

        assert!(result.is_err());
    }
}
