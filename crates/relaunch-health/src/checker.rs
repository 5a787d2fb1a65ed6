//! HTTP health probe.
//!
//! Opens a fresh TCP connection per probe and issues a single HTTP/1.1
//! `GET`. A fresh connection matters here: after an ingress refresh the
//! probe must observe the new upstream, not a pooled connection to the old
//! one.

use std::time::Duration;

use bytes::Bytes;
use http_body_util::Empty;
use hyper::StatusCode;
use tracing::debug;

/// Result of a single health probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeResult {
    /// The check passed.
    Healthy,
    /// The target answered, but not with an accepted status.
    Unhealthy,
    /// The probe could not be executed (connection error, timeout, spawn failure).
    Failed,
}

impl ProbeResult {
    pub fn is_healthy(self) -> bool {
        self == ProbeResult::Healthy
    }
}

/// Which HTTP status codes count as healthy.
#[derive(Debug, Clone, Copy)]
pub enum StatusCheck<'a> {
    /// Any 2xx.
    AnySuccess,
    /// Exactly one of the listed codes.
    OneOf(&'a [u16]),
}

impl StatusCheck<'_> {
    pub fn accepts(&self, status: StatusCode) -> bool {
        match self {
            StatusCheck::AnySuccess => status.is_success(),
            StatusCheck::OneOf(codes) => codes.contains(&status.as_u16()),
        }
    }
}

/// Perform an HTTP health probe against `url`.
///
/// Returns `Healthy` if the status is accepted by `check`, `Unhealthy` for
/// any other status, or `Failed` if the URL is unusable, the connection
/// fails, or the whole exchange exceeds `timeout`.
pub async fn http_probe(url: &str, check: StatusCheck<'_>, timeout: Duration) -> ProbeResult {
    let uri: http::Uri = match url.parse() {
        Ok(uri) => uri,
        Err(e) => {
            debug!(error = %e, %url, "health probe URL invalid");
            return ProbeResult::Failed;
        }
    };
    if uri.scheme_str() != Some("http") {
        debug!(%url, "health probe only supports http");
        return ProbeResult::Failed;
    }
    let Some(host) = uri.host().map(str::to_string) else {
        debug!(%url, "health probe URL has no host");
        return ProbeResult::Failed;
    };
    // IPv6 literals keep their brackets in `Uri::host`.
    let addr = host.trim_start_matches('[').trim_end_matches(']').to_string();
    let port = uri.port_u16().unwrap_or(80);
    let authority = uri
        .authority()
        .map(|a| a.as_str().to_string())
        .unwrap_or_else(|| host.clone());
    let path = uri
        .path_and_query()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());

    let result = tokio::time::timeout(timeout, async {
        let stream = match tokio::net::TcpStream::connect((addr.as_str(), port)).await {
            Ok(s) => s,
            Err(e) => {
                debug!(error = %e, %url, "health probe connection failed");
                return ProbeResult::Failed;
            }
        };

        let io = hyper_util::rt::TokioIo::new(stream);
        let (mut sender, conn) = match hyper::client::conn::http1::handshake(io).await {
            Ok(pair) => pair,
            Err(e) => {
                debug!(error = %e, %url, "health probe handshake failed");
                return ProbeResult::Failed;
            }
        };

        // Drive the connection in the background.
        tokio::spawn(async move {
            let _ = conn.await;
        });

        let req = match http::Request::builder()
            .method("GET")
            .uri(path.as_str())
            .header("host", authority.as_str())
            .header("user-agent", concat!("relaunch/", env!("CARGO_PKG_VERSION")))
            .body(Empty::<Bytes>::new())
        {
            Ok(req) => req,
            Err(e) => {
                debug!(error = %e, %url, "health probe request invalid");
                return ProbeResult::Failed;
            }
        };

        match sender.send_request(req).await {
            Ok(resp) => {
                if check.accepts(resp.status()) {
                    ProbeResult::Healthy
                } else {
                    debug!(status = %resp.status(), %url, "health probe status not accepted");
                    ProbeResult::Unhealthy
                }
            }
            Err(e) => {
                debug!(error = %e, %url, "health probe request failed");
                ProbeResult::Failed
            }
        }
    })
    .await;

    match result {
        Ok(probe) => probe,
        Err(_) => {
            debug!(%url, "health probe timed out");
            ProbeResult::Failed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve exactly one request with the given status line, returning the URL.
    async fn serve_once(status: &'static str) -> String {
        serve_once_on("127.0.0.1:0", status).await
    }

    async fn serve_once_on(bind: &str, status: &'static str) -> String {
        let listener = TcpListener::bind(bind).await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = sock.read(&mut buf).await;
            let resp = format!("HTTP/1.1 {status}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n");
            let _ = sock.write_all(resp.as_bytes()).await;
        });
        format!("http://{addr}/health")
    }

    #[tokio::test]
    async fn any_success_accepts_200() {
        let url = serve_once("200 OK").await;
        let result = http_probe(&url, StatusCheck::AnySuccess, Duration::from_secs(2)).await;
        assert_eq!(result, ProbeResult::Healthy);
    }

    #[tokio::test]
    async fn any_success_rejects_503() {
        let url = serve_once("503 Service Unavailable").await;
        let result = http_probe(&url, StatusCheck::AnySuccess, Duration::from_secs(2)).await;
        assert_eq!(result, ProbeResult::Unhealthy);
    }

    #[tokio::test]
    async fn one_of_accepts_304() {
        let url = serve_once("304 Not Modified").await;
        let result =
            http_probe(&url, StatusCheck::OneOf(&[200, 304]), Duration::from_secs(2)).await;
        assert_eq!(result, ProbeResult::Healthy);
    }

    #[tokio::test]
    async fn one_of_rejects_unlisted_success() {
        let url = serve_once("204 No Content").await;
        let result =
            http_probe(&url, StatusCheck::OneOf(&[200, 304]), Duration::from_secs(2)).await;
        assert_eq!(result, ProbeResult::Unhealthy);
    }

    #[tokio::test]
    async fn ipv6_literal_host_connects() {
        let url = serve_once_on("[::1]:0", "200 OK").await;
        assert!(url.starts_with("http://[::1]:"));
        let result = http_probe(&url, StatusCheck::AnySuccess, Duration::from_secs(2)).await;
        assert_eq!(result, ProbeResult::Healthy);
    }

    #[tokio::test]
    async fn closed_port_returns_failed() {
        let result = http_probe(
            "http://127.0.0.1:1/health",
            StatusCheck::AnySuccess,
            Duration::from_millis(200),
        )
        .await;
        assert_eq!(result, ProbeResult::Failed);
    }

    #[tokio::test]
    async fn non_http_scheme_returns_failed() {
        let result = http_probe(
            "https://127.0.0.1/",
            StatusCheck::AnySuccess,
            Duration::from_millis(200),
        )
        .await;
        assert_eq!(result, ProbeResult::Failed);
    }

    #[tokio::test]
    async fn silent_server_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (_sock, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
        });
        let result = http_probe(
            &format!("http://{addr}/"),
            StatusCheck::AnySuccess,
            Duration::from_millis(100),
        )
        .await;
        assert_eq!(result, ProbeResult::Failed);
    }

    #[test]
    fn status_check_any_success() {
        assert!(StatusCheck::AnySuccess.accepts(StatusCode::NO_CONTENT));
        assert!(!StatusCheck::AnySuccess.accepts(StatusCode::NOT_MODIFIED));
    }
}
