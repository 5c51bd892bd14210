//! HTTP probe implementation.

use async_trait::async_trait;
use reqwest::{Method, StatusCode};

use super::{resolve_with_retry, Probe, ProbeError, ProbeKind, ProbeOutcome, ProbeSettings};

/// A parsed `.http` definition.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

/// Parse a raw HTTP request definition.
///
/// The first line is `METHOD PATH`, followed by `Name: Value` headers up to
/// an empty line; everything after it is the body. Requests always go to
/// `https://` plus the `Host` header.
pub fn parse_http_definition(content: &str) -> Result<HttpRequest, String> {
    let mut lines = content.split('\n');

    let request_line = lines.next().unwrap_or_default().trim();
    let mut parts = request_line.split_whitespace();
    let (method, path) = match (parts.next(), parts.next()) {
        (Some(method), Some(path)) => (method, path),
        _ => return Err(format!("invalid request line {:?}", request_line)),
    };

    let method = Method::from_bytes(method.as_bytes())
        .map_err(|_| format!("invalid method {:?}", method))?;

    let mut headers = Vec::new();
    let mut body = Vec::new();
    let mut in_body = false;

    for line in lines {
        if in_body {
            body.push(line);
        } else if line.is_empty() {
            in_body = true;
        } else {
            let (name, value) = line
                .split_once(": ")
                .ok_or_else(|| format!("invalid header line {:?}", line))?;
            headers.push((name.to_string(), value.to_string()));
        }
    }

    let host = headers
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case("host"))
        .map(|(_, value)| value.clone())
        .ok_or_else(|| "missing Host header".to_string())?;

    Ok(HttpRequest {
        method,
        url: format!("https://{}{}", host, path),
        headers,
        body: body.join("\n"),
    })
}

/// Probe that replays a configured HTTP request and expects a 200.
pub struct HttpProbe {
    request: HttpRequest,
    client: reqwest::Client,
    settings: ProbeSettings,
}

impl HttpProbe {
    pub fn new(request: HttpRequest, settings: ProbeSettings) -> Result<Self, ProbeError> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| ProbeError::Network(e.to_string()))?;

        Ok(Self {
            request,
            client,
            settings,
        })
    }

    async fn send(&self) -> Result<(), ProbeError> {
        let mut builder = self
            .client
            .request(self.request.method.clone(), &self.request.url);

        for (name, value) in &self.request.headers {
            // Derived from the URL and body by the client
            if name.eq_ignore_ascii_case("host") || name.eq_ignore_ascii_case("content-length") {
                continue;
            }
            builder = builder.header(name.as_str(), value.as_str());
        }

        if !self.request.body.is_empty() {
            builder = builder.body(self.request.body.clone());
        }

        let timeout = self.settings.timeout;
        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                ProbeError::Timeout(timeout)
            } else {
                ProbeError::Network(e.to_string())
            }
        })?;

        let status = response.status();

        // Read the full body to measure complete transfer time
        let _body = response
            .bytes()
            .await
            .map_err(|e| ProbeError::Network(e.to_string()))?;

        if status != StatusCode::OK {
            return Err(ProbeError::Status(status.as_u16()));
        }

        Ok(())
    }
}

#[async_trait]
impl Probe for HttpProbe {
    fn kind(&self) -> ProbeKind {
        ProbeKind::Http
    }

    async fn resolve(&self) -> ProbeOutcome {
        resolve_with_retry(self.kind(), self.settings.retry_delay, || self.send()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn fast_settings() -> ProbeSettings {
        ProbeSettings {
            timeout: Duration::from_secs(2),
            retry_delay: Duration::ZERO,
        }
    }

    /// Serve `responses` in order, one per accepted connection.
    async fn serve(responses: Vec<&'static str>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            for response in responses {
                let (mut socket, _) = listener.accept().await.unwrap();
                let mut buf = vec![0u8; 4096];
                let mut read = Vec::new();
                while !read.windows(4).any(|w| w == b"\r\n\r\n") {
                    let n = socket.read(&mut buf).await.unwrap();
                    if n == 0 {
                        break;
                    }
                    read.extend_from_slice(&buf[..n]);
                }
                socket.write_all(response.as_bytes()).await.unwrap();
                socket.shutdown().await.unwrap();
            }
        });

        format!("http://{}/health", addr)
    }

    fn request_to(url: String) -> HttpRequest {
        HttpRequest {
            method: Method::GET,
            url,
            headers: vec![("Accept".to_string(), "*/*".to_string())],
            body: String::new(),
        }
    }

    const OK: &str = "HTTP/1.1 200 OK\r\nContent-Length: 2\r\nConnection: close\r\n\r\nok";
    const UNAVAILABLE: &str =
        "HTTP/1.1 503 Service Unavailable\r\nContent-Length: 0\r\nConnection: close\r\n\r\n";

    #[test]
    fn test_parse_http_definition() {
        let content = "POST /api/ping HTTP/1.1\nHost: example.com\nContent-Type: application/json\n\n{\"ping\": true}";
        let request = parse_http_definition(content).unwrap();

        assert_eq!(request.method, Method::POST);
        assert_eq!(request.url, "https://example.com/api/ping");
        assert_eq!(request.headers.len(), 2);
        assert_eq!(request.body, "{\"ping\": true}");
    }

    #[test]
    fn test_parse_http_definition_requires_host() {
        let err = parse_http_definition("GET / HTTP/1.1\nAccept: */*\n").unwrap_err();
        assert!(err.contains("Host"));

        assert!(parse_http_definition("").is_err());
        assert!(parse_http_definition("GET\nHost: example.com\n").is_err());
    }

    #[tokio::test]
    async fn test_http_probe_success() {
        let url = serve(vec![OK]).await;
        let probe = HttpProbe::new(request_to(url), fast_settings()).unwrap();

        let outcome = probe.resolve().await;
        assert!(outcome.succeeded(), "unexpected error: {}", outcome.error);
        assert_eq!(outcome.kind, ProbeKind::Http);
    }

    #[tokio::test]
    async fn test_http_probe_retries_after_bad_status() {
        let url = serve(vec![UNAVAILABLE, OK]).await;
        let probe = HttpProbe::new(request_to(url), fast_settings()).unwrap();

        assert!(probe.resolve().await.succeeded());
    }

    #[tokio::test]
    async fn test_http_probe_bad_status_fails() {
        let url = serve(vec![UNAVAILABLE, UNAVAILABLE]).await;
        let probe = HttpProbe::new(request_to(url), fast_settings()).unwrap();

        let outcome = probe.resolve().await;
        assert_eq!(outcome.error, "Status code was 503 instead of 200");
        assert!(outcome.failed_since > 0);
    }

    #[tokio::test]
    async fn test_http_probe_connection_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let probe = HttpProbe::new(request_to(format!("http://{}/", addr)), fast_settings()).unwrap();
        let outcome = probe.resolve().await;
        assert!(!outcome.succeeded());
    }
}
