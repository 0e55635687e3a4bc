//! Wire-level request/response dumping.

use std::fmt::Write as _;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::{Request, Response};
use tracing::warn;

use crate::error::{Error, Result};
use crate::transport::{Middleware, Next};

/// Middleware that mirrors every request and response to a writer.
///
/// # Security
///
/// The dump includes every header, including `Authorization`. Enabling the
/// tracer writes the bearer token to whatever reads the writer (stderr by
/// default). Only enable it while debugging, against throwaway tokens.
#[derive(Clone)]
pub struct VerboseTracer {
    writer: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl VerboseTracer {
    /// A tracer writing to stderr.
    pub fn stderr() -> Self {
        Self::new(io::stderr())
    }

    /// A tracer writing to `writer`.
    pub fn new(writer: impl Write + Send + 'static) -> Self {
        Self {
            writer: Arc::new(Mutex::new(Box::new(writer))),
        }
    }

    fn emit(&self, text: &str) -> Result<()> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| Error::trace("trace writer lock poisoned"))?;
        writer
            .write_all(text.as_bytes())
            .and_then(|()| writer.flush())
            .map_err(|e| Error::trace(e.to_string()))
    }

    fn emit_or_warn(&self, text: &str) {
        if let Err(e) = self.emit(text) {
            warn!(error = %e, "Cannot write response trace");
        }
    }
}

impl std::fmt::Debug for VerboseTracer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerboseTracer").finish_non_exhaustive()
    }
}

#[async_trait]
impl Middleware for VerboseTracer {
    async fn handle(&self, request: Request, next: Next<'_>) -> Result<Response> {
        self.emit(&dump_request(&request))?;

        // The request has been sent from here on; a failed dump must not
        // turn a completed call into an error.
        match next.run(request).await {
            Ok(response) => {
                let (dump, response) = dump_response(response).await?;
                self.emit_or_warn(&dump);
                Ok(response)
            }
            Err(err) => {
                self.emit_or_warn(&format!("<-- error: {err}\n\n"));
                Err(err)
            }
        }
    }
}

fn write_headers(out: &mut String, headers: &HeaderMap) {
    for (name, value) in headers {
        let _ = writeln!(out, "{name}: {}", value.to_str().unwrap_or("<binary>"));
    }
}

fn write_body(out: &mut String, body: &[u8]) {
    if !body.is_empty() {
        out.push('\n');
        out.push_str(&String::from_utf8_lossy(body));
        out.push('\n');
    }
    out.push('\n');
}

fn dump_request(request: &Request) -> String {
    let mut out = format!("--> {} {}\n", request.method(), request.url());
    write_headers(&mut out, request.headers());
    let body = request
        .body()
        .and_then(reqwest::Body::as_bytes)
        .unwrap_or_default();
    write_body(&mut out, body);
    out
}

/// Buffer the response body, dump it, and hand back an equivalent response.
async fn dump_response(response: Response) -> Result<(String, Response)> {
    let status = response.status();
    let version = response.version();
    let headers = response.headers().clone();

    let mut out = format!("<-- {status} {version:?}\n");
    write_headers(&mut out, &headers);

    let body = response.bytes().await?;
    write_body(&mut out, &body);

    let mut builder = http::Response::builder().status(status).version(version);
    if let Some(slot) = builder.headers_mut() {
        *slot = headers;
    }
    let rebuilt = builder
        .body(body)
        .map_err(|e| Error::trace(e.to_string()))?;

    Ok((out, Response::from(rebuilt)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{HttpTransport, TransportConfig};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    type TestResult = std::result::Result<(), Box<dyn std::error::Error>>;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Captured {
        fn text(&self) -> String {
            self.0
                .lock()
                .map(|buf| String::from_utf8_lossy(&buf).into_owned())
                .unwrap_or_default()
        }
    }

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0
                .lock()
                .map_err(|_| io::Error::other("poisoned"))?
                .extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_dumps_request_and_response() -> TestResult {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/user/repos"))
            .respond_with(
                ResponseTemplate::new(201)
                    .insert_header("x-github-request-id", "ABCD")
                    .set_body_string(r#"{"full_name":"alice/widgets"}"#),
            )
            .mount(&server)
            .await;

        let captured = Captured::default();
        let transport = HttpTransport::new(&TransportConfig::default())?
            .with(VerboseTracer::new(captured.clone()));

        let request = transport
            .client()
            .post(format!("{}/user/repos", server.uri()))
            .header("authorization", "token sekrit")
            .body(r#"{"name":"widgets"}"#)
            .build()?;
        let response = transport.execute(request).await?;

        assert_eq!(response.status(), 201);
        assert_eq!(
            response.headers().get("x-github-request-id").map(|v| v.as_bytes()),
            Some(b"ABCD".as_slice())
        );
        assert_eq!(response.text().await?, r#"{"full_name":"alice/widgets"}"#);

        let dump = captured.text();
        assert!(dump.contains("--> POST"));
        assert!(dump.contains("/user/repos"));
        assert!(dump.contains(r#"{"name":"widgets"}"#));
        assert!(dump.contains("authorization: token sekrit"));
        assert!(dump.contains("<-- 201 Created"));
        assert!(dump.contains("alice/widgets"));
        Ok(())
    }

    /// Accepts the request dump, then fails every later write.
    #[derive(Clone, Default)]
    struct FailsAfterRequest(Arc<Mutex<usize>>);

    impl Write for FailsAfterRequest {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let mut writes = self.0.lock().map_err(|_| io::Error::other("poisoned"))?;
            *writes = writes.saturating_add(1);
            if *writes > 1 {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "stderr closed"));
            }
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Given a trace writer that breaks after the request is dumped
    /// When a create call completes with 201
    /// Then the caller still gets the 201 response
    #[tokio::test]
    async fn test_broken_writer_keeps_completed_response() -> TestResult {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/user/repos"))
            .respond_with(ResponseTemplate::new(201).set_body_string("{}"))
            .expect(1)
            .mount(&server)
            .await;

        let transport = HttpTransport::new(&TransportConfig::default())?
            .with(VerboseTracer::new(FailsAfterRequest::default()));

        let request = transport
            .client()
            .post(format!("{}/user/repos", server.uri()))
            .build()?;
        let response = transport.execute(request).await?;

        assert_eq!(response.status(), 201);
        Ok(())
    }

    #[tokio::test]
    async fn test_dumps_transport_errors() -> TestResult {
        let captured = Captured::default();
        let transport = HttpTransport::new(&TransportConfig::default())?
            .with(VerboseTracer::new(captured.clone()));

        // Nothing listens on port 1.
        let request = transport.client().get("http://127.0.0.1:1/").build()?;
        let result = transport.execute(request).await;

        assert!(result.is_err());
        assert!(captured.text().contains("<-- error:"));
        Ok(())
    }
}
