//! Scripted HTTP endpoint for extension tests.
//!
//! Binds `127.0.0.1:0`, answers each connection with the next scripted
//! response (the last one repeats) and records what it received. Only
//! enough HTTP/1.1 is spoken to serve one request per connection.

use anyhow::{bail, Context, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tracing::debug;

const MAX_HEAD_BYTES: usize = 64 * 1024;

/// One canned answer.
#[derive(Debug, Clone)]
pub struct ScriptedResponse {
    pub status: u16,
    pub body: String,
    /// Held before answering, to exercise client timeouts.
    pub delay: Option<Duration>,
}

impl ScriptedResponse {
    pub fn json(status: u16, body: serde_json::Value) -> Self {
        Self {
            status,
            body: body.to_string(),
            delay: None,
        }
    }

    pub fn text(status: u16, body: &str) -> Self {
        Self {
            status,
            body: body.to_string(),
            delay: None,
        }
    }

    /// `204 No Content`.
    pub fn no_content() -> Self {
        Self::text(204, "")
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

/// A request as seen by the server.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl RecordedRequest {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn json(&self) -> Result<serde_json::Value> {
        serde_json::from_slice(&self.body).context("request body is not JSON")
    }
}

struct Shared {
    script: Vec<ScriptedResponse>,
    served: AtomicUsize,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl Shared {
    fn next_response(&self) -> ScriptedResponse {
        let n = self.served.fetch_add(1, Ordering::SeqCst);
        let index = n.min(self.script.len().saturating_sub(1));
        self.script
            .get(index)
            .cloned()
            .unwrap_or_else(ScriptedResponse::no_content)
    }
}

/// Local HTTP server replaying a fixed script. Stops when dropped.
pub struct ScriptedServer {
    base_url: String,
    shared: Arc<Shared>,
    accept_task: JoinHandle<()>,
}

impl ScriptedServer {
    pub async fn start(script: Vec<ScriptedResponse>) -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .context("failed to bind scripted server")?;
        let addr = listener.local_addr()?;
        let shared = Arc::new(Shared {
            script,
            served: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        });

        let accept_shared = Arc::clone(&shared);
        let accept_task = tokio::spawn(async move {
            loop {
                let (stream, _) = match listener.accept().await {
                    Ok(conn) => conn,
                    Err(e) => {
                        debug!(error = %e, "Scripted server accept failed");
                        continue;
                    }
                };
                let shared = Arc::clone(&accept_shared);
                tokio::spawn(async move {
                    if let Err(e) = serve(stream, shared).await {
                        debug!(error = %e, "Scripted server connection ended");
                    }
                });
            }
        });

        Ok(Self {
            base_url: format!("http://{}", addr),
            shared,
            accept_task,
        })
    }

    /// Convenience for a server that always gives the same answer.
    pub async fn always(response: ScriptedResponse) -> Result<Self> {
        Self::start(vec![response]).await
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.shared
            .requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    pub fn request_count(&self) -> usize {
        self.shared
            .requests
            .lock()
            .map(|requests| requests.len())
            .unwrap_or_default()
    }
}

impl Drop for ScriptedServer {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

/// URL of a local port with nothing listening on it.
pub async fn unused_local_url(path: &str) -> Result<String> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    drop(listener);
    Ok(format!("http://{}{}", addr, path))
}

async fn serve(mut stream: TcpStream, shared: Arc<Shared>) -> Result<()> {
    let request = read_request(&mut stream).await?;
    debug!(method = %request.method, path = %request.path, "Scripted server received request");
    if let Ok(mut requests) = shared.requests.lock() {
        requests.push(request);
    }

    let response = shared.next_response();
    if let Some(delay) = response.delay {
        tokio::time::sleep(delay).await;
    }
    stream.write_all(&render(&response)).await?;
    stream.shutdown().await?;
    Ok(())
}

async fn read_request(stream: &mut TcpStream) -> Result<RecordedRequest> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let head_end = loop {
        if let Some(pos) = find_head_end(&buf) {
            break pos;
        }
        if buf.len() > MAX_HEAD_BYTES {
            bail!("request head too large");
        }
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            bail!("connection closed before request head");
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).into_owned();
    let mut lines = head.split("\r\n");
    let request_line = lines.next().unwrap_or_default();
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default().to_string();
    let path = parts.next().unwrap_or_default().to_string();

    let headers: Vec<(String, String)> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
        .collect();
    let content_length = headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.parse::<usize>().ok())
        .unwrap_or(0);

    let mut body = buf[head_end + 4..].to_vec();
    while body.len() < content_length {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            bail!("connection closed mid-body");
        }
        body.extend_from_slice(&chunk[..n]);
    }
    body.truncate(content_length);

    Ok(RecordedRequest {
        method,
        path,
        headers,
        body,
    })
}

fn find_head_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|window| window == b"\r\n\r\n")
}

fn render(response: &ScriptedResponse) -> Vec<u8> {
    let mut out = format!(
        "HTTP/1.1 {} {}\r\nConnection: close\r\n",
        response.status,
        reason(response.status)
    );
    if response.status != 204 {
        out.push_str("Content-Type: application/json\r\n");
        out.push_str(&format!("Content-Length: {}\r\n", response.body.len()));
    }
    out.push_str("\r\n");
    if response.status != 204 {
        out.push_str(&response.body);
    }
    out.into_bytes()
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        204 => "No Content",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        _ => "Status",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_replays_script_and_repeats_last() {
        let server = ScriptedServer::start(vec![
            ScriptedResponse::text(500, "boom"),
            ScriptedResponse::json(200, serde_json::json!({"ok": true})),
        ])
        .await
        .unwrap();
        let client = reqwest::Client::new();

        let first = client.get(server.url("/a")).send().await.unwrap();
        assert_eq!(first.status().as_u16(), 500);
        assert_eq!(first.text().await.unwrap(), "boom");

        for _ in 0..2 {
            let next = client.get(server.url("/a")).send().await.unwrap();
            assert_eq!(next.status().as_u16(), 200);
        }
        assert_eq!(server.request_count(), 3);
    }

    #[tokio::test]
    async fn test_records_headers_and_body() {
        let server = ScriptedServer::always(ScriptedResponse::no_content())
            .await
            .unwrap();
        let response = reqwest::Client::new()
            .post(server.url("/hook"))
            .header("X-Trace", "yes")
            .json(&serde_json::json!({"n": 1}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 204);

        let requests = server.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, "POST");
        assert_eq!(requests[0].path, "/hook");
        assert_eq!(requests[0].header("x-trace"), Some("yes"));
        assert_eq!(requests[0].json().unwrap()["n"], 1);
    }
}
