//! Scripted loopback HTTP server for exercising the client

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use ghbackup_core::GitHubConfig;
use ghbackup_github::GitHubClient;

/// One canned response, served to one connection
#[derive(Debug, Clone)]
pub struct Reply {
    pub status: u16,
    pub body: String,
    pub delay: Option<Duration>,
}

impl Reply {
    pub fn json(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            delay: None,
        }
    }

    pub fn ok(body: impl Into<String>) -> Self {
        Self::json(200, body)
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

/// What the server saw for one request
#[derive(Debug, Clone, Default)]
pub struct RecordedRequest {
    pub request_line: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Request target, e.g. `/users/alice/repos?page=1&per_page=100`
    pub fn target(&self) -> &str {
        self.request_line.split(' ').nth(1).unwrap_or_default()
    }
}

/// Serves `replies` in order, one per connection, then stops accepting
pub struct ScriptedServer {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    handle: JoinHandle<()>,
}

impl ScriptedServer {
    pub async fn start(replies: Vec<Reply>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&requests);

        let handle = tokio::spawn(async move {
            for reply in replies {
                let Ok((stream, _)) = listener.accept().await else {
                    return;
                };
                let (read, mut write) = stream.into_split();
                let mut reader = BufReader::new(read);

                let mut request = RecordedRequest::default();
                let mut content_length = 0usize;
                let mut line = String::new();
                if reader.read_line(&mut line).await.unwrap_or(0) == 0 {
                    continue;
                }
                request.request_line = line.trim_end().to_string();

                loop {
                    line.clear();
                    if reader.read_line(&mut line).await.unwrap_or(0) == 0 {
                        break;
                    }
                    let trimmed = line.trim_end();
                    if trimmed.is_empty() {
                        break;
                    }
                    if let Some((name, value)) = trimmed.split_once(':') {
                        let value = value.trim().to_string();
                        if name.eq_ignore_ascii_case("content-length") {
                            content_length = value.parse().unwrap_or(0);
                        }
                        request.headers.push((name.to_string(), value));
                    }
                }

                if content_length > 0 {
                    let mut body = vec![0u8; content_length];
                    if reader.read_exact(&mut body).await.is_ok() {
                        request.body = String::from_utf8_lossy(&body).into_owned();
                    }
                }

                recorded.lock().unwrap().push(request);

                if let Some(delay) = reply.delay {
                    tokio::time::sleep(delay).await;
                }

                let response = format!(
                    "HTTP/1.1 {} Scripted\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    reply.status,
                    reply.body.len(),
                    reply.body
                );
                let _ = write.write_all(response.as_bytes()).await;
                let _ = write.shutdown().await;
            }
        });

        Self {
            addr,
            requests,
            handle,
        }
    }

    pub fn origin(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn config(&self) -> GitHubConfig {
        GitHubConfig {
            api_origin: self.origin(),
            timeout: Duration::from_secs(5),
            ..GitHubConfig::default()
        }
    }

    pub fn client(&self) -> GitHubClient {
        GitHubClient::new(&self.config()).unwrap()
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Drop for ScriptedServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// A JSON page of `count` repositories named `{prefix}{i}`
pub fn page_json(prefix: &str, count: usize, fork: bool) -> String {
    let repos: Vec<serde_json::Value> = (0..count)
        .map(|i| {
            serde_json::json!({
                "name": format!("{}{}", prefix, i),
                "clone_url": format!("https://github.com/owner/{}{}.git", prefix, i),
                "fork": fork,
                "private": false,
            })
        })
        .collect();
    serde_json::Value::Array(repos).to_string()
}
