//! Shared fixtures for unit tests.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;
use tempfile::TempDir;

use crate::config::ConfigDocument;
use crate::proxy::{Transport, TransportError, TransportRequest, TransportResponse};
use crate::registry::ProfileRegistry;

/// Build a registry from an in-memory document anchored at `base_dir`.
pub fn registry_from(doc: Value, base_dir: &Path) -> ProfileRegistry {
    let doc = ConfigDocument::from_value(doc).unwrap();
    ProfileRegistry::load_document(doc, base_dir).unwrap()
}

/// Drop a rule file into `<dir>/interfaceRules/`.
pub fn write_rule(dir: &TempDir, name: &str, contents: &str) {
    let rulebase = dir.path().join("interfaceRules");
    std::fs::create_dir_all(&rulebase).unwrap();
    std::fs::write(rulebase.join(name), contents).unwrap();
}

enum Reply {
    Body { delay: Duration, body: String },
    Fail,
}

/// Programmable transport double. Replies are matched by URL prefix in
/// registration order; unmatched requests fail.
pub struct StubTransport {
    replies: Vec<(String, Reply)>,
    calls: AtomicUsize,
    requests: Mutex<Vec<TransportRequest>>,
}

impl StubTransport {
    pub fn new() -> Self {
        StubTransport {
            replies: Vec::new(),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn reply(self, url_prefix: &str, body: &str) -> Self {
        self.reply_after(url_prefix, 0, body)
    }

    pub fn reply_after(mut self, url_prefix: &str, delay_ms: u64, body: &str) -> Self {
        self.replies.push((
            url_prefix.to_string(),
            Reply::Body {
                delay: Duration::from_millis(delay_ms),
                body: body.to_string(),
            },
        ));
        self
    }

    pub fn fail(mut self, url_prefix: &str) -> Self {
        self.replies.push((url_prefix.to_string(), Reply::Fail));
        self
    }

    /// Number of calls that reached the transport.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every request seen so far, in arrival order.
    pub fn requests(&self) -> Vec<TransportRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Default for StubTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for StubTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());

        let reply = self
            .replies
            .iter()
            .find(|(prefix, _)| request.url.starts_with(prefix.as_str()));
        match reply {
            Some((_, Reply::Body { delay, body })) => {
                if !delay.is_zero() {
                    tokio::time::sleep(*delay).await;
                }
                Ok(TransportResponse {
                    status: 200,
                    body: Bytes::from(body.clone()),
                })
            }
            _ => Err(TransportError::Failed {
                url: request.url.clone(),
                reason: "stubbed failure".to_string(),
            }),
        }
    }
}
