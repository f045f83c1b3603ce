use crate::domain_model::HttpMethod;
use crate::domain_port::*;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

/// One scripted outcome, optionally after a delay.
#[derive(Debug, Clone)]
pub struct FakeReply {
    pub outcome: Result<TransportResponse, TransportError>,
    pub delay: Duration,
}

impl FakeReply {
    pub fn json(status: u16, body: serde_json::Value) -> Self {
        Self {
            outcome: Ok(TransportResponse::new(status).with_json(&body)),
            delay: Duration::ZERO,
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            outcome: Ok(TransportResponse::new(status)),
            delay: Duration::ZERO,
        }
    }

    pub fn response(response: TransportResponse) -> Self {
        Self {
            outcome: Ok(response),
            delay: Duration::ZERO,
        }
    }

    pub fn error(error: TransportError) -> Self {
        Self {
            outcome: Err(error),
            delay: Duration::ZERO,
        }
    }

    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub request: TransportRequest,
    pub path: String,
    pub at: Instant,
}

type Handler = Arc<dyn Fn(&TransportRequest) -> Option<FakeReply> + Send + Sync>;

/// Scripted transport.
///
/// Replies are queued per path; the last queued reply for a path repeats
/// once the queue drains. A handler, when set, is consulted first and may
/// decline by returning `None`. Unscripted paths get the fallback reply.
pub struct FakeTransport {
    scripts: Mutex<HashMap<String, VecDeque<FakeReply>>>,
    handler: Mutex<Option<Handler>>,
    fallback: FakeReply,
    recorded: Mutex<Vec<RecordedRequest>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::with_fallback(FakeReply::json(
            404,
            serde_json::json!({ "detail": "Not Found" }),
        ))
    }

    pub fn with_fallback(fallback: FakeReply) -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            handler: Mutex::new(None),
            fallback,
            recorded: Mutex::new(Vec::new()),
        }
    }

    pub fn on(&self, path: &str, reply: FakeReply) -> &Self {
        self.scripts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(path.to_owned())
            .or_default()
            .push_back(reply);
        self
    }

    pub fn set_handler(
        &self,
        handler: impl Fn(&TransportRequest) -> Option<FakeReply> + Send + Sync + 'static,
    ) {
        *self.handler.lock().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(handler));
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.recorded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn requests_to(&self, path: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|recorded| recorded.path == path)
            .collect()
    }

    pub fn count(&self, method: HttpMethod, path: &str) -> usize {
        self.requests()
            .iter()
            .filter(|recorded| recorded.request.method == method && recorded.path == path)
            .count()
    }

    fn next_reply(&self, path: &str, request: &TransportRequest) -> FakeReply {
        let handler = self
            .handler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(reply) = handler.and_then(|handler| handler(request)) {
            return reply;
        }

        let mut scripts = self.scripts.lock().unwrap_or_else(PoisonError::into_inner);
        match scripts.get_mut(path) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap_or_else(|| self.fallback.clone()),
            Some(queue) => queue.front().cloned().unwrap_or_else(|| self.fallback.clone()),
            None => self.fallback.clone(),
        }
    }
}

impl Default for FakeTransport {
    fn default() -> Self {
        Self::new()
    }
}

fn path_of(url: &str) -> String {
    match reqwest::Url::parse(url) {
        Ok(parsed) => parsed.path().to_owned(),
        Err(_) => url.split('?').next().unwrap_or(url).to_owned(),
    }
}

#[async_trait::async_trait]
impl Transport for FakeTransport {
    async fn execute(
        &self,
        request: TransportRequest,
    ) -> Result<TransportResponse, TransportError> {
        let path = path_of(&request.url);
        self.recorded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RecordedRequest {
                request: request.clone(),
                path: path.clone(),
                at: Instant::now(),
            });

        let reply = self.next_reply(&path, &request);
        if !reply.delay.is_zero() {
            if reply.delay > request.timeout {
                tokio::time::sleep(request.timeout).await;
                return Err(TransportError::Timeout);
            }
            tokio::time::sleep(reply.delay).await;
        }
        reply.outcome
    }
}
