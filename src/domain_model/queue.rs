use crate::domain_model::HttpMethod;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub uuid::Uuid);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedWrite {
    pub id: JobId,
    pub target: String,
    pub method: HttpMethod,
    pub payload: Option<serde_json::Value>,
    pub headers: Vec<(String, String)>,
    pub enqueued_at: DateTime<Utc>,
}

impl QueuedWrite {
    pub fn new(
        target: impl Into<String>,
        method: HttpMethod,
        payload: Option<serde_json::Value>,
        headers: Vec<(String, String)>,
    ) -> Self {
        Self {
            id: JobId(uuid::Uuid::new_v4()),
            target: target.into(),
            method,
            payload,
            headers,
            enqueued_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReplayReport {
    pub flushed: usize,
    pub remaining: usize,
}
