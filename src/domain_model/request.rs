use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Head => "HEAD",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }

    /// Safe methods: cacheable, de-duplicated and retried by default.
    pub fn is_read(&self) -> bool {
        matches!(self, HttpMethod::Get | HttpMethod::Head)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheMode {
    /// Revalidate with the stored validator and fall back to it on transient failure.
    #[default]
    Default,
    /// Skip the stored entry for this call but store the fresh response.
    Bypass,
    /// Do not touch the cache at all.
    Off,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OfflinePolicy {
    #[default]
    Fail,
    Queue,
}

#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub cache: CacheMode,
    pub cache_ttl: Option<Duration>,
    /// `None` de-duplicates reads and leaves writes alone.
    pub dedupe: Option<bool>,
    /// `None` uses the method default from the retry policy.
    pub max_retries: Option<u32>,
    pub offline: OfflinePolicy,
    pub timeout: Option<Duration>,
    pub skip_auth: bool,
    pub latency_sensitive: bool,
}

#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: HttpMethod,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
    pub headers: Vec<(String, String)>,
    pub options: RequestOptions,
}

impl ApiRequest {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            headers: Vec::new(),
            options: RequestOptions::default(),
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, path)
    }

    pub fn post(path: impl Into<String>, body: serde_json::Value) -> Self {
        Self::new(HttpMethod::Post, path).with_body(body)
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }

    pub fn dedupable(&self) -> bool {
        self.options.dedupe.unwrap_or(self.method.is_read())
    }

    /// Empty keys and values are dropped, the rest sorted so that parameter
    /// order never splits a cache or de-dup key.
    pub fn normalized_query(&self) -> Vec<(String, String)> {
        let mut out = self
            .query
            .iter()
            .filter_map(|(key, value)| {
                let key = key.trim();
                let value = value.trim();
                if key.is_empty() || value.is_empty() {
                    None
                } else {
                    Some((key.to_owned(), value.to_owned()))
                }
            })
            .collect::<Vec<_>>();
        out.sort();
        out
    }

    pub fn cache_key(&self, url: &str) -> CacheKey {
        CacheKey(format!(
            "{}::{}::{}",
            self.method,
            url,
            encode_query(&self.normalized_query())
        ))
    }

    pub fn dedup_key(&self, url: &str) -> RequestKey {
        let fingerprint = match &self.body {
            Some(body) if !self.method.is_read() => {
                let bytes = serde_json::to_vec(body).unwrap_or_default();
                hex::encode(Sha256::digest(&bytes).as_slice())
            }
            _ => String::new(),
        };
        RequestKey(format!(
            "{}::{}::{}::{}",
            self.method,
            url,
            encode_query(&self.normalized_query()),
            fingerprint
        ))
    }
}

pub fn encode_query(params: &[(String, String)]) -> String {
    params
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("&")
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(pub String);

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestKey(pub String);

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn query_order_does_not_change_keys() {
        let a = ApiRequest::get("/items").with_query("b", "2").with_query("a", "1");
        let b = ApiRequest::get("/items").with_query("a", "1").with_query("b", "2");
        assert_eq!(a.cache_key("u"), b.cache_key("u"));
        assert_eq!(a.dedup_key("u"), b.dedup_key("u"));
    }

    #[test]
    fn cache_key_separates_methods() {
        let get = ApiRequest::get("/items");
        let head = ApiRequest::new(HttpMethod::Head, "/items");
        assert_ne!(get.cache_key("u"), head.cache_key("u"));
    }

    #[test]
    fn write_bodies_are_fingerprinted() {
        let a = ApiRequest::post("/orders", json!({"sku": 1}));
        let b = ApiRequest::post("/orders", json!({"sku": 2}));
        assert_ne!(a.dedup_key("u"), b.dedup_key("u"));
    }

    #[test]
    fn only_reads_dedupe_by_default() {
        assert!(ApiRequest::get("/a").dedupable());
        assert!(!ApiRequest::post("/a", json!({})).dedupable());
        let opted_in = ApiRequest::post("/a", json!({})).with_options(RequestOptions {
            dedupe: Some(true),
            ..Default::default()
        });
        assert!(opted_in.dedupable());
    }
}
