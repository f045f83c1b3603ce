use crate::application_impl::*;
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use chrono::Utc;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub base_url: String,
    pub app_version: String,
}

pub struct PipelineComponents {
    pub transport: Arc<dyn Transport>,
    pub session: Arc<SessionStore>,
    pub refresher: Arc<RefreshCoordinator>,
    pub cache: Arc<ResponseCache>,
    pub retry: RetryPolicy,
    pub queue: Arc<OfflineQueue>,
    pub network: Arc<NetworkQualityEstimator>,
    pub probe: Arc<ColdStartProbe>,
}

/// Everything one logical call needs once the URL is resolved.
struct Prepared {
    method: HttpMethod,
    url: String,
    path: String,
    body: Option<Vec<u8>>,
    headers: Vec<(String, String)>,
    options: RequestOptions,
    cache_key: Option<CacheKey>,
}

pub struct ApiPipeline {
    config: PipelineConfig,
    transport: Arc<dyn Transport>,
    session: Arc<SessionStore>,
    refresher: Arc<RefreshCoordinator>,
    cache: Arc<ResponseCache>,
    dedup: RequestDeduplicator,
    retry: RetryPolicy,
    queue: Arc<OfflineQueue>,
    network: Arc<NetworkQualityEstimator>,
    probe: Arc<ColdStartProbe>,
}

impl ApiPipeline {
    pub fn new(config: PipelineConfig, components: PipelineComponents) -> Self {
        let PipelineComponents {
            transport,
            session,
            refresher,
            cache,
            retry,
            queue,
            network,
            probe,
        } = components;
        Self {
            config,
            transport,
            session,
            refresher,
            cache,
            dedup: RequestDeduplicator::new(),
            retry,
            queue,
            network,
            probe,
        }
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    pub fn offline_queue(&self) -> &OfflineQueue {
        &self.queue
    }

    /// Drops cached responses for `path`, whatever their query.
    pub fn invalidate(&self, path: &str) -> usize {
        self.cache.invalidate_path(path)
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Replays queued writes in order. A no-op while offline.
    pub async fn flush_offline_queue(&self) -> Result<ReplayReport, ApiError> {
        if !self.network.is_online() {
            return Ok(ReplayReport {
                flushed: 0,
                remaining: self.queue.queued_count(),
            });
        }
        self.queue.replay(|job| self.replay_job(job)).await
    }

    async fn replay_job(&self, job: QueuedWrite) -> Result<(), ApiError> {
        let prepared = Prepared {
            method: job.method,
            url: job.target,
            path: String::new(),
            body: job.payload.as_ref().and_then(|body| serde_json::to_vec(body).ok()),
            headers: job.headers,
            options: RequestOptions {
                cache: CacheMode::Off,
                max_retries: Some(0),
                ..Default::default()
            },
            cache_key: None,
        };
        self.dispatch(prepared, None).await.map(|_| ())
    }

    fn endpoint_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_owned();
        }
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn with_query(url: &str, query: &[(String, String)]) -> Result<String, ApiError> {
        if query.is_empty() {
            return Ok(url.to_owned());
        }
        let mut parsed = reqwest::Url::parse(url)
            .map_err(|e| ApiError::Configuration(format!("invalid url {url}: {e}")))?;
        parsed
            .query_pairs_mut()
            .extend_pairs(query.iter().map(|(key, value)| (key.as_str(), value.as_str())));
        Ok(parsed.to_string())
    }

    fn build_request(
        &self,
        prepared: &Prepared,
        validator: Option<&str>,
        request_id: &str,
    ) -> TransportRequest {
        let timeout = prepared
            .options
            .timeout
            .unwrap_or_else(|| self.network.timeout());
        let mut request = TransportRequest::json(prepared.method, prepared.url.as_str(), timeout)
            .with_header("X-Request-Id", request_id)
            .with_header("X-App-Version", self.config.app_version.as_str());
        if self.network.save_data() {
            request = request.with_header("Save-Data", "on");
        }
        if !prepared.options.skip_auth && self.session.auth_mode().sends_bearer() {
            if let Some(token) = self.session.access_token() {
                request = request.with_header("Authorization", format!("Bearer {token}"));
            }
        }
        if let Some(validator) = validator {
            request = request.with_header("If-None-Match", validator);
        }
        for (name, value) in &prepared.headers {
            request = request.with_header(name.as_str(), value.as_str());
        }
        request.body = prepared.body.clone();
        request
    }

    async fn dispatch(
        &self,
        prepared: Prepared,
        guard: Option<&InflightGuard>,
    ) -> Result<ApiResponse, ApiError> {
        let options = &prepared.options;
        let cached = match (&prepared.cache_key, options.cache) {
            (Some(key), CacheMode::Default) => self.cache.lookup(key),
            _ => None,
        };
        let budget = self.retry.budget_for(prepared.method, options.max_retries);
        let request_id = uuid::Uuid::new_v4().to_string();
        let mut attempt = 0;
        let mut auth_retried = false;

        let failure = loop {
            let request = self.build_request(
                &prepared,
                cached.as_ref().map(|entry| entry.validator.as_str()),
                &request_id,
            );
            let outcome = match guard {
                Some(guard) => tokio::select! {
                    biased;

                    _ = guard.token().cancelled() => return Err(ApiError::Cancelled),
                    outcome = self.transport.execute(request) => outcome,
                },
                None => self.transport.execute(request).await,
            };

            let mut retry_after = None;
            let failure = match outcome {
                Ok(response) => {
                    self.probe.record_success();
                    log_rate_limit(&response);
                    let status = response.status;

                    if status == 304 {
                        if let Some(entry) = prepared
                            .cache_key
                            .as_ref()
                            .filter(|_| cached.is_some())
                            .and_then(|key| self.cache.revalidated(key, options.cache_ttl))
                        {
                            tracing::debug!("{} {} not modified", prepared.method, prepared.url);
                            return Ok(ApiResponse {
                                status: entry.status,
                                headers: entry.headers,
                                body: entry.body,
                                source: ResponseSource::Revalidated,
                            });
                        }
                    }
                    if response.is_success() {
                        return self.accept(&prepared, response);
                    }

                    let body = error_body(&response);
                    let message = error_message(status, &body);
                    if status == 401 && !options.skip_auth && !auth_retried {
                        auth_retried = true;
                        tracing::debug!("{} {} unauthorized, renewing session", prepared.method, prepared.url);
                        match self.refresher.refresh_now().await {
                            Ok(()) => continue,
                            Err(e) => {
                                tracing::warn!("renewal after 401 failed: {}", e);
                                return Err(ApiError::SessionExpired);
                            }
                        }
                    }
                    if status >= 500 && !RetryPolicy::is_retryable_status(status) {
                        self.probe.record_failure();
                        return self.stale_or(&prepared, ApiError::Server { status, message });
                    }
                    if !RetryPolicy::is_retryable_status(status) {
                        return Err(ApiError::Client {
                            status,
                            message,
                            body,
                        });
                    }

                    self.probe.record_failure();
                    retry_after = response
                        .header("retry-after")
                        .and_then(|value| RetryPolicy::parse_retry_after(value, Utc::now()));
                    ApiError::Server { status, message }
                }
                Err(TransportError::Timeout) => {
                    self.probe.record_failure();
                    ApiError::Timeout
                }
                Err(e) => {
                    self.probe.record_failure();
                    ApiError::Network(e.to_string())
                }
            };

            if attempt >= budget {
                break failure;
            }
            let delay = self.retry.delay_for(attempt, retry_after);
            attempt += 1;
            tracing::warn!(
                "{} {} failed ({}), retry {}/{} in {:?}",
                prepared.method,
                prepared.url,
                failure,
                attempt,
                budget,
                delay
            );
            if attempt == 1 {
                // The backend may be waking from idle.
                self.probe.probe().await;
            }
            wait(delay, guard).await?;
        };

        self.stale_or(&prepared, failure)
    }

    fn accept(
        &self,
        prepared: &Prepared,
        response: TransportResponse,
    ) -> Result<ApiResponse, ApiError> {
        if response
            .header("content-type")
            .is_some_and(|value| value.to_ascii_lowercase().contains("text/html"))
        {
            return Err(ApiError::Decode(format!(
                "received HTML instead of JSON from {}",
                prepared.url
            )));
        }
        let body = response
            .json_body()
            .map_err(|e| ApiError::Decode(e.to_string()))?;

        if let Some(key) = &prepared.cache_key {
            self.cache.store(
                key.clone(),
                &prepared.path,
                response.header("etag"),
                response.status,
                response.headers.clone(),
                body.clone(),
                prepared.options.cache_ttl,
            );
        }

        Ok(ApiResponse {
            status: response.status,
            headers: response.headers,
            body,
            source: ResponseSource::Network,
        })
    }

    /// Serves a live cached body in place of a transient failure.
    fn stale_or(&self, prepared: &Prepared, failure: ApiError) -> Result<ApiResponse, ApiError> {
        if !failure.is_transient() || prepared.options.cache != CacheMode::Default {
            return Err(failure);
        }
        match prepared.cache_key.as_ref().and_then(|key| self.cache.lookup(key)) {
            Some(entry) => {
                tracing::warn!(
                    "{} {} failed ({}), serving cached copy",
                    prepared.method,
                    prepared.url,
                    failure
                );
                Ok(ApiResponse {
                    status: entry.status,
                    headers: entry.headers,
                    body: entry.body,
                    source: ResponseSource::StaleCache,
                })
            }
            None => Err(failure),
        }
    }
}

#[async_trait::async_trait]
impl ApiClient for ApiPipeline {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let base_url = self.endpoint_url(&request.path);
        let query = request.normalized_query();
        let url = Self::with_query(&base_url, &query)?;
        let cache_key = (request.method.is_read() && request.options.cache != CacheMode::Off)
            .then(|| request.cache_key(&base_url));
        let body = match &request.body {
            Some(body) => Some(
                serde_json::to_vec(body).map_err(|e| ApiError::Decode(e.to_string()))?,
            ),
            None => None,
        };
        let prepared = Prepared {
            method: request.method,
            url,
            path: request.path.clone(),
            body,
            headers: request.headers.clone(),
            options: request.options.clone(),
            cache_key,
        };

        if !self.network.is_online() {
            if !request.method.is_read() && request.options.offline == OfflinePolicy::Queue {
                self.queue.enqueue(QueuedWrite::new(
                    prepared.url,
                    request.method,
                    request.body,
                    request.headers,
                ));
                return Ok(ApiResponse {
                    status: 202,
                    headers: Vec::new(),
                    body: json!({ "queued": true, "offline": true }),
                    source: ResponseSource::OfflineQueued,
                });
            }
            return self.stale_or(&prepared, ApiError::Network("offline".to_owned()));
        }

        if request.options.latency_sensitive {
            self.probe.warm_if_due().await;
        }

        let guard = request
            .dedupable()
            .then(|| self.dedup.register(request.dedup_key(&base_url)));
        if let Some(guard) = &guard {
            // Let an identical request issued in the same tick supersede this
            // one before it goes out.
            tokio::task::yield_now().await;
            if guard.is_superseded() {
                return Err(ApiError::Cancelled);
            }
        }

        self.dispatch(prepared, guard.as_ref()).await
    }
}

async fn wait(delay: Duration, guard: Option<&InflightGuard>) -> Result<(), ApiError> {
    match guard {
        Some(guard) => tokio::select! {
            biased;

            _ = guard.token().cancelled() => Err(ApiError::Cancelled),
            _ = tokio::time::sleep(delay) => Ok(()),
        },
        None => {
            tokio::time::sleep(delay).await;
            Ok(())
        }
    }
}

fn error_body(response: &TransportResponse) -> Value {
    match response.json_body() {
        Ok(body) => body,
        Err(_) => Value::String(String::from_utf8_lossy(&response.body).into_owned()),
    }
}

fn log_rate_limit(response: &TransportResponse) {
    if let (Some(limit), Some(remaining)) = (
        response.header("x-ratelimit-limit"),
        response.header("x-ratelimit-remaining"),
    ) {
        tracing::debug!("rate limit: {}/{} remaining", remaining, limit);
    }
}
