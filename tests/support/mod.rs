#![allow(dead_code)]

use jsonwebtoken::{EncodingKey, Header, encode};
use lifeline::domain_port::{KeyValueStore, StoreError};
use lifeline::infra_http::*;
use lifeline::infra_local::*;
use lifeline::runtime::ClientRuntime;
use lifeline::settings::{Settings, parse_settings};
use serde_json::{Value, json};
use std::sync::Arc;

pub const BASE_URL: &str = "http://api.test/api";
/// Wall clock at the moment the harness starts.
pub const START: i64 = 1_700_000_000;

pub const REFRESH_PATH: &str = "/api/auth/token/refresh";
pub const LOGIN_PATH: &str = "/api/auth/login";
pub const ME_PATH: &str = "/api/auth/me";
pub const HEALTH_PATH: &str = "/api/healthz";

pub fn jwt(claims: Value) -> String {
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(b"integration-secret"),
    )
    .unwrap()
}

/// Token valid for `ttl` seconds counted from `issued_at`.
pub fn token_for(sub: &str, issued_at: i64, ttl: i64) -> String {
    jwt(json!({ "sub": sub, "iat": issued_at, "exp": issued_at + ttl }))
}

pub fn settings() -> Settings {
    let mut settings = parse_settings(Some("settings/dev.toml")).unwrap();
    settings.api.base_url = BASE_URL.to_owned();
    settings.retry.jitter_ratio = 0.0;
    settings
}

pub struct Harness {
    pub fake: Arc<FakeTransport>,
    pub durable: Arc<MemoryStore>,
    pub runtime: ClientRuntime,
}

pub fn harness() -> Harness {
    harness_with(settings())
}

pub fn harness_with(settings: Settings) -> Harness {
    let fake = Arc::new(FakeTransport::new());
    fake.on(HEALTH_PATH, FakeReply::json(200, json!({ "status": "ok" })));
    let durable = Arc::new(MemoryStore::new());
    let runtime = runtime_over(
        &settings,
        fake.clone(),
        durable.clone(),
        Arc::new(BroadcastSessionChannel::new()),
    );
    Harness {
        fake,
        durable,
        runtime,
    }
}

/// Another context of the same origin when given a shared store and channel.
pub fn runtime_over(
    settings: &Settings,
    fake: Arc<FakeTransport>,
    durable: Arc<dyn KeyValueStore>,
    channel: Arc<BroadcastSessionChannel>,
) -> ClientRuntime {
    ClientRuntime::assemble(
        settings,
        fake,
        durable,
        channel,
        Arc::new(TokioClock::starting_at(START)),
    )
    .unwrap()
}

/// Durable store whose disk is full: reads find nothing, writes fail.
pub struct FullDiskStore;

impl KeyValueStore for FullDiskStore {
    fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
        Ok(None)
    }

    fn set(&self, _key: &str, _value: &str) -> Result<(), StoreError> {
        Err(StoreError::Io("no space left on device".to_owned()))
    }

    fn remove(&self, _key: &str) -> Result<(), StoreError> {
        Ok(())
    }
}

pub fn etagged(body: Value, etag: &str) -> FakeReply {
    FakeReply::response(
        lifeline::domain_port::TransportResponse::new(200)
            .with_json(&body)
            .with_header("ETag", etag),
    )
}
