mod support;

use futures_util::future::join_all;
use lifeline::application_port::*;
use lifeline::domain_model::HttpMethod;
use lifeline::infra_http::FakeReply;
use serde_json::json;
use std::time::Duration;
use support::*;
use tokio::time::Instant;

#[tokio::test(start_paused = true)]
async fn concurrent_renewals_share_one_request() {
    let h = harness();
    let session = &h.runtime.session;
    session.set_credentials(&token_for("u1", START, 3600), Some("r1"), None);

    let renewed = token_for("u1", START, 7200);
    h.fake.on(
        REFRESH_PATH,
        FakeReply::json(200, json!({ "access_token": renewed, "refresh_token": "r2" }))
            .after(Duration::from_millis(500)),
    );

    let results = join_all((0..5).map(|_| h.runtime.refresher.refresh_now())).await;

    assert!(results.iter().all(Result::is_ok));
    assert_eq!(h.fake.count(HttpMethod::Post, REFRESH_PATH), 1);
    assert_eq!(session.access_token().as_deref(), Some(renewed.as_str()));
    assert_eq!(session.refresh_token().as_deref(), Some("r2"));
    assert_eq!(h.runtime.refresher.state(), RefreshState::Idle);

    h.runtime.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn rejected_renewal_logs_out() {
    let h = harness();
    let session = &h.runtime.session;
    session.set_credentials(&token_for("u1", START, 3600), Some("r1"), None);
    h.fake.on(
        REFRESH_PATH,
        FakeReply::json(401, json!({ "detail": "refresh revoked" })),
    );

    let err = h.runtime.refresher.refresh_now().await.unwrap_err();

    assert_eq!(
        err,
        SessionError::Rejected {
            status: 401,
            message: "refresh revoked".to_owned()
        }
    );
    assert!(session.access_token().is_none());
    assert!(!session.is_authenticated());
    assert_eq!(session.role(), "guest");

    h.runtime.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn token_mode_without_refresh_token_cannot_renew() {
    let h = harness();
    h.runtime
        .session
        .set_credentials(&token_for("u1", START, 3600), None, None);

    let err = h.runtime.refresher.refresh_now().await.unwrap_err();

    assert_eq!(err, SessionError::NoRefreshToken);
    assert_eq!(h.fake.count(HttpMethod::Post, REFRESH_PATH), 0);
    assert!(h.runtime.session.access_token().is_none());

    h.runtime.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn proactive_then_reactive_renewal() {
    let h = harness();
    let session = &h.runtime.session;
    let started = Instant::now();
    session.set_credentials(&token_for("u1", START, 3600), Some("r1"), None);

    let first = token_for("u1", START + 3480, 3600);
    let second = token_for("u1", START + 3601, 3600);
    h.fake
        .on(
            REFRESH_PATH,
            FakeReply::json(200, json!({ "access_token": first, "refresh_token": "r2" })),
        )
        .on(
            REFRESH_PATH,
            FakeReply::json(200, json!({ "access_token": second, "refresh_token": "r3" })),
        );

    tokio::time::sleep(Duration::from_secs(3479)).await;
    assert_eq!(h.fake.count(HttpMethod::Post, REFRESH_PATH), 0);

    tokio::time::sleep(Duration::from_secs(2)).await;
    let renewals = h.fake.requests_to(REFRESH_PATH);
    assert_eq!(renewals.len(), 1);
    assert_eq!(renewals[0].at - started, Duration::from_secs(3480));
    assert_eq!(session.access_token().as_deref(), Some(first.as_str()));

    // The server revokes the renewed token early.
    h.fake
        .on("/api/items", FakeReply::json(401, json!({ "detail": "expired" })))
        .on("/api/items", FakeReply::json(200, json!([{ "id": 1 }])));
    tokio::time::sleep_until(started + Duration::from_secs(3601)).await;

    let response = h.runtime.api.get("/items").await.unwrap();

    assert_eq!(response.body, json!([{ "id": 1 }]));
    assert_eq!(h.fake.count(HttpMethod::Post, REFRESH_PATH), 2);
    let attempts = h.fake.requests_to("/api/items");
    assert_eq!(attempts.len(), 2);
    assert_eq!(
        attempts[0].request.header("authorization"),
        Some(format!("Bearer {first}").as_str())
    );
    assert_eq!(
        attempts[1].request.header("authorization"),
        Some(format!("Bearer {second}").as_str())
    );
    assert_eq!(session.refresh_token().as_deref(), Some("r3"));

    h.runtime.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn unauthorized_after_failed_renewal_is_session_expired() {
    let h = harness();
    h.runtime
        .session
        .set_credentials(&token_for("u1", START, 3600), Some("r1"), None);
    h.fake
        .on("/api/items", FakeReply::json(401, json!({ "detail": "expired" })))
        .on(REFRESH_PATH, FakeReply::json(401, json!({ "detail": "revoked" })));

    let err = h.runtime.api.get("/items").await.unwrap_err();

    assert!(matches!(err, ApiError::SessionExpired));
    assert_eq!(h.fake.count(HttpMethod::Get, "/api/items"), 1);
    assert!(h.runtime.session.access_token().is_none());

    h.runtime.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn second_unauthorized_is_returned_to_caller() {
    let h = harness();
    h.runtime
        .session
        .set_credentials(&token_for("u1", START, 3600), Some("r1"), None);
    h.fake
        .on("/api/admin", FakeReply::json(401, json!({ "detail": "nope" })))
        .on(
            REFRESH_PATH,
            FakeReply::json(200, json!({ "access_token": token_for("u1", START, 7200) })),
        );

    let err = h.runtime.api.get("/admin").await.unwrap_err();

    assert_eq!(err.status(), Some(401));
    assert_eq!(h.fake.count(HttpMethod::Get, "/api/admin"), 2);
    assert_eq!(h.fake.count(HttpMethod::Post, REFRESH_PATH), 1);

    h.runtime.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn returning_to_foreground_renews_a_token_near_expiry() {
    let h = harness();
    let session = &h.runtime.session;
    session.set_credentials(&token_for("u1", START, 3600), Some("r1"), None);
    let renewed = token_for("u1", START, 7200);
    h.fake.on(
        REFRESH_PATH,
        FakeReply::json(200, json!({ "access_token": renewed })),
    );

    h.runtime.on_visible().await;
    assert_eq!(h.fake.count(HttpMethod::Post, REFRESH_PATH), 0);

    session.set_credentials(&token_for("u1", START, 20), None, None);
    h.runtime.on_visible().await;

    assert_eq!(h.fake.count(HttpMethod::Post, REFRESH_PATH), 1);
    assert_eq!(session.access_token().as_deref(), Some(renewed.as_str()));
    assert_eq!(h.runtime.pipeline.offline_queue().queued_count(), 0);

    h.runtime.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn returning_to_foreground_rereads_cookie_identity() {
    let mut settings = settings();
    settings.api.auth_mode = lifeline::domain_model::AuthMode::Cookie;
    let h = harness_with(settings);
    h.fake.on(
        ME_PATH,
        FakeReply::json(200, json!({ "data": { "id": 7, "role": "editor", "permissions": ["posts:write"] } })),
    );

    h.runtime.on_visible().await;

    assert_eq!(h.fake.count(HttpMethod::Get, ME_PATH), 1);
    assert_eq!(h.runtime.session.role(), "editor");
    assert!(h.runtime.session.has_permission("posts:write"));

    h.runtime.shutdown().await;
}
