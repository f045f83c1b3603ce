mod support;

use lifeline::application_port::*;
use lifeline::domain_model::*;
use lifeline::infra_http::FakeReply;
use serde_json::json;
use support::*;

fn credentials() -> LoginInput {
    LoginInput {
        identifier: "ada@example.com".to_owned(),
        password: "correct horse".to_owned(),
    }
}

#[tokio::test(start_paused = true)]
async fn token_login_then_logout() {
    let h = harness();
    let access = jwt(json!({
        "sub": "u1",
        "iat": START,
        "exp": START + 3600,
        "role": "seller",
        "perms": ["orders:read"]
    }));
    h.fake.on(
        LOGIN_PATH,
        FakeReply::json(200, json!({ "access_token": access, "refresh_token": "r1" })),
    );
    h.fake.on("/api/auth/logout", FakeReply::json(200, json!({})));

    let record = h.runtime.auth_service.login(credentials()).await.unwrap();

    assert_eq!(record.role, "seller");
    assert_eq!(record.claims_source, ClaimsSource::TokenHint);
    assert!(h.runtime.session.is_authenticated());
    assert!(h.runtime.session.has_role(&["admin", "seller"]));
    assert!(h.runtime.session.has_permission("orders:read"));
    // The cold backend was probed before the login call.
    assert_eq!(h.fake.count(HttpMethod::Get, HEALTH_PATH), 1);

    h.runtime.auth_service.logout().await;

    let revoke = &h.fake.requests_to("/api/auth/logout")[0].request;
    assert_eq!(
        revoke.header("authorization"),
        Some(format!("Bearer {access}").as_str())
    );
    assert!(!h.runtime.session.is_authenticated());
    assert!(h.runtime.session.snapshot().is_guest());

    h.runtime.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn logout_clears_even_when_server_fails() {
    let h = harness();
    h.runtime
        .session
        .set_credentials(&token_for("u1", START, 3600), Some("r1"), None);
    h.fake.on("/api/auth/logout", FakeReply::status(503));

    h.runtime.auth_service.logout().await;

    assert!(h.runtime.session.access_token().is_none());
    assert!(h.runtime.session.refresh_token().is_none());

    h.runtime.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn login_rejection_leaves_guest_session() {
    let h = harness();
    h.fake.on(
        LOGIN_PATH,
        FakeReply::json(401, json!({ "message": "Invalid credentials" })),
    );

    let err = h.runtime.auth_service.login(credentials()).await.unwrap_err();

    assert_eq!(
        err,
        SessionError::Rejected {
            status: 401,
            message: "Invalid credentials".to_owned()
        }
    );
    assert!(!h.runtime.session.is_authenticated());

    h.runtime.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn cookie_mode_relies_on_identity_endpoint() {
    let mut settings = settings();
    settings.api.auth_mode = AuthMode::Cookie;
    let h = harness_with(settings);
    h.fake
        .on(LOGIN_PATH, FakeReply::json(200, json!({ "user": { "id": 7 } })))
        .on(
            ME_PATH,
            FakeReply::json(200, json!({ "data": { "id": 7, "role": "admin", "permissions": ["users:write"] } })),
        )
        .on("/api/items", FakeReply::json(200, json!([])));

    let record = h.runtime.auth_service.login(credentials()).await.unwrap();

    assert_eq!(record.role, "admin");
    assert_eq!(record.claims_source, ClaimsSource::Server);
    assert!(record.access_token.is_none());
    assert!(h.runtime.session.is_authenticated());
    assert!(h.runtime.session.has_permission("users:write"));

    h.runtime.api.get("/items").await.unwrap();
    let sent = &h.fake.requests_to("/api/items")[0].request;
    assert_eq!(sent.header("authorization"), None);

    h.runtime.shutdown().await;
}
