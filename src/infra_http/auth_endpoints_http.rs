use crate::application_port::SessionError;
use crate::domain_model::*;
use crate::domain_port::*;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AuthPaths {
    pub login: String,
    pub refresh: String,
    pub me: String,
    pub logout: String,
}

impl Default for AuthPaths {
    fn default() -> Self {
        Self {
            login: "/auth/login".to_owned(),
            refresh: "/auth/token/refresh".to_owned(),
            me: "/auth/me".to_owned(),
            logout: "/auth/logout".to_owned(),
        }
    }
}

/// Auth endpoints spoken directly over the transport, outside the request
/// pipeline.
pub struct HttpAuthEndpoints {
    transport: Arc<dyn Transport>,
    base_url: String,
    paths: AuthPaths,
    app_version: String,
    timeout: Duration,
}

impl HttpAuthEndpoints {
    pub fn new(
        transport: Arc<dyn Transport>,
        base_url: &str,
        paths: AuthPaths,
        app_version: &str,
        timeout: Duration,
    ) -> Self {
        Self {
            transport,
            base_url: base_url.trim_end_matches('/').to_owned(),
            paths,
            app_version: app_version.to_owned(),
            timeout,
        }
    }

    fn request(
        &self,
        method: HttpMethod,
        path: &str,
        access_token: Option<&str>,
    ) -> TransportRequest {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        let mut request = TransportRequest::json(method, url, self.timeout)
            .with_header("X-App-Version", self.app_version.as_str());
        if let Some(token) = access_token {
            request = request.with_header("Authorization", format!("Bearer {token}"));
        }
        request
    }

    async fn call(&self, request: TransportRequest) -> Result<Value, SessionError> {
        let response = self
            .transport
            .execute(request)
            .await
            .map_err(|e| SessionError::Transport(e.to_string()))?;
        let body = response.json_body().unwrap_or(Value::Null);
        if !response.is_success() {
            return Err(SessionError::Rejected {
                status: response.status,
                message: error_message(response.status, &body),
            });
        }
        Ok(body)
    }
}

/// Some backends wrap the payload as `{ "data": { ... } }`.
fn unwrap_data(body: Value) -> Value {
    match body {
        Value::Object(mut map) if map.len() == 1 && map.contains_key("data") => {
            map.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    }
}

fn decode<T: serde::de::DeserializeOwned>(body: Value) -> Result<T, SessionError> {
    serde_json::from_value(unwrap_data(body)).map_err(|e| SessionError::Decode(e.to_string()))
}

#[async_trait::async_trait]
impl AuthEndpoints for HttpAuthEndpoints {
    async fn login(&self, input: &LoginInput) -> Result<TokenGrant, SessionError> {
        let body = json!({
            "identifier": input.identifier,
            "password": input.password,
        });
        let request = self
            .request(HttpMethod::Post, &self.paths.login, None)
            .with_json_body(&body);
        decode(self.call(request).await?)
    }

    async fn renew(
        &self,
        refresh_token: Option<&str>,
        access_token: Option<&str>,
    ) -> Result<TokenGrant, SessionError> {
        let body = match refresh_token {
            Some(token) => json!({ "refresh_token": token }),
            None => json!({}),
        };
        let request = self
            .request(HttpMethod::Post, &self.paths.refresh, access_token)
            .with_json_body(&body);
        decode(self.call(request).await?)
    }

    async fn me(&self, access_token: Option<&str>) -> Result<Identity, SessionError> {
        let request = self.request(HttpMethod::Get, &self.paths.me, access_token);
        decode(self.call(request).await?)
    }

    async fn revoke(&self, access_token: Option<&str>) -> Result<(), SessionError> {
        let request = self
            .request(HttpMethod::Post, &self.paths.logout, access_token)
            .with_json_body(&json!({}));
        self.call(request).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra_http::{FakeReply, FakeTransport};

    fn endpoints(fake: Arc<FakeTransport>) -> HttpAuthEndpoints {
        HttpAuthEndpoints::new(
            fake,
            "http://api.test/",
            AuthPaths::default(),
            "1.2.3",
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn renew_sends_refresh_token_and_bearer() {
        let fake = Arc::new(FakeTransport::new());
        fake.on(
            "/auth/token/refresh",
            FakeReply::json(200, json!({"accessToken": "new-a", "refreshToken": "new-r"})),
        );

        let grant = endpoints(fake.clone())
            .renew(Some("old-r"), Some("old-a"))
            .await
            .unwrap();
        assert_eq!(grant.access_token.as_deref(), Some("new-a"));

        let sent = &fake.requests_to("/auth/token/refresh")[0].request;
        assert_eq!(sent.header("authorization"), Some("Bearer old-a"));
        assert_eq!(sent.header("x-app-version"), Some("1.2.3"));
        let body: Value = serde_json::from_slice(sent.body.as_deref().unwrap()).unwrap();
        assert_eq!(body["refresh_token"], "old-r");
    }

    #[tokio::test]
    async fn rejection_carries_server_message() {
        let fake = Arc::new(FakeTransport::new());
        fake.on(
            "/auth/token/refresh",
            FakeReply::json(401, json!({"detail": "refresh revoked"})),
        );

        let err = endpoints(fake).renew(Some("r"), None).await.unwrap_err();
        assert_eq!(
            err,
            SessionError::Rejected {
                status: 401,
                message: "refresh revoked".to_owned()
            }
        );
    }

    #[tokio::test]
    async fn me_unwraps_data_envelope() {
        let fake = Arc::new(FakeTransport::new());
        fake.on(
            "/auth/me",
            FakeReply::json(200, json!({"data": {"id": 7, "role": "seller", "perms": ["orders:read"]}})),
        );

        let identity = endpoints(fake).me(None).await.unwrap();
        assert_eq!(identity.role.as_deref(), Some("seller"));
        assert_eq!(identity.permissions, Some(vec!["orders:read".to_owned()]));
    }
}
