use crate::application_impl::*;
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use std::sync::Arc;

pub struct RealAuthService {
    session: Arc<SessionStore>,
    endpoints: Arc<dyn AuthEndpoints>,
    probe: Arc<ColdStartProbe>,
}

impl RealAuthService {
    pub fn new(
        session: Arc<SessionStore>,
        endpoints: Arc<dyn AuthEndpoints>,
        probe: Arc<ColdStartProbe>,
    ) -> Self {
        Self {
            session,
            endpoints,
            probe,
        }
    }

    fn bearer(&self) -> Option<String> {
        if self.session.auth_mode().sends_bearer() {
            self.session.access_token()
        } else {
            None
        }
    }
}

#[async_trait::async_trait]
impl AuthService for RealAuthService {
    async fn login(&self, input: LoginInput) -> Result<CredentialRecord, SessionError> {
        self.probe.warm_if_due().await;

        let grant = self.endpoints.login(&input).await?;
        let mode = self.session.auth_mode();
        match grant.access_token.as_deref() {
            Some(token) if !token.is_empty() => {
                self.session
                    .set_credentials(token, grant.refresh_token.as_deref(), None);
            }
            _ if mode == AuthMode::Cookie => {}
            _ => return Err(SessionError::MissingAccessToken),
        }
        if grant.role.is_some() || grant.permissions.is_some() {
            self.session.apply_identity(&Identity {
                id: None,
                role: grant.role,
                permissions: grant.permissions,
            });
        }
        if mode == AuthMode::Cookie {
            self.refresh_identity().await?;
        }

        let record = self.session.snapshot();
        tracing::info!("logged in as {} ({})", input.identifier, record.role);
        Ok(record)
    }

    async fn logout(&self) {
        if let Err(e) = self.endpoints.revoke(self.bearer().as_deref()).await {
            tracing::debug!("server-side logout failed, clearing locally: {}", e);
        }
        self.session.clear();
        tracing::info!("logged out");
    }

    async fn refresh_identity(&self) -> Result<Identity, SessionError> {
        let identity = self.endpoints.me(self.bearer().as_deref()).await?;
        self.session.apply_identity(&identity);
        Ok(identity)
    }
}
