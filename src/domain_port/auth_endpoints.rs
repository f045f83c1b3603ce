use crate::application_port::SessionError;
use crate::domain_model::{Identity, LoginInput, TokenGrant};

/// Session endpoints, called on the raw transport so that a 401 from the
/// renewal call can never trigger another renewal.
#[async_trait::async_trait]
pub trait AuthEndpoints: Send + Sync {
    async fn login(&self, input: &LoginInput) -> Result<TokenGrant, SessionError>;
    async fn renew(
        &self,
        refresh_token: Option<&str>,
        access_token: Option<&str>,
    ) -> Result<TokenGrant, SessionError>;
    async fn me(&self, access_token: Option<&str>) -> Result<Identity, SessionError>;
    async fn revoke(&self, access_token: Option<&str>) -> Result<(), SessionError>;
}
