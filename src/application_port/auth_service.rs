use crate::application_port::SessionError;
use crate::domain_model::{CredentialRecord, Identity, LoginInput};

#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    async fn login(&self, input: LoginInput) -> Result<CredentialRecord, SessionError>;
    /// Never fails: the server-side revoke is best effort, the local wipe always happens.
    async fn logout(&self);
    async fn refresh_identity(&self) -> Result<Identity, SessionError>;
}
