use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

pub const GUEST_ROLE: &str = "guest";

/// Where the role and permission set of a [`CredentialRecord`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClaimsSource {
    #[default]
    None,
    /// Decoded from the access token without signature verification.
    TokenHint,
    /// Confirmed by the identity endpoint.
    Server,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_at: Option<i64>,
    pub issued_at: Option<i64>,
    pub subject: Option<String>,
    pub role: String,
    pub permissions: BTreeSet<String>,
    pub claims_source: ClaimsSource,
}

impl Default for CredentialRecord {
    fn default() -> Self {
        Self {
            access_token: None,
            refresh_token: None,
            expires_at: None,
            issued_at: None,
            subject: None,
            role: GUEST_ROLE.to_owned(),
            permissions: BTreeSet::new(),
            claims_source: ClaimsSource::None,
        }
    }
}

impl CredentialRecord {
    pub fn is_guest(&self) -> bool {
        self.role.is_empty() || self.role == GUEST_ROLE
    }
}

/// Claim fields the client reads out of an access token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    pub exp: Option<i64>,
    pub iat: Option<i64>,
    pub sub: Option<String>,
    pub role: Option<String>,
    pub permissions: Option<Vec<String>>,
}

/// Expiry metadata mirrored next to the tokens so an opaque token keeps its
/// server-reported lifetime across reloads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialMeta {
    pub exp: Option<i64>,
    pub iat: Option<i64>,
    pub sub: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PersistTier {
    #[default]
    Ephemeral,
    TabScoped,
    Durable,
}

impl PersistTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            PersistTier::Ephemeral => "ephemeral",
            PersistTier::TabScoped => "tab-scoped",
            PersistTier::Durable => "durable",
        }
    }
}

impl fmt::Display for PersistTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PersistTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "ephemeral" | "memory" => Ok(PersistTier::Ephemeral),
            "tab-scoped" | "session" => Ok(PersistTier::TabScoped),
            "durable" | "local" => Ok(PersistTier::Durable),
            other => Err(format!("unknown persist tier: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    #[default]
    Token,
    Cookie,
    Hybrid,
}

impl AuthMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMode::Token => "token",
            AuthMode::Cookie => "cookie",
            AuthMode::Hybrid => "hybrid",
        }
    }

    pub fn sends_bearer(&self) -> bool {
        !matches!(self, AuthMode::Cookie)
    }
}

impl fmt::Display for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "token" => Ok(AuthMode::Token),
            "cookie" => Ok(AuthMode::Cookie),
            "hybrid" => Ok(AuthMode::Hybrid),
            other => Err(format!("unknown auth mode: {other}")),
        }
    }
}

/// Token pair returned by the login and renewal endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenGrant {
    #[serde(default, alias = "accessToken")]
    pub access_token: Option<String>,
    #[serde(default, alias = "refreshToken")]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default, alias = "perms")]
    pub permissions: Option<Vec<String>>,
}

/// Identity as reported by the session bootstrap endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    #[serde(default)]
    pub id: Option<serde_json::Value>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default, alias = "perms")]
    pub permissions: Option<Vec<String>>,
}

#[derive(Debug, Clone)]
pub struct LoginInput {
    pub identifier: String,
    pub password: String,
}
