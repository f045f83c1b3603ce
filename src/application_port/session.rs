use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("no refresh credential available")]
    NoRefreshToken,
    #[error("response carried no access token")]
    MissingAccessToken,
    #[error("rejected by server ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("storage error: {0}")]
    Storage(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshState {
    Idle,
    Refreshing,
}

impl fmt::Display for RefreshState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefreshState::Idle => f.write_str("idle"),
            RefreshState::Refreshing => f.write_str("refreshing"),
        }
    }
}

/// Read-only view of the session, consumed by navigation guards.
pub trait SessionView: Send + Sync {
    fn is_authenticated(&self) -> bool;
    fn role(&self) -> String;
    /// True when the current role is any of `roles`. An empty slice allows everyone.
    fn has_role(&self, roles: &[&str]) -> bool;
    fn has_permission(&self, name: &str) -> bool;
}
