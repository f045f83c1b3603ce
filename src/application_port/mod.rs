mod api_client;
mod auth_service;
mod session;

pub use api_client::*;
pub use auth_service::*;
pub use session::*;
