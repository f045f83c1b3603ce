mod auth_endpoints_http;
mod transport_fake;
mod transport_reqwest;

pub use auth_endpoints_http::*;
pub use transport_fake::*;
pub use transport_reqwest::*;
