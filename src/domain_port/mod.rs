// ambient

mod clock;
mod key_value_store;
mod network_environment;
mod session_channel;

pub use clock::*;
pub use key_value_store::*;
pub use network_environment::*;
pub use session_channel::*;

// remote

mod auth_endpoints;
mod transport;

pub use auth_endpoints::*;
pub use transport::*;
