mod credential;
mod network;
mod queue;
mod request;
mod response;
mod session_event;

pub use credential::*;
pub use network::*;
pub use queue::*;
pub use request::*;
pub use response::*;
pub use session_event::*;
