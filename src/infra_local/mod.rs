mod clock_system;
mod key_value_store_file;
mod key_value_store_memory;
mod network_environment_manual;
mod session_channel_broadcast;

pub use clock_system::*;
pub use key_value_store_file::*;
pub use key_value_store_memory::*;
pub use network_environment_manual::*;
pub use session_channel_broadcast::*;
