mod auth_service_impl;
mod cold_start_probe_impl;
mod network_quality_impl;
mod offline_queue_impl;
mod pipeline_impl;
mod refresh_coordinator_impl;
mod request_dedup_impl;
mod response_cache_impl;
mod retry_policy_impl;
mod session_store_impl;
mod session_sync_impl;

pub use auth_service_impl::*;
pub use cold_start_probe_impl::*;
pub use network_quality_impl::*;
pub use offline_queue_impl::*;
pub use pipeline_impl::*;
pub use refresh_coordinator_impl::*;
pub use request_dedup_impl::*;
pub use response_cache_impl::*;
pub use retry_policy_impl::*;
pub use session_store_impl::*;
pub use session_sync_impl::*;
