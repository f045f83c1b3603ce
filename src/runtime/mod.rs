mod client_runtime;
mod connectivity_watcher;

pub use client_runtime::*;
pub use connectivity_watcher::*;
