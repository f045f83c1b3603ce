//! Process-wide tracing setup. Starts with an `info` filter so settings
//! parsing is logged, then switches to the configured filter.

mod logger;
pub use logger::*;

pub use tracing::{debug, error, info, trace, warn};
