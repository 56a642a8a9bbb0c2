//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `TaskState`: Tracks where a single crawl task is in its lifecycle
//! - `HostState`: Tracks per-host request timing for rate limiting

mod host_state;
mod task_state;

pub use host_state::HostState;
pub use task_state::TaskState;
