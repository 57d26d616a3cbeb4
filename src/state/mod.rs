//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `RunState`: lifecycle of one crawl run (running, shutting down, stopped)
//! - `VisitState`: whether an address is being fetched or has been visited
//! - `VisitedSet`: the shared, lock-guarded map of visit states

mod run_state;
mod visit_state;

// Re-export main types
pub use run_state::RunState;
pub use visit_state::{VisitState, VisitedSet};
