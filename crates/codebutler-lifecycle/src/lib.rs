//! Process lifecycle: the root cancellation token, signal handling, and
//! ordered shutdown hooks bounded by deadlines.

mod manager;

pub use manager::{HookError, LifecycleManager};
