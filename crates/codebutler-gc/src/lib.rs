//! Orphaned-worktree reclamation: the periodic garbage collector and the
//! one-shot startup recovery pass.

pub mod collector;
pub mod error;
pub mod probes;
pub mod recovery;

pub use collector::{GarbageCollector, PassSummary};
pub use error::{GcError, Result};
pub use probes::ThreadProbes;
pub use recovery::{reconcile, RecoveryReport};
