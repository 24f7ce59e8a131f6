//! Per-thread dispatch: one lightweight worker per active chat thread,
//! spawned on the first message, FIFO within the thread, self-terminating
//! on inactivity, crash-isolated from its siblings.

mod registry;
mod worker;

pub use registry::{HandlerError, MessageHandler, ThreadRegistry, WorkerConfig};
