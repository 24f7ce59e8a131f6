//! Chat-side surface of a CodeButler agent: the injected transport seam,
//! event deduplication, mention-based admission, secret redaction, and the
//! approval message flows.

pub mod approval;
pub mod dedup;
pub mod error;
pub mod mention;
pub mod outbox;
pub mod redact;
pub mod transport;
pub mod types;

pub use error::{ChatError, Result};
pub use outbox::Outbox;
pub use transport::ChatTransport;
