//! Activity logging: JSONL file writer plus the logger thread.

pub mod events;
pub mod jsonl;

pub use events::{ActivityEvent, ActivityLoggerHandle, spawn_logger};
pub use jsonl::{EventKind, JsonlConfig, JsonlWriter, LogLine};
