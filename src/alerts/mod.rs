//! Alert model, persistence, certification, and lifecycle.

pub mod certification;
pub mod lifecycle;
pub mod model;
pub mod repo;
#[cfg(feature = "sqlite")]
pub mod store;

pub use certification::GapCertification;
pub use lifecycle::AlertLifecycle;
pub use model::{AlertStatus, AlertType, AuditEntry, GapAlert, Severity};
pub use repo::{AlertFilter, AlertRepository, CreateOutcome, MemoryAlertRepository};
#[cfg(feature = "sqlite")]
pub use store::SqliteAlertStore;
