// Client core for the document analysis platform: session lifecycle,
// long-running task monitoring, and API access. Views stay behind the
// ViewBridge trait.

pub mod api;
pub mod error;
pub mod events;
pub mod models;
pub mod monitor;
pub mod session;

pub use api::ApiClient;
pub use error::{ClientError, Result};
pub use events::{NullBridge, Severity, ViewBridge};
pub use models::{
    ComparisonReport, Document, TrainingConfig, TrainingMetrics, TrainingStatus, User,
};
pub use monitor::{MonitorStrategy, TaskMonitor, TaskPhase, TaskSnapshot, TaskSubscription};
pub use session::{
    CredentialStore, FileCredentialStore, MemoryCredentialStore, SessionManager, SessionState,
};
