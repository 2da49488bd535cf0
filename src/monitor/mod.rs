pub mod extrapolated;
pub mod manager;
pub mod streamed;
pub mod task;

pub use manager::TaskMonitor;
pub use task::{MonitorStrategy, TaskPhase, TaskSnapshot, TaskSubscription};
