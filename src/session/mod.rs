pub mod manager;
pub mod store;

pub use manager::{SessionManager, SessionState};
pub use store::{CredentialStore, FileCredentialStore, MemoryCredentialStore};
