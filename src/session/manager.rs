use crate::api::ApiClient;
use crate::error::{ClientError, Result};
use crate::events::{Severity, ViewBridge};
use crate::models::User;
use crate::session::store::CredentialStore;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Deadline for passive credential verification. Verification past this is
/// aborted and treated as not-authenticated for the current page load.
const VERIFY_TIMEOUT_SECS: u64 = 5;

/// Authentication state of the process-wide session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Unauthenticated,
    Verifying,
    Authenticated(User),
    Failed(String),
}

impl SessionState {
    pub fn user(&self) -> Option<&User> {
        match self {
            SessionState::Authenticated(user) => Some(user),
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated(_))
    }
}

/// Single source of truth for "is the user authenticated, and as whom".
///
/// All credential handling is centralized here: the store is written only
/// through [`login`](SessionManager::login) and
/// [`logout`](SessionManager::logout), and read through
/// [`bearer_token`](SessionManager::bearer_token).
pub struct SessionManager {
    api: ApiClient,
    store: Arc<dyn CredentialStore>,
    bridge: Arc<dyn ViewBridge>,
    state_tx: watch::Sender<SessionState>,
    /// Sequence of the most recently issued verification call. Resolutions
    /// carrying an older sequence are discarded so overlapping checks
    /// cannot overwrite a newer result.
    verify_seq: AtomicU64,
    verify_timeout: Duration,
}

impl SessionManager {
    pub fn new(
        api: ApiClient,
        store: Arc<dyn CredentialStore>,
        bridge: Arc<dyn ViewBridge>,
    ) -> Self {
        let initial = match store.load() {
            Ok(Some(_)) => SessionState::Verifying,
            _ => SessionState::Unauthenticated,
        };
        let (state_tx, _) = watch::channel(initial);

        Self {
            api,
            store,
            bridge,
            state_tx,
            verify_seq: AtomicU64::new(0),
            verify_timeout: Duration::from_secs(VERIFY_TIMEOUT_SECS),
        }
    }

    pub fn with_verify_timeout(mut self, timeout: Duration) -> Self {
        self.verify_timeout = timeout;
        self
    }

    /// Current session state.
    pub fn state(&self) -> SessionState {
        self.state_tx.borrow().clone()
    }

    /// Subscribe to session state changes.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    /// Re-read the stored credential. Callers attach this to requests per
    /// call; it must not be cached, since logout or a forced invalidation
    /// can clear the slot between reads.
    pub fn bearer_token(&self) -> Result<Option<String>> {
        self.store.load()
    }

    /// Verify the stored credential against the identity endpoint.
    ///
    /// With no stored credential this resolves synchronously without any
    /// network traffic. Otherwise the verification call is bounded by the
    /// verify timeout; a timeout or transport failure leaves the stored
    /// credential in place (it may still be valid on a slow network) while
    /// an explicit 401 erases it.
    pub async fn check_session(&self) -> SessionState {
        let seq = self.verify_seq.fetch_add(1, Ordering::SeqCst) + 1;

        let token = match self.store.load() {
            Ok(Some(token)) => token,
            Ok(None) => {
                log::debug!("no stored credential, session is unauthenticated");
                self.resolve_verification(seq, SessionState::Unauthenticated);
                return self.state();
            }
            Err(e) => {
                log::warn!("failed to read credential slot: {}", e);
                self.resolve_verification(seq, SessionState::Unauthenticated);
                return self.state();
            }
        };

        log::debug!("verifying stored credential with backend (seq {})", seq);

        let outcome =
            tokio::time::timeout(self.verify_timeout, self.api.current_user(&token)).await;

        let next = match outcome {
            Err(_) => {
                // Aborted on deadline. The credential may still be valid on
                // a slow network, so it stays in the slot and gets
                // re-checked on the next navigation.
                log::warn!(
                    "credential verification timed out after {:?}, keeping stored credential",
                    self.verify_timeout
                );
                SessionState::Unauthenticated
            }
            Ok(Err(ClientError::Unauthorized)) => {
                log::info!("stored credential rejected by server, clearing slot");
                if let Err(e) = self.store.clear() {
                    log::warn!("failed to clear credential slot: {}", e);
                }
                SessionState::Unauthenticated
            }
            Ok(Err(e)) => {
                log::warn!(
                    "credential verification failed ({}), keeping stored credential",
                    e
                );
                SessionState::Unauthenticated
            }
            Ok(Ok(user)) => SessionState::Authenticated(user),
        };

        self.resolve_verification(seq, next);
        self.state()
    }

    /// Exchange credentials for a token, fetch the user record, and only
    /// then persist the token: a failure at either step leaves no trace of
    /// a partial session. Exactly one Verifying -> terminal transition per
    /// call.
    pub async fn login(&self, email: &str, password: &str) -> Result<User> {
        self.state_tx.send_replace(SessionState::Verifying);

        match self.login_exchange(email, password).await {
            Ok(user) => {
                log::info!("login succeeded for {}", user.username);
                self.state_tx
                    .send_replace(SessionState::Authenticated(user.clone()));
                self.bridge.navigate("/dashboard");
                Ok(user)
            }
            Err(e) => {
                let reason = e.to_string();
                log::warn!("login failed: {}", reason);
                self.state_tx.send_replace(SessionState::Failed(reason.clone()));
                self.bridge.notify("Login failed", &reason, Severity::Error);
                Err(e)
            }
        }
    }

    /// Erase the credential after a server rejected it on any
    /// authenticated call, forcing a re-login.
    pub fn invalidate_credential(&self) {
        self.supersede_verification();
        if let Err(e) = self.store.clear() {
            log::warn!("failed to clear rejected credential: {}", e);
        }
        self.state_tx.send_replace(SessionState::Unauthenticated);
    }

    /// Erase the credential and drop the user record. Idempotent and never
    /// fails; a store error is logged and the in-memory state still resets.
    pub fn logout(&self) {
        self.supersede_verification();
        if let Err(e) = self.store.clear() {
            log::warn!("failed to clear credential slot on logout: {}", e);
        }
        self.state_tx.send_replace(SessionState::Unauthenticated);
        log::info!("logged out");
        self.bridge.navigate("/login");
    }

    async fn login_exchange(&self, email: &str, password: &str) -> Result<User> {
        let token = self.api.login_token(email, password).await?;
        // The identity fetch has to succeed before the token is persisted,
        // so a second-step failure is an overall login failure with no
        // stored credential left behind.
        let user = self.api.current_user(&token).await?;
        self.store.store(&token)?;
        Ok(user)
    }

    /// Mark every in-flight verification as stale. Logout and credential
    /// invalidation empty the slot, so a verification started before them
    /// must not land afterwards and re-authenticate a credential-less
    /// session.
    fn supersede_verification(&self) {
        self.verify_seq.fetch_add(1, Ordering::SeqCst);
    }

    /// Apply a verification result unless a newer verification has been
    /// issued since; last-issued wins, stale resolutions are dropped.
    fn resolve_verification(&self, seq: u64, next: SessionState) {
        let latest = self.verify_seq.load(Ordering::SeqCst);
        if seq != latest {
            log::debug!(
                "discarding stale verification result (seq {} superseded by {})",
                seq,
                latest
            );
            return;
        }
        self.state_tx.send_replace(next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::NullBridge;
    use crate::session::store::MemoryCredentialStore;

    fn manager_with_store(store: MemoryCredentialStore) -> SessionManager {
        SessionManager::new(
            ApiClient::new().unwrap(),
            Arc::new(store),
            Arc::new(NullBridge),
        )
    }

    #[test]
    fn test_initial_state_without_credential_is_unauthenticated() {
        let manager = manager_with_store(MemoryCredentialStore::new());
        assert_eq!(manager.state(), SessionState::Unauthenticated);
    }

    #[test]
    fn test_initial_state_with_credential_is_verifying() {
        let manager = manager_with_store(MemoryCredentialStore::with_token("tok"));
        assert_eq!(manager.state(), SessionState::Verifying);
    }

    #[test]
    fn test_logout_is_idempotent() {
        let manager = manager_with_store(MemoryCredentialStore::with_token("tok"));
        manager.logout();
        manager.logout();
        assert_eq!(manager.state(), SessionState::Unauthenticated);
        assert_eq!(manager.bearer_token().unwrap(), None);
    }

    #[test]
    fn test_stale_verification_result_is_discarded() {
        let manager = manager_with_store(MemoryCredentialStore::new());

        // Two overlapping checks: seq 1 issued, then seq 2. When seq 1
        // resolves late it must not overwrite the newer result.
        let first = manager.verify_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let second = manager.verify_seq.fetch_add(1, Ordering::SeqCst) + 1;

        manager.resolve_verification(second, SessionState::Verifying);
        assert_eq!(manager.state(), SessionState::Verifying);

        manager.resolve_verification(first, SessionState::Unauthenticated);
        assert_eq!(manager.state(), SessionState::Verifying);
    }

    #[test]
    fn test_logout_supersedes_in_flight_verification() {
        let manager = manager_with_store(MemoryCredentialStore::with_token("tok"));

        // A verification is issued, then logout empties the slot before the
        // verification resolves. The late result must be dropped, not
        // re-authenticate an empty slot.
        let in_flight = manager.verify_seq.fetch_add(1, Ordering::SeqCst) + 1;
        manager.logout();

        let user = User {
            id: 1,
            email: "analyst@example.com".to_string(),
            username: "analyst".to_string(),
            role: "admin".to_string(),
            created_at: "2024-01-01T00:00:00".to_string(),
            updated_at: "2024-06-01T00:00:00".to_string(),
            last_login: None,
        };
        manager.resolve_verification(in_flight, SessionState::Authenticated(user));

        assert_eq!(manager.state(), SessionState::Unauthenticated);
        assert_eq!(manager.bearer_token().unwrap(), None);
    }

    #[test]
    fn test_invalidate_credential_supersedes_in_flight_verification() {
        let manager = manager_with_store(MemoryCredentialStore::with_token("tok"));

        let in_flight = manager.verify_seq.fetch_add(1, Ordering::SeqCst) + 1;
        manager.invalidate_credential();

        manager.resolve_verification(in_flight, SessionState::Verifying);
        assert_eq!(manager.state(), SessionState::Unauthenticated);
    }

    #[tokio::test]
    async fn test_check_session_without_credential_makes_no_network_call() {
        // Unroutable base URL: any network attempt would fail loudly, and
        // the nearly-instant resolution shows none was made.
        let api = ApiClient::new()
            .unwrap()
            .with_base_url("http://127.0.0.1:1/api/v1".to_string());
        let manager = SessionManager::new(
            api,
            Arc::new(MemoryCredentialStore::new()),
            Arc::new(NullBridge),
        );

        let state = tokio::time::timeout(Duration::from_millis(50), manager.check_session())
            .await
            .expect("check_session with no credential must resolve immediately");
        assert_eq!(state, SessionState::Unauthenticated);
    }
}
