//! Session Store
//!
//! Single owner of the current [`Identity`]. The resolver and the session actions
//! write to it; the gate and the pages only read snapshots or watch for changes.
//! Every write replaces the principal as a whole and notifies watchers.

use crate::identity::{Identity, Principal, Profile, ResolutionState, Role};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

#[derive(Debug, Clone)]
struct StoreState {
    principal: Principal,
    /// Resolutions started and not yet settled
    in_flight: usize,
    /// True until the first resolution settles or the session is cleared
    awaiting_first: bool,
    /// Bumped on every clear; resolutions started before it are discarded
    epoch: u64,
    /// Bumped whenever the principal is replaced
    version: u64,
}

impl StoreState {
    fn identity(&self) -> Identity {
        let state = if self.awaiting_first || self.in_flight > 0 {
            ResolutionState::Pending
        } else {
            ResolutionState::Resolved
        };
        Identity {
            principal: self.principal.clone(),
            state,
        }
    }

    fn settle(&mut self) {
        self.in_flight = self.in_flight.saturating_sub(1);
        self.awaiting_first = false;
    }
}

/// Shared handle to the process-wide session identity
#[derive(Debug, Clone)]
pub struct SessionStore {
    tx: Arc<watch::Sender<StoreState>>,
}

impl SessionStore {
    /// A fresh store, pending until the first resolution settles
    pub fn new() -> Self {
        let (tx, _) = watch::channel(StoreState {
            principal: Principal::Anonymous,
            in_flight: 0,
            awaiting_first: true,
            epoch: 0,
            version: 0,
        });
        Self { tx: Arc::new(tx) }
    }

    /// Current identity
    pub fn snapshot(&self) -> Identity {
        self.tx.borrow().identity()
    }

    /// Mark a resolution as started. The store reads as pending until the
    /// returned ticket is completed or dropped.
    pub fn begin_resolution(&self) -> ResolutionTicket {
        let mut epoch = 0;
        self.tx.send_modify(|state| {
            state.in_flight += 1;
            epoch = state.epoch;
        });
        ResolutionTicket {
            tx: Arc::clone(&self.tx),
            epoch,
            settled: false,
        }
    }

    /// Drop back to the anonymous, resolved state
    pub fn clear(&self) {
        self.tx.send_modify(|state| {
            state.principal = Principal::Anonymous;
            state.awaiting_first = false;
            state.epoch += 1;
            state.version += 1;
        });
        debug!("Session cleared");
    }

    /// Role of the current principal, with a token that identifies this principal
    /// for [`SessionStore::replace_profile`]
    pub fn principal_version(&self) -> (Option<Role>, PrincipalVersion) {
        let state = self.tx.borrow();
        (state.principal.role(), PrincipalVersion(state.version))
    }

    /// Swap the profile of the principal named by `version`.
    ///
    /// Nothing is written when the principal was cleared or replaced since
    /// `version` was taken, or holds no profile. Returns whether the store was changed.
    pub fn replace_profile(&self, version: PrincipalVersion, profile: Option<Profile>) -> bool {
        self.tx.send_if_modified(|state| {
            let has_profile = state.principal.role().is_some_and(|r| r.requires_profile());
            if state.version == version.0 && has_profile {
                state.principal.set_profile(profile);
                true
            } else {
                false
            }
        })
    }

    /// Watch the identity for changes
    pub fn subscribe(&self) -> SessionWatcher {
        SessionWatcher {
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Identifies one principal held by the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrincipalVersion(u64);

/// Proof that a resolution is in flight.
///
/// Dropping it without completing settles the resolution and leaves the
/// principal unchanged.
#[derive(Debug)]
pub struct ResolutionTicket {
    tx: Arc<watch::Sender<StoreState>>,
    epoch: u64,
    settled: bool,
}

impl ResolutionTicket {
    /// Publish the outcome of the resolution.
    ///
    /// The outcome is discarded when the session was cleared after this
    /// resolution began.
    pub fn complete(mut self, principal: Principal) {
        let epoch = self.epoch;
        self.tx.send_modify(|state| {
            if state.epoch == epoch {
                state.principal = principal;
                state.version += 1;
            } else {
                debug!("Discarding resolution started before the session was cleared");
            }
            state.settle();
        });
        self.settled = true;
    }
}

impl Drop for ResolutionTicket {
    fn drop(&mut self) {
        if !self.settled {
            self.tx.send_modify(StoreState::settle);
        }
    }
}

/// Receives a fresh identity every time the store is written
#[derive(Debug, Clone)]
pub struct SessionWatcher {
    rx: watch::Receiver<StoreState>,
}

impl SessionWatcher {
    pub fn current(&self) -> Identity {
        self.rx.borrow().identity()
    }

    /// Wait for the next write. Returns `None` once the store is gone.
    pub async fn changed(&mut self) -> Option<Identity> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().identity())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::UserRecord;
    use serde_json::{json, Map};

    fn principal(role: Role) -> Principal {
        Principal::from_user(
            UserRecord {
                role,
                name: "Test".to_string(),
                email: "test@example.com".to_string(),
                extra: Map::new(),
            },
            None,
        )
    }

    #[test]
    fn test_new_store_is_pending_and_anonymous() {
        let store = SessionStore::new();
        let identity = store.snapshot();
        assert!(identity.is_pending());
        assert!(identity.role().is_none());
    }

    #[test]
    fn test_completed_resolution_is_resolved() {
        let store = SessionStore::new();
        let ticket = store.begin_resolution();
        assert!(store.snapshot().is_pending());

        ticket.complete(principal(Role::Driver));
        let identity = store.snapshot();
        assert_eq!(identity.state, ResolutionState::Resolved);
        assert_eq!(identity.role(), Some(Role::Driver));
    }

    #[test]
    fn test_dropped_ticket_never_leaves_store_pending() {
        let store = SessionStore::new();
        drop(store.begin_resolution());
        let identity = store.snapshot();
        assert!(!identity.is_pending());
        assert!(identity.role().is_none());
    }

    #[test]
    fn test_overlapping_resolutions_stay_pending_until_all_settle() {
        let store = SessionStore::new();
        let first = store.begin_resolution();
        let second = store.begin_resolution();

        first.complete(principal(Role::Customer));
        assert!(store.snapshot().is_pending());

        second.complete(principal(Role::Admin));
        let identity = store.snapshot();
        assert!(!identity.is_pending());
        // last write wins
        assert_eq!(identity.role(), Some(Role::Admin));
    }

    #[test]
    fn test_clear_discards_resolution_started_before_it() {
        let store = SessionStore::new();
        let ticket = store.begin_resolution();
        store.clear();
        ticket.complete(principal(Role::Customer));

        let identity = store.snapshot();
        assert!(identity.role().is_none());
        assert!(!identity.is_pending());
    }

    #[test]
    fn test_replace_profile_for_current_principal() {
        let store = SessionStore::new();
        store.begin_resolution().complete(principal(Role::Customer));

        let (role, version) = store.principal_version();
        assert_eq!(role, Some(Role::Customer));
        assert!(store.replace_profile(version, Some(Profile(json!({"id": 1})))));
        assert_eq!(
            store.snapshot().profile().and_then(|p| p.get("id")),
            Some(&json!(1))
        );
        // a profile write does not retire the principal
        assert!(store.replace_profile(version, None));
        assert!(store.snapshot().profile().is_none());
    }

    #[test]
    fn test_replace_profile_discarded_after_principal_changes() {
        let store = SessionStore::new();
        store.begin_resolution().complete(principal(Role::Customer));
        let (_, stale) = store.principal_version();

        store.clear();
        assert!(!store.replace_profile(stale, Some(Profile(json!({"owner": "A"})))));

        store.begin_resolution().complete(principal(Role::Customer));
        assert!(!store.replace_profile(stale, Some(Profile(json!({"owner": "A"})))));
        assert!(store.snapshot().profile().is_none());

        store.begin_resolution().complete(principal(Role::Admin));
        let (_, admin) = store.principal_version();
        assert!(!store.replace_profile(admin, Some(Profile(json!({"id": 1})))));
    }

    #[tokio::test]
    async fn test_watcher_sees_writes() {
        let store = SessionStore::new();
        let mut watcher = store.subscribe();
        assert!(watcher.current().is_pending());

        store.begin_resolution().complete(principal(Role::Admin));
        // begin and complete are two writes; the watcher sees the latest
        let identity = watcher.changed().await.unwrap();
        assert_eq!(identity.role(), Some(Role::Admin));
        assert!(!identity.is_pending());
    }
}
