//! Identity Resolver
//!
//! Synchronizes the [`SessionStore`] with the backend: an identity probe,
//! followed by a profile probe for customers and drivers.

use crate::backend::SessionBackend;
use crate::identity::{Principal, Profile, Role};
use crate::store::SessionStore;
use cabdash_core::{performance::measure_async, with_timeout, CabError};
use std::sync::Arc;
use tracing::{debug, info};

/// Default bound for a single probe
pub const DEFAULT_PROBE_TIMEOUT_MS: u64 = 10_000;

/// Outcome of one resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    /// Role of the authenticated user, `None` when anonymous
    pub role: Option<Role>,
    /// Whether a role-specific profile was found
    pub profile_loaded: bool,
}

/// Drives identity resolution against a [`SessionBackend`]
#[derive(Clone)]
pub struct IdentityResolver {
    backend: Arc<dyn SessionBackend>,
    store: SessionStore,
    probe_timeout_ms: u64,
}

impl IdentityResolver {
    pub fn new(backend: Arc<dyn SessionBackend>, store: SessionStore) -> Self {
        Self {
            backend,
            store,
            probe_timeout_ms: DEFAULT_PROBE_TIMEOUT_MS,
        }
    }

    /// Set the upper bound for each probe
    pub fn with_probe_timeout(mut self, probe_timeout_ms: u64) -> Self {
        self.probe_timeout_ms = probe_timeout_ms;
        self
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn backend(&self) -> &Arc<dyn SessionBackend> {
        &self.backend
    }

    /// Resolve the session and publish the result to the store.
    ///
    /// Never fails: an unauthenticated or unreachable backend resolves to the
    /// anonymous identity, and a missing profile only leaves `profile` empty.
    /// The store is back to resolved when this returns unless another
    /// resolution is still running.
    pub async fn resolve(&self) -> Resolution {
        let ticket = self.store.begin_resolution();

        let principal = measure_async("resolve_session", self.probe()).await;
        let resolution = Resolution {
            role: principal.role(),
            profile_loaded: principal.profile().is_some(),
        };

        ticket.complete(principal);

        info!(
            role = ?resolution.role,
            profile_loaded = resolution.profile_loaded,
            "Session resolved"
        );

        resolution
    }

    /// Re-fetch only the profile of the current customer or driver.
    ///
    /// Admins and anonymous sessions are left untouched. The result is dropped
    /// when the session was cleared or replaced while the probe ran. Returns
    /// whether the current principal holds a profile afterwards.
    pub async fn refresh_profile(&self) -> bool {
        let (role, version) = self.store.principal_version();
        let Some(role) = role else {
            debug!("Profile refresh skipped: no session");
            return false;
        };
        if !role.requires_profile() {
            debug!(%role, "Profile refresh skipped: role has no profile");
            return false;
        }

        let profile = self.fetch_profile(role).await;
        let present = profile.is_some();
        if !self.store.replace_profile(version, profile) {
            debug!(%role, "Session changed during profile refresh; result discarded");
            return self.store.snapshot().profile().is_some();
        }
        present
    }

    async fn probe(&self) -> Principal {
        let user = match with_timeout(
            self.backend.current_user(),
            self.probe_timeout_ms,
            "identity_probe",
        )
        .await
        .and_then(|result| result)
        {
            Ok(user) => user,
            Err(error) => {
                if error.is_recoverable() {
                    error.log();
                }
                debug!(error = %error, "No authenticated session");
                return Principal::Anonymous;
            }
        };

        let profile = self.fetch_profile(user.role).await;
        Principal::from_user(user, profile)
    }

    /// Profile probe; every failure is downgraded to "no profile"
    async fn fetch_profile(&self, role: Role) -> Option<Profile> {
        if !role.requires_profile() {
            return None;
        }

        match with_timeout(
            self.backend.profile_for(role),
            self.probe_timeout_ms,
            "profile_probe",
        )
        .await
        .and_then(|result| result)
        {
            Ok(profile) => profile,
            Err(CabError::NotFound { .. }) => {
                debug!(%role, "No profile created yet");
                None
            }
            Err(error) => {
                error.log();
                debug!(%role, "Profile probe failed; continuing without profile");
                None
            }
        }
    }
}
