//! Session Actions
//!
//! Login, logout, registration and profile refresh. Each action performs one
//! backend call and then lets the [`IdentityResolver`] bring the store back in
//! line with the server.

use crate::backend::SessionBackend;
use crate::error::{AuthError, AuthResult};
use crate::identity::{Credentials, RegistrationRequest, Role};
use crate::resolver::{IdentityResolver, Resolution};
use crate::store::SessionStore;
use cabdash_core::{log_operation_error, log_operation_start, log_operation_success};
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

/// Result of a logout. Local state is cleared either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogoutOutcome {
    /// Whether the server acknowledged the invalidation
    pub server_confirmed: bool,
}

/// Entry point for everything that changes the session
#[derive(Clone)]
pub struct SessionActions {
    resolver: IdentityResolver,
}

impl SessionActions {
    pub fn new(resolver: IdentityResolver) -> Self {
        Self { resolver }
    }

    /// Wire a store, a backend and a resolver together
    pub fn with_backend(backend: Arc<dyn SessionBackend>, probe_timeout_ms: u64) -> Self {
        let resolver = IdentityResolver::new(backend, SessionStore::new())
            .with_probe_timeout(probe_timeout_ms);
        Self::new(resolver)
    }

    pub fn resolver(&self) -> &IdentityResolver {
        &self.resolver
    }

    pub fn store(&self) -> &SessionStore {
        self.resolver.store()
    }

    /// Re-validate the session with the backend (page load, manual refresh)
    pub async fn resolve(&self) -> Resolution {
        self.resolver.resolve().await
    }

    /// Log in and resolve the resulting session.
    ///
    /// Returns the detected role. A login the server accepted but whose
    /// session cannot be resolved, or whose resolution was discarded by a
    /// concurrent logout, yields [`AuthError::InconsistentState`].
    pub async fn login(&self, credentials: &Credentials) -> AuthResult<Role> {
        log_operation_start!("login", email = %credentials.email);

        if let Err(error) = credentials.validate() {
            let error = AuthError::from(error);
            log_operation_error!("login", error, kind = error.kind());
            return Err(error);
        }

        if let Err(error) = self.resolver.backend().login(credentials).await {
            let error = AuthError::from(error);
            log_operation_error!("login", error, kind = error.kind());
            return Err(error);
        }

        // the resolved role counts only if the store kept it
        let resolved = self.resolver.resolve().await.role;
        match resolved.filter(|role| self.store().snapshot().role() == Some(*role)) {
            Some(role) => {
                log_operation_success!("login", %role);
                Ok(role)
            }
            None => {
                let error = AuthError::InconsistentState;
                log_operation_error!("login", error, kind = error.kind());
                Err(error)
            }
        }
    }

    /// Log out. The local identity is always cleared, whatever the server says.
    pub async fn logout(&self) -> LogoutOutcome {
        log_operation_start!("logout");

        // Cleared before and after the call: the client is signed out even if this
        // future is dropped, and resolutions racing the call are discarded.
        self.store().clear();
        let server_confirmed = match self.resolver.backend().logout().await {
            Ok(()) => true,
            Err(error) => {
                warn!(error = %error, "Logout request failed; local session cleared anyway");
                false
            }
        };
        self.store().clear();

        log_operation_success!("logout", server_confirmed);
        LogoutOutcome { server_confirmed }
    }

    /// Create an account. Does not log in.
    pub async fn register(&self, request: &RegistrationRequest) -> AuthResult<Value> {
        log_operation_start!("register", email = %request.email, role = %request.role);

        let result = match request.validate() {
            Ok(()) => self
                .resolver
                .backend()
                .register(request)
                .await
                .map_err(AuthError::from),
            Err(error) => Err(AuthError::from(error)),
        };

        match &result {
            Ok(_) => {
                log_operation_success!("register", email = %request.email);
            }
            Err(error) => {
                log_operation_error!("register", error, kind = error.kind());
            }
        }
        result
    }

    /// Re-fetch the profile after a profile-creation flow.
    ///
    /// No-op for admins and anonymous sessions. Returns whether a profile is present.
    pub async fn refresh_profile(&self) -> bool {
        self.resolver.refresh_profile().await
    }
}
