//! cabdash session - who is signed in, and where they may go
//!
//! This crate holds the client-side session model of the cab-booking dashboard:
//!
//! - a single session store owning the current identity
//! - an identity resolver that synchronizes the store with the backend
//! - session actions for login, logout, registration and profile refresh
//! - a route admission gate deciding, per navigation, whether a page may render
//!
//! ## Architecture
//!
//! - **Transport** ([`backend`]): the [`SessionBackend`] trait and its HTTP implementation
//! - **State** ([`store`], [`resolver`], [`actions`]): the identity and everything that changes it
//! - **Policy** ([`gate`]): pure functions of the identity and the route table

pub mod actions;
pub mod backend;
pub mod error;
pub mod gate;
pub mod identity;
pub mod resolver;
pub mod store;

pub use actions::{LogoutOutcome, SessionActions};
pub use backend::{ApiEnvelope, HttpSessionBackend, SessionBackend};
pub use error::{AuthError, AuthResult};
pub use gate::{
    normalize_path, same_path, Access, AdmissionDecision, AdmissionGate, OnboardingPaths,
    RoutePolicy, RouteTable,
};
pub use identity::{
    Credentials, Identity, Principal, Profile, RegistrationRequest, ResolutionState, Role,
    UserRecord,
};
pub use resolver::{IdentityResolver, Resolution, DEFAULT_PROBE_TIMEOUT_MS};
pub use store::{PrincipalVersion, ResolutionTicket, SessionStore, SessionWatcher};
