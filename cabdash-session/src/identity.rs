//! Identity model
//!
//! Who is logged in, under which role, and whether their onboarding profile exists.

use cabdash_core::{validation_error, CabResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Role held by an authenticated user
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Driver,
    Customer,
}

impl Role {
    /// Roles that must create a profile before reaching their functional pages
    pub fn requires_profile(&self) -> bool {
        matches!(self, Role::Customer | Role::Driver)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Admin => write!(f, "ADMIN"),
            Role::Driver => write!(f, "DRIVER"),
            Role::Customer => write!(f, "CUSTOMER"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "ADMIN" => Ok(Role::Admin),
            "DRIVER" => Ok(Role::Driver),
            "CUSTOMER" => Ok(Role::Customer),
            _ => Err(format!("Unknown role: {}", s)),
        }
    }
}

/// The backend's user record as returned by `GET /auth/me`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserRecord {
    pub role: Role,
    pub name: String,
    pub email: String,
    /// Remaining fields of the record, kept opaque
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Role-specific onboarding record (`/customer/me` or `/driver/me`)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct Profile(pub Value);

impl Profile {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }
}

/// The authenticated principal, or its absence.
///
/// A role exists only together with a user, and only customers and drivers
/// carry a profile.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Principal {
    #[default]
    Anonymous,
    Admin {
        user: UserRecord,
    },
    Customer {
        user: UserRecord,
        profile: Option<Profile>,
    },
    Driver {
        user: UserRecord,
        profile: Option<Profile>,
    },
}

impl Principal {
    /// Build a principal from a user record and an optional profile.
    ///
    /// A profile handed in for an admin is dropped.
    pub fn from_user(user: UserRecord, profile: Option<Profile>) -> Self {
        match user.role {
            Role::Admin => Principal::Admin { user },
            Role::Customer => Principal::Customer { user, profile },
            Role::Driver => Principal::Driver { user, profile },
        }
    }

    pub fn user(&self) -> Option<&UserRecord> {
        match self {
            Principal::Anonymous => None,
            Principal::Admin { user }
            | Principal::Customer { user, .. }
            | Principal::Driver { user, .. } => Some(user),
        }
    }

    pub fn role(&self) -> Option<Role> {
        match self {
            Principal::Anonymous => None,
            Principal::Admin { .. } => Some(Role::Admin),
            Principal::Customer { .. } => Some(Role::Customer),
            Principal::Driver { .. } => Some(Role::Driver),
        }
    }

    pub fn profile(&self) -> Option<&Profile> {
        match self {
            Principal::Customer { profile, .. } | Principal::Driver { profile, .. } => {
                profile.as_ref()
            }
            _ => None,
        }
    }

    /// Swap the profile of a customer or driver; ignored for other principals
    pub(crate) fn set_profile(&mut self, new_profile: Option<Profile>) {
        if let Principal::Customer { profile, .. } | Principal::Driver { profile, .. } = self {
            *profile = new_profile;
        }
    }
}

/// Whether a resolution against the backend is still running
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionState {
    Pending,
    Resolved,
}

/// Current session identity as seen by the gate and the pages
#[derive(Debug, Clone, PartialEq)]
pub struct Identity {
    pub principal: Principal,
    pub state: ResolutionState,
}

impl Identity {
    /// State at process start: nothing known yet, resolution pending
    pub fn initial() -> Self {
        Self {
            principal: Principal::Anonymous,
            state: ResolutionState::Pending,
        }
    }

    /// Resolved and logged out
    pub fn anonymous() -> Self {
        Self {
            principal: Principal::Anonymous,
            state: ResolutionState::Resolved,
        }
    }

    /// Resolved as the given principal
    pub fn resolved(principal: Principal) -> Self {
        Self {
            principal,
            state: ResolutionState::Resolved,
        }
    }

    pub fn user(&self) -> Option<&UserRecord> {
        self.principal.user()
    }

    pub fn role(&self) -> Option<Role> {
        self.principal.role()
    }

    pub fn profile(&self) -> Option<&Profile> {
        self.principal.profile()
    }

    pub fn is_pending(&self) -> bool {
        self.state == ResolutionState::Pending
    }

    /// One-line description for logs and the CLI
    pub fn summary(&self) -> String {
        let state = match self.state {
            ResolutionState::Pending => "pending",
            ResolutionState::Resolved => "resolved",
        };
        match self.user() {
            Some(user) => format!(
                "{} <{}> role={} profile={} ({})",
                user.name,
                user.email,
                user.role,
                if self.profile().is_some() { "present" } else { "missing" },
                state
            ),
            None => format!("anonymous ({})", state),
        }
    }
}

impl Default for Identity {
    fn default() -> Self {
        Self::initial()
    }
}

/// Login form
#[derive(Clone, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"***")
            .finish()
    }
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }

    pub fn validate(&self) -> CabResult<()> {
        if self.email.trim().is_empty() {
            return Err(validation_error!("Email is required", "email", "credentials"));
        }
        if self.password.is_empty() {
            return Err(validation_error!(
                "Password is required",
                "password",
                "credentials"
            ));
        }
        Ok(())
    }
}

/// Sign-up payload for a customer or driver account
#[derive(Debug, Clone, Serialize)]
pub struct RegistrationRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
    /// Role-specific fields forwarded as-is
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RegistrationRequest {
    pub fn new(
        role: Role,
        name: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            password: password.into(),
            role,
            extra: Map::new(),
        }
    }

    pub fn with_field(mut self, key: &str, value: Value) -> Self {
        self.extra.insert(key.to_string(), value);
        self
    }

    pub fn validate(&self) -> CabResult<()> {
        if self.role == Role::Admin {
            return Err(validation_error!(
                "Admin accounts cannot be self-registered",
                "role",
                "registration"
            ));
        }
        for (field, value) in [
            ("name", &self.name),
            ("email", &self.email),
            ("password", &self.password),
        ] {
            if value.trim().is_empty() {
                return Err(validation_error!(
                    format!("{} is required", field),
                    field,
                    "registration"
                ));
            }
        }
        Ok(())
    }
}
