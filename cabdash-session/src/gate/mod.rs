//! Route Admission Gate
//!
//! Decides, for the current [`Identity`] and a requested path, whether the page
//! may render. Rules are applied in order and the first match wins:
//!
//! 1. resolution pending: [`AdmissionDecision::Loading`]
//! 2. no role: redirect to the login page
//! 3. role not in the route's allow-list: redirect home
//! 4. customers and drivers without a profile are held on their create-profile
//!    page, and sent to their dashboard from it once the profile exists
//! 5. otherwise admit
//!
//! Public routes skip rules 2 to 4. The gate never performs navigation itself;
//! the rendering layer acts on the returned decision.

pub mod routes;


pub use routes::{normalize_path, same_path, Access, RoutePolicy, RouteTable};

use crate::identity::{Identity, Role};
use cabdash_core::{CabError, CabResult, ErrorContext, RoutingConfig};
use std::collections::HashMap;
use tracing::debug;

/// Verdict for one navigation attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdmissionDecision {
    /// Identity still resolving; render a loading state
    Loading,
    /// Navigate to the given path instead
    Redirect(String),
    /// Render the requested page
    Admit,
}

impl std::fmt::Display for AdmissionDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AdmissionDecision::Loading => write!(f, "LOADING"),
            AdmissionDecision::Redirect(target) => write!(f, "REDIRECT({})", target),
            AdmissionDecision::Admit => write!(f, "ADMIT"),
        }
    }
}

/// Onboarding pages of a role that requires a profile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnboardingPaths {
    pub create_profile: String,
    pub dashboard: String,
}

/// Per-navigation admission policy
#[derive(Debug, Clone)]
pub struct AdmissionGate {
    login_path: String,
    home_path: String,
    onboarding: HashMap<Role, OnboardingPaths>,
    routes: RouteTable,
}

impl AdmissionGate {
    /// Build the gate and its route table from configuration.
    ///
    /// Customers and drivers must each have one onboarding entry whose pages
    /// are routes open to that role.
    pub fn from_config(config: &RoutingConfig) -> CabResult<Self> {
        let routes = RouteTable::from_config(&config.routes)?;
        let mut onboarding = HashMap::new();

        for entry in &config.onboarding {
            let role: Role = entry.role.parse().map_err(|e: String| gate_error(&e))?;
            if !role.requires_profile() {
                return Err(gate_error(&format!("{} has no profile to onboard", role)));
            }

            let paths = OnboardingPaths {
                create_profile: normalize_path(&entry.create_profile_path).to_string(),
                dashboard: normalize_path(&entry.dashboard_path).to_string(),
            };
            for path in [&paths.create_profile, &paths.dashboard] {
                match routes.lookup(path) {
                    Some(policy) if !policy.access.is_public() && policy.access.allows(role) => {}
                    _ => {
                        return Err(gate_error(&format!(
                            "onboarding path {} is not a route restricted to {}",
                            path, role
                        )))
                    }
                }
            }

            if onboarding.insert(role, paths).is_some() {
                return Err(gate_error(&format!("{} has two onboarding entries", role)));
            }
        }

        for role in [Role::Customer, Role::Driver] {
            if !onboarding.contains_key(&role) {
                return Err(gate_error(&format!("{} has no onboarding entry", role)));
            }
        }

        Ok(Self {
            login_path: normalize_path(&config.login_path).to_string(),
            home_path: normalize_path(&config.home_path).to_string(),
            onboarding,
            routes,
        })
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    pub fn home_path(&self) -> &str {
        &self.home_path
    }

    pub fn onboarding(&self, role: Role) -> Option<&OnboardingPaths> {
        self.onboarding.get(&role)
    }

    /// Decide admission of `path`, governed by `policy`, for `identity`
    pub fn evaluate(
        &self,
        identity: &Identity,
        path: &str,
        policy: &RoutePolicy,
    ) -> AdmissionDecision {
        if identity.is_pending() {
            return AdmissionDecision::Loading;
        }

        if policy.access.is_public() {
            return AdmissionDecision::Admit;
        }

        let Some(role) = identity.role() else {
            return AdmissionDecision::Redirect(self.login_path.clone());
        };

        if !policy.access.allows(role) {
            return AdmissionDecision::Redirect(self.home_path.clone());
        }

        if let Some(paths) = self.onboarding.get(&role) {
            let on_create_profile = same_path(path, &paths.create_profile);
            match (identity.profile().is_some(), on_create_profile) {
                (false, false) => {
                    return AdmissionDecision::Redirect(paths.create_profile.clone())
                }
                (true, true) => return AdmissionDecision::Redirect(paths.dashboard.clone()),
                _ => {}
            }
        }

        AdmissionDecision::Admit
    }

    /// Look `path` up in the route table and evaluate it.
    ///
    /// `None` means no route matches; the rendering layer shows its not-found page.
    pub fn admit(&self, identity: &Identity, path: &str) -> Option<AdmissionDecision> {
        let policy = self.routes.lookup(path)?;
        let decision = self.evaluate(identity, path, policy);
        debug!(path, pattern = %policy.pattern, %decision, "Admission decided");
        Some(decision)
    }
}

fn gate_error(reason: &str) -> CabError {
    CabError::Config {
        message: format!("Invalid onboarding configuration: {}", reason),
        source: None,
        context: ErrorContext::new("admission_gate")
            .with_operation("from_config")
            .with_suggestion("Declare one onboarding entry each for CUSTOMER and DRIVER"),
    }
}
