//! Core configuration data types

use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Top-level client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CabdashConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub routing: RoutingConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Backend connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL every endpoint path is joined onto
    pub base_url: String,
    /// Request timeout in seconds applied by the HTTP client
    pub timeout_seconds: u64,
    /// Upper bound for a single identity or profile probe
    pub probe_timeout_ms: u64,
    /// User agent string
    pub user_agent: String,
    /// Additional headers
    pub headers: HashMap<String, String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api".to_string(),
            timeout_seconds: 30,
            probe_timeout_ms: 10_000,
            user_agent: format!("cabdash/{}", env!("CARGO_PKG_VERSION")),
            headers: HashMap::new(),
        }
    }
}

/// Navigation policy: redirect targets, onboarding pages and the route table
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    pub login_path: String,
    pub home_path: String,
    pub onboarding: Vec<OnboardingConfig>,
    pub routes: Vec<RouteConfig>,
}

/// The pair of pages that bracket a role's profile creation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OnboardingConfig {
    pub role: String,
    pub create_profile_path: String,
    pub dashboard_path: String,
}

/// One routable page.
///
/// `public = true` opens the page to everyone; otherwise an empty `roles` list
/// means any authenticated role.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RouteConfig {
    pub path: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub public: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<String>,
}

impl RouteConfig {
    pub fn public(path: &str) -> Self {
        Self {
            path: path.to_string(),
            public: true,
            roles: Vec::new(),
        }
    }

    pub fn authenticated(path: &str) -> Self {
        Self {
            path: path.to_string(),
            public: false,
            roles: Vec::new(),
        }
    }

    pub fn restricted(path: &str, roles: &[&str]) -> Self {
        Self {
            path: path.to_string(),
            public: false,
            roles: roles.iter().map(|r| r.to_string()).collect(),
        }
    }
}
