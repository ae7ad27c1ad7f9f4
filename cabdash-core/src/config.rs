//! Configuration management

use crate::error::{CabError, CabResult, ErrorContext};
use crate::logging::LoggingConfig;
use crate::types::{ApiConfig, CabdashConfig, OnboardingConfig, RouteConfig, RoutingConfig};

use std::path::{Path, PathBuf};

/// Environment variable that overrides `api.base_url`
pub const API_URL_ENV: &str = "CABDASH_API_URL";

const CUSTOMER: &[&str] = &["CUSTOMER"];
const DRIVER: &[&str] = &["DRIVER"];
const ADMIN: &[&str] = &["ADMIN"];

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            login_path: "/login".to_string(),
            home_path: "/".to_string(),
            onboarding: vec![
                OnboardingConfig {
                    role: "CUSTOMER".to_string(),
                    create_profile_path: "/customer/create-profile".to_string(),
                    dashboard_path: "/customer/dashboard".to_string(),
                },
                OnboardingConfig {
                    role: "DRIVER".to_string(),
                    create_profile_path: "/driver/create-profile".to_string(),
                    dashboard_path: "/driver/dashboard".to_string(),
                },
            ],
            routes: vec![
                RouteConfig::public("/"),
                RouteConfig::public("/login"),
                RouteConfig::public("/register"),
                RouteConfig::authenticated("/account"),
                RouteConfig::restricted("/customer/dashboard", CUSTOMER),
                RouteConfig::restricted("/customer/create-profile", CUSTOMER),
                RouteConfig::restricted("/customer/booking-window", CUSTOMER),
                RouteConfig::restricted("/customer/bookings", CUSTOMER),
                RouteConfig::restricted("/customer/profile", CUSTOMER),
                RouteConfig::restricted("/driver/dashboard", DRIVER),
                RouteConfig::restricted("/driver/create-profile", DRIVER),
                RouteConfig::restricted("/driver/trips", DRIVER),
                RouteConfig::restricted("/driver/cab", DRIVER),
                RouteConfig::restricted("/driver/profile", DRIVER),
                RouteConfig::restricted("/admin/dashboard", ADMIN),
                RouteConfig::restricted("/admin/customers", ADMIN),
                RouteConfig::restricted("/admin/customers/:id", ADMIN),
                RouteConfig::restricted("/admin/drivers", ADMIN),
                RouteConfig::restricted("/admin/drivers/:id", ADMIN),
                RouteConfig::restricted("/admin/bookings", ADMIN),
                RouteConfig::restricted("/admin/cabs", ADMIN),
            ],
        }
    }
}

impl Default for CabdashConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            routing: RoutingConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl CabdashConfig {
    /// Default location: `~/.cabdash/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".cabdash").join("config.toml"))
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> CabResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| CabError::Config {
            message: format!("Failed to read config file: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("read_file")
                .with_suggestion("Check if the config file exists and is readable"),
        })?;

        let config: CabdashConfig = toml::from_str(&content).map_err(|e| CabError::Config {
            message: format!("Failed to parse config: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("parse_toml")
                .with_suggestion("Check TOML syntax in config file"),
        })?;

        Ok(config)
    }

    /// Load from `path` when it exists, otherwise fall back to defaults
    pub fn load_or_default<P: AsRef<Path>>(path: Option<P>) -> CabResult<Self> {
        match path {
            Some(path) if path.as_ref().exists() => Self::from_file(path),
            _ => Ok(Self::default()),
        }
    }

    /// Save configuration to a TOML file, creating parent directories
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> CabResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| CabError::Config {
            message: format!("Failed to serialize config: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config").with_operation("serialize_toml"),
        })?;

        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, content).map_err(|e| CabError::Config {
            message: format!("Failed to write config file: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("write_file")
                .with_suggestion("Check if the directory exists and is writable"),
        })?;

        Ok(())
    }

    /// Apply environment overrides on top of the loaded values
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var(API_URL_ENV) {
            if !url.trim().is_empty() {
                self.api.base_url = url;
            }
        }
    }

    /// Validate the configuration
    ///
    /// Role names inside the route table are checked when the route table is built.
    pub fn validate(&self) -> CabResult<()> {
        if self.api.base_url.trim().is_empty() {
            return Err(invalid("api.base_url must not be empty", "Set api.base_url"));
        }

        if let Err(e) = url::Url::parse(&self.api.base_url) {
            return Err(CabError::Config {
                message: format!("api.base_url is not a valid URL: {}", e),
                source: Some(Box::new(e)),
                context: ErrorContext::new("config")
                    .with_operation("validate")
                    .with_suggestion("Use an absolute URL such as http://localhost:8080/api"),
            });
        }

        if self.api.timeout_seconds == 0 {
            return Err(invalid(
                "api.timeout_seconds must be greater than 0",
                "Set api.timeout_seconds to a positive value",
            ));
        }

        if self.api.probe_timeout_ms == 0 {
            return Err(invalid(
                "api.probe_timeout_ms must be greater than 0",
                "Set api.probe_timeout_ms to a positive value",
            ));
        }

        for (name, path) in [
            ("routing.login_path", &self.routing.login_path),
            ("routing.home_path", &self.routing.home_path),
        ] {
            if !path.starts_with('/') {
                return Err(invalid(
                    &format!("{} must start with '/': {}", name, path),
                    "Use an absolute application path",
                ));
            }
        }

        Ok(())
    }
}

fn invalid(message: &str, suggestion: &str) -> CabError {
    CabError::Config {
        message: message.to_string(),
        source: None,
        context: ErrorContext::new("config")
            .with_operation("validate")
            .with_suggestion(suggestion),
    }
}
