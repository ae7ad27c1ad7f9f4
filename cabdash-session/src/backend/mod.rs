//! Backend transport
//!
//! The session client talks to the cab-booking API through [`SessionBackend`].
//! [`HttpSessionBackend`] is the production implementation; tests drive the
//! resolver and actions through scripted implementations of the same trait.

use crate::identity::{Credentials, Profile, RegistrationRequest, Role, UserRecord};
use async_trait::async_trait;
use cabdash_core::{ApiConfig, CabError, CabResult, ErrorContext};
use serde::Deserialize;
use serde_json::Value;

pub mod http;

pub use http::HttpSessionBackend;

/// Endpoint paths relative to the API base URL
pub mod endpoints {
    pub const CURRENT_USER: &str = "/auth/me";
    pub const LOGIN: &str = "/auth/login";
    pub const LOGOUT: &str = "/auth/logout";
    pub const SIGNUP: &str = "/auth/signup";
    pub const CUSTOMER_PROFILE: &str = "/customer/me";
    pub const DRIVER_PROFILE: &str = "/driver/me";
}

/// Response envelope shared by every endpoint: `{ success, data, message }`
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEnvelope {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Calls the session-related endpoints of the backend
#[async_trait]
pub trait SessionBackend: Send + Sync {
    /// `GET /auth/me`
    async fn current_user(&self) -> CabResult<UserRecord>;

    /// `GET /customer/me`
    async fn customer_profile(&self) -> CabResult<Profile>;

    /// `GET /driver/me`
    async fn driver_profile(&self) -> CabResult<Profile>;

    /// `POST /auth/login`
    async fn login(&self, credentials: &Credentials) -> CabResult<()>;

    /// `POST /auth/logout`
    async fn logout(&self) -> CabResult<()>;

    /// `POST /auth/signup`, returning the server's result record
    async fn register(&self, request: &RegistrationRequest) -> CabResult<Value>;

    /// Profile probe for `role`; admins have no profile endpoint
    async fn profile_for(&self, role: Role) -> CabResult<Option<Profile>> {
        match role {
            Role::Customer => self.customer_profile().await.map(Some),
            Role::Driver => self.driver_profile().await.map(Some),
            Role::Admin => Ok(None),
        }
    }
}

/// Build the HTTP client shared by every request.
///
/// The cookie store carries the session credential set by `/auth/login`.
pub(crate) fn create_http_client(config: &ApiConfig) -> CabResult<reqwest::Client> {
    let mut headers = reqwest::header::HeaderMap::new();

    headers.insert(
        reqwest::header::USER_AGENT,
        reqwest::header::HeaderValue::from_str(&config.user_agent).map_err(|e| {
            CabError::Validation {
                message: format!("Invalid user agent: {}", e),
                field: Some("api.user_agent".to_string()),
                context: ErrorContext::new("http_client").with_operation("create_client"),
            }
        })?,
    );

    for (key, value) in &config.headers {
        let header_name = reqwest::header::HeaderName::from_bytes(key.as_bytes()).map_err(|e| {
            CabError::Validation {
                message: format!("Invalid header name '{}': {}", key, e),
                field: Some("api.headers".to_string()),
                context: ErrorContext::new("http_client").with_operation("create_client"),
            }
        })?;

        let header_value =
            reqwest::header::HeaderValue::from_str(value).map_err(|e| CabError::Validation {
                message: format!("Invalid header value for '{}': {}", key, e),
                field: Some("api.headers".to_string()),
                context: ErrorContext::new("http_client").with_operation("create_client"),
            })?;

        headers.insert(header_name, header_value);
    }

    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(config.timeout_seconds))
        .default_headers(headers)
        .cookie_store(true)
        .build()
        .map_err(|e| CabError::Internal {
            message: format!("Failed to create HTTP client: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("http_client").with_operation("create_client"),
        })
}

/// Map a transport-level failure: no usable response was received
pub(crate) fn transport_error(error: reqwest::Error, endpoint: &str, timeout_ms: u64) -> CabError {
    if error.is_builder() {
        return CabError::Validation {
            message: format!("Could not build request to {}: {}", endpoint, error),
            field: None,
            context: ErrorContext::new("http_backend").with_operation(endpoint),
        };
    }

    if error.is_timeout() {
        return CabError::Timeout {
            operation: endpoint.to_string(),
            duration_ms: timeout_ms,
            context: ErrorContext::new("http_backend")
                .with_operation(endpoint)
                .with_suggestion("Check that the API server is responsive"),
        };
    }

    CabError::Network {
        message: format!("Failed to reach {}: {}", endpoint, error),
        source: Some(Box::new(error)),
        context: ErrorContext::new("http_backend")
            .with_operation(endpoint)
            .with_suggestion("Check network connectivity and api.base_url"),
    }
}

/// Map a non-2xx answer from the server
pub(crate) fn status_error(
    status: reqwest::StatusCode,
    envelope: Option<&ApiEnvelope>,
    endpoint: &str,
) -> CabError {
    if status == reqwest::StatusCode::NOT_FOUND {
        return CabError::NotFound {
            resource: envelope
                .and_then(|e| e.message.clone())
                .unwrap_or_else(|| endpoint.to_string()),
            context: ErrorContext::new("http_backend").with_operation(endpoint),
        };
    }

    let message = envelope
        .and_then(|e| e.message.clone())
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Request failed")
                .to_string()
        });

    CabError::Authentication {
        message,
        status: Some(status.as_u16()),
        context: ErrorContext::new("http_backend")
            .with_operation(endpoint)
            .with_suggestion(match status.as_u16() {
                401 => "Log in again",
                403 => "The current role may not call this endpoint",
                _ => "Check the API server logs",
            }),
    }
}

/// Decode `data` of a successful envelope into `T`
pub(crate) fn decode_data<T: serde::de::DeserializeOwned>(
    data: Option<Value>,
    endpoint: &str,
) -> CabResult<T> {
    let data = data.ok_or_else(|| CabError::Protocol {
        message: format!("{} returned no data", endpoint),
        context: ErrorContext::new("http_backend").with_operation(endpoint),
    })?;

    serde_json::from_value(data).map_err(|e| CabError::Protocol {
        message: format!("{} returned unexpected data: {}", endpoint, e),
        context: ErrorContext::new("http_backend").with_operation(endpoint),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_defaults() {
        let envelope: ApiEnvelope = serde_json::from_value(json!({})).unwrap();
        assert!(!envelope.success);
        assert!(envelope.data.is_none());
        assert!(envelope.message.is_none());
    }

    #[test]
    fn test_status_error_prefers_server_message() {
        let envelope: ApiEnvelope =
            serde_json::from_value(json!({"success": false, "message": "Invalid password"}))
                .unwrap();
        let error = status_error(reqwest::StatusCode::UNAUTHORIZED, Some(&envelope), "/auth/login");
        assert_eq!(error.to_string(), "Invalid password");
        assert_eq!(error.status(), Some(401));

        let error = status_error(reqwest::StatusCode::FORBIDDEN, None, "/auth/me");
        assert_eq!(error.to_string(), "Forbidden");
    }

    #[test]
    fn test_status_error_not_found() {
        let error = status_error(reqwest::StatusCode::NOT_FOUND, None, "/driver/me");
        assert!(matches!(error, CabError::NotFound { ref resource, .. } if resource == "/driver/me"));
    }

    #[test]
    fn test_decode_data() {
        let user: UserRecord = decode_data(
            Some(json!({"role": "ADMIN", "name": "Root", "email": "root@example.com"})),
            "/auth/me",
        )
        .unwrap();
        assert_eq!(user.role, Role::Admin);

        let missing = decode_data::<UserRecord>(None, "/auth/me");
        assert!(matches!(missing, Err(CabError::Protocol { .. })));

        let wrong = decode_data::<UserRecord>(Some(json!({"role": "PILOT"})), "/auth/me");
        assert!(matches!(wrong, Err(CabError::Protocol { .. })));
    }

    #[test]
    fn test_create_http_client_rejects_bad_header() {
        let mut config = ApiConfig::default();
        config
            .headers
            .insert("bad header".to_string(), "value".to_string());
        assert!(matches!(
            create_http_client(&config),
            Err(CabError::Validation { .. })
        ));
    }
}
