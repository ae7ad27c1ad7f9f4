//! reqwest implementation of [`SessionBackend`]

use async_trait::async_trait;
use cabdash_core::{ApiConfig, CabError, CabResult, ErrorContext};
use serde_json::Value;
use tracing::{debug, info};

use super::{
    create_http_client, decode_data, endpoints, status_error, transport_error, ApiEnvelope,
    SessionBackend,
};
use crate::identity::{Credentials, Profile, RegistrationRequest, UserRecord};

/// Session backend speaking JSON over HTTP with a cookie-based session
pub struct HttpSessionBackend {
    client: reqwest::Client,
    base_url: String,
    timeout_ms: u64,
}

impl HttpSessionBackend {
    /// Create a new backend client
    pub fn new(config: &ApiConfig) -> CabResult<Self> {
        url::Url::parse(&config.base_url).map_err(|e| CabError::Validation {
            message: format!("Invalid API base URL '{}': {}", config.base_url, e),
            field: Some("api.base_url".to_string()),
            context: ErrorContext::new("http_backend").with_operation("new"),
        })?;

        let client = create_http_client(config)?;

        info!("Created session backend for {}", config.base_url);

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout_ms: config.timeout_seconds.saturating_mul(1000),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'))
    }

    /// Send a request and return the status and raw body of the answer
    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        endpoint: &str,
    ) -> CabResult<(reqwest::StatusCode, String)> {
        debug!(endpoint, "Sending backend request");

        let response = request
            .send()
            .await
            .map_err(|e| transport_error(e, endpoint, self.timeout_ms))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| transport_error(e, endpoint, self.timeout_ms))?;

        Ok((status, body))
    }

    /// Send a request and unwrap the response envelope, returning its `data`.
    ///
    /// A 2xx answer with an empty body counts as success without data.
    async fn execute(
        &self,
        request: reqwest::RequestBuilder,
        endpoint: &str,
    ) -> CabResult<Option<Value>> {
        let (status, body) = self.send(request, endpoint).await?;

        let envelope = if body.trim().is_empty() {
            None
        } else {
            serde_json::from_str::<ApiEnvelope>(&body).ok()
        };

        if !status.is_success() {
            return Err(status_error(status, envelope.as_ref(), endpoint));
        }

        match envelope {
            Some(envelope) if envelope.success => Ok(envelope.data),
            Some(envelope) => Err(unsuccessful(envelope, status, endpoint)),
            None if body.trim().is_empty() => Ok(None),
            None => Err(CabError::Protocol {
                message: format!("{} returned a body that is not a response envelope", endpoint),
                context: ErrorContext::new("http_backend").with_operation(endpoint),
            }),
        }
    }

    async fn get(&self, endpoint: &str) -> CabResult<Option<Value>> {
        self.execute(self.client.get(self.url(endpoint)), endpoint)
            .await
    }

    async fn post<B: serde::Serialize + ?Sized>(
        &self,
        endpoint: &str,
        body: Option<&B>,
    ) -> CabResult<Option<Value>> {
        let mut request = self.client.post(self.url(endpoint));
        if let Some(body) = body {
            request = request.json(body);
        }
        self.execute(request, endpoint).await
    }
}

#[async_trait]
impl SessionBackend for HttpSessionBackend {
    async fn current_user(&self) -> CabResult<UserRecord> {
        let data = self.get(endpoints::CURRENT_USER).await?;
        decode_data(data, endpoints::CURRENT_USER)
    }

    async fn customer_profile(&self) -> CabResult<Profile> {
        let data = self.get(endpoints::CUSTOMER_PROFILE).await?;
        decode_data(data, endpoints::CUSTOMER_PROFILE)
    }

    async fn driver_profile(&self) -> CabResult<Profile> {
        let data = self.get(endpoints::DRIVER_PROFILE).await?;
        decode_data(data, endpoints::DRIVER_PROFILE)
    }

    async fn login(&self, credentials: &Credentials) -> CabResult<()> {
        self.post(endpoints::LOGIN, Some(credentials)).await?;
        Ok(())
    }

    async fn logout(&self) -> CabResult<()> {
        self.post::<Value>(endpoints::LOGOUT, None).await?;
        Ok(())
    }

    /// Signup answers either with the usual envelope or with the bare created record
    async fn register(&self, request: &RegistrationRequest) -> CabResult<Value> {
        let endpoint = endpoints::SIGNUP;
        let (status, body) = self
            .send(self.client.post(self.url(endpoint)).json(request), endpoint)
            .await?;

        let value: Option<Value> = if body.trim().is_empty() {
            None
        } else {
            serde_json::from_str(&body).ok()
        };
        let envelope = value
            .as_ref()
            .and_then(|v| serde_json::from_value::<ApiEnvelope>(v.clone()).ok());

        if !status.is_success() {
            return Err(status_error(status, envelope.as_ref(), endpoint));
        }

        // Only treat the body as an envelope when it says so
        let declares_success = value.as_ref().is_some_and(|v| v.get("success").is_some());
        let envelope = envelope.filter(|_| declares_success);

        match (envelope, value) {
            (Some(envelope), _) if !envelope.success => {
                Err(unsuccessful(envelope, status, endpoint))
            }
            (Some(envelope), _) => Ok(envelope.data.unwrap_or(Value::Null)),
            (None, Some(value)) => Ok(value),
            (None, None) => Ok(Value::Null),
        }
    }
}

fn unsuccessful(envelope: ApiEnvelope, status: reqwest::StatusCode, endpoint: &str) -> CabError {
    CabError::Authentication {
        message: envelope
            .message
            .unwrap_or_else(|| "Request was not successful".to_string()),
        status: Some(status.as_u16()),
        context: ErrorContext::new("http_backend").with_operation(endpoint),
    }
}
