//! Starshop HTTP client implementation.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::Deserialize;

use starshop_core::{Event, Outgoing};

use crate::error::ClientError;

/// Starshop API client.
///
/// Forwards chat events and collects the replies the front end should render.
#[derive(Debug, Clone)]
pub struct StarshopClient {
    client: Client,
    base_url: String,
    api_key: String,
    service_name: String,
}

impl StarshopClient {
    /// Create a new starshop client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Base URL of the starshop service (e.g., `"http://starshop:8080"`)
    /// * `api_key` - Service API key for authentication
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, ClientError> {
        Self::with_options(base_url, api_key, ClientOptions::default())
    }

    /// Create a new starshop client with custom options.
    ///
    /// # Errors
    ///
    /// Returns an error if the API key is empty or the HTTP client cannot be built.
    pub fn with_options(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        options: ClientOptions,
    ) -> Result<Self, ClientError> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(ClientError::Configuration("API key is empty".into()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(options.timeout_seconds))
            .build()
            .map_err(|e| ClientError::Configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            service_name: options.service_name,
        })
    }

    /// Send one chat event.
    ///
    /// Returns the direct replies followed by any notifications queued since
    /// the previous call.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn send_event(&self, event: &Event) -> Result<Vec<Outgoing>, ClientError> {
        tracing::debug!(user_id = %event.user_id, "Sending event");

        let response = self
            .client
            .post(format!("{}/v1/events", self.base_url))
            .header("X-API-Key", &self.api_key)
            .header("X-Service-Name", &self.service_name)
            .json(event)
            .send()
            .await?;

        let body: MessagesResponse = self.handle_response(response).await?;
        Ok(body.messages)
    }

    /// Take notifications queued by webhooks.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn poll_outbox(&self) -> Result<Vec<Outgoing>, ClientError> {
        let response = self
            .client
            .get(format!("{}/v1/outbox", self.base_url))
            .header("X-API-Key", &self.api_key)
            .header("X-Service-Name", &self.service_name)
            .send()
            .await?;

        let body: MessagesResponse = self.handle_response(response).await?;
        Ok(body.messages)
    }

    /// Check service health.
    ///
    /// # Errors
    ///
    /// Returns an error if the service is unreachable or unhealthy.
    pub async fn health(&self) -> Result<HealthStatus, ClientError> {
        let response = self
            .client
            .get(format!("{}/health", self.base_url))
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Handle API response and convert errors.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        let status = response.status();

        if status.is_success() {
            let bytes = response.bytes().await?;
            return Ok(serde_json::from_slice(&bytes)?);
        }

        let error_body: Result<ApiErrorResponse, _> = response.json().await;

        match error_body {
            Ok(api_error) if status == StatusCode::UNAUTHORIZED => {
                Err(ClientError::Unauthorized(api_error.error.message))
            }
            Ok(api_error) => Err(ClientError::Api {
                code: api_error.error.code,
                message: api_error.error.message,
                status: status.as_u16(),
            }),
            Err(_) if status == StatusCode::UNAUTHORIZED => {
                Err(ClientError::Unauthorized(format!("HTTP {status}")))
            }
            Err(_) => Err(ClientError::Api {
                code: "unknown".to_string(),
                message: format!("HTTP {status}"),
                status: status.as_u16(),
            }),
        }
    }
}

/// Client options for customization.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Request timeout in seconds (default: 900). Automatic orders keep the
    /// event request open until the executor answers.
    pub timeout_seconds: u64,
    /// Service name to include in requests.
    pub service_name: String,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout_seconds: 900,
            service_name: "unknown".to_string(),
        }
    }
}

impl ClientOptions {
    /// Create options with a service name.
    #[must_use]
    pub fn with_service_name(name: impl Into<String>) -> Self {
        Self {
            service_name: name.into(),
            ..Self::default()
        }
    }
}

/// Health check response.
#[derive(Debug, Clone, Deserialize)]
pub struct HealthStatus {
    /// Service status.
    pub status: String,
    /// Service name.
    pub service: String,
    /// Service version.
    pub version: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    messages: Vec<Outgoing>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    code: String,
    message: String,
}
