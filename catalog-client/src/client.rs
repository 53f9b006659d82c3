//! HTTP client for the Action Catalog Service.

use std::collections::HashMap;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::schema::{ActionResponse, Catalog};

/// Errors surfaced by the Action Catalog Client.
#[derive(Debug, Error)]
pub enum CatalogClientError {
    /// Transport-level failure (DNS, connect, timeout, TLS, ...).
    #[error("request to action catalog service failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Top-level response body could not be decoded as JSON.
    #[error("malformed response from action catalog service: {0}")]
    MalformedResponse(String),

    /// A non-2xx HTTP status was returned.
    #[error("action catalog service returned status {status}: {body}")]
    HttpStatus { status: u16, body: String },

    /// The catalog fetch succeeded but contained no providers.
    #[error("action catalog is empty")]
    EmptyCatalog,

    /// `success: false` in the `/execute` response body.
    #[error("remote action failed: {0}")]
    RemoteActionFailed(String),

    /// A `RemoteActionFailed` identified as an authorization failure
    /// (HTTP 401/403, or a recognized auth-shaped error message), tagged
    /// so a caller can prompt for token refresh.
    #[error("remote action failed due to an authorization error: {0}")]
    Auth(String),
}

impl CatalogClientError {
    /// True for any variant that should be surfaced to the caller as an
    /// authorization failure rather than a generic dispatch failure.
    #[must_use]
    pub fn is_auth_error(&self) -> bool {
        matches!(self, Self::Auth(_))
    }
}

#[derive(Serialize)]
struct ExecuteRequestBody<'a> {
    service: &'a str,
    action: &'a str,
    parameters: &'a HashMap<String, Value>,
    /// Duplicated token placement: some deployed Action Catalog servers
    /// read the bearer token from the body rather than the header. Both
    /// are populated so either placement is satisfied.
    oauth_token: &'a str,
}

/// Stateless, cloneable client for the Action Catalog Service HTTP API.
///
/// Safe for concurrent use: `reqwest::Client` pools connections
/// internally and is cheap to clone.
#[derive(Debug, Clone)]
pub struct CatalogClient {
    http: reqwest::Client,
    base_url: String,
}

impl CatalogClient {
    /// Build a client against `base_url`, bounding every outbound call by
    /// `request_timeout`.
    ///
    /// # Errors
    ///
    /// Returns `CatalogClientError::Transport` if the underlying HTTP
    /// client cannot be constructed (e.g. an invalid native TLS config).
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> Result<Self, CatalogClientError> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into(),
        })
    }

    /// `GET /catalog`
    ///
    /// # Errors
    ///
    /// `CatalogClientError::Transport` on a network failure,
    /// `CatalogClientError::HttpStatus` on a non-2xx response,
    /// `CatalogClientError::MalformedResponse` if the body is not valid
    /// catalog JSON, or `CatalogClientError::EmptyCatalog` if the catalog
    /// decodes but contains no providers.
    pub async fn get_service_catalog(&self) -> Result<Catalog, CatalogClientError> {
        let url = format!("{}/catalog", self.base_url.trim_end_matches('/'));
        debug!(%url, "fetching action catalog");

        let response = self.http.get(&url).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            warn!(%status, "catalog fetch returned non-2xx");
            return Err(CatalogClientError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }

        let catalog: Catalog = serde_json::from_str(&body)
            .map_err(|e| CatalogClientError::MalformedResponse(e.to_string()))?;

        if catalog.is_empty() {
            return Err(CatalogClientError::EmptyCatalog);
        }

        Ok(catalog)
    }

    /// `POST /execute`
    ///
    /// Sends the bearer token both as an `Authorization: Bearer <token>`
    /// header and as the `oauth_token` body field. A non-2xx status, a
    /// transport error, or `success: false` in the decoded body each
    /// surface as a typed error; HTTP 401/403 or an auth-shaped
    /// `success: false` body are tagged `CatalogClientError::Auth` so the
    /// dispatcher can mark the step's failure as an authorization error.
    ///
    /// # Errors
    ///
    /// See variant docs on `CatalogClientError`.
    pub async fn execute_action(
        &self,
        service: &str,
        action: &str,
        inputs: &HashMap<String, Value>,
        oauth_token: &str,
    ) -> Result<ActionResponse, CatalogClientError> {
        let url = format!("{}/execute", self.base_url.trim_end_matches('/'));
        debug!(%url, service, action, "invoking action");

        let body = ExecuteRequestBody {
            service,
            action,
            parameters: inputs,
            oauth_token,
        };

        let response = self
            .http
            .post(&url)
            .bearer_auth(oauth_token)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let is_auth_status = status.as_u16() == 401 || status.as_u16() == 403;
        let text = response.text().await?;

        if !status.is_success() {
            warn!(%status, service, action, "action execution returned non-2xx");
            let message = format!("http status {status}: {text}");
            return Err(if is_auth_status {
                CatalogClientError::Auth(message)
            } else {
                CatalogClientError::HttpStatus {
                    status: status.as_u16(),
                    body: text,
                }
            });
        }

        let parsed: ActionResponse = serde_json::from_str(&text)
            .map_err(|e| CatalogClientError::MalformedResponse(e.to_string()))?;

        if !parsed.success {
            warn!(service, action, error = %parsed.error, "remote action reported failure");
            return Err(if is_likely_auth_error(&parsed.error) {
                CatalogClientError::Auth(parsed.error)
            } else {
                CatalogClientError::RemoteActionFailed(parsed.error)
            });
        }

        Ok(parsed)
    }
}

fn is_likely_auth_error(message: &str) -> bool {
    let lowered = message.to_ascii_lowercase();
    lowered.contains("invalid_token")
        || lowered.contains("unauthorized")
        || lowered.contains("forbidden")
        || lowered.contains("expired")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs() -> HashMap<String, Value> {
        let mut m = HashMap::new();
        m.insert("recipient_email".to_string(), Value::String("a@b.com".to_string()));
        m
    }

    #[tokio::test]
    async fn get_service_catalog_decodes_success() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/catalog")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"providers":{"google":{"display_name":"Google","services":{"gmail":{"display_name":"Gmail","functions":{"send_message":{"name":"send_message","required_fields":["recipient_email"]}}}}}}}"#)
            .create_async()
            .await;

        let client = CatalogClient::new(server.url(), Duration::from_secs(5)).unwrap();
        let catalog = client.get_service_catalog().await.unwrap();
        assert!(catalog.has_service("gmail"));
    }

    #[tokio::test]
    async fn get_service_catalog_rejects_malformed_json() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/catalog")
            .with_status(200)
            .with_body("not json")
            .create_async()
            .await;

        let client = CatalogClient::new(server.url(), Duration::from_secs(5)).unwrap();
        let result = client.get_service_catalog().await;
        assert!(matches!(result, Err(CatalogClientError::MalformedResponse(_))));
    }

    #[tokio::test]
    async fn get_service_catalog_rejects_empty_catalog() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/catalog")
            .with_status(200)
            .with_body(r#"{"providers":{}}"#)
            .create_async()
            .await;

        let client = CatalogClient::new(server.url(), Duration::from_secs(5)).unwrap();
        let result = client.get_service_catalog().await;
        assert!(matches!(result, Err(CatalogClientError::EmptyCatalog)));
    }

    #[tokio::test]
    async fn execute_action_success_returns_data() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/execute")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"success":true,"data":{"message_id":"m-1"},"error":""}"#)
            .create_async()
            .await;

        let client = CatalogClient::new(server.url(), Duration::from_secs(5)).unwrap();
        let response = client
            .execute_action("gmail", "send_message", &inputs(), "mock_oauth_token_valid")
            .await
            .unwrap();
        assert!(response.success);
        assert_eq!(response.data.get("message_id").unwrap(), "m-1");
    }

    #[tokio::test]
    async fn execute_action_invalid_token_is_tagged_auth_error() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/execute")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"success":false,"data":{},"error":"invalid_token: token rejected"}"#)
            .create_async()
            .await;

        let client = CatalogClient::new(server.url(), Duration::from_secs(5)).unwrap();
        let result = client
            .execute_action("gmail", "send_message", &inputs(), "invalid_token")
            .await;
        match result {
            Err(e @ CatalogClientError::Auth(_)) => assert!(e.is_auth_error()),
            other => panic!("expected Auth error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn execute_action_http_401_is_tagged_auth_error() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/execute")
            .with_status(401)
            .with_body("unauthorized")
            .create_async()
            .await;

        let client = CatalogClient::new(server.url(), Duration::from_secs(5)).unwrap();
        let result = client
            .execute_action("gmail", "send_message", &inputs(), "bad")
            .await;
        assert!(matches!(result, Err(CatalogClientError::Auth(_))));
    }

    #[tokio::test]
    async fn execute_action_non_auth_failure_is_remote_action_failed() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/execute")
            .with_status(200)
            .with_body(r#"{"success":false,"data":{},"error":"recipient mailbox full"}"#)
            .create_async()
            .await;

        let client = CatalogClient::new(server.url(), Duration::from_secs(5)).unwrap();
        let result = client
            .execute_action("gmail", "send_message", &inputs(), "mock_oauth_token_valid")
            .await;
        assert!(matches!(result, Err(CatalogClientError::RemoteActionFailed(_))));
    }
}
