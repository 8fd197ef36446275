//! HTTP client implementation

use std::time::Duration;

use reqwest::{header, Client, RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::{de::DeserializeOwned, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};
use url::Url;

use crate::errors::UploadError;

/// Default timeout for a single control-plane request
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client for control-plane communication
pub struct HttpClient {
    client: Client,
    base_url: String,
    api_token: Option<SecretString>,
}

impl HttpClient {
    /// Create a new HTTP client
    pub fn new(base_url: &str, api_token: Option<SecretString>) -> Result<Self, UploadError> {
        Self::with_timeout(base_url, api_token, DEFAULT_TIMEOUT)
    }

    /// Create a new HTTP client with a custom request timeout
    pub fn with_timeout(
        base_url: &str,
        api_token: Option<SecretString>,
        timeout: Duration,
    ) -> Result<Self, UploadError> {
        Url::parse(base_url)
            .map_err(|e| UploadError::ConfigError(format!("Invalid backend URL {}: {}", base_url, e)))?;

        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token,
        })
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        cancel: &CancellationToken,
    ) -> Result<T, UploadError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("GET {}", url);

        let response = self.send(self.client.get(&url), cancel).await?;
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                Err(UploadError::Cancelled("control-plane response aborted".to_string()))
            }
            body = response.json() => Ok(body?),
        }
    }

    /// Make a POST request, discarding the response body
    pub async fn post<B: Serialize>(
        &self,
        path: &str,
        body: &B,
        cancel: &CancellationToken,
    ) -> Result<(), UploadError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("POST {}", url);

        self.send(self.client.post(&url).json(body), cancel).await?;
        Ok(())
    }

    async fn send(
        &self,
        mut request: RequestBuilder,
        cancel: &CancellationToken,
    ) -> Result<Response, UploadError> {
        if let Some(token) = &self.api_token {
            request = request.header(
                header::AUTHORIZATION,
                format!("Bearer {}", token.expose_secret()),
            );
        }

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(UploadError::Cancelled("control-plane request aborted".to_string()));
            }
            response = request.send() => response?,
        };

        if !response.status().is_success() {
            let status = response.status();
            let body = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(UploadError::Cancelled("control-plane response aborted".to_string()));
                }
                body = response.text() => body.unwrap_or_default(),
            };
            error!("HTTP request failed: {} - {}", status, body);
            return Err(UploadError::RemoteError(format!("{}: {}", status, body)));
        }

        Ok(response)
    }
}
