//! HTTP client for the agent service.
//!
//! One method per backend endpoint. There are no retries: a transport failure
//! or non-2xx status becomes [`ProxyError::BackendUnavailable`], a body that
//! does not match the expected shape becomes [`ProxyError::Schema`].

use chrono::Utc;
use serde::de::DeserializeOwned;

use crate::error::{ProxyError, Result};
use crate::models;
use crate::translate::backend_types::{
    CreateSessionRequest, MessageResponse, ProvidersResponse, Session,
};
use crate::translate::openai_types::ModelDescriptor;
use crate::translate::request::to_backend_request_with_provider;

const ERROR_BODY_LIMIT: usize = 500;

#[derive(Debug, Clone)]
pub struct BackendClient {
    client: reqwest::Client,
    base_url: String,
    default_provider_id: String,
}

impl BackendClient {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        default_provider_id: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            default_provider_id: default_provider_id.into(),
        }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Every model of every provider the agent knows, in declaration order.
    pub async fn list_models(&self) -> Result<Vec<ModelDescriptor>> {
        let url = self.url("/config/providers");
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ProxyError::backend(format!("GET {url} failed: {e}")))?;

        let catalogue: ProvidersResponse = read_json(response, &url).await?;
        let created = Utc::now().timestamp();

        Ok(catalogue
            .providers
            .iter()
            .flat_map(|provider| {
                provider
                    .models
                    .values()
                    .map(move |model| models::describe(model, provider, created))
            })
            .collect())
    }

    pub async fn create_session(&self, title: &str) -> Result<Session> {
        let url = self.url("/session");
        let response = self
            .client
            .post(&url)
            .json(&CreateSessionRequest {
                title: title.to_string(),
            })
            .send()
            .await
            .map_err(|e| ProxyError::backend(format!("POST {url} failed: {e}")))?;

        read_json(response, &url).await
    }

    /// Post one user turn into a session and wait for the complete reply.
    pub async fn send_message(
        &self,
        session_id: &str,
        text: &str,
        model: &str,
    ) -> Result<MessageResponse> {
        let url = self.url(&format!("/session/{session_id}/message"));
        let body = to_backend_request_with_provider(text, model, &self.default_provider_id);

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProxyError::backend(format!("POST {url} failed: {e}")))?;

        read_json(response, &url).await
    }

    /// Workspace paths matching `query`. An empty query matches everything.
    pub async fn find_files(&self, query: &str) -> Result<Vec<String>> {
        let url = self.url("/find/file");
        let response = self
            .client
            .get(&url)
            .query(&[("query", query)])
            .send()
            .await
            .map_err(|e| ProxyError::backend(format!("GET {url} failed: {e}")))?;

        read_json(response, &url).await
    }
}

/// Read an upstream response as JSON, mapping failures to proxy errors.
pub(crate) async fn read_json<T: DeserializeOwned>(
    response: reqwest::Response,
    url: &str,
) -> Result<T> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| ProxyError::backend(format!("Failed to read response from {url}: {e}")))?;

    if !status.is_success() {
        return Err(ProxyError::backend(format!(
            "{url} returned status {}: {}",
            status.as_u16(),
            truncate(&body, ERROR_BODY_LIMIT)
        )));
    }

    serde_json::from_str(&body).map_err(|e| {
        ProxyError::schema(format!(
            "Unexpected response from {url}: {e}. Body: {}",
            truncate(&body, ERROR_BODY_LIMIT)
        ))
    })
}

/// Cut `s` to at most `max` bytes without splitting a character.
fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
